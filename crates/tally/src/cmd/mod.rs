//! Command implementations for the tally CLI

pub mod check;
pub mod plugins;
pub mod run;
