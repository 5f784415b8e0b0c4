//! Tally Filter - Metric selection rules
//!
//! Declarative [`FilterRules`] (as written in plugin configuration) compile
//! into an immutable [`Filter`]:
//!
//! | Class | Effect |
//! |-------|--------|
//! | `namepass` / `namedrop` | keep / drop by measurement name |
//! | `fieldpass` / `fielddrop` | keep / remove field keys |
//! | `tagpass` / `tagdrop` | keep / drop by value of a named tag |
//! | `taginclude` / `tagexclude` | keep / remove tag keys on surviving metrics |
//!
//! A metric is kept only if it passes every non-empty class. Empty classes
//! never exclude anything.
//!
//! Patterns are exact strings or globs (`*`, `?`, `[...]`). A malformed glob
//! fails compilation.
//!
//! # Concurrency
//!
//! A compiled [`Filter`] holds no mutable state; `matches` and `select` take
//! `&self` and can be shared by any number of tasks.
//!
//! # Example
//!
//! ```ignore
//! let rules = FilterRules {
//!     namepass: vec!["cpu*".into()],
//!     tagexclude: vec!["debug".into()],
//!     ..Default::default()
//! };
//! let filter = Filter::compile(&rules)?;
//!
//! if let Some(metric) = filter.select(metric) {
//!     // passed, with `debug` tag removed
//! }
//! ```

mod error;
mod filter;
mod pattern;
mod rules;

pub use error::{FilterError, Result};
pub use filter::Filter;
pub use pattern::PatternSet;
pub use rules::FilterRules;
