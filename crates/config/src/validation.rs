//! Whole-file validation
//!
//! Only problems that make the agent unable to start are checked here:
//! - `[agent]` values are usable
//! - At least one output is declared
//!
//! Problems inside a single plugin block are reported per block by
//! [`crate::decode_section`] and never fail the whole file.

use crate::Config;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_agent(config)?;
    if config.outputs.is_empty() {
        return Err(ConfigError::NoOutputs);
    }
    Ok(())
}

fn validate_agent(config: &Config) -> Result<()> {
    let agent = &config.agent;

    if agent.interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "agent",
            "agent",
            "interval",
            "must be greater than zero",
        ));
    }
    if agent.flush_interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "agent",
            "agent",
            "flush_interval",
            "must be greater than zero",
        ));
    }
    if agent.metric_batch_size == 0 {
        return Err(ConfigError::invalid_value(
            "agent",
            "agent",
            "metric_batch_size",
            "must be greater than zero",
        ));
    }
    if agent.metric_buffer_limit < agent.metric_batch_size.saturating_mul(2) {
        return Err(ConfigError::invalid_value(
            "agent",
            "agent",
            "metric_buffer_limit",
            format!(
                "{} must be at least twice metric_batch_size ({})",
                agent.metric_buffer_limit, agent.metric_batch_size
            ),
        ));
    }
    if agent.flush_workers == 0 {
        return Err(ConfigError::invalid_value(
            "agent",
            "agent",
            "flush_workers",
            "must be greater than zero",
        ));
    }
    if agent.flush_queue_size == 0 || agent.ingest_queue_size == 0 {
        return Err(ConfigError::invalid_value(
            "agent",
            "agent",
            "queue size",
            "must be greater than zero",
        ));
    }
    Ok(())
}
