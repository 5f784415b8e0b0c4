//! Noop Processor - Pass-through processor
//!
//! Useful for exercising chain wiring and measuring chain overhead.

use std::future::Future;
use std::pin::Pin;

use tally_metric::Metric;

use crate::registry::ProcessorFactory;
use crate::{Processor, TransformResult};

#[cfg(test)]
#[path = "noop_test.rs"]
mod tests;

/// A processor that passes metrics through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProcessor;

impl NoopProcessor {
    #[inline]
    pub const fn new() -> Self {
        Self
    }
}

impl Processor for NoopProcessor {
    fn process<'a>(
        &'a self,
        metric: Metric,
    ) -> Pin<Box<dyn Future<Output = TransformResult<Vec<Metric>>> + Send + 'a>> {
        Box::pin(async move { Ok(vec![metric]) })
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Factory for [`NoopProcessor`]
pub struct NoopFactory;

impl ProcessorFactory for NoopFactory {
    fn create(&self, _options: &toml::Table) -> TransformResult<Box<dyn Processor>> {
        Ok(Box::new(NoopProcessor::new()))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
