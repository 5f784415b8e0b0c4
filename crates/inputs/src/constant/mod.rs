//! Constant Input - Emit the same metric every gather
//!
//! ```toml
//! [[inputs.constant]]
//! name = "heartbeat"
//! type = "gauge"
//! fields = { up = 1, version = "1.4.2" }
//! tags = { role = "edge" }
//! ```
//!
//! Useful as a heartbeat and for exercising a pipeline end to end. Tags
//! come from the common input `tags` table.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tally_config::{PluginKind, decode_options};
use tally_metric::{FieldValue, Metric, MetricType};

use crate::registry::{InputContext, InputFactory};
use crate::{Accumulator, Fields, Input, InputError, InputKind, Result};

/// Options of the `constant` input
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstantConfig {
    /// Measurement name
    pub name: String,
    pub fields: toml::Table,
    #[serde(default, rename = "type")]
    pub metric_type: MetricType,
}

/// Emits one metric per gather
#[derive(Debug, Clone)]
pub struct ConstantInput {
    name: String,
    fields: Fields,
    metric_type: MetricType,
}

impl ConstantInput {
    /// # Errors
    ///
    /// `InputError::Config` for an empty name, no fields, or a field whose
    /// value is not a scalar.
    pub fn new(config: ConstantConfig) -> Result<Self> {
        if config.name.is_empty() {
            return Err(InputError::config("constant", "name must not be empty"));
        }
        if config.fields.is_empty() {
            return Err(InputError::config("constant", "at least one field is required"));
        }
        let fields = config
            .fields
            .into_iter()
            .map(|(key, value)| field_value(&key, value).map(|v| (key, v)))
            .collect::<Result<Fields>>()?;

        Ok(Self {
            name: config.name,
            fields,
            metric_type: config.metric_type,
        })
    }
}

fn field_value(key: &str, value: toml::Value) -> Result<FieldValue> {
    match value {
        toml::Value::Float(f) => Ok(FieldValue::Float(f)),
        toml::Value::Integer(i) => Ok(FieldValue::Int(i)),
        toml::Value::Boolean(b) => Ok(FieldValue::Bool(b)),
        toml::Value::String(s) => Ok(FieldValue::String(s)),
        other => Err(InputError::config(
            "constant",
            format!("field '{key}' has unsupported {} value", other.type_str()),
        )),
    }
}

#[async_trait]
impl Input for ConstantInput {
    async fn gather(&self, acc: &dyn Accumulator) -> anyhow::Result<()> {
        let metric = Metric::from_parts(
            self.name.as_str(),
            std::iter::empty::<(String, String)>(),
            self.fields.iter().cloned(),
            Utc::now(),
        )
        .with_type(self.metric_type);
        acc.add_metric(metric);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}

/// Factory for the `constant` input
pub struct ConstantFactory;

impl InputFactory for ConstantFactory {
    fn create(&self, options: &toml::Table, _context: &InputContext) -> Result<InputKind> {
        let config: ConstantConfig = decode_options(PluginKind::Input, "constant", options)?;
        Ok(InputKind::Polled(Box::new(ConstantInput::new(config)?)))
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InputRegistry;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tally_metrics::MetricsHub;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Metric>>);

    impl Accumulator for Collect {
        fn add_metric(&self, metric: Metric) {
            self.0.lock().push(metric);
        }

        fn add_error(&self, error: anyhow::Error) {
            panic!("unexpected error: {error}");
        }
    }

    fn config(toml: &str) -> ConstantConfig {
        let options: toml::Table = toml.parse().unwrap();
        decode_options(PluginKind::Input, "constant", &options).unwrap()
    }

    #[tokio::test]
    async fn test_emits_configured_metric() {
        let input = ConstantInput::new(config(
            r#"
            name = "heartbeat"
            type = "gauge"
            fields = { up = 1, ratio = 0.5, ok = true, version = "1.4.2" }
            "#,
        ))
        .unwrap();

        let acc = Collect::default();
        input.gather(&acc).await.unwrap();
        input.gather(&acc).await.unwrap();

        let got = acc.0.lock();
        assert_eq!(got.len(), 2);
        let metric = &got[0];
        assert_eq!(metric.name(), "heartbeat");
        assert_eq!(metric.metric_type(), MetricType::Gauge);
        assert_eq!(metric.field("up"), Some(&FieldValue::Int(1)));
        assert_eq!(metric.field("ratio"), Some(&FieldValue::Float(0.5)));
        assert_eq!(metric.field("ok"), Some(&FieldValue::Bool(true)));
        assert_eq!(
            metric.field("version"),
            Some(&FieldValue::String("1.4.2".into()))
        );
    }

    #[test]
    fn test_rejects_bad_options() {
        let err = ConstantInput::new(config(r#"name = "x"
            fields = {}"#))
        .unwrap_err();
        assert!(err.to_string().contains("at least one field"));

        let err = ConstantInput::new(config(r#"name = "x"
            fields = { list = [1, 2] }"#))
        .unwrap_err();
        assert!(err.to_string().contains("field 'list'"));

        let registry = InputRegistry::with_builtins();
        let ctx = InputContext::new(Arc::new(MetricsHub::new()));
        let options: toml::Table = r#"fields = { up = 1 }"#.parse().unwrap();
        assert!(matches!(
            registry.create("constant", &options, &ctx),
            Err(InputError::Options(_))
        ));
    }
}
