//! Metric record

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use siphasher::sip::SipHasher13;

use crate::FieldValue;

/// Semantic type of a metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
    Summary,
    Histogram,
    CumulativeHistogram,
    #[default]
    Untyped,
}

/// Plugin identity that produced a metric
///
/// An empty `plugin` means the origin is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Origin {
    /// Plugin type name (e.g. "cpu", "internal")
    pub plugin: String,
    /// Configured instance id (alias, or a generated id)
    pub instance: String,
}

impl Origin {
    /// Create an origin from plugin name and instance id
    pub fn new(plugin: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            instance: instance.into(),
        }
    }

    /// Whether the producing plugin is unknown
    #[inline]
    pub fn is_unknown(&self) -> bool {
        self.plugin.is_empty()
    }
}

/// A single measurement
///
/// Tag keys are unique (a map). Field keys are unique and keep insertion
/// order; setting an existing field replaces its value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    name: String,
    tags: BTreeMap<String, String>,
    fields: Vec<(String, FieldValue)>,
    timestamp: DateTime<Utc>,
    metric_type: MetricType,
    origin: Origin,
}

impl Metric {
    /// Create an untyped metric with no tags or fields
    pub fn new(name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeMap::new(),
            fields: Vec::new(),
            timestamp,
            metric_type: MetricType::Untyped,
            origin: Origin::default(),
        }
    }

    /// Build a metric from tag and field collections
    ///
    /// Duplicate field keys keep the position of the first occurrence and
    /// the value of the last.
    pub fn from_parts<T, F>(
        name: impl Into<String>,
        tags: T,
        fields: F,
        timestamp: DateTime<Utc>,
    ) -> Self
    where
        T: IntoIterator<Item = (String, String)>,
        F: IntoIterator<Item = (String, FieldValue)>,
    {
        let mut metric = Self::new(name, timestamp);
        metric.tags.extend(tags);
        for (key, value) in fields {
            metric.set_field(key, value);
        }
        metric
    }

    // ------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------

    /// Add or replace a tag
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_tag(key, value);
        self
    }

    /// Add or replace a field
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set_field(key, value);
        self
    }

    /// Set the semantic type
    #[must_use]
    pub fn with_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    /// Set the origin
    #[must_use]
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    // ------------------------------------------------------------------
    // Name
    // ------------------------------------------------------------------

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn add_prefix(&mut self, prefix: &str) {
        self.name.insert_str(0, prefix);
    }

    pub fn add_suffix(&mut self, suffix: &str) {
        self.name.push_str(suffix);
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    #[inline]
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn remove_tag(&mut self, key: &str) -> Option<String> {
        self.tags.remove(key)
    }

    /// Keep only tags for which `keep` returns true
    pub fn retain_tags(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.tags.retain(|k, v| keep(k, v));
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    #[inline]
    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Add a field, replacing the value of an existing key in place
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn remove_field(&mut self, key: &str) -> Option<FieldValue> {
        let idx = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(idx).1)
    }

    /// Rename a field key, keeping its position
    ///
    /// If `to` already exists it is removed first. Returns false when `from`
    /// is not present.
    pub fn rename_field(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.field(from).is_some();
        }
        let Some(idx) = self.fields.iter().position(|(k, _)| k == from) else {
            return false;
        };
        self.fields[idx].0 = to.to_string();
        if let Some(dup) = self
            .fields
            .iter()
            .enumerate()
            .position(|(i, (k, _))| i != idx && k == to)
        {
            self.fields.remove(dup);
        }
        true
    }

    /// Keep only fields for which `keep` returns true
    pub fn retain_fields(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.fields.retain(|(k, _)| keep(k));
    }

    #[inline]
    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    // ------------------------------------------------------------------
    // Time, type, origin
    // ------------------------------------------------------------------

    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }

    /// Truncate the timestamp down to a multiple of `precision`
    ///
    /// A zero precision leaves the timestamp untouched.
    pub fn truncate_timestamp(&mut self, precision: Duration) {
        let step = precision.as_nanos();
        if step == 0 || step > i64::MAX as u128 {
            return;
        }
        let Some(nanos) = self.timestamp.timestamp_nanos_opt() else {
            return;
        };
        let step = step as i64;
        self.timestamp = DateTime::from_timestamp_nanos(nanos - nanos.rem_euclid(step));
    }

    #[inline]
    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn set_type(&mut self, metric_type: MetricType) {
        self.metric_type = metric_type;
    }

    #[inline]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn set_origin(&mut self, origin: Origin) {
        self.origin = origin;
    }

    /// Stable identity over name and tag set
    ///
    /// Fields, timestamp, type and origin do not participate. The hash uses
    /// fixed keys, so it is stable across processes.
    pub fn series_id(&self) -> u64 {
        let mut hasher = SipHasher13::new();
        self.name.hash(&mut hasher);
        for (key, value) in &self.tags {
            key.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        hasher.finish()
    }
}

#[cfg(test)]
#[path = "metric_test.rs"]
mod tests;
