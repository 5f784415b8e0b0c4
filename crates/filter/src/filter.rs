//! Compiled filter

use tally_metric::Metric;

use crate::{FilterRules, PatternSet, Result};

/// Patterns for one named tag
#[derive(Debug, Clone)]
struct TagRule {
    key: String,
    values: PatternSet,
}

impl TagRule {
    fn compile(class: &'static str, key: &str, patterns: &[String]) -> Result<Self> {
        Ok(Self {
            key: key.to_string(),
            values: PatternSet::compile(class, patterns)?,
        })
    }
}

/// Any rule matches one of the metric's tags
fn any_tag_matches(rules: &[TagRule], metric: &Metric) -> bool {
    rules.iter().any(|rule| {
        metric
            .tag(&rule.key)
            .is_some_and(|value| rule.values.matches(value))
    })
}

/// Compiled, immutable metric filter
///
/// Built once from [`FilterRules`]; a default filter passes everything
/// through unchanged.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    name_pass: PatternSet,
    name_drop: PatternSet,
    field_pass: PatternSet,
    field_drop: PatternSet,
    tag_pass: Vec<TagRule>,
    tag_drop: Vec<TagRule>,
    tag_include: PatternSet,
    tag_exclude: PatternSet,
}

impl Filter {
    /// Compile rules into a filter
    ///
    /// # Errors
    ///
    /// Returns `FilterError::InvalidPattern` for the first malformed glob.
    pub fn compile(rules: &FilterRules) -> Result<Self> {
        let tag_pass = rules
            .tagpass
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(key, values)| TagRule::compile("tagpass", key, values))
            .collect::<Result<Vec<_>>>()?;
        let tag_drop = rules
            .tagdrop
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(key, values)| TagRule::compile("tagdrop", key, values))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name_pass: PatternSet::compile("namepass", &rules.namepass)?,
            name_drop: PatternSet::compile("namedrop", &rules.namedrop)?,
            field_pass: PatternSet::compile("fieldpass", &rules.fieldpass)?,
            field_drop: PatternSet::compile("fielddrop", &rules.fielddrop)?,
            tag_pass,
            tag_drop,
            tag_include: PatternSet::compile("taginclude", &rules.taginclude)?,
            tag_exclude: PatternSet::compile("tagexclude", &rules.tagexclude)?,
        })
    }

    /// Whether any rule class is configured
    pub fn is_active(&self) -> bool {
        !(self.name_pass.is_empty()
            && self.name_drop.is_empty()
            && self.field_pass.is_empty()
            && self.field_drop.is_empty()
            && self.tag_pass.is_empty()
            && self.tag_drop.is_empty()
            && self.tag_include.is_empty()
            && self.tag_exclude.is_empty())
    }

    /// Whether the metric passes every configured class
    ///
    /// Field rules count as passing when at least one field would survive
    /// them. Tag include/exclude only prune; they never reject.
    pub fn matches(&self, metric: &Metric) -> bool {
        if !self.name_pass.is_empty() && !self.name_pass.matches(metric.name()) {
            return false;
        }
        if !self.name_drop.is_empty() && self.name_drop.matches(metric.name()) {
            return false;
        }
        if !self.tag_pass.is_empty() && !any_tag_matches(&self.tag_pass, metric) {
            return false;
        }
        if !self.tag_drop.is_empty() && any_tag_matches(&self.tag_drop, metric) {
            return false;
        }
        if self.has_field_rules() {
            return metric.fields().iter().any(|(key, _)| self.keep_field(key));
        }
        true
    }

    /// Apply the filter: `None` if rejected, otherwise the metric with
    /// excluded fields and tags removed
    pub fn select(&self, mut metric: Metric) -> Option<Metric> {
        if !self.matches(&metric) {
            return None;
        }
        if self.has_field_rules() {
            metric.retain_fields(|key| self.keep_field(key));
        }
        if !self.tag_include.is_empty() || !self.tag_exclude.is_empty() {
            metric.retain_tags(|key, _| self.keep_tag(key));
        }
        Some(metric)
    }

    #[inline]
    fn has_field_rules(&self) -> bool {
        !self.field_pass.is_empty() || !self.field_drop.is_empty()
    }

    fn keep_field(&self, key: &str) -> bool {
        (self.field_pass.is_empty() || self.field_pass.matches(key))
            && !self.field_drop.matches(key)
    }

    fn keep_tag(&self, key: &str) -> bool {
        (self.tag_include.is_empty() || self.tag_include.matches(key))
            && !self.tag_exclude.matches(key)
    }
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;
