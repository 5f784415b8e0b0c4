//! Filter rules as configured

use std::collections::BTreeMap;

use serde::Deserialize;

/// Uncompiled filter rules
///
/// Embedded (flattened) in every plugin block:
///
/// ```toml
/// [[outputs.stdout]]
/// namepass = ["cpu", "mem*"]
/// fielddrop = ["*_debug"]
/// tagexclude = ["internal_id"]
///
/// [outputs.stdout.tagpass]
/// host = ["web-*"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    pub namepass: Vec<String>,
    pub namedrop: Vec<String>,
    pub fieldpass: Vec<String>,
    pub fielddrop: Vec<String>,
    pub tagpass: BTreeMap<String, Vec<String>>,
    pub tagdrop: BTreeMap<String, Vec<String>>,
    pub taginclude: Vec<String>,
    pub tagexclude: Vec<String>,
}

impl FilterRules {
    /// Whether no rule class is configured
    pub fn is_empty(&self) -> bool {
        self.namepass.is_empty()
            && self.namedrop.is_empty()
            && self.fieldpass.is_empty()
            && self.fielddrop.is_empty()
            && self.tagpass.is_empty()
            && self.tagdrop.is_empty()
            && self.taginclude.is_empty()
            && self.tagexclude.is_empty()
    }
}
