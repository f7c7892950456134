//! Field schema registry: which collector gathers which fields.
//!
//! The table is static: it is built once at startup and never mutated.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Every handler a turn can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorId {
    Alpha,
    Beta,
    Gamma,
    Document,
    Summary,
}

/// What kind of handler sits behind a collector id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorKind {
    /// Gathers a fixed group of named fields.
    FieldGroup,
    /// Loads a document into the ledger.
    Document,
    /// Read-only narration of the ledger.
    Summary,
}

impl CollectorId {
    pub const ALL: [CollectorId; 5] = [
        CollectorId::Alpha,
        CollectorId::Beta,
        CollectorId::Gamma,
        CollectorId::Document,
        CollectorId::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectorId::Alpha => "alpha",
            CollectorId::Beta => "beta",
            CollectorId::Gamma => "gamma",
            CollectorId::Document => "document",
            CollectorId::Summary => "summary",
        }
    }

    pub fn kind(&self) -> CollectorKind {
        match self {
            CollectorId::Alpha | CollectorId::Beta | CollectorId::Gamma => CollectorKind::FieldGroup,
            CollectorId::Document => CollectorKind::Document,
            CollectorId::Summary => CollectorKind::Summary,
        }
    }
}

impl fmt::Display for CollectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectorId {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        CollectorId::ALL
            .into_iter()
            .find(|id| id.as_str() == needle)
            .ok_or_else(|| SchemaError::UnknownCollector(s.to_string()))
    }
}

/// The fields one collector is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldGroupSpec {
    pub name: CollectorId,
    /// Human-readable purpose, used in routing prompts.
    pub description: String,
    /// Required field names, in the order they are requested.
    pub required_fields: Vec<String>,
}

impl FieldGroupSpec {
    pub fn new(name: CollectorId, description: impl Into<String>, fields: &[&str]) -> Self {
        let mut required_fields: Vec<String> = Vec::with_capacity(fields.len());
        for field in fields {
            if !required_fields.iter().any(|f| f == field) {
                required_fields.push((*field).to_string());
            }
        }
        Self {
            name,
            description: description.into(),
            required_fields,
        }
    }

    pub fn requires(&self, field: &str) -> bool {
        self.required_fields.iter().any(|f| f == field)
    }

    /// Required fields not present in `known`, in request order.
    pub fn missing<'a, V>(&'a self, known: &BTreeMap<String, V>) -> Vec<&'a str> {
        self.required_fields
            .iter()
            .filter(|f| !known.contains_key(f.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Whether `known` covers every required field.
    pub fn is_satisfied_by<V>(&self, known: &BTreeMap<String, V>) -> bool {
        self.required_fields.iter().all(|f| known.contains_key(f))
    }
}

/// Static table: collector id → field group.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    groups: BTreeMap<CollectorId, FieldGroupSpec>,
}

impl SchemaRegistry {
    /// The standard three field groups.
    pub fn standard() -> Self {
        Self::from_specs([
            FieldGroupSpec::new(
                CollectorId::Alpha,
                "collects field_a, field_b and field_c",
                &["field_a", "field_b", "field_c"],
            ),
            FieldGroupSpec::new(
                CollectorId::Beta,
                "collects field_d and field_e",
                &["field_d", "field_e"],
            ),
            FieldGroupSpec::new(
                CollectorId::Gamma,
                "collects field_f, field_g and field_h",
                &["field_f", "field_g", "field_h"],
            ),
        ])
    }

    pub fn from_specs(specs: impl IntoIterator<Item = FieldGroupSpec>) -> Self {
        Self {
            groups: specs.into_iter().map(|s| (s.name, s)).collect(),
        }
    }

    /// Look up the field group behind a collector id.
    pub fn lookup(&self, id: CollectorId) -> Result<&FieldGroupSpec, SchemaError> {
        self.groups
            .get(&id)
            .ok_or_else(|| SchemaError::UnknownCollector(id.to_string()))
    }

    /// Look up a field group by its textual id.
    pub fn lookup_name(&self, name: &str) -> Result<&FieldGroupSpec, SchemaError> {
        let id: CollectorId = name.parse()?;
        self.lookup(id)
    }

    /// All field groups in id order.
    pub fn groups(&self) -> impl Iterator<Item = &FieldGroupSpec> {
        self.groups.values()
    }

    /// The collector that owns a field, if any.
    pub fn owner_of(&self, field: &str) -> Option<CollectorId> {
        self.groups
            .values()
            .find(|g| g.requires(field))
            .map(|g| g.name)
    }

    /// The routing policy as explicit, numbered rules.
    pub fn routing_rules(&self) -> String {
        let mut rules: Vec<String> = self
            .groups
            .values()
            .map(|g| {
                format!(
                    "- If the user mentions {} (or wants to provide information related to them) -> {}",
                    g.required_fields.join(", "),
                    g.name
                )
            })
            .collect();
        rules.push(format!(
            "- If the user wants to upload, load or process a PDF document -> {}",
            CollectorId::Document
        ));
        rules.push(format!(
            "- If the user asks for a summary of the collected data -> {}",
            CollectorId::Summary
        ));
        rules.push(
            "- If none of the above applies and the conversation gives no hint -> none".to_string(),
        );
        rules.join("\n")
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_three_groups() {
        let registry = SchemaRegistry::standard();
        assert_eq!(registry.groups().count(), 3);
        let alpha = registry.lookup(CollectorId::Alpha).unwrap();
        assert_eq!(alpha.required_fields, vec!["field_a", "field_b", "field_c"]);
    }

    #[test]
    fn non_field_collectors_are_unknown_to_the_schema() {
        let registry = SchemaRegistry::standard();
        assert_eq!(
            registry.lookup(CollectorId::Summary),
            Err(SchemaError::UnknownCollector("summary".into()))
        );
        assert!(registry.lookup(CollectorId::Document).is_err());
    }

    #[test]
    fn lookup_by_name_rejects_unknown_ids() {
        let registry = SchemaRegistry::standard();
        assert!(registry.lookup_name("Beta").is_ok());
        assert_eq!(
            registry.lookup_name("agent_9"),
            Err(SchemaError::UnknownCollector("agent_9".into()))
        );
    }

    #[test]
    fn missing_fields_follow_spec_order() {
        let registry = SchemaRegistry::standard();
        let gamma = registry.lookup(CollectorId::Gamma).unwrap();
        let mut known = BTreeMap::new();
        known.insert("field_g".to_string(), "1".to_string());
        assert_eq!(gamma.missing(&known), vec!["field_f", "field_h"]);
        assert!(!gamma.is_satisfied_by(&known));
    }

    #[test]
    fn duplicate_field_names_are_collapsed() {
        let spec = FieldGroupSpec::new(CollectorId::Beta, "", &["x", "y", "x"]);
        assert_eq!(spec.required_fields, vec!["x", "y"]);
    }

    #[test]
    fn routing_rules_mention_every_target() {
        let rules = SchemaRegistry::standard().routing_rules();
        for id in CollectorId::ALL {
            assert!(rules.contains(id.as_str()), "missing {id}");
        }
        assert!(rules.contains("-> none"));
    }

    #[test]
    fn owner_of_field() {
        let registry = SchemaRegistry::standard();
        assert_eq!(registry.owner_of("field_e"), Some(CollectorId::Beta));
        assert_eq!(registry.owner_of("field_z"), None);
    }
}
