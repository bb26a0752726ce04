//! Structural change detection between two adjacent schema versions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use std::collections::{BTreeMap, BTreeSet};

use crate::schema::SchemaType;

/// A detected change between schema versions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChange {
    /// Type of change
    pub change_type: ChangeType,
    /// Path to the changed element (e.g., "fields.name.type")
    pub path: String,
    /// Old value (if applicable)
    pub old_value: Option<String>,
    /// New value (if applicable)
    pub new_value: Option<String>,
    /// Whether readers of the old version break on the new one
    pub is_breaking: bool,
    /// Human-readable description
    pub description: String,
}

/// Type of schema change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    FieldAdded,
    FieldRemoved,
    TypeChanged,
    DefaultChanged,
    DocumentationChanged,
    EnumVariantAdded,
    EnumVariantRemoved,
    /// Line-level change where no structure is known
    TextChanged,
}

/// Changes from `left` (older) to `right` (newer), both in parsed form
pub fn detect_changes(schema_type: SchemaType, left: &Value, right: &Value) -> Vec<SchemaChange> {
    let mut changes = Vec::new();
    if left == right {
        return changes;
    }

    match (schema_type, left, right) {
        (SchemaType::Avro, Value::Object(_), Value::Object(_)) => {
            detect_avro_changes(left, right, &mut changes);
        }
        (SchemaType::Json, Value::Object(_), Value::Object(_)) => {
            detect_json_schema_changes(left, right, "", &mut changes);
        }
        _ => {}
    }

    // Nothing structural explains the difference: fall back to lines
    if changes.is_empty() {
        detect_text_changes(left, right, &mut changes);
    }
    changes
}

fn detect_avro_changes(old: &Value, new: &Value, changes: &mut Vec<SchemaChange>) {
    if old.get("doc") != new.get("doc") {
        changes.push(SchemaChange {
            change_type: ChangeType::DocumentationChanged,
            path: "doc".to_string(),
            old_value: old.get("doc").map(|d| d.to_string()),
            new_value: new.get("doc").map(|d| d.to_string()),
            is_breaking: false,
            description: "Schema documentation changed".to_string(),
        });
    }

    detect_enum_changes(old.get("symbols"), new.get("symbols"), "symbols", changes);

    let (Some(old_fields), Some(new_fields)) = (
        old.get("fields").and_then(|f| f.as_array()),
        new.get("fields").and_then(|f| f.as_array()),
    ) else {
        return;
    };

    let field_map = |fields: &[Value]| -> BTreeMap<String, Value> {
        fields
            .iter()
            .filter_map(|f| f.get("name").and_then(|n| n.as_str()).map(|n| (n.to_string(), f.clone())))
            .collect()
    };
    let old_field_map = field_map(old_fields.as_slice());
    let new_field_map = field_map(new_fields.as_slice());

    for (name, old_field) in &old_field_map {
        match new_field_map.get(name) {
            None => changes.push(SchemaChange {
                change_type: ChangeType::FieldRemoved,
                path: format!("fields.{}", name),
                old_value: Some(old_field.to_string()),
                new_value: None,
                is_breaking: true,
                description: format!("Field '{}' was removed", name),
            }),
            Some(new_field) => {
                let old_type = old_field.get("type");
                let new_type = new_field.get("type");
                if old_type != new_type {
                    changes.push(SchemaChange {
                        change_type: ChangeType::TypeChanged,
                        path: format!("fields.{}.type", name),
                        old_value: old_type.map(|t| t.to_string()),
                        new_value: new_type.map(|t| t.to_string()),
                        is_breaking: true,
                        description: format!("Field '{}' type changed", name),
                    });
                }
                if old_field.get("default") != new_field.get("default") {
                    changes.push(SchemaChange {
                        change_type: ChangeType::DefaultChanged,
                        path: format!("fields.{}.default", name),
                        old_value: old_field.get("default").map(|d| d.to_string()),
                        new_value: new_field.get("default").map(|d| d.to_string()),
                        is_breaking: false,
                        description: format!("Field '{}' default changed", name),
                    });
                }
                if old_field.get("doc") != new_field.get("doc") {
                    changes.push(SchemaChange {
                        change_type: ChangeType::DocumentationChanged,
                        path: format!("fields.{}.doc", name),
                        old_value: old_field.get("doc").map(|d| d.to_string()),
                        new_value: new_field.get("doc").map(|d| d.to_string()),
                        is_breaking: false,
                        description: format!("Field '{}' documentation changed", name),
                    });
                }
            }
        }
    }

    for (name, new_field) in &new_field_map {
        if old_field_map.contains_key(name) {
            continue;
        }
        // Old data has no value for a new field unless it carries a default
        let has_default = new_field.get("default").is_some();
        changes.push(SchemaChange {
            change_type: ChangeType::FieldAdded,
            path: format!("fields.{}", name),
            old_value: None,
            new_value: Some(new_field.to_string()),
            is_breaking: !has_default,
            description: if has_default {
                format!("Field '{}' was added with default value", name)
            } else {
                format!("Field '{}' was added without default (breaking)", name)
            },
        });
    }
}

fn detect_json_schema_changes(old: &Value, new: &Value, path: &str, changes: &mut Vec<SchemaChange>) {
    let prop_path = |name: &str| {
        if path.is_empty() {
            format!("properties.{}", name)
        } else {
            format!("{}.properties.{}", path, name)
        }
    };
    let is_required = |schema: &Value, name: &str| {
        schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().any(|v| v.as_str() == Some(name)))
            .unwrap_or(false)
    };

    if let (Some(old_props), Some(new_props)) = (
        old.get("properties").and_then(|p| p.as_object()),
        new.get("properties").and_then(|p| p.as_object()),
    ) {
        for (name, old_prop) in old_props {
            match new_props.get(name) {
                None => changes.push(SchemaChange {
                    change_type: ChangeType::FieldRemoved,
                    path: prop_path(name.as_str()),
                    old_value: Some(old_prop.to_string()),
                    new_value: None,
                    is_breaking: true,
                    description: format!("Property '{}' was removed", name),
                }),
                Some(new_prop) => {
                    let old_type = old_prop.get("type");
                    let new_type = new_prop.get("type");
                    if old_type != new_type {
                        changes.push(SchemaChange {
                            change_type: ChangeType::TypeChanged,
                            path: format!("{}.type", prop_path(name.as_str())),
                            old_value: old_type.map(|t| t.to_string()),
                            new_value: new_type.map(|t| t.to_string()),
                            is_breaking: true,
                            description: format!("Property '{}' type changed", name),
                        });
                    }
                    if old_type.and_then(|t| t.as_str()) == Some("object") {
                        detect_json_schema_changes(old_prop, new_prop, &prop_path(name.as_str()), changes);
                    }
                }
            }
        }

        for (name, new_prop) in new_props {
            if old_props.contains_key(name) {
                continue;
            }
            let required = is_required(new, name.as_str());
            changes.push(SchemaChange {
                change_type: ChangeType::FieldAdded,
                path: prop_path(name.as_str()),
                old_value: None,
                new_value: Some(new_prop.to_string()),
                is_breaking: required && !is_required(old, name.as_str()),
                description: if required {
                    format!("Required property '{}' was added (breaking)", name)
                } else {
                    format!("Optional property '{}' was added", name)
                },
            });
        }
    }

    let enum_path = if path.is_empty() {
        "enum".to_string()
    } else {
        format!("{}.enum", path)
    };
    detect_enum_changes(old.get("enum"), new.get("enum"), &enum_path, changes);
}

fn detect_enum_changes(old: Option<&Value>, new: Option<&Value>, path: &str, changes: &mut Vec<SchemaChange>) {
    let (Some(old_enum), Some(new_enum)) = (
        old.and_then(|e| e.as_array()),
        new.and_then(|e| e.as_array()),
    ) else {
        return;
    };

    let old_set: BTreeSet<String> = old_enum.iter().map(|v| v.to_string()).collect();
    let new_set: BTreeSet<String> = new_enum.iter().map(|v| v.to_string()).collect();

    for removed in old_set.difference(&new_set) {
        changes.push(SchemaChange {
            change_type: ChangeType::EnumVariantRemoved,
            path: path.to_string(),
            old_value: Some(removed.clone()),
            new_value: None,
            is_breaking: true,
            description: format!("Enum variant {} was removed", removed),
        });
    }
    for added in new_set.difference(&old_set) {
        changes.push(SchemaChange {
            change_type: ChangeType::EnumVariantAdded,
            path: path.to_string(),
            old_value: None,
            new_value: Some(added.clone()),
            is_breaking: false,
            description: format!("Enum variant {} was added", added),
        });
    }
}

fn detect_text_changes(old: &Value, new: &Value, changes: &mut Vec<SchemaChange>) {
    let as_text = |value: &Value| match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    };
    let old_text = as_text(old);
    let new_text = as_text(new);

    let diff = TextDiff::from_lines(&old_text, &new_text);
    for change in diff.iter_all_changes() {
        let line = change.value().trim_end().to_string();
        match change.tag() {
            ChangeTag::Delete => changes.push(SchemaChange {
                change_type: ChangeType::TextChanged,
                path: "content".to_string(),
                old_value: Some(line),
                new_value: None,
                is_breaking: false,
                description: "Line removed".to_string(),
            }),
            ChangeTag::Insert => changes.push(SchemaChange {
                change_type: ChangeType::TextChanged,
                path: "content".to_string(),
                old_value: None,
                new_value: Some(line),
                is_breaking: false,
                description: "Line added".to_string(),
            }),
            ChangeTag::Equal => {}
        }
    }
}
