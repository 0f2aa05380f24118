//! Declarative page and entity schemas.
//!
//! A [`PageSchema`] describes one document type: ordered sections of typed
//! fields. Field keys address the [`ContentRecord`](crate::ContentRecord);
//! dual-media fields address two record keys, one per variant.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fields::{FieldKind, MediaVariant};

/// Static descriptor of one editable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub key: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub required: bool,
}

impl FieldSchema {
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            kind,
            label: label.into(),
            hint: None,
            max_items: None,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Record keys this field occupies: its own key, or both halves for dual kinds.
    pub fn record_keys(&self) -> Vec<&str> {
        match (
            self.kind.variant_key(MediaVariant::Desktop),
            self.kind.variant_key(MediaVariant::Mobile),
        ) {
            (Some(desktop), Some(mobile)) => vec![desktop, mobile],
            _ => vec![self.key.as_str()],
        }
    }

    /// Kind governing the value stored under `record_key`.
    pub fn kind_at(&self, record_key: &str) -> Option<FieldKind> {
        match self.kind.half() {
            Some(half) if self.record_keys().contains(&record_key) => Some(half),
            Some(_) => None,
            None if self.key == record_key => Some(self.kind.clone()),
            None => None,
        }
    }
}

/// Ordered, purely organizational group of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSchema {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl SectionSchema {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }
}

/// A field located by one of its record keys.
#[derive(Debug, Clone, Copy)]
pub struct FieldSlot<'a> {
    pub section: &'a SectionSchema,
    pub field: &'a FieldSchema,
    /// Set when the record key is one half of a dual field.
    pub variant: Option<MediaVariant>,
}

/// Schema of one document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSchema {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sections: Vec<SectionSchema>,
}

impl PageSchema {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            sections: Vec::new(),
        }
    }

    pub fn section(mut self, section: SectionSchema) -> Self {
        self.sections.push(section);
        self
    }

    /// All fields in section order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    /// Field by its schema key.
    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.fields().find(|f| f.key == key)
    }

    /// Locate the field owning a record key (including dual halves).
    pub fn locate(&self, record_key: &str) -> Option<FieldSlot<'_>> {
        for section in &self.sections {
            for field in &section.fields {
                if field.key == record_key && !field.kind.is_dual() {
                    return Some(FieldSlot {
                        section,
                        field,
                        variant: None,
                    });
                }
                for variant in [MediaVariant::Desktop, MediaVariant::Mobile] {
                    if field.kind.variant_key(variant) == Some(record_key) {
                        return Some(FieldSlot {
                            section,
                            field,
                            variant: Some(variant),
                        });
                    }
                }
            }
        }
        None
    }

    /// Every record key the schema addresses, in section order.
    pub fn record_keys(&self) -> Vec<&str> {
        self.fields().flat_map(|f| f.record_keys()).collect()
    }

    /// Collections referenced by related-entity fields, deduplicated.
    pub fn related_collections(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.fields()
            .filter_map(|f| match &f.kind {
                FieldKind::RelatedEntities { collection } => Some(collection.as_str()),
                _ => None,
            })
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Structural checks: non-empty keys, unique field and record keys,
    /// distinct dual halves, `max_items` only on array kinds.
    ///
    /// Duplicate keys would silently alias two controls onto one value, so
    /// registries run this before accepting a schema.
    pub fn check(&self) -> Result<()> {
        let mut field_keys = HashSet::new();
        let mut record_keys = HashSet::new();
        for field in self.fields() {
            if field.key.trim().is_empty() {
                return Err(Error::InvalidSchema(format!(
                    "{}: field with empty key",
                    self.name
                )));
            }
            if !field_keys.insert(field.key.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "{}: duplicate field key '{}'",
                    self.name, field.key
                )));
            }
            if field.max_items.is_some() && !field.kind.is_array() {
                return Err(Error::InvalidSchema(format!(
                    "{}: maxItems on non-array field '{}'",
                    self.name, field.key
                )));
            }
            for key in field.record_keys() {
                if key.trim().is_empty() || !record_keys.insert(key) {
                    return Err(Error::InvalidSchema(format!(
                        "{}: record key '{}' of field '{}' is empty or already used",
                        self.name, key, field.key
                    )));
                }
            }
        }
        Ok(())
    }
}
