//! Read side of the form engine: typed values and renderable field views.

use serde::Serialize;

use atelier_core::{
    ContentRecord, ControlKind, FieldSchema, FieldValue, MediaVariant, PageSchema, SectionSchema,
};

/// Typed value stored under `record_key`, or its kind's default.
///
/// Dual halves are addressed by their own record keys and resolve
/// independently. Returns `None` only for keys the schema does not declare.
pub fn resolve_value(schema: &PageSchema, record: &ContentRecord, record_key: &str) -> Option<FieldValue> {
    let slot = schema.locate(record_key)?;
    let kind = slot.field.kind_at(record_key)?;
    Some(FieldValue::coerce(&kind, record.get(record_key)))
}

/// Value shown by one control.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ViewValue {
    Single(FieldValue),
    Dual { desktop: FieldValue, mobile: FieldValue },
}

/// One field as a renderer sees it.
#[derive(Debug, Clone, Serialize)]
pub struct FieldView<'a> {
    #[serde(serialize_with = "section_id")]
    pub section: &'a SectionSchema,
    pub field: &'a FieldSchema,
    pub control: ControlKind,
    pub value: ViewValue,
}

fn section_id<S: serde::Serializer>(section: &&SectionSchema, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&section.id)
}

/// Every field of `schema` in section order, with its current value.
pub fn field_views<'a>(schema: &'a PageSchema, record: &ContentRecord) -> Vec<FieldView<'a>> {
    let mut views = Vec::new();
    for section in &schema.sections {
        for field in &section.fields {
            let value = match (
                field.kind.half(),
                field.kind.variant_key(MediaVariant::Desktop),
                field.kind.variant_key(MediaVariant::Mobile),
            ) {
                (Some(half), Some(desktop), Some(mobile)) => ViewValue::Dual {
                    desktop: FieldValue::coerce(&half, record.get(desktop)),
                    mobile: FieldValue::coerce(&half, record.get(mobile)),
                },
                _ => ViewValue::Single(FieldValue::coerce(&field.kind, record.get(&field.key))),
            };
            views.push(FieldView {
                section,
                field,
                control: field.kind.control(),
                value,
            });
        }
    }
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::SchemaCatalog;
    use atelier_core::SchemaRegistry;
    use serde_json::json;

    #[test]
    fn test_resolve_value_defaults() {
        let catalog = SchemaCatalog::builtin();
        let schema = catalog.get_schema("works").unwrap();
        let record = ContentRecord::new();
        assert_eq!(
            resolve_value(&schema, &record, "title"),
            Some(FieldValue::Text(String::new()))
        );
        assert_eq!(
            resolve_value(&schema, &record, "gallery_mobile"),
            Some(FieldValue::List(vec![]))
        );
        assert_eq!(resolve_value(&schema, &record, "missing_key"), None);
    }

    #[test]
    fn test_dual_halves_resolve_without_fallback() {
        let catalog = SchemaCatalog::builtin();
        let schema = catalog.get_schema("works").unwrap();
        let record = ContentRecord::new().with("cover_desktop", json!("https://cdn/d.png"));
        assert_eq!(
            resolve_value(&schema, &record, "cover_mobile"),
            Some(FieldValue::Text(String::new()))
        );
    }

    #[test]
    fn test_field_views_are_deterministic() {
        let catalog = SchemaCatalog::builtin();
        let schema = catalog.get_schema("works").unwrap();
        let record = ContentRecord::new().with("title", json!("Acme"));
        let first: Vec<(String, String)> = field_views(&schema, &record)
            .iter()
            .map(|v| (v.section.id.clone(), v.field.key.clone()))
            .collect();
        let second: Vec<(String, String)> = field_views(&schema, &record)
            .iter()
            .map(|v| (v.section.id.clone(), v.field.key.clone()))
            .collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), schema.fields().count());
        assert_eq!(first[0].1, "title");

        let views = field_views(&schema, &record);
        let cover = views.iter().find(|v| v.field.key == "cover").unwrap();
        assert_eq!(cover.control, ControlKind::DualImage);
        assert!(matches!(cover.value, ViewValue::Dual { .. }));
    }
}
