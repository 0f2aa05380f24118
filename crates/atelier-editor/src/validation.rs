//! Pre-submit checks of a record against its schema.

use atelier_core::{ContentRecord, FieldError, FieldKind, FieldValue, MediaVariant, PageSchema};

/// Check `record` against the `required` and `max_items` constraints of
/// `schema`. Returns one error per offending field, in schema order.
///
/// Numbers and booleans always satisfy `required`. A required dual field
/// only needs its desktop half; the mobile half falls back at display time.
pub fn validate(schema: &PageSchema, record: &ContentRecord) -> Vec<FieldError> {
    let mut errors = Vec::new();

    for field in schema.fields() {
        let (key, kind) = match (field.kind.half(), field.kind.variant_key(MediaVariant::Desktop)) {
            (Some(half), Some(desktop_key)) => (desktop_key, half),
            _ => (field.key.as_str(), field.kind.clone()),
        };
        let value = FieldValue::coerce(&kind, record.get(key));

        if field.required && requires_content(&kind) && value.is_empty() {
            errors.push(FieldError::new(
                key,
                &field.label,
                format!("{} is required", field.label),
            ));
            continue;
        }

        if let Some(max) = field.max_items {
            for key in field.record_keys() {
                let len = FieldValue::coerce(&kind, record.get(key)).len().unwrap_or(0);
                if len > max {
                    errors.push(FieldError::new(
                        key,
                        &field.label,
                        format!("{} allows at most {} items (has {})", field.label, max, len),
                    ));
                }
            }
        }
    }

    errors
}

fn requires_content(kind: &FieldKind) -> bool {
    match kind {
        FieldKind::Number | FieldKind::Boolean | FieldKind::NestedGroup { .. } => false,
        FieldKind::Text
        | FieldKind::Textarea
        | FieldKind::Image
        | FieldKind::ImageArray
        | FieldKind::DualImage { .. }
        | FieldKind::DualImageArray { .. }
        | FieldKind::StructArray { .. }
        | FieldKind::RelatedEntities { .. } => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::{FieldSchema, SectionSchema, StructShape};
    use serde_json::json;

    fn schema() -> PageSchema {
        PageSchema::new("works", "Works").section(
            SectionSchema::new("main", "Main")
                .field(FieldSchema::new("title", "Title", FieldKind::Text).required())
                .field(FieldSchema::new("year", "Year", FieldKind::Number).required())
                .field(FieldSchema::new("featured", "Featured", FieldKind::Boolean).required())
                .field(
                    FieldSchema::new(
                        "cover",
                        "Cover",
                        FieldKind::DualImage {
                            desktop_key: "cover_desktop".into(),
                            mobile_key: "cover_mobile".into(),
                        },
                    )
                    .required(),
                )
                .field(
                    FieldSchema::new(
                        "metrics",
                        "Metrics",
                        FieldKind::StructArray {
                            shape: StructShape::Metrics,
                        },
                    )
                    .with_max_items(2),
                ),
        )
    }

    #[test]
    fn test_empty_record_reports_required_text_and_media() {
        let errors = validate(&schema(), &ContentRecord::new());
        let keys: Vec<&str> = errors.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["title", "cover_desktop"]);
    }

    #[test]
    fn test_whitespace_text_counts_as_empty() {
        let record = ContentRecord::new()
            .with("title", json!("   "))
            .with("cover_desktop", json!("https://cdn/c.png"));
        let errors = validate(&schema(), &record);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].label, "Title");
    }

    #[test]
    fn test_mobile_half_is_optional() {
        let record = ContentRecord::new()
            .with("title", json!("Acme"))
            .with("cover_desktop", json!("https://cdn/c.png"));
        assert!(validate(&schema(), &record).is_empty());
    }

    #[test]
    fn test_max_items_exceeded() {
        let record = ContentRecord::new()
            .with("title", json!("Acme"))
            .with("cover_desktop", json!("https://cdn/c.png"))
            .with(
                "metrics",
                json!([{"value": "1", "label": "a"}, {"value": "2", "label": "b"}, {"value": "3", "label": "c"}]),
            );
        let errors = validate(&schema(), &record);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].key, "metrics");
        assert!(errors[0].message.contains("at most 2"));
    }
}
