//! Schema catalog: the built-in document schemas plus any loaded from YAML.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fields::{FieldKind, StructShape};
use crate::schema::{FieldSchema, PageSchema, SectionSchema};
use crate::traits::SchemaRegistry;

/// Document type of portfolio entries.
pub const WORKS: &str = "works";
/// Document type of long-form case studies.
pub const CASE_STUDIES: &str = "case-studies";
/// Document type of editable home/landing page sections.
pub const PAGE_SECTIONS: &str = "page-sections";

/// In-memory [`SchemaRegistry`]. Every schema passes [`PageSchema::check`]
/// before it is registered.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: BTreeMap<String, Arc<PageSchema>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the works, case-studies and page-sections schemas.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for schema in [works_schema(), case_studies_schema(), page_sections_schema()] {
            // Built-in schemas are covered by tests; a failure here is a bug.
            if let Err(e) = catalog.register(schema) {
                warn!(error = %e, "Skipping invalid built-in schema");
            }
        }
        catalog
    }

    /// Register a schema, replacing any schema with the same name.
    pub fn register(&mut self, schema: PageSchema) -> Result<()> {
        schema.check()?;
        if self.schemas.contains_key(&schema.name) {
            info!(doc_type = %schema.name, "Replacing registered schema");
        }
        debug!(doc_type = %schema.name, fields = schema.fields().count(), "Registered schema");
        self.schemas.insert(schema.name.clone(), Arc::new(schema));
        Ok(())
    }

    /// Parse one schema or a list of schemas from YAML and register them.
    /// Returns the registered names.
    pub fn register_yaml(&mut self, source: &str) -> Result<Vec<String>> {
        let value: serde_yaml::Value = serde_yaml::from_str(source)?;
        let schemas: Vec<PageSchema> = if value.is_sequence() {
            serde_yaml::from_value(value)?
        } else {
            vec![serde_yaml::from_value(value)?]
        };
        let mut names = Vec::with_capacity(schemas.len());
        for schema in schemas {
            names.push(schema.name.clone());
            self.register(schema)?;
        }
        Ok(names)
    }

    /// Catalog holding only the schemas in `source`.
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let mut catalog = Self::new();
        catalog.register_yaml(source)?;
        Ok(catalog)
    }

    /// Register the schemas of a YAML file.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let names = self.register_yaml(&source)?;
        info!(path = %path.display(), count = names.len(), "Loaded schema file");
        Ok(names)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaRegistry for SchemaCatalog {
    fn get_schema(&self, doc_type: &str) -> Result<Arc<PageSchema>> {
        self.schemas
            .get(doc_type)
            .cloned()
            .ok_or_else(|| Error::SchemaNotFound(doc_type.to_string()))
    }

    fn document_types(&self) -> Vec<String> {
        self.schemas.keys().cloned().collect()
    }
}

fn dual_image(desktop: &str, mobile: &str) -> FieldKind {
    FieldKind::DualImage {
        desktop_key: desktop.to_string(),
        mobile_key: mobile.to_string(),
    }
}

fn typography() -> FieldKind {
    FieldKind::NestedGroup {
        fields: vec![
            "heading_font".to_string(),
            "body_font".to_string(),
            "accent_font".to_string(),
        ],
    }
}

fn works_schema() -> PageSchema {
    PageSchema::new(WORKS, "Works")
        .section(
            SectionSchema::new("overview", "Overview")
                .describe("How the project appears in listings.")
                .field(FieldSchema::new("title", "Title", FieldKind::Text).required())
                .field(
                    FieldSchema::new("slug", "Slug", FieldKind::Text)
                        .required()
                        .with_hint("Lowercase, dashes only; used in the URL."),
                )
                .field(FieldSchema::new("client", "Client", FieldKind::Text))
                .field(FieldSchema::new("year", "Year", FieldKind::Number))
                .field(FieldSchema::new("category", "Category", FieldKind::Text))
                .field(FieldSchema::new("summary", "Summary", FieldKind::Textarea))
                .field(FieldSchema::new("featured", "Featured on home", FieldKind::Boolean)),
        )
        .section(
            SectionSchema::new("media", "Media")
                .field(
                    FieldSchema::new("cover", "Cover image", dual_image("cover_desktop", "cover_mobile"))
                        .required()
                        .with_hint("Mobile falls back to desktop when left empty."),
                )
                .field(
                    FieldSchema::new(
                        "gallery",
                        "Gallery",
                        FieldKind::DualImageArray {
                            desktop_key: "gallery_desktop".to_string(),
                            mobile_key: "gallery_mobile".to_string(),
                        },
                    )
                    .with_max_items(12),
                ),
        )
        .section(
            SectionSchema::new("story", "Story")
                .field(
                    FieldSchema::new(
                        "process_steps",
                        "Process",
                        FieldKind::StructArray {
                            shape: StructShape::ProcessSteps,
                        },
                    )
                    .with_max_items(6),
                )
                .field(
                    FieldSchema::new(
                        "metrics",
                        "Results",
                        FieldKind::StructArray {
                            shape: StructShape::Metrics,
                        },
                    )
                    .with_max_items(4),
                )
                .field(FieldSchema::new(
                    "color_palette",
                    "Color palette",
                    FieldKind::StructArray {
                        shape: StructShape::ColorPalette,
                    },
                ))
                .field(FieldSchema::new("typography", "Typography", typography())),
        )
        .section(
            SectionSchema::new("related", "Related").field(
                FieldSchema::new(
                    "related_works",
                    "Related works",
                    FieldKind::RelatedEntities {
                        collection: WORKS.to_string(),
                    },
                )
                .with_max_items(3),
            ),
        )
}

fn case_studies_schema() -> PageSchema {
    PageSchema::new(CASE_STUDIES, "Case studies")
        .section(
            SectionSchema::new("intro", "Introduction")
                .field(FieldSchema::new("title", "Title", FieldKind::Text).required())
                .field(FieldSchema::new("subtitle", "Subtitle", FieldKind::Text))
                .field(FieldSchema::new("client", "Client", FieldKind::Text).required())
                .field(FieldSchema::new("hero", "Hero", dual_image("hero_desktop", "hero_mobile"))),
        )
        .section(
            SectionSchema::new("body", "Body")
                .field(FieldSchema::new("challenge", "Challenge", FieldKind::Textarea))
                .field(FieldSchema::new("solution", "Solution", FieldKind::Textarea))
                .field(
                    FieldSchema::new("images", "Images", FieldKind::ImageArray).with_max_items(10),
                )
                .field(FieldSchema::new(
                    "opportunities",
                    "Opportunities",
                    FieldKind::StructArray {
                        shape: StructShape::Opportunities,
                    },
                ))
                .field(
                    FieldSchema::new(
                        "metrics",
                        "Metrics",
                        FieldKind::StructArray {
                            shape: StructShape::Metrics,
                        },
                    )
                    .with_max_items(4),
                ),
        )
        .section(
            SectionSchema::new("related", "Related")
                .field(FieldSchema::new(
                    "related_works",
                    "Related works",
                    FieldKind::RelatedEntities {
                        collection: WORKS.to_string(),
                    },
                ))
                .field(FieldSchema::new(
                    "related_case_studies",
                    "Related case studies",
                    FieldKind::RelatedEntities {
                        collection: CASE_STUDIES.to_string(),
                    },
                )),
        )
}

fn page_sections_schema() -> PageSchema {
    PageSchema::new(PAGE_SECTIONS, "Page sections")
        .section(
            SectionSchema::new("content", "Content")
                .field(FieldSchema::new("heading", "Heading", FieldKind::Text).required())
                .field(FieldSchema::new("subheading", "Subheading", FieldKind::Textarea))
                .field(FieldSchema::new("cta_label", "Button label", FieldKind::Text))
                .field(FieldSchema::new("cta_url", "Button link", FieldKind::Text))
                .field(FieldSchema::new("published", "Published", FieldKind::Boolean)),
        )
        .section(
            SectionSchema::new("visuals", "Visuals")
                .field(FieldSchema::new(
                    "background",
                    "Background",
                    dual_image("background_desktop", "background_mobile"),
                ))
                .field(FieldSchema::new("logos", "Client logos", FieldKind::ImageArray))
                .field(FieldSchema::new("typography", "Typography", typography())),
        )
        .section(
            SectionSchema::new("showcase", "Showcase").field(
                FieldSchema::new(
                    "showcased_works",
                    "Showcased works",
                    FieldKind::RelatedEntities {
                        collection: WORKS.to_string(),
                    },
                )
                .with_max_items(6),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_has_three_valid_schemas() {
        let catalog = SchemaCatalog::builtin();
        assert_eq!(
            catalog.document_types(),
            vec![CASE_STUDIES.to_string(), PAGE_SECTIONS.to_string(), WORKS.to_string()]
        );
        for name in catalog.document_types() {
            catalog.get_schema(&name).unwrap().check().unwrap();
        }
    }

    #[test]
    fn test_unknown_schema() {
        let catalog = SchemaCatalog::builtin();
        assert!(matches!(
            catalog.get_schema("blog"),
            Err(Error::SchemaNotFound(name)) if name == "blog"
        ));
    }

    #[test]
    fn test_works_schema_shape() {
        let schema = SchemaCatalog::builtin().get_schema(WORKS).unwrap();
        assert_eq!(schema.related_collections(), vec![WORKS]);
        let cover = schema.field("cover").unwrap();
        assert!(cover.required);
        assert_eq!(cover.record_keys(), vec!["cover_desktop", "cover_mobile"]);
    }

    const YAML: &str = r#"
- name: team
  label: Team
  sections:
    - id: people
      label: People
      fields:
        - key: name
          type: text
          label: Name
          required: true
        - key: portrait
          type: dualImage
          desktopKey: portrait_desktop
          mobileKey: portrait_mobile
          label: Portrait
        - key: values
          type: structArray
          shape: metrics
          label: Values
          maxItems: 3
"#;

    #[test]
    fn test_from_yaml_str() {
        let catalog = SchemaCatalog::from_yaml_str(YAML).unwrap();
        let schema = catalog.get_schema("team").unwrap();
        assert_eq!(schema.fields().count(), 3);
        assert_eq!(schema.field("values").unwrap().max_items, Some(3));
        assert!(schema.locate("portrait_mobile").is_some());
    }

    #[test]
    fn test_yaml_single_schema_and_duplicate_keys() {
        let bad = r#"
name: broken
sections:
  - id: s
    label: S
    fields:
      - { key: title, type: text, label: Title }
      - { key: title, type: textarea, label: Body }
"#;
        let err = SchemaCatalog::from_yaml_str(bad).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn test_load_file_overrides_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name: works\nlabel: Works (custom)\nsections:\n  - id: s\n    label: S\n    fields:\n      - {{ key: title, type: text, label: Title }}"
        )
        .unwrap();

        let mut catalog = SchemaCatalog::builtin();
        let names = catalog.load_file(file.path()).unwrap();
        assert_eq!(names, vec!["works".to_string()]);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get_schema(WORKS).unwrap().label, "Works (custom)");
    }
}
