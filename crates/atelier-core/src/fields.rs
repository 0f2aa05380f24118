//! Field Type Registry.
//!
//! The closed set of field kinds an editor schema can use, with each kind's
//! default value and the operations it accepts. Every dispatch over kinds in
//! the workspace is an exhaustive `match` on [`FieldKind`], so adding a kind
//! is a compile-checked change.
//!
//! | Kind | Default | Operations |
//! |------|---------|------------|
//! | text / textarea / number / boolean | `""` / `""` / `0` / `false` | set |
//! | image | `""` | set, beginUpload |
//! | imageArray | `[]` | append, removeAt, setAt, beginUploadAt |
//! | dualImage | two image halves | per half as image |
//! | dualImageArray | two imageArray halves | per half as imageArray |
//! | structArray | `[]` | append, removeAt, updateField |
//! | relatedEntities | `[]` | toggle |
//! | nestedGroup | `{}` | setField |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One element of a struct array: a small fixed mapping of member names.
pub type StructItem = Map<String, Value>;

/// Which half of a dual-media field is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaVariant {
    Desktop,
    Mobile,
}

impl std::fmt::Display for MediaVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Desktop => write!(f, "desktop"),
            Self::Mobile => write!(f, "mobile"),
        }
    }
}

impl std::str::FromStr for MediaVariant {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "mobile" => Ok(Self::Mobile),
            _ => Err(format!("Invalid media variant: {}", s)),
        }
    }
}

/// Fixed member layout of a struct array element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StructShape {
    /// `{number, title}`
    ProcessSteps,
    /// `{title, description}`
    Opportunities,
    /// `{value, label}`
    Metrics,
    /// `{color, name}`
    ColorPalette,
}

impl StructShape {
    /// Member names, in display order.
    pub fn members(&self) -> &'static [&'static str] {
        match self {
            Self::ProcessSteps => &["number", "title"],
            Self::Opportunities => &["title", "description"],
            Self::Metrics => &["value", "label"],
            Self::ColorPalette => &["color", "name"],
        }
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.members().contains(&name)
    }

    /// The element appended by `append()`: every member set to `""`.
    pub fn default_item(&self) -> StructItem {
        self.members()
            .iter()
            .map(|m| (m.to_string(), Value::String(String::new())))
            .collect()
    }
}

/// Mutation operations, as named by the registry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Set,
    BeginUpload,
    Append,
    RemoveAt,
    SetAt,
    BeginUploadAt,
    UpdateField,
    Toggle,
    SetField,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Set => "set",
            Self::BeginUpload => "beginUpload",
            Self::Append => "append",
            Self::RemoveAt => "removeAt",
            Self::SetAt => "setAt",
            Self::BeginUploadAt => "beginUploadAt",
            Self::UpdateField => "updateField",
            Self::Toggle => "toggle",
            Self::SetField => "setField",
        };
        f.write_str(name)
    }
}

const SCALAR_OPS: &[Operation] = &[Operation::Set];
const IMAGE_OPS: &[Operation] = &[Operation::Set, Operation::BeginUpload];
const IMAGE_ARRAY_OPS: &[Operation] = &[
    Operation::Append,
    Operation::RemoveAt,
    Operation::SetAt,
    Operation::BeginUploadAt,
];
const STRUCT_ARRAY_OPS: &[Operation] = &[
    Operation::Append,
    Operation::RemoveAt,
    Operation::UpdateField,
];
const RELATED_OPS: &[Operation] = &[Operation::Toggle];
const GROUP_OPS: &[Operation] = &[Operation::SetField];

/// Renderer-facing control tag; one per kind, without the kind's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    Text,
    Textarea,
    Number,
    Boolean,
    Image,
    ImageArray,
    DualImage,
    DualImageArray,
    StructArray,
    RelatedEntities,
    NestedGroup,
}

/// Supported field kinds.
///
/// Dual kinds name their two record keys explicitly; the halves are stored
/// independently and each behaves like the corresponding single kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    Textarea,
    Number,
    Boolean,
    Image,
    ImageArray,
    #[serde(rename_all = "camelCase")]
    DualImage {
        desktop_key: String,
        mobile_key: String,
    },
    #[serde(rename_all = "camelCase")]
    DualImageArray {
        desktop_key: String,
        mobile_key: String,
    },
    StructArray {
        shape: StructShape,
    },
    RelatedEntities {
        collection: String,
    },
    NestedGroup {
        #[serde(default)]
        fields: Vec<String>,
    },
}

impl FieldKind {
    pub fn control(&self) -> ControlKind {
        match self {
            Self::Text => ControlKind::Text,
            Self::Textarea => ControlKind::Textarea,
            Self::Number => ControlKind::Number,
            Self::Boolean => ControlKind::Boolean,
            Self::Image => ControlKind::Image,
            Self::ImageArray => ControlKind::ImageArray,
            Self::DualImage { .. } => ControlKind::DualImage,
            Self::DualImageArray { .. } => ControlKind::DualImageArray,
            Self::StructArray { .. } => ControlKind::StructArray,
            Self::RelatedEntities { .. } => ControlKind::RelatedEntities,
            Self::NestedGroup { .. } => ControlKind::NestedGroup,
        }
    }

    /// The single kind each half of a dual kind behaves as.
    pub fn half(&self) -> Option<FieldKind> {
        match self {
            Self::DualImage { .. } => Some(Self::Image),
            Self::DualImageArray { .. } => Some(Self::ImageArray),
            _ => None,
        }
    }

    pub fn is_dual(&self) -> bool {
        self.half().is_some()
    }

    /// Record key of one half of a dual kind.
    pub fn variant_key(&self, variant: MediaVariant) -> Option<&str> {
        match self {
            Self::DualImage {
                desktop_key,
                mobile_key,
            }
            | Self::DualImageArray {
                desktop_key,
                mobile_key,
            } => Some(match variant {
                MediaVariant::Desktop => desktop_key.as_str(),
                MediaVariant::Mobile => mobile_key.as_str(),
            }),
            _ => None,
        }
    }

    /// Operations the kind accepts. Dual kinds report the operations of a half.
    pub fn operations(&self) -> &'static [Operation] {
        match self {
            Self::Text | Self::Textarea | Self::Number | Self::Boolean => SCALAR_OPS,
            Self::Image | Self::DualImage { .. } => IMAGE_OPS,
            Self::ImageArray | Self::DualImageArray { .. } => IMAGE_ARRAY_OPS,
            Self::StructArray { .. } => STRUCT_ARRAY_OPS,
            Self::RelatedEntities { .. } => RELATED_OPS,
            Self::NestedGroup { .. } => GROUP_OPS,
        }
    }

    pub fn supports(&self, op: Operation) -> bool {
        self.operations().contains(&op)
    }

    /// Whether values of this kind are stored as a JSON array.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Self::ImageArray
                | Self::DualImageArray { .. }
                | Self::StructArray { .. }
                | Self::RelatedEntities { .. }
        )
    }

    /// Default value substituted for an absent record key.
    ///
    /// For dual kinds this is the default of one half, since each half lives
    /// under its own record key.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Text | Self::Textarea | Self::Image | Self::DualImage { .. } => {
                Value::String(String::new())
            }
            Self::Number => Value::from(0),
            Self::Boolean => Value::Bool(false),
            Self::ImageArray
            | Self::DualImageArray { .. }
            | Self::StructArray { .. }
            | Self::RelatedEntities { .. } => Value::Array(Vec::new()),
            Self::NestedGroup { .. } => Value::Object(Map::new()),
        }
    }

    /// Whether `value` already has the JSON shape of this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Text | Self::Textarea | Self::Image | Self::DualImage { .. } => {
                value.is_string()
            }
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::ImageArray | Self::DualImageArray { .. } | Self::RelatedEntities { .. } => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Self::StructArray { .. } => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_object)),
            Self::NestedGroup { .. } => value.is_object(),
        }
    }
}

/// Typed view of a record value, coerced through its field kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    List(Vec<String>),
    Structs(Vec<StructItem>),
    Group(Map<String, Value>),
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

impl FieldValue {
    /// Default typed value for a kind.
    pub fn default_for(kind: &FieldKind) -> Self {
        Self::coerce(kind, None)
    }

    /// Read `raw` as `kind`, substituting the kind's default when the value is
    /// absent or has an incompatible shape. Never fails.
    pub fn coerce(kind: &FieldKind, raw: Option<&Value>) -> Self {
        match kind {
            FieldKind::Text | FieldKind::Textarea | FieldKind::Image | FieldKind::DualImage { .. } => {
                match raw {
                    Some(Value::Array(_)) | Some(Value::Object(_)) | None => {
                        Self::Text(String::new())
                    }
                    Some(v) => Self::Text(value_to_text(v)),
                }
            }
            FieldKind::Number => Self::Number(match raw {
                Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
                _ => 0.0,
            }),
            FieldKind::Boolean => Self::Boolean(match raw {
                Some(Value::Bool(b)) => *b,
                Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
                _ => false,
            }),
            FieldKind::ImageArray
            | FieldKind::DualImageArray { .. }
            | FieldKind::RelatedEntities { .. } => Self::List(match raw {
                Some(Value::Array(items)) => items.iter().map(value_to_text).collect(),
                _ => Vec::new(),
            }),
            FieldKind::StructArray { shape } => Self::Structs(match raw {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => map.clone(),
                        _ => shape.default_item(),
                    })
                    .collect(),
                _ => Vec::new(),
            }),
            FieldKind::NestedGroup { .. } => Self::Group(match raw {
                Some(Value::Object(map)) => map.clone(),
                _ => Map::new(),
            }),
        }
    }

    /// Whether the value counts as "not filled in" for required checks.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) | Self::Boolean(_) => false,
            Self::List(items) => items.is_empty(),
            Self::Structs(items) => items.is_empty(),
            Self::Group(map) => map.is_empty(),
        }
    }

    /// Number of elements for array values.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::List(items) => Some(items.len()),
            Self::Structs(items) => Some(items.len()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_structs(&self) -> Option<&[StructItem]> {
        match self {
            Self::Structs(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            Self::Text(s) => Value::String(s),
            // Whole numbers go back out as integers so untouched counts round-trip.
            Self::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                Value::from(n as i64)
            }
            Self::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or_else(|| Value::from(0)),
            Self::Boolean(b) => Value::Bool(b),
            Self::List(items) => Value::Array(items.into_iter().map(Value::String).collect()),
            Self::Structs(items) => Value::Array(items.into_iter().map(Value::Object).collect()),
            Self::Group(map) => Value::Object(map),
        }
    }
}
