//! Presentation-time projections of dual-media values.
//!
//! The editor stores desktop and mobile halves independently and never
//! substitutes one for the other. Public pages use these functions to pick
//! what to show on a device, with the mobile half falling back to desktop.

use serde::{Deserialize, Serialize};

use crate::fields::{FieldValue, MediaVariant};
use crate::models::ContentRecord;
use crate::schema::FieldSchema;

/// Device class a page is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Desktop,
    Mobile,
}

impl From<Device> for MediaVariant {
    fn from(device: Device) -> Self {
        match device {
            Device::Desktop => MediaVariant::Desktop,
            Device::Mobile => MediaVariant::Mobile,
        }
    }
}

/// Pick the image URL to show: mobile falls back to desktop when empty.
pub fn pick_media<'a>(desktop: &'a str, mobile: &'a str, device: Device) -> Option<&'a str> {
    let desktop = Some(desktop).filter(|s| !s.trim().is_empty());
    let mobile = Some(mobile).filter(|s| !s.trim().is_empty());
    match device {
        Device::Desktop => desktop,
        Device::Mobile => mobile.or(desktop),
    }
}

/// Pick the image list to show: an empty mobile list falls back to desktop.
pub fn pick_media_list<'a>(desktop: &'a [String], mobile: &'a [String], device: Device) -> &'a [String] {
    match device {
        Device::Desktop => desktop,
        Device::Mobile if mobile.is_empty() => desktop,
        Device::Mobile => mobile,
    }
}

/// Project a dual-media field of `record` for `device`.
///
/// Returns `None` for fields that are not dual kinds.
pub fn project_dual(field: &FieldSchema, record: &ContentRecord, device: Device) -> Option<FieldValue> {
    let half = field.kind.half()?;
    let desktop_key = field.kind.variant_key(MediaVariant::Desktop)?;
    let mobile_key = field.kind.variant_key(MediaVariant::Mobile)?;
    let desktop = FieldValue::coerce(&half, record.get(desktop_key));
    let mobile = FieldValue::coerce(&half, record.get(mobile_key));

    Some(match (desktop, mobile) {
        (FieldValue::Text(d), FieldValue::Text(m)) => {
            FieldValue::Text(pick_media(&d, &m, device).unwrap_or_default().to_string())
        }
        (FieldValue::List(d), FieldValue::List(m)) => {
            FieldValue::List(pick_media_list(&d, &m, device).to_vec())
        }
        (d, m) => match device {
            Device::Desktop => d,
            Device::Mobile => m,
        },
    })
}
