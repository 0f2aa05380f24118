//! Media file checks run before an upload leaves the editor.
//!
//! 1. Presence: a file with no bytes is never uploaded
//! 2. Size limit
//! 3. Executable magic bytes and extension blocklist
//! 4. Content type: magic-byte detection, SVG by extension, media types only

use once_cell::sync::Lazy;
use std::collections::HashSet;

use crate::models::MediaFile;

/// Magic byte signatures for executable files
pub const MAGIC_SIGNATURES: &[(&str, &[u8])] = &[
    ("Windows PE/MZ", &[0x4D, 0x5A]),
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),
    ("Mach-O 32", &[0xFE, 0xED, 0xFA, 0xCE]),
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),
    ("Mach-O Fat / Java Class", &[0xCA, 0xFE, 0xBA, 0xBE]),
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]),
];

/// Blocked file extensions (case-insensitive)
static BLOCKED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "scr", "pif", "com", "msi", "so", "dylib", "jar", "class", "deb", "rpm",
        "apk", "app", "dmg", "pkg", "bat", "cmd", "ps1", "sh", "hta", "lnk",
    ]
    .into_iter()
    .collect()
});

/// Result of media file validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub allowed: bool,
    pub block_reason: Option<String>,
    pub detected_type: Option<String>,
}

impl ValidationResult {
    pub fn allowed(detected: impl Into<String>) -> Self {
        Self {
            allowed: true,
            block_reason: None,
            detected_type: Some(detected.into()),
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            block_reason: Some(reason.into()),
            detected_type: None,
        }
    }
}

fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    Some(ext.to_lowercase())
}

/// Validate a file selected for a media field.
pub fn validate_media_file(file: &MediaFile, max_size_bytes: u64) -> ValidationResult {
    if file.bytes.is_empty() {
        return ValidationResult::blocked(format!("{} is empty", display_name(file)));
    }

    if file.size() > max_size_bytes {
        return ValidationResult::blocked(format!(
            "{} is larger than the {} limit",
            display_name(file),
            format_size(max_size_bytes)
        ));
    }

    if let Some(ext) = extension(&file.filename) {
        if BLOCKED_EXTENSIONS.contains(ext.as_str()) {
            return ValidationResult::blocked(format!("Files of type .{} are not allowed", ext));
        }
    }

    for (name, magic) in MAGIC_SIGNATURES {
        if file.bytes.starts_with(magic) {
            return ValidationResult::blocked(format!("Executable file detected: {}", name));
        }
    }

    let detected = detect_content_type(file);
    if !is_media_type(&detected) {
        return ValidationResult::blocked(format!(
            "{} is not an image or video ({})",
            display_name(file),
            detected
        ));
    }

    ValidationResult::allowed(detected)
}

/// Human-readable size: whole MB from 1 MiB up, then KB, then bytes.
fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB {
        format!("{} MB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{} KB", bytes / KIB)
    } else {
        format!("{} bytes", bytes)
    }
}

fn display_name(file: &MediaFile) -> &str {
    if file.filename.is_empty() {
        "The selected file"
    } else {
        &file.filename
    }
}

/// Detect the content type from magic bytes, then from text-only extensions,
/// then fall back to `application/octet-stream`.
///
/// The claimed type is never trusted for binary media: an image without
/// image magic bytes is not an image.
pub fn detect_content_type(file: &MediaFile) -> String {
    if let Some(kind) = infer::get(&file.bytes) {
        return kind.mime_type().to_string();
    }

    // SVG is XML text and has no magic bytes.
    if extension(&file.filename).as_deref() == Some("svg") {
        return "image/svg+xml".to_string();
    }

    "application/octet-stream".to_string()
}

/// Image and video types accepted by media fields.
pub fn is_media_type(mime: &str) -> bool {
    mime.starts_with("image/") || matches!(mime, "video/mp4" | "video/webm" | "video/quicktime")
}
