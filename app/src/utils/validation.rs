// Input validation utilities

use anyhow::Result;
use std::path::Path;

pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];

/// Upper bound for any single-line form field.
pub const MAX_FIELD_CHARS: usize = 200;

/// Upper bound for the free-form notes field.
pub const MAX_NOTES_CHARS: usize = 4000;

/// Validate an image attachment path by extension (case-insensitive).
///
/// The file itself is not opened; attachments may live on removable media that is not mounted
/// while the form is filled in.
pub fn validate_image_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(anyhow::anyhow!("Image path cannot be empty"));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| anyhow::anyhow!("Image '{}' has no file extension", path.display()))?;

    if !SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(anyhow::anyhow!(
            "Image '{}' has unsupported type '.{}' (expected one of: {})",
            path.display(),
            ext,
            SUPPORTED_IMAGE_EXTENSIONS.join(", ")
        ));
    }

    Ok(())
}

/// Validate a single-line text field.
pub fn validate_field_text(label: &str, value: &str, required: bool) -> Result<()> {
    if required && value.trim().is_empty() {
        return Err(anyhow::anyhow!("{} is required", label));
    }

    if value.chars().count() > MAX_FIELD_CHARS {
        return Err(anyhow::anyhow!(
            "{} cannot exceed {} characters",
            label,
            MAX_FIELD_CHARS
        ));
    }

    if value.contains(['\n', '\r']) {
        return Err(anyhow::anyhow!("{} must be a single line", label));
    }

    Ok(())
}

pub fn validate_notes(value: &str) -> Result<()> {
    if value.chars().count() > MAX_NOTES_CHARS {
        return Err(anyhow::anyhow!(
            "Notes cannot exceed {} characters",
            MAX_NOTES_CHARS
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn image_extension_check_is_case_insensitive() {
        assert!(validate_image_path(Path::new("shots/a_heaven.PNG")).is_ok());
        assert!(validate_image_path(Path::new("drop.jpeg")).is_ok());
    }

    #[test]
    fn image_without_or_with_wrong_extension_is_rejected() {
        let err = validate_image_path(Path::new("notes.txt")).unwrap_err();
        assert!(err.to_string().contains("unsupported type '.txt'"), "{}", err);

        assert!(validate_image_path(Path::new("README")).is_err());
        assert!(validate_image_path(&PathBuf::new()).is_err());
    }

    #[test]
    fn required_field_must_not_be_blank() {
        assert!(validate_field_text("Position", "   ", true).is_err());
        assert!(validate_field_text("Drop point", "", false).is_ok());
        assert!(validate_field_text("Position", "B site default", true).is_ok());
    }

    #[test]
    fn field_length_and_newlines_are_bounded() {
        let long = "x".repeat(MAX_FIELD_CHARS + 1);
        assert!(validate_field_text("Position", &long, true).is_err());
        assert!(validate_field_text("Position", "two\nlines", true).is_err());
        assert!(validate_notes(&"n".repeat(MAX_NOTES_CHARS)).is_ok());
        assert!(validate_notes(&"n".repeat(MAX_NOTES_CHARS + 1)).is_err());
    }
}
