//! Input sanitization for query key fields
//!
//! The set of valid decades/regions/art forms is owned by the caller; the
//! service only enforces shape: trimmed, length-capped, no control characters.

use crate::{Error, Result};

/// Maximum lengths for the query key fields
pub const MAX_DECADE_LENGTH: usize = 10;
pub const MAX_REGION_LENGTH: usize = 100;
pub const MAX_ART_FORM_LENGTH: usize = 100;

/// Sanitize a single input value: trim, cap length, strip control characters.
///
/// International characters pass through untouched; only Unicode control
/// characters (including C1 controls) are removed.
pub fn sanitize_input(value: &str, max_length: usize) -> String {
    let cleaned: String = value.chars().filter(|c| !c.is_control()).collect();
    let capped: String = cleaned.trim().chars().take(max_length).collect();
    // The cap can land on an inner space; re-trim so the result is stable
    capped.trim_end().to_string()
}

/// Sanitize and validate the three query key fields.
///
/// Returns the sanitized values, or `InvalidInput` if any field is empty
/// after sanitization.
pub fn validate_query(decade: &str, region: &str, art_form: &str) -> Result<(String, String, String)> {
    let decade = sanitize_input(decade, MAX_DECADE_LENGTH);
    let region = sanitize_input(region, MAX_REGION_LENGTH);
    let art_form = sanitize_input(art_form, MAX_ART_FORM_LENGTH);

    if decade.is_empty() {
        return Err(Error::InvalidInput("Decade is required".to_string()));
    }
    if region.is_empty() {
        return Err(Error::InvalidInput("Region is required".to_string()));
    }
    if art_form.is_empty() {
        return Err(Error::InvalidInput("Art form is required".to_string()));
    }

    Ok((decade, region, art_form))
}
