use rust_decimal::Decimal;
use thiserror::Error;

pub const DEFAULT_PRIMARY_COLOR: &str = "#3B82F6";
pub const DEFAULT_BACKGROUND_COLOR: &str = "#FFFFFF";

const MAX_SLUG_LEN: usize = 63;

/// Input validation failures for store and catalog fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("field `{0}` is required")]
    Required(&'static str),
    #[error("slug must be 1-63 lowercase letters, digits or dashes, not starting or ending with a dash")]
    InvalidSlug,
    #[error("slug `{0}` is reserved")]
    ReservedSlug(String),
    #[error("color `{0}` must be a #RGB or #RRGGBB hex value")]
    InvalidColor(String),
    #[error("price must be a non-negative number")]
    NegativePrice,
}

/// Returns the trimmed value, or `None` when it is absent or blank.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Like [`non_blank`] but reports which required field was missing.
pub fn required(value: Option<&str>, field: &'static str) -> Result<String, ValidationError> {
    non_blank(value).ok_or(ValidationError::Required(field))
}

/// Validates a store slug so it can be used as a DNS label.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let valid_chars = slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if slug.is_empty()
        || slug.len() > MAX_SLUG_LEN
        || !valid_chars
        || slug.starts_with('-')
        || slug.ends_with('-')
    {
        return Err(ValidationError::InvalidSlug);
    }
    // `www` is never resolved to a tenant.
    if slug == "www" {
        return Err(ValidationError::ReservedSlug(slug.to_string()));
    }
    Ok(())
}

/// Normalizes an optional theme color, falling back to `default`.
pub fn theme_color(value: Option<&str>, default: &str) -> Result<String, ValidationError> {
    let Some(color) = non_blank(value) else {
        return Ok(default.to_string());
    };
    let digits = color.strip_prefix('#').unwrap_or_default();
    let valid = matches!(digits.len(), 3 | 6) && digits.bytes().all(|b| b.is_ascii_hexdigit());
    if !valid {
        return Err(ValidationError::InvalidColor(color));
    }
    Ok(color.to_ascii_uppercase())
}

/// Ensures a product price is non-negative.
pub fn validate_price(price: Decimal) -> Result<Decimal, ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::NegativePrice);
    }
    Ok(price.normalize())
}
