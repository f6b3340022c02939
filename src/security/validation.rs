// src/security/validation.rs — Input sanitising for plugin settings forms

use regex::Regex;
use std::sync::LazyLock;

pub const CHANNEL_INPUT_MAX: usize = 50;
pub const GREETING_TEMPLATE_MAX: usize = 2000;

static CHANNEL_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[CG][A-Z0-9]+|#[A-Za-z0-9._-]+)$").expect("invalid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} too long (max {max} characters)")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
    #[error("Invalid channel identifier")]
    InvalidChannel,
}

/// Strip null bytes and surrounding whitespace.
fn clean(value: &str) -> String {
    value.replace('\0', "").trim().to_string()
}

/// Raw channel field from a settings form. Blank input is allowed and means
/// "no channel".
pub fn sanitize_channel_input(value: &str, max_length: usize) -> Result<String, ValidationError> {
    let value = clean(value);
    if value.chars().count() > max_length {
        return Err(ValidationError::TooLong {
            field: "Value",
            max: max_length,
        });
    }
    Ok(value)
}

/// Accepts channel ids (`C…`/`G…`), `#name`, or blank.
pub fn validate_channel_identifier(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || CHANNEL_IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidChannel)
    }
}

pub fn sanitize_greeting_template(
    text: &str,
    max_length: usize,
) -> Result<String, ValidationError> {
    let text = clean(text);
    if text.is_empty() {
        return Err(ValidationError::Empty {
            field: "Greeting template",
        });
    }
    if text.chars().count() > max_length {
        return Err(ValidationError::TooLong {
            field: "Greeting template",
            max: max_length,
        });
    }
    Ok(text)
}
