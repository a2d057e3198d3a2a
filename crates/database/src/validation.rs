//! Input validation for operator, settings, and rule fields.

use std::fmt;

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid username format.
    InvalidUsername(String),
    /// Numeric value outside its allowed range.
    OutOfRange { field: String, min: String, max: String },
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Empty value where one is required.
    Empty(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidUsername(msg) => write!(f, "Invalid username: {}", msg),
            ValidationError::OutOfRange { field, min, max } => {
                write!(f, "{} must be between {} and {}", field, min, max)
            }
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for operator usernames.
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Maximum allowed length for operator display names.
pub const MAX_DISPLAY_NAME_LENGTH: usize = 128;

/// Maximum operator weight.
pub const MAX_WEIGHT: i64 = 100;

/// Maximum allowed length for a learned rule.
pub const MAX_RULE_LENGTH: usize = 1000;

/// Maximum number of prior messages included as reply context.
pub const MAX_HISTORY_DEPTH: i64 = 100;

/// Maximum output tokens per generation.
pub const MAX_OUTPUT_TOKENS: i64 = 8192;

/// Validate an operator username.
///
/// Usernames are lowercase ASCII letters, digits, `.`, `_` or `-`.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::Empty("username".to_string()));
    }

    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: MAX_USERNAME_LENGTH,
            actual: username.len(),
        });
    }

    if let Some(c) = username
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')))
    {
        return Err(ValidationError::InvalidUsername(format!(
            "character '{}' is not allowed",
            c
        )));
    }

    Ok(())
}

/// Validate an operator display name.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::Empty("display name".to_string()));
    }
    let len = name.chars().count();
    if len > MAX_DISPLAY_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "display name".to_string(),
            max: MAX_DISPLAY_NAME_LENGTH,
            actual: len,
        });
    }
    Ok(())
}

/// Validate an operator weight.
pub fn validate_weight(weight: i64) -> Result<(), ValidationError> {
    check_range("weight", weight, 1, MAX_WEIGHT)
}

/// Validate a learned rule text.
pub fn validate_rule(rule: &str) -> Result<(), ValidationError> {
    let rule = rule.trim();
    if rule.is_empty() {
        return Err(ValidationError::Empty("rule".to_string()));
    }
    let len = rule.chars().count();
    if len > MAX_RULE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "rule".to_string(),
            max: MAX_RULE_LENGTH,
            actual: len,
        });
    }
    Ok(())
}

/// Validate the numeric generation parameters of the automation settings.
pub fn validate_generation_params(
    max_tokens: i64,
    temperature: f64,
    history_depth: i64,
    voice_speed: f64,
) -> Result<(), ValidationError> {
    check_range("max_tokens", max_tokens, 1, MAX_OUTPUT_TOKENS)?;
    check_range("history_depth", history_depth, 0, MAX_HISTORY_DEPTH)?;
    check_range("temperature", temperature, 0.0, 2.0)?;
    check_range("voice_speed", voice_speed, 0.25, 4.0)?;
    Ok(())
}

fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<(), ValidationError>
where
    T: PartialOrd + fmt::Display,
{
    // NaN fails both comparisons, so test for inclusion rather than exclusion.
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_usernames() {
        assert!(validate_username("maria").is_ok());
        assert!(validate_username("agent_2").is_ok());
        assert!(validate_username("j.perez-1").is_ok());
    }

    #[test]
    fn test_invalid_usernames() {
        assert!(matches!(validate_username(""), Err(ValidationError::Empty(_))));
        assert!(matches!(
            validate_username("Maria"),
            Err(ValidationError::InvalidUsername(_))
        ));
        assert!(matches!(
            validate_username("has space"),
            Err(ValidationError::InvalidUsername(_))
        ));
        let long = "a".repeat(MAX_USERNAME_LENGTH + 1);
        assert!(matches!(
            validate_username(&long),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_weight_bounds() {
        assert!(validate_weight(1).is_ok());
        assert!(validate_weight(MAX_WEIGHT).is_ok());
        assert!(validate_weight(0).is_err());
        assert!(validate_weight(-3).is_err());
        assert!(validate_weight(MAX_WEIGHT + 1).is_err());
    }

    #[test]
    fn test_generation_params() {
        assert!(validate_generation_params(400, 0.7, 10, 1.0).is_ok());
        assert!(validate_generation_params(0, 0.7, 10, 1.0).is_err());
        assert!(validate_generation_params(400, 2.5, 10, 1.0).is_err());
        assert!(validate_generation_params(400, f64::NAN, 10, 1.0).is_err());
        assert!(validate_generation_params(400, 0.7, -1, 1.0).is_err());
        assert!(validate_generation_params(400, 0.7, 10, 5.0).is_err());
    }

    #[test]
    fn test_rule_validation() {
        assert!(validate_rule("Always greet by name").is_ok());
        assert!(validate_rule("   ").is_err());
        assert!(validate_rule(&"x".repeat(MAX_RULE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::OutOfRange {
            field: "weight".to_string(),
            min: "1".to_string(),
            max: "100".to_string(),
        };
        assert_eq!(err.to_string(), "weight must be between 1 and 100");
    }
}
