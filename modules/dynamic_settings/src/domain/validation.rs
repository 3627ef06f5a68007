//! Validation rules for setting attributes

use super::coerce;
use crate::contract::{ValueType, MAX_KEY_LENGTH, MAX_VALUE_LENGTH};
use std::collections::BTreeMap;

/// Attribute-level validation errors: attribute name -> messages
pub type AttributeErrors = BTreeMap<&'static str, Vec<String>>;

/// Validate a setting key.
///
/// Keys must be present and at most `MAX_KEY_LENGTH` characters long.
pub fn validate_key(key: &str, errors: &mut AttributeErrors) {
    if key.trim().is_empty() {
        add(errors, "key", "can't be blank".to_string());
    } else if key.chars().count() > MAX_KEY_LENGTH {
        add(
            errors,
            "key",
            format!("is too long (maximum is {} characters)", MAX_KEY_LENGTH),
        );
    }
}

/// Report an unrecognized value type name
pub fn validate_value_type(unrecognized: Option<&str>, errors: &mut AttributeErrors) {
    if unrecognized.is_some() {
        add(errors, "value_type", "is not included in the list".to_string());
    }
}

/// Validate a raw value against its length limit and declared type
pub fn validate_value(raw: Option<&str>, value_type: ValueType, errors: &mut AttributeErrors) {
    if let Some(raw) = raw {
        if raw.chars().count() > MAX_VALUE_LENGTH {
            add(
                errors,
                "value",
                format!("is too long (maximum is {} characters)", MAX_VALUE_LENGTH),
            );
        }
    }

    if let Err(err) = coerce::coerce(raw, value_type) {
        add(errors, "value", err.to_string());
    }
}

/// Flatten attribute errors into full messages ("value must be an integer")
pub fn full_messages(errors: &AttributeErrors) -> Vec<String> {
    errors
        .iter()
        .flat_map(|(attribute, messages)| {
            messages
                .iter()
                .map(move |message| format!("{} {}", attribute, message))
        })
        .collect()
}

fn add(errors: &mut AttributeErrors, attribute: &'static str, message: String) {
    errors.entry(attribute).or_default().push(message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_blank() {
        let mut errors = AttributeErrors::new();
        validate_key("", &mut errors);
        assert_eq!(errors.get("key"), Some(&vec!["can't be blank".to_string()]));
    }

    #[test]
    fn test_validate_key_too_long() {
        let mut errors = AttributeErrors::new();
        validate_key(&"k".repeat(MAX_KEY_LENGTH), &mut errors);
        assert!(errors.is_empty());

        validate_key(&"k".repeat(200), &mut errors);
        assert_eq!(errors["key"].len(), 1);
    }

    #[test]
    fn test_validate_value_type_mismatch() {
        let mut errors = AttributeErrors::new();
        validate_value(Some("abc"), ValueType::Integer, &mut errors);
        validate_value(Some("abc"), ValueType::Float, &mut errors);
        validate_value(Some("abc"), ValueType::Datetime, &mut errors);
        assert_eq!(
            full_messages(&errors),
            vec![
                "value must be an integer",
                "value must be a number",
                "value is not a valid datetime"
            ]
        );
    }

    #[test]
    fn test_validate_value_length() {
        let mut errors = AttributeErrors::new();
        validate_value(Some(&"x".repeat(MAX_VALUE_LENGTH + 1)), ValueType::String, &mut errors);
        assert_eq!(errors["value"].len(), 1);
    }
}
