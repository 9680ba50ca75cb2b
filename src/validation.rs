//! Input validation for the queue engine
//!
//! Request-boundary checks: definition names, policy bounds, claim and lease
//! arguments, and JSONB payload limits. Validators either return a
//! [`QueueError`] directly or record into a [`ValidationErrors`] list so a
//! caller sees every rejected field at once.

use serde_json::Value;

use crate::constants::fields;
use crate::error::{QueueError, QueueResult, ValidationErrors};
use crate::models::DefinitionPolicy;

/// Maximum allowed size for JSONB payloads (1MB)
const MAX_JSON_SIZE_BYTES: usize = 1024 * 1024;

/// Maximum nesting depth for JSON objects/arrays
const MAX_JSON_DEPTH: usize = 10;

/// Maximum number of keys in a JSON object
const MAX_JSON_KEYS: usize = 1000;

/// Check a payload against the size and structure limits.
pub fn check_payload(value: &Value) -> Result<(), String> {
    let serialized =
        serde_json::to_string(value).map_err(|e| format!("Invalid JSON structure: {e}"))?;

    if serialized.len() > MAX_JSON_SIZE_BYTES {
        return Err(format!(
            "JSON payload too large: {} bytes (max: {})",
            serialized.len(),
            MAX_JSON_SIZE_BYTES
        ));
    }

    check_json_depth(value, 0)
}

fn check_json_depth(value: &Value, current_depth: usize) -> Result<(), String> {
    if current_depth > MAX_JSON_DEPTH {
        return Err(format!(
            "JSON nesting too deep: {current_depth} (max: {MAX_JSON_DEPTH})"
        ));
    }

    match value {
        Value::Object(map) => {
            if map.len() > MAX_JSON_KEYS {
                return Err(format!(
                    "Too many JSON keys: {} (max: {})",
                    map.len(),
                    MAX_JSON_KEYS
                ));
            }
            for val in map.values() {
                check_json_depth(val, current_depth + 1)?;
            }
        }
        Value::Array(arr) => {
            if arr.len() > MAX_JSON_KEYS {
                return Err(format!(
                    "JSON array too large: {} items (max: {})",
                    arr.len(),
                    MAX_JSON_KEYS
                ));
            }
            for item in arr {
                check_json_depth(item, current_depth + 1)?;
            }
        }
        _ => {}
    }

    Ok(())
}

/// Validates a task payload
pub fn validate_payload(value: &Value) -> QueueResult<()> {
    check_payload(value).map_err(|message| {
        let mut errors = ValidationErrors::new();
        errors.add("payload", message);
        QueueError::Validation(errors)
    })
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
}

/// Record errors for a definition name: `[a-z0-9_-]+`, at most 255 chars.
pub fn check_definition_name(errors: &mut ValidationErrors, field: &str, name: &str) {
    if name.is_empty() {
        errors.add(field, "must not be blank");
    } else if name.len() > fields::NAME_MAX_LENGTH {
        errors.add(
            field,
            format!("must be at most {} characters", fields::NAME_MAX_LENGTH),
        );
    } else if !name.chars().all(is_name_char) {
        errors.add(
            field,
            "may only contain lowercase letters, digits, dashes and underscores",
        );
    }
}

/// Validate a definition name and the policy fields supplied with it.
pub fn validate_definition(name: &str, policy: &DefinitionPolicy) -> QueueResult<()> {
    let mut errors = ValidationErrors::new();
    check_definition_name(&mut errors, "name", name);
    check_policy(&mut errors, policy);
    errors.into_result()
}

/// Record errors for the optional policy fields.
pub fn check_policy(errors: &mut ValidationErrors, policy: &DefinitionPolicy) {
    if let Some(timeout) = policy.default_timeout_seconds {
        if timeout < 1 {
            errors.add("default_timeout_seconds", "must be at least 1");
        }
    }
    if let Some(max_attempts) = policy.max_attempts {
        if max_attempts < 1 {
            errors.add("max_attempts", "must be at least 1");
        }
    }
    if let Some(title) = &policy.title {
        if title.chars().count() > fields::TITLE_MAX_LENGTH {
            errors.add(
                "title",
                format!("must be at most {} characters", fields::TITLE_MAX_LENGTH),
            );
        }
    }
    if let Some(description) = &policy.description {
        if description.chars().count() > fields::DESCRIPTION_MAX_LENGTH {
            errors.add(
                "description",
                format!(
                    "must be at most {} characters",
                    fields::DESCRIPTION_MAX_LENGTH
                ),
            );
        }
    }
}

/// Claim batch size must lie within `[min, max]`.
pub fn validate_claim_limit(limit: i64, min: i64, max: i64) -> QueueResult<()> {
    if limit < min || limit > max {
        return Err(QueueError::InvalidArgument(format!(
            "limit must be between {min} and {max}, got {limit}"
        )));
    }
    Ok(())
}

/// Lease extension must lie within `[0, max]` seconds.
pub fn validate_touch_seconds(seconds: i64, max: i64) -> QueueResult<()> {
    if !(0..=max).contains(&seconds) {
        return Err(QueueError::InvalidArgument(format!(
            "timeout must be between 0 and {max} seconds, got {seconds}"
        )));
    }
    Ok(())
}

pub fn validate_worker_id(worker_id: &str) -> QueueResult<()> {
    if worker_id.trim().is_empty() {
        return Err(QueueError::InvalidArgument(
            "worker_id must not be blank".to_string(),
        ));
    }
    if worker_id.chars().count() > fields::WORKER_ID_MAX_LENGTH {
        return Err(QueueError::InvalidArgument(format!(
            "worker_id must be at most {} characters",
            fields::WORKER_ID_MAX_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_valid_json() {
        let valid_json = json!({
            "key": "value",
            "number": 42,
            "array": [1, 2, 3],
            "nested": {
                "inner": "value"
            }
        });

        assert!(validate_payload(&valid_json).is_ok());
    }

    #[test]
    fn test_json_too_deep() {
        let mut deep_json = json!({});
        let mut current = &mut deep_json;

        for i in 0..15 {
            let key = format!("level_{i}");
            *current = json!({ key.clone(): {} });
            current = current.get_mut(&key).unwrap();
        }

        let err = validate_payload(&deep_json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_too_many_keys() {
        let wide: serde_json::Map<String, Value> = (0..=MAX_JSON_KEYS)
            .map(|i| (format!("k{i}"), json!(i)))
            .collect();
        assert!(check_payload(&Value::Object(wide)).is_err());
    }

    #[test]
    fn test_payload_too_large() {
        let big = json!({ "blob": "x".repeat(MAX_JSON_SIZE_BYTES) });
        assert!(check_payload(&big).unwrap_err().contains("too large"));
    }

    #[test]
    fn test_definition_names() {
        for good in ["classifier-search", "cleanup_workers", "a1"] {
            assert!(validate_definition(good, &DefinitionPolicy::default()).is_ok(), "{good}");
        }
        for bad in ["", "Upper", "has space", "dots.not.allowed"] {
            assert!(validate_definition(bad, &DefinitionPolicy::default()).is_err(), "{bad}");
        }
        assert!(validate_definition(&"a".repeat(256), &DefinitionPolicy::default()).is_err());
    }

    #[test]
    fn test_policy_bounds() {
        let policy = DefinitionPolicy::default()
            .with_max_attempts(0)
            .with_timeout_seconds(0);
        match validate_definition("foo", &policy).unwrap_err() {
            QueueError::Validation(errors) => {
                assert!(errors.has_field("max_attempts"));
                assert!(errors.has_field("default_timeout_seconds"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_priority_set_is_unrestricted() {
        let policy = DefinitionPolicy::default().with_priorities(vec![]);
        assert!(validate_definition("foo", &policy).is_ok());
    }

    #[test]
    fn test_claim_and_touch_bounds() {
        assert!(validate_claim_limit(1, 1, 10).is_ok());
        assert!(validate_claim_limit(10, 1, 10).is_ok());
        assert!(validate_claim_limit(0, 1, 10).is_err());
        assert!(validate_claim_limit(11, 1, 10).is_err());

        assert!(validate_touch_seconds(0, 86_400).is_ok());
        assert!(validate_touch_seconds(86_400, 86_400).is_ok());
        assert!(validate_touch_seconds(-1, 86_400).is_err());
        assert!(validate_touch_seconds(86_401, 86_400).is_err());
    }

    #[test]
    fn test_worker_id() {
        assert!(validate_worker_id("worker-1").is_ok());
        assert!(validate_worker_id("  ").is_err());
    }
}
