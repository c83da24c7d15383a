//! Validation of the model's scoring response against the fixed shape.

use serde_json::Value;

const BIO_KEYS: [&str; 5] = ["A1", "A2", "A3", "A4", "A5"];
const DOC_KEYS: [&str; 5] = ["B1", "B2", "B3", "B4", "B5"];

/// Validate a parsed response; returns human-readable errors, empty on
/// success. The error strings are fed back to the model verbatim on retry,
/// so they name the offending field precisely.
pub fn validate_response(response: &Value) -> Vec<String> {
    let Some(map) = response.as_object() else {
        return vec!["response is not a JSON object".to_string()];
    };

    let mut errors = Vec::new();

    for (field, kind) in [
        ("tool_name", TypeKind::String),
        ("homepage", TypeKind::String),
        ("publication_ids", TypeKind::List),
        ("bio_subscores", TypeKind::Object),
        ("documentation_subscores", TypeKind::Object),
        ("confidence_score", TypeKind::Number),
        ("concise_description", TypeKind::String),
        ("rationale", TypeKind::String),
    ] {
        match map.get(field) {
            None => errors.push(format!("missing field '{field}'")),
            Some(value) if !kind.matches(value) => errors.push(format!(
                "field '{field}' must be of type {}, got {}",
                kind.name(),
                type_name(value)
            )),
            Some(_) => {}
        }
    }

    if let Some(ids) = map.get("publication_ids").and_then(Value::as_array) {
        for (idx, item) in ids.iter().enumerate() {
            if !item.is_string() {
                errors.push(format!(
                    "publication_ids[{idx}] must be a string, got {}",
                    type_name(item)
                ));
            }
        }
    }

    check_subscores(map.get("bio_subscores"), &BIO_KEYS, "bio_subscores", &mut errors);
    check_subscores(
        map.get("documentation_subscores"),
        &DOC_KEYS,
        "documentation_subscores",
        &mut errors,
    );

    if let Some(confidence) = map.get("confidence_score").and_then(Value::as_f64)
        && !(0.0..=1.0).contains(&confidence)
    {
        errors.push("field 'confidence_score' must be between 0 and 1".to_string());
    }

    errors
}

fn check_subscores(
    container: Option<&Value>,
    keys: &[&str],
    label: &str,
    errors: &mut Vec<String>,
) {
    let Some(container) = container else {
        return;
    };
    let Some(map) = container.as_object() else {
        // Already reported as a type mismatch above.
        return;
    };
    for key in keys {
        match map.get(*key) {
            None => errors.push(format!("missing field '{label}.{key}'")),
            Some(value) if !value.is_number() => errors.push(format!(
                "field '{label}.{key}' must be numeric, got {}",
                type_name(value)
            )),
            Some(_) => {}
        }
    }
    for (key, value) in map {
        if !keys.contains(&key.as_str()) && !value.is_number() {
            errors.push(format!(
                "field '{label}.{key}' must be numeric, got {}",
                type_name(value)
            ));
        }
    }
}

enum TypeKind {
    String,
    Number,
    List,
    Object,
}

impl TypeKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::List => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::List => "list",
            Self::Object => "object",
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn valid_response() -> Value {
        json!({
            "tool_name": "SpecTool",
            "homepage": "https://tool.example",
            "publication_ids": ["pmid:12345"],
            "bio_subscores": {"A1": 1, "A2": 1, "A3": 0.5, "A4": 1, "A5": 0},
            "documentation_subscores": {"B1": 1, "B2": 0.5, "B3": 0, "B4": 0, "B5": 1},
            "confidence_score": 0.8,
            "concise_description": "A concise description.",
            "rationale": "Evidence-based rationale."
        })
    }

    #[test]
    fn valid_response_passes() {
        assert!(validate_response(&valid_response()).is_empty());
    }

    #[test]
    fn non_object_is_a_single_error() {
        let errors = validate_response(&json!(["not", "an", "object"]));
        assert_eq!(errors, vec!["response is not a JSON object"]);
    }

    #[test]
    fn missing_and_mistyped_fields_are_reported() {
        let mut response = valid_response();
        response.as_object_mut().unwrap().remove("rationale");
        response["confidence_score"] = json!("high");
        let errors = validate_response(&response);
        assert!(errors.iter().any(|e| e.contains("missing field 'rationale'")));
        assert!(errors
            .iter()
            .any(|e| e.contains("'confidence_score' must be of type number")));
    }

    #[test]
    fn subscore_keys_must_be_complete_and_numeric() {
        let mut response = valid_response();
        response["documentation_subscores"] = json!({"B1": 1, "B2": 0, "B3": 0, "B4": 0, "B5": "invalid"});
        let errors = validate_response(&response);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'documentation_subscores.B5' must be numeric"));

        let mut response = valid_response();
        response["bio_subscores"] = json!({"A1": 1});
        let errors = validate_response(&response);
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn extra_subscore_keys_must_be_numeric() {
        let mut response = valid_response();
        response["bio_subscores"]["A6"] = json!(0.5);
        assert!(validate_response(&response).is_empty());
        response["bio_subscores"]["note"] = json!("text");
        let errors = validate_response(&response);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'bio_subscores.note'"));
    }

    #[test]
    fn confidence_bounds_are_enforced() {
        let mut response = valid_response();
        response["confidence_score"] = json!(1.5);
        let errors = validate_response(&response);
        assert_eq!(errors, vec!["field 'confidence_score' must be between 0 and 1"]);
    }
}
