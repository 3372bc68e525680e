//! Turns raw request input into a typed [`Intent`].
//!
//! Validation is structural only: a body must be a JSON object (or `null`,
//! which stands for an all-zero resource) whose known fields have the
//! right types. Field names match case-insensitively and absent fields are
//! allowed. Any
//! failure yields [`Error::Validation`] with the fixed message
//! [`CANNOT_PARSE_JSON`]; the decoder's detail is only logged.

use super::types::{Cat, CatId, Intent};
use crate::error::CANNOT_PARSE_JSON;
use crate::{Error, Result};
use serde_json::{Map, Value};
use tracing::debug;

pub fn validate_create(body: &[u8]) -> Result<Intent> {
    let cat = decode_cat(body)?;
    Ok(Intent::Create { cat })
}

/// Any `id` in the body is ignored; the path parameter always wins.
pub fn validate_update(path_id: &str, body: &[u8]) -> Result<Intent> {
    let cat = decode_cat(body)?;
    let id = parse_path_id(path_id)?;
    Ok(Intent::Update { id, cat })
}

/// No body is read for deletes.
pub fn validate_delete(path_id: &str) -> Result<Intent> {
    let id = parse_path_id(path_id)?;
    Ok(Intent::Delete { id })
}

fn decode_cat(body: &[u8]) -> Result<Cat> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, body_len = body.len(), "Request body is not valid JSON");
        Error::validation(CANNOT_PARSE_JSON)
    })?;

    let fields = match value {
        Value::Null => return Ok(Cat::default()),
        Value::Object(fields) => fields,
        _ => {
            debug!("Request body is valid JSON but not an object");
            return Err(Error::validation(CANNOT_PARSE_JSON));
        }
    };

    serde_json::from_value(Value::Object(fold_field_names(fields))).map_err(|e| {
        debug!(error = %e, "Request body has mistyped fields");
        Error::validation(CANNOT_PARSE_JSON)
    })
}

/// Lowercases every key so `{"Name": ..}` fills `name`. An exact-case key
/// wins over a differently cased duplicate.
fn fold_field_names(fields: Map<String, Value>) -> Map<String, Value> {
    let mut folded = Map::with_capacity(fields.len());
    let mut exact = Vec::new();
    for (key, value) in fields {
        let lower = key.to_lowercase();
        if lower == key {
            exact.push((lower, value));
        } else {
            folded.insert(lower, value);
        }
    }
    folded.extend(exact);
    folded
}

fn parse_path_id(raw: &str) -> Result<CatId> {
    CatId::new(raw).ok_or_else(|| Error::validation("Missing cat id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::IntentKind;

    #[test]
    fn test_create_decodes_all_fields() {
        let intent = validate_create(br#"{"name":"Tom","age":3,"breed":"Tabby"}"#).unwrap();
        assert_eq!(
            intent,
            Intent::Create {
                cat: Cat::new("Tom", 3, "Tabby")
            }
        );
    }

    #[test]
    fn test_create_allows_missing_fields() {
        let intent = validate_create(br#"{"name":"Tom"}"#).unwrap();
        assert_eq!(intent.resource(), Some(&Cat::new("Tom", 0, "")));
    }

    #[test]
    fn test_create_rejects_empty_body() {
        let err = validate_create(b"").unwrap_err();
        assert!(matches!(err, Error::Validation { ref message } if message == CANNOT_PARSE_JSON));
    }

    #[test]
    fn test_create_rejects_malformed_json() {
        assert!(validate_create(br#"{"name":"Tom","age":3"#).is_err());
        assert!(validate_create(b"not json").is_err());
    }

    #[test]
    fn test_create_rejects_non_object_json() {
        assert!(validate_create(br#"["Tom",3,"Tabby"]"#).is_err());
        assert!(validate_create(b"42").is_err());
    }

    #[test]
    fn test_null_body_is_an_empty_resource() {
        let intent = validate_create(b"null").unwrap();
        assert_eq!(intent.resource(), Some(&Cat::default()));

        let intent = validate_update("42", b"null").unwrap();
        assert_eq!(intent.resource(), Some(&Cat::default()));
    }

    #[test]
    fn test_field_names_match_case_insensitively() {
        let intent = validate_create(br#"{"Name":"Tom","AGE":3,"bReEd":"Tabby"}"#).unwrap();
        assert_eq!(intent.resource(), Some(&Cat::new("Tom", 3, "Tabby")));

        let intent = validate_create(br#"{"Name":"Felix","name":"Tom"}"#).unwrap();
        assert_eq!(intent.resource(), Some(&Cat::new("Tom", 0, "")));

        assert!(validate_create(br#"{"Age":"three"}"#).is_err());
    }

    #[test]
    fn test_create_rejects_mistyped_fields() {
        assert!(validate_create(br#"{"name":"Tom","age":"three"}"#).is_err());
        assert!(validate_create(br#"{"name":"Tom","age":3.5}"#).is_err());
        assert!(validate_create(br#"{"name":7}"#).is_err());
    }

    #[test]
    fn test_update_ignores_body_id() {
        let intent =
            validate_update("42", br#"{"id":"99","name":"Tom","age":4,"breed":"Tabby"}"#).unwrap();
        assert_eq!(intent.kind(), IntentKind::Update);
        assert_eq!(intent.id().unwrap().as_str(), "42");
        assert_eq!(intent.resource(), Some(&Cat::new("Tom", 4, "Tabby")));
    }

    #[test]
    fn test_update_rejects_malformed_body() {
        assert!(matches!(
            validate_update("42", b"{"),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_delete_uses_path_id_only() {
        let intent = validate_delete("42").unwrap();
        assert_eq!(
            intent,
            Intent::Delete {
                id: CatId::new("42").unwrap()
            }
        );
    }

    #[test]
    fn test_empty_path_id_is_rejected() {
        assert!(validate_delete("").is_err());
        assert!(validate_update("", b"{}").is_err());
    }
}
