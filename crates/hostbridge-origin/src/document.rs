use serde_json::{json, Value};

use crate::error::{OriginError, Result};
use crate::pattern::is_parseable_host;

fn document_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "validOrigins": {
                "type": "array",
                "minItems": 1,
                "items": { "type": "string", "minLength": 1 }
            }
        },
        "required": ["validOrigins"]
    })
}

/// Validate a fetched `{ "validOrigins": [...] }` document and extract its
/// entries.
///
/// Every entry must parse as a host (optionally `*.`-prefixed); a single bad
/// entry rejects the whole document.
pub fn parse_allow_list(document: &Value) -> Result<Vec<String>> {
    let validator = jsonschema::validator_for(&document_schema())
        .map_err(|err| OriginError::InvalidDocument(err.to_string()))?;

    let mut errors = validator.iter_errors(document);
    if let Some(first) = errors.next() {
        let mut message = first.to_string();
        for err in errors.take(3) {
            message.push_str("; ");
            message.push_str(&err.to_string());
        }
        return Err(OriginError::InvalidDocument(message));
    }

    let entries = document
        .get("validOrigins")
        .and_then(Value::as_array)
        .ok_or_else(|| OriginError::InvalidDocument("validOrigins missing".to_string()))?;

    let mut origins = Vec::with_capacity(entries.len());
    for entry in entries {
        let entry = entry
            .as_str()
            .ok_or_else(|| OriginError::InvalidDocument("non-string entry".to_string()))?;
        if !is_parseable_host(entry) {
            tracing::debug!(entry, "allow-list entry failed host validation");
            return Err(OriginError::InvalidEntry(entry.to_string()));
        }
        origins.push(entry.to_ascii_lowercase());
    }

    Ok(origins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_document() {
        let doc = json!({"validOrigins": ["teams.microsoft.com", "*.teams.microsoft.com"]});
        let list = parse_allow_list(&doc).unwrap();
        assert_eq!(list, vec!["teams.microsoft.com", "*.teams.microsoft.com"]);
    }

    #[test]
    fn rejects_missing_field() {
        let doc = json!({"origins": ["teams.microsoft.com"]});
        assert!(matches!(
            parse_allow_list(&doc),
            Err(OriginError::InvalidDocument(_))
        ));
    }

    #[test]
    fn rejects_wrong_types() {
        let doc = json!({"validOrigins": "teams.microsoft.com"});
        assert!(matches!(
            parse_allow_list(&doc),
            Err(OriginError::InvalidDocument(_))
        ));

        let doc = json!({"validOrigins": [1, 2]});
        assert!(matches!(
            parse_allow_list(&doc),
            Err(OriginError::InvalidDocument(_))
        ));
    }

    #[test]
    fn rejects_empty_list() {
        let doc = json!({"validOrigins": []});
        assert!(parse_allow_list(&doc).is_err());
    }

    #[test]
    fn one_bad_entry_rejects_document() {
        let doc = json!({"validOrigins": ["teams.microsoft.com", "not a host"]});
        assert!(matches!(
            parse_allow_list(&doc),
            Err(OriginError::InvalidEntry(entry)) if entry == "not a host"
        ));
    }
}
