//! `application/json` bodies.

use serde_json::Value;

use super::text::decode_str;
use super::BodyError;

/// Parse a JSON body strictly; an empty body is malformed.
pub fn decode(bytes: &[u8], charset: Option<&str>) -> Result<Value, BodyError> {
    let raw = decode_str(bytes, charset)?;
    serde_json::from_str(&raw).map_err(|e| BodyError::Malformed {
        content_type: "json",
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object() {
        assert_eq!(decode(br#"{"a":[1,2]}"#, None).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_scalars_are_accepted() {
        assert_eq!(decode(b"42", None).unwrap(), json!(42));
    }

    #[test]
    fn test_malformed() {
        let inputs: [&[u8]; 4] = [b"{", b"", b"{'a':1}", b"{\"a\":1} trailing"];
        for input in inputs {
            let err = decode(input, None).unwrap_err();
            assert!(matches!(err, BodyError::Malformed { content_type: "json", .. }));
        }
    }
}
