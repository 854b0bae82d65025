//! `application/x-www-form-urlencoded` bodies.

use std::collections::BTreeMap;

use serde::Serialize;

use super::text::decode_str;
use super::BodyError;

/// One form field: a single value, or every value of a repeated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormValue {
    Single(String),
    Multiple(Vec<String>),
}

impl FormValue {
    /// The last value submitted for the field.
    pub fn last(&self) -> &str {
        match self {
            FormValue::Single(v) => v,
            FormValue::Multiple(vs) => vs.last().map(String::as_str).unwrap_or_default(),
        }
    }

    pub fn all(&self) -> Vec<&str> {
        match self {
            FormValue::Single(v) => vec![v.as_str()],
            FormValue::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            FormValue::Single(first) => {
                *self = FormValue::Multiple(vec![std::mem::take(first), value]);
            }
            FormValue::Multiple(vs) => vs.push(value),
        }
    }
}

pub type FormData = BTreeMap<String, FormValue>;

/// Decode a url-encoded body; repeated keys collect into arrays.
pub fn decode(bytes: &[u8], charset: Option<&str>) -> Result<FormData, BodyError> {
    let raw = decode_str(bytes, charset)?;
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(&raw).map_err(|e| BodyError::Malformed {
            content_type: "form",
            reason: e.to_string(),
        })?;

    let mut data = FormData::new();
    for (key, value) in pairs {
        match data.get_mut(&key) {
            Some(existing) => existing.push(value),
            None => {
                data.insert(key, FormValue::Single(value));
            }
        }
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_fields() {
        let data = decode(b"name=Ada+Lovelace&lang=en", None).unwrap();
        assert_eq!(data["name"], FormValue::Single("Ada Lovelace".into()));
        assert_eq!(data["lang"].last(), "en");
    }

    #[test]
    fn test_repeated_keys_collect() {
        let data = decode(b"tag=a&tag=b&tag=c", None).unwrap();
        assert_eq!(data["tag"], FormValue::Multiple(vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(data["tag"].last(), "c");
    }

    #[test]
    fn test_percent_decoding() {
        let data = decode(b"q=%C3%A9t%C3%A9&empty=", None).unwrap();
        assert_eq!(data["q"].last(), "été");
        assert_eq!(data["empty"].last(), "");
    }

    #[test]
    fn test_serializes_as_plain_json() {
        let data = decode(b"a=1&b=2&b=3", None).unwrap();
        assert_eq!(
            serde_json::to_value(&data).unwrap(),
            serde_json::json!({"a": "1", "b": ["2", "3"]})
        );
    }

    #[test]
    fn test_empty_body() {
        assert!(decode(b"", None).unwrap().is_empty());
    }
}
