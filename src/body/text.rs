//! `text/plain` bodies and charset handling shared by the textual decoders.

use axum::http::{header, HeaderMap};

use super::{header_param, BodyError};

/// Charset label for a body: the content-type `charset` parameter, else the
/// `Content-Encoding` header. `identity` means no label.
pub fn charset_label(content_type: &str, headers: &HeaderMap) -> Option<String> {
    header_param(content_type, "charset")
        .or_else(|| {
            headers
                .get(header::CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
        })
        .map(|label| label.to_ascii_lowercase())
        .filter(|label| !label.is_empty() && label != "identity")
}

/// Decode `bytes` to a string using the named charset (UTF-8 when absent).
pub fn decode_str(bytes: &[u8], charset: Option<&str>) -> Result<String, BodyError> {
    let malformed = |reason: String| BodyError::Malformed {
        content_type: "text",
        reason,
    };

    match charset.unwrap_or("utf-8") {
        "utf-8" | "utf8" => String::from_utf8(bytes.to_vec()).map_err(|e| malformed(e.to_string())),
        "us-ascii" | "ascii" => {
            if bytes.is_ascii() {
                Ok(bytes.iter().map(|&b| b as char).collect())
            } else {
                Err(malformed("non-ASCII byte in us-ascii body".to_string()))
            }
        }
        "iso-8859-1" | "latin1" | "latin-1" | "binary" => Ok(bytes.iter().map(|&b| b as char).collect()),
        "utf-16le" | "utf16le" | "ucs-2" | "ucs2" => {
            if bytes.len() % 2 != 0 {
                return Err(malformed("odd byte count in utf-16le body".to_string()));
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).map_err(|e| malformed(e.to_string()))
        }
        other => Err(BodyError::UnsupportedCharset(other.to_string())),
    }
}

/// Decode a `text/plain` body.
pub fn decode(bytes: &[u8], charset: Option<&str>) -> Result<String, BodyError> {
    decode_str(bytes, charset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_utf8_default() {
        assert_eq!(decode("héllo".as_bytes(), None).unwrap(), "héllo");
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let err = decode(&[0xff, 0xfe, 0xfd], None).unwrap_err();
        assert!(matches!(err, BodyError::Malformed { content_type: "text", .. }));
    }

    #[test]
    fn test_latin1() {
        assert_eq!(decode(&[0x63, 0x61, 0x66, 0xe9], Some("latin1")).unwrap(), "café");
    }

    #[test]
    fn test_utf16le() {
        assert_eq!(decode(&[0x68, 0x00, 0x69, 0x00], Some("utf-16le")).unwrap(), "hi");
    }

    #[test]
    fn test_unknown_charset() {
        assert_eq!(
            decode(b"x", Some("klingon")).unwrap_err(),
            BodyError::UnsupportedCharset("klingon".into())
        );
    }

    #[test]
    fn test_charset_label_sources() {
        let headers = HeaderMap::new();
        assert_eq!(
            charset_label("text/plain; charset=UTF-8", &headers).as_deref(),
            Some("utf-8")
        );
        assert_eq!(charset_label("text/plain", &headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("identity"));
        assert_eq!(charset_label("text/plain", &headers), None);

        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("latin1"));
        assert_eq!(charset_label("text/plain", &headers).as_deref(), Some("latin1"));
    }
}
