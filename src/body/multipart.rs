//! `multipart/form-data` bodies.
//!
//! The scanner walks the raw buffer with explicit byte offsets:
//!
//! ```text
//! ScanBoundary ─→ NextPart ─┬─→ ParseHeaders ─→ CaptureBody ─→ NextPart
//!                           └─→ Done  (closing `--boundary--`)
//! ```
//!
//! A delimiter only counts at the very start of the buffer or directly after
//! CRLF, so file content that merely contains the boundary text is kept intact.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{header_param, header_params, BodyError};

const CRLF: &[u8] = b"\r\n";
const HEADER_END: &[u8] = b"\r\n\r\n";

/// A file part already written to the upload directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    /// Original file name as sent by the client, reduced to its final component.
    pub name: String,
    pub path: PathBuf,
    pub mimetype: String,
    pub size: u64,
}

impl UploadedFile {
    /// Copy the uploaded bytes to `dest`, returning the number of bytes written.
    ///
    /// The temporary file is left in place.
    pub async fn save(&self, dest: impl AsRef<Path>) -> Result<u64, BodyError> {
        let dest = dest.as_ref();
        tokio::fs::copy(&self.path, dest).await.map_err(|e| {
            BodyError::Upload(format!(
                "saving {} to {}: {}",
                self.path.display(),
                dest.display(),
                e
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MultipartValue {
    Text(String),
    File(UploadedFile),
}

impl MultipartValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MultipartValue::Text(v) => Some(v),
            MultipartValue::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            MultipartValue::File(f) => Some(f),
            MultipartValue::Text(_) => None,
        }
    }
}

pub type MultipartData = BTreeMap<String, MultipartValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    ScanBoundary,
    NextPart,
    ParseHeaders,
    CaptureBody,
    Done,
}

/// One part as located in the buffer; nothing is copied yet.
#[derive(Debug, Default)]
struct Part {
    name: Option<String>,
    filename: Option<String>,
    content_type: Option<String>,
    body: Range<usize>,
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|at| at + from)
}

fn malformed(reason: impl Into<String>) -> BodyError {
    BodyError::Malformed {
        content_type: "multipart",
        reason: reason.into(),
    }
}

struct Scanner<'a> {
    buf: &'a [u8],
    delimiter: Vec<u8>,
    pos: usize,
    state: State,
}

impl<'a> Scanner<'a> {
    fn new(buf: &'a [u8], boundary: &str) -> Self {
        let mut delimiter = b"--".to_vec();
        delimiter.extend_from_slice(boundary.as_bytes());
        Self {
            buf,
            delimiter,
            pos: 0,
            state: State::ScanBoundary,
        }
    }

    fn run(mut self) -> Result<Vec<Part>, BodyError> {
        let mut parts = Vec::new();
        let mut current: Option<Part> = None;

        loop {
            self.state = match self.state {
                State::ScanBoundary => self.scan_boundary()?,
                State::NextPart => self.next_part()?,
                State::ParseHeaders => {
                    current = Some(self.parse_headers()?);
                    State::CaptureBody
                }
                State::CaptureBody => {
                    let mut part = current.take().unwrap_or_default();
                    part.body = self.capture_body()?;
                    parts.push(part);
                    State::NextPart
                }
                State::Done => return Ok(parts),
            };
        }
    }

    /// Skip the preamble up to the first delimiter.
    fn scan_boundary(&mut self) -> Result<State, BodyError> {
        let start = if self.buf.starts_with(&self.delimiter) {
            0
        } else {
            let mut needle = CRLF.to_vec();
            needle.extend_from_slice(&self.delimiter);
            match find(self.buf, &needle, 0) {
                Some(at) => at + CRLF.len(),
                // No delimiter at all: an empty form.
                None => return Ok(State::Done),
            }
        };
        self.pos = start + self.delimiter.len();
        Ok(State::NextPart)
    }

    /// Decide what follows a delimiter: `--` closes, CRLF opens a part.
    fn next_part(&mut self) -> Result<State, BodyError> {
        let rest = &self.buf[self.pos..];
        if rest.starts_with(b"--") || rest.is_empty() {
            return Ok(State::Done);
        }
        let padding = rest
            .iter()
            .take_while(|&&b| b == b' ' || b == b'\t')
            .count();
        if !rest[padding..].starts_with(CRLF) {
            return Err(malformed("expected CRLF after boundary"));
        }
        self.pos += padding + CRLF.len();
        Ok(State::ParseHeaders)
    }

    fn parse_headers(&mut self) -> Result<Part, BodyError> {
        // A part may carry no headers at all.
        let (block, body_start) = if self.buf[self.pos..].starts_with(CRLF) {
            (&self.buf[self.pos..self.pos], self.pos + CRLF.len())
        } else {
            let end = find(self.buf, HEADER_END, self.pos)
                .ok_or_else(|| malformed("part headers are not terminated"))?;
            (&self.buf[self.pos..end], end + HEADER_END.len())
        };

        let mut part = Part::default();
        let text = String::from_utf8_lossy(block);
        for line in text.split("\r\n") {
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if name.trim().eq_ignore_ascii_case("content-disposition") {
                for (key, param) in header_params(value) {
                    match key.as_str() {
                        "name" => part.name = Some(param),
                        "filename" => part.filename = Some(param),
                        _ => {}
                    }
                }
            } else if name.trim().eq_ignore_ascii_case("content-type") {
                part.content_type = Some(value.to_string());
            }
        }

        self.pos = body_start;
        Ok(part)
    }

    /// Everything up to the next CRLF + delimiter is this part's content.
    fn capture_body(&mut self) -> Result<Range<usize>, BodyError> {
        let mut needle = CRLF.to_vec();
        needle.extend_from_slice(&self.delimiter);
        let end = find(self.buf, &needle, self.pos)
            .ok_or_else(|| malformed("missing closing boundary"))?;
        let range = self.pos..end;
        self.pos = end + needle.len();
        Ok(range)
    }
}

/// Reduce a client-supplied file name to a bare, safe final component.
fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match last {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Decode a multipart body, writing file parts into `upload_dir`.
///
/// A missing boundary parameter yields an empty map. Parts without a name and
/// file parts with an empty file name are skipped; a repeated field name
/// overwrites the earlier value.
pub async fn decode(
    bytes: &[u8],
    content_type: &str,
    upload_dir: &Path,
) -> Result<MultipartData, BodyError> {
    let Some(boundary) = header_param(content_type, "boundary").filter(|b| !b.is_empty()) else {
        tracing::debug!("Multipart body without boundary, treating as empty");
        return Ok(MultipartData::new());
    };

    let parts = Scanner::new(bytes, &boundary).run()?;
    let mut data = MultipartData::new();

    for part in parts {
        let Some(name) = part.name else {
            tracing::debug!("Skipping multipart part without a name");
            continue;
        };
        let content = &bytes[part.body];

        let value = match part.filename {
            None => MultipartValue::Text(String::from_utf8_lossy(content).trim().to_string()),
            Some(raw) => {
                let Some(filename) = sanitize_filename(&raw) else {
                    continue;
                };
                let path = upload_dir.join(&filename);
                tokio::fs::create_dir_all(upload_dir)
                    .await
                    .map_err(|e| BodyError::Upload(e.to_string()))?;
                tokio::fs::write(&path, content)
                    .await
                    .map_err(|e| BodyError::Upload(format!("{}: {}", path.display(), e)))?;
                tracing::debug!(field = %name, path = %path.display(), size = content.len(), "Stored upload");

                MultipartValue::File(UploadedFile {
                    name: filename,
                    path,
                    mimetype: part.content_type.unwrap_or_else(|| content_type.to_string()),
                    size: content.len() as u64,
                })
            }
        };

        data.insert(name, value);
    }

    Ok(data)
}
