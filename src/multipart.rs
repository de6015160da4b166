//! Single-file `multipart/form-data` decoding.
//!
//! The body is split on the raw boundary token rather than walked as a
//! standards-compliant stream. The first part whose headers carry a
//! `filename="..."` attribute wins; every other part is ignored.

use thiserror::Error;

const FILENAME_MARKER: &[u8] = b"filename=\"";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Bytes stripped from the end of a payload. Any trailing run of these is
/// removed, so payloads that really end in one of them lose those bytes.
const TRAILING_BYTES: &[u8] = b"\r\n-";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MultipartError {
    #[error("Missing multipart boundary")]
    MissingBoundary,

    #[error("No file uploaded")]
    NoFile,

    #[error("Uploaded filename is not valid UTF-8")]
    InvalidFilename,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Extract the `boundary` parameter from a `Content-Type` header value.
pub fn boundary_from_content_type(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

pub fn parse(body: &[u8], boundary: &[u8]) -> Result<UploadedFile, MultipartError> {
    if boundary.is_empty() {
        return Err(MultipartError::MissingBoundary);
    }

    for part in split(body, boundary) {
        let Some(header_end) = find(part, HEADER_TERMINATOR) else {
            continue;
        };
        let header = &part[..header_end];
        let Some(filename) = filename_from_header(header) else {
            continue;
        };

        let filename =
            String::from_utf8(filename.to_vec()).map_err(|_| MultipartError::InvalidFilename)?;
        let payload = &part[header_end + HEADER_TERMINATOR.len()..];

        return Ok(UploadedFile {
            filename,
            data: strip_trailing(payload).to_vec(),
        });
    }

    Err(MultipartError::NoFile)
}

fn filename_from_header(header: &[u8]) -> Option<&[u8]> {
    let start = find(header, FILENAME_MARKER)? + FILENAME_MARKER.len();
    let rest = &header[start..];
    let end = rest.iter().position(|&b| b == b'"').unwrap_or(rest.len());
    Some(&rest[..end])
}

fn strip_trailing(payload: &[u8]) -> &[u8] {
    let end = payload
        .iter()
        .rposition(|b| !TRAILING_BYTES.contains(b))
        .map_or(0, |pos| pos + 1);
    &payload[..end]
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Split `haystack` on every occurrence of a non-empty `needle`.
fn split<'a>(haystack: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
    let mut rest = Some(haystack);
    std::iter::from_fn(move || {
        let current = rest?;
        match find(current, needle) {
            Some(pos) => {
                rest = Some(&current[pos + needle.len()..]);
                Some(&current[..pos])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";

    fn body_with_parts(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=abc123"),
            Some("abc123")
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data; charset=utf-8; Boundary=\"x y\""),
            Some("x y")
        );
        assert_eq!(boundary_from_content_type("multipart/form-data"), None);
        assert_eq!(boundary_from_content_type("multipart/form-data; boundary="), None);
    }

    #[test]
    fn test_parses_single_file() {
        let body = body_with_parts(&[("file", Some("level.rbxl"), b"<roblox>place</roblox>")]);
        let file = parse(&body, BOUNDARY.as_bytes()).unwrap();
        assert_eq!(file.filename, "level.rbxl");
        assert_eq!(file.data, b"<roblox>place</roblox>");
    }

    #[test]
    fn test_skips_plain_fields_before_file() {
        let body = body_with_parts(&[
            ("title", None, b"my map"),
            ("file", Some("thumb.png"), &[0x89, b'P', b'N', b'G', 0x00, 0x01]),
        ]);
        let file = parse(&body, BOUNDARY.as_bytes()).unwrap();
        assert_eq!(file.filename, "thumb.png");
        assert_eq!(file.data, vec![0x89, b'P', b'N', b'G', 0x00, 0x01]);
    }

    #[test]
    fn test_first_file_part_wins() {
        let body = body_with_parts(&[
            ("file", Some("first.rbxl"), b"one"),
            ("file", Some("second.rbxl"), b"two"),
        ]);
        let file = parse(&body, BOUNDARY.as_bytes()).unwrap();
        assert_eq!(file.filename, "first.rbxl");
        assert_eq!(file.data, b"one");
    }

    #[test]
    fn test_no_file_part() {
        let body = body_with_parts(&[("title", None, b"only text")]);
        assert_eq!(
            parse(&body, BOUNDARY.as_bytes()),
            Err(MultipartError::NoFile)
        );
        assert_eq!(parse(b"", BOUNDARY.as_bytes()), Err(MultipartError::NoFile));
    }

    #[test]
    fn test_filename_marker_in_payload_is_not_a_file() {
        let body = body_with_parts(&[("notes", None, b"see filename=\"x.rbxl\" here")]);
        assert_eq!(
            parse(&body, BOUNDARY.as_bytes()),
            Err(MultipartError::NoFile)
        );
    }

    #[test]
    fn test_file_part_without_header_terminator_is_skipped() {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"broken.rbxl\"\r\n\
             --{b}--\r\n",
            b = BOUNDARY
        );
        assert_eq!(
            parse(body.as_bytes(), BOUNDARY.as_bytes()),
            Err(MultipartError::NoFile)
        );

        let mut body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"broken.rbxl\"\r\n",
            b = BOUNDARY
        )
        .into_bytes();
        body.extend_from_slice(&body_with_parts(&[("file", Some("good.rbxl"), b"place")]));
        let file = parse(&body, BOUNDARY.as_bytes()).unwrap();
        assert_eq!(file.filename, "good.rbxl");
        assert_eq!(file.data, b"place");
    }

    #[test]
    fn test_empty_boundary() {
        assert_eq!(parse(b"anything", b""), Err(MultipartError::MissingBoundary));
    }

    #[test]
    fn test_invalid_utf8_filename() {
        let mut body = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"",
            BOUNDARY
        )
        .into_bytes();
        body.extend_from_slice(&[0xff, 0xfe]);
        body.extend_from_slice(format!("\"\r\n\r\ndata\r\n--{}--\r\n", BOUNDARY).as_bytes());
        assert_eq!(
            parse(&body, BOUNDARY.as_bytes()),
            Err(MultipartError::InvalidFilename)
        );
    }

    #[test]
    fn test_empty_payload() {
        let body = body_with_parts(&[("file", Some("empty.rbxl"), b"")]);
        let file = parse(&body, BOUNDARY.as_bytes()).unwrap();
        assert_eq!(file.filename, "empty.rbxl");
        assert!(file.data.is_empty());
    }

    // Known fragility: trailing CR, LF and '-' bytes belonging to the payload
    // itself are stripped along with the boundary terminator.
    #[test]
    fn test_trailing_bytes_in_payload_are_truncated() {
        let body = body_with_parts(&[("file", Some("notes.txt"), b"line one\r\nline two\n")]);
        let file = parse(&body, BOUNDARY.as_bytes()).unwrap();
        assert_eq!(file.data, b"line one\r\nline two");

        let body = body_with_parts(&[("file", Some("dashes.bin"), b"abc---")]);
        let file = parse(&body, BOUNDARY.as_bytes()).unwrap();
        assert_eq!(file.data, b"abc");
    }

    #[test]
    fn test_interior_separator_bytes_survive() {
        let body = body_with_parts(&[("file", Some("a.rbxl"), b"a\r\n\r\n--b")]);
        let file = parse(&body, BOUNDARY.as_bytes()).unwrap();
        assert_eq!(file.data, b"a\r\n\r\n--b");
    }
}
