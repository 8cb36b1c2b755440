//! `multipart/related` request bodies for Drive media uploads
//!
//! reqwest's multipart support only produces `multipart/form-data`; the
//! Drive upload endpoint wants `multipart/related` with a JSON metadata part
//! followed by the raw content part. Export artifacts are small enough to
//! assemble the whole body in memory.

/// Part separator. Long enough that artifact bytes colliding with it is not
/// a practical concern, and fixed so tests can assert on exact bodies.
const BOUNDARY: &str = "confab_upload_boundary";

/// Content-Type header value matching [`BOUNDARY`].
pub const CONTENT_TYPE: &str = "multipart/related; boundary=confab_upload_boundary";

/// Assembles the two-part upload body: JSON metadata, then file content.
pub fn related_body(
    metadata: &serde_json::Value,
    content_type: &str,
    content: &[u8],
) -> Vec<u8> {
    let metadata_json = metadata.to_string();

    let mut body = Vec::with_capacity(metadata_json.len() + content.len() + 256);
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(format!("\r\n--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
