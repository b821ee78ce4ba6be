//! `multipart/x-mixed-replace` framing for MJPEG over HTTP

use axum::body::Bytes;

/// Part boundary token
pub const BOUNDARY: &str = "frame";

/// Response content type for the feed
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Wrap one JPEG as a multipart part
#[must_use]
pub fn part(jpeg: &[u8]) -> Bytes {
    let header = format!("--{BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");

    let mut buf = Vec::with_capacity(header.len() + jpeg.len() + 2);
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(jpeg);
    buf.extend_from_slice(b"\r\n");
    Bytes::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_framing_is_exact() {
        let framed = part(&[0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(
            &framed[..],
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8\xFF\xD9\r\n"
        );
    }

    #[test]
    fn content_type_names_boundary() {
        assert!(CONTENT_TYPE.ends_with(&format!("boundary={BOUNDARY}")));
    }
}
