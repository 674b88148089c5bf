//! HTTP response record.

use crate::headers::ResponseHead;

/// Response side of one exchange, created when the head parses.
#[derive(Debug)]
pub struct Response {
    pub(crate) protocol: String,
    pub(crate) status: u16,
    pub(crate) reason: String,
    /// Header names are lower-cased.
    pub(crate) headers: Vec<(String, String)>,
    /// Decoded body bytes received so far.
    pub(crate) bytes_received: u64,
    /// Declared total from `Content-Length`, if present.
    pub(crate) total_bytes: Option<u64>,
}

impl Response {
    pub(crate) fn from_head(head: ResponseHead) -> Response {
        let mut response = Response {
            protocol: head.protocol,
            status: head.status,
            reason: head.reason,
            headers: head.headers,
            bytes_received: 0,
            total_bytes: None,
        };
        response.total_bytes = response.header("content-length").and_then(|v| v.parse().ok());
        response
    }

    /// Protocol tag from the status line (e.g. `HTTP/1.1`).
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// HTTP status code (e.g. 200, 404).
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Status phrase from the status line.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Response headers as (name, value) pairs, names lower-cased.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Get the first header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == lower)
            .map(|(_, v)| v.as_str())
    }

    /// Declared body length from `Content-Length`, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.total_bytes
    }

    /// Decoded body bytes received so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Whether the status marks this response as a redirect candidate.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(raw: &[u8]) -> Response {
        Response::from_head(crate::headers::parse_response_head(raw).unwrap())
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let resp = response(b"HTTP/1.1 301 Moved\r\nLocation: /next\r\n\r\n");
        assert_eq!(resp.header("Location"), Some("/next"));
        assert_eq!(resp.header("location"), Some("/next"));
        assert_eq!(resp.header("LOCATION"), Some("/next"));
        assert_eq!(resp.header("missing"), None);
    }

    #[test]
    fn content_length_is_parsed() {
        let resp = response(b"HTTP/1.1 200 OK\r\nContent-Length: 1234\r\n\r\n");
        assert_eq!(resp.content_length(), Some(1234));
        let resp = response(b"HTTP/1.1 200 OK\r\nContent-Length: nope\r\n\r\n");
        assert_eq!(resp.content_length(), None);
    }

    #[test]
    fn redirect_classification() {
        assert!(response(b"HTTP/1.1 301 Moved\r\n\r\n").is_redirect());
        assert!(response(b"HTTP/1.1 399 Odd\r\n\r\n").is_redirect());
        assert!(!response(b"HTTP/1.1 200 OK\r\n\r\n").is_redirect());
        assert!(!response(b"HTTP/1.1 400 Bad\r\n\r\n").is_redirect());
    }
}
