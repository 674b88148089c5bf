//! HTTP/1.1 head codec: request serialization and response-head parsing.

use crate::error::Error;
use crate::request::Request;
use crate::url::Url;

/// Parsed response head: status line plus header block.
#[derive(Debug)]
pub(crate) struct ResponseHead {
    pub protocol: String,
    pub status: u16,
    pub reason: String,
    /// Header names are lower-cased.
    pub headers: Vec<(String, String)>,
}

/// Serialize the request line and header block, terminated by a blank line.
///
/// Default headers are emitted in a fixed order; caller-supplied headers
/// override a default on a case-insensitive name match (keeping the
/// caller's casing and the default's position) and otherwise append after.
/// No body framing headers are synthesized.
pub(crate) fn serialize_request(request: &Request, url: &Url, user_agent: &str) -> Vec<u8> {
    let mut headers: Vec<(String, String)> = vec![
        ("Host".to_string(), url.authority()),
        ("User-Agent".to_string(), user_agent.to_string()),
        ("Accept".to_string(), "*/*".to_string()),
        ("Accept-Encoding".to_string(), "gzip".to_string()),
        ("Accept-Language".to_string(), "en-US,en;q=0.5".to_string()),
        ("Connection".to_string(), "close".to_string()),
    ];
    for (name, value) in request.caller_headers() {
        match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(slot) => {
                slot.0 = name.clone();
                slot.1 = value.clone();
            }
            None => headers.push((name.clone(), value.clone())),
        }
    }

    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(request.method_name().as_bytes());
    out.push(b' ');
    out.extend_from_slice(url.request_target().as_bytes());
    out.extend_from_slice(b" HTTP/");
    out.extend_from_slice(request.version().as_str().as_bytes());
    out.extend_from_slice(b"\r\n");
    for (name, value) in &headers {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out
}

/// Parse a complete response head (everything up to and including the
/// terminating `\r\n\r\n`).
///
/// The status line is three space-separated tokens; header names are
/// lower-cased; lines without a `": "` separator are skipped silently.
pub(crate) fn parse_response_head(raw: &[u8]) -> Result<ResponseHead, Error> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| Error::Protocol("response head is not valid utf-8".to_string()))?;
    let text = text.strip_suffix("\r\n\r\n").unwrap_or(text);

    let mut lines = text.split("\r\n");
    let status_line = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or_else(|| Error::Protocol("empty response head".to_string()))?;

    let mut parts = status_line.splitn(3, ' ');
    let protocol = parts.next().unwrap_or_default();
    let status: u16 = parts
        .next()
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| Error::Protocol(format!("malformed status line: {status_line}")))?;
    let reason = parts.next().unwrap_or_default();

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(": ") {
            headers.push((name.to_ascii_lowercase(), value.to_string()));
        }
    }

    Ok(ResponseHead {
        protocol: protocol.to_string(),
        status,
        reason: reason.to_string(),
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head_text(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn serialize_get_with_defaults() {
        let request = Request::get("http://example.com/index.html?a=1");
        let url = Url::parse(request.url()).unwrap();
        let text = head_text(&serialize_request(&request, &url, "fetchline/test"));

        assert!(text.starts_with("GET /index.html?a=1 HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.com\r\n"));
        assert!(text.contains("User-Agent: fetchline/test\r\n"));
        assert!(text.contains("Accept-Encoding: gzip\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn serialize_path_defaults_to_root() {
        let request = Request::get("http://example.com");
        let url = Url::parse(request.url()).unwrap();
        let text = head_text(&serialize_request(&request, &url, "ua"));
        assert!(text.starts_with("GET / HTTP/1.1\r\n"));
    }

    #[test]
    fn serialize_nondefault_port_in_host() {
        let request = Request::get("http://example.com:8080/");
        let url = Url::parse(request.url()).unwrap();
        let text = head_text(&serialize_request(&request, &url, "ua"));
        assert!(text.contains("Host: example.com:8080\r\n"));
    }

    #[test]
    fn caller_headers_override_defaults_case_insensitively() {
        let request = Request::get("http://example.com/")
            .header("accept-encoding", "identity")
            .header("X-Custom", "yes");
        let url = Url::parse(request.url()).unwrap();
        let text = head_text(&serialize_request(&request, &url, "ua"));

        assert!(text.contains("accept-encoding: identity\r\n"));
        assert!(!text.contains("Accept-Encoding: gzip"));
        assert!(text.contains("X-Custom: yes\r\n"));
        // Overridden header keeps the default's position, before Connection.
        let enc = text.find("accept-encoding").unwrap();
        let conn = text.find("Connection").unwrap();
        assert!(enc < conn);
    }

    #[test]
    fn serialize_http_10_version_tag() {
        let request = Request::get("http://example.com/").http_version(crate::HttpVersion::Http10);
        let url = Url::parse(request.url()).unwrap();
        let text = head_text(&serialize_request(&request, &url, "ua"));
        assert!(text.starts_with("GET / HTTP/1.0\r\n"));
    }

    #[test]
    fn parse_simple_head() {
        let head = parse_response_head(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n").unwrap();
        assert_eq!(head.protocol, "HTTP/1.1");
        assert_eq!(head.status, 200);
        assert_eq!(head.reason, "OK");
        assert_eq!(head.headers, vec![("content-length".to_string(), "5".to_string())]);
    }

    #[test]
    fn parse_lowercases_names_and_keeps_values() {
        let head =
            parse_response_head(b"HTTP/1.1 301 Moved Permanently\r\nLocation: /next\r\n\r\n")
                .unwrap();
        assert_eq!(head.reason, "Moved Permanently");
        assert_eq!(head.headers[0].0, "location");
        assert_eq!(head.headers[0].1, "/next");
    }

    #[test]
    fn parse_skips_lines_without_separator() {
        let head =
            parse_response_head(b"HTTP/1.1 200 OK\r\ngarbage-line\r\nx-ok: 1\r\n\r\n").unwrap();
        assert_eq!(head.headers.len(), 1);
        assert_eq!(head.headers[0].0, "x-ok");
    }

    #[test]
    fn parse_rejects_malformed_status_line() {
        assert!(matches!(
            parse_response_head(b"HTTP/1.1 abc OK\r\n\r\n"),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(parse_response_head(b"\r\n\r\n"), Err(Error::Protocol(_))));
    }
}
