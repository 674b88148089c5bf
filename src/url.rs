//! Minimal URL handling for http/https request targets.

/// URL scheme accepted by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scheme {
    Http,
    Https,
}

impl Scheme {
    fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UrlError {
    /// Scheme is present but not http/https (or missing entirely).
    UnsupportedScheme(String),
    /// Structurally broken: empty host, bad port, etc.
    Malformed(String),
}

/// A parsed absolute http/https URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Url {
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    path: String,
    query: Option<String>,
}

impl Url {
    pub fn parse(raw: &str) -> Result<Url, UrlError> {
        let (scheme, rest) = if let Some(rest) = strip_prefix_ignore_case(raw, "https://") {
            (Scheme::Https, rest)
        } else if let Some(rest) = strip_prefix_ignore_case(raw, "http://") {
            (Scheme::Http, rest)
        } else {
            let scheme = raw.split("://").next().unwrap_or(raw);
            return Err(UrlError::UnsupportedScheme(scheme.to_string()));
        };

        // Authority ends at the first path or query delimiter.
        let (authority, tail) = match rest.find(|c| c == '/' || c == '?') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, ""),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((h, p)) => {
                let port: u16 = p
                    .parse()
                    .map_err(|_| UrlError::Malformed(format!("invalid port in {raw}")))?;
                (h, Some(port))
            }
            None => (authority, None),
        };
        if host.is_empty() {
            return Err(UrlError::Malformed(format!("missing host in {raw}")));
        }

        let (path, query) = if let Some(q) = tail.strip_prefix('?') {
            ("/".to_string(), Some(q.to_string()))
        } else {
            match tail.find('?') {
                Some(i) => (tail[..i].to_string(), Some(tail[i + 1..].to_string())),
                None if tail.is_empty() => ("/".to_string(), None),
                None => (tail.to_string(), None),
            }
        };

        Ok(Url {
            scheme,
            host: host.to_string(),
            port,
            path,
            query,
        })
    }

    pub fn is_https(&self) -> bool {
        self.scheme == Scheme::Https
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(self.scheme.default_port())
    }

    /// Host with the port appended when it differs from the scheme default.
    /// Used for the `Host` header.
    pub fn authority(&self) -> String {
        match self.port {
            Some(p) if p != self.scheme.default_port() => format!("{}:{p}", self.host),
            _ => self.host.clone(),
        }
    }

    /// `scheme://host[:port]`, the base for resolving relative redirects.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.authority())
    }

    /// Path plus query, as written on the request line.
    pub fn request_target(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic() {
        let url = Url::parse("https://example.com/path?query=1").unwrap();
        assert!(url.is_https());
        assert_eq!(url.host(), "example.com");
        assert_eq!(url.port_or_default(), 443);
        assert_eq!(url.request_target(), "/path?query=1");
    }

    #[test]
    fn parse_with_port() {
        let url = Url::parse("http://localhost:8080/api").unwrap();
        assert!(!url.is_https());
        assert_eq!(url.host(), "localhost");
        assert_eq!(url.port_or_default(), 8080);
        assert_eq!(url.authority(), "localhost:8080");
    }

    #[test]
    fn path_defaults_to_root() {
        let url = Url::parse("http://example.com").unwrap();
        assert_eq!(url.request_target(), "/");
        let url = Url::parse("http://example.com?q=1").unwrap();
        assert_eq!(url.request_target(), "/?q=1");
    }

    #[test]
    fn default_port_omitted_from_authority() {
        let url = Url::parse("http://example.com:80/a").unwrap();
        assert_eq!(url.authority(), "example.com");
        assert_eq!(url.origin(), "http://example.com");
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let url = Url::parse("HTTP://example.com/").unwrap();
        assert!(!url.is_https());
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(matches!(
            Url::parse("ftp://example.com/file"),
            Err(UrlError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            Url::parse("no-scheme-here"),
            Err(UrlError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn rejects_bad_port_and_empty_host() {
        assert!(matches!(
            Url::parse("http://example.com:notaport/"),
            Err(UrlError::Malformed(_))
        ));
        assert!(matches!(Url::parse("http:///path"), Err(UrlError::Malformed(_))));
    }
}
