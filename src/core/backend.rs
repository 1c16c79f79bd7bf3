use std::{fmt, str::FromStr};

use http::{
    HeaderValue, Uri,
    uri::{Authority, Scheme},
};
use thiserror::Error;
use url::Url;

/// Errors raised while turning a configured target string into a forwarding target
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TargetError {
    /// The target is not an absolute URL
    #[error("Invalid target URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The target uses a scheme the proxy cannot forward to
    #[error("Unsupported scheme '{scheme}' in target URL '{url}', expected http or https")]
    UnsupportedScheme { url: String, scheme: String },

    /// The target has no host to connect to
    #[error("Target URL '{0}' has no host")]
    MissingHost(String),

    /// The target parsed as a URL but cannot be expressed as an HTTP authority
    #[error("Target URL '{url}' has an unusable authority: {reason}")]
    InvalidAuthority { url: String, reason: String },
}

/// Result type for target operations
pub type TargetResult<T> = Result<T, TargetError>;

/// A type-safe representation of a route's backend: scheme, host, port and
/// an optional base path/query that forwarded requests are joined onto.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteTarget {
    url: Url,
    is_secure: bool,
}

impl RouteTarget {
    /// Parse and validate a target URL.
    ///
    /// Only absolute `http://` and `https://` URLs with a host are accepted.
    pub fn new(raw: &str) -> TargetResult<Self> {
        let url = Url::parse(raw.trim()).map_err(|e| TargetError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        let is_secure = match url.scheme() {
            "https" => true,
            "http" => false,
            other => {
                return Err(TargetError::UnsupportedScheme {
                    url: raw.to_string(),
                    scheme: other.to_string(),
                });
            }
        };

        if url.host_str().is_none_or(str::is_empty) {
            return Err(TargetError::MissingHost(raw.to_string()));
        }

        Ok(Self { url, is_secure })
    }

    /// Get the normalized URL as a string reference
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Port to connect to, falling back to the scheme default.
    pub fn port(&self) -> u16 {
        self.url
            .port_or_known_default()
            .unwrap_or(if self.is_secure { 443 } else { 80 })
    }

    /// `host[:port]` exactly as the backend should see it in `Host`.
    pub fn authority(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{port}", self.host()),
            None => self.host().to_string(),
        }
    }

    pub fn base_path(&self) -> &str {
        self.url.path()
    }

    pub fn base_query(&self) -> Option<&str> {
        self.url.query()
    }

    /// Check if the URL is using HTTPS
    pub fn is_secure(&self) -> bool {
        self.is_secure
    }
}

impl FromStr for RouteTarget {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RouteTarget::new(s)
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Reusable forwarding handle for one target.
///
/// Built once when a routing table is installed so the request path only has
/// to splice the incoming path and query onto precomputed parts.
#[derive(Debug, Clone)]
pub struct Forwarder {
    scheme: Scheme,
    authority: Authority,
    host_header: HeaderValue,
    base_path: String,
    base_query: Option<String>,
}

impl Forwarder {
    pub fn new(target: &RouteTarget) -> TargetResult<Self> {
        let invalid = |reason: String| TargetError::InvalidAuthority {
            url: target.as_str().to_string(),
            reason,
        };

        let authority_str = target.authority();
        let authority =
            Authority::from_str(&authority_str).map_err(|e| invalid(e.to_string()))?;
        let host_header =
            HeaderValue::from_str(&authority_str).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            scheme: if target.is_secure() {
                Scheme::HTTPS
            } else {
                Scheme::HTTP
            },
            authority,
            host_header,
            base_path: target.base_path().to_string(),
            base_query: target.base_query().map(str::to_string),
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Value to send as the `Host` header to the backend.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_header
    }

    /// Point an incoming request URI at the target.
    ///
    /// The request path is appended to the target's base path with exactly
    /// one slash between them; target and request queries are joined by `&`.
    pub fn rewrite_uri(&self, original: &Uri) -> Result<Uri, http::Error> {
        let path = join_paths(&self.base_path, original.path());
        let query = [self.base_query.as_deref(), original.query()]
            .into_iter()
            .flatten()
            .filter(|q| !q.is_empty())
            .collect::<Vec<_>>()
            .join("&");

        let path_and_query = if query.is_empty() {
            path
        } else {
            format!("{path}?{query}")
        };

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) if !path.is_empty() => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}
