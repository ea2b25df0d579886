//! Origin allow-list
//!
//! Browsers send an `Origin` header with every WebSocket upgrade and CORS
//! request. Connections are accepted only from configured origins; `*` in the
//! list accepts anything, including clients that send no origin at all.

use crate::config::Config;
use crate::error::ConnectError;

/// Wildcard entry accepting every origin
const ANY_ORIGIN: &str = "*";

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Outcome of an `onRequest` check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// An `OPTIONS` preflight the host should answer directly with `200`
    pub preflight: bool,
    /// CORS headers to attach to the response
    pub headers: Vec<(&'static str, String)>,
}

/// Allow-list of origins permitted to connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|origin| normalize(origin.as_ref()))
                .collect(),
        }
    }

    /// Policy for the configured origins, including development entries
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.effective_origins())
    }

    fn allows_any(&self) -> bool {
        self.allowed.iter().any(|o| o == ANY_ORIGIN)
    }

    /// Check an origin header value against the allow-list
    pub fn check(&self, origin: Option<&str>) -> Result<(), ConnectError> {
        if self.allows_any() {
            return Ok(());
        }

        let origin = origin.ok_or(ConnectError::MissingOrigin)?;
        let normalized = normalize(origin);
        if self.allowed.iter().any(|o| *o == normalized) {
            Ok(())
        } else {
            Err(ConnectError::OriginRejected {
                origin: origin.to_string(),
            })
        }
    }

    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        self.check(origin).is_ok()
    }

    /// Decide an incoming HTTP request and build its CORS headers
    ///
    /// Denied requests carry no headers, so browsers refuse the response.
    pub fn on_request(&self, origin: Option<&str>, method: &str) -> RequestDecision {
        let preflight = method.eq_ignore_ascii_case("OPTIONS");

        if !self.is_allowed(origin) {
            return RequestDecision {
                allowed: false,
                preflight,
                headers: Vec::new(),
            };
        }

        let allow_origin = origin.unwrap_or(ANY_ORIGIN).to_string();
        let mut headers = vec![
            ("Access-Control-Allow-Origin", allow_origin),
            ("Access-Control-Allow-Methods", ALLOW_METHODS.to_string()),
            ("Access-Control-Allow-Headers", ALLOW_HEADERS.to_string()),
        ];
        // Credentials cannot be combined with a wildcard origin
        if origin.is_some() {
            headers.push(("Access-Control-Allow-Credentials", "true".to_string()));
        }
        if !self.allows_any() {
            headers.push(("Vary", "Origin".to_string()));
        }

        RequestDecision {
            allowed: true,
            preflight,
            headers,
        }
    }
}

fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}
