use std::time::Duration;

/// Maximum age of an inbound request, in seconds.
pub const DEFAULT_TTL: u64 = 300;

/// Headers every inbound signature must cover.
pub const MANDATORY_HEADERS: [&str; 3] = ["content-length", "date", "host"];

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub ttl: Duration,
    /// Required on top of [`MANDATORY_HEADERS`].
    pub enforced_headers: Vec<String>,
    /// Treat `Digest` as mandatory instead of checking it only when present.
    pub require_digest: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL),
            enforced_headers: Vec::new(),
            require_digest: false,
        }
    }
}

impl VerifierConfig {
    /// Full set of headers a `Signature` must declare, lowercased.
    pub fn required_headers(&self) -> Vec<String> {
        let mut required: Vec<String> = MANDATORY_HEADERS.iter().map(|h| h.to_string()).collect();
        let extra = self
            .enforced_headers
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .chain(self.require_digest.then(|| "digest".to_string()));
        for header in extra {
            if !header.is_empty() && !required.contains(&header) {
                required.push(header);
            }
        }
        required
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Key fetches sit on the authentication path, keep this short.
    pub fetch_timeout: Duration,
    /// `None` keeps entries until replaced or invalidated.
    pub cache_ttl: Option<Duration>,
    pub max_redirects: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(5),
            cache_ttl: Some(Duration::from_secs(3600)),
            max_redirects: 5,
        }
    }
}
