//! CORS origin policy.
//!
//! Allowed origins are either exact (`https://flow.example.com`) or a
//! wildcard over one host prefix (`https://*.vercel.app`), which matches any
//! origin with the same scheme whose host ends in `.vercel.app`.

use axum::http::{header, request::Parts, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// One entry of the allow-list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OriginPattern {
    Exact(String),
    /// `prefix` is the scheme including `://`, `suffix` starts with `.`.
    Wildcard { prefix: String, suffix: String },
}

impl OriginPattern {
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim().trim_end_matches('/');
        match pattern.split_once("://*") {
            Some((scheme, suffix)) if suffix.starts_with('.') => Self::Wildcard {
                prefix: format!("{scheme}://"),
                suffix: suffix.to_ascii_lowercase(),
            },
            _ => Self::Exact(pattern.to_ascii_lowercase()),
        }
    }

    pub fn matches(&self, origin: &str) -> bool {
        let origin = origin.to_ascii_lowercase();
        match self {
            Self::Exact(expected) => origin == *expected,
            Self::Wildcard { prefix, suffix } => {
                let Some(host) = origin.strip_prefix(prefix.as_str()) else {
                    return false;
                };
                let Some(subdomain) = host.strip_suffix(suffix.as_str()) else {
                    return false;
                };
                !subdomain.is_empty()
                    && !subdomain.contains(['/', '@', ':', '?', '#'])
                    && !subdomain.starts_with('.')
            }
        }
    }
}

/// The set of origins browsers may call the API from.
#[derive(Clone, Debug, Default)]
pub struct CorsPolicy {
    patterns: Vec<OriginPattern>,
}

impl CorsPolicy {
    pub fn new<S: AsRef<str>>(origins: &[S]) -> Self {
        Self {
            patterns: origins
                .iter()
                .map(|o| o.as_ref())
                .filter(|o| !o.trim().is_empty())
                .map(OriginPattern::parse)
                .collect(),
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(origin))
    }

    pub fn layer(&self) -> CorsLayer {
        if self.patterns.is_empty() {
            tracing::warn!("No CORS origins configured; browsers will be refused");
        }

        let policy = self.clone();
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .expose_headers([header::LOCATION])
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, _: &Parts| {
                    origin.to_str().map(|o| policy.allows(o)).unwrap_or(false)
                },
            ))
    }
}
