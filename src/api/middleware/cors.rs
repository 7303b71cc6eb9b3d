//! Cross-origin policy for the browser frontend.
//!
//! Origins are matched against an allow-list of patterns. A pattern may
//! contain at most one `*`, which stands for a non-empty run of characters inside a
//! single host label, e.g. `https://app-*.vercel.app` admits
//! `https://app-git-main.vercel.app` but not `https://app-x.evil.com/.vercel.app`.
//! Allowed origins get credentials, and every method and header the
//! preflight asks for is mirrored back.

use axum::http::request::Parts;
use axum::http::HeaderValue;
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

#[derive(Error, Debug, PartialEq, Eq)]
#[error("origin pattern {0:?} has more than one '*'")]
pub struct InvalidOriginPattern(pub String);

/// One allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPattern {
    Exact(String),
    Wildcard { prefix: String, suffix: String },
}

impl OriginPattern {
    pub fn parse(pattern: &str) -> Result<Self, InvalidOriginPattern> {
        let pattern = pattern.trim().trim_end_matches('/');
        match pattern.split_once('*') {
            Some((_, suffix)) if suffix.contains('*') => {
                Err(InvalidOriginPattern(pattern.to_string()))
            }
            Some((prefix, suffix)) => Ok(OriginPattern::Wildcard {
                prefix: prefix.to_ascii_lowercase(),
                suffix: suffix.to_ascii_lowercase(),
            }),
            None => Ok(OriginPattern::Exact(pattern.to_ascii_lowercase())),
        }
    }

    pub fn matches(&self, origin: &str) -> bool {
        let origin = origin.to_ascii_lowercase();
        match self {
            OriginPattern::Exact(exact) => origin == *exact,
            OriginPattern::Wildcard { prefix, suffix } => {
                if origin.len() <= prefix.len() + suffix.len() {
                    return false;
                }
                if !origin.starts_with(prefix.as_str()) || !origin.ends_with(suffix.as_str()) {
                    return false;
                }
                let middle = &origin[prefix.len()..origin.len() - suffix.len()];
                !middle.contains(&['.', '/', ':', '@'][..])
            }
        }
    }
}

/// Build the CORS layer for a set of origin patterns.
///
/// Invalid patterns are skipped with a warning; `ServiceConfig` rejects them
/// at startup.
pub fn cors_layer<I, S>(patterns: I) -> CorsLayer
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let patterns: Vec<OriginPattern> = patterns
        .into_iter()
        .filter_map(|p| match OriginPattern::parse(p.as_ref()) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!("Ignoring CORS origin: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|o| patterns.iter().any(|p| p.matches(o)))
                    .unwrap_or(false)
            },
        ))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
