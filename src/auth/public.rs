//! Allowlist of routes reachable without a bearer token.
//!
//! Entries are written as `path[:METHOD]`, separated by commas, for example
//! `/api/auth/**:POST,/api/users:POST,/health:GET`. In a path, `**` matches any
//! remainder (slashes included) and `*` matches a single path segment. An entry
//! without a method matches every method. Anything not listed requires
//! authentication.

use actix_web::http::Method;
use regex::Regex;
use std::str::FromStr;

use crate::config::ConfigError;

pub const DEFAULT_PUBLIC_ENDPOINTS: &str = "/api/auth/**:POST,/api/users:POST,/health:GET";

#[derive(Debug, Clone)]
struct PublicEndpoint {
    pattern: Regex,
    method: Option<Method>,
}

impl PublicEndpoint {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.as_ref().map_or(true, |m| m == method) && self.pattern.is_match(path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PublicEndpoints {
    endpoints: Vec<PublicEndpoint>,
}

impl PublicEndpoints {
    /// Parses a comma-separated allowlist. Blank entries are ignored.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        let mut endpoints = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (path, method) = match entry.split_once(':') {
                Some((path, method)) => {
                    let method = Method::from_str(&method.trim().to_ascii_uppercase())
                        .map_err(|_| ConfigError::Invalid("PUBLIC_ENDPOINTS", entry.to_string()))?;
                    (path.trim(), Some(method))
                }
                None => (entry, None),
            };
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid("PUBLIC_ENDPOINTS", entry.to_string()));
            }
            let pattern = Regex::new(&glob_to_regex(path))
                .map_err(|_| ConfigError::Invalid("PUBLIC_ENDPOINTS", entry.to_string()))?;
            endpoints.push(PublicEndpoint { pattern, method });
        }
        log::debug!("Configured {} public endpoint(s)", endpoints.len());
        Ok(Self { endpoints })
    }

    pub fn is_public(&self, method: &Method, path: &str) -> bool {
        self.endpoints.iter().any(|e| e.matches(method, path))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

fn glob_to_regex(path: &str) -> String {
    let mut out = String::from("^");
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix("/**") {
            // "/api/auth/**" also matches "/api/auth" itself.
            out.push_str("(/.*)?");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("**") {
            out.push_str(".*");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('*') {
            out.push_str("[^/]*");
            rest = tail;
        } else {
            let next = rest.find('*').unwrap_or(rest.len());
            // Keep "/" before a "**" for the branch above.
            let next = if rest[..next].ends_with('/') && rest[next..].starts_with("**") {
                next - 1
            } else {
                next
            };
            out.push_str(&regex::escape(&rest[..next]));
            rest = &rest[next..];
        }
    }
    out.push('$');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allowlist() {
        let public = PublicEndpoints::parse(DEFAULT_PUBLIC_ENDPOINTS).unwrap();
        assert_eq!(public.len(), 3);

        assert!(public.is_public(&Method::POST, "/api/auth/login"));
        assert!(public.is_public(&Method::POST, "/api/users"));
        assert!(public.is_public(&Method::GET, "/health"));

        assert!(!public.is_public(&Method::GET, "/api/auth/login"));
        assert!(!public.is_public(&Method::GET, "/api/users"));
        assert!(!public.is_public(&Method::POST, "/api/users/1"));
        assert!(!public.is_public(&Method::GET, "/api/tasks"));
        assert!(!public.is_public(&Method::POST, "/api/authx/login"));
    }

    #[test]
    fn test_double_star_matches_nested_and_root() {
        let public = PublicEndpoints::parse("/docs/**").unwrap();
        assert!(public.is_public(&Method::GET, "/docs"));
        assert!(public.is_public(&Method::GET, "/docs/a/b/c"));
        assert!(public.is_public(&Method::DELETE, "/docs/a"));
        assert!(!public.is_public(&Method::GET, "/docsx"));
    }

    #[test]
    fn test_single_star_matches_one_segment() {
        let public = PublicEndpoints::parse("/files/*/meta:get").unwrap();
        assert!(public.is_public(&Method::GET, "/files/42/meta"));
        assert!(!public.is_public(&Method::GET, "/files/42/43/meta"));
        assert!(!public.is_public(&Method::POST, "/files/42/meta"));
    }

    #[test]
    fn test_literal_characters_are_escaped() {
        let public = PublicEndpoints::parse("/a.b").unwrap();
        assert!(public.is_public(&Method::GET, "/a.b"));
        assert!(!public.is_public(&Method::GET, "/axb"));
    }

    #[test]
    fn test_empty_allowlist_denies_everything() {
        let public = PublicEndpoints::parse(" , ").unwrap();
        assert!(public.is_empty());
        assert!(!public.is_public(&Method::POST, "/api/auth/login"));
    }

    #[test]
    fn test_invalid_entries_are_rejected() {
        assert!(PublicEndpoints::parse("api/users").is_err());
        assert!(PublicEndpoints::parse("/api/users:NOT A METHOD").is_err());
    }
}
