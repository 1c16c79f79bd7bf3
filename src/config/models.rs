//! Configuration data structures for hostgate.
//!
//! The routing document is a JSON object whose `routes` field maps host names
//! to target URLs:
//!
//! ```json
//! {"routes": {"app.example.com": "http://127.0.0.1:9000"}}
//! ```
//!
//! [`RoutesDocument`] is the raw, serde-facing shape of that file. It is
//! turned into a [`RouteConfig`], where every entry has been validated on its
//! own so one bad target never poisons the rest.
use std::fmt;

use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, Visitor},
};

use crate::{
    config::validation::{ValidationError, validate_route},
    core::backend::RouteTarget,
};

/// Raw routing document as found on disk.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RoutesDocument {
    #[serde(default)]
    pub routes: Option<RouteMap>,
}

impl RoutesDocument {
    /// Host/target pairs in document order.
    pub fn pairs(&self) -> &[(String, String)] {
        self.routes.as_ref().map(RouteMap::pairs).unwrap_or_default()
    }
}

/// Host → target pairs that keep the order they were written in.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouteMap(Vec<(String, String)>);

impl RouteMap {
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

impl<'de> Deserialize<'de> for RouteMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RouteMapVisitor;

        impl<'de> Visitor<'de> for RouteMapVisitor {
            type Value = RouteMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of host names to target URL strings")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((host, target)) = access.next_entry::<String, String>()? {
                    pairs.push((host, target));
                }
                Ok(RouteMap(pairs))
            }
        }

        deserializer.deserialize_map(RouteMapVisitor)
    }
}

/// A validated route: the host it answers for and where it forwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    host: String,
    target: RouteTarget,
}

impl RouteEntry {
    pub fn new(host: impl Into<String>, target: RouteTarget) -> Self {
        Self {
            host: host.into(),
            target,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn target(&self) -> &RouteTarget {
        &self.target
    }
}

/// An entry that was skipped during loading, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRoute {
    pub host: String,
    pub target: String,
    pub reason: ValidationError,
}

/// Ordered set of routes produced by one load cycle.
///
/// Only exists between reading the configuration and installing it into a
/// [`RouteTable`](crate::core::RouteTable).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteConfig {
    entries: Vec<RouteEntry>,
    rejected: Vec<RejectedRoute>,
}

impl RouteConfig {
    /// A configuration with no routes; every host resolves to not-found.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate each host/target pair independently, keeping the good ones in
    /// order and recording the rest.
    pub fn from_pairs<I, H, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (H, T)>,
        H: AsRef<str>,
        T: AsRef<str>,
    {
        let mut config = Self::default();
        for (host, target) in pairs {
            let (host, target) = (host.as_ref(), target.as_ref());
            match validate_route(host, target) {
                Ok(entry) => config.entries.push(entry),
                Err(reason) => config.rejected.push(RejectedRoute {
                    host: host.to_string(),
                    target: target.to_string(),
                    reason,
                }),
            }
        }
        config
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn rejected(&self) -> &[RejectedRoute] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&RoutesDocument> for RouteConfig {
    fn from(document: &RoutesDocument) -> Self {
        RouteConfig::from_pairs(
            document
                .pairs()
                .iter()
                .map(|(host, target)| (host.as_str(), target.as_str())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_map_keeps_document_order() {
        let document: RoutesDocument = serde_json::from_str(
            r#"{"routes": {"z.test": "http://127.0.0.1:1", "a.test": "http://127.0.0.1:2"}}"#,
        )
        .unwrap();

        let hosts: Vec<_> = document.pairs().iter().map(|(h, _)| h.as_str()).collect();
        assert_eq!(hosts, ["z.test", "a.test"]);
    }

    #[test]
    fn test_missing_or_null_routes_is_empty() {
        let document: RoutesDocument = serde_json::from_str(r#"{"other": 1}"#).unwrap();
        assert!(document.pairs().is_empty());

        let document: RoutesDocument = serde_json::from_str(r#"{"routes": null}"#).unwrap();
        assert!(document.pairs().is_empty());
    }

    #[test]
    fn test_non_string_target_is_a_decode_error() {
        let result = serde_json::from_str::<RoutesDocument>(r#"{"routes": {"a.test": 9000}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_pairs_skips_only_malformed_entries() {
        let config = RouteConfig::from_pairs([
            ("a.test", "http://127.0.0.1:9001"),
            ("broken.test", "::not a url::"),
            ("b.test", "https://backend.internal"),
            ("", "http://127.0.0.1:9003"),
        ]);

        assert_eq!(config.len(), 2);
        let hosts: Vec<_> = config.entries().iter().map(RouteEntry::host).collect();
        assert_eq!(hosts, ["a.test", "b.test"]);

        assert_eq!(config.rejected().len(), 2);
        assert_eq!(config.rejected()[0].host, "broken.test");
        assert_eq!(config.rejected()[1].reason, ValidationError::EmptyHost);
    }
}
