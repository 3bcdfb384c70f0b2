//! # Addresses
//!
//! A structured location: ordered non-empty path segments plus a flat
//! query map. This is what the host hands us on a deep link and what we
//! hand back as the current location.
//!
//! ```text
//! app://host/users/42?tab=posts#top
//!            └──┬───┘ └───┬───┘
//!            segments    query        (scheme, authority, fragment dropped)
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use url::{Url, form_urlencoded};

/// Relative addresses are resolved against this.
const BASE: &str = "app://host/";

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub segments: Vec<String>,
    pub query: BTreeMap<String, String>,
}

impl Address {
    /// The default root address, `/`.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
            query: BTreeMap::new(),
        }
    }

    /// Parses a URI-ish string. Never fails: anything unrecognised simply
    /// contributes no segments.
    ///
    /// Absolute URLs keep only their path and query. Everything else is
    /// read relative to [`BASE`], so `/a`, `a` and `?x=1` all work.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let url = match Url::parse(input) {
            Ok(url) if url.has_host() => Some(url),
            _ => Url::parse(&format!("{BASE}{}", input.trim_start_matches('/'))).ok(),
        };
        let Some(url) = url else {
            return Self::root();
        };

        let segments = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(|s| urlencoding::decode(s).map_or_else(|_| s.to_string(), Cow::into_owned))
                    .collect()
            })
            .unwrap_or_default();

        let query = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Self { segments, query }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path part only, without the query (`/a/b`). Segments are
    /// percent-encoded where they would otherwise break parsing.
    pub fn path(&self) -> String {
        let Ok(mut url) = Url::parse(BASE) else {
            return format!("/{}", self.segments.join("/"));
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.clear().extend(&self.segments);
        }
        url.path().to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())?;
        if !self.query.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.query)
                .finish();
            write!(f, "?{query}")?;
        }
        Ok(())
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Address::parse(value)
    }
}

// Serialized as its display string so config files stay readable.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Address::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_path() {
        let addr = Address::parse("/users/42");
        assert_eq!(addr.segments, vec!["users", "42"]);
        assert!(addr.query.is_empty());
    }

    #[test]
    fn test_parse_drops_empty_segments() {
        assert_eq!(Address::parse("//a///b/").segments, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_root_variants() {
        assert!(Address::parse("/").is_root());
        assert!(Address::parse("").is_root());
        assert!(Address::parse("app://host").is_root());
    }

    #[test]
    fn test_parse_strips_scheme_and_fragment() {
        let addr = Address::parse("app://example.com/feed/7?sort=new#comments");
        assert_eq!(addr.segments, vec!["feed", "7"]);
        assert_eq!(addr.query.get("sort").map(String::as_str), Some("new"));
    }

    #[test]
    fn test_parse_query_without_value() {
        let addr = Address::parse("/search?q=rust&debug");
        assert_eq!(addr.query.get("q").map(String::as_str), Some("rust"));
        assert_eq!(addr.query.get("debug").map(String::as_str), Some(""));
    }

    #[test]
    fn test_parse_keeps_path_when_query_holds_a_url() {
        let addr = Address::parse("/login?next=https://example.com/home");
        assert_eq!(addr.segments, vec!["login"]);
        assert_eq!(
            addr.query.get("next").map(String::as_str),
            Some("https://example.com/home")
        );
    }

    #[test]
    fn test_parse_decodes_percent_escapes() {
        let addr = Address::parse("/search?q=hello%20world");
        assert_eq!(addr.query.get("q").map(String::as_str), Some("hello world"));
        assert_eq!(Address::parse("/tags/c%2B%2B").segments, vec!["tags", "c++"]);
    }

    #[test]
    fn test_reserved_characters_survive_display() {
        let addr = Address::from_segments(["search", "a/b"]).with_query("q", "a&b=c #1?");
        let text = addr.to_string();
        assert_eq!(Address::parse(&text), addr);

        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            at: Address,
        }
        let toml_text = toml::to_string(&Wrapper { at: addr.clone() }).unwrap();
        let back: Wrapper = toml::from_str(&toml_text).unwrap();
        assert_eq!(back.at, addr);
    }

    #[test]
    fn test_display_keeps_pattern_params_readable() {
        assert_eq!(Address::parse("/users/:id").to_string(), "/users/:id");
    }

    #[test]
    fn test_display_sorts_query_keys() {
        let addr = Address::from_segments(["a"])
            .with_query("z", "1")
            .with_query("b", "2");
        assert_eq!(addr.to_string(), "/a?b=2&z=1");
    }

    #[test]
    fn test_root_displays_as_slash() {
        assert_eq!(Address::root().to_string(), "/");
    }

    #[test]
    fn test_serde_uses_display_form() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            at: Address,
        }
        let parsed: Wrapper = toml::from_str(r#"at = "/a/b?x=1""#).unwrap();
        assert_eq!(parsed.at, Address::parse("/a/b?x=1"));
        let out = toml::to_string(&parsed).unwrap();
        assert!(out.contains(r#"at = "/a/b?x=1""#));
    }
}
