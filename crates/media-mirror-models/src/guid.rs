use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider namespace of a media GUID.
///
/// The order of the variants is the matching preference order: `plex://`
/// identifiers are issued by the shared metadata provider and are identical
/// on every server using the modern agent, so they make the most precise
/// cross-server join key, followed by the external databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GuidProvider {
    Plex,
    Imdb,
    Tmdb,
    Tvdb,
    Other,
}

impl GuidProvider {
    /// Matching preference rank (lower probes first).
    pub fn rank(self) -> u8 {
        match self {
            GuidProvider::Plex => 0,
            GuidProvider::Imdb => 1,
            GuidProvider::Tmdb => 2,
            GuidProvider::Tvdb => 3,
            GuidProvider::Other => 4,
        }
    }

    fn from_scheme(scheme: &str) -> Self {
        match scheme {
            "plex" => GuidProvider::Plex,
            "imdb" => GuidProvider::Imdb,
            "tmdb" | "themoviedb" => GuidProvider::Tmdb,
            "tvdb" | "thetvdb" => GuidProvider::Tvdb,
            _ => GuidProvider::Other,
        }
    }

    /// Canonical scheme used in the normalized GUID string.
    fn canonical_scheme(self, raw_scheme: &str) -> String {
        match self {
            GuidProvider::Plex => "plex".to_string(),
            GuidProvider::Imdb => "imdb".to_string(),
            GuidProvider::Tmdb => "tmdb".to_string(),
            GuidProvider::Tvdb => "tvdb".to_string(),
            GuidProvider::Other => raw_scheme.to_string(),
        }
    }
}

/// A normalized provider GUID, the cross-server join key.
///
/// Raw GUIDs arrive in several historical shapes:
/// - `imdb://tt1234567` (modern agent)
/// - `com.plexapp.agents.imdb://tt1234567?lang=en` (legacy agent)
/// - `plex://movie/5d776b5e1e5c36001f8e9b8a` (internal)
///
/// Normalization lowercases, rewrites the legacy agent prefix to the modern
/// scheme, and strips query suffixes, so items tagged by different agent
/// generations still join on the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guid {
    value: String,
    pub provider: GuidProvider,
}

const LEGACY_AGENT_PREFIX: &str = "com.plexapp.agents.";

impl Guid {
    /// Parse and normalize a raw GUID string. Returns `None` for strings
    /// that carry no identifier at all.
    pub fn parse(raw: &str) -> Option<Guid> {
        let raw = raw.trim().to_ascii_lowercase();
        if raw.is_empty() {
            return None;
        }

        let stripped = raw.strip_prefix(LEGACY_AGENT_PREFIX).unwrap_or(&raw);
        let (scheme, rest) = stripped.split_once("://")?;
        // Legacy agents append "?lang=en"; the identifier is everything
        // before the query.
        let rest = rest
            .split('?')
            .next()
            .and_then(|s| s.split('&').next())
            .unwrap_or("")
            .trim();
        if scheme.is_empty() || rest.is_empty() {
            return None;
        }

        let provider = GuidProvider::from_scheme(scheme);
        let value = format!("{}://{}", provider.canonical_scheme(scheme), rest);
        Some(Guid { value, provider })
    }

    /// The normalized GUID string used as the index key.
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modern_guid() {
        let guid = Guid::parse("imdb://tt1234567").unwrap();
        assert_eq!(guid.as_str(), "imdb://tt1234567");
        assert_eq!(guid.provider, GuidProvider::Imdb);
    }

    #[test]
    fn normalizes_legacy_agent_guid() {
        let guid = Guid::parse("com.plexapp.agents.imdb://tt1234567?lang=en").unwrap();
        assert_eq!(guid.as_str(), "imdb://tt1234567");
        assert_eq!(guid.provider, GuidProvider::Imdb);
    }

    #[test]
    fn normalizes_legacy_tmdb_scheme_name() {
        let guid = Guid::parse("com.plexapp.agents.themoviedb://603?lang=en").unwrap();
        assert_eq!(guid.as_str(), "tmdb://603");
        assert_eq!(guid.provider, GuidProvider::Tmdb);
    }

    #[test]
    fn lowercases_and_trims() {
        let guid = Guid::parse("  IMDB://TT0133093  ").unwrap();
        assert_eq!(guid.as_str(), "imdb://tt0133093");
    }

    #[test]
    fn classifies_internal_guid() {
        let guid = Guid::parse("plex://movie/5d776b5e1e5c36001f8e9b8a").unwrap();
        assert_eq!(guid.provider, GuidProvider::Plex);
    }

    #[test]
    fn unknown_scheme_is_other() {
        let guid = Guid::parse("anidb://12345").unwrap();
        assert_eq!(guid.provider, GuidProvider::Other);
        assert_eq!(guid.as_str(), "anidb://12345");
    }

    #[test]
    fn rejects_empty_and_malformed() {
        assert!(Guid::parse("").is_none());
        assert!(Guid::parse("   ").is_none());
        assert!(Guid::parse("no-scheme-here").is_none());
        assert!(Guid::parse("imdb://").is_none());
    }

    #[test]
    fn preference_rank_orders_plex_first() {
        assert!(GuidProvider::Plex.rank() < GuidProvider::Imdb.rank());
        assert!(GuidProvider::Imdb.rank() < GuidProvider::Tmdb.rank());
        assert!(GuidProvider::Tvdb.rank() < GuidProvider::Other.rank());
    }
}
