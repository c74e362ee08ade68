use crate::index::CatalogIndex;
use media_mirror_models::{Guid, MatchResult, MediaItem};

/// Resolve a source item to at most one destination item.
///
/// GUIDs are probed in provider preference order (internal scheme first,
/// then imdb, tmdb, tvdb, then anything else in the item's own order); the
/// first index hit wins. Pure function of the index and the item's GUID
/// set: same inputs, same result.
pub fn resolve<'a>(item: &MediaItem, index: &'a CatalogIndex) -> MatchResult<'a> {
    let mut guids: Vec<&Guid> = item.guids.iter().collect();
    // Stable sort: ties keep the item's original GUID order.
    guids.sort_by_key(|g| g.provider.rank());

    for guid in guids {
        if let Some(hit) = index.lookup(guid) {
            return MatchResult::Matched(hit);
        }
    }
    MatchResult::Unmatched
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_mirror_models::ItemKind;

    fn item(key: &str, title: &str, guids: &[&str]) -> MediaItem {
        MediaItem::new(key, title, ItemKind::Movie)
            .with_guids(guids.iter().filter_map(|g| Guid::parse(g)).collect())
    }

    fn sample_index() -> CatalogIndex {
        CatalogIndex::from_items(vec![
            item("d1", "The Matrix", &["plex://movie/abc", "imdb://tt0133093", "tmdb://603"]),
            item("d2", "The Matrix (4K edition)", &["tmdb://603999"]),
            item("d3", "Heat", &["imdb://tt0113277"]),
        ])
    }

    #[test]
    fn first_hit_in_preference_order_wins() {
        let index = sample_index();
        // tmdb would hit d2, but the imdb GUID ranks higher and hits d1.
        let source = item("s1", "The Matrix", &["tmdb://603999", "imdb://tt0133093"]);
        let resolved = resolve(&source, &index).matched().unwrap();
        assert_eq!(resolved.item_key, "d1");
    }

    #[test]
    fn no_guid_overlap_is_unresolved() {
        let index = sample_index();
        let source = item("s2", "Unknown Film", &["imdb://tt9999999"]);
        assert!(!resolve(&source, &index).is_matched());
        let empty = item("s3", "No GUIDs", &[]);
        assert!(!resolve(&empty, &index).is_matched());
    }

    #[test]
    fn resolution_is_deterministic() {
        let index = sample_index();
        let source = item("s4", "Heat", &["tvdb://5", "imdb://tt0113277"]);
        let first = resolve(&source, &index).matched().map(|i| i.item_key.clone());
        for _ in 0..10 {
            let again = resolve(&source, &index).matched().map(|i| i.item_key.clone());
            assert_eq!(first, again);
        }
    }

    #[test]
    fn legacy_agent_guid_resolves_against_modern_index() {
        let index = sample_index();
        let source = item(
            "s5",
            "The Matrix",
            &["com.plexapp.agents.imdb://tt0133093?lang=en"],
        );
        let resolved = resolve(&source, &index).matched().unwrap();
        assert_eq!(resolved.item_key, "d1");
    }
}
