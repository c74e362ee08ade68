use media_mirror_models::{Guid, MediaItem};
use media_mirror_sources::{MediaServer, ServerError};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Counters recorded while building the index, surfaced in the run summary.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IndexStats {
    pub items_indexed: usize,
    pub guids_indexed: usize,
    pub collisions: usize,
    pub sections_skipped: usize,
}

/// GUID → destination item lookup table for one run.
///
/// Built exactly once from a full destination enumeration, read-only
/// afterwards. A GUID legitimately shared by two destination items keeps
/// the first-seen mapping; the collision is a warning, not an error, so a
/// mistagged library degrades instead of aborting a migration.
pub struct CatalogIndex {
    by_guid: HashMap<String, MediaItem>,
    stats: IndexStats,
}

/// Called after each destination section is indexed: (section title, items).
pub type SectionObserver<'a> = &'a (dyn Fn(&str, usize) + Send + Sync);

impl CatalogIndex {
    pub async fn build(server: &dyn MediaServer) -> Result<CatalogIndex, ServerError> {
        Self::build_with_observer(server, &|_, _| {}).await
    }

    /// Enumerate every movie/show section on the destination and index each
    /// item under all of its GUIDs. A section that fails to enumerate is
    /// skipped (partial index); matches that would have landed in it simply
    /// come back unresolved downstream.
    pub async fn build_with_observer(
        server: &dyn MediaServer,
        observer: SectionObserver<'_>,
    ) -> Result<CatalogIndex, ServerError> {
        let mut index = CatalogIndex { by_guid: HashMap::new(), stats: IndexStats::default() };

        for section in server.sections().await? {
            if !section.kind.is_video() {
                continue;
            }
            debug!("Indexing destination section '{}'", section.title);
            match server.section_leaf_items(&section).await {
                Ok(items) => {
                    let count = items.len();
                    for item in items {
                        index.insert(item);
                    }
                    observer(&section.title, count);
                }
                Err(e) => {
                    warn!("Failed to index section '{}', skipping: {}", section.title, e);
                    index.stats.sections_skipped += 1;
                }
            }
        }

        info!(
            "Indexed {} GUIDs across {} destination items ({} collisions, {} sections skipped)",
            index.stats.guids_indexed,
            index.stats.items_indexed,
            index.stats.collisions,
            index.stats.sections_skipped
        );
        Ok(index)
    }

    /// Build from already-enumerated items. Used by the self checks and by
    /// anything that needs an index without a live server.
    pub fn from_items(items: impl IntoIterator<Item = MediaItem>) -> CatalogIndex {
        let mut index = CatalogIndex { by_guid: HashMap::new(), stats: IndexStats::default() };
        for item in items {
            index.insert(item);
        }
        index
    }

    fn insert(&mut self, item: MediaItem) {
        self.stats.items_indexed += 1;
        for guid in &item.guids {
            match self.by_guid.get(guid.as_str()) {
                Some(existing) => {
                    warn!(
                        "GUID {} is claimed by both '{}' and '{}'; keeping the first",
                        guid,
                        existing.title,
                        item.title
                    );
                    self.stats.collisions += 1;
                }
                None => {
                    self.by_guid.insert(guid.as_str().to_string(), item.clone());
                    self.stats.guids_indexed += 1;
                }
            }
        }
    }

    pub fn lookup(&self, guid: &Guid) -> Option<&MediaItem> {
        self.by_guid.get(guid.as_str())
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.by_guid.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_mirror_models::ItemKind;

    fn item(key: &str, title: &str, guids: &[&str]) -> MediaItem {
        MediaItem::new(key, title, ItemKind::Movie)
            .with_guids(guids.iter().filter_map(|g| Guid::parse(g)).collect())
    }

    #[test]
    fn collision_keeps_first_insertion() {
        let index = CatalogIndex::from_items(vec![
            item("1", "First", &["imdb://tt001"]),
            item("2", "Second", &["imdb://tt001", "tmdb://2"]),
        ]);
        let guid = Guid::parse("imdb://tt001").unwrap();
        assert_eq!(index.lookup(&guid).unwrap().title, "First");
        // The non-colliding GUID of the second item still resolves.
        let tmdb = Guid::parse("tmdb://2").unwrap();
        assert_eq!(index.lookup(&tmdb).unwrap().title, "Second");
        assert_eq!(index.stats().collisions, 1);
        assert_eq!(index.stats().items_indexed, 2);
        assert_eq!(index.stats().guids_indexed, 2);
    }

    #[test]
    fn items_without_guids_are_counted_but_unreachable() {
        let index = CatalogIndex::from_items(vec![item("1", "Untagged", &[])]);
        assert_eq!(index.stats().items_indexed, 1);
        assert!(index.is_empty());
    }
}
