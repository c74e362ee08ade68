use crate::batch::{BatchWriter, ContainerSink, FillMode, RecordingSink, DEFAULT_BATCH_SIZE};
use crate::filter::NameFilter;
use crate::index::CatalogIndex;
use crate::matcher;
use crate::summary::RunSummary;
use crate::template::NameTemplate;
use async_trait::async_trait;
use media_mirror_models::{MatchResult, MediaItem, PlaylistSpec};
use media_mirror_sources::{MediaServer, PlaylistInfo, ServerError};
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PlaylistOptions {
    pub replace: bool,
    pub materialize_smart: bool,
    pub batch_size: usize,
    pub rename: NameTemplate,
    pub filter: NameFilter,
}

impl Default for PlaylistOptions {
    fn default() -> Self {
        Self {
            replace: false,
            materialize_smart: false,
            batch_size: DEFAULT_BATCH_SIZE,
            rename: NameTemplate::default(),
            filter: NameFilter::open(),
        }
    }
}

/// `ContainerSink` over a destination playlist. Creation stores the key
/// the server hands back so the following adds target the right container.
pub(crate) struct PlaylistSink<'a> {
    server: &'a dyn MediaServer,
    name: String,
    key: Option<String>,
}

impl<'a> PlaylistSink<'a> {
    pub(crate) fn for_new(server: &'a dyn MediaServer, name: &str) -> Self {
        Self { server, name: name.to_string(), key: None }
    }

    fn key(&self) -> Result<&str, ServerError> {
        self.key
            .as_deref()
            .ok_or_else(|| ServerError::InvalidResponse("playlist has not been created".into()))
    }
}

#[async_trait]
impl ContainerSink for PlaylistSink<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_seeded(&mut self, seed: &MediaItem) -> Result<(), ServerError> {
        let key = self.server.create_playlist(&self.name, seed).await?;
        self.key = Some(key);
        Ok(())
    }

    async fn create_seeded_manual(&mut self, seed: &MediaItem) -> Result<(), ServerError> {
        let key = self.server.create_playlist_via_uri(&self.name, seed).await?;
        self.key = Some(key);
        Ok(())
    }

    async fn bulk_add(&mut self, items: &[MediaItem]) -> Result<(), ServerError> {
        let key = self.key()?.to_string();
        self.server.add_playlist_items(&key, items).await
    }

    async fn add_single(&mut self, item: &MediaItem) -> Result<(), ServerError> {
        let key = self.key()?.to_string();
        self.server.add_playlist_items(&key, std::slice::from_ref(item)).await
    }
}

/// Recreates source playlists on the destination, one at a time. Every
/// per-playlist failure is recorded and the loop moves on; only the
/// initial source listing can end the phase early.
pub struct PlaylistReconciler<'a> {
    source: &'a dyn MediaServer,
    dest: &'a dyn MediaServer,
    index: &'a CatalogIndex,
    options: &'a PlaylistOptions,
    dry_run: bool,
}

impl<'a> PlaylistReconciler<'a> {
    pub fn new(
        source: &'a dyn MediaServer,
        dest: &'a dyn MediaServer,
        index: &'a CatalogIndex,
        options: &'a PlaylistOptions,
        dry_run: bool,
    ) -> Self {
        Self { source, dest, index, options, dry_run }
    }

    pub async fn run(&self, summary: &mut RunSummary) {
        let playlists = match self.source.playlists().await {
            Ok(playlists) => playlists,
            Err(e) => {
                summary.record_error(format!("Failed to list source playlists: {}", e));
                return;
            }
        };
        info!("Found {} playlists on source", playlists.len());
        summary.playlists.found = playlists.len();

        for playlist in &playlists {
            self.reconcile_one(playlist, summary).await;
        }
        info!(
            "Playlists done: {} created, {} replaced, {} skipped, {} failed",
            summary.playlists.created,
            summary.playlists.replaced,
            summary.playlists.skipped,
            summary.playlists.failed
        );
    }

    async fn reconcile_one(&self, playlist: &PlaylistInfo, summary: &mut RunSummary) {
        let name = &playlist.title;
        if !self.options.filter.keeps(name) {
            debug!("Skip playlist '{}' due to name filter", name);
            summary.playlists.skipped += 1;
            return;
        }
        if playlist.smart && !self.options.materialize_smart {
            info!(
                "Skipping smart playlist '{}' (materialization not requested)",
                name
            );
            summary.playlists.skipped += 1;
            return;
        }
        if !playlist.is_video() {
            info!(
                "Skipping non-video playlist '{}' of type '{}'",
                name, playlist.playlist_type
            );
            summary.playlists.skipped += 1;
            return;
        }

        // For smart playlists this snapshot is the materialization: the
        // currently-resolved member list becomes a static ordered list.
        let source_items = match self.source.playlist_items(&playlist.key).await {
            Ok(items) => items,
            Err(e) => {
                summary.record_error(format!("Failed to list items of playlist '{}': {}", name, e));
                summary.playlists.failed += 1;
                return;
            }
        };
        let spec = PlaylistSpec::new(name.clone(), playlist.smart, source_items);
        debug!("Playlist '{}': {} items after source dedup", name, spec.len());

        let (matched, unmatched_count) = self.resolve_ordered(&spec, summary);
        debug!("  Matched {} of {} items for '{}'", matched.len(), spec.len(), name);

        if matched.is_empty() {
            warn!("No destination items matched for '{}'; skipping create", name);
            summary.playlists.skipped += 1;
            return;
        }

        let dest_name = self.options.rename.apply(name);
        let existing = match self.find_existing(&dest_name).await {
            Ok(existing) => existing,
            Err(e) => {
                summary.record_error(format!(
                    "Failed to look up destination playlist '{}': {}",
                    dest_name, e
                ));
                summary.playlists.failed += 1;
                return;
            }
        };

        let mode = match existing {
            Some(_) if !self.options.replace => {
                info!(
                    "Playlist '{}' already exists on destination; skipping (replace not requested)",
                    dest_name
                );
                summary.playlists.skipped += 1;
                return;
            }
            Some(ref found) => {
                if self.dry_run {
                    info!("[dry-run] Would delete existing playlist '{}'", dest_name);
                } else {
                    info!("Deleting existing playlist '{}'", dest_name);
                    if let Err(e) = self.dest.delete_playlist(&found.key).await {
                        summary.record_error(format!(
                            "Failed to delete playlist '{}': {}",
                            dest_name, e
                        ));
                        summary.playlists.failed += 1;
                        return;
                    }
                }
                FillMode::Replace
            }
            None => FillMode::Create,
        };

        let writer = BatchWriter::new(self.options.batch_size);
        let report = if self.dry_run {
            let mut sink = RecordingSink::new(&dest_name);
            writer.fill(&mut sink, &matched, mode).await
        } else {
            let mut sink = PlaylistSink::for_new(self.dest, &dest_name);
            writer.fill(&mut sink, &matched, mode).await
        };

        if let Some(ref reason) = report.container_failed {
            summary.record_error(format!("Playlist '{}' could not be created: {}", dest_name, reason));
            summary.playlists.failed += 1;
        } else {
            match mode {
                FillMode::Replace => summary.playlists.replaced += 1,
                _ => summary.playlists.created += 1,
            }
            info!(
                "{}Created '{}' with {} items ({} unmatched)",
                if self.dry_run { "[dry-run] " } else { "" },
                dest_name,
                report.total_added(),
                unmatched_count
            );
        }
        summary.absorb_report(&report);
    }

    /// Resolve the ordered source sequence against the index: unmatched
    /// items are dropped and recorded, and items matching the same
    /// destination item collapse to the first occurrence.
    fn resolve_ordered(
        &self,
        spec: &PlaylistSpec,
        summary: &mut RunSummary,
    ) -> (Vec<MediaItem>, usize) {
        let mut matched = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut unmatched = 0;
        for item in &spec.items {
            match matcher::resolve(item, self.index) {
                MatchResult::Matched(dest_item) => {
                    if seen.insert(dest_item.item_key.clone()) {
                        matched.push(dest_item.clone());
                    }
                }
                MatchResult::Unmatched => {
                    unmatched += 1;
                    summary.record_unmatched(
                        item.display_title(),
                        item.primary_guid().map(|g| g.to_string()),
                        &spec.name,
                    );
                }
            }
        }
        (matched, unmatched)
    }

    async fn find_existing(&self, name: &str) -> Result<Option<PlaylistInfo>, ServerError> {
        Ok(self.dest.playlists().await?.into_iter().find(|p| p.title == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{movie, MockServer};

    fn dest_catalog() -> Vec<MediaItem> {
        vec![
            movie("d1", "Alpha", &["imdb://tt001"]),
            movie("d2", "Beta", &["imdb://tt002"]),
            movie("d3", "Gamma", &["imdb://tt003"]),
        ]
    }

    fn source_with_playlist(items: Vec<MediaItem>) -> MockServer {
        let source = MockServer::new("source");
        source.add_playlist("Favorites", false, "video", items);
        source
    }

    async fn build_index(dest: &MockServer) -> CatalogIndex {
        CatalogIndex::build(dest).await.unwrap()
    }

    #[tokio::test]
    async fn preserves_filtered_source_order() {
        let source = source_with_playlist(vec![
            movie("s1", "Gamma", &["imdb://tt003"]),
            movie("s2", "Missing", &["imdb://tt404"]),
            movie("s3", "Alpha", &["imdb://tt001"]),
            movie("s4", "Gamma again", &["imdb://tt003"]),
            movie("s5", "Beta", &["imdb://tt002"]),
        ]);
        let dest = MockServer::new("dest").with_movie_section("1", "Movies", dest_catalog());
        let index = build_index(&dest).await;
        let options = PlaylistOptions::default();
        let mut summary = RunSummary::default();

        PlaylistReconciler::new(&source, &dest, &index, &options, false)
            .run(&mut summary)
            .await;

        let created = dest.playlist_by_title("Favorites").unwrap();
        let keys: Vec<&str> = created.items.iter().map(|i| i.item_key.as_str()).collect();
        // Unmatched dropped, duplicate match collapsed to first occurrence,
        // relative order preserved.
        assert_eq!(keys, vec!["d3", "d1", "d2"]);
        assert_eq!(summary.playlists.created, 1);
        assert_eq!(summary.unmatched.len(), 1);
        assert_eq!(summary.unmatched[0].title, "Missing");
        assert_eq!(summary.unmatched[0].context, "Favorites");
    }

    #[tokio::test]
    async fn existing_playlist_without_replace_is_skipped() {
        let source = source_with_playlist(vec![movie("s1", "Alpha", &["imdb://tt001"])]);
        let dest = MockServer::new("dest").with_movie_section("1", "Movies", dest_catalog());
        dest.add_playlist("Favorites", false, "video", vec![movie("d9", "Old", &[])]);
        let index = build_index(&dest).await;
        let options = PlaylistOptions::default();
        let mut summary = RunSummary::default();

        PlaylistReconciler::new(&source, &dest, &index, &options, false)
            .run(&mut summary)
            .await;

        assert_eq!(summary.playlists.skipped, 1);
        assert_eq!(summary.playlists.created, 0);
        // The existing playlist was not touched.
        let existing = dest.playlist_by_title("Favorites").unwrap();
        assert_eq!(existing.items.len(), 1);
        assert_eq!(existing.items[0].item_key, "d9");
    }

    #[tokio::test]
    async fn replace_rerun_is_idempotent() {
        let source = source_with_playlist(vec![
            movie("s1", "Alpha", &["imdb://tt001"]),
            movie("s2", "Beta", &["imdb://tt002"]),
        ]);
        let dest = MockServer::new("dest").with_movie_section("1", "Movies", dest_catalog());
        let index = build_index(&dest).await;
        let options = PlaylistOptions { replace: true, ..Default::default() };

        for _ in 0..2 {
            let mut summary = RunSummary::default();
            PlaylistReconciler::new(&source, &dest, &index, &options, false)
                .run(&mut summary)
                .await;
        }

        // Exactly one playlist of that name, with the same membership.
        assert_eq!(dest.playlist_count("Favorites"), 1);
        let playlist = dest.playlist_by_title("Favorites").unwrap();
        let keys: Vec<&str> = playlist.items.iter().map(|i| i.item_key.as_str()).collect();
        assert_eq!(keys, vec!["d1", "d2"]);
    }

    #[tokio::test]
    async fn smart_playlists_skip_unless_materialized() {
        let source = MockServer::new("source");
        source.add_playlist("Smart One", true, "video", vec![movie("s1", "Alpha", &["imdb://tt001"])]);
        let dest = MockServer::new("dest").with_movie_section("1", "Movies", dest_catalog());
        let index = build_index(&dest).await;
        let mut summary = RunSummary::default();

        let options = PlaylistOptions::default();
        PlaylistReconciler::new(&source, &dest, &index, &options, false)
            .run(&mut summary)
            .await;
        assert_eq!(summary.playlists.skipped, 1);
        assert!(dest.playlist_by_title("Smart One").is_none());

        let options = PlaylistOptions { materialize_smart: true, ..Default::default() };
        let mut summary = RunSummary::default();
        PlaylistReconciler::new(&source, &dest, &index, &options, false)
            .run(&mut summary)
            .await;
        assert_eq!(summary.playlists.created, 1);
        assert!(dest.playlist_by_title("Smart One").is_some());
    }

    #[tokio::test]
    async fn dry_run_never_touches_the_destination() {
        let source = source_with_playlist(vec![
            movie("s1", "Alpha", &["imdb://tt001"]),
            movie("s2", "Beta", &["imdb://tt002"]),
        ]);
        let dest = MockServer::new("dest").with_movie_section("1", "Movies", dest_catalog());
        dest.add_playlist("Favorites", false, "video", vec![movie("d9", "Old", &[])]);
        let index = build_index(&dest).await;
        let options = PlaylistOptions { replace: true, ..Default::default() };
        let mut summary = RunSummary::default();

        PlaylistReconciler::new(&source, &dest, &index, &options, true)
            .run(&mut summary)
            .await;

        // Summary reads like the real run...
        assert_eq!(summary.playlists.replaced, 1);
        assert_eq!(summary.items.bulk_added, 2);
        // ...but no mutating call reached the server, and the old playlist
        // is still there.
        assert_eq!(dest.mutation_count(), 0);
        let existing = dest.playlist_by_title("Favorites").unwrap();
        assert_eq!(existing.items[0].item_key, "d9");
    }

    #[tokio::test]
    async fn name_filter_gates_playlists() {
        let source = MockServer::new("source");
        source.add_playlist("Kids Movies", false, "video", vec![movie("s1", "Alpha", &["imdb://tt001"])]);
        source.add_playlist("Kids Temp List", false, "video", vec![movie("s2", "Beta", &["imdb://tt002"])]);
        source.add_playlist("Adult List", false, "video", vec![movie("s3", "Gamma", &["imdb://tt003"])]);
        let dest = MockServer::new("dest").with_movie_section("1", "Movies", dest_catalog());
        let index = build_index(&dest).await;
        let options = PlaylistOptions {
            filter: NameFilter::new(Some("^Kids"), Some("Temp")).unwrap(),
            ..Default::default()
        };
        let mut summary = RunSummary::default();

        PlaylistReconciler::new(&source, &dest, &index, &options, false)
            .run(&mut summary)
            .await;

        assert!(dest.playlist_by_title("Kids Movies").is_some());
        assert!(dest.playlist_by_title("Kids Temp List").is_none());
        assert!(dest.playlist_by_title("Adult List").is_none());
        assert_eq!(summary.playlists.created, 1);
        assert_eq!(summary.playlists.skipped, 2);
    }

    #[tokio::test]
    async fn rejected_create_falls_back_to_manual_uri() {
        let source = source_with_playlist(vec![movie("s1", "Alpha", &["imdb://tt001"])]);
        let mut dest = MockServer::new("dest").with_movie_section("1", "Movies", dest_catalog());
        dest.reject_plain_creates = true;
        let index = build_index(&dest).await;
        let options = PlaylistOptions::default();
        let mut summary = RunSummary::default();

        PlaylistReconciler::new(&source, &dest, &index, &options, false)
            .run(&mut summary)
            .await;

        assert_eq!(summary.playlists.created, 1);
        let mutations = dest.mutations.lock().unwrap().clone();
        assert!(mutations.iter().any(|m| m.starts_with("create_playlist_via_uri")));
    }

    #[tokio::test]
    async fn rename_template_is_applied() {
        let source = source_with_playlist(vec![movie("s1", "Alpha", &["imdb://tt001"])]);
        let dest = MockServer::new("dest").with_movie_section("1", "Movies", dest_catalog());
        let index = build_index(&dest).await;
        let options = PlaylistOptions {
            rename: NameTemplate::new("Mirrored - {name}"),
            ..Default::default()
        };
        let mut summary = RunSummary::default();

        PlaylistReconciler::new(&source, &dest, &index, &options, false)
            .run(&mut summary)
            .await;

        assert!(dest.playlist_by_title("Mirrored - Favorites").is_some());
    }
}
