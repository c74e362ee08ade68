use crate::filter::NameFilter;
use crate::index::CatalogIndex;
use crate::matcher;
use crate::summary::RunSummary;
use media_mirror_models::{FieldWrite, MatchResult, MediaItem, MetadataField, SyncPlan};
use media_mirror_sources::MediaServer;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct MetadataOptions {
    pub fields: Vec<MetadataField>,
    pub artwork: bool,
    pub lock_fields: bool,
    pub filter: NameFilter,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            fields: MetadataField::DEFAULT.to_vec(),
            artwork: false,
            lock_fields: false,
            filter: NameFilter::open(),
        }
    }
}

/// Compute the writes for one matched pair. Pure: a field is planned only
/// when the whitelist names it, the source value is present and non-empty,
/// and it differs from the destination value. An absent source value never
/// clobbers the destination.
pub fn build_plan(source: &MediaItem, dest: &MediaItem, options: &MetadataOptions) -> SyncPlan {
    let mut writes = Vec::new();
    for &field in &options.fields {
        let Some(source_value) = source.metadata.value(field) else {
            continue;
        };
        let dest_value = dest.metadata.value(field);
        if dest_value.as_deref() != Some(source_value.as_str()) {
            writes.push(FieldWrite { field, value: source_value });
        }
    }

    let has_artwork = source.metadata.thumb.is_some() || source.metadata.art.is_some();
    SyncPlan {
        source_title: source.display_title(),
        dest_key: dest.item_key.clone(),
        writes,
        copy_artwork: options.artwork && has_artwork,
        lock_fields: options.lock_fields,
    }
}

/// Copies the whitelisted field set (and optionally artwork) from matched
/// source items to their destination counterparts. One item's failure never
/// blocks the next item.
pub struct MetadataSyncer<'a> {
    source: &'a dyn MediaServer,
    dest: &'a dyn MediaServer,
    index: &'a CatalogIndex,
    options: &'a MetadataOptions,
    dry_run: bool,
}

impl<'a> MetadataSyncer<'a> {
    pub fn new(
        source: &'a dyn MediaServer,
        dest: &'a dyn MediaServer,
        index: &'a CatalogIndex,
        options: &'a MetadataOptions,
        dry_run: bool,
    ) -> Self {
        Self { source, dest, index, options, dry_run }
    }

    pub async fn run(&self, summary: &mut RunSummary) {
        let sections = match self.source.sections().await {
            Ok(sections) => sections,
            Err(e) => {
                summary.record_error(format!("Failed to list source sections: {}", e));
                return;
            }
        };

        for section in sections.iter().filter(|s| s.kind.is_video()) {
            info!("Scanning source section '{}' for metadata sync", section.title);
            let items = match self.source.section_leaf_items(section).await {
                Ok(items) => items,
                Err(e) => {
                    summary.record_error(format!(
                        "Failed to enumerate section '{}' for metadata sync: {}",
                        section.title, e
                    ));
                    continue;
                }
            };

            for item in &items {
                summary.metadata.scanned += 1;
                if !self.options.filter.keeps(&item.title) {
                    continue;
                }
                let MatchResult::Matched(dest_item) = matcher::resolve(item, self.index) else {
                    debug!("No destination match for '{}', metadata skipped", item.title);
                    continue;
                };

                let plan = build_plan(item, dest_item, self.options);
                if plan.is_empty() {
                    continue;
                }
                self.apply(item, &plan, summary).await;
            }
        }
        info!(
            "Metadata sync complete: {} items scanned, {} updated, {} fields written, {} failed",
            summary.metadata.scanned,
            summary.metadata.updated,
            summary.metadata.fields_written,
            summary.metadata.fields_failed
        );
    }

    async fn apply(&self, source_item: &MediaItem, plan: &SyncPlan, summary: &mut RunSummary) {
        if self.dry_run {
            let fields: Vec<String> = plan.writes.iter().map(|w| w.field.to_string()).collect();
            info!(
                "[dry-run] Would write {:?}{} for '{}'",
                fields,
                if plan.copy_artwork { " and artwork" } else { "" },
                plan.source_title
            );
            summary.metadata.updated += 1;
            summary.metadata.fields_written += plan.writes.len();
            if plan.copy_artwork {
                summary.metadata.artwork_copied += 1;
            }
            return;
        }

        if !plan.writes.is_empty() {
            match self.dest.edit_metadata(&plan.dest_key, &plan.writes).await {
                Ok(()) => {
                    summary.metadata.updated += 1;
                    summary.metadata.fields_written += plan.writes.len();
                    debug!(
                        "Applied {} fields for '{}'",
                        plan.writes.len(),
                        plan.source_title
                    );
                    if plan.lock_fields {
                        // Locked right after the write so a later automated
                        // refresh cannot overwrite the synced value.
                        for write in &plan.writes {
                            if let Err(e) = self.dest.lock_field(&plan.dest_key, write.field).await {
                                warn!(
                                    "Failed to lock field {} on '{}': {}",
                                    write.field, plan.source_title, e
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    summary.metadata.fields_failed += plan.writes.len();
                    summary.record_error(format!(
                        "Failed to write fields for '{}': {}",
                        plan.source_title, e
                    ));
                }
            }
        }

        if plan.copy_artwork {
            match self.copy_artwork(source_item, &plan.dest_key).await {
                Ok(()) => summary.metadata.artwork_copied += 1,
                Err(e) => {
                    summary.metadata.artwork_failed += 1;
                    summary.record_error(format!(
                        "Failed to copy artwork for '{}': {}",
                        plan.source_title, e
                    ));
                }
            }
        }
    }

    /// Poster first, then background art; fetched from the source and
    /// re-uploaded, a separate step after field writes.
    async fn copy_artwork(
        &self,
        source_item: &MediaItem,
        dest_key: &str,
    ) -> Result<(), media_mirror_sources::ServerError> {
        if let Some(ref thumb) = source_item.metadata.thumb {
            let image = self.source.download_artwork(thumb).await?;
            self.dest.upload_poster(dest_key, image).await?;
            debug!("Poster copied for '{}'", source_item.title);
        }
        if let Some(ref art) = source_item.metadata.art {
            let image = self.source.download_artwork(art).await?;
            self.dest.upload_art(dest_key, image).await?;
            debug!("Background art copied for '{}'", source_item.title);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{movie, MockServer};
    use media_mirror_models::ItemMetadata;

    fn with_meta(mut item: MediaItem, metadata: ItemMetadata) -> MediaItem {
        item.metadata = metadata;
        item
    }

    #[test]
    fn empty_source_field_never_clobbers_destination() {
        let source = with_meta(
            movie("s1", "Alpha", &["imdb://tt001"]),
            ItemMetadata { summary: Some("New summary".into()), tagline: None, ..Default::default() },
        );
        let dest = with_meta(
            movie("d1", "Alpha", &["imdb://tt001"]),
            ItemMetadata {
                summary: Some("Old summary".into()),
                tagline: Some("Keep me".into()),
                ..Default::default()
            },
        );
        let options = MetadataOptions::default();
        let plan = build_plan(&source, &dest, &options);

        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.writes[0].field, MetadataField::Summary);
        assert_eq!(plan.writes[0].value, "New summary");
        // Tagline is in the whitelist but absent on the source: untouched.
        assert!(!plan.writes.iter().any(|w| w.field == MetadataField::Tagline));
    }

    #[test]
    fn equal_values_produce_no_writes() {
        let meta = ItemMetadata { summary: Some("Same".into()), ..Default::default() };
        let source = with_meta(movie("s1", "Alpha", &[]), meta.clone());
        let dest = with_meta(movie("d1", "Alpha", &[]), meta);
        let plan = build_plan(&source, &dest, &MetadataOptions::default());
        assert!(plan.is_empty());
    }

    #[test]
    fn whitelist_restricts_fields() {
        let source = with_meta(
            movie("s1", "Alpha", &[]),
            ItemMetadata {
                summary: Some("A".into()),
                tagline: Some("B".into()),
                ..Default::default()
            },
        );
        let dest = movie("d1", "Alpha", &[]);
        let options =
            MetadataOptions { fields: vec![MetadataField::Tagline], ..Default::default() };
        let plan = build_plan(&source, &dest, &options);
        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.writes[0].field, MetadataField::Tagline);
    }

    #[tokio::test]
    async fn syncer_writes_locks_and_copies_artwork() {
        let source_item = with_meta(
            movie("s1", "Alpha", &["imdb://tt001"]),
            ItemMetadata {
                summary: Some("Fresh".into()),
                thumb: Some("/library/metadata/s1/thumb/1".into()),
                ..Default::default()
            },
        );
        let source = MockServer::new("source").with_movie_section("1", "Films", vec![source_item]);
        let dest_item = movie("d1", "Alpha", &["imdb://tt001"]);
        let dest = MockServer::new("dest").with_movie_section("2", "Movies", vec![dest_item]);
        let index = CatalogIndex::build(&dest).await.unwrap();
        let options = MetadataOptions { artwork: true, lock_fields: true, ..Default::default() };
        let mut summary = RunSummary::default();

        MetadataSyncer::new(&source, &dest, &index, &options, false)
            .run(&mut summary)
            .await;

        assert_eq!(summary.metadata.updated, 1);
        assert_eq!(summary.metadata.fields_written, 1);
        assert_eq!(summary.metadata.artwork_copied, 1);

        let edited = dest.edited.lock().unwrap();
        assert_eq!(edited.len(), 1);
        assert_eq!(edited[0].0, "d1");
        let locked = dest.locked.lock().unwrap();
        assert_eq!(locked.as_slice(), &[("d1".to_string(), MetadataField::Summary)]);
        let uploaded = dest.uploaded.lock().unwrap();
        assert_eq!(uploaded.as_slice(), &[("d1".to_string(), "poster".to_string())]);
    }

    #[tokio::test]
    async fn title_filter_gates_metadata_sync() {
        let items = vec![
            with_meta(
                movie("s1", "Alpha", &["imdb://tt001"]),
                ItemMetadata { summary: Some("A".into()), ..Default::default() },
            ),
            with_meta(
                movie("s2", "Beta", &["imdb://tt002"]),
                ItemMetadata { summary: Some("B".into()), ..Default::default() },
            ),
        ];
        let source = MockServer::new("source").with_movie_section("1", "Films", items);
        let dest = MockServer::new("dest").with_movie_section(
            "2",
            "Movies",
            vec![
                movie("d1", "Alpha", &["imdb://tt001"]),
                movie("d2", "Beta", &["imdb://tt002"]),
            ],
        );
        let index = CatalogIndex::build(&dest).await.unwrap();
        let options = MetadataOptions {
            filter: NameFilter::new(Some("^Alpha$"), None).unwrap(),
            ..Default::default()
        };
        let mut summary = RunSummary::default();

        MetadataSyncer::new(&source, &dest, &index, &options, false)
            .run(&mut summary)
            .await;

        assert_eq!(summary.metadata.scanned, 2);
        assert_eq!(summary.metadata.updated, 1);
        let edited = dest.edited.lock().unwrap();
        assert_eq!(edited[0].0, "d1");
    }

    #[tokio::test]
    async fn dry_run_plans_but_never_writes() {
        let source_item = with_meta(
            movie("s1", "Alpha", &["imdb://tt001"]),
            ItemMetadata { summary: Some("Fresh".into()), ..Default::default() },
        );
        let source = MockServer::new("source").with_movie_section("1", "Films", vec![source_item]);
        let dest = MockServer::new("dest").with_movie_section(
            "2",
            "Movies",
            vec![movie("d1", "Alpha", &["imdb://tt001"])],
        );
        let index = CatalogIndex::build(&dest).await.unwrap();
        let options = MetadataOptions::default();
        let mut summary = RunSummary::default();

        MetadataSyncer::new(&source, &dest, &index, &options, true)
            .run(&mut summary)
            .await;

        assert_eq!(summary.metadata.updated, 1);
        assert_eq!(summary.metadata.fields_written, 1);
        assert_eq!(dest.mutation_count(), 0);
    }
}
