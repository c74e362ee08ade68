use crate::batch::{BatchWriter, ContainerSink, FillMode, RecordingSink, DEFAULT_BATCH_SIZE};
use crate::filter::NameFilter;
use crate::index::CatalogIndex;
use crate::matcher;
use crate::summary::RunSummary;
use crate::template::NameTemplate;
use async_trait::async_trait;
use media_mirror_models::{CollectionSpec, MatchResult, MediaItem};
use media_mirror_sources::{CollectionInfo, MediaServer, SectionInfo, ServerError};
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct CollectionOptions {
    pub replace: bool,
    pub batch_size: usize,
    pub rename: NameTemplate,
    pub filter: NameFilter,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            replace: false,
            batch_size: DEFAULT_BATCH_SIZE,
            rename: NameTemplate::default(),
            filter: NameFilter::open(),
        }
    }
}

/// `ContainerSink` over a destination collection.
pub(crate) struct CollectionSink<'a> {
    server: &'a dyn MediaServer,
    section_key: String,
    name: String,
    key: Option<String>,
}

impl<'a> CollectionSink<'a> {
    pub(crate) fn for_new(server: &'a dyn MediaServer, section_key: &str, name: &str) -> Self {
        Self { server, section_key: section_key.to_string(), name: name.to_string(), key: None }
    }

    pub(crate) fn for_existing(server: &'a dyn MediaServer, name: &str, key: String) -> Self {
        Self { server, section_key: String::new(), name: name.to_string(), key: Some(key) }
    }

    fn key(&self) -> Result<&str, ServerError> {
        self.key
            .as_deref()
            .ok_or_else(|| ServerError::InvalidResponse("collection has not been created".into()))
    }
}

#[async_trait]
impl ContainerSink for CollectionSink<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_seeded(&mut self, seed: &MediaItem) -> Result<(), ServerError> {
        let key = self.server.create_collection(&self.section_key, &self.name, seed).await?;
        self.key = Some(key);
        Ok(())
    }

    async fn create_seeded_manual(&mut self, seed: &MediaItem) -> Result<(), ServerError> {
        let key = self
            .server
            .create_collection_via_uri(&self.section_key, &self.name, seed)
            .await?;
        self.key = Some(key);
        Ok(())
    }

    async fn bulk_add(&mut self, items: &[MediaItem]) -> Result<(), ServerError> {
        let key = self.key()?.to_string();
        self.server.add_collection_items(&key, items).await
    }

    async fn add_single(&mut self, item: &MediaItem) -> Result<(), ServerError> {
        let key = self.key()?.to_string();
        self.server.add_collection_items(&key, std::slice::from_ref(item)).await
    }
}

/// Reconciles named collection memberships: replace mode converges the
/// destination to exactly the matched set, union mode only adds.
pub struct CollectionReconciler<'a> {
    source: &'a dyn MediaServer,
    dest: &'a dyn MediaServer,
    index: &'a CatalogIndex,
    options: &'a CollectionOptions,
    dry_run: bool,
}

impl<'a> CollectionReconciler<'a> {
    pub fn new(
        source: &'a dyn MediaServer,
        dest: &'a dyn MediaServer,
        index: &'a CatalogIndex,
        options: &'a CollectionOptions,
        dry_run: bool,
    ) -> Self {
        Self { source, dest, index, options, dry_run }
    }

    pub async fn run(&self, summary: &mut RunSummary) {
        let source_sections = match self.source.sections().await {
            Ok(sections) => sections,
            Err(e) => {
                summary.record_error(format!("Failed to list source sections: {}", e));
                return;
            }
        };
        let dest_sections = match self.dest.sections().await {
            Ok(sections) => sections,
            Err(e) => {
                summary.record_error(format!("Failed to list destination sections: {}", e));
                return;
            }
        };

        for section in source_sections.iter().filter(|s| s.kind.is_video()) {
            let collections = match self.source.collections(section).await {
                Ok(collections) => collections,
                Err(e) => {
                    summary.record_error(format!(
                        "Could not list collections for section '{}': {}",
                        section.title, e
                    ));
                    continue;
                }
            };
            summary.collections.found += collections.len();
            for collection in &collections {
                self.reconcile_one(collection, &dest_sections, summary).await;
            }
        }
        info!(
            "Collections done: {} created, {} updated, {} skipped, {} failed",
            summary.collections.created,
            summary.collections.updated,
            summary.collections.skipped,
            summary.collections.failed
        );
    }

    async fn reconcile_one(
        &self,
        collection: &CollectionInfo,
        dest_sections: &[SectionInfo],
        summary: &mut RunSummary,
    ) {
        let name = &collection.title;
        if !self.options.filter.keeps(name) {
            debug!("Skip collection '{}' due to name filter", name);
            summary.collections.skipped += 1;
            return;
        }

        let members = match self.source.collection_items(&collection.key).await {
            Ok(members) => members,
            Err(e) => {
                summary.record_error(format!(
                    "Failed to list members of collection '{}': {}",
                    name, e
                ));
                summary.collections.failed += 1;
                return;
            }
        };
        debug!("Collection '{}': {} members on source", name, members.len());

        let dest_name = self.options.rename.apply(name);
        let spec = CollectionSpec::new(dest_name.clone(), self.resolve_members(&members, name, summary));
        if spec.members.is_empty() {
            warn!("No destination items matched for collection '{}'; skipping", name);
            summary.collections.skipped += 1;
            return;
        }

        let existing = match self.dest.find_collection(&dest_name).await {
            Ok(existing) => existing,
            Err(e) => {
                summary.record_error(format!(
                    "Failed to look up destination collection '{}': {}",
                    dest_name, e
                ));
                summary.collections.failed += 1;
                return;
            }
        };

        let report = match existing {
            None => self.create(&spec, dest_sections, summary).await,
            Some(found) if self.options.replace => self.replace(&spec, &found, summary).await,
            Some(found) => self.union(&spec, &found, summary).await,
        };

        if let Some(report) = report {
            if let Some(ref reason) = report.container_failed {
                summary
                    .record_error(format!("Collection '{}' could not be created: {}", dest_name, reason));
                summary.collections.failed += 1;
            }
            summary.absorb_report(&report);
        }
    }

    /// Matched members deduplicated by destination key; unresolved members
    /// recorded and dropped.
    fn resolve_members(
        &self,
        members: &[MediaItem],
        collection_name: &str,
        summary: &mut RunSummary,
    ) -> Vec<MediaItem> {
        let mut matched = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for member in members {
            match matcher::resolve(member, self.index) {
                MatchResult::Matched(dest_item) => {
                    if seen.insert(dest_item.item_key.clone()) {
                        matched.push(dest_item.clone());
                    }
                }
                MatchResult::Unmatched => {
                    summary.record_unmatched(
                        member.display_title(),
                        member.primary_guid().map(|g| g.to_string()),
                        collection_name,
                    );
                }
            }
        }
        matched
    }

    async fn create(
        &self,
        spec: &CollectionSpec,
        dest_sections: &[SectionInfo],
        summary: &mut RunSummary,
    ) -> Option<crate::batch::AddReport> {
        // Create in the destination section holding the first member;
        // members enumerated from the index carry their section title.
        let section_key = spec.members.first().and_then(|m| {
            let title = m.section.as_deref()?;
            dest_sections.iter().find(|s| s.title == title).map(|s| s.key.clone())
        });
        let section_key = match section_key.or_else(|| {
            dest_sections.iter().find(|s| s.kind.is_video()).map(|s| s.key.clone())
        }) {
            Some(key) => key,
            None => {
                summary.record_error(format!(
                    "No destination section available to create collection '{}'",
                    spec.name
                ));
                summary.collections.failed += 1;
                return None;
            }
        };

        let writer = BatchWriter::new(self.options.batch_size);
        let report = if self.dry_run {
            let mut sink = RecordingSink::new(&spec.name);
            writer.fill(&mut sink, &spec.members, FillMode::Create).await
        } else {
            let mut sink = CollectionSink::for_new(self.dest, &section_key, &spec.name);
            writer.fill(&mut sink, &spec.members, FillMode::Create).await
        };
        if !report.is_container_failure() {
            summary.collections.created += 1;
            info!(
                "{}Created collection '{}' with {} items",
                if self.dry_run { "[dry-run] " } else { "" },
                spec.name,
                report.total_added()
            );
        }
        Some(report)
    }

    /// Clear existing membership, then apply the matched set. Leaves the
    /// collection containing exactly the matched set.
    async fn replace(
        &self,
        spec: &CollectionSpec,
        existing: &CollectionInfo,
        summary: &mut RunSummary,
    ) -> Option<crate::batch::AddReport> {
        if self.dry_run {
            info!(
                "[dry-run] Would clear collection '{}' and re-add {} items",
                spec.name,
                spec.members.len()
            );
            let writer = BatchWriter::new(self.options.batch_size);
            let mut sink = RecordingSink::new(&spec.name);
            let report = writer.fill(&mut sink, &spec.members, FillMode::Append).await;
            summary.collections.updated += 1;
            return Some(report);
        }

        match self.dest.collection_items(&existing.key).await {
            Ok(current) => {
                let mut cleared = 0;
                for item in &current {
                    match self.dest.remove_collection_item(&existing.key, item).await {
                        Ok(()) => cleared += 1,
                        Err(e) => {
                            summary.record_error(format!(
                                "Failed to remove '{}' from collection '{}': {}",
                                item.title, spec.name, e
                            ));
                        }
                    }
                }
                debug!("Cleared {} existing members from '{}'", cleared, spec.name);
            }
            Err(e) => {
                summary.record_error(format!(
                    "Failed to list current members of '{}': {}",
                    spec.name, e
                ));
            }
        }

        let writer = BatchWriter::new(self.options.batch_size);
        let mut sink = CollectionSink::for_existing(self.dest, &spec.name, existing.key.clone());
        let report = writer.fill(&mut sink, &spec.members, FillMode::Append).await;
        summary.collections.updated += 1;
        info!("Replaced membership of collection '{}' ({} items)", spec.name, report.total_added());
        Some(report)
    }

    /// Pure union: add matched items that are not already members, remove
    /// nothing.
    async fn union(
        &self,
        spec: &CollectionSpec,
        existing: &CollectionInfo,
        summary: &mut RunSummary,
    ) -> Option<crate::batch::AddReport> {
        // Reading membership is not a mutation, so the dry run consults it
        // too and reports the same missing-set the real run would add.
        let current_keys: HashSet<String> = match self.dest.collection_items(&existing.key).await {
            Ok(items) => items.into_iter().map(|i| i.item_key).collect(),
            Err(e) => {
                summary.record_error(format!(
                    "Failed to list current members of '{}': {}",
                    spec.name, e
                ));
                summary.collections.failed += 1;
                return None;
            }
        };

        let missing: Vec<MediaItem> = spec
            .members
            .iter()
            .filter(|m| !current_keys.contains(&m.item_key))
            .cloned()
            .collect();
        if missing.is_empty() {
            debug!("Collection '{}' already contains every matched item", spec.name);
            summary.collections.updated += 1;
            return None;
        }

        let writer = BatchWriter::new(self.options.batch_size);
        let report = if self.dry_run {
            let mut sink = RecordingSink::new(&spec.name);
            writer.fill(&mut sink, &missing, FillMode::Append).await
        } else {
            let mut sink = CollectionSink::for_existing(self.dest, &spec.name, existing.key.clone());
            writer.fill(&mut sink, &missing, FillMode::Append).await
        };
        summary.collections.updated += 1;
        info!(
            "{}Added {} items to collection '{}'",
            if self.dry_run { "[dry-run] " } else { "" },
            report.total_added(),
            spec.name
        );
        Some(report)
    }
}
