use crate::collections::{CollectionOptions, CollectionReconciler};
use crate::index::{CatalogIndex, SectionObserver};
use crate::metadata::{MetadataOptions, MetadataSyncer};
use crate::playlists::{PlaylistOptions, PlaylistReconciler};
use crate::summary::RunSummary;
use media_mirror_sources::{MediaServer, ServerError, ServerIdentity};
use std::sync::Arc;
use tracing::info;

/// What the run should do. A `None` phase is skipped entirely.
#[derive(Default)]
pub struct RunOptions {
    pub playlists: Option<PlaylistOptions>,
    pub collections: Option<CollectionOptions>,
    pub metadata: Option<MetadataOptions>,
    pub dry_run: bool,
}

/// Sequences one mirror run: preflight both servers, build the catalog
/// index once, then run the playlist, collection, and metadata phases over
/// the source inventory, one entity at a time.
///
/// Only the preflight (and the destination section listing the index needs)
/// can fail the run; everything after that is recovered locally and
/// recorded in the summary, which is always produced.
pub struct RunOrchestrator {
    source: Arc<dyn MediaServer>,
    dest: Arc<dyn MediaServer>,
    options: RunOptions,
}

impl RunOrchestrator {
    pub fn new(source: Arc<dyn MediaServer>, dest: Arc<dyn MediaServer>, options: RunOptions) -> Self {
        Self { source, dest, options }
    }

    /// Connectivity and auth check against both servers, source first.
    /// Fails fast: nothing has been mutated when this errors.
    pub async fn preflight(&self) -> Result<(ServerIdentity, ServerIdentity), ServerError> {
        let source_identity = self.source.check_connection().await?;
        let dest_identity = self.dest.check_connection().await?;
        Ok((source_identity, dest_identity))
    }

    pub async fn run(&self) -> Result<RunSummary, ServerError> {
        self.run_with_observer(&|_, _| {}).await
    }

    pub async fn run_with_observer(
        &self,
        observer: SectionObserver<'_>,
    ) -> Result<RunSummary, ServerError> {
        self.preflight().await?;

        let mut summary = RunSummary { dry_run: self.options.dry_run, ..Default::default() };
        if self.options.dry_run {
            info!("Dry-run mode: no destination mutation will be attempted");
        }

        info!("Building destination catalog index");
        let index = CatalogIndex::build_with_observer(self.dest.as_ref(), observer).await?;
        summary.index = index.stats();

        if let Some(ref options) = self.options.playlists {
            info!("Phase: playlists");
            PlaylistReconciler::new(
                self.source.as_ref(),
                self.dest.as_ref(),
                &index,
                options,
                self.options.dry_run,
            )
            .run(&mut summary)
            .await;
        }

        if let Some(ref options) = self.options.collections {
            info!("Phase: collections");
            CollectionReconciler::new(
                self.source.as_ref(),
                self.dest.as_ref(),
                &index,
                options,
                self.options.dry_run,
            )
            .run(&mut summary)
            .await;
        }

        if let Some(ref options) = self.options.metadata {
            info!("Phase: metadata");
            MetadataSyncer::new(
                self.source.as_ref(),
                self.dest.as_ref(),
                &index,
                options,
                self.options.dry_run,
            )
            .run(&mut summary)
            .await;
        }

        Ok(summary)
    }
}
