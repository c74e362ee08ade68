use async_trait::async_trait;
use media_mirror_models::MediaItem;
use media_mirror_sources::ServerError;
use serde::Serialize;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// One item that could not be added at all, after the per-item fallback.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub title: String,
    pub reason: String,
}

/// Outcome of filling one container.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AddReport {
    /// Items accepted through the bulk path (the seed item included).
    pub bulk_added: usize,
    /// Items accepted one at a time after a chunk degraded.
    pub fallback_added: usize,
    /// Items that failed through every tier.
    pub failed: Vec<ItemFailure>,
    /// Whether the container was created by this fill.
    pub created: bool,
    /// Set when creation itself failed through both encodings; the
    /// container was abandoned and no items were attempted.
    pub container_failed: Option<String>,
}

impl AddReport {
    pub fn total_added(&self) -> usize {
        self.bulk_added + self.fallback_added
    }

    pub fn is_container_failure(&self) -> bool {
        self.container_failed.is_some()
    }
}

/// How the fill begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Container does not exist: create it seeded with the first item.
    Create,
    /// An existing container of the same name was deleted beforehand;
    /// otherwise identical to `Create`. Kept distinct for reporting.
    Replace,
    /// Container already exists: every item goes through the add path.
    Append,
}

/// Steps of one container fill. Transitions are logged so a degraded run
/// can be reconstructed from the debug output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillState {
    Planned,
    Creating,
    Replacing,
    Seeded,
    Filling,
    Done,
    Failed,
}

/// The container side of the batch writer: one playlist or collection on
/// the destination, or a no-op recorder in dry-run mode. Implementations
/// hold whatever key the server hands back on creation.
#[async_trait]
pub trait ContainerSink: Send {
    /// Container name, for logs and failure records.
    fn name(&self) -> &str;

    /// Create the container seeded with exactly one item.
    async fn create_seeded(&mut self, seed: &MediaItem) -> Result<(), ServerError>;

    /// Alternate creation using the explicit item-reference encoding.
    async fn create_seeded_manual(&mut self, seed: &MediaItem) -> Result<(), ServerError>;

    /// Add a chunk of items in one call.
    async fn bulk_add(&mut self, items: &[MediaItem]) -> Result<(), ServerError>;

    /// Add one item.
    async fn add_single(&mut self, item: &MediaItem) -> Result<(), ServerError>;
}

fn advance(state: &mut FillState, next: FillState, container: &str) {
    debug!("'{}': {:?} -> {:?}", container, state, next);
    *state = next;
}

/// Hides the destination's inconsistent acceptance of bulk adds behind one
/// robust "add these items to this container" primitive.
///
/// Degradation order is fixed: seed-create (falling back to the manual
/// encoding once), then bulk chunks, and per-item adds only for a chunk
/// the bulk path rejected. Within a chunk the writer never returns to the
/// bulk path after falling back, and a degraded chunk never aborts the
/// chunks after it.
pub struct BatchWriter {
    batch_size: usize,
}

impl BatchWriter {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size: batch_size.max(1) }
    }

    pub async fn fill(
        &self,
        sink: &mut dyn ContainerSink,
        items: &[MediaItem],
        mode: FillMode,
    ) -> AddReport {
        let mut report = AddReport::default();
        let mut state = FillState::Planned;

        let rest = match mode {
            FillMode::Create | FillMode::Replace => {
                let next = if mode == FillMode::Replace {
                    FillState::Replacing
                } else {
                    FillState::Creating
                };
                advance(&mut state, next, sink.name());
                let Some((seed, rest)) = items.split_first() else {
                    debug!("Nothing to add to '{}'", sink.name());
                    return report;
                };
                debug!(
                    "Creating '{}' with 1 seed item, then {} more in batches of {}",
                    sink.name(),
                    rest.len(),
                    self.batch_size
                );
                if let Err(e) = self.create_with_fallback(sink, seed).await {
                    warn!("Giving up on container '{}': {}", sink.name(), e);
                    report.container_failed = Some(e.to_string());
                    advance(&mut state, FillState::Failed, sink.name());
                    return report;
                }
                report.created = true;
                report.bulk_added += 1;
                advance(&mut state, FillState::Seeded, sink.name());
                rest
            }
            FillMode::Append => items,
        };

        advance(&mut state, FillState::Filling, sink.name());
        for chunk in rest.chunks(self.batch_size) {
            match sink.bulk_add(chunk).await {
                Ok(()) => {
                    report.bulk_added += chunk.len();
                }
                Err(e) if e.is_bulk_rejection() => {
                    info!(
                        "Bulk add of {} items to '{}' rejected ({}); degrading to single adds",
                        chunk.len(),
                        sink.name(),
                        e
                    );
                    self.add_one_by_one(sink, chunk, &mut report).await;
                }
                Err(e) => {
                    warn!(
                        "Bulk add of {} items to '{}' failed: {}",
                        chunk.len(),
                        sink.name(),
                        e
                    );
                    let reason = e.to_string();
                    for item in chunk {
                        report.failed.push(ItemFailure {
                            title: item.display_title(),
                            reason: reason.clone(),
                        });
                    }
                }
            }
        }
        advance(&mut state, FillState::Done, sink.name());
        debug!(
            "Filled '{}': {} bulk, {} fallback, {} failed",
            sink.name(),
            report.bulk_added,
            report.fallback_added,
            report.failed.len()
        );
        report
    }

    /// Two-tier creation: the normal encoding, then the explicit manual
    /// URI encoding when the bulk path rejected the create.
    async fn create_with_fallback(
        &self,
        sink: &mut dyn ContainerSink,
        seed: &MediaItem,
    ) -> Result<(), ServerError> {
        match sink.create_seeded(seed).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_bulk_rejection() => {
                info!(
                    "Seed create of '{}' rejected as empty ({}); retrying via manual URI",
                    sink.name(),
                    e
                );
                sink.create_seeded_manual(seed).await
            }
            Err(e) => Err(e),
        }
    }

    async fn add_one_by_one(
        &self,
        sink: &mut dyn ContainerSink,
        chunk: &[MediaItem],
        report: &mut AddReport,
    ) {
        for item in chunk {
            match sink.add_single(item).await {
                Ok(()) => report.fallback_added += 1,
                Err(e) => {
                    warn!("Single add of '{}' to '{}' failed: {}", item.title, sink.name(), e);
                    report.failed.push(ItemFailure {
                        title: item.display_title(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Dry-run sink: records what would have been written and accepts
/// everything. Holds no server reference, so a dry run cannot touch the
/// container capability at all.
#[derive(Debug, Default)]
pub struct RecordingSink {
    name: String,
    pub created: bool,
    pub added_keys: Vec<String>,
}

impl RecordingSink {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), created: false, added_keys: Vec::new() }
    }
}

#[async_trait]
impl ContainerSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_seeded(&mut self, seed: &MediaItem) -> Result<(), ServerError> {
        self.created = true;
        self.added_keys.push(seed.item_key.clone());
        Ok(())
    }

    async fn create_seeded_manual(&mut self, seed: &MediaItem) -> Result<(), ServerError> {
        self.created = true;
        self.added_keys.push(seed.item_key.clone());
        Ok(())
    }

    async fn bulk_add(&mut self, items: &[MediaItem]) -> Result<(), ServerError> {
        self.added_keys.extend(items.iter().map(|i| i.item_key.clone()));
        Ok(())
    }

    async fn add_single(&mut self, item: &MediaItem) -> Result<(), ServerError> {
        self.added_keys.push(item.item_key.clone());
        Ok(())
    }
}
