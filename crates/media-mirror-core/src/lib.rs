pub mod batch;
pub mod collections;
pub mod filter;
pub mod index;
pub mod matcher;
pub mod metadata;
pub mod orchestrator;
pub mod playlists;
pub mod selftest;
pub mod summary;
pub mod template;

#[cfg(test)]
pub(crate) mod testutil;

pub use batch::{AddReport, BatchWriter, ContainerSink, FillMode, ItemFailure, RecordingSink};
pub use collections::CollectionOptions;
pub use filter::NameFilter;
pub use index::CatalogIndex;
pub use matcher::resolve;
pub use metadata::MetadataOptions;
pub use orchestrator::{RunOptions, RunOrchestrator};
pub use playlists::PlaylistOptions;
pub use summary::RunSummary;
pub use template::NameTemplate;
