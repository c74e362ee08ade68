pub mod collection;
pub mod guid;
pub mod item;
pub mod match_result;
pub mod metadata;
pub mod playlist;

pub use collection::CollectionSpec;
pub use guid::{Guid, GuidProvider};
pub use item::{ItemKind, MediaItem};
pub use match_result::MatchResult;
pub use metadata::{FieldWrite, ItemMetadata, MetadataField, SyncPlan};
pub use playlist::PlaylistSpec;
