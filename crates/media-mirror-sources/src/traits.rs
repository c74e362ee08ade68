use crate::error::ServerError;
use async_trait::async_trait;
use media_mirror_models::{FieldWrite, MediaItem, MetadataField};
use serde::Serialize;

/// Identity reported by a server on the connectivity preflight.
#[derive(Debug, Clone, Serialize)]
pub struct ServerIdentity {
    pub friendly_name: String,
    pub machine_identifier: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Movie,
    Show,
    Other,
}

impl SectionKind {
    pub fn is_video(self) -> bool {
        matches!(self, SectionKind::Movie | SectionKind::Show)
    }
}

#[derive(Debug, Clone)]
pub struct SectionInfo {
    pub key: String,
    pub title: String,
    pub kind: SectionKind,
}

#[derive(Debug, Clone)]
pub struct PlaylistInfo {
    pub key: String,
    pub title: String,
    pub smart: bool,
    /// Server-reported playlist type ("video", "audio", "photo").
    pub playlist_type: String,
}

impl PlaylistInfo {
    pub fn is_video(&self) -> bool {
        self.playlist_type.is_empty()
            || matches!(self.playlist_type.as_str(), "video" | "movie" | "show")
    }
}

#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub key: String,
    pub title: String,
}

/// Capability interface of one media-library server.
///
/// The reconciliation engine only ever talks to this trait; transport,
/// auth-token handling, and TLS verification live behind it. All write
/// operations target the destination server; the orchestrator never calls
/// them on the source.
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Label used in logs and error messages ("source", "destination").
    fn label(&self) -> &str;

    /// Connectivity and auth preflight. A failure here is fatal to the run.
    async fn check_connection(&self) -> Result<ServerIdentity, ServerError>;

    // Catalog enumeration
    async fn sections(&self) -> Result<Vec<SectionInfo>, ServerError>;

    /// Playable leaf items of one section: movies for a movie section,
    /// episodes for a show section, each with its GUID set and descriptive
    /// metadata snapshot.
    async fn section_leaf_items(&self, section: &SectionInfo) -> Result<Vec<MediaItem>, ServerError>;

    // Playlists
    async fn playlists(&self) -> Result<Vec<PlaylistInfo>, ServerError>;
    async fn playlist_items(&self, playlist_key: &str) -> Result<Vec<MediaItem>, ServerError>;

    /// Create a playlist seeded with exactly one item; returns the new
    /// playlist key.
    async fn create_playlist(&self, name: &str, seed: &MediaItem) -> Result<String, ServerError>;

    /// Alternate creation path using the explicit machine-scoped item URI
    /// encoding. Used when `create_playlist` is rejected by the bulk path.
    async fn create_playlist_via_uri(
        &self,
        name: &str,
        seed: &MediaItem,
    ) -> Result<String, ServerError>;

    async fn add_playlist_items(
        &self,
        playlist_key: &str,
        items: &[MediaItem],
    ) -> Result<(), ServerError>;

    async fn delete_playlist(&self, playlist_key: &str) -> Result<(), ServerError>;

    // Collections
    async fn collections(&self, section: &SectionInfo) -> Result<Vec<CollectionInfo>, ServerError>;
    async fn collection_items(&self, collection_key: &str) -> Result<Vec<MediaItem>, ServerError>;

    async fn create_collection(
        &self,
        section_key: &str,
        name: &str,
        seed: &MediaItem,
    ) -> Result<String, ServerError>;

    /// Alternate creation path, mirror of `create_playlist_via_uri`.
    async fn create_collection_via_uri(
        &self,
        section_key: &str,
        name: &str,
        seed: &MediaItem,
    ) -> Result<String, ServerError>;

    async fn add_collection_items(
        &self,
        collection_key: &str,
        items: &[MediaItem],
    ) -> Result<(), ServerError>;

    async fn remove_collection_item(
        &self,
        collection_key: &str,
        item: &MediaItem,
    ) -> Result<(), ServerError>;

    /// Find a collection by exact title across all video sections.
    async fn find_collection(&self, name: &str) -> Result<Option<CollectionInfo>, ServerError> {
        for section in self.sections().await? {
            if !section.kind.is_video() {
                continue;
            }
            match self.collections(&section).await {
                Ok(collections) => {
                    if let Some(found) = collections.into_iter().find(|c| c.title == name) {
                        return Ok(Some(found));
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        "Collection lookup failed in section '{}': {}",
                        section.title,
                        e
                    );
                }
            }
        }
        Ok(None)
    }

    // Metadata
    async fn edit_metadata(
        &self,
        item_key: &str,
        writes: &[FieldWrite],
    ) -> Result<(), ServerError>;

    async fn lock_field(&self, item_key: &str, field: MetadataField) -> Result<(), ServerError>;

    // Artwork
    async fn download_artwork(&self, path: &str) -> Result<Vec<u8>, ServerError>;
    async fn upload_poster(&self, item_key: &str, image: Vec<u8>) -> Result<(), ServerError>;
    async fn upload_art(&self, item_key: &str, image: Vec<u8>) -> Result<(), ServerError>;
}
