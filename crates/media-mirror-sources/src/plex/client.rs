use crate::error::ServerError;
use crate::plex::api::{MetadataEntry, PlexHttpClient};
use crate::traits::{
    CollectionInfo, MediaServer, PlaylistInfo, SectionInfo, SectionKind, ServerIdentity,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use media_mirror_models::{FieldWrite, Guid, ItemKind, ItemMetadata, MediaItem, MetadataField};
use tokio::sync::RwLock;
use tracing::{debug, info, trace};

const MOVIE_ITEM_TYPE: u32 = 1;
const EPISODE_ITEM_TYPE: u32 = 4;

/// A Plex media server seen through the `MediaServer` capability.
///
/// Holds the raw HTTP client plus the machine identifier cache; item
/// references in mutating calls are encoded as machine-scoped URIs, which
/// is why the identifier is fetched lazily and kept for the run.
pub struct PlexServer {
    label: String,
    api: PlexHttpClient,
    machine_identifier: RwLock<Option<String>>,
}

impl PlexServer {
    pub fn new(label: &str, base_url: &str, token: &str, insecure: bool) -> Result<Self, ServerError> {
        let api = PlexHttpClient::new(base_url, token, insecure)?;
        Ok(Self {
            label: label.to_string(),
            api,
            machine_identifier: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }

    async fn machine_id(&self) -> Result<String, ServerError> {
        {
            let cached = self.machine_identifier.read().await;
            if let Some(ref id) = *cached {
                return Ok(id.clone());
            }
        }
        let identity = self.api.identity().await?;
        let mut cached = self.machine_identifier.write().await;
        *cached = Some(identity.machine_identifier.clone());
        Ok(identity.machine_identifier)
    }

    /// Machine-scoped URI referencing one or more items, the encoding the
    /// server accepts for container seeding and bulk adds.
    async fn items_uri(&self, items: &[MediaItem]) -> Result<String, ServerError> {
        let machine = self.machine_id().await?;
        let keys: Vec<&str> = items.iter().map(|i| i.item_key.as_str()).collect();
        Ok(format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{}",
            machine,
            keys.join(",")
        ))
    }

    fn entry_to_item(entry: MetadataEntry, section: Option<&str>) -> MediaItem {
        let kind = match entry.type_.as_str() {
            "episode" => ItemKind::Episode {
                show: entry.grandparent_title.clone().unwrap_or_default(),
                season: entry.parent_index.unwrap_or(0),
                episode: entry.index.unwrap_or(0),
            },
            _ => ItemKind::Movie,
        };

        let guids: Vec<Guid> = entry.guids.iter().filter_map(|g| Guid::parse(g)).collect();
        if guids.is_empty() && !entry.guids.is_empty() {
            trace!("No usable GUID among {:?} for '{}'", entry.guids, entry.title);
        }

        let metadata = ItemMetadata {
            summary: entry.summary,
            tagline: entry.tagline,
            content_rating: entry.content_rating,
            originally_available_at: entry
                .originally_available_at
                .as_deref()
                .and_then(parse_air_date),
            title_sort: entry.title_sort,
            thumb: entry.thumb,
            art: entry.art,
        };

        let mut item = MediaItem {
            item_key: entry.rating_key,
            title: entry.title,
            kind,
            guids,
            section: section.map(String::from),
            metadata,
        };
        if item.title.is_empty() {
            item.title = "<untitled>".to_string();
        }
        item
    }
}

/// Dates arrive as "1999-03-31" or occasionally with a time suffix.
fn parse_air_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[async_trait]
impl MediaServer for PlexServer {
    fn label(&self) -> &str {
        &self.label
    }

    async fn check_connection(&self) -> Result<ServerIdentity, ServerError> {
        let identity = self.api.identity().await?;
        info!(
            "Connected to {} server '{}' ({})",
            self.label,
            identity.friendly_name,
            self.api.base_url()
        );
        {
            let mut cached = self.machine_identifier.write().await;
            *cached = Some(identity.machine_identifier.clone());
        }
        Ok(ServerIdentity {
            friendly_name: identity.friendly_name,
            machine_identifier: identity.machine_identifier,
            version: identity.version,
        })
    }

    async fn sections(&self) -> Result<Vec<SectionInfo>, ServerError> {
        let sections = self
            .api
            .sections()
            .await?
            .into_iter()
            .map(|raw| SectionInfo {
                kind: match raw.type_.as_str() {
                    "movie" => SectionKind::Movie,
                    "show" => SectionKind::Show,
                    _ => SectionKind::Other,
                },
                key: raw.key,
                title: raw.title,
            })
            .collect();
        Ok(sections)
    }

    async fn section_leaf_items(&self, section: &SectionInfo) -> Result<Vec<MediaItem>, ServerError> {
        let item_type = match section.kind {
            SectionKind::Movie => MOVIE_ITEM_TYPE,
            SectionKind::Show => EPISODE_ITEM_TYPE,
            SectionKind::Other => return Ok(Vec::new()),
        };
        let entries = self.api.section_items(&section.key, item_type).await?;
        debug!(
            "{}: section '{}' listed {} leaf items",
            self.label,
            section.title,
            entries.len()
        );
        Ok(entries
            .into_iter()
            .map(|e| Self::entry_to_item(e, Some(&section.title)))
            .collect())
    }

    async fn playlists(&self) -> Result<Vec<PlaylistInfo>, ServerError> {
        let playlists = self
            .api
            .playlists()
            .await?
            .into_iter()
            .map(|raw| PlaylistInfo {
                key: raw.rating_key,
                title: raw.title,
                smart: raw.smart,
                playlist_type: raw.playlist_type,
            })
            .collect();
        Ok(playlists)
    }

    async fn playlist_items(&self, playlist_key: &str) -> Result<Vec<MediaItem>, ServerError> {
        let entries = self.api.playlist_items(playlist_key).await?;
        Ok(entries.into_iter().map(|e| Self::entry_to_item(e, None)).collect())
    }

    async fn create_playlist(&self, name: &str, seed: &MediaItem) -> Result<String, ServerError> {
        let uri = self.items_uri(std::slice::from_ref(seed)).await?;
        debug!("{}: creating playlist '{}' seeded with '{}'", self.label, name, seed.title);
        self.api.create_playlist(name, &uri, false).await
    }

    async fn create_playlist_via_uri(
        &self,
        name: &str,
        seed: &MediaItem,
    ) -> Result<String, ServerError> {
        let uri = self.items_uri(std::slice::from_ref(seed)).await?;
        debug!("{}: creating playlist '{}' via explicit URI encoding", self.label, name);
        self.api.create_playlist(name, &uri, true).await
    }

    async fn add_playlist_items(
        &self,
        playlist_key: &str,
        items: &[MediaItem],
    ) -> Result<(), ServerError> {
        if items.is_empty() {
            return Ok(());
        }
        let uri = self.items_uri(items).await?;
        self.api.add_playlist_items(playlist_key, &uri).await
    }

    async fn delete_playlist(&self, playlist_key: &str) -> Result<(), ServerError> {
        self.api.delete_playlist(playlist_key).await
    }

    async fn collections(&self, section: &SectionInfo) -> Result<Vec<CollectionInfo>, ServerError> {
        let collections = self
            .api
            .section_collections(&section.key)
            .await?
            .into_iter()
            .map(|raw| CollectionInfo { key: raw.rating_key, title: raw.title })
            .collect();
        Ok(collections)
    }

    async fn collection_items(&self, collection_key: &str) -> Result<Vec<MediaItem>, ServerError> {
        let entries = self.api.collection_children(collection_key).await?;
        Ok(entries.into_iter().map(|e| Self::entry_to_item(e, None)).collect())
    }

    async fn create_collection(
        &self,
        section_key: &str,
        name: &str,
        seed: &MediaItem,
    ) -> Result<String, ServerError> {
        let uri = self.items_uri(std::slice::from_ref(seed)).await?;
        debug!("{}: creating collection '{}' seeded with '{}'", self.label, name, seed.title);
        self.api.create_collection(name, section_key, &uri, false).await
    }

    async fn create_collection_via_uri(
        &self,
        section_key: &str,
        name: &str,
        seed: &MediaItem,
    ) -> Result<String, ServerError> {
        let uri = self.items_uri(std::slice::from_ref(seed)).await?;
        debug!("{}: creating collection '{}' via explicit URI encoding", self.label, name);
        self.api.create_collection(name, section_key, &uri, true).await
    }

    async fn add_collection_items(
        &self,
        collection_key: &str,
        items: &[MediaItem],
    ) -> Result<(), ServerError> {
        if items.is_empty() {
            return Ok(());
        }
        let uri = self.items_uri(items).await?;
        self.api.add_collection_items(collection_key, &uri).await
    }

    async fn remove_collection_item(
        &self,
        collection_key: &str,
        item: &MediaItem,
    ) -> Result<(), ServerError> {
        self.api.remove_collection_item(collection_key, &item.item_key).await
    }

    async fn edit_metadata(
        &self,
        item_key: &str,
        writes: &[FieldWrite],
    ) -> Result<(), ServerError> {
        let pairs: Vec<(String, String)> = writes
            .iter()
            .map(|w| (format!("{}", w.field), w.value.clone()))
            .collect();
        self.api.edit_metadata(item_key, &pairs).await
    }

    async fn lock_field(&self, item_key: &str, field: MetadataField) -> Result<(), ServerError> {
        self.api.set_field_lock(item_key, field.api_name(), true).await
    }

    async fn download_artwork(&self, path: &str) -> Result<Vec<u8>, ServerError> {
        self.api.fetch_bytes(path).await
    }

    async fn upload_poster(&self, item_key: &str, image: Vec<u8>) -> Result<(), ServerError> {
        self.api.upload_image(item_key, "posters", image).await
    }

    async fn upload_art(&self, item_key: &str, image: Vec<u8>) -> Result<(), ServerError> {
        self.api.upload_image(item_key, "arts", image).await
    }
}
