//! In-memory `MediaServer` for driving the reconcilers in tests.

use async_trait::async_trait;
use media_mirror_models::{FieldWrite, Guid, ItemKind, MediaItem, MetadataField};
use media_mirror_sources::{
    CollectionInfo, MediaServer, PlaylistInfo, SectionInfo, SectionKind, ServerError,
    ServerIdentity,
};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct MockPlaylist {
    pub key: String,
    pub title: String,
    pub smart: bool,
    pub playlist_type: String,
    pub items: Vec<MediaItem>,
}

#[derive(Debug, Clone)]
pub struct MockCollection {
    pub key: String,
    pub title: String,
    pub section_key: String,
    pub items: Vec<MediaItem>,
}

#[derive(Default)]
pub struct MockServer {
    label: String,
    sections: Vec<SectionInfo>,
    section_items: Mutex<Vec<(String, Vec<MediaItem>)>>,
    playlists: Mutex<Vec<MockPlaylist>>,
    collections: Mutex<Vec<MockCollection>>,
    /// Every mutating call, in order.
    pub mutations: Mutex<Vec<String>>,
    pub edited: Mutex<Vec<(String, Vec<FieldWrite>)>>,
    pub locked: Mutex<Vec<(String, MetadataField)>>,
    pub uploaded: Mutex<Vec<(String, String)>>,
    /// Section keys whose enumeration fails.
    pub fail_sections: Vec<String>,
    /// Bulk adds above this size are rejected with the bulk-rejection class.
    pub max_bulk: Option<usize>,
    /// First-tier creates are rejected (manual-URI tier still works).
    pub reject_plain_creates: bool,
    /// The connectivity preflight fails.
    pub fail_connect: bool,
    next_key: Mutex<u32>,
}

pub fn movie(key: &str, title: &str, guids: &[&str]) -> MediaItem {
    MediaItem::new(key, title, ItemKind::Movie)
        .with_guids(guids.iter().filter_map(|g| Guid::parse(g)).collect())
}

impl MockServer {
    pub fn new(label: &str) -> Self {
        Self { label: label.to_string(), ..Default::default() }
    }

    pub fn with_movie_section(mut self, key: &str, title: &str, items: Vec<MediaItem>) -> Self {
        self.sections.push(SectionInfo {
            key: key.into(),
            title: title.into(),
            kind: SectionKind::Movie,
        });
        self.section_items.lock().unwrap().push((key.to_string(), items));
        self
    }

    pub fn add_playlist(&self, title: &str, smart: bool, playlist_type: &str, items: Vec<MediaItem>) {
        let key = self.fresh_key("p");
        self.playlists.lock().unwrap().push(MockPlaylist {
            key,
            title: title.to_string(),
            smart,
            playlist_type: playlist_type.to_string(),
            items,
        });
    }

    pub fn add_collection(&self, section_key: &str, title: &str, items: Vec<MediaItem>) {
        let key = self.fresh_key("c");
        self.collections.lock().unwrap().push(MockCollection {
            key,
            title: title.to_string(),
            section_key: section_key.to_string(),
            items,
        });
    }

    fn fresh_key(&self, prefix: &str) -> String {
        let mut next = self.next_key.lock().unwrap();
        *next += 1;
        format!("{}{}", prefix, next)
    }

    pub fn playlist_by_title(&self, title: &str) -> Option<MockPlaylist> {
        self.playlists.lock().unwrap().iter().find(|p| p.title == title).cloned()
    }

    pub fn playlist_count(&self, title: &str) -> usize {
        self.playlists.lock().unwrap().iter().filter(|p| p.title == title).count()
    }

    pub fn collection_by_title(&self, title: &str) -> Option<MockCollection> {
        self.collections.lock().unwrap().iter().find(|c| c.title == title).cloned()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.lock().unwrap().len()
    }

    fn log(&self, action: String) {
        self.mutations.lock().unwrap().push(action);
    }

    fn bulk_gate(&self, len: usize) -> Result<(), ServerError> {
        if let Some(max) = self.max_bulk {
            if len > max {
                return Err(ServerError::BulkRejected {
                    message: "Must include items to add".into(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MediaServer for MockServer {
    fn label(&self) -> &str {
        &self.label
    }

    async fn check_connection(&self) -> Result<ServerIdentity, ServerError> {
        if self.fail_connect {
            return Err(ServerError::Auth { server: self.label.clone(), status: 401 });
        }
        Ok(ServerIdentity {
            friendly_name: self.label.clone(),
            machine_identifier: format!("mock-{}", self.label),
            version: None,
        })
    }

    async fn sections(&self) -> Result<Vec<SectionInfo>, ServerError> {
        Ok(self.sections.clone())
    }

    async fn section_leaf_items(&self, section: &SectionInfo) -> Result<Vec<MediaItem>, ServerError> {
        if self.fail_sections.contains(&section.key) {
            return Err(ServerError::Api { status: 500, message: "section unavailable".into() });
        }
        let items = self.section_items.lock().unwrap();
        Ok(items
            .iter()
            .find(|(key, _)| *key == section.key)
            .map(|(_, items)| items.clone())
            .unwrap_or_default())
    }

    async fn playlists(&self) -> Result<Vec<PlaylistInfo>, ServerError> {
        Ok(self
            .playlists
            .lock()
            .unwrap()
            .iter()
            .map(|p| PlaylistInfo {
                key: p.key.clone(),
                title: p.title.clone(),
                smart: p.smart,
                playlist_type: p.playlist_type.clone(),
            })
            .collect())
    }

    async fn playlist_items(&self, playlist_key: &str) -> Result<Vec<MediaItem>, ServerError> {
        self.playlists
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.key == playlist_key)
            .map(|p| p.items.clone())
            .ok_or_else(|| ServerError::NotFound(playlist_key.to_string()))
    }

    async fn create_playlist(&self, name: &str, seed: &MediaItem) -> Result<String, ServerError> {
        if self.reject_plain_creates {
            return Err(ServerError::BulkRejected { message: "Must include items to add".into() });
        }
        self.log(format!("create_playlist:{}", name));
        let key = self.fresh_key("p");
        self.playlists.lock().unwrap().push(MockPlaylist {
            key: key.clone(),
            title: name.to_string(),
            smart: false,
            playlist_type: "video".into(),
            items: vec![seed.clone()],
        });
        Ok(key)
    }

    async fn create_playlist_via_uri(
        &self,
        name: &str,
        seed: &MediaItem,
    ) -> Result<String, ServerError> {
        self.log(format!("create_playlist_via_uri:{}", name));
        let key = self.fresh_key("p");
        self.playlists.lock().unwrap().push(MockPlaylist {
            key: key.clone(),
            title: name.to_string(),
            smart: false,
            playlist_type: "video".into(),
            items: vec![seed.clone()],
        });
        Ok(key)
    }

    async fn add_playlist_items(
        &self,
        playlist_key: &str,
        items: &[MediaItem],
    ) -> Result<(), ServerError> {
        self.bulk_gate(items.len())?;
        self.log(format!("add_playlist_items:{}:{}", playlist_key, items.len()));
        let mut playlists = self.playlists.lock().unwrap();
        let playlist = playlists
            .iter_mut()
            .find(|p| p.key == playlist_key)
            .ok_or_else(|| ServerError::NotFound(playlist_key.to_string()))?;
        playlist.items.extend(items.iter().cloned());
        Ok(())
    }

    async fn delete_playlist(&self, playlist_key: &str) -> Result<(), ServerError> {
        self.log(format!("delete_playlist:{}", playlist_key));
        self.playlists.lock().unwrap().retain(|p| p.key != playlist_key);
        Ok(())
    }

    async fn collections(&self, section: &SectionInfo) -> Result<Vec<CollectionInfo>, ServerError> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.section_key == section.key)
            .map(|c| CollectionInfo { key: c.key.clone(), title: c.title.clone() })
            .collect())
    }

    async fn collection_items(&self, collection_key: &str) -> Result<Vec<MediaItem>, ServerError> {
        self.collections
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.key == collection_key)
            .map(|c| c.items.clone())
            .ok_or_else(|| ServerError::NotFound(collection_key.to_string()))
    }

    async fn create_collection(
        &self,
        section_key: &str,
        name: &str,
        seed: &MediaItem,
    ) -> Result<String, ServerError> {
        if self.reject_plain_creates {
            return Err(ServerError::BulkRejected { message: "Must include items to add".into() });
        }
        self.log(format!("create_collection:{}", name));
        let key = self.fresh_key("c");
        self.collections.lock().unwrap().push(MockCollection {
            key: key.clone(),
            title: name.to_string(),
            section_key: section_key.to_string(),
            items: vec![seed.clone()],
        });
        Ok(key)
    }

    async fn create_collection_via_uri(
        &self,
        section_key: &str,
        name: &str,
        seed: &MediaItem,
    ) -> Result<String, ServerError> {
        self.log(format!("create_collection_via_uri:{}", name));
        let key = self.fresh_key("c");
        self.collections.lock().unwrap().push(MockCollection {
            key: key.clone(),
            title: name.to_string(),
            section_key: section_key.to_string(),
            items: vec![seed.clone()],
        });
        Ok(key)
    }

    async fn add_collection_items(
        &self,
        collection_key: &str,
        items: &[MediaItem],
    ) -> Result<(), ServerError> {
        self.bulk_gate(items.len())?;
        self.log(format!("add_collection_items:{}:{}", collection_key, items.len()));
        let mut collections = self.collections.lock().unwrap();
        let collection = collections
            .iter_mut()
            .find(|c| c.key == collection_key)
            .ok_or_else(|| ServerError::NotFound(collection_key.to_string()))?;
        for item in items {
            if !collection.items.iter().any(|i| i.item_key == item.item_key) {
                collection.items.push(item.clone());
            }
        }
        Ok(())
    }

    async fn remove_collection_item(
        &self,
        collection_key: &str,
        item: &MediaItem,
    ) -> Result<(), ServerError> {
        self.log(format!("remove_collection_item:{}:{}", collection_key, item.item_key));
        let mut collections = self.collections.lock().unwrap();
        let collection = collections
            .iter_mut()
            .find(|c| c.key == collection_key)
            .ok_or_else(|| ServerError::NotFound(collection_key.to_string()))?;
        collection.items.retain(|i| i.item_key != item.item_key);
        Ok(())
    }

    async fn edit_metadata(
        &self,
        item_key: &str,
        writes: &[FieldWrite],
    ) -> Result<(), ServerError> {
        self.log(format!("edit_metadata:{}", item_key));
        self.edited.lock().unwrap().push((item_key.to_string(), writes.to_vec()));
        Ok(())
    }

    async fn lock_field(&self, item_key: &str, field: MetadataField) -> Result<(), ServerError> {
        self.log(format!("lock_field:{}:{}", item_key, field));
        self.locked.lock().unwrap().push((item_key.to_string(), field));
        Ok(())
    }

    async fn download_artwork(&self, path: &str) -> Result<Vec<u8>, ServerError> {
        Ok(path.as_bytes().to_vec())
    }

    async fn upload_poster(&self, item_key: &str, _image: Vec<u8>) -> Result<(), ServerError> {
        self.log(format!("upload_poster:{}", item_key));
        self.uploaded.lock().unwrap().push((item_key.to_string(), "poster".into()));
        Ok(())
    }

    async fn upload_art(&self, item_key: &str, _image: Vec<u8>) -> Result<(), ServerError> {
        self.log(format!("upload_art:{}", item_key));
        self.uploaded.lock().unwrap().push((item_key.to_string(), "art".into()));
        Ok(())
    }
}
