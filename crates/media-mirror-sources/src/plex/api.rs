use crate::error::ServerError;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, trace};
use urlencoding::encode;

/// Raw library section as returned by `/library/sections`.
#[derive(Debug, Clone)]
pub struct RawSection {
    pub key: String,
    pub title: String,
    pub type_: String,
}

/// Raw metadata entry shared by section, playlist, and collection listings.
#[derive(Debug, Clone, Default)]
pub struct MetadataEntry {
    pub rating_key: String,
    pub title: String,
    pub type_: String,
    pub guids: Vec<String>,
    pub grandparent_title: Option<String>,
    pub parent_index: Option<u32>,
    pub index: Option<u32>,
    pub summary: Option<String>,
    pub tagline: Option<String>,
    pub content_rating: Option<String>,
    pub originally_available_at: Option<String>,
    pub title_sort: Option<String>,
    pub thumb: Option<String>,
    pub art: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RawPlaylist {
    pub rating_key: String,
    pub title: String,
    pub smart: bool,
    pub playlist_type: String,
}

#[derive(Debug, Clone)]
pub struct RawCollection {
    pub rating_key: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct RawIdentity {
    pub friendly_name: String,
    pub machine_identifier: String,
    pub version: Option<String>,
}

/// Thin HTTP client for one Plex-compatible server.
///
/// Only transport concerns live here: headers, TLS verification, status
/// handling, and JSON traversal into the raw payload structs above. The
/// 400-on-bulk-endpoint case maps to `ServerError::BulkRejected` so the
/// batch writer can key its degradation on it.
pub struct PlexHttpClient {
    client: Client,
    base_url: String,
    token: String,
}

const CLIENT_IDENTIFIER: &str = "plexmirror";

impl PlexHttpClient {
    pub fn new(base_url: &str, token: &str, insecure: bool) -> Result<Self, ServerError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(insecure)
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                headers.insert(
                    reqwest::header::HeaderName::from_static("x-plex-client-identifier"),
                    reqwest::header::HeaderValue::from_static(CLIENT_IDENTIFIER),
                );
                headers
            })
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Convert a non-success response into the error taxonomy.
    /// `bulk_endpoint` marks calls whose 400 answers mean "the bulk path
    /// refused this request" rather than a generic API error.
    async fn check_status(
        &self,
        response: Response,
        bulk_endpoint: bool,
    ) -> Result<Response, ServerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        let message = if message.is_empty() {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        } else {
            message
        };
        trace!("Plex API error {}: {}", status, message);

        if message.to_ascii_lowercase().contains("must include items")
            || (bulk_endpoint && status == StatusCode::BAD_REQUEST)
        {
            return Err(ServerError::BulkRejected { message });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ServerError::NotFound(message));
        }
        Err(ServerError::Api { status: status.as_u16(), message })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ServerError> {
        let response = self
            .client
            .get(self.url(path))
            .query(&[("X-Plex-Token", self.token.as_str())])
            .query(query)
            .send()
            .await?;
        let response = self.check_status(response, false).await?;
        Ok(response.json().await?)
    }

    pub async fn identity(&self) -> Result<RawIdentity, ServerError> {
        let response = self
            .client
            .get(self.url("/"))
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ServerError::Auth {
                server: self.base_url.clone(),
                status: status.as_u16(),
            });
        }
        let response = self.check_status(response, false).await?;
        let json: Value = response.json().await?;

        let container = json
            .get("MediaContainer")
            .ok_or_else(|| ServerError::InvalidResponse("missing MediaContainer".into()))?;
        let machine_identifier = container
            .get("machineIdentifier")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ServerError::InvalidResponse("missing machineIdentifier".into()))?
            .to_string();
        let friendly_name = container
            .get("friendlyName")
            .and_then(|v| v.as_str())
            .unwrap_or("<unnamed server>")
            .to_string();
        let version = container.get("version").and_then(|v| v.as_str()).map(String::from);

        Ok(RawIdentity { friendly_name, machine_identifier, version })
    }

    pub async fn sections(&self) -> Result<Vec<RawSection>, ServerError> {
        let json = self.get_json("/library/sections", &[]).await?;
        let mut sections = Vec::new();
        if let Some(dirs) = json
            .get("MediaContainer")
            .and_then(|mc| mc.get("Directory"))
            .and_then(|d| d.as_array())
        {
            for dir in dirs {
                let key = dir.get("key").and_then(|k| k.as_str()).unwrap_or("").to_string();
                let title = dir.get("title").and_then(|t| t.as_str()).unwrap_or("").to_string();
                let type_ = dir.get("type").and_then(|t| t.as_str()).unwrap_or("").to_string();
                if !key.is_empty() {
                    sections.push(RawSection { key, title, type_ });
                }
            }
        }
        debug!("Plex: {} library sections on {}", sections.len(), self.base_url);
        Ok(sections)
    }

    /// Leaf items of one section. `item_type` follows the server convention:
    /// 1 = movie, 4 = episode.
    pub async fn section_items(
        &self,
        section_key: &str,
        item_type: u32,
    ) -> Result<Vec<MetadataEntry>, ServerError> {
        let path = format!("/library/sections/{}/all", section_key);
        let type_param = item_type.to_string();
        let json = self
            .get_json(&path, &[("type", type_param.as_str()), ("includeGuids", "1")])
            .await?;
        Ok(parse_metadata_entries(&json))
    }

    pub async fn playlists(&self) -> Result<Vec<RawPlaylist>, ServerError> {
        let json = self.get_json("/playlists", &[]).await?;
        let mut playlists = Vec::new();
        if let Some(entries) = json
            .get("MediaContainer")
            .and_then(|mc| mc.get("Metadata"))
            .and_then(|m| m.as_array())
        {
            for entry in entries {
                let rating_key = rating_key_of(entry);
                let title =
                    entry.get("title").and_then(|t| t.as_str()).unwrap_or("").to_string();
                let smart = entry
                    .get("smart")
                    .map(|s| s.as_bool().unwrap_or(s.as_u64() == Some(1)))
                    .unwrap_or(false);
                let playlist_type = entry
                    .get("playlistType")
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .to_string();
                if !rating_key.is_empty() {
                    playlists.push(RawPlaylist { rating_key, title, smart, playlist_type });
                }
            }
        }
        Ok(playlists)
    }

    pub async fn playlist_items(&self, playlist_key: &str) -> Result<Vec<MetadataEntry>, ServerError> {
        let path = format!("/playlists/{}/items", playlist_key);
        let json = self.get_json(&path, &[("includeGuids", "1")]).await?;
        Ok(parse_metadata_entries(&json))
    }

    /// Create a playlist around a seed item URI. Returns the new playlist's
    /// rating key. `explicit` adds the type/smart parameters the terser
    /// form leaves for the server to infer; it is the fallback encoding.
    pub async fn create_playlist(
        &self,
        title: &str,
        uri: &str,
        explicit: bool,
    ) -> Result<String, ServerError> {
        let mut query: Vec<(&str, &str)> = vec![("title", title), ("uri", uri)];
        if explicit {
            query.push(("type", "video"));
            query.push(("smart", "0"));
        }
        let response = self
            .client
            .post(self.url("/playlists"))
            .query(&[("X-Plex-Token", self.token.as_str())])
            .query(&query)
            .send()
            .await?;
        let response = self.check_status(response, true).await?;
        let json: Value = response.json().await?;
        first_rating_key(&json)
            .ok_or_else(|| ServerError::InvalidResponse("playlist create returned no key".into()))
    }

    pub async fn add_playlist_items(
        &self,
        playlist_key: &str,
        uri: &str,
    ) -> Result<(), ServerError> {
        let path = format!("/playlists/{}/items", playlist_key);
        let response = self
            .client
            .put(self.url(&path))
            .query(&[("X-Plex-Token", self.token.as_str()), ("uri", uri)])
            .send()
            .await?;
        self.check_status(response, true).await?;
        Ok(())
    }

    pub async fn delete_playlist(&self, playlist_key: &str) -> Result<(), ServerError> {
        let path = format!("/playlists/{}", playlist_key);
        let response = self
            .client
            .delete(self.url(&path))
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await?;
        self.check_status(response, false).await?;
        Ok(())
    }

    pub async fn section_collections(
        &self,
        section_key: &str,
    ) -> Result<Vec<RawCollection>, ServerError> {
        let path = format!("/library/sections/{}/collections", section_key);
        let json = self.get_json(&path, &[]).await?;
        let mut collections = Vec::new();
        if let Some(entries) = json
            .get("MediaContainer")
            .and_then(|mc| mc.get("Metadata"))
            .and_then(|m| m.as_array())
        {
            for entry in entries {
                let rating_key = rating_key_of(entry);
                let title =
                    entry.get("title").and_then(|t| t.as_str()).unwrap_or("").to_string();
                if !rating_key.is_empty() {
                    collections.push(RawCollection { rating_key, title });
                }
            }
        }
        Ok(collections)
    }

    pub async fn collection_children(
        &self,
        collection_key: &str,
    ) -> Result<Vec<MetadataEntry>, ServerError> {
        let path = format!("/library/collections/{}/children", collection_key);
        let json = self.get_json(&path, &[("includeGuids", "1")]).await?;
        Ok(parse_metadata_entries(&json))
    }

    pub async fn create_collection(
        &self,
        title: &str,
        section_key: &str,
        uri: &str,
        explicit: bool,
    ) -> Result<String, ServerError> {
        let mut query: Vec<(&str, &str)> =
            vec![("title", title), ("sectionId", section_key), ("uri", uri)];
        if explicit {
            query.push(("type", "1"));
            query.push(("smart", "0"));
        }
        let response = self
            .client
            .post(self.url("/library/collections"))
            .query(&[("X-Plex-Token", self.token.as_str())])
            .query(&query)
            .send()
            .await?;
        let response = self.check_status(response, true).await?;
        let json: Value = response.json().await?;
        first_rating_key(&json)
            .ok_or_else(|| ServerError::InvalidResponse("collection create returned no key".into()))
    }

    pub async fn add_collection_items(
        &self,
        collection_key: &str,
        uri: &str,
    ) -> Result<(), ServerError> {
        let path = format!("/library/collections/{}/items", collection_key);
        let response = self
            .client
            .put(self.url(&path))
            .query(&[("X-Plex-Token", self.token.as_str()), ("uri", uri)])
            .send()
            .await?;
        self.check_status(response, true).await?;
        Ok(())
    }

    pub async fn remove_collection_item(
        &self,
        collection_key: &str,
        item_key: &str,
    ) -> Result<(), ServerError> {
        let path = format!("/library/collections/{}/items/{}", collection_key, item_key);
        let response = self
            .client
            .delete(self.url(&path))
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await?;
        self.check_status(response, false).await?;
        Ok(())
    }

    /// Write field values on one item. Pairs are `(wire name, value)`;
    /// they become `{field}.value` query parameters.
    pub async fn edit_metadata(
        &self,
        item_key: &str,
        pairs: &[(String, String)],
    ) -> Result<(), ServerError> {
        let path = format!("/library/metadata/{}", item_key);
        let mut url = format!("{}?X-Plex-Token={}", self.url(&path), encode(&self.token));
        for (name, value) in pairs {
            url.push_str(&format!("&{}.value={}", name, encode(value)));
        }
        let response = self.client.put(url).send().await?;
        self.check_status(response, false).await?;
        Ok(())
    }

    pub async fn set_field_lock(
        &self,
        item_key: &str,
        field_name: &str,
        locked: bool,
    ) -> Result<(), ServerError> {
        let path = format!("/library/metadata/{}", item_key);
        let lock_param = format!("{}.locked", field_name);
        let response = self
            .client
            .put(self.url(&path))
            .query(&[
                ("X-Plex-Token", self.token.as_str()),
                (lock_param.as_str(), if locked { "1" } else { "0" }),
            ])
            .send()
            .await?;
        self.check_status(response, false).await?;
        Ok(())
    }

    /// Fetch raw bytes from a server-relative path (artwork download).
    pub async fn fetch_bytes(&self, path: &str) -> Result<Vec<u8>, ServerError> {
        let response = self
            .client
            .get(self.url(path))
            .query(&[("X-Plex-Token", self.token.as_str())])
            .send()
            .await?;
        let response = self.check_status(response, false).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Upload artwork bytes; `kind` is "posters" or "arts".
    pub async fn upload_image(
        &self,
        item_key: &str,
        kind: &str,
        image: Vec<u8>,
    ) -> Result<(), ServerError> {
        let path = format!("/library/metadata/{}/{}", item_key, kind);
        let response = self
            .client
            .post(self.url(&path))
            .query(&[("X-Plex-Token", self.token.as_str())])
            .body(image)
            .send()
            .await?;
        self.check_status(response, false).await?;
        Ok(())
    }
}

fn rating_key_of(entry: &Value) -> String {
    // ratingKey is a string on modern servers but has been seen numeric.
    match entry.get("ratingKey") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn first_rating_key(json: &Value) -> Option<String> {
    json.get("MediaContainer")
        .and_then(|mc| mc.get("Metadata"))
        .and_then(|m| m.as_array())
        .and_then(|entries| entries.first())
        .map(rating_key_of)
        .filter(|k| !k.is_empty())
}

fn parse_guid_strings(guid_value: Option<&Value>) -> Vec<String> {
    let mut guids = Vec::new();
    let Some(guid_value) = guid_value else {
        return guids;
    };
    if let Some(guid_array) = guid_value.as_array() {
        for guid_obj in guid_array {
            if let Some(id) = guid_obj.get("id").and_then(|i| i.as_str()) {
                guids.push(id.to_string());
            } else if let Some(id) = guid_obj.as_str() {
                guids.push(id.to_string());
            }
        }
    } else if let Some(id) = guid_value.get("id").and_then(|i| i.as_str()) {
        guids.push(id.to_string());
    } else if let Some(id) = guid_value.as_str() {
        guids.push(id.to_string());
    }
    guids
}

fn string_of(entry: &Value, field: &str) -> Option<String> {
    entry.get(field).and_then(|v| v.as_str()).map(String::from).filter(|s| !s.is_empty())
}

fn parse_metadata_entries(json: &Value) -> Vec<MetadataEntry> {
    let container = json.get("MediaContainer");
    let entries = container
        .and_then(|mc| mc.get("Metadata"))
        .or_else(|| container.and_then(|mc| mc.get("Video")))
        .and_then(|m| m.as_array());

    let mut items = Vec::new();
    let Some(entries) = entries else {
        return items;
    };
    for entry in entries {
        let rating_key = rating_key_of(entry);
        if rating_key.is_empty() {
            continue;
        }
        items.push(MetadataEntry {
            rating_key,
            title: entry.get("title").and_then(|t| t.as_str()).unwrap_or("").to_string(),
            type_: entry.get("type").and_then(|t| t.as_str()).unwrap_or("").to_string(),
            guids: parse_guid_strings(entry.get("Guid")),
            grandparent_title: string_of(entry, "grandparentTitle"),
            parent_index: entry.get("parentIndex").and_then(|v| v.as_u64()).map(|v| v as u32),
            index: entry.get("index").and_then(|v| v.as_u64()).map(|v| v as u32),
            summary: string_of(entry, "summary"),
            tagline: string_of(entry, "tagline"),
            content_rating: string_of(entry, "contentRating"),
            originally_available_at: string_of(entry, "originallyAvailableAt"),
            title_sort: string_of(entry, "titleSort"),
            thumb: string_of(entry, "thumb"),
            art: string_of(entry, "art"),
        });
    }
    items
}
