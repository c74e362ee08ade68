use crate::guid::Guid;
use crate::metadata::ItemMetadata;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Movie,
    Episode { show: String, season: u32, episode: u32 },
}

/// One playable unit (movie or episode) as enumerated from a server.
///
/// `item_key` is the server's opaque identifier and is only meaningful
/// against the server the item was enumerated from. Two items from
/// different servers are the same logical work iff their GUID sets
/// intersect. Constructed fresh on each enumeration, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub item_key: String,
    pub title: String,
    pub kind: ItemKind,
    pub guids: Vec<Guid>,
    pub section: Option<String>,
    /// Descriptive fields, populated only when enumerated for metadata sync.
    #[serde(default, skip_serializing_if = "ItemMetadata::is_unset")]
    pub metadata: ItemMetadata,
}

impl MediaItem {
    pub fn new(item_key: impl Into<String>, title: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            item_key: item_key.into(),
            title: title.into(),
            kind,
            guids: Vec::new(),
            section: None,
            metadata: ItemMetadata::default(),
        }
    }

    pub fn with_guids(mut self, guids: Vec<Guid>) -> Self {
        self.guids = guids;
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    /// Whether the GUID sets of the two items intersect.
    pub fn same_work(&self, other: &MediaItem) -> bool {
        self.guids.iter().any(|g| other.guids.contains(g))
    }

    /// Title with episode context when present, for logs and reports.
    pub fn display_title(&self) -> String {
        match &self.kind {
            ItemKind::Movie => self.title.clone(),
            ItemKind::Episode { show, season, episode } => {
                format!("{} S{:02}E{:02} - {}", show, season, episode, self.title)
            }
        }
    }

    /// First GUID in preference order, for reporting unmatched items.
    pub fn primary_guid(&self) -> Option<&Guid> {
        self.guids.iter().min_by_key(|g| g.provider.rank())
    }
}
