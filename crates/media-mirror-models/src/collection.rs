use crate::item::MediaItem;
use serde::{Deserialize, Serialize};

/// The desired destination state of one named collection: the (possibly
/// renamed) collection name and the destination items that should be
/// members. Membership is a set; ordering is not significant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    pub members: Vec<MediaItem>,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, members: Vec<MediaItem>) -> Self {
        Self { name: name.into(), members }
    }

    pub fn member_keys(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.item_key.as_str())
    }
}
