use crate::item::MediaItem;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A source playlist to be recreated on the destination: name plus its
/// ordered item sequence. Duplicate source items are suppressed at
/// construction, first occurrence kept, so downstream stages see a clean
/// ordered sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSpec {
    pub name: String,
    pub smart: bool,
    pub items: Vec<MediaItem>,
}

impl PlaylistSpec {
    pub fn new(name: impl Into<String>, smart: bool, items: Vec<MediaItem>) -> Self {
        let mut seen: HashSet<String> = HashSet::new();
        let items = items
            .into_iter()
            .filter(|item| seen.insert(item.item_key.clone()))
            .collect();
        Self { name: name.into(), smart, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
