use crate::item::MediaItem;

/// Outcome of resolving one source item against the destination catalog.
/// Never partially resolved: either exactly one destination item, or
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchResult<'a> {
    Matched(&'a MediaItem),
    Unmatched,
}

impl<'a> MatchResult<'a> {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchResult::Matched(_))
    }

    pub fn matched(self) -> Option<&'a MediaItem> {
        match self {
            MatchResult::Matched(item) => Some(item),
            MatchResult::Unmatched => None,
        }
    }
}
