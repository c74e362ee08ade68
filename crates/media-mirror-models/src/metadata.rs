use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Descriptive fields eligible for metadata sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataField {
    Summary,
    Tagline,
    ContentRating,
    OriginallyAvailableAt,
    TitleSort,
}

impl MetadataField {
    /// Default whitelist, in write order.
    pub const DEFAULT: [MetadataField; 5] = [
        MetadataField::Summary,
        MetadataField::Tagline,
        MetadataField::ContentRating,
        MetadataField::OriginallyAvailableAt,
        MetadataField::TitleSort,
    ];

    /// Wire name of the field on the server API.
    pub fn api_name(self) -> &'static str {
        match self {
            MetadataField::Summary => "summary",
            MetadataField::Tagline => "tagline",
            MetadataField::ContentRating => "contentRating",
            MetadataField::OriginallyAvailableAt => "originallyAvailableAt",
            MetadataField::TitleSort => "titleSort",
        }
    }

    pub fn from_api_name(name: &str) -> Option<MetadataField> {
        Self::DEFAULT.iter().copied().find(|f| f.api_name() == name)
    }

    /// Parse a comma-separated field list as passed on the command line.
    pub fn parse_list(list: &str) -> Result<Vec<MetadataField>, String> {
        let mut fields = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let field = Self::from_api_name(part)
                .ok_or_else(|| format!("unknown metadata field '{}'", part))?;
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        if fields.is_empty() {
            return Err("field list is empty".to_string());
        }
        Ok(fields)
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Snapshot of an item's descriptive fields and artwork paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub summary: Option<String>,
    pub tagline: Option<String>,
    pub content_rating: Option<String>,
    pub originally_available_at: Option<NaiveDate>,
    pub title_sort: Option<String>,
    /// Server-relative poster path, e.g. `/library/metadata/42/thumb/17`.
    pub thumb: Option<String>,
    /// Server-relative background art path.
    pub art: Option<String>,
}

impl ItemMetadata {
    pub fn is_unset(&self) -> bool {
        *self == ItemMetadata::default()
    }

    /// String value of a field, `None` when absent or blank.
    pub fn value(&self, field: MetadataField) -> Option<String> {
        let text = match field {
            MetadataField::Summary => self.summary.clone(),
            MetadataField::Tagline => self.tagline.clone(),
            MetadataField::ContentRating => self.content_rating.clone(),
            MetadataField::OriginallyAvailableAt => {
                self.originally_available_at.map(|d| d.format("%Y-%m-%d").to_string())
            }
            MetadataField::TitleSort => self.title_sort.clone(),
        };
        text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
    }
}

/// One planned field write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWrite {
    pub field: MetadataField,
    pub value: String,
}

/// Everything the metadata syncer intends to write for one matched item,
/// computed before any mutation so a dry run reports the exact plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPlan {
    pub source_title: String,
    pub dest_key: String,
    pub writes: Vec<FieldWrite>,
    pub copy_artwork: bool,
    pub lock_fields: bool,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && !self.copy_artwork
    }
}
