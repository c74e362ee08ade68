use anyhow::{Context, Result};
use media_mirror_core::summary::UnmatchedItem;
use std::path::Path;

/// Write the unmatched-items report: one row per source item that found no
/// destination counterpart, with its best GUID and the container it came
/// from.
pub fn write_unmatched_csv(path: &Path, unmatched: &[UnmatchedItem]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writer.write_record(["title", "guid", "context"])?;
    for item in unmatched {
        writer.write_record([
            item.title.as_str(),
            item.guid.as_deref().unwrap_or(""),
            item.context.as_str(),
        ])?;
    }
    writer.flush().context("failed to flush unmatched report")?;
    Ok(())
}
