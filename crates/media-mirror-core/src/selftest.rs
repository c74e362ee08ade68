//! Engine invariant checks against synthetic data, behind the `self-test`
//! command. These run in release builds, so they use their own in-memory
//! container rather than the test fixtures.

use crate::batch::{BatchWriter, ContainerSink, FillMode};
use crate::filter::NameFilter;
use crate::index::CatalogIndex;
use crate::matcher;
use crate::metadata::{build_plan, MetadataOptions};
use anyhow::{ensure, Result};
use async_trait::async_trait;
use media_mirror_models::{Guid, ItemKind, ItemMetadata, MediaItem, MetadataField, PlaylistSpec};
use media_mirror_sources::ServerError;

/// In-memory container that rejects bulk adds above a threshold, like the
/// destination API on a bad day.
struct SyntheticContainer {
    max_bulk: usize,
    added: Vec<String>,
}

#[async_trait]
impl ContainerSink for SyntheticContainer {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn create_seeded(&mut self, seed: &MediaItem) -> Result<(), ServerError> {
        self.added.push(seed.item_key.clone());
        Ok(())
    }

    async fn create_seeded_manual(&mut self, seed: &MediaItem) -> Result<(), ServerError> {
        self.added.push(seed.item_key.clone());
        Ok(())
    }

    async fn bulk_add(&mut self, items: &[MediaItem]) -> Result<(), ServerError> {
        if items.len() > self.max_bulk {
            return Err(ServerError::BulkRejected { message: "Must include items to add".into() });
        }
        self.added.extend(items.iter().map(|i| i.item_key.clone()));
        Ok(())
    }

    async fn add_single(&mut self, item: &MediaItem) -> Result<(), ServerError> {
        self.added.push(item.item_key.clone());
        Ok(())
    }
}

fn movie(key: &str, title: &str, guids: &[&str]) -> MediaItem {
    MediaItem::new(key, title, ItemKind::Movie)
        .with_guids(guids.iter().filter_map(|g| Guid::parse(g)).collect())
}

/// Run every invariant check; the first violation aborts with a message.
pub async fn run_self_checks() -> Result<()> {
    check_guid_normalization()?;
    check_matcher_determinism()?;
    check_playlist_dedup()?;
    check_filter_gate()?;
    check_non_clobber()?;
    check_batch_degradation().await?;
    Ok(())
}

fn check_guid_normalization() -> Result<()> {
    let legacy = Guid::parse("com.plexapp.agents.imdb://tt0133093?lang=en")
        .ok_or_else(|| anyhow::anyhow!("legacy GUID failed to parse"))?;
    ensure!(legacy.as_str() == "imdb://tt0133093", "legacy GUID did not normalize: {}", legacy);
    ensure!(Guid::parse("").is_none(), "empty GUID must not parse");
    Ok(())
}

fn check_matcher_determinism() -> Result<()> {
    let index = CatalogIndex::from_items(vec![
        movie("d1", "Alpha", &["plex://movie/abc", "imdb://tt001"]),
        movie("d2", "Beta", &["imdb://tt002"]),
    ]);
    let probe = movie("s1", "Alpha", &["imdb://tt001", "tvdb://77"]);
    let first = matcher::resolve(&probe, &index).matched().map(|i| i.item_key.clone());
    ensure!(first.as_deref() == Some("d1"), "matcher missed the expected item");
    for _ in 0..5 {
        let again = matcher::resolve(&probe, &index).matched().map(|i| i.item_key.clone());
        ensure!(again == first, "matcher is not deterministic");
    }
    let miss = matcher::resolve(&movie("s2", "Nowhere", &["imdb://tt404"]), &index);
    ensure!(!miss.is_matched(), "matcher resolved a GUID that is not indexed");
    Ok(())
}

fn check_playlist_dedup() -> Result<()> {
    let spec = PlaylistSpec::new(
        "ordered",
        false,
        vec![movie("a", "A", &[]), movie("b", "B", &[]), movie("a", "A", &[])],
    );
    let keys: Vec<&str> = spec.items.iter().map(|i| i.item_key.as_str()).collect();
    ensure!(keys == ["a", "b"], "playlist dedup broke ordering: {:?}", keys);
    Ok(())
}

fn check_filter_gate() -> Result<()> {
    let filter = NameFilter::new(Some("^Kids"), Some("Temp"))?;
    ensure!(!filter.keeps("Kids Temp List"), "exclude must override include");
    ensure!(filter.keeps("Kids Movies"), "include match was dropped");
    ensure!(!filter.keeps("Adult List"), "candidate without include match was kept");
    ensure!(NameFilter::open().keeps("anything"), "open filter dropped a candidate");
    Ok(())
}

fn check_non_clobber() -> Result<()> {
    let mut source = movie("s1", "Alpha", &[]);
    source.metadata =
        ItemMetadata { summary: Some("New".into()), tagline: None, ..Default::default() };
    let mut dest = movie("d1", "Alpha", &[]);
    dest.metadata = ItemMetadata {
        summary: Some("Old".into()),
        tagline: Some("Keep".into()),
        ..Default::default()
    };
    let plan = build_plan(&source, &dest, &MetadataOptions::default());
    ensure!(
        plan.writes.iter().any(|w| w.field == MetadataField::Summary),
        "differing summary was not planned"
    );
    ensure!(
        !plan.writes.iter().any(|w| w.field == MetadataField::Tagline),
        "absent source tagline would clobber the destination"
    );
    Ok(())
}

async fn check_batch_degradation() -> Result<()> {
    let items: Vec<MediaItem> =
        (0..10).map(|i| movie(&format!("k{}", i), &format!("Item {}", i), &[])).collect();
    let mut sink = SyntheticContainer { max_bulk: 2, added: Vec::new() };
    let report = BatchWriter::new(3).fill(&mut sink, &items, FillMode::Create).await;

    ensure!(!report.is_container_failure(), "synthetic create must not fail");
    ensure!(
        report.total_added() == items.len(),
        "degradation lost items: {} of {}",
        report.total_added(),
        items.len()
    );
    let expected: Vec<String> = items.iter().map(|i| i.item_key.clone()).collect();
    ensure!(sink.added == expected, "degradation reordered items");
    ensure!(report.failed.is_empty(), "unexpected item failures");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn self_checks_pass() {
        run_self_checks().await.unwrap();
    }
}
