use crate::output::{Output, OutputFormat};
use crate::report;
use clap::Args;
use color_eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use media_mirror_config::{Config, PathManager, ServerEndpoint};
use media_mirror_core::{
    selftest, CollectionOptions, MetadataOptions, NameFilter, NameTemplate, PlaylistOptions,
    RunOptions, RunOrchestrator, RunSummary,
};
use media_mirror_models::MetadataField;
use media_mirror_sources::{MediaServer, PlexServer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Source server URL (falls back to SRC_PLEX_URL / config file)
    #[arg(long)]
    pub source_url: Option<String>,

    /// Source server access token (falls back to SRC_PLEX_TOKEN / config file)
    #[arg(long)]
    pub source_token: Option<String>,

    /// Destination server URL (falls back to DEST_PLEX_URL, PLEX_URL / config file)
    #[arg(long)]
    pub dest_url: Option<String>,

    /// Destination server access token (falls back to DEST_PLEX_TOKEN, PLEX_TOKEN / config file)
    #[arg(long)]
    pub dest_token: Option<String>,

    /// Regex: only playlists whose names match are mirrored
    #[arg(long)]
    pub include: Option<String>,

    /// Regex: playlists whose names match are skipped
    #[arg(long)]
    pub exclude: Option<String>,

    /// Copy smart playlists by materializing their current items as a static list
    #[arg(long)]
    pub materialize_smart: bool,

    /// Destination playlist name format; {name} inserts the source name
    #[arg(long, default_value = "{name}")]
    pub rename_template: String,

    /// Also mirror collections
    #[arg(long)]
    pub collections: bool,

    /// Skip playlists
    #[arg(long)]
    pub no_playlists: bool,

    /// Regex: only collections whose names match are mirrored
    #[arg(long)]
    pub collection_include: Option<String>,

    /// Regex: collections whose names match are skipped
    #[arg(long)]
    pub collection_exclude: Option<String>,

    /// Destination collection name format; {name} inserts the source name
    #[arg(long, default_value = "{name}")]
    pub collection_rename_template: String,

    /// Sync metadata fields from matched source items to their destination counterparts
    #[arg(long)]
    pub sync_metadata: bool,

    /// Comma list of fields to sync
    #[arg(long, default_value = "summary,tagline,contentRating,originallyAvailableAt,titleSort")]
    pub fields: String,

    /// Also copy poster and background art
    #[arg(long)]
    pub artwork: bool,

    /// Lock fields after writing so automated refreshes keep the synced values
    #[arg(long)]
    pub lock_fields: bool,

    /// Regex on title: only items whose title matches are metadata-synced
    #[arg(long)]
    pub meta_include: Option<String>,

    /// Regex on title: items whose title matches are skipped for metadata sync
    #[arg(long)]
    pub meta_exclude: Option<String>,

    /// Replace existing destination playlists and clear collection membership before re-adding
    #[arg(long)]
    pub replace: bool,

    /// Items are added to containers in batches of this size
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Compute and report everything without mutating the destination
    #[arg(long)]
    pub dry_run: bool,

    /// Skip TLS certificate verification (self-signed endpoints)
    #[arg(long)]
    pub insecure: bool,

    /// Run the engine's internal invariant checks against synthetic data and exit
    #[arg(long)]
    pub self_test: bool,

    /// Write unmatched source items to this CSV file
    #[arg(long, value_name = "PATH")]
    pub unmatched_csv: Option<PathBuf>,

    /// Write logs to this file (rotated daily) instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

pub async fn run_mirror(args: MirrorArgs, output: &Output) -> Result<()> {
    tracing::debug!("Mirror command started");

    if args.self_test {
        return run_self_test_command(output).await;
    }

    let (source_endpoint, dest_endpoint, insecure) = resolve_endpoints(&args, output);
    let options = match build_options(&args) {
        Ok(options) => options,
        Err(message) => {
            output.error(&message);
            std::process::exit(2);
        }
    };

    let source =
        match PlexServer::new("source", &source_endpoint.url, &source_endpoint.token, insecure) {
            Ok(server) => server,
            Err(e) => {
                output.error(format!("Failed to set up source client: {}", e));
                std::process::exit(2);
            }
        };
    let dest =
        match PlexServer::new("destination", &dest_endpoint.url, &dest_endpoint.token, insecure) {
            Ok(server) => server,
            Err(e) => {
                output.error(format!("Failed to set up destination client: {}", e));
                std::process::exit(2);
            }
        };

    let orchestrator =
        RunOrchestrator::new(Arc::new(source) as Arc<dyn MediaServer>, Arc::new(dest), options);

    let spinner = index_spinner(output);
    let result = match &spinner {
        Some(bar) => {
            let bar = bar.clone();
            let observer = move |section: &str, count: usize| {
                bar.set_message(format!("indexed '{}' ({} items)", section, count));
            };
            orchestrator.run_with_observer(&observer).await
        }
        None => orchestrator.run().await,
    };
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            // Connectivity/auth failure: hard stop, no summary.
            output.error(format!("Run aborted: {}", e));
            std::process::exit(1);
        }
    };

    if let Some(ref path) = args.unmatched_csv {
        if let Err(e) = report::write_unmatched_csv(path, &summary.unmatched) {
            output.warn(format!("Failed to write unmatched report: {}", e));
        } else {
            output.info(format!(
                "Unmatched report written to {} ({} rows)",
                path.display(),
                summary.unmatched.len()
            ));
        }
    }

    present_summary(&summary, output);
    Ok(())
}

pub async fn run_self_test_command(output: &Output) -> Result<()> {
    match selftest::run_self_checks().await {
        Ok(()) => {
            output.println("Self tests passed");
            Ok(())
        }
        Err(e) => {
            output.error(format!("Self test failed: {}", e));
            std::process::exit(1);
        }
    }
}

/// Flags > environment > config file. Missing source or destination
/// credentials are a configuration error (exit 2), matching the
/// no-summary contract for runs that never start.
fn resolve_endpoints(args: &MirrorArgs, output: &Output) -> (ServerEndpoint, ServerEndpoint, bool) {
    let paths = PathManager::default();
    let mut config = match Config::load(&paths.config_file()) {
        Ok(config) => config,
        Err(e) => {
            output.error(format!("{}", e));
            std::process::exit(2);
        }
    };
    config.apply_env();

    let mut source = config.source.unwrap_or_default();
    if let Some(ref url) = args.source_url {
        source.url = url.clone();
    }
    if let Some(ref token) = args.source_token {
        source.token = token.clone();
    }

    let mut dest = config.destination.unwrap_or_default();
    if let Some(ref url) = args.dest_url {
        dest.url = url.clone();
    }
    if let Some(ref token) = args.dest_token {
        dest.token = token.clone();
    }

    if !source.is_complete() {
        output.error(
            "Source URL and token are required. Use --source-url and --source-token, \
             set SRC_PLEX_URL and SRC_PLEX_TOKEN, or run 'plexmirror config source'.",
        );
        std::process::exit(2);
    }
    if !dest.is_complete() {
        output.error(
            "Destination URL and token are required. Use --dest-url and --dest-token, \
             set DEST_PLEX_URL and DEST_PLEX_TOKEN, or run 'plexmirror config dest'.",
        );
        std::process::exit(2);
    }

    let insecure = args.insecure || !config.verify_ssl;
    (source, dest, insecure)
}

fn build_options(args: &MirrorArgs) -> std::result::Result<RunOptions, String> {
    let playlists = if args.no_playlists {
        None
    } else {
        Some(PlaylistOptions {
            replace: args.replace,
            materialize_smart: args.materialize_smart,
            batch_size: args.batch_size,
            rename: NameTemplate::new(&args.rename_template),
            filter: NameFilter::new(args.include.as_deref(), args.exclude.as_deref())
                .map_err(|e| format!("Invalid playlist filter pattern: {}", e))?,
        })
    };

    let collections = if args.collections {
        Some(CollectionOptions {
            replace: args.replace,
            batch_size: args.batch_size,
            rename: NameTemplate::new(&args.collection_rename_template),
            filter: NameFilter::new(
                args.collection_include.as_deref(),
                args.collection_exclude.as_deref(),
            )
            .map_err(|e| format!("Invalid collection filter pattern: {}", e))?,
        })
    } else {
        None
    };

    let metadata = if args.sync_metadata {
        Some(MetadataOptions {
            fields: MetadataField::parse_list(&args.fields)
                .map_err(|e| format!("Invalid --fields value: {}", e))?,
            artwork: args.artwork,
            lock_fields: args.lock_fields,
            filter: NameFilter::new(args.meta_include.as_deref(), args.meta_exclude.as_deref())
                .map_err(|e| format!("Invalid metadata filter pattern: {}", e))?,
        })
    } else {
        None
    };

    Ok(RunOptions { playlists, collections, metadata, dry_run: args.dry_run })
}

fn index_spinner(output: &Output) -> Option<ProgressBar> {
    if output.is_quiet() || output.format() != OutputFormat::Human {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} building catalog index {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    Some(bar)
}

fn present_summary(summary: &RunSummary, output: &Output) {
    match output.format() {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            match serde_json::to_value(summary) {
                Ok(value) => output.payload(&value),
                Err(e) => output.error(format!("Failed to serialize summary: {}", e)),
            }
            return;
        }
        OutputFormat::Human => {}
    }

    if summary.dry_run {
        output.warn("Dry run: no changes were made to the destination");
    }

    let mut table = comfy_table::Table::new();
    table.load_preset(comfy_table::presets::UTF8_BORDERS_ONLY);
    table.set_header(["", "found", "created", "replaced", "skipped", "failed"]);
    table.add_row([
        "playlists".to_string(),
        summary.playlists.found.to_string(),
        summary.playlists.created.to_string(),
        summary.playlists.replaced.to_string(),
        summary.playlists.skipped.to_string(),
        summary.playlists.failed.to_string(),
    ]);
    table.add_row([
        "collections".to_string(),
        summary.collections.found.to_string(),
        summary.collections.created.to_string(),
        summary.collections.updated.to_string(),
        summary.collections.skipped.to_string(),
        summary.collections.failed.to_string(),
    ]);
    output.println(table.to_string());

    output.println(format!(
        "items: {} added via bulk, {} via single-item fallback, {} failed",
        summary.items.bulk_added, summary.items.fallback_added, summary.items.failed
    ));
    output.println(format!(
        "index: {} items, {} GUIDs, {} collisions, {} sections skipped",
        summary.index.items_indexed,
        summary.index.guids_indexed,
        summary.index.collisions,
        summary.index.sections_skipped
    ));
    output.println(format!(
        "metadata: {} scanned, {} updated, {} fields written, {} failed, artwork {}/{}",
        summary.metadata.scanned,
        summary.metadata.updated,
        summary.metadata.fields_written,
        summary.metadata.fields_failed,
        summary.metadata.artwork_copied,
        summary.metadata.artwork_copied + summary.metadata.artwork_failed
    ));

    if !summary.unmatched.is_empty() {
        const SHOWN: usize = 15;
        output.warn(format!("{} source items had no destination match:", summary.unmatched.len()));
        for item in summary.unmatched.iter().take(SHOWN) {
            output.println(format!(
                "  - {} [{}] (in '{}')",
                item.title,
                item.guid.as_deref().unwrap_or("no guid"),
                item.context
            ));
        }
        if summary.unmatched.len() > SHOWN {
            output.println(format!(
                "  ... and {} more (use --unmatched-csv for the full list)",
                summary.unmatched.len() - SHOWN
            ));
        }
    }

    for failure in &summary.item_failures {
        output.warn(format!("item add failed: {} ({})", failure.title, failure.reason));
    }
    for error in &summary.errors {
        output.warn(error);
    }

    if summary.has_partial_failures() {
        output.success("Run completed with recorded partial failures (see above)");
    } else {
        output.success("Run completed");
    }
}
