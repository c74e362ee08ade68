use clap::{ArgAction, Parser, Subcommand};
use commands::config::ConfigCommands;
use commands::mirror::MirrorArgs;
use commands::{config, mirror};

mod commands;
mod logging;
mod output;
mod report;

#[derive(Parser)]
#[command(name = "plexmirror")]
#[command(about = "Mirror playlists, collections, and metadata between media servers")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror playlists, collections, and optionally metadata from the
    /// source server to the destination server
    #[command(long_about = "Recreate source playlists and collection memberships on the \
        destination, matching items by provider GUID. Optionally copies a whitelisted set of \
        metadata fields and artwork. The source is never mutated; reruns with --replace \
        converge to the same destination state.")]
    Mirror(MirrorArgs),

    /// Store endpoints and tokens in the config file
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },

    /// Run the engine's internal invariant checks against synthetic data and exit
    SelfTest,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let log_file = match &cli.command {
        Commands::Mirror(args) => args.log_file.clone(),
        _ => None,
    };
    logging::init_logging(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Mirror(args) => mirror::run_mirror(args, &output).await,
        Commands::Config { cmd } => config::run_config(cmd, &output),
        Commands::SelfTest => mirror::run_self_test_command(&output).await,
    }
}
