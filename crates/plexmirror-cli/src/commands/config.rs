use crate::output::Output;
use clap::Subcommand;
use color_eyre::eyre::Context;
use color_eyre::Result;
use media_mirror_config::{mask_token, Config, PathManager, ServerEndpoint};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the stored configuration (tokens masked)
    Show,

    /// Store the source server endpoint
    Source {
        /// Source server URL, e.g. http://nas:32400
        #[arg(long)]
        url: Option<String>,

        /// Source access token (prompted when omitted)
        #[arg(long)]
        token: Option<String>,
    },

    /// Store the destination server endpoint
    Dest {
        /// Destination server URL
        #[arg(long)]
        url: Option<String>,

        /// Destination access token (prompted when omitted)
        #[arg(long)]
        token: Option<String>,
    },

    /// Toggle TLS certificate verification
    VerifySsl {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

pub fn run_config(cmd: ConfigCommands, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let config_file = paths.config_file();
    let mut config = Config::load(&config_file)
        .map_err(|e| color_eyre::eyre::eyre!("failed to load {}: {}", config_file.display(), e))?;

    match cmd {
        ConfigCommands::Show => {
            output.info(format!("Config file: {}", config_file.display()));
            show_endpoint(output, "source", config.source.as_ref());
            show_endpoint(output, "destination", config.destination.as_ref());
            output.info(format!("verify_ssl: {}", config.verify_ssl));
        }
        ConfigCommands::Source { url, token } => {
            let endpoint = updated_endpoint(config.source.take(), url, token, "Source token")?;
            config.source = Some(endpoint);
            config.save(&config_file).map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
            output.success("Source endpoint stored");
        }
        ConfigCommands::Dest { url, token } => {
            let endpoint =
                updated_endpoint(config.destination.take(), url, token, "Destination token")?;
            config.destination = Some(endpoint);
            config.save(&config_file).map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
            output.success("Destination endpoint stored");
        }
        ConfigCommands::VerifySsl { enabled } => {
            config.verify_ssl = enabled;
            config.save(&config_file).map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
            output.success(format!("verify_ssl set to {}", enabled));
        }
    }
    Ok(())
}

fn show_endpoint(output: &Output, name: &str, endpoint: Option<&ServerEndpoint>) {
    match endpoint {
        Some(endpoint) => {
            output.info(format!(
                "{}: {} (token {})",
                name,
                if endpoint.url.is_empty() { "<no url>" } else { endpoint.url.as_str() },
                mask_token(&endpoint.token)
            ));
        }
        None => output.info(format!("{}: <not configured>", name)),
    }
}

fn updated_endpoint(
    current: Option<ServerEndpoint>,
    url: Option<String>,
    token: Option<String>,
    prompt: &str,
) -> Result<ServerEndpoint> {
    let mut endpoint = current.unwrap_or_default();
    if let Some(url) = url {
        endpoint.url = url;
    }
    let token = match token {
        Some(token) => token,
        None => rpassword::prompt_password(format!("{}: ", prompt))
            .context("failed to read token from terminal")?,
    };
    if !token.trim().is_empty() {
        endpoint.token = token.trim().to_string();
    }
    Ok(endpoint)
}
