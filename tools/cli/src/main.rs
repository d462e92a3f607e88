//! upup CLI - diagnostics for the upload widget configuration.
//!
//! Checks that the provider environment is complete, shows the derived
//! provider configuration, and prints OAuth authorization URLs.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use upup_common::Error;
use upup_config::{BuildOptions, EnvSource, MapEnv, ProcessEnv, Upup, REQUIRED_VARS};
use upup_providers::{
    google_authorization_request, onedrive_authorization_request, DEFAULT_REDIRECT_URL,
};

#[derive(Parser)]
#[command(name = "upup")]
#[command(about = "upup - Upload widget configuration tools")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that every required environment variable is set.
    Check {
        /// Read variables from a dotenv file instead of the process environment.
        #[arg(short, long)]
        env_file: Option<PathBuf>,
    },

    /// Show the derived provider configuration (secrets redacted).
    Show {
        /// Read variables from a dotenv file instead of the process environment.
        #[arg(short, long)]
        env_file: Option<PathBuf>,

        /// Target the document bucket instead of the image bucket.
        #[arg(short, long)]
        document: bool,

        /// Allow selecting multiple files.
        #[arg(short, long)]
        multiple: bool,
    },

    /// Print the OAuth authorization URL for a provider.
    AuthUrl {
        /// Provider to authorize.
        #[arg(short, long, value_enum)]
        provider: OAuthProvider,

        /// Read variables from a dotenv file instead of the process environment.
        #[arg(short, long)]
        env_file: Option<PathBuf>,

        /// Redirect URL registered with the provider.
        #[arg(short, long, default_value = DEFAULT_REDIRECT_URL)]
        redirect_url: String,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OAuthProvider {
    Google,
    Onedrive,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Check { env_file } => {
            let source = load_env(env_file.as_deref())?;
            println!("{}", cmd_check(source.as_ref())?);
            Ok(())
        }

        Commands::Show {
            env_file,
            document,
            multiple,
        } => {
            let source = load_env(env_file.as_deref())?;
            println!("{}", cmd_show(source.as_ref(), document, multiple)?);
            Ok(())
        }

        Commands::AuthUrl {
            provider,
            env_file,
            redirect_url,
        } => {
            let source = load_env(env_file.as_deref())?;
            println!("{}", cmd_auth_url(source.as_ref(), provider, &redirect_url)?);
            Ok(())
        }

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "upup", &mut io::stdout());
            Ok(())
        }
    }
}

/// Pick the variable source.
fn load_env(env_file: Option<&Path>) -> Result<Box<dyn EnvSource>> {
    match env_file {
        Some(path) => {
            debug!("Using environment file {}", path.display());
            let env = MapEnv::from_file(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Box::new(env))
        }
        None => Ok(Box::new(ProcessEnv)),
    }
}

/// Validate the environment.
fn cmd_check(source: &dyn EnvSource) -> Result<String> {
    match Upup::init(source, BuildOptions::default()) {
        Ok(_) => Ok(format!(
            "All {} required variables are set.",
            REQUIRED_VARS.len()
        )),
        Err(Error::Configuration { missing }) => {
            let mut report = String::from("Missing variables:");
            for name in &missing {
                report.push_str("\n  ");
                report.push_str(name);
            }
            anyhow::bail!("{}", report)
        }
        Err(e) => Err(e).context("Environment check failed"),
    }
}

/// Render the derived bundles as JSON.
fn cmd_show(source: &dyn EnvSource, document: bool, multiple: bool) -> Result<String> {
    let options = BuildOptions::new()
        .with_document(Some(document))
        .with_allow_multiple(multiple);
    let upup = Upup::init(source, options).context("Invalid configuration")?;
    serde_json::to_string_pretty(upup.configs()).context("Failed to serialize configuration")
}

/// Build the provider authorization URL.
fn cmd_auth_url(
    source: &dyn EnvSource,
    provider: OAuthProvider,
    redirect_url: &str,
) -> Result<String> {
    let upup = Upup::init(source, BuildOptions::default()).context("Invalid configuration")?;
    let request = match provider {
        OAuthProvider::Google => google_authorization_request(upup.google_config(), redirect_url),
        OAuthProvider::Onedrive => {
            onedrive_authorization_request(upup.one_drive_config(), redirect_url)
        }
    }
    .context("Failed to build authorization request")?;
    Ok(request.url)
}
