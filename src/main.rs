mod colors;
mod commands;

use clap::{Parser, Subcommand};
use disa_patch::{CertificateIdentity, Config, Portal, RowCacheKey};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "disapatch")]
#[command(author, version, about = "List and download patches from the DISA patch repository", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Portal base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// PEM bundle with the client certificate and private key
    #[arg(long, global = true)]
    cert: Option<PathBuf>,

    /// Certificate thumbprint when TLS is terminated upstream (no key is presented)
    #[arg(long, global = true, conflicts_with = "cert")]
    thumbprint: Option<String>,

    /// Key for the per-row result cache: title or asset-id
    #[arg(long, global = true)]
    row_key: Option<RowCacheKey>,
}

#[derive(Subcommand)]
enum Commands {
    /// List downloadable files in a repository
    List {
        #[command(flatten)]
        query: commands::QueryArgs,

        /// Print one JSON object per file
        #[arg(long)]
        json: bool,
    },

    /// Download files from a repository
    Save {
        #[command(flatten)]
        query: commands::QueryArgs,

        /// Target directory
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// Show known repositories
    Repositories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    let default_filter = if cli.verbose {
        "disa_patch=debug,disapatch=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    colors::init_colors();

    let mut config = Config::from_env()?;
    if let Some(url) = cli.base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(cert) = cli.cert {
        config.certificate = Some(cert);
    }
    if let Some(key) = cli.row_key {
        config.row_cache_key = key;
    }

    let identity = cli.thumbprint.map(CertificateIdentity::from_thumbprint);
    let portal = Portal::new(config);

    match cli.command {
        Commands::List { query, json } => {
            commands::list(&portal, &query, identity, json).await?;
        }
        Commands::Save { query, path } => {
            commands::save(&portal, &query, identity, &path).await?;
        }
        Commands::Repositories => {
            commands::repositories();
        }
    }

    Ok(())
}
