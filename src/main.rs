//! Command line client for the blob store and the remote flags.
//!
//! # Usage
//!
//! ```bash
//! # Upload a batch of files into the `photos` folder
//! cloudutils --store-url file:///tmp/blobs upload --folder photos a.png b.png
//!
//! # Print a blob on stdout
//! cloudutils --store-url s3://bucket/app cat profile/42
//!
//! # Evaluate a flag file against the running version
//! cloudutils flags flags.json --current 1.4.2
//! ```

use clap::{Parser, Subcommand};
use cloudutils::{params, repo, store, types};
use colored::Colorize;
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cloudutils", version)]
#[command(about = "Blob transfers and remote flag evaluation", long_about = None)]
struct Cli {
    /// Object store URL (e.g. `file:///data/blobs`, `s3://bucket/prefix`, `memory:///`)
    #[arg(long, global = true, env = params::env::STORE_URL)]
    store_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload local files into a folder of the store
    Upload {
        /// Destination folder, relative to the store root
        #[arg(short, long, default_value = "")]
        folder: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Download a blob into a local file
    Download {
        path: String,

        /// Local destination, defaults to the blob name in the working directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a blob on stdout
    Cat { id: String },

    /// Delete a blob
    Delete { path: String },

    /// Evaluate a JSON flag file against the running version
    Flags {
        file: PathBuf,

        #[arg(short, long)]
        current: types::Version,
    },
}

type BoxError = Box<dyn std::error::Error>;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    match cli.command {
        Commands::Upload { folder, files } => {
            let blobs = blob_facade(cli.store_url.as_deref())?;
            upload(&blobs, &files, &folder).await
        }
        Commands::Download { path, output } => {
            let blobs = blob_facade(cli.store_url.as_deref())?;
            let output = match output {
                Some(output) => output,
                None => Path::new(&path)
                    .file_name()
                    .map(PathBuf::from)
                    .ok_or_else(|| format!("unable to derive a file name from `{path}`"))?,
            };

            let written = blobs.download(&path, &output).await?;
            println!(
                "{} {} ({} bytes)",
                "downloaded".green().bold(),
                output.display(),
                written
            );
            Ok(())
        }
        Commands::Cat { id } => {
            let blobs = blob_facade(cli.store_url.as_deref())?;
            let data = blobs.fetch(&id).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
            Ok(())
        }
        Commands::Delete { path } => {
            let blobs = blob_facade(cli.store_url.as_deref())?;
            blobs.delete(&path).await?;
            println!("{} {}", "deleted".green().bold(), path);
            Ok(())
        }
        Commands::Flags { file, current } => flags(file, &current).await,
    }
}

fn blob_facade(store_url: Option<&str>) -> Result<repo::FacadeBlob, BoxError> {
    let url = store_url.ok_or_else(|| {
        format!(
            "missing store url, use `--store-url` or `{}`",
            params::env::STORE_URL
        )
    })?;

    let (store, root) = store::ObjectBlobStore::from_url(url)?;
    debug!("using store root `{}`", root);

    Ok(repo::FacadeBlob::new(store.into_ref(), root))
}

async fn upload(
    blobs: &repo::FacadeBlob,
    files: &[PathBuf],
    folder: &str,
) -> Result<(), BoxError> {
    let uploaded = blobs
        .upload_batch(files, folder, |progress| {
            eprint!("\r{} {:>5.1}%", "uploading".cyan(), progress * 100.0);
        })
        .await;
    eprintln!();

    for path in uploaded? {
        println!("{} {}", "uploaded".green().bold(), path);
    }
    Ok(())
}

async fn flags(file: PathBuf, current: &types::Version) -> Result<(), BoxError> {
    let mut cache = repo::FacadeFlags::new(store::FileFlagSource::new(file));
    cache.fetch().await;

    let Some(outcome) = cache.evaluate(current) else {
        return Err(match cache.error() {
            Some(e) => e.to_string().into(),
            None => "remote flags unavailable".into(),
        });
    };

    let label = match outcome {
        repo::FlagOutcome::Maintenance => "maintenance".yellow().bold(),
        repo::FlagOutcome::ForcedUpdate => "forced update".red().bold(),
        repo::FlagOutcome::UpToDate => "up to date".green().bold(),
    };
    println!("{} (running {})", label, current);

    Ok(())
}
