use std::fs;
use std::io::{self, Write};
use std::time::UNIX_EPOCH;

use anyhow::Context;
use clap::Parser;
use s3manager::config::DEFAULT_REGION;
use s3manager::object_store::local::LocalStore;
use s3manager::object_store::s3::S3Store;
use s3manager::{
    Destination, ObjectStore, Payload, StorageManager, StoreConfig, Table, WriteMode,
    WriteOutcome,
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Args, Backend, Command, PutArgs};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let (store, region) = open_store(&args)?;
    let manager = StorageManager::new(store);
    run(&manager, &region, args.command)
}

/// Credentials are checked here, before any request is made.
fn open_store(args: &Args) -> anyhow::Result<(Box<dyn ObjectStore>, String)> {
    match args.backend {
        Backend::S3 => {
            let mut config = StoreConfig::from_env().context("loading S3 credentials")?;
            if let Some(region) = &args.region {
                config = config.with_region(region);
            }
            if let Some(endpoint) = &args.endpoint {
                config = config.with_endpoint(endpoint);
            }
            if let Some(attempts) = args.max_attempts {
                config = config.with_max_attempts(attempts);
            }
            tracing::debug!(?config, "connecting to S3");
            let region = config.region().to_string();
            let store = S3Store::connect(&config).context("creating S3 client")?;
            Ok((Box::new(store), region))
        }
        Backend::Local => {
            let region = args.region.clone().unwrap_or_else(|| DEFAULT_REGION.to_string());
            Ok((Box::new(LocalStore::new(&args.root)), region))
        }
    }
}

fn run(manager: &StorageManager, region: &str, command: Command) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();

    match command {
        Command::Buckets => {
            for name in manager.list_buckets()? {
                writeln!(stdout, "{name}")?;
            }
        }
        Command::CreateBucket { name } => {
            manager
                .create_bucket(&name, region)
                .with_context(|| format!("creating bucket {name}"))?;
            writeln!(stdout, "created {name}")?;
        }
        Command::DeleteBucket { name } => {
            manager
                .delete_bucket(&name)
                .with_context(|| format!("deleting bucket {name}"))?;
            writeln!(stdout, "deleted {name}")?;
        }
        Command::Ls { bucket, prefix } => {
            for key in manager.list_objects(&bucket, &prefix)? {
                writeln!(stdout, "{key}")?;
            }
        }
        Command::Put(put) => {
            let key = put
                .object_key()
                .context("no object key given and the source path has no file name")?;
            let destination = Destination::new(&put.bucket, key);
            let mode = if put.if_absent {
                WriteMode::IfAbsent
            } else {
                WriteMode::Unconditional
            };
            let payload = put_payload(&put)?;
            let outcome = manager
                .upload(&destination, payload, mode)
                .with_context(|| format!("uploading {destination}"))?;
            match outcome {
                WriteOutcome::Written => writeln!(stdout, "written {destination}")?,
                WriteOutcome::Skipped => writeln!(stdout, "skipped {destination} (already exists)")?,
            }
        }
        Command::Get {
            bucket,
            key,
            output,
        } => {
            let destination = Destination::new(bucket, key);
            let bytes = manager.download(&destination)?;
            match output {
                Some(path) => fs::write(&path, &bytes)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => stdout.write_all(&bytes)?,
            }
        }
        Command::CatTable { bucket, key } => {
            let table = manager.download_table(&Destination::new(bucket, key))?;
            write!(stdout, "{table}")?;
        }
        Command::Rm { bucket, key } => {
            let destination = Destination::new(bucket, key);
            manager.delete_object(&destination)?;
            writeln!(stdout, "deleted {destination}")?;
        }
        Command::Stat { bucket, key } => {
            let stat = manager.stat_object(&Destination::new(bucket, key))?;
            writeln!(stdout, "size:          {}", stat.size)?;
            if let Some(modified) = stat.last_modified {
                let secs = modified
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or_default();
                writeln!(stdout, "last modified: {secs} (unix seconds)")?;
            }
            let optional = [
                ("content type", stat.content_type),
                ("storage class", stat.storage_class),
                ("etag", stat.etag),
            ];
            for (label, value) in optional {
                if let Some(value) = value {
                    writeln!(stdout, "{:<15}{value}", format!("{label}:"))?;
                }
            }
        }
    }

    Ok(())
}

/// `--csv` input is parsed up front so malformed files fail before any request.
fn put_payload(put: &PutArgs) -> anyhow::Result<Payload> {
    if let Some(path) = &put.csv {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let table = Table::from_csv(&bytes)
            .with_context(|| format!("parsing {} as CSV", path.display()))?;
        return Ok(Payload::Tabular(table));
    }
    match &put.file {
        Some(path) => Ok(Payload::FilePath(path.clone())),
        None => anyhow::bail!("one of --file or --csv is required"),
    }
}
