use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub(crate) struct Args {
    /// Storage backend
    #[arg(long, env = "S3MANAGER_BACKEND", value_enum, default_value_t = Backend::S3)]
    pub(crate) backend: Backend,

    /// Root directory of the local backend
    #[arg(long, env = "S3MANAGER_ROOT", default_value = "./s3manager-data")]
    pub(crate) root: PathBuf,

    /// Region override for the S3 backend and for new buckets
    #[arg(long)]
    pub(crate) region: Option<String>,

    /// S3-compatible endpoint URL
    #[arg(long, env = "S3_ENDPOINT_URL")]
    pub(crate) endpoint: Option<String>,

    /// Attempts per S3 request, retries included
    #[arg(long, env = "S3MANAGER_MAX_ATTEMPTS")]
    pub(crate) max_attempts: Option<u32>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Backend {
    S3,
    Local,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// List buckets
    Buckets,
    /// Create a bucket
    CreateBucket { name: String },
    /// Delete an empty bucket
    DeleteBucket { name: String },
    /// List object keys
    Ls {
        bucket: String,
        #[arg(long, default_value = "")]
        prefix: String,
    },
    /// Upload unless the object already exists
    Put(PutArgs),
    /// Download an object
    Get {
        bucket: String,
        key: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Download a CSV object and print it as a table
    CatTable { bucket: String, key: String },
    /// Delete an object
    Rm { bucket: String, key: String },
    /// Show object metadata
    Stat { bucket: String, key: String },
}

#[derive(ClapArgs, Debug)]
pub(crate) struct PutArgs {
    pub(crate) bucket: String,
    /// Object key; defaults to the file name of `--file` or `--csv`
    pub(crate) key: Option<String>,
    /// Upload this file as-is
    #[arg(long, conflicts_with = "csv", required_unless_present = "csv")]
    pub(crate) file: Option<PathBuf>,
    /// Parse this CSV file and upload it re-encoded
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Also send If-None-Match so a concurrent writer cannot be overwritten
    #[arg(long)]
    pub(crate) if_absent: bool,
}

impl PutArgs {
    /// The explicit key, or the source file's name.
    pub(crate) fn object_key(&self) -> Option<String> {
        if let Some(key) = &self.key {
            return Some(key.clone());
        }
        self.csv
            .as_ref()
            .or(self.file.as_ref())
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    fn put_args(argv: &[&str]) -> PutArgs {
        let args = Args::try_parse_from(argv).unwrap();
        match args.command {
            Command::Put(put) => put,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_put_key_defaults_to_file_name() {
        let put = put_args(&["s3manager", "put", "reports", "--file", "exports/q1.csv"]);
        assert_eq!(put.key, None);
        assert_eq!(put.object_key().as_deref(), Some("q1.csv"));

        let put = put_args(&["s3manager", "put", "reports", "--csv", "/tmp/daily.csv"]);
        assert_eq!(put.object_key().as_deref(), Some("daily.csv"));

        let put = put_args(&["s3manager", "put", "reports", "2024/q1.csv", "--file", "q1.csv"]);
        assert_eq!(put.object_key().as_deref(), Some("2024/q1.csv"));
    }

    #[test]
    fn test_put_key_needs_a_file_name() {
        let put = put_args(&["s3manager", "put", "reports", "--file", ".."]);
        assert_eq!(put.object_key(), None);
    }

    #[test]
    fn test_put_requires_a_source() {
        let result = Args::try_parse_from(["s3manager", "put", "reports", "a.csv"]);
        assert!(result.is_err());

        let args = Args::try_parse_from([
            "s3manager", "--backend", "local", "put", "reports", "a.csv", "--csv", "a.csv",
            "--if-absent",
        ])
        .unwrap();
        assert_eq!(args.backend, Backend::Local);
        match args.command {
            Command::Put(put) => {
                assert!(put.if_absent);
                assert_eq!(put.csv, Some(PathBuf::from("a.csv")));
                assert!(put.file.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
