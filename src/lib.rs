//! Bucket and object operations over S3 and S3-like stores, with an upload
//! path that never overwrites an existing object.
//!
//! ```no_run
//! use s3manager::{ConditionalWriter, Destination, Payload, StoreConfig, WriteOutcome};
//! use s3manager::object_store::s3::S3Store;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = S3Store::connect(&StoreConfig::from_env()?)?;
//! let writer = ConditionalWriter::new(&store);
//! let outcome = writer.put(
//!     &Destination::new("reports", "2024/q1.csv"),
//!     Payload::FilePath("q1.csv".into()),
//! )?;
//! assert!(matches!(outcome, WriteOutcome::Written | WriteOutcome::Skipped));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod destination;
pub mod manager;
pub mod object_store;
pub mod payload;
pub mod writer;

pub use config::{ConfigError, StoreConfig};
pub use destination::Destination;
pub use manager::{ManagerError, StorageManager};
pub use object_store::{IfMatch, ObjectStat, ObjectStore, ObjectStoreError};
pub use payload::{Payload, PayloadError, Table};
pub use writer::{ConditionalWriter, WriteError, WriteMode, WriteOutcome};
