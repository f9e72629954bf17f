//! Check-then-write upload.
//!
//! [`ConditionalWriter::put`] probes the destination exactly once and writes
//! at most once. A probe that neither finds the object nor reports an explicit
//! "not found" aborts the call: an object whose existence is unknown is never
//! overwritten.
//!
//! Two callers racing on the same destination can both see it absent and both
//! write (the probe and the write are separate requests). Use
//! [`WriteMode::IfAbsent`] on stores that honour `If-None-Match`, or
//! serialize writers per destination, when only one write may land.

use crate::destination::Destination;
use crate::object_store::{IfMatch, ObjectStore, ObjectStoreError};
use crate::payload::{Payload, PayloadError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The destination already held an object; nothing was written.
    Skipped,
    Written,
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("invalid destination: {0}")]
    InvalidDestination(String),
    #[error("payload unavailable: {0}")]
    PayloadUnavailable(#[from] PayloadError),
    #[error("could not determine whether the object exists: {0}")]
    ProbeAmbiguous(String),
    #[error("write failed: {0}")]
    TransportFailure(String),
}

impl WriteError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WriteError::ProbeAmbiguous(_) | WriteError::TransportFailure(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Plain write after an `Absent` probe.
    #[default]
    Unconditional,
    /// Write with `If-None-Match: *`; losing a race to another writer is
    /// reported as [`WriteOutcome::Skipped`]. Only a failed precondition counts
    /// as a lost race; a conflict the store asks to retry is a
    /// [`WriteError::TransportFailure`].
    IfAbsent,
}

#[derive(Debug, PartialEq, Eq)]
enum ProbeResult {
    Present,
    Absent,
    Indeterminate(String),
}

impl From<Result<bool, ObjectStoreError>> for ProbeResult {
    fn from(result: Result<bool, ObjectStoreError>) -> Self {
        match result {
            Ok(true) => ProbeResult::Present,
            Ok(false) => ProbeResult::Absent,
            Err(e) => ProbeResult::Indeterminate(e.reason()),
        }
    }
}

pub struct ConditionalWriter<'a> {
    store: &'a dyn ObjectStore,
    mode: WriteMode,
}

impl<'a> ConditionalWriter<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self {
            store,
            mode: WriteMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Writes `payload` to `destination` unless an object is already there.
    ///
    /// The payload is only read or encoded after the probe reports the
    /// destination absent.
    pub fn put(
        &self,
        destination: &Destination,
        payload: Payload,
    ) -> Result<WriteOutcome, WriteError> {
        destination
            .validate()
            .map_err(WriteError::InvalidDestination)?;
        let (bucket, key) = (destination.bucket(), destination.key());

        let probe = ProbeResult::from(self.store.probe(bucket, key));
        debug!(bucket, key, ?probe, "probed destination");

        match probe {
            ProbeResult::Present => {
                info!(bucket, key, "object exists, skipping upload");
                Ok(WriteOutcome::Skipped)
            }
            ProbeResult::Indeterminate(reason) => {
                warn!(bucket, key, %reason, "existence probe failed, not writing");
                Err(WriteError::ProbeAmbiguous(reason))
            }
            ProbeResult::Absent => self.write(destination, payload),
        }
    }

    fn write(
        &self,
        destination: &Destination,
        payload: Payload,
    ) -> Result<WriteOutcome, WriteError> {
        let (bucket, key) = (destination.bucket(), destination.key());
        let body = payload.materialize()?;

        let cond = match self.mode {
            WriteMode::Unconditional => IfMatch::Any,
            WriteMode::IfAbsent => IfMatch::NoneMatch,
        };

        match self.store.put(bucket, key, &body, cond) {
            Ok(etag) => {
                info!(bucket, key, bytes = body.len(), %etag, "uploaded object");
                Ok(WriteOutcome::Written)
            }
            Err(ObjectStoreError::PreconditionFailed) if self.mode == WriteMode::IfAbsent => {
                info!(bucket, key, "object created concurrently, skipping upload");
                Ok(WriteOutcome::Skipped)
            }
            Err(e) => {
                warn!(bucket, key, error = %e, "upload failed");
                Err(WriteError::TransportFailure(e.reason()))
            }
        }
    }
}
