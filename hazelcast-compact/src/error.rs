//! Error types for compact serialization.

use std::io;
use thiserror::Error;

/// The main error type for compact serialization operations.
#[derive(Debug, Error)]
pub enum HazelcastError {
    /// Schema violations and construction failures: unknown field names,
    /// mismatched kinds, duplicate writes, writes after completion, malformed
    /// input, unusable constructors.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A schema id was neither cached locally nor known to the cluster.
    #[error("unknown schema: no schema with id {schema_id} is known locally or on the cluster")]
    UnknownSchema {
        /// The unresolved schema id.
        schema_id: i64,
    },

    /// Schema publication ran out of retries before every connected member
    /// acknowledged the schema.
    #[error(
        "replication incomplete: schemas {schema_ids:?} were not acknowledged by all members after {attempts} attempts"
    )]
    ReplicationIncomplete {
        /// The under-replicated schema ids.
        schema_ids: Vec<i64>,
        /// Number of send attempts made.
        attempts: u32,
    },

    /// Registration rules were violated.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport failures reported by a `SchemaChannel` implementation.
    #[error("connection error: {0}")]
    Connection(String),

    /// I/O errors from a `SchemaChannel` implementation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl HazelcastError {
    pub(crate) fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns true if retrying at a higher level may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UnknownSchema { .. } | Self::ReplicationIncomplete { .. } | Self::Connection(_)
        )
    }
}

/// A specialized `Result` type for compact serialization operations.
pub type Result<T> = std::result::Result<T, HazelcastError>;
