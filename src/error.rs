//! Error returned from the `k9shard` crate. This includes codec errors, storage errors, crypto
//! errors, schema errors, and compliance failures.

use crate::shards::TableName;

// -------------------------------------------------------------------------------------------------
//
/// Error returned from the `k9shard` crate.
///
/// Recoverable kinds (`ParseError`, `SchemaError`, `ConstraintError`, `ComplianceError`) bubble up
/// as statement-level failures that a [`crate::session::Session`] converts into a failed result.
/// `RedbStorage`/`RedbCommit` and `CryptoError` indicate the process state may be corrupted and are
/// treated as fatal by callers.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Surfaced to the client with position info by the (external) SQL parser; the engine itself
    /// only constructs this when rejecting GDPR syntax it does not recognize.
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("unknown table `{0}`")]
    UnknownTable(TableName),

    #[error("unknown shard kind `{0}`")]
    UnknownShardKind(String),

    #[error("OWNS/ACCESSES cannot be applied to table `{table}`: it already has {dependents} dependent table(s)")]
    SchemaHasDependents { table: TableName, dependents: usize },

    #[error("schema error: {0}")]
    SchemaError(String),

    /// Hot-path value/column type mismatch. The planner is assumed to have already checked types;
    /// reaching this indicates a programmer error upstream.
    #[error("type mismatch: column `{column}` expects {expected}, got {actual}")]
    TypeError {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("primary key already exists in table `{table}`")]
    ConstraintError { table: TableName },

    /// A compliance transaction could not commit because rows remain in the default shard.
    #[error("compliance error: {} orphaned row(s) remain in the default shard", orphans.len())]
    ComplianceError { orphans: Vec<(TableName, Vec<u8>)> },

    #[error("compliance transaction is not in the expected state: {0}")]
    ComplianceState(&'static str),

    /// Underlying KV storage failure. Fatal to the statement in progress.
    #[error(transparent)]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error(transparent)]
    RedbTransaction(#[from] redb::TransactionError),

    #[error(transparent)]
    RedbTable(#[from] redb::TableError),

    #[error(transparent)]
    RedbStorage(#[from] redb::StorageError),

    #[error(transparent)]
    RedbCommit(#[from] redb::CommitError),

    /// Cryptographic failure. Fatal to the process: it indicates either a corrupted database or a
    /// tampered ciphertext.
    #[error("crypto error: {0}")]
    CryptoError(String),

    /// A row was addressed under a subject whose encryption key is unknown. Indicates DB
    /// corruption (a key was lost without the row being forgotten).
    #[error("no encryption key on file for shard `{0}`")]
    UnknownSubjectKey(String),

    #[error("sequence codec error: {0}")]
    CodecError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
