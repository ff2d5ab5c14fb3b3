//! A GDPR-native relational storage core.
//!
//! Rows belonging to a data subject are transparently sharded into per-subject encrypted
//! mini-databases ([`kv`], [`crypto`], [`shards`]), materialized views over those rows are kept
//! incrementally consistent under writes by a dataflow engine (`dataflow`), and deletion requests
//! are only allowed to commit once every row they would orphan has actually been removed
//! (`compliance`). [`session`] binds the three together behind a single connection-oriented API.

#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic, clippy::style)]

pub mod compliance;
pub mod config;
pub mod crypto;
pub mod dataflow;
pub mod error;
pub mod kv;
pub mod record;
pub mod schema;
pub mod session;
pub mod shards;
pub mod telemetry;
pub mod util;
pub mod value;

pub use crate::compliance::ComplianceTransaction;
pub use crate::error::{Error, Result};
pub use crate::record::{Polarity, Record};
pub use crate::schema::Schema;
pub use crate::session::{LookupCondition, ResultSet, Session};
pub use crate::value::{ColumnType, Value};
