//! Encoding of the lease record persisted in the metadata store.
//!
//! The record is a small JSON document:
//!
//! ```text
//! {"version":1,"broker":<owner id>,"block_start":"<i64>","block_end":"<i64>"}
//! ```
//!
//! Both bounds are written as decimal strings so that generic JSON tooling
//! with 53-bit numbers never rounds them.
mod error;
mod record;

pub use error::*;
pub use record::*;
