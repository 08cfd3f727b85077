//! Data-driven definitions.
//!
//! Pure data structures deserialized from RON. This module contains no IO;
//! reading files from disk is the host's job.

mod unit_data;

pub use unit_data::{UnitCatalog, UnitTypeData};
