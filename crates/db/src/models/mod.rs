//! Row structs for the signoff tables.
//!
//! Each submodule holds a `FromRow` struct matching the table and a
//! `TryFrom` conversion into the `signoff_core` domain type.

pub mod audit;
pub mod flow;
pub mod template;
