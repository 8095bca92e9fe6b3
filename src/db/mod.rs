//! Database module: models and schema for credential persistence.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `actor.rs`: the actor owning the pool; every read and write goes through it

pub mod actor;
pub mod models;
pub mod schema;

pub use models::{DbInstancePassword, StoredCredentials};
pub use schema::SQLITE_INIT;

pub use actor::{DbActorHandle, spawn};
