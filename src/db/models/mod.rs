//! This module contains all the sqlx structs for the database tables.

/// sqlx structs for accounts table.
pub mod account;
/// sqlx structs for commits table.
pub mod commit;
/// sqlx structs for digests table.
pub mod digest;
/// sqlx structs for repos table.
pub mod repo;
/// sqlx structs for stars table.
pub mod star;
