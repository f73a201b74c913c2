//! # MLP Common Library
//!
//! Shared code for the Mountain Legacy Project asset manager:
//! - Model catalog (declared tables, columns, ownership rules)
//! - Model constructor and value sanitizer
//! - Query builder and transactional repository
//! - Database bootstrap and schema introspection
//! - Configuration loading
//! - Password and session primitives

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod query;
pub mod schema;

pub use error::{Error, Result};
pub use model::Model;
pub use query::{QueryBuilder, Statement};
pub use schema::{ModelKind, ModelSchema, PgType};
