//! Shared types, errors, and configuration for the campus backend.
//!
//! This crate provides common types used across all other crates:
//! - Amount helpers with decimal precision (soles)
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management
//! - JWT validation for the actor identity

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod types;

pub use auth::Claims;
pub use config::{AppConfig, StorageBackend};
pub use error::{AppError, AppResult};
pub use jwt::{JwtConfig, JwtError, JwtService};
