//! Core business logic for the campus tuition backend.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `tuition` - Payment records, schedule gating, reconciliation against the
//!   cash ledger (caja), and ledger summaries
//!
//! Persistence is abstracted behind [`tuition::TuitionRepository`]; the db
//! crate provides the PostgreSQL implementation and this crate ships an
//! in-memory one.

pub mod tuition;
