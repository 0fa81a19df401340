//! # Agentic Docs Core
//!
//! Pure logic shared by the Agentic Docs pipeline: the symbol data model,
//! content hashing, the embedding and vector index capability traits, the
//! section-owning document model used for idempotent merges, and the
//! parser for reasoning-loop model output.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or network code.
//! Everything that touches the outside world lives in the `agentic-docs`
//! application crate and is reached only through the traits defined here.

pub mod embedding;
pub mod hashing;
pub mod models;
pub mod react;
pub mod section;
pub mod store;
