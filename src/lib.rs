//! # Agentic Docs
//!
//! Retrieval-augmented API documentation generation for Python source trees.
//!
//! Every run indexes the tree into symbols, embeds them into a similarity
//! index, and documents each class, function and method with a language
//! model. Generated text lands in marker-delimited sections of mirrored
//! markdown documents, so re-running replaces exactly the sections it owns
//! and leaves hand-written text alone.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐
//! │ Indexer  │──▶│ Retriever │──▶│ Worker pool  │──┐
//! │ tree-sit │   │ embed+kNN │   │ direct/ReAct │  │
//! └──────────┘   └─────┬─────┘   └──────┬───────┘  │
//!                      ▼                ▼          ▼
//!                ┌──────────┐     ┌─────────┐ ┌─────────┐
//!                │  SQLite  │     │  Tools  │ │ Writer  │
//!                │  index   │     │ fs/grep │ │ docs/api│
//!                └──────────┘     └─────────┘ └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! adocs index                       # list extracted symbols
//! adocs generate --dry-run          # what would be documented
//! adocs generate --agentic --workers 8
//! adocs generate --changed-only     # only symbols whose source moved
//! adocs tools run search_code "def retrieve"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`parser`] | Source parser trait and tree-sitter Python parser |
//! | [`indexer`] | Symbol extraction over the source tree |
//! | [`embedding`] | Embedding providers and per-run cache |
//! | [`sqlite_index`] | Persistent similarity index |
//! | [`retriever`] | Embed-and-store and neighbor retrieval |
//! | [`http`] | JSON POST with retry for provider clients |
//! | [`llm`] | Language model providers |
//! | [`budget`] | Shared token budget |
//! | [`prompts`] | Prompt templates |
//! | [`tools`] | Tool registry and built-in tools |
//! | [`agent`] | Bounded reasoning loop |
//! | [`writer`] | Section merges into markdown documents |
//! | [`worker`] | Per-symbol generation and the worker pool |
//! | [`orchestrator`] | Run lifecycle |
//! | [`progress`] | Progress reporting on stderr |
//! | [`error`] | Per-task failure taxonomy |

pub mod agent;
pub mod budget;
pub mod config;
pub mod embedding;
pub mod error;
pub mod http;
pub mod indexer;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod prompts;
pub mod retriever;
pub mod sqlite_index;
pub mod tools;
pub mod worker;
pub mod writer;
