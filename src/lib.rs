//! # Handbook QA
//!
//! Grounded question answering over institutional handbooks and policies.
//!
//! Documents (txt, pdf, docx) are extracted, normalized, split into
//! overlapping chunks, embedded, and stored in SQLite. Questions are
//! answered by embedding the query, scanning for the nearest chunks by
//! cosine distance, and asking a generation model to answer only from
//! that context, with one citation per retrieved chunk.
//!
//! ## Quick Start
//!
//! ```bash
//! hbq init                      # create database
//! hbq ingest manifest.toml      # extract, chunk, embed, store
//! hbq ask "Is attendance mandatory?"
//! hbq status                    # row counts
//! hbq serve                     # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Pipeline error taxonomy |
//! | [`models`] | Core data types |
//! | [`extract`] | File-to-text extraction |
//! | [`normalize`] | Whitespace and line-ending cleanup |
//! | [`chunk`] | Overlapping, boundary-aware chunking |
//! | [`embedding`] | Embedding backend and batch driver |
//! | [`store`] | SQLite vector store and nearest-neighbor scan |
//! | [`ingest`] | Manifest-driven ingestion pipeline |
//! | [`retrieve`] | Query-time retrieval |
//! | [`answer`] | Grounded answer assembly with citations |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod retrieve;
pub mod server;
pub mod store;
