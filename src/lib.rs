//! # Grounding KB
//!
//! Per-agent PDF knowledge bases for grounding conversational answers in
//! citable source passages.
//!
//! Each agent (a domain persona such as maternal health or legal rights)
//! owns a directory of PDFs. Building an agent's knowledge base extracts
//! page-attributed text, cleans it, splits it into overlapping passages that
//! remember which pages they came from, embeds them, and persists a flat
//! vector index. At query time the index is searched by cosine similarity
//! and every hit is returned as a [`citation::Citation`] naming document and
//! pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌─────────────┐   ┌────────────┐
//! │  Raw PDFs  │──▶│  Extract +  │──▶│   Chunk +   │──▶│  Per-agent │
//! │ per agent  │   │    Clean    │   │    Embed    │   │   index    │
//! └────────────┘   └─────────────┘   └─────────────┘   └─────┬──────┘
//!                                                            │
//!                                      ┌─────────────────────┤
//!                                      ▼                     ▼
//!                                 ┌──────────┐         ┌──────────┐
//!                                 │   CLI    │         │   HTTP   │
//!                                 │   (kb)   │         │  server  │
//!                                 └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kb init                          # create per-agent directories
//! kb add maaya ./anc_guidelines.pdf
//! kb build all
//! kb search maaya "iron folic acid in pregnancy"
//! kb serve                         # start the retrieval server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`agents`] | Agent names and topic aliases |
//! | [`models`] | Core data types (pages, passages) |
//! | [`extract`] | Page-wise PDF text extraction with fallback |
//! | [`clean`] | Text cleaning |
//! | [`chunk`] | Page-aware sliding-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory vector index and similarity search |
//! | [`store`] | Index persistence |
//! | [`ingest`] | Build orchestration and source management |
//! | [`citation`] | Citation reconstruction |
//! | [`retrieve`] | Query-time retrieval across agents |
//! | [`stats`] | Knowledge base status |
//! | [`search`] | CLI search output |
//! | [`server`] | HTTP retrieval server |

pub mod agents;
pub mod chunk;
pub mod citation;
pub mod clean;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod retrieve;
pub mod search;
pub mod server;
pub mod stats;
pub mod store;
