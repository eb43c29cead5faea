//! # Asha
//!
//! A retrieval-augmented career assistant for Indian women: job listings,
//! community events, mentorship programs and government schemes.
//!
//! Asha loads a small local corpus (a PDF, JSON record files, free-text
//! notes), chunks and embeds it into a persisted similarity index, and for
//! each question retrieves the closest passages and hands them, with a
//! persona prompt and the recent conversation, to a hosted chat model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Corpus    │──▶│ Chunk+Embed │──▶│ Index (SQLite│
//! │ PDF/JSON/TXT│   │             │   │  + in-memory)│
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ top-k
//!                     ┌──────────┐     ┌─────▼──────┐     ┌───────────┐
//!   query + history ─▶│  Prompt  │◀────│ Retriever  │     │ Chat model│
//!                     │ Assembler│────────────────────────▶│ (Gemini / │
//!                     └──────────┘                         │  OpenAI)  │
//!                                                          └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GEMINI_API_KEY=...
//! export HUGGINGFACE_HUB_API_TOKEN=...
//! asha seed                       # write sample corpus files
//! asha index build                # embed and persist the corpus
//! asha ask "What is the MUDRA scheme?" --context-type schemes
//! asha serve                      # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`models`] | Core data types |
//! | [`corpus`] | Corpus loading |
//! | [`samples`] | Built-in sample corpus |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`db`] | SQLite connections |
//! | [`index`] | Similarity index and its lifecycle |
//! | [`retrieve`] | Top-k retrieval |
//! | [`prompt`] | Prompt assembly |
//! | [`conversation`] | Conversation state |
//! | [`llm`] | Chat model providers |
//! | [`feedback`] | Feedback storage |
//! | [`chat`] | Request pipeline and shared context |
//! | [`server`] | HTTP API |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod conversation;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod error;
pub mod feedback;
pub mod index;
pub mod llm;
pub mod logging;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod samples;
pub mod server;
