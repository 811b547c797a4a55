//! # Gauchoclass
//!
//! Backend for a UCSB course advisor. Students upload an unofficial
//! transcript PDF and get back the courses they have completed plus the
//! catalog courses they can take next; a chat endpoint answers questions
//! about past grade distributions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   PDF    │──▶│ Partitioner │──▶│ Course codes │──▶│ Availability │
//! │  upload  │   │ Aryn/local  │   │ regex scan   │   │ + prereqs    │
//! └──────────┘   └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                                            │ embeddings
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐          ▼
//! │ question │──▶│  Embedder   │──▶│ Vector index │──▶ Claude ──▶ answer
//! └──────────┘   └─────────────┘   └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`catalog`] | CSV course catalog |
//! | [`course_codes`] | Course-code extraction from transcript text |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`prereq`] | Semantic prerequisite matching |
//! | [`availability`] | Ranking of courses a student can take |
//! | [`partition`] | Transcript PDF partitioning |
//! | [`advisor`] | End-to-end transcript pipeline |
//! | [`chat`] | Retrieval-augmented question answering |
//! | [`server`] | JSON HTTP API |

pub mod advisor;
pub mod availability;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod course_codes;
pub mod embedding;
pub mod models;
pub mod partition;
pub mod prereq;
pub mod server;
