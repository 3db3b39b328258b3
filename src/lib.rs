#![deny(missing_docs)]

//! Core library for the Support KB document pipeline server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Media type detection from byte signatures and filename extensions.
pub mod detect;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Extraction routing from detected format to text.
pub mod extraction;
/// Public file projections for tenant-facing listings.
pub mod files;
/// Content fingerprinting for deduplication.
pub mod fingerprint;
/// Text generation client abstraction and HTTP adapter.
pub mod generation;
/// Vector index integration and in-memory variant.
pub mod index;
/// Upload ingestion pipeline and its service surface.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion and search metrics helpers.
pub mod metrics;
/// Tenant-scoped entry repository over the index and embeddings.
pub mod repository;
/// Semantic search and agent answer assembly.
pub mod retrieval;
/// Blob storage abstraction and in-memory variant.
pub mod storage;
/// Resolved tenant identity.
pub mod tenant;
/// Conversation thread persistence for agent answers.
pub mod threads;
