//! # RLM Engine
//!
//! A recursive query engine that answers natural-language questions over a
//! bounded document/transcript context. Complex queries are decomposed into
//! sub-queries, each routed to an appropriately sized model tier; retrieved
//! context is cached, and every token, dollar, and millisecond is accounted
//! for.
//!
//! ## Architecture
//!
//! ```text
//! resolve() → Decomposition Controller
//!                  ↓ fan-out (bounded)
//!           Memory Store → Retrieval Cache
//!                  ↓
//!            Model Router → Reasoning Provider (HTTP)
//!                  ↓
//!          Telemetry Aggregator
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rlm_engine::{Config, QueryEngine, SessionConfig};
//! use rlm_engine::memory::TranscriptSource;
//! use rlm_engine::router::HttpProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let source = Arc::new(TranscriptSource::new("..."));
//!     let provider = Arc::new(HttpProvider::new(&config.provider, &config.request)?);
//!     let engine = Arc::new(QueryEngine::new(&config, source, provider));
//!     let resolution = engine
//!         .resolve("Compare X and Y and summarize risks", SessionConfig::from_config(&config))
//!         .await?;
//!     println!("{}", resolution.answer);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management for the engine.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Memory store, retrieval cache, and context-source collaborators.
pub mod memory;
/// Prompt constants and answer-assembly templates.
pub mod prompts;
/// Recursive decomposition controller and query tree.
pub mod resolver;
/// Model-tier router, family normalization, and the provider seam.
pub mod router;
/// Token/cost/timing accounting.
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use resolver::{QueryEngine, Resolution, SessionConfig};
