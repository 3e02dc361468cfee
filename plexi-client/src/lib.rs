//! Perplexity API client.
//!
//! This crate provides:
//! - API key validation and secure credential storage
//! - A fixed catalog of selectable models with capability descriptors
//! - Three query modes: single answer, batch of choices, streamed fragments
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 PerplexityClient                     │
//! │  ┌───────────┐  ┌──────────────┐  ┌──────────────┐  │
//! │  │  ApiKey   │  │ ModelCatalog │  │ ModelPolicy  │  │
//! │  └───────────┘  └──────────────┘  └──────────────┘  │
//! └─────────────────────────────────────────────────────┘
//!          │ query / query_batch        │ query_stream
//!          ▼                            ▼
//!   chat-completions endpoint      ReplyStream
//!                                  (single-pass SSE fragments)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use plexi_client::PerplexityClient;
//!
//! let client = PerplexityClient::new("pplx-...")?;
//! let answer = client.query("What is the airspeed of an unladen swallow?").await?;
//! ```

mod error;

pub mod auth;
pub mod catalog;
pub mod client;
pub mod stream;
pub mod wire;

pub use catalog::{DEFAULT_MODEL, ModelCard, ModelCatalog};
pub use client::{LocalPolicy, ModelPolicy, PERPLEXITY_API_URL, PerplexityClient, StrictPolicy};
pub use error::{Error, Result};
pub use stream::ReplyStream;
