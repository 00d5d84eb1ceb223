//! PSA MCP Server Library
//!
//! This crate implements the Model Context Protocol (MCP) server for the PSA
//! resolution layer, exposing bounded searches, name lookups and validated
//! writes as tools.
//!
//! ## Architecture
//!
//! ```text
//! Agent (Claude, GPT, etc.)
//!        │
//!        ▼
//! ┌─────────────────┐
//! │   MCP Server    │ ◄── This crate
//! │                 │
//! │  ┌───────────┐  │
//! │  │   Tools   │  │ - psa_search_<kind>
//! │  │           │  │ - psa_resolve_names
//! │  │           │  │ - psa_update_ticket
//! │  │           │  │ - psa_create_*_note
//! │  │           │  │ - psa_cache_stats / psa_clear_cache
//! │  └───────────┘  │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    psa-core     │
//! │                 │
//! │ Pages │ Names   │
//! │ Meta  │ Validate│
//! └─────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use psa_core::{DirectUpstream, ResolutionLayer, ResolverConfig};
//! use psa_mcp::PsaMcpServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let upstream = Arc::new(DirectUpstream::from_json_file("tenant.json").unwrap());
//!     let layer = ResolutionLayer::new(upstream, ResolverConfig::default()).unwrap();
//!
//!     PsaMcpServer::new(Arc::new(layer)).run_stdio().await.unwrap();
//! }
//! ```

pub mod error;
pub mod server;
pub mod tools;

pub use error::{McpError, McpResult};
pub use server::PsaMcpServer;
pub use tools::{ToolAnnotations, ToolCall, ToolClass, ToolDefinition, ToolResult};

/// Server metadata for MCP protocol
pub const SERVER_NAME: &str = "psa-bridge";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SERVER_INSTRUCTIONS: &str = "Search tools accept pageSize; omit it for a sensible default, \
use -1 where allowed to fetch everything. Check possiblyTruncated before assuming a result is complete. \
Write tools validate against the tenant's live statuses, priorities and resources and report every \
problem with the valid values.";
