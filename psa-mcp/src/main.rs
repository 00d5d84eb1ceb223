//! PSA MCP Server Binary
//!
//! ## Usage
//!
//! ```bash
//! # Run as MCP server (stdio) against a fixture tenant
//! psa-mcp-server --fixture ./psa-mcp/fixtures/demo-tenant.json
//!
//! # With a config file and verbose core logging
//! PSA_CONFIG=./psa.json RUST_LOG=psa_core=debug psa-mcp-server
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use psa_core::{DirectUpstream, ResolutionLayer, ResolverConfig};
use psa_mcp::PsaMcpServer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "psa-mcp-server", version, about = "MCP tool server for a PSA platform")]
struct Args {
    /// Resolver configuration (JSON)
    #[arg(long, env = "PSA_CONFIG")]
    config: Option<PathBuf>,

    /// Tenant fixture served by the in-process upstream (JSON)
    #[arg(long, env = "PSA_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "psa_mcp=info,psa_core=info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing (to stderr so it doesn't interfere with stdio MCP)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting PSA MCP Server v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading config");
            ResolverConfig::from_json_file(path)?
        }
        None => ResolverConfig::default(),
    }
    .apply_env()?;

    let upstream = match &args.fixture {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading fixture tenant");
            DirectUpstream::from_json_file(path)?
        }
        None => {
            tracing::warn!("No fixture given; serving an empty tenant");
            DirectUpstream::new()
        }
    };

    let layer = ResolutionLayer::new(Arc::new(upstream), config)?;
    let server = PsaMcpServer::new(Arc::new(layer));

    tracing::info!(tools = server.tools().len(), "MCP server ready, listening on stdio");
    server.run_stdio().await?;

    Ok(())
}
