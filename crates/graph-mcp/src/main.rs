use graph_mcp::{router, AppState, ServerConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "graph_mcp=info,graph_auth=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let mut filter = EnvFilter::from_default_env();
    for directive in DEFAULT_LOG_FILTER.split(',') {
        filter = filter.add_directive(directive.parse()?);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_process()?;
    tracing::debug!(?config, "Loaded configuration");

    let state = AppState::from_config(&config).await;

    // The server starts whatever the verdict says
    if config.validate_on_startup {
        state.status.check_and_log().await;
    }

    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    let local_addr = listener.local_addr()?;

    println!("Graph MCP Server listening on http://{}", local_addr);
    println!();
    println!("Available endpoints:");
    println!("  GET  /health     - Liveness and authentication method");
    println!("  GET  /status     - Credential validation report");
    println!("  GET  /tools      - Tool definitions");
    println!("  POST /call-tool  - Call a tool");
    println!("  POST /mcp        - MCP JSON-RPC endpoint");
    println!();
    println!("Press Ctrl+C to shutdown");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    println!("Server shut down");
    Ok(())
}
