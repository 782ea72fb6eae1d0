use clap::Parser;
use profgate_core::GateConfig;
use profgate_mcp_runtime::{McpCommands, run as run_mcp};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "profgate-mcp",
    version,
    about = "profgate MCP server: gated profiling tools over stdio"
)]
struct Cli {
    /// Directory every path argument must resolve inside; empty disables sandboxing.
    /// Falls back to PROFGATE_BASE_DIR.
    #[arg(long)]
    base_dir: Option<String>,

    #[command(subcommand)]
    command: McpCommands,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // stdout carries MCP framing; logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "profgate_mcp=info,profgate_mcp_runtime=info,profgate_core=info".into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let gate = cli
        .base_dir
        .as_deref()
        .map(GateConfig::from_raw)
        .unwrap_or_else(GateConfig::from_env);
    tracing::info!(sandbox = gate.sandbox_enabled(), "starting profgate-mcp");
    let code = run_mcp(gate, cli.command).await;
    std::process::exit(code);
}
