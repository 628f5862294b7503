use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LEVEL: &str = "warn";

/// Install the global subscriber. Output goes to stderr so stdout stays free
/// for command output and the MCP stdio transport.
pub fn init(level: Option<&str>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or(DEFAULT_LEVEL)));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false));

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global subscriber: {}", e))?;

    Ok(())
}
