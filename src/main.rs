use std::io::IsTerminal;
use std::time::Duration;

use clap::Parser;
use inferno_probe::console::Console;
use inferno_probe::core::config::{
    DEFAULT_API_KEY, DEFAULT_HOST, DEFAULT_MAX_TOKENS, DEFAULT_PORT, DEFAULT_TEMPERATURE,
    ProbeConfig,
};
use inferno_probe::core::models::TestMode;
use inferno_probe::probe::Probe;

#[derive(Parser)]
#[command(name = "inferno-probe", about = "Test the Inferno API")]
struct Cli {
    /// API host
    #[arg(long, default_value = DEFAULT_HOST, env = "INFERNO_HOST")]
    host: String,

    /// API port
    #[arg(long, default_value_t = DEFAULT_PORT, env = "INFERNO_PORT")]
    port: u16,

    /// API key
    #[arg(long, default_value = DEFAULT_API_KEY, env = "INFERNO_API_KEY")]
    key: String,

    /// Model to use
    #[arg(long, env = "INFERNO_MODEL")]
    model: Option<String>,

    /// Maximum tokens to generate
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS, env = "INFERNO_MAX_TOKENS")]
    max_tokens: u32,

    /// Temperature for generation
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE, env = "INFERNO_TEMPERATURE")]
    temperature: f64,

    /// Test mode
    #[arg(long, value_enum, default_value_t = TestMode::All)]
    mode: TestMode,

    /// Request timeout in seconds (none by default)
    #[arg(long, env = "INFERNO_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Disable coloured output
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn config(&self) -> ProbeConfig {
        ProbeConfig {
            host: self.host.clone(),
            port: self.port,
            api_key: self.key.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    inferno_probe::setup_logging();

    let cli = Cli::parse();
    let config = cli.config();
    tracing::info!(host = %config.host, port = config.port, mode = ?cli.mode, "inferno-probe starting");

    let stdout = std::io::stdout();
    let color = !cli.no_color && stdout.is_terminal();
    let mut probe = Probe::new(&config, Console::new(stdout.lock(), color))?;

    // Failing modes are reported by the probe itself and do not change the exit status.
    probe.run(cli.mode).await?;
    Ok(())
}
