use clap::Parser;

/// Command-line overlay on top of `{configDir}/config.json` and the
/// `GPROXY_*` environment. Precedence is CLI > ENV > file.
#[derive(Parser, Debug)]
#[command(name = "gproxy-gateway", about = "Multi-tenant LLM gateway")]
pub struct Cli {
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub auth_dir: Option<String>,
    #[arg(long)]
    pub config_dir: Option<String>,
    /// Comma-separated downstream API keys accepted on inference routes.
    #[arg(long, value_delimiter = ',')]
    pub api_key: Vec<String>,
    #[arg(long)]
    pub debug: bool,
    #[arg(long)]
    pub routing_strategy: Option<String>,
    #[arg(long)]
    pub request_retry: Option<u32>,
    #[arg(long)]
    pub max_retry_interval: Option<u64>,
    /// Shared secret required on `/manage/*` routes.
    #[arg(long)]
    pub management_key: Option<String>,
    #[arg(long)]
    pub allow_remote: bool,
    #[arg(long)]
    pub passthrough_timeout: Option<u64>,
}
