use clap::Parser;

/// fxbridge: MT5 terminal → Redis price bridge
#[derive(Parser, Debug)]
#[command(name = "fxbridge")]
pub struct Config {
    /// Redis host
    #[arg(long, env = "REDIS_HOST", default_value = "localhost")]
    pub redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value = "6379")]
    pub redis_port: u16,

    /// Redis logical database
    #[arg(long, env = "REDIS_DB", default_value = "0")]
    pub redis_db: u32,

    /// MT5 terminal gateway base URL
    #[arg(long, env = "MT5_GATEWAY_URL", default_value = "http://localhost:8001")]
    pub gateway_url: String,

    /// Comma-separated instruments, each either NAME or SOURCE=NORMALIZED
    /// (e.g. EURUSD,GBPUSD.r=GBPUSD)
    #[arg(
        long,
        env = "FX_SYMBOLS",
        default_value = "EURUSD,GBPUSD,USDJPY,AUDUSD,NZDUSD,USDCHF,CADJPY,AUDNZD,EURGBP"
    )]
    pub symbols: String,

    /// Pause between polling cycles in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value = "100")]
    pub poll_interval_ms: u64,

    /// Health/metrics listen address
    #[arg(long, env = "BRIDGE_LISTEN_ADDR", default_value = "0.0.0.0:9090")]
    pub listen_addr: String,
}

impl Config {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/{}", self.redis_host, self.redis_port, self.redis_db)
    }

    /// Symbol entries with whitespace and empty segments stripped.
    pub fn symbol_entries(&self) -> Vec<String> {
        self.symbols
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect()
    }
}
