use clap::Parser;

/// Playhead - a headless playback-queue coordinator 🎵
#[derive(Parser, Debug)]
#[command(name = "playhead", version, about)]
pub struct Args {
    /// Override the metadata API base URL
    #[arg(long)]
    pub api_base: Option<String>,

    /// Override the stream endpoint base URL
    #[arg(long)]
    pub stream_base: Option<String>,

    /// Log directory (default: .logs)
    #[arg(long)]
    pub log_dir: Option<String>,

    /// Generate default config.toml to stdout
    #[arg(long)]
    pub generate_config: bool,
}
