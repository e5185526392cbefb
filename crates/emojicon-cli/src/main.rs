use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use emojicon_discord_runtime::{run_discord_runtime, DiscordRuntimeConfig};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "emojicon",
    about = "Chat bot that redraws images as emoji mosaics",
    version
)]
struct Cli {
    #[arg(
        long,
        env = "EMOJICON_DISCORD_TOKEN",
        hide_env_values = true,
        help = "Discord bot token."
    )]
    discord_token: String,

    #[arg(
        long,
        env = "EMOJICON_BLANK_EMOJI",
        help = "Glyph for transparent cells in channels that allow external emojis. Empty uses :heavy_minus_sign:."
    )]
    blank_emoji: Option<String>,

    #[arg(
        long,
        env = "EMOJICON_LOG_CHANNEL_ID",
        help = "Channel that receives telemetry lines."
    )]
    log_channel_id: Option<u64>,

    #[arg(
        long,
        env = "EMOJICON_PALETTE_PATH",
        help = "JSON palette of {token, rgb} entries. Defaults to the built-in palette."
    )]
    palette_path: Option<PathBuf>,

    #[arg(
        long,
        env = "EMOJICON_HELP_PATH",
        help = "JSON help embed. Defaults to the built-in help."
    )]
    help_path: Option<PathBuf>,

    #[arg(
        long,
        env = "EMOJICON_COOLDOWN_MS",
        default_value_t = 10_000,
        help = "Per-user cooldown after a successful render."
    )]
    cooldown_ms: u64,

    #[arg(
        long,
        env = "EMOJICON_BATCH_DELAY_MS",
        default_value_t = 1_000,
        help = "Pause between consecutive batched messages."
    )]
    batch_delay_ms: u64,

    #[arg(
        long,
        env = "EMOJICON_MAX_PAYLOAD_CHARS",
        default_value_t = 2_000,
        value_parser = parse_positive_usize,
        help = "Largest message body, in characters."
    )]
    max_payload_chars: usize,

    #[arg(
        long,
        env = "EMOJICON_FETCH_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout for downloading a source image."
    )]
    fetch_timeout_ms: u64,

    #[arg(
        long,
        env = "EMOJICON_MAX_IMAGE_BYTES",
        default_value_t = 8 * 1024 * 1024,
        value_parser = parse_positive_usize,
        help = "Largest accepted source image body."
    )]
    max_image_bytes: usize,

    #[arg(
        long,
        env = "RUST_LOG",
        default_value = "warn",
        help = "Log filter directive, e.g. info or emojicon=debug."
    )]
    log_level: String,
}

impl Cli {
    fn into_runtime_config(self) -> DiscordRuntimeConfig {
        let mut config = DiscordRuntimeConfig::new(self.discord_token);
        config.blank_glyph = self.blank_emoji;
        config.log_channel_id = self.log_channel_id;
        config.palette_path = self.palette_path;
        config.help_path = self.help_path;
        config.policy.cooldown = Duration::from_millis(self.cooldown_ms);
        config.delivery.batch_delay = Duration::from_millis(self.batch_delay_ms);
        config.delivery.max_payload_chars = self.max_payload_chars;
        config.images.request_timeout_ms = self.fetch_timeout_ms;
        config.images.max_image_bytes = self.max_image_bytes;
        config
    }
}

fn init_tracing(directives: &str) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    run_discord_runtime(cli.into_runtime_config()).await
}
