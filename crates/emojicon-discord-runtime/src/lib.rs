//! Discord front end for Emojicon.
//!
//! Hosts the request handler that turns a mention into a rendered mosaic,
//! the size policy and notice text it applies, and the serenity adapters
//! (gateway events, outbound transport, log-channel telemetry).

pub mod discord_gateway;
pub mod discord_telemetry;
pub mod discord_transport;
pub mod notices;
pub mod render_policy;
pub mod request_handler;
pub mod request_parsing;
pub mod runtime_config;

pub use discord_gateway::{run_discord_runtime, DiscordGateway};
pub use discord_telemetry::DiscordTelemetry;
pub use discord_transport::DiscordTransport;
pub use notices::load_help_payload;
pub use render_policy::{RenderPolicy, ResolvedDimensions, ValidationError};
pub use request_handler::{
    Community, IgnoreReason, InboundRequest, RenderSummary, RequestHandler,
    RequestHandlerConfig, RequestHandlerServices, RequestOutcome, Requester,
    DEFAULT_BLANK_GLYPH,
};
pub use request_parsing::{mention_pattern, parse_arguments, parse_leading_int, ParsedArguments};
pub use runtime_config::{load_runtime_assets, DiscordRuntimeConfig, RuntimeAssets};
