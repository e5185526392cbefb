//! Per-event orchestration: filter, admit, fetch, render, deliver, release.
//!
//! Every failure is turned into a user notice plus telemetry; `handle` never
//! returns an error. Gates are only taken once validation and the image
//! fetch have succeeded, and the destination lock is an RAII guard so it is
//! released whether delivery succeeds, fails, or the task unwinds.

use std::sync::Arc;

use emojicon_core::{AdmissionGate, Destination, RequesterId};
use emojicon_delivery::{
    DeliveryError, DeliveryReport, DeliveryScheduler, EmbedPayload, OutboundMessage, SplitMode,
    TelemetryRecord, TelemetrySink, Transport, TransportError,
};
use emojicon_render::{render_pixel_grid, ImageService, ImageServiceError, PaletteResolver};
use regex::Regex;
use thiserror::Error;

use crate::notices::{
    cooldown_notice, delivery_failure_notice, failure_telemetry, generic_failure_notice,
    helped_telemetry, image_failure_notice, render_telemetry, validation_notice, REDIRECT_NOTICE,
};
use crate::render_policy::{RenderPolicy, ValidationError};
use crate::request_parsing::{mention_pattern, parse_arguments};

/// Blank glyph used when a destination cannot render custom emojis.
pub const DEFAULT_BLANK_GLYPH: &str = ":heavy_minus_sign:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: RequesterId,
    pub tag: String,
    pub is_bot: bool,
}

/// Shared community (server) a request was posted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Community {
    pub id: u64,
    pub name: String,
}

/// Transport-neutral view of one inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub origin: Destination,
    pub requester: Requester,
    pub community: Option<Community>,
    pub content: String,
    pub attachment_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    AutomatedAccount,
    DestinationLocked,
    NotAddressed,
    SendNotPermitted,
}

impl IgnoreReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutomatedAccount => "automated_account",
            Self::DestinationLocked => "destination_locked",
            Self::NotAddressed => "not_addressed",
            Self::SendNotPermitted => "send_not_permitted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub destination: Destination,
    pub redirected: bool,
    pub width: u32,
    pub height: u32,
    pub delivery: Option<DeliveryReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Ignored(IgnoreReason),
    CoolingDown { remaining_secs: u64 },
    Helped,
    Rejected(ValidationError),
    ImageFailed { unsupported_format: bool },
    Delivered(RenderSummary),
    DeliveryFailed {
        summary: RenderSummary,
        error: DeliveryError,
    },
    /// Notice delivery itself failed; reported as a generic error.
    Failed,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored(_) => "ignored",
            Self::CoolingDown { .. } => "cooling_down",
            Self::Helped => "helped",
            Self::Rejected(_) => "rejected",
            Self::ImageFailed { .. } => "image_failed",
            Self::Delivered(_) => "delivered",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Error)]
enum HandlerError {
    #[error("failed to send notice: {0}")]
    Notice(#[from] TransportError),
}

#[derive(Debug, Clone)]
pub struct RequestHandlerConfig {
    pub bot_user_id: u64,
    pub policy: RenderPolicy,
    /// Custom blank glyph for destinations that allow external emojis.
    pub blank_glyph: Option<String>,
    pub help: EmbedPayload,
}

/// Collaborators the handler drives for each request.
#[derive(Clone)]
pub struct RequestHandlerServices {
    pub gate: AdmissionGate,
    pub palette: Arc<dyn PaletteResolver>,
    pub images: Arc<dyn ImageService>,
    pub transport: Arc<dyn Transport>,
    pub scheduler: DeliveryScheduler,
    pub telemetry: Arc<dyn TelemetrySink>,
}

pub struct RequestHandler {
    config: RequestHandlerConfig,
    services: RequestHandlerServices,
    mention: Regex,
}

impl RequestHandler {
    pub fn new(
        config: RequestHandlerConfig,
        services: RequestHandlerServices,
    ) -> Result<Self, regex::Error> {
        let mention = mention_pattern(config.bot_user_id)?;
        Ok(Self {
            config,
            services,
            mention,
        })
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.services.gate
    }

    /// Handles one inbound event to completion.
    #[tracing::instrument(
        level = "debug",
        skip(self, request),
        fields(origin = %request.origin, requester = %request.requester.id)
    )]
    pub async fn handle(&self, request: InboundRequest) -> RequestOutcome {
        match self.process(&request).await {
            Ok(outcome) => {
                tracing::debug!(outcome = outcome.as_str(), "request finished");
                outcome
            }
            Err(error) => {
                tracing::warn!(%error, "request failed");
                self.services
                    .telemetry
                    .record(TelemetryRecord::new(failure_telemetry(&error.to_string())));
                if let Err(notice_error) = self
                    .send_embed(request.origin, generic_failure_notice())
                    .await
                {
                    tracing::warn!(error = %notice_error, "failed to send failure notice");
                }
                RequestOutcome::Failed
            }
        }
    }

    async fn process(&self, request: &InboundRequest) -> Result<RequestOutcome, HandlerError> {
        if let Some(reason) = self.filter(request) {
            return Ok(RequestOutcome::Ignored(reason));
        }

        let requester = &request.requester;
        if let Some(remaining_ms) = self.services.gate.cooldown_remaining_ms(requester.id) {
            self.send_text(request.origin, cooldown_notice(remaining_ms))
                .await?;
            return Ok(RequestOutcome::CoolingDown {
                remaining_secs: remaining_ms.div_ceil(1_000),
            });
        }

        let blank = match self.select_blank_glyph(request).await? {
            Some(blank) => blank,
            None => return Ok(RequestOutcome::Ignored(IgnoreReason::SendNotPermitted)),
        };

        let Some(arguments) = parse_arguments(
            &request.content,
            request.attachment_url.as_deref(),
            self.services.palette.as_ref(),
        ) else {
            self.send_embed(request.origin, self.config.help.clone())
                .await?;
            self.services
                .telemetry
                .record(TelemetryRecord::new(helped_telemetry(&requester.tag)));
            return Ok(RequestOutcome::Helped);
        };

        let policy = &self.config.policy;
        let dimensions = match policy.resolve_dimensions(
            arguments.source.kind,
            arguments.width,
            arguments.height,
        ) {
            Ok(dimensions) => dimensions,
            Err(error) => return self.reject(request.origin, error).await,
        };

        let grid = match self
            .services
            .images
            .fetch_and_resize(
                &arguments.source,
                dimensions.width,
                dimensions.height,
                policy.max_height,
            )
            .await
        {
            Ok(grid) => grid,
            Err(ImageServiceError::TooTall { height, max }) => {
                return self
                    .reject(
                        request.origin,
                        ValidationError::TooTallAfterResize { height, max },
                    )
                    .await;
            }
            Err(error) => return self.report_image_failure(request.origin, error).await,
        };

        if let Err(error) = policy.check_resized_height(grid.height()) {
            return self.reject(request.origin, error).await;
        }

        let mut destination = request.origin;
        let redirected =
            request.community.is_some() && policy.should_redirect(dimensions.width, grid.height());
        if redirected {
            if self
                .services
                .gate
                .is_locked(Destination::Direct(requester.id.0))
            {
                return Ok(RequestOutcome::Ignored(IgnoreReason::DestinationLocked));
            }
            self.send_text(request.origin, REDIRECT_NOTICE.to_string())
                .await?;
            destination = Destination::Direct(requester.id.0);
        }

        let Some(lock) = self.services.gate.acquire(destination) else {
            return Ok(RequestOutcome::Ignored(IgnoreReason::DestinationLocked));
        };
        self.services
            .gate
            .set_cooldown(requester.id, policy.cooldown_ms());

        let art = render_pixel_grid(&grid, self.services.palette.as_ref(), &blank);
        let mut summary = RenderSummary {
            destination,
            redirected,
            width: art.width,
            height: art.height,
            delivery: None,
        };
        let delivery = self
            .services
            .scheduler
            .deliver(destination, &art.to_text())
            .await;
        drop(lock);

        match delivery {
            Ok(report) => {
                summary.delivery = Some(report);
                tracing::info!(
                    %destination,
                    community = request.community.as_ref().map(|community| community.id),
                    width = summary.width,
                    height = summary.height,
                    source = arguments.source.kind.as_str(),
                    "render delivered"
                );
                self.services.telemetry.record(
                    TelemetryRecord::new(render_telemetry(
                        summary.width,
                        summary.height,
                        &requester.tag,
                        request.community.as_ref().map(|community| community.name.as_str()),
                    ))
                    .with_attachment(arguments.source.url.clone()),
                );
                Ok(RequestOutcome::Delivered(summary))
            }
            Err(error) => {
                tracing::warn!(%error, "render delivery failed");
                if !error.is_permission_denied() {
                    self.services
                        .telemetry
                        .record(TelemetryRecord::new(failure_telemetry(&error.to_string())));
                }
                self.send_embed(request.origin, delivery_failure_notice(&error))
                    .await?;
                Ok(RequestOutcome::DeliveryFailed { summary, error })
            }
        }
    }

    /// Stale-read admission filter. Mutates nothing.
    fn filter(&self, request: &InboundRequest) -> Option<IgnoreReason> {
        if request.requester.is_bot {
            return Some(IgnoreReason::AutomatedAccount);
        }
        if self.services.gate.is_locked(request.origin) {
            return Some(IgnoreReason::DestinationLocked);
        }
        if !self.mention.is_match(&request.content) {
            return Some(IgnoreReason::NotAddressed);
        }
        None
    }

    /// Picks the blank glyph for this request. Returns `None` when the bot may
    /// not post in the origin channel at all.
    async fn select_blank_glyph(
        &self,
        request: &InboundRequest,
    ) -> Result<Option<String>, HandlerError> {
        let configured = self
            .config
            .blank_glyph
            .as_deref()
            .map(str::trim)
            .filter(|blank| !blank.is_empty());
        if request.community.is_none() {
            return Ok(Some(configured.unwrap_or(DEFAULT_BLANK_GLYPH).to_string()));
        }
        let capabilities = self.services.transport.capabilities(request.origin).await?;
        if !capabilities.can_send {
            return Ok(None);
        }
        let blank = match configured {
            Some(blank) if capabilities.can_use_external_glyphs => blank,
            _ => DEFAULT_BLANK_GLYPH,
        };
        Ok(Some(blank.to_string()))
    }

    async fn reject(
        &self,
        origin: Destination,
        error: ValidationError,
    ) -> Result<RequestOutcome, HandlerError> {
        tracing::debug!(reason_code = error.reason_code(), "request rejected");
        self.send_text(origin, validation_notice(&error)).await?;
        Ok(RequestOutcome::Rejected(error))
    }

    async fn report_image_failure(
        &self,
        origin: Destination,
        error: ImageServiceError,
    ) -> Result<RequestOutcome, HandlerError> {
        tracing::debug!(reason_code = error.reason_code(), %error, "image fetch failed");
        let unsupported_format = error.is_unsupported_format();
        if !unsupported_format {
            self.services
                .telemetry
                .record(TelemetryRecord::new(failure_telemetry(&error.to_string())));
        }
        self.send_embed(origin, image_failure_notice(&error)).await?;
        Ok(RequestOutcome::ImageFailed { unsupported_format })
    }

    async fn send_text(&self, destination: Destination, text: String) -> Result<(), TransportError> {
        self.services
            .transport
            .send(destination, OutboundMessage::Text(text), SplitMode::Single)
            .await
    }

    async fn send_embed(
        &self,
        destination: Destination,
        embed: EmbedPayload,
    ) -> Result<(), TransportError> {
        self.services
            .transport
            .send(destination, OutboundMessage::Embed(embed), SplitMode::Single)
            .await
    }
}
