use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use emojicon_core::{AdmissionGate, Destination, ManualClock, RequesterId};
use emojicon_delivery::{
    DeliveryConfig, DeliveryMode, DeliveryScheduler, DestinationCapabilities, EmbedPayload,
    OutboundMessage, SplitMode, TelemetryRecord, TelemetrySink, Transport, TransportError,
};
use emojicon_discord_runtime::{
    Community, IgnoreReason, InboundRequest, RenderPolicy, RequestHandler, RequestHandlerConfig,
    RequestHandlerServices, RequestOutcome, Requester, ValidationError,
};
use emojicon_render::{
    EmojiPalette, ImageService, ImageServiceError, ImageSource, PixelGrid, TargetHeight,
};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::time::{Duration, Instant};

const BOT_ID: u64 = 900;
const CHANNEL: Destination = Destination::Channel(55);
const ANA: RequesterId = RequesterId(1);
const BEN: RequesterId = RequesterId(2);

#[derive(Debug, Clone)]
struct SentMessage {
    destination: Destination,
    message: OutboundMessage,
    split: SplitMode,
    at: Instant,
    origin_locked: bool,
    private_locked: bool,
}

/// Records every send. Optionally parks the first multi-line send until
/// released, so a test can observe the gate while delivery is in flight.
struct ScriptedTransport {
    gate: AdmissionGate,
    sent: AsyncMutex<Vec<SentMessage>>,
    hold_art: bool,
    art_started: Notify,
    art_release: Notify,
}

impl ScriptedTransport {
    fn new(gate: AdmissionGate) -> Self {
        Self {
            gate,
            sent: AsyncMutex::new(Vec::new()),
            hold_art: false,
            art_started: Notify::new(),
            art_release: Notify::new(),
        }
    }

    fn holding_art(gate: AdmissionGate) -> Self {
        Self {
            hold_art: true,
            ..Self::new(gate)
        }
    }

    async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        destination: Destination,
        message: OutboundMessage,
        split: SplitMode,
    ) -> Result<(), TransportError> {
        let is_art = matches!(
            (&message, split),
            (OutboundMessage::Text(_), SplitMode::OnLines { .. })
        );
        if self.hold_art && is_art {
            self.art_started.notify_one();
            self.art_release.notified().await;
        }
        self.sent.lock().await.push(SentMessage {
            destination,
            message,
            split,
            at: Instant::now(),
            origin_locked: self.gate.is_locked(CHANNEL),
            private_locked: self.gate.is_locked(Destination::Direct(ANA.0)),
        });
        Ok(())
    }

    async fn capabilities(
        &self,
        _destination: Destination,
    ) -> Result<DestinationCapabilities, TransportError> {
        Ok(DestinationCapabilities::UNRESTRICTED)
    }
}

/// Serves an opaque red grid at the requested size; `Auto` yields a square.
#[derive(Default)]
struct SolidImageService {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageService for SolidImageService {
    async fn fetch_and_resize(
        &self,
        _source: &ImageSource,
        width: u32,
        height: TargetHeight,
        max_height: u32,
    ) -> Result<PixelGrid, ImageServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let height = match height {
            TargetHeight::Exact(value) => value,
            TargetHeight::Auto => width,
        };
        if height > max_height {
            return Err(ImageServiceError::TooTall {
                height,
                max: max_height,
            });
        }
        Ok(PixelGrid::filled(width, height, [250, 10, 10, 255]))
    }
}

#[derive(Default)]
struct CollectingTelemetry {
    records: std::sync::Mutex<Vec<TelemetryRecord>>,
}

impl TelemetrySink for CollectingTelemetry {
    fn record(&self, record: TelemetryRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

struct Bot {
    handler: Arc<RequestHandler>,
    gate: AdmissionGate,
    transport: Arc<ScriptedTransport>,
    images: Arc<SolidImageService>,
}

fn text_of(message: &OutboundMessage) -> Option<&str> {
    match message {
        OutboundMessage::Text(text) => Some(text),
        OutboundMessage::Embed(_) => None,
    }
}

fn single_glyph_palette() -> EmojiPalette {
    EmojiPalette::from_json_str(r#"[{"token":"R","rgb":[255,0,0]},{"token":"K","rgb":[0,0,0]}]"#)
        .expect("palette")
}

fn bot_with(make_transport: impl FnOnce(AdmissionGate) -> ScriptedTransport) -> Bot {
    let gate = AdmissionGate::new(Arc::new(ManualClock::new(50_000)));
    let transport = Arc::new(make_transport(gate.clone()));
    let images = Arc::new(SolidImageService::default());
    let handler = RequestHandler::new(
        RequestHandlerConfig {
            bot_user_id: BOT_ID,
            policy: RenderPolicy::default(),
            blank_glyph: None,
            help: EmbedPayload::with_description("mention me with an image"),
        },
        RequestHandlerServices {
            gate: gate.clone(),
            palette: Arc::new(single_glyph_palette()),
            images: images.clone(),
            transport: transport.clone(),
            scheduler: DeliveryScheduler::new(transport.clone(), DeliveryConfig::default()),
            telemetry: Arc::new(CollectingTelemetry::default()),
        },
    )
    .expect("handler");
    Bot {
        handler: Arc::new(handler),
        gate,
        transport,
        images,
    }
}

fn bot() -> Bot {
    bot_with(ScriptedTransport::new)
}

fn request(requester: RequesterId, origin: Destination, arguments: &str) -> InboundRequest {
    InboundRequest {
        origin,
        requester: Requester {
            id: requester,
            tag: format!("user{}", requester.0),
            is_bot: false,
        },
        community: matches!(origin, Destination::Channel(_)).then(|| Community {
            id: 3,
            name: "Mosaic Makers".to_string(),
        }),
        content: format!("<@{BOT_ID}> {arguments}").trim_end().to_string(),
        attachment_url: None,
    }
}

#[tokio::test]
async fn integration_scenario_a_bare_mention_gets_help_without_gate_effects() {
    let bot = bot();
    let outcome = bot.handler.handle(request(ANA, CHANNEL, "")).await;
    assert_eq!(outcome, RequestOutcome::Helped);

    let sent = bot.transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].message,
        OutboundMessage::Embed(EmbedPayload::with_description("mention me with an image"))
    );
    assert!(!sent[0].origin_locked);
    assert!(bot.gate.check_cooldown(ANA));
    assert_eq!(bot.gate.locked_count(), 0);
    assert_eq!(bot.images.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn integration_scenario_b_oversized_width_is_rejected_before_fetch() {
    let bot = bot();
    let outcome = bot
        .handler
        .handle(request(ANA, CHANNEL, "https://img.example/cat.png 60"))
        .await;
    assert_eq!(
        outcome,
        RequestOutcome::Rejected(ValidationError::TooWide { max: 50 })
    );
    assert_eq!(bot.images.calls.load(Ordering::SeqCst), 0);
    let sent = bot.transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(
        text_of(&sent[0].message),
        Some("`📐 Too large! (width ≤ 50)`")
    );
    assert!(bot.gate.check_cooldown(ANA));
}

#[tokio::test]
async fn integration_scenario_c_small_render_uses_one_call_in_same_channel() {
    let bot = bot();
    let outcome = bot
        .handler
        .handle(request(ANA, CHANNEL, "https://img.example/cat.png 10 10"))
        .await;
    let RequestOutcome::Delivered(summary) = outcome else {
        panic!("expected delivery, got {outcome:?}");
    };
    assert_eq!(summary.destination, CHANNEL);
    assert!(!summary.redirected);
    let report = summary.delivery.expect("delivery report");
    assert_eq!(report.mode, DeliveryMode::SingleCall);
    assert_eq!(report.transport_calls, 1);

    let sent = bot.transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].destination, CHANNEL);
    assert!(matches!(sent[0].split, SplitMode::OnLines { max_chars: 2000 }));
    assert!(sent[0].origin_locked);
    let art = text_of(&sent[0].message).expect("text art");
    assert_eq!(art.lines().count(), 10);
    assert!(art
        .split_inclusive('\n')
        .all(|line| line == "RRRRRRRRRR\u{200B}\n"));

    assert!(!bot.gate.is_locked(CHANNEL));
    assert!(!bot.gate.check_cooldown(ANA));
}

#[tokio::test]
async fn integration_scenario_d_wide_render_redirects_and_releases_locks() {
    let bot = bot();
    let outcome = bot
        .handler
        .handle(request(ANA, CHANNEL, "https://img.example/cat.png 35"))
        .await;
    let RequestOutcome::Delivered(summary) = outcome else {
        panic!("expected delivery, got {outcome:?}");
    };
    let private = Destination::Direct(ANA.0);
    assert!(summary.redirected);
    assert_eq!(summary.destination, private);

    let sent = bot.transport.sent().await;
    assert_eq!(sent[0].destination, CHANNEL);
    assert_eq!(
        text_of(&sent[0].message),
        Some("`📨 Big one! Sending it directly to you...`")
    );
    let art_sends = sent
        .iter()
        .filter(|message| message.destination == private)
        .collect::<Vec<_>>();
    assert!(!art_sends.is_empty());
    assert!(art_sends
        .iter()
        .all(|message| message.private_locked && !message.origin_locked));
    assert_eq!(
        sent.iter()
            .filter(|message| message.destination == CHANNEL)
            .count(),
        1
    );

    assert!(!bot.gate.is_locked(CHANNEL));
    assert!(!bot.gate.is_locked(private));
    assert_eq!(bot.gate.locked_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn integration_scenario_e_long_render_is_batched_with_one_second_gaps() {
    let bot = bot();
    // 43 glyphs plus a two-character terminator per row, 200 rows: 9000 characters.
    let outcome = bot
        .handler
        .handle(request(ANA, Destination::Direct(ANA.0), "https://img.example/cat.png 43 200"))
        .await;
    let RequestOutcome::Delivered(summary) = outcome else {
        panic!("expected delivery, got {outcome:?}");
    };
    let report = summary.delivery.expect("delivery report");
    assert_eq!(report.mode, DeliveryMode::Batched);
    assert_eq!(report.batch_count, 5);

    let sent = bot.transport.sent().await;
    assert_eq!(sent.len(), 5);
    assert!(sent
        .iter()
        .all(|message| matches!(message.split, SplitMode::Single)));
    let batches = sent
        .iter()
        .map(|message| text_of(&message.message).expect("text batch").to_string())
        .collect::<Vec<_>>();
    assert!(batches
        .iter()
        .all(|batch| batch.chars().count() <= 2000));
    let joined = batches.concat();
    assert_eq!(joined.chars().count(), 9000);
    assert_eq!(joined, "RRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRRR\u{200B}\n".repeat(200));
    for pair in sent.windows(2) {
        assert_eq!(pair[1].at - pair[0].at, Duration::from_secs(1));
    }
    assert!(!bot.gate.is_locked(Destination::Direct(ANA.0)));
}

#[tokio::test]
async fn integration_request_to_busy_destination_is_dropped_silently() {
    let bot = bot_with(ScriptedTransport::holding_art);
    let first = {
        let handler = Arc::clone(&bot.handler);
        tokio::spawn(async move {
            handler
                .handle(request(ANA, CHANNEL, "https://img.example/cat.png 10 10"))
                .await
        })
    };
    bot.transport.art_started.notified().await;
    assert!(bot.gate.is_locked(CHANNEL));

    let second = bot
        .handler
        .handle(request(BEN, CHANNEL, "https://img.example/dog.png 10 10"))
        .await;
    assert_eq!(
        second,
        RequestOutcome::Ignored(IgnoreReason::DestinationLocked)
    );
    assert!(bot.gate.check_cooldown(BEN));

    bot.transport.art_release.notify_one();
    let first = first.await.expect("first request task");
    assert!(matches!(first, RequestOutcome::Delivered(_)), "{first:?}");
    assert!(!bot.gate.is_locked(CHANNEL));
    assert_eq!(bot.transport.sent().await.len(), 1);
    assert_eq!(bot.images.calls.load(Ordering::SeqCst), 1);
}
