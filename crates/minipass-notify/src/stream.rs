//! # Stream Controller
//!
//! Owns the notification channel end to end: opens the streaming
//! connection, frames and dispatches incoming events, drives the
//! reconnect state machine through an injected clock, and manages the
//! bounded notification tray. One controller instance per page; no
//! ambient global state.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::clock::{Clock, TokioClock};
use crate::config::NotifyConfig;
use crate::connection::{ConnectionState, ConnectionStatus, ReconnectDecision};
use crate::display::NotificationTray;
use crate::error::NotifyError;
use crate::event::{EventKind, FrameDecoder, StreamEvent};
use crate::render::{FragmentSource, HttpFragmentSource, create_client, fallback_fragment};

/// Id of the persistent notice shown when reconnection is abandoned.
///
/// The notice never auto-dismisses, but stays manually dismissible
/// like any other tray entry (the dashboard keeps its close button).
pub const FAILURE_NOTIFICATION_ID: &str = "connection_failed";

const FAILURE_MESSAGE: &str =
    "Connection to notification service lost. Please refresh the page.";

/// Page lifecycle input fed to the controller by the host shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// Page no longer visible; the channel is left open
    Hidden,
    /// Page visible again; reconnect immediately if the channel is down
    Visible,
    /// Page unloading; close the channel and tear down
    Unload,
}

/// Commands accepted by a running stream
#[derive(Debug, Clone)]
pub enum StreamCommand {
    Page(PageEvent),
    /// Manually dismiss a notification by id
    Dismiss(String),
    /// Dismiss every displayed notification
    DismissAll,
    /// Pause a notification's auto-dismiss countdown (hover enter)
    HoverStart(String),
    /// Resume a paused countdown (hover leave)
    HoverEnd(String),
}

/// Tray and channel updates emitted to the host shell
#[derive(Debug, Clone)]
pub enum TrayEvent {
    /// A notification was inserted into the tray
    Shown {
        id: String,
        body: String,
        persistent: bool,
    },
    /// A notification left the tray (manual, timeout, or eviction)
    Dismissed { id: String },
    /// The channel was established
    Connected,
    /// The channel dropped; a reconnect is scheduled
    ConnectionLost { attempt: u32, retry_in: Duration },
    /// Reconnection was abandoned; a page reload is required
    ConnectionFailed,
}

/// Raw bytes flowing on an open notification channel
pub type EventByteStream = BoxStream<'static, Result<Bytes, NotifyError>>;

/// Opens the underlying transport for the notification channel
#[async_trait::async_trait]
pub trait ChannelSource: Send + Sync {
    /// Establish a streaming connection to the event endpoint
    async fn open(&self, url: Url) -> Result<EventByteStream, NotifyError>;
}

/// Channel source backed by a streaming HTTP GET
pub struct HttpChannelSource {
    client: Client,
}

impl HttpChannelSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ChannelSource for HttpChannelSource {
    async fn open(&self, url: Url) -> Result<EventByteStream, NotifyError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::StatusCode(response.status()));
        }

        Ok(response.bytes_stream().map_err(NotifyError::from).boxed())
    }
}

/// Cloneable handle for feeding commands into a running stream
#[derive(Debug, Clone)]
pub struct StreamHandle {
    tx: mpsc::UnboundedSender<StreamCommand>,
}

impl StreamHandle {
    pub fn page_event(&self, event: PageEvent) {
        let _ = self.tx.send(StreamCommand::Page(event));
    }

    pub fn dismiss(&self, id: impl Into<String>) {
        let _ = self.tx.send(StreamCommand::Dismiss(id.into()));
    }

    pub fn dismiss_all(&self) {
        let _ = self.tx.send(StreamCommand::DismissAll);
    }

    pub fn hover_start(&self, id: impl Into<String>) {
        let _ = self.tx.send(StreamCommand::HoverStart(id.into()));
    }

    pub fn hover_end(&self, id: impl Into<String>) {
        let _ = self.tx.send(StreamCommand::HoverEnd(id.into()));
    }

    pub fn unload(&self) {
        self.page_event(PageEvent::Unload);
    }
}

/// Why an inner loop handed control back to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Disconnected,
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    Elapsed,
    Reconnect,
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandEffect {
    None,
    Reconnect,
    Unload,
}

/// The live notification stream for one page
pub struct NotificationStream {
    inner: StreamController,
    commands: mpsc::UnboundedReceiver<StreamCommand>,
}

impl NotificationStream {
    /// Create a stream with the default HTTP transport and clock
    pub fn new(
        config: NotifyConfig,
    ) -> Result<
        (
            Self,
            StreamHandle,
            mpsc::UnboundedReceiver<TrayEvent>,
        ),
        NotifyError,
    > {
        let client = create_client(&config)?;
        let fragments: Arc<dyn FragmentSource> = Arc::new(HttpFragmentSource::new(
            client.clone(),
            config.base_url.clone(),
        ));
        Ok(Self::with_parts(
            config,
            Arc::new(HttpChannelSource::new(client)),
            fragments,
            Arc::new(TokioClock),
        ))
    }

    /// Create a stream with injected collaborators
    pub fn with_parts(
        config: NotifyConfig,
        channel: Arc<dyn ChannelSource>,
        fragments: Arc<dyn FragmentSource>,
        clock: Arc<dyn Clock>,
    ) -> (
        Self,
        StreamHandle,
        mpsc::UnboundedReceiver<TrayEvent>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let inner = StreamController {
            state: ConnectionState::new(
                config.base_backoff,
                config.max_backoff,
                config.max_reconnect_attempts,
            ),
            tray: NotificationTray::new(config.max_visible, config.auto_dismiss),
            channel,
            config,
            fragments,
            clock,
            events: event_tx,
        };

        (
            Self {
                inner,
                commands: cmd_rx,
            },
            StreamHandle { tx: cmd_tx },
            event_rx,
        )
    }

    /// Run the stream until the page unloads.
    ///
    /// Terminal reconnect exhaustion does not end the loop; the
    /// controller keeps servicing dismissals until unload.
    pub async fn run(self) -> Result<(), NotifyError> {
        let NotificationStream {
            mut inner,
            mut commands,
        } = self;
        inner.drive(&mut commands).await
    }
}

struct StreamController {
    channel: Arc<dyn ChannelSource>,
    config: NotifyConfig,
    state: ConnectionState,
    tray: NotificationTray,
    fragments: Arc<dyn FragmentSource>,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<TrayEvent>,
}

impl StreamController {
    async fn drive(
        &mut self,
        commands: &mut mpsc::UnboundedReceiver<StreamCommand>,
    ) -> Result<(), NotifyError> {
        info!(server = %self.config.base_url, "Starting notification stream");

        loop {
            match self.state.status() {
                ConnectionStatus::Connecting => match self.open_channel().await {
                    Ok(channel) => {
                        self.state.opened();
                        info!("Notification channel established");
                        let _ = self.events.send(TrayEvent::Connected);

                        if self.read_channel(channel, commands).await == LoopExit::Unload {
                            debug!("Tearing down notification stream");
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to establish notification channel");
                        self.state.lost();
                    }
                },
                ConnectionStatus::Closed => match self.state.schedule_reconnect() {
                    ReconnectDecision::RetryAfter(delay) => {
                        let attempt = self.state.attempt();
                        info!(
                            attempt,
                            max_attempts = self.config.max_reconnect_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Scheduling reconnect"
                        );
                        let _ = self.events.send(TrayEvent::ConnectionLost {
                            attempt,
                            retry_in: delay,
                        });

                        match self.wait_backoff(delay, commands).await {
                            WaitOutcome::Unload => return Ok(()),
                            // Page became visible: already back in Connecting
                            WaitOutcome::Reconnect => {}
                            WaitOutcome::Elapsed => self.state.connecting(),
                        }
                    }
                    // The Failed arm takes over on the next iteration
                    ReconnectDecision::GiveUp => {}
                },
                ConnectionStatus::Failed => {
                    error!("Max reconnection attempts reached, giving up");
                    self.enter_failed();
                    self.serve_failed(commands).await;
                    return Ok(());
                }
                ConnectionStatus::Open => {
                    // The read loop owns the Open state; landing here
                    // means the channel is gone
                    self.state.lost();
                }
            }
        }
    }

    /// Open a streaming connection to the event endpoint
    async fn open_channel(&self) -> Result<EventByteStream, NotifyError> {
        let url = self
            .config
            .stream_url()
            .map_err(|e| NotifyError::Url(e.to_string()))?;
        debug!(url = %url, "Opening notification channel");
        self.channel.open(url).await
    }

    /// Consume the open channel until it drops or the page unloads
    async fn read_channel(
        &mut self,
        mut channel: EventByteStream,
        commands: &mut mpsc::UnboundedReceiver<StreamCommand>,
    ) -> LoopExit {
        let mut decoder = FrameDecoder::new();

        loop {
            let wake = self.tray.next_deadline();
            let clock = Arc::clone(&self.clock);
            let expiry = async move {
                match wake {
                    Some(at) => {
                        let now = clock.now();
                        clock.sleep(at.saturating_duration_since(now)).await;
                    }
                    None => futures::future::pending().await,
                }
            };

            tokio::select! {
                chunk = channel.next() => match chunk {
                    Some(Ok(bytes)) => {
                        for payload in decoder.push(&bytes) {
                            self.handle_payload(&payload).await;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Notification channel transport error");
                        self.state.lost();
                        return LoopExit::Disconnected;
                    }
                    None => {
                        info!("Notification channel closed by server");
                        self.state.lost();
                        return LoopExit::Disconnected;
                    }
                },
                _ = expiry => self.expire_tray(),
                cmd = commands.recv() => match cmd {
                    Some(cmd) => {
                        if self.apply_command(cmd) == CommandEffect::Unload {
                            return LoopExit::Unload;
                        }
                    }
                    None => return LoopExit::Unload,
                },
            }
        }
    }

    /// Wait out a reconnect backoff while still servicing the tray and
    /// commands. A Visible page event cuts the wait short.
    async fn wait_backoff(
        &mut self,
        delay: Duration,
        commands: &mut mpsc::UnboundedReceiver<StreamCommand>,
    ) -> WaitOutcome {
        let deadline = self.clock.now() + delay;

        loop {
            let now = self.clock.now();
            if now >= deadline {
                return WaitOutcome::Elapsed;
            }

            let mut wake = deadline;
            if let Some(tray_deadline) = self.tray.next_deadline() {
                wake = wake.min(tray_deadline);
            }
            let sleep_for = wake.saturating_duration_since(now);
            let clock = Arc::clone(&self.clock);

            tokio::select! {
                _ = clock.sleep(sleep_for) => self.expire_tray(),
                cmd = commands.recv() => match cmd {
                    Some(cmd) => match self.apply_command(cmd) {
                        CommandEffect::Unload => return WaitOutcome::Unload,
                        CommandEffect::Reconnect => return WaitOutcome::Reconnect,
                        CommandEffect::None => {}
                    },
                    None => return WaitOutcome::Unload,
                },
            }
        }
    }

    /// Service dismissals after terminal failure, until unload
    async fn serve_failed(&mut self, commands: &mut mpsc::UnboundedReceiver<StreamCommand>) {
        loop {
            let wake = self.tray.next_deadline();
            let clock = Arc::clone(&self.clock);
            let expiry = async move {
                match wake {
                    Some(at) => {
                        let now = clock.now();
                        clock.sleep(at.saturating_duration_since(now)).await;
                    }
                    None => futures::future::pending().await,
                }
            };

            tokio::select! {
                _ = expiry => self.expire_tray(),
                cmd = commands.recv() => match cmd {
                    Some(cmd) => {
                        if self.apply_command(cmd) == CommandEffect::Unload {
                            return;
                        }
                    }
                    None => return,
                },
            }
        }
    }

    fn apply_command(&mut self, cmd: StreamCommand) -> CommandEffect {
        match cmd {
            StreamCommand::Page(PageEvent::Unload) => CommandEffect::Unload,
            StreamCommand::Page(PageEvent::Hidden) => {
                debug!("Page hidden, leaving channel open");
                CommandEffect::None
            }
            StreamCommand::Page(PageEvent::Visible) => {
                if self.state.force_reconnect() {
                    info!("Page visible again, reconnecting immediately");
                    CommandEffect::Reconnect
                } else {
                    CommandEffect::None
                }
            }
            StreamCommand::Dismiss(id) => {
                if self.tray.dismiss(&id) {
                    let _ = self.events.send(TrayEvent::Dismissed { id });
                }
                CommandEffect::None
            }
            StreamCommand::DismissAll => {
                for id in self.tray.dismiss_all() {
                    let _ = self.events.send(TrayEvent::Dismissed { id });
                }
                CommandEffect::None
            }
            StreamCommand::HoverStart(id) => {
                self.tray.pause(&id, self.clock.now());
                CommandEffect::None
            }
            StreamCommand::HoverEnd(id) => {
                self.tray.resume(&id, self.clock.now());
                CommandEffect::None
            }
        }
    }

    /// Parse and dispatch one framed payload. Malformed payloads are
    /// logged and dropped; they never take the channel down.
    async fn handle_payload(&mut self, raw: &str) {
        let event = match StreamEvent::parse(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed event payload");
                return;
            }
        };

        match event.kind {
            EventKind::Heartbeat => {
                debug!("Heartbeat received, channel healthy");
            }
            EventKind::Error => {
                error!(id = %event.id, data = ?event.data, "Server reported an error event");
            }
            EventKind::Payment | EventKind::Signup => self.display(event).await,
        }
    }

    /// Render and insert a notification, falling back to a local
    /// fragment when the rendering fetch fails
    async fn display(&mut self, event: StreamEvent) {
        let body = match self.fragments.fetch(&event).await {
            Ok(html) => html,
            Err(e) => {
                warn!(id = %event.id, error = %e, "Fragment fetch failed, using local fallback");
                fallback_fragment(&event)
            }
        };

        let persistent = event.is_persistent();
        let now = self.clock.now();
        for evicted in self.tray.insert(event.id.clone(), body.clone(), persistent, now) {
            let _ = self.events.send(TrayEvent::Dismissed { id: evicted });
        }
        let _ = self.events.send(TrayEvent::Shown {
            id: event.id,
            body,
            persistent,
        });
    }

    /// Surface the persistent reconnect-exhaustion notice exactly once
    fn enter_failed(&mut self) {
        if self.tray.contains(FAILURE_NOTIFICATION_ID) {
            return;
        }

        let now = self.clock.now();
        for evicted in
            self.tray
                .insert(FAILURE_NOTIFICATION_ID, FAILURE_MESSAGE, true, now)
        {
            let _ = self.events.send(TrayEvent::Dismissed { id: evicted });
        }
        let _ = self.events.send(TrayEvent::Shown {
            id: FAILURE_NOTIFICATION_ID.to_string(),
            body: FAILURE_MESSAGE.to_string(),
            persistent: true,
        });
        let _ = self.events.send(TrayEvent::ConnectionFailed);
    }

    fn expire_tray(&mut self) {
        let now = self.clock.now();
        for id in self.tray.expire_due(now) {
            debug!(id = %id, "Auto-dismissing notification");
            let _ = self.events.send(TrayEvent::Dismissed { id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Instant;
    use url::Url;

    /// Clock whose time only moves when the test advances it
    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Instant::now()),
            }
        }

        fn advance(&self, duration: Duration) {
            *self.now.lock() += duration;
        }
    }

    #[async_trait::async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock()
        }

        async fn sleep(&self, duration: Duration) {
            // Tests drive time explicitly
            self.advance(duration);
        }
    }

    enum FragmentBehavior {
        Succeed,
        FailWithStatus(u16),
    }

    struct MockFragments {
        behavior: FragmentBehavior,
        calls: Mutex<u32>,
    }

    impl MockFragments {
        fn new(behavior: FragmentBehavior) -> Self {
            Self {
                behavior,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl FragmentSource for MockFragments {
        async fn fetch(&self, event: &StreamEvent) -> Result<String, NotifyError> {
            *self.calls.lock() += 1;
            match self.behavior {
                FragmentBehavior::Succeed => Ok(format!("<div>{}</div>", event.id)),
                FragmentBehavior::FailWithStatus(code) => Err(NotifyError::StatusCode(
                    reqwest::StatusCode::from_u16(code).unwrap(),
                )),
            }
        }
    }

    /// Channel source that never connects
    struct UnreachableChannel;

    #[async_trait::async_trait]
    impl ChannelSource for UnreachableChannel {
        async fn open(&self, _url: Url) -> Result<EventByteStream, NotifyError> {
            Err(NotifyError::StatusCode(
                reqwest::StatusCode::SERVICE_UNAVAILABLE,
            ))
        }
    }

    struct Fixture {
        controller: StreamController,
        clock: Arc<ManualClock>,
        events: mpsc::UnboundedReceiver<TrayEvent>,
    }

    fn fixture(behavior: FragmentBehavior) -> Fixture {
        let config = NotifyConfig::new(Url::parse("http://localhost:5000").unwrap());
        let clock = Arc::new(ManualClock::new());
        let fragments: Arc<dyn FragmentSource> = Arc::new(MockFragments::new(behavior));
        let (stream, _handle, events) = NotificationStream::with_parts(
            config,
            Arc::new(UnreachableChannel),
            fragments,
            clock.clone() as Arc<dyn Clock>,
        );
        Fixture {
            controller: stream.inner,
            clock,
            events,
        }
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<TrayEvent>) -> Vec<TrayEvent> {
        let mut collected = Vec::new();
        while let Ok(event) = events.try_recv() {
            collected.push(event);
        }
        collected
    }

    fn shown_ids(events: &[TrayEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                TrayEvent::Shown { id, .. } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn payment_event_displays_exactly_once() {
        let mut fx = fixture(FragmentBehavior::Succeed);
        fx.controller
            .handle_payload(
                r#"{"type":"payment","id":"p1","data":{"amount":42.5,"user_name":"Alice"}}"#,
            )
            .await;

        let events = drain(&mut fx.events);
        assert_eq!(shown_ids(&events), vec!["p1".to_string()]);
        assert_eq!(fx.controller.tray.active_count(), 1);
    }

    #[tokio::test]
    async fn payment_auto_dismisses_after_ten_seconds() {
        let mut fx = fixture(FragmentBehavior::Succeed);
        fx.controller
            .handle_payload(r#"{"type":"payment","id":"p1","data":{}}"#)
            .await;
        drain(&mut fx.events);

        fx.clock.advance(Duration::from_secs(9));
        fx.controller.expire_tray();
        assert!(fx.controller.tray.contains("p1"));

        fx.clock.advance(Duration::from_secs(1));
        fx.controller.expire_tray();
        assert!(!fx.controller.tray.contains("p1"));

        let events = drain(&mut fx.events);
        assert!(matches!(&events[..], [TrayEvent::Dismissed { id }] if id == "p1"));
    }

    #[tokio::test]
    async fn hovered_notification_outlives_its_deadline() {
        let mut fx = fixture(FragmentBehavior::Succeed);
        fx.controller
            .handle_payload(r#"{"type":"payment","id":"p1","data":{}}"#)
            .await;

        fx.clock.advance(Duration::from_secs(5));
        fx.controller
            .apply_command(StreamCommand::HoverStart("p1".to_string()));

        fx.clock.advance(Duration::from_secs(60));
        fx.controller.expire_tray();
        assert!(fx.controller.tray.contains("p1"));

        fx.controller
            .apply_command(StreamCommand::HoverEnd("p1".to_string()));
        fx.clock.advance(Duration::from_secs(5));
        fx.controller.expire_tray();
        assert!(!fx.controller.tray.contains("p1"));
    }

    #[tokio::test]
    async fn fragment_failure_falls_back_to_local_rendering() {
        let mut fx = fixture(FragmentBehavior::FailWithStatus(500));
        fx.controller
            .handle_payload(
                r#"{"type":"payment","id":"p1","data":{"amount":42.5,"user_name":"Alice"}}"#,
            )
            .await;

        let events = drain(&mut fx.events);
        match &events[..] {
            [TrayEvent::Shown { id, body, .. }] => {
                assert_eq!(id, "p1");
                assert!(body.contains("Alice"));
                assert!(body.contains("$42.50"));
            }
            other => panic!("expected a single Shown event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_payloads_never_display() {
        let mut fx = fixture(FragmentBehavior::Succeed);
        fx.controller.handle_payload("{ not json").await;
        fx.controller.handle_payload("").await;
        fx.controller
            .handle_payload(r#"{"type":"mystery","id":"x"}"#)
            .await;

        assert!(drain(&mut fx.events).is_empty());
        assert_eq!(fx.controller.tray.active_count(), 0);
    }

    #[tokio::test]
    async fn heartbeat_and_error_events_do_not_render() {
        let mut fx = fixture(FragmentBehavior::Succeed);
        fx.controller
            .handle_payload(r#"{"type":"heartbeat","id":"h1"}"#)
            .await;
        fx.controller
            .handle_payload(r#"{"type":"error","id":"e1","data":{"message":"boom"}}"#)
            .await;

        assert!(drain(&mut fx.events).is_empty());
        assert_eq!(fx.controller.tray.active_count(), 0);
    }

    #[tokio::test]
    async fn display_capacity_is_bounded() {
        let mut fx = fixture(FragmentBehavior::Succeed);
        for i in 0..8 {
            // Distinct creation times so eviction order is well defined
            fx.clock.advance(Duration::from_millis(1));
            fx.controller
                .handle_payload(&format!(r#"{{"type":"signup","id":"s{i}","data":{{}}}}"#))
                .await;
            assert!(fx.controller.tray.active_count() <= 5);
        }
        assert_eq!(fx.controller.tray.active_count(), 5);
        assert!(!fx.controller.tray.contains("s0"));
        assert!(fx.controller.tray.contains("s7"));
    }

    #[tokio::test]
    async fn failure_notice_is_persistent_and_unique() {
        let mut fx = fixture(FragmentBehavior::Succeed);
        fx.controller.enter_failed();
        fx.controller.enter_failed();

        let events = drain(&mut fx.events);
        let shown = shown_ids(&events);
        assert_eq!(shown, vec![FAILURE_NOTIFICATION_ID.to_string()]);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, TrayEvent::ConnectionFailed))
                .count(),
            1
        );

        // Persistent: survives any amount of time
        fx.clock.advance(Duration::from_secs(3600));
        fx.controller.expire_tray();
        assert!(fx.controller.tray.contains(FAILURE_NOTIFICATION_ID));

        // But remains manually dismissable through the tray API
        assert!(fx.controller.tray.dismiss(FAILURE_NOTIFICATION_ID));
    }

    #[tokio::test]
    async fn visible_page_event_forces_reconnect_only_when_closed() {
        let mut fx = fixture(FragmentBehavior::Succeed);

        // While connecting, visibility changes are a no-op
        assert_eq!(
            fx.controller
                .apply_command(StreamCommand::Page(PageEvent::Visible)),
            CommandEffect::None
        );

        fx.controller.state.opened();
        fx.controller.state.lost();
        assert_eq!(
            fx.controller
                .apply_command(StreamCommand::Page(PageEvent::Visible)),
            CommandEffect::Reconnect
        );
        assert_eq!(fx.controller.state.status(), ConnectionStatus::Connecting);
    }

    #[tokio::test]
    async fn run_gives_up_after_exhausting_reconnects() {
        let config = NotifyConfig::new(Url::parse("http://localhost:5000").unwrap());
        let clock = Arc::new(ManualClock::new());
        let fragments: Arc<dyn FragmentSource> =
            Arc::new(MockFragments::new(FragmentBehavior::Succeed));
        let (stream, handle, mut events) = NotificationStream::with_parts(
            config,
            Arc::new(UnreachableChannel),
            fragments,
            clock as Arc<dyn Clock>,
        );
        let runner = tokio::spawn(stream.run());

        let mut delays = Vec::new();
        let mut shown = Vec::new();
        loop {
            match events.recv().await.expect("stream ended before failing") {
                TrayEvent::ConnectionLost { retry_in, .. } => {
                    delays.push(retry_in.as_millis() as u64);
                }
                TrayEvent::Shown { id, .. } => shown.push(id),
                TrayEvent::ConnectionFailed => break,
                other => panic!("unexpected event before terminal failure: {other:?}"),
            }
        }
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
        assert_eq!(shown, vec![FAILURE_NOTIFICATION_ID.to_string()]);

        // Only unload ends the loop; no reconnect activity follows
        handle.unload();
        runner
            .await
            .expect("stream task panicked")
            .expect("stream run failed");
        while let Some(event) = events.recv().await {
            panic!("unexpected event after terminal failure: {event:?}");
        }
    }

    #[tokio::test]
    async fn dismiss_command_is_idempotent() {
        let mut fx = fixture(FragmentBehavior::Succeed);
        fx.controller
            .handle_payload(r#"{"type":"payment","id":"p1","data":{}}"#)
            .await;
        drain(&mut fx.events);

        fx.controller
            .apply_command(StreamCommand::Dismiss("p1".to_string()));
        fx.controller
            .apply_command(StreamCommand::Dismiss("p1".to_string()));

        let events = drain(&mut fx.events);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, TrayEvent::Dismissed { .. }))
                .count(),
            1
        );
    }
}
