//! Message bus: MQTT intake and status publishing.
//!
//! The bus task polls the `rumqttc` event loop and routes each inbound
//! publish:
//! - announcement topic: `{"msg": "...", "priority": "0.0".."3.0"}` goes onto
//!   the intake queue
//! - display topic: `ON`/`OFF` flips the display-enabled flag and is echoed
//!   back on the display state topic
//!
//! Malformed payloads are logged and dropped. Connection errors are logged
//! and retried; every fresh `ConnAck` resubscribes and re-announces
//! availability, so a broker restart heals itself. Nothing on the event-loop
//! task waits on a channel that only the event loop itself drains.

use crate::config::{Credentials, Topics};
use crate::queue::{Announcement, AnnouncementSender};
use crate::state::SharedState;
use crate::Result;
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const REQUEST_CAPACITY: usize = 10;
/// Subscribe x2, availability, display state.
const SETUP_STEPS: usize = 4;

const ONLINE: &str = "online";
const OFFLINE: &str = "offline";
const DISPLAY_ON: &str = "ON";
const DISPLAY_OFF: &str = "OFF";

// ── Publishing ───────────────────────────────────────────────────────

/// Outbound status messages.
///
/// Sends never wait on the connection: while the broker is away the client's
/// request buffer fills up and further sends fail fast with an error.
pub trait StatusPublisher: Send + Sync {
    fn publish_availability(&self, online: bool) -> Result<()>;
    fn publish_display_state(&self, enabled: bool) -> Result<()>;
}

pub struct MqttPublisher {
    client: AsyncClient,
    topics: Topics,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient, topics: Topics) -> Self {
        Self { client, topics }
    }
}

impl StatusPublisher for MqttPublisher {
    fn publish_availability(&self, online: bool) -> Result<()> {
        let payload = if online { ONLINE } else { OFFLINE };
        self.client.try_publish(
            self.topics.availability.as_str(),
            QoS::AtLeastOnce,
            false,
            payload,
        )?;
        Ok(())
    }

    fn publish_display_state(&self, enabled: bool) -> Result<()> {
        let payload = if enabled { DISPLAY_ON } else { DISPLAY_OFF };
        self.client.try_publish(
            self.topics.display_state.as_str(),
            QoS::AtLeastOnce,
            true,
            payload,
        )?;
        Ok(())
    }
}

// ── Connection ───────────────────────────────────────────────────────

/// Build the MQTT client and its event loop. Nothing touches the network
/// until the event loop is polled.
pub fn connect(creds: &Credentials, client_id: &str, topics: &Topics) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(client_id, creds.broker.as_str(), creds.port);
    options.set_credentials(creds.username.as_str(), creds.password.as_str());
    options.set_keep_alive(KEEP_ALIVE);
    options.set_last_will(LastWill::new(
        topics.availability.as_str(),
        OFFLINE,
        QoS::AtLeastOnce,
        false,
    ));

    AsyncClient::new(options, REQUEST_CAPACITY)
}

// ── Inbound parsing ──────────────────────────────────────────────────

/// A routed inbound message.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    Announcement(Announcement),
    /// New display-enabled state
    Display(bool),
    /// Not a topic we handle
    Ignored,
}

#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("invalid announcement: {0}")]
    Announcement(#[from] serde_json::Error),
    #[error("invalid display switch {0:?}")]
    Switch(String),
}

/// Decode a publish on `topic`.
pub fn parse_inbound(
    topics: &Topics,
    topic: &str,
    payload: &[u8],
) -> std::result::Result<Inbound, PayloadError> {
    if topic == topics.announce {
        let announcement = serde_json::from_slice(payload)?;
        Ok(Inbound::Announcement(announcement))
    } else if topic == topics.display_set {
        parse_switch(payload).map(Inbound::Display)
    } else {
        Ok(Inbound::Ignored)
    }
}

fn parse_switch(payload: &[u8]) -> std::result::Result<bool, PayloadError> {
    let text = String::from_utf8_lossy(payload);
    let value = text.trim();
    if value.eq_ignore_ascii_case("on") || value.eq_ignore_ascii_case("true") || value == "1" {
        Ok(true)
    } else if value.eq_ignore_ascii_case("off") || value.eq_ignore_ascii_case("false") || value == "0"
    {
        Ok(false)
    } else {
        Err(PayloadError::Switch(value.to_string()))
    }
}

// ── Routing ──────────────────────────────────────────────────────────

/// Applies inbound messages: hands announcements to the intake queue, owns
/// the display-enabled flag, and acknowledges display switches.
///
/// Routing never waits. Announcements go through an unbounded hand-off to a
/// forwarding task, and that task is what blocks on a full intake queue, so
/// the event loop keeps polling (pings, display switches) while the
/// orchestrator is busy.
pub struct MessageRouter {
    topics: Topics,
    state: Arc<SharedState>,
    handoff: mpsc::UnboundedSender<Announcement>,
    publisher: Arc<dyn StatusPublisher>,
}

impl MessageRouter {
    /// Create the router and spawn its forwarding task onto the runtime.
    pub fn new(
        topics: Topics,
        state: Arc<SharedState>,
        queue: AnnouncementSender,
        publisher: Arc<dyn StatusPublisher>,
    ) -> Self {
        let (handoff, pending) = mpsc::unbounded_channel();
        tokio::spawn(forward_announcements(pending, queue));
        Self {
            topics,
            state,
            handoff,
            publisher,
        }
    }

    pub fn handle(&self, topic: &str, payload: &[u8]) {
        tracing::info!(
            "Received message: {} on topic: {}",
            String::from_utf8_lossy(payload),
            topic
        );

        match parse_inbound(&self.topics, topic, payload) {
            Ok(Inbound::Announcement(announcement)) => {
                if self.handoff.send(announcement).is_err() {
                    tracing::warn!("Announcement forwarder gone, dropping message");
                }
            }
            Ok(Inbound::Display(enabled)) => {
                self.state.set_display_enabled(enabled);
                tracing::info!("Display {}", if enabled { "enabled" } else { "disabled" });
                if let Err(e) = self.publisher.publish_display_state(enabled) {
                    tracing::warn!("Failed to acknowledge display state: {}", e);
                }
            }
            Ok(Inbound::Ignored) => tracing::debug!("Ignoring message on {}", topic),
            Err(e) => tracing::warn!("Dropping malformed payload on {}: {}", topic, e),
        }
    }
}

/// Move announcements into the intake queue in arrival order, waiting while
/// it is full.
async fn forward_announcements(
    mut pending: mpsc::UnboundedReceiver<Announcement>,
    queue: AnnouncementSender,
) {
    while let Some(announcement) = pending.recv().await {
        if queue.send(announcement).await.is_err() {
            tracing::warn!("Announcement queue closed, forwarder stopping");
            break;
        }
    }
}

// ── Event loop ───────────────────────────────────────────────────────

pub struct BusIntake {
    client: AsyncClient,
    router: MessageRouter,
    reconnect_delay: Duration,
}

impl BusIntake {
    pub fn new(client: AsyncClient, router: MessageRouter) -> Self {
        Self {
            client,
            router,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    /// Poll the connection until `shutdown`, then say goodbye.
    ///
    /// After every `ConnAck` the subscriptions and status messages are
    /// queued again. If the request buffer is still full of messages from
    /// the outage, setup resumes where it stopped after each following event,
    /// one freed slot at a time.
    pub async fn run(self, mut eventloop: EventLoop, shutdown: CancellationToken) {
        let mut setup = 0;

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(event) => {
                    match event {
                        Event::Incoming(Packet::ConnAck(_)) => {
                            tracing::info!("Connected to MQTT broker");
                            setup = 0;
                        }
                        Event::Incoming(Packet::Publish(publish)) => {
                            self.router.handle(&publish.topic, &publish.payload);
                        }
                        _ => {}
                    }

                    if setup < SETUP_STEPS {
                        setup = self.resume_setup(setup);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "MQTT connection error: {}, retrying in {}ms",
                        e,
                        self.reconnect_delay.as_millis()
                    );
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }

        self.disconnect(&mut eventloop).await;
    }

    /// Queue connection setup from `step` on. Returns the first step that
    /// did not fit, or `SETUP_STEPS` when everything is queued.
    fn resume_setup(&self, mut step: usize) -> usize {
        while step < SETUP_STEPS {
            if let Err(e) = self.setup_step(step) {
                tracing::debug!("Connection setup deferred at step {}: {}", step, e);
                break;
            }
            step += 1;
        }
        step
    }

    fn setup_step(&self, step: usize) -> Result<()> {
        let topics = &self.router.topics;
        let publisher = &self.router.publisher;
        match step {
            0 | 1 => {
                let topic = if step == 0 { &topics.announce } else { &topics.display_set };
                self.client.try_subscribe(topic.as_str(), QoS::AtMostOnce)?;
                tracing::info!("Subscribed to topic {}", topic);
                Ok(())
            }
            2 => publisher.publish_availability(true),
            _ => publisher.publish_display_state(self.router.state.display_enabled()),
        }
    }

    async fn disconnect(&self, eventloop: &mut EventLoop) {
        if let Err(e) = self.router.publisher.publish_availability(false) {
            tracing::warn!("Failed to publish offline state: {}", e);
        }
        if let Err(e) = self.client.try_disconnect() {
            tracing::warn!("Failed to queue MQTT disconnect: {}", e);
            return;
        }

        // Keep polling so the queued messages actually leave.
        let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if flushed.is_err() {
            tracing::warn!("Timed out disconnecting from MQTT broker");
        } else {
            tracing::info!("Disconnected from MQTT broker");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every status publish as `"availability:online"` etc.
    #[derive(Default)]
    pub struct RecordingPublisher {
        events: Mutex<Vec<String>>,
    }

    impl RecordingPublisher {
        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl StatusPublisher for RecordingPublisher {
        fn publish_availability(&self, online: bool) -> Result<()> {
            let payload = if online { ONLINE } else { OFFLINE };
            self.events
                .lock()
                .unwrap()
                .push(format!("availability:{payload}"));
            Ok(())
        }

        fn publish_display_state(&self, enabled: bool) -> Result<()> {
            let payload = if enabled { DISPLAY_ON } else { DISPLAY_OFF };
            self.events.lock().unwrap().push(format!("display:{payload}"));
            Ok(())
        }
    }
}
