//! Announcements and the Command Intake Queue.
//!
//! The queue is a bounded `tokio::sync::mpsc` channel. The bus task is the
//! only producer and the orchestrator the only consumer. When the queue is
//! full the producer waits in `send().await` until the orchestrator drains an
//! entry, so a burst of messages applies backpressure instead of being
//! dropped, and arrival order is always preserved.

use serde::{Deserialize, Deserializer};
use std::fmt;
use tokio::sync::mpsc;

/// Announcements buffered between the bus and the orchestrator.
pub const QUEUE_CAPACITY: usize = 10;

pub type AnnouncementSender = mpsc::Sender<Announcement>;
pub type AnnouncementReceiver = mpsc::Receiver<Announcement>;

/// Create the intake queue.
pub fn announcement_queue() -> (AnnouncementSender, AnnouncementReceiver) {
    mpsc::channel(QUEUE_CAPACITY)
}

/// Urgency of an announcement. Decides the flash color shown before the text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Priority {
    #[default]
    None,
    Info,
    Warning,
    Critical,
}

impl Priority {
    /// Map the bus encoding (`0`-`3`, usually sent as `"0.0"`-`"3.0"`).
    pub fn from_level(level: f64) -> Option<Self> {
        match level {
            l if l == 0.0 => Some(Priority::None),
            l if l == 1.0 => Some(Priority::Info),
            l if l == 2.0 => Some(Priority::Warning),
            l if l == 3.0 => Some(Priority::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Priority::None => "none",
            Priority::Info => "info",
            Priority::Warning => "warning",
            Priority::Critical => "critical",
        };
        f.write_str(name)
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Level {
            Text(String),
            Number(f64),
        }

        let level = match Level::deserialize(deserializer)? {
            Level::Number(n) => n,
            Level::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid priority {s:?}")))?,
        };

        Priority::from_level(level)
            .ok_or_else(|| serde::de::Error::custom(format!("priority {level} out of range")))
    }
}

/// A text message and its urgency. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Announcement {
    #[serde(rename = "msg")]
    pub text: String,
    pub priority: Priority,
}

impl Announcement {
    pub fn new(text: impl Into<String>, priority: Priority) -> Self {
        Self {
            text: text.into(),
            priority,
        }
    }
}
