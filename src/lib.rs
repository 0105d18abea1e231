//! Announcement and weather signage for a 16x16 RGB LED matrix.
//!
//! The crate is organised around one rule: a single orchestrator owns the
//! physical panel. Everything else feeds it:
//! - the MQTT bus pushes announcements into a bounded queue
//! - the refresh scheduler keeps the weather image cache current
//! - the ambient presenter shows that image while nothing urgent is queued
//!
//! Shared helpers live here: the panel size, the `Color` type used at the
//! hardware boundary, and Ctrl+C handling.

pub mod ambient;
pub mod assets;
pub mod bus;
pub mod config;
pub mod display;
pub mod error;
pub mod frame;
#[cfg(feature = "hardware")]
pub mod matrix;
pub mod orchestrator;
pub mod queue;
pub mod render;
pub mod scheduler;
pub mod state;
pub mod weather;

pub use error::{Error, Result};

use tokio_util::sync::CancellationToken;

// ── Panel ──────────────────────────────────────────────────────────

/// Width and height of the panel in pixels. The panel is square.
pub const PANEL_SIZE: u32 = 16;

// ── Color ──────────────────────────────────────────────────────────

/// Our own color type, decoupled from the hardware crate.
///
/// Frames are tested without `rpi-led-matrix`; at the hardware boundary we
/// convert via `Into<LedColor>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Self = Self::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn is_black(self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

impl From<image::Rgb<u8>> for Color {
    fn from(p: image::Rgb<u8>) -> Self {
        Self::new(p[0], p[1], p[2])
    }
}

#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

// ── Shutdown ───────────────────────────────────────────────────────

/// Set up a Ctrl+C handler that cancels the returned token.
///
/// Every long-running task takes a child of this token, so one signal winds
/// down the bus, the scheduler, and the orchestrator together.
pub fn setup_signal_handler() -> Result<CancellationToken> {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();

    ctrlc::set_handler(move || {
        tracing::info!("Shutdown requested");
        token.cancel();
    })?;

    Ok(shutdown)
}

// ── Tests ──────────────────────────────────────────────────────────
