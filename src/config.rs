//! Startup configuration: command-line arguments, the credential file, MQTT
//! topics, and the timing constants that shape every display sequence.
//!
//! All of this is read once in `main`. A missing or malformed credential file
//! is fatal; nothing here is reloaded at runtime.

use crate::frame::Rotation;
use crate::{Error, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Command line ─────────────────────────────────────────────────────

/// MQTT announcement and weather signage for a 16x16 LED matrix
#[derive(Parser, Debug)]
#[command(name = "matrix-signage")]
#[command(about = "Shows MQTT announcements and the local weather on a 16x16 LED matrix")]
#[command(version)]
pub struct Args {
    /// Credential file (broker, login, weather API key and location)
    #[arg(long, default_value = "creds.json")]
    pub creds: PathBuf,

    /// Directory containing fonts/ and images/
    #[arg(long, default_value = "assets")]
    pub assets_dir: PathBuf,

    /// TrueType font, relative to the assets directory
    #[arg(long, default_value = "fonts/DejaVuSansMono.ttf")]
    pub font: PathBuf,

    /// Panel brightness (0-100)
    #[arg(long, default_value = "75", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub brightness: u8,

    /// MQTT client identifier
    #[arg(long, default_value = "matrix_signage")]
    pub client_id: String,

    /// Rotation applied to scrolling text
    #[arg(long, value_enum, default_value = "cw270")]
    pub text_rotation: Rotation,

    /// Rotation applied to priority flash panels
    #[arg(long, value_enum, default_value = "cw270")]
    pub flash_rotation: Rotation,

    /// Rotation applied to the weather image
    #[arg(long, value_enum, default_value = "cw180")]
    pub ambient_rotation: Rotation,

    /// What a write does while the display is switched off
    #[arg(long, value_enum, default_value = "blank")]
    pub disabled_mode: DisabledMode,
}

impl Args {
    pub fn rotations(&self) -> Rotations {
        Rotations {
            text: self.text_rotation,
            flash: self.flash_rotation,
            ambient: self.ambient_rotation,
        }
    }
}

// ── Credentials ──────────────────────────────────────────────────────

/// Contents of the credential file.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    #[serde(rename = "user")]
    pub username: String,
    #[serde(rename = "pass")]
    pub password: String,
    pub broker: String,
    pub port: u16,
    #[serde(rename = "openweatherapikey")]
    pub weather_api_key: String,
    #[serde(rename = "openweatherlocation")]
    pub weather_location: String,
}

impl Credentials {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| Error::Credentials {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ── Topics ───────────────────────────────────────────────────────────

/// MQTT topics the signage listens and reports on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topics {
    /// Inbound `{msg, priority}` announcements
    pub announce: String,
    /// Inbound display on/off sentinel
    pub display_set: String,
    /// Outbound `online`/`offline` heartbeat
    pub availability: String,
    /// Outbound acknowledgement of the display on/off state
    pub display_state: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            announce: "home-assistant/signage/control".to_string(),
            display_set: "home-assistant/signage/display/set".to_string(),
            availability: "home-assistant/signage/availability".to_string(),
            display_state: "home-assistant/signage/display/state".to_string(),
        }
    }
}

// ── Rendering options ────────────────────────────────────────────────

/// Per-content-type rotation. The right values depend on how the panel is
/// physically mounted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rotations {
    pub text: Rotation,
    pub flash: Rotation,
    pub ambient: Rotation,
}

impl Default for Rotations {
    fn default() -> Self {
        Self {
            text: Rotation::Cw270,
            flash: Rotation::Cw270,
            ambient: Rotation::Cw180,
        }
    }
}

/// Behaviour of physical writes while the display is switched off.
///
/// Sequences always keep their timing; only the device call changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DisabledMode {
    /// Replace every write with a halt (blank) call
    #[default]
    Blank,
    /// Make no device call at all
    Skip,
}

// ── Timing ───────────────────────────────────────────────────────────

/// Durations and counts for every timed sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// On/off cycles in a priority flash
    pub flash_cycles: u32,
    pub flash_on: Duration,
    pub flash_off: Duration,
    /// Delay after each scroll frame
    pub scroll_frame: Duration,
    /// Pause before the first ambient frame after the presenter starts
    pub ambient_settle: Duration,
    /// Interval between ambient frames
    pub ambient_cadence: Duration,
    /// Weather refresh and heartbeat interval
    pub refresh: Duration,
    /// Weather retry interval while the source is failing
    pub error_recheck: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            flash_cycles: 15,
            flash_on: Duration::from_millis(150),
            flash_off: Duration::from_millis(150),
            scroll_frame: Duration::from_millis(2),
            ambient_settle: Duration::from_millis(100),
            ambient_cadence: Duration::from_secs(30),
            refresh: Duration::from_secs(10 * 60),
            error_recheck: Duration::from_secs(30 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const CREDS: &str = r#"{
        "user": "signage",
        "pass": "hunter2",
        "broker": "mqtt.local",
        "port": 1883,
        "openweatherapikey": "abc123",
        "openweatherlocation": "London,GB"
    }"#;

    #[test]
    fn credentials_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("creds.json");
        std::fs::write(&path, CREDS).unwrap();

        let creds = Credentials::load(&path).unwrap();
        assert_eq!(
            creds,
            Credentials {
                username: "signage".to_string(),
                password: "hunter2".to_string(),
                broker: "mqtt.local".to_string(),
                port: 1883,
                weather_api_key: "abc123".to_string(),
                weather_location: "London,GB".to_string(),
            }
        );
    }

    #[test]
    fn missing_credentials_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = Credentials::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn malformed_credentials_are_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("creds.json");
        std::fs::write(&path, r#"{"user": "signage", "port": "not a number"}"#).unwrap();

        let err = Credentials::load(&path).unwrap_err();
        assert!(matches!(err, Error::Credentials { .. }));
    }

    #[test]
    fn default_timing_matches_panel_behaviour() {
        let t = Timing::default();
        assert_eq!(t.flash_cycles, 15);
        assert_eq!(t.flash_on, Duration::from_millis(150));
        assert_eq!(t.flash_off, Duration::from_millis(150));
        assert_eq!(t.ambient_cadence, Duration::from_secs(30));
        assert_eq!(t.refresh, Duration::from_secs(600));
        assert_eq!(t.error_recheck, Duration::from_secs(1800));
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::parse_from(["matrix-signage"]);
        assert_eq!(args.creds, PathBuf::from("creds.json"));
        assert_eq!(args.brightness, 75);
        assert_eq!(args.rotations(), Rotations::default());
        assert_eq!(args.disabled_mode, DisabledMode::Blank);
    }

    #[test]
    fn args_parse_rotation_and_mode() {
        let args = Args::parse_from([
            "matrix-signage",
            "--ambient-rotation",
            "cw90",
            "--disabled-mode",
            "skip",
        ]);
        assert_eq!(args.ambient_rotation, Rotation::Cw90);
        assert_eq!(args.disabled_mode, DisabledMode::Skip);
    }

    #[test]
    fn brightness_above_100_is_rejected() {
        assert!(Args::try_parse_from(["matrix-signage", "--brightness", "150"]).is_err());
    }
}
