//! The physical display and the rules for writing to it.
//!
//! `Display` wraps the device sink in a mutex so that at most one task is
//! ever mid-write. The ambient presenter's "is an announcement showing?"
//! check happens inside the same critical section as its write, so there is
//! no window between the check and the write for the orchestrator to slip
//! into.
//!
//! Every write also consults the display-enabled flag. While the display is
//! switched off, writes turn into halt calls (or nothing, in `Skip` mode),
//! but callers still sleep between frames as usual.

use crate::config::DisabledMode;
use crate::frame::RenderedFrame;
use crate::state::SharedState;
use crate::Result;
use std::sync::{Arc, Mutex, PoisonError};

/// A device that accepts panel frames.
///
/// Writes are synchronous and short; a sink that talks to slow hardware
/// should hand frames to its own thread (see `matrix::MatrixSink`).
pub trait DeviceSink: Send {
    /// Show a full frame with its top-left corner at the panel origin.
    fn draw(&mut self, frame: &RenderedFrame) -> Result<()>;

    /// Blank the panel.
    fn halt(&mut self) -> Result<()>;
}

pub struct Display {
    sink: Mutex<Box<dyn DeviceSink>>,
    state: Arc<SharedState>,
    disabled_mode: DisabledMode,
}

impl Display {
    pub fn new(
        sink: Box<dyn DeviceSink>,
        state: Arc<SharedState>,
        disabled_mode: DisabledMode,
    ) -> Self {
        Self {
            sink: Mutex::new(sink),
            state,
            disabled_mode,
        }
    }

    /// Write a frame for the current announcement.
    pub fn show(&self, frame: &RenderedFrame) -> Result<()> {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(sink.as_mut(), frame)
    }

    /// Write an ambient frame unless an announcement owns the display.
    ///
    /// Returns `Ok(false)` without touching the sink when the presenter has
    /// been preempted.
    pub fn show_ambient(&self, frame: &RenderedFrame) -> Result<bool> {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if self.state.showing_announcement() {
            return Ok(false);
        }
        self.write(sink.as_mut(), frame)?;
        Ok(true)
    }

    /// Blank the panel.
    pub fn blank(&self) -> Result<()> {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.state.display_enabled() && self.disabled_mode == DisabledMode::Skip {
            return Ok(());
        }
        sink.halt()
    }

    fn write(&self, sink: &mut dyn DeviceSink, frame: &RenderedFrame) -> Result<()> {
        if self.state.display_enabled() {
            return sink.draw(frame);
        }
        match self.disabled_mode {
            DisabledMode::Blank => sink.halt(),
            DisabledMode::Skip => Ok(()),
        }
    }
}

/// In-memory sink for tests: records every call with its (tokio) timestamp.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::Error;
    use tokio::time::Instant;

    #[derive(Clone, Debug, PartialEq)]
    pub enum SinkWrite {
        Draw(RenderedFrame),
        Halt,
    }

    impl SinkWrite {
        pub fn frame(&self) -> Option<&RenderedFrame> {
            match self {
                SinkWrite::Draw(frame) => Some(frame),
                SinkWrite::Halt => None,
            }
        }
    }

    #[derive(Clone, Default)]
    pub struct RecordingSink {
        writes: Arc<Mutex<Vec<(Instant, SinkWrite)>>>,
        fail_after: Option<usize>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// A sink whose writes start failing once `n` calls have succeeded.
        pub fn failing_after(n: usize) -> Self {
            Self {
                fail_after: Some(n),
                ..Self::default()
            }
        }

        pub fn writes(&self) -> Vec<SinkWrite> {
            self.timed_writes().into_iter().map(|(_, w)| w).collect()
        }

        pub fn timed_writes(&self) -> Vec<(Instant, SinkWrite)> {
            self.writes.lock().unwrap().clone()
        }

        fn record(&mut self, write: SinkWrite) -> Result<()> {
            let mut writes = self.writes.lock().unwrap();
            if self.fail_after.is_some_and(|n| writes.len() >= n) {
                return Err(Error::Sink("device unplugged".to_string()));
            }
            writes.push((Instant::now(), write));
            Ok(())
        }
    }

    impl DeviceSink for RecordingSink {
        fn draw(&mut self, frame: &RenderedFrame) -> Result<()> {
            self.record(SinkWrite::Draw(frame.clone()))
        }

        fn halt(&mut self) -> Result<()> {
            self.record(SinkWrite::Halt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{RecordingSink, SinkWrite};
    use super::*;
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;

    fn green() -> RenderedFrame {
        RenderedFrame::from_image(RgbImage::from_pixel(16, 16, Rgb([0, 255, 0])))
    }

    fn display(mode: DisabledMode) -> (Display, RecordingSink, Arc<SharedState>) {
        let sink = RecordingSink::new();
        let state = Arc::new(SharedState::new());
        let display = Display::new(Box::new(sink.clone()), state.clone(), mode);
        (display, sink, state)
    }

    #[test]
    fn enabled_display_draws() {
        let (display, sink, _) = display(DisabledMode::Blank);
        display.show(&green()).unwrap();
        assert_eq!(sink.writes(), vec![SinkWrite::Draw(green())]);
    }

    #[test]
    fn disabled_display_halts_instead_of_drawing() {
        let (display, sink, state) = display(DisabledMode::Blank);
        state.set_display_enabled(false);

        display.show(&green()).unwrap();
        assert_eq!(display.show_ambient(&green()).unwrap(), true);
        assert_eq!(sink.writes(), vec![SinkWrite::Halt, SinkWrite::Halt]);
    }

    #[test]
    fn disabled_display_in_skip_mode_makes_no_calls() {
        let (display, sink, state) = display(DisabledMode::Skip);
        state.set_display_enabled(false);

        display.show(&green()).unwrap();
        display.blank().unwrap();
        assert!(sink.writes().is_empty());
    }

    #[test]
    fn ambient_write_is_refused_during_announcement() {
        let (display, sink, state) = display(DisabledMode::Blank);
        state.set_showing_announcement(true);

        assert_eq!(display.show_ambient(&green()).unwrap(), false);
        assert!(sink.writes().is_empty());

        // The announcement itself still gets through.
        display.show(&green()).unwrap();
        assert_eq!(sink.writes().len(), 1);
    }

    #[test]
    fn sink_errors_propagate() {
        let sink = RecordingSink::failing_after(1);
        let display = Display::new(
            Box::new(sink.clone()),
            Arc::new(SharedState::new()),
            DisabledMode::Blank,
        );

        display.show(&green()).unwrap();
        assert!(display.show(&green()).is_err());
    }
}
