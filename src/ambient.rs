//! Ambient Presenter: shows the cached weather image while the display is idle.
//!
//! The orchestrator starts a fresh presenter every time it releases the
//! display. The presenter never gets aborted from outside. It stops itself
//! at the next loop boundary once it sees that an announcement owns the
//! display, or once its cancellation token fires (which also cuts the
//! cadence sleep short).
//!
//! Outside the display window (before 07:00, from 21:00) it writes a blank
//! frame instead of the weather but keeps looping.

use crate::display::Display;
use crate::frame::RenderedFrame;
use crate::render::FrameRenderer;
use crate::state::SharedState;
use chrono::Timelike;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Source of the local wall-clock hour.
pub trait Clock: Send + Sync {
    /// Hour of the day, 0-23, in local time.
    fn local_hour(&self) -> u32;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn local_hour(&self) -> u32 {
        chrono::Local::now().hour()
    }
}

/// Hours during which ambient content is shown: `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl DisplayWindow {
    pub fn contains(&self, hour: u32) -> bool {
        (self.start_hour..self.end_hour).contains(&hour)
    }
}

impl Default for DisplayWindow {
    fn default() -> Self {
        Self {
            start_hour: 7,
            end_hour: 21,
        }
    }
}

/// Why a presenter loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenterExit {
    /// Saw `showing_announcement` at a loop boundary or inside a write.
    Preempted,
    Cancelled,
}

pub struct AmbientPresenter {
    pub display: Arc<Display>,
    pub state: Arc<SharedState>,
    pub renderer: Arc<FrameRenderer>,
    pub clock: Arc<dyn Clock>,
    pub window: DisplayWindow,
    /// Wait before the first frame
    pub settle: Duration,
    /// Wait between frames
    pub cadence: Duration,
}

impl AmbientPresenter {
    /// Run on the tokio runtime until preempted or cancelled.
    pub fn spawn(self, cancel: CancellationToken) -> AmbientHandle {
        let task = tokio::spawn(self.run(cancel.clone()));
        AmbientHandle { cancel, task }
    }

    pub async fn run(self, cancel: CancellationToken) -> PresenterExit {
        tracing::debug!("Ambient presenter started");
        let mut wait = self.settle;

        let exit = loop {
            tokio::select! {
                _ = cancel.cancelled() => break PresenterExit::Cancelled,
                _ = tokio::time::sleep(wait) => {}
            }
            wait = self.cadence;

            if self.state.showing_announcement() {
                break PresenterExit::Preempted;
            }

            let Some(frame) = self.next_frame() else {
                continue;
            };

            match self.display.show_ambient(&frame) {
                Ok(true) => {}
                Ok(false) => break PresenterExit::Preempted,
                Err(e) => tracing::warn!("Ambient frame not shown: {}", e),
            }
        };

        tracing::debug!("Ambient presenter stopped ({:?})", exit);
        exit
    }

    /// The frame for this tick, or `None` to skip the write.
    fn next_frame(&self) -> Option<RenderedFrame> {
        if !self.window.contains(self.clock.local_hour()) {
            return Some(RenderedFrame::blank());
        }
        if self.state.ambient_failing() {
            tracing::debug!("Ambient source failing, skipping frame");
            return None;
        }
        match self.state.ambient().latest() {
            Some(image) => Some(self.renderer.ambient(&image)),
            None => {
                tracing::debug!("No weather image cached yet");
                None
            }
        }
    }
}

/// A running presenter and the token that asks it to stop.
pub struct AmbientHandle {
    cancel: CancellationToken,
    task: JoinHandle<PresenterExit>,
}

impl AmbientHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the presenter to stop and wait for its loop to return.
    pub async fn stop(self) -> Option<PresenterExit> {
        self.cancel.cancel();
        match self.task.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                tracing::warn!("Ambient presenter task failed: {}", e);
                None
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FixedClock;
    use super::*;
    use crate::config::{DisabledMode, Rotations};
    use crate::display::testing::{RecordingSink, SinkWrite};
    use crate::render::test_font;
    use crate::Color;
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const CADENCE: Duration = Duration::from_secs(30);
    const SETTLE: Duration = Duration::from_millis(100);

    struct Fixture {
        sink: RecordingSink,
        state: Arc<SharedState>,
        clock: Arc<FixedClock>,
        presenter: AmbientPresenter,
    }

    fn fixture(hour: u32) -> Fixture {
        let sink = RecordingSink::new();
        let state = Arc::new(SharedState::new());
        state
            .ambient()
            .store(RgbImage::from_pixel(16, 16, Rgb([0, 255, 0])));
        let display = Arc::new(Display::new(
            Box::new(sink.clone()),
            state.clone(),
            DisabledMode::Blank,
        ));
        let clock = Arc::new(FixedClock::at(hour));
        let presenter = AmbientPresenter {
            display,
            state: state.clone(),
            renderer: Arc::new(FrameRenderer::new(test_font(), Rotations::default())),
            clock: clock.clone(),
            window: DisplayWindow::default(),
            settle: SETTLE,
            cadence: CADENCE,
        };
        Fixture {
            sink,
            state,
            clock,
            presenter,
        }
    }

    fn is_green(write: &SinkWrite) -> bool {
        write
            .frame()
            .is_some_and(|f| f.pixels().all(|(_, _, c)| c == Color::new(0, 255, 0)))
    }

    #[rstest]
    #[case(0, false)]
    #[case(6, false)]
    #[case(7, true)]
    #[case(12, true)]
    #[case(20, true)]
    #[case(21, false)]
    #[case(23, false)]
    fn display_window_hours(#[case] hour: u32, #[case] shown: bool) {
        assert_eq!(DisplayWindow::default().contains(hour), shown);
    }

    #[tokio::test(start_paused = true)]
    async fn shows_weather_on_cadence() {
        let f = fixture(12);
        let handle = f.presenter.spawn(CancellationToken::new());

        tokio::time::sleep(SETTLE + CADENCE * 2 + Duration::from_millis(1)).await;
        handle.stop().await;

        let writes = f.sink.timed_writes();
        assert_eq!(writes.len(), 3);
        assert!(writes.iter().all(|(_, w)| is_green(w)));
        assert_eq!(writes[1].0 - writes[0].0, CADENCE);
    }

    #[tokio::test(start_paused = true)]
    async fn night_mode_writes_blank_frames() {
        let f = fixture(22);
        let handle = f.presenter.spawn(CancellationToken::new());

        tokio::time::sleep(SETTLE + Duration::from_millis(1)).await;
        f.clock.set(7);
        tokio::time::sleep(CADENCE).await;
        handle.stop().await;

        let writes = f.sink.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], SinkWrite::Draw(RenderedFrame::blank()));
        assert!(is_green(&writes[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn exits_when_announcement_starts() {
        let f = fixture(12);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(f.presenter.run(cancel));

        tokio::time::sleep(SETTLE + Duration::from_millis(1)).await;
        f.state.set_showing_announcement(true);

        assert_eq!(task.await.unwrap(), PresenterExit::Preempted);
        assert_eq!(f.sink.writes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_cuts_the_cadence_short() {
        let f = fixture(12);
        let handle = f.presenter.spawn(CancellationToken::new());

        tokio::time::sleep(SETTLE + Duration::from_millis(1)).await;
        let before = tokio::time::Instant::now();
        assert_eq!(handle.stop().await, Some(PresenterExit::Cancelled));
        assert!(before.elapsed() < CADENCE);
    }

    #[tokio::test(start_paused = true)]
    async fn skips_writes_while_source_is_failing() {
        let f = fixture(12);
        f.state.set_ambient_failing(true);
        let handle = f.presenter.spawn(CancellationToken::new());

        tokio::time::sleep(SETTLE + CADENCE).await;
        handle.stop().await;
        assert!(f.sink.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_display_never_shows_weather() {
        let f = fixture(12);
        f.state.set_display_enabled(false);
        let handle = f.presenter.spawn(CancellationToken::new());

        tokio::time::sleep(SETTLE + CADENCE + Duration::from_millis(1)).await;
        handle.stop().await;
        assert_eq!(f.sink.writes(), vec![SinkWrite::Halt, SinkWrite::Halt]);
    }
}
