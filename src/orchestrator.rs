//! Orchestrator: the render loop that owns the display.
//!
//! Announcements are taken off the intake queue one at a time, in arrival
//! order, and each runs to completion before the next is looked at:
//!
//! ```text
//! Idle ──dequeue──▶ PriorityFlash ──▶ Scrolling ──▶ Idle
//!                   (skipped for Priority::None)
//! ```
//!
//! Entering an announcement raises `showing_announcement` and asks the
//! ambient presenter to stop; leaving it clears the flag and starts a fresh
//! presenter, unless the weather source is in backoff.
//!
//! A sink error aborts the current announcement (the panel keeps whatever
//! was last written) but never the loop.

use crate::ambient::{AmbientHandle, AmbientPresenter, Clock, DisplayWindow};
use crate::assets::FlashPanels;
use crate::config::Timing;
use crate::display::Display;
use crate::queue::{Announcement, AnnouncementReceiver};
use crate::render::{FrameRenderer, SCROLL_MIN_END_OFFSET, SCROLL_START_OFFSET};
use crate::state::SharedState;
use crate::Result;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// What the orchestrator is doing with the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No announcement; the ambient presenter may be running
    Idle,
    PriorityFlash,
    Scrolling,
}

pub struct Orchestrator {
    display: Arc<Display>,
    state: Arc<SharedState>,
    renderer: Arc<FrameRenderer>,
    flash: FlashPanels,
    timing: Timing,
    clock: Arc<dyn Clock>,
    window: DisplayWindow,
    /// Signalled by the scheduler when the weather source recovers
    ambient_recovered: Arc<Notify>,
    phase: Phase,
    presenter: Option<AmbientHandle>,
}

impl Orchestrator {
    pub fn new(
        display: Arc<Display>,
        state: Arc<SharedState>,
        renderer: Arc<FrameRenderer>,
        flash: FlashPanels,
        timing: Timing,
        clock: Arc<dyn Clock>,
        ambient_recovered: Arc<Notify>,
    ) -> Self {
        Self {
            display,
            state,
            renderer,
            flash,
            timing,
            clock,
            window: DisplayWindow::default(),
            ambient_recovered,
            phase: Phase::Idle,
            presenter: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Process announcements until the queue closes or `shutdown` fires.
    pub async fn run(mut self, mut queue: AnnouncementReceiver, shutdown: CancellationToken) {
        tracing::info!("Orchestrator started, waiting for announcements...");

        if !self.state.ambient_failing() {
            self.start_ambient();
        }

        let recovered = self.ambient_recovered.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = queue.recv() => match next {
                    Some(announcement) => self.announce(announcement).await,
                    None => {
                        tracing::info!("Announcement queue closed");
                        break;
                    }
                },
                _ = recovered.notified() => self.resume_ambient(),
            }
        }

        self.shutdown().await;
    }

    /// Show one announcement, then hand the display back to ambient content.
    pub async fn announce(&mut self, announcement: Announcement) {
        tracing::info!(
            "Announcement ({}): {:?}",
            announcement.priority,
            announcement.text
        );

        self.state.set_showing_announcement(true);
        self.stop_ambient().await;

        if let Err(e) = self.present(&announcement).await {
            tracing::warn!("Announcement aborted: {}", e);
        }

        self.set_phase(Phase::Idle);
        self.state.set_showing_announcement(false);

        if self.state.ambient_failing() {
            tracing::info!("Weather source failing; ambient display stays off");
        } else {
            self.start_ambient();
        }
    }

    /// Stop the presenter and blank the panel.
    pub async fn shutdown(mut self) {
        self.stop_ambient().await;
        if let Err(e) = self.display.blank() {
            tracing::warn!("Failed to blank display on shutdown: {}", e);
        }
        tracing::info!("Orchestrator stopped");
    }

    async fn present(&mut self, announcement: &Announcement) -> Result<()> {
        let flash_frame = self
            .flash
            .for_priority(announcement.priority)
            .map(|panel| self.renderer.solid_color(panel));

        if let Some(frame) = flash_frame {
            self.set_phase(Phase::PriorityFlash);
            for _ in 0..self.timing.flash_cycles {
                self.display.show(&frame)?;
                sleep(self.timing.flash_on).await;
                self.display.blank()?;
                sleep(self.timing.flash_off).await;
            }
        }

        self.set_phase(Phase::Scrolling);
        let frames = self.scroll(&announcement.text).await?;
        tracing::debug!("Scrolled {:?} in {} frames", announcement.text, frames);
        Ok(())
    }

    /// Scroll `text` from off the right edge until it has left the panel.
    ///
    /// Ends at the first offset >= `SCROLL_MIN_END_OFFSET` whose frame is
    /// fully black. Returns the number of frames written.
    async fn scroll(&self, text: &str) -> Result<u32> {
        let mut offset = SCROLL_START_OFFSET;
        let mut frames = 0;

        loop {
            let frame = self.renderer.text(text, offset);
            self.display.show(&frame)?;
            frames += 1;
            sleep(self.timing.scroll_frame).await;

            if offset >= SCROLL_MIN_END_OFFSET && frame.is_fully_black() {
                return Ok(frames);
            }
            offset += 1;
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::debug!("Orchestrator: {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    fn start_ambient(&mut self) {
        if self.presenter.as_ref().is_some_and(|p| !p.is_finished()) {
            return;
        }

        let presenter = AmbientPresenter {
            display: self.display.clone(),
            state: self.state.clone(),
            renderer: self.renderer.clone(),
            clock: self.clock.clone(),
            window: self.window,
            settle: self.timing.ambient_settle,
            cadence: self.timing.ambient_cadence,
        };
        self.presenter = Some(presenter.spawn(CancellationToken::new()));
    }

    async fn stop_ambient(&mut self) {
        if let Some(presenter) = self.presenter.take() {
            presenter.stop().await;
        }
    }

    fn resume_ambient(&mut self) {
        if self.phase == Phase::Idle && !self.state.ambient_failing() {
            tracing::info!("Weather source recovered, resuming ambient display");
            self.start_ambient();
        }
    }
}
