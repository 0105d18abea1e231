//! Hardware sink: drives the physical panel through `rpi-led-matrix`.
//!
//! The C library is not thread-safe, so the matrix lives on one dedicated
//! thread and `MatrixSink` only sends it frames over an `mpsc` channel.
//! A write fails once that thread has gone away.

use crate::display::DeviceSink;
use crate::frame::RenderedFrame;
use crate::{Error, PANEL_SIZE, Result};
use rpi_led_matrix::{LedCanvas, LedMatrix, LedMatrixOptions, LedRuntimeOptions};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

enum SinkCommand {
    Draw(RenderedFrame),
    Halt,
}

pub struct MatrixSink {
    tx: Sender<SinkCommand>,
}

impl MatrixSink {
    /// Initialize the panel on its own thread. Fails if the matrix cannot be
    /// opened (not root, GPIO unavailable).
    pub fn spawn(brightness: u8) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        thread::Builder::new()
            .name("matrix".to_string())
            .spawn(move || {
                let matrix = match create_matrix() {
                    Ok(m) => {
                        let _ = ready_tx.send(Ok(()));
                        m
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                panel_loop(matrix, rx, brightness);
            })
            .map_err(|e| Error::Sink(format!("failed to start matrix thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { tx }),
            Ok(Err(e)) => Err(Error::Sink(format!("failed to initialize LED matrix: {e}"))),
            Err(_) => Err(Error::Sink("matrix thread exited during startup".to_string())),
        }
    }

    fn send(&self, cmd: SinkCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .map_err(|_| Error::Sink("matrix thread gone".to_string()))
    }
}

impl DeviceSink for MatrixSink {
    fn draw(&mut self, frame: &RenderedFrame) -> Result<()> {
        self.send(SinkCommand::Draw(frame.clone()))
    }

    fn halt(&mut self) -> Result<()> {
        self.send(SinkCommand::Halt)
    }
}

/// Create a matrix configured for a single 16x16 panel.
fn create_matrix() -> std::result::Result<LedMatrix, Box<dyn std::error::Error>> {
    let mut options = LedMatrixOptions::new();
    options.set_rows(PANEL_SIZE);
    options.set_cols(PANEL_SIZE);
    options.set_hardware_mapping("adafruit-hat");
    options.set_pwm_bits(8)?;
    options.set_pwm_lsb_nanoseconds(130);

    let mut rt_options = LedRuntimeOptions::new();
    rt_options.set_gpio_slowdown(2);

    let matrix = LedMatrix::new(Some(options), Some(rt_options))?;
    Ok(matrix)
}

/// Owns the matrix until every `MatrixSink` is dropped.
fn panel_loop(matrix: LedMatrix, rx: Receiver<SinkCommand>, brightness: u8) {
    let mut canvas = matrix.offscreen_canvas();
    tracing::info!("Matrix thread started ({}x{})", PANEL_SIZE, PANEL_SIZE);

    for cmd in rx {
        match cmd {
            SinkCommand::Draw(frame) => draw_frame_to_canvas(&mut canvas, &frame, brightness),
            SinkCommand::Halt => canvas.clear(),
        }
        canvas = matrix.swap(canvas);
    }

    canvas.clear();
    matrix.swap(canvas);
    tracing::info!("Matrix thread: channel closed, shutting down.");
}

fn draw_frame_to_canvas(canvas: &mut LedCanvas, frame: &RenderedFrame, brightness: u8) {
    for (x, y, color) in frame.pixels() {
        let c = color.apply_brightness(brightness);
        canvas.set(x as i32, y as i32, &c.into());
    }
}
