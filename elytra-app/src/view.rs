//! Terminal caption view.
//!
//! Default mode redraws one status line in place: loop time, an opacity
//! meter and the most visible caption. `--json` prints every frame instead.

use std::io::{self, Write};

use elytra_core::{CaptionFrame, EngineStatusEvent};

const METER_CELLS: usize = 10;

pub struct CaptionView<W: Write> {
    out: W,
    json: bool,
    /// Width of the last in-place line, so shorter lines can blank it.
    last_width: usize,
}

impl<W: Write> CaptionView<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self {
            out,
            json,
            last_width: 0,
        }
    }

    pub fn draw(&mut self, frame: &CaptionFrame) -> io::Result<()> {
        if self.json {
            let line = serde_json::to_string(frame).map_err(io::Error::other)?;
            writeln!(self.out, "{line}")?;
        } else {
            let line = caption_line(frame);
            let width = line.chars().count();
            let pad = self.last_width.saturating_sub(width);
            write!(self.out, "\r{line}{:pad$}", "")?;
            self.last_width = width;
        }
        self.out.flush()
    }

    /// Status changes only appear in JSON mode; the line view has no room.
    pub fn status(&mut self, event: &EngineStatusEvent) -> io::Result<()> {
        if self.json {
            let line = serde_json::to_string(event).map_err(io::Error::other)?;
            writeln!(self.out, "{line}")?;
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn finish(&mut self) -> io::Result<()> {
        if !self.json && self.last_width > 0 {
            writeln!(self.out)?;
        }
        self.out.flush()
    }
}

/// `[ 2.50s] ██████░░░░ Beetles are insects...`
pub fn caption_line(frame: &CaptionFrame) -> String {
    let (opacity, text) = frame
        .most_visible()
        .map(|c| (c.opacity, c.text.as_str()))
        .unwrap_or((0.0, ""));
    let filled = ((opacity * METER_CELLS as f64).round() as usize).min(METER_CELLS);
    format!(
        "[{:>5.2}s] {}{} {}",
        frame.loop_time,
        "█".repeat(filled),
        "░".repeat(METER_CELLS - filled),
        text
    )
}
