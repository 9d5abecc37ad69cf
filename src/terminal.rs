// SPDX-License-Identifier: GPL-3.0-only

//! Terminal plane-angle viewer
//!
//! Renders the overlaid colour (or colorized depth) frame to the terminal
//! using Unicode half-block characters for improved vertical resolution,
//! with the angle readout and a status bar underneath.

use crate::backends::create_pipeline;
use crate::backends::types::{ColorFrame, FrameSet};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::geometry::Roi;
use crate::pipeline::overlay::{OverlayState, render_overlay, save_snapshot};
use crate::pipeline::{FrameCycle, FrameReport, FrameSink, LoopAction};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

type Term = Terminal<CrosstermBackend<io::Stdout>>;

/// Run the terminal viewer until the user quits or the stream ends
pub fn run(config: &Config) -> AppResult<()> {
    // Fail before touching the terminal so errors stay readable
    let mut pipeline = create_pipeline(config)?;
    let cycle = FrameCycle::new(config.frame_cycle_options());

    enable_raw_mode().map_err(display_error)?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).map_err(display_error)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(display_error)?;

    let result = {
        let mut sink = TerminalSink::new(
            &mut terminal,
            config.roi,
            config.snapshot_directory(),
            pipeline.name().to_string(),
        );
        cycle.run(&mut pipeline, &config.stream, &mut sink)
    };

    // Restore terminal
    disable_raw_mode().map_err(display_error)?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).map_err(display_error)?;
    terminal.show_cursor().map_err(display_error)?;

    let summary = result?;
    info!(
        frames = summary.frames,
        valid_planes = summary.valid_planes,
        "Terminal viewer closed"
    );
    Ok(())
}

/// [`FrameSink`] drawing every frame and handling key presses
struct TerminalSink<'a> {
    terminal: &'a mut Term,
    roi: Roi,
    snapshot_dir: PathBuf,
    source: String,
    frame_widget: FrameWidget,
    overlay: OverlayState,
    show_depth: bool,
    show_help: bool,
    status_message: String,
}

impl<'a> TerminalSink<'a> {
    fn new(terminal: &'a mut Term, roi: Roi, snapshot_dir: PathBuf, source: String) -> Self {
        let status_message = build_status_message(&source, false);
        Self {
            terminal,
            roi,
            snapshot_dir,
            source,
            frame_widget: FrameWidget::new(),
            overlay: OverlayState::default(),
            show_depth: false,
            show_help: false,
            status_message,
        }
    }

    fn draw(&mut self) -> io::Result<()> {
        let [y_text, plane_text] = self.overlay.lines();
        let readout = format!(" {} | {}", y_text, plane_text);
        let frame_widget = &self.frame_widget;
        let status_message = &self.status_message;

        self.terminal.draw(|f| {
            let area = f.area();

            // Reserve the bottom two lines for the readout and the status bar
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(2),
            };
            f.render_widget(frame_widget, camera_area);

            let readout_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(2),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                TextLine {
                    message: &readout,
                    style: Style::default().fg(Color::Black).bg(Color::Green),
                },
                readout_area,
            );

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                TextLine {
                    message: status_message,
                    style: Style::default().fg(Color::White).bg(Color::DarkGray),
                },
                status_area,
            );
        })?;
        Ok(())
    }

    /// Drain pending key presses; `Stop` when the user asked to quit
    fn handle_input(&mut self, frames: &FrameSet) -> io::Result<LoopAction> {
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(LoopAction::Stop);
                }
                KeyCode::Char('q') | KeyCode::Esc => return Ok(LoopAction::Stop),
                KeyCode::Char('d') => {
                    self.show_depth = !self.show_depth;
                    self.show_help = false;
                    self.status_message = build_status_message(&self.source, self.show_depth);
                }
                KeyCode::Char('p') => {
                    self.show_help = false;
                    let overlaid = render_overlay(frames, self.roi, self.show_depth);
                    match save_snapshot(&self.snapshot_dir, frames, &overlaid) {
                        Ok(snapshot) => {
                            self.status_message = format!("Saved: {}", snapshot.depth.display());
                        }
                        Err(e) => {
                            error!("Failed to save snapshot: {}", e);
                            self.status_message = format!("Error: {}", e);
                        }
                    }
                }
                KeyCode::Char('h') => {
                    self.show_help = !self.show_help;
                    self.status_message = if self.show_help {
                        build_help_message()
                    } else {
                        build_status_message(&self.source, self.show_depth)
                    };
                }
                _ => {}
            }
        }
        Ok(LoopAction::Continue)
    }
}

impl FrameSink for TerminalSink<'_> {
    fn on_frame(&mut self, frames: &FrameSet, report: &FrameReport) -> AppResult<LoopAction> {
        self.overlay.update(report);
        self.frame_widget
            .update_frame(render_overlay(frames, self.roi, self.show_depth));
        self.draw().map_err(display_error)?;
        self.handle_input(frames).map_err(display_error)
    }
}

fn display_error(e: io::Error) -> AppError {
    AppError::Display(e.to_string())
}

fn build_status_message(source: &str, show_depth: bool) -> String {
    let view = if show_depth { "depth" } else { "colour" };
    format!(
        "{} ({}) | 'd' view | 'p' snapshot | 'h' help | 'q' quit",
        source, view
    )
}

fn build_help_message() -> String {
    "d: Toggle colour/depth | p: Save snapshot | h: Toggle help | q/Esc/Ctrl+C: Quit".to_string()
}

/// Widget that renders a colour frame using half-block characters
struct FrameWidget {
    frame: Option<ColorFrame>,
}

impl FrameWidget {
    fn new() -> Self {
        Self { frame: None }
    }

    fn update_frame(&mut self, frame: ColorFrame) {
        self.frame = Some(frame);
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.as_ref().filter(|f| f.width > 0 && f.height > 0) else {
            render_placeholder(area, buf);
            return;
        };

        // Cell rows hold two pixel rows each
        let (cols, rows) = fit_cells(frame.width, frame.height, area.width, area.height);
        if cols == 0 || rows == 0 {
            return;
        }
        let left = area.x + area.width.saturating_sub(cols) / 2;
        let top = area.y + area.height.saturating_sub(rows) / 2;
        let step_x = frame.width as f64 / cols as f64;
        let step_y = frame.height as f64 / (rows as f64 * 2.0);

        for row in 0..rows {
            let upper = (row as f64 * 2.0 * step_y) as u32;
            let lower = ((row as f64 * 2.0 + 1.0) * step_y) as u32;
            for col in 0..cols {
                let src_x = (col as f64 * step_x) as u32;
                if let Some(cell) = buf.cell_mut((left + col, top + row)) {
                    cell.set_char('▀');
                    cell.set_fg(sample_pixel(frame, src_x, upper));
                    cell.set_bg(sample_pixel(frame, src_x, lower));
                }
            }
        }
    }
}

fn render_placeholder(area: Rect, buf: &mut Buffer) {
    let msg = "Waiting for frames...";
    if area.height == 0 {
        return;
    }
    let x = area.x + area.width.saturating_sub(msg.len() as u16) / 2;
    buf.set_string(x, area.y + area.height / 2, msg, Style::default());
}

/// Largest cell grid keeping the frame's aspect ratio inside `cols` x `rows`
fn fit_cells(width: u32, height: u32, cols: u16, rows: u16) -> (u16, u16) {
    let (width, height) = (width as f64, height as f64);
    let pixel_rows = rows as f64 * 2.0;
    if cols as f64 * height > pixel_rows * width {
        ((pixel_rows * width / height) as u16, rows)
    } else {
        (cols, (cols as f64 * height / width / 2.0) as u16)
    }
}

fn sample_pixel(frame: &ColorFrame, x: u32, y: u32) -> Color {
    let x = x.min(frame.width - 1);
    let y = y.min(frame.height - 1);
    let [r, g, b] = frame.rgb(x, y).unwrap_or([0, 0, 0]);
    Color::Rgb(r, g, b)
}

/// Single styled line of text filling its area
struct TextLine<'a> {
    message: &'a str,
    style: Style,
}

impl Widget for TextLine<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_style(self.style);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(area.x, area.y, text, self.style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::types::ColorFormat;

    #[test]
    fn test_frame_widget_draws_half_blocks() {
        let mut frame = ColorFrame::new(2, 2, ColorFormat::Bgr8);
        frame.put(0, 0, [0, 0, 255]);
        frame.put(0, 1, [255, 0, 0]);
        let mut widget = FrameWidget::new();
        widget.update_frame(frame);

        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);
        (&widget).render(area, &mut buf);

        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(0, 0, 255));
    }

    #[test]
    fn test_frame_widget_placeholder_without_frame() {
        let area = Rect::new(0, 0, 30, 3);
        let mut buf = Buffer::empty(area);
        (&FrameWidget::new()).render(area, &mut buf);
        let row: String = (0..30).map(|x| buf[(x, 1)].symbol().to_string()).collect();
        assert!(row.contains("Waiting for frames"));
    }

    #[test]
    fn test_fit_cells_keeps_aspect() {
        // 4:3 frame in a wide area is limited by height
        assert_eq!(fit_cells(640, 480, 100, 30), (80, 30));
        // and in a tall area by width
        assert_eq!(fit_cells(640, 480, 40, 40), (40, 15));
    }

    #[test]
    fn test_text_line_truncates() {
        let area = Rect::new(0, 0, 5, 1);
        let mut buf = Buffer::empty(area);
        TextLine {
            message: "Plane Angle: 1.00 degrees",
            style: Style::default(),
        }
        .render(area, &mut buf);
        let row: String = (0..5).map(|x| buf[(x, 0)].symbol().to_string()).collect();
        assert_eq!(row, "Plane");
    }
}
