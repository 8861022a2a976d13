//! Year range scrubber with play/pause and speed control.
//!
//! The control owns the "current year" of the timeline. It is a small state
//! machine: stopped, playing and paused, where `stop()` rewinds to the start
//! of the range. Playback runs one full pass over the range and pauses when
//! the year index wraps.

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use log::debug;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use super::mount::{Panes, UiError};
use super::theme::Theme;
use crate::events::Listeners;
use crate::playback::{advance_index, PlaybackClock, Step};

/// Speed multipliers offered by the speed selector
pub const SPEED_OPTIONS: [f64; 4] = [0.5, 1.0, 2.0, 4.0];

/// Construction options
#[derive(Debug, Clone)]
pub struct TimeControlConfig {
    pub start_year: i32,
    pub end_year: i32,
    /// Defaults to `start_year`
    pub current_year: Option<i32>,
    /// Real time per simulated year at 1x
    pub animation_speed: Duration,
    pub show_year_display: bool,
    pub show_speed_control: bool,
    pub play_label: String,
    pub pause_label: String,
}

impl Default for TimeControlConfig {
    fn default() -> Self {
        TimeControlConfig {
            start_year: 1990,
            end_year: 2020,
            current_year: None,
            animation_speed: Duration::from_millis(1000),
            show_year_display: true,
            show_speed_control: true,
            play_label: "▶ Play".to_string(),
            pause_label: "⏸ Pause".to_string(),
        }
    }
}

/// Changes published by the time control
#[derive(Debug, Clone, PartialEq)]
pub enum TimeEvent {
    YearChanged(i32),
    PlayStateChanged(bool),
    SpeedChanged(f64),
}

pub struct TimeControl {
    mount: String,
    mounted: bool,
    config: TimeControlConfig,
    start_year: i32,
    end_year: i32,
    current_year: i32,
    available_years: Vec<i32>,
    is_playing: bool,
    speed_multiplier: f64,
    enabled: bool,
    clock: PlaybackClock,
    events: Listeners<TimeEvent>,
}

/// `speed / multiplier`, or `None` when that is not a representable `Duration`
fn scaled_period(speed: Duration, multiplier: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(speed.as_secs_f64() / multiplier).ok()
}

fn year_range(start: i32, end: i32) -> Vec<i32> {
    (start..=end).collect()
}

impl TimeControl {
    /// Mount a time control into `mount`; fails if the pane is missing or taken
    pub fn new(panes: &mut Panes, mount: &str, config: TimeControlConfig) -> Result<Self, UiError> {
        panes.claim(mount, "time-control")?;
        let mut control = TimeControl {
            mount: mount.to_string(),
            mounted: true,
            start_year: config.start_year,
            end_year: config.end_year,
            current_year: config.current_year.unwrap_or(config.start_year),
            available_years: year_range(config.start_year, config.end_year),
            is_playing: false,
            speed_multiplier: 1.0,
            enabled: true,
            clock: PlaybackClock::new(),
            events: Listeners::new(),
            config,
        };
        if !control.available_years.contains(&control.current_year) {
            control.current_year = control.start_year;
        }
        Ok(control)
    }

    pub fn events_mut(&mut self) -> &mut Listeners<TimeEvent> {
        &mut self.events
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    #[allow(dead_code)] // Used in tests
    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    #[allow(dead_code)] // Used in tests
    pub fn end_year(&self) -> i32 {
        self.end_year
    }

    #[allow(dead_code)] // Used in tests
    pub fn available_years(&self) -> &[i32] {
        &self.available_years
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    #[allow(dead_code)] // Used in tests
    pub fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Tick period at the current speed
    pub fn period(&self) -> Duration {
        scaled_period(self.config.animation_speed, self.speed_multiplier)
            .unwrap_or(self.config.animation_speed)
    }

    /// Position of the current year within the range, in `[0, 100]`
    pub fn progress_percent(&self) -> f64 {
        if self.end_year <= self.start_year {
            return 0.0;
        }
        let span = f64::from(self.end_year - self.start_year);
        (f64::from(self.current_year - self.start_year) / span * 100.0).clamp(0.0, 100.0)
    }

    /// Move to `year`. Years outside the range are ignored entirely.
    pub fn set_year(&mut self, year: i32, notify: bool) {
        if year < self.start_year || year > self.end_year {
            return;
        }
        self.current_year = year;
        if notify {
            self.events.emit(&TimeEvent::YearChanged(year));
        }
    }

    /// Replace the bounds.
    ///
    /// `current` is used when it lies in the new range; otherwise the
    /// existing year is kept if still valid, else the year snaps to `start`.
    pub fn set_year_range(&mut self, start: i32, end: i32, current: Option<i32>) {
        self.start_year = start;
        self.end_year = end;
        self.available_years = year_range(start, end);

        let in_range = |y: i32| (start..=end).contains(&y);
        self.current_year = match current {
            Some(y) if in_range(y) => y,
            _ if in_range(self.current_year) => self.current_year,
            _ => start,
        };
        debug!("Timeline range {start}-{end}, at {}", self.current_year);
    }

    pub fn play(&mut self) {
        self.play_at(Instant::now());
    }

    pub fn play_at(&mut self, now: Instant) {
        if self.is_playing || self.available_years.is_empty() {
            return;
        }
        self.clock.start(now, self.period());
        self.is_playing = true;
        self.events.emit(&TimeEvent::PlayStateChanged(true));
    }

    pub fn pause(&mut self) {
        self.clock.stop();
        self.is_playing = false;
        self.events.emit(&TimeEvent::PlayStateChanged(false));
    }

    pub fn toggle_play_pause(&mut self) {
        if self.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Pause and rewind to the start of the range
    pub fn stop(&mut self) {
        self.pause();
        self.set_year(self.start_year, true);
    }

    pub fn set_speed(&mut self, multiplier: f64) {
        self.set_speed_at(multiplier, Instant::now());
    }

    /// Change the speed multiplier; a running timer restarts at the new period.
    ///
    /// Non-positive or non-finite multipliers are ignored, as are those too
    /// small for the resulting period to fit in a `Duration`.
    pub fn set_speed_at(&mut self, multiplier: f64, now: Instant) {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return;
        }
        if scaled_period(self.config.animation_speed, multiplier).is_none() {
            debug!("Ignoring speed {multiplier}: period out of range");
            return;
        }
        self.speed_multiplier = multiplier;
        self.events.emit(&TimeEvent::SpeedChanged(multiplier));
        if self.is_playing {
            self.pause();
            self.play_at(now);
        }
    }

    /// Enable or disable interaction. Playback is unaffected.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Advance playback for every period elapsed by `now`
    pub fn tick(&mut self, now: Instant) {
        let ticks = self.clock.due_ticks(now);
        for _ in 0..ticks {
            if !self.is_playing {
                break;
            }
            match advance_index(&self.available_years, self.current_year) {
                Step::Advance(year) => self.set_year(year, true),
                Step::Wrapped => self.pause(),
            }
        }
    }

    /// Stop the timer, vacate the pane and reset to construction defaults
    pub fn destroy(&mut self, panes: &mut Panes) {
        self.clock.stop();
        self.events.clear();
        if self.mounted {
            panes.release(&self.mount);
            self.mounted = false;
        }
        self.start_year = self.config.start_year;
        self.end_year = self.config.end_year;
        self.current_year = self.config.current_year.unwrap_or(self.config.start_year);
        self.available_years.clear();
        self.is_playing = false;
        self.speed_multiplier = 1.0;
        self.enabled = true;
    }

    /// Keyboard handling; returns true when the key was consumed
    pub fn handle_key(&mut self, key: KeyCode) -> bool {
        if !self.enabled || !self.mounted {
            return false;
        }
        match key {
            KeyCode::Char(' ') => {
                // Playing from the last year starts a fresh pass
                if !self.is_playing && self.current_year == self.end_year {
                    self.set_year(self.start_year, true);
                }
                self.toggle_play_pause();
            }
            KeyCode::Char('s') => self.stop(),
            KeyCode::Left => self.set_year(self.current_year - 1, true),
            KeyCode::Right => self.set_year(self.current_year + 1, true),
            KeyCode::Home => self.set_year(self.start_year, true),
            KeyCode::End => self.set_year(self.end_year, true),
            KeyCode::Char('+') | KeyCode::Char('=') => self.cycle_speed(true),
            KeyCode::Char('-') => self.cycle_speed(false),
            _ => return false,
        }
        true
    }

    fn cycle_speed(&mut self, faster: bool) {
        let index = SPEED_OPTIONS
            .iter()
            .position(|&s| (s - self.speed_multiplier).abs() < f64::EPSILON)
            .unwrap_or(1);
        let next = if faster {
            (index + 1).min(SPEED_OPTIONS.len() - 1)
        } else {
            index.saturating_sub(1)
        };
        if next != index {
            self.set_speed(SPEED_OPTIONS[next]);
        }
    }

    pub fn draw(&self, frame: &mut Frame, panes: &Panes, theme: &Theme, focused: bool) {
        if !self.mounted {
            return;
        }
        let Some(area) = panes.area(&self.mount) else {
            return;
        };

        let (border_style, title_style) = theme.panel_styles(focused);
        let block = Block::default()
            .title(" Timeline ")
            .borders(Borders::ALL)
            .border_style(border_style)
            .title_style(title_style);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(inner);

        let base = if self.enabled {
            theme.normal_style()
        } else {
            theme.normal_style().add_modifier(Modifier::DIM)
        };

        frame.render_widget(Paragraph::new(self.controls_line(theme)).style(base), rows[0]);

        let gauge_style = if self.enabled {
            Style::default().fg(theme.accent)
        } else {
            Style::default().fg(theme.border).add_modifier(Modifier::DIM)
        };
        let gauge = Gauge::default()
            .gauge_style(gauge_style)
            .ratio(self.progress_percent() / 100.0)
            .label(format!("{}", self.current_year));
        frame.render_widget(gauge, slider_area(rows[1]));
    }

    fn controls_line(&self, theme: &Theme) -> Line<'static> {
        let label = if self.is_playing {
            &self.config.pause_label
        } else {
            &self.config.play_label
        };
        let mut spans = vec![
            Span::styled(format!("[{label}]"), theme.title_style()),
            Span::raw(format!("  {} – {}", self.start_year, self.end_year)),
        ];
        if self.config.show_year_display {
            spans.push(Span::raw("   Year: "));
            spans.push(Span::styled(
                self.current_year.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        if self.config.show_speed_control {
            spans.push(Span::raw("   Speed: "));
            for speed in SPEED_OPTIONS {
                let text = format!(" {}x ", format_speed(speed));
                if (speed - self.speed_multiplier).abs() < f64::EPSILON {
                    spans.push(Span::styled(text, theme.highlight_style()));
                } else {
                    spans.push(Span::styled(text, theme.muted_style()));
                }
            }
        }
        Line::from(spans)
    }
}

fn format_speed(speed: f64) -> String {
    if speed.fract() == 0.0 {
        format!("{speed:.0}")
    } else {
        format!("{speed}")
    }
}

/// Leave a one-cell margin on each side of the slider
fn slider_area(area: Rect) -> Rect {
    Rect {
        x: area.x.saturating_add(1),
        width: area.width.saturating_sub(2),
        ..area
    }
}
