//! Animated CO2 vs GDP scatter plot.
//!
//! One point per country for the current year. Changing the year or the
//! country filter starts a transition: entering points fade in, persisting
//! points glide to their new position and exiting points fade out and are
//! dropped. Axis domains glide over the same duration.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph, Widget},
    Frame,
};

use super::mount::{Panes, UiError};
use super::theme::Theme;
use crate::api::{self, CountryFilter, QueryParams};
use crate::data::{unique_years, DataPoint, DataSource};
use crate::events::Listeners;
use crate::loader::{Pending, Poll};
use crate::playback::{advance_index, PlaybackClock, Step};

/// Lowest GDP shown on the log axis
const MIN_GDP_DOMAIN: f64 = 100.0;
/// Hover picks the nearest point within this many cells
const HOVER_RADIUS: f64 = 2.0;
/// Extra pause between steps of the plot's own playback
const PLAY_GAP: Duration = Duration::from_millis(100);

/// Space reserved around the plotting area, in cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margin {
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
    pub left: u16,
}

#[derive(Debug, Clone)]
pub struct ScatterPlotConfig {
    /// Outer width in cells
    pub width: u16,
    /// Outer height in cells
    pub height: u16,
    pub margin: Margin,
    /// Shared by point and axis transitions
    pub animation_duration: Duration,
}

impl Default for ScatterPlotConfig {
    fn default() -> Self {
        ScatterPlotConfig {
            width: 120,
            height: 40,
            margin: Margin {
                top: 1,
                right: 2,
                bottom: 2,
                left: 10,
            },
            animation_duration: Duration::from_millis(750),
        }
    }
}

/// Changes published by the scatter plot
#[derive(Debug, Clone, PartialEq)]
pub enum PlotEvent {
    YearChanged(i32),
    CountryClicked(String),
    DataLoaded { start: i32, end: i32 },
    LoadFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// Tooltip for a hovered point
#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub country_code: String,
    pub lines: Vec<String>,
    pub anchor: (u16, u16),
}

/// A point somewhere in its transition
#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedPoint {
    pub datum: DataPoint,
    from: (f64, f64),
    to: (f64, f64),
    from_opacity: f64,
    to_opacity: f64,
}

impl AnimatedPoint {
    pub fn is_exiting(&self) -> bool {
        self.to_opacity == 0.0
    }

    fn at(&self, t: f64) -> (f64, f64, f64) {
        (
            lerp(self.from.0, self.to.0, t),
            lerp(self.from.1, self.to.1, t),
            lerp(self.from_opacity, self.to_opacity, t),
        )
    }
}

/// A point as it should be drawn at a given instant
#[derive(Debug, Clone, PartialEq)]
pub struct SampledPoint {
    pub country_code: String,
    /// GDP per capita
    pub x: f64,
    /// CO2 per capita
    pub y: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, Default)]
struct Transition {
    points: Vec<AnimatedPoint>,
    from_x: (f64, f64),
    to_x: (f64, f64),
    from_y: (f64, f64),
    to_y: (f64, f64),
    started: Option<Instant>,
    duration: Duration,
}

impl Transition {
    fn progress(&self, now: Instant) -> f64 {
        let Some(started) = self.started else {
            return 1.0;
        };
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(started).as_secs_f64();
        ease_cubic_in_out((elapsed / self.duration.as_secs_f64()).clamp(0.0, 1.0))
    }

    fn domains(&self, now: Instant) -> ((f64, f64), (f64, f64)) {
        let t = self.progress(now);
        (
            (lerp(self.from_x.0, self.to_x.0, t), lerp(self.from_x.1, self.to_x.1, t)),
            (lerp(self.from_y.0, self.to_y.0, t), lerp(self.from_y.1, self.to_y.1, t)),
        )
    }

    fn sample(&self, now: Instant) -> Vec<SampledPoint> {
        let t = self.progress(now);
        self.points
            .iter()
            .filter(|p| !(p.is_exiting() && t >= 1.0))
            .map(|p| {
                let (x, y, opacity) = p.at(t);
                SampledPoint {
                    country_code: p.datum.country_code.clone(),
                    x,
                    y,
                    opacity,
                }
            })
            .collect()
    }

    /// Drop exited points once the transition has finished
    fn prune(&mut self, now: Instant) {
        if self.progress(now) >= 1.0 {
            self.points.retain(|p| !p.is_exiting());
        }
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    if t >= 1.0 {
        b
    } else {
        a + (b - a) * t
    }
}

fn ease_cubic_in_out(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// `[max(100, min * 0.8), max * 1.2]` over GDP values
fn gdp_domain(points: &[DataPoint]) -> (f64, f64) {
    if points.is_empty() {
        return (MIN_GDP_DOMAIN, 100_000.0);
    }
    let min = points.iter().map(|p| p.gdp_per_capita).fold(f64::MAX, f64::min);
    let max = points.iter().map(|p| p.gdp_per_capita).fold(f64::MIN, f64::max);
    let low = (min * 0.8).max(MIN_GDP_DOMAIN);
    let high = (max * 1.2).max(low * 10.0_f64.powf(0.1));
    (low, high)
}

/// `[0, max * 1.1]` over CO2 values
fn co2_domain(points: &[DataPoint]) -> (f64, f64) {
    let max = points
        .iter()
        .map(|p| p.co2_per_capita)
        .fold(0.0_f64, f64::max);
    if max <= 0.0 {
        (0.0, 1.0)
    } else {
        (0.0, max * 1.1)
    }
}

/// Format a dollar amount with thousands separators, e.g. `$12,345`
pub fn format_currency(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// Format a value for display on axis labels
fn format_axis_value(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 1000.0 {
        format!("{:.0}k", value / 1000.0)
    } else if value >= 10.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

pub struct ScatterPlot {
    mount: String,
    mounted: bool,
    source: Arc<dyn DataSource>,
    config: ScatterPlotConfig,
    inner_width: u16,
    inner_height: u16,
    data: Vec<DataPoint>,
    available_years: Vec<i32>,
    current_year: Option<i32>,
    selected: HashSet<String>,
    /// Country codes in palette order
    color_order: Vec<String>,
    x_domain: (f64, f64),
    y_domain: (f64, f64),
    transition: Transition,
    clock: PlaybackClock,
    tooltip: Option<Tooltip>,
    load_state: LoadState,
    pending: Option<Pending<api::Result<Vec<DataPoint>>>>,
    events: Listeners<PlotEvent>,
}

impl ScatterPlot {
    pub fn new(
        panes: &mut Panes,
        mount: &str,
        source: Arc<dyn DataSource>,
        config: ScatterPlotConfig,
    ) -> Result<Self, UiError> {
        panes.claim(mount, "scatter-plot")?;
        let x_domain = gdp_domain(&[]);
        let y_domain = co2_domain(&[]);
        let mut plot = ScatterPlot {
            mount: mount.to_string(),
            mounted: true,
            source,
            inner_width: 0,
            inner_height: 0,
            data: Vec::new(),
            available_years: Vec::new(),
            current_year: None,
            selected: HashSet::new(),
            color_order: Vec::new(),
            x_domain,
            y_domain,
            transition: Transition {
                from_x: x_domain,
                to_x: x_domain,
                from_y: y_domain,
                to_y: y_domain,
                duration: config.animation_duration,
                ..Default::default()
            },
            clock: PlaybackClock::new(),
            tooltip: None,
            load_state: LoadState::Idle,
            pending: None,
            events: Listeners::new(),
            config,
        };
        plot.update_dimensions();
        Ok(plot)
    }

    pub fn events_mut(&mut self) -> &mut Listeners<PlotEvent> {
        &mut self.events
    }

    #[allow(dead_code)] // Used in tests
    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    #[allow(dead_code)] // Used in tests
    pub fn data(&self) -> &[DataPoint] {
        &self.data
    }

    #[allow(dead_code)] // Used in tests
    pub fn available_years(&self) -> &[i32] {
        &self.available_years
    }

    pub fn current_year(&self) -> Option<i32> {
        self.current_year
    }

    #[allow(dead_code)] // Used in tests
    pub fn x_domain(&self) -> (f64, f64) {
        self.x_domain
    }

    #[allow(dead_code)] // Used in tests
    pub fn y_domain(&self) -> (f64, f64) {
        self.y_domain
    }

    #[allow(dead_code)] // Used in tests
    pub fn inner_size(&self) -> (u16, u16) {
        (self.inner_width, self.inner_height)
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_running()
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    #[allow(dead_code)] // Used in tests
    pub fn tooltip(&self) -> Option<&Tooltip> {
        self.tooltip.as_ref()
    }

    /// Palette order for point colors; codes not listed share the last slot
    pub fn set_color_order(&mut self, codes: Vec<String>) {
        self.color_order = codes;
    }

    /// Fetch combined data in the background
    pub fn load_data(
        &mut self,
        countries: Option<Vec<String>>,
        start_year: Option<i32>,
        end_year: Option<i32>,
    ) {
        if !self.mounted {
            return;
        }
        let params = QueryParams {
            countries: countries.map(CountryFilter::List),
            start_year,
            end_year,
        };
        self.load_state = LoadState::Loading;
        let source = Arc::clone(&self.source);
        self.pending = Some(Pending::spawn("plot-loader", move || {
            source
                .combined_data(&params)
                .map(|combined| combined.join_indicators())
        }));
    }

    /// Apply a finished load, if any. Returns true when state changed.
    pub fn poll(&mut self) -> bool {
        let Some(pending) = &self.pending else {
            return false;
        };
        let result = match pending.poll() {
            Poll::Ready(result) => result,
            Poll::NotReady => return false,
            Poll::Lost => Err(api::ApiError::Network(
                "data loader stopped unexpectedly".to_string(),
            )),
        };
        self.pending = None;
        self.apply_load(result, Instant::now());
        true
    }

    /// Block until the in-flight load completes or `timeout` passes
    #[allow(dead_code)] // Used in tests
    pub fn wait_for_load(&mut self, timeout: Duration) -> bool {
        let Some(pending) = &self.pending else {
            return false;
        };
        let result = match pending.wait(timeout) {
            Poll::Ready(result) => result,
            Poll::NotReady => return false,
            Poll::Lost => Err(api::ApiError::Network(
                "data loader stopped unexpectedly".to_string(),
            )),
        };
        self.pending = None;
        self.apply_load(result, Instant::now());
        true
    }

    fn apply_load(&mut self, result: api::Result<Vec<DataPoint>>, now: Instant) {
        match result {
            Ok(points) => {
                info!("Loaded {} data points", points.len());
                self.available_years = unique_years(&points);
                self.x_domain = gdp_domain(&points);
                self.y_domain = co2_domain(&points);
                self.data = points;
                self.load_state = LoadState::Loaded;

                let keep = self
                    .current_year
                    .filter(|y| self.available_years.contains(y));
                self.current_year = keep.or_else(|| self.available_years.first().copied());

                if let (Some(&start), Some(&end)) =
                    (self.available_years.first(), self.available_years.last())
                {
                    self.events.emit(&PlotEvent::DataLoaded { start, end });
                }
                self.render_at(now);
            }
            Err(e) => {
                let message = e.to_string();
                error!("Failed to load plot data: {message}");
                self.load_state = LoadState::Failed(message.clone());
                self.events.emit(&PlotEvent::LoadFailed(message));
            }
        }
    }

    /// Points for the current year passing the country filter
    pub fn visible_points(&self) -> Vec<&DataPoint> {
        let Some(year) = self.current_year else {
            return Vec::new();
        };
        self.data
            .iter()
            .filter(|p| p.year == year)
            .filter(|p| self.selected.is_empty() || self.selected.contains(&p.country_code))
            .collect()
    }

    pub fn render(&mut self) {
        self.render_at(Instant::now());
    }

    /// Start a transition from whatever is on screen at `now` to the
    /// current year and selection. No-op without a current year.
    pub fn render_at(&mut self, now: Instant) {
        if self.current_year.is_none() {
            return;
        }

        let t = self.transition.progress(now);
        let (from_x, from_y) = self.transition.domains(now);
        let on_screen: Vec<(AnimatedPoint, (f64, f64, f64))> = self
            .transition
            .points
            .iter()
            .filter(|p| !(p.is_exiting() && t >= 1.0))
            .map(|p| (p.clone(), p.at(t)))
            .collect();

        let mut points = Vec::new();
        let mut kept: HashSet<String> = HashSet::new();

        for datum in self.visible_points() {
            let target = (datum.gdp_per_capita, datum.co2_per_capita);
            let previous = on_screen
                .iter()
                .find(|(p, _)| p.datum.country_code == datum.country_code);
            let (from, from_opacity) = match previous {
                Some((_, (x, y, opacity))) => ((*x, *y), *opacity),
                // Entering points appear in place and fade in
                None => (target, 0.0),
            };
            kept.insert(datum.country_code.clone());
            points.push(AnimatedPoint {
                datum: datum.clone(),
                from,
                to: target,
                from_opacity,
                to_opacity: 1.0,
            });
        }

        for (previous, (x, y, opacity)) in on_screen {
            if kept.contains(&previous.datum.country_code) {
                continue;
            }
            points.push(AnimatedPoint {
                datum: previous.datum,
                from: (x, y),
                to: (x, y),
                from_opacity: opacity,
                to_opacity: 0.0,
            });
        }

        self.transition = Transition {
            points,
            from_x,
            to_x: self.x_domain,
            from_y,
            to_y: self.y_domain,
            started: Some(now),
            duration: self.config.animation_duration,
        };
    }

    /// Points and domains as they should be drawn at `now`
    pub fn sample(&self, now: Instant) -> (Vec<SampledPoint>, (f64, f64), (f64, f64)) {
        let (x, y) = self.transition.domains(now);
        (self.transition.sample(now), x, y)
    }

    /// Move to `year` if it is one of the loaded years
    pub fn set_year(&mut self, year: i32) {
        if !self.available_years.contains(&year) {
            return;
        }
        self.current_year = Some(year);
        self.tooltip = None;
        self.render();
        self.events.emit(&PlotEvent::YearChanged(year));
    }

    /// Replace the country filter; an empty set shows every country
    pub fn set_selected_countries<S: AsRef<str>>(&mut self, codes: &[S]) {
        self.selected = codes.iter().map(|c| c.as_ref().to_string()).collect();
        self.tooltip = None;
        self.render();
    }

    fn play_period(&self) -> Duration {
        self.config.animation_duration + PLAY_GAP
    }

    pub fn play(&mut self) {
        self.play_at(Instant::now());
    }

    pub fn play_at(&mut self, now: Instant) {
        if self.is_playing() || self.available_years.is_empty() {
            return;
        }
        if self.current_year.is_none() {
            self.current_year = self.available_years.first().copied();
        }
        self.clock.start(now, self.play_period());
    }

    pub fn stop(&mut self) {
        self.clock.stop();
    }

    /// Advance the plot's own playback and finish transitions
    pub fn tick(&mut self, now: Instant) {
        let ticks = self.clock.due_ticks(now);
        for _ in 0..ticks {
            if !self.is_playing() {
                break;
            }
            let current = self.current_year.unwrap_or_default();
            match advance_index(&self.available_years, current) {
                Step::Advance(year) => {
                    self.current_year = Some(year);
                    self.tooltip = None;
                    self.render_at(now);
                    self.events.emit(&PlotEvent::YearChanged(year));
                }
                Step::Wrapped => self.stop(),
            }
        }
        self.transition.prune(now);
    }

    /// Change the outer size in cells and redraw
    pub fn resize(&mut self, width: u16, height: u16) {
        self.config.width = width;
        self.config.height = height;
        self.update_dimensions();
        self.render();
    }

    fn update_dimensions(&mut self) {
        let m = self.config.margin;
        self.inner_width = self.config.width.saturating_sub(m.left + m.right);
        self.inner_height = self.config.height.saturating_sub(m.top + m.bottom);
    }

    /// Plotting rectangle inside the pane, excluding border and margins
    fn plot_rect(&self, panes: &Panes) -> Option<Rect> {
        let area = panes.area(&self.mount)?;
        let inner = Block::default().borders(Borders::ALL).inner(area);
        let m = self.config.margin;
        let width = inner
            .width
            .saturating_sub(m.left + m.right)
            .min(self.inner_width);
        let height = inner
            .height
            .saturating_sub(m.top + m.bottom)
            .min(self.inner_height);
        if width < 2 || height < 2 {
            return None;
        }
        Some(Rect::new(inner.x + m.left, inner.y + m.top, width, height))
    }

    /// Show the tooltip for the point nearest to a terminal cell
    pub fn hover(&mut self, panes: &Panes, column: u16, row: u16) -> Option<&Tooltip> {
        self.tooltip = self.hit_test(panes, column, row, Instant::now()).map(|(datum, cell)| {
            Tooltip {
                country_code: datum.country_code.clone(),
                lines: vec![
                    datum.country.clone(),
                    format!("Year: {}", datum.year),
                    format!("GDP per capita: {}", format_currency(datum.gdp_per_capita)),
                    format!("CO2 per capita: {:.2} tons", datum.co2_per_capita),
                ],
                anchor: cell,
            }
        });
        self.tooltip.as_ref()
    }

    /// Hide the tooltip
    pub fn leave(&mut self) {
        self.tooltip = None;
    }

    /// Publish a click on the point under a terminal cell
    pub fn click(&mut self, panes: &Panes, column: u16, row: u16) -> Option<String> {
        let code = self
            .hit_test(panes, column, row, Instant::now())
            .map(|(datum, _)| datum.country_code.clone())?;
        self.events.emit(&PlotEvent::CountryClicked(code.clone()));
        Some(code)
    }

    /// Cell where a country's point currently sits
    #[allow(dead_code)] // Used in tests
    pub fn point_cell(&self, panes: &Panes, country_code: &str, now: Instant) -> Option<(u16, u16)> {
        let rect = self.plot_rect(panes)?;
        let (points, x_domain, y_domain) = self.sample(now);
        points
            .iter()
            .find(|p| p.country_code == country_code)
            .map(|p| to_cell(rect, x_domain, y_domain, p.x, p.y))
    }

    fn hit_test(
        &self,
        panes: &Panes,
        column: u16,
        row: u16,
        now: Instant,
    ) -> Option<(&DataPoint, (u16, u16))> {
        let rect = self.plot_rect(panes)?;
        let (points, x_domain, y_domain) = self.sample(now);

        let mut best: Option<(f64, &SampledPoint, (u16, u16))> = None;
        for point in points.iter().filter(|p| p.opacity > 0.0) {
            let cell = to_cell(rect, x_domain, y_domain, point.x, point.y);
            let dx = f64::from(cell.0) - f64::from(column);
            let dy = f64::from(cell.1) - f64::from(row);
            let distance = (dx * dx + dy * dy).sqrt();
            if distance <= HOVER_RADIUS && best.map(|(d, _, _)| distance < d).unwrap_or(true) {
                best = Some((distance, point, cell));
            }
        }

        let (_, point, cell) = best?;
        let year = self.current_year?;
        self.data
            .iter()
            .find(|d| d.year == year && d.country_code == point.country_code)
            .map(|d| (d, cell))
    }

    /// Stop animation, drop the tooltip and data, and vacate the pane
    pub fn destroy(&mut self, panes: &mut Panes) {
        self.stop();
        self.tooltip = None;
        self.pending = None;
        self.events.clear();
        if self.mounted {
            panes.release(&self.mount);
            self.mounted = false;
        }
        self.data.clear();
        self.available_years.clear();
        self.current_year = None;
        self.selected.clear();
        self.color_order.clear();
        self.transition.points.clear();
        self.load_state = LoadState::Idle;
    }

    fn color_for(&self, theme: &Theme, code: &str) -> Color {
        let index = self
            .color_order
            .iter()
            .position(|c| c == code)
            .unwrap_or(self.color_order.len());
        theme.country_color(index)
    }

    pub fn draw(&self, frame: &mut Frame, panes: &Panes, theme: &Theme, focused: bool) {
        if !self.mounted {
            return;
        }
        let Some(area) = panes.area(&self.mount) else {
            return;
        };

        let (border_style, title_style) = theme.panel_styles(focused);
        let title = match self.current_year {
            Some(year) => format!(" CO2 vs GDP per capita · {year} "),
            None => " CO2 vs GDP per capita ".to_string(),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style)
            .title_style(title_style);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let message = match &self.load_state {
            LoadState::Idle | LoadState::Loading => Some(Paragraph::new("Loading data…").style(theme.muted_style())),
            LoadState::Failed(message) => Some(Paragraph::new(vec![
                Line::styled("Error loading data", theme.error_style()),
                Line::from(message.as_str()),
            ])),
            LoadState::Loaded if self.data.is_empty() => {
                Some(Paragraph::new("No data available").style(theme.muted_style()))
            }
            LoadState::Loaded => None,
        };
        if let Some(message) = message {
            frame.render_widget(message.alignment(Alignment::Center), inner);
            return;
        }

        let Some(rect) = self.plot_rect(panes) else {
            return;
        };

        let now = Instant::now();
        let (points, x_domain, y_domain) = self.sample(now);
        let plotted: Vec<PlottedPoint> = points
            .iter()
            .map(|p| PlottedPoint {
                cell: to_cell(rect, x_domain, y_domain, p.x, p.y),
                color: self.color_for(theme, &p.country_code),
                opacity: p.opacity,
                highlighted: self
                    .tooltip
                    .as_ref()
                    .map(|t| t.country_code == p.country_code)
                    .unwrap_or(false),
            })
            .collect();

        frame.render_widget(
            PlotCanvas {
                plot: rect,
                x_domain,
                y_domain,
                points: &plotted,
                year: self.current_year,
                axis_style: theme.border_style(),
                label_style: theme.muted_style(),
            },
            inner,
        );

        if let Some(tooltip) = &self.tooltip {
            draw_tooltip(frame, inner, tooltip, theme);
        }
    }
}

/// Map data coordinates to a cell inside `rect`; x is logarithmic
fn to_cell(rect: Rect, x_domain: (f64, f64), y_domain: (f64, f64), x: f64, y: f64) -> (u16, u16) {
    let lx0 = x_domain.0.max(f64::MIN_POSITIVE).log10();
    let lx1 = x_domain.1.max(f64::MIN_POSITIVE).log10();
    let lx = x.max(f64::MIN_POSITIVE).log10();
    let fx = if lx1 > lx0 { (lx - lx0) / (lx1 - lx0) } else { 0.0 };
    let fy = if y_domain.1 > y_domain.0 {
        (y - y_domain.0) / (y_domain.1 - y_domain.0)
    } else {
        0.0
    };
    let col = rect.x + (fx.clamp(0.0, 1.0) * f64::from(rect.width - 1)).round() as u16;
    let row = rect.y + ((1.0 - fy.clamp(0.0, 1.0)) * f64::from(rect.height - 1)).round() as u16;
    (col, row)
}

struct PlottedPoint {
    cell: (u16, u16),
    color: Color,
    opacity: f64,
    highlighted: bool,
}

/// Axes, tick labels and points for one frame
struct PlotCanvas<'a> {
    plot: Rect,
    x_domain: (f64, f64),
    y_domain: (f64, f64),
    points: &'a [PlottedPoint],
    year: Option<i32>,
    axis_style: Style,
    label_style: Style,
}

impl Widget for PlotCanvas<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let plot = self.plot;
        let axis_col = plot.x.saturating_sub(1);
        let axis_row = plot.y + plot.height;
        let within = |x: u16, y: u16| {
            x >= area.x && x < area.x + area.width && y >= area.y && y < area.y + area.height
        };

        // Axis lines
        for row in plot.y..axis_row {
            if within(axis_col, row) {
                buf.set_string(axis_col, row, "│", self.axis_style);
            }
        }
        if within(axis_col, axis_row) {
            buf.set_string(axis_col, axis_row, "└", self.axis_style);
        }
        for col in plot.x..plot.x + plot.width {
            if within(col, axis_row) {
                buf.set_string(col, axis_row, "─", self.axis_style);
            }
        }

        // Y labels: top, middle, bottom, right-aligned against the axis
        let label_width = usize::from(axis_col.saturating_sub(area.x));
        let (y0, y1) = self.y_domain;
        for (row, value) in [
            (plot.y, y1),
            (plot.y + (plot.height - 1) / 2, (y0 + y1) / 2.0),
            (plot.y + plot.height - 1, y0),
        ] {
            let text = format!("{:>label_width$}", format_axis_value(value));
            if within(area.x, row) && label_width > 0 {
                buf.set_stringn(area.x, row, text, label_width, self.label_style);
            }
        }

        // X labels on the log scale: low, geometric middle, high
        let label_row = axis_row + 1;
        if within(plot.x, label_row) {
            let (x0, x1) = self.x_domain;
            let low = format_axis_value(x0);
            let mid = format_axis_value((x0 * x1).sqrt());
            let high = format_axis_value(x1);
            buf.set_string(plot.x, label_row, &low, self.label_style);
            let mid_col = (plot.x + plot.width / 2).saturating_sub(mid.len() as u16 / 2);
            buf.set_string(mid_col, label_row, &mid, self.label_style);
            let high_col = (plot.x + plot.width).saturating_sub(high.len() as u16);
            buf.set_string(high_col, label_row, &high, self.label_style);
        }

        // Year watermark in the top-right corner
        if let Some(year) = self.year {
            let text = year.to_string();
            let col = (plot.x + plot.width).saturating_sub(text.len() as u16 + 1);
            if within(col, plot.y) {
                buf.set_string(
                    col,
                    plot.y,
                    &text,
                    self.label_style.add_modifier(Modifier::BOLD),
                );
            }
        }

        for point in self.points {
            let (col, row) = point.cell;
            if !within(col, row) {
                continue;
            }
            let mut style = Style::default().fg(point.color);
            let symbol = if point.opacity >= 0.5 { "●" } else { "·" };
            if point.opacity < 0.5 {
                style = style.add_modifier(Modifier::DIM);
            }
            if point.highlighted {
                style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
            }
            buf.set_string(col, row, symbol, style);
        }
    }
}

fn draw_tooltip(frame: &mut Frame, bounds: Rect, tooltip: &Tooltip, theme: &Theme) {
    let width = tooltip
        .lines
        .iter()
        .map(|l| l.chars().count() as u16)
        .max()
        .unwrap_or(0)
        + 2;
    let height = tooltip.lines.len() as u16 + 2;
    if width > bounds.width || height > bounds.height {
        return;
    }

    let (col, row) = tooltip.anchor;
    let right = bounds.x + bounds.width;
    let bottom = bounds.y + bounds.height;
    let x = if col + 2 + width <= right {
        col + 2
    } else {
        col.saturating_sub(width + 1).max(bounds.x)
    };
    let y = row.min(bottom - height).max(bounds.y);
    let area = Rect::new(x, y, width, height);

    let lines: Vec<Line> = tooltip
        .lines
        .iter()
        .enumerate()
        .map(|(i, l)| {
            if i == 0 {
                Line::styled(l.as_str(), theme.title_style())
            } else {
                Line::from(l.as_str())
            }
        })
        .collect();

    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_style())
                .style(theme.surface_style()),
        ),
        area,
    );
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use ratatui::{backend::TestBackend, Terminal};

    use super::*;
    use crate::data::testing::StaticSource;
    use crate::data::CombinedData;
    use crate::ui::mount::PLOT_PANE;

    const WAIT: Duration = Duration::from_secs(5);

    fn combined() -> CombinedData {
        serde_json::from_value(serde_json::json!({
            "data": {
                "co2_data": {
                    "USA": {"2000": 20.0, "2001": 19.0, "2002": 18.0},
                    "CHN": {"2000": 2.5, "2001": 3.0, "2002": 3.5},
                    "IND": {"2001": 1.0}
                },
                "gdp_data": {
                    "USA": {"2000": 36000.0, "2001": 37000.0, "2002": 38000.0},
                    "CHN": {"2000": 1000.0, "2001": 1100.0, "2002": 1200.0},
                    "IND": {"2001": 450.0}
                }
            },
            "metadata": {
                "countries": {
                    "USA": {"name": "United States"},
                    "CHN": {"name": "China"},
                    "IND": {"name": "India"}
                }
            }
        }))
        .unwrap()
    }

    fn config() -> ScatterPlotConfig {
        ScatterPlotConfig {
            animation_duration: Duration::from_millis(200),
            ..Default::default()
        }
    }

    fn loaded() -> (Panes, ScatterPlot) {
        let mut panes = Panes::dashboard();
        panes.layout_dashboard(Rect::new(0, 0, 120, 40));
        let source = Arc::new(StaticSource::with_combined(combined()));
        let mut plot = ScatterPlot::new(&mut panes, PLOT_PANE, source, config()).unwrap();
        plot.load_data(None, Some(2000), Some(2002));
        assert!(plot.wait_for_load(WAIT));
        (panes, plot)
    }

    fn record(plot: &mut ScatterPlot) -> Rc<RefCell<Vec<PlotEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        plot.events_mut()
            .subscribe(move |e| sink.borrow_mut().push(e.clone()));
        seen
    }

    #[test]
    fn test_missing_mount_fails() {
        let mut panes = Panes::new();
        let source = Arc::new(StaticSource::default());
        assert!(ScatterPlot::new(&mut panes, PLOT_PANE, source, config()).is_err());
    }

    #[test]
    fn test_load_derives_years_and_domains() {
        let (_, plot) = loaded();
        assert_eq!(plot.load_state(), &LoadState::Loaded);
        assert_eq!(plot.data().len(), 7);
        assert_eq!(plot.available_years(), &[2000, 2001, 2002]);
        assert_eq!(plot.current_year(), Some(2000));

        let (x0, x1) = plot.x_domain();
        assert_eq!(x0, 450.0 * 0.8);
        assert_eq!(x1, 38000.0 * 1.2);
        let (y0, y1) = plot.y_domain();
        assert_eq!(y0, 0.0);
        assert!((y1 - 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_gdp_domain_floor() {
        let points = vec![DataPoint {
            country: "Burundi".to_string(),
            country_code: "BDI".to_string(),
            year: 2000,
            co2_per_capita: 0.05,
            gdp_per_capita: 110.0,
        }];
        assert_eq!(gdp_domain(&points).0, 100.0);
    }

    #[test]
    fn test_load_announces_year_span() {
        let mut panes = Panes::dashboard();
        let source = Arc::new(StaticSource::with_combined(combined()));
        let mut plot = ScatterPlot::new(&mut panes, PLOT_PANE, source, config()).unwrap();
        let seen = record(&mut plot);
        plot.load_data(Some(vec!["USA".to_string()]), None, None);
        assert!(plot.wait_for_load(WAIT));
        assert_eq!(
            seen.borrow()[0],
            PlotEvent::DataLoaded {
                start: 2000,
                end: 2002
            }
        );
    }

    #[test]
    fn test_load_failure_renders_inline() {
        let mut panes = Panes::dashboard();
        panes.layout_dashboard(Rect::new(0, 0, 120, 40));
        let source = Arc::new(StaticSource::failing("timed out"));
        let mut plot = ScatterPlot::new(&mut panes, PLOT_PANE, source, config()).unwrap();
        let seen = record(&mut plot);
        plot.load_data(None, None, None);
        assert!(plot.wait_for_load(WAIT));

        assert!(matches!(plot.load_state(), LoadState::Failed(m) if m.contains("timed out")));
        assert!(matches!(&seen.borrow()[0], PlotEvent::LoadFailed(_)));

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal
            .draw(|f| plot.draw(f, &panes, &Theme::default(), false))
            .unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("Error loading data"));
    }

    #[test]
    fn test_render_without_year_is_noop() {
        let mut panes = Panes::dashboard();
        let source = Arc::new(StaticSource::default());
        let mut plot = ScatterPlot::new(&mut panes, PLOT_PANE, source, config()).unwrap();
        plot.render();
        let (points, _, _) = plot.sample(Instant::now());
        assert!(points.is_empty());
    }

    #[test]
    fn test_visible_points_follow_year_and_selection() {
        let (_, mut plot) = loaded();
        assert_eq!(plot.visible_points().len(), 2);

        plot.set_year(2001);
        assert_eq!(plot.visible_points().len(), 3);

        plot.set_selected_countries(&["IND"]);
        let visible = plot.visible_points();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].country, "India");

        plot.set_selected_countries::<&str>(&[]);
        assert_eq!(plot.visible_points().len(), 3);
    }

    #[test]
    fn test_set_year_only_accepts_loaded_years() {
        let (_, mut plot) = loaded();
        let seen = record(&mut plot);
        plot.set_year(1999);
        plot.set_year(2003);
        assert_eq!(plot.current_year(), Some(2000));
        assert!(seen.borrow().is_empty());

        plot.set_year(2002);
        assert_eq!(plot.current_year(), Some(2002));
        assert_eq!(*seen.borrow(), vec![PlotEvent::YearChanged(2002)]);
    }

    #[test]
    fn test_transition_enter_update_exit() {
        let (_, mut plot) = loaded();
        let t0 = Instant::now();
        plot.render_at(t0);
        let settled = t0 + Duration::from_secs(1);

        // 2000 -> 2001: USA and CHN move, IND enters
        plot.current_year = Some(2001);
        plot.render_at(settled);
        let (mid, _, _) = plot.sample(settled + Duration::from_millis(100));
        let ind = mid.iter().find(|p| p.country_code == "IND").unwrap();
        assert!(ind.opacity > 0.0 && ind.opacity < 1.0);
        assert_eq!((ind.x, ind.y), (450.0, 1.0));
        let usa = mid.iter().find(|p| p.country_code == "USA").unwrap();
        assert!(usa.x > 36000.0 && usa.x < 37000.0);
        assert_eq!(usa.opacity, 1.0);

        // 2001 -> 2002: IND exits
        let later = settled + Duration::from_secs(1);
        plot.current_year = Some(2002);
        plot.render_at(later);
        let (mid, _, _) = plot.sample(later + Duration::from_millis(100));
        let ind = mid.iter().find(|p| p.country_code == "IND").unwrap();
        assert!(ind.opacity < 1.0);

        let done = later + Duration::from_secs(1);
        plot.tick(done);
        let (end, _, _) = plot.sample(done);
        assert_eq!(end.len(), 2);
        assert!(end.iter().all(|p| p.opacity == 1.0));
    }

    #[test]
    fn test_play_cycles_once_then_stops() {
        let (_, mut plot) = loaded();
        let seen = record(&mut plot);
        let period = Duration::from_millis(300);
        let t0 = Instant::now();
        plot.play_at(t0);
        assert!(plot.is_playing());

        plot.tick(t0 + period);
        assert_eq!(plot.current_year(), Some(2001));
        plot.tick(t0 + period * 2);
        assert_eq!(plot.current_year(), Some(2002));
        plot.tick(t0 + period * 3);
        assert!(!plot.is_playing());
        assert_eq!(plot.current_year(), Some(2002));

        assert_eq!(
            *seen.borrow(),
            vec![PlotEvent::YearChanged(2001), PlotEvent::YearChanged(2002)]
        );
    }

    #[test]
    fn test_hover_shows_formatted_tooltip_and_click_selects() {
        let (panes, mut plot) = loaded();
        plot.render_at(Instant::now() - Duration::from_secs(5));
        let seen = record(&mut plot);

        let (col, row) = plot.point_cell(&panes, "USA", Instant::now()).unwrap();
        let tooltip = plot.hover(&panes, col, row).unwrap().clone();
        assert_eq!(tooltip.country_code, "USA");
        assert_eq!(
            tooltip.lines,
            vec![
                "United States".to_string(),
                "Year: 2000".to_string(),
                "GDP per capita: $36,000".to_string(),
                "CO2 per capita: 20.00 tons".to_string(),
            ]
        );

        plot.leave();
        assert!(plot.tooltip().is_none());

        assert_eq!(plot.click(&panes, col, row), Some("USA".to_string()));
        assert_eq!(
            *seen.borrow(),
            vec![PlotEvent::CountryClicked("USA".to_string())]
        );
    }

    #[test]
    fn test_hover_far_from_points_hides_tooltip() {
        let (panes, mut plot) = loaded();
        plot.render_at(Instant::now() - Duration::from_secs(5));
        assert!(plot.hover(&panes, 0, 0).is_none());
    }

    #[test]
    fn test_resize_updates_inner_size() {
        let (_, mut plot) = loaded();
        plot.resize(100, 30);
        assert_eq!(plot.inner_size(), (88, 27));
        plot.resize(5, 2);
        assert_eq!(plot.inner_size(), (0, 0));
    }

    #[test]
    fn test_destroy_clears_everything() {
        let (mut panes, mut plot) = loaded();
        plot.play();
        plot.destroy(&mut panes);

        assert!(panes.is_vacant(PLOT_PANE));
        assert!(!plot.is_playing());
        assert!(plot.data().is_empty());
        assert!(plot.available_years().is_empty());
        assert!(plot.current_year().is_none());
        assert!(plot.tooltip().is_none());
    }

    #[test]
    fn test_late_load_after_destroy_is_dropped() {
        let mut panes = Panes::dashboard();
        let source = Arc::new(StaticSource::with_combined(combined()));
        let mut plot = ScatterPlot::new(&mut panes, PLOT_PANE, source, config()).unwrap();
        plot.load_data(None, None, None);
        plot.destroy(&mut panes);
        assert!(!plot.wait_for_load(WAIT));
        assert!(plot.data().is_empty());
    }

    #[test]
    fn test_draw_plots_points() {
        let (panes, mut plot) = loaded();
        plot.render_at(Instant::now() - Duration::from_secs(5));
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal
            .draw(|f| plot.draw(f, &panes, &Theme::default(), true))
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        let dots = buffer.content().iter().filter(|c| c.symbol() == "●").count();
        assert_eq!(dots, 2);
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("2000"));
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0");
        assert_eq!(format_currency(999.4), "$999");
        assert_eq!(format_currency(1234.5), "$1,235");
        assert_eq!(format_currency(63593.44), "$63,593");
        assert_eq!(format_currency(1_234_567.0), "$1,234,567");
    }
}
