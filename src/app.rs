//! Main application logic and TUI event loop.

use std::io;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    Terminal,
};

use crate::api::{ApiClient, QueryParams};
use crate::cli::AppConfig;
use crate::data::{DataSource, SnapshotSource, Storage};
use crate::ui::{
    widgets::StatusBar, CountrySelector, HelpOverlay, Panes, PlotEvent, ScatterPlot,
    ScatterPlotConfig, SelectionEvent, Theme, TimeControl, TimeControlConfig, TimeEvent,
    COUNTRIES_PANE, PLOT_PANE, TIMELINE_PANE,
};

/// Input poll timeout; also the animation frame interval
const FRAME_INTERVAL: Duration = Duration::from_millis(50);

/// Which panel is currently focused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusedPanel {
    Countries,
    Plot,
    Timeline,
}

impl FocusedPanel {
    fn next(self) -> Self {
        match self {
            FocusedPanel::Countries => FocusedPanel::Plot,
            FocusedPanel::Plot => FocusedPanel::Timeline,
            FocusedPanel::Timeline => FocusedPanel::Countries,
        }
    }

    fn prev(self) -> Self {
        match self {
            FocusedPanel::Countries => FocusedPanel::Timeline,
            FocusedPanel::Plot => FocusedPanel::Countries,
            FocusedPanel::Timeline => FocusedPanel::Plot,
        }
    }

    fn for_pane(pane: &str) -> Option<Self> {
        match pane {
            COUNTRIES_PANE => Some(FocusedPanel::Countries),
            PLOT_PANE => Some(FocusedPanel::Plot),
            TIMELINE_PANE => Some(FocusedPanel::Timeline),
            _ => None,
        }
    }
}

/// Component events funneled into one queue
#[derive(Debug, Clone)]
enum DashboardEvent {
    Selection(SelectionEvent),
    Time(TimeEvent),
    Plot(PlotEvent),
}

/// Application state
pub struct App {
    config: AppConfig,
    theme: Theme,
    source_label: String,

    // Components and the panes they are mounted in
    panes: Panes,
    selector: CountrySelector,
    time: TimeControl,
    plot: ScatterPlot,
    events: Receiver<DashboardEvent>,

    /// Codes from `--countries`, applied once the country list arrives
    preselect: Option<Vec<String>>,

    // UI State
    focused: FocusedPanel,
    show_help: bool,
    status_area: Rect,
    plot_size: (u16, u16),

    // Exit flag
    should_quit: bool,

    // Error message to display (non-fatal)
    error_message: Option<String>,
}

impl App {
    /// Mount the three components and start the initial loads
    pub fn new(config: AppConfig, source: Arc<dyn DataSource>) -> Result<Self> {
        let mut panes = Panes::dashboard();

        let mut selector = CountrySelector::new(&mut panes, COUNTRIES_PANE, Arc::clone(&source))
            .context("Failed to mount country selector")?;
        let mut time = TimeControl::new(
            &mut panes,
            TIMELINE_PANE,
            TimeControlConfig {
                start_year: config.start_year,
                end_year: config.end_year,
                animation_speed: config.animation_speed,
                ..Default::default()
            },
        )
        .context("Failed to mount time control")?;
        // Scrubbing waits for data
        time.set_enabled(false);
        let source_label = source.describe();
        let mut plot = ScatterPlot::new(
            &mut panes,
            PLOT_PANE,
            source,
            ScatterPlotConfig {
                animation_duration: config.animation_duration,
                ..Default::default()
            },
        )
        .context("Failed to mount scatter plot")?;

        let (tx, rx) = mpsc::channel();
        selector
            .events_mut()
            .forward(tx.clone(), DashboardEvent::Selection);
        time.events_mut().forward(tx.clone(), DashboardEvent::Time);
        plot.events_mut().forward(tx, DashboardEvent::Plot);

        let mut app = App {
            preselect: config.countries.clone(),
            config,
            theme: Theme::default(),
            source_label,
            panes,
            selector,
            time,
            plot,
            events: rx,
            focused: FocusedPanel::Countries,
            show_help: false,
            status_area: Rect::default(),
            plot_size: (0, 0),
            should_quit: false,
            error_message: None,
        };
        app.load_plot();
        Ok(app)
    }

    fn load_plot(&mut self) {
        self.plot.load_data(
            self.config.countries.clone(),
            Some(self.config.start_year),
            Some(self.config.end_year),
        );
    }

    /// Reload both the country list and the plot data
    fn refresh(&mut self) {
        info!("Reloading data from {}", self.source_label);
        self.error_message = None;
        self.selector.refresh();
        self.load_plot();
    }

    /// Set an error message to display (non-fatal)
    pub fn set_error(&mut self, message: String) {
        self.error_message = Some(message);
    }

    /// Recompute pane areas for the terminal size
    fn layout(&mut self, size: Rect) {
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(3),    // Body
                Constraint::Length(2), // Status bar
            ])
            .split(size);

        self.panes.layout_dashboard(main_chunks[0]);
        self.status_area = main_chunks[1];

        if let Some(area) = self.panes.area(PLOT_PANE) {
            let plot_size = (area.width, area.height);
            if plot_size != self.plot_size {
                self.plot_size = plot_size;
                self.plot.resize(area.width, area.height);
            }
        }
    }

    /// Apply finished loads, advance timers, then route component events
    fn update(&mut self, now: Instant) {
        self.selector.poll();
        self.plot.poll();
        self.time.tick(now);
        self.plot.tick(now);
        self.process_events();
    }

    /// Drain the event queue, including events raised while handling it
    fn process_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                DashboardEvent::Time(TimeEvent::YearChanged(year)) => self.plot.set_year(year),
                DashboardEvent::Time(_) => {}
                DashboardEvent::Plot(PlotEvent::YearChanged(year)) => {
                    self.time.set_year(year, false)
                }
                DashboardEvent::Plot(PlotEvent::CountryClicked(code)) => {
                    self.selector.toggle_country(&code)
                }
                DashboardEvent::Plot(PlotEvent::DataLoaded { start, end }) => {
                    self.time.set_year_range(start, end, None);
                    self.time.set_enabled(true);
                    if let Some(year) = self.plot.current_year() {
                        self.time.set_year(year, false);
                    }
                }
                DashboardEvent::Plot(PlotEvent::LoadFailed(message)) => {
                    self.set_error(format!("Data: {message}"))
                }
                DashboardEvent::Selection(SelectionEvent::Changed { codes, .. }) => {
                    self.plot.set_selected_countries(&codes)
                }
                DashboardEvent::Selection(SelectionEvent::CountriesLoaded(countries)) => {
                    self.plot
                        .set_color_order(countries.iter().map(|c| c.code.clone()).collect());
                    if let Some(codes) = self.preselect.take() {
                        self.selector.set_selected_countries(&codes);
                    }
                }
                DashboardEvent::Selection(SelectionEvent::LoadFailed(message)) => {
                    self.set_error(format!("Countries: {message}"))
                }
            }
        }
    }

    /// Handle keyboard input
    fn handle_input(&mut self, key: KeyEvent) {
        // An open country list captures typing, including global letters
        if self.focused == FocusedPanel::Countries
            && self.selector.is_open()
            && !self.show_help
            && self.selector.handle_key(key)
        {
            return;
        }

        // Global shortcuts
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return;
            }
            KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::F(1) => {
                self.show_help = !self.show_help;
                return;
            }
            KeyCode::Esc if self.show_help => {
                self.show_help = false;
                return;
            }
            KeyCode::Char('r') => {
                self.refresh();
                return;
            }
            KeyCode::Tab => {
                self.focused = self.focused.next();
                return;
            }
            KeyCode::BackTab => {
                self.focused = self.focused.prev();
                return;
            }
            _ => {}
        }

        // If help is shown, don't process other keys
        if self.show_help {
            return;
        }

        if key.code == KeyCode::Char('p') {
            self.toggle_plot_playback();
            return;
        }

        match self.focused {
            FocusedPanel::Countries => {
                self.selector.handle_key(key);
            }
            FocusedPanel::Timeline => {
                self.time.handle_key(key.code);
            }
            FocusedPanel::Plot => {
                if key.code == KeyCode::Char(' ') {
                    self.toggle_plot_playback();
                }
            }
        }
    }

    fn toggle_plot_playback(&mut self) {
        if self.plot.is_playing() {
            self.plot.stop();
        } else {
            self.plot.play();
        }
    }

    /// Hover and click on the plot; a click on any pane focuses it
    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let pane = self.panes.hit(mouse.column, mouse.row).map(str::to_string);
        let over_plot = pane.as_deref() == Some(PLOT_PANE);

        match mouse.kind {
            MouseEventKind::Moved => {
                if over_plot {
                    self.plot.hover(&self.panes, mouse.column, mouse.row);
                } else {
                    self.plot.leave();
                }
            }
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(panel) = pane.as_deref().and_then(FocusedPanel::for_pane) {
                    self.focused = panel;
                }
                if over_plot {
                    self.plot.click(&self.panes, mouse.column, mouse.row);
                }
            }
            _ => {}
        }
    }

    /// Detach every component from its pane
    fn shutdown(&mut self) {
        self.time.destroy(&mut self.panes);
        self.plot.destroy(&mut self.panes);
        self.selector.destroy(&mut self.panes);
    }

    /// Render the UI
    fn render(&self, frame: &mut ratatui::Frame) {
        self.selector.draw(
            frame,
            &self.panes,
            &self.theme,
            self.focused == FocusedPanel::Countries,
        );
        self.plot.draw(
            frame,
            &self.panes,
            &self.theme,
            self.focused == FocusedPanel::Plot,
        );
        self.time.draw(
            frame,
            &self.panes,
            &self.theme,
            self.focused == FocusedPanel::Timeline,
        );

        let status_bar = StatusBar::new(
            &self.source_label,
            self.plot.current_year(),
            self.selector.selected_countries().len(),
            self.error_message.as_deref(),
            &self.theme,
        );
        status_bar.render(frame, self.status_area);

        // Render help overlay if active
        if self.show_help {
            let area = frame.area();
            let help = HelpOverlay::new(&self.theme);
            help.render(frame, area);
        }
    }
}

/// Pick the data source for the dashboard
fn build_source(config: &AppConfig) -> Result<Option<Arc<dyn DataSource>>> {
    if config.offline {
        let storage = Storage::new(config.db_path.clone());
        if !storage.exists() {
            return Ok(None);
        }
        match storage.fetched_at() {
            Ok(Some(at)) => info!("Using snapshot {:?} fetched at {at}", storage.path()),
            Ok(None) => warn!("Snapshot {:?} has no fetch time", storage.path()),
            Err(e) => warn!("Could not read snapshot metadata: {e:#}"),
        }
        let source: Arc<dyn DataSource> = Arc::new(SnapshotSource::new(storage));
        return Ok(Some(source));
    }
    let client = ApiClient::new(config.api_url.clone()).context("Failed to create API client")?;
    info!("Using backend at {}", client.base_url());
    let source: Arc<dyn DataSource> = Arc::new(client);
    Ok(Some(source))
}

/// Restore terminal to normal state
fn restore_terminal() {
    // Best effort cleanup - ignore errors since we may be in a panic
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
}

/// Run the TUI application
pub fn run(config: AppConfig) -> Result<()> {
    let Some(source) = build_source(&config)? else {
        eprintln!("No snapshot found at: {:?}", config.db_path);
        eprintln!("Run `co2-gdp-tui sync` first, or drop --offline to use the backend");
        return Ok(());
    };

    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen, EnableMouseCapture) {
        restore_terminal();
        return Err(e).context("Failed to setup terminal");
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = match Terminal::new(backend) {
        Ok(t) => t,
        Err(e) => {
            restore_terminal();
            return Err(e).context("Failed to create terminal");
        }
    };

    // Create app - if this fails, restore terminal first
    let mut app = match App::new(config, source) {
        Ok(a) => a,
        Err(e) => {
            restore_terminal();
            return Err(e).context("Failed to initialize application");
        }
    };

    let result = run_main_loop(&mut terminal, &mut app);

    // Always restore terminal, regardless of result
    app.shutdown();
    restore_terminal();
    terminal.show_cursor().ok();

    result
}

/// Main application loop
fn run_main_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        let size = terminal.size()?;
        app.layout(Rect::new(0, 0, size.width, size.height));
        app.update(Instant::now());

        // Render - if this fails, we should exit
        terminal.draw(|f| app.render(f))?;

        // Handle input with timeout
        if event::poll(FRAME_INTERVAL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_input(key),
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                // Resizes are picked up by the next layout pass
                _ => {}
            }
            app.process_events();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

/// Fetch the country list and combined data into the snapshot database
pub fn run_sync(config: &AppConfig) -> Result<()> {
    let client = ApiClient::new(config.api_url.clone()).context("Failed to create API client")?;
    info!("Syncing snapshot from {}", client.base_url());
    let health = client
        .health()
        .with_context(|| format!("Backend at {} is not reachable", client.base_url()))?;
    info!("Backend status: {}", health.status);

    let countries = client
        .countries()
        .context("Failed to fetch country list")?
        .countries;
    let mut params = QueryParams::new()
        .start_year(config.start_year)
        .end_year(config.end_year);
    if let Some(codes) = &config.countries {
        params = params.countries(codes.clone());
    }
    let combined = client
        .fetch_validated_data(&params)
        .context("Failed to fetch indicator data")?;

    let storage = Storage::new(config.db_path.clone());
    let written = storage.write_snapshot(&countries, &combined)?;
    info!("Wrote {written} observations to {:?}", storage.path());
    println!(
        "Stored {written} observations for {} countries in {}",
        countries.len(),
        storage.path().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crossterm::event::KeyModifiers;
    use ratatui::{backend::TestBackend, Terminal};

    use super::*;
    use crate::data::testing::StaticSource;
    use crate::data::{CombinedData, Country};

    const WAIT: Duration = Duration::from_secs(5);

    fn source() -> StaticSource {
        let combined: CombinedData = serde_json::from_value(serde_json::json!({
            "data": {
                "co2_data": {
                    "USA": {"2000": 20.0, "2001": 19.0, "2002": 18.0},
                    "CHN": {"2000": 2.5, "2001": 3.0, "2002": 3.5}
                },
                "gdp_data": {
                    "USA": {"2000": 36000.0, "2001": 37000.0, "2002": 38000.0},
                    "CHN": {"2000": 1000.0, "2001": 1100.0, "2002": 1200.0}
                }
            },
            "metadata": {
                "countries": {
                    "USA": {"name": "United States"},
                    "CHN": {"name": "China"}
                }
            }
        }))
        .unwrap();
        StaticSource {
            countries: vec![
                Country::new("USA", "United States"),
                Country::new("CHN", "China"),
            ],
            combined,
            ..Default::default()
        }
    }

    fn config(countries: Option<&str>) -> AppConfig {
        AppConfig::from_show_command(
            None,
            false,
            Some(PathBuf::from("unused.db")),
            countries.map(str::to_string),
            Some(1995),
            Some(2010),
            1000,
            0,
        )
        .unwrap()
    }

    fn loaded_app(countries: Option<&str>) -> App {
        let mut app = App::new(config(countries), Arc::new(source())).unwrap();
        assert!(app.selector.wait_for_load(WAIT));
        assert!(app.plot.wait_for_load(WAIT));
        app.process_events();
        app.layout(Rect::new(0, 0, 120, 40));
        app
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_focus_cycle() {
        let panel = FocusedPanel::Countries;
        assert_eq!(panel.next(), FocusedPanel::Plot);
        assert_eq!(panel.next().next().next(), panel);
        assert_eq!(panel.prev(), FocusedPanel::Timeline);
    }

    #[test]
    fn test_loaded_data_sets_timeline_range() {
        let app = loaded_app(None);
        assert_eq!(app.time.start_year(), 2000);
        assert_eq!(app.time.end_year(), 2002);
        assert_eq!(app.time.current_year(), 2000);
        assert_eq!(app.plot.current_year(), Some(2000));
        assert!(app.error_message.is_none());
    }

    #[test]
    fn test_timeline_and_plot_follow_each_other() {
        let mut app = loaded_app(None);

        app.time.set_year(2001, true);
        app.process_events();
        assert_eq!(app.plot.current_year(), Some(2001));

        app.plot.set_year(2002);
        app.process_events();
        assert_eq!(app.time.current_year(), 2002);
    }

    #[test]
    fn test_selection_filters_plot() {
        let mut app = loaded_app(None);
        app.selector.toggle_country("CHN");
        app.process_events();

        let visible = app.plot.visible_points();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].country_code, "CHN");
    }

    #[test]
    fn test_country_flag_preselects() {
        let app = loaded_app(Some("usa"));
        assert_eq!(app.selector.selected_countries(), ["USA".to_string()]);
    }

    #[test]
    fn test_clicking_point_toggles_country() {
        let mut app = loaded_app(None);
        let (column, row) = app
            .plot
            .point_cell(&app.panes, "USA", Instant::now())
            .unwrap();
        app.handle_mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::NONE,
        });
        app.process_events();

        assert_eq!(app.focused, FocusedPanel::Plot);
        assert_eq!(app.selector.selected_countries(), ["USA".to_string()]);
        assert_eq!(app.plot.visible_points().len(), 1);
    }

    #[test]
    fn test_open_selector_captures_typing() {
        let mut app = loaded_app(None);
        app.handle_input(key(KeyCode::Enter));
        assert!(app.selector.is_open());

        app.handle_input(key(KeyCode::Char('q')));
        assert!(!app.should_quit);
        assert_eq!(app.selector.search_term(), "q");

        app.handle_input(key(KeyCode::Esc));
        app.handle_input(key(KeyCode::Char('q')));
        assert!(app.should_quit);
    }

    #[test]
    fn test_help_toggle_and_focus_keys() {
        let mut app = loaded_app(None);
        app.handle_input(key(KeyCode::Tab));
        assert_eq!(app.focused, FocusedPanel::Plot);
        app.handle_input(key(KeyCode::BackTab));
        assert_eq!(app.focused, FocusedPanel::Countries);

        app.handle_input(key(KeyCode::Char('?')));
        assert!(app.show_help);
        app.handle_input(key(KeyCode::Esc));
        assert!(!app.show_help);
    }

    #[test]
    fn test_timeline_keys_drive_plot() {
        let mut app = loaded_app(None);
        app.focused = FocusedPanel::Timeline;
        app.handle_input(key(KeyCode::Right));
        app.process_events();
        assert_eq!(app.plot.current_year(), Some(2001));
    }

    #[test]
    fn test_timeline_disabled_until_data_loads() {
        let mut app = App::new(config(None), Arc::new(source())).unwrap();
        app.focused = FocusedPanel::Timeline;
        app.handle_input(key(KeyCode::Right));
        assert_eq!(app.time.current_year(), 1995);

        assert!(app.plot.wait_for_load(WAIT));
        app.process_events();
        app.handle_input(key(KeyCode::Right));
        assert_eq!(app.time.current_year(), 2001);
    }

    #[test]
    fn test_load_failure_reaches_status_bar() {
        let mut app = App::new(config(None), Arc::new(StaticSource::failing("offline"))).unwrap();
        assert!(app.plot.wait_for_load(WAIT));
        app.process_events();
        let message = app.error_message.clone().unwrap();
        assert!(message.contains("offline"));
    }

    #[test]
    fn test_shutdown_vacates_panes() {
        let mut app = loaded_app(None);
        app.shutdown();
        for pane in [COUNTRIES_PANE, PLOT_PANE, TIMELINE_PANE] {
            assert!(app.panes.is_vacant(pane));
        }
    }

    #[test]
    fn test_render_smoke() {
        let app = loaded_app(None);
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| app.render(f)).unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("co2-gdp-tui: static"));
    }
}
