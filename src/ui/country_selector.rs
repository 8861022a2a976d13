//! Searchable multi-select list of countries.
//!
//! The selector is either closed (showing a summary of the selection) or
//! open (showing a search box and the filtered list). Independently, the
//! country list itself is loading, loaded or failed.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{error, info};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::mount::{Panes, UiError};
use super::theme::Theme;
use crate::api;
use crate::data::{Country, DataSource};
use crate::events::Listeners;
use crate::loader::{Pending, Poll};

/// Changes published by the country selector
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    /// The selection changed; `countries` resolves each code to its name
    Changed {
        codes: Vec<String>,
        countries: Vec<Country>,
    },
    /// A new country list replaced the previous one
    CountriesLoaded(Vec<Country>),
    LoadFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Loaded,
    Failed(String),
}

pub struct CountrySelector {
    mount: String,
    mounted: bool,
    source: Arc<dyn DataSource>,
    /// Every loaded country, sorted by name
    countries: Vec<Country>,
    /// Countries matching the search term
    filtered: Vec<Country>,
    selected: Vec<String>,
    search_term: String,
    is_open: bool,
    cursor: usize,
    load_state: LoadState,
    pending: Option<Pending<api::Result<Vec<Country>>>>,
    events: Listeners<SelectionEvent>,
}

impl CountrySelector {
    /// Mount into `mount` and start loading the country list
    pub fn new(
        panes: &mut Panes,
        mount: &str,
        source: Arc<dyn DataSource>,
    ) -> Result<Self, UiError> {
        panes.claim(mount, "country-selector")?;
        let mut selector = CountrySelector {
            mount: mount.to_string(),
            mounted: true,
            source,
            countries: Vec::new(),
            filtered: Vec::new(),
            selected: Vec::new(),
            search_term: String::new(),
            is_open: false,
            cursor: 0,
            load_state: LoadState::Loading,
            pending: None,
            events: Listeners::new(),
        };
        selector.refresh();
        Ok(selector)
    }

    pub fn events_mut(&mut self) -> &mut Listeners<SelectionEvent> {
        &mut self.events
    }

    /// Re-run the load. Any load still in flight is abandoned.
    ///
    /// The current selection is kept as is; it is only re-validated by a
    /// later `set_selected_countries`.
    pub fn refresh(&mut self) {
        if !self.mounted {
            return;
        }
        self.load_state = LoadState::Loading;
        let source = Arc::clone(&self.source);
        self.pending = Some(Pending::spawn("country-loader", move || source.countries()));
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
                "country loader stopped unexpectedly".to_string(),
            )),
        };
        self.pending = None;
        self.apply_load(result);
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
                "country loader stopped unexpectedly".to_string(),
            )),
        };
        self.pending = None;
        self.apply_load(result);
        true
    }

    fn apply_load(&mut self, result: api::Result<Vec<Country>>) {
        match result {
            Ok(mut countries) => {
                countries.sort_by(|a, b| a.name.cmp(&b.name));
                info!("Loaded {} countries", countries.len());
                self.countries = countries;
                self.load_state = LoadState::Loaded;
                self.apply_search();
                self.events
                    .emit(&SelectionEvent::CountriesLoaded(self.countries.clone()));
            }
            Err(e) => {
                let message = e.to_string();
                error!("Failed to load countries: {message}");
                self.load_state = LoadState::Failed(message.clone());
                self.events.emit(&SelectionEvent::LoadFailed(message));
            }
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    #[allow(dead_code)] // Used in tests
    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    #[allow(dead_code)] // Used in tests
    pub fn filtered_countries(&self) -> &[Country] {
        &self.filtered
    }

    #[allow(dead_code)] // Used in tests
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn selected_countries(&self) -> &[String] {
        &self.selected
    }

    /// Selected codes resolved to countries, `{code, name: code}` when unknown
    pub fn selected_country_objects(&self) -> Vec<Country> {
        self.selected
            .iter()
            .map(|code| {
                self.countries
                    .iter()
                    .find(|c| &c.code == code)
                    .cloned()
                    .unwrap_or_else(|| Country::new(code.clone(), code.clone()))
            })
            .collect()
    }

    pub fn open(&mut self) {
        self.is_open = true;
        self.search("");
    }

    pub fn close(&mut self) {
        self.is_open = false;
        self.search("");
    }

    pub fn toggle_open(&mut self) {
        if self.is_open {
            self.close();
        } else {
            self.open();
        }
    }

    /// Case-insensitive substring filter on name and code
    pub fn search(&mut self, term: &str) {
        self.search_term = term.to_string();
        self.apply_search();
    }

    fn apply_search(&mut self) {
        let needle = self.search_term.trim().to_lowercase();
        self.filtered = if needle.is_empty() {
            self.countries.clone()
        } else {
            self.countries
                .iter()
                .filter(|c| {
                    c.name.to_lowercase().contains(&needle)
                        || c.code.to_lowercase().contains(&needle)
                })
                .cloned()
                .collect()
        };
        self.cursor = self.cursor.min(self.filtered.len().saturating_sub(1));
    }

    pub fn toggle_country(&mut self, code: &str) {
        if let Some(pos) = self.selected.iter().position(|c| c == code) {
            self.selected.remove(pos);
        } else {
            self.selected.push(code.to_string());
        }
        self.notify_selection();
    }

    /// Replace the selection, dropping codes that are not in the loaded list.
    /// The caller's order of valid codes is preserved.
    pub fn set_selected_countries<S: AsRef<str>>(&mut self, codes: &[S]) {
        let known: HashSet<&str> = self.countries.iter().map(|c| c.code.as_str()).collect();
        let mut selected: Vec<String> = Vec::new();
        for code in codes {
            let code = code.as_ref();
            if known.contains(code) && !selected.iter().any(|c| c == code) {
                selected.push(code.to_string());
            }
        }
        self.selected = selected;
        self.notify_selection();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
        self.notify_selection();
    }

    /// Select or deselect every country matching the current search
    pub fn handle_select_all(&mut self, select: bool) {
        if select {
            self.selected = self.filtered.iter().map(|c| c.code.clone()).collect();
            self.selected.sort();
        } else {
            let visible: HashSet<&str> = self.filtered.iter().map(|c| c.code.as_str()).collect();
            self.selected.retain(|code| !visible.contains(code.as_str()));
        }
        self.notify_selection();
    }

    fn notify_selection(&mut self) {
        let event = SelectionEvent::Changed {
            codes: self.selected.clone(),
            countries: self.selected_country_objects(),
        };
        self.events.emit(&event);
    }

    /// Detach everything and vacate the pane; late loads are discarded
    pub fn destroy(&mut self, panes: &mut Panes) {
        self.pending = None;
        self.events.clear();
        if self.mounted {
            panes.release(&self.mount);
            self.mounted = false;
        }
        self.countries.clear();
        self.filtered.clear();
        self.selected.clear();
        self.search_term.clear();
        self.is_open = false;
        self.cursor = 0;
    }

    /// Keyboard handling; returns true when the key was consumed
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if !self.mounted {
            return false;
        }
        if !self.is_open {
            return match key.code {
                KeyCode::Enter | KeyCode::Down => {
                    self.toggle_open();
                    true
                }
                _ => false,
            };
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.close(),
            KeyCode::Enter => {
                if let Some(country) = self.filtered.get(self.cursor) {
                    let code = country.code.clone();
                    self.toggle_country(&code);
                }
            }
            KeyCode::Up => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down => {
                if self.cursor + 1 < self.filtered.len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Backspace => {
                let mut term = self.search_term.clone();
                term.pop();
                self.search(&term);
            }
            KeyCode::Char('a') if ctrl => self.handle_select_all(true),
            KeyCode::Char('d') if ctrl => self.handle_select_all(false),
            KeyCode::Char('x') if ctrl => self.clear_selection(),
            KeyCode::Char(c) if !ctrl => {
                let term = format!("{}{c}", self.search_term);
                self.search(&term);
            }
            _ => {}
        }
        true
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
            .title(format!(" Countries ({} selected) ", self.selected.len()))
            .borders(Borders::ALL)
            .border_style(border_style)
            .title_style(title_style);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        match &self.load_state {
            LoadState::Loading => {
                let loading = Paragraph::new("Loading countries…").style(theme.muted_style());
                frame.render_widget(loading, inner);
                return;
            }
            LoadState::Failed(message) => {
                let error = Paragraph::new(vec![
                    Line::from(Span::styled("Error loading countries", theme.error_style())),
                    Line::from(message.as_str()),
                    Line::from(Span::styled("[r] Retry", theme.muted_style())),
                ])
                .wrap(Wrap { trim: true });
                frame.render_widget(error, inner);
                return;
            }
            LoadState::Loaded => {}
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(1)])
            .split(inner);

        if self.is_open {
            let search = Line::from(vec![
                Span::styled("Search: ", theme.muted_style()),
                Span::raw(self.search_term.as_str()),
                Span::styled("▏", Style::default().add_modifier(Modifier::SLOW_BLINK)),
            ]);
            frame.render_widget(Paragraph::new(search), chunks[0]);

            let items: Vec<ListItem> = self
                .filtered
                .iter()
                .map(|c| {
                    let checked = self.selected.contains(&c.code);
                    let marker = if checked { "[x] " } else { "[ ] " };
                    let color = self
                        .countries
                        .iter()
                        .position(|k| k.code == c.code)
                        .map(|i| theme.country_color(i))
                        .unwrap_or(theme.fg);
                    ListItem::new(Line::from(vec![
                        Span::styled(marker, Style::default().fg(theme.selected_marker)),
                        Span::styled("● ", Style::default().fg(color)),
                        Span::raw(format!("{} ({})", c.name, c.code)),
                    ]))
                })
                .collect();

            let list = List::new(items)
                .highlight_style(theme.highlight_style())
                .highlight_symbol("> ");
            let mut state = ListState::default();
            if !self.filtered.is_empty() {
                state.select(Some(self.cursor));
            }
            frame.render_stateful_widget(list, chunks[1], &mut state);
        } else {
            let hint = Line::from(Span::styled("[Enter] choose countries", theme.muted_style()));
            frame.render_widget(Paragraph::new(hint), chunks[0]);

            let summary: Vec<Line> = if self.selected.is_empty() {
                vec![Line::from("All countries")]
            } else {
                self.selected_country_objects()
                    .into_iter()
                    .map(|c| Line::from(format!("• {} ({})", c.name, c.code)))
                    .collect()
            };
            frame.render_widget(Paragraph::new(summary), chunks[1]);
        }
    }
}
