//! Small widgets shared by the dashboard shell.

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::theme::Theme;

/// Status bar widget
pub struct StatusBar<'a> {
    source: &'a str,
    year: Option<i32>,
    selected: usize,
    error: Option<&'a str>,
    theme: &'a Theme,
}

impl<'a> StatusBar<'a> {
    pub fn new(
        source: &'a str,
        year: Option<i32>,
        selected: usize,
        error: Option<&'a str>,
        theme: &'a Theme,
    ) -> Self {
        StatusBar {
            source,
            year,
            selected,
            error,
            theme,
        }
    }

    fn summary(&self) -> String {
        let year = self
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string());
        let countries = match self.selected {
            0 => "all countries".to_string(),
            1 => "1 country".to_string(),
            n => format!("{n} countries"),
        };
        format!("co2-gdp-tui: {} | {year} | {countries}", self.source)
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let line = match self.error {
            Some(e) => Line::from(Span::styled(format!("Error: {e}"), self.theme.error_style())),
            None => Line::from(vec![
                Span::raw(self.summary()),
                Span::styled(" | [?] Help [q] Quit", self.theme.muted_style()),
            ]),
        };

        let paragraph = Paragraph::new(line).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(self.theme.border_style()),
        );

        frame.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_selection() {
        let theme = Theme::default();
        let bar = StatusBar::new("http://localhost:5000", Some(2005), 0, None, &theme);
        assert_eq!(
            bar.summary(),
            "co2-gdp-tui: http://localhost:5000 | 2005 | all countries"
        );

        let bar = StatusBar::new("snapshot.db", None, 3, None, &theme);
        assert_eq!(bar.summary(), "co2-gdp-tui: snapshot.db | - | 3 countries");
    }
}
