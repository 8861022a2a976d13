//! Help overlay widget showing keyboard shortcuts.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::theme::Theme;

const DESCRIPTION: &str = "CO2 emissions against GDP per capita, one point per country, animated over time. Filter countries on the left, scrub or play the years at the bottom, hover points for details.";

const SHORTCUTS: &[(&str, &[(&str, &str)])] = &[
    (
        "Panels",
        &[
            ("Tab", "Cycle focus between panels"),
            ("Shift+Tab", "Cycle focus backwards"),
        ],
    ),
    (
        "Countries",
        &[
            ("Enter / ↓", "Open the country list"),
            ("type", "Search by name or code"),
            ("Enter", "Toggle highlighted country"),
            ("Ctrl+A", "Select all matching"),
            ("Ctrl+D", "Deselect all matching"),
            ("Ctrl+X", "Clear selection"),
            ("Esc", "Close the list"),
        ],
    ),
    (
        "Timeline",
        &[
            ("Space", "Play / pause"),
            ("s", "Stop and rewind"),
            ("← / →", "Previous / next year"),
            ("Home / End", "First / last year"),
            ("+ / -", "Faster / slower"),
        ],
    ),
    (
        "Plot",
        &[
            ("p", "Play / stop the plot's own animation"),
            ("mouse", "Hover for details, click to toggle a country"),
        ],
    ),
    (
        "General",
        &[
            ("r", "Reload data"),
            ("h / ?", "Toggle this help"),
            ("q", "Quit"),
        ],
    ),
];

/// Help overlay showing all keyboard shortcuts
pub struct HelpOverlay<'a> {
    theme: &'a Theme,
}

impl<'a> HelpOverlay<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        HelpOverlay { theme }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let mut lines: Vec<Line> = vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("  {DESCRIPTION}"),
                Style::default().add_modifier(Modifier::ITALIC),
            )),
            Line::from(""),
        ];

        for (section, items) in SHORTCUTS {
            lines.push(Line::from(Span::styled(
                format!("  {section} "),
                Style::default()
                    .add_modifier(Modifier::BOLD)
                    .add_modifier(Modifier::UNDERLINED),
            )));
            lines.push(Line::from(""));

            for (key, desc) in items.iter() {
                lines.push(Line::from(vec![
                    Span::raw("    "),
                    Span::styled(format!("{key:<14}"), Style::default().fg(self.theme.title)),
                    Span::raw(*desc),
                ]));
            }
            lines.push(Line::from(""));
        }
        lines
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let popup_area = centered_rect(65, 80, area);
        frame.render_widget(Clear, popup_area);

        let paragraph = Paragraph::new(self.lines())
            .block(
                Block::default()
                    .title(" co2-gdp-tui Help ")
                    .title_alignment(Alignment::Center)
                    .borders(Borders::ALL)
                    .border_style(self.theme.border_style())
                    .title_style(self.theme.title_style())
                    .style(self.theme.surface_style()),
            )
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: false })
            .style(self.theme.surface_style());

        frame.render_widget(paragraph, popup_area);
    }
}

/// Create a centered rect for popup dialogs
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
