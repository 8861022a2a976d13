//! Named screen regions that components mount into.

use std::collections::BTreeMap;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use thiserror::Error;

pub const COUNTRIES_PANE: &str = "countries";
pub const PLOT_PANE: &str = "plot";
pub const TIMELINE_PANE: &str = "timeline";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UiError {
    #[error("Mount target not found: {0}")]
    MountNotFound(String),

    #[error("Mount target {pane} already holds {owner}")]
    MountOccupied { pane: String, owner: String },
}

#[derive(Debug, Clone, Default)]
struct Pane {
    area: Rect,
    owner: Option<&'static str>,
}

/// Registry of panes, each holding at most one component
#[derive(Debug, Clone, Default)]
pub struct Panes {
    panes: BTreeMap<String, Pane>,
}

impl Panes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Panes of the dashboard: country list on the left, plot on the
    /// right, timeline along the bottom.
    pub fn dashboard() -> Self {
        let mut panes = Panes::new();
        panes.add(COUNTRIES_PANE);
        panes.add(PLOT_PANE);
        panes.add(TIMELINE_PANE);
        panes
    }

    pub fn add(&mut self, id: &str) {
        self.panes.entry(id.to_string()).or_default();
    }

    /// Recompute the dashboard pane areas for a body region
    pub fn layout_dashboard(&mut self, body: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(8),    // Countries + plot
                Constraint::Length(4), // Timeline
            ])
            .split(body);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(32), // Countries
                Constraint::Min(40),    // Plot
            ])
            .split(rows[0]);

        self.set_area(COUNTRIES_PANE, columns[0]);
        self.set_area(PLOT_PANE, columns[1]);
        self.set_area(TIMELINE_PANE, rows[1]);
    }

    pub fn set_area(&mut self, id: &str, area: Rect) {
        if let Some(pane) = self.panes.get_mut(id) {
            pane.area = area;
        }
    }

    /// Attach a component to a pane
    pub fn claim(&mut self, id: &str, owner: &'static str) -> Result<(), UiError> {
        let pane = self
            .panes
            .get_mut(id)
            .ok_or_else(|| UiError::MountNotFound(id.to_string()))?;
        if let Some(existing) = pane.owner {
            return Err(UiError::MountOccupied {
                pane: id.to_string(),
                owner: existing.to_string(),
            });
        }
        pane.owner = Some(owner);
        Ok(())
    }

    /// Empty a pane
    pub fn release(&mut self, id: &str) {
        if let Some(pane) = self.panes.get_mut(id) {
            pane.owner = None;
        }
    }

    #[allow(dead_code)] // Used in tests
    pub fn is_vacant(&self, id: &str) -> bool {
        self.panes.get(id).map(|p| p.owner.is_none()).unwrap_or(true)
    }

    #[allow(dead_code)] // Used in tests
    pub fn owner(&self, id: &str) -> Option<&'static str> {
        self.panes.get(id).and_then(|p| p.owner)
    }

    pub fn area(&self, id: &str) -> Option<Rect> {
        self.panes.get(id).map(|p| p.area)
    }

    /// Pane whose area contains the given cell
    pub fn hit(&self, column: u16, row: u16) -> Option<&str> {
        self.panes
            .iter()
            .find(|(_, pane)| {
                let a = pane.area;
                column >= a.x && column < a.x + a.width && row >= a.y && row < a.y + a.height
            })
            .map(|(id, _)| id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_unknown_pane_fails() {
        let mut panes = Panes::dashboard();
        assert_eq!(
            panes.claim("sidebar", "test"),
            Err(UiError::MountNotFound("sidebar".to_string()))
        );
    }

    #[test]
    fn test_claim_twice_fails_until_released() {
        let mut panes = Panes::dashboard();
        panes.claim(PLOT_PANE, "scatter").unwrap();
        assert!(!panes.is_vacant(PLOT_PANE));
        assert!(matches!(
            panes.claim(PLOT_PANE, "other"),
            Err(UiError::MountOccupied { .. })
        ));

        panes.release(PLOT_PANE);
        assert!(panes.is_vacant(PLOT_PANE));
        assert!(panes.claim(PLOT_PANE, "other").is_ok());
        assert_eq!(panes.owner(PLOT_PANE), Some("other"));
    }

    #[test]
    fn test_layout_covers_body() {
        let mut panes = Panes::dashboard();
        panes.layout_dashboard(Rect::new(0, 0, 120, 40));

        let timeline = panes.area(TIMELINE_PANE).unwrap();
        assert_eq!(timeline.height, 4);
        assert_eq!(timeline.y, 36);
        assert_eq!(panes.area(COUNTRIES_PANE).unwrap().width, 32);
        assert_eq!(panes.area(PLOT_PANE).unwrap().width, 88);

        assert_eq!(panes.hit(5, 5), Some(COUNTRIES_PANE));
        assert_eq!(panes.hit(60, 5), Some(PLOT_PANE));
        assert_eq!(panes.hit(60, 38), Some(TIMELINE_PANE));
    }
}
