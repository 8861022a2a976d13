//! Terminal User Interface components for co2-gdp-tui.

pub mod country_selector;
mod help;
pub mod mount;
pub mod scatter_plot;
pub mod theme;
pub mod time_control;
pub mod widgets;

pub use country_selector::{CountrySelector, SelectionEvent};
pub use help::HelpOverlay;
pub use mount::{Panes, UiError, COUNTRIES_PANE, PLOT_PANE, TIMELINE_PANE};
pub use scatter_plot::{PlotEvent, ScatterPlot, ScatterPlotConfig};
pub use theme::Theme;
pub use time_control::{TimeControl, TimeControlConfig, TimeEvent};
