//! Activity Summaries
//!
//! Windowed aggregation of attempt history and its HTML rendering.

pub mod aggregator;
pub mod render;

pub use aggregator::{SummaryAggregator, SummaryReport, SummaryRow, SummaryTotals};
pub use render::render_html;
