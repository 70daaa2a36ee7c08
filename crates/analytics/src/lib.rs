//! Store analytics: daily revenue series and the dashboard overview.
//!
//! Pure computations over already-loaded data; callers fetch the inputs.

pub mod overview;
pub mod revenue;

pub use overview::{DashboardOverview, LowStockProduct};
pub use revenue::{DailyRevenue, Trend, daily_paid_totals, daily_revenue_series, growth_percent};
