use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use storedesk_core::Money;
use storedesk_sales::Order;

/// Growth (in percent) above which a day trends `up`, and below whose
/// negation it trends `down`.
const TREND_BAND: f64 = 5.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn from_growth(growth: f64) -> Self {
        if growth > TREND_BAND {
            Trend::Up
        } else if growth < -TREND_BAND {
            Trend::Down
        } else {
            Trend::Stable
        }
    }
}

/// One day of the revenue series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub total: Money,
    /// Day-over-day change in percent.
    pub growth: f64,
    pub trend: Trend,
}

/// Day-over-day growth in percent.
pub fn growth_percent(previous: Money, current: Money) -> f64 {
    let previous = previous.minor_units() as f64;
    let current = current.minor_units() as f64;
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else if current > 0.0 {
        100.0
    } else {
        0.0
    }
}

/// Per-day totals of paid orders, dated by payment time (or creation time when
/// the payment time is unknown).
pub fn daily_paid_totals<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
) -> BTreeMap<NaiveDate, Money> {
    let mut totals = BTreeMap::new();
    for order in orders.into_iter().filter(|o| o.is_paid()) {
        let slot = totals.entry(order.revenue_date()).or_insert(Money::ZERO);
        *slot = [*slot, order.amount].into_iter().sum();
    }
    totals
}

/// Dense series over `[start, end]`, one entry per day, ascending.
///
/// Days without totals are zero; totals outside the window are ignored and
/// repeated dates are summed. `start > end` yields an empty series.
pub fn daily_revenue_series(
    start: NaiveDate,
    end: NaiveDate,
    totals: impl IntoIterator<Item = (NaiveDate, Money)>,
) -> Vec<DailyRevenue> {
    if start > end {
        return Vec::new();
    }

    let mut by_day: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    for (date, amount) in totals {
        if date < start || date > end {
            continue;
        }
        let slot = by_day.entry(date).or_insert(Money::ZERO);
        *slot = [*slot, amount].into_iter().sum();
    }

    let mut series = Vec::new();
    let mut previous: Option<Money> = None;
    for date in start.iter_days().take_while(|d| *d <= end) {
        let total = by_day.get(&date).copied().unwrap_or(Money::ZERO);
        let growth = previous.map(|p| growth_percent(p, total)).unwrap_or(0.0);
        series.push(DailyRevenue {
            date,
            total,
            growth,
            trend: Trend::from_growth(growth),
        });
        previous = Some(total);
    }
    series
}
