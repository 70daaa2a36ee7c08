use serde::{Deserialize, Serialize};

/// Before/after pair of a single stock record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub old: u32,
    pub new: u32,
}

impl StockChange {
    /// Remove `quantity` units, flooring at zero.
    pub fn decrement(old: u32, quantity: u32) -> Self {
        Self {
            old,
            new: old.saturating_sub(quantity),
        }
    }

    /// Overwrite the stock with an absolute value.
    pub fn set(old: u32, new: u32) -> Self {
        Self { old, new }
    }

    /// View of two records sold together (size + colour): the sellable amount
    /// is bounded by the scarcer one, before and after.
    pub fn combined(a: StockChange, b: StockChange) -> Self {
        Self {
            old: a.old.min(b.old),
            new: a.new.min(b.new),
        }
    }

    pub fn delta(&self) -> i64 {
        i64::from(self.new) - i64::from(self.old)
    }

    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }
}
