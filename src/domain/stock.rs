use serde::{Deserialize, Serialize};

use super::{Cents, Grams, div_round};

/// Dose size used when the settings row is missing (it is seeded at init,
/// so this is a fallback, not the normal path).
pub const DEFAULT_DOSE_GRAMS: Grams = 10;

/// Snapshot of the shared coffee stock: the remaining mass and the monetary
/// cost basis of that mass. There is exactly one of these per ledger, a
/// single row owned by the repository and mutated only through its atomic
/// operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockState {
    pub coffee_stock_grams: Grams,
    pub stock_total_cost_cents: Cents,
    /// Opaque reference to the payment QR image (URL or path); may be empty
    pub qr_code_reference: String,
}

impl StockState {
    pub fn empty() -> Self {
        Self {
            coffee_stock_grams: 0,
            stock_total_cost_cents: 0,
            qr_code_reference: String::new(),
        }
    }

    pub fn has_stock_for(&self, dose_grams: Grams) -> bool {
        self.coffee_stock_grams >= dose_grams
    }
}

/// Average cost of one gram of the current stock, rounded to cents.
/// Defined as 0 while no stock is held.
pub fn cost_per_gram_cents(stock: &StockState) -> Cents {
    if stock.coffee_stock_grams <= 0 {
        return 0;
    }
    div_round(
        stock.stock_total_cost_cents as i128,
        stock.coffee_stock_grams as i128,
    )
}

/// Price of one dose, derived from the weighted-average cost per gram.
/// The ratio is recomputed from the snapshot on every call; stock mutates
/// between calls, so caching it would serve stale prices.
///
/// With no stock the price is 0 by definition (not an error); the
/// consumption guard is on grams, not on price.
pub fn price_per_dose(stock: &StockState, dose_grams: Grams) -> Cents {
    if stock.coffee_stock_grams <= 0 {
        return 0;
    }
    div_round(
        stock.stock_total_cost_cents as i128 * dose_grams as i128,
        stock.coffee_stock_grams as i128,
    )
}
