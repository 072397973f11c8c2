//! Per-company money math for the Tycoon simulation.
//!
//! Two halves, both pure computations over entity snapshots. Nothing here
//! touches storage; the tick pipeline reads entities, runs them through
//! these functions and writes the results back.
//!
//! - [`mining`] -- Rig wear, site hashrate and power, BTC yield, energy cost.
//! - [`trading`] -- Mark-to-market, liquidation, and the position-open math
//!   used by the trading collaborator.
//!
//! # Mining in one line
//!
//! ```text
//! btc = (site_effective_hashrate / network_hashrate) * block_reward * (tick_secs / block_interval_secs)
//! ```
//!
//! # Usage
//!
//! ```
//! use tycoon_ledger::mining::{MiningParams, block_yield};
//!
//! let params = MiningParams::default();
//! let btc = block_yield(&params, 5.0, 45_000.0, 450_000_000.0);
//! assert!((btc - 0.000_005_208_3).abs() < 1e-10);
//! ```

pub mod mining;
pub mod trading;

pub use mining::{
    CompanyYield, MiningEnv, MiningParams, SiteOutcome, active_contract_price, compute_site,
};
pub use trading::{
    MarkOutcome, OpenOrder, OpenedPosition, Settlement, TradingParams, apply_mark, liquidation_price,
    mark_position, open_position, required_margin, settle_close,
};

use tycoon_types::{PositionId, PositionStatus};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by ledger computations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Only `OPEN` positions can be marked or closed.
    #[error("position {position_id} is {status}, not OPEN")]
    PositionNotOpen {
        /// The offending position.
        position_id: PositionId,
        /// Its current status.
        status: PositionStatus,
    },

    /// Leverage must be at least 1.
    #[error("leverage must be at least 1, got {leverage}")]
    InvalidLeverage {
        /// The rejected leverage.
        leverage: f64,
    },

    /// Quantity or price must be strictly positive.
    #[error("{field} must be positive, got {value}")]
    NotPositive {
        /// Field name.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// The company cannot fund the order.
    #[error("insufficient {asset} balance: need {required}, have {available}")]
    InsufficientFunds {
        /// `"USD"` or `"BTC"`.
        asset: &'static str,
        /// Amount the order needs.
        required: f64,
        /// Amount the company holds.
        available: f64,
    },

    /// A mining parameter is unusable.
    #[error("invalid mining parameter {field}: {value}")]
    InvalidParameter {
        /// Parameter name.
        field: &'static str,
        /// Rejected value.
        value: f64,
    },
}
