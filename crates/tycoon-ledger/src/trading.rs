//! Position marking, liquidation and the open/close math.
//!
//! Only `OPEN` positions are marked. A position whose liquidation price is
//! crossed is force-closed with `pnl = -margin`, regardless of the
//! mark-to-market value at that instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tycoon_types::{CompanyId, Position, PositionId, PositionSide, PositionStatus};

use crate::LedgerError;

/// Instrument name for immediately settled spot trades.
pub const SPOT_INSTRUMENT: &str = "BTC_SPOT";

/// Tunables for the trading ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingParams {
    /// Fraction of margin lost at the liquidation price.
    pub liquidation_margin_fraction: f64,
}

impl Default for TradingParams {
    fn default() -> Self {
        Self {
            liquidation_margin_fraction: 0.8,
        }
    }
}

impl TradingParams {
    /// Rejects a fraction outside `(0, 1]`.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let f = self.liquidation_margin_fraction;
        if f > 0.0 && f <= 1.0 {
            Ok(())
        } else {
            Err(LedgerError::InvalidParameter {
                field: "trading.liquidation_margin_fraction",
                value: f,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Marking
// ---------------------------------------------------------------------------

/// Leveraged mark-to-market profit and loss.
pub fn mark_pnl(side: PositionSide, entry: f64, current: f64, quantity: f64, leverage: f64) -> f64 {
    let move_per_unit = match side {
        PositionSide::Long => current - entry,
        PositionSide::Short => entry - current,
    };
    move_per_unit * quantity * leverage
}

/// Whether `current` has crossed `liquidation_price` against `side`.
pub fn should_liquidate(side: PositionSide, current: f64, liquidation_price: f64) -> bool {
    match side {
        PositionSide::Long => current <= liquidation_price,
        PositionSide::Short => current >= liquidation_price,
    }
}

/// Result of marking one open position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkOutcome {
    /// Still open with a fresh mark.
    Marked {
        /// Mark-to-market pnl.
        pnl: f64,
    },
    /// Force-closed; the whole margin is lost.
    Liquidated {
        /// Always `-margin`.
        pnl: f64,
        /// Margin forfeited.
        margin: f64,
    },
}

/// Marks `position` against `current_price`.
///
/// Positions without a liquidation price are only marked, never liquidated.
pub fn mark_position(position: &Position, current_price: f64) -> Result<MarkOutcome, LedgerError> {
    ensure_open(position)?;
    let crossed = position
        .liquidation_price
        .is_some_and(|threshold| should_liquidate(position.side, current_price, threshold));
    if crossed {
        let margin = position.margin.unwrap_or(0.0);
        return Ok(MarkOutcome::Liquidated {
            pnl: -margin,
            margin,
        });
    }
    Ok(MarkOutcome::Marked {
        pnl: mark_pnl(
            position.side,
            position.entry_price,
            current_price,
            position.quantity,
            position.leverage,
        ),
    })
}

/// Applies `outcome` to `position`, stamping `closed_at` on liquidation.
pub fn apply_mark(position: &mut Position, outcome: MarkOutcome, at: DateTime<Utc>) {
    match outcome {
        MarkOutcome::Marked { pnl } => position.pnl = pnl,
        MarkOutcome::Liquidated { pnl, .. } => {
            position.pnl = pnl;
            position.status = PositionStatus::Liquidated;
            position.closed_at = Some(at);
        }
    }
}

fn ensure_open(position: &Position) -> Result<(), LedgerError> {
    if position.status == PositionStatus::Open {
        Ok(())
    } else {
        Err(LedgerError::PositionNotOpen {
            position_id: position.id,
            status: position.status,
        })
    }
}

// ---------------------------------------------------------------------------
// Opening and closing
// ---------------------------------------------------------------------------

/// Liquidation threshold fixed at open.
///
/// `entry * (1 - f / leverage)` for longs and `entry * (1 + f / leverage)`
/// for shorts, where `f` is the margin fraction (0.8 by default).
pub fn liquidation_price(
    params: &TradingParams,
    side: PositionSide,
    entry: f64,
    leverage: f64,
) -> Result<f64, LedgerError> {
    check_leverage(leverage)?;
    let offset = params.liquidation_margin_fraction / leverage;
    Ok(match side {
        PositionSide::Long => entry * (1.0 - offset),
        PositionSide::Short => entry * (1.0 + offset),
    })
}

/// Collateral needed to open: `quantity * entry / leverage`.
pub fn required_margin(quantity: f64, entry: f64, leverage: f64) -> Result<f64, LedgerError> {
    check_leverage(leverage)?;
    Ok(quantity * entry / leverage)
}

fn check_leverage(leverage: f64) -> Result<(), LedgerError> {
    if leverage >= 1.0 && leverage.is_finite() {
        Ok(())
    } else {
        Err(LedgerError::InvalidLeverage { leverage })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), LedgerError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(LedgerError::NotPositive { field, value })
    }
}

/// A request to open a position at the current price.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    /// Ordering company.
    pub company_id: CompanyId,
    /// Instrument; [`SPOT_INSTRUMENT`] settles immediately.
    pub instrument: String,
    /// Direction.
    pub side: PositionSide,
    /// Size in BTC.
    pub quantity: f64,
    /// Leverage; ignored for spot.
    pub leverage: f64,
}

/// A new position plus the balance changes it causes.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedPosition {
    /// The position to persist.
    pub position: Position,
    /// Change to the company's USD balance.
    pub usd_delta: f64,
    /// Change to the company's BTC balance.
    pub btc_delta: f64,
}

/// Builds the position for `order` filled at `price`.
///
/// Spot buys swap USD for BTC, spot sells swap BTC for USD; both are
/// recorded already `CLOSED`. Anything else is leveraged: margin is
/// debited and the position opens with a fixed liquidation price.
pub fn open_position(
    params: &TradingParams,
    order: &OpenOrder,
    price: f64,
    usd_balance: f64,
    btc_balance: f64,
    now: DateTime<Utc>,
) -> Result<OpenedPosition, LedgerError> {
    check_positive("quantity", order.quantity)?;
    check_positive("price", price)?;
    let notional = order.quantity * price;

    let mut position = Position {
        id: PositionId::new(),
        company_id: order.company_id,
        instrument: order.instrument.clone(),
        side: order.side,
        quantity: order.quantity,
        entry_price: price,
        leverage: 1.0,
        margin: None,
        liquidation_price: None,
        status: PositionStatus::Closed,
        pnl: 0.0,
        opened_at: now,
        closed_at: Some(now),
    };

    if order.instrument == SPOT_INSTRUMENT {
        let (usd_delta, btc_delta) = match order.side {
            PositionSide::Long => {
                require("USD", notional, usd_balance)?;
                (-notional, order.quantity)
            }
            PositionSide::Short => {
                require("BTC", order.quantity, btc_balance)?;
                (notional, -order.quantity)
            }
        };
        return Ok(OpenedPosition {
            position,
            usd_delta,
            btc_delta,
        });
    }

    let margin = required_margin(order.quantity, price, order.leverage)?;
    require("USD", margin, usd_balance)?;
    position.leverage = order.leverage;
    position.margin = Some(margin);
    position.liquidation_price = Some(liquidation_price(params, order.side, price, order.leverage)?);
    position.status = PositionStatus::Open;
    position.closed_at = None;

    Ok(OpenedPosition {
        position,
        usd_delta: -margin,
        btc_delta: 0.0,
    })
}

fn require(asset: &'static str, required: f64, available: f64) -> Result<(), LedgerError> {
    if available >= required {
        Ok(())
    } else {
        Err(LedgerError::InsufficientFunds {
            asset,
            required,
            available,
        })
    }
}

/// Realized outcome of closing an open position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    /// Realized pnl.
    pub pnl: f64,
    /// USD returned to the company: `margin + pnl`.
    pub returned: f64,
}

/// Settles `position` at `current_price` on the owner's request.
pub fn settle_close(position: &Position, current_price: f64) -> Result<Settlement, LedgerError> {
    ensure_open(position)?;
    let pnl = mark_pnl(
        position.side,
        position.entry_price,
        current_price,
        position.quantity,
        position.leverage,
    );
    Ok(Settlement {
        pnl,
        returned: position.margin.unwrap_or(0.0) + pnl,
    })
}
