//! Typed quest requirements.
//!
//! Requirement keys form a closed set. A quest definition naming a key
//! outside [`RequirementKind`] fails to deserialize or parse, so unknown
//! requirements are caught when the quest is loaded rather than ignored
//! during evaluation.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Faction, ParseEnumError};

/// What a quest requirement measures about a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RequirementKind {
    /// Sum of nameplate hashrate over all rigs.
    TotalHashrate,
    /// Number of sites.
    SiteCount,
    /// Number of rigs.
    RigCount,
    /// USD balance.
    UsdBalance,
    /// BTC balance.
    BtcBalance,
    /// BTC mined. Measured as the BTC balance.
    BtcMined,
    /// Number of closed positions.
    TradesCompleted,
    /// Number of closed positions with positive pnl.
    ProfitableTrades,
    /// Number of completed research nodes.
    ResearchCompleted,
    /// Reputation with the miners.
    ReputationMiners,
    /// Reputation with the traders.
    ReputationTraders,
    /// Reputation with the regulators.
    ReputationRegulators,
    /// Reputation with the anarchists.
    ReputationAnarchists,
    /// Highest reputation across all factions.
    AnyReputation,
}

impl RequirementKind {
    /// Every requirement kind.
    pub const ALL: &'static [Self] = &[
        Self::TotalHashrate,
        Self::SiteCount,
        Self::RigCount,
        Self::UsdBalance,
        Self::BtcBalance,
        Self::BtcMined,
        Self::TradesCompleted,
        Self::ProfitableTrades,
        Self::ResearchCompleted,
        Self::ReputationMiners,
        Self::ReputationTraders,
        Self::ReputationRegulators,
        Self::ReputationAnarchists,
        Self::AnyReputation,
    ];

    /// The requirement key as stored in quest definitions and progress maps.
    pub const fn key(self) -> &'static str {
        match self {
            Self::TotalHashrate => "total_hashrate",
            Self::SiteCount => "site_count",
            Self::RigCount => "rig_count",
            Self::UsdBalance => "usd_balance",
            Self::BtcBalance => "btc_balance",
            Self::BtcMined => "btc_mined",
            Self::TradesCompleted => "trades_completed",
            Self::ProfitableTrades => "profitable_trades",
            Self::ResearchCompleted => "research_completed",
            Self::ReputationMiners => "reputation_miners",
            Self::ReputationTraders => "reputation_traders",
            Self::ReputationRegulators => "reputation_regulators",
            Self::ReputationAnarchists => "reputation_anarchists",
            Self::AnyReputation => "any_reputation",
        }
    }

    /// The faction a reputation requirement refers to.
    pub const fn faction(self) -> Option<Faction> {
        match self {
            Self::ReputationMiners => Some(Faction::Miners),
            Self::ReputationTraders => Some(Faction::Traders),
            Self::ReputationRegulators => Some(Faction::Regulators),
            Self::ReputationAnarchists => Some(Faction::Anarchists),
            _ => None,
        }
    }
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RequirementKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "RequirementKind",
                value: s.to_owned(),
            })
    }
}

/// A single quest condition: `kind` must reach at least `target`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct QuestRequirement {
    /// What is measured.
    pub kind: RequirementKind,
    /// Minimum value that satisfies the requirement.
    pub target: f64,
}

impl QuestRequirement {
    /// Creates a requirement.
    pub const fn new(kind: RequirementKind, target: f64) -> Self {
        Self { kind, target }
    }

    /// Parses a `(key, target)` pair, rejecting unknown keys.
    pub fn parse(key: &str, target: f64) -> Result<Self, ParseEnumError> {
        Ok(Self::new(key.parse()?, target))
    }

    /// Whether `value` meets the target.
    pub fn is_met(&self, value: f64) -> bool {
        value >= self.target
    }
}
