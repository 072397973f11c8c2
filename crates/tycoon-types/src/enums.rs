//! Enumeration types for the Tycoon simulation.
//!
//! Every enum serializes as `SCREAMING_SNAKE_CASE` both on the wire and in
//! the database, so `Region::UsWest` is `"US_WEST"` everywhere. The
//! [`as_str`](Region::as_str) / [`FromStr`] pair is used by the persistence
//! layer to map TEXT columns.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A string did not name any variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    /// Name of the enum that failed to parse.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Implements `as_str`, [`Display`](fmt::Display) and [`FromStr`] for a
/// fieldless enum from a single variant/string table.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The canonical upper-case name used on the wire and in storage.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

/// A geographic zone with its own energy price, temperature and reliability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum Region {
    /// Western United States.
    UsWest,
    /// Eastern United States.
    UsEast,
    /// Europe.
    Europe,
    /// Asia.
    Asia,
    /// South America.
    SouthAmerica,
}

text_enum!(Region {
    UsWest => "US_WEST",
    UsEast => "US_EAST",
    Europe => "EUROPE",
    Asia => "ASIA",
    SouthAmerica => "SOUTH_AMERICA",
});

// ---------------------------------------------------------------------------
// Mining
// ---------------------------------------------------------------------------

/// Operational status of a rig. Only `Active` rigs hash, draw power and wear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum RigStatus {
    /// Hashing.
    Active,
    /// Powered down by the owner.
    Offline,
    /// Pulled for maintenance.
    Maintenance,
    /// Failed hardware.
    Broken,
}

text_enum!(RigStatus {
    Active => "ACTIVE",
    Offline => "OFFLINE",
    Maintenance => "MAINTENANCE",
    Broken => "BROKEN",
});

// ---------------------------------------------------------------------------
// Trading
// ---------------------------------------------------------------------------

/// Direction of a trading position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum PositionSide {
    /// Profits when the price rises.
    Long,
    /// Profits when the price falls.
    Short,
}

text_enum!(PositionSide {
    Long => "LONG",
    Short => "SHORT",
});

/// Lifecycle state of a position. `Closed` and `Liquidated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum PositionStatus {
    /// Leveraged and marked every tick.
    Open,
    /// Settled by the owner (or a spot trade).
    Closed,
    /// Force-closed by the position marker.
    Liquidated,
}

text_enum!(PositionStatus {
    Open => "OPEN",
    Closed => "CLOSED",
    Liquidated => "LIQUIDATED",
});

impl PositionStatus {
    /// Whether the position can no longer change.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Liquidated)
    }
}

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

/// State of a research row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum ResearchStatus {
    /// Advancing each tick.
    InProgress,
    /// Reached 100 progress. Immutable.
    Completed,
}

text_enum!(ResearchStatus {
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
});

/// State of a company's enrolment in a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum QuestStatus {
    /// Requirements not yet all met.
    Active,
    /// All requirements met in one evaluation pass.
    Completed,
}

text_enum!(QuestStatus {
    Active => "ACTIVE",
    Completed => "COMPLETED",
});

/// Cadence class of a quest definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum QuestType {
    /// Tutorial chain, enrolled automatically.
    Main,
    /// Resets daily.
    Daily,
    /// Resets weekly.
    Weekly,
}

text_enum!(QuestType {
    Main => "MAIN",
    Daily => "DAILY",
    Weekly => "WEEKLY",
});

/// Thematic grouping of quests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum QuestCategory {
    /// Sites, rigs and hashrate.
    Mining,
    /// Positions and trades.
    Trading,
    /// Research tree.
    Research,
    /// Factions and reputation.
    Governance,
}

text_enum!(QuestCategory {
    Mining => "MINING",
    Trading => "TRADING",
    Research => "RESEARCH",
    Governance => "GOVERNANCE",
});

/// One of the four factions a company holds reputation with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum Faction {
    /// Mining guild.
    Miners,
    /// Trading desks.
    Traders,
    /// Regulators.
    Regulators,
    /// Anarchists.
    Anarchists,
}

text_enum!(Faction {
    Miners => "MINERS",
    Traders => "TRADERS",
    Regulators => "REGULATORS",
    Anarchists => "ANARCHISTS",
});

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum AlertType {
    /// Informational.
    Info,
    /// Needs attention soon.
    Warning,
    /// Something was lost.
    Critical,
}

text_enum!(AlertType {
    Info => "INFO",
    Warning => "WARNING",
    Critical => "CRITICAL",
});

/// Subsystem an alert originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum AlertCategory {
    /// Balances, quests and general notices.
    System,
    /// Positions and liquidations.
    Trading,
    /// Research tree.
    Research,
}

text_enum!(AlertCategory {
    System => "SYSTEM",
    Trading => "TRADING",
    Research => "RESEARCH",
});

/// Narrative world event catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// Grid failure in a region.
    PowerOutage,
    /// Sharp market swings.
    MarketVolatility,
    /// Sudden difficulty jump.
    DifficultySpike,
    /// Supply chain disruption for rigs.
    HardwareShortage,
}

text_enum!(EventKind {
    PowerOutage => "POWER_OUTAGE",
    MarketVolatility => "MARKET_VOLATILITY",
    DifficultySpike => "DIFFICULTY_SPIKE",
    HardwareShortage => "HARDWARE_SHORTAGE",
});

impl EventKind {
    /// Human-readable label, e.g. `"power outage"`.
    pub fn label(self) -> String {
        self.as_str().replace('_', " ").to_lowercase()
    }
}

/// Impact grade of a world event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum EventSeverity {
    /// Minor.
    Low,
    /// Noticeable.
    Medium,
    /// Severe.
    High,
}

text_enum!(EventSeverity {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn region_text_matches_serde() {
        for region in Region::ALL {
            let json = serde_json::to_string(region).unwrap();
            assert_eq!(json, format!("\"{}\"", region.as_str()));
            assert_eq!(region.as_str().parse::<Region>().unwrap(), *region);
        }
    }

    #[test]
    fn unknown_text_is_rejected() {
        let err = "MARS".parse::<Region>().unwrap_err();
        assert_eq!(err.kind, "Region");
        assert_eq!(err.value, "MARS");
    }

    #[test]
    fn terminal_position_states() {
        assert!(!PositionStatus::Open.is_terminal());
        assert!(PositionStatus::Closed.is_terminal());
        assert!(PositionStatus::Liquidated.is_terminal());
    }

    #[test]
    fn event_label_is_lowercase_words() {
        assert_eq!(EventKind::PowerOutage.label(), "power outage");
        assert_eq!(EventKind::MarketVolatility.label(), "market volatility");
    }
}
