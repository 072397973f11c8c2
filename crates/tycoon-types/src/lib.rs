//! Shared type definitions for the Tycoon simulation.
//!
//! Every crate in the workspace speaks in these types. Types that reach the
//! browser derive `ts-rs` so the dashboard gets matching `TypeScript`
//! definitions.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Enumeration types (regions, statuses, alert and event kinds)
//! - [`structs`] -- Entity structs and the shared [`TickState`]
//! - [`quest`] -- Closed set of quest requirement kinds

pub mod enums;
pub mod ids;
pub mod quest;
pub mod structs;

pub use enums::{
    AlertCategory, AlertType, EventKind, EventSeverity, Faction, ParseEnumError, PositionSide,
    PositionStatus, QuestCategory, QuestStatus, QuestType, Region, ResearchStatus, RigStatus,
};
pub use ids::{
    AlertId, CompanyId, CompanyQuestId, ContractId, EventId, PositionId, QuestId, ResearchId,
    RigId, SiteId, UserId,
};
pub use quest::{QuestRequirement, RequirementKind};
pub use structs::{
    Alert, Balances, Company, CompanyQuest, CompanyUpdate, EnergyContract, Event, Position,
    Quest, QuestRewards, RegionalData, Reputation, Research, Rig, Site, TickSnapshot, TickState,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // Files land in `bindings/` relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::UserId::export_all();
        let _ = crate::ids::CompanyId::export_all();
        let _ = crate::ids::SiteId::export_all();
        let _ = crate::ids::RigId::export_all();
        let _ = crate::ids::ContractId::export_all();
        let _ = crate::ids::PositionId::export_all();
        let _ = crate::ids::ResearchId::export_all();
        let _ = crate::ids::QuestId::export_all();
        let _ = crate::ids::CompanyQuestId::export_all();
        let _ = crate::ids::AlertId::export_all();
        let _ = crate::ids::EventId::export_all();

        // Enums
        let _ = crate::enums::Region::export_all();
        let _ = crate::enums::RigStatus::export_all();
        let _ = crate::enums::PositionSide::export_all();
        let _ = crate::enums::PositionStatus::export_all();
        let _ = crate::enums::ResearchStatus::export_all();
        let _ = crate::enums::QuestStatus::export_all();
        let _ = crate::enums::QuestType::export_all();
        let _ = crate::enums::QuestCategory::export_all();
        let _ = crate::enums::Faction::export_all();
        let _ = crate::enums::AlertType::export_all();
        let _ = crate::enums::AlertCategory::export_all();
        let _ = crate::enums::EventKind::export_all();
        let _ = crate::enums::EventSeverity::export_all();
        let _ = crate::quest::RequirementKind::export_all();

        // Structs
        let _ = crate::structs::RegionalData::export_all();
        let _ = crate::structs::TickState::export_all();
        let _ = crate::structs::Reputation::export_all();
        let _ = crate::structs::Company::export_all();
        let _ = crate::structs::CompanyUpdate::export_all();
        let _ = crate::structs::Balances::export_all();
        let _ = crate::structs::Site::export_all();
        let _ = crate::structs::Rig::export_all();
        let _ = crate::structs::EnergyContract::export_all();
        let _ = crate::structs::Position::export_all();
        let _ = crate::structs::Research::export_all();
        let _ = crate::structs::QuestRewards::export_all();
        let _ = crate::structs::Quest::export_all();
        let _ = crate::structs::CompanyQuest::export_all();
        let _ = crate::quest::QuestRequirement::export_all();
        let _ = crate::structs::Alert::export_all();
        let _ = crate::structs::Event::export_all();
    }
}
