//! Research and quest progression for the Tycoon simulation.
//!
//! # Modules
//!
//! - [`research`] -- Fixed per-tick research advancement
//! - [`quest`] -- Company aggregates and typed requirement evaluation
//! - [`catalog`] -- The starter quest set seeded on first boot

pub mod catalog;
pub mod quest;
pub mod research;

pub use catalog::starter_quests;
pub use quest::{CompanyAggregate, QuestEvaluation, completion_message, evaluate_quest};
pub use research::{ResearchParams, ResearchStep, advance_research};

use tycoon_types::{CompanyQuestId, QuestId, ResearchId, ResearchStatus};

/// Errors raised while advancing research or evaluating quests.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    /// Completed research is immutable.
    #[error("research {research_id} is {status}, not IN_PROGRESS")]
    ResearchNotInProgress {
        /// The offending row.
        research_id: ResearchId,
        /// Its current status.
        status: ResearchStatus,
    },

    /// A company quest was evaluated against the wrong definition.
    #[error("company quest {company_quest_id} tracks quest {expected}, not {actual}")]
    QuestMismatch {
        /// The enrolment being evaluated.
        company_quest_id: CompanyQuestId,
        /// Quest the enrolment references.
        expected: QuestId,
        /// Quest definition supplied.
        actual: QuestId,
    },

    /// A research increment was not positive.
    #[error("research.progress_per_tick must be positive, got {value}")]
    InvalidIncrement {
        /// Rejected increment.
        value: f64,
    },
}
