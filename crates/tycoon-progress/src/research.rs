//! Research advancement.
//!
//! Each `IN_PROGRESS` row gains a fixed increment per tick. The row that
//! reaches 100 is completed exactly once and never changes afterward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tycoon_types::{Research, ResearchStatus};

use crate::ProgressError;

/// Progress value at which research completes.
pub const COMPLETE: f64 = 100.0;

/// Tunables for research.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchParams {
    /// Progress gained per tick.
    pub progress_per_tick: f64,
}

impl Default for ResearchParams {
    fn default() -> Self {
        Self {
            progress_per_tick: 0.1,
        }
    }
}

impl ResearchParams {
    /// Rejects a non-positive increment.
    pub fn validate(&self) -> Result<(), ProgressError> {
        if self.progress_per_tick > 0.0 && self.progress_per_tick.is_finite() {
            Ok(())
        } else {
            Err(ProgressError::InvalidIncrement {
                value: self.progress_per_tick,
            })
        }
    }
}

/// Outcome of advancing one research row by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResearchStep {
    /// Still in progress.
    Advanced {
        /// New progress.
        progress: f64,
    },
    /// Reached 100 on this tick.
    Completed {
        /// Completion time.
        at: DateTime<Utc>,
    },
}

/// Advances `research` by one tick.
pub fn advance_research(
    research: &Research,
    params: &ResearchParams,
    now: DateTime<Utc>,
) -> Result<ResearchStep, ProgressError> {
    if research.status != ResearchStatus::InProgress {
        return Err(ProgressError::ResearchNotInProgress {
            research_id: research.id,
            status: research.status,
        });
    }
    let progress = (research.progress + params.progress_per_tick).min(COMPLETE);
    if progress >= COMPLETE {
        Ok(ResearchStep::Completed { at: now })
    } else {
        Ok(ResearchStep::Advanced { progress })
    }
}

impl ResearchStep {
    /// Writes the step into `research`.
    pub fn apply(self, research: &mut Research) {
        match self {
            Self::Advanced { progress } => research.progress = progress,
            Self::Completed { at } => {
                research.progress = COMPLETE;
                research.status = ResearchStatus::Completed;
                research.completed_at = Some(at);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use tycoon_types::{CompanyId, ResearchId};

    use super::*;

    fn row(progress: f64) -> Research {
        Research {
            id: ResearchId::new(),
            company_id: CompanyId::new(),
            node_id: "immersion_cooling".to_owned(),
            status: ResearchStatus::InProgress,
            progress,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn advances_by_increment() {
        let step = advance_research(&row(10.0), &ResearchParams::default(), Utc::now()).unwrap();
        assert!(matches!(
            step,
            ResearchStep::Advanced { progress } if (progress - 10.1).abs() < 1e-9
        ));
    }

    #[test]
    fn completes_exactly_once() {
        let mut research = row(99.95);
        let now = Utc::now();
        let step = advance_research(&research, &ResearchParams::default(), now).unwrap();
        assert_eq!(step, ResearchStep::Completed { at: now });

        step.apply(&mut research);
        assert_eq!(research.progress, 100.0);
        assert_eq!(research.status, ResearchStatus::Completed);
        assert_eq!(research.completed_at, Some(now));

        assert!(matches!(
            advance_research(&research, &ResearchParams::default(), now),
            Err(ProgressError::ResearchNotInProgress { .. })
        ));
    }

    #[test]
    fn thousand_ticks_complete_a_node() {
        let params = ResearchParams::default();
        let mut research = row(0.0);
        let mut ticks = 0_u32;
        while research.status == ResearchStatus::InProgress {
            advance_research(&research, &params, Utc::now())
                .unwrap()
                .apply(&mut research);
            ticks += 1;
        }
        assert!((999..=1001).contains(&ticks));
    }

    #[test]
    fn zero_increment_is_rejected() {
        let params = ResearchParams {
            progress_per_tick: 0.0,
        };
        assert!(params.validate().is_err());
    }
}
