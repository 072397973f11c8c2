//! Typed quest evaluation.
//!
//! A company's live state is folded into a [`CompanyAggregate`] once per
//! evaluation pass; every requirement of every active quest is then
//! measured against that same aggregate, so the conjunction is evaluated
//! over one consistent view.

use std::collections::BTreeMap;

use tycoon_types::{
    Company, CompanyQuest, Position, PositionStatus, Quest, QuestStatus, RequirementKind,
    Reputation, Research, ResearchStatus, Rig, Site,
};

use crate::ProgressError;

/// The measurable state of one company.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompanyAggregate {
    /// Sum of nameplate hashrate over every rig, regardless of status.
    pub total_hashrate: f64,
    /// Number of sites.
    pub site_count: usize,
    /// Number of rigs.
    pub rig_count: usize,
    /// USD balance.
    pub usd_balance: f64,
    /// BTC balance.
    pub btc_balance: f64,
    /// Closed positions.
    pub trades_completed: usize,
    /// Closed positions with positive pnl.
    pub profitable_trades: usize,
    /// Completed research nodes.
    pub research_completed: usize,
    /// Faction standings.
    pub reputation: Reputation,
}

impl CompanyAggregate {
    /// Builds the aggregate from a company's entities.
    pub fn collect(
        company: &Company,
        sites: &[Site],
        rigs: &[Rig],
        positions: &[Position],
        research: &[Research],
    ) -> Self {
        let closed = positions
            .iter()
            .filter(|p| p.status == PositionStatus::Closed);
        Self {
            total_hashrate: rigs.iter().map(|r| r.hashrate).sum(),
            site_count: sites.len(),
            rig_count: rigs.len(),
            usd_balance: company.usd_balance,
            btc_balance: company.btc_balance,
            trades_completed: closed.clone().count(),
            profitable_trades: closed.filter(|p| p.pnl > 0.0).count(),
            research_completed: research
                .iter()
                .filter(|r| r.status == ResearchStatus::Completed)
                .count(),
            reputation: company.reputation,
        }
    }

    /// Current value of one requirement kind.
    #[allow(clippy::cast_precision_loss)]
    pub fn measure(&self, kind: RequirementKind) -> f64 {
        match kind {
            RequirementKind::TotalHashrate => self.total_hashrate,
            RequirementKind::SiteCount => self.site_count as f64,
            RequirementKind::RigCount => self.rig_count as f64,
            RequirementKind::UsdBalance => self.usd_balance,
            RequirementKind::BtcBalance | RequirementKind::BtcMined => self.btc_balance,
            RequirementKind::TradesCompleted => self.trades_completed as f64,
            RequirementKind::ProfitableTrades => self.profitable_trades as f64,
            RequirementKind::ResearchCompleted => self.research_completed as f64,
            RequirementKind::AnyReputation => self.reputation.max(),
            RequirementKind::ReputationMiners
            | RequirementKind::ReputationTraders
            | RequirementKind::ReputationRegulators
            | RequirementKind::ReputationAnarchists => kind
                .faction()
                .map_or(0.0, |faction| self.reputation.get(faction)),
        }
    }
}

/// Result of evaluating one company quest.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestEvaluation {
    /// Measured value per requirement key.
    pub progress: BTreeMap<String, f64>,
    /// Whether every requirement is met.
    pub all_met: bool,
    /// Whether this pass moved the quest from `ACTIVE` to `COMPLETED`.
    pub newly_completed: bool,
}

impl QuestEvaluation {
    /// Status to store after this pass.
    pub const fn status(&self) -> QuestStatus {
        if self.all_met {
            QuestStatus::Completed
        } else {
            QuestStatus::Active
        }
    }
}

/// Measures every requirement of `quest` for `enrolment`.
pub fn evaluate_quest(
    enrolment: &CompanyQuest,
    quest: &Quest,
    aggregate: &CompanyAggregate,
) -> Result<QuestEvaluation, ProgressError> {
    if enrolment.quest_id != quest.id {
        return Err(ProgressError::QuestMismatch {
            company_quest_id: enrolment.id,
            expected: enrolment.quest_id,
            actual: quest.id,
        });
    }

    let mut progress = BTreeMap::new();
    let mut all_met = true;
    for requirement in &quest.requirements {
        let current = aggregate.measure(requirement.kind);
        progress.insert(requirement.kind.key().to_owned(), current);
        all_met &= requirement.is_met(current);
    }

    Ok(QuestEvaluation {
        progress,
        all_met,
        newly_completed: all_met && enrolment.status != QuestStatus::Completed,
    })
}

/// Alert text for a quest whose requirements were just met.
pub fn completion_message(quest: &Quest) -> String {
    format!("Quest completed: {}! Claim your reward.", quest.title)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use chrono::Utc;
    use tycoon_types::{
        CompanyId, CompanyQuestId, Faction, PositionId, PositionSide, QuestCategory, QuestId,
        QuestRequirement, QuestRewards, QuestType, RigId, RigStatus, SiteId, UserId,
    };

    use super::*;

    fn company() -> Company {
        Company {
            id: CompanyId::new(),
            user_id: UserId::new(),
            name: "Hashco".to_owned(),
            usd_balance: 10_000.0,
            btc_balance: 0.02,
            reputation: Reputation::default(),
            created_at: Utc::now(),
        }
    }

    fn site(company_id: CompanyId) -> Site {
        Site {
            id: SiteId::new(),
            company_id,
            name: "Texas".to_owned(),
            region: tycoon_types::Region::UsEast,
            uptime: 99.0,
            total_hashrate: 0.0,
            power_usage: 0.0,
            created_at: Utc::now(),
        }
    }

    fn rig(site_id: SiteId, hashrate: f64, status: RigStatus) -> Rig {
        Rig {
            id: RigId::new(),
            site_id,
            model: "WHATSMINER_M50".to_owned(),
            hashrate,
            efficiency: 26.0,
            wear: 0.0,
            status,
            created_at: Utc::now(),
        }
    }

    fn closed_trade(company_id: CompanyId, pnl: f64, status: PositionStatus) -> Position {
        Position {
            id: PositionId::new(),
            company_id,
            instrument: "BTC_SPOT".to_owned(),
            side: PositionSide::Long,
            quantity: 0.1,
            entry_price: 40_000.0,
            leverage: 1.0,
            margin: None,
            liquidation_price: None,
            status,
            pnl,
            opened_at: Utc::now(),
            closed_at: Some(Utc::now()),
        }
    }

    fn quest(requirements: Vec<QuestRequirement>) -> Quest {
        Quest {
            id: QuestId::new(),
            title: "Setup".to_owned(),
            description: String::new(),
            quest_type: QuestType::Main,
            category: QuestCategory::Mining,
            requirements,
            rewards: QuestRewards::default(),
            starts_at: None,
            ends_at: None,
        }
    }

    fn enrol(company_id: CompanyId, quest: &Quest) -> CompanyQuest {
        CompanyQuest {
            id: CompanyQuestId::new(),
            company_id,
            quest_id: quest.id,
            status: QuestStatus::Active,
            progress: BTreeMap::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn aggregate_counts_match_original_rules() {
        let c = company();
        let s = site(c.id);
        let rigs = [
            rig(s.id, 110.0, RigStatus::Active),
            rig(s.id, 86.0, RigStatus::Broken),
        ];
        let positions = [
            closed_trade(c.id, 50.0, PositionStatus::Closed),
            closed_trade(c.id, -10.0, PositionStatus::Closed),
            closed_trade(c.id, -500.0, PositionStatus::Liquidated),
        ];
        let agg = CompanyAggregate::collect(&c, &[s], &rigs, &positions, &[]);

        assert_eq!(agg.measure(RequirementKind::TotalHashrate), 196.0);
        assert_eq!(agg.measure(RequirementKind::RigCount), 2.0);
        assert_eq!(agg.measure(RequirementKind::SiteCount), 1.0);
        assert_eq!(agg.measure(RequirementKind::TradesCompleted), 2.0);
        assert_eq!(agg.measure(RequirementKind::ProfitableTrades), 1.0);
        assert_eq!(agg.measure(RequirementKind::BtcMined), 0.02);
        assert_eq!(agg.measure(RequirementKind::ResearchCompleted), 0.0);
    }

    #[test]
    fn reputation_requirements() {
        let mut c = company();
        c.reputation.adjust(Faction::Anarchists, 30.0);
        let agg = CompanyAggregate::collect(&c, &[], &[], &[], &[]);
        assert_eq!(agg.measure(RequirementKind::ReputationAnarchists), 80.0);
        assert_eq!(agg.measure(RequirementKind::ReputationMiners), 50.0);
        assert_eq!(agg.measure(RequirementKind::AnyReputation), 80.0);
    }

    #[test]
    fn one_of_two_requirements_keeps_quest_active() {
        let c = company();
        let q = quest(vec![
            QuestRequirement::new(RequirementKind::SiteCount, 1.0),
            QuestRequirement::new(RequirementKind::RigCount, 1.0),
        ]);
        let enrolment = enrol(c.id, &q);
        let s = site(c.id);

        let only_site = CompanyAggregate::collect(&c, &[s.clone()], &[], &[], &[]);
        let eval = evaluate_quest(&enrolment, &q, &only_site).unwrap();
        assert!(!eval.all_met);
        assert_eq!(eval.status(), QuestStatus::Active);
        assert_eq!(eval.progress.get("site_count"), Some(&1.0));
        assert_eq!(eval.progress.get("rig_count"), Some(&0.0));

        let rigs = [rig(s.id, 110.0, RigStatus::Active)];
        let both = CompanyAggregate::collect(&c, &[s], &rigs, &[], &[]);
        let eval = evaluate_quest(&enrolment, &q, &both).unwrap();
        assert!(eval.all_met);
        assert!(eval.newly_completed);
        assert_eq!(eval.status(), QuestStatus::Completed);
    }

    #[test]
    fn already_completed_is_not_newly_completed() {
        let c = company();
        let q = quest(vec![QuestRequirement::new(RequirementKind::UsdBalance, 100.0)]);
        let mut enrolment = enrol(c.id, &q);
        enrolment.status = QuestStatus::Completed;
        let agg = CompanyAggregate::collect(&c, &[], &[], &[], &[]);
        let eval = evaluate_quest(&enrolment, &q, &agg).unwrap();
        assert!(eval.all_met);
        assert!(!eval.newly_completed);
    }

    #[test]
    fn mismatched_definition_is_rejected() {
        let c = company();
        let q = quest(Vec::new());
        let other = quest(Vec::new());
        let enrolment = enrol(c.id, &q);
        let agg = CompanyAggregate::collect(&c, &[], &[], &[], &[]);
        assert!(matches!(
            evaluate_quest(&enrolment, &other, &agg),
            Err(ProgressError::QuestMismatch { .. })
        ));
    }

    #[test]
    fn completion_message_mentions_title() {
        let q = quest(Vec::new());
        assert_eq!(completion_message(&q), "Quest completed: Setup! Claim your reward.");
    }
}
