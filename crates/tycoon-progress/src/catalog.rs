//! Starter quest catalog.
//!
//! Seven `MAIN` quests walk a new company through mining, trading,
//! research and reputation. One `DAILY` and one `WEEKLY` quest are
//! windowed from the moment they are seeded.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tycoon_types::{
    Faction, Quest, QuestCategory, QuestId, QuestRequirement, QuestRewards, QuestType,
    RequirementKind,
};

struct Entry {
    quest_type: QuestType,
    category: QuestCategory,
    title: &'static str,
    description: &'static str,
    requirement: (RequirementKind, f64),
    usd: f64,
    btc: f64,
    reputation: Option<(Faction, f64)>,
    research_points: f64,
}

const CATALOG: &[Entry] = &[
    Entry {
        quest_type: QuestType::Main,
        category: QuestCategory::Mining,
        title: "First Mining Site",
        description: "Establish your first mining operation by creating a site",
        requirement: (RequirementKind::SiteCount, 1.0),
        usd: 5000.0,
        btc: 0.0,
        reputation: Some((Faction::Miners, 10.0)),
        research_points: 0.0,
    },
    Entry {
        quest_type: QuestType::Main,
        category: QuestCategory::Mining,
        title: "First Mining Rig",
        description: "Purchase and install your first mining rig",
        requirement: (RequirementKind::RigCount, 1.0),
        usd: 2500.0,
        btc: 0.0,
        reputation: Some((Faction::Miners, 5.0)),
        research_points: 0.0,
    },
    Entry {
        quest_type: QuestType::Main,
        category: QuestCategory::Mining,
        title: "Reach 100 TH/s",
        description: "Scale your mining operations to 100 TH/s total hashrate",
        requirement: (RequirementKind::TotalHashrate, 100.0),
        usd: 10_000.0,
        btc: 0.001,
        reputation: Some((Faction::Miners, 15.0)),
        research_points: 100.0,
    },
    Entry {
        quest_type: QuestType::Main,
        category: QuestCategory::Trading,
        title: "First Trade",
        description: "Execute your first trade on the market",
        requirement: (RequirementKind::TradesCompleted, 1.0),
        usd: 2500.0,
        btc: 0.0,
        reputation: Some((Faction::Traders, 10.0)),
        research_points: 0.0,
    },
    Entry {
        quest_type: QuestType::Main,
        category: QuestCategory::Trading,
        title: "Profitable Trader",
        description: "Complete a trade that results in profit",
        requirement: (RequirementKind::ProfitableTrades, 1.0),
        usd: 5000.0,
        btc: 0.0,
        reputation: Some((Faction::Traders, 15.0)),
        research_points: 50.0,
    },
    Entry {
        quest_type: QuestType::Main,
        category: QuestCategory::Research,
        title: "Research Milestone",
        description: "Complete your first research project",
        requirement: (RequirementKind::ResearchCompleted, 1.0),
        usd: 7500.0,
        btc: 0.0,
        reputation: None,
        research_points: 200.0,
    },
    Entry {
        quest_type: QuestType::Main,
        category: QuestCategory::Governance,
        title: "Community Builder",
        description: "Reach 75 reputation with any faction",
        requirement: (RequirementKind::AnyReputation, 75.0),
        usd: 10_000.0,
        btc: 0.002,
        reputation: None,
        research_points: 150.0,
    },
    Entry {
        quest_type: QuestType::Daily,
        category: QuestCategory::Mining,
        title: "Daily Mining Goal",
        description: "Mine 0.01 BTC today",
        requirement: (RequirementKind::BtcMined, 0.01),
        usd: 1000.0,
        btc: 0.0,
        reputation: Some((Faction::Miners, 5.0)),
        research_points: 25.0,
    },
    Entry {
        quest_type: QuestType::Weekly,
        category: QuestCategory::Trading,
        title: "Weekly Trading Challenge",
        description: "Complete 10 trades this week",
        requirement: (RequirementKind::TradesCompleted, 10.0),
        usd: 5000.0,
        btc: 0.001,
        reputation: Some((Faction::Traders, 10.0)),
        research_points: 100.0,
    },
];

/// Builds the starter quest set, windowing timed quests from `now`.
pub fn starter_quests(now: DateTime<Utc>) -> Vec<Quest> {
    CATALOG
        .iter()
        .map(|entry| {
            let window = match entry.quest_type {
                QuestType::Main => None,
                QuestType::Daily => Some(Duration::days(1)),
                QuestType::Weekly => Some(Duration::days(7)),
            };
            let (kind, target) = entry.requirement;
            Quest {
                id: QuestId::new(),
                title: entry.title.to_owned(),
                description: entry.description.to_owned(),
                quest_type: entry.quest_type,
                category: entry.category,
                requirements: vec![QuestRequirement::new(kind, target)],
                rewards: QuestRewards {
                    usd: entry.usd,
                    btc: entry.btc,
                    reputation: entry.reputation.into_iter().collect::<BTreeMap<_, _>>(),
                    research_points: entry.research_points,
                },
                starts_at: window.map(|_| now),
                ends_at: window.and_then(|w| now.checked_add_signed(w)),
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn nine_quests_seven_main() {
        let quests = starter_quests(Utc::now());
        assert_eq!(quests.len(), 9);
        let main = quests
            .iter()
            .filter(|q| q.quest_type == QuestType::Main)
            .count();
        assert_eq!(main, 7);
    }

    #[test]
    fn timed_quests_are_windowed() {
        let now = Utc::now();
        let quests = starter_quests(now);
        for quest in &quests {
            match quest.quest_type {
                QuestType::Main => assert!(quest.ends_at.is_none()),
                QuestType::Daily => assert_eq!(quest.ends_at, Some(now + Duration::days(1))),
                QuestType::Weekly => assert_eq!(quest.ends_at, Some(now + Duration::days(7))),
            }
        }
    }

    #[test]
    fn every_quest_has_a_requirement() {
        assert!(
            starter_quests(Utc::now())
                .iter()
                .all(|q| !q.requirements.is_empty())
        );
    }

    #[test]
    fn catalog_serializes_to_yaml() {
        let quests = starter_quests(Utc::now());
        let yaml = serde_yml::to_string(&quests);
        assert!(yaml.is_ok());
    }
}
