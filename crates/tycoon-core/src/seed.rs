//! Starter quest catalog seeding and enrolment.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::info;
use tycoon_db::{CompanyQuestFilter, DbError, Store};
use tycoon_progress::starter_quests;
use tycoon_types::{CompanyId, CompanyQuest, CompanyQuestId, QuestStatus, QuestType};

/// Insert the starter catalog when no quest exists yet. Returns how many
/// quests were inserted.
///
/// # Errors
///
/// Propagates the first failed read or insert.
pub async fn seed_quests<S: Store + ?Sized>(
    store: &S,
    now: DateTime<Utc>,
) -> Result<usize, DbError> {
    if !store.list_quests().await?.is_empty() {
        info!("Quests already seeded");
        return Ok(0);
    }
    let mut inserted = 0_usize;
    for quest in starter_quests(now) {
        store.create_quest(quest).await?;
        inserted = inserted.saturating_add(1);
    }
    info!(count = inserted, "Seeded starter quests");
    Ok(inserted)
}

/// Enrol `company_id` in every `MAIN` quest, unless it already has any
/// enrolment. Returns how many enrolments were created.
///
/// # Errors
///
/// Propagates the first failed read or insert.
pub async fn create_starter_quests<S: Store + ?Sized>(
    store: &S,
    company_id: CompanyId,
    now: DateTime<Utc>,
) -> Result<usize, DbError> {
    let existing = store
        .list_company_quests(CompanyQuestFilter {
            company_id: Some(company_id),
            status: None,
        })
        .await?;
    if !existing.is_empty() {
        return Ok(0);
    }

    let mut enrolled = 0_usize;
    for quest in store.list_quests().await? {
        if quest.quest_type != QuestType::Main {
            continue;
        }
        store
            .create_company_quest(CompanyQuest {
                id: CompanyQuestId::new(),
                company_id,
                quest_id: quest.id,
                status: QuestStatus::Active,
                progress: BTreeMap::new(),
                started_at: now,
                completed_at: None,
            })
            .await?;
        enrolled = enrolled.saturating_add(1);
    }
    Ok(enrolled)
}
