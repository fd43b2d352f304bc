//! Mentorship Journal
//!
//! Per-account history of generated mentorships, plus the aggregation
//! behind the account's dashboard view.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::provider::MentorshipRecord;

/// One generated mentorship, bound to the account that requested it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MentorshipEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    /// The free-text challenge the user submitted
    pub challenge: String,
    pub record: MentorshipRecord,
    pub created_at: DateTime<Utc>,
}

impl MentorshipEntry {
    pub fn new(
        account_id: Uuid,
        challenge: impl Into<String>,
        record: MentorshipRecord,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            challenge: challenge.into(),
            record,
            created_at: now,
        }
    }
}

/// Storage contract for mentorship history
pub trait MentorshipJournal: Send + Sync {
    fn save(&self, entry: &MentorshipEntry) -> Result<()>;

    /// Entries for an account, newest first
    fn list_for_account(&self, account_id: Uuid) -> Result<Vec<MentorshipEntry>>;

    /// Owner-checked fetch: None when absent or owned by another account
    fn get(&self, id: Uuid, account_id: Uuid) -> Result<Option<MentorshipEntry>>;

    /// Owner-checked delete; false when absent or owned by another account
    fn delete(&self, id: Uuid, account_id: Uuid) -> Result<bool>;
}

/// In-memory journal (for development and tests)
pub struct MemoryJournal {
    entries: RwLock<HashMap<Uuid, MentorshipEntry>>,
}

impl Default for MemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl MentorshipJournal for MemoryJournal {
    fn save(&self, entry: &MentorshipEntry) -> Result<()> {
        let mut entries = self.entries.write().unwrap();
        entries.insert(entry.id, entry.clone());
        Ok(())
    }

    fn list_for_account(&self, account_id: Uuid) -> Result<Vec<MentorshipEntry>> {
        let entries = self.entries.read().unwrap();
        let mut list: Vec<MentorshipEntry> = entries
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    fn get(&self, id: Uuid, account_id: Uuid) -> Result<Option<MentorshipEntry>> {
        let entries = self.entries.read().unwrap();
        Ok(entries
            .get(&id)
            .filter(|e| e.account_id == account_id)
            .cloned())
    }

    fn delete(&self, id: Uuid, account_id: Uuid) -> Result<bool> {
        let mut entries = self.entries.write().unwrap();
        match entries.get(&id) {
            Some(entry) if entry.account_id == account_id => {
                entries.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Aggregated dashboard data for one account's history
#[derive(Clone, Debug, Default, Serialize)]
pub struct DashboardSummary {
    /// Days of the month with at least one entry
    pub registration_days: Vec<u32>,

    /// How often each theme appears across the history
    pub theme_frequency: HashMap<String, u64>,

    /// Entry ids grouped by day of the month
    pub entries_by_day: HashMap<u32, Vec<Uuid>>,

    /// The three most recent distinct themes
    pub recent_themes: Vec<String>,

    /// Headline naming the dominant theme, when any history exists
    pub latest_insight: Option<String>,
}

impl DashboardSummary {
    /// Build the summary from entries ordered newest first
    pub fn build(entries: &[MentorshipEntry]) -> Self {
        let mut registration_days: Vec<u32> = Vec::new();
        let mut theme_frequency: HashMap<String, u64> = HashMap::new();
        let mut entries_by_day: HashMap<u32, Vec<Uuid>> = HashMap::new();
        let mut recent_themes: Vec<String> = Vec::new();

        for entry in entries {
            let day = entry.created_at.day();
            if !registration_days.contains(&day) {
                registration_days.push(day);
            }
            entries_by_day.entry(day).or_default().push(entry.id);

            // Multi-theme entries arrive comma-separated.
            for theme in split_themes(&entry.record.identified_theme) {
                *theme_frequency.entry(theme.clone()).or_insert(0) += 1;
                if recent_themes.len() < 3 && !recent_themes.contains(&theme) {
                    recent_themes.push(theme);
                }
            }
        }

        let latest_insight = Self::build_insight(&theme_frequency);

        Self {
            registration_days,
            theme_frequency,
            entries_by_day,
            recent_themes,
            latest_insight,
        }
    }

    fn build_insight(theme_frequency: &HashMap<String, u64>) -> Option<String> {
        if theme_frequency.is_empty() {
            return None;
        }

        let main_theme = theme_frequency
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(theme, _)| theme.clone())?;
        let total: u64 = theme_frequency.values().sum();

        Some(format!(
            "You have {} mentorship entries in this period, and your main focus \
             has been {}. The Mentor suggests revisiting Psalm 23 for rest and \
             direction. Keep walking!",
            total, main_theme
        ))
    }
}

fn split_themes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
