//! Sequential unlock and completion rules.
//!
//! Everything in this module is pure: it takes the ordered chapter list of a
//! course plus the student's completion records and derives unlock state,
//! admits or denies a completion attempt, and computes the course-level
//! completion summary. Nothing here touches the database, which keeps the
//! rules testable in isolation and guarantees the unlock state can never go
//! stale: it is recomputed from the chapter ordering on every read, so
//! reordering caused by a chapter deletion is reflected immediately.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Chapter, ChapterProgressView};

/// The accessibility state of one chapter for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterState {
    /// A predecessor chapter is still incomplete.
    Locked,
    /// Reachable but not yet completed. At most one chapter per course is in
    /// this state at a time (the frontier).
    Unlocked,
    /// Completed. Stays accessible for review.
    Completed,
}

/// Why a completion attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDenied {
    /// The chapter is not part of the course the caller resolved.
    UnknownChapter,
    /// The preceding chapter has not been completed yet.
    Locked,
    /// The chapter was already completed; completion is one-way.
    AlreadyCompleted,
}

/// Derives the state of every chapter in `chapters` (which must be in
/// `sequence_order`) against the set of completed chapter ids.
///
/// The first chapter is always reachable; each later chapter unlocks when its
/// immediate predecessor is completed. Ids in `completed` that do not occur in
/// `chapters` are ignored.
pub fn derive_states(chapters: &[Chapter], completed: &HashSet<Uuid>) -> Vec<ChapterState> {
    chapters
        .iter()
        .enumerate()
        .map(|(idx, chapter)| {
            if completed.contains(&chapter.id) {
                ChapterState::Completed
            } else if idx == 0 || completed.contains(&chapters[idx - 1].id) {
                ChapterState::Unlocked
            } else {
                ChapterState::Locked
            }
        })
        .collect()
}

/// Admits or denies an attempt to complete `chapter_id`.
///
/// Only the frontier chapter passes: the target must exist in the ordered
/// list, must not be completed already, and its predecessor (if any) must be
/// completed.
pub fn completion_gate(
    chapters: &[Chapter],
    completed: &HashSet<Uuid>,
    chapter_id: Uuid,
) -> Result<(), GateDenied> {
    let idx = chapters
        .iter()
        .position(|c| c.id == chapter_id)
        .ok_or(GateDenied::UnknownChapter)?;

    if completed.contains(&chapter_id) {
        return Err(GateDenied::AlreadyCompleted);
    }

    if idx > 0 && !completed.contains(&chapters[idx - 1].id) {
        return Err(GateDenied::Locked);
    }

    Ok(())
}

/// Completion percentage for `completed` out of `total` chapters, rounded
/// half-up to two decimal places. A course with no chapters reports 0.
pub fn completion_percentage(total: i64, completed: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let raw = (completed as f64 / total as f64) * 100.0;
    // f64::round is half-away-from-zero, which is half-up for non-negatives.
    (raw * 100.0).round() / 100.0
}

/// Course-level completion numbers for one student.
///
/// `is_complete` requires at least one chapter: an empty course can never be
/// finished, so it never becomes certificate-eligible either.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CompletionSummary {
    pub total_chapters: i64,
    pub completed_chapters: i64,
    pub percentage: f64,
    pub is_complete: bool,
}

impl CompletionSummary {
    pub fn new(total: i64, completed: i64) -> Self {
        CompletionSummary {
            total_chapters: total,
            completed_chapters: completed,
            percentage: completion_percentage(total, completed),
            // Integer comparison; the rounded percentage is display-only.
            is_complete: total > 0 && completed >= total,
        }
    }
}

/// Assembles the per-chapter view a student sees for one course: catalog
/// fields plus derived unlock/completion flags. `completed_at` maps completed
/// chapter ids to their completion timestamps.
pub fn chapter_views(
    chapters: &[Chapter],
    completed_at: &HashMap<Uuid, DateTime<Utc>>,
) -> Vec<ChapterProgressView> {
    let completed: HashSet<Uuid> = completed_at.keys().copied().collect();
    let states = derive_states(chapters, &completed);

    chapters
        .iter()
        .zip(states)
        .map(|(chapter, state)| ChapterProgressView {
            chapter_id: chapter.id,
            title: chapter.title.clone(),
            sequence_order: chapter.sequence_order,
            is_unlocked: state != ChapterState::Locked,
            is_completed: state == ChapterState::Completed,
            completed_at: completed_at.get(&chapter.id).copied(),
        })
        .collect()
}
