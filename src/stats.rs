use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use chrono::{Datelike, Local};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{
    gamification,
    model::StudySession,
    planner::{self, EXAM_ANALYSIS_SUBJECT_ID, REVIEW_SUBJECT_ID},
    utils, DbPool,
};

/// Reported streaks saturate here; longer true streaks are not distinguished.
pub const STREAK_LOOKBACK_DAYS: i32 = 30;

/// Aggregates derived from the session ledger. Always recomputable, never
/// stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyStatistics {
    pub total_hours: f64,
    pub streak: i32,
    pub completed_sessions: i32,
    pub subject_hours: BTreeMap<String, f64>,
}

/// Day-of-cycle for today, with day 0 = Pazartesi.
pub fn today_day_index() -> i32 {
    Local::now().weekday().num_days_from_monday() as i32
}

/// Derives statistics from the ledger. Synthetic review/analysis sessions
/// count toward the totals but are not attributed to any subject.
pub fn compute(sessions: &[StudySession], today_day_index: i32) -> StudyStatistics {
    let mut total_minutes = 0i64;
    let mut completed_sessions = 0i32;
    let mut subject_hours: BTreeMap<String, f64> = BTreeMap::new();

    for s in sessions {
        if !s.completed {
            continue;
        }
        total_minutes += s.duration_min as i64;
        completed_sessions += 1;

        if s.subject_id != REVIEW_SUBJECT_ID && s.subject_id != EXAM_ANALYSIS_SUBJECT_ID {
            *subject_hours.entry(s.subject_name.clone()).or_insert(0.0) +=
                s.duration_min as f64 / 60.0;
        }
    }

    StudyStatistics {
        total_hours: total_minutes as f64 / 60.0,
        streak: streak(sessions, today_day_index),
        completed_sessions,
        subject_hours,
    }
}

/// Consecutive days with at least one completed session, walking backward
/// from today. Today itself not having a completion yet does not break the
/// streak, it just doesn't extend it.
fn streak(sessions: &[StudySession], today_day_index: i32) -> i32 {
    let mut day_done = [false; 7];
    for s in sessions {
        if s.completed {
            day_done[s.day_index.rem_euclid(7) as usize] = true;
        }
    }

    let mut streak = 0;
    for offset in 0..STREAK_LOOKBACK_DAYS {
        let day = (today_day_index - offset).rem_euclid(7) as usize;
        if day_done[day] {
            streak += 1;
        } else if offset > 0 {
            break;
        }
    }

    streak
}

// --- Handler ---

#[derive(Serialize)]
pub struct StatsResponse {
    pub stats: StudyStatistics,
    pub total_points: i32,
    pub level: i32,
    pub points_to_next_level: i32,
    /// Bonus points earned by today's completion rate.
    pub daily_bonus: i32,
    /// Bonus points earned by the week's completion percentage so far.
    pub weekly_bonus: i32,
}

pub async fn get_stats(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
) -> Result<Json<StatsResponse>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let sessions = planner::load_week(&mut conn, user_id).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;
    let today = today_day_index();
    let stats = compute(&sessions, today);

    let today_total = sessions.iter().filter(|s| s.day_index == today).count() as i32;
    let today_done = sessions
        .iter()
        .filter(|s| s.day_index == today && s.completed)
        .count() as i32;
    let week_pct = if sessions.is_empty() {
        0.0
    } else {
        stats.completed_sessions as f64 * 100.0 / sessions.len() as f64
    };

    let total_points = gamification::unlocked_points(&mut conn, user_id).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    Ok(Json(StatsResponse {
        stats,
        total_points,
        level: gamification::level_for_points(total_points),
        points_to_next_level: gamification::points_to_next_level(total_points),
        daily_bonus: gamification::daily_bonus(today_done, today_total),
        weekly_bonus: gamification::weekly_bonus(week_pct),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(slot_id: &str, subject: (&str, &str), day: i32, minutes: i32, done: bool) -> StudySession {
        StudySession {
            user_id: 1,
            slot_id: slot_id.to_string(),
            subject_id: subject.0.to_string(),
            subject_name: subject.1.to_string(),
            start_time: "09:00".to_string(),
            duration_min: minutes,
            day_index: day,
            completed: done,
        }
    }

    #[test]
    fn totals_from_completed_sessions() {
        // Three of four 90-minute sessions on day 0 done: 270 min = 4.5 h.
        let sessions = vec![
            session("0-0", ("1", "Matematik"), 0, 90, true),
            session("0-1", ("2", "Fizik"), 0, 90, true),
            session("0-2", ("1", "Matematik"), 0, 90, true),
            session("0-3", ("2", "Fizik"), 0, 90, false),
        ];

        let stats = compute(&sessions, 0);
        assert_eq!(stats.total_hours, 4.5);
        assert_eq!(stats.completed_sessions, 3);
        assert_eq!(stats.subject_hours["Matematik"], 3.0);
        assert_eq!(stats.subject_hours["Fizik"], 1.5);
    }

    #[test]
    fn synthetic_sessions_count_toward_totals_but_not_subjects() {
        let sessions = vec![
            session("6-review", (REVIEW_SUBJECT_ID, "Haftalık Tekrar"), 6, 120, true),
            session("0-3", (EXAM_ANALYSIS_SUBJECT_ID, "AYT Deneme Analizi"), 0, 90, true),
        ];

        let stats = compute(&sessions, 6);
        assert_eq!(stats.total_hours, 3.5);
        assert_eq!(stats.completed_sessions, 2);
        assert!(stats.subject_hours.is_empty());
    }

    #[test]
    fn empty_ledger_yields_zeroes() {
        let stats = compute(&[], 3);
        assert_eq!(stats.total_hours, 0.0);
        assert_eq!(stats.streak, 0);
        assert_eq!(stats.completed_sessions, 0);
        assert!(stats.subject_hours.is_empty());
    }

    #[test]
    fn streak_counts_consecutive_days_back_from_today() {
        // Completions on today (day 3) and the two days before, none earlier.
        let sessions = vec![
            session("3-0", ("1", "Matematik"), 3, 90, true),
            session("2-0", ("1", "Matematik"), 2, 90, true),
            session("1-0", ("1", "Matematik"), 1, 90, true),
            session("0-0", ("1", "Matematik"), 0, 90, false),
        ];

        assert_eq!(compute(&sessions, 3).streak, 3);
    }

    #[test]
    fn unfinished_today_does_not_break_the_streak() {
        let sessions = vec![
            session("2-0", ("1", "Matematik"), 2, 90, true),
            session("1-0", ("1", "Matematik"), 1, 90, true),
        ];

        // Today is day 3 with nothing completed yet: the two prior days
        // still count.
        assert_eq!(compute(&sessions, 3).streak, 2);
    }

    #[test]
    fn streak_saturates_at_the_lookback_cap() {
        let sessions: Vec<_> = (0..7)
            .map(|d| session(&format!("{d}-0"), ("1", "Matematik"), d, 90, true))
            .collect();

        assert_eq!(compute(&sessions, 0).streak, STREAK_LOOKBACK_DAYS);
    }

    #[test]
    fn marking_more_sessions_never_decreases_stats() {
        let mut sessions = vec![
            session("0-0", ("1", "Matematik"), 0, 90, true),
            session("0-1", ("2", "Fizik"), 0, 90, false),
        ];
        let before = compute(&sessions, 0);

        sessions[1].completed = true;
        let after = compute(&sessions, 0);

        assert!(after.total_hours >= before.total_hours);
        assert!(after.completed_sessions >= before.completed_sessions);
        assert!(after.subject_hours["Matematik"] >= before.subject_hours["Matematik"]);
        assert!(after.streak >= before.streak);
    }
}
