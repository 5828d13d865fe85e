use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

use crate::{
    model::{Subject, Track, User},
    planner::DAYS,
    schema::{subjects, users},
    utils, DbPool,
};

/// Relative importance of each subject per exam track.
pub(crate) fn track_weights(track: Track) -> &'static [(&'static str, f64)] {
    match track {
        Track::Sayisal => &[
            ("Matematik", 1.0),
            ("Geometri", 0.8),
            ("Fizik", 1.0),
            ("Kimya", 0.9),
            ("Biyoloji", 0.9),
            ("Türkçe", 0.6),
            ("Sosyal", 0.4),
            ("Yabancı Dil", 0.3),
        ],
        Track::Ea => &[
            ("Matematik", 1.0),
            ("Geometri", 0.9),
            ("Türkçe", 0.9),
            ("Sosyal", 0.8),
            ("Fizik", 0.4),
            ("Kimya", 0.4),
            ("Biyoloji", 0.4),
            ("Yabancı Dil", 0.3),
        ],
        Track::Sozel => &[
            ("Türkçe", 1.0),
            ("Sosyal", 1.0),
            ("Matematik", 0.5),
            ("Geometri", 0.5),
            ("Yabancı Dil", 0.4),
            ("Fizik", 0.2),
            ("Kimya", 0.2),
            ("Biyoloji", 0.2),
        ],
        Track::Dil => &[
            ("Yabancı Dil", 1.0),
            ("Türkçe", 0.7),
            ("Sosyal", 0.5),
            ("Matematik", 0.4),
            ("Geometri", 0.4),
            ("Fizik", 0.2),
            ("Kimya", 0.2),
            ("Biyoloji", 0.2),
        ],
    }
}

/// Weekend days carry a little more weight than weekdays.
const DAILY_BASE: [f64; 7] = [1.0, 1.0, 1.0, 1.0, 1.0, 1.2, 1.2];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Track weights boosted by proficiency gap and normalized to sum to 1.
/// A subject the user is weak in gets 12% extra weight per missing level;
/// the registry level is used where the subject name matches, the overall
/// level otherwise.
pub fn subject_weights(
    track: Track,
    registry_levels: &HashMap<String, i32>,
    overall_level: i32,
) -> Vec<(&'static str, f64)> {
    let mut weights: Vec<(&'static str, f64)> = track_weights(track)
        .iter()
        .map(|(name, base)| {
            let level = registry_levels
                .get(*name)
                .copied()
                .unwrap_or(overall_level)
                .clamp(1, 5);
            let gap = (6 - level) as f64;
            (*name, base.max(0.0) * (1.0 + gap * 0.12))
        })
        .collect();

    let total: f64 = weights.iter().map(|(_, w)| w).sum();
    let total = if total > 0.0 { total } else { 1.0 };
    for (_, w) in &mut weights {
        *w /= total;
    }

    weights
}

/// Splits the weekly hour budget over the track's subjects, 2-decimal
/// rounded per subject.
pub fn weekly_hours(
    track: Track,
    registry_levels: &HashMap<String, i32>,
    overall_level: i32,
    hours_per_week: i32,
) -> Vec<(&'static str, f64)> {
    subject_weights(track, registry_levels, overall_level)
        .into_iter()
        .map(|(name, w)| (name, round2(hours_per_week as f64 * w)))
        .collect()
}

/// Spreads one subject's weekly hours over the 7 days. The last day absorbs
/// the rounding remainder so the week reassembles the budget exactly.
pub fn daily_distribution(weekly: f64) -> [f64; 7] {
    let base_total: f64 = DAILY_BASE.iter().sum();
    let mut per_day = [0.0; 7];
    let mut allocated = 0.0;
    for (i, base) in DAILY_BASE.iter().enumerate().take(6) {
        per_day[i] = round2(weekly * base / base_total);
        allocated += per_day[i];
    }
    per_day[6] = round2(weekly - allocated);
    per_day
}

// --- Handler ---

#[derive(Serialize)]
pub struct DayHours {
    pub day: &'static str,
    pub hours: f64,
}

#[derive(Serialize)]
pub struct SubjectAllocation {
    pub name: &'static str,
    pub weekly_hours: f64,
    pub daily: Vec<DayHours>,
}

#[derive(Serialize)]
pub struct AllocationResponse {
    pub track: &'static str,
    pub hours_per_week: i32,
    pub subjects: Vec<SubjectAllocation>,
}

pub async fn get_allocation(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
) -> Result<Json<AllocationResponse>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let user = users::table
        .find(user_id)
        .select(User::as_select())
        .first::<User>(&mut conn)
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?;

    let registry_levels: HashMap<String, i32> = subjects::table
        .filter(subjects::user_id.eq(user_id))
        .select(Subject::as_select())
        .load::<Subject>(&mut conn)
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?
        .into_iter()
        .map(|s| (s.name, s.level))
        .collect();

    let track = user.track();
    let allocations = weekly_hours(track, &registry_levels, user.level, user.hours_per_week)
        .into_iter()
        .filter(|(_, hours)| *hours >= 0.01)
        .map(|(name, hours)| SubjectAllocation {
            name,
            weekly_hours: hours,
            daily: daily_distribution(hours)
                .iter()
                .zip(DAYS)
                .map(|(h, day)| DayHours { day, hours: *h })
                .collect(),
        })
        .collect();

    Ok(Json(AllocationResponse {
        track: track.as_str(),
        hours_per_week: user.hours_per_week,
        subjects: allocations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_normalize_to_one() {
        for track in [Track::Sayisal, Track::Ea, Track::Sozel, Track::Dil] {
            let weights = subject_weights(track, &HashMap::new(), 3);
            let total: f64 = weights.iter().map(|(_, w)| w).sum();
            assert!((total - 1.0).abs() < 1e-9, "{:?} sums to {}", track, total);
        }
    }

    #[test]
    fn weak_subjects_get_a_larger_share() {
        let even = subject_weights(Track::Sayisal, &HashMap::new(), 3);
        let mut levels = HashMap::new();
        levels.insert("Matematik".to_string(), 1);
        let boosted = subject_weights(Track::Sayisal, &levels, 3);

        let share = |ws: &[(&str, f64)]| {
            ws.iter().find(|(n, _)| *n == "Matematik").unwrap().1
        };
        assert!(share(&boosted) > share(&even));
    }

    #[test]
    fn weekly_hours_track_the_budget() {
        let hours = weekly_hours(Track::Ea, &HashMap::new(), 3, 30);
        let total: f64 = hours.iter().map(|(_, h)| h).sum();
        // Per-subject 2-decimal rounding can drift by at most half a cent
        // per subject.
        assert!((total - 30.0).abs() < 0.01 * hours.len() as f64);
    }

    #[test]
    fn daily_distribution_reassembles_the_week() {
        for weekly in [1.0, 4.37, 10.0, 12.5] {
            let per_day = daily_distribution(weekly);
            let total: f64 = per_day.iter().sum();
            assert!((total - weekly).abs() < 0.005, "{} -> {}", weekly, total);
        }
    }

    #[test]
    fn weekends_carry_more_hours_than_weekdays() {
        let per_day = daily_distribution(10.0);
        assert!(per_day[5] > per_day[0]);
    }
}
