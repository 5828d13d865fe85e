use chrono::NaiveDateTime;
use diesel::{AsChangeset, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use crate::schema::{achievement_states, progress_counters, study_sessions, subjects, users};

/// Exam track a user prepares for. Stored as lowercase text in `users.track`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Sayisal,
    Ea,
    Sozel,
    Dil,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Sayisal => "sayisal",
            Track::Ea => "ea",
            Track::Sozel => "sozel",
            Track::Dil => "dil",
        }
    }
}

impl std::str::FromStr for Track {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sayisal" => Ok(Track::Sayisal),
            "ea" => Ok(Track::Ea),
            "sozel" => Ok(Track::Sozel),
            "dil" => Ok(Track::Dil),
            _ => Err(()),
        }
    }
}

#[derive(Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub user_id: i32,
    #[serde(skip_serializing)]
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    pub track: String,
    pub level: i32,
    pub hours_per_week: i32,
}

impl User {
    /// Degrades to the default track on unrecognized values instead of failing.
    pub fn track(&self) -> Track {
        self.track.parse().unwrap_or(Track::Sayisal)
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub name: &'a str,
    pub track: &'a str,
    pub level: i32,
    pub hours_per_week: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = subjects)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Subject {
    pub subject_id: i32,
    pub user_id: i32,
    pub name: String,
    pub level: i32,
    pub color: String,
    pub is_active: bool,
}

#[derive(Insertable)]
#[diesel(table_name = subjects)]
pub struct NewSubject<'a> {
    pub user_id: i32,
    pub name: &'a str,
    pub level: i32,
    pub color: &'a str,
    pub is_active: bool,
}

#[derive(AsChangeset, Deserialize)]
#[diesel(table_name = subjects)]
pub struct SubjectUpdate {
    pub name: Option<String>,
    pub level: Option<i32>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
}

/// One slot of the current week. `subject_id`/`subject_name` are a snapshot
/// taken at generation time, so a session stays attributable after its
/// subject is renamed or deleted. Sentinel ids mark synthetic sessions.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = study_sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StudySession {
    pub user_id: i32,
    pub slot_id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub start_time: String,
    pub duration_min: i32,
    pub day_index: i32,
    pub completed: bool,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = achievement_states)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AchievementState {
    pub user_id: i32,
    pub achievement_id: String,
    pub unlocked: bool,
    pub unlocked_at: Option<NaiveDateTime>,
    pub progress: f64,
}

/// Auxiliary counters consumed by the achievement engine.
#[derive(Debug, Clone, Default, Queryable, Selectable, Serialize)]
#[diesel(table_name = progress_counters)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ProgressCounters {
    #[serde(skip_serializing)]
    pub user_id: i32,
    pub perfect_weeks: i32,
    pub early_sessions: i32,
    pub late_sessions: i32,
    pub fast_completions: i32,
    pub weekly_goal_completions: i32,
}
