use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    gamification::{self, CounterBumps},
    model::{StudySession, Subject, Track, User},
    schema::{study_sessions, subjects, users},
    stats, utils, DbPool,
};

/// Snapshot id of the synthetic rest-day / reinforcement sessions.
pub const REVIEW_SUBJECT_ID: &str = "review";
/// Snapshot id of the synthetic exam-analysis sessions for strong users.
pub const EXAM_ANALYSIS_SUBJECT_ID: &str = "exam-analysis";

pub const SESSIONS_PER_DAY: usize = 4;
pub const SESSION_MINUTES: i32 = 90;
pub const REVIEW_MINUTES: i32 = 120;
/// Last day of the 7-day cycle carries a single review/mock-exam session.
pub const REST_DAY_INDEX: i32 = 6;

const DAY_START_MINUTE: i32 = 9 * 60;
const EARLY_LIMIT_MINUTE: i32 = 9 * 60;
const LATE_LIMIT_MINUTE: i32 = 21 * 60;

pub const DAYS: [&str; 7] = [
    "Pazartesi",
    "Salı",
    "Çarşamba",
    "Perşembe",
    "Cuma",
    "Cumartesi",
    "Pazar",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DayKind {
    #[serde(rename = "TYT")]
    Tyt,
    #[serde(rename = "AYT")]
    Ayt,
    #[serde(rename = "Tekrar")]
    Tekrar,
}

pub fn day_kind(day_index: i32) -> DayKind {
    if day_index == REST_DAY_INDEX {
        DayKind::Tekrar
    } else if day_index % 2 == 0 {
        DayKind::Tyt
    } else {
        DayKind::Ayt
    }
}

/// A generated slot before it is bound to a user and written to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedSession {
    pub slot_id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub start_time: String,
    pub duration_min: i32,
    pub day_index: i32,
}

fn exam_analysis_label(track: Track) -> &'static str {
    match track {
        Track::Dil => "YDT Deneme Analizi",
        _ => "AYT Deneme Analizi",
    }
}

/// Sessions sit in two half-day bands: 09:00/10:30 and 12:00/13:30.
fn slot_start(slot: usize) -> String {
    let minute = DAY_START_MINUTE + (slot as i32 / 2) * 180 + (slot as i32 % 2) * 90;
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

pub fn start_minutes(hhmm: &str) -> i32 {
    let Some((h, m)) = hhmm.split_once(':') else {
        return 0;
    };
    h.parse::<i32>().unwrap_or(0) * 60 + m.parse::<i32>().unwrap_or(0)
}

/// Distributes the active subjects over a 7-day cycle.
///
/// Slot `s` on day `d` gets subject `(d + s) % count`, so no subject is stuck
/// in the same band all week. The rest day gets a single 120-minute review
/// session. Weak users (level <= 2) have the first afternoon slot replaced by
/// a generic review block; strong users (level >= 4) have the last slot
/// replaced by exam analysis.
///
/// An empty registry yields an empty plan; callers keep the previous week in
/// that case instead of overwriting it.
pub fn generate_week(active: &[Subject], level: i32, track: Track) -> Vec<PlannedSession> {
    if active.is_empty() {
        return Vec::new();
    }

    let mut plan = Vec::with_capacity(6 * SESSIONS_PER_DAY + 1);

    for day in 0..7i32 {
        if day == REST_DAY_INDEX {
            plan.push(PlannedSession {
                slot_id: format!("{day}-review"),
                subject_id: REVIEW_SUBJECT_ID.to_string(),
                subject_name: "Haftalık Tekrar ve Deneme".to_string(),
                start_time: "09:00".to_string(),
                duration_min: REVIEW_MINUTES,
                day_index: day,
            });
            continue;
        }

        for slot in 0..SESSIONS_PER_DAY {
            let subject = &active[(day as usize + slot) % active.len()];

            let (subject_id, subject_name) = if level <= 2 && slot == 2 {
                (REVIEW_SUBJECT_ID.to_string(), "Genel Tekrar".to_string())
            } else if level >= 4 && slot == SESSIONS_PER_DAY - 1 {
                (
                    EXAM_ANALYSIS_SUBJECT_ID.to_string(),
                    exam_analysis_label(track).to_string(),
                )
            } else {
                (subject.subject_id.to_string(), subject.name.clone())
            };

            plan.push(PlannedSession {
                slot_id: format!("{day}-{slot}"),
                subject_id,
                subject_name,
                start_time: slot_start(slot),
                duration_min: SESSION_MINUTES,
                day_index: day,
            });
        }
    }

    plan
}

// --- Session ledger ---

pub fn load_week(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> Result<Vec<StudySession>, diesel::result::Error> {
    study_sessions::table
        .filter(study_sessions::user_id.eq(user_id))
        .order((study_sessions::day_index.asc(), study_sessions::start_time.asc()))
        .select(StudySession::as_select())
        .load(conn)
}

/// Atomic full replacement of the user's week. Completion state of the
/// superseded week is discarded.
pub fn replace_week(
    conn: &mut SqliteConnection,
    user_id: i32,
    plan: &[PlannedSession],
) -> Result<(), diesel::result::Error> {
    let rows: Vec<StudySession> = plan
        .iter()
        .map(|p| StudySession {
            user_id,
            slot_id: p.slot_id.clone(),
            subject_id: p.subject_id.clone(),
            subject_name: p.subject_name.clone(),
            start_time: p.start_time.clone(),
            duration_min: p.duration_min,
            day_index: p.day_index,
            completed: false,
        })
        .collect();

    conn.transaction(|conn| {
        diesel::delete(study_sessions::table.filter(study_sessions::user_id.eq(user_id)))
            .execute(conn)?;
        diesel::insert_into(study_sessions::table)
            .values(&rows)
            .execute(conn)?;
        Ok(())
    })
}

/// Returns the number of rows updated: 0 means the slot id belongs to a
/// superseded generation (or never existed) and the call is a no-op.
pub fn mark_complete(
    conn: &mut SqliteConnection,
    user_id: i32,
    slot_id: &str,
) -> Result<usize, diesel::result::Error> {
    diesel::update(
        study_sessions::table
            .filter(study_sessions::user_id.eq(user_id))
            .filter(study_sessions::slot_id.eq(slot_id)),
    )
    .set(study_sessions::completed.eq(true))
    .execute(conn)
}

fn week_fully_complete(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> Result<bool, diesel::result::Error> {
    let total: i64 = study_sessions::table
        .filter(study_sessions::user_id.eq(user_id))
        .count()
        .get_result(conn)?;
    let remaining: i64 = study_sessions::table
        .filter(study_sessions::user_id.eq(user_id))
        .filter(study_sessions::completed.eq(false))
        .count()
        .get_result(conn)?;
    Ok(total > 0 && remaining == 0)
}

/// A superseded week that reached at least 80% completion counts toward the
/// consistency achievement before it is thrown away.
fn close_out_week(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> Result<(), diesel::result::Error> {
    let total: i64 = study_sessions::table
        .filter(study_sessions::user_id.eq(user_id))
        .count()
        .get_result(conn)?;
    if total == 0 {
        return Ok(());
    }

    let completed: i64 = study_sessions::table
        .filter(study_sessions::user_id.eq(user_id))
        .filter(study_sessions::completed.eq(true))
        .count()
        .get_result(conn)?;

    if completed * 5 >= total * 4 {
        gamification::bump_counters(
            conn,
            user_id,
            CounterBumps {
                weekly_goal: true,
                ..CounterBumps::default()
            },
        )?;
    }

    Ok(())
}

/// Rebuilds the week from the user's active subjects. With no active subjects
/// the previous week is left untouched and 0 is returned.
pub fn regenerate_for_user(
    conn: &mut SqliteConnection,
    user_id: i32,
) -> Result<usize, diesel::result::Error> {
    let user = users::table
        .find(user_id)
        .select(User::as_select())
        .first::<User>(conn)?;

    let active: Vec<Subject> = subjects::table
        .filter(subjects::user_id.eq(user_id))
        .filter(subjects::is_active.eq(true))
        .order(subjects::subject_id.asc())
        .select(Subject::as_select())
        .load(conn)?;

    let plan = generate_week(&active, user.level, user.track());
    if plan.is_empty() {
        log::warn!("user {} has no active subjects, keeping current plan", user_id);
        return Ok(0);
    }

    close_out_week(conn, user_id)?;
    replace_week(conn, user_id, &plan)?;
    Ok(plan.len())
}

// --- Handlers ---

#[derive(Serialize)]
pub struct DayMeta {
    pub day_index: i32,
    pub name: &'static str,
    pub kind: DayKind,
}

#[derive(Serialize)]
pub struct PlanResponse {
    pub days: Vec<DayMeta>,
    pub sessions: Vec<StudySession>,
}

#[derive(Serialize)]
pub struct RegenerateResponse {
    pub success: bool,
    pub sessions_created: usize,
    pub message: String,
}

#[derive(Deserialize)]
pub struct CompleteRequest {
    pub slot_id: String,
    /// Minutes the user reports actually spending, used for the
    /// fast-completion counter. Optional.
    pub spent_min: Option<i32>,
}

#[derive(Serialize)]
pub struct CompleteResponse {
    pub success: bool,
    pub updated: bool,
    pub stats: stats::StudyStatistics,
    pub new_unlocks: Vec<&'static gamification::AchievementDef>,
    pub level: i32,
    pub total_points: i32,
    pub points_to_next_level: i32,
}

pub async fn get_plan(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
) -> Result<Json<PlanResponse>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let sessions = load_week(&mut conn, user_id).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let days = (0..7)
        .map(|d| DayMeta {
            day_index: d,
            name: DAYS[d as usize],
            kind: day_kind(d),
        })
        .collect();

    Ok(Json(PlanResponse { days, sessions }))
}

pub async fn regenerate(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
) -> Result<Json<RegenerateResponse>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let created = regenerate_for_user(&mut conn, user_id).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let message = if created == 0 {
        "No active subjects, plan unchanged".to_string()
    } else {
        "Weekly plan regenerated".to_string()
    };

    Ok(Json(RegenerateResponse {
        success: true,
        sessions_created: created,
        message,
    }))
}

#[axum::debug_handler]
pub async fn complete_session(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
    Json(payload): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let row = study_sessions::table
        .filter(study_sessions::user_id.eq(user_id))
        .filter(study_sessions::slot_id.eq(&payload.slot_id))
        .select(StudySession::as_select())
        .first::<StudySession>(&mut conn)
        .optional()
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?;

    let mut updated = false;
    match row {
        Some(ref target) if !target.completed => {
            let n = mark_complete(&mut conn, user_id, &payload.slot_id).map_err(|e| {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
            })?;

            if n > 0 {
                updated = true;
                let start = start_minutes(&target.start_time);
                let bumps = CounterBumps {
                    early: start < EARLY_LIMIT_MINUTE,
                    late: start >= LATE_LIMIT_MINUTE,
                    fast: payload
                        .spent_min
                        .is_some_and(|spent| spent > 0 && spent * 2 <= target.duration_min),
                    perfect: week_fully_complete(&mut conn, user_id).map_err(|e| {
                        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
                    })?,
                    weekly_goal: false,
                };
                gamification::bump_counters(&mut conn, user_id, bumps).map_err(|e| {
                    (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
                })?;
            }
        }
        Some(_) => {
            // Already completed, nothing to do.
        }
        None => {
            // Stale id from a superseded generation; regeneration races
            // benignly with in-flight completions.
            log::warn!("stale session id {} for user {}", payload.slot_id, user_id);
        }
    }

    let sessions = load_week(&mut conn, user_id).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;
    let statistics = stats::compute(&sessions, stats::today_day_index());

    let outcome = gamification::evaluate_and_store(&mut conn, user_id, &statistics)
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?;

    Ok(Json(CompleteResponse {
        success: true,
        updated,
        stats: statistics,
        level: gamification::level_for_points(outcome.total_points),
        points_to_next_level: gamification::points_to_next_level(outcome.total_points),
        total_points: outcome.total_points,
        new_unlocks: outcome.new_unlocks,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(id: i32, name: &str) -> Subject {
        Subject {
            subject_id: id,
            user_id: 1,
            name: name.to_string(),
            level: 3,
            color: "#3b82f6".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn round_robin_rotation_on_first_day() {
        let active = vec![subject(1, "Matematik"), subject(2, "Fizik")];
        let plan = generate_week(&active, 3, Track::Sayisal);

        let day0: Vec<_> = plan.iter().filter(|s| s.day_index == 0).collect();
        assert_eq!(day0.len(), 4);
        let names: Vec<_> = day0.iter().map(|s| s.subject_name.as_str()).collect();
        assert_eq!(names, ["Matematik", "Fizik", "Matematik", "Fizik"]);

        let rest: Vec<_> = plan.iter().filter(|s| s.day_index == REST_DAY_INDEX).collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].subject_id, REVIEW_SUBJECT_ID);
        assert_eq!(rest[0].duration_min, REVIEW_MINUTES);
    }

    #[test]
    fn generation_is_idempotent() {
        let active = vec![subject(1, "Matematik"), subject(2, "Fizik"), subject(3, "Kimya")];
        let first = generate_week(&active, 3, Track::Sayisal);
        let second = generate_week(&active, 3, Track::Sayisal);
        assert_eq!(first, second);
    }

    #[test]
    fn every_day_has_the_configured_session_count() {
        for count in 1..=5 {
            let active: Vec<_> = (0..count).map(|i| subject(i, &format!("S{i}"))).collect();
            let plan = generate_week(&active, 3, Track::Sayisal);

            for day in 0..7 {
                let n = plan.iter().filter(|s| s.day_index == day).count();
                if day == REST_DAY_INDEX {
                    assert_eq!(n, 1, "rest day for {count} subjects");
                } else {
                    assert_eq!(n, SESSIONS_PER_DAY, "day {day} for {count} subjects");
                }
            }
        }
    }

    #[test]
    fn rotation_balances_subjects_across_slots() {
        let active = vec![subject(1, "Matematik"), subject(2, "Fizik")];
        let plan = generate_week(&active, 3, Track::Sayisal);

        // 6 rotation days and 2 subjects: each subject sits in each slot
        // position exactly 3 times.
        for slot in 0..SESSIONS_PER_DAY {
            for subj in &active {
                let n = plan
                    .iter()
                    .filter(|s| {
                        s.slot_id.ends_with(&format!("-{slot}"))
                            && s.subject_id == subj.subject_id.to_string()
                    })
                    .count();
                assert_eq!(n, 3, "subject {} in slot {}", subj.name, slot);
            }
        }
    }

    #[test]
    fn empty_registry_produces_empty_plan() {
        assert!(generate_week(&[], 3, Track::Sayisal).is_empty());
    }

    #[test]
    fn weak_users_get_reinforcement_slot() {
        let active = vec![subject(1, "Matematik")];
        let plan = generate_week(&active, 2, Track::Sayisal);

        for day in 0..6 {
            let forced = plan
                .iter()
                .find(|s| s.slot_id == format!("{day}-2"))
                .unwrap();
            assert_eq!(forced.subject_id, REVIEW_SUBJECT_ID);
            assert_eq!(forced.subject_name, "Genel Tekrar");
            // The surrounding slots still rotate normally.
            let normal = plan
                .iter()
                .find(|s| s.slot_id == format!("{day}-0"))
                .unwrap();
            assert_eq!(normal.subject_id, "1");
        }
    }

    #[test]
    fn strong_users_get_exam_analysis_slot() {
        let active = vec![subject(1, "Matematik")];

        let plan = generate_week(&active, 4, Track::Sayisal);
        let forced = plan.iter().find(|s| s.slot_id == "0-3").unwrap();
        assert_eq!(forced.subject_id, EXAM_ANALYSIS_SUBJECT_ID);
        assert_eq!(forced.subject_name, "AYT Deneme Analizi");

        let dil = generate_week(&active, 5, Track::Dil);
        let forced = dil.iter().find(|s| s.slot_id == "0-3").unwrap();
        assert_eq!(forced.subject_name, "YDT Deneme Analizi");
    }

    #[test]
    fn sessions_sit_in_two_half_day_bands() {
        assert_eq!(slot_start(0), "09:00");
        assert_eq!(slot_start(1), "10:30");
        assert_eq!(slot_start(2), "12:00");
        assert_eq!(slot_start(3), "13:30");
    }

    #[test]
    fn day_kinds_alternate_with_a_rest_day() {
        assert_eq!(day_kind(0), DayKind::Tyt);
        assert_eq!(day_kind(1), DayKind::Ayt);
        assert_eq!(day_kind(5), DayKind::Ayt);
        assert_eq!(day_kind(REST_DAY_INDEX), DayKind::Tekrar);
    }

    // --- ledger ---

    fn ledger_conn() -> SqliteConnection {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        for ddl in [
            "CREATE TABLE users (
                user_id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                name TEXT NOT NULL DEFAULT '',
                track TEXT NOT NULL DEFAULT 'sayisal',
                level INTEGER NOT NULL DEFAULT 3,
                hours_per_week INTEGER NOT NULL DEFAULT 30
            )",
            "CREATE TABLE subjects (
                subject_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                level INTEGER NOT NULL DEFAULT 3,
                color TEXT NOT NULL DEFAULT '#3b82f6',
                is_active BOOLEAN NOT NULL DEFAULT 1
            )",
            "CREATE TABLE study_sessions (
                user_id INTEGER NOT NULL,
                slot_id TEXT NOT NULL,
                subject_id TEXT NOT NULL,
                subject_name TEXT NOT NULL,
                start_time TEXT NOT NULL,
                duration_min INTEGER NOT NULL,
                day_index INTEGER NOT NULL,
                completed BOOLEAN NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, slot_id)
            )",
            "CREATE TABLE progress_counters (
                user_id INTEGER PRIMARY KEY,
                perfect_weeks INTEGER NOT NULL DEFAULT 0,
                early_sessions INTEGER NOT NULL DEFAULT 0,
                late_sessions INTEGER NOT NULL DEFAULT 0,
                fast_completions INTEGER NOT NULL DEFAULT 0,
                weekly_goal_completions INTEGER NOT NULL DEFAULT 0
            )",
        ] {
            diesel::sql_query(ddl).execute(&mut conn).unwrap();
        }
        diesel::sql_query(
            "INSERT INTO users (email, password, name) VALUES ('a@b.c', 'x', 'Deneme')",
        )
        .execute(&mut conn)
        .unwrap();
        conn
    }

    #[test]
    fn ledger_replace_and_mark_complete() {
        let mut conn = ledger_conn();
        let active = vec![subject(1, "Matematik"), subject(2, "Fizik")];
        let plan = generate_week(&active, 3, Track::Sayisal);

        replace_week(&mut conn, 1, &plan).unwrap();
        assert_eq!(load_week(&mut conn, 1).unwrap().len(), plan.len());

        assert_eq!(mark_complete(&mut conn, 1, "0-0").unwrap(), 1);
        let week = load_week(&mut conn, 1).unwrap();
        let done: Vec<_> = week.iter().filter(|s| s.completed).collect();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].slot_id, "0-0");
    }

    #[test]
    fn ledger_ignores_stale_slot_ids() {
        let mut conn = ledger_conn();
        let plan = generate_week(&[subject(1, "Matematik")], 3, Track::Sayisal);
        replace_week(&mut conn, 1, &plan).unwrap();

        assert_eq!(mark_complete(&mut conn, 1, "9-9").unwrap(), 0);
        assert_eq!(mark_complete(&mut conn, 2, "0-0").unwrap(), 0);
    }

    #[test]
    fn regeneration_discards_completion_state() {
        let mut conn = ledger_conn();
        let plan = generate_week(&[subject(1, "Matematik")], 3, Track::Sayisal);

        replace_week(&mut conn, 1, &plan).unwrap();
        mark_complete(&mut conn, 1, "0-0").unwrap();
        replace_week(&mut conn, 1, &plan).unwrap();

        let week = load_week(&mut conn, 1).unwrap();
        assert!(week.iter().all(|s| !s.completed));
    }

    #[test]
    fn ledger_scopes_weeks_per_user() {
        let mut conn = ledger_conn();
        let plan = generate_week(&[subject(1, "Matematik")], 3, Track::Sayisal);

        replace_week(&mut conn, 1, &plan).unwrap();
        replace_week(&mut conn, 2, &plan).unwrap();
        mark_complete(&mut conn, 1, "0-0").unwrap();

        assert!(load_week(&mut conn, 2).unwrap().iter().all(|s| !s.completed));
        replace_week(&mut conn, 2, &plan).unwrap();
        assert_eq!(load_week(&mut conn, 1).unwrap().len(), plan.len());
    }

    #[test]
    fn regenerate_keeps_plan_when_no_active_subjects() {
        let mut conn = ledger_conn();
        diesel::sql_query(
            "INSERT INTO subjects (user_id, name, is_active) VALUES (1, 'Matematik', 0)",
        )
        .execute(&mut conn)
        .unwrap();

        let plan = generate_week(&[subject(1, "Matematik")], 3, Track::Sayisal);
        replace_week(&mut conn, 1, &plan).unwrap();
        mark_complete(&mut conn, 1, "0-0").unwrap();

        assert_eq!(regenerate_for_user(&mut conn, 1).unwrap(), 0);
        let week = load_week(&mut conn, 1).unwrap();
        assert_eq!(week.len(), plan.len());
        assert!(week.iter().any(|s| s.completed));
    }

    #[test]
    fn regenerate_closes_out_a_mostly_complete_week() {
        let mut conn = ledger_conn();
        diesel::sql_query("INSERT INTO subjects (user_id, name) VALUES (1, 'Matematik')")
            .execute(&mut conn)
            .unwrap();

        assert_eq!(regenerate_for_user(&mut conn, 1).unwrap(), 25);
        for s in load_week(&mut conn, 1).unwrap() {
            mark_complete(&mut conn, 1, &s.slot_id).unwrap();
        }
        regenerate_for_user(&mut conn, 1).unwrap();

        let counters = gamification::load_counters(&mut conn, 1).unwrap();
        assert_eq!(counters.weekly_goal_completions, 1);
        assert!(load_week(&mut conn, 1).unwrap().iter().all(|s| !s.completed));
    }
}
