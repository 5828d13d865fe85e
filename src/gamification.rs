use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::{
    model::{AchievementState, ProgressCounters, User},
    schema::{achievement_states, progress_counters, users},
    stats::StudyStatistics,
    utils, DbPool,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Study,
    Streak,
    Progress,
    Social,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    StudyHours,
    StreakDays,
    TasksCompleted,
    PerfectWeek,
    EarlyRiser,
    NightOwl,
    SpeedLearner,
    Consistency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
    AllTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Requirement {
    pub kind: RequirementKind,
    pub target: f64,
    pub timeframe: Option<Timeframe>,
}

#[derive(Debug, Serialize)]
pub struct AchievementDef {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: Category,
    pub difficulty: Difficulty,
    pub points: i32,
    pub requirement: Requirement,
}

const fn req(kind: RequirementKind, target: f64) -> Requirement {
    Requirement {
        kind,
        target,
        timeframe: None,
    }
}

/// The milestone catalog. Defined once, shared by every user; per-user unlock
/// state lives in `achievement_states`.
pub static CATALOG: &[AchievementDef] = &[
    AchievementDef {
        id: "first_hour",
        title: "İlk Adım",
        description: "İlk 1 saatini tamamla",
        icon: "🎯",
        category: Category::Study,
        difficulty: Difficulty::Bronze,
        points: 10,
        requirement: req(RequirementKind::StudyHours, 1.0),
    },
    AchievementDef {
        id: "study_marathon",
        title: "Maraton Koşucusu",
        description: "50 saat çalışma tamamla",
        icon: "🏃",
        category: Category::Study,
        difficulty: Difficulty::Silver,
        points: 100,
        requirement: req(RequirementKind::StudyHours, 50.0),
    },
    AchievementDef {
        id: "study_master",
        title: "Çalışma Ustası",
        description: "200 saat çalışma tamamla",
        icon: "🎓",
        category: Category::Study,
        difficulty: Difficulty::Gold,
        points: 500,
        requirement: req(RequirementKind::StudyHours, 200.0),
    },
    AchievementDef {
        id: "study_legend",
        title: "Efsane Öğrenci",
        description: "500 saat çalışma tamamla",
        icon: "👑",
        category: Category::Study,
        difficulty: Difficulty::Platinum,
        points: 1000,
        requirement: req(RequirementKind::StudyHours, 500.0),
    },
    AchievementDef {
        id: "week_warrior",
        title: "Hafta Savaşçısı",
        description: "7 gün üst üste çalış",
        icon: "🔥",
        category: Category::Streak,
        difficulty: Difficulty::Bronze,
        points: 50,
        requirement: req(RequirementKind::StreakDays, 7.0),
    },
    AchievementDef {
        id: "month_master",
        title: "Ay Ustası",
        description: "30 gün üst üste çalış",
        icon: "⚡",
        category: Category::Streak,
        difficulty: Difficulty::Silver,
        points: 200,
        requirement: req(RequirementKind::StreakDays, 30.0),
    },
    AchievementDef {
        id: "unstoppable",
        title: "Durdurulamaz",
        description: "100 gün üst üste çalış",
        icon: "🚀",
        category: Category::Streak,
        difficulty: Difficulty::Gold,
        points: 1000,
        requirement: req(RequirementKind::StreakDays, 100.0),
    },
    AchievementDef {
        id: "task_master",
        title: "Görev Ustası",
        description: "100 görevi tamamla",
        icon: "✅",
        category: Category::Progress,
        difficulty: Difficulty::Silver,
        points: 150,
        requirement: req(RequirementKind::TasksCompleted, 100.0),
    },
    AchievementDef {
        id: "perfect_week",
        title: "Mükemmel Hafta",
        description: "Bir haftadaki tüm görevleri tamamla",
        icon: "⭐",
        category: Category::Progress,
        difficulty: Difficulty::Gold,
        points: 300,
        requirement: req(RequirementKind::PerfectWeek, 1.0),
    },
    AchievementDef {
        id: "early_bird",
        title: "Erken Kuş",
        description: "09:00'dan önce 10 kez çalış",
        icon: "🌅",
        category: Category::Special,
        difficulty: Difficulty::Bronze,
        points: 75,
        requirement: req(RequirementKind::EarlyRiser, 10.0),
    },
    AchievementDef {
        id: "night_owl",
        title: "Gece Kuşu",
        description: "21:00'dan sonra 10 kez çalış",
        icon: "🌙",
        category: Category::Special,
        difficulty: Difficulty::Bronze,
        points: 75,
        requirement: req(RequirementKind::NightOwl, 10.0),
    },
    AchievementDef {
        id: "speed_demon",
        title: "Hız Şeytanı",
        description: "20 görevi hızlıca tamamla",
        icon: "💨",
        category: Category::Special,
        difficulty: Difficulty::Silver,
        points: 150,
        requirement: req(RequirementKind::SpeedLearner, 20.0),
    },
    AchievementDef {
        id: "consistent_learner",
        title: "Tutarlı Öğrenci",
        description: "4 hafta boyunca haftalık hedefi tut",
        icon: "📈",
        category: Category::Progress,
        difficulty: Difficulty::Gold,
        points: 400,
        requirement: Requirement {
            kind: RequirementKind::Consistency,
            target: 4.0,
            timeframe: Some(Timeframe::Weekly),
        },
    },
];

pub fn level_for_points(total_points: i32) -> i32 {
    total_points / 100 + 1
}

pub fn points_to_next_level(total_points: i32) -> i32 {
    level_for_points(total_points) * 100 - total_points
}

pub fn daily_bonus(completed_today: i32, target_today: i32) -> i32 {
    if target_today <= 0 {
        return 0;
    }
    let rate = completed_today as f64 / target_today as f64;
    if rate >= 1.0 {
        50
    } else if rate >= 0.8 {
        25
    } else if rate >= 0.5 {
        10
    } else {
        0
    }
}

pub fn weekly_bonus(completion_pct: f64) -> i32 {
    if completion_pct >= 95.0 {
        200
    } else if completion_pct >= 85.0 {
        100
    } else if completion_pct >= 70.0 {
        50
    } else {
        0
    }
}

/// Result of one evaluation pass over the catalog.
pub struct Evaluation {
    /// Achievements that crossed their target in this pass.
    pub new_unlocks: Vec<&'static AchievementDef>,
    /// Clamped progress for every achievement that was still locked going in.
    pub progress: Vec<(&'static str, f64)>,
}

/// Checks every still-locked achievement against the current metrics.
/// Unlocked achievements are never re-evaluated, so unlocks are monotonic.
pub fn evaluate(
    stats: &StudyStatistics,
    counters: &ProgressCounters,
    already_unlocked: &HashSet<String>,
) -> Evaluation {
    let mut new_unlocks = Vec::new();
    let mut progress = Vec::new();

    for achievement in CATALOG {
        if already_unlocked.contains(achievement.id) {
            continue;
        }

        let observed = match achievement.requirement.kind {
            RequirementKind::StudyHours => stats.total_hours,
            RequirementKind::StreakDays => stats.streak as f64,
            RequirementKind::TasksCompleted => stats.completed_sessions as f64,
            RequirementKind::PerfectWeek => counters.perfect_weeks as f64,
            RequirementKind::EarlyRiser => counters.early_sessions as f64,
            RequirementKind::NightOwl => counters.late_sessions as f64,
            RequirementKind::SpeedLearner => counters.fast_completions as f64,
            RequirementKind::Consistency => counters.weekly_goal_completions as f64,
        };

        progress.push((achievement.id, observed.min(achievement.requirement.target)));

        if observed >= achievement.requirement.target {
            new_unlocks.push(achievement);
        }
    }

    Evaluation {
        new_unlocks,
        progress,
    }
}

// --- Auxiliary counters ---

#[derive(Debug, Clone, Copy, Default)]
pub struct CounterBumps {
    pub early: bool,
    pub late: bool,
    pub fast: bool,
    pub perfect: bool,
    pub weekly_goal: bool,
}

fn ensure_counters_row(
    conn: &mut SqliteConnection,
    uid: i32,
) -> Result<(), diesel::result::Error> {
    diesel::insert_into(progress_counters::table)
        .values(progress_counters::user_id.eq(uid))
        .on_conflict(progress_counters::user_id)
        .do_nothing()
        .execute(conn)?;
    Ok(())
}

pub fn load_counters(
    conn: &mut SqliteConnection,
    uid: i32,
) -> Result<ProgressCounters, diesel::result::Error> {
    Ok(progress_counters::table
        .find(uid)
        .select(ProgressCounters::as_select())
        .first(conn)
        .optional()?
        .unwrap_or_default())
}

pub fn bump_counters(
    conn: &mut SqliteConnection,
    uid: i32,
    bumps: CounterBumps,
) -> Result<(), diesel::result::Error> {
    ensure_counters_row(conn, uid)?;

    if bumps.early {
        diesel::update(progress_counters::table.find(uid))
            .set(progress_counters::early_sessions.eq(progress_counters::early_sessions + 1))
            .execute(conn)?;
    }
    if bumps.late {
        diesel::update(progress_counters::table.find(uid))
            .set(progress_counters::late_sessions.eq(progress_counters::late_sessions + 1))
            .execute(conn)?;
    }
    if bumps.fast {
        diesel::update(progress_counters::table.find(uid))
            .set(progress_counters::fast_completions.eq(progress_counters::fast_completions + 1))
            .execute(conn)?;
    }
    if bumps.perfect {
        diesel::update(progress_counters::table.find(uid))
            .set(progress_counters::perfect_weeks.eq(progress_counters::perfect_weeks + 1))
            .execute(conn)?;
    }
    if bumps.weekly_goal {
        diesel::update(progress_counters::table.find(uid))
            .set(
                progress_counters::weekly_goal_completions
                    .eq(progress_counters::weekly_goal_completions + 1),
            )
            .execute(conn)?;
    }

    Ok(())
}

// --- Persistence of unlock state ---

pub struct EvaluationOutcome {
    pub new_unlocks: Vec<&'static AchievementDef>,
    pub total_points: i32,
}

pub fn unlocked_points(
    conn: &mut SqliteConnection,
    uid: i32,
) -> Result<i32, diesel::result::Error> {
    let ids: Vec<String> = achievement_states::table
        .filter(achievement_states::user_id.eq(uid))
        .filter(achievement_states::unlocked.eq(true))
        .select(achievement_states::achievement_id)
        .load(conn)?;
    Ok(points_for_ids(ids.iter().map(String::as_str)))
}

fn points_for_ids<'a>(ids: impl Iterator<Item = &'a str>) -> i32 {
    let ids: HashSet<&str> = ids.collect();
    CATALOG
        .iter()
        .filter(|a| ids.contains(a.id))
        .map(|a| a.points)
        .sum()
}

/// Runs one evaluation pass and persists it: progress rows are upserted,
/// fresh unlocks get `unlocked_at` stamped. Returns the new-unlocks batch for
/// the notification surface plus the resulting points total.
pub fn evaluate_and_store(
    conn: &mut SqliteConnection,
    uid: i32,
    stats: &StudyStatistics,
) -> Result<EvaluationOutcome, diesel::result::Error> {
    let counters = load_counters(conn, uid)?;
    let already: HashSet<String> = achievement_states::table
        .filter(achievement_states::user_id.eq(uid))
        .filter(achievement_states::unlocked.eq(true))
        .select(achievement_states::achievement_id)
        .load::<String>(conn)?
        .into_iter()
        .collect();

    let evaluation = evaluate(stats, &counters, &already);
    let now = Utc::now().naive_utc();

    for (achievement_id, observed) in &evaluation.progress {
        diesel::insert_into(achievement_states::table)
            .values((
                achievement_states::user_id.eq(uid),
                achievement_states::achievement_id.eq(*achievement_id),
                achievement_states::unlocked.eq(false),
                achievement_states::progress.eq(*observed),
            ))
            .on_conflict((
                achievement_states::user_id,
                achievement_states::achievement_id,
            ))
            .do_update()
            .set(achievement_states::progress.eq(*observed))
            .execute(conn)?;
    }

    for achievement in &evaluation.new_unlocks {
        diesel::update(
            achievement_states::table
                .filter(achievement_states::user_id.eq(uid))
                .filter(achievement_states::achievement_id.eq(achievement.id)),
        )
        .set((
            achievement_states::unlocked.eq(true),
            achievement_states::unlocked_at.eq(now),
        ))
        .execute(conn)?;
    }

    let total_points = points_for_ids(
        already
            .iter()
            .map(String::as_str)
            .chain(evaluation.new_unlocks.iter().map(|a| a.id)),
    );

    Ok(EvaluationOutcome {
        new_unlocks: evaluation.new_unlocks,
        total_points,
    })
}

// --- Handlers ---

#[derive(Serialize)]
pub struct AchievementView {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: Category,
    pub difficulty: Difficulty,
    pub points: i32,
    pub target: f64,
    pub timeframe: Option<Timeframe>,
    pub unlocked: bool,
    pub unlocked_at: Option<NaiveDateTime>,
    pub progress: f64,
}

#[derive(Serialize)]
pub struct AchievementSummary {
    pub total_points: i32,
    pub level: i32,
    pub points_to_next_level: i32,
    pub completion_pct: i32,
}

#[derive(Serialize)]
pub struct AchievementsResponse {
    pub achievements: Vec<AchievementView>,
    pub summary: AchievementSummary,
}

pub async fn list_achievements(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
) -> Result<Json<AchievementsResponse>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let states: HashMap<String, AchievementState> = achievement_states::table
        .filter(achievement_states::user_id.eq(user_id))
        .select(AchievementState::as_select())
        .load::<AchievementState>(&mut conn)
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?
        .into_iter()
        .map(|s| (s.achievement_id.clone(), s))
        .collect();

    let achievements: Vec<AchievementView> = CATALOG
        .iter()
        .map(|a| {
            let state = states.get(a.id);
            AchievementView {
                id: a.id,
                title: a.title,
                description: a.description,
                icon: a.icon,
                category: a.category,
                difficulty: a.difficulty,
                points: a.points,
                target: a.requirement.target,
                timeframe: a.requirement.timeframe,
                unlocked: state.is_some_and(|s| s.unlocked),
                unlocked_at: state.and_then(|s| s.unlocked_at),
                progress: state.map_or(0.0, |s| s.progress),
            }
        })
        .collect();

    let unlocked_count = achievements.iter().filter(|a| a.unlocked).count();
    let total_points = achievements
        .iter()
        .filter(|a| a.unlocked)
        .map(|a| a.points)
        .sum();

    Ok(Json(AchievementsResponse {
        summary: AchievementSummary {
            total_points,
            level: level_for_points(total_points),
            points_to_next_level: points_to_next_level(total_points),
            completion_pct: (unlocked_count * 100 / CATALOG.len()) as i32,
        },
        achievements,
    }))
}

#[derive(Debug, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i32,
    pub name: String,
    pub points: i32,
    pub level: i32,
}

/// Ranks users by total points, descending. The sort is stable, so equal
/// point totals keep their input order (callers pass users in ascending
/// user-id order, which is the documented tie policy).
pub fn rank_by_points(mut rows: Vec<(String, i32)>) -> Vec<LeaderboardEntry> {
    rows.sort_by(|a, b| b.1.cmp(&a.1));
    rows.into_iter()
        .enumerate()
        .map(|(i, (name, points))| LeaderboardEntry {
            rank: i as i32 + 1,
            name,
            points,
            level: level_for_points(points),
        })
        .collect()
}

pub async fn leaderboard(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
) -> Result<Json<Vec<LeaderboardEntry>>, (StatusCode, String)> {
    if utils::get_current_user_id(&session).await.is_none() {
        return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string()));
    }

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let all_users: Vec<User> = users::table
        .order(users::user_id.asc())
        .select(User::as_select())
        .load(&mut conn)
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?;

    let mut rows = Vec::with_capacity(all_users.len());
    for user in &all_users {
        let points = unlocked_points(&mut conn, user.user_id).map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?;
        rows.push((user.name.clone(), points));
    }

    Ok(Json(rank_by_points(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn stats(total_hours: f64, streak: i32, completed: i32) -> StudyStatistics {
        StudyStatistics {
            total_hours,
            streak,
            completed_sessions: completed,
            subject_hours: BTreeMap::new(),
        }
    }

    #[test]
    fn first_hour_unlocks_exactly_once() {
        let counters = ProgressCounters::default();
        let mut already = HashSet::new();

        let evaluation = evaluate(&stats(1.0, 0, 1), &counters, &already);
        let ids: Vec<_> = evaluation.new_unlocks.iter().map(|a| a.id).collect();
        assert_eq!(ids, ["first_hour"]);

        already.insert("first_hour".to_string());
        let second = evaluate(&stats(2.0, 0, 2), &counters, &already);
        assert!(second.new_unlocks.is_empty());
    }

    #[test]
    fn progress_is_clamped_to_target() {
        let counters = ProgressCounters::default();
        let evaluation = evaluate(&stats(60.0, 0, 0), &counters, &HashSet::new());

        let progress: HashMap<_, _> = evaluation.progress.into_iter().collect();
        assert_eq!(progress["study_marathon"], 50.0);
        assert_eq!(progress["study_master"], 60.0);
    }

    #[test]
    fn counter_backed_requirements_unlock() {
        let counters = ProgressCounters {
            early_sessions: 10,
            fast_completions: 20,
            ..ProgressCounters::default()
        };

        let evaluation = evaluate(&stats(0.0, 0, 0), &counters, &HashSet::new());
        let ids: Vec<_> = evaluation.new_unlocks.iter().map(|a| a.id).collect();
        assert_eq!(ids, ["early_bird", "speed_demon"]);
    }

    #[test]
    fn streak_achievements_follow_the_streak() {
        let counters = ProgressCounters::default();
        let evaluation = evaluate(&stats(0.0, 7, 0), &counters, &HashSet::new());
        let ids: Vec<_> = evaluation.new_unlocks.iter().map(|a| a.id).collect();
        assert_eq!(ids, ["week_warrior"]);
    }

    #[test]
    fn level_is_one_per_hundred_points() {
        assert_eq!(level_for_points(0), 1);
        assert_eq!(level_for_points(99), 1);
        assert_eq!(level_for_points(100), 2);
        assert_eq!(level_for_points(250), 3);

        assert_eq!(points_to_next_level(0), 100);
        assert_eq!(points_to_next_level(250), 50);
    }

    #[test]
    fn bonuses_follow_completion_rate() {
        assert_eq!(daily_bonus(4, 4), 50);
        assert_eq!(daily_bonus(3, 4), 10);
        assert_eq!(daily_bonus(4, 5), 25);
        assert_eq!(daily_bonus(1, 4), 0);
        assert_eq!(daily_bonus(0, 0), 0);

        assert_eq!(weekly_bonus(100.0), 200);
        assert_eq!(weekly_bonus(90.0), 100);
        assert_eq!(weekly_bonus(75.0), 50);
        assert_eq!(weekly_bonus(10.0), 0);
    }

    #[test]
    fn leaderboard_keeps_input_order_on_ties() {
        let ranked = rank_by_points(vec![
            ("Ayşe".to_string(), 150),
            ("Mehmet".to_string(), 300),
            ("Zeynep".to_string(), 150),
        ]);

        let order: Vec<_> = ranked.iter().map(|e| (e.rank, e.name.as_str())).collect();
        assert_eq!(order, [(1, "Mehmet"), (2, "Ayşe"), (3, "Zeynep")]);
        assert_eq!(ranked[0].level, 4);
    }
}
