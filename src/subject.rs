use axum::extract::Path;
use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use diesel::prelude::*;
use diesel::sql_types::Integer;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    model::{NewSubject, Subject, SubjectUpdate, Track},
    planner,
    schema::{study_sessions, subjects},
    utils, DbPool,
};

lazy_static! {
    static ref COLOR_RE: Regex = Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap();
}

/// Subject sets a user starts with when picking a track, mirroring the
/// profile wizard presets: (name, level, color).
const DEFAULT_SUBJECTS: &[(Track, &[(&str, i32, &str)])] = &[
    (
        Track::Sayisal,
        &[
            ("Matematik", 3, "#3b82f6"),
            ("Fizik", 3, "#10b981"),
            ("Kimya", 3, "#f59e0b"),
            ("Biyoloji", 3, "#ef4444"),
            ("Türkçe", 3, "#8b5cf6"),
        ],
    ),
    (
        Track::Ea,
        &[
            ("Matematik", 3, "#3b82f6"),
            ("Türkçe", 3, "#8b5cf6"),
            ("Sosyal Bilimler", 3, "#06b6d4"),
            ("Geometri", 3, "#84cc16"),
        ],
    ),
    (
        Track::Sozel,
        &[
            ("Türkçe", 3, "#8b5cf6"),
            ("Sosyal Bilimler", 3, "#06b6d4"),
            ("Matematik", 2, "#3b82f6"),
        ],
    ),
    (
        Track::Dil,
        &[("İngilizce", 3, "#f97316"), ("Türkçe", 3, "#8b5cf6")],
    ),
];

#[derive(Deserialize)]
pub struct CreateSubjectRequest {
    pub name: String,
    pub level: i32,
    pub color: String,
}

#[derive(Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

pub async fn list_subjects(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
) -> Result<Json<Vec<Subject>>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let subjects = subjects::table
        .filter(subjects::user_id.eq(user_id))
        .order(subjects::subject_id.asc())
        .select(Subject::as_select())
        .load(&mut conn)
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?;

    Ok(Json(subjects))
}

pub async fn create_subject(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
    Json(payload): Json<CreateSubjectRequest>,
) -> Result<Json<ApiResponse>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    if !(1..=5).contains(&payload.level) {
        return Err((StatusCode::BAD_REQUEST, "Level must be between 1 and 5".to_string()));
    }
    if !COLOR_RE.is_match(&payload.color) {
        return Err((StatusCode::BAD_REQUEST, "Color must be a #rrggbb value".to_string()));
    }

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    diesel::insert_into(subjects::table)
        .values(&NewSubject {
            user_id,
            name: &payload.name,
            level: payload.level,
            color: &payload.color,
            is_active: true,
        })
        .execute(&mut conn)
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?;

    let subject_id = diesel::select(diesel::dsl::sql::<Integer>("last_insert_rowid()"))
        .get_result::<i32>(&mut conn)
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?;

    // The registry changed, so the week is rebuilt from scratch.
    planner::regenerate_for_user(&mut conn, user_id).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    Ok(Json(ApiResponse {
        success: true,
        message: format!("Subject {} created", subject_id),
    }))
}

pub async fn update_subject(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
    Path(subject_id): Path<i32>,
    Json(payload): Json<SubjectUpdate>,
) -> Result<Json<ApiResponse>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    if let Some(level) = payload.level {
        if !(1..=5).contains(&level) {
            return Err((StatusCode::BAD_REQUEST, "Level must be between 1 and 5".to_string()));
        }
    }
    if let Some(ref color) = payload.color {
        if !COLOR_RE.is_match(color) {
            return Err((StatusCode::BAD_REQUEST, "Color must be a #rrggbb value".to_string()));
        }
    }

    if payload.name.is_none()
        && payload.level.is_none()
        && payload.color.is_none()
        && payload.is_active.is_none()
    {
        return Ok(Json(ApiResponse {
            success: true,
            message: "Nothing to update".to_string(),
        }));
    }

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let updated = diesel::update(
        subjects::table
            .filter(subjects::subject_id.eq(subject_id))
            .filter(subjects::user_id.eq(user_id)),
    )
    .set(&payload)
    .execute(&mut conn)
    .map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    if updated == 0 {
        return Err((StatusCode::NOT_FOUND, "Subject not found".to_string()));
    }

    planner::regenerate_for_user(&mut conn, user_id).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    Ok(Json(ApiResponse {
        success: true,
        message: "Subject updated".to_string(),
    }))
}

pub async fn delete_subject(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
    Path(subject_id): Path<i32>,
) -> Result<Json<ApiResponse>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let subject_exists = subjects::table
        .filter(subjects::subject_id.eq(subject_id))
        .filter(subjects::user_id.eq(user_id))
        .count()
        .get_result::<i64>(&mut conn)
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })? > 0;

    if !subject_exists {
        return Err((StatusCode::NOT_FOUND, "Subject not found".to_string()));
    }

    // Removal cascades to this subject's sessions; the rest of the week is
    // left as-is rather than regenerated.
    conn.transaction::<_, diesel::result::Error, _>(|conn| {
        diesel::delete(
            study_sessions::table
                .filter(study_sessions::user_id.eq(user_id))
                .filter(study_sessions::subject_id.eq(subject_id.to_string())),
        )
        .execute(conn)?;
        diesel::delete(
            subjects::table
                .filter(subjects::subject_id.eq(subject_id))
                .filter(subjects::user_id.eq(user_id)),
        )
        .execute(conn)
    })
    .map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    Ok(Json(ApiResponse {
        success: true,
        message: "Subject deleted".to_string(),
    }))
}

/// Replaces the user's registry with the preset subject set of the track.
pub fn seed_default_subjects(
    conn: &mut SqliteConnection,
    user_id: i32,
    track: Track,
) -> Result<(), diesel::result::Error> {
    let presets = DEFAULT_SUBJECTS
        .iter()
        .find(|(t, _)| *t == track)
        .map(|(_, presets)| *presets)
        .unwrap_or_default();

    conn.transaction(|conn| {
        diesel::delete(subjects::table.filter(subjects::user_id.eq(user_id))).execute(conn)?;
        for &(name, level, color) in presets {
            diesel::insert_into(subjects::table)
                .values(&NewSubject {
                    user_id,
                    name,
                    level,
                    color,
                    is_active: true,
                })
                .execute(conn)?;
        }
        Ok(())
    })
}
