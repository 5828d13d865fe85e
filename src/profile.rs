use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    gamification,
    model::{Track, User},
    planner,
    schema::users,
    subject, utils, DbPool,
};

#[derive(Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub track: Track,
    pub level: i32,
    pub hours_per_week: Option<i32>,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub name: String,
    pub track: String,
    pub level: i32,
    pub hours_per_week: i32,
    pub total_points: i32,
    pub gamification_level: i32,
}

#[derive(Serialize)]
pub struct ProfileUpdateResponse {
    pub success: bool,
    pub sessions_created: usize,
}

pub async fn get_profile(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
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

    let total_points = gamification::unlocked_points(&mut conn, user_id).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    Ok(Json(ProfileResponse {
        name: user.name,
        track: user.track,
        level: user.level,
        hours_per_week: user.hours_per_week,
        total_points,
        gamification_level: gamification::level_for_points(total_points),
    }))
}

/// Applies the profile wizard: the registry is reset to the track's default
/// subjects and the week is rebuilt, exactly as if the user had just picked
/// the track.
#[axum::debug_handler]
pub async fn update_profile(
    State(pool): State<DbPool>,
    session: tower_sessions::Session,
    Json(payload): Json<ProfileForm>,
) -> Result<Json<ProfileUpdateResponse>, (StatusCode, String)> {
    let user_id = match utils::get_current_user_id(&session).await {
        Some(id) => id,
        None => return Err((StatusCode::UNAUTHORIZED, "Not logged in".to_string())),
    };

    if !(1..=5).contains(&payload.level) {
        return Err((StatusCode::BAD_REQUEST, "Level must be between 1 and 5".to_string()));
    }
    let hours_per_week = payload.hours_per_week.unwrap_or(30);
    if !(1..=80).contains(&hours_per_week) {
        return Err((
            StatusCode::BAD_REQUEST,
            "Weekly hours must be between 1 and 80".to_string(),
        ));
    }

    let mut conn = pool.get().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    diesel::update(users::table.find(user_id))
        .set((
            users::name.eq(&payload.name),
            users::track.eq(payload.track.as_str()),
            users::level.eq(payload.level),
            users::hours_per_week.eq(hours_per_week),
        ))
        .execute(&mut conn)
        .map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?;

    subject::seed_default_subjects(&mut conn, user_id, payload.track).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    let created = planner::regenerate_for_user(&mut conn, user_id).map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
    })?;

    Ok(Json(ProfileUpdateResponse {
        success: true,
        sessions_created: created,
    }))
}
