use axum::{
    extract::{Form, State},
    response::{Html, Redirect},
    routing::get,
    Router,
};
use bcrypt::{hash, DEFAULT_COST};
use diesel::prelude::*;
use std::sync::Arc;
use tera::Tera;
use validator::Validate;

use crate::{
    auth::{set_user_session, RegisterError, RegisterForm},
    model::{NewUser, Track, User},
    schema::users,
    subject,
    utils::render_template,
    DbPool,
};

pub async fn show_register_form(
    State((_pool, tera)): State<(DbPool, Arc<Tera>)>,
) -> Html<String> {
    let mut context = tera::Context::new();
    context.insert("title", "Kayıt");
    render_template(&tera, "register.html", context)
}

#[axum::debug_handler]
pub async fn handle_register(
    State((pool, _tera)): State<(DbPool, Arc<Tera>)>,
    session: tower_sessions::Session,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect, RegisterError> {
    form.validate()?;

    let mut conn = pool.get()?;

    let existing_user = users::table
        .filter(users::email.eq(&form.email))
        .select(User::as_select())
        .first::<User>(&mut conn)
        .optional()?;

    if existing_user.is_some() {
        return Err(RegisterError::EmailTaken);
    }

    let hashed_password = hash(&form.password, DEFAULT_COST)?;

    diesel::insert_into(users::table)
        .values(&NewUser {
            email: &form.email,
            password: &hashed_password,
            name: &form.name,
            track: Track::Sayisal.as_str(),
            level: 3,
            hours_per_week: 30,
        })
        .execute(&mut conn)?;

    let user = users::table
        .filter(users::email.eq(&form.email))
        .select(User::as_select())
        .first::<User>(&mut conn)?;

    // New accounts start with the default subject set of the default track.
    subject::seed_default_subjects(&mut conn, user.user_id, Track::Sayisal)?;

    set_user_session(&session, user.user_id, &user.email).await?;

    Ok(Redirect::to("/dashboard"))
}

pub fn auth_router(pool: DbPool, tera: Arc<Tera>) -> Router {
    Router::new()
        .route("/register", get(show_register_form).post(handle_register))
        .with_state((pool, tera))
}
