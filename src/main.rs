use anyhow::Context as _;
use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::{get, get_service, post},
    Router,
};
use diesel::{
    r2d2::{ConnectionManager, Pool},
    SqliteConnection,
};
use std::sync::Arc;
use tera::{Context, Tera};
use time::Duration;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

mod allocation;
mod auth;
mod gamification;
mod login;
mod model;
mod planner;
mod profile;
mod register;
mod resources;
mod schema;
mod stats;
mod subject;
mod utils;

type DbPool = Pool<ConnectionManager<SqliteConnection>>;

const INIT_SQL: &str = "
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    track TEXT NOT NULL DEFAULT 'sayisal',
    level INTEGER NOT NULL DEFAULT 3,
    hours_per_week INTEGER NOT NULL DEFAULT 30
);
CREATE TABLE IF NOT EXISTS subjects (
    subject_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users (user_id),
    name TEXT NOT NULL,
    level INTEGER NOT NULL DEFAULT 3,
    color TEXT NOT NULL DEFAULT '#3b82f6',
    is_active BOOLEAN NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS study_sessions (
    user_id INTEGER NOT NULL REFERENCES users (user_id),
    slot_id TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    subject_name TEXT NOT NULL,
    start_time TEXT NOT NULL,
    duration_min INTEGER NOT NULL,
    day_index INTEGER NOT NULL,
    completed BOOLEAN NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, slot_id)
);
CREATE TABLE IF NOT EXISTS achievement_states (
    user_id INTEGER NOT NULL REFERENCES users (user_id),
    achievement_id TEXT NOT NULL,
    unlocked BOOLEAN NOT NULL DEFAULT 0,
    unlocked_at TIMESTAMP,
    progress DOUBLE NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, achievement_id)
);
CREATE TABLE IF NOT EXISTS progress_counters (
    user_id INTEGER PRIMARY KEY REFERENCES users (user_id),
    perfect_weeks INTEGER NOT NULL DEFAULT 0,
    early_sessions INTEGER NOT NULL DEFAULT 0,
    late_sessions INTEGER NOT NULL DEFAULT 0,
    fast_completions INTEGER NOT NULL DEFAULT 0,
    weekly_goal_completions INTEGER NOT NULL DEFAULT 0
);
";

fn init_schema(pool: &DbPool) -> anyhow::Result<()> {
    use diesel::connection::SimpleConnection;

    let mut conn = pool
        .get()
        .context("Failed to get connection for schema init")?;
    conn.batch_execute(INIT_SQL)
        .context("Failed to initialize database schema")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Database configuration
    dotenv::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://yks-planner.db".into());

    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .build(manager)
        .context("Failed to create DB pool")?;

    init_schema(&pool)?;

    // Templates configuration
    let templates = match Tera::new("templates/**/*.html") {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Template parsing error: {}", e);
            std::process::exit(1);
        }
    };
    let templates = Arc::new(templates);

    // Sessions configuration
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::days(1)))
        .with_secure(false);

    // Subject registry API router
    let subject_api_router = Router::new()
        .route("/", get(subject::list_subjects))
        .route("/create", post(subject::create_subject))
        .route("/{id}/update", post(subject::update_subject))
        .route("/{id}/delete", post(subject::delete_subject))
        .with_state(pool.clone());

    // Weekly plan API router
    let plan_api_router = Router::new()
        .route("/", get(planner::get_plan))
        .route("/regenerate", post(planner::regenerate))
        .with_state(pool.clone());

    // Progress tracking and gamification API router
    let tracking_api_router = Router::new()
        .route("/sessions/complete", post(planner::complete_session))
        .route("/stats", get(stats::get_stats))
        .route("/achievements", get(gamification::list_achievements))
        .route("/leaderboard", get(gamification::leaderboard))
        .route("/allocation", get(allocation::get_allocation))
        .route("/resources", get(resources::get_resources))
        .route("/profile", get(profile::get_profile).post(profile::update_profile))
        .with_state(pool.clone());

    // Combined API router
    let api_router = Router::new()
        .nest("/subjects", subject_api_router)
        .nest("/plan", plan_api_router)
        .merge(tracking_api_router);

    // Auth router
    let auth_router = Router::new()
        .merge(login::auth_router(pool.clone(), templates.clone()))
        .merge(register::auth_router(pool.clone(), templates.clone()))
        .route("/logout", get(login::handle_logout));

    // Main application router
    let app = Router::new()
        // Pages
        .route("/", get(home))
        .route("/dashboard", get(dashboard))
        .route("/plan", get(plan_page))
        // Auth routes
        .nest("/auth", auth_router)
        // API routes
        .nest("/api", api_router)
        // Static files
        .nest_service("/static", get_service(ServeDir::new("static")))
        // Shared state and layers
        .layer(Extension(templates))
        .layer(session_layer);

    // Start server
    let listener = TcpListener::bind("127.0.0.1:5000")
        .await
        .context("Failed to bind to address")?;

    println!("Server running on http://localhost:5000");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

// Handlers for pages
async fn home(Extension(templates): Extension<Arc<Tera>>) -> impl IntoResponse {
    utils::render_template(&templates, "index.html", Context::new())
}

async fn dashboard(Extension(templates): Extension<Arc<Tera>>) -> impl IntoResponse {
    utils::render_template(&templates, "dashboard.html", Context::new())
}

async fn plan_page(Extension(templates): Extension<Arc<Tera>>) -> impl IntoResponse {
    utils::render_template(&templates, "plan.html", Context::new())
}
