use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coursepay::config::Config;
use coursepay::db::{AppState, create_pool, init_db, queries};
use coursepay::handlers;
use coursepay::jwt::AccessTokens;
use coursepay::models::{CreateCourse, CreatePartner, CreateTariff, ProfileRole};
use coursepay::payments::StripeClient;

const DEV_TOKEN_TTL_SECS: u64 = 30 * 86400;

#[derive(Parser, Debug)]
#[command(name = "coursepay")]
#[command(about = "Checkout, enrollment and referral backend for a course-selling site")]
struct Cli {
    /// Seed the database with a demo course, tariffs, users and a partner (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,

    /// Promote the profile with this email to admin, then exit
    #[arg(long, value_name = "EMAIL")]
    grant_admin: Option<String>,
}

/// Promote an existing profile to admin. Profiles are created on first sign-in,
/// so the user must have used the site at least once.
fn grant_admin(state: &AppState, email: &str) -> Result<(), String> {
    let conn = state.db.get().map_err(|e| e.to_string())?;
    let profile = queries::get_profile_by_email(&conn, email)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("No profile with email {} (sign in once first)", email))?;
    queries::set_profile_role(&conn, &profile.id, ProfileRole::Admin).map_err(|e| e.to_string())?;
    Ok(())
}

/// Seeds the database with dev data for trying the flow end to end.
/// Only runs when no courses exist yet.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing = queries::list_courses(&conn, true).expect("Failed to list courses");
    if !existing.is_empty() {
        tracing::info!("Database already has courses, skipping seed");
        return;
    }

    let admin = queries::ensure_profile(&conn, "dev-admin", Some("admin@example.com"))
        .expect("Failed to create admin profile");
    queries::set_profile_role(&conn, &admin.id, ProfileRole::Admin)
        .expect("Failed to grant admin role");
    let student = queries::ensure_profile(&conn, "dev-student", Some("student@example.com"))
        .expect("Failed to create student profile");
    let partner_profile = queries::ensure_profile(&conn, "dev-partner", Some("partner@example.com"))
        .expect("Failed to create partner profile");

    let course = queries::create_course(
        &conn,
        &CreateCourse {
            slug: "rust-for-web".into(),
            title: "Rust for Web Developers".into(),
            description: Some("Build and ship an axum service from scratch.".into()),
            is_active: true,
        },
    )
    .expect("Failed to create course");

    for (sort_order, (name, price)) in [("Self-paced", 49.0), ("With mentor", 149.0)]
        .into_iter()
        .enumerate()
    {
        queries::create_tariff(
            &conn,
            &course.id,
            &CreateTariff {
                name: name.into(),
                price,
                is_active: true,
                sort_order: sort_order as i64,
            },
        )
        .expect("Failed to create tariff");
    }

    let partner = queries::create_partner(
        &conn,
        &CreatePartner {
            user_id: partner_profile.id.clone(),
            referral_code: "DEVPARTNER".into(),
        },
    )
    .expect("Failed to create partner");

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED");
    tracing::info!("Course: {} ({})", course.title, course.slug);
    tracing::info!("Partner referral code: {}", partner.referral_code);
    for profile in [&admin, &student, &partner_profile] {
        match state
            .tokens
            .issue(&profile.id, profile.email.as_deref(), DEV_TOKEN_TTL_SECS)
        {
            Ok(token) => tracing::info!("{} token: {}", profile.id, token),
            Err(e) => tracing::warn!("Failed to issue dev token for {}: {}", profile.id, e),
        }
    }
    tracing::info!("============================================");
}

/// Hourly purge of abandoned checkout sessions and old webhook event ids.
fn spawn_cleanup_task(state: AppState, session_retention_days: i64, event_retention_days: i64) {
    tokio::spawn(async move {
        let interval = Duration::from_secs(60 * 60);

        loop {
            tokio::time::sleep(interval).await;

            let conn = match state.db.get() {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Failed to get db connection for cleanup: {}", e);
                    continue;
                }
            };

            match queries::purge_stale_checkout_sessions(&conn, session_retention_days) {
                Ok(count) if count > 0 => {
                    tracing::debug!("Purged {} abandoned checkout sessions", count);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to purge checkout sessions: {}", e),
            }

            match queries::purge_old_webhook_events(&conn, event_retention_days) {
                Ok(count) if count > 0 => {
                    tracing::debug!("Purged {} old webhook events", count);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to purge webhook events: {}", e),
            }
        }
    });

    tracing::info!("Background cleanup task started (runs hourly)");
}

fn cors_layer(site_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match HeaderValue::from_str(site_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!("SITE_URL is not a valid origin ({}), CORS disabled: {}", site_url, e);
            layer
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coursepay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let tokens = match &config.auth_jwt_secret {
        Some(secret) => {
            match AccessTokens::new(secret.as_bytes(), config.auth_jwt_audience.clone()) {
                Ok(tokens) => tokens,
                Err(e) => {
                    eprintln!("Invalid AUTH_JWT_SECRET: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None if config.dev_mode => {
            tracing::warn!("AUTH_JWT_SECRET not set, using a random key (dev mode)");
            AccessTokens::generate(config.auth_jwt_audience.clone())
        }
        None => {
            eprintln!("AUTH_JWT_SECRET is required (set COURSEPAY_ENV=dev to run without it)");
            std::process::exit(1);
        }
    };

    if config.stripe_secret_key.is_none() {
        tracing::warn!("STRIPE_SECRET_KEY not set, checkout and verification will fail");
    }
    if config.stripe_webhook_secret.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set, Stripe webhooks will be rejected");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        payments: Arc::new(StripeClient::new(config.stripe_secret_key.clone())),
        tokens: Arc::new(tokens),
        webhook_secret: config.stripe_webhook_secret.clone(),
        site_url: config.site_url.clone(),
        currency: config.checkout_currency.clone(),
        commission_percent: config.referral_commission_percent,
    };

    if let Some(email) = &cli.grant_admin {
        match grant_admin(&state, email) {
            Ok(()) => println!("Granted admin role to {}", email),
            Err(e) => {
                eprintln!("ERROR: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set COURSEPAY_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    spawn_cleanup_task(
        state.clone(),
        config.checkout_session_retention_days,
        config.webhook_event_retention_days,
    );

    let app = handlers::router(state.clone(), Some(config.rate_limit))
        .layer(cors_layer(&config.site_url))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("coursepay listening on {}", addr);

    // Connect info is needed for per-IP rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
