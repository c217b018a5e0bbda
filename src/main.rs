//! Rollcall - geofenced classroom attendance tracking

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxAttendanceRepository, SqlxAuthTokenRepository, SqlxSessionRepository,
            SqlxStudentRepository, SqlxTeacherRepository,
        },
    },
    services::{
        attendance::AttendanceService, auth::AuthService, face::HttpFaceMatchClient,
        session::SessionService, student::StudentService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rollcall attendance system...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let teacher_repo = SqlxTeacherRepository::boxed(pool.clone());
    let token_repo = SqlxAuthTokenRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let attendance_repo = SqlxAttendanceRepository::boxed(pool.clone());
    let student_repo = SqlxStudentRepository::boxed(pool.clone());

    // Face service client
    let face_client: Arc<dyn rollcall::services::FaceMatchClient> =
        Arc::new(HttpFaceMatchClient::new(&config.face)?);
    tracing::info!("Face service configured: {}", config.face.url);

    // Initialize services
    let auth_service = Arc::new(AuthService::new(teacher_repo, token_repo));
    let session_service = Arc::new(SessionService::new(session_repo, config.session.clone()));
    let attendance_service = Arc::new(AttendanceService::new(
        session_service.clone(),
        attendance_repo,
        student_repo.clone(),
        face_client.clone(),
        config.face.similarity_threshold,
    ));
    let student_service = Arc::new(StudentService::new(student_repo, face_client));

    // Build application state
    let state = AppState {
        pool: pool.clone(),
        auth_service: auth_service.clone(),
        session_service: session_service.clone(),
        attendance_service,
        student_service,
        upload_config: Arc::new(config.upload.clone()),
    };

    // Background sweep: close expired sessions and drop expired tokens
    {
        let sessions = session_service.clone();
        let auth = auth_service.clone();
        let interval_secs = config.session.sweep_interval_secs.max(1);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                if let Err(e) = sessions.sweep_expired().await {
                    tracing::warn!("Session sweep failed: {:#}", e);
                }
                if let Err(e) = auth.sweep_expired_tokens().await {
                    tracing::warn!("Token sweep failed: {:#}", e);
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
