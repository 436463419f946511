use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

mod clients;
mod config;
mod linking;
mod middleware;
mod models;
mod retry;
mod reveal;
mod routes;
mod session;
mod types;

pub use config::AppConfig;

use clients::{SensayClient, SupabaseAuthClient};
use models::{IdentityStore, PgIdentityStore};
use retry::RetryPolicy;

/// Shared service objects, constructed once at startup and injected into
/// handlers instead of living as module-scope singletons.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub supabase: SupabaseAuthClient,
    pub sensay: SensayClient,
    pub identities: Arc<dyn IdentityStore>,
    pub retry: RetryPolicy,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::auth::signup,
        routes::auth::login,
        routes::auth::logout,
        routes::auth::session,
        routes::chat::send_message,
        routes::chat::chat_history,
    ),
    components(schemas(
        types::SignupRequest,
        types::LoginRequest,
        types::SessionResponse,
        types::SessionUser,
        types::SendMessageRequest,
        types::SendMessageResponse,
        types::UiMessage,
        types::Sender,
        session::SessionState,
        session::AuthView,
    ))
)]
struct ApiDoc;

pub fn configure_app(cfg: &mut web::ServiceConfig, state: Arc<AppState>) {
    let authentication = middleware::auth::Authentication {
        app_config: state.config.clone(),
    };

    cfg.app_data(web::Data::new(state))
        .service(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .service(
            web::scope("")
                .wrap(authentication)
                .service(
                    web::scope("/auth")
                        .service(routes::auth::signup)
                        .service(routes::auth::login)
                        .service(routes::auth::logout)
                        .service(routes::auth::session),
                )
                .service(
                    web::scope("/chats")
                        .service(routes::chat::send_message)
                        .service(routes::chat::chat_history),
                ),
        );
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = Arc::new(AppState {
        supabase: SupabaseAuthClient::new(&config.supabase_url, &config.supabase_anon_key),
        sensay: SensayClient::new(
            &config.sensay_api_url,
            &config.sensay_organization_secret,
            &config.sensay_api_version,
        ),
        identities: Arc::new(PgIdentityStore::new(pool)),
        retry: RetryPolicy::signup(),
        config,
    });

    info!("Listening on 0.0.0.0:8080");
    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(Cors::permissive())
            .configure(move |cfg| configure_app(cfg, state))
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await?;

    Ok(())
}
