use std::sync::Arc;

use thesis_review::directory::SqlDirectory;
use thesis_review::notify::{LogNotifier, NotificationDispatcher, Notifier, WebhookNotifier};
use thesis_review::review::{Collaborators, ReviewServices};
use thesis_review::storage::LocalDocumentStore;
use thesis_review::{config, db, routes, state, storage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "thesis_review=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    storage::ensure_dirs(&config.upload_folder)?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::run_migrations(pool.as_ref()).await?;

    let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!("Delivering notifications to {}", url);
            Arc::new(WebhookNotifier::new(url.clone(), config.notify_timeout)?)
        }
        None => {
            tracing::info!("No NOTIFY_WEBHOOK_URL set; notifications are logged only");
            Arc::new(LogNotifier)
        }
    };

    let directory = Arc::new(SqlDirectory::new(pool.clone()));
    let services = ReviewServices::new(
        pool.clone(),
        Collaborators {
            directory: directory.clone(),
            capabilities: directory,
            notifications: NotificationDispatcher::new(notifier, config.notify_timeout),
            documents: Arc::new(LocalDocumentStore::new(config.upload_folder.clone())),
        },
        config.in_review_includes_rejected,
    );

    let state = Arc::new(state::AppState {
        pool,
        services: Arc::new(services),
    });

    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Thesis review listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
