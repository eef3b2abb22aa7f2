#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Email delivery service for quote notifications

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use quote_mailer::{
    domain::communication::{
        analytics::AnalyticsRecorder,
        dispatcher::EmailDispatcherImpl,
        notifications::QuoteNotifierImpl,
        queue::{DeliveryQueue, InMemoryQueueRepository, QueueService},
        suppressions::{
            InMemorySuppressionRepository, SuppressionRepository, SuppressionServiceImpl,
        },
        templates::TemplateRenderer,
    },
    infrastructure::{
        config::{BusinessSettings, DispatchSettings, QueueSettings, SuppressionSettings},
        database::postgres::{DatabaseConnectionDetails, PostgresDatabase},
        email::ProviderSettings,
        http::{AppState, HttpServer, HttpServerConfig},
    },
};
use tracing::{info, warn};

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
pub struct Args {
    /// The HTTP server configuration
    #[clap(flatten)]
    pub server: HttpServerConfig,

    /// The database connection details
    #[clap(flatten)]
    pub db: DatabaseConnectionDetails,

    /// Provider order, retries and tracking
    #[clap(flatten)]
    pub dispatch: DispatchSettings,

    /// Delivery queue
    #[clap(flatten)]
    pub queue: QueueSettings,

    /// Bounce handling
    #[clap(flatten)]
    pub suppressions: SuppressionSettings,

    /// Business identity used by the templates
    #[clap(flatten)]
    pub business: BusinessSettings,

    /// Provider credentials
    #[clap(flatten)]
    pub providers: ProviderSettings,
}

#[mutants::skip]
async fn suppression_repository(
    db: &DatabaseConnectionDetails,
) -> Result<Arc<dyn SuppressionRepository>> {
    match &db.connection_string {
        Some(connection_string) => {
            let postgres = PostgresDatabase::new(connection_string).await?;
            postgres.migrate().await?;

            info!("Suppressions are stored in Postgres");

            Ok(Arc::new(postgres))
        }
        None => {
            warn!("DATABASE_URL is not set, suppressions are kept in memory");

            Ok(Arc::new(InMemorySuppressionRepository::new()))
        }
    }
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load environment: {}", e);

            return Err(e.into());
        }
    }

    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let analytics = Arc::new(AnalyticsRecorder::new());
    let templates = Arc::new(TemplateRenderer::new(args.business.clone().into())?);

    let suppressions = Arc::new(SuppressionServiceImpl::new(
        args.suppressions.suppression_config(),
        suppression_repository(&args.db).await?,
    ));

    let dispatcher = Arc::new(EmailDispatcherImpl::new(
        args.dispatch.dispatcher_config(),
        args.providers.providers(),
        suppressions.clone(),
        templates.clone(),
        analytics.clone(),
    ));

    info!(providers = ?dispatcher.provider_names(), "Email dispatcher ready");

    let queue = Arc::new(DeliveryQueue::new(
        args.queue.queue_config(&args.dispatch),
        Arc::new(InMemoryQueueRepository::new()),
        dispatcher.clone(),
    ));
    let queue_task = queue.clone().start();
    let queue: Arc<dyn QueueService> = queue;

    let notifier =
        Arc::new(QuoteNotifierImpl::new(dispatcher.clone(), templates).with_queue(queue.clone()));

    let state = AppState::new(suppressions, dispatcher, notifier, queue, analytics)
        .with_webhook_token(args.server.webhook_token.clone())
        .with_tracking(args.dispatch.tracking());

    HttpServer::new(state, &args.server).await?.run().await?;

    queue_task.abort();

    Ok(())
}
