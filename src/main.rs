use std::{future::IntoFuture, process, sync::Arc};

use scrawl::{
    application::{
        compose::ComposeService,
        error::AppError,
        feed::FeedService,
        images::ImageService,
        stores::{ContentStore, ImageHost},
    },
    config,
    infra::{
        content_store::HttpContentStore, error::InfraError, http, image_host::HttpImageHost,
        telemetry,
    },
};
use tokio::net::TcpListener;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = build_http_state(&settings)?;
    let upload_body_limit = settings.uploads.max_request_bytes.get() as usize;
    let router = http::build_router(state, upload_body_limit);

    let listener = TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "scrawl::serve",
        addr = %settings.server.public_addr,
        "listening"
    );

    let (drained_tx, drained_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = drained_tx.send(());
        })
        .into_future();

    let drain_window = settings.server.graceful_shutdown;
    tokio::pin!(server);
    tokio::select! {
        result = &mut server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            let _ = drained_rx.await;
            tokio::time::sleep(drain_window).await;
        } => {
            warn!(
                target = "scrawl::serve",
                timeout_secs = drain_window.as_secs(),
                "graceful shutdown window elapsed; aborting open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    info!(target = "scrawl::serve", "shutdown signal received; draining");
}

fn build_http_state(settings: &config::Settings) -> Result<http::HttpState, AppError> {
    let store_settings = &settings.content_store;
    let base_url = store_settings
        .base_url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("content_store.base_url is not configured"))
        .map_err(AppError::from)?;
    let dataset = store_settings
        .dataset
        .as_deref()
        .ok_or_else(|| InfraError::configuration("content_store.dataset is not configured"))
        .map_err(AppError::from)?;
    let token = store_settings
        .token
        .as_deref()
        .ok_or_else(|| InfraError::configuration("content_store.token is not configured"))
        .map_err(AppError::from)?;
    let api_key = settings
        .image_host
        .api_key
        .as_deref()
        .ok_or_else(|| InfraError::configuration("image_host.api_key is not configured"))
        .map_err(AppError::from)?;

    let content_store: Arc<dyn ContentStore> = Arc::new(
        HttpContentStore::new(base_url, &store_settings.api_version, dataset, token)
            .map_err(AppError::from)?,
    );
    let image_host: Arc<dyn ImageHost> = Arc::new(
        HttpImageHost::new(settings.image_host.upload_url.clone(), api_key)
            .map_err(AppError::from)?,
    );

    let allowed_image_hosts = Arc::new(settings.image_host.allowed_hosts.clone());

    Ok(http::HttpState {
        feed: Arc::new(FeedService::new(content_store.clone())),
        compose: Arc::new(ComposeService::new(
            content_store,
            allowed_image_hosts.clone(),
        )),
        images: Arc::new(ImageService::new(image_host)),
        allowed_image_hosts,
    })
}
