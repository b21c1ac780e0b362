use std::{future::IntoFuture, process, sync::Arc};

use roller_render::{
    application::{error::AppError, render::RenderService},
    cache::{CacheConfig, PlanetCache, SaltCache, WeblogPageCache, weblog_page_key},
    config::{self, ClassifyArgs, Settings},
    domain::lookup::{InMemoryWeblogs, WeblogLookup},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        site, telemetry,
    },
    request::{
        PAGE_MOUNT_POINT, PREVIEW_MOUNT_POINT, PageRequestParser, QueryParams, RawRequest,
    },
};
use serde_json::json;
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
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Classify(args) => run_classify(&settings, &args),
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let lookup: Arc<dyn WeblogLookup> = match settings.site.file.as_deref() {
        Some(path) => Arc::new(site::load_site(path).await?),
        None => {
            warn!("no site file configured, every weblog will be reported missing");
            Arc::new(InMemoryWeblogs::default())
        }
    };

    let max_tags = settings.tags.max_intersection_size.get();
    let pages = Arc::new(WeblogPageCache::new(&CacheConfig::from(
        &settings.cache.weblog_page,
    )));
    let planet = Arc::new(PlanetCache::new(&CacheConfig::from(&settings.cache.planet)));
    let salts = Arc::new(SaltCache::new(&CacheConfig::from(&settings.cache.salt)));

    let state = HttpState {
        pages: Arc::new(PageRequestParser::page(max_tags)),
        previews: Arc::new(PageRequestParser::preview(max_tags)),
        render: Arc::new(RenderService::new(lookup, pages, planet)),
        salts,
    };

    serve_http(&settings, state).await
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(addr = %settings.server.addr, "listening");

    let grace = settings.server.graceful_shutdown;
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace_secs = grace.as_secs(), "graceful shutdown timed out, exiting");
        }
    }

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn run_classify(settings: &Settings, args: &ClassifyArgs) -> Result<(), AppError> {
    let max_tags = settings.tags.max_intersection_size.get();
    let (path, query) = args.url.split_once('?').unwrap_or((args.url.as_str(), ""));

    let (parser, mount_point) = if path.starts_with(PREVIEW_MOUNT_POINT) {
        (PageRequestParser::preview(max_tags), PREVIEW_MOUNT_POINT)
    } else {
        (PageRequestParser::page(max_tags), PAGE_MOUNT_POINT)
    };
    let (servlet_path, path_info) = match path.strip_prefix(mount_point) {
        Some(rest) => (mount_point, Some(rest).filter(|rest| !rest.is_empty())),
        None => (path, None),
    };

    let mut raw = RawRequest::new(servlet_path, path_info).with_query(QueryParams::parse(query));
    if let Some(user) = args.user.as_deref() {
        raw = raw.with_principal(user);
    }

    let request = parser.classify(&raw)?;
    let summary = json!({
        "weblog": request.weblog_handle(),
        "locale": request.locale(),
        "context": request.context(),
        "anchor": request.anchor(),
        "date": request.date_string(),
        "category": request.category_name(),
        "page": request.custom_page_name(),
        "tags": request.tags(),
        "page_number": request.page_number(),
        "user": request.authentic_user(),
        "parameters": request.custom_parameters(),
        "preview": request.preview(),
        "homepage_hit": request.is_homepage_hit(),
        "content_page_hit": request.is_content_page_hit(),
        "cache_key": weblog_page_key(&request),
    });

    let rendered = serde_json::to_string_pretty(&summary)
        .map_err(|err| AppError::unexpected(format!("failed to serialise summary: {err}")))?;
    println!("{rendered}");
    Ok(())
}
