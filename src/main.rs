use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use quire::{
    application::{auth::Authenticator, auth::hash_token, error::AppError, pagination::Paginator},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::MemoryRepositories,
        telemetry,
    },
};
use sqlx::PgPool;
use tokio::{net::TcpListener, sync::watch};
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

    if let config::Command::HashToken(args) = &command {
        println!("{}", hash_token(&args.token));
        return Ok(());
    }

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::HashToken(_) => Ok(()),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let authenticator = Authenticator::new(settings.auth.credentials.clone());
    let paginator = Paginator::new(settings.pagination.page_size);
    let site_title = settings.site.title.as_str();

    if settings.auth.credentials.is_empty() {
        warn!(
            target = "quire::serve",
            "no credentials configured; every request is anonymous"
        );
    }

    let state = match settings.database.url.as_deref() {
        Some(url) => {
            let pool = connect_and_migrate(url, settings.database.max_connections.get()).await?;
            let repositories = Arc::new(PostgresRepositories::new(pool));
            HttpState::from_repositories(repositories, authenticator, paginator, site_title)
        }
        None => {
            warn!(
                target = "quire::serve",
                "database.url is not set; content is kept in memory and lost on exit"
            );
            let repositories = Arc::new(MemoryRepositories::new());
            HttpState::from_repositories(repositories, authenticator, paginator, site_title)
        }
    };

    serve_http(&settings.server, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| AppError::unexpected("migrate requires database.url to be set"))?;

    connect_and_migrate(url, settings.database.max_connections.get()).await?;
    info!(target = "quire::migrate", "migrations applied");
    Ok(())
}

async fn connect_and_migrate(url: &str, max_connections: u32) -> Result<PgPool, AppError> {
    let pool = PostgresRepositories::connect(url, max_connections)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(pool)
}

async fn serve_http(
    server: &config::ServerSettings,
    state: HttpState,
) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = TcpListener::bind(server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(target = "quire::serve", addr = %server.addr, "listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    serve_until_shutdown(listener, router, shutdown_rx, server.graceful_shutdown).await?;

    info!(target = "quire::serve", "server stopped");
    Ok(())
}

async fn serve_until_shutdown(
    listener: TcpListener,
    router: axum::Router,
    shutdown_rx: watch::Receiver<bool>,
    grace: Duration,
) -> Result<(), AppError> {
    let mut graceful_rx = shutdown_rx.clone();
    let serve = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = graceful_rx.wait_for(|requested| *requested).await;
        })
        .into_future();
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        () = drain_deadline(shutdown_rx, grace) => {
            warn!(
                target = "quire::serve",
                seconds = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

/// Resolves once shutdown was requested and `grace` has elapsed since.
async fn drain_deadline(mut shutdown: watch::Receiver<bool>, grace: Duration) {
    if shutdown.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "quire::serve", error = %err, "failed to listen for ctrl-c");
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
                error!(target = "quire::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!(target = "quire::serve", "shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_stops_once_shutdown_is_requested() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).expect("receiver alive");

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            serve_until_shutdown(
                listener,
                axum::Router::new(),
                shutdown_rx,
                Duration::from_secs(1),
            ),
        )
        .await
        .expect("server should stop within the timeout");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn drain_deadline_waits_for_the_request() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let deadline = drain_deadline(shutdown_rx, Duration::from_millis(10));
        tokio::pin!(deadline);

        let early = tokio::time::timeout(Duration::from_millis(50), &mut deadline).await;
        assert!(early.is_err(), "no shutdown requested yet");

        shutdown_tx.send(true).expect("receiver alive");
        tokio::time::timeout(Duration::from_secs(1), deadline)
            .await
            .expect("deadline elapses after the request");
    }
}
