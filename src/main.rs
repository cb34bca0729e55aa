use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkpoint::config::Config;
use checkpoint::middleware::audit::ScanRecorder;
use checkpoint::middleware::metrics::ScanMetrics;
use checkpoint::middleware::validate::{self, PassLookup};
use checkpoint::models::scan::format_timestamp;
use checkpoint::store::postgres::PgStore;
use checkpoint::{api, cli, config, sink, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    // OTLP export is opt-in via OTEL_EXPORTER_OTLP_ENDPOINT.
    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "checkpoint"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "checkpoint=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Check { tag_id }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let result = check_tag(&db, &tag_id).await;
            db.close().await;
            result
        }
        Some(cli::Commands::Migrate) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            db.migrate().await?;
            println!("Migrations applied.");
            db.close().await;
            Ok(())
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    opentelemetry::global::shutdown_tracer_provider();
    result
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let sink = sink::open(&cfg, db.pool().clone())?;
    let metrics = Arc::new(ScanMetrics::new());
    let recorder = ScanRecorder::start(sink, cfg.record_mode, metrics);

    let state = Arc::new(AppState {
        passes: Arc::new(db.clone()),
        recorder,
        config: cfg,
    });

    let app = api::app(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("checkpoint listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped accepting connections, flushing scan log");
    state.recorder.shutdown().await;
    db.close().await;
    tracing::info!("Graceful shutdown complete");

    Ok(())
}

async fn check_tag(db: &PgStore, tag_id: &str) -> anyhow::Result<()> {
    let now = chrono::Utc::now();
    let lookup: &dyn PassLookup = db;
    let outcome = validate::validate(Some(tag_id), now, lookup).await?;

    println!("Tag:       {}", tag_id);
    println!("Status:    {}", outcome.status_code());
    println!("Result:    {}", outcome.result().as_str());
    println!("Message:   {}", outcome.message());
    if let Some(code) = outcome.error_code() {
        println!("Code:      {}", code);
    }
    if let Some(id) = outcome.application_id {
        println!("Pass:      {}", id);
    }
    if let Some(vehicle) = &outcome.vehicle {
        println!(
            "Vehicle:   {} ({}){}",
            vehicle.plate_number,
            vehicle.vehicle_type,
            vehicle
                .driver_name
                .as_deref()
                .map(|d| format!(", driver {}", d))
                .unwrap_or_default()
        );
    }
    if let Some(rfid) = &outcome.rfid_validity {
        println!("Active:    {}", rfid.is_active);
        if let Some(until) = &rfid.valid_until {
            println!("Valid to:  {}", format_timestamp(until));
        }
    }
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
