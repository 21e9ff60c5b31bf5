use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use tempo_execution_rs::api;
use tempo_execution_rs::config::Settings;
use tempo_execution_rs::context::RuntimeContext;
use tempo_execution_rs::executor::{SimulatedSwap, TransactionExecutor};
use tempo_execution_rs::gateway::memory::{MemoryCalendar, MemoryLedger, MemoryNetwork};
use tempo_execution_rs::recorder::LedgerAuditRecorder;
use tempo_execution_rs::scheduler::TransactionScheduler;
use tempo_execution_rs::wallet::NamespaceWallet;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    info!("╔═══════════════════════════════════════════════════════════════╗");
    info!("║                      TEMPO EXECUTION RS                       ║");
    info!("║          Calendar-Driven Transaction Scheduling Engine        ║");
    info!("╚═══════════════════════════════════════════════════════════════╝");

    dotenv::dotenv().ok();
    let settings = Settings::new().unwrap_or_else(|e| {
        error!("Failed to load settings, using defaults: {}", e);
        Settings::default()
    });

    let namespace = settings.namespace();
    let ctx = RuntimeContext::system();

    // In-process gateways; real calendar/network/ledger integrations
    // plug in behind the same traits.
    let calendar = Arc::new(MemoryCalendar::new());
    let network = Arc::new(MemoryNetwork::new());
    let ledger = Arc::new(MemoryLedger::new());

    let wallet = Arc::new(NamespaceWallet::new(
        settings.master_secret(),
        network.clone(),
    ));
    let recorder = Arc::new(LedgerAuditRecorder::new(ledger.clone()));
    let executor = Arc::new(TransactionExecutor::new(
        wallet.clone(),
        recorder.clone(),
        Arc::new(SimulatedSwap::new(ctx.ids.clone())),
        ctx.clone(),
    ));
    let scheduler = Arc::new(TransactionScheduler::new(
        calendar,
        executor,
        recorder,
        wallet.clone(),
        namespace.clone(),
        settings.scheduler_config(),
        ctx,
    ));

    info!(
        namespace = %namespace,
        address = %wallet.address(&namespace),
        "✅ Core components initialized"
    );

    match scheduler.start().await {
        Ok(()) => info!("🚀 Scheduler started"),
        // Not fatal: the control surface can retry start later.
        Err(e) => error!("Scheduler did not start: {}", e),
    }

    let port = settings.port();
    let bind_address = format!("0.0.0.0:{}", port);
    info!("🚀 Starting control API on {}", bind_address);

    let scheduler_for_api = scheduler.clone();
    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(scheduler_for_api.clone()))
            .configure(api::configure)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    let _ = scheduler.stop();
    Ok(())
}
