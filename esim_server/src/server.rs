use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use esim_engine::{
    adapters::PaymentGatewayRegistry,
    api::PaymentFlowApi,
    catalog::CatalogSyncOrchestrator,
    scheduler::{Clock, SystemClock},
    SqliteDatabase,
};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    helpers::AdminToken,
    integrations::{build_gateway_registry, build_provider_registry, build_push_notifier, create_event_handlers},
    routes::{health, ManualSyncRoute, PaymentWebhookRoute, UnifiedCatalogRoute},
    workers::{create_workers, CatalogSync, WorkerContext},
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let handlers = create_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let providers = Arc::new(build_provider_registry(&db, &config.airalo).await?);
    let gateways = Arc::new(build_gateway_registry(&db, &config.stripe).await?);
    let notifier = build_push_notifier(&config.fcm)?;
    let catalog = Arc::new(
        CatalogSyncOrchestrator::new(
            db.clone(),
            Arc::clone(&providers),
            Arc::clone(&clock),
            config.schedules.adapter_timeout,
        )
        .with_producers(producers.clone()),
    );

    let ctx = WorkerContext { db: db.clone(), providers, notifier, producers, clock };
    let workers = create_workers(ctx, Arc::clone(&catalog), &config.schedules);
    if config.disable_schedulers {
        warn!("🕰️ Schedulers are disabled. Catalog syncs only run through the manual trigger.");
    } else {
        workers.start();
    }

    let srv = create_server_instance(config, db, catalog, gateways)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    workers.stop();
    result
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    catalog: Arc<CatalogSync>,
    gateways: Arc<PaymentGatewayRegistry>,
) -> Result<Server, ServerError> {
    let admin_token = AdminToken(config.admin_token.clone());
    let srv = HttpServer::new(move || {
        let payments_api = PaymentFlowApi::new(db.clone(), Arc::clone(&gateways));
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("esim::access_log"))
            .app_data(web::Data::new(db.clone()))
            .app_data(web::Data::from(Arc::clone(&catalog)))
            .app_data(web::Data::new(payments_api))
            .app_data(web::Data::new(admin_token.clone()))
            .service(health)
            .service(UnifiedCatalogRoute::<SqliteDatabase>::new())
            .service(ManualSyncRoute::<SqliteDatabase>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("💻️ Listening on {}:{}", config.host, config.port);
    Ok(srv)
}
