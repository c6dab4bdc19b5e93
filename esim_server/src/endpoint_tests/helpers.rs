use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use async_trait::async_trait;
use esim_common::{Cents, Secret};
use esim_engine::{
    adapters::{
        store_packages,
        PaymentGateway,
        PaymentGatewayRegistry,
        ProviderAdapter,
        ProviderError,
        ProviderRegistry,
        SyncResult,
        UsageData,
    },
    api::PaymentFlowApi,
    catalog::CatalogSyncOrchestrator,
    db_types::{NewPackage, OrderStatusType, PaymentGatewayConfig, Provider},
    scheduler::{Clock, SystemClock},
    test_utils::{prepare_test_env, random_db_path},
    traits::CatalogManagement,
    SqliteDatabase,
};
use esim_vendors::{StripeConfig, StripeGateway};
use log::debug;

use crate::{
    helpers::AdminToken,
    routes::{health, ManualSyncRoute, PaymentWebhookRoute, UnifiedCatalogRoute},
};

pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const WEBHOOK_SECRET: &str = "whsec_endpoint_tests";

pub async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

/// A provider that always returns the same catalog, or always fails.
pub struct StaticProvider {
    provider_id: i64,
    db: SqliteDatabase,
    packages: Option<Vec<NewPackage>>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ProviderAdapter for StaticProvider {
    fn slug(&self) -> &str {
        "static"
    }

    async fn sync_packages(&self) -> Result<SyncResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.packages {
            Some(packages) => store_packages(&self.db, self.provider_id, packages.clone()).await,
            None => Err(ProviderError::Transient("connection reset".into())),
        }
    }

    async fn get_usage_data(&self, _iccid: &str) -> Result<UsageData, ProviderError> {
        Err(ProviderError::Terminal("not supported".into()))
    }

    async fn get_order_status(&self, _order_ref: &str) -> Result<OrderStatusType, ProviderError> {
        Err(ProviderError::Terminal("not supported".into()))
    }
}

pub fn package(code: &str, destination: &str, price: i64) -> NewPackage {
    NewPackage {
        package_code: code.to_string(),
        destination: destination.to_string(),
        title: format!("{code} plan"),
        data_amount_mb: 1024,
        validity_days: 7,
        price: Cents::from(price),
        currency: "USD".to_string(),
    }
}

/// Registers a [`StaticProvider`] for `provider`. Returns a counter of sync calls.
pub fn register_static(
    registry: &ProviderRegistry,
    db: &SqliteDatabase,
    provider: Provider,
    packages: Option<Vec<NewPackage>>,
) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let db = db.clone();
    let slug = provider.slug.clone();
    registry.register(&slug, provider, move |p: &Provider| {
        let adapter = StaticProvider {
            provider_id: p.id,
            db: db.clone(),
            packages: packages.clone(),
            calls: Arc::clone(&counter),
        };
        Ok::<_, String>(Arc::new(adapter) as Arc<dyn ProviderAdapter>)
    });
    calls
}

pub fn stripe_registry() -> PaymentGatewayRegistry {
    let registry = PaymentGatewayRegistry::new();
    let stripe = StripeConfig { webhook_secret: Secret::from(WEBHOOK_SECRET), ..Default::default() };
    registry.register("stripe", PaymentGatewayConfig::new("stripe", "Stripe"), move |c: &PaymentGatewayConfig| {
        StripeGateway::new(c.clone(), stripe.clone()).map(|g| Arc::new(g) as Arc<dyn PaymentGateway>)
    });
    registry
}

/// Everything the routes need, backed by a real database.
#[derive(Clone)]
pub struct TestContext {
    pub db: SqliteDatabase,
    pub providers: Arc<ProviderRegistry>,
    pub gateways: Arc<PaymentGatewayRegistry>,
}

impl TestContext {
    pub async fn new() -> Self {
        let db = new_db().await;
        Self { db, providers: Arc::new(ProviderRegistry::new()), gateways: Arc::new(stripe_registry()) }
    }

    pub async fn add_provider(&self, slug: &str) -> Provider {
        let provider = esim_engine::db_types::NewProvider::new(slug, slug);
        self.db.upsert_provider(provider).await.expect("Error adding provider")
    }

    /// Sends `req` to an app with every route registered.
    pub async fn call(&self, req: TestRequest) -> (StatusCode, String) {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let orchestrator = CatalogSyncOrchestrator::new(
            self.db.clone(),
            Arc::clone(&self.providers),
            clock,
            std::time::Duration::from_secs(5),
        );
        let payments = PaymentFlowApi::new(self.db.clone(), Arc::clone(&self.gateways));
        let app = App::new()
            .app_data(web::Data::new(self.db.clone()))
            .app_data(web::Data::new(orchestrator))
            .app_data(web::Data::new(payments))
            .app_data(web::Data::new(AdminToken(Secret::from(ADMIN_TOKEN))))
            .service(health)
            .service(UnifiedCatalogRoute::<SqliteDatabase>::new())
            .service(ManualSyncRoute::<SqliteDatabase>::new())
            .service(PaymentWebhookRoute::<SqliteDatabase>::new());
        let service = test::init_service(app).await;
        debug!("Making request");
        let res = test::call_service(&service, req.to_request()).await;
        let status = res.status();
        let body = res.into_body().try_into_bytes().expect("Error reading body");
        (status, String::from_utf8_lossy(&body).into_owned())
    }
}
