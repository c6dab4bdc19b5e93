#![allow(dead_code)]
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use esim_common::Cents;
use esim_engine::{
    adapters::{
        store_packages,
        ConfirmPaymentRequest,
        Customer,
        CustomerRequest,
        GatewayHealth,
        PaymentGateway,
        PaymentGatewayError,
        PaymentIntent,
        PaymentIntentRequest,
        ProviderAdapter,
        ProviderError,
        ProviderRegistry,
        RefundRequest,
        RefundResult,
        SyncResult,
        UsageData,
        WebhookEvent,
        WebhookValidation,
    },
    db_types::{NewPackage, NewProvider, OrderStatusType, PaymentGatewayConfig, PaymentStatus, Provider},
    traits::{CatalogManagement, SettingsStore, StorageError},
    SqliteDatabase,
};
use serde_json::Value;

/// A migrated database in the temp directory. Each call returns a new, empty database.
pub async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let url = format!("sqlite://{}/esim_engine_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>());
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    db.migrate().await.expect("Error running migrations");
    db
}

pub async fn add_provider(db: &SqliteDatabase, provider: NewProvider) -> Provider {
    db.upsert_provider(provider).await.expect("Error saving provider")
}

pub fn package(code: &str, destination: &str, mb: i64, days: i64, price: i64) -> NewPackage {
    NewPackage {
        package_code: code.to_string(),
        destination: destination.to_string(),
        title: format!("{destination} {mb}MB {days} days"),
        data_amount_mb: mb,
        validity_days: days,
        price: Cents::from(price),
        currency: "USD".to_string(),
    }
}

#[derive(Default)]
struct FakeState {
    sync: Option<Result<SyncResult, ProviderError>>,
    catalog: Option<Vec<NewPackage>>,
    statuses: HashMap<String, Result<OrderStatusType, ProviderError>>,
    usage: HashMap<String, Result<UsageData, ProviderError>>,
    delay: Option<Duration>,
}

/// A scriptable provider. When a catalog is set, `sync_packages` stores it like a real integration would.
#[derive(Clone)]
pub struct FakeProvider {
    slug: String,
    provider_id: i64,
    db: Option<SqliteDatabase>,
    state: Arc<Mutex<FakeState>>,
    pub sync_calls: Arc<AtomicUsize>,
    pub status_calls: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn new(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            provider_id: 0,
            db: None,
            state: Arc::new(Mutex::new(FakeState::default())),
            sync_calls: Arc::new(AtomicUsize::new(0)),
            status_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// `sync_packages` stores `catalog` for the provider.
    pub fn storing(provider: &Provider, db: &SqliteDatabase) -> Self {
        let mut fake = Self::new(&provider.slug);
        fake.provider_id = provider.id;
        fake.db = Some(db.clone());
        fake
    }

    pub fn set_sync_result(&self, result: Result<SyncResult, ProviderError>) {
        self.state.lock().unwrap().sync = Some(result);
    }

    pub fn set_catalog(&self, packages: Vec<NewPackage>) {
        self.state.lock().unwrap().catalog = Some(packages);
    }

    pub fn set_status(&self, order_ref: &str, status: Result<OrderStatusType, ProviderError>) {
        self.state.lock().unwrap().statuses.insert(order_ref.to_string(), status);
    }

    pub fn set_usage(&self, iccid: &str, usage: Result<UsageData, ProviderError>) {
        self.state.lock().unwrap().usage.insert(iccid.to_string(), usage);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn register(&self, registry: &ProviderRegistry, config: Provider) {
        let fake = self.clone();
        registry.register(&self.slug, config, move |_: &Provider| {
            Ok::<_, String>(Arc::new(fake.clone()) as Arc<dyn ProviderAdapter>)
        });
    }

    async fn pause(&self) {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProviderAdapter for FakeProvider {
    fn slug(&self) -> &str {
        &self.slug
    }

    async fn sync_packages(&self) -> Result<SyncResult, ProviderError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let (scripted, catalog) = {
            let state = self.state.lock().unwrap();
            (state.sync.clone(), state.catalog.clone())
        };
        if let Some(result) = scripted {
            return result;
        }
        match (catalog, &self.db) {
            (Some(packages), Some(db)) => store_packages(db, self.provider_id, packages).await,
            _ => Ok(SyncResult::default()),
        }
    }

    async fn get_usage_data(&self, iccid: &str) -> Result<UsageData, ProviderError> {
        self.pause().await;
        self.state
            .lock()
            .unwrap()
            .usage
            .get(iccid)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::InvalidData(format!("unknown iccid {iccid}"))))
    }

    async fn get_order_status(&self, order_ref: &str) -> Result<OrderStatusType, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.state
            .lock()
            .unwrap()
            .statuses
            .get(order_ref)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::Terminal(format!("unknown order {order_ref}"))))
    }
}

pub const VALID_SIGNATURE: &str = "sig-ok";

/// A payment gateway that accepts webhooks signed with [`VALID_SIGNATURE`]. The body is JSON of the form
/// `{"id": .., "type": .., "payment_intent": .., "status": ..}`.
pub struct FakeGateway {
    config: PaymentGatewayConfig,
    pub refund_calls: AtomicUsize,
    pub refund_succeeds: bool,
}

impl FakeGateway {
    pub fn new(config: PaymentGatewayConfig) -> Self {
        Self { config, refund_calls: AtomicUsize::new(0), refund_succeeds: true }
    }

    pub fn failing_refunds(mut self) -> Self {
        self.refund_succeeds = false;
        self
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn config(&self) -> &PaymentGatewayConfig {
        &self.config
    }

    async fn create_payment_intent(&self, req: PaymentIntentRequest) -> Result<PaymentIntent, PaymentGatewayError> {
        Ok(PaymentIntent {
            id: format!("pi_{}", self.config.slug),
            amount: req.amount,
            currency: req.currency,
            status: PaymentStatus::RequiresPaymentMethod,
            client_secret: Some("secret".into()),
        })
    }

    async fn confirm_payment(&self, req: ConfirmPaymentRequest) -> Result<PaymentIntent, PaymentGatewayError> {
        Ok(PaymentIntent {
            id: req.payment_intent_id,
            amount: Cents::from(0),
            currency: "usd".into(),
            status: PaymentStatus::Succeeded,
            client_secret: None,
        })
    }

    async fn get_payment_status(&self, _payment_intent_id: &str) -> Result<PaymentStatus, PaymentGatewayError> {
        Ok(PaymentStatus::Succeeded)
    }

    async fn process_refund(&self, req: RefundRequest) -> Result<RefundResult, PaymentGatewayError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        if self.refund_succeeds {
            Ok(RefundResult::refunded(format!("re_{}", req.payment_intent_id)))
        } else {
            Ok(RefundResult::failed("no charge found"))
        }
    }

    fn validate_webhook(&self, raw_payload: &[u8], signature: &str) -> WebhookValidation {
        if signature != VALID_SIGNATURE {
            return WebhookValidation::invalid();
        }
        let Ok(payload) = serde_json::from_slice::<Value>(raw_payload) else {
            return WebhookValidation::invalid();
        };
        let text = |k: &str| payload.get(k).and_then(Value::as_str).map(String::from);
        WebhookValidation::valid(WebhookEvent {
            id: text("id").unwrap_or_default(),
            event_type: text("type").unwrap_or_default(),
            payment_intent_id: text("payment_intent"),
            status: text("status").and_then(|s| s.parse().ok()),
            payload,
        })
    }

    async fn create_customer(&self, req: CustomerRequest) -> Result<Customer, PaymentGatewayError> {
        Ok(Customer { id: "cus_1".into(), email: Some(req.email), name: req.name })
    }

    async fn get_customer(&self, _customer_id: &str) -> Result<Option<Customer>, PaymentGatewayError> {
        Ok(None)
    }

    async fn health_check(&self) -> GatewayHealth {
        GatewayHealth { healthy: true, message: None }
    }
}

/// Settings kept in memory, so that scheduler tests do not touch the file system while time is paused.
#[derive(Clone, Default)]
pub struct MemorySettings {
    values: Arc<Mutex<HashMap<String, String>>>,
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
