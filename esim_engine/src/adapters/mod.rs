//! Uniform contracts for upstream eSIM providers and payment gateways, and the registries that construct them.
mod payment;
mod provider;
mod registry;

pub use payment::{
    ensure_enabled,
    ensure_supported,
    supports_currency,
    supports_payment_method,
    ConfirmPaymentRequest,
    Customer,
    CustomerRequest,
    GatewayHealth,
    PaymentGateway,
    PaymentGatewayError,
    PaymentIntent,
    PaymentIntentRequest,
    RefundRequest,
    RefundResult,
    WebhookEvent,
    WebhookValidation,
};
pub use provider::{store_packages, ProviderAdapter, ProviderError, SyncResult, UsageData};
pub use registry::{
    AdapterConfig,
    AdapterFactory,
    AdapterRegistry,
    PaymentGatewayRegistry,
    ProviderRegistry,
    RegistryError,
};
