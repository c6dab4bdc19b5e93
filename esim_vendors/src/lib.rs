//! Vendor integrations: the Airalo provider adapter, the Stripe payment gateway and the FCM push notifier.
mod airalo;
mod api;
mod config;
mod error;
mod fcm;
mod stripe;

mod data_objects;
pub mod helpers;

pub use airalo::{map_order_status, AiraloAdapter};
pub use api::VendorApi;
pub use config::{AiraloConfig, FcmConfig, StripeConfig, DEFAULT_VENDOR_TIMEOUT};
pub use error::VendorApiError;
pub use fcm::FcmPushNotifier;
pub use stripe::{map_payment_status, StripeGateway};
