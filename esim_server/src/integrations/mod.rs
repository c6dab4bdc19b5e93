//! Wiring between the engine and the concrete vendor integrations.
mod hooks;
mod vendors;

pub use hooks::{create_event_handlers, EVENT_BUFFER_SIZE};
pub use vendors::{build_gateway_registry, build_provider_registry, build_push_notifier, AIRALO_SLUG, STRIPE_SLUG};
