//! Slug-keyed adapter registry.
//!
//! A registration stores the adapter's configuration and a constructor, never an instance. Instances are built on
//! first use and memoised, so that every caller of [`AdapterRegistry::get`] for a slug shares one adapter until
//! [`AdapterRegistry::clear_cache`] is called. The catalog sync clears the cache after each pass so that
//! configuration changes (new credentials, a disabled provider) take effect on the next pass.
use std::{
    collections::HashMap,
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::*;
use thiserror::Error;

use crate::{
    adapters::{PaymentGateway, ProviderAdapter},
    db_types::{PaymentGatewayConfig, Provider},
};

/// Configuration that can be registered alongside an adapter constructor.
pub trait AdapterConfig: Clone + Send + Sync + 'static {
    fn is_enabled(&self) -> bool;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No adapter is registered for '{0}'")]
    NotRegistered(String),
    #[error("No enabled adapter is available to act as the default")]
    NoDefault,
    #[error("Could not construct the adapter for '{slug}': {reason}")]
    Construction { slug: String, reason: String },
}

pub type AdapterFactory<A, C> = Arc<dyn Fn(&C) -> Result<Arc<A>, String> + Send + Sync>;

struct Registration<A: ?Sized, C> {
    slug: String,
    config: C,
    factory: AdapterFactory<A, C>,
}

struct RegistryState<A: ?Sized, C> {
    // Kept in registration order, which defines "first enabled" for the default fallback
    registrations: Vec<Registration<A, C>>,
    instances: HashMap<String, Arc<A>>,
    default_slug: Option<String>,
}

pub struct AdapterRegistry<A: ?Sized, C> {
    state: Mutex<RegistryState<A, C>>,
}

pub type ProviderRegistry = AdapterRegistry<dyn ProviderAdapter, Provider>;
pub type PaymentGatewayRegistry = AdapterRegistry<dyn PaymentGateway, PaymentGatewayConfig>;

impl<A: ?Sized, C> Default for AdapterRegistry<A, C> {
    fn default() -> Self {
        Self {
            state: Mutex::new(RegistryState { registrations: vec![], instances: HashMap::new(), default_slug: None }),
        }
    }
}

impl<A, C> AdapterRegistry<A, C>
where
    A: ?Sized + Send + Sync + 'static,
    C: AdapterConfig,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState<A, C>> {
        // The state is never left half-updated, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `factory` as the constructor for `slug`. Re-registering a slug replaces its configuration and drops
    /// any memoised instance.
    pub fn register<F, E>(&self, slug: &str, config: C, factory: F)
    where
        F: Fn(&C) -> Result<Arc<A>, E> + Send + Sync + 'static,
        E: Display,
    {
        let factory: AdapterFactory<A, C> = Arc::new(move |c: &C| factory(c).map_err(|e| e.to_string()));
        let mut state = self.lock();
        state.instances.remove(slug);
        let registration = Registration { slug: slug.to_string(), config, factory };
        match state.registrations.iter_mut().find(|r| r.slug == slug) {
            Some(existing) => {
                *existing = registration;
                debug!("🔌️ Adapter registration for {slug} replaced");
            },
            None => {
                state.registrations.push(registration);
                debug!("🔌️ Adapter registered for {slug}");
            },
        }
    }

    /// Returns the shared adapter instance for `slug`, constructing it on first use.
    pub fn get(&self, slug: &str) -> Result<Arc<A>, RegistryError> {
        let mut state = self.lock();
        if let Some(instance) = state.instances.get(slug) {
            return Ok(Arc::clone(instance));
        }
        let registration = state
            .registrations
            .iter()
            .find(|r| r.slug == slug)
            .ok_or_else(|| RegistryError::NotRegistered(slug.to_string()))?;
        let instance = (registration.factory)(&registration.config)
            .map_err(|reason| RegistryError::Construction { slug: slug.to_string(), reason })?;
        trace!("🔌️ Adapter instance created for {slug}");
        state.instances.insert(slug.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    pub fn set_default(&self, slug: &str) -> Result<(), RegistryError> {
        let mut state = self.lock();
        if !state.registrations.iter().any(|r| r.slug == slug) {
            return Err(RegistryError::NotRegistered(slug.to_string()));
        }
        state.default_slug = Some(slug.to_string());
        info!("🔌️ {slug} is now the default adapter");
        Ok(())
    }

    /// The explicitly configured default, or else the first enabled registration, which then becomes the explicit
    /// default.
    pub fn default_slug(&self) -> Result<String, RegistryError> {
        let mut state = self.lock();
        if let Some(slug) = &state.default_slug {
            return Ok(slug.clone());
        }
        let slug = state
            .registrations
            .iter()
            .find(|r| r.config.is_enabled())
            .map(|r| r.slug.clone())
            .ok_or(RegistryError::NoDefault)?;
        info!("🔌️ No default adapter was set. Falling back to {slug}");
        state.default_slug = Some(slug.clone());
        Ok(slug)
    }

    pub fn get_default(&self) -> Result<Arc<A>, RegistryError> {
        let slug = self.default_slug()?;
        self.get(&slug)
    }

    /// Drops every memoised instance. Registrations and the default are kept.
    pub fn clear_cache(&self) {
        let mut state = self.lock();
        let count = state.instances.len();
        state.instances.clear();
        trace!("🔌️ {count} cached adapter instances dropped");
    }

    /// Registered slugs, in registration order.
    pub fn slugs(&self) -> Vec<String> {
        self.lock().registrations.iter().map(|r| r.slug.clone()).collect()
    }

    pub fn config(&self, slug: &str) -> Option<C> {
        self.lock().registrations.iter().find(|r| r.slug == slug).map(|r| r.config.clone())
    }

    pub fn is_registered(&self, slug: &str) -> bool {
        self.lock().registrations.iter().any(|r| r.slug == slug)
    }
}
