use std::{env, time::Duration};

use esim_common::{parse_boolean_flag, Secret};
use esim_vendors::{AiraloConfig, FcmConfig, StripeConfig};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

const DEFAULT_ESIM_HOST: &str = "127.0.0.1";
const DEFAULT_ESIM_PORT: u16 = 8480;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/esim_store.db";
const DEFAULT_CATALOG_SYNC_INTERVAL_MINS: u64 = 360;
const DEFAULT_ORDER_POLL_INTERVAL_MINS: u64 = 5;
const DEFAULT_USAGE_NOTIFY_INTERVAL_MINS: u64 = 60;
const DEFAULT_ORDER_GRACE_PERIOD_MINS: u64 = 2;
const DEFAULT_ORDER_MAX_RETRIES: i64 = 1;
const DEFAULT_ADAPTER_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The credential expected in the `esim_admin_token` header of the manual sync trigger
    pub admin_token: Secret<String>,
    pub schedules: ScheduleConfig,
    /// When true, the periodic jobs are not started and syncs only happen through the manual trigger.
    pub disable_schedulers: bool,
    pub airalo: AiraloConfig,
    pub stripe: StripeConfig,
    pub fcm: FcmConfig,
}

/// Intervals and limits for the three periodic jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub catalog_sync_interval: Duration,
    pub order_poll_interval: Duration,
    pub usage_notify_interval: Duration,
    pub order_grace_period: Duration,
    pub order_max_retries: i64,
    pub adapter_timeout: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            catalog_sync_interval: minutes(DEFAULT_CATALOG_SYNC_INTERVAL_MINS),
            order_poll_interval: minutes(DEFAULT_ORDER_POLL_INTERVAL_MINS),
            usage_notify_interval: minutes(DEFAULT_USAGE_NOTIFY_INTERVAL_MINS),
            order_grace_period: minutes(DEFAULT_ORDER_GRACE_PERIOD_MINS),
            order_max_retries: DEFAULT_ORDER_MAX_RETRIES,
            adapter_timeout: Duration::from_secs(DEFAULT_ADAPTER_TIMEOUT_SECS),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ESIM_HOST.to_string(),
            port: DEFAULT_ESIM_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            admin_token: Secret::default(),
            schedules: ScheduleConfig::default(),
            disable_schedulers: false,
            airalo: AiraloConfig::default(),
            stripe: StripeConfig::default(),
            fcm: FcmConfig::default(),
        }
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("ESIM_HOST").ok().unwrap_or_else(|| DEFAULT_ESIM_HOST.into());
        let port = env::var("ESIM_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for ESIM_PORT. {e} Using the default, {DEFAULT_ESIM_PORT}, instead."
                    );
                    DEFAULT_ESIM_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_ESIM_PORT);
        let database_url = env::var("ESIM_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ ESIM_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let admin_token = env::var("ESIM_ADMIN_TOKEN").ok().filter(|s| !s.is_empty()).map_or_else(
            || {
                warn!(
                    "🚨️ ESIM_ADMIN_TOKEN is not set. A random token is used for this session, so the manual sync \
                     trigger is effectively disabled."
                );
                Secret::new(random_token())
            },
            Secret::new,
        );
        let disable_schedulers = parse_boolean_flag(env::var("ESIM_DISABLE_SCHEDULERS").ok(), false);
        Self {
            host,
            port,
            database_url,
            admin_token,
            schedules: ScheduleConfig::from_env_or_default(),
            disable_schedulers,
            airalo: AiraloConfig::new_from_env_or_default(),
            stripe: StripeConfig::new_from_env_or_default(),
            fcm: FcmConfig::new_from_env_or_default(),
        }
    }
}

impl ScheduleConfig {
    pub fn from_env_or_default() -> Self {
        let defaults = Self::default();
        Self {
            catalog_sync_interval: env_duration("ESIM_CATALOG_SYNC_INTERVAL", 60, defaults.catalog_sync_interval),
            order_poll_interval: env_duration("ESIM_ORDER_POLL_INTERVAL", 60, defaults.order_poll_interval),
            usage_notify_interval: env_duration("ESIM_USAGE_NOTIFY_INTERVAL", 60, defaults.usage_notify_interval),
            order_grace_period: env_duration("ESIM_ORDER_GRACE_PERIOD", 60, defaults.order_grace_period),
            order_max_retries: env::var("ESIM_ORDER_MAX_RETRIES")
                .ok()
                .and_then(|s| {
                    s.parse::<i64>()
                        .map_err(|e| warn!("🪛️ Invalid configuration value for ESIM_ORDER_MAX_RETRIES. {e}"))
                        .ok()
                })
                .unwrap_or(defaults.order_max_retries),
            adapter_timeout: env_duration("ESIM_ADAPTER_TIMEOUT", 1, defaults.adapter_timeout),
        }
    }
}

/// Reads a whole number of units (`unit_secs` seconds each) from the environment.
fn env_duration(key: &str, unit_secs: u64, default: Duration) -> Duration {
    env::var(key)
        .map_err(|_| info!("🪛️ {key} is not set. Using the default value of {}s.", default.as_secs()))
        .and_then(|s| {
            s.parse::<u64>()
                .map(|n| Duration::from_secs(n * unit_secs))
                .map_err(|e| warn!("🪛️ Invalid configuration value for {key}. {e}"))
        })
        .ok()
        .filter(|d| !d.is_zero())
        .unwrap_or(default)
}

fn random_token() -> String {
    thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn schedule_defaults() {
        let config = ScheduleConfig::default();
        assert_eq!(config.catalog_sync_interval, Duration::from_secs(6 * 3600));
        assert_eq!(config.order_poll_interval, Duration::from_secs(300));
        assert_eq!(config.usage_notify_interval, Duration::from_secs(3600));
        assert_eq!(config.order_grace_period, Duration::from_secs(120));
        assert_eq!(config.order_max_retries, 1);
    }

    #[test]
    fn durations_from_env() {
        env::set_var("ESIM_TEST_INTERVAL_OK", "15");
        env::set_var("ESIM_TEST_INTERVAL_BAD", "soon");
        env::set_var("ESIM_TEST_INTERVAL_ZERO", "0");
        let default = Duration::from_secs(99);
        assert_eq!(env_duration("ESIM_TEST_INTERVAL_OK", 60, default), Duration::from_secs(900));
        assert_eq!(env_duration("ESIM_TEST_INTERVAL_BAD", 60, default), default);
        assert_eq!(env_duration("ESIM_TEST_INTERVAL_ZERO", 60, default), default);
        assert_eq!(env_duration("ESIM_TEST_INTERVAL_UNSET", 60, default), default);
    }

    #[test]
    fn random_tokens() {
        let a = random_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, random_token());
    }
}
