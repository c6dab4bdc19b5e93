//! # eSIM server
//! This crate hosts the server process for the eSIM orchestration core. It is responsible for:
//! * Building the provider and payment gateway registries from the database and the vendor configuration.
//! * Running the catalog sync, order status and usage notification schedulers.
//! * Serving the manual sync trigger and the payment gateway webhooks.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/catalog`: The active unified catalog.
//! * `/admin/sync`: Runs a catalog sync pass immediately and returns the report.
//! * `/webhooks/{gateway}`: Signed webhooks from payment gateways.

pub mod cli;
pub mod config;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;
