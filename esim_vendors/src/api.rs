use std::time::Duration;

use log::*;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::VendorApiError;

/// A thin JSON-over-HTTP client shared by the vendor integrations. Every request carries the configured timeout.
#[derive(Clone)]
pub struct VendorApi {
    base_url: String,
    client: Client,
}

impl VendorApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, VendorApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VendorApiError::Initialization(e.to_string()))?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), client })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        trace!("Sending {method} {url}");
        self.client.request(method, url)
    }

    /// Sends the request and deserializes a successful response. Non-2xx responses become
    /// [`VendorApiError::QueryError`] carrying the response body.
    pub async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, VendorApiError> {
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            trace!("Query successful. {status}");
            response.json::<T>().await.map_err(|e| VendorApiError::JsonError(e.to_string()))
        } else {
            let message = response.text().await?;
            debug!("Query failed. {status}: {message}");
            Err(VendorApiError::QueryError { status: status.as_u16(), message })
        }
    }

    /// Like [`Self::send`], but a 404 is reported as `None`.
    pub async fn send_optional<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Option<T>, VendorApiError> {
        match self.send(req).await {
            Ok(v) => Ok(Some(v)),
            Err(VendorApiError::QueryError { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
