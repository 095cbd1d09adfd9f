//! HTTP transport shared by the REST clients.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode, header};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{Network, error::ApiError};

const USER_AGENT: &str = concat!("opium-sdk/", env!("CARGO_PKG_VERSION"));

/// Query parameters of a request, keys may repeat (`ids[]`).
pub(crate) type Query = Vec<(&'static str, String)>;

/// Response with successful status.
#[derive(Debug)]
pub(crate) struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn is_empty(&self) -> bool {
        self.status == StatusCode::NO_CONTENT || self.body.trim().is_empty()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct HttpTransport {
    network: Network,
    client: Client,
}

impl HttpTransport {
    pub fn new(network: Network, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { network, client })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Issues a request, attaching the bearer token if provided.
    /// Non-success statuses are mapped to [`ApiError`].
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        query: &Query,
        body: Option<&B>,
        access_token: Option<&str>,
    ) -> Result<HttpResponse, ApiError> {
        let url = self.network.rest_endpoint(endpoint);
        debug!(%method, %url, "request");

        let mut request = self.client.request(method.clone(), &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = access_token {
            request = request.header(header::AUTHORIZATION, format!("Bearer 0x{token}"));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if matches!(
            status,
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::NO_CONTENT
        ) {
            debug!(%method, %url, %status, "response");
            Ok(HttpResponse { status, body })
        } else {
            warn!(%method, %url, %status, %body, "request failed");
            Err(ApiError::from_status(status, body))
        }
    }
}
