use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    error::ServiceErrorBody,
    protocol::{MenuEntry, OptimizeRequest, OptimizeResponse},
};
use tracing::{debug, warn};
use url::Url;

pub mod catalog;
pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod selection;
pub mod session;
pub mod view;

pub use catalog::{Catalog, CatalogItem, CatalogLoader};
pub use controller::{
    CatalogStatus, CompletionOutcome, SelectionController, SubmitOutcome, ToggleOutcome,
};
pub use error::{
    CatalogLoadError, FailureKind, InfeasibilityReason, InfeasibleResultError,
    LocalValidationError, OptimizeError, RemoteOptimizationError, ServiceConfigError,
    SessionError,
};
pub use lifecycle::{
    Failure, LifecycleState, OptimizationRequest, OptimizationResult, PendingRequest,
    RequestTicket,
};
pub use selection::SelectionSet;
pub use session::{OptimizerSession, SessionEvent};
pub use view::{CatalogView, ControllerView, ErrorBanner, ItemView, ResultRow, ResultView};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The remote optimizer: a catalog endpoint and an optimize endpoint.
#[async_trait]
pub trait OptimizerService: Send + Sync {
    async fn fetch_menu(&self) -> Result<Vec<MenuEntry>, CatalogLoadError>;
    async fn optimize(
        &self,
        request: &OptimizeRequest,
    ) -> Result<OptimizeResponse, RemoteOptimizationError>;
}

pub struct HttpOptimizerService {
    http: Client,
    base_url: String,
}

impl HttpOptimizerService {
    pub fn new(base_url: &str) -> Result<Self, ServiceConfigError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ServiceConfigError> {
        let base_url = normalize_base_url(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ServiceConfigError::Client(err.to_string()))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl OptimizerService for HttpOptimizerService {
    async fn fetch_menu(&self) -> Result<Vec<MenuEntry>, CatalogLoadError> {
        let url = format!("{}/menu", self.base_url);
        debug!(%url, "http: fetching menu");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| CatalogLoadError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| CatalogLoadError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(CatalogLoadError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        serde_json::from_slice(&body).map_err(|err| CatalogLoadError::Malformed(err.to_string()))
    }

    async fn optimize(
        &self,
        request: &OptimizeRequest,
    ) -> Result<OptimizeResponse, RemoteOptimizationError> {
        let url = format!("{}/optimize", self.base_url);
        debug!(%url, items = request.selected_items.len(), "http: posting optimize request");
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|err| RemoteOptimizationError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| RemoteOptimizationError::Transport(err.to_string()))?;

        if !status.is_success() {
            let detail = error_detail(&body);
            warn!(status = status.as_u16(), ?detail, "http: optimize request rejected");
            return Err(RemoteOptimizationError::Service {
                status: status.as_u16(),
                detail,
            });
        }

        serde_json::from_slice(&body).map_err(|err| RemoteOptimizationError::UnreadableResponse {
            status: status.as_u16(),
            reason: err.to_string(),
        })
    }
}

fn error_detail(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ServiceErrorBody>(body)
        .ok()
        .and_then(|body| body.detail_message())
}

fn normalize_base_url(raw: &str) -> Result<String, ServiceConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|err| ServiceConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ServiceConfigError::UnsupportedScheme(
            parsed.scheme().to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
