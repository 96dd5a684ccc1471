use shared::domain::ItemId;
use thiserror::Error;

pub const EMPTY_SELECTION_MESSAGE: &str = "selection must be non-empty";
pub const NO_FEASIBLE_SOLUTION_MESSAGE: &str = "no feasible solution";
pub const GENERIC_OPTIMIZE_FAILURE_MESSAGE: &str = "failed to fetch optimization results";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogLoadError {
    #[error("failed to reach optimizer service: {0}")]
    Transport(String),
    #[error("menu request failed with status {status}{}", detail_suffix(.detail))]
    Status { status: u16, detail: Option<String> },
    #[error("malformed menu payload: {0}")]
    Malformed(String),
    #[error("menu entry {index} has an empty item name")]
    EmptyItemName { index: usize },
    #[error("menu lists item '{0}' more than once")]
    DuplicateItem(ItemId),
    #[error("menu item '{item}' has unsupported value for attribute '{attribute}'")]
    UnsupportedAttribute { item: ItemId, attribute: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocalValidationError {
    #[error("selection must be non-empty")]
    EmptySelection,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteOptimizationError {
    #[error("failed to reach optimizer service: {0}")]
    Transport(String),
    #[error("optimizer service returned status {status}{}", detail_suffix(.detail))]
    Service { status: u16, detail: Option<String> },
    #[error("optimizer service returned an unreadable response (status {status}): {reason}")]
    UnreadableResponse { status: u16, reason: String },
}

impl RemoteOptimizationError {
    /// Message shown to the user: the service's own detail when it sent one.
    pub fn user_message(&self) -> String {
        match self {
            Self::Service {
                detail: Some(detail),
                ..
            } => detail.clone(),
            _ => GENERIC_OPTIMIZE_FAILURE_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfeasibilityReason {
    MissingSelection,
    EmptySelection,
    MissingTotalCost,
    InvalidTotalCost,
    InvalidQuantity(ItemId),
    UnrequestedItem(ItemId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no feasible solution ({reason:?})")]
pub struct InfeasibleResultError {
    pub reason: InfeasibilityReason,
}

impl InfeasibleResultError {
    pub fn new(reason: InfeasibilityReason) -> Self {
        Self { reason }
    }
}

/// Everything that can land the controller in `Failed`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error(transparent)]
    LocalValidation(#[from] LocalValidationError),
    #[error(transparent)]
    Remote(#[from] RemoteOptimizationError),
    #[error(transparent)]
    Infeasible(#[from] InfeasibleResultError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    LocalValidation,
    Transport,
    Service,
    Infeasible,
}

impl OptimizeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::LocalValidation(_) => FailureKind::LocalValidation,
            Self::Remote(RemoteOptimizationError::Service { .. }) => FailureKind::Service,
            Self::Remote(_) => FailureKind::Transport,
            Self::Infeasible(_) => FailureKind::Infeasible,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::LocalValidation(LocalValidationError::EmptySelection) => {
                EMPTY_SELECTION_MESSAGE.to_string()
            }
            Self::Remote(err) => err.user_message(),
            Self::Infeasible(_) => NO_FEASIBLE_SOLUTION_MESSAGE.to_string(),
        }
    }
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|detail| format!(": {detail}"))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceConfigError {
    #[error("invalid optimizer base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("optimizer base url must use http or https, got '{0}'")]
    UnsupportedScheme(String),
    #[error("failed to build http client: {0}")]
    Client(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("session has been shut down")]
    Closed,
    #[error("a newer catalog load has already been applied")]
    Superseded,
    #[error(transparent)]
    Catalog(#[from] CatalogLoadError),
}
