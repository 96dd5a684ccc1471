use std::collections::BTreeMap;

use shared::{
    domain::ItemId,
    protocol::{OptimizeRequest, OptimizeResponse},
};

use crate::error::{
    FailureKind, InfeasibilityReason, InfeasibleResultError, OptimizeError,
};

/// Identifies one dispatched optimize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestTicket(pub u64);

/// Selection snapshot taken at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizationRequest {
    items: Vec<ItemId>,
}

impl OptimizationRequest {
    pub fn new(items: Vec<ItemId>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains(id)
    }

    pub fn to_wire(&self) -> OptimizeRequest {
        OptimizeRequest {
            selected_items: self.items.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub ticket: RequestTicket,
    pub request: OptimizationRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    quantities: BTreeMap<ItemId, f64>,
    total_cost: f64,
}

impl OptimizationResult {
    /// Accepts a 2xx body only when it carries a complete, non-negative
    /// allocation over items that were actually requested.
    pub fn from_response(
        response: OptimizeResponse,
        request: &OptimizationRequest,
    ) -> Result<Self, InfeasibleResultError> {
        let selection = response
            .optimal_selection
            .ok_or(InfeasibleResultError::new(InfeasibilityReason::MissingSelection))?;
        if selection.is_empty() {
            return Err(InfeasibleResultError::new(
                InfeasibilityReason::EmptySelection,
            ));
        }

        let total_cost = response
            .total_cost
            .ok_or(InfeasibleResultError::new(InfeasibilityReason::MissingTotalCost))?;
        if !total_cost.is_finite() || total_cost < 0.0 {
            return Err(InfeasibleResultError::new(
                InfeasibilityReason::InvalidTotalCost,
            ));
        }

        let mut quantities = BTreeMap::new();
        for (item, quantity) in selection {
            if !request.contains(&item) {
                return Err(InfeasibleResultError::new(
                    InfeasibilityReason::UnrequestedItem(item),
                ));
            }
            match quantity {
                Some(quantity) if quantity.is_finite() && quantity >= 0.0 => {
                    quantities.insert(item, quantity);
                }
                _ => {
                    return Err(InfeasibleResultError::new(
                        InfeasibilityReason::InvalidQuantity(item),
                    ))
                }
            }
        }

        Ok(Self {
            quantities,
            total_cost,
        })
    }

    pub fn quantities(&self) -> &BTreeMap<ItemId, f64> {
        &self.quantities
    }

    pub fn quantity(&self, id: &str) -> Option<f64> {
        self.quantities.get(id).copied()
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }
}

/// A terminal failure: the user-facing message and the error behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    message: String,
    error: OptimizeError,
}

impl Failure {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error(&self) -> &OptimizeError {
        &self.error
    }

    pub fn kind(&self) -> FailureKind {
        self.error.kind()
    }
}

impl From<OptimizeError> for Failure {
    fn from(error: OptimizeError) -> Self {
        Self {
            message: error.user_message(),
            error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Validating,
    InFlight(PendingRequest),
    Succeeded(OptimizationResult),
    Failed(Failure),
}

impl LifecycleState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::InFlight(_) | Self::Validating)
    }

    pub fn result(&self) -> Option<&OptimizationResult> {
        match self {
            Self::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::InFlight(_) => "in_flight",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
