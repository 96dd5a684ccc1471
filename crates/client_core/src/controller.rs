//! Selection and optimize-request state machine.
//!
//! The controller is synchronous: it decides what to send and applies what
//! came back, while the caller owns the actual network call. This keeps every
//! transition testable without a runtime.

use shared::{domain::ItemId, protocol::OptimizeResponse};
use tracing::{debug, info, warn};

use crate::{
    catalog::Catalog,
    error::{CatalogLoadError, LocalValidationError, OptimizeError, RemoteOptimizationError},
    lifecycle::{
        Failure, LifecycleState, OptimizationRequest, OptimizationResult, PendingRequest,
        RequestTicket,
    },
    selection::SelectionSet,
    view::ControllerView,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum CatalogStatus {
    #[default]
    Loading,
    Ready,
    Unavailable(CatalogLoadError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Selected,
    Deselected,
    UnknownItem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The caller must now issue `PendingRequest` and report back through
    /// [`SelectionController::complete`].
    Dispatched(PendingRequest),
    RejectedInFlight,
    FailedLocally(LocalValidationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied,
    Discarded,
}

#[derive(Debug, Default)]
pub struct SelectionController {
    catalog: Catalog,
    catalog_status: CatalogStatus,
    selection: SelectionSet,
    state: LifecycleState,
    last_ticket: u64,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        let mut controller = Self::new();
        controller.install_catalog(catalog);
        controller
    }

    /// Replaces the catalog and prunes selections that no longer exist.
    /// Returns the identifiers that were dropped.
    pub fn install_catalog(&mut self, catalog: Catalog) -> Vec<ItemId> {
        let dropped = self.selection.retain_in(&catalog);
        if !dropped.is_empty() {
            info!(dropped = dropped.len(), "controller: pruned stale selections");
        }
        self.catalog = catalog;
        self.catalog_status = CatalogStatus::Ready;
        dropped
    }

    /// Records a failed load. An already loaded catalog stays in place.
    pub fn catalog_failed(&mut self, err: CatalogLoadError) {
        if self.catalog_status == CatalogStatus::Ready {
            warn!(%err, "controller: catalog reload failed; keeping previous catalog");
            return;
        }
        self.catalog = Catalog::default();
        self.selection.clear();
        self.catalog_status = CatalogStatus::Unavailable(err);
    }

    pub fn toggle(&mut self, id: &str) -> ToggleOutcome {
        let Some(item) = self.catalog.get(id) else {
            debug!(item = id, "controller: ignoring toggle for unknown item");
            return ToggleOutcome::UnknownItem;
        };
        let name = item.name.clone();
        if self.selection.toggle(&name) {
            debug!(item = %name, "controller: selected");
            ToggleOutcome::Selected
        } else {
            debug!(item = %name, "controller: deselected");
            ToggleOutcome::Deselected
        }
    }

    pub fn submit(&mut self) -> SubmitOutcome {
        if let LifecycleState::InFlight(pending) = &self.state {
            debug!(ticket = pending.ticket.0, "controller: submit rejected, request in flight");
            return SubmitOutcome::RejectedInFlight;
        }

        self.state = LifecycleState::Validating;
        if self.selection.is_empty() {
            let err = LocalValidationError::EmptySelection;
            self.state = LifecycleState::Failed(Failure::from(OptimizeError::from(err)));
            info!("controller: submit failed local validation");
            return SubmitOutcome::FailedLocally(err);
        }

        self.last_ticket += 1;
        let pending = PendingRequest {
            ticket: RequestTicket(self.last_ticket),
            request: OptimizationRequest::new(self.selection.ordered(&self.catalog)),
        };
        info!(
            ticket = pending.ticket.0,
            items = pending.request.items().len(),
            "controller: optimize request dispatched"
        );
        self.state = LifecycleState::InFlight(pending.clone());
        SubmitOutcome::Dispatched(pending)
    }

    /// Applies the outcome of the request identified by `ticket`. Outcomes for
    /// any other ticket are discarded.
    pub fn complete(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<OptimizeResponse, RemoteOptimizationError>,
    ) -> CompletionOutcome {
        let request = match &self.state {
            LifecycleState::InFlight(pending) if pending.ticket == ticket => {
                pending.request.clone()
            }
            _ => {
                warn!(ticket = ticket.0, "controller: discarding stale response");
                return CompletionOutcome::Discarded;
            }
        };

        self.state = match outcome.map_err(OptimizeError::from).and_then(|response| {
            OptimizationResult::from_response(response, &request).map_err(OptimizeError::from)
        }) {
            Ok(result) => {
                info!(
                    ticket = ticket.0,
                    total_cost = result.total_cost(),
                    "controller: optimization succeeded"
                );
                LifecycleState::Succeeded(result)
            }
            Err(err) => {
                warn!(ticket = ticket.0, %err, "controller: optimization failed");
                LifecycleState::Failed(Failure::from(err))
            }
        };
        CompletionOutcome::Applied
    }

    /// Drops an in-flight request without applying anything, leaving the
    /// machine idle.
    pub fn abandon_in_flight(&mut self) -> Option<RequestTicket> {
        let LifecycleState::InFlight(pending) = &self.state else {
            return None;
        };
        let ticket = pending.ticket;
        self.state = LifecycleState::Idle;
        Some(ticket)
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn selected_items(&self) -> Vec<ItemId> {
        self.selection.ordered(&self.catalog)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_status(&self) -> &CatalogStatus {
        &self.catalog_status
    }

    pub fn current_view(&self) -> ControllerView {
        ControllerView::project(self)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
