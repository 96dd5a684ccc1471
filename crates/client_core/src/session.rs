use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use shared::domain::ItemId;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    catalog::CatalogLoader,
    controller::{CompletionOutcome, SelectionController, SubmitOutcome, ToggleOutcome},
    error::{FailureKind, OptimizeError, SessionError},
    lifecycle::{LifecycleState, PendingRequest, RequestTicket},
    view::ControllerView,
    OptimizerService,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CatalogLoaded {
        items: usize,
        dropped: Vec<ItemId>,
    },
    CatalogFailed(String),
    SelectionChanged {
        item: ItemId,
        selected: bool,
    },
    Submitted {
        ticket: RequestTicket,
        items: Vec<ItemId>,
    },
    SubmitRejected,
    Succeeded {
        ticket: RequestTicket,
        total_cost: f64,
    },
    Failed {
        ticket: Option<RequestTicket>,
        message: String,
        kind: FailureKind,
    },
    ResponseDiscarded {
        ticket: RequestTicket,
    },
}

/// Owns one controller and runs its optimize requests in the background.
pub struct OptimizerSession {
    service: Arc<dyn OptimizerService>,
    loader: CatalogLoader,
    controller: Mutex<SelectionController>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    catalog_loads: AtomicU64,
    installed_load: AtomicU64,
    events: broadcast::Sender<SessionEvent>,
}

impl OptimizerSession {
    pub fn new(service: Arc<dyn OptimizerService>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            loader: CatalogLoader::new(Arc::clone(&service)),
            service,
            controller: Mutex::new(SelectionController::new()),
            in_flight: Mutex::new(None),
            closed: AtomicBool::new(false),
            catalog_loads: AtomicU64::new(0),
            installed_load: AtomicU64::new(0),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Fetches the catalog and installs it. A load that finishes after a
    /// newer one has already been applied is dropped with
    /// [`SessionError::Superseded`].
    pub async fn load_catalog(&self) -> Result<usize, SessionError> {
        self.ensure_open()?;
        let generation = self.catalog_loads.fetch_add(1, Ordering::AcqRel) + 1;
        let loaded = self.loader.load_catalog().await;

        let mut controller = self.controller.lock().await;
        self.ensure_open()?;
        let installed = self.installed_load.load(Ordering::Acquire);
        if generation < installed {
            info!(generation, installed, "session: dropping superseded catalog load");
            return Err(SessionError::Superseded);
        }
        self.installed_load.store(generation, Ordering::Release);
        match loaded {
            Ok(catalog) => {
                let items = catalog.len();
                let dropped = controller.install_catalog(catalog);
                self.emit(SessionEvent::CatalogLoaded { items, dropped });
                Ok(items)
            }
            Err(err) => {
                controller.catalog_failed(err.clone());
                self.emit(SessionEvent::CatalogFailed(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Fetches the menu again. Selections missing from the new catalog are
    /// dropped; on failure a previously loaded catalog stays in place.
    pub async fn reload_catalog(&self) -> Result<usize, SessionError> {
        info!("session: reloading catalog");
        self.load_catalog().await
    }

    pub async fn toggle(&self, id: &str) -> Result<ToggleOutcome, SessionError> {
        self.ensure_open()?;
        let mut controller = self.controller.lock().await;
        let outcome = controller.toggle(id);
        let selected = match outcome {
            ToggleOutcome::Selected => true,
            ToggleOutcome::Deselected => false,
            ToggleOutcome::UnknownItem => return Ok(outcome),
        };
        self.emit(SessionEvent::SelectionChanged {
            item: ItemId::new(id),
            selected,
        });
        Ok(outcome)
    }

    pub async fn submit(self: &Arc<Self>) -> Result<SubmitOutcome, SessionError> {
        self.ensure_open()?;
        let mut in_flight = self.in_flight.lock().await;
        // shutdown may have run while this call waited for the lock
        self.ensure_open()?;
        let outcome = self.controller.lock().await.submit();

        match &outcome {
            SubmitOutcome::Dispatched(pending) => {
                self.emit(SessionEvent::Submitted {
                    ticket: pending.ticket,
                    items: pending.request.items().to_vec(),
                });
                let session = Arc::clone(self);
                let pending = pending.clone();
                *in_flight = Some(tokio::spawn(async move {
                    session.run_request(pending).await;
                }));
            }
            SubmitOutcome::RejectedInFlight => self.emit(SessionEvent::SubmitRejected),
            SubmitOutcome::FailedLocally(err) => {
                let err = OptimizeError::from(*err);
                self.emit(SessionEvent::Failed {
                    ticket: None,
                    message: err.user_message(),
                    kind: err.kind(),
                });
            }
        }

        Ok(outcome)
    }

    async fn run_request(&self, pending: PendingRequest) {
        let response = self.service.optimize(&pending.request.to_wire()).await;

        let mut controller = self.controller.lock().await;
        if self.is_closed() {
            info!(ticket = pending.ticket.0, "session: torn down, dropping response");
            self.emit(SessionEvent::ResponseDiscarded {
                ticket: pending.ticket,
            });
            return;
        }

        if controller.complete(pending.ticket, response) == CompletionOutcome::Discarded {
            self.emit(SessionEvent::ResponseDiscarded {
                ticket: pending.ticket,
            });
            return;
        }

        match controller.state() {
            LifecycleState::Succeeded(result) => self.emit(SessionEvent::Succeeded {
                ticket: pending.ticket,
                total_cost: result.total_cost(),
            }),
            LifecycleState::Failed(failure) => self.emit(SessionEvent::Failed {
                ticket: Some(pending.ticket),
                message: failure.message().to_string(),
                kind: failure.kind(),
            }),
            other => warn!(state = other.name(), "session: unexpected state after completion"),
        }
    }

    /// Waits for the in-flight request, if any, to reach a terminal state.
    pub async fn settle(&self) {
        let handle = self.in_flight.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    warn!(%err, "session: optimize task failed");
                }
            }
        }
    }

    /// Tears the session down. A response that arrives afterwards is never
    /// applied.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.in_flight.lock().await.take() {
            handle.abort();
        }
        if let Some(ticket) = self.controller.lock().await.abandon_in_flight() {
            self.emit(SessionEvent::ResponseDiscarded { ticket });
        }
        info!("session: shut down");
    }

    pub async fn state(&self) -> LifecycleState {
        self.controller.lock().await.state().clone()
    }

    pub async fn selected_items(&self) -> Vec<ItemId> {
        self.controller.lock().await.selected_items()
    }

    pub async fn current_view(&self) -> ControllerView {
        self.controller.lock().await.current_view()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
