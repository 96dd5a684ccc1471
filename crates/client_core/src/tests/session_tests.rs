use super::*;
use std::collections::VecDeque;

use async_trait::async_trait;
use shared::protocol::{MenuEntry, OptimizeRequest, OptimizeResponse};
use tokio::sync::oneshot;

use crate::error::{CatalogLoadError, LocalValidationError, RemoteOptimizationError};

type Reply = Result<OptimizeResponse, RemoteOptimizationError>;
type MenuReply = Result<Vec<MenuEntry>, CatalogLoadError>;

#[derive(Default)]
struct FakeService {
    menus: Mutex<VecDeque<oneshot::Receiver<MenuReply>>>,
    replies: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
    requests: Mutex<Vec<OptimizeRequest>>,
}

impl FakeService {
    async fn push_menu(&self, names: &[&str]) {
        let _ = self.gate_menu().await.send(Ok(menu(names)));
    }

    async fn push_menu_error(&self, err: CatalogLoadError) {
        let _ = self.gate_menu().await.send(Err(err));
    }

    /// Queues a menu slot; the matching fetch blocks until it is sent.
    async fn gate_menu(&self) -> oneshot::Sender<MenuReply> {
        let (tx, rx) = oneshot::channel();
        self.menus.lock().await.push_back(rx);
        tx
    }

    /// Queues a reply slot; the matching optimize call blocks until it is sent.
    async fn gate(&self) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().await.push_back(rx);
        tx
    }

    async fn requests(&self) -> Vec<OptimizeRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl OptimizerService for FakeService {
    async fn fetch_menu(&self) -> MenuReply {
        let reply = self.menus.lock().await.pop_front();
        match reply {
            Some(rx) => rx.await.unwrap_or_else(|_| {
                Err(CatalogLoadError::Transport("menu dropped".to_string()))
            }),
            None => Err(CatalogLoadError::Transport("no scripted menu".to_string())),
        }
    }

    async fn optimize(&self, request: &OptimizeRequest) -> Reply {
        self.requests.lock().await.push(request.clone());
        let reply = self.replies.lock().await.pop_front();
        match reply {
            Some(rx) => rx.await.unwrap_or_else(|_| {
                Err(RemoteOptimizationError::Transport("reply dropped".to_string()))
            }),
            None => Err(RemoteOptimizationError::Transport(
                "no scripted reply".to_string(),
            )),
        }
    }
}

fn menu(names: &[&str]) -> Vec<MenuEntry> {
    names
        .iter()
        .map(|name| {
            serde_json::from_value(serde_json::json!({ "Item": name, "price": 10 }))
                .expect("entry")
        })
        .collect()
}

fn success(json: serde_json::Value) -> Reply {
    Ok(serde_json::from_value(json).expect("response"))
}

async fn ready_session(names: &[&str]) -> (Arc<FakeService>, Arc<OptimizerSession>) {
    let service = Arc::new(FakeService::default());
    service.push_menu(names).await;
    let session = OptimizerSession::new(service.clone());
    session.load_catalog().await.expect("catalog");
    (service, session)
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn submit_applies_successful_result() {
    let (service, session) = ready_session(&["A", "B"]).await;
    let mut events = session.subscribe_events();
    session.toggle("A").await.expect("toggle");
    session.toggle("B").await.expect("toggle");
    let reply = service.gate().await;

    let outcome = session.submit().await.expect("submit");
    assert!(matches!(outcome, SubmitOutcome::Dispatched(_)));
    reply
        .send(success(serde_json::json!({
            "optimal_selection": { "A": 2, "B": 1 },
            "total_cost": 25
        })))
        .expect("send reply");
    session.settle().await;

    let view = session.current_view().await;
    let result = view.result.expect("result");
    assert_eq!(result.total_cost, 25.0);
    assert!(view.error.is_none());
    assert_eq!(
        service.requests().await[0].selected_items,
        vec![ItemId::from("A"), ItemId::from("B")]
    );

    let events = drain(&mut events);
    assert!(events.contains(&SessionEvent::Submitted {
        ticket: RequestTicket(1),
        items: vec![ItemId::from("A"), ItemId::from("B")],
    }));
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Succeeded {
            ticket: RequestTicket(1),
            total_cost: 25.0,
        })
    );
}

#[tokio::test]
async fn empty_submit_never_reaches_service() {
    let (service, session) = ready_session(&["A"]).await;
    let mut events = session.subscribe_events();

    let outcome = session.submit().await.expect("submit");

    assert_eq!(
        outcome,
        SubmitOutcome::FailedLocally(LocalValidationError::EmptySelection)
    );
    assert!(service.requests().await.is_empty());
    assert_eq!(
        session.state().await.failure().map(|failure| failure.message().to_string()),
        Some("selection must be non-empty".to_string())
    );
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::Failed {
            ticket: None,
            message: "selection must be non-empty".to_string(),
            kind: FailureKind::LocalValidation,
        }]
    );
}

#[tokio::test]
async fn second_submit_while_in_flight_is_rejected() {
    let (service, session) = ready_session(&["A"]).await;
    session.toggle("A").await.expect("toggle");
    let reply = service.gate().await;
    session.submit().await.expect("submit");
    let state_before = session.state().await;

    let outcome = session.submit().await.expect("submit");

    assert_eq!(outcome, SubmitOutcome::RejectedInFlight);
    assert_eq!(session.state().await, state_before);
    assert!(!session.current_view().await.submit_enabled);

    reply
        .send(success(serde_json::json!({
            "optimal_selection": { "A": 1 },
            "total_cost": 10
        })))
        .expect("send reply");
    session.settle().await;
    assert_eq!(service.requests().await.len(), 1);
    assert!(session.current_view().await.submit_enabled);
}

#[tokio::test]
async fn toggling_stays_responsive_while_in_flight() {
    let (service, session) = ready_session(&["A", "B"]).await;
    session.toggle("A").await.expect("toggle");
    let reply = service.gate().await;
    session.submit().await.expect("submit");

    assert_eq!(
        session.toggle("B").await.expect("toggle"),
        ToggleOutcome::Selected
    );
    assert_eq!(
        session.toggle("A").await.expect("toggle"),
        ToggleOutcome::Deselected
    );

    reply
        .send(success(serde_json::json!({
            "optimal_selection": { "A": 3 },
            "total_cost": 30
        })))
        .expect("send reply");
    session.settle().await;

    assert_eq!(
        service.requests().await[0].selected_items,
        vec![ItemId::from("A")]
    );
    assert_eq!(session.selected_items().await, vec![ItemId::from("B")]);
    let result = session.current_view().await.result.expect("result");
    assert_eq!(result.total_cost, 30.0);
}

#[tokio::test]
async fn service_error_detail_is_surfaced() {
    let (service, session) = ready_session(&["A"]).await;
    session.toggle("A").await.expect("toggle");
    let reply = service.gate().await;
    session.submit().await.expect("submit");

    reply
        .send(Err(RemoteOptimizationError::Service {
            status: 500,
            detail: Some("solver timeout".to_string()),
        }))
        .expect("send reply");
    session.settle().await;

    let view = session.current_view().await;
    let banner = view.error.expect("error banner");
    assert_eq!(banner.message, "solver timeout");
    assert_eq!(banner.kind, FailureKind::Service);
    assert!(view.result.is_none());
    assert!(view.submit_enabled);
}

#[tokio::test]
async fn infeasible_reply_fails_instead_of_succeeding() {
    let (service, session) = ready_session(&["A"]).await;
    session.toggle("A").await.expect("toggle");
    let reply = service.gate().await;
    session.submit().await.expect("submit");

    reply.send(success(serde_json::json!({}))).expect("send reply");
    session.settle().await;

    let state = session.state().await;
    let failure = state.failure().expect("failed");
    assert_eq!(failure.message(), "no feasible solution");
    assert_eq!(failure.kind(), FailureKind::Infeasible);
}

#[tokio::test]
async fn shutdown_discards_in_flight_request() {
    let (service, session) = ready_session(&["A"]).await;
    let mut events = session.subscribe_events();
    session.toggle("A").await.expect("toggle");
    let _reply = service.gate().await;
    session.submit().await.expect("submit");

    session.shutdown().await;

    assert!(session.is_closed());
    assert_eq!(session.state().await, LifecycleState::Idle);
    assert!(drain(&mut events).contains(&SessionEvent::ResponseDiscarded {
        ticket: RequestTicket(1),
    }));
    assert_eq!(session.submit().await, Err(SessionError::Closed));
    assert_eq!(session.toggle("A").await, Err(SessionError::Closed));
}

#[tokio::test]
async fn response_arriving_after_shutdown_is_not_applied() {
    let (service, session) = ready_session(&["A"]).await;
    session.toggle("A").await.expect("toggle");
    let reply = service.gate().await;
    let pending = match session.controller.lock().await.submit() {
        SubmitOutcome::Dispatched(pending) => pending,
        other => panic!("expected dispatch, got {other:?}"),
    };

    session.shutdown().await;
    reply
        .send(success(serde_json::json!({
            "optimal_selection": { "A": 1 },
            "total_cost": 10
        })))
        .expect("send reply");
    let mut events = session.subscribe_events();
    session.run_request(pending.clone()).await;

    assert_eq!(session.state().await, LifecycleState::Idle);
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::ResponseDiscarded {
            ticket: pending.ticket,
        }]
    );
}

#[tokio::test]
async fn reload_prunes_stale_selection() {
    let (service, session) = ready_session(&["A", "B"]).await;
    session.toggle("A").await.expect("toggle");
    session.toggle("B").await.expect("toggle");
    service.push_menu(&["B", "C"]).await;
    let mut events = session.subscribe_events();

    let items = session.reload_catalog().await.expect("reload");

    assert_eq!(items, 2);
    assert_eq!(session.selected_items().await, vec![ItemId::from("B")]);
    assert_eq!(
        drain(&mut events),
        vec![SessionEvent::CatalogLoaded {
            items: 2,
            dropped: vec![ItemId::from("A")],
        }]
    );
}

#[tokio::test]
async fn initial_catalog_failure_is_visible_in_view() {
    let service = Arc::new(FakeService::default());
    service
        .push_menu_error(CatalogLoadError::Status {
            status: 503,
            detail: None,
        })
        .await;
    let session = OptimizerSession::new(service.clone());

    let err = session.load_catalog().await.expect_err("must fail");

    assert_eq!(
        err,
        SessionError::Catalog(CatalogLoadError::Status {
            status: 503,
            detail: None,
        })
    );
    let view = session.current_view().await;
    assert!(matches!(view.catalog, crate::view::CatalogView::Unavailable(_)));
    assert!(view.items.is_empty());
    assert_eq!(
        session.toggle("A").await.expect("toggle"),
        ToggleOutcome::UnknownItem
    );
}

#[tokio::test]
async fn empty_catalog_is_not_an_error() {
    let (_service, session) = ready_session(&[]).await;

    let view = session.current_view().await;

    assert_eq!(view.catalog, crate::view::CatalogView::Empty);
    assert!(view.error.is_none());
}

#[tokio::test]
async fn failed_reload_keeps_previous_catalog() {
    let (service, session) = ready_session(&["A"]).await;
    session.toggle("A").await.expect("toggle");
    service
        .push_menu_error(CatalogLoadError::Transport("connection reset".to_string()))
        .await;

    session.reload_catalog().await.expect_err("must fail");

    let view = session.current_view().await;
    assert_eq!(view.catalog, crate::view::CatalogView::Ready);
    assert_eq!(view.selected_count(), 1);
}

#[tokio::test]
async fn submit_racing_shutdown_is_refused() {
    let (service, session) = ready_session(&["A"]).await;
    session.toggle("A").await.expect("toggle");
    let in_flight = session.in_flight.lock().await;

    let submitting = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.submit().await }
    });
    tokio::task::yield_now().await;
    session.closed.store(true, Ordering::Release);
    drop(in_flight);

    let outcome = submitting.await.expect("join");
    assert_eq!(outcome, Err(SessionError::Closed));
    assert_eq!(session.state().await, LifecycleState::Idle);
    assert!(session.in_flight.lock().await.is_none());
    assert!(service.requests().await.is_empty());
}

#[tokio::test]
async fn older_catalog_load_does_not_overwrite_newer_one() {
    let service = Arc::new(FakeService::default());
    let first = service.gate_menu().await;
    let second = service.gate_menu().await;
    let session = OptimizerSession::new(service.clone());

    let initial = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.load_catalog().await }
    });
    tokio::task::yield_now().await;
    let reload = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.reload_catalog().await }
    });
    tokio::task::yield_now().await;

    second.send(Ok(menu(&["B", "C"]))).expect("send menu");
    assert_eq!(reload.await.expect("join"), Ok(2));
    first.send(Ok(menu(&["A"]))).expect("send menu");
    assert_eq!(initial.await.expect("join"), Err(SessionError::Superseded));

    let view = session.current_view().await;
    let names: Vec<_> = view.items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["B", "C"]);
}
