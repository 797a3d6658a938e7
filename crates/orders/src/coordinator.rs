use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_gateway::DispatchApi;
use courier_types::{Decision, DeliveryStatus, Order, ServerMessage};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::view::OrdersView;
use crate::{CoordinatorError, ResponseSink};

#[derive(Default)]
struct CoordState {
    ongoing: Vec<Order>,
    history: Vec<Order>,
    incoming: Vec<String>,
    just_accepted: Option<String>,
    /// Issue number of the last applied refresh.
    applied_seq: u64,
    /// Orders with a status update currently in flight.
    in_flight: HashSet<String>,
}

/// Coordinates the driver's order collections against REST snapshots and
/// realtime push events.
pub struct OrderCoordinator {
    api: Arc<dyn DispatchApi>,
    sink: Arc<dyn ResponseSink>,
    state: Mutex<CoordState>,
    /// Refresh issue counter; responses apply last-issued-wins.
    refresh_seq: AtomicU64,
    view_tx: watch::Sender<OrdersView>,
}

impl OrderCoordinator {
    pub fn new(api: Arc<dyn DispatchApi>, sink: Arc<dyn ResponseSink>) -> Self {
        let (view_tx, _view_rx) = watch::channel(OrdersView::default());
        Self {
            api,
            sink,
            state: Mutex::new(CoordState::default()),
            refresh_seq: AtomicU64::new(0),
            view_tx,
        }
    }

    /// Observe complete snapshots of the order collections.
    pub fn subscribe(&self) -> watch::Receiver<OrdersView> {
        self.view_tx.subscribe()
    }

    pub async fn view(&self) -> OrdersView {
        let state = self.state.lock().await;
        snapshot_of(&state)
    }

    /// Fetch and apply the authoritative snapshot. When refreshes overlap,
    /// only the response of the most recently issued one is applied.
    pub async fn refresh(&self) -> Result<(), CoordinatorError> {
        let seq = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.api.fetch_orders().await?;

        let mut state = self.state.lock().await;
        if self.refresh_seq.load(Ordering::SeqCst) != seq || seq <= state.applied_seq {
            debug!(seq, "dropping superseded refresh response");
            return Ok(());
        }
        state.applied_seq = seq;

        let now = Utc::now();
        let mut ongoing = Vec::new();
        let mut history = Vec::new();
        // Partition is re-derived from terminal status, not trusted from
        // the payload's grouping.
        for raw in snapshot.ongoing.into_iter().chain(snapshot.past) {
            let order = Order::from_raw(raw, now);
            if order.is_terminal() {
                history.push(order);
            } else {
                ongoing.push(order);
            }
        }
        debug!(ongoing = ongoing.len(), history = history.len(), seq, "snapshot applied");
        state.ongoing = ongoing;
        state.history = history;
        self.publish_locked(&state);
        Ok(())
    }

    /// Background variant: failures are logged and known orders are kept.
    pub async fn refresh_logged(&self) {
        if let Err(err) = self.refresh().await {
            warn!(%err, "background refresh failed, keeping known orders");
        }
    }

    /// React to a realtime push. Push events are invalidation signals; no
    /// order payload is trusted from the socket.
    pub async fn apply_push(&self, message: &ServerMessage) {
        match message {
            ServerMessage::OrderRequest { order_id } => {
                let mut state = self.state.lock().await;
                if state.incoming.iter().any(|id| id == order_id) {
                    debug!(order_id = %order_id, "duplicate order request ignored");
                    return;
                }
                info!(order_id = %order_id, "order request staged");
                state.incoming.push(order_id.clone());
                self.publish_locked(&state);
            }
            ServerMessage::OrderAccepted { order_id } => {
                {
                    let mut state = self.state.lock().await;
                    state.just_accepted = Some(order_id.clone());
                    self.publish_locked(&state);
                }
                self.refresh_logged().await;
            }
            ServerMessage::OrderStatus { .. } | ServerMessage::OrderUpdate { .. } => {
                self.refresh_logged().await;
            }
        }
    }

    /// Answer a staged order request. The decision goes out over the realtime
    /// channel; there is no REST call for accept/reject.
    pub async fn respond(
        &self,
        order_id: &str,
        decision: Decision,
    ) -> Result<(), CoordinatorError> {
        self.sink.send_response(order_id, decision).await?;

        {
            let mut state = self.state.lock().await;
            state.incoming.retain(|id| id != order_id);
            if decision == Decision::Accept {
                state.just_accepted = Some(order_id.to_string());
            }
            self.publish_locked(&state);
        }
        info!(order_id = %order_id, ?decision, "order response sent");
        self.refresh_logged().await;
        Ok(())
    }

    /// Advance an ongoing order one step along the delivery chain.
    ///
    /// `navigating_customer` mutates local state only; every other legal
    /// transition is persisted first, and a network failure leaves the local
    /// state untouched.
    pub async fn advance_status(
        &self,
        order_id: &str,
        next: DeliveryStatus,
    ) -> Result<(), CoordinatorError> {
        let from = {
            let mut state = self.state.lock().await;
            let current = state
                .ongoing
                .iter()
                .find(|order| order.id == order_id)
                .map(|order| order.status)
                .ok_or_else(|| CoordinatorError::UnknownOrder {
                    order_id: order_id.to_string(),
                })?;

            if state.in_flight.contains(order_id) {
                return Err(CoordinatorError::TransitionInProgress {
                    order_id: order_id.to_string(),
                });
            }
            if !current.can_advance_to(next) {
                return Err(CoordinatorError::InvalidTransition {
                    from: current,
                    to: next.canonical(),
                });
            }

            if next.is_client_local() {
                apply_transition(&mut state, order_id, next, Utc::now());
                self.publish_locked(&state);
                debug!(order_id = %order_id, %next, "client-local transition applied");
                return Ok(());
            }

            state.in_flight.insert(order_id.to_string());
            current
        };

        let result = self.api.update_status(order_id, next).await;

        let mut state = self.state.lock().await;
        state.in_flight.remove(order_id);
        match result {
            Ok(()) => {
                apply_transition(&mut state, order_id, next, Utc::now());
                self.publish_locked(&state);
                drop(state);
                info!(order_id = %order_id, %from, %next, "status advanced");
                self.refresh_logged().await;
                Ok(())
            }
            Err(err) => {
                warn!(order_id = %order_id, %from, %next, %err, "status update failed");
                Err(err.into())
            }
        }
    }

    /// Logout support: drop every collection and marker.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        // Invalidate any in-flight refresh so its response cannot repopulate
        // the collections after logout.
        let seq = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        state.applied_seq = seq;
        state.ongoing.clear();
        state.history.clear();
        state.incoming.clear();
        state.just_accepted = None;
        state.in_flight.clear();
        self.publish_locked(&state);
    }

    fn publish_locked(&self, state: &CoordState) {
        self.view_tx.send_replace(snapshot_of(state));
    }
}

fn snapshot_of(state: &CoordState) -> OrdersView {
    OrdersView {
        ongoing: state.ongoing.clone(),
        history: state.history.clone(),
        incoming: state.incoming.clone(),
        just_accepted: state.just_accepted.clone(),
    }
}

fn apply_transition(
    state: &mut CoordState,
    order_id: &str,
    next: DeliveryStatus,
    now: DateTime<Utc>,
) {
    if let Some(pos) = state.ongoing.iter().position(|order| order.id == order_id) {
        state.ongoing[pos].status = next;
        state.ongoing[pos].last_updated_at = now;
        if next.is_terminal() {
            let order = state.ongoing.remove(pos);
            state.history.insert(0, order);
        }
    }
}
