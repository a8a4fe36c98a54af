//! Single owner of the simulation state.
//!
//! All mutations go through the [`SimulationService`] which runs at most one of them at a time,
//! each on top of the state committed by the previous one. Readers get consistent snapshots from
//! a [`watch`] channel and never wait for mutations.

use super::{QueueManager, SimulationMetrics, nonce::NonceFix};
use crate::{
    chain::ChainClient,
    error::SimulationError,
    types::{MessageId, QueuedTransaction, SignedMessage, SimulationState, TransactionId},
};
use futures_util::{FutureExt, future::BoxFuture};
use metrics::Counter;
use std::{
    collections::VecDeque,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, trace, warn};

/// A committed simulation state, `None` if nothing is simulated.
pub type SharedState = Option<Arc<SimulationState>>;

type Responder = oneshot::Sender<Result<SharedState, SimulationError>>;

/// A queued state transition.
#[derive(Debug)]
pub enum Mutation {
    /// Appends a transaction.
    AppendTransaction(QueuedTransaction),
    /// Replaces user transactions and signed messages.
    SetTransactionsAndSignedMessages(Vec<QueuedTransaction>, Vec<SignedMessage>),
    /// Adds a signed message.
    AddSignedMessage(SignedMessage),
    /// Removes a user transaction.
    RemoveTransaction(TransactionId),
    /// Removes a signed message.
    RemoveSignedMessage(MessageId),
    /// Moves the state onto the latest block.
    Refresh,
    /// Replaces the prepend queue.
    SetPrependTransactionsQueue(Vec<QueuedTransaction>),
}

impl Mutation {
    async fn run(
        self,
        manager: QueueManager,
        state: SharedState,
        nonce_fixes: Counter,
    ) -> Result<Option<SimulationState>, SimulationError> {
        let state = state.as_deref();
        let updated = match self {
            Self::AppendTransaction(transaction) => {
                let updated = manager.append_transaction(state, transaction).await?;
                fix_nonces(&manager, updated, &nonce_fixes).await?
            }
            Self::SetTransactionsAndSignedMessages(transactions, signed_messages) => {
                manager
                    .set_simulation_transactions_and_signed_messages(
                        state,
                        transactions,
                        signed_messages,
                    )
                    .await?
            }
            Self::AddSignedMessage(message) => {
                let transactions =
                    state.map(SimulationState::queued_user_transactions).unwrap_or_default();
                let mut signed_messages =
                    state.map(|state| state.signed_messages.clone()).unwrap_or_default();
                signed_messages.push(message);
                manager
                    .set_simulation_transactions_and_signed_messages(
                        state,
                        transactions,
                        signed_messages,
                    )
                    .await?
            }
            Self::RemoveTransaction(id) => {
                let Some(state) = state else { return Ok(None) };
                manager.remove_transaction_and_update_transaction_nonces(state, id).await?
            }
            Self::RemoveSignedMessage(id) => {
                let Some(state) = state else { return Ok(None) };
                manager.remove_signed_message_from_simulation(state, id).await?
            }
            Self::Refresh => {
                let Some(state) = state else { return Ok(None) };
                let refreshed = manager.refresh_simulation_state(state).await?;
                if refreshed.block_number == state.block_number {
                    refreshed
                } else {
                    fix_nonces(&manager, refreshed, &nonce_fixes).await?
                }
            }
            Self::SetPrependTransactionsQueue(prepend) => {
                let updated = manager.set_prepend_transactions_queue(state, prepend).await?;
                fix_nonces(&manager, updated, &nonce_fixes).await?
            }
        };
        Ok(Some(updated))
    }
}

/// Runs the nonce reconciler and executes the fixed queue if anything changed.
async fn fix_nonces(
    manager: &QueueManager,
    state: SimulationState,
    nonce_fixes: &Counter,
) -> Result<SimulationState, SimulationError> {
    match manager.fix_nonces(&state).await? {
        NonceFix::Unchanged => Ok(state),
        NonceFix::Fixed(transactions) => {
            nonce_fixes.increment(1);
            manager
                .set_simulation_transactions_and_signed_messages(
                    Some(&state),
                    transactions,
                    state.signed_messages.clone(),
                )
                .await
        }
    }
}

/// Messages accepted by the [`SimulationService`].
#[derive(Debug)]
pub enum SimulationServiceMessage {
    /// Queues a state transition.
    Mutate(Mutation, Responder),
    /// Drops the current state.
    Reset(oneshot::Sender<()>),
    /// Switches to another chain and drops the current state.
    ChangeChain(QueueManager, oneshot::Sender<()>),
}

/// Handle to communicate with the [`SimulationService`].
#[derive(Debug, Clone)]
pub struct SimulationServiceHandle {
    command_tx: mpsc::UnboundedSender<SimulationServiceMessage>,
    state_rx: watch::Receiver<SharedState>,
    manager_rx: watch::Receiver<QueueManager>,
}

impl SimulationServiceHandle {
    async fn mutate(&self, mutation: Mutation) -> Result<SharedState, SimulationError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(SimulationServiceMessage::Mutate(mutation, tx))
            .map_err(|_| SimulationError::ServiceUnavailable)?;
        rx.await.map_err(|_| SimulationError::ServiceUnavailable)?
    }

    /// Appends a transaction to the queue.
    pub async fn append_transaction(
        &self,
        transaction: QueuedTransaction,
    ) -> Result<SharedState, SimulationError> {
        self.mutate(Mutation::AppendTransaction(transaction)).await
    }

    /// Replaces user transactions and signed messages.
    pub async fn set_simulation_transactions_and_signed_messages(
        &self,
        transactions: Vec<QueuedTransaction>,
        signed_messages: Vec<SignedMessage>,
    ) -> Result<SharedState, SimulationError> {
        self.mutate(Mutation::SetTransactionsAndSignedMessages(transactions, signed_messages)).await
    }

    /// Adds a signed message.
    pub async fn add_signed_message(
        &self,
        message: SignedMessage,
    ) -> Result<SharedState, SimulationError> {
        self.mutate(Mutation::AddSignedMessage(message)).await
    }

    /// Removes a user transaction and renumbers later transactions of its sender.
    pub async fn remove_transaction(
        &self,
        id: TransactionId,
    ) -> Result<SharedState, SimulationError> {
        self.mutate(Mutation::RemoveTransaction(id)).await
    }

    /// Removes a signed message.
    pub async fn remove_signed_message(
        &self,
        id: MessageId,
    ) -> Result<SharedState, SimulationError> {
        self.mutate(Mutation::RemoveSignedMessage(id)).await
    }

    /// Moves the simulation onto the latest block.
    pub async fn refresh(&self) -> Result<SharedState, SimulationError> {
        self.mutate(Mutation::Refresh).await
    }

    /// Replaces the prepend queue.
    pub async fn set_prepend_transactions_queue(
        &self,
        prepend: Vec<QueuedTransaction>,
    ) -> Result<SharedState, SimulationError> {
        self.mutate(Mutation::SetPrependTransactionsQueue(prepend)).await
    }

    /// Drops the current simulation. A running recompute is discarded when it finishes.
    pub async fn reset(&self) -> Result<(), SimulationError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(SimulationServiceMessage::Reset(tx))
            .map_err(|_| SimulationError::ServiceUnavailable)?;
        rx.await.map_err(|_| SimulationError::ServiceUnavailable)
    }

    /// Switches to the chain of `manager` and drops the current simulation.
    pub async fn change_chain(&self, manager: QueueManager) -> Result<(), SimulationError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(SimulationServiceMessage::ChangeChain(manager, tx))
            .map_err(|_| SimulationError::ServiceUnavailable)?;
        rx.await.map_err(|_| SimulationError::ServiceUnavailable)
    }

    /// The committed state.
    pub fn current_state(&self) -> SharedState {
        self.state_rx.borrow().clone()
    }

    /// Subscribes to committed states.
    pub fn subscribe(&self) -> watch::Receiver<SharedState> {
        self.state_rx.clone()
    }

    /// The queue manager of the chain the service currently simulates on.
    pub fn manager(&self) -> QueueManager {
        self.manager_rx.borrow().clone()
    }

    /// The chain the service currently simulates on.
    pub fn chain(&self) -> ChainClient {
        self.manager_rx.borrow().chain().clone()
    }

    /// Subscribes to chain changes.
    pub fn subscribe_manager(&self) -> watch::Receiver<QueueManager> {
        self.manager_rx.clone()
    }
}

/// The mutation currently being executed.
struct InFlight {
    id: u64,
    started: Instant,
    future: BoxFuture<'static, Result<Option<SimulationState>, SimulationError>>,
    responder: Responder,
}

/// Service serializing all [`SimulationState`] transitions.
pub struct SimulationService {
    manager_tx: watch::Sender<QueueManager>,
    command_rx: mpsc::UnboundedReceiver<SimulationServiceMessage>,
    state_tx: watch::Sender<SharedState>,
    /// Mutations waiting for the in-flight one to finish.
    pending: VecDeque<(Mutation, Responder)>,
    in_flight: Option<InFlight>,
    /// Identifier of the latest started simulation. Bumped on reset and chain changes to mark the
    /// in-flight one as superseded.
    simulation_id: u64,
    metrics: SimulationMetrics,
}

impl std::fmt::Debug for SimulationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationService")
            .field("simulation_id", &self.simulation_id)
            .field("pending", &self.pending.len())
            .field("in_flight", &self.in_flight.as_ref().map(|in_flight| in_flight.id))
            .finish()
    }
}

impl SimulationService {
    /// Creates a new [`SimulationService`].
    pub fn new(manager: QueueManager) -> (Self, SimulationServiceHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(None);
        let (manager_tx, manager_rx) = watch::channel(manager);
        let this = Self {
            manager_tx,
            command_rx,
            state_tx,
            pending: VecDeque::new(),
            in_flight: None,
            simulation_id: 0,
            metrics: SimulationMetrics::default(),
        };

        (this, SimulationServiceHandle { command_tx, state_rx, manager_rx })
    }

    /// Creates a new [`SimulationService`] and spawns it.
    pub fn spawn(manager: QueueManager) -> SimulationServiceHandle {
        let (this, handle) = Self::new(manager);
        tokio::spawn(this);
        handle
    }

    fn on_message(&mut self, message: SimulationServiceMessage) {
        match message {
            SimulationServiceMessage::Mutate(mutation, responder) => {
                self.pending.push_back((mutation, responder));
            }
            SimulationServiceMessage::Reset(ack) => {
                self.simulation_id += 1;
                self.state_tx.send_replace(None);
                self.metrics.queue_length.set(0.0);
                debug!(simulation_id = self.simulation_id, "Reset simulation");
                let _ = ack.send(());
            }
            SimulationServiceMessage::ChangeChain(manager, ack) => {
                self.simulation_id += 1;
                self.manager_tx.send_replace(manager);
                self.state_tx.send_replace(None);
                self.metrics.queue_length.set(0.0);
                debug!(simulation_id = self.simulation_id, "Changed chain");
                let _ = ack.send(());
            }
        }
    }

    fn start_next(&mut self) {
        let Some((mutation, responder)) = self.pending.pop_front() else { return };

        self.simulation_id += 1;
        self.metrics.recomputes.increment(1);
        trace!(simulation_id = self.simulation_id, ?mutation, "Starting simulation");

        let future = mutation.run(
            self.manager_tx.borrow().clone(),
            self.state_tx.borrow().clone(),
            self.metrics.nonce_fixes.clone(),
        );
        self.in_flight = Some(InFlight {
            id: self.simulation_id,
            started: Instant::now(),
            future: future.boxed(),
            responder,
        });
    }

    fn complete(
        &mut self,
        in_flight: InFlight,
        result: Result<Option<SimulationState>, SimulationError>,
    ) {
        self.metrics.recompute_duration.record(in_flight.started.elapsed().as_secs_f64());

        let result = if in_flight.id != self.simulation_id {
            debug!(
                id = in_flight.id,
                latest = self.simulation_id,
                "Discarding superseded simulation"
            );
            self.metrics.superseded.increment(1);
            Err(SimulationError::Superseded)
        } else {
            match result {
                Ok(Some(state)) => {
                    let state = Arc::new(state);
                    self.metrics.queue_length.set(state.simulated_transactions.len() as f64);
                    self.state_tx.send_replace(Some(state.clone()));
                    Ok(Some(state))
                }
                Ok(None) => Ok(self.state_tx.borrow().clone()),
                Err(err) => {
                    warn!(%err, transient = err.is_transient(), "Simulation failed");
                    self.metrics.failed_recomputes.increment(1);
                    Err(err)
                }
            }
        };

        let _ = in_flight.responder.send(result);
    }
}

impl Future for SimulationService {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut closed = false;

        loop {
            loop {
                match this.command_rx.poll_recv(cx) {
                    Poll::Ready(Some(message)) => this.on_message(message),
                    Poll::Ready(None) => {
                        closed = true;
                        break;
                    }
                    Poll::Pending => break,
                }
            }

            if this.in_flight.is_none() {
                this.start_next();
            }

            if let Some(in_flight) = &mut this.in_flight
                && let Poll::Ready(result) = in_flight.future.poll_unpin(cx)
            {
                if let Some(in_flight) = this.in_flight.take() {
                    this.complete(in_flight, result);
                }
                continue;
            }

            if closed && this.in_flight.is_none() && this.pending.is_empty() {
                return Poll::Ready(());
            }
            return Poll::Pending;
        }
    }
}

/// Spawns a task polling the latest block of the service's chain every `interval`.
///
/// With `refresh` set every new block refreshes a committed simulation. Follows chain changes of
/// the service.
pub fn spawn_block_watcher(
    handle: SimulationServiceHandle,
    interval: Duration,
    refresh: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut managers = handle.subscribe_manager();
        loop {
            let chain = managers.borrow_and_update().chain().clone();
            let poller = chain.spawn_poller(interval);
            let mut blocks = chain.subscribe();

            let chain_closed = loop {
                tokio::select! {
                    changed = managers.changed() => break changed.is_err(),
                    changed = blocks.changed() => {
                        if changed.is_err() {
                            break false;
                        }
                        if !refresh || handle.current_state().is_none() {
                            continue;
                        }
                        match handle.refresh().await {
                            Ok(_) | Err(SimulationError::Superseded) => {}
                            Err(err) => warn!(%err, "Failed to refresh simulation on new block"),
                        }
                    }
                }
            };

            poller.abort();
            if chain_closed {
                return;
            }
        }
    })
}
