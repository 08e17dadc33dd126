//! Main ledger orchestration layer
//!
//! [`StreamLedger`] ties together the store, both address indices, the
//! journal, the escrow gateway and the clock into the create/cancel
//! lifecycle and the read-only query surface.
//!
//! # Atomicity
//!
//! All mutable state lives behind one `RwLock`. A mutation holds the write
//! lock from validation to commit, and performs every fallible step
//! (including the gateway call) before touching the store, indices or
//! journal. A failed create or cancel therefore leaves no trace. Queries
//! hold the read lock and sample the clock once, so every figure in a
//! result describes the same instant.
//!
//! # Example
//!
//! ```
//! use stream_ledger::{
//!     Address, Config, InMemoryTokenGateway, ManualClock, StreamLedger, StreamRequest,
//! };
//!
//! # fn main() -> stream_ledger::Result<()> {
//! let gateway = InMemoryTokenGateway::new();
//! let token = Address::new("0xusdc");
//! let alice = Address::new("0xa11ce");
//! gateway.mint(&token, &alice, 1_000)?;
//!
//! let ledger = StreamLedger::new(&Config::default(), gateway, ManualClock::new(0));
//! let id = ledger.create_stream(
//!     &alice,
//!     StreamRequest {
//!         receiver: Address::new("0xb0b"),
//!         rate_per_second: 10,
//!         token,
//!         start_time: 0,
//!         end_time: 100,
//!     },
//! )?;
//! assert_eq!(id, 100_000);
//! # Ok(())
//! # }
//! ```

use crate::{
    accrual::{self, Split},
    balance,
    clock::Clock,
    config::{CancelPolicy, Config},
    escrow::{Payout, TokenGateway},
    index::AddressIndex,
    journal::{EventKind, Journal, JournalEvent},
    metrics::Metrics,
    store::StreamStore,
    types::{
        Address, Amount, CancelReceipt, DepositRequest, Role, Stream, StreamId, StreamPage,
        StreamRequest, StreamStatus, TokenBalance,
    },
    Error, Result,
};
use parking_lot::RwLock;
use std::fmt;

/// Store, indices and journal, always mutated together
#[derive(Debug)]
struct LedgerState {
    store: StreamStore,
    incoming: AddressIndex,
    outgoing: AddressIndex,
    journal: Journal,
}

impl LedgerState {
    fn new(stream_id_base: StreamId) -> Self {
        Self {
            store: StreamStore::new(stream_id_base),
            incoming: AddressIndex::new(Role::Incoming),
            outgoing: AddressIndex::new(Role::Outgoing),
            journal: Journal::new(),
        }
    }

    fn index(&self, role: Role) -> &AddressIndex {
        match role {
            Role::Incoming => &self.incoming,
            Role::Outgoing => &self.outgoing,
        }
    }

    /// Resolve index ids to records
    fn resolve(&self, role: Role, ids: &[StreamId]) -> Result<Vec<Stream>> {
        ids.iter()
            .map(|id| {
                self.store.get(*id).cloned().map_err(|_| {
                    Error::IndexInconsistency(format!(
                        "{:?} index references missing stream {}",
                        role, id
                    ))
                })
            })
            .collect()
    }
}

/// Payment-streaming ledger
pub struct StreamLedger<G, C> {
    state: RwLock<LedgerState>,
    gateway: G,
    clock: C,
    cancel_policy: CancelPolicy,
    metrics: Metrics,
}

impl<G, C> fmt::Debug for StreamLedger<G, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamLedger")
            .field("streams", &self.state.read().store.len())
            .field("cancel_policy", &self.cancel_policy)
            .finish_non_exhaustive()
    }
}

impl<G: TokenGateway, C: Clock> StreamLedger<G, C> {
    /// Create ledger with configuration and collaborators
    pub fn new(config: &Config, gateway: G, clock: C) -> Self {
        tracing::info!(
            service = %config.service_name,
            stream_id_base = config.ledger.stream_id_base,
            cancel_policy = ?config.ledger.cancel_policy,
            "Stream ledger initialized"
        );

        Self {
            state: RwLock::new(LedgerState::new(config.ledger.stream_id_base)),
            gateway,
            clock,
            cancel_policy: config.ledger.cancel_policy,
            metrics: Metrics::default(),
        }
    }

    /// Use an externally owned metrics collector
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Escrow gateway
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Clock
    pub fn clock(&self) -> &C {
        &self.clock
    }

    // Mutations

    /// Open a stream from `sender`, escrowing `rate * duration` of the token
    pub fn create_stream(&self, sender: &Address, request: StreamRequest) -> Result<StreamId> {
        self.observe("create_stream", self.try_create(sender, request))
    }

    /// Open a stream from a total deposit
    ///
    /// The deposit must be at least the window length in seconds and an exact
    /// multiple of it; the rate is `deposit / duration`.
    pub fn create_stream_with_deposit(
        &self,
        sender: &Address,
        request: DepositRequest,
    ) -> Result<StreamId> {
        let result = rate_for_deposit(&request).and_then(|rate_per_second| {
            self.try_create(
                sender,
                StreamRequest {
                    receiver: request.receiver,
                    rate_per_second,
                    token: request.token,
                    start_time: request.start_time,
                    end_time: request.end_time,
                },
            )
        });
        self.observe("create_stream_with_deposit", result)
    }

    /// Cancel a stream, paying the vested part to the receiver and refunding
    /// the rest to the sender
    pub fn cancel_stream(&self, caller: &Address, stream_id: StreamId) -> Result<CancelReceipt> {
        self.observe("cancel_stream", self.try_cancel(caller, stream_id))
    }

    fn try_create(&self, sender: &Address, request: StreamRequest) -> Result<StreamId> {
        let deposit_total = validate_request(sender, &request)?;

        let mut guard = self.state.write();
        let state = &mut *guard;

        let id = state.store.next_id()?;
        if state.store.contains(id) {
            return Err(Error::DuplicateId(id));
        }

        let now = self.clock.now();
        let stream = Stream {
            id,
            sender: sender.clone(),
            receiver: request.receiver,
            token: request.token,
            rate_per_second: request.rate_per_second,
            start_time: request.start_time,
            end_time: request.end_time,
            deposit_total,
            status: StreamStatus::Active,
        };
        let event = state.journal.seal(
            EventKind::Created {
                stream: stream.clone(),
            },
            now,
        )?;

        self.gateway.pull(&stream.token, sender, deposit_total)?;

        // Escrow is held; insert is the last fallible step
        let allocated = state.store.allocate()?;
        debug_assert_eq!(allocated, id);
        let (sender, receiver, token) = (
            stream.sender.clone(),
            stream.receiver.clone(),
            stream.token.clone(),
        );
        let (start_time, end_time) = (stream.start_time, stream.end_time);
        state.store.insert(stream)?;
        state.outgoing.append(&sender, id);
        state.incoming.append(&receiver, id);
        state.journal.commit(event);

        tracing::info!(
            stream_id = id,
            %sender,
            %receiver,
            %token,
            deposit = %deposit_total,
            start_time,
            end_time,
            "Stream created"
        );

        self.metrics.record_created(deposit_total);
        Ok(id)
    }

    fn try_cancel(&self, caller: &Address, stream_id: StreamId) -> Result<CancelReceipt> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let stream = state.store.get(stream_id)?.clone();
        self.authorize(caller, &stream)?;

        if !state.outgoing.contains(&stream.sender, stream_id)
            || !state.incoming.contains(&stream.receiver, stream_id)
        {
            return Err(Error::IndexInconsistency(format!(
                "stream {} missing from an address index",
                stream_id
            )));
        }

        let now = self.clock.now();
        let Split { vested, remaining } = accrual::split(&stream, now);
        let event = state.journal.seal(
            EventKind::Cancelled {
                stream_id,
                sender: stream.sender.clone(),
                receiver: stream.receiver.clone(),
                token: stream.token.clone(),
                receiver_payout: vested,
                sender_refund: remaining,
            },
            now,
        )?;

        let payouts: Vec<Payout> = [
            Payout::new(stream.receiver.clone(), vested),
            Payout::new(stream.sender.clone(), remaining),
        ]
        .into_iter()
        .filter(|payout| payout.amount > 0)
        .collect();
        if !payouts.is_empty() {
            self.gateway.pay_all(&stream.token, &payouts)?;
        }

        // Both ids were checked above
        state.outgoing.remove_id(&stream.sender, stream_id)?;
        state.incoming.remove_id(&stream.receiver, stream_id)?;
        let mut record = state.store.remove(stream_id)?;
        record.status = StreamStatus::Cancelled;
        state.journal.commit(event);

        tracing::info!(
            stream_id,
            sender = %record.sender,
            receiver = %record.receiver,
            token = %record.token,
            receiver_payout = %vested,
            sender_refund = %remaining,
            "Stream cancelled"
        );
        self.metrics.record_cancelled();

        Ok(CancelReceipt {
            stream: record,
            receiver_payout: vested,
            sender_refund: remaining,
            cancelled_at: now,
        })
    }

    fn authorize(&self, caller: &Address, stream: &Stream) -> Result<()> {
        let allowed = match self.cancel_policy {
            CancelPolicy::SenderOnly => *caller == stream.sender,
            CancelPolicy::SenderOrReceiver => {
                *caller == stream.sender || *caller == stream.receiver
            }
        };

        if allowed {
            Ok(())
        } else {
            Err(Error::Unauthorized {
                stream_id: stream.id,
                caller: caller.clone(),
            })
        }
    }

    fn observe<T>(&self, operation: &'static str, result: Result<T>) -> Result<T> {
        if let Err(ref error) = result {
            self.metrics.record_rejected(operation, error);
            tracing::warn!(operation, %error, "Ledger mutation rejected");
        }
        result
    }

    // Queries

    /// Get stream by id
    pub fn get_stream(&self, stream_id: StreamId) -> Result<Stream> {
        self.state.read().store.get(stream_id).cloned()
    }

    /// All streams `address` receives, in index order
    pub fn get_incoming_stream(&self, address: &Address) -> Result<Vec<Stream>> {
        self.list(Role::Incoming, address)
    }

    /// All streams `address` funds, in index order
    pub fn get_outgoing_stream(&self, address: &Address) -> Result<Vec<Stream>> {
        self.list(Role::Outgoing, address)
    }

    /// One page of the streams `address` receives
    pub fn get_incoming_streams(
        &self,
        address: &Address,
        limit: usize,
        offset: usize,
    ) -> Result<StreamPage> {
        self.page(Role::Incoming, address, limit, offset)
    }

    /// One page of the streams `address` funds
    pub fn get_outgoing_streams(
        &self,
        address: &Address,
        limit: usize,
        offset: usize,
    ) -> Result<StreamPage> {
        self.page(Role::Outgoing, address, limit, offset)
    }

    /// Vested incoming amounts per token, in order of first appearance
    pub fn get_token_balance(&self, address: &Address) -> Result<Vec<TokenBalance>> {
        let state = self.state.read();
        let now = self.clock.now();

        let streams = state
            .incoming
            .all(address)
            .iter()
            .map(|id| state.store.get(*id))
            .collect::<Result<Vec<&Stream>>>()?;

        tracing::debug!(%address, streams = streams.len(), now, "Aggregating token balance");
        balance::aggregate(streams, now)
    }

    /// Share of a stream's deposit attributable to `who` right now
    ///
    /// Vested amount for the receiver, unvested amount for the sender, zero
    /// for anyone else.
    pub fn balance_of(&self, stream_id: StreamId, who: &Address) -> Result<Amount> {
        let state = self.state.read();
        let stream = state.store.get(stream_id)?;
        let Split { vested, remaining } = accrual::split(stream, self.clock.now());

        Ok(if *who == stream.receiver {
            vested
        } else if *who == stream.sender {
            remaining
        } else {
            0
        })
    }

    /// Number of active streams
    pub fn stream_count(&self) -> usize {
        self.state.read().store.len()
    }

    /// Id the next successful create will receive
    pub fn next_stream_id(&self) -> Result<StreamId> {
        self.state.read().store.next_id()
    }

    /// Copy of the lifecycle journal
    pub fn journal(&self) -> Vec<JournalEvent> {
        self.state.read().journal.events().to_vec()
    }

    /// Hash of the latest journal event
    pub fn journal_head(&self) -> [u8; 32] {
        self.state.read().journal.head()
    }

    /// Re-derive the journal hash chain
    pub fn verify_journal(&self) -> Result<bool> {
        self.state.read().journal.verify_chain()
    }

    fn list(&self, role: Role, address: &Address) -> Result<Vec<Stream>> {
        let state = self.state.read();
        let ids = state.index(role).all(address);

        tracing::debug!(%address, ?role, count = ids.len(), "Listing streams");
        state.resolve(role, ids)
    }

    fn page(&self, role: Role, address: &Address, limit: usize, offset: usize) -> Result<StreamPage> {
        let state = self.state.read();
        let (new_offset, ids) = state.index(role).page(address, limit, offset);

        tracing::debug!(%address, ?role, limit, offset, new_offset, "Paging streams");
        Ok(StreamPage {
            new_offset,
            streams: state.resolve(role, ids)?,
        })
    }
}

/// Check a request and compute its deposit
fn validate_request(sender: &Address, request: &StreamRequest) -> Result<Amount> {
    if sender.is_null() {
        return Err(Error::InvalidAddress("sender is the null address".to_string()));
    }
    if request.receiver.is_null() {
        return Err(Error::InvalidAddress("receiver is the null address".to_string()));
    }
    if request.token.is_null() {
        return Err(Error::InvalidAddress("token is the null address".to_string()));
    }
    if *sender == request.receiver {
        return Err(Error::InvalidAddress(format!(
            "{} cannot stream to itself",
            sender
        )));
    }
    if request.start_time >= request.end_time {
        return Err(Error::InvalidTimeRange {
            start_time: request.start_time,
            end_time: request.end_time,
        });
    }
    if request.rate_per_second == 0 {
        return Err(Error::InvalidRate("rate per second must be positive".to_string()));
    }

    let duration = Amount::from(request.end_time.abs_diff(request.start_time));
    request.rate_per_second.checked_mul(duration).ok_or_else(|| {
        Error::AmountOverflow(format!(
            "{} per second over {} seconds",
            request.rate_per_second, duration
        ))
    })
}

/// Derive the per-second rate for a deposit-denominated request
fn rate_for_deposit(request: &DepositRequest) -> Result<Amount> {
    if request.start_time >= request.end_time {
        return Err(Error::InvalidTimeRange {
            start_time: request.start_time,
            end_time: request.end_time,
        });
    }

    let duration = Amount::from(request.end_time.abs_diff(request.start_time));
    if request.deposit < duration {
        return Err(Error::InvalidDeposit(format!(
            "deposit {} smaller than window of {} seconds",
            request.deposit, duration
        )));
    }
    if request.deposit % duration != 0 {
        return Err(Error::InvalidDeposit(format!(
            "deposit {} not a multiple of window of {} seconds",
            request.deposit, duration
        )));
    }

    Ok(request.deposit / duration)
}
