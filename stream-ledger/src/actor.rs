//! Actor-based front end for the ledger
//!
//! Mutations are funnelled through one Tokio task so they apply in mailbox
//! order. Queries skip the mailbox and read the shared ledger directly.
//!
//! ```text
//! LedgerHandle (Clone) ──mpsc (bounded)──▶ LedgerActor ──▶ StreamLedger
//!        │                                                     ▲
//!        └──────────────────── queries (read lock) ────────────┘
//! ```

use crate::{
    clock::Clock,
    config::Config,
    escrow::TokenGateway,
    ledger::StreamLedger,
    types::{
        Address, Amount, CancelReceipt, DepositRequest, Stream, StreamId, StreamPage,
        StreamRequest, TokenBalance,
    },
    Error, Result,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Open a rate-denominated stream
    CreateStream {
        /// Payer
        sender: Address,
        /// Stream parameters
        request: StreamRequest,
        /// Reply channel
        response: oneshot::Sender<Result<StreamId>>,
    },

    /// Open a deposit-denominated stream
    CreateStreamWithDeposit {
        /// Payer
        sender: Address,
        /// Stream parameters
        request: DepositRequest,
        /// Reply channel
        response: oneshot::Sender<Result<StreamId>>,
    },

    /// Cancel a stream
    CancelStream {
        /// Identity requesting the cancel
        caller: Address,
        /// Stream to cancel
        stream_id: StreamId,
        /// Reply channel
        response: oneshot::Sender<Result<CancelReceipt>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that applies ledger mutations
#[derive(Debug)]
pub struct LedgerActor<G, C> {
    ledger: Arc<StreamLedger<G, C>>,
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl<G: TokenGateway, C: Clock> LedgerActor<G, C> {
    /// Create new actor
    pub fn new(ledger: Arc<StreamLedger<G, C>>, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { ledger, mailbox }
    }

    /// Run the actor event loop until shutdown or every handle is dropped
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => {
                    tracing::info!("Ledger actor shutting down");
                    break;
                }
                msg => {
                    if let Err(e) = self.handle_message(msg) {
                        tracing::error!("Error handling message: {}", e);
                    }
                }
            }
        }
    }

    fn handle_message(&self, msg: LedgerMessage) -> Result<()> {
        let delivered = match msg {
            LedgerMessage::CreateStream {
                sender,
                request,
                response,
            } => response
                .send(self.ledger.create_stream(&sender, request))
                .is_ok(),

            LedgerMessage::CreateStreamWithDeposit {
                sender,
                request,
                response,
            } => response
                .send(self.ledger.create_stream_with_deposit(&sender, request))
                .is_ok(),

            LedgerMessage::CancelStream {
                caller,
                stream_id,
                response,
            } => response
                .send(self.ledger.cancel_stream(&caller, stream_id))
                .is_ok(),

            // Handled in run loop
            LedgerMessage::Shutdown => true,
        };

        if delivered {
            Ok(())
        } else {
            Err(Error::Concurrency(
                "Caller dropped before response was delivered".to_string(),
            ))
        }
    }
}

/// Handle for driving the ledger
#[derive(Debug)]
pub struct LedgerHandle<G, C> {
    sender: mpsc::Sender<LedgerMessage>,
    ledger: Arc<StreamLedger<G, C>>,
}

impl<G, C> Clone for LedgerHandle<G, C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            ledger: self.ledger.clone(),
        }
    }
}

impl<G: TokenGateway, C: Clock> LedgerHandle<G, C> {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>, ledger: Arc<StreamLedger<G, C>>) -> Self {
        Self { sender, ledger }
    }

    /// Shared ledger behind this handle
    pub fn ledger(&self) -> &Arc<StreamLedger<G, C>> {
        &self.ledger
    }

    /// Open a rate-denominated stream
    pub async fn create_stream(&self, sender: Address, request: StreamRequest) -> Result<StreamId> {
        self.call(|response| LedgerMessage::CreateStream {
            sender,
            request,
            response,
        })
        .await
    }

    /// Open a deposit-denominated stream
    pub async fn create_stream_with_deposit(
        &self,
        sender: Address,
        request: DepositRequest,
    ) -> Result<StreamId> {
        self.call(|response| LedgerMessage::CreateStreamWithDeposit {
            sender,
            request,
            response,
        })
        .await
    }

    /// Cancel a stream
    pub async fn cancel_stream(&self, caller: Address, stream_id: StreamId) -> Result<CancelReceipt> {
        self.call(|response| LedgerMessage::CancelStream {
            caller,
            stream_id,
            response,
        })
        .await
    }

    /// Get stream by id
    pub fn get_stream(&self, stream_id: StreamId) -> Result<Stream> {
        self.ledger.get_stream(stream_id)
    }

    /// All streams `address` receives
    pub fn get_incoming_stream(&self, address: &Address) -> Result<Vec<Stream>> {
        self.ledger.get_incoming_stream(address)
    }

    /// All streams `address` funds
    pub fn get_outgoing_stream(&self, address: &Address) -> Result<Vec<Stream>> {
        self.ledger.get_outgoing_stream(address)
    }

    /// One page of incoming streams
    pub fn get_incoming_streams(
        &self,
        address: &Address,
        limit: usize,
        offset: usize,
    ) -> Result<StreamPage> {
        self.ledger.get_incoming_streams(address, limit, offset)
    }

    /// One page of outgoing streams
    pub fn get_outgoing_streams(
        &self,
        address: &Address,
        limit: usize,
        offset: usize,
    ) -> Result<StreamPage> {
        self.ledger.get_outgoing_streams(address, limit, offset)
    }

    /// Vested incoming amounts per token
    pub fn get_token_balance(&self, address: &Address) -> Result<Vec<TokenBalance>> {
        self.ledger.get_token_balance(address)
    }

    /// Share of a stream attributable to `who`
    pub fn balance_of(&self, stream_id: StreamId, who: &Address) -> Result<Amount> {
        self.ledger.balance_of(stream_id, who)
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }

    async fn call<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(message(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }
}

/// Spawn the ledger actor with a mailbox sized by `config.actor`
pub fn spawn_ledger_actor<G, C>(
    ledger: Arc<StreamLedger<G, C>>,
    config: &Config,
) -> LedgerHandle<G, C>
where
    G: TokenGateway + 'static,
    C: Clock + 'static,
{
    let mailbox_capacity = config.actor.mailbox_capacity.max(1);
    tracing::info!(mailbox_capacity, "Spawning ledger actor");

    // Bounded channel for backpressure
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = LedgerActor::new(ledger.clone(), rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx, ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::escrow::InMemoryTokenGateway;

    type TestHandle = LedgerHandle<Arc<InMemoryTokenGateway>, Arc<ManualClock>>;

    fn spawn() -> (TestHandle, Arc<ManualClock>) {
        let mut config = Config::default();
        config.actor.mailbox_capacity = 16;
        spawn_with(&config)
    }

    fn spawn_with(config: &Config) -> (TestHandle, Arc<ManualClock>) {
        let gateway = Arc::new(InMemoryTokenGateway::new());
        gateway
            .mint(&Address::new("0xusdc"), &Address::new("0xa11ce"), 10_000)
            .unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let ledger = Arc::new(StreamLedger::new(config, gateway, clock.clone()));
        (spawn_ledger_actor(ledger, config), clock)
    }

    fn request(receiver: &str) -> StreamRequest {
        StreamRequest {
            receiver: Address::new(receiver),
            rate_per_second: 10,
            token: Address::new("0xusdc"),
            start_time: 100,
            end_time: 200,
        }
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (handle, _) = spawn();
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_create_and_cancel() {
        let (handle, clock) = spawn();
        let alice = Address::new("0xa11ce");

        let id = handle
            .create_stream(alice.clone(), request("0xb0b"))
            .await
            .unwrap();
        assert_eq!(handle.get_stream(id).unwrap().deposit_total, 1_000);

        clock.set(150);
        assert_eq!(handle.balance_of(id, &Address::new("0xb0b")).unwrap(), 500);

        let receipt = handle.cancel_stream(alice, id).await.unwrap();
        assert_eq!(receipt.receiver_payout, 500);
        assert_eq!(receipt.sender_refund, 500);
        assert!(handle.get_outgoing_stream(&Address::new("0xa11ce")).unwrap().is_empty());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_returns_ledger_errors() {
        let (handle, _) = spawn();
        let err = handle
            .cancel_stream(Address::new("0xa11ce"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StreamNotFound(1)));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_distinct_ids() {
        let (handle, _) = spawn();

        let tasks: Vec<_> = (0..8)
            .map(|n| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    handle
                        .create_stream(Address::new("0xa11ce"), request(&format!("0xb0b{}", n)))
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap().unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert_eq!(handle.get_outgoing_stream(&Address::new("0xa11ce")).unwrap().len(), 8);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_single_slot_mailbox_serves_queued_callers() {
        let mut config = Config::default();
        config.actor.mailbox_capacity = 1;
        let (handle, _) = spawn_with(&config);

        let tasks: Vec<_> = (0..4)
            .map(|n| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    handle
                        .create_stream(Address::new("0xa11ce"), request(&format!("0xca201{}", n)))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(handle.ledger().stream_count(), 4);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_after_shutdown() {
        let (handle, _) = spawn();
        handle.shutdown().await.unwrap();
        // Give the actor a chance to exit
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let result = handle
            .create_stream(Address::new("0xa11ce"), request("0xb0b"))
            .await;
        assert!(matches!(result, Err(Error::Concurrency(_))));
    }
}
