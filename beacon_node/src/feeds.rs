//! Single-producer/multi-consumer topic feeds: `CanonicalBlockFeed`,
//! `StateInitializedFeed`, `IncomingProcessedBlockFeed`.
//!
//! Grounded on `sigp-rust_beacon_chain/beacon_node/beacon_chain/src/events.rs`'s
//! `ServerSentEventHandler`, which wraps one `tokio::sync::broadcast::Sender`
//! per event kind behind a `subscribe`/`send` pair.

use std::marker::PhantomData;
use std::sync::Arc;

use log::info;
use tokio::sync::broadcast::{self, Receiver, Sender};

use eth2_network::{BeaconBlockAnnounce, Broadcaster, OperationPoolSubscriber};
use types::{config::Config, primitives::H256, types::SignedBeaconBlock};

/// Published after `block_pipeline::BlockPipeline::receive_block` saves a
/// block, so peers can fetch it. Doubles as the `eth2_network::Broadcaster`
/// the pipeline announces through.
pub struct CanonicalBlockFeed {
    tx: Sender<BeaconBlockAnnounce>,
}

impl CanonicalBlockFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> Receiver<BeaconBlockAnnounce> {
        self.tx.subscribe()
    }
}

impl Broadcaster for CanonicalBlockFeed {
    fn broadcast_block_announce(&self, announce: BeaconBlockAnnounce) {
        match self.tx.send(announce) {
            Ok(n) => info!("announced block {:?} to {} subscriber(s)", announce.hash, n),
            Err(_) => info!("announced block {:?} to no subscribers", announce.hash),
        }
    }
}

/// Published once by Genesis Bootstrap, carrying the genesis state's
/// tree-hash root.
pub struct StateInitializedFeed {
    tx: Sender<H256>,
}

impl StateInitializedFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> Receiver<H256> {
        self.tx.subscribe()
    }

    pub fn publish(&self, genesis_state_root: H256) {
        let _ = self.tx.send(genesis_state_root);
    }
}

/// Forwards blocks the pipeline has committed to the operation pool (and any
/// other interested subscriber). Doubles as the pipeline's
/// `eth2_network::OperationPoolSubscriber`.
pub struct IncomingProcessedBlockFeed<C: Config> {
    tx: Sender<Arc<SignedBeaconBlock<C>>>,
    _config: PhantomData<C>,
}

impl<C: Config> IncomingProcessedBlockFeed<C> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            _config: PhantomData,
        }
    }

    pub fn subscribe(&self) -> Receiver<Arc<SignedBeaconBlock<C>>> {
        self.tx.subscribe()
    }
}

impl<C: Config> OperationPoolSubscriber<C> for IncomingProcessedBlockFeed<C> {
    fn notify_block_processed(&self, block: &SignedBeaconBlock<C>) {
        let _ = self.tx.send(Arc::new(block.clone()));
    }
}

#[cfg(test)]
mod tests {
    use types::config::MinimalConfig;

    use super::*;

    #[test]
    fn canonical_block_feed_reaches_a_subscriber() {
        let feed = CanonicalBlockFeed::new(4);
        let mut subscriber = feed.subscribe();
        let announce = BeaconBlockAnnounce {
            hash: H256::from_slice(&[1; 32]),
            slot_number: 7,
        };

        feed.broadcast_block_announce(announce);

        assert_eq!(subscriber.try_recv().unwrap(), announce);
    }

    #[test]
    fn canonical_block_feed_with_no_subscribers_does_not_error() {
        let feed = CanonicalBlockFeed::new(4);
        feed.broadcast_block_announce(BeaconBlockAnnounce {
            hash: H256::from_slice(&[2; 32]),
            slot_number: 1,
        });
    }

    #[test]
    fn state_initialized_feed_publishes_once() {
        let feed = StateInitializedFeed::new(4);
        let mut subscriber = feed.subscribe();
        let root = H256::from_slice(&[3; 32]);

        feed.publish(root);

        assert_eq!(subscriber.try_recv().unwrap(), root);
        assert!(subscriber.try_recv().is_err());
    }

    #[test]
    fn operation_pool_feed_forwards_processed_blocks() {
        let feed = IncomingProcessedBlockFeed::<MinimalConfig>::new(4);
        let mut subscriber = feed.subscribe();
        let block = SignedBeaconBlock::<MinimalConfig>::default();

        feed.notify_block_processed(&block);

        let forwarded = subscriber.try_recv().unwrap();
        assert_eq!(*forwarded, block);
    }
}
