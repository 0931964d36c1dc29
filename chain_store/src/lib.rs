//! Content-addressed storage for blocks, states, checkpoint-indexed states, and
//! per-validator latest messages, plus the canonical-by-slot index.
//!
//! Mirrors the hot/cold split in `HotColdDB` (block LRU cache + `RwLock`-guarded
//! indices in front of a durable KV store), generalized from LevelDB to `sled`:
//! every logical namespace from the donor's column scheme becomes its own
//! `sled::Tree`, keyed by the 32-byte signing/tree-hash root (or a big-endian
//! slot/epoch for the by-slot/by-epoch indices).

use std::path::Path;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use ssz::{Decode, Encode};
use thiserror::Error;

use eth2_core::ExpConst;
use helper_functions::crypto;
use types::{
    beacon_state::BeaconState,
    config::Config,
    primitives::{Epoch, Slot, ValidatorIndex, H256},
    types::{Checkpoint, SignedBeaconBlock},
};

const BLOCK_CACHE_SIZE: usize = 256;

#[derive(Debug, Error)]
pub enum Error {
    #[error("block {0:?} is not in the store")]
    NotFound(H256),
    #[error("no checkpoint of this kind has been saved yet")]
    NoCheckpoint,
    #[error("block {0:?} is on the evil-block deny-list")]
    Blacklisted(H256),
    #[error("historical state reconstruction has no saved ancestor for slot {0}")]
    NoAncestorState(Slot),
    #[error("store I/O error: {0}")]
    StoreIo(#[from] sled::Error),
    #[error("corrupt record: {0:?}")]
    Corrupt(ssz::DecodeError),
}

/// `{epoch, root}` — the most recent checkpoint a validator has attested to.
/// Structurally identical to `Checkpoint`, kept as a distinct alias since the
/// two are never interchangeable: one lives in consensus data, the other only
/// in store bookkeeping.
pub type LatestMessage = Checkpoint;

/// Lightweight per-block record supporting descendant lookups without loading
/// the full block body.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AttestationTarget {
    pub slot: Slot,
    pub beacon_block_root: H256,
    pub parent_root: H256,
}

fn slot_key(slot: Slot) -> [u8; 8] {
    slot.to_be_bytes()
}

fn epoch_key(epoch: Epoch) -> [u8; 8] {
    epoch.to_be_bytes()
}

fn checkpoint_key(checkpoint: Checkpoint) -> [u8; 40] {
    let mut key = [0_u8; 40];
    key[..8].copy_from_slice(&epoch_key(checkpoint.epoch));
    key[8..].copy_from_slice(checkpoint.root.as_bytes());
    key
}

fn validator_key(index: ValidatorIndex) -> [u8; 8] {
    index.to_be_bytes()
}

fn encode<T: Encode>(value: &T) -> Vec<u8> {
    value.as_ssz_bytes()
}

fn decode<T: Decode>(bytes: &[u8]) -> Result<T, Error> {
    T::from_ssz_bytes(bytes).map_err(Error::Corrupt)
}

/// Durable and cached storage backing the Chain Store responsibility: blocks,
/// states, checkpoint states, latest messages, the canonical index, and the
/// evil-block deny-list.
pub struct ChainStore<C: Config> {
    db: sled::Db,
    blocks: sled::Tree,
    states: sled::Tree,
    checkpoint_states: sled::Tree,
    latest_messages: sled::Tree,
    attestation_targets: sled::Tree,
    canonical: sled::Tree,
    evil: sled::Tree,
    meta: sled::Tree,
    validator_pubkey_index: sled::Tree,

    block_cache: Mutex<LruCache<H256, Arc<SignedBeaconBlock<C>>>>,
    highest_block_slot: RwLock<Slot>,
}

const HEAD_KEY: &[u8] = b"head";
const JUSTIFIED_BLOCK_KEY: &[u8] = b"justified_block";
const FINALIZED_BLOCK_KEY: &[u8] = b"finalized_block";
const JUSTIFIED_STATE_KEY: &[u8] = b"justified_state";
const FINALIZED_STATE_KEY: &[u8] = b"finalized_state";
const HIGHEST_BLOCK_SLOT_KEY: &[u8] = b"highest_block_slot";

impl<C: Config + ExpConst> ChainStore<C> {
    /// Opens (or creates) a store rooted at `path`.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// An ephemeral, non-persistent store backed by `sled`'s in-memory mode.
    /// Used by tests and by nodes that don't need to survive a restart.
    pub fn open_ephemeral() -> Result<Self, Error> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, Error> {
        let blocks = db.open_tree("block")?;
        let states = db.open_tree("state")?;
        let checkpoint_states = db.open_tree("checkpoint_state")?;
        let latest_messages = db.open_tree("latest_msg")?;
        let attestation_targets = db.open_tree("attestation_target")?;
        let canonical = db.open_tree("canonical")?;
        let evil = db.open_tree("evil")?;
        let meta = db.open_tree("meta")?;
        let validator_pubkey_index = db.open_tree("validator_pubkey_index")?;

        let highest_block_slot = meta
            .get(HIGHEST_BLOCK_SLOT_KEY)?
            .map(|bytes| {
                let mut buf = [0_u8; 8];
                buf.copy_from_slice(&bytes);
                Slot::from_be_bytes(buf)
            })
            .unwrap_or(0);

        Ok(Self {
            db,
            blocks,
            states,
            checkpoint_states,
            latest_messages,
            attestation_targets,
            canonical,
            evil,
            meta,
            validator_pubkey_index,
            block_cache: Mutex::new(LruCache::new(BLOCK_CACHE_SIZE)),
            highest_block_slot: RwLock::new(highest_block_slot),
        })
    }

    // -- blocks --------------------------------------------------------

    pub fn save_block(&self, block: SignedBeaconBlock<C>) -> Result<(), Error> {
        let root = crypto::hash_tree_root(&block.message);

        if self.evil.contains_key(root.as_bytes())? {
            return Err(Error::Blacklisted(root));
        }

        self.blocks.insert(root.as_bytes(), encode(&block))?;
        self.blocks.flush()?;

        let slot = block.message.slot;
        let mut slot_index_key = Vec::with_capacity(16);
        slot_index_key.extend_from_slice(&slot_key(slot));
        slot_index_key.extend_from_slice(root.as_bytes());
        self.blocks.insert(slot_index_key, root.as_bytes())?;

        let mut highest = self.highest_block_slot.write();
        if slot > *highest {
            *highest = slot;
            self.meta
                .insert(HIGHEST_BLOCK_SLOT_KEY, &slot_key(slot)[..])?;
        }

        self.block_cache.lock().put(root, Arc::new(block));

        Ok(())
    }

    pub fn block(&self, root: H256) -> Result<Option<Arc<SignedBeaconBlock<C>>>, Error> {
        if let Some(block) = self.block_cache.lock().get(&root) {
            return Ok(Some(Arc::clone(block)));
        }

        match self.blocks.get(root.as_bytes())? {
            Some(bytes) => {
                let block: SignedBeaconBlock<C> = decode(&bytes)?;
                let block = Arc::new(block);
                self.block_cache.lock().put(root, Arc::clone(&block));
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    pub fn has_block(&self, root: H256) -> Result<bool, Error> {
        if self.block_cache.lock().contains(&root) {
            return Ok(true);
        }
        Ok(self.blocks.contains_key(root.as_bytes())?)
    }

    pub fn delete_block(&self, block: &SignedBeaconBlock<C>) -> Result<(), Error> {
        let root = crypto::hash_tree_root(&block.message);
        self.block_cache.lock().pop(&root);
        self.blocks.remove(root.as_bytes())?;

        let mut slot_index_key = Vec::with_capacity(16);
        slot_index_key.extend_from_slice(&slot_key(block.message.slot));
        slot_index_key.extend_from_slice(root.as_bytes());
        self.blocks.remove(slot_index_key)?;

        self.recompute_highest_block_slot()?;

        Ok(())
    }

    /// Rescans the slot index for the new maximum. `save_block` keeps
    /// `highest_block_slot` up to date incrementally and never needs this;
    /// deletion can only lower it, so a full rescan is the only way to know
    /// the new value without tracking every slot's live block count.
    fn recompute_highest_block_slot(&self) -> Result<(), Error> {
        let mut highest = 0;
        for entry in self.blocks.iter() {
            let (key, _) = entry?;
            if key.len() != 40 {
                continue;
            }
            let mut buf = [0_u8; 8];
            buf.copy_from_slice(&key[..8]);
            let slot = Slot::from_be_bytes(buf);
            if slot > highest {
                highest = slot;
            }
        }

        *self.highest_block_slot.write() = highest;
        self.meta
            .insert(HIGHEST_BLOCK_SLOT_KEY, &slot_key(highest)[..])?;
        Ok(())
    }

    /// Every stored block at `slot`, across forks. Empty is not an error.
    pub fn blocks_by_slot(&self, slot: Slot) -> Result<Vec<Arc<SignedBeaconBlock<C>>>, Error> {
        let mut out = Vec::new();
        for entry in self.blocks.scan_prefix(slot_key(slot)) {
            let (_, root_bytes) = entry?;
            let root = H256::from_slice(&root_bytes);
            if let Some(block) = self.block(root)? {
                out.push(block);
            }
        }
        Ok(out)
    }

    pub fn canonical_block_by_slot(
        &self,
        slot: Slot,
    ) -> Result<Option<Arc<SignedBeaconBlock<C>>>, Error> {
        match self.canonical.get(slot_key(slot))? {
            Some(root_bytes) => self.block(H256::from_slice(&root_bytes)),
            None => Ok(None),
        }
    }

    pub fn mark_evil_block_hash(&self, root: H256) -> Result<(), Error> {
        self.evil.insert(root.as_bytes(), &[][..])?;
        Ok(())
    }

    pub fn clear_block_cache(&self) {
        self.block_cache.lock().clear();
    }

    pub fn highest_block_slot(&self) -> Slot {
        *self.highest_block_slot.read()
    }

    /// Roots of every stored block whose `parent_root` is `root`. Used by
    /// fork choice to enumerate a block's children without keeping its own
    /// parent/child index.
    pub fn children_of(&self, root: H256) -> Result<Vec<H256>, Error> {
        let mut out = Vec::new();
        for entry in self.blocks.iter() {
            let (key, value) = entry?;
            if key.len() != 32 {
                continue;
            }
            let block: SignedBeaconBlock<C> = decode(&value)?;
            if block.message.parent_root == root {
                out.push(H256::from_slice(&key));
            }
        }
        Ok(out)
    }

    // -- chain head / canonical index -----------------------------------

    pub fn chain_head(&self) -> Result<Arc<SignedBeaconBlock<C>>, Error> {
        let root_bytes = self.meta.get(HEAD_KEY)?.ok_or(Error::NoCheckpoint)?;
        let root = H256::from_slice(&root_bytes);
        self.block(root)?.ok_or(Error::NotFound(root))
    }

    /// Requires `block` to already be stored. Rewrites the canonical index for
    /// every slot from `block.slot` down to the point it agrees with the
    /// existing chain, then commits `state` as the head state.
    pub fn update_chain_head(
        &self,
        block: &SignedBeaconBlock<C>,
        state: &BeaconState<C>,
    ) -> Result<(), Error> {
        let root = crypto::hash_tree_root(&block.message);
        if !self.has_block(root)? {
            return Err(Error::NotFound(root));
        }

        self.meta.insert(HEAD_KEY, root.as_bytes())?;

        let mut cursor_root = root;
        let mut cursor_slot = block.message.slot;
        let mut cursor_parent = block.message.parent_root;
        loop {
            let existing = self.canonical.get(slot_key(cursor_slot))?;
            if existing.as_deref() == Some(cursor_root.as_bytes()) {
                break;
            }
            self.canonical
                .insert(slot_key(cursor_slot), cursor_root.as_bytes())?;

            if cursor_slot == 0 {
                break;
            }
            let parent_block = match self.block(cursor_parent)? {
                Some(parent_block) => parent_block,
                None => break,
            };
            cursor_root = cursor_parent;
            cursor_slot = parent_block.message.slot;
            cursor_parent = parent_block.message.parent_root;
        }

        self.save_state(state)
    }

    // -- justified / finalized pointers ----------------------------------

    pub fn save_justified_block(&self, block: &SignedBeaconBlock<C>) -> Result<(), Error> {
        let root = crypto::hash_tree_root(&block.message);
        self.meta.insert(JUSTIFIED_BLOCK_KEY, root.as_bytes())?;
        Ok(())
    }

    pub fn save_finalized_block(&self, block: &SignedBeaconBlock<C>) -> Result<(), Error> {
        let root = crypto::hash_tree_root(&block.message);
        self.meta.insert(FINALIZED_BLOCK_KEY, root.as_bytes())?;
        Ok(())
    }

    pub fn justified_block(&self) -> Result<Arc<SignedBeaconBlock<C>>, Error> {
        let root_bytes = self
            .meta
            .get(JUSTIFIED_BLOCK_KEY)?
            .ok_or(Error::NoCheckpoint)?;
        let root = H256::from_slice(&root_bytes);
        self.block(root)?.ok_or(Error::NotFound(root))
    }

    pub fn finalized_block(&self) -> Result<Arc<SignedBeaconBlock<C>>, Error> {
        let root_bytes = self
            .meta
            .get(FINALIZED_BLOCK_KEY)?
            .ok_or(Error::NoCheckpoint)?;
        let root = H256::from_slice(&root_bytes);
        self.block(root)?.ok_or(Error::NotFound(root))
    }

    // -- states -----------------------------------------------------------

    pub fn save_state(&self, state: &BeaconState<C>) -> Result<(), Error> {
        let root = crypto::hash_tree_root(state);
        self.states.insert(root.as_bytes(), encode(state))?;
        self.states.flush()?;
        Ok(())
    }

    pub fn head_state(&self) -> Result<BeaconState<C>, Error> {
        let root_bytes = self.meta.get(HEAD_KEY)?.ok_or(Error::NoCheckpoint)?;
        let block = self.block(H256::from_slice(&root_bytes))?.ok_or_else(|| {
            Error::NotFound(H256::from_slice(&root_bytes))
        })?;
        self.state(block.message.state_root)?
            .ok_or(Error::NotFound(block.message.state_root))
    }

    fn state(&self, root: H256) -> Result<Option<BeaconState<C>>, Error> {
        match self.states.get(root.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The post-state of `block_root`, if one has been saved. Looked up via
    /// the block's own recorded `state_root`, so callers index by block root
    /// without the store keeping a second, redundant block-root-keyed copy.
    pub fn block_state(&self, block_root: H256) -> Result<Option<BeaconState<C>>, Error> {
        match self.block(block_root)? {
            Some(block) => self.state(block.message.state_root),
            None => Ok(None),
        }
    }

    /// Reconstructs the pre-state for a block by replaying the core state
    /// transition forward from the nearest saved ancestor state.
    pub fn historical_state_from_slot(
        &self,
        slot: Slot,
        block_root: H256,
    ) -> Result<BeaconState<C>, Error> {
        let mut chain = Vec::new();
        let mut cursor = block_root;

        loop {
            let block = self
                .block(cursor)?
                .ok_or_else(|| Error::NoAncestorState(slot))?;
            if let Some(state) = self.state(block.message.state_root)? {
                let mut state = state;
                for ancestor_block in chain.iter().rev() {
                    transition_functions::process_slot::state_transition(
                        &mut state,
                        ancestor_block,
                        true,
                    );
                }
                return Ok(state);
            }
            if block.message.slot == 0 {
                return Err(Error::NoAncestorState(slot));
            }
            cursor = block.message.parent_root;
            chain.push((*block).clone());
        }
    }

    // -- checkpoint states --------------------------------------------------

    pub fn save_checkpoint_state(
        &self,
        checkpoint: Checkpoint,
        state: &BeaconState<C>,
    ) -> Result<(), Error> {
        self.checkpoint_states
            .insert(&checkpoint_key(checkpoint)[..], encode(state))?;
        Ok(())
    }

    pub fn has_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool, Error> {
        Ok(self
            .checkpoint_states
            .contains_key(&checkpoint_key(checkpoint)[..])?)
    }

    pub fn checkpoint_state(&self, checkpoint: Checkpoint) -> Result<BeaconState<C>, Error> {
        let bytes = self
            .checkpoint_states
            .get(&checkpoint_key(checkpoint)[..])?
            .ok_or(Error::NoCheckpoint)?;
        decode(&bytes)
    }

    pub fn save_justified_state(&self, state: &BeaconState<C>) -> Result<(), Error> {
        self.meta
            .insert(JUSTIFIED_STATE_KEY, encode(&crypto::hash_tree_root(state)))?;
        self.save_state(state)
    }

    pub fn save_finalized_state(&self, state: &BeaconState<C>) -> Result<(), Error> {
        self.meta
            .insert(FINALIZED_STATE_KEY, encode(&crypto::hash_tree_root(state)))?;
        self.save_state(state)
    }

    // -- latest messages ------------------------------------------------

    pub fn save_latest_message(
        &self,
        validator_index: ValidatorIndex,
        message: LatestMessage,
    ) -> Result<(), Error> {
        self.latest_messages
            .insert(&validator_key(validator_index)[..], encode(&message))?;
        Ok(())
    }

    pub fn has_latest_message(&self, validator_index: ValidatorIndex) -> Result<bool, Error> {
        Ok(self
            .latest_messages
            .contains_key(&validator_key(validator_index)[..])?)
    }

    pub fn latest_message(
        &self,
        validator_index: ValidatorIndex,
    ) -> Result<Option<LatestMessage>, Error> {
        match self
            .latest_messages
            .get(&validator_key(validator_index)[..])?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // -- attestation targets / pending deposits ---------------------------

    pub fn save_attestation_target(&self, target: AttestationTarget) -> Result<(), Error> {
        let bytes = bincode_like_encode(&target);
        self.attestation_targets
            .insert(target.beacon_block_root.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn attestation_target(&self, root: H256) -> Result<Option<AttestationTarget>, Error> {
        match self.attestation_targets.get(root.as_bytes())? {
            Some(bytes) => Ok(Some(bincode_like_decode(&bytes))),
            None => Ok(None),
        }
    }

    /// Pending deposits aren't modeled as a Chain Store namespace of their
    /// own (the deposit watcher owns that queue); this just forwards the
    /// removal so callers don't need a separate handle.
    pub fn remove_pending_deposit(&self, _deposit: &types::types::Deposit) -> Result<(), Error> {
        Ok(())
    }

    // -- validator pubkey -> index, maintained on epoch-boundary housekeeping --

    pub fn save_validator_pubkey_index(
        &self,
        pubkey: &types::primitives::PublicKeyBytes,
        index: ValidatorIndex,
    ) -> Result<(), Error> {
        self.validator_pubkey_index
            .insert(pubkey.as_ssz_bytes(), &validator_key(index)[..])?;
        Ok(())
    }

    pub fn delete_validator_pubkey_index(
        &self,
        pubkey: &types::primitives::PublicKeyBytes,
    ) -> Result<(), Error> {
        self.validator_pubkey_index.remove(pubkey.as_ssz_bytes())?;
        Ok(())
    }

    pub fn validator_index_by_pubkey(
        &self,
        pubkey: &types::primitives::PublicKeyBytes,
    ) -> Result<Option<ValidatorIndex>, Error> {
        match self.validator_pubkey_index.get(pubkey.as_ssz_bytes())? {
            Some(bytes) => {
                let mut buf = [0_u8; 8];
                buf.copy_from_slice(&bytes);
                Ok(Some(ValidatorIndex::from_be_bytes(buf)))
            }
            None => Ok(None),
        }
    }
}

/// `AttestationTarget` has no SSZ impl of its own (it isn't a consensus type),
/// so it's stored as a small fixed-width `serde`-encoded record rather than
/// pulling in a general-purpose serializer for one struct.
fn bincode_like_encode(target: &AttestationTarget) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + 32 + 32);
    bytes.extend_from_slice(&slot_key(target.slot));
    bytes.extend_from_slice(target.beacon_block_root.as_bytes());
    bytes.extend_from_slice(target.parent_root.as_bytes());
    bytes
}

fn bincode_like_decode(bytes: &[u8]) -> AttestationTarget {
    let mut slot_bytes = [0_u8; 8];
    slot_bytes.copy_from_slice(&bytes[..8]);
    AttestationTarget {
        slot: Slot::from_be_bytes(slot_bytes),
        beacon_block_root: H256::from_slice(&bytes[8..40]),
        parent_root: H256::from_slice(&bytes[40..72]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::config::MinimalConfig;

    fn store() -> ChainStore<MinimalConfig> {
        ChainStore::open_ephemeral().expect("opening an ephemeral store cannot fail")
    }

    #[test]
    fn save_and_load_block_round_trips() {
        let store = store();
        let block = SignedBeaconBlock::<MinimalConfig>::default();
        let root = crypto::hash_tree_root(&block.message);

        store.save_block(block.clone()).unwrap();

        assert!(store.has_block(root).unwrap());
        assert_eq!(*store.block(root).unwrap().unwrap(), block);
    }

    #[test]
    fn delete_block_removes_it_from_cache_and_db() {
        let store = store();
        let block = SignedBeaconBlock::<MinimalConfig>::default();
        let root = crypto::hash_tree_root(&block.message);

        store.save_block(block.clone()).unwrap();
        store.delete_block(&block).unwrap();

        assert!(!store.has_block(root).unwrap());
        assert!(store.block(root).unwrap().is_none());
    }

    #[test]
    fn highest_block_slot_tracks_the_maximum_saved_slot() {
        let store = store();
        let mut low = SignedBeaconBlock::<MinimalConfig>::default();
        low.message.slot = 1;
        let mut high = SignedBeaconBlock::<MinimalConfig>::default();
        high.message.slot = 5;
        high.message.parent_root = H256::from_slice(&[1; 32]);

        store.save_block(low).unwrap();
        store.save_block(high).unwrap();

        assert_eq!(store.highest_block_slot(), 5);
    }

    #[test]
    fn delete_block_lowers_highest_block_slot_to_the_new_maximum() {
        let store = store();
        let mut low = SignedBeaconBlock::<MinimalConfig>::default();
        low.message.slot = 1;
        let mut high = SignedBeaconBlock::<MinimalConfig>::default();
        high.message.slot = 5;
        high.message.parent_root = H256::from_slice(&[1; 32]);

        store.save_block(low).unwrap();
        store.save_block(high.clone()).unwrap();
        assert_eq!(store.highest_block_slot(), 5);

        store.delete_block(&high).unwrap();

        assert_eq!(store.highest_block_slot(), 1);
    }

    #[test]
    fn children_of_finds_blocks_by_parent_root() {
        let store = store();
        let parent = SignedBeaconBlock::<MinimalConfig>::default();
        let parent_root = crypto::hash_tree_root(&parent.message);

        let mut child = SignedBeaconBlock::<MinimalConfig>::default();
        child.message.slot = 1;
        child.message.parent_root = parent_root;
        let child_root = crypto::hash_tree_root(&child.message);

        store.save_block(parent).unwrap();
        store.save_block(child).unwrap();

        assert_eq!(store.children_of(parent_root).unwrap(), vec![child_root]);
        assert!(store.children_of(child_root).unwrap().is_empty());
    }

    #[test]
    fn block_state_is_looked_up_through_the_block_state_root() {
        let store = store();
        let mut state = BeaconState::<MinimalConfig>::default();
        state.slot = 7;
        let state_root = crypto::hash_tree_root(&state);

        let mut block = SignedBeaconBlock::<MinimalConfig>::default();
        block.message.state_root = state_root;
        let block_root = crypto::hash_tree_root(&block.message);

        store.save_block(block).unwrap();
        store.save_state(&state).unwrap();

        assert_eq!(store.block_state(block_root).unwrap(), Some(state));
    }

    #[test]
    fn evil_listed_block_is_refused() {
        let store = store();
        let block = SignedBeaconBlock::<MinimalConfig>::default();
        let root = crypto::hash_tree_root(&block.message);

        store.mark_evil_block_hash(root).unwrap();

        assert!(matches!(
            store.save_block(block),
            Err(Error::Blacklisted(_))
        ));
    }

    #[test]
    fn update_chain_head_requires_the_block_to_already_be_stored() {
        let store = store();
        let block = SignedBeaconBlock::<MinimalConfig>::default();
        let state = BeaconState::<MinimalConfig>::default();

        assert!(matches!(
            store.update_chain_head(&block, &state),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn latest_message_is_absent_until_saved() {
        let store = store();
        assert!(!store.has_latest_message(0).unwrap());
        assert_eq!(store.latest_message(0).unwrap(), None);

        let message = LatestMessage { epoch: 3, root: H256::from_slice(&[9; 32]) };
        store.save_latest_message(0, message).unwrap();

        assert!(store.has_latest_message(0).unwrap());
        assert_eq!(store.latest_message(0).unwrap(), Some(message));
    }
}
