//! The virtual's UTXO set
//!
//! In memory it is a plain collection. Backed by a database it is a
//! byte-bounded LRU cache over the `utxos` column family, with pending changes
//! kept aside until the next commit.

use consensus_core::tx::{Transaction, TransactionOutpoint, UtxoEntry};
use consensus_core::utxo::{UtxoCollection, UtxoDiff, UtxoError, UtxoResult, UtxoView};
use database::stores::UtxoStore;
use database::{Database, DbBatch, DbResult, MemSizeLruCache};
use std::collections::HashMap;
use std::sync::Arc;

pub enum FullUtxoSet {
    Memory(UtxoCollection),
    Stored {
        store: UtxoStore,
        cache: MemSizeLruCache<TransactionOutpoint, UtxoEntry>,
        /// `None` marks a pending removal
        pending: HashMap<TransactionOutpoint, Option<UtxoEntry>>,
    },
}

impl FullUtxoSet {
    pub fn in_memory() -> Self {
        Self::Memory(UtxoCollection::new())
    }

    pub fn with_db(db: Arc<Database>, cache_max_bytes: usize) -> Self {
        Self::Stored { store: UtxoStore::new(db), cache: MemSizeLruCache::new(cache_max_bytes), pending: HashMap::new() }
    }

    pub fn add(&mut self, outpoint: TransactionOutpoint, entry: UtxoEntry) {
        match self {
            Self::Memory(collection) => collection.insert(outpoint, entry),
            Self::Stored { pending, .. } => {
                pending.insert(outpoint, Some(entry));
            }
        }
    }

    pub fn remove(&mut self, outpoint: &TransactionOutpoint) {
        match self {
            Self::Memory(collection) => {
                collection.remove(outpoint);
            }
            Self::Stored { cache, pending, .. } => {
                cache.remove(outpoint);
                pending.insert(*outpoint, None);
            }
        }
    }

    /// Spends the inputs and creates the outputs of `tx` accepted at
    /// `blue_score`. Returns false without mutating anything when an input is
    /// absent.
    pub fn add_tx(&mut self, tx: &Transaction, blue_score: u64) -> UtxoResult<bool> {
        for input in &tx.inputs {
            if self.get(&input.previous_outpoint)?.is_none() {
                return Ok(false);
            }
        }
        for input in &tx.inputs {
            self.remove(&input.previous_outpoint);
        }
        let id = tx.id();
        let is_coinbase = tx.is_coinbase();
        for (index, output) in tx.outputs.iter().enumerate() {
            let entry = UtxoEntry::new(output.value, output.script_public_key.clone(), blue_score, is_coinbase);
            self.add(TransactionOutpoint::new(id, index as u32), entry);
        }
        Ok(true)
    }

    /// Applies a diff expressed against this set
    pub fn meld(&mut self, diff: &UtxoDiff) {
        for (outpoint, _) in diff.to_remove.iter() {
            if !diff.to_add.contains(outpoint) {
                self.remove(outpoint);
            }
        }
        for (outpoint, entry) in diff.to_add.iter() {
            self.add(*outpoint, entry.clone());
        }
    }

    pub fn stage(&self, batch: &mut DbBatch) -> DbResult<()> {
        if let Self::Stored { store, pending, .. } = self {
            for (outpoint, entry) in pending {
                match entry {
                    Some(entry) => store.put(batch, outpoint, entry)?,
                    None => store.delete(batch, outpoint)?,
                }
            }
        }
        Ok(())
    }

    /// Moves committed changes into the cache
    pub fn clear_pending(&mut self) {
        if let Self::Stored { cache, pending, .. } = self {
            for (outpoint, entry) in pending.drain() {
                if let Some(entry) = entry {
                    cache.insert(outpoint, entry);
                }
            }
        }
    }

    /// Number of entries held in memory
    pub fn cached_len(&self) -> usize {
        match self {
            Self::Memory(collection) => collection.len(),
            Self::Stored { cache, pending, .. } => cache.len() + pending.len(),
        }
    }
}

impl UtxoView for FullUtxoSet {
    fn get(&self, outpoint: &TransactionOutpoint) -> UtxoResult<Option<UtxoEntry>> {
        match self {
            Self::Memory(collection) => Ok(collection.get(outpoint).cloned()),
            Self::Stored { store, cache, pending } => {
                if let Some(entry) = pending.get(outpoint) {
                    return Ok(entry.clone());
                }
                if let Some(entry) = cache.get(outpoint) {
                    return Ok(Some(entry));
                }
                let entry = store.get(outpoint).map_err(|e| UtxoError::Store(e.to_string()))?;
                if let Some(entry) = &entry {
                    cache.insert(*outpoint, entry.clone());
                }
                Ok(entry)
            }
        }
    }
}
