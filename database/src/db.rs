use crate::errors::{DbError, DbResult};
use parking_lot::RwLock;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Raw block bytes keyed by hash
pub const CF_BLOCKS: &str = "blocks";
/// Block nodes keyed by (blue score big-endian, hash)
pub const CF_BLOCK_INDEX: &str = "block_index";
/// The virtual's full UTXO set keyed by outpoint
pub const CF_UTXOS: &str = "utxos";
/// Per-block UTXO diffs and diff children keyed by hash
pub const CF_UTXO_DIFFS: &str = "utxo_diffs";
/// Per-block UTXO multisets keyed by hash
pub const CF_MULTISETS: &str = "multisets";
/// Reachability intervals and future covering sets keyed by hash
pub const CF_REACHABILITY: &str = "reachability";
/// Merge-set acceptance and fee data keyed by hash
pub const CF_ACCEPTANCE: &str = "acceptance";
/// Single-row records such as the DAG state
pub const CF_METADATA: &str = "metadata";

pub const COLUMN_FAMILIES: [&str; 8] =
    [CF_BLOCKS, CF_BLOCK_INDEX, CF_UTXOS, CF_UTXO_DIFFS, CF_MULTISETS, CF_REACHABILITY, CF_ACCEPTANCE, CF_METADATA];

pub struct Database {
    db: Arc<DB>,
    is_closed: Arc<RwLock<bool>>,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(10000);
        opts.set_keep_log_file_num(10);
        opts.set_max_background_jobs(4);
        opts.set_bytes_per_sync(1048576);
        opts.increase_parallelism(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_write_buffer_size(64 * 1024 * 1024);
        opts.set_max_write_buffer_number(3);

        let cf_descriptors: Vec<_> =
            COLUMN_FAMILIES.iter().map(|name| ColumnFamilyDescriptor::new(*name, Options::default())).collect();

        let db = DB::open_cf_descriptors(&opts, path.as_ref(), cf_descriptors)?;
        info!(path = %path.as_ref().display(), "opened database");
        Ok(Self { db: Arc::new(db), is_closed: Arc::new(RwLock::new(false)) })
    }

    fn check_closed(&self) -> DbResult<()> {
        if *self.is_closed.read() {
            return Err(DbError::DatabaseClosed);
        }
        Ok(())
    }

    fn get_cf_handle(&self, cf_name: &str) -> DbResult<&rocksdb::ColumnFamily> {
        self.db.cf_handle(cf_name).ok_or_else(|| DbError::ColumnFamilyNotFound(cf_name.to_string()))
    }

    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> DbResult<()> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        self.db.put_cf(cf, key, value)?;
        Ok(())
    }

    pub fn get(&self, cf_name: &str, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        Ok(self.db.get_cf(cf, key)?)
    }

    pub fn exists(&self, cf_name: &str, key: &[u8]) -> DbResult<bool> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        Ok(self.db.get_pinned_cf(cf, key)?.is_some())
    }

    /// Starts an atomic write spanning any column families
    pub fn batch(&self) -> DbBatch<'_> {
        DbBatch { db: self, batch: WriteBatch::default() }
    }

    pub fn write_batch(&self, batch: DbBatch<'_>) -> DbResult<()> {
        self.check_closed()?;
        let ops = batch.batch.len();
        self.db.write(batch.batch)?;
        debug!(ops, "committed write batch");
        Ok(())
    }

    /// Collects every key/value pair of a column family in key order
    pub fn iterate_all(&self, cf_name: &str) -> DbResult<Vec<(Box<[u8]>, Box<[u8]>)>> {
        self.check_closed()?;
        let cf = self.get_cf_handle(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            out.push(item?);
        }
        Ok(out)
    }

    pub fn close(&self) {
        *self.is_closed.write() = true;
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), is_closed: self.is_closed.clone() }
    }
}

/// Pending writes, applied atomically by [`Database::write_batch`]
pub struct DbBatch<'a> {
    db: &'a Database,
    batch: WriteBatch,
}

impl DbBatch<'_> {
    pub fn put(&mut self, cf_name: &str, key: &[u8], value: &[u8]) -> DbResult<()> {
        let cf = self.db.get_cf_handle(cf_name)?;
        self.batch.put_cf(cf, key, value);
        Ok(())
    }

    pub fn delete(&mut self, cf_name: &str, key: &[u8]) -> DbResult<()> {
        let cf = self.db.get_cf_handle(cf_name)?;
        self.batch.delete_cf(cf, key);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}
