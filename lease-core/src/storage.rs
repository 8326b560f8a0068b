//! Storage layer using RocksDB.
//!
//! # Column Families
//!
//! - `leases` — lease rows (key: lease_id)
//! - `payment_schedule` — installment rows (key: payment_id)
//! - `schedule_by_lease` — secondary index (key: lease_id || installment_number BE)
//! - `ledger_by_seq` — the append-only ledger (key: sequence_number BE)
//! - `ledger_by_lease` — secondary index (key: lease_id || sequence_number BE)
//! - `ledger_by_type` — secondary index (key: event_type || sequence_number BE)
//! - `idempotency_keys` — cached idempotent responses (key: idempotency key)
//! - `scheduled_retries` — durable deferred-dispatch queue (key: fire_at_nanos BE || payment_id)

use crate::{
    error::{Error, Result},
    types::{EventType, IdempotencyKey, LedgerEntry, Lease, PaymentSchedule},
    Config,
};
use parking_lot::Mutex;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::sync::Arc;
use uuid::Uuid;

const CF_LEASES: &str = "leases";
const CF_SCHEDULE: &str = "payment_schedule";
const CF_SCHEDULE_BY_LEASE: &str = "schedule_by_lease";
const CF_LEDGER_BY_SEQ: &str = "ledger_by_seq";
const CF_LEDGER_BY_LEASE: &str = "ledger_by_lease";
const CF_LEDGER_BY_TYPE: &str = "ledger_by_type";
const CF_IDEMPOTENCY: &str = "idempotency_keys";
const CF_SCHEDULED_RETRIES: &str = "scheduled_retries";

/// Storage wrapper for RocksDB.
pub struct Storage {
    db: Arc<DB>,
    /// Next sequence number to assign on append. RocksDB column families
    /// give us no autoincrement, so the counter lives in-process, seeded
    /// from the last key in `ledger_by_seq` at open time.
    next_seq: Mutex<u64>,
}

impl Storage {
    /// Open or create the database.
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );
        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_LEASES, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_SCHEDULE, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_SCHEDULE_BY_LEASE, Self::cf_options_index()),
            ColumnFamilyDescriptor::new(CF_LEDGER_BY_SEQ, Self::cf_options_ledger()),
            ColumnFamilyDescriptor::new(CF_LEDGER_BY_LEASE, Self::cf_options_index()),
            ColumnFamilyDescriptor::new(CF_LEDGER_BY_TYPE, Self::cf_options_index()),
            ColumnFamilyDescriptor::new(CF_IDEMPOTENCY, Self::cf_options_hot()),
            ColumnFamilyDescriptor::new(CF_SCHEDULED_RETRIES, Self::cf_options_index()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let next_seq = {
            let cf = db
                .cf_handle(CF_LEDGER_BY_SEQ)
                .ok_or_else(|| Error::Storage(format!("column family {} not found", CF_LEDGER_BY_SEQ)))?;
            let mut iter = db.iterator_cf(cf, IteratorMode::End);
            match iter.next() {
                Some(Ok((key, _))) => {
                    let bytes: [u8; 8] = key
                        .as_ref()
                        .try_into()
                        .map_err(|_| Error::Storage("corrupt ledger sequence key".to_string()))?;
                    u64::from_be_bytes(bytes) + 1
                }
                _ => 0,
            }
        };

        tracing::info!(data_dir = ?path, next_seq, "opened RocksDB");

        Ok(Self {
            db: Arc::new(db),
            next_seq: Mutex::new(next_seq),
        })
    }

    fn cf_options_hot() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_ledger() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_index() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("column family {} not found", name)))
    }

    // -- leases --

    pub fn put_lease(&self, lease: &Lease) -> Result<()> {
        let cf = self.cf_handle(CF_LEASES)?;
        self.db
            .put_cf(cf, lease.id.as_bytes(), bincode::serialize(lease)?)?;
        Ok(())
    }

    pub fn get_lease(&self, lease_id: Uuid) -> Result<Lease> {
        let cf = self.cf_handle(CF_LEASES)?;
        let value = self
            .db
            .get_cf(cf, lease_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("lease {}", lease_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    // -- payment schedule --

    pub fn put_payment_schedule(&self, payment: &PaymentSchedule) -> Result<()> {
        let mut batch = WriteBatch::default();
        let cf = self.cf_handle(CF_SCHEDULE)?;
        batch.put_cf(cf, payment.id.as_bytes(), bincode::serialize(payment)?);

        let cf_idx = self.cf_handle(CF_SCHEDULE_BY_LEASE)?;
        let idx_key = Self::schedule_index_key(payment.lease_id, payment.installment_number);
        batch.put_cf(cf_idx, idx_key, payment.id.as_bytes());

        self.db.write(batch)?;
        Ok(())
    }

    pub fn get_payment_schedule(&self, payment_id: Uuid) -> Result<PaymentSchedule> {
        let cf = self.cf_handle(CF_SCHEDULE)?;
        let value = self
            .db
            .get_cf(cf, payment_id.as_bytes())?
            .ok_or_else(|| Error::NotFound(format!("payment {}", payment_id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// All installments for a lease, ordered by installment number.
    pub fn get_schedule_for_lease(&self, lease_id: Uuid) -> Result<Vec<PaymentSchedule>> {
        let cf_idx = self.cf_handle(CF_SCHEDULE_BY_LEASE)?;
        let prefix = lease_id.as_bytes().to_vec();
        let iter = self.db.prefix_iterator_cf(cf_idx, &prefix);

        let mut out = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let payment_id = Uuid::from_slice(&value)
                .map_err(|e| Error::Storage(format!("corrupt schedule index value: {}", e)))?;
            out.push(self.get_payment_schedule(payment_id)?);
        }
        out.sort_by_key(|p| p.installment_number);
        Ok(out)
    }

    fn schedule_index_key(lease_id: Uuid, installment_number: u32) -> Vec<u8> {
        let mut key = lease_id.as_bytes().to_vec();
        key.extend_from_slice(&installment_number.to_be_bytes());
        key
    }

    // -- ledger --

    /// Reserve the next sequence number. Callers hold the per-lease lock
    /// (see `lock.rs`), so this only needs to be atomic with respect to
    /// concurrent appends across *different* leases.
    pub fn next_sequence_number(&self) -> u64 {
        let mut guard = self.next_seq.lock();
        let seq = *guard;
        *guard += 1;
        seq
    }

    /// Append a ledger entry. Append-only: there is no corresponding
    /// update or delete method (see `ImmutableLedgerError` in `error.rs`).
    pub fn append_ledger_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_seq = self.cf_handle(CF_LEDGER_BY_SEQ)?;
        let seq_key = entry.sequence_number.to_be_bytes();
        batch.put_cf(cf_seq, seq_key, bincode::serialize(entry)?);

        let cf_lease = self.cf_handle(CF_LEDGER_BY_LEASE)?;
        let mut lease_key = entry.lease_id.as_bytes().to_vec();
        lease_key.extend_from_slice(&seq_key);
        batch.put_cf(cf_lease, lease_key, []);

        let cf_type = self.cf_handle(CF_LEDGER_BY_TYPE)?;
        let mut type_key = vec![entry.event_type as u8];
        type_key.extend_from_slice(&seq_key);
        batch.put_cf(cf_type, type_key, []);

        self.db.write(batch)?;

        tracing::debug!(
            seq = entry.sequence_number,
            lease_id = %entry.lease_id,
            event_type = ?entry.event_type,
            "ledger entry appended"
        );

        Ok(())
    }

    pub fn get_ledger_entry(&self, sequence_number: u64) -> Result<LedgerEntry> {
        let cf = self.cf_handle(CF_LEDGER_BY_SEQ)?;
        let value = self
            .db
            .get_cf(cf, sequence_number.to_be_bytes())?
            .ok_or_else(|| Error::NotFound(format!("ledger entry {}", sequence_number)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Full history for a lease, in sequence order.
    pub fn get_lease_history(&self, lease_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let cf_idx = self.cf_handle(CF_LEDGER_BY_LEASE)?;
        let prefix = lease_id.as_bytes().to_vec();
        let iter = self.db.prefix_iterator_cf(cf_idx, &prefix);

        let mut out = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let seq_bytes: [u8; 8] = key[16..24]
                .try_into()
                .map_err(|_| Error::Storage("corrupt ledger-by-lease key".to_string()))?;
            out.push(self.get_ledger_entry(u64::from_be_bytes(seq_bytes))?);
        }
        out.sort_by_key(|e| e.sequence_number);
        Ok(out)
    }

    /// All entries of a given event type, across all leases, in sequence order.
    pub fn get_ledger_entries_by_type(&self, event_type: EventType) -> Result<Vec<LedgerEntry>> {
        let cf_idx = self.cf_handle(CF_LEDGER_BY_TYPE)?;
        let prefix = vec![event_type as u8];
        let iter = self.db.prefix_iterator_cf(cf_idx, &prefix);

        let mut out = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let seq_bytes: [u8; 8] = key[1..9]
                .try_into()
                .map_err(|_| Error::Storage("corrupt ledger-by-type key".to_string()))?;
            out.push(self.get_ledger_entry(u64::from_be_bytes(seq_bytes))?);
        }
        out.sort_by_key(|e| e.sequence_number);
        Ok(out)
    }

    /// Every entry ever appended, in sequence order. Intended for tests
    /// and offline tooling, not hot paths.
    pub fn get_all_ledger_entries(&self) -> Result<Vec<LedgerEntry>> {
        let cf = self.cf_handle(CF_LEDGER_BY_SEQ)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);
        let mut out = Vec::new();
        for item in iter {
            let (_, value) = item?;
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }

    // -- idempotency keys --

    pub fn put_idempotency_key(&self, entry: &IdempotencyKey) -> Result<()> {
        let cf = self.cf_handle(CF_IDEMPOTENCY)?;
        self.db
            .put_cf(cf, entry.key.as_bytes(), bincode::serialize(entry)?)?;
        Ok(())
    }

    pub fn get_idempotency_key(&self, key: &str) -> Result<Option<IdempotencyKey>> {
        let cf = self.cf_handle(CF_IDEMPOTENCY)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    pub fn delete_idempotency_key(&self, key: &str) -> Result<()> {
        let cf = self.cf_handle(CF_IDEMPOTENCY)?;
        self.db.delete_cf(cf, key.as_bytes())?;
        Ok(())
    }

    /// Scan every idempotency key. Used by the GC sweep; not meant for
    /// hot-path lookups.
    pub fn scan_idempotency_keys(&self) -> Result<Vec<IdempotencyKey>> {
        let cf = self.cf_handle(CF_IDEMPOTENCY)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);
        let mut out = Vec::new();
        for item in iter {
            let (_, value) = item?;
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }

    // -- scheduled retries (durable deferred-dispatch queue) --

    pub fn put_scheduled_retry(&self, fire_at_nanos: i64, payment_id: Uuid) -> Result<()> {
        let cf = self.cf_handle(CF_SCHEDULED_RETRIES)?;
        let key = Self::retry_key(fire_at_nanos, payment_id);
        self.db.put_cf(cf, key, [])?;
        Ok(())
    }

    pub fn remove_scheduled_retry(&self, fire_at_nanos: i64, payment_id: Uuid) -> Result<()> {
        let cf = self.cf_handle(CF_SCHEDULED_RETRIES)?;
        let key = Self::retry_key(fire_at_nanos, payment_id);
        self.db.delete_cf(cf, key)?;
        Ok(())
    }

    /// All retries due at or before `now_nanos`, in fire order.
    pub fn due_scheduled_retries(&self, now_nanos: i64) -> Result<Vec<(i64, Uuid)>> {
        let cf = self.cf_handle(CF_SCHEDULED_RETRIES)?;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);
        let mut out = Vec::new();
        for item in iter {
            let (key, _) = item?;
            let fire_at = i64::from_be_bytes(
                key[0..8]
                    .try_into()
                    .map_err(|_| Error::Storage("corrupt scheduled-retry key".to_string()))?,
            );
            if fire_at > now_nanos {
                break;
            }
            let payment_id = Uuid::from_slice(&key[8..24])
                .map_err(|e| Error::Storage(format!("corrupt scheduled-retry key: {}", e)))?;
            out.push((fire_at, payment_id));
        }
        Ok(out)
    }

    fn retry_key(fire_at_nanos: i64, payment_id: Uuid) -> Vec<u8> {
        let mut key = fire_at_nanos.to_be_bytes().to_vec();
        key.extend_from_slice(payment_id.as_bytes());
        key
    }

    // -- stats --

    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            total_ledger_entries: self.approximate_count(CF_LEDGER_BY_SEQ)?,
            total_leases: self.approximate_count(CF_LEASES)?,
            total_payments: self.approximate_count(CF_SCHEDULE)?,
        })
    }

    fn approximate_count(&self, cf_name: &str) -> Result<u64> {
        let cf = self.cf_handle(cf_name)?;
        Ok(self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0))
    }

    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

/// Storage statistics.
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_ledger_entries: u64,
    pub total_leases: u64,
    pub total_payments: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LeaseStatus, PaymentStatus};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    fn test_lease() -> Lease {
        Lease {
            id: Uuid::now_v7(),
            customer_id: Uuid::now_v7(),
            status: LeaseStatus::Pending,
            principal_amount: Decimal::new(1_200_000, 2),
            term_months: 12,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn open_creates_all_column_families() {
        let (config, _tmp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_LEASES).is_some());
        assert!(storage.db.cf_handle(CF_LEDGER_BY_SEQ).is_some());
        assert!(storage.db.cf_handle(CF_SCHEDULED_RETRIES).is_some());
    }

    #[test]
    fn put_and_get_lease_roundtrips() {
        let (config, _tmp) = test_config();
        let storage = Storage::open(&config).unwrap();
        let lease = test_lease();
        storage.put_lease(&lease).unwrap();
        let fetched = storage.get_lease(lease.id).unwrap();
        assert_eq!(fetched, lease);
    }

    #[test]
    fn ledger_append_assigns_increasing_sequence_numbers() {
        let (config, _tmp) = test_config();
        let storage = Storage::open(&config).unwrap();
        let lease_id = Uuid::now_v7();

        for _ in 0..5 {
            let seq = storage.next_sequence_number();
            let entry = LedgerEntry {
                sequence_number: seq,
                lease_id,
                event_type: EventType::PaymentAttempted,
                payload: serde_json::json!({}),
                amount: None,
                timestamp: Utc::now(),
            };
            storage.append_ledger_entry(&entry).unwrap();
        }

        let history = storage.get_lease_history(lease_id).unwrap();
        assert_eq!(history.len(), 5);
        for (i, entry) in history.iter().enumerate() {
            assert_eq!(entry.sequence_number, i as u64);
        }
    }

    #[test]
    fn schedule_index_orders_by_installment_number() {
        let (config, _tmp) = test_config();
        let storage = Storage::open(&config).unwrap();
        let lease_id = Uuid::now_v7();

        for n in (1..=3u32).rev() {
            let payment = PaymentSchedule {
                id: Uuid::now_v7(),
                lease_id,
                installment_number: n,
                due_date: Utc::now(),
                amount: Decimal::new(10000, 2),
                status: PaymentStatus::Pending,
                retry_count: 0,
                last_attempt_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            storage.put_payment_schedule(&payment).unwrap();
        }

        let schedule = storage.get_schedule_for_lease(lease_id).unwrap();
        let numbers: Vec<u32> = schedule.iter().map(|p| p.installment_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn scheduled_retries_are_returned_in_fire_order_and_only_when_due() {
        let (config, _tmp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let p1 = Uuid::now_v7();
        let p2 = Uuid::now_v7();
        storage.put_scheduled_retry(200, p1).unwrap();
        storage.put_scheduled_retry(100, p2).unwrap();

        let due = storage.due_scheduled_retries(150).unwrap();
        assert_eq!(due, vec![(100, p2)]);

        let due = storage.due_scheduled_retries(200).unwrap();
        assert_eq!(due, vec![(100, p2), (200, p1)]);
    }
}
