use crate::domain::filter::TransactionFilter;
use crate::domain::ports::TransactionStore;
use crate::domain::transaction::{NewTransaction, Transaction, TransactionId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for ledger entries, keyed by big-endian transaction id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for bookkeeping such as the id sequence.
pub const CF_META: &str = "meta";

const NEXT_ID_KEY: &[u8] = b"next_id";

/// A persistent ledger backed by RocksDB.
///
/// Reads go straight to the database. Writes are serialized through a single
/// async mutex so id allocation and the version compare-and-set are atomic
/// for every clone of this store within the process.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating the column
    /// families on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_transactions = ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default());
        let cf_meta = ColumnFamilyDescriptor::new(CF_META, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_transactions, cf_meta])?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("Column family {name} not found")))
    }

    fn read(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan(&self) -> Result<Vec<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    fn write(&self, batch: &mut WriteBatch, tx: &Transaction) -> Result<()> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        batch.put_cf(cf, tx.id.to_be_bytes(), encode(tx)?);
        Ok(())
    }
}

fn encode(tx: &Transaction) -> Result<Vec<u8>> {
    serde_json::to_vec(tx)
        .map_err(|e| LedgerError::Storage(format!("Serialization error: {e}")))
}

fn decode(bytes: &[u8]) -> Result<Transaction> {
    serde_json::from_slice(bytes)
        .map_err(|e| LedgerError::Storage(format!("Deserialization error: {e}")))
}

#[async_trait]
impl TransactionStore for RocksDBStore {
    async fn insert(&self, draft: NewTransaction) -> Result<Transaction> {
        let _writer = self.writer.lock().await;
        let meta = self.cf(CF_META)?;
        let last = match self.db.get_cf(meta, NEXT_ID_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    LedgerError::Storage("Corrupt id sequence".to_string())
                })?;
                TransactionId::from_be_bytes(raw)
            }
            None => 0,
        };
        let tx = Transaction::open(last + 1, draft, Utc::now());

        let mut batch = WriteBatch::default();
        batch.put_cf(meta, NEXT_ID_KEY, tx.id.to_be_bytes());
        self.write(&mut batch, &tx)?;
        self.db.write(batch)?;
        Ok(tx)
    }

    async fn update(&self, tx: &Transaction) -> Result<Transaction> {
        let _writer = self.writer.lock().await;
        let stored = self
            .read(tx.id)?
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {} not found", tx.id)))?;
        if stored.version != tx.version {
            return Err(LedgerError::Conflict(format!(
                "Transaction {} was modified concurrently (expected version {}, found {})",
                tx.id, tx.version, stored.version
            )));
        }
        let mut next = tx.clone();
        next.version += 1;
        let mut batch = WriteBatch::default();
        self.write(&mut batch, &next)?;
        self.db.write(batch)?;
        Ok(next)
    }

    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>> {
        self.read(id)
    }

    async fn find_by_reference(&self, reference_id: &str) -> Result<Option<Transaction>> {
        Ok(self
            .scan()?
            .into_iter()
            .find(|tx| tx.reference_id.as_deref() == Some(reference_id)))
    }

    async fn exists(&self, id: TransactionId) -> Result<bool> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        Ok(self.db.get_pinned_cf(cf, id.to_be_bytes())?.is_some())
    }

    async fn query(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|tx| filter.matches(tx))
            .collect())
    }

    async fn delete(&self, id: TransactionId) -> Result<bool> {
        let _writer = self.writer.lock().await;
        let existed = self.read(id)?.is_some();
        if existed {
            let cf = self.cf(CF_TRANSACTIONS)?;
            self.db.delete_cf(cf, id.to_be_bytes())?;
        }
        Ok(existed)
    }

    async fn delete_all(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        let ids: Vec<TransactionId> = self.scan()?.into_iter().map(|tx| tx.id).collect();
        let cf = self.cf(CF_TRANSACTIONS)?;
        let mut batch = WriteBatch::default();
        for id in ids {
            batch.delete_cf(cf, id.to_be_bytes());
        }
        self.db.write(batch)?;
        Ok(())
    }
}
