//! Embedded redb storage for records
//!
//! Every entity gets its own table, keyed by the identifier's
//! order-preserving byte key, with the record stored as JSON:
//!
//! - Key: `Identifier::to_key()` bytes (e.g. `i64` 42 → 8 big-endian bytes)
//! - Value: `'{"id":42,"name":"chair",...}'`
//!
//! Child entities also get a secondary index table named `{entity}_by_parent`
//! so the records of one parent can be paged with a single range scan.
//!
//! The last identifier handed out for a table is kept in `{entity}_seq`, so an
//! id is never issued twice, even after the record holding it is deleted.

use std::marker::PhantomData;
use std::sync::Arc;

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
    WriteTransaction,
};

use crate::error::StoreError;
use crate::identifier::Identifier;
use crate::model::{BelongsTo, Record};
use crate::pagination::{Page, PageRequest};
use crate::resolver::{MembershipResolver, ParentChildResolver, RecordResolver};

macro_rules! store_error_from {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for StoreError {
                fn from(err: $source) -> Self {
                    StoreError::new(err)
                }
            }
        )*
    };
}

store_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    serde_json::Error,
);

/// Initializes the embedded database
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "data.db")
///
/// # Example
///
/// ```no_run
/// # use nestcrud::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    Ok(Database::create(db_path)?)
}

const SEQUENCE_KEY: &str = "last";

type ParentOf<E> = Box<dyn Fn(&E) -> Option<<E as Record>::Id> + Send + Sync>;

/// [`RecordResolver`] for one entity type backed by a redb table
pub struct RedbRepository<E: Record> {
    db: Arc<Database>,
    table: String,
    index: String,
    sequence: String,
    parent_of: Option<ParentOf<E>>,
    _record: PhantomData<fn() -> E>,
}

impl<E: Record> RedbRepository<E> {
    /// Opens (or creates) the table named after `E::NAME`
    pub fn open(db: Arc<Database>) -> Result<Self, StoreError> {
        let repository = Self {
            db,
            table: E::NAME.to_string(),
            index: format!("{}_by_parent", E::NAME),
            sequence: format!("{}_seq", E::NAME),
            parent_of: None,
            _record: PhantomData,
        };

        let write_txn = repository.db.begin_write()?;
        {
            write_txn.open_table(repository.records())?;
            write_txn.open_table(repository.parent_index())?;
            write_txn.open_table(repository.sequence())?;
        }
        write_txn.commit()?;

        Ok(repository)
    }

    /// Maintains the parent index on every save and delete, enabling
    /// [`RedbRepository::find_by_parent`]
    pub fn indexed_by_parent<P>(mut self) -> Self
    where
        P: Record,
        E: BelongsTo<P>,
    {
        self.parent_of = Some(Box::new(|record: &E| record.parent_id()));
        self
    }

    fn records(&self) -> TableDefinition<'_, &'static [u8], &'static str> {
        TableDefinition::new(&self.table)
    }

    fn parent_index(&self) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
        TableDefinition::new(&self.index)
    }

    fn sequence(&self) -> TableDefinition<'_, &'static str, &'static str> {
        TableDefinition::new(&self.sequence)
    }

    /// Issues the next identifier and records it in the sequence table
    ///
    /// Must run inside the write transaction that stores the record, which
    /// redb serializes, so two creates can never draw the same id.
    fn next_id(
        &self,
        txn: &WriteTransaction,
        table: &Table<'_, &'static [u8], &'static str>,
    ) -> Result<E::Id, StoreError> {
        let mut sequence = txn.open_table(self.sequence())?;

        // Last id ever issued, surviving deletes
        let issued = match sequence.get(SEQUENCE_KEY)? {
            Some(value) => Some(serde_json::from_str::<E::Id>(value.value())?),
            None => None,
        };

        // Greatest id stored, covering records saved with an explicit id
        let stored = match table.last()? {
            Some((_, value)) => serde_json::from_str::<E>(value.value())?.id(),
            None => None,
        };

        let last = match (issued, stored) {
            (Some(issued), Some(stored)) if stored.to_key() > issued.to_key() => Some(stored),
            (issued, stored) => issued.or(stored),
        };
        let id = E::Id::generate(last.as_ref());

        let json = serde_json::to_string(&id)?;
        sequence.insert(SEQUENCE_KEY, json.as_str())?;

        Ok(id)
    }

    /// Composite index key: `len(parent) | parent | child`. The length prefix
    /// keeps variable-width parent keys from sharing a prefix.
    fn index_key(parent: &E::Id, child: &E::Id) -> Vec<u8> {
        let mut key = Self::index_prefix(parent);
        key.extend(child.to_key());
        key
    }

    fn index_prefix(parent: &E::Id) -> Vec<u8> {
        let parent = parent.to_key();
        let mut key = Vec::with_capacity(parent.len() + 2);
        key.extend((parent.len() as u16).to_be_bytes());
        key.extend(parent);
        key
    }

    fn parent_of(&self, record: &E) -> Option<E::Id> {
        self.parent_of.as_ref().and_then(|parent_of| parent_of(record))
    }

    fn unindex(&self, txn: &WriteTransaction, record: &E, id: &E::Id) -> Result<(), StoreError> {
        if let Some(parent) = self.parent_of(record) {
            let mut index = txn.open_table(self.parent_index())?;
            index.remove(Self::index_key(&parent, id).as_slice())?;
        }
        Ok(())
    }

    /// Page of the records whose parent is `parent`, id-ascending
    pub fn find_by_parent(
        &self,
        parent: &E::Id,
        request: &PageRequest,
    ) -> Result<Page<E>, StoreError> {
        let prefix = Self::index_prefix(parent);

        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(self.parent_index())?;
        let table = read_txn.open_table(self.records())?;

        // the composite key sorts children of one parent by their own key
        let mut keys = Vec::new();
        for entry in index.range(prefix.as_slice()..)? {
            let (key, child) = entry?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            keys.push(child.value().to_vec());
        }

        let total = keys.len() as u64;
        let mut content = Vec::new();
        for key in keys.iter().skip(request.offset()).take(request.size() as usize) {
            if let Some(value) = table.get(key.as_slice())? {
                content.push(serde_json::from_str::<E>(value.value())?);
            }
        }

        Ok(Page::new(content, request, total))
    }

    /// Whether `child` is indexed under `parent`
    pub fn is_child_of(&self, parent: &E::Id, child: &E::Id) -> Result<bool, StoreError> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(self.parent_index())?;

        Ok(index.get(Self::index_key(parent, child).as_slice())?.is_some())
    }
}

impl<E: Record> RecordResolver<E> for RedbRepository<E> {
    fn find_by_id(&self, id: &E::Id) -> Result<Option<E>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(self.records())?;

        match table.get(id.to_key().as_slice())? {
            Some(value) => Ok(Some(serde_json::from_str(value.value())?)),
            None => Ok(None),
        }
    }

    fn find_page(&self, request: &PageRequest) -> Result<Page<E>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(self.records())?;

        let total = table.len()?;
        let mut content = Vec::new();
        for entry in table
            .iter()?
            .skip(request.offset())
            .take(request.size() as usize)
        {
            let (_, value) = entry?;
            content.push(serde_json::from_str::<E>(value.value())?);
        }

        Ok(Page::new(content, request, total))
    }

    fn exists_by_id(&self, id: &E::Id) -> Result<bool, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(self.records())?;

        Ok(table.get(id.to_key().as_slice())?.is_some())
    }

    fn save(&self, mut record: E) -> Result<E, StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(self.records())?;

            // Keep the caller's id, or draw a fresh one from the sequence
            let id = match record.id() {
                Some(id) => id,
                None => self.next_id(&write_txn, &table)?,
            };
            record.set_id(id.clone());

            // Drop the index entry of the stored copy; its parent may have changed
            let key = id.to_key();
            let previous = match table.get(key.as_slice())? {
                Some(value) => Some(serde_json::from_str::<E>(value.value())?),
                None => None,
            };
            if let Some(previous) = &previous {
                self.unindex(&write_txn, previous, &id)?;
            }

            // Write the record as JSON
            let json = serde_json::to_string(&record)?;
            table.insert(key.as_slice(), json.as_str())?;

            // Index it under its current parent
            if let Some(parent) = self.parent_of(&record) {
                let mut index = write_txn.open_table(self.parent_index())?;
                index.insert(Self::index_key(&parent, &id).as_slice(), key.as_slice())?;
            }
        }
        write_txn.commit()?;

        Ok(record)
    }

    fn delete_by_id(&self, id: &E::Id) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            // Remove the row, keeping the old value to find its index entry
            let mut table = write_txn.open_table(self.records())?;
            let removed = match table.remove(id.to_key().as_slice())? {
                Some(value) => Some(serde_json::from_str::<E>(value.value())?),
                None => None,
            };

            // Remove the parent index entry in the same transaction
            if let Some(record) = &removed {
                self.unindex(&write_txn, record, id)?;
            }
        }
        write_txn.commit()?;

        Ok(())
    }
}

/// [`ParentChildResolver`] over the parent's repository and the child's
/// parent index
pub struct RedbParentChildResolver<P: Record, E: Record> {
    parents: Arc<RedbRepository<P>>,
    children: Arc<RedbRepository<E>>,
}

impl<P, E> RedbParentChildResolver<P, E>
where
    P: Record,
    E: BelongsTo<P>,
{
    /// `children` must have been opened with
    /// [`RedbRepository::indexed_by_parent`]
    pub fn new(parents: Arc<RedbRepository<P>>, children: Arc<RedbRepository<E>>) -> Self {
        Self { parents, children }
    }
}

impl<P, E> MembershipResolver<P::Id> for RedbParentChildResolver<P, E>
where
    P: Record,
    E: BelongsTo<P>,
{
    fn exists_parent_and_child(
        &self,
        parent_id: &P::Id,
        child_id: &P::Id,
    ) -> Result<bool, StoreError> {
        // children are not removed with their parent; an index entry alone
        // does not prove ownership
        if !self.parents.exists_by_id(parent_id)? {
            return Ok(false);
        }
        self.children.is_child_of(parent_id, child_id)
    }

    fn exists_parent(&self, parent_id: &P::Id) -> Result<bool, StoreError> {
        self.parents.exists_by_id(parent_id)
    }
}

impl<P, E> ParentChildResolver<P, E> for RedbParentChildResolver<P, E>
where
    P: Record,
    E: BelongsTo<P>,
{
    fn attach_parent(&self, parent: &P, child: &mut E) {
        child.attach_parent(parent);
    }

    fn find_parent_by_id(&self, parent_id: &P::Id) -> Result<Option<P>, StoreError> {
        self.parents.find_by_id(parent_id)
    }

    fn find_child_page(
        &self,
        parent_id: &P::Id,
        page: &PageRequest,
    ) -> Result<Page<E>, StoreError> {
        self.children.find_by_parent(parent_id, page)
    }
}
