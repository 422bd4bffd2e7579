//! Storage-facing contracts consumed by the engines
//!
//! The engines never touch storage directly. A [`RecordResolver`] serves one
//! entity type; a [`ParentChildResolver`] answers ownership questions for one
//! (parent, child) pair and pages the children of a parent. Levels above the
//! direct parent only need its id-based [`MembershipResolver`] part.
//!
//! Resolvers are expected to be atomic per single-row read or write; the
//! engines add no locking of their own.

use std::sync::Arc;

use crate::error::{CrudError, StoreError};
use crate::model::Record;
use crate::pagination::{Page, PageRequest};

pub trait RecordResolver<E: Record>: Send + Sync {
    fn find_by_id(&self, id: &E::Id) -> Result<Option<E>, StoreError>;

    fn find_page(&self, page: &PageRequest) -> Result<Page<E>, StoreError>;

    fn exists_by_id(&self, id: &E::Id) -> Result<bool, StoreError>;

    /// Persists `record`, assigning an identifier when it has none, and
    /// returns the stored copy.
    fn save(&self, record: E) -> Result<E, StoreError>;

    fn delete_by_id(&self, id: &E::Id) -> Result<(), StoreError>;
}

/// Ownership checks between two adjacent levels, by identifier only
pub trait MembershipResolver<I>: Send + Sync {
    fn exists_parent_and_child(&self, parent_id: &I, child_id: &I) -> Result<bool, StoreError>;

    fn exists_parent(&self, parent_id: &I) -> Result<bool, StoreError>;
}

/// Full contract for a (parent, child) pair where the child is the record
/// type served by the endpoint
pub trait ParentChildResolver<P: Record, E: Record<Id = P::Id>>: MembershipResolver<P::Id> {
    fn attach_parent(&self, parent: &P, child: &mut E);

    fn find_parent_by_id(&self, parent_id: &P::Id) -> Result<Option<P>, StoreError>;

    /// Children of `parent_id` only, id-ascending
    fn find_child_page(&self, parent_id: &P::Id, page: &PageRequest)
        -> Result<Page<E>, StoreError>;
}

impl<E: Record, R: RecordResolver<E> + ?Sized> RecordResolver<E> for Arc<R> {
    fn find_by_id(&self, id: &E::Id) -> Result<Option<E>, StoreError> {
        (**self).find_by_id(id)
    }

    fn find_page(&self, page: &PageRequest) -> Result<Page<E>, StoreError> {
        (**self).find_page(page)
    }

    fn exists_by_id(&self, id: &E::Id) -> Result<bool, StoreError> {
        (**self).exists_by_id(id)
    }

    fn save(&self, record: E) -> Result<E, StoreError> {
        (**self).save(record)
    }

    fn delete_by_id(&self, id: &E::Id) -> Result<(), StoreError> {
        (**self).delete_by_id(id)
    }
}

impl<I, R: MembershipResolver<I> + ?Sized> MembershipResolver<I> for Arc<R> {
    fn exists_parent_and_child(&self, parent_id: &I, child_id: &I) -> Result<bool, StoreError> {
        (**self).exists_parent_and_child(parent_id, child_id)
    }

    fn exists_parent(&self, parent_id: &I) -> Result<bool, StoreError> {
        (**self).exists_parent(parent_id)
    }
}

impl<P, E, R> ParentChildResolver<P, E> for Arc<R>
where
    P: Record,
    E: Record<Id = P::Id>,
    R: ParentChildResolver<P, E> + ?Sized,
{
    fn attach_parent(&self, parent: &P, child: &mut E) {
        (**self).attach_parent(parent, child)
    }

    fn find_parent_by_id(&self, parent_id: &P::Id) -> Result<Option<P>, StoreError> {
        (**self).find_parent_by_id(parent_id)
    }

    fn find_child_page(
        &self,
        parent_id: &P::Id,
        page: &PageRequest,
    ) -> Result<Page<E>, StoreError> {
        (**self).find_child_page(parent_id, page)
    }
}

/// Runs right before every save of a create or update. May adjust the record
/// or reject it.
pub trait BeforeSave<E>: Send + Sync {
    fn execute(&self, record: &mut E) -> Result<(), CrudError>;
}

/// No action
impl<E> BeforeSave<E> for () {
    fn execute(&self, _record: &mut E) -> Result<(), CrudError> {
        Ok(())
    }
}

/// Copies the mutable values of an incoming record onto the persisted one.
/// Implementations must leave the persisted identifier untouched.
pub trait UpdateValuesSetter<E>: Send + Sync {
    fn update(&self, persisted: &mut E, incoming: E);
}

impl<E, F> UpdateValuesSetter<E> for F
where
    F: Fn(&mut E, E) + Send + Sync,
{
    fn update(&self, persisted: &mut E, incoming: E) {
        self(persisted, incoming)
    }
}

/// Replaces every field with the incoming value, except the identifier
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceValues;

impl<E: Record> UpdateValuesSetter<E> for ReplaceValues {
    fn update(&self, persisted: &mut E, incoming: E) {
        let id = persisted.id();
        *persisted = incoming;
        if let Some(id) = id {
            persisted.set_id(id);
        }
    }
}
