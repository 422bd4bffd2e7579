//! CRUD engines
//!
//! [`SimpleCrudService`] runs create/get/update/delete/list against a single
//! [`RecordResolver`]. The nested layers wrap any other engine and add one
//! ancestor level each: a layer pops one id off the [`IdChain`], checks that
//! the next hop is owned by it, and only then hands the rest of the chain to
//! the engine it wraps.
//!
//! [`NestedCrudService`] is the layer for the direct parent of the served
//! record, backed by a [`ParentChildResolver`]: when the chain runs out at that layer it attaches the parent on
//! create and pages through the parent's children on list. Levels further up
//! are [`AncestorCrudService`] layers, which only check their hop.
//!
//! A `/products/{p}/details/{d}/languages` endpoint is therefore built as
//!
//! ```text
//! AncestorCrudService                           pops p, checks (p, d)
//!   NestedCrudService<ProductDetail, Language>  pops d, checks (d, target)
//!     SimpleCrudService<Language>               runs the operation
//! ```
//!
//! Engines hold no per-request state and can be shared across threads.

use std::marker::PhantomData;

use crate::error::CrudError;
use crate::identifier::IdChain;
use crate::model::Record;
use crate::pagination::{Page, PageRequest};
use crate::resolver::{
    BeforeSave, MembershipResolver, ParentChildResolver, RecordResolver, UpdateValuesSetter,
};

type Id<S> = <<S as CrudService>::Record as Record>::Id;

/// Chain-aware CRUD contract shared by every engine layer
pub trait CrudService: Send + Sync {
    type Record: Record;

    /// Number of ancestor ids this engine consumes from a chain
    fn depth(&self) -> usize;

    fn create(
        &self,
        chain: &mut IdChain<Id<Self>>,
        record: Self::Record,
    ) -> Result<Self::Record, CrudError>;

    fn get(&self, chain: &mut IdChain<Id<Self>>, id: Id<Self>) -> Result<Self::Record, CrudError>;

    fn update(
        &self,
        chain: &mut IdChain<Id<Self>>,
        id: Id<Self>,
        record: Self::Record,
    ) -> Result<Self::Record, CrudError>;

    fn delete_by_id(&self, chain: &mut IdChain<Id<Self>>, id: Id<Self>) -> Result<(), CrudError>;

    fn list(
        &self,
        chain: &mut IdChain<Id<Self>>,
        page: &PageRequest,
    ) -> Result<Page<Self::Record>, CrudError>;
}

/// Single-level engine over one [`RecordResolver`]
pub struct SimpleCrudService<E, R, B = (), U = crate::resolver::ReplaceValues> {
    repository: R,
    before_save: B,
    update_setter: U,
    _record: PhantomData<fn() -> E>,
}

impl<E, R> SimpleCrudService<E, R>
where
    E: Record,
    R: RecordResolver<E>,
{
    /// Engine with no before-save action that replaces every non-id field on
    /// update
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            before_save: (),
            update_setter: crate::resolver::ReplaceValues,
            _record: PhantomData,
        }
    }
}

impl<E, R, B, U> SimpleCrudService<E, R, B, U>
where
    E: Record,
    R: RecordResolver<E>,
    B: BeforeSave<E>,
    U: UpdateValuesSetter<E>,
{
    pub fn with_before_save<B2: BeforeSave<E>>(
        self,
        before_save: B2,
    ) -> SimpleCrudService<E, R, B2, U> {
        SimpleCrudService {
            repository: self.repository,
            before_save,
            update_setter: self.update_setter,
            _record: PhantomData,
        }
    }

    pub fn with_update_setter<U2: UpdateValuesSetter<E>>(
        self,
        update_setter: U2,
    ) -> SimpleCrudService<E, R, B, U2> {
        SimpleCrudService {
            repository: self.repository,
            before_save: self.before_save,
            update_setter,
            _record: PhantomData,
        }
    }

    /// Runs the before-save hook, persists, then re-reads the canonical copy
    fn save(&self, mut record: E) -> Result<E, CrudError> {
        self.before_save.execute(&mut record)?;
        let saved = self.repository.save(record)?;
        let id = saved.id().ok_or(CrudError::NotFound { id: None })?;

        self.repository
            .find_by_id(&id)?
            .ok_or_else(|| CrudError::not_found(&id))
    }

    fn fail_if_nested(chain: &IdChain<E::Id>) -> Result<(), CrudError> {
        if chain.is_empty() {
            Ok(())
        } else {
            tracing::error!(
                entity = E::NAME,
                remaining = chain.len(),
                "single level engine reached with a non-empty chain"
            );
            Err(CrudError::ChainDepth {
                expected: 0,
                actual: chain.len(),
            })
        }
    }
}

impl<E, R, B, U> CrudService for SimpleCrudService<E, R, B, U>
where
    E: Record,
    R: RecordResolver<E>,
    B: BeforeSave<E>,
    U: UpdateValuesSetter<E>,
{
    type Record = E;

    fn depth(&self) -> usize {
        0
    }

    fn create(&self, chain: &mut IdChain<E::Id>, record: E) -> Result<E, CrudError> {
        Self::fail_if_nested(chain)?;

        if record.id().is_some() {
            return Err(CrudError::IdentifierAlreadySet);
        }

        self.save(record)
    }

    fn get(&self, chain: &mut IdChain<E::Id>, id: E::Id) -> Result<E, CrudError> {
        Self::fail_if_nested(chain)?;

        self.repository
            .find_by_id(&id)?
            .ok_or_else(|| CrudError::not_found(&id))
    }

    fn update(&self, chain: &mut IdChain<E::Id>, id: E::Id, record: E) -> Result<E, CrudError> {
        Self::fail_if_nested(chain)?;
        check_update_id(&id, &record)?;

        let mut persisted = self
            .repository
            .find_by_id(&id)?
            .ok_or_else(|| CrudError::not_found(&id))?;

        self.update_setter.update(&mut persisted, record);
        persisted.set_id(id);

        self.save(persisted)
    }

    fn delete_by_id(&self, chain: &mut IdChain<E::Id>, id: E::Id) -> Result<(), CrudError> {
        Self::fail_if_nested(chain)?;

        if !self.repository.exists_by_id(&id)? {
            return Err(CrudError::not_found(&id));
        }

        Ok(self.repository.delete_by_id(&id)?)
    }

    fn list(&self, chain: &mut IdChain<E::Id>, page: &PageRequest) -> Result<Page<E>, CrudError> {
        Self::fail_if_nested(chain)?;

        Ok(self.repository.find_page(page)?)
    }
}

/// Rejects an update whose body carries an id different from the path id
fn check_update_id<E: Record>(id: &E::Id, record: &E) -> Result<(), CrudError> {
    match record.id() {
        Some(body) if &body != id => Err(CrudError::IdentifierConflict {
            path: id.to_string(),
            body: body.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Direct-parent level wrapped around an inner engine
pub struct NestedCrudService<P, S, R> {
    inner: S,
    resolver: R,
    _parent: PhantomData<fn() -> P>,
}

impl<P, S, R> NestedCrudService<P, S, R>
where
    P: Record,
    S: CrudService,
    S::Record: Record<Id = P::Id>,
    R: ParentChildResolver<P, S::Record>,
{
    pub fn new(resolver: R, inner: S) -> Self {
        Self {
            inner,
            resolver,
            _parent: PhantomData,
        }
    }

    /// Fails unless `child_id` is owned by `parent_id`
    fn check_membership(&self, parent_id: &P::Id, child_id: &P::Id) -> Result<(), CrudError> {
        if self.resolver.exists_parent_and_child(parent_id, child_id)? {
            return Ok(());
        }

        tracing::debug!(
            parent = P::NAME,
            %parent_id,
            %child_id,
            "relationship not found"
        );
        Err(CrudError::RelationshipNotFound)
    }

    /// Child id checked against the popped parent: the target once the chain
    /// is exhausted, the next ancestor otherwise
    fn next_hop<'a>(chain: &'a IdChain<P::Id>, target: &'a P::Id) -> &'a P::Id {
        chain.peek().unwrap_or(target)
    }
}

impl<P, S, R> CrudService for NestedCrudService<P, S, R>
where
    P: Record,
    S: CrudService,
    S::Record: Record<Id = P::Id>,
    R: ParentChildResolver<P, S::Record>,
{
    type Record = S::Record;

    fn depth(&self) -> usize {
        self.inner.depth() + 1
    }

    fn create(
        &self,
        chain: &mut IdChain<P::Id>,
        mut record: S::Record,
    ) -> Result<S::Record, CrudError> {
        let parent_id = chain.pop()?;

        match chain.peek() {
            None => {
                let parent = self
                    .resolver
                    .find_parent_by_id(&parent_id)?
                    .ok_or_else(|| CrudError::not_found(&parent_id))?;
                self.resolver.attach_parent(&parent, &mut record);
            }
            Some(next) => self.check_membership(&parent_id, next)?,
        }

        self.inner.create(chain, record)
    }

    fn get(&self, chain: &mut IdChain<P::Id>, id: P::Id) -> Result<S::Record, CrudError> {
        let parent_id = chain.pop()?;
        self.check_membership(&parent_id, Self::next_hop(chain, &id))?;

        self.inner.get(chain, id)
    }

    fn update(
        &self,
        chain: &mut IdChain<P::Id>,
        id: P::Id,
        record: S::Record,
    ) -> Result<S::Record, CrudError> {
        check_update_id(&id, &record)?;

        let parent_id = chain.pop()?;
        self.check_membership(&parent_id, Self::next_hop(chain, &id))?;

        self.inner.update(chain, id, record)
    }

    fn delete_by_id(&self, chain: &mut IdChain<P::Id>, id: P::Id) -> Result<(), CrudError> {
        let parent_id = chain.pop()?;
        self.check_membership(&parent_id, Self::next_hop(chain, &id))?;

        self.inner.delete_by_id(chain, id)
    }

    fn list(
        &self,
        chain: &mut IdChain<P::Id>,
        page: &PageRequest,
    ) -> Result<Page<S::Record>, CrudError> {
        let parent_id = chain.pop()?;

        match chain.peek() {
            None => {
                if !self.resolver.exists_parent(&parent_id)? {
                    return Err(CrudError::not_found(&parent_id));
                }
                Ok(self.resolver.find_child_page(&parent_id, page)?)
            }
            Some(next) => {
                self.check_membership(&parent_id, next)?;
                self.inner.list(chain, page)
            }
        }
    }
}

/// Ancestor level above the direct parent
///
/// The chain must still hold the next ancestor once this layer has popped its
/// own id; the hop between the two is checked through `resolver`.
pub struct AncestorCrudService<S, M> {
    inner: S,
    resolver: M,
}

impl<S, M> AncestorCrudService<S, M>
where
    S: CrudService,
    M: MembershipResolver<Id<S>>,
{
    pub fn new(resolver: M, inner: S) -> Self {
        Self { inner, resolver }
    }

    /// Pops this level's id and checks it owns the next ancestor
    fn hop(&self, chain: &mut IdChain<Id<S>>) -> Result<(), CrudError> {
        let parent_id = chain.pop()?;
        let Some(child_id) = chain.peek() else {
            return Err(CrudError::ChainDepth {
                expected: self.depth(),
                actual: 1,
            });
        };

        if self.resolver.exists_parent_and_child(&parent_id, child_id)? {
            return Ok(());
        }

        tracing::debug!(%parent_id, %child_id, "relationship not found");
        Err(CrudError::RelationshipNotFound)
    }
}

impl<S, M> CrudService for AncestorCrudService<S, M>
where
    S: CrudService,
    M: MembershipResolver<Id<S>>,
{
    type Record = S::Record;

    fn depth(&self) -> usize {
        self.inner.depth() + 1
    }

    fn create(
        &self,
        chain: &mut IdChain<Id<S>>,
        record: S::Record,
    ) -> Result<S::Record, CrudError> {
        self.hop(chain)?;
        self.inner.create(chain, record)
    }

    fn get(&self, chain: &mut IdChain<Id<S>>, id: Id<S>) -> Result<S::Record, CrudError> {
        self.hop(chain)?;
        self.inner.get(chain, id)
    }

    fn update(
        &self,
        chain: &mut IdChain<Id<S>>,
        id: Id<S>,
        record: S::Record,
    ) -> Result<S::Record, CrudError> {
        check_update_id(&id, &record)?;

        self.hop(chain)?;
        self.inner.update(chain, id, record)
    }

    fn delete_by_id(&self, chain: &mut IdChain<Id<S>>, id: Id<S>) -> Result<(), CrudError> {
        self.hop(chain)?;
        self.inner.delete_by_id(chain, id)
    }

    fn list(
        &self,
        chain: &mut IdChain<Id<S>>,
        page: &PageRequest,
    ) -> Result<Page<S::Record>, CrudError> {
        self.hop(chain)?;
        self.inner.list(chain, page)
    }
}
