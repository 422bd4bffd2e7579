//! Record identifiers and the per-request identifier chain
//!
//! An [`Identifier`] is anything that can key a record: it parses from a URL
//! path segment, serializes with the record, and encodes to a byte key whose
//! lexicographic order equals the identifier's ascending order. The byte key
//! is what the embedded store sorts on, so pages come out id-ascending.

use std::collections::VecDeque;
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::CrudError;

pub trait Identifier:
    Clone + Eq + Hash + Debug + Display + FromStr + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Name used by the `id-type` configuration key
    const KIND: &'static str;

    /// Order-preserving byte encoding
    fn to_key(&self) -> Vec<u8>;

    /// Fresh identifier for a new record, given the greatest one issued so far
    fn generate(last: Option<&Self>) -> Self;

    /// Parses a path segment, mapping failures to [`CrudError::InvalidIdentifier`]
    fn parse_segment(segment: &str) -> Result<Self, CrudError> {
        segment
            .parse::<Self>()
            .map_err(|_| CrudError::InvalidIdentifier(segment.to_string()))
    }
}

impl Identifier for i64 {
    const KIND: &'static str = "long";

    fn to_key(&self) -> Vec<u8> {
        // flip the sign bit so negatives sort before positives
        ((*self as u64) ^ (1 << 63)).to_be_bytes().to_vec()
    }

    fn generate(last: Option<&Self>) -> Self {
        last.map_or(1, |id| (*id).max(0) + 1)
    }
}

impl Identifier for i32 {
    const KIND: &'static str = "int";

    fn to_key(&self) -> Vec<u8> {
        ((*self as u32) ^ (1 << 31)).to_be_bytes().to_vec()
    }

    fn generate(last: Option<&Self>) -> Self {
        last.map_or(1, |id| (*id).max(0) + 1)
    }
}

impl Identifier for Uuid {
    const KIND: &'static str = "uuid";

    fn to_key(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn generate(_last: Option<&Self>) -> Self {
        uuid::Builder::from_random_bytes(rand::random()).into_uuid()
    }
}

/// Ancestor identifiers of a nested request, outermost first.
///
/// Built from the path segments of one request and consumed front to back by
/// the nested engines, one element per level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdChain<I> {
    ids: VecDeque<I>,
}

impl<I: Identifier> IdChain<I> {
    pub fn empty() -> Self {
        Self {
            ids: VecDeque::new(),
        }
    }

    /// Parses each segment in order
    pub fn parse<S: AsRef<str>>(segments: &[S]) -> Result<Self, CrudError> {
        segments
            .iter()
            .map(|s| I::parse_segment(s.as_ref()))
            .collect::<Result<VecDeque<_>, _>>()
            .map(|ids| Self { ids })
    }

    /// Removes the outermost id; an exhausted chain means the engine stack is
    /// deeper than the request path.
    pub fn pop(&mut self) -> Result<I, CrudError> {
        self.ids.pop_front().ok_or(CrudError::ChainDepth {
            expected: 1,
            actual: 0,
        })
    }

    pub fn peek(&self) -> Option<&I> {
        self.ids.front()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<I> From<Vec<I>> for IdChain<I> {
    fn from(ids: Vec<I>) -> Self {
        Self { ids: ids.into() }
    }
}
