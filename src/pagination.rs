//! Stateless page cursors
//!
//! A page position travels to and from clients as a token of the form
//! `[PF]<index>S<size>`. `F` marks the canonical first page and `P` any other
//! page; decoding treats both letters alike. The server keeps no cursor state:
//! everything needed to rebuild the [`PageRequest`] is inside the token.
//!
//! When the previous page *is* the first page, the `prev` token is the
//! `first` token verbatim, so a client walking backwards can tell it has hit
//! the start by comparing the two strings.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CrudError;

static PAGE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[PF]\d+S\d+$").unwrap());

/// Records are always paged by identifier, ascending
pub const SORT_KEY: &str = "id";

/// Zero-based page position and size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    index: u32,
    size: u32,
}

impl PageRequest {
    pub fn new(index: u32, size: u32) -> Result<Self, CrudError> {
        if size == 0 {
            return Err(CrudError::InvalidPageSize(0));
        }
        Ok(Self { index, size })
    }

    pub fn first(size: u32) -> Result<Self, CrudError> {
        Self::new(0, size)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn sort_key(&self) -> &'static str {
        SORT_KEY
    }

    /// Number of records preceding this page
    pub fn offset(&self) -> usize {
        self.index as usize * self.size as usize
    }

    /// Lowers the page size to `max`, keeping the index
    pub fn capped(self, max: Option<u32>) -> Self {
        match max {
            Some(max) if max > 0 && self.size > max => Self { size: max, ..self },
            _ => self,
        }
    }
}

/// One page of records plus the flags needed to build its cursors
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub index: u32,
    pub size: u32,
    pub total: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Builds a page from the records of `request` and the total count of
    /// records across all pages.
    pub fn new(content: Vec<T>, request: &PageRequest, total: u64) -> Self {
        let end = request.offset() as u64 + request.size() as u64;
        Self {
            content,
            index: request.index(),
            size: request.size(),
            total,
            has_previous: request.index() > 0,
            has_next: end < total,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            index: self.index,
            size: self.size,
            total: self.total,
            has_previous: self.has_previous,
            has_next: self.has_next,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            content: self.content.into_iter().map(f).collect::<Result<_, _>>()?,
            index: self.index,
            size: self.size,
            total: self.total,
            has_previous: self.has_previous,
            has_next: self.has_next,
        })
    }
}

/// Cursor triple rendered as the `meta` of list responses
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub first: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Derives the `first`/`prev`/`next` tokens of a page
pub fn encode<T>(page: &Page<T>) -> Pagination {
    let first = format!("F0S{}", page.size);

    let prev = page.has_previous.then(|| match page.index.saturating_sub(1) {
        0 => first.clone(),
        index => format!("P{}S{}", index, page.size),
    });

    let next = page
        .has_next
        .then(|| format!("P{}S{}", page.index + 1, page.size));

    Pagination { first, prev, next }
}

/// Rebuilds a page request from a client token
///
/// Absent tokens, or tokens that do not match `[PF]<index>S<size>`, fall back
/// to the first page sized by `size`, or by `default_size` when no explicit
/// size was sent.
///
/// # Errors
///
/// * [`CrudError::InvalidPageSize`] - the effective size is zero or negative
/// * [`CrudError::InvalidCursor`] - a well-formed token carries a number that
///   does not fit a page index or size
pub fn decode(
    token: Option<&str>,
    size: Option<i64>,
    default_size: u32,
) -> Result<PageRequest, CrudError> {
    let Some(token) = token.filter(|t| PAGE_TOKEN.is_match(t)) else {
        let size = size.unwrap_or(i64::from(default_size));
        let size = u32::try_from(size)
            .ok()
            .filter(|s| *s > 0)
            .ok_or(CrudError::InvalidPageSize(size))?;
        return PageRequest::first(size);
    };

    let invalid = || CrudError::InvalidCursor(token.to_string());
    let (index, size) = token[1..].split_once('S').ok_or_else(invalid)?;
    let index = index.parse::<u32>().map_err(|_| invalid())?;
    let size = size.parse::<u32>().map_err(|_| invalid())?;

    PageRequest::new(index, size)
}
