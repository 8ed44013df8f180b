//! Paging direction resolution

use crate::{ConnectionError, Result};

/// Direction a page is scanned in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingType {
    Forward,
    Backward,
}

impl PagingType {
    pub fn is_forward(self) -> bool {
        matches!(self, Self::Forward)
    }
}

/// Relay paging arguments
///
/// Follows the Relay Cursor Connections Specification:
/// https://relay.dev/graphql/connections.htm
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagingArgs {
    /// Number of items to return (forward pagination)
    pub first: Option<i32>,

    /// Cursor to start from (forward pagination)
    pub after: Option<String>,

    /// Number of items to return (backward pagination)
    pub last: Option<i32>,

    /// Cursor to start from (backward pagination)
    pub before: Option<String>,
}

impl PagingArgs {
    /// Resolve the paging direction
    ///
    /// `first` with `last` and `after` with `before` are rejected. A count
    /// paired with the opposite cursor (`first` + `before`, `last` + `after`)
    /// pages in the direction of the count and uses the cursor as a bound.
    pub fn paging_type(&self) -> Result<PagingType> {
        let is_forward = self.first.is_some() || self.after.is_some();
        let is_backward = self.last.is_some() || self.before.is_some();

        if is_forward && is_backward {
            if self.first.is_some() && self.last.is_some() {
                return Err(ConnectionError::InvalidPaging(
                    "Cannot paginate forwards and backwards: specify either 'first' or 'last'"
                        .to_string(),
                ));
            }
            if self.after.is_some() && self.before.is_some() {
                return Err(ConnectionError::InvalidPaging(
                    "Cannot combine 'after' and 'before': use 'first' with 'after' or 'last' with 'before'"
                        .to_string(),
                ));
            }
            return Ok(if self.first.is_some() {
                PagingType::Forward
            } else {
                PagingType::Backward
            });
        }

        Ok(if is_backward {
            PagingType::Backward
        } else {
            PagingType::Forward
        })
    }

    /// Validate counts and resolve the direction
    pub fn validate(&self, max_page_size: Option<u32>) -> Result<PagingType> {
        for (name, count) in [("first", self.first), ("last", self.last)] {
            let Some(count) = count else { continue };
            if count < 0 {
                return Err(ConnectionError::InvalidPaging(format!(
                    "'{name}' must be non-negative"
                )));
            }
            if let Some(max) = max_page_size {
                if count as u32 > max {
                    return Err(ConnectionError::InvalidPaging(format!(
                        "'{name}' cannot exceed {max}"
                    )));
                }
            }
        }

        self.paging_type()
    }

    /// Page size; zero when neither count is given
    pub fn limit(&self) -> usize {
        self.first
            .or(self.last)
            .map(|n| n.max(0) as usize)
            .unwrap_or(0)
    }

    /// Cursor the page starts from
    pub fn cursor(&self, paging: PagingType) -> Option<&str> {
        match paging {
            PagingType::Forward => self.after.as_deref(),
            PagingType::Backward => self.before.as_deref(),
        }
    }

    /// Opposite cursor, bounding the far end of the scan
    pub fn bound(&self, paging: PagingType) -> Option<&str> {
        match paging {
            PagingType::Forward => self.before.as_deref(),
            PagingType::Backward => self.after.as_deref(),
        }
    }
}
