//! Common types shared across facades.

use std::fmt;

use crate::error::{FacadeError, FacadeResult};

/// AWS Account ID (12-digit string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Account ID used by local emulators and the in-memory backends.
    pub const DEFAULT: &'static str = "000000000000";

    /// Create a new account ID from a string.
    ///
    /// # Errors
    /// Returns an error if the account ID is not a 12-digit numeric string.
    pub fn new(id: impl Into<String>) -> FacadeResult<Self> {
        let id = id.into();
        if id.len() != 12 || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(FacadeError::invalid_input(format!(
                "invalid AWS account ID: {id} (must be 12-digit numeric string)"
            )));
        }
        Ok(Self(id))
    }

    /// Get the account ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// AWS Region identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct AwsRegion(String);

impl AwsRegion {
    /// Default region.
    pub const DEFAULT: &'static str = "us-east-1";

    /// Create a new region.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self(region.into())
    }

    /// Get the region as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AwsRegion {
    fn default() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}

impl fmt::Display for AwsRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request for a single page of a paginated listing.
///
/// `token` is the opaque cursor returned in [`Page::next_token`] by the
/// previous call; `limit` caps the number of entries the provider returns
/// (the provider's own default applies when unset).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Continuation token from a previous page.
    pub token: Option<String>,
    /// Maximum number of entries to return.
    pub limit: Option<usize>,
}

impl PageRequest {
    /// First page with the provider's default size.
    #[must_use]
    pub fn first() -> Self {
        Self::default()
    }

    /// First page of at most `limit` entries.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            token: None,
            limit: Some(limit),
        }
    }

    /// The page following `token`, keeping this request's limit.
    #[must_use]
    pub fn after(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            limit: self.limit,
        }
    }

    /// `limit` as the `i32` most SDK operations expect.
    #[must_use]
    pub fn limit_i32(&self) -> Option<i32> {
        self.limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX))
    }
}

/// One page of results plus the token for the next page, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Entries on this page.
    pub items: Vec<T>,
    /// Cursor for the next page; `None` when the listing is exhausted.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// Build a page.
    #[must_use]
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        Self { items, next_token }
    }

    /// Whether more pages follow.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }

    /// Number of entries on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether this page has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_token: None,
        }
    }
}

/// Slice an in-memory, already ordered listing into a page.
///
/// The token is the decimal offset of the first entry of the next page.
/// Used by the in-memory backends, which have no native cursor.
///
/// # Errors
/// Returns [`FacadeError::InvalidInput`] when the token is not an offset
/// produced by a previous call.
pub fn paginate<T>(mut entries: Vec<T>, page: &PageRequest, default_limit: usize) -> FacadeResult<Page<T>> {
    let start = match page.token.as_deref() {
        None => 0,
        Some(token) => token
            .parse::<usize>()
            .map_err(|_| FacadeError::invalid_input(format!("invalid page token: {token}")))?,
    };
    let limit = page.limit.unwrap_or(default_limit).max(1);
    if start >= entries.len() {
        return Ok(Page::default());
    }
    let end = start.saturating_add(limit).min(entries.len());
    let next_token = (end < entries.len()).then(|| end.to_string());
    entries.truncate(end);
    let items = entries.split_off(start);
    Ok(Page::new(items, next_token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_valid_account_id() {
        let id = AccountId::new("123456789012").unwrap();
        assert_eq!(id.as_str(), "123456789012");
    }

    #[test]
    fn test_should_reject_invalid_account_id() {
        assert!(AccountId::new("12345").is_err());
        assert!(AccountId::new("abcdefghijkl").is_err());
    }

    #[test]
    fn test_should_use_default_region() {
        assert_eq!(AwsRegion::default().as_str(), "us-east-1");
    }

    #[test]
    fn test_should_paginate_in_order() {
        let entries: Vec<u32> = (0..5).collect();
        let first = paginate(entries.clone(), &PageRequest::with_limit(2), 100).unwrap();
        assert_eq!(first.items, vec![0, 1]);
        assert_eq!(first.next_token.as_deref(), Some("2"));

        let req = PageRequest::with_limit(2).after("4");
        let last = paginate(entries, &req, 100).unwrap();
        assert_eq!(last.items, vec![4]);
        assert!(!last.has_more());
    }

    #[test]
    fn test_should_return_empty_page_past_the_end() {
        let page = paginate(vec![1, 2], &PageRequest::first().after("10"), 100).unwrap();
        assert!(page.is_empty());
        assert!(page.next_token.is_none());
    }

    #[test]
    fn test_should_reject_foreign_token() {
        let err = paginate(vec![1], &PageRequest::first().after("abc"), 100).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidInput);
    }
}
