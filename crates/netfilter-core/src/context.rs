//! Per-call request context.

use std::collections::HashMap;

use crate::config::HostItem;
use crate::error::ItemError;
use crate::phase::Phase;

/// Read access to the items the host keeps for the current request.
///
/// `Ok(None)` means the host has no value for the item (for example no
/// remote host on a local login); `Err` means the host refused to answer.
pub trait ItemSource {
    /// Fetch one item.
    fn item(&self, item: HostItem) -> Result<Option<String>, ItemError>;
}

/// Fixed item values, for offline evaluation and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticItems {
    values: HashMap<HostItem, String>,
}

impl StaticItems {
    /// Create an empty item set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an item value (builder style).
    pub fn with(mut self, item: HostItem, value: impl Into<String>) -> Self {
        self.values.insert(item, value.into());
        self
    }
}

impl ItemSource for StaticItems {
    fn item(&self, item: HostItem) -> Result<Option<String>, ItemError> {
        Ok(self.values.get(&item).cloned())
    }
}

/// Item source standing in for a missing host handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoItems;

impl ItemSource for NoItems {
    fn item(&self, _item: HostItem) -> Result<Option<String>, ItemError> {
        Err(ItemError::NoHandle)
    }
}

/// Everything one entry-point call carries.
///
/// Borrowed from the caller and dropped when the call returns.
pub struct RequestContext<'a> {
    /// Phase being dispatched.
    pub phase: Phase,
    /// Host flags, passed through untouched.
    pub flags: i32,
    /// Module arguments, in order.
    pub args: &'a [String],
    /// Host request items (user, remote host, ...).
    pub items: &'a dyn ItemSource,
}

impl<'a> RequestContext<'a> {
    /// Build a context.
    pub fn new(phase: Phase, flags: i32, args: &'a [String], items: &'a dyn ItemSource) -> Self {
        Self {
            phase,
            flags,
            args,
            items,
        }
    }
}

impl std::fmt::Debug for RequestContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("phase", &self.phase)
            .field("flags", &self.flags)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_items() {
        let items = StaticItems::new()
            .with(HostItem::User, "alice")
            .with(HostItem::Rhost, "host.example");
        assert_eq!(items.item(HostItem::User), Ok(Some("alice".to_string())));
        assert_eq!(items.item(HostItem::Tty), Ok(None));
    }

    #[test]
    fn test_no_items_reports_missing_handle() {
        assert_eq!(NoItems.item(HostItem::Rhost), Err(ItemError::NoHandle));
    }
}
