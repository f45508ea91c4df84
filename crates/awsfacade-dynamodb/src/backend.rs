//! The seam between [`TableFacade`](crate::TableFacade) and a provider.

use std::time::Duration;

use async_trait::async_trait;
use awsfacade_core::FacadeResult;

use crate::expression::{Condition, KeyCondition, UpdateSet};
use crate::types::{Item, ItemPage, ItemPageRequest, KeySchema, TableHandle};

/// Key-value table operations, one provider request each.
///
/// Keys are passed as rendered attribute maps; validation against the key
/// schema happens in the facade.
#[async_trait]
pub trait TableBackend: Send + Sync + std::fmt::Debug {
    /// Create a table with fixed provisioned throughput.
    async fn create_table(
        &self,
        name: &str,
        key_schema: &KeySchema,
        read_units: i64,
        write_units: i64,
    ) -> FacadeResult<TableHandle>;

    /// Block until the table reports active.
    async fn wait_table_active(&self, name: &str, max_wait: Duration) -> FacadeResult<()>;

    /// Describe a table; [`FacadeError::NotFound`](awsfacade_core::FacadeError::NotFound)
    /// when it does not exist.
    async fn describe_table(&self, name: &str) -> FacadeResult<TableHandle>;

    /// Start deleting a table.
    async fn delete_table(&self, name: &str) -> FacadeResult<()>;

    /// Block until the table is gone.
    async fn wait_table_absent(&self, name: &str, max_wait: Duration) -> FacadeResult<()>;

    /// Write an item, replacing any item with the same key.
    async fn put_item(&self, table: &str, item: Item) -> FacadeResult<()>;

    /// Read an item by key.
    async fn get_item(&self, table: &str, key: Item) -> FacadeResult<Option<Item>>;

    /// Apply a `SET` update to the item at `key`, creating it if absent.
    async fn update_item(&self, table: &str, key: Item, update: &UpdateSet) -> FacadeResult<()>;

    /// Delete the item at `key`, returning what was removed.
    async fn delete_item(&self, table: &str, key: Item) -> FacadeResult<Option<Item>>;

    /// Put up to [`MAX_BATCH_WRITE`](crate::MAX_BATCH_WRITE) items in one
    /// request. Returns the items the provider left unprocessed.
    async fn batch_put(&self, table: &str, items: Vec<Item>) -> FacadeResult<Vec<Item>>;

    /// One page of items matching `key`, then `filter`.
    async fn query(
        &self,
        table: &str,
        key: &KeyCondition,
        filter: Option<&Condition>,
        page: &ItemPageRequest,
    ) -> FacadeResult<ItemPage>;

    /// One page of the whole table, filtered.
    async fn scan(
        &self,
        table: &str,
        filter: Option<&Condition>,
        page: &ItemPageRequest,
    ) -> FacadeResult<ItemPage>;
}
