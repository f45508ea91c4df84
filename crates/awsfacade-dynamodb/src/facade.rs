//! Table lifecycle and item operations.

use std::collections::HashMap;
use std::time::Duration;

use awsfacade_core::logging::service_span;
use awsfacade_core::{FacadeConfig, FacadeError, FacadeResult};
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::backend::TableBackend;
use crate::expression::{Condition, KeyCondition, UpdateSet};
use crate::types::{
    AttributeValue, Item, ItemPage, ItemPageRequest, KeySchema, MAX_BATCH_WRITE, PrimaryKey,
    READ_CAPACITY_UNITS, TableHandle, TableRef, WRITE_CAPACITY_UNITS,
};

/// Facade over a key-value table backend.
///
/// Item operations address the table the facade is bound to; table
/// lifecycle operations take explicit names.
#[derive(Debug)]
pub struct TableFacade<B> {
    backend: B,
    table: TableRef,
    max_wait: Duration,
    span: Span,
}

impl<B: TableBackend> TableFacade<B> {
    /// Bind a facade to `table`.
    pub fn new(backend: B, table: TableRef, config: &FacadeConfig) -> Self {
        Self {
            backend,
            table,
            max_wait: config.max_wait(),
            span: service_span("dynamodb"),
        }
    }

    /// Replace the span every call is recorded under.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The bound table.
    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Create a table and wait until it is active.
    ///
    /// Attribute definitions come from the key schema; throughput is fixed
    /// at [`READ_CAPACITY_UNITS`] / [`WRITE_CAPACITY_UNITS`].
    ///
    /// # Errors
    /// Provider failures, or the table not becoming active within the
    /// configured wait.
    pub async fn create_table(&self, name: &str, key_schema: &KeySchema) -> FacadeResult<TableHandle> {
        async {
            self.backend
                .create_table(name, key_schema, READ_CAPACITY_UNITS, WRITE_CAPACITY_UNITS)
                .await
                .inspect_err(|err| error!(table = name, error = %err, "failed to create table"))?;
            self.backend.wait_table_active(name, self.max_wait).await?;
            let handle = self.backend.describe_table(name).await?;
            info!(table = name, arn = ?handle.arn, "table active");
            Ok(handle)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Describe a table; `None` when it does not exist.
    ///
    /// # Errors
    /// Any provider failure other than absence.
    pub async fn get_table(&self, name: &str) -> FacadeResult<Option<TableHandle>> {
        async {
            match self.backend.describe_table(name).await {
                Ok(handle) => Ok(Some(handle)),
                Err(err) if err.is_not_found() => {
                    warn!(table = name, "table does not exist");
                    Ok(None)
                }
                Err(err) => Err(err),
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Delete a table and wait until the provider no longer reports it.
    ///
    /// # Errors
    /// Provider failures, or the table outliving the configured wait.
    pub async fn delete_table(&self, name: &str) -> FacadeResult<()> {
        async {
            self.backend
                .delete_table(name)
                .await
                .inspect_err(|err| error!(table = name, error = %err, "failed to delete table"))?;
            self.backend.wait_table_absent(name, self.max_wait).await?;
            info!(table = name, "table deleted");
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// Write `attributes` merged with the key fields, replacing any existing
    /// item, and return the stored item as re-read.
    ///
    /// # Errors
    /// Invalid keys, or any provider failure.
    pub async fn put_item(&self, key: &PrimaryKey, attributes: Item) -> FacadeResult<Item> {
        let key_item = key.to_item(&self.table.key_schema)?;
        let mut item = attributes;
        item.extend(key_item.clone());
        async {
            self.backend.put_item(&self.table.name, item).await?;
            debug!(table = %self.table.name, "item written");
            self.reread(key_item).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Read an item; `None` when absent.
    ///
    /// # Errors
    /// Invalid keys, or any provider failure.
    pub async fn get_item(&self, key: &PrimaryKey) -> FacadeResult<Option<Item>> {
        let key_item = key.to_item(&self.table.key_schema)?;
        self.backend
            .get_item(&self.table.name, key_item)
            .instrument(self.span.clone())
            .await
    }

    /// Set each of `attributes` on the item at `key` (`SET #a0 = :a0, ...`)
    /// and return the item as re-read.
    ///
    /// # Errors
    /// Invalid keys, an empty attribute map, or any provider failure.
    pub async fn update_item(&self, key: &PrimaryKey, attributes: Item) -> FacadeResult<Item> {
        let key_item = key.to_item(&self.table.key_schema)?;
        let update = UpdateSet::from_attributes(attributes);
        if update.is_empty() {
            return Err(FacadeError::invalid_input("update needs at least one attribute"));
        }
        async {
            self.backend
                .update_item(&self.table.name, key_item.clone(), &update)
                .await?;
            debug!(table = %self.table.name, "item updated");
            self.reread(key_item).await
        }
        .instrument(self.span.clone())
        .await
    }

    async fn reread(&self, key_item: Item) -> FacadeResult<Item> {
        self.backend
            .get_item(&self.table.name, key_item)
            .await?
            .ok_or_else(|| {
                FacadeError::not_found(format!("item in {} vanished after write", self.table.name))
            })
    }

    /// Delete the item at `key`; returns whether one was removed.
    ///
    /// # Errors
    /// Invalid keys, or any provider failure (which is also logged).
    pub async fn delete_item(&self, key: &PrimaryKey) -> FacadeResult<bool> {
        let key_item = key.to_item(&self.table.key_schema)?;
        async {
            match self.backend.delete_item(&self.table.name, key_item).await {
                Ok(old) => {
                    debug!(table = %self.table.name, removed = old.is_some(), "item deleted");
                    Ok(old.is_some())
                }
                Err(err) => {
                    error!(table = %self.table.name, error = %err, "failed to delete item");
                    Err(err)
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Write `items` to `table_name` through a buffering batch writer.
    ///
    /// When `overwrite_keys` is given, a buffered item with the same values
    /// for those attributes is replaced by the newer one. The buffer is
    /// flushed [`MAX_BATCH_WRITE`] items at a time; unprocessed items go back
    /// into the buffer for the next flush. Returns the number written.
    ///
    /// # Errors
    /// Any provider failure, or a flush in which the provider processed
    /// nothing.
    pub async fn batch_write(
        &self,
        table_name: &str,
        items: impl IntoIterator<Item = Item>,
        overwrite_keys: Option<&[&str]>,
    ) -> FacadeResult<usize> {
        let items: Vec<Item> = items.into_iter().collect();
        async {
            let mut writer = BatchWriter::new(overwrite_keys);
            let mut written = 0;
            for item in items {
                writer.push(item);
                if writer.is_full() {
                    written += self.flush(table_name, &mut writer).await?;
                }
            }
            while !writer.is_empty() {
                written += self.flush(table_name, &mut writer).await?;
            }
            info!(table = table_name, written, "batch write complete");
            Ok(written)
        }
        .instrument(self.span.clone())
        .await
    }

    async fn flush(&self, table_name: &str, writer: &mut BatchWriter<'_>) -> FacadeResult<usize> {
        let chunk = writer.take_chunk();
        let sent = chunk.len();
        let unprocessed = self.backend.batch_put(table_name, chunk).await?;
        let processed = sent.saturating_sub(unprocessed.len());
        if processed == 0 {
            return Err(FacadeError::Throttled(format!(
                "batch write to {table_name} made no progress ({sent} items unprocessed)"
            )));
        }
        if !unprocessed.is_empty() {
            debug!(table = table_name, requeued = unprocessed.len(), "re-queueing unprocessed items");
        }
        writer.requeue(unprocessed);
        Ok(processed)
    }

    /// One page of items in the partition selected by `key`, optionally
    /// filtered server-side.
    ///
    /// # Errors
    /// A key condition that does not fit the bound key schema, or any
    /// provider failure.
    pub async fn query(
        &self,
        key: &KeyCondition,
        filter: Option<&Condition>,
        page: &ItemPageRequest,
    ) -> FacadeResult<ItemPage> {
        key.validate(&self.table.key_schema)?;
        async {
            let result = self.backend.query(&self.table.name, key, filter, page).await?;
            debug!(table = %self.table.name, count = result.items.len(), more = result.has_more(), "query page");
            Ok(result)
        }
        .instrument(self.span.clone())
        .await
    }

    /// One page of a full-table scan, optionally filtered. A filter that
    /// matches nothing yields an empty page.
    ///
    /// # Errors
    /// Any provider failure.
    pub async fn scan(
        &self,
        filter: Option<&Condition>,
        page: &ItemPageRequest,
    ) -> FacadeResult<ItemPage> {
        async {
            let result = self.backend.scan(&self.table.name, filter, page).await?;
            debug!(table = %self.table.name, count = result.items.len(), more = result.has_more(), "scan page");
            Ok(result)
        }
        .instrument(self.span.clone())
        .await
    }
}

/// Buffer of pending puts with optional de-duplication.
#[derive(Debug)]
struct BatchWriter<'a> {
    overwrite_keys: Option<&'a [&'a str]>,
    buffer: Vec<Item>,
}

impl<'a> BatchWriter<'a> {
    fn new(overwrite_keys: Option<&'a [&'a str]>) -> Self {
        Self {
            overwrite_keys,
            buffer: Vec::new(),
        }
    }

    fn dedupe_key<'i>(&self, item: &'i Item) -> Option<Vec<Option<&'i AttributeValue>>> {
        self.overwrite_keys
            .map(|keys| keys.iter().map(|k| item.get(*k)).collect())
    }

    fn push(&mut self, item: Item) {
        if let Some(key) = self.dedupe_key(&item) {
            if let Some(pos) = self
                .buffer
                .iter()
                .position(|buffered| self.dedupe_key(buffered).as_ref() == Some(&key))
            {
                self.buffer.remove(pos);
            }
        }
        self.buffer.push(item);
    }

    fn is_full(&self) -> bool {
        self.buffer.len() >= MAX_BATCH_WRITE
    }

    fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn take_chunk(&mut self) -> Vec<Item> {
        let n = self.buffer.len().min(MAX_BATCH_WRITE);
        self.buffer.drain(..n).collect()
    }

    fn requeue(&mut self, items: Vec<Item>) {
        for item in items {
            self.push(item);
        }
    }
}

/// Convenience for building items from literal pairs.
pub fn item<K: Into<String>>(pairs: impl IntoIterator<Item = (K, AttributeValue)>) -> Item {
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v))
        .collect::<HashMap<_, _>>()
}

#[cfg(test)]
mod tests {
    use awsfacade_core::ErrorKind;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::expression::CompareOp;
    use crate::types::KeyType;
    use crate::MemoryTables;

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_owned())
    }

    fn n(v: i64) -> AttributeValue {
        AttributeValue::N(v.to_string())
    }

    fn schema() -> KeySchema {
        KeySchema::partition("user", KeyType::S).with_sort_key("seq", KeyType::N)
    }

    async fn facade() -> TableFacade<MemoryTables> {
        awsfacade_core::logging::init_test_tracing();
        let tables = TableFacade::new(
            MemoryTables::new(),
            TableRef::new("orders", schema()),
            &FacadeConfig::default(),
        );
        assert_ok!(tables.create_table("orders", &schema()).await);
        tables
    }

    #[tokio::test]
    async fn test_should_create_and_describe_table() {
        let tables = facade().await;
        let handle = tables.get_table("orders").await.unwrap().unwrap();
        assert_eq!(handle.key_schema, schema());
        assert!(handle.arn.unwrap().ends_with(":table/orders"));

        assert!(tables.get_table("missing").await.unwrap().is_none());
        let err = tables.create_table("orders", &schema()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_should_delete_table_and_wait() {
        let tables = facade().await;
        tables.delete_table("orders").await.unwrap();
        assert!(tables.get_table("orders").await.unwrap().is_none());
        assert!(tables.delete_table("orders").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_should_merge_key_into_put_item() {
        let tables = facade().await;
        let key = PrimaryKey::composite(s("ann"), n(1));
        let stored = tables
            .put_item(&key, item([("total", n(30)), ("state", s("open"))]))
            .await
            .unwrap();

        let expected = item([
            ("user", s("ann")),
            ("seq", n(1)),
            ("total", n(30)),
            ("state", s("open")),
        ]);
        assert_eq!(stored, expected);
        assert_eq!(tables.get_item(&key).await.unwrap(), Some(expected));
    }

    #[tokio::test]
    async fn test_should_let_key_fields_win_over_attributes() {
        let tables = facade().await;
        let key = PrimaryKey::composite(s("ann"), n(1));
        let stored = tables
            .put_item(&key, item([("user", s("bob"))]))
            .await
            .unwrap();
        assert_eq!(stored["user"], s("ann"));
    }

    #[tokio::test]
    async fn test_should_update_and_reread_item() {
        let tables = facade().await;
        let key = PrimaryKey::composite(s("ann"), n(2));
        tables
            .put_item(&key, item([("state", s("open")), ("total", n(5))]))
            .await
            .unwrap();

        let updated = tables
            .update_item(&key, item([("state", s("shipped")), ("carrier", s("ups"))]))
            .await
            .unwrap();
        assert_eq!(updated["state"], s("shipped"));
        assert_eq!(updated["carrier"], s("ups"));
        assert_eq!(updated["total"], n(5));

        assert_err!(tables.update_item(&key, Item::new()).await);
    }

    #[tokio::test]
    async fn test_should_report_whether_delete_removed_an_item() {
        let tables = facade().await;
        let key = PrimaryKey::composite(s("ann"), n(3));
        tables.put_item(&key, Item::new()).await.unwrap();
        assert!(tables.delete_item(&key).await.unwrap());
        assert!(!tables.delete_item(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_should_validate_keys_before_calling_backend() {
        let tables = facade().await;
        let err = tables
            .get_item(&PrimaryKey::partition(s("ann")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_should_return_empty_page_when_scan_filter_matches_nothing() {
        let tables = facade().await;
        for i in 0..5 {
            tables
                .put_item(&PrimaryKey::composite(s("ann"), n(i)), item([("total", n(i * 10))]))
                .await
                .unwrap();
        }
        let filter = Condition::compare("total", CompareOp::Gt, n(1000));
        let page = tables
            .scan(Some(&filter), &ItemPageRequest::first())
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more());
    }

    #[tokio::test]
    async fn test_should_query_partition_with_sort_condition() {
        let tables = facade().await;
        for (user, seq) in [("ann", 1), ("ann", 2), ("ann", 3), ("bob", 2)] {
            tables
                .put_item(&PrimaryKey::composite(s(user), n(seq)), Item::new())
                .await
                .unwrap();
        }

        let key = KeyCondition::partition("user", s("ann"))
            .with_sort(Condition::compare("seq", CompareOp::Ge, n(2)));
        let first = tables
            .query(&key, None, &ItemPageRequest::with_limit(1))
            .await
            .unwrap();
        assert_eq!(first.items.len(), 1);
        assert_eq!(first.items[0]["seq"], n(2));

        let resume = first.last_evaluated_key.unwrap();
        let second = tables
            .query(&key, None, &ItemPageRequest::with_limit(1).after(resume))
            .await
            .unwrap();
        assert_eq!(second.items[0]["seq"], n(3));

        let bad = KeyCondition::partition("seq", n(1));
        assert_eq!(
            tables
                .query(&bad, None, &ItemPageRequest::first())
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidInput
        );
    }

    #[tokio::test]
    async fn test_should_dedupe_batch_on_overwrite_keys() {
        let tables = facade().await;
        let rows = vec![
            item([("user", s("ann")), ("seq", n(1)), ("v", s("old"))]),
            item([("user", s("ann")), ("seq", n(2)), ("v", s("x"))]),
            item([("user", s("ann")), ("seq", n(1)), ("v", s("new"))]),
        ];
        let written = tables
            .batch_write("orders", rows, Some(&["user", "seq"]))
            .await
            .unwrap();
        assert_eq!(written, 2);

        let stored = tables
            .get_item(&PrimaryKey::composite(s("ann"), n(1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["v"], s("new"));
    }

    #[tokio::test]
    async fn test_should_requeue_unprocessed_batch_items() {
        let tables = facade().await;
        tables.backend().set_batch_capacity(10);
        let rows: Vec<Item> = (0..60)
            .map(|i| item([("user", s("bulk")), ("seq", n(i))]))
            .collect();
        let written = tables.batch_write("orders", rows, None).await.unwrap();
        assert_eq!(written, 60);

        let page = tables
            .query(
                &KeyCondition::partition("user", s("bulk")),
                None,
                &ItemPageRequest::first(),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 60);
    }

    #[tokio::test]
    async fn test_should_fail_batch_that_makes_no_progress() {
        let tables = facade().await;
        tables.backend().set_batch_capacity(0);
        let err = tables
            .batch_write("orders", vec![item([("user", s("a")), ("seq", n(1))])], None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Throttled);
    }
}
