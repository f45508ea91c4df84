//! In-memory tables.
//!
//! Each table keeps its items in one `BTreeMap` ordered by (partition key,
//! sort key), which gives queries a contiguous range per partition and
//! scans a stable order to resume from.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use awsfacade_core::{AccountId, AwsRegion, FacadeError, FacadeResult};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use tracing::debug;

use crate::backend::TableBackend;
use crate::expression::{Condition, KeyCondition, UpdateSet, parse_number, scalar_ordering};
use crate::types::{
    AttributeValue, Item, ItemPage, ItemPageRequest, KeySchema, TableHandle, TableStatus,
};

/// Evaluated-item cap per page when the request carries no limit.
const DEFAULT_PAGE_LIMIT: usize = 1000;

/// A key-eligible value with a total order.
///
/// `Absent` stands in for the sort key of partition-only tables and sorts
/// before every value.
#[derive(Debug, Clone)]
enum KeyValue {
    Absent,
    Scalar(AttributeValue),
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Absent, Self::Absent) => Ordering::Equal,
            (Self::Absent, Self::Scalar(_)) => Ordering::Less,
            (Self::Scalar(_), Self::Absent) => Ordering::Greater,
            (Self::Scalar(a), Self::Scalar(b)) => {
                scalar_ordering(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
            }
        }
    }
}

fn type_rank(value: &AttributeValue) -> u8 {
    match value {
        AttributeValue::S(_) => 0,
        AttributeValue::N(_) => 1,
        AttributeValue::B(_) => 2,
        _ => 3,
    }
}

type StorageKey = (KeyValue, KeyValue);

/// Number keys must parse, otherwise distinct keys would compare equal.
fn scalar_key(value: AttributeValue) -> FacadeResult<KeyValue> {
    if let AttributeValue::N(n) = &value {
        if !parse_number(n).is_some_and(f64::is_finite) {
            return Err(FacadeError::invalid_input(format!(
                "key value {n:?} is not a valid number"
            )));
        }
    }
    Ok(KeyValue::Scalar(value))
}

#[derive(Debug)]
struct MemoryTable {
    key_schema: KeySchema,
    arn: String,
    items: RwLock<BTreeMap<StorageKey, Item>>,
}

impl MemoryTable {
    fn storage_key(&self, item: &Item) -> FacadeResult<StorageKey> {
        let key = self.key_schema.key_of(item)?;
        Ok((
            scalar_key(key.partition)?,
            key.sort.map_or(Ok(KeyValue::Absent), scalar_key)?,
        ))
    }

    fn handle(&self, name: &str) -> TableHandle {
        TableHandle {
            name: name.to_owned(),
            key_schema: self.key_schema.clone(),
            status: TableStatus::Active,
            arn: Some(self.arn.clone()),
            item_count: Some(self.items.read().len() as u64),
        }
    }

    fn only_key(&self, item: &Item) -> Item {
        item.iter()
            .filter(|(name, _)| self.key_schema.is_key_attribute(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Walk `range`, evaluating at most `limit` items, and keep those that
    /// pass `filter`. The last evaluated key is reported when items remain.
    fn collect_page<'a>(
        &self,
        range: impl Iterator<Item = (&'a StorageKey, &'a Item)>,
        filter: Option<&Condition>,
        limit: Option<usize>,
    ) -> ItemPage {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1);
        let mut range = range.peekable();
        let mut items = Vec::new();
        let mut evaluated = 0;
        let mut last = None;
        while evaluated < limit {
            let Some((_, item)) = range.next() else {
                break;
            };
            evaluated += 1;
            last = Some(item);
            if filter.is_none_or(|f| f.matches(item)) {
                items.push(item.clone());
            }
        }
        let last_evaluated_key = match (range.peek(), last) {
            (Some(_), Some(item)) => Some(self.only_key(item)),
            _ => None,
        };
        ItemPage {
            items,
            last_evaluated_key,
        }
    }
}

fn table_missing(name: &str) -> FacadeError {
    FacadeError::from_code(
        Some("ResourceNotFoundException"),
        format!("table {name} not found"),
    )
}

/// In-memory [`TableBackend`].
#[derive(Debug)]
pub struct MemoryTables {
    tables: DashMap<String, MemoryTable>,
    region: AwsRegion,
    account: AccountId,
    batch_capacity: AtomicUsize,
}

impl Default for MemoryTables {
    fn default() -> Self {
        Self {
            tables: DashMap::new(),
            region: AwsRegion::default(),
            account: AccountId::default(),
            batch_capacity: AtomicUsize::new(usize::MAX),
        }
    }
}

impl MemoryTables {
    /// No tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap how many items one `batch_put` call processes; the rest are
    /// reported unprocessed, as a provider under write pressure would.
    pub fn set_batch_capacity(&self, capacity: usize) {
        self.batch_capacity.store(capacity, AtomicOrdering::Relaxed);
    }

    fn table(&self, name: &str) -> FacadeResult<dashmap::mapref::one::Ref<'_, String, MemoryTable>> {
        self.tables.get(name).ok_or_else(|| table_missing(name))
    }
}

#[async_trait]
impl TableBackend for MemoryTables {
    async fn create_table(
        &self,
        name: &str,
        key_schema: &KeySchema,
        _read_units: i64,
        _write_units: i64,
    ) -> FacadeResult<TableHandle> {
        match self.tables.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(FacadeError::from_code(
                Some("ResourceInUseException"),
                format!("table {name} already exists"),
            )),
            Entry::Vacant(slot) => {
                let table = MemoryTable {
                    key_schema: key_schema.clone(),
                    arn: format!("arn:aws:dynamodb:{}:{}:table/{name}", self.region, self.account),
                    items: RwLock::new(BTreeMap::new()),
                };
                let mut handle = table.handle(name);
                handle.status = TableStatus::Creating;
                slot.insert(table);
                debug!(table = name, "memory table created");
                Ok(handle)
            }
        }
    }

    async fn wait_table_active(&self, name: &str, _max_wait: Duration) -> FacadeResult<()> {
        self.table(name).map(|_| ())
    }

    async fn describe_table(&self, name: &str) -> FacadeResult<TableHandle> {
        Ok(self.table(name)?.handle(name))
    }

    async fn delete_table(&self, name: &str) -> FacadeResult<()> {
        self.tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| table_missing(name))
    }

    async fn wait_table_absent(&self, name: &str, _max_wait: Duration) -> FacadeResult<()> {
        if self.tables.contains_key(name) {
            return Err(FacadeError::wait(format!("table {name} removal"), "table still exists"));
        }
        Ok(())
    }

    async fn put_item(&self, table: &str, item: Item) -> FacadeResult<()> {
        let t = self.table(table)?;
        let key = t.storage_key(&item)?;
        t.items.write().insert(key, item);
        Ok(())
    }

    async fn get_item(&self, table: &str, key: Item) -> FacadeResult<Option<Item>> {
        let t = self.table(table)?;
        let key = t.storage_key(&key)?;
        Ok(t.items.read().get(&key).cloned())
    }

    async fn update_item(&self, table: &str, key: Item, update: &UpdateSet) -> FacadeResult<()> {
        let t = self.table(table)?;
        if let Some(name) = update
            .attribute_names()
            .find(|name| t.key_schema.is_key_attribute(name))
        {
            return Err(FacadeError::from_code(
                Some("ValidationException"),
                format!("cannot update key attribute {name}"),
            ));
        }
        let storage_key = t.storage_key(&key)?;
        let mut items = t.items.write();
        let item = items.entry(storage_key).or_insert(key);
        update.apply(item);
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: Item) -> FacadeResult<Option<Item>> {
        let t = self.table(table)?;
        let key = t.storage_key(&key)?;
        Ok(t.items.write().remove(&key))
    }

    async fn batch_put(&self, table: &str, mut items: Vec<Item>) -> FacadeResult<Vec<Item>> {
        let t = self.table(table)?;
        let capacity = self.batch_capacity.load(AtomicOrdering::Relaxed);
        let unprocessed = items.split_off(capacity.min(items.len()));

        let keyed = items
            .into_iter()
            .map(|item| Ok((t.storage_key(&item)?, item)))
            .collect::<FacadeResult<Vec<_>>>()?;
        let mut stored = t.items.write();
        for (key, item) in keyed {
            stored.insert(key, item);
        }
        Ok(unprocessed)
    }

    async fn query(
        &self,
        table: &str,
        key: &KeyCondition,
        filter: Option<&Condition>,
        page: &ItemPageRequest,
    ) -> FacadeResult<ItemPage> {
        let t = self.table(table)?;
        let partition = KeyValue::Scalar(key.partition_value.clone());
        let lower = match &page.exclusive_start_key {
            Some(start) => Bound::Excluded(t.storage_key(start)?),
            None => Bound::Included((partition.clone(), KeyValue::Absent)),
        };
        let items = t.items.read();
        let range = items
            .range((lower, Bound::Unbounded))
            .take_while(|((p, _), _)| *p == partition)
            .filter(|(_, item)| key.matches(item));
        Ok(t.collect_page(range, filter, page.limit))
    }

    async fn scan(
        &self,
        table: &str,
        filter: Option<&Condition>,
        page: &ItemPageRequest,
    ) -> FacadeResult<ItemPage> {
        let t = self.table(table)?;
        let lower = match &page.exclusive_start_key {
            Some(start) => Bound::Excluded(t.storage_key(start)?),
            None => Bound::Unbounded,
        };
        let items = t.items.read();
        Ok(t.collect_page(items.range((lower, Bound::Unbounded)), filter, page.limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyType;

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_owned())
    }

    fn n(v: i64) -> AttributeValue {
        AttributeValue::N(v.to_string())
    }

    fn event(pk: &str, ts: i64) -> Item {
        Item::from([
            ("pk".to_owned(), s(pk)),
            ("ts".to_owned(), n(ts)),
            ("body".to_owned(), s(&format!("{pk}-{ts}"))),
        ])
    }

    async fn events_table() -> MemoryTables {
        let tables = MemoryTables::new();
        let schema = KeySchema::partition("pk", KeyType::S).with_sort_key("ts", KeyType::N);
        tables.create_table("events", &schema, 5, 5).await.unwrap();
        for pk in ["a", "b"] {
            for ts in [3, 20, 100] {
                tables.put_item("events", event(pk, ts)).await.unwrap();
            }
        }
        tables
    }

    #[tokio::test]
    async fn test_should_order_numeric_sort_keys_numerically() {
        let tables = events_table().await;
        let page = tables
            .query(
                "events",
                &KeyCondition::partition("pk", s("a")),
                None,
                &ItemPageRequest::first(),
            )
            .await
            .unwrap();
        let ts: Vec<_> = page.items.iter().map(|i| i["ts"].clone()).collect();
        assert_eq!(ts, vec![n(3), n(20), n(100)]);
        assert!(!page.has_more());
    }

    #[tokio::test]
    async fn test_should_resume_scan_from_last_evaluated_key() {
        let tables = events_table().await;
        let first = tables
            .scan("events", None, &ItemPageRequest::with_limit(4))
            .await
            .unwrap();
        assert_eq!(first.items.len(), 4);
        let resume = first.last_evaluated_key.clone().unwrap();
        assert_eq!(resume.len(), 2);

        let rest = tables
            .scan("events", None, &ItemPageRequest::with_limit(4).after(resume))
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 2);
        assert!(rest.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_should_apply_limit_before_filter() {
        let tables = events_table().await;
        let filter = Condition::eq("ts", n(100));
        let page = tables
            .scan("events", Some(&filter), &ItemPageRequest::with_limit(2))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(page.has_more());
    }

    #[tokio::test]
    async fn test_should_leave_items_beyond_capacity_unprocessed() {
        let tables = events_table().await;
        tables.set_batch_capacity(1);
        let unprocessed = tables
            .batch_put("events", vec![event("c", 1), event("c", 2)])
            .await
            .unwrap();
        assert_eq!(unprocessed, vec![event("c", 2)]);
    }

    #[tokio::test]
    async fn test_should_reject_key_attribute_updates() {
        let tables = events_table().await;
        let key = Item::from([("pk".to_owned(), s("a")), ("ts".to_owned(), n(3))]);
        let update = UpdateSet::from_attributes(Item::from([("ts".to_owned(), n(4))]));
        let err = tables.update_item("events", key, &update).await.unwrap_err();
        assert_eq!(err.kind(), awsfacade_core::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_should_reject_unparseable_number_keys() {
        let tables = events_table().await;
        for bad in ["abc", "xyz", "NaN"] {
            let item = Item::from([
                ("pk".to_owned(), s("a")),
                ("ts".to_owned(), AttributeValue::N(bad.to_owned())),
            ]);
            let err = tables.put_item("events", item).await.unwrap_err();
            assert_eq!(err.kind(), awsfacade_core::ErrorKind::InvalidInput);
        }

        let page = tables
            .query(
                "events",
                &KeyCondition::partition("pk", s("a")),
                None,
                &ItemPageRequest::first(),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 3);
    }

    #[tokio::test]
    async fn test_should_report_missing_table() {
        let tables = MemoryTables::new();
        let err = tables.describe_table("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
