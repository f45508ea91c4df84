//! [`TableBackend`] over `aws-sdk-dynamodb`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::client::Waiters;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, KeySchemaElement, KeyType as SdkKeyType, ProvisionedThroughput,
    PutRequest, ReturnValue, ScalarAttributeType, TableDescription, WriteRequest,
};
use awsfacade_core::{FacadeError, FacadeResult, SdkResultExt};
use tracing::debug;

use crate::backend::TableBackend;
use crate::expression::{Condition, KeyCondition, UpdateSet, render_filter, render_query};
use crate::types::{
    Item, ItemPage, ItemPageRequest, KeyAttribute, KeySchema, KeyType, TableHandle, TableStatus,
};

/// Table backend issuing real DynamoDB requests.
#[derive(Debug, Clone)]
pub struct SdkTables {
    client: Client,
}

impl SdkTables {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from a shared SDK configuration.
    #[must_use]
    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Self {
        Self::new(Client::new(sdk_config))
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn build_err(err: impl std::fmt::Display) -> FacadeError {
    FacadeError::invalid_input(err.to_string())
}

fn scalar_type(t: KeyType) -> ScalarAttributeType {
    match t {
        KeyType::S => ScalarAttributeType::S,
        KeyType::N => ScalarAttributeType::N,
        KeyType::B => ScalarAttributeType::B,
    }
}

fn from_scalar_type(t: &ScalarAttributeType) -> FacadeResult<KeyType> {
    match t {
        ScalarAttributeType::S => Ok(KeyType::S),
        ScalarAttributeType::N => Ok(KeyType::N),
        ScalarAttributeType::B => Ok(KeyType::B),
        other => Err(FacadeError::invalid_input(format!(
            "unsupported key attribute type {}",
            other.as_str()
        ))),
    }
}

fn key_schema_elements(schema: &KeySchema) -> FacadeResult<Vec<KeySchemaElement>> {
    let mut elements = vec![
        KeySchemaElement::builder()
            .attribute_name(&schema.partition_key.name)
            .key_type(SdkKeyType::Hash)
            .build()
            .map_err(build_err)?,
    ];
    if let Some(sort) = &schema.sort_key {
        elements.push(
            KeySchemaElement::builder()
                .attribute_name(&sort.name)
                .key_type(SdkKeyType::Range)
                .build()
                .map_err(build_err)?,
        );
    }
    Ok(elements)
}

fn attribute_definitions(schema: &KeySchema) -> FacadeResult<Vec<AttributeDefinition>> {
    schema
        .attributes()
        .map(|attr| {
            AttributeDefinition::builder()
                .attribute_name(&attr.name)
                .attribute_type(scalar_type(attr.attr_type))
                .build()
                .map_err(build_err)
        })
        .collect()
}

fn to_handle(desc: &TableDescription) -> FacadeResult<TableHandle> {
    let attr_type = |name: &str| {
        desc.attribute_definitions()
            .iter()
            .find(|d| d.attribute_name() == name)
            .map_or_else(
                || {
                    Err(FacadeError::invalid_input(format!(
                        "no attribute definition for key {name}"
                    )))
                },
                |d| from_scalar_type(d.attribute_type()),
            )
    };
    let mut partition_key = None;
    let mut sort_key = None;
    for element in desc.key_schema() {
        let name = element.attribute_name();
        let attr = KeyAttribute::new(name, attr_type(name)?);
        match element.key_type() {
            SdkKeyType::Hash => partition_key = Some(attr),
            SdkKeyType::Range => sort_key = Some(attr),
            _ => {}
        }
    }
    let partition_key = partition_key
        .ok_or_else(|| FacadeError::invalid_input("table description has no partition key"))?;

    Ok(TableHandle {
        name: desc.table_name().unwrap_or_default().to_owned(),
        key_schema: KeySchema {
            partition_key,
            sort_key,
        },
        status: desc
            .table_status()
            .map_or(TableStatus::Other(String::new()), |s| {
                TableStatus::from_provider(s.as_str())
            }),
        arn: desc.table_arn().map(ToOwned::to_owned),
        item_count: desc.item_count().and_then(|c| u64::try_from(c).ok()),
    })
}

fn non_empty<K, V>(map: HashMap<K, V>) -> Option<HashMap<K, V>> {
    (!map.is_empty()).then_some(map)
}

#[async_trait]
impl TableBackend for SdkTables {
    async fn create_table(
        &self,
        name: &str,
        key_schema: &KeySchema,
        read_units: i64,
        write_units: i64,
    ) -> FacadeResult<TableHandle> {
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(read_units)
            .write_capacity_units(write_units)
            .build()
            .map_err(build_err)?;
        let resp = self
            .client
            .create_table()
            .table_name(name)
            .set_key_schema(Some(key_schema_elements(key_schema)?))
            .set_attribute_definitions(Some(attribute_definitions(key_schema)?))
            .provisioned_throughput(throughput)
            .send()
            .await
            .map_facade_err(format!("create table {name}"))?;

        match resp.table_description() {
            Some(desc) => to_handle(desc),
            None => Ok(TableHandle {
                name: name.to_owned(),
                key_schema: key_schema.clone(),
                status: TableStatus::Creating,
                arn: None,
                item_count: None,
            }),
        }
    }

    async fn wait_table_active(&self, name: &str, max_wait: Duration) -> FacadeResult<()> {
        self.client
            .wait_until_table_exists()
            .table_name(name)
            .wait(max_wait)
            .await
            .map_err(|e| FacadeError::wait(format!("table {name} to become active"), e))?;
        Ok(())
    }

    async fn describe_table(&self, name: &str) -> FacadeResult<TableHandle> {
        let resp = self
            .client
            .describe_table()
            .table_name(name)
            .send()
            .await
            .map_facade_err(format!("describe table {name}"))?;
        let desc = resp
            .table()
            .ok_or_else(|| FacadeError::not_found(format!("table {name}")))?;
        to_handle(desc)
    }

    async fn delete_table(&self, name: &str) -> FacadeResult<()> {
        self.client
            .delete_table()
            .table_name(name)
            .send()
            .await
            .map_facade_err(format!("delete table {name}"))?;
        Ok(())
    }

    async fn wait_table_absent(&self, name: &str, max_wait: Duration) -> FacadeResult<()> {
        self.client
            .wait_until_table_not_exists()
            .table_name(name)
            .wait(max_wait)
            .await
            .map_err(|e| FacadeError::wait(format!("table {name} removal"), e))?;
        Ok(())
    }

    async fn put_item(&self, table: &str, item: Item) -> FacadeResult<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_facade_err(format!("put item into {table}"))?;
        Ok(())
    }

    async fn get_item(&self, table: &str, key: Item) -> FacadeResult<Option<Item>> {
        let resp = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(key))
            .consistent_read(true)
            .send()
            .await
            .map_facade_err(format!("get item from {table}"))?;
        Ok(resp.item().cloned())
    }

    async fn update_item(&self, table: &str, key: Item, update: &UpdateSet) -> FacadeResult<()> {
        let rendered = update.render();
        self.client
            .update_item()
            .table_name(table)
            .set_key(Some(key))
            .update_expression(rendered.expression)
            .set_expression_attribute_names(non_empty(rendered.names))
            .set_expression_attribute_values(non_empty(rendered.values))
            .send()
            .await
            .map_facade_err(format!("update item in {table}"))?;
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: Item) -> FacadeResult<Option<Item>> {
        let resp = self
            .client
            .delete_item()
            .table_name(table)
            .set_key(Some(key))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_facade_err(format!("delete item from {table}"))?;
        Ok(resp.attributes().cloned())
    }

    async fn batch_put(&self, table: &str, items: Vec<Item>) -> FacadeResult<Vec<Item>> {
        let requests = items
            .into_iter()
            .map(|item| {
                let put = PutRequest::builder()
                    .set_item(Some(item))
                    .build()
                    .map_err(build_err)?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<FacadeResult<Vec<_>>>()?;
        let count = requests.len();

        let resp = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_facade_err(format!("batch write to {table}"))?;

        let unprocessed: Vec<Item> = resp
            .unprocessed_items()
            .and_then(|tables| tables.get(table))
            .map(|writes| {
                writes
                    .iter()
                    .filter_map(|w| w.put_request().map(|p| p.item().clone()))
                    .collect()
            })
            .unwrap_or_default();
        debug!(table, sent = count, unprocessed = unprocessed.len(), "batch write sent");
        Ok(unprocessed)
    }

    async fn query(
        &self,
        table: &str,
        key: &KeyCondition,
        filter: Option<&Condition>,
        page: &ItemPageRequest,
    ) -> FacadeResult<ItemPage> {
        let rendered = render_query(key, filter);
        let resp = self
            .client
            .query()
            .table_name(table)
            .key_condition_expression(rendered.key_condition)
            .set_filter_expression(rendered.filter)
            .set_expression_attribute_names(non_empty(rendered.names))
            .set_expression_attribute_values(non_empty(rendered.values))
            .set_exclusive_start_key(page.exclusive_start_key.clone())
            .set_limit(page.limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX)))
            .send()
            .await
            .map_facade_err(format!("query {table}"))?;

        Ok(ItemPage {
            items: resp.items().to_vec(),
            last_evaluated_key: resp.last_evaluated_key().cloned(),
        })
    }

    async fn scan(
        &self,
        table: &str,
        filter: Option<&Condition>,
        page: &ItemPageRequest,
    ) -> FacadeResult<ItemPage> {
        let mut req = self
            .client
            .scan()
            .table_name(table)
            .set_exclusive_start_key(page.exclusive_start_key.clone())
            .set_limit(page.limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX)));
        if let Some(filter) = filter {
            let rendered = render_filter(filter);
            req = req
                .filter_expression(rendered.expression)
                .set_expression_attribute_names(non_empty(rendered.names))
                .set_expression_attribute_values(non_empty(rendered.values));
        }
        let resp = req.send().await.map_facade_err(format!("scan {table}"))?;

        Ok(ItemPage {
            items: resp.items().to_vec(),
            last_evaluated_key: resp.last_evaluated_key().cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_derive_definitions_from_key_schema() {
        let schema = KeySchema::partition("pk", KeyType::S).with_sort_key("ts", KeyType::N);
        let elements = key_schema_elements(&schema).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].key_type(), &SdkKeyType::Hash);
        assert_eq!(elements[1].attribute_name(), "ts");

        let defs = attribute_definitions(&schema).unwrap();
        assert_eq!(defs[1].attribute_type(), &ScalarAttributeType::N);
    }

    #[test]
    fn test_should_read_key_schema_from_description() {
        let schema = KeySchema::partition("id", KeyType::N);
        let desc = TableDescription::builder()
            .table_name("t")
            .set_key_schema(Some(key_schema_elements(&schema).unwrap()))
            .set_attribute_definitions(Some(attribute_definitions(&schema).unwrap()))
            .table_status(aws_sdk_dynamodb::types::TableStatus::Active)
            .item_count(4)
            .build();
        let handle = to_handle(&desc).unwrap();
        assert_eq!(handle.name, "t");
        assert_eq!(handle.key_schema, schema);
        assert_eq!(handle.status, TableStatus::Active);
        assert_eq!(handle.item_count, Some(4));
    }
}
