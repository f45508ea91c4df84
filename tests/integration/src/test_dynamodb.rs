//! Table facade integration tests.

#[cfg(test)]
mod tests {
    use awsfacade_dynamodb::{
        AttributeValue, CompareOp, Condition, ItemPageRequest, KeyCondition, KeySchema, KeyType,
        PrimaryKey, SdkTables, TableFacade, TableRef, TableStatus, item,
    };

    use crate::{dynamodb_client, facade_config, sdk_config, unique_name};

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_owned())
    }

    fn n(v: i64) -> AttributeValue {
        AttributeValue::N(v.to_string())
    }

    async fn orders_table() -> TableFacade<SdkTables> {
        let name = unique_name("orders");
        let schema = KeySchema::partition("customer", KeyType::S).with_sort_key("order", KeyType::N);
        let tables = TableFacade::new(
            SdkTables::from_sdk_config(&sdk_config()),
            TableRef::new(name.clone(), schema.clone()),
            &facade_config(),
        );
        let handle = tables.create_table(&name, &schema).await.unwrap();
        assert_eq!(handle.status, TableStatus::Active);
        tables
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_manage_table_lifecycle() {
        let tables = orders_table().await;
        let name = tables.table().name.clone();

        let described = tables.get_table(&name).await.unwrap().unwrap();
        assert_eq!(described.key_schema, tables.table().key_schema);

        tables.delete_table(&name).await.unwrap();
        assert!(tables.get_table(&name).await.unwrap().is_none());

        let listed = dynamodb_client().list_tables().send().await.unwrap();
        assert!(!listed.table_names().contains(&name));
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_put_update_and_delete_item() {
        let tables = orders_table().await;
        let key = PrimaryKey::composite(s("alice"), n(1));

        let stored = tables
            .put_item(&key, item([("status", s("new"))]))
            .await
            .unwrap();
        assert_eq!(stored.get("customer"), Some(&s("alice")));

        let updated = tables
            .update_item(&key, item([("status", s("shipped")), ("total", n(42))]))
            .await
            .unwrap();
        assert_eq!(updated.get("status"), Some(&s("shipped")));
        assert_eq!(updated.get("total"), Some(&n(42)));

        assert!(tables.delete_item(&key).await.unwrap());
        assert!(!tables.delete_item(&key).await.unwrap());
        assert!(tables.get_item(&key).await.unwrap().is_none());

        let name = tables.table().name.clone();
        tables.delete_table(&name).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_batch_write_then_query_and_scan() {
        let tables = orders_table().await;
        let name = tables.table().name.clone();

        let items = (0..30).map(|i| {
            item([
                ("customer", s(if i % 2 == 0 { "bob" } else { "carol" })),
                ("order", n(i)),
                ("total", n(i * 10)),
            ])
        });
        let written = tables.batch_write(&name, items, None).await.unwrap();
        assert_eq!(written, 30);

        let stored = dynamodb_client()
            .get_item()
            .table_name(&name)
            .key("customer", s("carol"))
            .key("order", n(29))
            .send()
            .await
            .unwrap();
        assert_eq!(stored.item().and_then(|i| i.get("total")), Some(&n(290)));

        let key = KeyCondition::partition("customer", s("bob"))
            .with_sort(Condition::between("order", n(0), n(9)));
        let page = tables
            .query(&key, None, &ItemPageRequest::first())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 5);

        let filter = Condition::compare("total", CompareOp::Ge, n(250));
        let scanned = tables
            .scan(Some(&filter), &ItemPageRequest::first())
            .await
            .unwrap();
        assert_eq!(scanned.items.len(), 5);

        tables.delete_table(&name).await.unwrap();
    }
}
