//! Key schema, primary key and table handle types.

use std::collections::HashMap;
use std::fmt;

pub use aws_sdk_dynamodb::types::AttributeValue;
use awsfacade_core::{FacadeError, FacadeResult};

/// An item: attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

/// Read capacity units every table is created with.
pub const READ_CAPACITY_UNITS: i64 = 5;

/// Write capacity units every table is created with.
pub const WRITE_CAPACITY_UNITS: i64 = 5;

/// Maximum put requests in one batch write call.
pub const MAX_BATCH_WRITE: usize = 25;

/// Scalar type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// String.
    S,
    /// Number.
    N,
    /// Binary.
    B,
}

impl KeyType {
    /// Provider type descriptor (`"S"`, `"N"`, `"B"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::N => "N",
            Self::B => "B",
        }
    }

    /// Whether `value` has this scalar type.
    #[must_use]
    pub fn matches(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (Self::S, AttributeValue::S(_))
                | (Self::N, AttributeValue::N(_))
                | (Self::B, AttributeValue::B(_))
        )
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key attribute definition: name and scalar type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyAttribute {
    /// Attribute name.
    pub name: String,
    /// Scalar type.
    pub attr_type: KeyType,
}

impl KeyAttribute {
    /// Define a key attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, attr_type: KeyType) -> Self {
        Self {
            name: name.into(),
            attr_type,
        }
    }
}

/// Table key schema: a partition key and an optional sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeySchema {
    /// Partition (HASH) key.
    pub partition_key: KeyAttribute,
    /// Sort (RANGE) key.
    pub sort_key: Option<KeyAttribute>,
}

impl KeySchema {
    /// Schema with a partition key only.
    #[must_use]
    pub fn partition(name: impl Into<String>, attr_type: KeyType) -> Self {
        Self {
            partition_key: KeyAttribute::new(name, attr_type),
            sort_key: None,
        }
    }

    /// Add a sort key.
    #[must_use]
    pub fn with_sort_key(mut self, name: impl Into<String>, attr_type: KeyType) -> Self {
        self.sort_key = Some(KeyAttribute::new(name, attr_type));
        self
    }

    /// Key attributes, partition key first.
    pub fn attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        std::iter::once(&self.partition_key).chain(self.sort_key.as_ref())
    }

    /// Whether `name` is one of the key attributes.
    #[must_use]
    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.attributes().any(|a| a.name == name)
    }

    /// Pull the primary key out of a full item.
    ///
    /// # Errors
    /// Returns [`FacadeError::InvalidInput`] when a key attribute is missing
    /// or has the wrong type.
    pub fn key_of(&self, item: &Item) -> FacadeResult<PrimaryKey> {
        let fetch = |attr: &KeyAttribute| {
            let value = item.get(&attr.name).ok_or_else(|| {
                FacadeError::invalid_input(format!("item is missing key attribute {}", attr.name))
            })?;
            check_type(attr, value)?;
            Ok::<_, FacadeError>(value.clone())
        };
        Ok(PrimaryKey {
            partition: fetch(&self.partition_key)?,
            sort: self.sort_key.as_ref().map(fetch).transpose()?,
        })
    }
}

fn check_type(attr: &KeyAttribute, value: &AttributeValue) -> FacadeResult<()> {
    if attr.attr_type.matches(value) {
        Ok(())
    } else {
        Err(FacadeError::invalid_input(format!(
            "key attribute {} must be of type {}",
            attr.name, attr.attr_type
        )))
    }
}

/// Primary key of an item.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKey {
    /// Partition key value.
    pub partition: AttributeValue,
    /// Sort key value, for tables that have one.
    pub sort: Option<AttributeValue>,
}

impl PrimaryKey {
    /// Key of a partition-key-only table.
    #[must_use]
    pub fn partition(value: AttributeValue) -> Self {
        Self {
            partition: value,
            sort: None,
        }
    }

    /// Key of a composite-key table.
    #[must_use]
    pub fn composite(partition: AttributeValue, sort: AttributeValue) -> Self {
        Self {
            partition,
            sort: Some(sort),
        }
    }

    /// Check this key against `schema` and render it as an attribute map.
    ///
    /// # Errors
    /// Returns [`FacadeError::InvalidInput`] when the sort key is present
    /// without the schema having one (or the reverse), or a value has the
    /// wrong type.
    pub fn to_item(&self, schema: &KeySchema) -> FacadeResult<Item> {
        check_type(&schema.partition_key, &self.partition)?;
        let mut item = HashMap::from([(schema.partition_key.name.clone(), self.partition.clone())]);
        match (&schema.sort_key, &self.sort) {
            (Some(attr), Some(value)) => {
                check_type(attr, value)?;
                item.insert(attr.name.clone(), value.clone());
            }
            (None, None) => {}
            (Some(attr), None) => {
                return Err(FacadeError::invalid_input(format!(
                    "key is missing sort key {}",
                    attr.name
                )));
            }
            (None, Some(_)) => {
                return Err(FacadeError::invalid_input(
                    "table has no sort key but one was given",
                ));
            }
        }
        Ok(item)
    }
}

/// Table lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    /// Being created.
    Creating,
    /// Ready for reads and writes.
    Active,
    /// Being updated.
    Updating,
    /// Being deleted.
    Deleting,
    /// Any other provider status.
    Other(String),
}

impl TableStatus {
    /// Parse a provider status string.
    #[must_use]
    pub fn from_provider(status: &str) -> Self {
        match status {
            "CREATING" => Self::Creating,
            "ACTIVE" => Self::Active,
            "UPDATING" => Self::Updating,
            "DELETING" => Self::Deleting,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Reference to a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle {
    /// Table name.
    pub name: String,
    /// Key schema.
    pub key_schema: KeySchema,
    /// Lifecycle status.
    pub status: TableStatus,
    /// Table ARN.
    pub arn: Option<String>,
    /// Approximate item count as reported by the provider.
    pub item_count: Option<u64>,
}

/// The table item operations are bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Table name.
    pub name: String,
    /// Key schema.
    pub key_schema: KeySchema,
}

impl TableRef {
    /// Bind a name to a schema.
    #[must_use]
    pub fn new(name: impl Into<String>, key_schema: KeySchema) -> Self {
        Self {
            name: name.into(),
            key_schema,
        }
    }
}

/// Page request for query and scan.
///
/// Item listings resume from the key of the last item evaluated rather than
/// from an opaque token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPageRequest {
    /// `last_evaluated_key` of the previous page.
    pub exclusive_start_key: Option<Item>,
    /// Maximum items to evaluate (before filtering).
    pub limit: Option<usize>,
}

impl ItemPageRequest {
    /// First page, provider default size.
    #[must_use]
    pub fn first() -> Self {
        Self::default()
    }

    /// First page of at most `limit` evaluated items.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            exclusive_start_key: None,
            limit: Some(limit),
        }
    }

    /// Continue after `key`, keeping this request's limit.
    #[must_use]
    pub fn after(&self, key: Item) -> Self {
        Self {
            exclusive_start_key: Some(key),
            limit: self.limit,
        }
    }
}

/// One page of a query or scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPage {
    /// Matching items.
    pub items: Vec<Item>,
    /// Key to resume from; `None` when the listing is exhausted.
    pub last_evaluated_key: Option<Item>,
}

impl ItemPage {
    /// Whether more pages follow.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.last_evaluated_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_owned())
    }

    #[test]
    fn test_should_render_composite_key() {
        let schema = KeySchema::partition("pk", KeyType::S).with_sort_key("sk", KeyType::N);
        let key = PrimaryKey::composite(s("user#1"), AttributeValue::N("7".into()));
        let item = key.to_item(&schema).unwrap();
        assert_eq!(item.len(), 2);
        assert_eq!(item["pk"], s("user#1"));
    }

    #[test]
    fn test_should_reject_key_shape_mismatch() {
        let simple = KeySchema::partition("pk", KeyType::S);
        let composite = simple.clone().with_sort_key("sk", KeyType::S);

        assert!(PrimaryKey::composite(s("a"), s("b")).to_item(&simple).is_err());
        assert!(PrimaryKey::partition(s("a")).to_item(&composite).is_err());
        assert!(
            PrimaryKey::partition(AttributeValue::N("1".into()))
                .to_item(&simple)
                .is_err()
        );
    }

    #[test]
    fn test_should_extract_key_from_item() {
        let schema = KeySchema::partition("id", KeyType::N);
        let item = Item::from([
            ("id".to_owned(), AttributeValue::N("3".into())),
            ("name".to_owned(), s("x")),
        ]);
        let key = schema.key_of(&item).unwrap();
        assert_eq!(key, PrimaryKey::partition(AttributeValue::N("3".into())));

        let err = schema.key_of(&Item::new()).unwrap_err();
        assert_eq!(err.kind(), awsfacade_core::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_should_parse_table_status() {
        assert_eq!(TableStatus::from_provider("ACTIVE"), TableStatus::Active);
        assert_eq!(
            TableStatus::from_provider("ARCHIVED"),
            TableStatus::Other("ARCHIVED".into())
        );
    }
}
