//! Key-value table facade.
//!
//! [`TableFacade`] is bound to one table and wraps a [`TableBackend`]:
//! [`SdkTables`] talks to DynamoDB through `aws-sdk-dynamodb`,
//! [`MemoryTables`] keeps tables in process memory.
//!
//! Filters and key conditions are typed [`Condition`] trees rendered to
//! placeholder-bound expressions, never raw expression strings.

mod backend;
pub mod expression;
mod facade;
mod memory;
mod sdk;
mod types;

pub use backend::TableBackend;
pub use expression::{CompareOp, Condition, KeyCondition, UpdateSet};
pub use facade::{TableFacade, item};
pub use memory::MemoryTables;
pub use sdk::SdkTables;
pub use types::{
    AttributeValue, Item, ItemPage, ItemPageRequest, KeyAttribute, KeySchema, KeyType,
    MAX_BATCH_WRITE, PrimaryKey, READ_CAPACITY_UNITS, TableHandle, TableRef, TableStatus,
    WRITE_CAPACITY_UNITS,
};
