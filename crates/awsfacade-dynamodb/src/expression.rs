//! Condition, key-condition and update expressions.
//!
//! Expressions are built as typed trees and rendered to the provider's
//! expression syntax with every attribute name and value bound through a
//! placeholder (`#n0`, `:v0`), so reserved words and arbitrary values never
//! need escaping. The same trees are evaluated directly against items by the
//! in-memory backend.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use awsfacade_core::{FacadeError, FacadeResult};

use crate::types::{AttributeValue, Item, KeySchema};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

/// A boolean condition over item attributes, used for filters and as the
/// sort-key part of a [`KeyCondition`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `attribute op value`
    Compare {
        /// Attribute name.
        attribute: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand value.
        value: AttributeValue,
    },
    /// `attribute BETWEEN low AND high` (inclusive).
    Between {
        /// Attribute name.
        attribute: String,
        /// Lower bound.
        low: AttributeValue,
        /// Upper bound.
        high: AttributeValue,
    },
    /// `begins_with(attribute, prefix)`
    BeginsWith {
        /// Attribute name.
        attribute: String,
        /// String prefix.
        prefix: String,
    },
    /// `contains(attribute, value)`: substring of a string, or member of a set or list.
    Contains {
        /// Attribute name.
        attribute: String,
        /// Needle.
        value: AttributeValue,
    },
    /// `attribute_exists(attribute)`
    Exists(String),
    /// `attribute_not_exists(attribute)`
    NotExists(String),
    /// Both hold.
    And(Box<Condition>, Box<Condition>),
    /// Either holds.
    Or(Box<Condition>, Box<Condition>),
    /// Negation.
    Not(Box<Condition>),
}

impl Condition {
    /// `attribute op value`
    pub fn compare(attribute: impl Into<String>, op: CompareOp, value: AttributeValue) -> Self {
        Self::Compare {
            attribute: attribute.into(),
            op,
            value,
        }
    }

    /// `attribute = value`
    pub fn eq(attribute: impl Into<String>, value: AttributeValue) -> Self {
        Self::compare(attribute, CompareOp::Eq, value)
    }

    /// `attribute BETWEEN low AND high`
    pub fn between(attribute: impl Into<String>, low: AttributeValue, high: AttributeValue) -> Self {
        Self::Between {
            attribute: attribute.into(),
            low,
            high,
        }
    }

    /// `begins_with(attribute, prefix)`
    pub fn begins_with(attribute: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::BeginsWith {
            attribute: attribute.into(),
            prefix: prefix.into(),
        }
    }

    /// `contains(attribute, value)`
    pub fn contains(attribute: impl Into<String>, value: AttributeValue) -> Self {
        Self::Contains {
            attribute: attribute.into(),
            value,
        }
    }

    /// `attribute_exists(attribute)`
    pub fn exists(attribute: impl Into<String>) -> Self {
        Self::Exists(attribute.into())
    }

    /// `attribute_not_exists(attribute)`
    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Self::NotExists(attribute.into())
    }

    /// `self AND other`
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// `self OR other`
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// `NOT self`
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    fn render(&self, ph: &mut Placeholders) -> String {
        match self {
            Self::Compare {
                attribute,
                op,
                value,
            } => format!("{} {op} {}", ph.name(attribute), ph.value(value)),
            Self::Between {
                attribute,
                low,
                high,
            } => format!(
                "{} BETWEEN {} AND {}",
                ph.name(attribute),
                ph.value(low),
                ph.value(high)
            ),
            Self::BeginsWith { attribute, prefix } => format!(
                "begins_with({}, {})",
                ph.name(attribute),
                ph.value(&AttributeValue::S(prefix.clone()))
            ),
            Self::Contains { attribute, value } => {
                format!("contains({}, {})", ph.name(attribute), ph.value(value))
            }
            Self::Exists(attribute) => format!("attribute_exists({})", ph.name(attribute)),
            Self::NotExists(attribute) => format!("attribute_not_exists({})", ph.name(attribute)),
            Self::And(l, r) => format!("({}) AND ({})", l.render(ph), r.render(ph)),
            Self::Or(l, r) => format!("({}) OR ({})", l.render(ph), r.render(ph)),
            Self::Not(inner) => format!("NOT ({})", inner.render(ph)),
        }
    }

    /// Evaluate against an item. Missing attributes and mismatched types
    /// make comparisons false.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Self::Compare {
                attribute,
                op,
                value,
            } => item
                .get(attribute)
                .is_some_and(|actual| compare_values(actual, value, *op)),
            Self::Between {
                attribute,
                low,
                high,
            } => item.get(attribute).is_some_and(|actual| {
                compare_values(actual, low, CompareOp::Ge) && compare_values(actual, high, CompareOp::Le)
            }),
            Self::BeginsWith { attribute, prefix } => matches!(
                item.get(attribute),
                Some(AttributeValue::S(s)) if s.starts_with(prefix.as_str())
            ),
            Self::Contains { attribute, value } => {
                item.get(attribute).is_some_and(|actual| contains(actual, value))
            }
            Self::Exists(attribute) => item.contains_key(attribute),
            Self::NotExists(attribute) => !item.contains_key(attribute),
            Self::And(l, r) => l.matches(item) && r.matches(item),
            Self::Or(l, r) => l.matches(item) || r.matches(item),
            Self::Not(inner) => !inner.matches(item),
        }
    }

    /// Attribute names this condition reads.
    fn attributes(&self) -> Vec<&str> {
        match self {
            Self::Compare { attribute, .. }
            | Self::Between { attribute, .. }
            | Self::BeginsWith { attribute, .. }
            | Self::Contains { attribute, .. }
            | Self::Exists(attribute)
            | Self::NotExists(attribute) => vec![attribute.as_str()],
            Self::And(l, r) | Self::Or(l, r) => {
                let mut names = l.attributes();
                names.extend(r.attributes());
                names
            }
            Self::Not(inner) => inner.attributes(),
        }
    }
}

/// Key condition of a query: partition-key equality plus an optional
/// condition on the sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    /// Partition key attribute name.
    pub partition_key: String,
    /// Partition key value to match.
    pub partition_value: AttributeValue,
    /// Sort key condition: a comparison other than `<>`, `BETWEEN` or
    /// `begins_with`, on the sort key only.
    pub sort: Option<Condition>,
}

impl KeyCondition {
    /// Match every item of one partition.
    pub fn partition(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            partition_key: name.into(),
            partition_value: value,
            sort: None,
        }
    }

    /// Narrow the partition by a sort key condition.
    #[must_use]
    pub fn with_sort(mut self, condition: Condition) -> Self {
        self.sort = Some(condition);
        self
    }

    /// Check that this condition only addresses `schema`'s keys in a form
    /// the provider accepts.
    ///
    /// # Errors
    /// Returns [`FacadeError::InvalidInput`] describing the first violation.
    pub fn validate(&self, schema: &KeySchema) -> FacadeResult<()> {
        if self.partition_key != schema.partition_key.name {
            return Err(FacadeError::invalid_input(format!(
                "key condition must address partition key {}, not {}",
                schema.partition_key.name, self.partition_key
            )));
        }
        let Some(sort) = &self.sort else {
            return Ok(());
        };
        let Some(sort_key) = &schema.sort_key else {
            return Err(FacadeError::invalid_input(
                "table has no sort key to condition on",
            ));
        };
        let supported = matches!(
            sort,
            Condition::Compare { op, .. } if *op != CompareOp::Ne
        ) || matches!(sort, Condition::Between { .. } | Condition::BeginsWith { .. });
        if !supported {
            return Err(FacadeError::invalid_input(
                "sort key condition must be a comparison, BETWEEN or begins_with",
            ));
        }
        if sort.attributes() != [sort_key.name.as_str()] {
            return Err(FacadeError::invalid_input(format!(
                "sort key condition must address {}",
                sort_key.name
            )));
        }
        Ok(())
    }

    fn as_condition(&self) -> Condition {
        let partition = Condition::eq(self.partition_key.clone(), self.partition_value.clone());
        match &self.sort {
            Some(sort) => partition.and(sort.clone()),
            None => partition,
        }
    }

    fn render(&self, ph: &mut Placeholders) -> String {
        let partition = format!(
            "{} = {}",
            ph.name(&self.partition_key),
            ph.value(&self.partition_value)
        );
        match &self.sort {
            Some(sort) => format!("{partition} AND {}", sort.render(ph)),
            None => partition,
        }
    }

    /// Evaluate against an item.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        self.as_condition().matches(item)
    }
}

/// `SET` update of a fixed set of attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSet {
    assignments: Vec<(String, AttributeValue)>,
}

impl UpdateSet {
    /// Assign every attribute in `attributes`. Assignments are ordered by
    /// attribute name so the rendered expression is stable.
    #[must_use]
    pub fn from_attributes(attributes: Item) -> Self {
        let mut assignments: Vec<_> = attributes.into_iter().collect();
        assignments.sort_by(|a, b| a.0.cmp(&b.0));
        Self { assignments }
    }

    /// Whether there is nothing to assign.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Attribute names assigned.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|(name, _)| name.as_str())
    }

    /// Render as `SET #a0 = :a0, #a1 = :a1, ...`.
    #[must_use]
    pub fn render(&self) -> RenderedExpression {
        let mut ph = Placeholders::new("#a", ":a");
        let clauses: Vec<String> = self
            .assignments
            .iter()
            .map(|(name, value)| format!("{} = {}", ph.name(name), ph.value(value)))
            .collect();
        ph.finish(format!("SET {}", clauses.join(", ")))
    }

    /// Apply the assignments to an item in place.
    pub fn apply(&self, item: &mut Item) {
        for (name, value) in &self.assignments {
            item.insert(name.clone(), value.clone());
        }
    }
}

/// An expression string with its placeholder bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedExpression {
    /// Expression text.
    pub expression: String,
    /// `#name` placeholder to attribute name.
    pub names: HashMap<String, String>,
    /// `:value` placeholder to value.
    pub values: HashMap<String, AttributeValue>,
}

/// Rendered key condition and filter of one query, sharing one set of
/// placeholder bindings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedQuery {
    /// Key condition expression.
    pub key_condition: String,
    /// Filter expression.
    pub filter: Option<String>,
    /// `#name` placeholder to attribute name.
    pub names: HashMap<String, String>,
    /// `:value` placeholder to value.
    pub values: HashMap<String, AttributeValue>,
}

/// Render a query's key condition and optional filter.
#[must_use]
pub fn render_query(key: &KeyCondition, filter: Option<&Condition>) -> RenderedQuery {
    let mut ph = Placeholders::new("#n", ":v");
    let key_condition = key.render(&mut ph);
    let filter = filter.map(|f| f.render(&mut ph));
    RenderedQuery {
        key_condition,
        filter,
        names: ph.names,
        values: ph.values,
    }
}

/// Render a scan filter.
#[must_use]
pub fn render_filter(filter: &Condition) -> RenderedExpression {
    let mut ph = Placeholders::new("#n", ":v");
    let expression = filter.render(&mut ph);
    ph.finish(expression)
}

#[derive(Debug)]
struct Placeholders {
    name_prefix: &'static str,
    value_prefix: &'static str,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    by_attribute: HashMap<String, String>,
}

impl Placeholders {
    fn new(name_prefix: &'static str, value_prefix: &'static str) -> Self {
        Self {
            name_prefix,
            value_prefix,
            names: HashMap::new(),
            values: HashMap::new(),
            by_attribute: HashMap::new(),
        }
    }

    fn name(&mut self, attribute: &str) -> String {
        if let Some(existing) = self.by_attribute.get(attribute) {
            return existing.clone();
        }
        let placeholder = format!("{}{}", self.name_prefix, self.by_attribute.len());
        self.by_attribute
            .insert(attribute.to_owned(), placeholder.clone());
        self.names.insert(placeholder.clone(), attribute.to_owned());
        placeholder
    }

    fn value(&mut self, value: &AttributeValue) -> String {
        let placeholder = format!("{}{}", self.value_prefix, self.values.len());
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    fn finish(self, expression: String) -> RenderedExpression {
        RenderedExpression {
            expression,
            names: self.names,
            values: self.values,
        }
    }
}

pub(crate) fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}

/// Ordering of two scalar values of the same type; `None` across types.
pub(crate) fn scalar_ordering(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left, right) {
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (AttributeValue::N(a), AttributeValue::N(b)) => {
            parse_number(a)?.partial_cmp(&parse_number(b)?)
        }
        (AttributeValue::B(a), AttributeValue::B(b)) => Some(a.as_ref().cmp(b.as_ref())),
        (AttributeValue::Bool(a), AttributeValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn compare_values(left: &AttributeValue, right: &AttributeValue, op: CompareOp) -> bool {
    let Some(ordering) = scalar_ordering(left, right) else {
        // Non-scalar or mismatched types only support (in)equality.
        return match op {
            CompareOp::Eq => left == right,
            CompareOp::Ne => left != right,
            _ => false,
        };
    };
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
    }
}

fn contains(haystack: &AttributeValue, needle: &AttributeValue) -> bool {
    match (haystack, needle) {
        (AttributeValue::S(h), AttributeValue::S(n)) => h.contains(n.as_str()),
        (AttributeValue::Ss(set), AttributeValue::S(n)) => set.contains(n),
        (AttributeValue::Ns(set), AttributeValue::N(n)) => {
            let target = parse_number(n);
            set.iter().any(|m| parse_number(m) == target)
        }
        (AttributeValue::L(list), needle) => list.contains(needle),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KeyType;

    fn s(v: &str) -> AttributeValue {
        AttributeValue::S(v.to_owned())
    }

    fn n(v: &str) -> AttributeValue {
        AttributeValue::N(v.to_owned())
    }

    fn item(pairs: &[(&str, AttributeValue)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn test_should_render_update_set_with_placeholders() {
        let update = UpdateSet::from_attributes(item(&[("status", s("done")), ("count", n("2"))]));
        let rendered = update.render();
        assert_eq!(rendered.expression, "SET #a0 = :a0, #a1 = :a1");
        assert_eq!(rendered.names["#a0"], "count");
        assert_eq!(rendered.names["#a1"], "status");
        assert_eq!(rendered.values[":a1"], s("done"));
    }

    #[test]
    fn test_should_render_query_with_shared_bindings() {
        let key = KeyCondition::partition("pk", s("p1")).with_sort(Condition::begins_with("sk", "2024-"));
        let filter = Condition::compare("size", CompareOp::Gt, n("10")).and(Condition::exists("pk"));
        let rendered = render_query(&key, Some(&filter));

        assert_eq!(rendered.key_condition, "#n0 = :v0 AND begins_with(#n1, :v1)");
        assert_eq!(
            rendered.filter.as_deref(),
            Some("(#n2 > :v2) AND (attribute_exists(#n0))")
        );
        assert_eq!(rendered.names.len(), 3);
        assert_eq!(rendered.values.len(), 3);
    }

    #[test]
    fn test_should_compare_numbers_numerically() {
        let it = item(&[("n", n("10"))]);
        assert!(Condition::compare("n", CompareOp::Gt, n("9")).matches(&it));
        assert!(Condition::between("n", n("1"), n("10")).matches(&it));
        assert!(!Condition::compare("n", CompareOp::Lt, n("9.5")).matches(&it));
    }

    #[test]
    fn test_should_treat_missing_attributes_as_non_matching() {
        let it = item(&[("a", s("x"))]);
        assert!(!Condition::eq("b", s("x")).matches(&it));
        assert!(Condition::eq("b", s("x")).negate().matches(&it));
        assert!(Condition::not_exists("b").matches(&it));
        assert!(!Condition::compare("a", CompareOp::Gt, n("1")).matches(&it));
    }

    #[test]
    fn test_should_evaluate_contains_on_strings_and_sets() {
        let it = item(&[
            ("title", s("hello world")),
            ("tags", AttributeValue::Ss(vec!["a".into(), "b".into()])),
        ]);
        assert!(Condition::contains("title", s("lo wo")).matches(&it));
        assert!(Condition::contains("tags", s("b")).matches(&it));
        assert!(!Condition::contains("tags", s("c")).matches(&it));
    }

    #[test]
    fn test_should_validate_key_condition_against_schema() {
        let schema = KeySchema::partition("pk", KeyType::S).with_sort_key("sk", KeyType::N);
        assert!(KeyCondition::partition("pk", s("a")).validate(&schema).is_ok());
        assert!(
            KeyCondition::partition("pk", s("a"))
                .with_sort(Condition::between("sk", n("1"), n("2")))
                .validate(&schema)
                .is_ok()
        );
        assert!(KeyCondition::partition("other", s("a")).validate(&schema).is_err());
        assert!(
            KeyCondition::partition("pk", s("a"))
                .with_sort(Condition::compare("sk", CompareOp::Ne, n("1")))
                .validate(&schema)
                .is_err()
        );
        assert!(
            KeyCondition::partition("pk", s("a"))
                .with_sort(Condition::eq("other", n("1")))
                .validate(&schema)
                .is_err()
        );
    }
}
