use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Exact,
    Search,
}

/// A single column/comparison/value predicate fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    #[serde(default)]
    pub value: String,
}

impl Filter {
    pub fn exact(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self { column: column.into(), filter_type: FilterType::Exact, value: value.into() }
    }

    pub fn search(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self { column: column.into(), filter_type: FilterType::Search, value: value.into() }
    }

    /// Empty values carry no constraint and never reach SQL.
    pub fn is_active(&self) -> bool {
        !self.value.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub order: SortDirection,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self { column: column.into(), order: SortDirection::Asc }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self { column: column.into(), order: SortDirection::Desc }
    }
}

/// Pagination, filters and ordering for a list request.
///
/// `page` and `limit` are kept as received; [`GetListFilter::page`] and
/// [`GetListFilter::limit`] apply the defaults (1 and 10) to anything
/// non-positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetListFilter {
    pub page: i64,
    pub limit: i64,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
}

impl Default for GetListFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE, Self::DEFAULT_LIMIT)
    }
}

impl GetListFilter {
    pub const DEFAULT_PAGE: i64 = 1;
    pub const DEFAULT_LIMIT: i64 = 10;

    pub fn new(page: i64, limit: i64) -> Self {
        Self { page, limit, filters: vec![], order_by: vec![] }
    }

    /// Build from raw query-string values. Missing or unparsable values fall
    /// back to the defaults.
    pub fn from_params(page: Option<&str>, limit: Option<&str>) -> Self {
        let parse = |raw: Option<&str>, default: i64| {
            raw.and_then(|s| s.trim().parse::<i64>().ok()).filter(|n| *n > 0).unwrap_or(default)
        };
        Self::new(parse(page, Self::DEFAULT_PAGE), parse(limit, Self::DEFAULT_LIMIT))
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Caps the page size. Used to enforce `FILTER_MAX_LIMIT`.
    pub fn capped(mut self, max_limit: Option<i64>) -> Self {
        if let Some(max) = max_limit.filter(|m| *m > 0) {
            if self.limit() > max {
                tracing::debug!("Limit {} exceeds max {}, capping to max", self.limit, max);
                self.limit = max;
            }
        }
        self
    }

    pub fn page(&self) -> i64 {
        if self.page < 1 { Self::DEFAULT_PAGE } else { self.page }
    }

    pub fn limit(&self) -> i64 {
        if self.limit < 1 { Self::DEFAULT_LIMIT } else { self.limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Uuid(Uuid),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    TextArray(Vec<String>),
    /// NULL typed as the given column kind.
    Null(ColumnKind),
}

impl SqlValue {
    pub fn opt<T: Into<SqlValue>>(value: Option<T>, kind: ColumnKind) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null(kind))
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<Vec<String>> for SqlValue {
    fn from(v: Vec<String>) -> Self {
        SqlValue::TextArray(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Uuid,
    Float,
    Bool,
    Timestamp,
    TextArray,
}

impl ColumnKind {
    /// Convert a filter value to the column's bind type.
    pub fn parse(&self, raw: &str) -> Result<SqlValue, String> {
        match self {
            ColumnKind::Text | ColumnKind::TextArray => Ok(SqlValue::Text(raw.to_string())),
            ColumnKind::Uuid => Uuid::parse_str(raw)
                .map(SqlValue::Uuid)
                .map_err(|_| format!("'{}' is not a valid UUID", raw)),
            ColumnKind::Float => raw
                .parse::<f64>()
                .map(SqlValue::Float)
                .map_err(|_| format!("'{}' is not a number", raw)),
            ColumnKind::Bool => raw
                .parse::<bool>()
                .map(SqlValue::Bool)
                .map_err(|_| format!("'{}' is not a boolean", raw)),
            ColumnKind::Timestamp => DateTime::parse_from_rfc3339(raw)
                .map(|t| SqlValue::Timestamp(t.with_timezone(&Utc)))
                .map_err(|_| format!("'{}' is not an RFC 3339 timestamp", raw)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Private columns are projected but never filtered or ordered on.
    pub filterable: bool,
}

impl ColumnSpec {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, filterable: true }
    }

    pub const fn private(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, filterable: false }
    }
}

/// Table name plus the closed set of columns a repository exposes.
#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn filterable(&self, name: &str) -> Option<&ColumnSpec> {
        self.column(name).filter(|c| c.filterable)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn projection(&self) -> String {
        self.columns.iter().map(|c| quote_ident(c.name)).collect::<Vec<_>>().join(", ")
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A column assignment accepted by `update_field`. Each entity provides a
/// closed enum of these.
pub trait UpdatableField {
    fn column(&self) -> &'static str;
    fn to_value(&self) -> SqlValue;
}

/// Bulk field patch: `SET` every item `WHERE` every exact filter holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFieldRequest<F> {
    pub items: Vec<F>,
    #[serde(default)]
    pub filter: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlValue>,
}

/// Row page plus the matching count statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSql {
    pub rows: SqlResult,
    pub count: SqlResult,
}
