use super::error::FilterError;
use super::types::{quote_ident, OrderBy, SortDirection, TableSpec};

pub struct FilterOrder;

impl FilterOrder {
    /// Parse `"created_at desc, name"` style strings from query parameters.
    pub fn parse(s: &str) -> Vec<OrderBy> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let dir = it.next().unwrap_or("asc");
                let order = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
                out.push(OrderBy { column: col.to_string(), order });
            }
        }
        out
    }

    pub fn generate(table: &TableSpec, order_by: &[OrderBy]) -> Result<String, FilterError> {
        if order_by.is_empty() { return Ok(String::new()); }
        let mut parts = Vec::with_capacity(order_by.len());
        for o in order_by {
            let column = table
                .filterable(&o.column)
                .ok_or_else(|| FilterError::InvalidColumn(o.column.clone()))?;
            parts.push(format!("{} {}", quote_ident(column.name), o.order.to_sql()));
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}
