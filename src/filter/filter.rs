use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{
    quote_ident, GetListFilter, ListSql, SqlResult, SqlValue, TableSpec, UpdatableField, UpdateFieldRequest,
};

/// Statement builder for one table. Pure: produces SQL text and parameters,
/// never touches the pool.
pub struct FilterQuery<'t> {
    table: &'t TableSpec,
}

impl<'t> FilterQuery<'t> {
    pub fn new(table: &'t TableSpec) -> Result<Self, FilterError> {
        Self::validate_table_name(table.name)?;
        Ok(Self { table })
    }

    pub fn table(&self) -> &TableSpec {
        self.table
    }

    /// SELECT for one page of rows.
    pub fn to_sql(&self, req: &GetListFilter) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(req)?;
        let order_clause = FilterOrder::generate(self.table, &req.order_by)?;

        let mut params = where_result.params;
        let limit_index = params.len() + 1;
        params.push(SqlValue::Int(req.limit()));
        params.push(SqlValue::Int(req.offset()));

        let query = [
            format!("SELECT {}", self.table.projection()),
            format!("FROM {}", quote_ident(self.table.name)),
            if where_result.query.is_empty() { String::new() } else { format!("WHERE {}", where_result.query) },
            order_clause,
            format!("LIMIT ${} OFFSET ${}", limit_index, limit_index + 1),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }

    /// The WHERE predicate alone; empty when no filter applies.
    pub fn to_where_sql(&self, req: &GetListFilter) -> Result<SqlResult, FilterError> {
        let (query, params) = FilterWhere::generate(self.table, &req.filters, 0)?;
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self, req: &GetListFilter) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql(req)?;
        let table = quote_ident(self.table.name);
        let query = if where_result.query.is_empty() {
            format!("SELECT COUNT(*) AS count FROM {}", table)
        } else {
            format!("SELECT COUNT(*) AS count FROM {} WHERE {}", table, where_result.query)
        };
        Ok(SqlResult { query, params: where_result.params })
    }

    /// Page and count statements built from the same predicate.
    pub fn to_list_sql(&self, req: &GetListFilter) -> Result<ListSql, FilterError> {
        Ok(ListSql { rows: self.to_sql(req)?, count: self.to_count_sql(req)? })
    }

    pub fn to_select_by_sql(&self, column: &str, value: SqlValue) -> Result<SqlResult, FilterError> {
        let column = self.known_column(column)?;
        Ok(SqlResult {
            query: format!(
                "SELECT {} FROM {} WHERE {} = $1",
                self.table.projection(),
                quote_ident(self.table.name),
                quote_ident(column)
            ),
            params: vec![value],
        })
    }

    pub fn to_delete_by_sql(&self, column: &str, value: SqlValue) -> Result<SqlResult, FilterError> {
        let column = self.known_column(column)?;
        Ok(SqlResult {
            query: format!("DELETE FROM {} WHERE {} = $1", quote_ident(self.table.name), quote_ident(column)),
            params: vec![value],
        })
    }

    /// UPDATE setting every item, filtered by an AND of exact filters.
    pub fn to_update_sql<F: UpdatableField>(&self, req: &UpdateFieldRequest<F>) -> Result<SqlResult, FilterError> {
        self.to_update_sql_excluding(req, vec![])
    }

    /// Like [`FilterQuery::to_update_sql`], but rows where an `exclude`
    /// column holds the given value are never touched.
    pub fn to_update_sql_excluding<F: UpdatableField>(
        &self,
        req: &UpdateFieldRequest<F>,
        exclude: Vec<(&str, SqlValue)>,
    ) -> Result<SqlResult, FilterError> {
        if req.items.is_empty() {
            return Err(FilterError::EmptyUpdate);
        }

        let mut assignments = Vec::with_capacity(req.items.len() + 1);
        let mut params = Vec::with_capacity(req.items.len() + req.filter.len());
        for item in &req.items {
            let column = self.known_column(item.column())?;
            params.push(item.to_value());
            assignments.push(format!("{} = ${}", quote_ident(column), params.len()));
        }
        if self.table.has_column("updated_at") {
            assignments.push("\"updated_at\" = now()".to_string());
        }

        let (where_clause, where_params) = FilterWhere::generate_exact(self.table, &req.filter, params.len())?;
        if where_clause.is_empty() {
            return Err(FilterError::MissingUpdateFilter);
        }
        params.extend(where_params);

        let mut conditions = vec![where_clause];
        for (name, value) in exclude {
            let column = quote_ident(self.known_column(name)?);
            params.push(value);
            conditions.push(format!("{} <> ${}", column, params.len()));
        }

        let query = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(self.table.name),
            assignments.join(", "),
            conditions.join(" AND ")
        );
        Ok(SqlResult { query, params })
    }

    /// `INSERT ... RETURNING` the full projection.
    pub fn to_insert_sql(&self, values: Vec<(&str, SqlValue)>) -> Result<SqlResult, FilterError> {
        if values.is_empty() {
            return Err(FilterError::EmptyUpdate);
        }
        let mut columns = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        let mut params = Vec::with_capacity(values.len());
        for (name, value) in values {
            columns.push(quote_ident(self.known_column(name)?));
            params.push(value);
            placeholders.push(format!("${}", params.len()));
        }
        Ok(SqlResult {
            query: format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                quote_ident(self.table.name),
                columns.join(", "),
                placeholders.join(", "),
                self.table.projection()
            ),
            params,
        })
    }

    /// Partial update of the row matching `key`. A NULL parameter keeps the
    /// stored value; `guard` adds equality conditions checked atomically.
    pub fn to_patch_sql(
        &self,
        key: (&str, SqlValue),
        changes: Vec<(&str, SqlValue)>,
        guard: Vec<(&str, SqlValue)>,
    ) -> Result<SqlResult, FilterError> {
        let key_column = self.known_column(key.0)?;
        let mut params = vec![key.1];

        let mut assignments = Vec::with_capacity(changes.len() + 1);
        for (name, value) in changes {
            let column = quote_ident(self.known_column(name)?);
            params.push(value);
            assignments.push(format!("{} = COALESCE(${}, {})", column, params.len(), column));
        }
        if self.table.has_column("updated_at") {
            assignments.push("\"updated_at\" = now()".to_string());
        }
        if assignments.is_empty() {
            return Err(FilterError::EmptyUpdate);
        }

        let mut conditions = vec![format!("{} = $1", quote_ident(key_column))];
        for (name, value) in guard {
            let column = quote_ident(self.known_column(name)?);
            params.push(value);
            conditions.push(format!("{} = ${}", column, params.len()));
        }

        Ok(SqlResult {
            query: format!(
                "UPDATE {} SET {} WHERE {} RETURNING {}",
                quote_ident(self.table.name),
                assignments.join(", "),
                conditions.join(" AND "),
                self.table.projection()
            ),
            params,
        })
    }

    fn known_column(&self, name: &str) -> Result<&'static str, FilterError> {
        self.table
            .column(name)
            .map(|c| c.name)
            .ok_or_else(|| FilterError::InvalidColumn(name.to_string()))
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        match chars.next() {
            None => Err(FilterError::InvalidTableName("Table name cannot be empty".to_string())),
            Some(first) if !(first.is_ascii_alphabetic() || first == '_') => {
                Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)))
            }
            Some(_) if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') => {
                Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)))
            }
            Some(_) => Ok(()),
        }
    }
}
