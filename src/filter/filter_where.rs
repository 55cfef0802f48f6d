use super::error::FilterError;
use super::types::{quote_ident, ColumnKind, Filter, FilterType, SqlValue, TableSpec};

/// Renders a filter list into a WHERE predicate with `$n` placeholders.
///
/// Grouping: filters on the same column, and search filters carrying the same
/// term, land in one OR group. Groups are AND-ed together.
pub struct FilterWhere {
    param_values: Vec<SqlValue>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self { param_values: vec![], param_index: starting_param_index }
    }

    /// Returns the predicate (empty when nothing applies) and its parameters.
    pub fn generate(
        table: &TableSpec,
        filters: &[Filter],
        starting_param_index: usize,
    ) -> Result<(String, Vec<SqlValue>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let clause = filter_where.build(table, filters)?;
        Ok((clause, filter_where.param_values))
    }

    /// Like [`FilterWhere::generate`] but only exact filters are accepted.
    pub fn generate_exact(
        table: &TableSpec,
        filters: &[Filter],
        starting_param_index: usize,
    ) -> Result<(String, Vec<SqlValue>), FilterError> {
        if filters.iter().any(|f| f.filter_type == FilterType::Search) {
            return Err(FilterError::UnsupportedFilterType("search".to_string()));
        }
        Self::generate(table, filters, starting_param_index)
    }

    fn build(&mut self, table: &TableSpec, filters: &[Filter]) -> Result<String, FilterError> {
        let mut sql_conditions = vec![];
        for group in group_filters(filters) {
            let mut predicates = Vec::with_capacity(group.len());
            for filter in group {
                predicates.push(self.build_sql_condition(table, filter)?);
            }
            if predicates.len() == 1 {
                sql_conditions.extend(predicates);
            } else {
                sql_conditions.push(format!("({})", predicates.join(" OR ")));
            }
        }
        Ok(sql_conditions.join(" AND "))
    }

    fn build_sql_condition(&mut self, table: &TableSpec, filter: &Filter) -> Result<String, FilterError> {
        let column = table
            .filterable(&filter.column)
            .ok_or_else(|| FilterError::InvalidColumn(filter.column.clone()))?;
        let quoted_column = quote_ident(column.name);

        match filter.filter_type {
            FilterType::Exact => {
                let value = column.kind.parse(&filter.value).map_err(|reason| FilterError::InvalidValue {
                    column: filter.column.clone(),
                    reason,
                })?;
                if column.kind == ColumnKind::TextArray {
                    Ok(format!("{} = ANY({})", self.param(value), quoted_column))
                } else {
                    Ok(format!("{} = {}", quoted_column, self.param(value)))
                }
            }
            FilterType::Search => {
                let target = if column.kind == ColumnKind::Text {
                    quoted_column
                } else {
                    format!("{}::text", quoted_column)
                };
                let pattern = format!("%{}%", escape_like(&filter.value));
                Ok(format!("{} ILIKE {}", target, self.param(SqlValue::Text(pattern))))
            }
        }
    }

    fn param(&mut self, value: SqlValue) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

/// Splits the non-empty filters into OR groups, in order of first appearance.
pub fn group_filters(filters: &[Filter]) -> Vec<Vec<&Filter>> {
    let active: Vec<&Filter> = filters.iter().filter(|f| f.is_active()).collect();

    // union-find; the root of each group is its lowest index
    let mut parent: Vec<usize> = (0..active.len()).collect();
    fn root(parent: &[usize], mut i: usize) -> usize {
        while parent[i] != i {
            i = parent[i];
        }
        i
    }
    for i in 0..active.len() {
        for j in 0..i {
            if shares_intent(active[i], active[j]) {
                let (a, b) = (root(&parent, i), root(&parent, j));
                if a != b {
                    parent[a.max(b)] = a.min(b);
                }
            }
        }
    }

    let mut groups: Vec<(usize, Vec<&Filter>)> = vec![];
    for (i, filter) in active.iter().enumerate() {
        let r = root(&parent, i);
        match groups.iter_mut().find(|(key, _)| *key == r) {
            Some((_, group)) => group.push(filter),
            None => groups.push((r, vec![filter])),
        }
    }
    groups.into_iter().map(|(_, group)| group).collect()
}

fn shares_intent(a: &Filter, b: &Filter) -> bool {
    a.column == b.column
        || (a.filter_type == FilterType::Search && b.filter_type == FilterType::Search && a.value == b.value)
}

/// Escape ILIKE metacharacters so a search term matches literally.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::ColumnSpec;

    static ITEMS: TableSpec = TableSpec {
        name: "items",
        columns: &[
            ColumnSpec::new("id", ColumnKind::Uuid),
            ColumnSpec::new("name", ColumnKind::Text),
            ColumnSpec::new("category", ColumnKind::Text),
            ColumnSpec::new("price", ColumnKind::Float),
            ColumnSpec::new("tags", ColumnKind::TextArray),
            ColumnSpec::private("secret", ColumnKind::Text),
        ],
    };

    #[test]
    fn no_filters_yields_empty_clause() {
        let (sql, params) = FilterWhere::generate(&ITEMS, &[], 0).unwrap();
        assert_eq!(sql, "");
        assert!(params.is_empty());
    }

    #[test]
    fn empty_values_are_skipped() {
        let filters = vec![Filter::exact("name", ""), Filter::search("category", ""), Filter::exact("category", "Retail")];
        let (sql, params) = FilterWhere::generate(&ITEMS, &filters, 0).unwrap();
        assert_eq!(sql, "\"category\" = $1");
        assert_eq!(params, vec![SqlValue::Text("Retail".into())]);
    }

    #[test]
    fn same_search_term_is_ored_across_columns() {
        let filters = vec![Filter::search("name", "cafe"), Filter::search("category", "cafe")];
        let (sql, params) = FilterWhere::generate(&ITEMS, &filters, 0).unwrap();
        assert_eq!(sql, "(\"name\" ILIKE $1 OR \"category\" ILIKE $2)");
        assert_eq!(params[0], SqlValue::Text("%cafe%".into()));
    }

    #[test]
    fn different_columns_are_anded() {
        let filters = vec![
            Filter::search("name", "cafe"),
            Filter::search("category", "cafe"),
            Filter::exact("price", "12.5"),
        ];
        let (sql, params) = FilterWhere::generate(&ITEMS, &filters, 0).unwrap();
        assert_eq!(sql, "(\"name\" ILIKE $1 OR \"category\" ILIKE $2) AND \"price\" = $3");
        assert_eq!(params[2], SqlValue::Float(12.5));
    }

    #[test]
    fn same_column_exact_filters_are_ored() {
        let filters = vec![Filter::exact("category", "Retail"), Filter::exact("category", "Service")];
        let (sql, _) = FilterWhere::generate(&ITEMS, &filters, 0).unwrap();
        assert_eq!(sql, "(\"category\" = $1 OR \"category\" = $2)");
    }

    #[test]
    fn numbering_starts_after_offset() {
        let (sql, _) = FilterWhere::generate(&ITEMS, &[Filter::exact("name", "x")], 3).unwrap();
        assert_eq!(sql, "\"name\" = $4");
    }

    #[test]
    fn non_text_search_casts_and_array_exact_uses_any() {
        let filters = vec![Filter::search("price", "12"), Filter::exact("tags", "vegan")];
        let (sql, _) = FilterWhere::generate(&ITEMS, &filters, 0).unwrap();
        assert_eq!(sql, "\"price\"::text ILIKE $1 AND $2 = ANY(\"tags\")");
    }

    #[test]
    fn search_term_wildcards_are_escaped() {
        let (_, params) = FilterWhere::generate(&ITEMS, &[Filter::search("name", "50%_off\\")], 0).unwrap();
        assert_eq!(params, vec![SqlValue::Text("%50\\%\\_off\\\\%".into())]);
    }

    #[test]
    fn user_values_never_appear_in_sql_text() {
        let evil = "x'; DROP TABLE items; --";
        let (sql, _) = FilterWhere::generate(&ITEMS, &[Filter::exact("name", evil), Filter::search("category", evil)], 0).unwrap();
        assert!(!sql.contains("DROP"));
    }

    #[test]
    fn unknown_or_private_columns_are_rejected() {
        let err = FilterWhere::generate(&ITEMS, &[Filter::exact("nope", "1")], 0).unwrap_err();
        assert_eq!(err, FilterError::InvalidColumn("nope".into()));
        let err = FilterWhere::generate(&ITEMS, &[Filter::exact("secret", "1")], 0).unwrap_err();
        assert_eq!(err, FilterError::InvalidColumn("secret".into()));
    }

    #[test]
    fn malformed_typed_value_is_rejected() {
        let err = FilterWhere::generate(&ITEMS, &[Filter::exact("id", "abc")], 0).unwrap_err();
        assert!(matches!(err, FilterError::InvalidValue { .. }));
    }

    #[test]
    fn exact_only_rejects_search() {
        let err = FilterWhere::generate_exact(&ITEMS, &[Filter::search("name", "a")], 0).unwrap_err();
        assert!(matches!(err, FilterError::UnsupportedFilterType(_)));
    }

    #[test]
    fn grouping_merges_transitively() {
        let filters = vec![
            Filter::search("name", "a"),
            Filter::exact("price", "1"),
            Filter::search("category", "a"),
            Filter::exact("name", "b"),
        ];
        let groups = group_filters(&filters);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[1][0].column, "price");
    }
}
