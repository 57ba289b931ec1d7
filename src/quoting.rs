//! Identifier quoting and small SQL fragment helpers.
//!
//! Every query the pipeline issues is assembled from these quoted fragments
//! concatenated with static SQL; value parameters are always bound
//! separately and never pass through here.

/// Bracket-quote a SQL Server identifier, doubling any embedded `]`.
pub fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Bracket-quote a `schema.table` pair into `[schema].[table]`.
pub fn quote_qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Build a `col1 IS NOT NULL AND col2 IS NOT NULL ...` fragment.
pub fn not_null_filter<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns
        .into_iter()
        .map(|c| format!("{} IS NOT NULL", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Comma-join a set of columns, each bracket-quoted.
pub fn quoted_column_list<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns
        .into_iter()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Append a table's sample clause (if any) to its quoted name, so every
/// measurement against the table shares the same sampling basis.
pub fn from_clause(qualified: &str, sample_clause: &str) -> String {
    if sample_clause.is_empty() {
        qualified.to_string()
    } else {
        format!("{qualified} {sample_clause}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_identifier() {
        assert_eq!(quote_ident("Orders"), "[Orders]");
    }

    #[test]
    fn doubles_embedded_closing_bracket() {
        assert_eq!(quote_ident("Weird]Name"), "[Weird]]Name]");
    }

    #[test]
    fn qualifies_schema_and_table() {
        assert_eq!(quote_qualified("dbo", "Orders"), "[dbo].[Orders]");
    }

    #[test]
    fn builds_not_null_filter_for_multiple_columns() {
        assert_eq!(
            not_null_filter(["A", "B"]),
            "[A] IS NOT NULL AND [B] IS NOT NULL"
        );
    }

    #[test]
    fn quoted_column_list_joins_with_commas() {
        assert_eq!(quoted_column_list(["A", "B", "C"]), "[A], [B], [C]");
    }
}
