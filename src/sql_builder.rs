//! Parameterized SELECT construction for the local catalog store.
//!
//! Filter values are only ever bound through `?` placeholders; user text is
//! never spliced into the statement. Methods chain on `&mut Self`.
//!
//! # Example
//!
//! ```rust
//! use localmarket_sdk::SqlBuilder;
//! let (sql, params) = SqlBuilder::new("products")
//!     .where_contains(&["name", "market_name"], "rice")
//!     .where_date_gte("CAST(created_at AS DATE)", "2024-01-01")
//!     .order_by(&["price_per_unit ASC", "id ASC"])
//!     .limit(32)
//!     .build();
//! ```

/// Accumulates the pieces of one query over a single table.
///
/// Parameters are bound as text; typed comparisons cast the placeholder
/// (`CAST(? AS DATE)`) so DuckDB never has to guess.
#[derive(Debug, Clone)]
pub struct SqlBuilder {
    table: String,
    columns: Vec<String>,
    conditions: Vec<String>,
    bindings: Vec<String>,
    ordering: Vec<String>,
    page: (Option<u64>, Option<u64>),
}

impl SqlBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: vec!["*".to_string()],
            conditions: Vec::new(),
            bindings: Vec::new(),
            ordering: Vec::new(),
            page: (None, None),
        }
    }

    /// Replace the default `*` projection.
    pub fn select(&mut self, columns: &[&str]) -> &mut Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Raw condition; `values` bind to its placeholders in order.
    pub fn where_clause(&mut self, condition: &str, values: &[&str]) -> &mut Self {
        self.push_condition(condition.to_string(), values.iter().map(|v| v.to_string()))
    }

    /// `{column} = ?`
    pub fn where_eq(&mut self, column: &str, value: &str) -> &mut Self {
        self.push_condition(format!("{column} = ?"), [value.to_string()])
    }

    /// Case-insensitive substring match against any of `columns`.
    ///
    /// `%`, `_` and `\` in `text` match literally. Generates:
    /// `(LOWER(a) LIKE LOWER(?) ESCAPE '\' OR LOWER(b) LIKE ...)`
    pub fn where_contains(&mut self, columns: &[&str], text: &str) -> &mut Self {
        if columns.is_empty() {
            return self;
        }
        let pattern = format!("%{}%", escape_like(text));
        let alternatives = columns
            .iter()
            .map(|c| format!("LOWER({c}) LIKE LOWER(?) ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.push_condition(
            format!("({alternatives})"),
            std::iter::repeat(pattern).take(columns.len()),
        )
    }

    /// `{expr} >= CAST(? AS DATE)`
    pub fn where_date_gte(&mut self, expr: &str, date: &str) -> &mut Self {
        self.push_condition(format!("{expr} >= CAST(? AS DATE)"), [date.to_string()])
    }

    /// `{expr} <= CAST(? AS DATE)`
    pub fn where_date_lte(&mut self, expr: &str, date: &str) -> &mut Self {
        self.push_condition(format!("{expr} <= CAST(? AS DATE)"), [date.to_string()])
    }

    /// Append sort terms such as `"created_at DESC"`; earlier terms win.
    pub fn order_by(&mut self, terms: &[&str]) -> &mut Self {
        self.ordering.extend(terms.iter().map(|t| t.to_string()));
        self
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.page.0 = Some(n);
        self
    }

    pub fn offset(&mut self, n: u64) -> &mut Self {
        self.page.1 = Some(n);
        self
    }

    /// The statement and its bindings, one clause per line.
    pub fn build(&self) -> (String, Vec<String>) {
        let mut lines = self.head(&self.columns.join(", "));
        if !self.ordering.is_empty() {
            lines.push(format!("ORDER BY {}", self.ordering.join(", ")));
        }
        let (limit, offset) = self.page;
        lines.extend(limit.map(|n| format!("LIMIT {n}")));
        lines.extend(offset.map(|n| format!("OFFSET {n}")));
        (lines.join("\n"), self.bindings.clone())
    }

    /// `SELECT COUNT(*) AS total` over the same table and conditions,
    /// ignoring projection, ordering and paging.
    pub fn build_count(&self) -> (String, Vec<String>) {
        (self.head("COUNT(*) AS total").join("\n"), self.bindings.clone())
    }

    fn push_condition<I>(&mut self, condition: String, values: I) -> &mut Self
    where
        I: IntoIterator<Item = String>,
    {
        self.conditions.push(condition);
        self.bindings.extend(values);
        self
    }

    /// SELECT, FROM and (if any) WHERE lines.
    fn head(&self, projection: &str) -> Vec<String> {
        let mut lines = vec![format!("SELECT {projection}"), format!("FROM {}", self.table)];
        if !self.conditions.is_empty() {
            lines.push(format!("WHERE {}", self.conditions.join(" AND ")));
        }
        lines
    }
}

fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
