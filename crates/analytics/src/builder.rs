//! Query builder for composing metric SQL
//!
//! Two pieces:
//! - [`QueryBuilder`] assembles one `SELECT` (with optional CTEs, joins,
//!   grouping and `HAVING`) from expression text.
//! - [`QueryContext`] tracks what the text depends on: the dialect, the
//!   bound parameters and any approximations the fragments carry. It is
//!   consumed into a [`CompiledQuery`] ready for execution.
//!
//! Expression text handed to the builder must come from dialect fragments,
//! schema identifiers or placeholders. Values never go in as text.

use std::fmt;

use taxi_query::{Bindings, ParamValue, Placeholder, Statement};

use crate::dialect::{Approximation, Dialect, Fragment};

/// Join type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    FullOuter,
}

impl JoinKind {
    fn keyword(&self) -> &'static str {
        match self {
            Self::Inner => "JOIN",
            Self::Left => "LEFT JOIN",
            Self::FullOuter => "FULL OUTER JOIN",
        }
    }
}

/// Query builder for analytics SQL
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    ctes: Vec<(String, String)>,
    from: String,
    joins: Vec<String>,
    select: Vec<String>,
    where_clauses: Vec<String>,
    group_by: Vec<String>,
    having: Vec<String>,
    order_by: Vec<String>,
    limit: Option<String>,
}

impl QueryBuilder {
    /// Create a new query builder for a table
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            ctes: Vec::new(),
            from: table.into(),
            joins: Vec::new(),
            select: Vec::new(),
            where_clauses: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Create a builder reading from an aliased table (`trips t`)
    pub fn aliased(table: &str, alias: &str) -> Self {
        Self::new(format!("{} {}", table, alias))
    }

    /// Add a common table expression
    pub fn with_cte(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.ctes.push((name.into(), body.into()));
        self
    }

    /// Add a join
    pub fn join(mut self, kind: JoinKind, table: impl fmt::Display, on: impl fmt::Display) -> Self {
        self.joins
            .push(format!("{} {} ON {}", kind.keyword(), table, on));
        self
    }

    /// Add a cross join (`CROSS JOIN table`)
    pub fn cross_join(mut self, table: impl fmt::Display) -> Self {
        self.joins.push(format!("CROSS JOIN {}", table));
        self
    }

    /// Add a SELECT column
    pub fn select(mut self, column: impl Into<String>) -> Self {
        self.select.push(column.into());
        self
    }

    /// Add a SELECT column with alias
    pub fn select_as(mut self, expr: impl fmt::Display, alias: &str) -> Self {
        self.select.push(format!("{} AS {}", expr, alias));
        self
    }

    /// Add a WHERE clause
    pub fn where_clause(mut self, clause: impl Into<String>) -> Self {
        self.where_clauses.push(clause.into());
        self
    }

    /// Add a GROUP BY expression
    pub fn group_by(mut self, expr: impl Into<String>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    /// Add a HAVING clause
    pub fn having(mut self, clause: impl Into<String>) -> Self {
        self.having.push(clause.into());
        self
    }

    /// Add an ORDER BY expression
    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(expr.into());
        self
    }

    /// Add ORDER BY with direction
    pub fn order_by_desc(mut self, expr: impl Into<String>) -> Self {
        self.order_by.push(format!("{} DESC", expr.into()));
        self
    }

    /// Set LIMIT (a placeholder, never a literal from the caller)
    pub fn limit(mut self, limit: Placeholder) -> Self {
        self.limit = Some(limit.to_string());
        self
    }

    /// Build the final SQL query
    pub fn build(self) -> String {
        let mut sql = String::new();

        // WITH
        if !self.ctes.is_empty() {
            sql.push_str("WITH ");
            let ctes: Vec<String> = self
                .ctes
                .iter()
                .map(|(name, body)| format!("{} AS ({})", name, body))
                .collect();
            sql.push_str(&ctes.join(", "));
            sql.push(' ');
        }

        // SELECT
        sql.push_str("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select.join(", "));
        }

        // FROM
        sql.push_str(" FROM ");
        sql.push_str(&self.from);

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }

        // WHERE
        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clauses.join(" AND "));
        }

        // GROUP BY
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        // HAVING
        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.having.join(" AND "));
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        // LIMIT
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ");
            sql.push_str(&limit);
        }

        sql
    }
}

/// Per-query composition state
#[derive(Debug)]
pub struct QueryContext {
    dialect: Dialect,
    bindings: Bindings,
    approximations: Vec<Approximation>,
}

impl QueryContext {
    /// Start composing a query for a dialect
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            bindings: Bindings::new(),
            approximations: Vec::new(),
        }
    }

    /// Dialect in use
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Bind a named value; the same name always yields the same placeholder
    pub fn bind(&mut self, name: &str, value: impl Into<ParamValue>) -> Placeholder {
        self.bindings.bind(name, value)
    }

    /// Take a fragment's text, recording its approximation label if any
    pub fn fragment(&mut self, fragment: Fragment) -> String {
        let (sql, approximation) = fragment.into_parts();
        if let Some(approximation) = approximation
            && !self.approximations.contains(&approximation)
        {
            self.approximations.push(approximation);
        }
        sql
    }

    /// Approximations recorded so far
    pub fn approximations(&self) -> &[Approximation] {
        &self.approximations
    }

    /// Finish with the composed SQL text
    pub fn finish(self, sql: String) -> CompiledQuery {
        CompiledQuery {
            statement: Statement::with_bindings(sql, self.bindings),
            approximations: self.approximations,
        }
    }
}

/// A composed, parameterised query and the approximations it relies on
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    /// Statement to execute
    pub statement: Statement,

    /// Approximate statistics the statement computes
    pub approximations: Vec<Approximation>,
}

impl CompiledQuery {
    /// SQL text
    pub fn sql(&self) -> &str {
        &self.statement.sql
    }

    /// Whether every statistic in the query is exact
    pub fn is_exact(&self) -> bool {
        self.approximations.is_empty()
    }
}
