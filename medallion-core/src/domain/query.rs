// medallion-core/src/domain/query.rs

use sqlparser::ast::Statement;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::domain::error::DomainError;

/// Gatekeeper for the analytical SQL surface over Gold.
///
/// Exactly one statement, and it must be a query (`SELECT`, `WITH ... SELECT`,
/// set operations). DDL, DML, `COPY`, `ATTACH`, `PRAGMA` are all refused, so a
/// downstream consumer can never mutate the layer it reads.
pub struct ReadOnlyGuard;

impl ReadOnlyGuard {
    pub fn check(sql: &str) -> Result<(), DomainError> {
        let dialect = DuckDbDialect {};
        let statements = Parser::parse_sql(&dialect, sql)
            .map_err(|e| DomainError::ForbiddenStatement(format!("unparseable SQL ({})", e)))?;

        match statements.as_slice() {
            [Statement::Query(_)] => {
                debug!("Read-only query accepted");
                Ok(())
            }
            [] => Err(DomainError::ForbiddenStatement("empty query".into())),
            [other] => Err(DomainError::ForbiddenStatement(statement_kind(other))),
            many => Err(DomainError::ForbiddenStatement(format!(
                "{} statements (only one query is allowed)",
                many.len()
            ))),
        }
    }
}

fn statement_kind(stmt: &Statement) -> String {
    let text = stmt.to_string();
    text.split_whitespace()
        .next()
        .unwrap_or("statement")
        .to_uppercase()
}
