//! Helpers shared by the SurrealDB repositories.

use bastion_core::repository::{PaginatedResult, Pagination};
use surrealdb::Connection;
use surrealdb::method::Query;
use surrealdb_types::SurrealValue;

use crate::error::DbError;

/// Row of `SELECT count() AS total ... GROUP ALL`.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

/// `GROUP ALL` over zero matches yields no row at all.
pub(crate) fn total(rows: &[CountRow]) -> u64 {
    rows.first().map_or(0, |r| r.total)
}

pub(crate) fn first_row<T>(rows: Vec<T>, entity: &str, id: impl ToString) -> Result<T, DbError> {
    rows.into_iter().next().ok_or_else(|| DbError::NotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    })
}

pub(crate) fn page<T>(items: Vec<T>, total: u64, pagination: &Pagination) -> PaginatedResult<T> {
    PaginatedResult {
        items,
        total,
        offset: pagination.offset,
        limit: pagination.limit,
    }
}

/// Fields of a partial update. Each one is assigned from a binding of
/// the same name; `updated_at` is always refreshed.
#[derive(Debug, Default)]
pub(crate) struct Changes {
    fields: Vec<(&'static str, serde_json::Value)>,
}

impl Changes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(
        mut self,
        field: &'static str,
        value: Option<impl Into<serde_json::Value>>,
    ) -> Self {
        if let Some(value) = value {
            self.fields.push((field, value.into()));
        }
        self
    }

    pub(crate) fn assignments(&self) -> String {
        self.fields
            .iter()
            .map(|(field, _)| format!("{field} = ${field}"))
            .chain(std::iter::once("updated_at = time::now()".to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn bind<'a, C: Connection>(self, mut query: Query<'a, C>) -> Query<'a, C> {
        for (field, value) in self.fields {
            query = query.bind((field, value));
        }
        query
    }
}
