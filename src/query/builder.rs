//! Query composition.
//!
//! A [`ComposedQuery`] is the executable form of a filter/sort/cursor request. It is
//! produced by folding the request parts in a fixed order:
//!
//! 1. expressions, left to right (a `Neq` also forces a descending order on its field);
//! 2. the page size limit;
//! 3. the caller sort;
//! 4. the `start after` cursor.
//!
//! The composed query is only meaningful to a [`crate::store::DocumentStore`].

use log::trace;

use crate::{params, types};

use super::{Expr, Field, Filter, Op, Pagination, Sort, Value};

/// Comparison performed by a single [`Clause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    ArrayContains,
    Gt,
    Geq,
    Lt,
    Leq,
}

/// Store level predicate, a [`Expr`] can expand to more than one clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: Field,
    pub op: CompareOp,
    pub value: Value,
}

impl Clause {
    fn new(field: Field, op: CompareOp, value: Value) -> Self {
        Self { field, op, value }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub field: Field,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub collection: String,
    pub clauses: Vec<Clause>,
    pub order_by: Vec<Order>,
    pub limit: Option<usize>,
    pub start_after: Option<types::DocumentSnapshot>,
}

impl ComposedQuery {
    /// Unfiltered query over the whole collection
    pub fn collection(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            clauses: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            start_after: None,
        }
    }

    pub fn is_unfiltered(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Step by step builder of a [`ComposedQuery`].
///
/// The builder applies each step as it is called, use [`compose`] to get the
/// canonical step ordering.
pub struct QueryComposer {
    query: ComposedQuery,
}

impl QueryComposer {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            query: ComposedQuery::collection(collection),
        }
    }

    pub fn expr(mut self, expr: Expr) -> Self {
        let (field, op) = expr.into_parts();

        match op {
            Op::Eq(v) => {
                self.query.clauses.push(Clause::new(field, CompareOp::Eq, v));
            }
            Op::Neq(v) => {
                // inequality filters need an order clause on the same field
                self.query
                    .clauses
                    .push(Clause::new(field.clone(), CompareOp::Neq, v));
                self.query.order_by.push(Order {
                    field,
                    descending: true,
                });
            }
            Op::ArrayContains(v) => {
                self.query
                    .clauses
                    .push(Clause::new(field, CompareOp::ArrayContains, v));
            }
            Op::Search(prefix) => {
                let mut upper = prefix.clone();
                upper.push(params::SEARCH_UPPER_BOUND_SENTINEL);

                self.query
                    .clauses
                    .push(Clause::new(field.clone(), CompareOp::Geq, prefix.into()));
                self.query
                    .clauses
                    .push(Clause::new(field, CompareOp::Leq, upper.into()));
            }
            Op::Between(range) => {
                self.query
                    .clauses
                    .push(Clause::new(field.clone(), CompareOp::Gt, range.min));
                self.query
                    .clauses
                    .push(Clause::new(field, CompareOp::Lt, range.max));
            }
        }

        self
    }

    pub fn filter(mut self, filter: &Filter) -> Self {
        for expr in filter {
            self = self.expr(expr.clone());
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn sort(mut self, sort: Option<&Sort>) -> Self {
        if let Some(sort) = sort {
            self.query.order_by.push(Order {
                field: sort.field.clone(),
                descending: sort.descending,
            });
        }
        self
    }

    pub fn start_after(mut self, last: Option<&types::DocumentSnapshot>) -> Self {
        if let Some(last) = last {
            self.query.start_after = Some(last.clone());
        }
        self
    }

    pub fn compose(self) -> ComposedQuery {
        self.query
    }
}

/// Computes the page size of a query.
///
/// The caller limit wins when provided, otherwise the default is used. Queries
/// holding a prefix search are range scans, so their page size is always capped
/// to [`params::SEARCH_PAGE_SIZE_CAP`].
pub fn page_size(filter: &Filter, requested: Option<usize>) -> usize {
    if filter.has_search() {
        requested
            .unwrap_or(params::SEARCH_PAGE_SIZE_CAP)
            .min(params::SEARCH_PAGE_SIZE_CAP)
    } else {
        requested.unwrap_or(params::DEFAULT_PAGE_SIZE)
    }
}

/// Composes the query for one page of results.
pub fn compose(
    collection: &str,
    filter: &Filter,
    sort: Option<&Sort>,
    cursor: Option<&Pagination>,
) -> ComposedQuery {
    let limit = page_size(filter, cursor.and_then(|c| c.limit));

    let query = QueryComposer::new(collection)
        .filter(filter)
        .limit(limit)
        .sort(sort)
        .start_after(cursor.and_then(Pagination::last))
        .compose();

    trace!("composed query: {:?}", query);

    query
}

/// Composes a query matching every document selected by `filter`, with no
/// page size limit (used for counting).
pub fn compose_unbounded(collection: &str, filter: &Filter) -> ComposedQuery {
    QueryComposer::new(collection).filter(filter).compose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentRef, DocumentSnapshot};

    fn snapshot(id: &str) -> DocumentSnapshot {
        DocumentSnapshot::new(DocumentRef::new("shops", id), serde_json::json!({}))
    }

    #[test]
    fn unfiltered_defaults() {
        let q = compose("shops", &Filter::empty(), None, None);
        assert!(q.is_unfiltered());
        assert_eq!(q.limit, Some(params::DEFAULT_PAGE_SIZE));
        assert!(q.order_by.is_empty());
        assert!(q.start_after.is_none());
    }

    #[test]
    fn neq_forces_descending_order() {
        let filters = [
            Filter::empty().with(Expr::neq("status", "closed").unwrap()),
            Filter::empty()
                .with(Expr::eq("city", "tokyo").unwrap())
                .with(Expr::neq("status", "closed").unwrap()),
            Filter::empty()
                .with(Expr::neq("status", "closed").unwrap())
                .with(Expr::search("name", "ra").unwrap()),
        ];

        for filter in filters {
            for sort in [None, Some(Sort::asc("rating").unwrap())] {
                let q = compose("shops", &filter, sort.as_ref(), None);
                assert!(
                    q.order_by
                        .iter()
                        .any(|o| o.field.value() == "status" && o.descending)
                );
            }
        }
    }

    #[test]
    fn forced_order_precedes_caller_sort() {
        let filter = Filter::empty().with(Expr::neq("status", "closed").unwrap());
        let sort = Sort::asc("rating").unwrap();
        let q = compose("shops", &filter, Some(&sort), None);

        let fields: Vec<(&str, bool)> = q
            .order_by
            .iter()
            .map(|o| (o.field.value(), o.descending))
            .collect();
        assert_eq!(fields, vec![("status", true), ("rating", false)]);
    }

    #[test]
    fn search_caps_page_size() {
        let filter = Filter::empty().with(Expr::search("name", "ra").unwrap());

        for requested in [None, Some(10), Some(50), Some(51), Some(1000)] {
            let cursor = Pagination::new(requested);
            let q = compose("shops", &filter, None, Some(&cursor));
            let limit = q.limit.unwrap();
            assert!(limit <= params::SEARCH_PAGE_SIZE_CAP);
            if let Some(requested) = requested {
                assert_eq!(limit, requested.min(params::SEARCH_PAGE_SIZE_CAP));
            } else {
                assert_eq!(limit, params::SEARCH_PAGE_SIZE_CAP);
            }
        }
    }

    #[test]
    fn caller_limit_without_search() {
        let cursor = Pagination::new(Some(120));
        let q = compose("shops", &Filter::empty(), None, Some(&cursor));
        assert_eq!(q.limit, Some(120));
    }

    #[test]
    fn search_is_a_range_scan() {
        let filter = Filter::empty().with(Expr::search("name", "ra").unwrap());
        let q = compose("shops", &filter, None, None);

        assert_eq!(q.clauses.len(), 2);
        assert_eq!(q.clauses[0].op, CompareOp::Geq);
        assert_eq!(q.clauses[0].value, Value::Text("ra".into()));
        assert_eq!(q.clauses[1].op, CompareOp::Leq);
        assert_eq!(q.clauses[1].value, Value::Text("ra\u{f8ff}".into()));
    }

    #[test]
    fn clauses_keep_caller_order() {
        let filter = Filter::empty()
            .with(Expr::array_contains("tags", "noodle").unwrap())
            .with(Expr::eq("city", "tokyo").unwrap());
        let q = compose("shops", &filter, None, None);

        let ops: Vec<(&str, CompareOp)> = q
            .clauses
            .iter()
            .map(|c| (c.field.value(), c.op))
            .collect();
        assert_eq!(
            ops,
            vec![("tags", CompareOp::ArrayContains), ("city", CompareOp::Eq)]
        );
    }

    #[test]
    fn cursor_sets_start_after() {
        let cursor = Pagination::new(Some(20)).with_last(snapshot("a20"));
        let q = compose("shops", &Filter::empty(), None, Some(&cursor));
        assert_eq!(q.start_after.unwrap().id(), "a20");
    }

    #[test]
    fn unbounded_has_no_limit() {
        let filter = Filter::empty().with(Expr::search("name", "ra").unwrap());
        let q = compose_unbounded("shops", &filter);
        assert_eq!(q.limit, None);
        assert_eq!(q.clauses.len(), 2);
    }
}
