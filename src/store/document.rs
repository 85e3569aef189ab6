use async_trait::async_trait;
use log::trace;
use chrono::{DateTime, Utc};
use serde_json::{Number, Value as Json};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Error, ErrorCode};
use crate::query::{Clause, CompareOp, ComposedQuery, Order, Value};
use crate::types::{DocumentRef, DocumentSnapshot};

pub type DocumentStoreRef = Arc<dyn DocumentStore>;

/// Capabilities required from a document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a document, returns [`None`] if the document does not exist.
    async fn get(&self, doc: &DocumentRef) -> Result<Option<DocumentSnapshot>, Error>;

    /// Writes a document. When `merge` is true the payload is merged into the
    /// existing document, otherwise the document is replaced.
    async fn set(&self, doc: &DocumentRef, data: Json, merge: bool) -> Result<(), Error>;

    /// Creates a document with a store generated identifier.
    async fn add(&self, collection: &str, data: Json) -> Result<DocumentRef, Error>;

    async fn delete(&self, doc: &DocumentRef) -> Result<(), Error>;

    /// Executes a composed query returning the matching documents in query order.
    async fn query(&self, query: &ComposedQuery) -> Result<Vec<DocumentSnapshot>, Error>;

    /// Counts the documents matching a composed query.
    async fn count(&self, query: &ComposedQuery) -> Result<u64, Error> {
        Ok(self.query(query).await?.len() as u64)
    }

    async fn exists(&self, doc: &DocumentRef) -> Result<bool, Error> {
        Ok(self.get(doc).await?.is_some())
    }
}

type Collection = BTreeMap<String, Json>;

/// In process document store.
///
/// Documents are kept as JSON values grouped by collection. Queries are evaluated
/// with the following semantics:
///
/// * a document lacking a filtered field never matches (`Neq` included);
/// * documents are sorted by each order clause and then by id, documents lacking an
///   ordered field are excluded;
/// * `start_after` skips documents sorting before or at the cursor document.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_ref(self) -> DocumentStoreRef {
        Arc::new(self)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, doc: &DocumentRef) -> Result<Option<DocumentSnapshot>, Error> {
        let collections = self.collections.read().await;
        let data = collections
            .get(doc.collection())
            .and_then(|c| c.get(doc.id()))
            .cloned();

        Ok(data.map(|data| DocumentSnapshot::new(doc.clone(), data)))
    }

    async fn set(&self, doc: &DocumentRef, data: Json, merge: bool) -> Result<(), Error> {
        if !data.is_object() {
            return Err(Error::new(
                ErrorCode::InvalidArgument,
                format!("document `{doc}` payload must be an object"),
            ));
        }

        let mut collections = self.collections.write().await;
        let collection = collections.entry(doc.collection().to_owned()).or_default();

        match collection.get_mut(doc.id()) {
            Some(existing) if merge => merge_json(existing, data),
            _ => {
                collection.insert(doc.id().to_owned(), data);
            }
        }

        trace!("document `{}` written (merge: {})", doc, merge);
        Ok(())
    }

    async fn add(&self, collection: &str, data: Json) -> Result<DocumentRef, Error> {
        let doc = DocumentRef::new(collection, uuid::Uuid::new_v4().simple().to_string());
        self.set(&doc, data, false).await?;
        Ok(doc)
    }

    async fn delete(&self, doc: &DocumentRef) -> Result<(), Error> {
        let mut collections = self.collections.write().await;
        if let Some(collection) = collections.get_mut(doc.collection()) {
            collection.remove(doc.id());
        }
        Ok(())
    }

    async fn query(&self, query: &ComposedQuery) -> Result<Vec<DocumentSnapshot>, Error> {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut docs: Vec<DocumentSnapshot> = collection
            .iter()
            .map(|(id, data)| {
                DocumentSnapshot::new(DocumentRef::new(&query.collection, id), data.clone())
            })
            .filter(|snap| query.clauses.iter().all(|c| clause_matches(c, snap)))
            .filter(|snap| query.order_by.iter().all(|o| snap.field(o.field.value()).is_some()))
            .collect();

        docs.sort_by(|a, b| compare_docs(&query.order_by, a, b));

        if let Some(cursor) = &query.start_after {
            docs.retain(|snap| compare_docs(&query.order_by, snap, cursor) == Ordering::Greater);
        }

        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }

        trace!(
            "query on `{}` returned {} documents",
            query.collection,
            docs.len()
        );

        Ok(docs)
    }
}

/// Deep merge of `patch` into `target`, objects are merged key by key while any
/// other value is replaced.
fn merge_json(target: &mut Json, patch: Json) {
    match (target, patch) {
        (Json::Object(target), Json::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_json(existing, value);
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

fn clause_matches(clause: &Clause, snap: &DocumentSnapshot) -> bool {
    let Some(field) = snap.field(clause.field.value()) else {
        return false;
    };
    if let Value::Timestamp(at) = &clause.value {
        return timestamp_matches(clause.op, field, at);
    }
    let value = clause.value.to_json();

    match clause.op {
        CompareOp::Eq => json_eq(field, &value),
        CompareOp::Neq => !json_eq(field, &value),
        CompareOp::ArrayContains => field
            .as_array()
            .is_some_and(|items| items.iter().any(|item| json_eq(item, &value))),
        CompareOp::Gt => same_kind_cmp(field, &value) == Some(Ordering::Greater),
        CompareOp::Geq => matches!(
            same_kind_cmp(field, &value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Lt => same_kind_cmp(field, &value) == Some(Ordering::Less),
        CompareOp::Leq => matches!(
            same_kind_cmp(field, &value),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

/// Equality where integers and floats holding the same number are equal.
fn json_eq(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Number(a), Json::Number(b)) => number_cmp(a, b).is_eq(),
        _ => a == b,
    }
}

/// Integers are compared exactly, floats only when either side is not an integer.
fn number_cmp(a: &Number, b: &Number) -> Ordering {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return a.cmp(&b);
    }
    let a = a.as_f64().unwrap_or(f64::NAN);
    let b = b.as_f64().unwrap_or(f64::NAN);
    a.total_cmp(&b)
}

/// Parses an RFC 3339 string field into an instant.
fn instant(v: &Json) -> Option<DateTime<Utc>> {
    v.as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Timestamp clauses compare instants, whatever the precision or offset of the
/// stored string. Fields that are not timestamps only match `Neq`.
fn timestamp_matches(op: CompareOp, field: &Json, at: &DateTime<Utc>) -> bool {
    if op == CompareOp::ArrayContains {
        return field
            .as_array()
            .is_some_and(|items| items.iter().any(|item| instant(item).as_ref() == Some(at)));
    }

    let Some(stored) = instant(field) else {
        return op == CompareOp::Neq;
    };

    match op {
        CompareOp::Eq => stored == *at,
        CompareOp::Neq => stored != *at,
        CompareOp::Gt => stored > *at,
        CompareOp::Geq => stored >= *at,
        CompareOp::Lt => stored < *at,
        CompareOp::Leq => stored <= *at,
        CompareOp::ArrayContains => false,
    }
}

/// Range comparisons only apply between values of the same kind.
fn same_kind_cmp(a: &Json, b: &Json) -> Option<Ordering> {
    match (a, b) {
        (Json::Number(_), Json::Number(_)) | (Json::String(_), Json::String(_)) => {
            Some(json_cmp(a, b))
        }
        _ => None,
    }
}

fn kind_rank(v: &Json) -> u8 {
    match v {
        Json::Null => 0,
        Json::Bool(_) => 1,
        Json::Number(_) => 2,
        Json::String(_) => 3,
        Json::Array(_) => 4,
        Json::Object(_) => 5,
    }
}

/// Total order over JSON values: values of different kinds are ordered by kind.
fn json_cmp(a: &Json, b: &Json) -> Ordering {
    match (a, b) {
        (Json::Bool(a), Json::Bool(b)) => a.cmp(b),
        (Json::Number(a), Json::Number(b)) => number_cmp(a, b),
        (Json::String(a), Json::String(b)) => a.cmp(b),
        (Json::Array(a), Json::Array(b)) => a
            .iter()
            .zip(b.iter())
            .map(|(a, b)| json_cmp(a, b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn compare_docs(order_by: &[Order], a: &DocumentSnapshot, b: &DocumentSnapshot) -> Ordering {
    for order in order_by {
        let field = order.field.value();
        let ordering = match (a.field(field), b.field(field)) {
            (Some(va), Some(vb)) => json_cmp(va, vb),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = if order.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering.is_ne() {
            return ordering;
        }
    }

    a.id().cmp(b.id())
}
