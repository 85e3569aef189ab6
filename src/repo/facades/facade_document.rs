use super::DocumentError;
use crate::{params, query, repo, types};
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, trace};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Instant;
use tokio::sync::Semaphore;

/// Facade used to read and write typed documents.
///
/// Payloads are (de)serialized with `serde`, store failures are reported as
/// [`DocumentError`] and deserialization failures as [`DocumentError::Parse`].
pub struct FacadeDocument {
    repo: repo::Repository,
}

impl FacadeDocument {
    pub fn new(repo: repo::Repository) -> Self {
        Self { repo }
    }

    pub async fn get<T>(&self, collection: &str, id: &str) -> Result<T, DocumentError>
    where
        T: DeserializeOwned,
    {
        self.get_by_ref(&types::DocumentRef::new(collection, id))
            .await
    }

    pub async fn get_by_ref<T>(&self, doc: &types::DocumentRef) -> Result<T, DocumentError>
    where
        T: DeserializeOwned,
    {
        let snapshot = self
            .repo
            .store()
            .get(doc)
            .await?
            .ok_or_else(|| DocumentError::not_found(doc))?;

        trace!("decoding document `{}`", doc);
        Ok(snapshot.decode()?)
    }

    /// Creates or replaces a document, if `merge` is true the fields of `value`
    /// are merged into the existing document.
    pub async fn set<T>(
        &self,
        collection: &str,
        id: &str,
        value: &T,
        merge: bool,
    ) -> Result<types::DocumentRef, DocumentError>
    where
        T: Serialize + ?Sized,
    {
        let doc = types::DocumentRef::new(collection, id);
        let data = types::encode_document(value)?;

        self.repo.store().set(&doc, data, merge).await?;
        debug!("document `{}` written (merge: {})", doc, merge);

        Ok(doc)
    }

    /// Creates a document in `collection` with a generated identifier.
    pub async fn add<T>(
        &self,
        collection: &str,
        value: &T,
    ) -> Result<types::DocumentRef, DocumentError>
    where
        T: Serialize + ?Sized,
    {
        let data = types::encode_document(value)?;
        let doc = self.repo.store().add(collection, data).await?;
        debug!("document `{}` created", doc);

        Ok(doc)
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), DocumentError> {
        let doc = types::DocumentRef::new(collection, id);
        self.repo.store().delete(&doc).await?;
        debug!("document `{}` deleted", doc);
        Ok(())
    }

    pub async fn exists(&self, collection: &str, id: &str) -> Result<bool, DocumentError> {
        Ok(self
            .repo
            .store()
            .exists(&types::DocumentRef::new(collection, id))
            .await?)
    }

    /// Counts the documents of `collection` matching `filter`, ignoring any page size.
    pub async fn count(
        &self,
        collection: &str,
        filter: &query::Filter,
    ) -> Result<u64, DocumentError> {
        super::FacadeQuery::count(self.repo.clone(), collection, filter).await
    }

    /// Fetches a set of documents concurrently.
    ///
    /// The output follows the order of `docs` whatever the completion order of the
    /// single fetches. All fetches are awaited, then the first error encountered
    /// (if any) is returned in place of the documents.
    pub async fn batch_get<T>(&self, docs: &[types::DocumentRef]) -> Result<Vec<T>, DocumentError>
    where
        T: DeserializeOwned,
    {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let max_concurrent = params::configurables().max_concurrent_fetches;
        let semaphore = Semaphore::new(max_concurrent);
        let semaphore = &semaphore;

        let mut jobs = FuturesUnordered::new();
        for (index, doc) in docs.iter().enumerate() {
            jobs.push(async move {
                let _permit = semaphore.acquire().await.map_err(|e| {
                    DocumentError::Unknown(format!("semaphore acquire failed: {e}"))
                })?;

                let value = self.get_by_ref::<T>(doc).await?;
                Ok::<_, DocumentError>((index, value))
            });
        }

        let mut fetched = Vec::with_capacity(docs.len());
        let mut first_error = None;
        while let Some(result) = jobs.next().await {
            match result {
                Ok(item) => fetched.push(item),
                Err(e) => {
                    trace!("batch fetch failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        fetched.sort_by_key(|(index, _)| *index);

        debug!(
            "batch get of {} documents required {}us ({} concurrent)",
            docs.len(),
            start.elapsed().as_micros(),
            max_concurrent
        );

        Ok(fetched.into_iter().map(|(_, value)| value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{self, DocumentStore, ErrorCode, MemoryDocumentStore};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::{Value as Json, json};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Shop {
        id: String,
        name: String,
        #[serde(default)]
        rating: i64,
    }

    /// Memory store answering reads after a per document delay, documents listed
    /// in `denied` are refused.
    #[derive(Default)]
    struct SlowStore {
        inner: MemoryDocumentStore,
        delays: HashMap<String, u64>,
        denied: Vec<String>,
    }

    #[async_trait]
    impl DocumentStore for SlowStore {
        async fn get(
            &self,
            doc: &types::DocumentRef,
        ) -> Result<Option<types::DocumentSnapshot>, store::Error> {
            if let Some(ms) = self.delays.get(doc.id()) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            if self.denied.iter().any(|id| id == doc.id()) {
                return Err(store::Error::new(ErrorCode::PermissionDenied, "denied"));
            }
            self.inner.get(doc).await
        }

        async fn set(
            &self,
            doc: &types::DocumentRef,
            data: Json,
            merge: bool,
        ) -> Result<(), store::Error> {
            self.inner.set(doc, data, merge).await
        }

        async fn add(
            &self,
            collection: &str,
            data: Json,
        ) -> Result<types::DocumentRef, store::Error> {
            self.inner.add(collection, data).await
        }

        async fn delete(&self, doc: &types::DocumentRef) -> Result<(), store::Error> {
            self.inner.delete(doc).await
        }

        async fn query(
            &self,
            query: &query::ComposedQuery,
        ) -> Result<Vec<types::DocumentSnapshot>, store::Error> {
            self.inner.query(query).await
        }
    }

    async fn seed(store: &dyn DocumentStore, ids: &[&str]) {
        for (n, id) in ids.iter().enumerate() {
            store
                .set(
                    &types::DocumentRef::new("shops", *id),
                    json!({ "name": format!("shop {id}"), "rating": n }),
                    false,
                )
                .await
                .unwrap();
        }
    }

    fn refs(ids: &[&str]) -> Vec<types::DocumentRef> {
        ids.iter()
            .map(|id| types::DocumentRef::new("shops", *id))
            .collect()
    }

    fn permutations(items: &[u64]) -> Vec<Vec<u64>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[tokio::test]
    async fn typed_crud() {
        let facade = FacadeDocument::new(repo::Repository::in_memory());

        let shop = Shop {
            id: "s1".into(),
            name: "bakery".into(),
            rating: 4,
        };
        let doc = facade.set("shops", "s1", &shop, false).await.unwrap();
        assert_eq!(doc.path(), "shops/s1");
        assert!(facade.exists("shops", "s1").await.unwrap());

        let read: Shop = facade.get("shops", "s1").await.unwrap();
        assert_eq!(read, shop);

        facade
            .set("shops", "s1", &json!({ "rating": 5 }), true)
            .await
            .unwrap();
        let read: Shop = facade.get_by_ref(&doc).await.unwrap();
        assert_eq!(read.rating, 5);
        assert_eq!(read.name, "bakery");

        facade.delete("shops", "s1").await.unwrap();
        assert!(!facade.exists("shops", "s1").await.unwrap());
    }

    #[tokio::test]
    async fn missing_document_is_document_error() {
        let facade = FacadeDocument::new(repo::Repository::in_memory());
        let err = facade.get::<Shop>("shops", "nope").await.unwrap_err();
        assert!(matches!(err, DocumentError::Document(msg) if msg.contains("shops/nope")));
    }

    #[tokio::test]
    async fn shape_mismatch_is_parse_error() {
        let facade = FacadeDocument::new(repo::Repository::in_memory());
        facade
            .set("shops", "s1", &json!({ "name": 42 }), false)
            .await
            .unwrap();

        let err = facade.get::<Shop>("shops", "s1").await.unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[tokio::test]
    async fn add_and_count() {
        let facade = FacadeDocument::new(repo::Repository::in_memory());
        for rating in [1i64, 3, 3] {
            facade
                .add("shops", &json!({ "name": "x", "rating": rating }))
                .await
                .unwrap();
        }

        let all = query::Filter::empty();
        assert_eq!(facade.count("shops", &all).await.unwrap(), 3);

        let filter = query::Filter::new(vec![query::Expr::eq("rating", 3i64).unwrap()]);
        assert_eq!(facade.count("shops", &filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn count_matches_query_facade() {
        let repo = repo::Repository::in_memory();
        let facade = FacadeDocument::new(repo.clone());
        for city in ["tokyo", "osaka", "tokyo", "kyoto"] {
            facade.add("shops", &json!({ "city": city })).await.unwrap();
        }

        let filter = query::Filter::new(vec![query::Expr::neq("city", "tokyo").unwrap()]);
        let counted = facade.count("shops", &filter).await.unwrap();
        let queried = super::super::FacadeQuery::count(repo, "shops", &filter)
            .await
            .unwrap();

        assert_eq!(counted, 2);
        assert_eq!(counted, queried);
    }

    #[tokio::test]
    async fn batch_get_keeps_input_order() {
        let ids = ["a", "b", "c", "d"];

        for delays in permutations(&[1, 4, 8, 12]) {
            let store = SlowStore {
                delays: ids
                    .iter()
                    .zip(&delays)
                    .map(|(id, ms)| (id.to_string(), *ms))
                    .collect(),
                ..Default::default()
            };
            seed(&store, &ids).await;
            let facade = FacadeDocument::new(repo::Repository::new(Arc::new(store)));

            for order in [["a", "b", "c", "d"], ["d", "c", "b", "a"], ["c", "a", "d", "b"]] {
                let shops: Vec<Shop> = facade.batch_get(&refs(&order)).await.unwrap();
                let got: Vec<&str> = shops.iter().map(|s| s.id.as_str()).collect();
                assert_eq!(got, order, "delays: {delays:?}");
            }
        }
    }

    #[tokio::test]
    async fn batch_get_reports_error() {
        let store = SlowStore {
            denied: vec!["b".into()],
            ..Default::default()
        };
        seed(&store, &["a", "b", "c"]).await;
        let facade = FacadeDocument::new(repo::Repository::new(Arc::new(store)));

        let err = facade
            .batch_get::<Shop>(&refs(&["a", "b", "c"]))
            .await
            .unwrap_err();
        assert_eq!(err, DocumentError::Unauthorized);

        let err = facade
            .batch_get::<Shop>(&refs(&["a", "missing"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::Document(_)));

        let empty: Vec<Shop> = facade.batch_get(&[]).await.unwrap();
        assert!(empty.is_empty());
    }
}
