use super::DocumentError;
use crate::{query, repo};
use log::{debug, trace};
use serde::de::DeserializeOwned;
use std::time::Instant;

/// One page of typed results along with the cursor of the following page.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: query::Pagination,
}

impl<T> Page<T> {
    /// True when the walk is over and no further page should be requested.
    pub fn is_last(&self) -> bool {
        self.cursor.no_more_data()
    }
}

/// Facade used to perform paginated queries, it handles the dependencies between
/// the `query` and `repo` modules.
pub struct FacadeQuery {}

impl FacadeQuery {
    /// Fetches the page of `collection` selected by `filter`, `sort` and `cursor`.
    ///
    /// Every item is decoded into `T`, a single decoding failure aborts the whole
    /// page with [`DocumentError::Parse`].
    pub async fn page<T>(
        repo: repo::Repository,
        collection: &str,
        filter: &query::Filter,
        sort: Option<&query::Sort>,
        cursor: query::Pagination,
    ) -> Result<Page<T>, DocumentError>
    where
        T: DeserializeOwned,
    {
        let start = Instant::now();

        let composed = query::compose(collection, filter, sort, Some(&cursor));
        let snapshots = repo.store().query(&composed).await?;

        let items = snapshots
            .iter()
            .map(|snapshot| {
                snapshot.decode::<T>().map_err(|e| {
                    trace!("unable to decode `{}`: {}", snapshot.reference, e);
                    DocumentError::from(e)
                })
            })
            .collect::<Result<Vec<T>, _>>()?;

        let cursor = cursor.advance(snapshots.last().cloned());

        debug!(
            "page of {} items from `{}` required {}us (no more data: {})",
            items.len(),
            collection,
            start.elapsed().as_micros(),
            cursor.no_more_data()
        );

        Ok(Page { items, cursor })
    }

    pub async fn count(
        repo: repo::Repository,
        collection: &str,
        filter: &query::Filter,
    ) -> Result<u64, DocumentError> {
        let composed = query::compose_unbounded(collection, filter);
        Ok(repo.store().count(&composed).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentRef;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Item {
        id: String,
        n: i64,
    }

    async fn seeded(count: i64) -> repo::Repository {
        let repo = repo::Repository::in_memory();
        for n in 1..=count {
            repo.store()
                .set(
                    &DocumentRef::new("items", format!("item{n:02}")),
                    json!({ "n": n, "name": format!("apple {n}"), "status": if n % 2 == 0 { "open" } else { "closed" } }),
                    false,
                )
                .await
                .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn walk_all_pages() {
        let repo = seeded(45).await;
        let sort = query::Sort::asc("n").unwrap();
        let filter = query::Filter::empty();

        let mut cursor = query::Pagination::new(Some(20));
        let mut sizes = Vec::new();
        let mut seen = Vec::new();

        loop {
            let page: Page<Item> =
                FacadeQuery::page(repo.clone(), "items", &filter, Some(&sort), cursor)
                    .await
                    .unwrap();
            sizes.push(page.items.len());
            seen.extend(page.items.iter().map(|i| i.n));
            cursor = page.cursor;
            if cursor.no_more_data() {
                break;
            }
        }

        assert_eq!(sizes, vec![20, 20, 5, 0]);
        assert_eq!(seen, (1..=45).collect::<Vec<_>>());
        assert!(cursor.last().is_none());
    }

    #[tokio::test]
    async fn default_page_size() {
        let repo = seeded(30).await;
        let page: Page<Item> = FacadeQuery::page(
            repo,
            "items",
            &query::Filter::empty(),
            None,
            query::Pagination::default(),
        )
        .await
        .unwrap();

        assert_eq!(page.items.len(), 20);
        assert!(!page.is_last());
        assert_eq!(page.cursor.last().map(|s| s.id()), Some(page.items[19].id.as_str()));
    }

    #[tokio::test]
    async fn search_is_capped() {
        let repo = seeded(70).await;
        let filter = query::Filter::empty().with(query::Expr::search("name", "apple").unwrap());

        let page: Page<Item> = FacadeQuery::page(
            repo,
            "items",
            &filter,
            None,
            query::Pagination::new(Some(500)),
        )
        .await
        .unwrap();

        assert_eq!(page.items.len(), 50);
    }

    #[tokio::test]
    async fn neq_filter_pages() {
        let repo = seeded(10).await;
        let filter = query::Filter::empty().with(query::Expr::neq("status", "closed").unwrap());

        let page: Page<Item> = FacadeQuery::page(
            repo.clone(),
            "items",
            &filter,
            None,
            query::Pagination::default(),
        )
        .await
        .unwrap();

        assert_eq!(page.items.len(), 5);
        assert!(page.items.iter().all(|i| i.n % 2 == 0));
        assert_eq!(FacadeQuery::count(repo, "items", &filter).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn bad_item_aborts_page() {
        let repo = seeded(3).await;
        repo.store()
            .set(
                &DocumentRef::new("items", "item02"),
                json!({ "n": "two" }),
                false,
            )
            .await
            .unwrap();

        let err = FacadeQuery::page::<Item>(
            repo,
            "items",
            &query::Filter::empty(),
            None,
            query::Pagination::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DocumentError::Parse(_)));
    }
}
