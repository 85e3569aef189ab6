use crate::types::DocumentSnapshot;

/// Cursor used to walk a query page by page.
///
/// A cursor is owned by the caller and passed to each page request, the facade
/// returns the cursor for the following page (see [`Pagination::advance`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pagination {
    /// Requested page size, [`None`] means the default size
    pub limit: Option<usize>,
    last: Option<DocumentSnapshot>,
    no_more_data: bool,
}

impl Pagination {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            last: None,
            no_more_data: false,
        }
    }

    /// Resumes a walk after the provided document.
    pub fn with_last(mut self, last: DocumentSnapshot) -> Self {
        self.last = Some(last);
        self
    }

    /// Last document of the previous page.
    pub fn last(&self) -> Option<&DocumentSnapshot> {
        self.last.as_ref()
    }

    pub fn no_more_data(&self) -> bool {
        self.no_more_data
    }

    /// Returns the cursor for the page following the one that ended with `last`.
    ///
    /// The walk is over when the page was empty or did not move the cursor.
    pub fn advance(self, last: Option<DocumentSnapshot>) -> Self {
        let unchanged = matches!(
            (&self.last, &last),
            (Some(prev), Some(curr)) if prev.reference == curr.reference
        );

        Self {
            limit: self.limit,
            no_more_data: last.is_none() || unchanged,
            last,
        }
    }
}
