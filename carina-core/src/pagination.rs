//! Pagination - Drain a token-paginated list API into a single result
//!
//! Page fetching is supplied by the caller so the same loop drives any
//! list operation. Retries are the client's concern, not this loop's.

use std::future::Future;

use log::debug;

/// One page returned by a list call
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the next page, if any
    pub next_token: Option<String>,
    /// Whether the remote API reported this as the final page
    pub last_page: bool,
}

impl<T> Page<T> {
    /// Build a page whose "last" flag is derived from the token
    ///
    /// A missing or empty token means no further pages.
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        let last_page = next_token.as_deref().is_none_or(str::is_empty);
        Self {
            items,
            next_token,
            last_page,
        }
    }

    /// The final page of a listing
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
            last_page: true,
        }
    }
}

/// Fetch pages until the API signals the last one
///
/// `fetch_page` receives `None` for the first request and the previous
/// page's token afterwards. Items are returned in page order, then in
/// within-page order. Empty intermediate pages do not stop the loop.
/// The first error is returned as-is and everything fetched so far is
/// discarded.
pub async fn collect_pages<T, E, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut results = Vec::new();
    let mut token: Option<String> = None;
    let mut page_number = 0usize;

    loop {
        let page = fetch_page(token.take()).await?;
        page_number += 1;
        debug!("fetched page {} with {} items", page_number, page.items.len());

        results.extend(page.items);

        match page.next_token {
            Some(next) if !page.last_page && !next.is_empty() => token = Some(next),
            _ => break,
        }
    }

    Ok(results)
}
