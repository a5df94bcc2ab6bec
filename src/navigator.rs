use std::collections::BTreeMap;
use std::sync::Mutex;

use url::form_urlencoded;

use crate::data_models::{Listing, ResultPage, SearchRequest};
use crate::feed::SearchFeed;

/// Everything the presentation boundary needs to render a search session.
/// Owned exclusively by one `Navigator`; mutated only through the transition
/// methods below, which perform no I/O.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    pub keyword: String,
    pub listings: Vec<Listing>,
    pub next_args: Option<String>,
    pub in_flight: bool,
    pub error: Option<String>,
    params: BTreeMap<String, String>,
    generation: u64,
}

impl SearchSession {
    pub fn has_more(&self) -> bool {
        self.next_args.is_some()
    }

    /// Reset for a brand-new search, discarding accumulated listings, the
    /// continuation token and any prior error. Returns the generation tag
    /// the caller must present when applying the fetch outcome.
    fn begin_search(&mut self, keyword: &str, params: BTreeMap<String, String>) -> u64 {
        self.keyword = keyword.to_string();
        self.listings.clear();
        self.next_args = None;
        self.error = None;
        self.in_flight = true;
        self.params = params;
        self.generation += 1;
        self.generation
    }

    /// Stage a pagination fetch: the continuation token's query-string pairs
    /// merged over the original search parameters. None when there is no
    /// token (normal terminal condition) or a fetch is already running.
    fn begin_more(&mut self) -> Option<(u64, BTreeMap<String, String>)> {
        if self.in_flight {
            return None;
        }
        let args = self.next_args.as_deref()?;
        let mut params = self.params.clone();
        for (key, value) in form_urlencoded::parse(args.as_bytes()) {
            params.insert(key.into_owned(), value.into_owned());
        }
        self.in_flight = true;
        Some((self.generation, params))
    }

    fn apply_page(&mut self, page: ResultPage, append: bool) {
        self.in_flight = false;
        self.error = None;
        let listings = extract_listings(&page);
        if append {
            self.listings.extend(listings);
        } else {
            self.listings = listings;
        }
        self.next_args = page.next_args;
    }

    fn apply_error(&mut self, message: String) {
        self.in_flight = false;
        self.error = Some(message);
    }
}

/// Walks the result sets in order and concatenates their listings,
/// result-set-then-listing order preserved.
pub fn extract_listings(page: &ResultPage) -> Vec<Listing> {
    page.result_sets
        .iter()
        .flat_map(|set| set.listings.iter().cloned())
        .collect()
}

/// Owns one search session against the feed: issues the initial search,
/// accumulates listings, and pages through continuation tokens on demand.
pub struct Navigator<F> {
    feed: F,
    market: String,
    state: Mutex<SearchSession>,
}

impl<F: SearchFeed> Navigator<F> {
    pub fn new(feed: F, market: impl Into<String>) -> Navigator<F> {
        Navigator {
            feed,
            market: market.into(),
            state: Mutex::new(SearchSession::default()),
        }
    }

    pub fn snapshot(&self) -> SearchSession {
        self.state.lock().unwrap().clone()
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().unwrap().has_more()
    }

    /// Issue a brand-new search. Blank keywords are ignored without touching
    /// the session. A search issued while an earlier fetch is still in
    /// flight supersedes it; the stale completion is discarded.
    pub async fn search(&self, keyword: &str) {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return;
        }

        let params = SearchRequest::new(keyword, &self.market).into_params();
        let generation = self
            .state
            .lock()
            .unwrap()
            .begin_search(keyword, params.clone());

        let outcome = self.feed.fetch(&params).await;

        let mut session = self.state.lock().unwrap();
        if session.generation != generation {
            log::debug!("discarding stale search completion for '{keyword}'");
            return;
        }
        match outcome {
            Ok(page) => session.apply_page(page, false),
            Err(e) => session.apply_error(e.to_string()),
        }
    }

    /// Fetch the next page and append its listings after the current ones.
    /// A no-op when the feed reported no continuation token or a fetch is
    /// already running.
    pub async fn load_more(&self) {
        let staged = self.state.lock().unwrap().begin_more();
        let Some((generation, params)) = staged else {
            return;
        };

        let outcome = self.feed.fetch(&params).await;

        let mut session = self.state.lock().unwrap();
        if session.generation != generation {
            log::debug!("discarding stale pagination completion");
            return;
        }
        match outcome {
            Ok(page) => session.apply_page(page, true),
            Err(e) => session.apply_error(e.to_string()),
        }
    }
}

#[cfg(test)]
fn page_with(titles: &[&str], next_args: Option<&str>) -> ResultPage {
    use crate::data_models::ResultSet;

    ResultPage {
        result_sets: vec![ResultSet {
            listings: titles
                .iter()
                .map(|t| Listing {
                    title: Some(t.to_string()),
                    ..Default::default()
                })
                .collect(),
        }],
        next_args: next_args.map(String::from),
    }
}

#[test]
fn test_begin_search_resets_accumulated_state() {
    let mut session = SearchSession::default();
    session.apply_page(page_with(&["old"], Some("N=10")), false);
    session.error = Some("boom".to_string());

    let generation = session.begin_search("shoes", BTreeMap::new());

    assert_eq!(generation, 1);
    assert_eq!(session.keyword, "shoes");
    assert!(session.listings.is_empty());
    assert!(session.next_args.is_none());
    assert!(session.error.is_none());
    assert!(session.in_flight);
}

#[test]
fn test_apply_page_appends_after_existing_listings() {
    let mut session = SearchSession::default();
    session.begin_search("shoes", BTreeMap::new());
    session.apply_page(page_with(&["a", "b"], Some("N=10")), false);
    session.apply_page(page_with(&["c"], None), true);

    let titles: Vec<&str> = session
        .listings
        .iter()
        .filter_map(|l| l.title.as_deref())
        .collect();
    assert_eq!(titles, vec!["a", "b", "c"]);
    assert!(!session.has_more());
}

#[test]
fn test_begin_more_merges_continuation_params() {
    let mut session = SearchSession::default();
    session.begin_search(
        "shoes",
        BTreeMap::from([("Keywords".to_string(), "shoes".to_string())]),
    );
    session.apply_page(page_with(&["a"], Some("N=10&W=tok")), false);

    let (generation, params) = session.begin_more().expect("token present");
    assert_eq!(generation, 1);
    assert_eq!(params.get("Keywords").map(String::as_str), Some("shoes"));
    assert_eq!(params.get("N").map(String::as_str), Some("10"));
    assert_eq!(params.get("W").map(String::as_str), Some("tok"));
    assert!(session.in_flight);
}

#[test]
fn test_begin_more_refuses_without_token_or_while_in_flight() {
    let mut session = SearchSession::default();
    assert!(session.begin_more().is_none());

    session.begin_search("shoes", BTreeMap::new());
    session.apply_page(page_with(&["a"], Some("N=10")), false);
    session.in_flight = true;
    assert!(session.begin_more().is_none());
}
