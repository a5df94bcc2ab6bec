use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use adrelay::data_models::{Listing, ResultPage, ResultSet, params};
use adrelay::feed::{FeedUnavailable, SearchFeed};
use adrelay::navigator::Navigator;

type FetchOutcome = Result<ResultPage, FeedUnavailable>;

enum Scripted {
    Ready(FetchOutcome),
    // resolved by the test once it decides the fetch may complete
    Gated(oneshot::Receiver<FetchOutcome>),
}

/// In-memory stand-in for the upstream feed: scripted responses in order,
/// every received parameter map recorded.
#[derive(Clone, Default)]
struct FakeFeed {
    inner: Arc<FakeFeedInner>,
}

#[derive(Default)]
struct FakeFeedInner {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<BTreeMap<String, String>>>,
}

impl FakeFeed {
    fn expect_page(&self, page: ResultPage) {
        self.inner
            .responses
            .lock()
            .unwrap()
            .push_back(Scripted::Ready(Ok(page)));
    }

    fn expect_error(&self, message: &str) {
        self.inner
            .responses
            .lock()
            .unwrap()
            .push_back(Scripted::Ready(Err(FeedUnavailable::new(message))));
    }

    fn expect_gated(&self) -> oneshot::Sender<FetchOutcome> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .responses
            .lock()
            .unwrap()
            .push_back(Scripted::Gated(rx));
        tx
    }

    fn requests(&self) -> Vec<BTreeMap<String, String>> {
        self.inner.requests.lock().unwrap().clone()
    }
}

impl SearchFeed for FakeFeed {
    async fn fetch(&self, fetch_params: &BTreeMap<String, String>) -> FetchOutcome {
        self.inner
            .requests
            .lock()
            .unwrap()
            .push(fetch_params.clone());
        let next = {
            self.inner
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("fetch issued with no scripted response")
        };
        match next {
            Scripted::Ready(outcome) => outcome,
            Scripted::Gated(rx) => rx.await.expect("gate dropped"),
        }
    }
}

fn page(titles: &[&str], next_args: Option<&str>) -> ResultPage {
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

fn titles(navigator: &Navigator<FakeFeed>) -> Vec<String> {
    navigator
        .snapshot()
        .listings
        .iter()
        .filter_map(|l| l.title.clone())
        .collect()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_blank_search_performs_no_fetch() {
    let feed = FakeFeed::default();
    let navigator = Navigator::new(feed.clone(), "us");

    navigator.search("").await;
    navigator.search("   ").await;

    assert!(feed.requests().is_empty());
    let session = navigator.snapshot();
    assert_eq!(session.keyword, "");
    assert!(session.listings.is_empty());
    assert!(session.error.is_none());
    assert!(!session.in_flight);
}

#[tokio::test]
async fn test_search_populates_listings_and_token() {
    let feed = FakeFeed::default();
    feed.expect_page(page(&["a", "b"], Some("N=10&W=tok")));
    let navigator = Navigator::new(feed.clone(), "us");

    navigator.search("  shoes  ").await;

    let session = navigator.snapshot();
    assert_eq!(session.keyword, "shoes");
    assert_eq!(titles(&navigator), vec!["a", "b"]);
    assert!(navigator.has_more());
    assert!(session.error.is_none());
    assert!(!session.in_flight);

    let requests = feed.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].get(params::KEYWORDS).map(String::as_str), Some("shoes"));
    assert_eq!(requests[0].get(params::MARKET).map(String::as_str), Some("us"));
    assert_eq!(requests[0].get(params::FAVICON).map(String::as_str), Some("1"));
}

#[tokio::test]
async fn test_load_more_sends_token_params_and_appends() {
    let feed = FakeFeed::default();
    feed.expect_page(page(&["a", "b"], Some("N=10&W=tok")));
    feed.expect_page(page(&["c"], None));
    let navigator = Navigator::new(feed.clone(), "us");

    navigator.search("shoes").await;
    navigator.load_more().await;

    assert_eq!(titles(&navigator), vec!["a", "b", "c"]);
    assert!(!navigator.has_more());

    let requests = feed.requests();
    assert_eq!(requests.len(), 2);
    // continuation pairs merged over the original search parameters
    assert_eq!(requests[1].get("N").map(String::as_str), Some("10"));
    assert_eq!(requests[1].get("W").map(String::as_str), Some("tok"));
    assert_eq!(requests[1].get(params::KEYWORDS).map(String::as_str), Some("shoes"));
}

#[tokio::test]
async fn test_load_more_without_token_is_network_free() {
    let feed = FakeFeed::default();
    feed.expect_page(page(&["a"], None));
    let navigator = Navigator::new(feed.clone(), "us");

    navigator.search("shoes").await;
    assert!(!navigator.has_more());

    navigator.load_more().await;

    assert_eq!(feed.requests().len(), 1);
    assert_eq!(titles(&navigator), vec!["a"]);
    assert!(navigator.snapshot().error.is_none());
}

#[tokio::test]
async fn test_failed_search_records_error_and_leaves_listings_empty() {
    let feed = FakeFeed::default();
    feed.expect_error("upstream status 500");
    let navigator = Navigator::new(feed.clone(), "us");

    navigator.search("shoes").await;

    let session = navigator.snapshot();
    assert!(session.listings.is_empty());
    let message = session.error.expect("error recorded");
    assert!(message.contains("search feed unavailable"));
    assert!(!session.in_flight);
}

#[tokio::test]
async fn test_failed_load_more_keeps_accumulated_listings() {
    let feed = FakeFeed::default();
    feed.expect_page(page(&["a", "b"], Some("N=10")));
    feed.expect_error("network error");
    let navigator = Navigator::new(feed.clone(), "us");

    navigator.search("shoes").await;
    navigator.load_more().await;

    let session = navigator.snapshot();
    assert_eq!(titles(&navigator), vec!["a", "b"]);
    assert!(session.error.is_some());
    // the token survives a failed fetch, so the user can retry
    assert!(session.has_more());
}

#[tokio::test]
async fn test_second_search_supersedes_unfinished_first() {
    let feed = FakeFeed::default();
    let gate = feed.expect_gated();
    feed.expect_page(page(&["second"], None));
    let navigator = Arc::new(Navigator::new(feed.clone(), "us"));

    let racing = {
        let navigator = navigator.clone();
        tokio::spawn(async move { navigator.search("first").await })
    };
    {
        let feed = feed.clone();
        wait_until(move || feed.requests().len() == 1).await;
    }

    navigator.search("second").await;

    // the first search resolves only now; its completion must be discarded
    gate.send(Ok(page(&["stale"], Some("N=99")))).ok();
    racing.await.unwrap();

    let session = navigator.snapshot();
    assert_eq!(session.keyword, "second");
    assert_eq!(titles(&navigator), vec!["second"]);
    assert!(!session.has_more());
    assert!(!session.in_flight);
}

#[tokio::test]
async fn test_load_more_refused_while_previous_fetch_in_flight() {
    let feed = FakeFeed::default();
    feed.expect_page(page(&["a"], Some("N=10")));
    let gate = feed.expect_gated();
    let navigator = Arc::new(Navigator::new(feed.clone(), "us"));

    navigator.search("shoes").await;

    let paging = {
        let navigator = navigator.clone();
        tokio::spawn(async move { navigator.load_more().await })
    };
    {
        let feed = feed.clone();
        wait_until(move || feed.requests().len() == 2).await;
    }

    // second call while the first is still gated: rejected, no third fetch
    navigator.load_more().await;
    assert_eq!(feed.requests().len(), 2);

    gate.send(Ok(page(&["b"], None))).ok();
    paging.await.unwrap();

    assert_eq!(titles(&navigator), vec!["a", "b"]);
}
