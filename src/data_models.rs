use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Feed query parameter names as constants for consistency
pub mod params {
    pub const KEYWORDS: &str = "Keywords";
    pub const MARKET: &str = "mkt";
    pub const AFFILIATE: &str = "affiliate";
    pub const FEED_TYPE: &str = "type";
    pub const FAVICON: &str = "enableFavicon";
    pub const IMAGE_IN_ADS: &str = "enableImageInAds";
    pub const SITE_LINK: &str = "siteLink";
}

/// One user-initiated search, immutable once built.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub keyword: String,
    pub market: String,
    pub flags: DisplayFlags,
}

#[derive(Debug, Clone, Copy)]
pub struct DisplayFlags {
    pub favicon: bool,
    pub image_in_ads: bool,
    pub site_link: bool,
}

impl Default for DisplayFlags {
    fn default() -> DisplayFlags {
        DisplayFlags {
            favicon: true,
            image_in_ads: true,
            site_link: true,
        }
    }
}

impl SearchRequest {
    pub fn new(keyword: &str, market: &str) -> SearchRequest {
        SearchRequest {
            keyword: keyword.to_string(),
            market: market.to_string(),
            flags: DisplayFlags::default(),
        }
    }

    /// Flatten into the parameter map sent to the feed. Reserved keys
    /// (affiliate, type) are forced later by the client, not here.
    pub fn into_params(self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(params::KEYWORDS.to_string(), self.keyword);
        map.insert(params::MARKET.to_string(), self.market);
        if self.flags.favicon {
            map.insert(params::FAVICON.to_string(), "1".to_string());
        }
        if self.flags.image_in_ads {
            map.insert(params::IMAGE_IN_ADS.to_string(), "1".to_string());
        }
        if self.flags.site_link {
            map.insert(params::SITE_LINK.to_string(), "1".to_string());
        }
        map
    }
}

/// One advertisement entry. The feed emits its fields either as attributes
/// or as child elements; both shapes are normalized away here, once.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_host: Option<String>,
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub listings: Vec<Listing>,
}

/// The translated response envelope: zero or more result sets plus an
/// optional continuation token (`NextArgs`). Absent token means no more
/// pages exist for the query.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ResultPage {
    pub result_sets: Vec<ResultSet>,
    pub next_args: Option<String>,
}

impl Listing {
    fn from_value(value: &Value) -> Listing {
        let site_host = text_field(value, "siteHost");
        let url = site_host.as_deref().map(derive_url);
        Listing {
            title: text_field(value, "title"),
            description: text_field(value, "description"),
            site_host,
            url,
        }
    }
}

impl ResultSet {
    fn from_value(value: &Value) -> ResultSet {
        ResultSet {
            listings: seq(value, "Listing").iter().map(Listing::from_value).collect(),
        }
    }
}

impl ResultPage {
    /// Normalize a translated feed response. Missing or wrong-shaped nesting
    /// at any level degrades to an empty page rather than failing.
    pub fn from_value(value: &Value) -> ResultPage {
        let Some(root) = seq(value, "Results").first() else {
            return ResultPage::default();
        };
        ResultPage {
            result_sets: seq(root, "ResultSet")
                .iter()
                .map(ResultSet::from_value)
                .collect(),
            next_args: text_field(root, "NextArgs"),
        }
    }
}

/// Look up `key` as a sequence, treating anything else as empty.
fn seq<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    match value.get(key) {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

/// Read a text field that may arrive as an attribute string, as a one-element
/// child sequence, or as a mixed element carrying its text under `#text`.
fn text_field(value: &Value, key: &str) -> Option<String> {
    let field = value.get(key)?;
    let text = match field {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(node_text),
        _ => None,
    };
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn node_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("#text").and_then(|t| t.as_str()).map(String::from),
        _ => None,
    }
}

fn derive_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

#[test]
fn test_derive_url_prepends_scheme_only_when_missing() {
    assert_eq!(derive_url("example.com"), "https://example.com");
    assert_eq!(derive_url("http://example.com"), "http://example.com");
    assert_eq!(derive_url("https://example.com"), "https://example.com");
}

#[test]
fn test_into_params_carries_keyword_market_and_flags() {
    let map = SearchRequest::new("running shoes", "us").into_params();
    assert_eq!(map.get(params::KEYWORDS).map(String::as_str), Some("running shoes"));
    assert_eq!(map.get(params::MARKET).map(String::as_str), Some("us"));
    assert_eq!(map.get(params::FAVICON).map(String::as_str), Some("1"));
    assert_eq!(map.get(params::IMAGE_IN_ADS).map(String::as_str), Some("1"));
    assert_eq!(map.get(params::SITE_LINK).map(String::as_str), Some("1"));
    // reserved keys are not set by the request itself
    assert!(map.get(params::AFFILIATE).is_none());
    assert!(map.get(params::FEED_TYPE).is_none());
}
