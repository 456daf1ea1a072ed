//! Search results page: query state, paginated messages, summary stats and derived charts.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{
    Backend, FetchError, SearchMessagesRequest, SearchStatsRequest, NO_DATA_MESSAGE,
    SEARCH_MESSAGES_PATH, SEARCH_STATS_PATH,
};
use crate::charts::{chart_height, derive_charts, SearchCharts};
use crate::query::{FetchTicket, KeyedQuery, ResolveOutcome};

pub const PAGE_SIZE: u64 = 100;
/// Pagination controls are shown only above this many results.
pub const PAGINATION_MIN_TOTAL: u64 = 5;
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1280;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    pub search_text: String,
    pub page_number: i64,
}

/// Raw `/searchMessages/` payload. Both fields are optional so an empty object still decodes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePageResponse {
    #[serde(default)]
    pub messages: Option<Vec<Value>>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<Value>,
    pub total_count: u64,
}

impl MessagePageResponse {
    /// A usable page needs a non-zero `totalCount`.
    pub fn page(&self) -> Option<MessagePage> {
        match self.total_count {
            Some(total_count) if total_count > 0 => Some(MessagePage {
                messages: self.messages.clone().unwrap_or_default(),
                total_count,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelledCount {
    pub label: String,
    pub count: u64,
}

/// `/search/` payload normalized to ordered `(label, count)` lists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchStats {
    #[serde(default, deserialize_with = "deserialize_labelled_counts")]
    pub ten_day_count: Vec<LabelledCount>,
    #[serde(default, deserialize_with = "deserialize_labelled_counts")]
    pub source: Vec<LabelledCount>,
}

fn deserialize_labelled_counts<'de, D>(deserializer: D) -> Result<Vec<LabelledCount>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    labelled_counts_from_value(&raw).map_err(de::Error::custom)
}

/// Accepts `[[label, count], ...]`, `[{label|date|name|source, count|value}, ...]`,
/// `{label: count}` and `{key: [label, count]}`.
pub fn labelled_counts_from_value(raw: &Value) -> Result<Vec<LabelledCount>, String> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(labelled_count_from_item).collect(),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::Array(_) => labelled_count_from_item(value),
                other => Ok(LabelledCount {
                    label: key.clone(),
                    count: count_from_value(other)
                        .ok_or_else(|| format!("invalid count for '{key}': {other}"))?,
                }),
            })
            .collect(),
        other => Err(format!("expected list or map of counts, found {other}")),
    }
}

fn labelled_count_from_item(item: &Value) -> Result<LabelledCount, String> {
    match item {
        Value::Array(pair) if pair.len() >= 2 => Ok(LabelledCount {
            label: label_from_value(&pair[0]),
            count: count_from_value(&pair[1])
                .ok_or_else(|| format!("invalid count in pair: {item}"))?,
        }),
        Value::Object(fields) => {
            let label = ["label", "date", "name", "source"]
                .iter()
                .find_map(|key| fields.get(*key))
                .map(label_from_value)
                .ok_or_else(|| format!("missing label in entry: {item}"))?;
            let count = ["count", "value"]
                .iter()
                .find_map(|key| fields.get(*key))
                .and_then(count_from_value)
                .ok_or_else(|| format!("missing count in entry: {item}"))?;
            Ok(LabelledCount { label, count })
        }
        other => Err(format!("expected [label, count] entry, found {other}")),
    }
}

fn label_from_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn count_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)),
        Value::String(text) => text.trim().replace(',', "").parse::<u64>().ok(),
        _ => None,
    }
}

pub fn derive_page_count(total_count: u64) -> u64 {
    total_count / PAGE_SIZE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageDirection {
    Next,
    Previous,
}

impl PageDirection {
    /// Only `"next"` moves forward; every other value means previous.
    pub fn parse(raw: &str) -> Self {
        if raw == "next" {
            PageDirection::Next
        } else {
            PageDirection::Previous
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFetch {
    Messages(FetchTicket<SearchQuery>),
    Stats(FetchTicket<String>),
}

impl SearchFetch {
    pub fn endpoint(&self) -> &'static str {
        match self {
            SearchFetch::Messages(_) => SEARCH_MESSAGES_PATH,
            SearchFetch::Stats(_) => SEARCH_STATS_PATH,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            SearchFetch::Messages(ticket) => ticket.generation,
            SearchFetch::Stats(ticket) => ticket.generation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchCompletion {
    Messages(
        FetchTicket<SearchQuery>,
        Result<MessagePageResponse, FetchError>,
    ),
    Stats(FetchTicket<String>, Result<SearchStats, FetchError>),
}

/// Executes one issued fetch against the backend.
pub fn run_search_fetch(backend: &dyn Backend, fetch: SearchFetch) -> SearchCompletion {
    match fetch {
        SearchFetch::Messages(ticket) => {
            let request = SearchMessagesRequest {
                word: ticket.key.search_text.clone(),
                page_number: ticket.key.page_number,
            };
            let result = backend.search_messages(&request);
            SearchCompletion::Messages(ticket, result)
        }
        SearchFetch::Stats(ticket) => {
            let request = SearchStatsRequest {
                word: ticket.key.clone(),
            };
            let result = backend.search_stats(&request);
            SearchCompletion::Stats(ticket, result)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchView {
    pub search_text: String,
    pub page_number: i64,
    pub page_count: u64,
    pub total_count: Option<u64>,
    pub messages: Option<Vec<Value>>,
    pub charts: Option<SearchCharts>,
    pub is_error: bool,
    pub error_message: Option<String>,
    pub is_loading_messages: bool,
    pub is_loading_chart: bool,
    pub show_pagination: bool,
    pub show_previous: bool,
    pub show_next: bool,
    pub chart_height: u32,
}

#[derive(Debug, Clone)]
pub struct SearchController {
    query: SearchQuery,
    page_count: u64,
    messages: KeyedQuery<SearchQuery, MessagePageResponse>,
    stats: KeyedQuery<String, SearchStats>,
    charts: Option<SearchCharts>,
    error: Option<String>,
    viewport_width: u32,
}

impl Default for SearchController {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchController {
    pub fn new() -> Self {
        Self {
            query: SearchQuery {
                search_text: String::new(),
                page_number: 0,
            },
            page_count: 0,
            messages: KeyedQuery::new(),
            stats: KeyedQuery::new(),
            charts: None,
            error: None,
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
        }
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    pub fn charts(&self) -> Option<&SearchCharts> {
        self.charts.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn messages(&self) -> Option<&MessagePageResponse> {
        self.messages.data()
    }

    pub fn stats(&self) -> Option<&SearchStats> {
        self.stats.data()
    }

    /// Updates the query and returns the fetches whose key changed.
    pub fn set_query(&mut self, search_text: impl Into<String>, page_number: i64) -> Vec<SearchFetch> {
        self.query = SearchQuery {
            search_text: search_text.into(),
            page_number,
        };

        let mut fetches = Vec::with_capacity(2);
        if let Some(ticket) = self.messages.set_key(self.query.clone()) {
            fetches.push(SearchFetch::Messages(ticket));
            self.sync_from_cached_messages();
        }
        if let Some(ticket) = self.stats.set_key(self.query.search_text.clone()) {
            fetches.push(SearchFetch::Stats(ticket));
            self.sync_from_cached_stats();
        }
        fetches
    }

    /// `Next` advances only while `page_number < page_count`; anything else steps back by one,
    /// without a lower bound.
    pub fn handle_page(&mut self, direction: PageDirection) -> Option<SearchFetch> {
        let page_number = match direction {
            PageDirection::Next if self.query.page_number < self.page_count_signed() => {
                self.query.page_number + 1
            }
            PageDirection::Next => return None,
            PageDirection::Previous => self.query.page_number - 1,
        };

        let search_text = self.query.search_text.clone();
        self.set_query(search_text, page_number).into_iter().next()
    }

    /// Re-issues both fetches for the current query.
    pub fn refetch(&mut self) -> Vec<SearchFetch> {
        let mut fetches = Vec::with_capacity(2);
        if let Some(ticket) = self.messages.refetch() {
            fetches.push(SearchFetch::Messages(ticket));
        }
        if let Some(ticket) = self.stats.refetch() {
            fetches.push(SearchFetch::Stats(ticket));
        }
        fetches
    }

    pub fn set_viewport_width(&mut self, width: u32) {
        self.viewport_width = width;
    }

    /// Applies a completed fetch. Returns `false` when the completion was superseded.
    pub fn apply(&mut self, completion: SearchCompletion) -> bool {
        match completion {
            SearchCompletion::Messages(ticket, result) => self.apply_messages(&ticket, result),
            SearchCompletion::Stats(ticket, result) => self.apply_stats(&ticket, result),
        }
    }

    pub fn apply_messages(
        &mut self,
        ticket: &FetchTicket<SearchQuery>,
        result: Result<MessagePageResponse, FetchError>,
    ) -> bool {
        match self.messages.resolve(ticket, result) {
            ResolveOutcome::Stale => {
                debug!(
                    component = "search",
                    event = "search.fetch.stale",
                    endpoint = SEARCH_MESSAGES_PATH,
                    generation = ticket.generation
                );
                false
            }
            ResolveOutcome::Stored => {
                self.sync_from_cached_messages();
                info!(
                    component = "search",
                    event = "search.fetch.finish",
                    endpoint = SEARCH_MESSAGES_PATH,
                    page_number = ticket.key.page_number,
                    page_count = self.page_count,
                    is_error = self.is_error()
                );
                true
            }
            ResolveOutcome::Failed(err) => {
                self.record_failure(SEARCH_MESSAGES_PATH, &err);
                true
            }
        }
    }

    pub fn apply_stats(
        &mut self,
        ticket: &FetchTicket<String>,
        result: Result<SearchStats, FetchError>,
    ) -> bool {
        match self.stats.resolve(ticket, result) {
            ResolveOutcome::Stale => {
                debug!(
                    component = "search",
                    event = "search.fetch.stale",
                    endpoint = SEARCH_STATS_PATH,
                    generation = ticket.generation
                );
                false
            }
            ResolveOutcome::Stored => {
                self.sync_from_cached_stats();
                info!(
                    component = "search",
                    event = "search.fetch.finish",
                    endpoint = SEARCH_STATS_PATH,
                    sources = self.stats.data().map(|s| s.source.len()).unwrap_or(0)
                );
                true
            }
            ResolveOutcome::Failed(err) => {
                self.record_failure(SEARCH_STATS_PATH, &err);
                true
            }
        }
    }

    pub fn view(&self) -> SearchView {
        let response = self.messages.data();
        let total_count = response.and_then(|r| r.total_count);

        SearchView {
            search_text: self.query.search_text.clone(),
            page_number: self.query.page_number,
            page_count: self.page_count,
            total_count,
            messages: response.and_then(|r| r.messages.clone()),
            charts: self.charts.clone(),
            is_error: self.is_error(),
            error_message: self.error.clone(),
            is_loading_messages: self.messages.is_loading(),
            is_loading_chart: self.stats.is_loading(),
            show_pagination: total_count.unwrap_or(0) > PAGINATION_MIN_TOTAL,
            show_previous: self.query.page_number != 0,
            show_next: self.query.page_number < self.page_count_signed(),
            chart_height: chart_height(self.viewport_width),
        }
    }

    fn page_count_signed(&self) -> i64 {
        i64::try_from(self.page_count).unwrap_or(i64::MAX)
    }

    fn sync_from_cached_messages(&mut self) {
        let Some(response) = self.messages.data() else {
            return;
        };

        // A present totalCount always drives the page count, even when it reads as no data.
        if let Some(total_count) = response.total_count {
            self.page_count = derive_page_count(total_count);
        }
        self.error = match response.page() {
            Some(_) => None,
            None => Some(NO_DATA_MESSAGE.to_string()),
        };
    }

    fn sync_from_cached_stats(&mut self) {
        let Some(stats) = self.stats.data() else {
            return;
        };
        self.charts = Some(derive_charts(stats));
        self.error = None;
    }

    fn record_failure(&mut self, endpoint: &'static str, err: &FetchError) {
        warn!(
            component = "search",
            event = "search.fetch.error",
            endpoint,
            error = %err
        );
        self.error = Some(err.user_message());
    }
}
