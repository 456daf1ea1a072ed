//! Mintboard core crate.
//!
//! Current implemented scope:
//! - search page: paged message lookup, stats charts and pagination state
//! - schedule page: today's mints, live countdowns, sorting and filtering
//! - backend client for the search and mint schedule endpoints
//! - page runtimes and the HTTP dashboard that serves both pages

mod backend;
mod charts;
mod comparators;
mod dashboard;
mod observability;
mod pages;
mod query;
mod relative_time;
mod schedule;
mod search;

pub use backend::{
    backend_config_from_env, extract_error_message, Backend, BackendConfig, FetchError,
    ReqwestBackend, SearchMessagesRequest, SearchStatsRequest, CONNECTIVITY_MESSAGE,
    NO_DATA_MESSAGE, SEARCH_MESSAGES_PATH, SEARCH_STATS_PATH, TODAYS_MINTS_PATH,
};
pub use charts::{
    chart_height, daily_count_chart, derive_charts, source_chart, ChartData, ChartDataset,
    ChartKind, SearchCharts, DAILY_COUNT_BORDER_COLOR, SOURCE_BACKGROUND_COLOR,
};
pub use comparators::{
    compare_discord_members, compare_discord_online, compare_name, compare_price,
    compare_supply, compare_time, compare_tweet_interactions, compare_twitter_followers,
    group_thousands, leading_price, matches_name_filter, sort_mints, MintComparator,
    ScheduleColumn, SortOrder, SORTABLE_COLUMNS,
};
pub use dashboard::{
    dashboard_router, price_html, render_schedule_html, HttpApiError, PageRequest,
    ScheduleParams, SearchQueryRequest, SelectRequest, ViewportRequest,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_backend_selected, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use pages::{SchedulePage, SearchPage};
pub use query::{
    FetchTicket, KeyedQuery, QueryStatus, ResolveOutcome, DEFAULT_MAX_CACHED_KEYS,
};
pub use relative_time::{from_now, humanize_millis};
pub use schedule::{
    mint_countdown, parse_mint_instant, recompute_expiry, schedule_config_from_env, CountValue,
    Mint, MintDetail, MintLinks, MintSchedule, Notification, NotificationColor, ScheduleConfig,
    ScheduleController, ScheduleRow, ScheduleTableQuery, ScheduleView, TweetInteraction,
    DEFAULT_TICK_INTERVAL_MS, NOTIFICATION_DURATION_MS, SCHEDULE_DESCRIPTION,
};
pub use search::{
    derive_page_count, labelled_counts_from_value, run_search_fetch, LabelledCount, MessagePage,
    MessagePageResponse, PageDirection, SearchCompletion, SearchController, SearchFetch,
    SearchQuery, SearchStats, SearchView, DEFAULT_VIEWPORT_WIDTH, PAGE_SIZE,
    PAGINATION_MIN_TOTAL,
};
