//! HTTP routes for the schedule and search pages.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::comparators::{ScheduleColumn, SortOrder, SORTABLE_COLUMNS};
use crate::pages::{SchedulePage, SearchPage};
use crate::schedule::{ScheduleRow, ScheduleTableQuery, ScheduleView};
use crate::search::PageDirection;

/// Raw `?sort=&order=&filter=` parameters. Unknown values fall back to the unsorted, ascending table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleParams {
    pub sort: Option<String>,
    pub order: Option<String>,
    pub filter: Option<String>,
}

impl ScheduleParams {
    pub fn to_table_query(&self) -> ScheduleTableQuery {
        ScheduleTableQuery {
            sort: self.sort.as_deref().and_then(ScheduleColumn::parse),
            order: self
                .order
                .as_deref()
                .map(SortOrder::parse)
                .unwrap_or_default(),
            filter: self
                .filter
                .as_deref()
                .map(str::trim)
                .filter(|term| !term.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectRequest {
    pub project: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQueryRequest {
    pub word: String,
    #[serde(default)]
    pub page_number: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageRequest {
    pub direction: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewportRequest {
    pub width: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpApiError {
    #[error("no mint named {0:?} in today's schedule")]
    UnknownProject(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        let status = match self {
            HttpApiError::UnknownProject(_) => StatusCode::NOT_FOUND,
        };
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Clone)]
struct DashboardAppState {
    schedule: Arc<SchedulePage>,
    search: Arc<SearchPage>,
}

pub fn dashboard_router(schedule: Arc<SchedulePage>, search: Arc<SearchPage>) -> Router {
    Router::new()
        .route("/schedule", get(get_schedule_html))
        .route("/schedule/snapshot", get(get_schedule_snapshot))
        .route("/schedule/select", post(post_schedule_select))
        .route("/schedule/refresh", post(post_schedule_refresh))
        .route("/schedule/notification", delete(delete_schedule_notification))
        .route("/search/snapshot", get(get_search_snapshot))
        .route("/search/query", post(post_search_query))
        .route("/search/page", post(post_search_page))
        .route("/search/viewport", post(post_search_viewport))
        .with_state(DashboardAppState { schedule, search })
}

pub fn render_schedule_html(view: &ScheduleView, params: &ScheduleParams) -> String {
    let now_utc = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let table = params.to_table_query();

    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape_html(&view.title)));
    out.push_str("<style>:root{--bg:#f4f6f8;--card:#ffffff;--ink:#1b2228;--muted:#65717b;--line:#dde2e6;--head:#1f2d3a;--link:#1668dc;--danger:#c0392b}*{box-sizing:border-box}body{margin:0;color:var(--ink);font-family:\"Inter\",\"Segoe UI\",sans-serif;background:var(--bg);min-height:100vh}.shell{max-width:1500px;margin:0 auto;padding:24px 18px 28px}.hero h1{margin:0 0 8px;font-size:1.5rem}.description{white-space:pre-line;color:var(--muted);font-size:.9rem;margin:0 0 12px}.toast{background:var(--danger);color:#fff;border-radius:10px;padding:10px 14px;margin-bottom:12px}.filters-form{margin:0 0 12px}.card{background:var(--card);border:1px solid var(--line);border-radius:12px;overflow:hidden}.table-wrap{overflow:auto;max-height:80vh}table{width:100%;border-collapse:collapse;min-width:1200px}thead th{position:sticky;top:0;background:var(--head);color:#f2f7f9;font-size:.8rem;padding:10px;text-align:left}thead th a{color:inherit;text-decoration:none}tbody td{font-size:.86rem;padding:9px 10px;border-bottom:1px solid var(--line);vertical-align:middle}.project-cell img{width:36px;height:36px;border-radius:50%;vertical-align:middle;margin-right:8px}.schedule-link{color:var(--link);margin-right:6px}.schedule-link-disabled{color:#b8c0c7;pointer-events:none;margin-right:6px}.countdown{color:var(--muted)}.detail{padding:12px 14px;border-top:1px solid var(--line)}.loading{padding:12px 14px;color:var(--muted)}</style>\n");
    out.push_str("</head><body><main class=\"shell\">\n");
    out.push_str(&format!(
        "<section class=\"hero\"><h1>{}</h1>",
        escape_html(&view.title)
    ));
    out.push_str(&format!(
        "<p class=\"description\">{}</p>",
        escape_html(view.description)
    ));
    out.push_str(&format!(
        "<p class=\"description\">Rows: {} &middot; Generated: {}</p></section>\n",
        view.rows.len(),
        escape_html(&now_utc)
    ));

    if let Some(notification) = &view.notification {
        out.push_str(&format!(
            "<div class=\"toast toast-danger\" role=\"alert\">{}</div>\n",
            escape_html(&notification.message)
        ));
    }

    out.push_str("<form class=\"filters-form\" method=\"get\" action=\"/schedule\">");
    out.push_str(&format!(
        "<input type=\"search\" name=\"filter\" placeholder=\"Filter by name\" value=\"{}\">",
        escape_html(table.filter.as_deref().unwrap_or(""))
    ));
    if let Some(column) = table.sort {
        out.push_str(&format!(
            "<input type=\"hidden\" name=\"sort\" value=\"{}\">",
            column.key()
        ));
        out.push_str(&format!(
            "<input type=\"hidden\" name=\"order\" value=\"{}\">",
            order_key(table.order)
        ));
    }
    out.push_str("</form>\n");

    out.push_str("<section class=\"card\">");
    if view.is_loading {
        out.push_str("<div class=\"loading\">Loading&hellip;</div>");
    }
    out.push_str("<div class=\"table-wrap\"><table id=\"schedule-table\">\n<thead><tr>");
    for column in SORTABLE_COLUMNS {
        out.push_str(&sort_header(column, &table));
    }
    out.push_str("</tr></thead><tbody>\n");

    for (idx, row) in view.rows.iter().enumerate() {
        out.push_str(&format!("<tr data-row=\"{idx}\">"));
        out.push_str(&project_cell(row));
        out.push_str("<td>");
        out.push_str(&escape_html(&row.time));
        if let Some(countdown) = &row.mint_expires_at {
            out.push_str("<span class=\"countdown\">");
            out.push_str(&escape_html(countdown));
            out.push_str("</span>");
        }
        out.push_str("</td>");
        out.push_str(&format!("<td>{}</td>", price_html(&row.price)));
        for value in [
            &row.supply,
            &row.discord_members,
            &row.discord_online,
            &row.twitter_followers,
        ] {
            out.push_str(&format!("<td>{}</td>", escape_html(value)));
        }
        out.push_str(&format!("<td>{}</td>", row.tweet_interactions));
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody></table></div>");

    if view.detail.open {
        out.push_str("<div class=\"detail\"><h2>");
        out.push_str(&escape_html(view.detail.project.as_deref().unwrap_or("")));
        out.push_str("</h2><ul>");
        for result in &view.detail.related_search_results {
            out.push_str("<li>");
            out.push_str(&escape_html(result));
            out.push_str("</li>");
        }
        out.push_str("</ul></div>");
    }

    out.push_str("</section></main></body></html>\n");
    out
}

fn sort_header(column: ScheduleColumn, table: &ScheduleTableQuery) -> String {
    let next_order = match (table.sort, table.order) {
        (Some(active), SortOrder::Asc) if active == column => SortOrder::Desc,
        _ => SortOrder::Asc,
    };
    let marker = match (table.sort, table.order) {
        (Some(active), SortOrder::Asc) if active == column => " &#9650;",
        (Some(active), SortOrder::Desc) if active == column => " &#9660;",
        _ => "",
    };
    let mut href = format!("/schedule?sort={}&order={}", column.key(), order_key(next_order));
    if let Some(filter) = &table.filter {
        href.push_str("&filter=");
        href.push_str(&encode_query_value(filter));
    }

    format!(
        "<th><a href=\"{}\">{}{}</a></th>",
        escape_html(&href),
        escape_html(column.title()),
        marker
    )
}

fn project_cell(row: &ScheduleRow) -> String {
    let mut out = String::from("<td class=\"project-cell\">");
    if !row.image.is_empty() {
        out.push_str(&format!(
            "<img src=\"{}\" alt=\"\">",
            escape_html(&row.image)
        ));
    }
    out.push_str(&format!(
        "<b class=\"project-name\" data-project=\"{0}\">{0}</b><br>",
        escape_html(&row.project)
    ));
    out.push_str(&link_html("Discord", &row.discord_link, row.discord_link_enabled));
    out.push_str(&link_html("Twitter", &row.twitter_link, true));
    out.push_str(&link_html("Website", &row.project_link, row.project_link_enabled));
    out.push_str("</td>");
    out
}

fn link_html(label: &str, href: &str, enabled: bool) -> String {
    let class = if enabled {
        "schedule-link"
    } else {
        "schedule-link-disabled"
    };
    format!(
        "<a class=\"{class}\" target=\"_blank\" rel=\"noopener noreferrer\" href=\"{}\">{label}</a>",
        escape_html(href)
    )
}

/// Escaped price with a line break before every "public", matched case-insensitively.
pub fn price_html(price: &str) -> String {
    let escaped = escape_html(price);
    let lower = escaped.to_ascii_lowercase();
    let mut out = String::with_capacity(escaped.len() + 8);
    let mut cursor = 0;
    while let Some(offset) = lower[cursor..].find("public") {
        let start = cursor + offset;
        out.push_str(&escaped[cursor..start]);
        out.push_str("<br>public");
        cursor = start + "public".len();
    }
    out.push_str(&escaped[cursor..]);
    out
}

fn order_key(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "asc",
        SortOrder::Desc => "desc",
    }
}

fn encode_query_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

async fn get_schedule_html(
    State(state): State<DashboardAppState>,
    Query(params): Query<ScheduleParams>,
) -> impl IntoResponse {
    let view = state.schedule.view(&params.to_table_query());
    Html(render_schedule_html(&view, &params))
}

async fn get_schedule_snapshot(
    State(state): State<DashboardAppState>,
    Query(params): Query<ScheduleParams>,
) -> impl IntoResponse {
    let view = state.schedule.view(&params.to_table_query());
    info!(
        component = "dashboard",
        event = "http.snapshot.request",
        page = "schedule",
        rows = view.rows.len()
    );
    Json(view)
}

async fn post_schedule_select(
    State(state): State<DashboardAppState>,
    Json(request): Json<SelectRequest>,
) -> Result<Json<ScheduleView>, HttpApiError> {
    if !state.schedule.select_project(&request.project) {
        return Err(HttpApiError::UnknownProject(request.project));
    }
    Ok(Json(state.schedule.view(&ScheduleTableQuery::default())))
}

async fn post_schedule_refresh(State(state): State<DashboardAppState>) -> StatusCode {
    state.schedule.refetch();
    StatusCode::ACCEPTED
}

async fn delete_schedule_notification(State(state): State<DashboardAppState>) -> StatusCode {
    state.schedule.dismiss_notification();
    StatusCode::NO_CONTENT
}

async fn get_search_snapshot(State(state): State<DashboardAppState>) -> impl IntoResponse {
    let view = state.search.view();
    info!(
        component = "dashboard",
        event = "http.snapshot.request",
        page = "search",
        page_number = view.page_number
    );
    Json(view)
}

async fn post_search_query(
    State(state): State<DashboardAppState>,
    Json(request): Json<SearchQueryRequest>,
) -> impl IntoResponse {
    state.search.set_query(request.word, request.page_number);
    Json(state.search.view())
}

async fn post_search_page(
    State(state): State<DashboardAppState>,
    Json(request): Json<PageRequest>,
) -> impl IntoResponse {
    state
        .search
        .handle_page(PageDirection::parse(&request.direction));
    Json(state.search.view())
}

async fn post_search_viewport(
    State(state): State<DashboardAppState>,
    Json(request): Json<ViewportRequest>,
) -> impl IntoResponse {
    state.search.set_viewport_width(request.width);
    Json(state.search.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{MintDetail, Notification, SCHEDULE_DESCRIPTION};

    fn row(project: &str) -> ScheduleRow {
        ScheduleRow {
            project: project.to_string(),
            image: String::new(),
            twitter_link: "https://twitter.com/x".to_string(),
            discord_link: String::new(),
            discord_link_enabled: false,
            project_link: "https://example.org".to_string(),
            project_link_enabled: true,
            time: "18:00".to_string(),
            mint_expires_at: Some(" (in 9 hours)".to_string()),
            price: "0.1 ETH Public 0.2 ETH".to_string(),
            supply: "10,000".to_string(),
            discord_members: "2,400".to_string(),
            discord_online: "350".to_string(),
            twitter_followers: "1,200".to_string(),
            tweet_interactions: 12.5,
        }
    }

    fn view(rows: Vec<ScheduleRow>) -> ScheduleView {
        ScheduleView {
            title: "Mint Schedule - April 12, 2022".to_string(),
            description: SCHEDULE_DESCRIPTION,
            date: "April 12, 2022".to_string(),
            is_loading: false,
            rows,
            detail: MintDetail::default(),
            notification: None,
            last_tick_at: None,
        }
    }

    #[test]
    fn params_parse_into_table_query() {
        let params = ScheduleParams {
            sort: Some("price".to_string()),
            order: Some("desc".to_string()),
            filter: Some("  ".to_string()),
        };
        let table = params.to_table_query();
        assert_eq!(table.sort, Some(ScheduleColumn::Price));
        assert_eq!(table.order, SortOrder::Desc);
        assert_eq!(table.filter, None);

        let unknown = ScheduleParams {
            sort: Some("bogus".to_string()),
            ..ScheduleParams::default()
        };
        assert_eq!(unknown.to_table_query(), ScheduleTableQuery::default());
    }

    #[test]
    fn price_breaks_before_public_in_any_case() {
        assert_eq!(
            price_html("0.1 ETH Public 0.2 ETH"),
            "0.1 ETH <br>public 0.2 ETH"
        );
        assert_eq!(price_html("1 ETH"), "1 ETH");
        assert_eq!(price_html("<b>public</b>"), "&lt;b&gt;<br>public&lt;/b&gt;");
    }

    #[test]
    fn rendered_html_has_headers_links_and_countdown() {
        let html = render_schedule_html(&view(vec![row("Moon <Birds>")]), &ScheduleParams::default());

        assert!(html.contains("Mint Schedule - April 12, 2022"));
        for column in SORTABLE_COLUMNS {
            assert!(html.contains(column.title()), "missing {}", column.title());
        }
        assert!(html.contains("Moon &lt;Birds&gt;"));
        assert!(html.contains("schedule-link-disabled"));
        assert!(html.contains("(in 9 hours)"));
        assert!(html.contains("<br>public"));
        assert!(!html.contains("toast-danger"));
    }

    #[test]
    fn active_sort_header_flips_order_and_keeps_filter() {
        let params = ScheduleParams {
            sort: Some("name".to_string()),
            order: Some("asc".to_string()),
            filter: Some("moon birds".to_string()),
        };
        let html = render_schedule_html(&view(Vec::new()), &params);

        assert!(html.contains("/schedule?sort=name&amp;order=desc&amp;filter=moon%20birds"));
        assert!(html.contains("/schedule?sort=time&amp;order=asc&amp;filter=moon%20birds"));
        assert!(html.contains("&#9650;"));
    }

    #[test]
    fn notification_and_detail_render_when_present() {
        let mut with_toast = view(vec![row("Moonbirds")]);
        with_toast.notification = Some(Notification::danger("Unable to connect", Utc::now()));
        with_toast.detail = MintDetail {
            open: true,
            project: Some("Moonbirds".to_string()),
            related_search_results: vec!["moonbirds mint tonight".to_string()],
        };

        let html = render_schedule_html(&with_toast, &ScheduleParams::default());
        assert!(html.contains("toast-danger"));
        assert!(html.contains("Unable to connect"));
        assert!(html.contains("<li>moonbirds mint tonight</li>"));
    }
}
