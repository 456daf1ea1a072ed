//! Schedule page: today's mints, the minute-by-minute countdown refresh and the detail list.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{FetchError, TODAYS_MINTS_PATH};
use crate::comparators::{
    group_thousands, matches_name_filter, sort_mints, ScheduleColumn, SortOrder,
};
use crate::observability::{env_override, positive_millis};
use crate::relative_time::from_now;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 60_000;
pub const NOTIFICATION_DURATION_MS: u64 = 5_000;
pub const SCHEDULE_DESCRIPTION: &str = "Projects must have > 2,000 Discord members (with > 300 being online), and  > 1,000 Twitter followers before showing up on the list.\n\"# Tweet Interactions\" gets an average of the Comments / Likes / Retweets (over the last 5 tweets), and adds them";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub tick_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

pub fn schedule_config_from_env() -> ScheduleConfig {
    ScheduleConfig {
        tick_interval_ms: env_override("MINTBOARD_SCHEDULE_TICK_MS", positive_millis)
            .unwrap_or(DEFAULT_TICK_INTERVAL_MS),
    }
}

/// Count-like field that may arrive as a JSON number or string.
///
/// The raw text is kept for display; [`CountValue::as_f64`] coerces it for ordering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountValue(Option<String>);

impl CountValue {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(Some(raw.into()))
    }

    pub fn missing() -> Self {
        Self(None)
    }

    pub fn raw(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_present(&self) -> bool {
        self.0.as_deref().is_some_and(|raw| !raw.trim().is_empty())
    }

    pub fn as_f64(&self) -> Option<f64> {
        let cleaned: String = self
            .0
            .as_deref()?
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    pub fn display(&self) -> String {
        self.0.as_deref().map(group_thousands).unwrap_or_default()
    }
}

impl Serialize for CountValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(raw) => serializer.serialize_str(raw),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for CountValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Null => CountValue(None),
            Value::String(text) => CountValue(Some(text)),
            other => CountValue(Some(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MintLinks {
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub discord: String,
    #[serde(default)]
    pub project: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TweetInteraction {
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub likes: f64,
    #[serde(default)]
    pub comments: f64,
    #[serde(default)]
    pub reactions: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "MintWire")]
#[serde(rename_all = "camelCase")]
pub struct Mint {
    pub project: String,
    pub image: String,
    pub links: MintLinks,
    pub time: String,
    pub count: CountValue,
    pub price: String,
    pub numbers_of_discord_members: CountValue,
    pub discord_online_members: CountValue,
    pub numbers_of_twitter_followers: CountValue,
    pub tweet_interaction: TweetInteraction,
    pub ten_day_search_results: Vec<String>,
    pub till_the_mint: Option<String>,
    pub extras: Option<String>,
    /// Countdown text derived from `time` on every tick; never read from the wire.
    pub mint_expires_at: Option<String>,
}

/// Wire shape accepted for a mint, covering both the flat link fields and the
/// legacy `10DaySearchResults` / `DiscordOnlineMembers` names.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MintWire {
    #[serde(default)]
    project: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    links: Option<MintLinks>,
    #[serde(default)]
    twitter_link: Option<String>,
    #[serde(default)]
    discord_link: Option<String>,
    #[serde(default)]
    project_link: Option<String>,
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    count: CountValue,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    numbers_of_discord_members: CountValue,
    #[serde(default)]
    discord_online_members: Option<CountValue>,
    #[serde(default, rename = "DiscordOnlineMembers")]
    legacy_discord_online_members: Option<CountValue>,
    #[serde(default)]
    numbers_of_twitter_followers: CountValue,
    #[serde(default)]
    tweet_interaction: Option<TweetInteraction>,
    #[serde(default)]
    ten_day_search_results: Option<Vec<String>>,
    #[serde(default, rename = "10DaySearchResults")]
    legacy_ten_day_search_results: Option<Vec<String>>,
    #[serde(default)]
    till_the_mint: Option<String>,
    #[serde(default)]
    extras: Option<String>,
}

impl From<MintWire> for Mint {
    fn from(wire: MintWire) -> Self {
        let mut links = wire.links.unwrap_or_default();
        if let Some(twitter) = wire.twitter_link {
            links.twitter = twitter;
        }
        if let Some(discord) = wire.discord_link {
            links.discord = discord;
        }
        if let Some(project) = wire.project_link {
            links.project = project;
        }

        Mint {
            project: wire.project,
            image: wire.image,
            links,
            time: wire.time.unwrap_or_default(),
            count: wire.count,
            price: wire.price.unwrap_or_default(),
            numbers_of_discord_members: wire.numbers_of_discord_members,
            discord_online_members: wire
                .discord_online_members
                .or(wire.legacy_discord_online_members)
                .unwrap_or_default(),
            numbers_of_twitter_followers: wire.numbers_of_twitter_followers,
            tweet_interaction: wire.tweet_interaction.unwrap_or_default(),
            ten_day_search_results: wire
                .ten_day_search_results
                .or(wire.legacy_ten_day_search_results)
                .unwrap_or_default(),
            till_the_mint: wire.till_the_mint,
            extras: wire.extras,
            mint_expires_at: None,
        }
    }
}

impl Mint {
    /// Discord link is usable only with both a link and a member count.
    pub fn discord_link_enabled(&self) -> bool {
        !self.links.discord.is_empty() && self.numbers_of_discord_members.is_present()
    }

    pub fn project_link_enabled(&self) -> bool {
        !self.links.project.is_empty()
    }
}

/// `data` envelope of `/getTodaysMints`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MintSchedule {
    #[serde(default)]
    pub mints: Vec<Mint>,
    #[serde(default)]
    pub date: String,
}

/// Parses a mint `time` as an instant.
///
/// Full date-times are taken as-is (UTC); otherwise the leading `H:M[:S]` token is a
/// UTC time of day on `day`.
pub fn parse_mint_instant(raw: &str, day: NaiveDate) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&parsed));
        }
    }

    let token = trimmed.split_whitespace().next()?;
    let time_of_day = NaiveTime::parse_from_str(token, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(token, "%H:%M"))
        .ok()?;
    Some(Utc.from_utc_datetime(&day.and_time(time_of_day)))
}

/// `" (in 3 hours)"` style countdown for a mint time, or `None` when the time is empty
/// or cannot be read.
pub fn mint_countdown(time: &str, now: DateTime<Utc>) -> Option<String> {
    let target = parse_mint_instant(time, now.date_naive())?;
    Some(format!(" ({})", from_now(target, now)))
}

/// Recomputes every derived countdown against `now`.
pub fn recompute_expiry(events: Vec<Mint>, now: DateTime<Utc>) -> Vec<Mint> {
    events
        .into_iter()
        .map(|mut mint| {
            if let Some(countdown) = mint_countdown(&mint.time, now) {
                mint.mint_expires_at = Some(countdown);
            }
            mint
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationColor {
    Danger,
}

/// Transient toast shown after a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub message: String,
    pub color: NotificationColor,
    pub duration_ms: u64,
    pub raised_at: DateTime<Utc>,
}

impl Notification {
    pub fn danger(message: impl Into<String>, raised_at: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            color: NotificationColor::Danger,
            duration_ms: NOTIFICATION_DURATION_MS,
            raised_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.raised_at).num_milliseconds();
        elapsed >= 0 && elapsed as u64 >= self.duration_ms
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScheduleTableQuery {
    pub sort: Option<ScheduleColumn>,
    pub order: SortOrder,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleRow {
    pub project: String,
    pub image: String,
    pub twitter_link: String,
    pub discord_link: String,
    pub discord_link_enabled: bool,
    pub project_link: String,
    pub project_link_enabled: bool,
    pub time: String,
    pub mint_expires_at: Option<String>,
    pub price: String,
    pub supply: String,
    pub discord_members: String,
    pub discord_online: String,
    pub twitter_followers: String,
    pub tweet_interactions: f64,
}

impl From<&Mint> for ScheduleRow {
    fn from(mint: &Mint) -> Self {
        Self {
            project: mint.project.clone(),
            image: mint.image.clone(),
            twitter_link: mint.links.twitter.clone(),
            discord_link: mint.links.discord.clone(),
            discord_link_enabled: mint.discord_link_enabled(),
            project_link: mint.links.project.clone(),
            project_link_enabled: mint.project_link_enabled(),
            time: mint.time.clone(),
            mint_expires_at: mint.mint_expires_at.clone(),
            price: mint.price.clone(),
            supply: mint.count.display(),
            discord_members: mint.numbers_of_discord_members.display(),
            discord_online: mint.discord_online_members.display(),
            twitter_followers: mint.numbers_of_twitter_followers.display(),
            tweet_interactions: mint.tweet_interaction.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MintDetail {
    pub open: bool,
    pub project: Option<String>,
    pub related_search_results: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleView {
    pub title: String,
    pub description: &'static str,
    pub date: String,
    pub is_loading: bool,
    pub rows: Vec<ScheduleRow>,
    pub detail: MintDetail,
    pub notification: Option<Notification>,
    pub last_tick_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleController {
    mints: Vec<Mint>,
    date: String,
    is_loading: bool,
    detail: MintDetail,
    notification: Option<Notification>,
    last_tick_at: Option<DateTime<Utc>>,
}

impl ScheduleController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mints(&self) -> &[Mint] {
        &self.mints
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn detail(&self) -> &MintDetail {
        &self.detail
    }

    pub fn last_tick_at(&self) -> Option<DateTime<Utc>> {
        self.last_tick_at
    }

    pub fn begin_fetch(&mut self) {
        self.is_loading = true;
    }

    /// Stores a fetch result. Returns `true` when the list length changed, which re-arms the ticker.
    pub fn apply_fetch(
        &mut self,
        result: Result<MintSchedule, FetchError>,
        now: DateTime<Utc>,
    ) -> bool {
        self.is_loading = false;

        match result {
            Ok(schedule) => {
                let previous_len = self.mints.len();
                self.mints = schedule.mints;
                self.date = schedule.date;
                info!(
                    component = "schedule",
                    event = "schedule.fetch.finish",
                    mints = self.mints.len(),
                    date = %self.date
                );
                previous_len != self.mints.len()
            }
            Err(err) => {
                warn!(
                    component = "schedule",
                    event = "schedule.fetch.error",
                    endpoint = TODAYS_MINTS_PATH,
                    error = %err
                );
                self.notification = Some(Notification::danger(err.user_message(), now));
                false
            }
        }
    }

    /// Refreshes every countdown. A no-op on an empty list.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if self.mints.is_empty() {
            return;
        }
        self.mints = recompute_expiry(std::mem::take(&mut self.mints), now);
        self.last_tick_at = Some(now);
        debug!(
            component = "schedule",
            event = "schedule.tick",
            mints = self.mints.len()
        );
    }

    /// Toggles the detail view and shows the mint's related search results.
    pub fn select_event(&mut self, mint: &Mint) {
        self.detail.open = !self.detail.open;
        self.detail.project = Some(mint.project.clone());
        self.detail.related_search_results = mint.ten_day_search_results.clone();
    }

    /// Selects the first mint named `project`. Returns `false` if there is none.
    pub fn select_project(&mut self, project: &str) -> bool {
        let Some(mint) = self.mints.iter().find(|mint| mint.project == project).cloned() else {
            return false;
        };
        self.select_event(&mint);
        true
    }

    pub fn active_notification(&self, now: DateTime<Utc>) -> Option<&Notification> {
        self.notification
            .as_ref()
            .filter(|notification| !notification.is_expired(now))
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    pub fn view(&self, now: DateTime<Utc>, table: &ScheduleTableQuery) -> ScheduleView {
        let mut mints: Vec<Mint> = match table.filter.as_deref() {
            Some(term) if !term.is_empty() => self
                .mints
                .iter()
                .filter(|mint| matches_name_filter(term, mint))
                .cloned()
                .collect(),
            _ => self.mints.clone(),
        };
        if let Some(column) = table.sort {
            sort_mints(&mut mints, column, table.order);
        }

        ScheduleView {
            title: format!("Mint Schedule - {}", self.date),
            description: SCHEDULE_DESCRIPTION,
            date: self.date.clone(),
            is_loading: self.is_loading,
            rows: mints.iter().map(ScheduleRow::from).collect(),
            detail: self.detail.clone(),
            notification: self.active_notification(now).cloned(),
            last_tick_at: self.last_tick_at,
        }
    }
}
