//! Column ordering and display helpers for the schedule table.

use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::schedule::{parse_mint_instant, Mint};

pub type MintComparator = fn(&Mint, &Mint) -> Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleColumn {
    Name,
    Time,
    Price,
    Supply,
    DiscordMembers,
    DiscordOnline,
    TwitterFollowers,
    TweetInteractions,
}

pub const SORTABLE_COLUMNS: [ScheduleColumn; 8] = [
    ScheduleColumn::Name,
    ScheduleColumn::Time,
    ScheduleColumn::Price,
    ScheduleColumn::Supply,
    ScheduleColumn::DiscordMembers,
    ScheduleColumn::DiscordOnline,
    ScheduleColumn::TwitterFollowers,
    ScheduleColumn::TweetInteractions,
];

impl ScheduleColumn {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name" | "project" => Some(Self::Name),
            "time" => Some(Self::Time),
            "price" => Some(Self::Price),
            "supply" | "count" => Some(Self::Supply),
            "discord" | "discord_members" => Some(Self::DiscordMembers),
            "discord_online" => Some(Self::DiscordOnline),
            "twitter" | "twitter_followers" => Some(Self::TwitterFollowers),
            "tweets" | "tweet_interactions" => Some(Self::TweetInteractions),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Time => "time",
            Self::Price => "price",
            Self::Supply => "supply",
            Self::DiscordMembers => "discord_members",
            Self::DiscordOnline => "discord_online",
            Self::TwitterFollowers => "twitter_followers",
            Self::TweetInteractions => "tweet_interactions",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Time => "Time",
            Self::Price => "Price",
            Self::Supply => "Supply",
            Self::DiscordMembers => "Discord (all)",
            Self::DiscordOnline => "Discord (online)",
            Self::TwitterFollowers => "Twitter",
            Self::TweetInteractions => "Tweet Interactions",
        }
    }

    pub fn comparator(self) -> MintComparator {
        match self {
            Self::Name => compare_name,
            Self::Time => compare_time,
            Self::Price => compare_price,
            Self::Supply => compare_supply,
            Self::DiscordMembers => compare_discord_members,
            Self::DiscordOnline => compare_discord_online,
            Self::TwitterFollowers => compare_twitter_followers,
            Self::TweetInteractions => compare_tweet_interactions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }
}

/// Stable sort by one column.
pub fn sort_mints(mints: &mut [Mint], column: ScheduleColumn, order: SortOrder) {
    let comparator = column.comparator();
    match order {
        SortOrder::Asc => mints.sort_by(comparator),
        SortOrder::Desc => mints.sort_by(|a, b| comparator(b, a)),
    }
}

pub fn compare_name(a: &Mint, b: &Mint) -> Ordering {
    a.project.cmp(&b.project)
}

// Time-only values share one reference day so they order by time of day.
pub fn compare_time(a: &Mint, b: &Mint) -> Ordering {
    let day = reference_day();
    cmp_optional(
        parse_mint_instant(&a.time, day).map(|t| t.timestamp_millis() as f64),
        parse_mint_instant(&b.time, day).map(|t| t.timestamp_millis() as f64),
    )
}

pub fn compare_price(a: &Mint, b: &Mint) -> Ordering {
    cmp_optional(leading_price(&a.price), leading_price(&b.price))
}

pub fn compare_supply(a: &Mint, b: &Mint) -> Ordering {
    cmp_optional(a.count.as_f64(), b.count.as_f64())
}

pub fn compare_discord_members(a: &Mint, b: &Mint) -> Ordering {
    cmp_optional(
        a.numbers_of_discord_members.as_f64(),
        b.numbers_of_discord_members.as_f64(),
    )
}

pub fn compare_discord_online(a: &Mint, b: &Mint) -> Ordering {
    cmp_optional(
        a.discord_online_members.as_f64(),
        b.discord_online_members.as_f64(),
    )
}

pub fn compare_twitter_followers(a: &Mint, b: &Mint) -> Ordering {
    cmp_optional(
        a.numbers_of_twitter_followers.as_f64(),
        b.numbers_of_twitter_followers.as_f64(),
    )
}

pub fn compare_tweet_interactions(a: &Mint, b: &Mint) -> Ordering {
    a.tweet_interaction
        .total
        .total_cmp(&b.tweet_interaction.total)
}

/// First whitespace separated token that reads as a number, e.g. `2` in `"public 2 ETH"`.
pub fn leading_price(price: &str) -> Option<f64> {
    price
        .split_whitespace()
        .find_map(|token| token.replace(',', "").parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

/// Case-insensitive substring match on the project name.
pub fn matches_name_filter(term: &str, mint: &Mint) -> bool {
    mint.project
        .to_lowercase()
        .contains(&term.trim().to_lowercase())
}

/// Inserts thousands separators into the integer part of a plain number.
///
/// Text that is not a plain number (including already grouped values) is returned unchanged.
pub fn group_thousands(raw: &str) -> String {
    let trimmed = raw.trim();
    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", trimmed),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    if integer.is_empty() || !integer.chars().all(|c| c.is_ascii_digit()) {
        return raw.to_string();
    }

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (idx, digit) in integer.chars().enumerate() {
        if idx > 0 && (integer.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(fraction) => format!("{sign}{grouped}.{fraction}"),
        None => format!("{sign}{grouped}"),
    }
}

fn cmp_optional(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
    }
}

fn reference_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{CountValue, TweetInteraction};

    fn named(project: &str) -> Mint {
        Mint {
            project: project.to_string(),
            ..Mint::default()
        }
    }

    fn priced(price: &str) -> Mint {
        Mint {
            price: price.to_string(),
            ..Mint::default()
        }
    }

    fn supply(count: &str) -> Mint {
        Mint {
            count: CountValue::new(count),
            ..Mint::default()
        }
    }

    #[test]
    fn price_compares_number_regardless_of_leading_word() {
        let half = priced("0.5 ETH");
        let one = priced("1 ETH");
        let public_two = priced("public 2 ETH");

        assert_eq!(compare_price(&half, &one), Ordering::Less);
        assert_eq!(compare_price(&one, &public_two), Ordering::Less);
        assert_eq!(compare_price(&public_two, &half), Ordering::Greater);
        assert_eq!(leading_price("public 2 ETH"), Some(2.0));
        assert_eq!(leading_price("TBA"), None);
    }

    #[test]
    fn supply_ignores_thousands_separators() {
        assert_eq!(
            compare_supply(&supply("1,000"), &supply("1000")),
            Ordering::Equal
        );
        assert_eq!(
            compare_supply(&supply("10,000"), &supply("9,999")),
            Ordering::Greater
        );
        assert_eq!(
            compare_supply(&supply("1,000,000"), &supply("999999")),
            Ordering::Greater
        );
    }

    #[test]
    fn member_counts_coerce_strings_to_numbers() {
        let mut a = Mint::default();
        a.numbers_of_discord_members = CountValue::new("900");
        a.discord_online_members = CountValue::new("12000");
        a.numbers_of_twitter_followers = CountValue::new("2,500");
        let mut b = Mint::default();
        b.numbers_of_discord_members = CountValue::new("10000");
        b.discord_online_members = CountValue::new("300");
        b.numbers_of_twitter_followers = CountValue::new("2400");

        assert_eq!(compare_discord_members(&a, &b), Ordering::Less);
        assert_eq!(compare_discord_online(&a, &b), Ordering::Greater);
        assert_eq!(compare_twitter_followers(&a, &b), Ordering::Greater);
    }

    #[test]
    fn missing_counts_sort_first() {
        let missing = Mint::default();
        let present = supply("5");
        assert_eq!(compare_supply(&missing, &present), Ordering::Less);
        assert_eq!(compare_supply(&missing, &missing), Ordering::Equal);
    }

    #[test]
    fn tweet_interactions_use_total() {
        let mut a = Mint::default();
        a.tweet_interaction = TweetInteraction {
            total: 12.5,
            likes: 1_000.0,
            ..TweetInteraction::default()
        };
        let mut b = Mint::default();
        b.tweet_interaction.total = 40.0;
        assert_eq!(compare_tweet_interactions(&a, &b), Ordering::Less);
    }

    #[test]
    fn time_compares_as_date_times() {
        let mut early = Mint::default();
        early.time = "09:15:00".to_string();
        let mut late = Mint::default();
        late.time = "21:00".to_string();
        let mut dated = Mint::default();
        dated.time = "2022-04-12 08:00:00".to_string();
        let unknown = Mint::default();

        assert_eq!(compare_time(&early, &late), Ordering::Less);
        assert_eq!(compare_time(&late, &dated), Ordering::Less);
        assert_eq!(compare_time(&unknown, &early), Ordering::Less);
    }

    #[test]
    fn name_sort_is_lexicographic_and_stable() {
        let mut mints = vec![named("b"), named("a"), named("c")];
        sort_mints(&mut mints, ScheduleColumn::Name, SortOrder::Asc);
        let names: Vec<&str> = mints.iter().map(|m| m.project.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        sort_mints(&mut mints, ScheduleColumn::Name, SortOrder::Desc);
        let names: Vec<&str> = mints.iter().map(|m| m.project.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn column_keys_round_trip_through_parse() {
        for column in SORTABLE_COLUMNS {
            assert_eq!(ScheduleColumn::parse(column.key()), Some(column));
        }
        assert_eq!(ScheduleColumn::parse("unknown"), None);
        assert_eq!(SortOrder::parse("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("sideways"), SortOrder::Asc);
    }

    #[test]
    fn name_filter_is_case_insensitive() {
        assert!(matches_name_filter("BIRD", &named("Moonbirds")));
        assert!(!matches_name_filter("ape", &named("Moonbirds")));
    }

    #[test]
    fn thousands_grouping_matches_table_display() {
        assert_eq!(group_thousands("1234567"), "1,234,567");
        assert_eq!(group_thousands("999"), "999");
        assert_eq!(group_thousands("-12345.678"), "-12,345.678");
        assert_eq!(group_thousands("2,500"), "2,500");
        assert_eq!(group_thousands("n/a"), "n/a");
    }
}
