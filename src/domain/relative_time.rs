//! Human distance between two instants ("3 minutes", "about 2 hours").
//!
//! Buckets match the phrasing shown next to posts and comments in the web
//! client.

use time::OffsetDateTime;

const MINUTES_IN_DAY: i64 = 1_440;
const MINUTES_IN_ALMOST_TWO_DAYS: i64 = 2_520;
const MINUTES_IN_MONTH: i64 = 43_200;
const MINUTES_IN_TWO_MONTHS: i64 = 86_400;

/// Distance from `then` to `now`, without a direction suffix.
pub fn distance_to_now(then: OffsetDateTime) -> String {
    distance_between(then, OffsetDateTime::now_utc())
}

/// Distance between two instants; argument order does not matter.
pub fn distance_between(a: OffsetDateTime, b: OffsetDateTime) -> String {
    let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
    let minutes = round_div((later - earlier).whole_seconds(), 60);

    if minutes < 2 {
        return if minutes == 0 {
            "less than a minute".to_string()
        } else {
            "1 minute".to_string()
        };
    }
    if minutes < 45 {
        return format!("{minutes} minutes");
    }
    if minutes < 90 {
        return "about 1 hour".to_string();
    }
    if minutes < MINUTES_IN_DAY {
        return plural("about ", round_div(minutes, 60), "hour");
    }
    if minutes < MINUTES_IN_ALMOST_TWO_DAYS {
        return "1 day".to_string();
    }
    if minutes < MINUTES_IN_MONTH {
        return plural("", round_div(minutes, MINUTES_IN_DAY), "day");
    }
    if minutes < MINUTES_IN_TWO_MONTHS {
        return plural("about ", round_div(minutes, MINUTES_IN_MONTH), "month");
    }

    let months = calendar_months_between(earlier, later);
    if months < 12 {
        return plural("", round_div(minutes, MINUTES_IN_MONTH), "month");
    }

    let years = months / 12;
    match months % 12 {
        0..3 => plural("about ", years, "year"),
        3..9 => plural("over ", years, "year"),
        _ => plural("almost ", years + 1, "year"),
    }
}

fn plural(qualifier: &str, count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{qualifier}1 {unit}")
    } else {
        format!("{qualifier}{count} {unit}s")
    }
}

/// Integer division rounding half away from zero, for non-negative input.
fn round_div(value: i64, divisor: i64) -> i64 {
    (value + divisor / 2) / divisor
}

/// Whole calendar months from `earlier` to `later`.
fn calendar_months_between(earlier: OffsetDateTime, later: OffsetDateTime) -> i64 {
    let later = later.to_offset(earlier.offset());
    let mut months = i64::from(later.year() - earlier.year()) * 12
        + i64::from(u8::from(later.month()))
        - i64::from(u8::from(earlier.month()));
    let later_in_month = (later.day(), later.time());
    let earlier_in_month = (earlier.day(), earlier.time());
    if months > 0 && later_in_month < earlier_in_month {
        months -= 1;
    }
    months.max(0)
}

/// Distance with an "ago" suffix, as shown under comments.
pub fn distance_ago(then: OffsetDateTime, now: OffsetDateTime) -> String {
    format!("{} ago", distance_between(then, now))
}
