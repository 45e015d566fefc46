//! Schedule compilation.
//!
//! Users describe a schedule in one of three ways:
//!
//! - an hour interval: `6` means every six hours,
//! - a time of day with optional weekdays: `2:30pm` on `mon,thu`,
//! - a raw cron expression, passed through after a shape check.
//!
//! Everything compiles to a [`Schedule`], which is what the registry stores and
//! what [`scheduler`] renders into crontab lines. Compilation either succeeds
//! completely or fails with [`Error::Schedule`]; nothing is partially applied.

pub mod scheduler;

use crate::error::{Error, Result};
use chrono::Weekday;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A validated recurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Schedule {
    /// Every N hours, 1..=23.
    Interval(u8),
    /// A 5-field cron expression or an `@` literal such as `@daily`.
    Expression(String),
}

/// Raw user input for [`compile`]. Exactly one form must be used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleRequest {
    pub every: Option<String>,
    pub at: Option<String>,
    pub days: Option<String>,
    pub cron: Option<String>,
}

const CRON_LITERALS: &[&str] = &[
    "@hourly",
    "@daily",
    "@midnight",
    "@weekly",
    "@monthly",
    "@yearly",
    "@annually",
];

impl Schedule {
    /// The recurrence field of a crontab line.
    pub fn cron_expression(&self) -> String {
        match self {
            Schedule::Interval(hours) => format!("0 */{} * * *", hours),
            Schedule::Expression(expr) => expr.clone(),
        }
    }

    /// Human-readable form for listings.
    pub fn describe(&self) -> String {
        match self {
            Schedule::Interval(1) => "every hour".to_string(),
            Schedule::Interval(hours) => format!("every {} hours", hours),
            Schedule::Expression(expr) => describe_expression(expr).unwrap_or_else(|| expr.clone()),
        }
    }
}

impl fmt::Display for Schedule {
    /// The stored form: a bare number for intervals, the expression otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Interval(hours) => write!(f, "{}", hours),
            Schedule::Expression(expr) => f.write_str(expr),
        }
    }
}

impl FromStr for Schedule {
    type Err = Error;

    /// Parse the stored form.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
            return compile_interval(s);
        }
        compile_expression(s)
    }
}

/// Compile user input into a schedule.
pub fn compile(request: &ScheduleRequest) -> Result<Schedule> {
    let forms = [
        request.every.is_some(),
        request.at.is_some(),
        request.cron.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();

    if forms > 1 {
        return Err(Error::Schedule(
            "use only one of an interval, a time of day, or a cron expression".to_string(),
        ));
    }
    if request.days.is_some() && request.at.is_none() {
        return Err(Error::Schedule(
            "days can only be combined with a time of day".to_string(),
        ));
    }

    if let Some(every) = &request.every {
        return compile_interval(every);
    }
    if let Some(at) = &request.at {
        return compile_at(at, request.days.as_deref());
    }
    if let Some(cron) = &request.cron {
        return compile_expression(cron);
    }
    Err(Error::Schedule("no schedule given".to_string()))
}

/// `"12"` → every 12 hours.
pub fn compile_interval(input: &str) -> Result<Schedule> {
    let hours: u32 = input.trim().parse().map_err(|_| {
        Error::Schedule(format!(
            "interval '{}' is not a whole number of hours",
            input.trim()
        ))
    })?;
    if !(1..=23).contains(&hours) {
        return Err(Error::Schedule(format!(
            "interval must be between 1 and 23 hours, got {}",
            hours
        )));
    }
    Ok(Schedule::Interval(hours as u8))
}

/// A time of day, optionally limited to the given weekdays.
pub fn compile_at(time: &str, days: Option<&str>) -> Result<Schedule> {
    let normalized = parse_time(time)?;
    let (hour, minute) = normalized
        .split_once(':')
        .ok_or_else(|| Error::Schedule(format!("invalid time '{}'", time)))?;
    let hour: u32 = hour.parse().map_err(|_| Error::Schedule(format!("invalid time '{}'", time)))?;
    let minute: u32 = minute
        .parse()
        .map_err(|_| Error::Schedule(format!("invalid time '{}'", time)))?;

    let day_field = match days.map(str::trim).filter(|d| !d.is_empty()) {
        Some(days) => parse_days(days)?
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(","),
        None => "*".to_string(),
    };

    Ok(Schedule::Expression(format!(
        "{} {} * * {}",
        minute, hour, day_field
    )))
}

fn time_24h() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})[:.](\d{2})$").expect("valid regex"))
}

fn time_12h() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?i)(\d{1,2})(?:[:.](\d{2}))?\s*([ap])\.?m\.?$").expect("valid regex")
    })
}

/// Normalize a time of day to zero-padded 24-hour `HH:MM`.
///
/// Accepts `HH:MM` / `HH.MM` (hour 0-23) and 12-hour forms with an AM/PM
/// suffix such as `2:30pm`, `2.30 PM` or `7am` (hour 1-12).
pub fn parse_time(input: &str) -> Result<String> {
    let s = input.trim();
    let invalid = |reason: &str| Error::Schedule(format!("invalid time '{}': {}", s, reason));

    if let Some(caps) = time_12h().captures(s) {
        let hour: u32 = caps[1].parse().map_err(|_| invalid("bad hour"))?;
        let minute: u32 = match caps.get(2) {
            Some(m) => m.as_str().parse().map_err(|_| invalid("bad minute"))?,
            None => 0,
        };
        if !(1..=12).contains(&hour) {
            return Err(invalid("12-hour times need an hour from 1 to 12"));
        }
        if minute > 59 {
            return Err(invalid("minute must be 0-59"));
        }
        let pm = caps[3].eq_ignore_ascii_case("p");
        let hour = match (hour, pm) {
            (12, false) => 0,
            (12, true) => 12,
            (h, true) => h + 12,
            (h, false) => h,
        };
        return Ok(format!("{:02}:{:02}", hour, minute));
    }

    if let Some(caps) = time_24h().captures(s) {
        let hour: u32 = caps[1].parse().map_err(|_| invalid("bad hour"))?;
        let minute: u32 = caps[2].parse().map_err(|_| invalid("bad minute"))?;
        if hour > 23 {
            return Err(invalid("hour must be 0-23"));
        }
        if minute > 59 {
            return Err(invalid("minute must be 0-59"));
        }
        return Ok(format!("{:02}:{:02}", hour, minute));
    }

    Err(invalid("expected HH:MM, HH.MM or a 12-hour time with AM/PM"))
}

fn parse_day(token: &str) -> Option<Weekday> {
    let day = match token.to_ascii_lowercase().as_str() {
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tues" | "tuesday" => Weekday::Tue,
        "wed" | "weds" | "wednesday" => Weekday::Wed,
        "thu" | "thur" | "thurs" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        "sun" | "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Parse a comma or space separated weekday list.
///
/// One unknown token rejects the whole list. Duplicates collapse and the result
/// is ordered Monday first.
pub fn parse_days(input: &str) -> Result<Vec<Weekday>> {
    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(Error::Schedule("day list is empty".to_string()));
    }

    let mut days = Vec::with_capacity(tokens.len());
    for token in tokens {
        let day = parse_day(token)
            .ok_or_else(|| Error::Schedule(format!("unknown day '{}'", token)))?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    days.sort_by_key(|d| d.num_days_from_monday());
    Ok(days)
}

fn cron_field() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-Za-z*/,\-?LW#]+$").expect("valid regex"))
}

/// Check the shape of a raw expression. Field values are left to cron.
pub fn compile_expression(input: &str) -> Result<Schedule> {
    let expr = input.trim();
    if expr.is_empty() {
        return Err(Error::Schedule("empty cron expression".to_string()));
    }
    if expr.starts_with('@') {
        let lower = expr.to_ascii_lowercase();
        if CRON_LITERALS.contains(&lower.as_str()) {
            return Ok(Schedule::Expression(lower));
        }
        return Err(Error::Schedule(format!(
            "unknown cron literal '{}' (expected one of {})",
            expr,
            CRON_LITERALS.join(", ")
        )));
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(Error::Schedule(format!(
            "cron expression '{}' must have 5 fields, found {}",
            expr,
            fields.len()
        )));
    }
    if let Some(bad) = fields.iter().find(|f| !cron_field().is_match(f)) {
        return Err(Error::Schedule(format!(
            "cron field '{}' in '{}' has unexpected characters",
            bad, expr
        )));
    }
    Ok(Schedule::Expression(fields.join(" ")))
}

/// Recognize the shapes `compile_at` produces.
fn describe_expression(expr: &str) -> Option<String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let [minute, hour, "*", "*", days] = fields.as_slice() else {
        return None;
    };
    let minute: u32 = minute.parse().ok()?;
    let hour: u32 = hour.parse().ok()?;
    let time = format!("{:02}:{:02}", hour, minute);
    if *days == "*" {
        return Some(format!("daily at {}", time));
    }
    let days = parse_days(days).ok()?;
    let days: Vec<String> = days.iter().map(|d| d.to_string()).collect();
    Some(format!("at {} on {}", time, days.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_compiles_to_hourly_step() {
        let schedule = compile_interval("12").unwrap();
        assert_eq!(schedule, Schedule::Interval(12));
        assert_eq!(schedule.cron_expression(), "0 */12 * * *");
        assert_eq!(schedule.describe(), "every 12 hours");
    }

    #[test]
    fn interval_bounds() {
        assert!(compile_interval("0").is_err());
        assert!(compile_interval("24").is_err());
        assert!(compile_interval("-3").is_err());
        assert!(compile_interval("1").is_ok());
        assert!(compile_interval("23").is_ok());
    }

    #[test]
    fn parses_twelve_hour_times() {
        assert_eq!(parse_time("2:30pm").unwrap(), "14:30");
        assert_eq!(parse_time("2:30 PM").unwrap(), "14:30");
        assert_eq!(parse_time("12:05am").unwrap(), "00:05");
        assert_eq!(parse_time("12pm").unwrap(), "12:00");
        assert_eq!(parse_time("7a.m.").unwrap(), "07:00");
        assert!(parse_time("13:00pm").is_err());
        assert!(parse_time("0:30am").is_err());
    }

    #[test]
    fn parses_twenty_four_hour_times() {
        assert_eq!(parse_time("4:05").unwrap(), "04:05");
        assert_eq!(parse_time("23.59").unwrap(), "23:59");
        assert_eq!(parse_time("00:00").unwrap(), "00:00");
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("12:60").is_err());
        assert!(parse_time("noon").is_err());
    }

    #[test]
    fn day_list_is_all_or_nothing() {
        let err = parse_days("Mon,Tues,Funday").unwrap_err();
        assert!(err.to_string().contains("Funday"));

        let days = parse_days("friday, MON tues mon").unwrap();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Tue, Weekday::Fri]);
    }

    #[test]
    fn time_with_and_without_days() {
        let daily = compile_at("2:30pm", None).unwrap();
        assert_eq!(daily, Schedule::Expression("30 14 * * *".to_string()));
        assert_eq!(daily.describe(), "daily at 14:30");

        let weekly = compile_at("04:00", Some("thu,mon")).unwrap();
        assert_eq!(weekly, Schedule::Expression("0 4 * * Mon,Thu".to_string()));
        assert_eq!(weekly.describe(), "at 04:00 on Mon, Thu");

        assert!(compile_at("04:00", Some("mon,someday")).is_err());
    }

    #[test]
    fn raw_expressions_are_shape_checked() {
        assert_eq!(
            compile_expression("  */15  *  * * 1-5 ").unwrap(),
            Schedule::Expression("*/15 * * * 1-5".to_string())
        );
        assert_eq!(
            compile_expression("@Daily").unwrap(),
            Schedule::Expression("@daily".to_string())
        );
        assert!(compile_expression("@sometimes").is_err());
        assert!(compile_expression("* * * *").is_err());
        assert!(compile_expression("* * * * ; rm").is_err());
        assert!(compile_expression("* * * * |").is_err());
    }

    #[test]
    fn compile_requires_exactly_one_form() {
        let both = ScheduleRequest {
            every: Some("6".to_string()),
            cron: Some("0 * * * *".to_string()),
            ..Default::default()
        };
        assert!(compile(&both).is_err());

        let days_only = ScheduleRequest {
            days: Some("mon".to_string()),
            ..Default::default()
        };
        assert!(compile(&days_only).is_err());
        assert!(compile(&ScheduleRequest::default()).is_err());

        let at = ScheduleRequest {
            at: Some("2:30pm".to_string()),
            days: Some("Mon,Tues".to_string()),
            ..Default::default()
        };
        assert_eq!(
            compile(&at).unwrap(),
            Schedule::Expression("30 14 * * Mon,Tue".to_string())
        );
    }

    #[test]
    fn stored_form_round_trips() {
        for stored in ["6", "30 14 * * Mon,Tue", "@weekly"] {
            let schedule: Schedule = stored.parse().unwrap();
            assert_eq!(schedule.to_string(), stored);
        }
        assert!("".parse::<Schedule>().is_err());
        assert!("99".parse::<Schedule>().is_err());
    }
}
