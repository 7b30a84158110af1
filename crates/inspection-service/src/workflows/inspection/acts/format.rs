//! Site-local date and name formatting used on acts and file names.

use chrono::{DateTime, Datelike, FixedOffset, Utc};

const SITE_OFFSET_SECS: i32 = 3 * 3600;

/// Moscow time. The region has not observed DST since 2014.
pub fn site_offset() -> FixedOffset {
    FixedOffset::east_opt(SITE_OFFSET_SECS).expect("UTC+3 is within offset range")
}

pub fn to_site(instant: DateTime<Utc>) -> DateTime<FixedOffset> {
    instant.with_timezone(&site_offset())
}

/// Genitive month name, as used in "10 января 2025".
pub fn russian_month(month: u32) -> &'static str {
    match month {
        1 => "января",
        2 => "февраля",
        3 => "марта",
        4 => "апреля",
        5 => "мая",
        6 => "июня",
        7 => "июля",
        8 => "августа",
        9 => "сентября",
        10 => "октября",
        11 => "ноября",
        12 => "декабря",
        _ => "",
    }
}

pub fn full_name(surname: &str, name: &str, patronymic: &str) -> String {
    let mut result = format!("{surname} {name}");
    if !patronymic.is_empty() {
        result.push(' ');
        result.push_str(patronymic);
    }
    result
}

/// "Surname N.P." with the patronymic initial omitted when there is none.
pub fn short_name(surname: &str, name: &str, patronymic: &str) -> String {
    let mut result = surname.to_string();
    if let Some(initial) = name.chars().next() {
        result.push(' ');
        result.push(initial);
        result.push('.');
    }
    if let Some(initial) = patronymic.chars().next() {
        result.push(initial);
        result.push('.');
    }
    result
}

pub fn seal_phrase(seal_id: i64, is_broken: bool) -> String {
    let state = if is_broken { "сорвана" } else { "на месте" };
    format!("№{seal_id} - {state}")
}

/// `DD.MM.YYYY HH.MM.SS` in site time.
pub fn file_timestamp(instant: DateTime<Utc>) -> String {
    to_site(instant).format("%d.%m.%Y %H.%M.%S").to_string()
}

/// `DD.MM.YYYY` in site time.
pub fn file_date(instant: DateTime<Utc>) -> String {
    to_site(instant).format("%d.%m.%Y").to_string()
}

/// Two-digit day, hour and minute plus the spelled month and year of a site-local instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDate {
    pub day: String,
    pub month: &'static str,
    pub month_number: String,
    pub year: i64,
    pub hour: String,
    pub minute: String,
}

impl SiteDate {
    pub fn of(instant: DateTime<Utc>) -> Self {
        let local = to_site(instant);
        Self {
            day: local.format("%d").to_string(),
            month: russian_month(local.month()),
            month_number: local.format("%m").to_string(),
            year: i64::from(local.year()),
            hour: local.format("%H").to_string(),
            minute: local.format("%M").to_string(),
        }
    }
}
