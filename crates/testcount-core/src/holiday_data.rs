//! Built-in country resolver and holiday data source.
//!
//! Covers the countries the downstream pipeline ingests testcount data for:
//! USA (state scheme), Germany and Canada (province scheme). Movable feasts
//! are computed, not tabulated, so any year can be materialized.

use crate::calendar::{CountryMeta, CountryResolver, HolidayCalendar, HolidaySource, SubdivisionKind};
use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::collections::BTreeSet;

/// (alpha-2, alpha-3, English name) for countries the resolver knows.
/// Only USA, DEU and CAN carry holiday data; the rest resolve but fail
/// later with `UnknownCountry` at the source.
const COUNTRY_TABLE: &[(&str, &str, &str)] = &[
    ("US", "USA", "United States"),
    ("DE", "DEU", "Germany"),
    ("CA", "CAN", "Canada"),
    ("GB", "GBR", "United Kingdom"),
    ("FR", "FRA", "France"),
    ("IT", "ITA", "Italy"),
    ("ES", "ESP", "Spain"),
    ("AT", "AUT", "Austria"),
    ("CH", "CHE", "Switzerland"),
    ("MX", "MEX", "Mexico"),
];

/// Table-backed country-code resolver (name, alpha-2 or alpha-3 to alpha-3).
#[derive(Debug, Default)]
pub struct BuiltinCountryResolver;

impl BuiltinCountryResolver {
    pub fn new() -> Self {
        Self
    }
}

impl CountryResolver for BuiltinCountryResolver {
    fn resolve(&self, name_or_code: &str) -> Option<String> {
        let query = name_or_code.trim();
        let upper = query.to_uppercase();
        COUNTRY_TABLE
            .iter()
            .find(|(a2, a3, name)| *a2 == upper || *a3 == upper || name.eq_ignore_ascii_case(query))
            .map(|(_, a3, _)| (*a3).to_string())
    }
}

const US_STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY",
];

const DE_PROVINCES: &[&str] = &[
    "BW", "BY", "BE", "BB", "HB", "HH", "HE", "MV", "NI", "NW", "RP", "SL", "SN", "ST", "SH",
    "TH",
];

const CA_PROVINCES: &[&str] = &[
    "AB", "BC", "MB", "NB", "NL", "NS", "NT", "NU", "ON", "PE", "QC", "SK", "YT",
];

/// Computed holiday data for the built-in countries.
#[derive(Debug, Default)]
pub struct BuiltinHolidaySource;

impl BuiltinHolidaySource {
    pub fn new() -> Self {
        Self
    }
}

impl HolidaySource for BuiltinHolidaySource {
    fn country_meta(&self, alpha3: &str) -> Option<CountryMeta> {
        let codes = |list: &[&str]| -> BTreeSet<String> {
            list.iter().map(|c| (*c).to_string()).collect()
        };
        match alpha3 {
            "USA" => Some(CountryMeta {
                has_states: true,
                has_provinces: false,
                state_codes: codes(US_STATES),
                province_codes: BTreeSet::new(),
            }),
            "DEU" => Some(CountryMeta {
                has_states: false,
                has_provinces: true,
                state_codes: BTreeSet::new(),
                province_codes: codes(DE_PROVINCES),
            }),
            "CAN" => Some(CountryMeta {
                has_states: false,
                has_provinces: true,
                state_codes: BTreeSet::new(),
                province_codes: codes(CA_PROVINCES),
            }),
            _ => None,
        }
    }

    fn holidays(
        &self,
        alpha3: &str,
        subdivision: Option<(SubdivisionKind, &str)>,
        years: &BTreeSet<i32>,
    ) -> HolidayCalendar {
        let mut cal = HolidayCalendar::new();
        let code = subdivision.map(|(_, c)| c);
        for &year in years {
            match alpha3 {
                "USA" => us_holidays(&mut cal, year, code),
                "DEU" => de_holidays(&mut cal, year, code),
                "CAN" => ca_holidays(&mut cal, year, code),
                _ => {}
            }
        }
        cal
    }
}

fn add(cal: &mut HolidayCalendar, date: Option<NaiveDate>, name: &str) {
    if let Some(d) = date {
        cal.insert(d, name.to_string());
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// n-th occurrence of a weekday within a month (n starting at 1).
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
    let first = ymd(year, month, 1)?;
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    let date = first.checked_add_days(Days::new(u64::from(offset + 7 * (n - 1))))?;
    (date.month() == month).then_some(date)
}

/// Last occurrence of a weekday within a month.
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let last = if month == 12 {
        ymd(year + 1, 1, 1)?.pred_opt()?
    } else {
        ymd(year, month + 1, 1)?.pred_opt()?
    };
    let offset = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    last.checked_sub_days(Days::new(u64::from(offset)))
}

/// Last occurrence of a weekday strictly before the given date.
fn weekday_before(date: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let mut offset =
        (7 + date.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    if offset == 0 {
        offset = 7;
    }
    date.checked_sub_days(Days::new(u64::from(offset)))
}

/// Easter Sunday by the anonymous Gregorian computus.
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    ymd(year, month as u32, day as u32)
}

fn easter_offset(year: i32, days: i64) -> Option<NaiveDate> {
    let easter = easter_sunday(year)?;
    if days >= 0 {
        easter.checked_add_days(Days::new(days as u64))
    } else {
        easter.checked_sub_days(Days::new((-days) as u64))
    }
}

fn us_holidays(cal: &mut HolidayCalendar, year: i32, state: Option<&str>) {
    add(cal, ymd(year, 1, 1), "New Year's Day");
    add(
        cal,
        nth_weekday(year, 1, Weekday::Mon, 3),
        "Martin Luther King Jr. Day",
    );
    add(
        cal,
        nth_weekday(year, 2, Weekday::Mon, 3),
        "Washington's Birthday",
    );
    add(cal, last_weekday(year, 5, Weekday::Mon), "Memorial Day");
    if year >= 2021 {
        add(
            cal,
            ymd(year, 6, 19),
            "Juneteenth National Independence Day",
        );
    }
    add(cal, ymd(year, 7, 4), "Independence Day");
    add(cal, nth_weekday(year, 9, Weekday::Mon, 1), "Labor Day");
    add(cal, nth_weekday(year, 10, Weekday::Mon, 2), "Columbus Day");
    add(cal, ymd(year, 11, 11), "Veterans Day");
    add(cal, nth_weekday(year, 11, Weekday::Thu, 4), "Thanksgiving");
    add(cal, ymd(year, 12, 25), "Christmas Day");

    match state {
        Some("CA") => add(cal, ymd(year, 3, 31), "Cesar Chavez Day"),
        Some("TX") => add(cal, ymd(year, 3, 2), "Texas Independence Day"),
        Some("MA") => add(cal, nth_weekday(year, 4, Weekday::Mon, 3), "Patriots' Day"),
        _ => {}
    }
}

fn de_holidays(cal: &mut HolidayCalendar, year: i32, province: Option<&str>) {
    add(cal, ymd(year, 1, 1), "Neujahr");
    add(cal, easter_offset(year, -2), "Karfreitag");
    add(cal, easter_offset(year, 1), "Ostermontag");
    add(cal, ymd(year, 5, 1), "Erster Mai");
    add(cal, easter_offset(year, 39), "Christi Himmelfahrt");
    add(cal, easter_offset(year, 50), "Pfingstmontag");
    add(cal, ymd(year, 10, 3), "Tag der Deutschen Einheit");
    add(cal, ymd(year, 12, 25), "Erster Weihnachtstag");
    add(cal, ymd(year, 12, 26), "Zweiter Weihnachtstag");

    match province {
        Some("BW") => {
            add(cal, ymd(year, 1, 6), "Heilige Drei Koenige");
            add(cal, easter_offset(year, 60), "Fronleichnam");
            add(cal, ymd(year, 11, 1), "Allerheiligen");
        }
        Some("BY") => {
            add(cal, ymd(year, 1, 6), "Heilige Drei Koenige");
            add(cal, easter_offset(year, 60), "Fronleichnam");
            add(cal, ymd(year, 8, 15), "Mariae Himmelfahrt");
            add(cal, ymd(year, 11, 1), "Allerheiligen");
        }
        Some("NW") => {
            add(cal, easter_offset(year, 60), "Fronleichnam");
            add(cal, ymd(year, 11, 1), "Allerheiligen");
        }
        Some("SN") => {
            add(cal, ymd(year, 10, 31), "Reformationstag");
            add(
                cal,
                ymd(year, 11, 23).and_then(|d| weekday_before(d, Weekday::Wed)),
                "Buss- und Bettag",
            );
        }
        _ => {}
    }
}

fn ca_holidays(cal: &mut HolidayCalendar, year: i32, province: Option<&str>) {
    add(cal, ymd(year, 1, 1), "New Year's Day");
    add(cal, easter_offset(year, -2), "Good Friday");
    add(
        cal,
        ymd(year, 5, 25).and_then(|d| weekday_before(d, Weekday::Mon)),
        "Victoria Day",
    );
    add(cal, ymd(year, 7, 1), "Canada Day");
    add(cal, nth_weekday(year, 9, Weekday::Mon, 1), "Labour Day");
    add(cal, nth_weekday(year, 10, Weekday::Mon, 2), "Thanksgiving");
    add(cal, ymd(year, 12, 25), "Christmas Day");
    add(cal, ymd(year, 12, 26), "Boxing Day");

    match province {
        Some("ON") => {
            add(cal, nth_weekday(year, 2, Weekday::Mon, 3), "Family Day");
            add(cal, nth_weekday(year, 8, Weekday::Mon, 1), "Civic Holiday");
        }
        Some("BC") => {
            add(cal, nth_weekday(year, 2, Weekday::Mon, 3), "Family Day");
            add(
                cal,
                nth_weekday(year, 8, Weekday::Mon, 1),
                "British Columbia Day",
            );
        }
        Some("QC") => {
            add(cal, ymd(year, 6, 24), "Saint-Jean-Baptiste Day");
        }
        _ => {}
    }
}
