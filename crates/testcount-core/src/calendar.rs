//! Holiday calendar construction for model regressors.

use crate::error::{ImputationError, Result};
use crate::holiday_data::{BuiltinCountryResolver, BuiltinHolidaySource};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Mapping from calendar date to holiday name. A date carries exactly one
/// name; merging is last-write-wins.
pub type HolidayCalendar = BTreeMap<NaiveDate, String>;

/// Which subdivisions of a country to include when fetching holidays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSelector {
    /// National holidays only.
    Nationwide,
    /// National holidays plus every known subdivision.
    All,
    /// National holidays plus the listed subdivisions.
    Regions(Vec<String>),
}

impl RegionSelector {
    /// Selector for a single subdivision.
    pub fn one(code: impl Into<String>) -> Self {
        RegionSelector::Regions(vec![code.into()])
    }

    pub fn is_all(&self) -> bool {
        matches!(self, RegionSelector::All)
    }

    /// Number of explicitly listed subdivisions (0 for `Nationwide`,
    /// 0 for `All` whose expansion is country-dependent).
    pub fn listed_count(&self) -> usize {
        match self {
            RegionSelector::Regions(codes) => codes.len(),
            _ => 0,
        }
    }
}

/// First-level administrative subdivision scheme. Countries expose at most
/// one of the two, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubdivisionKind {
    State,
    Province,
}

/// Per-country subdivision metadata, obtained once from the holiday data
/// source instead of probed ad hoc.
#[derive(Debug, Clone, Default)]
pub struct CountryMeta {
    pub has_states: bool,
    pub has_provinces: bool,
    pub state_codes: BTreeSet<String>,
    pub province_codes: BTreeSet<String>,
}

/// Capability mapping a country name or short code to a canonical
/// ISO-3166 alpha-3 code.
pub trait CountryResolver: Send + Sync {
    fn resolve(&self, name_or_code: &str) -> Option<String>;
}

/// Opaque holiday data source, queried by canonical country code.
pub trait HolidaySource: Send + Sync {
    /// Subdivision metadata for a country, `None` if the country has no
    /// holiday data.
    fn country_meta(&self, alpha3: &str) -> Option<CountryMeta>;

    /// Holidays for the given years: the national set, or the national set
    /// merged with one subdivision's additions.
    fn holidays(
        &self,
        alpha3: &str,
        subdivision: Option<(SubdivisionKind, &str)>,
        years: &BTreeSet<i32>,
    ) -> HolidayCalendar;
}

/// Resolves a country, a region selector and a set of years into a concrete
/// date-to-name holiday calendar.
pub struct HolidayCalendarBuilder {
    resolver: Box<dyn CountryResolver>,
    source: Box<dyn HolidaySource>,
}

impl Default for HolidayCalendarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HolidayCalendarBuilder {
    /// Builder backed by the built-in country resolver and holiday data.
    pub fn new() -> Self {
        Self {
            resolver: Box::new(BuiltinCountryResolver::new()),
            source: Box::new(BuiltinHolidaySource::new()),
        }
    }

    /// Builder over caller-supplied capabilities.
    pub fn with_capabilities(
        resolver: Box<dyn CountryResolver>,
        source: Box<dyn HolidaySource>,
    ) -> Self {
        Self { resolver, source }
    }

    /// Retrieve the holidays of a country (and optionally some of its
    /// subdivisions) for a set of years.
    ///
    /// Starts from the national set and merges in each requested
    /// subdivision's holidays, last write wins. `All` expands to every
    /// subdivision of the scheme the country uses, states preferred.
    pub fn get_holidays(
        &self,
        country: &str,
        region: &RegionSelector,
        years: &BTreeSet<i32>,
    ) -> Result<HolidayCalendar> {
        let alpha3 = self
            .resolver
            .resolve(country)
            .ok_or_else(|| ImputationError::UnknownCountry(country.to_string()))?;
        let meta = self
            .source
            .country_meta(&alpha3)
            .ok_or_else(|| ImputationError::UnknownCountry(alpha3.clone()))?;

        let subdivisions: Vec<String> = match region {
            RegionSelector::Nationwide => Vec::new(),
            RegionSelector::All => {
                if meta.has_states {
                    meta.state_codes.iter().cloned().collect()
                } else {
                    meta.province_codes.iter().cloned().collect()
                }
            }
            RegionSelector::Regions(codes) => codes.clone(),
        };

        let mut result = self.source.holidays(&alpha3, None, years);
        for code in &subdivisions {
            // Province membership is checked first, mirroring the data
            // source's precedence for countries exposing both schemes.
            let kind = if meta.province_codes.contains(code) {
                SubdivisionKind::Province
            } else if meta.has_states && meta.state_codes.contains(code) {
                SubdivisionKind::State
            } else {
                return Err(ImputationError::UnknownRegion {
                    country: alpha3,
                    region: code.clone(),
                });
            };
            let merged = self.source.holidays(&alpha3, Some((kind, code)), years);
            result.extend(merged);
        }
        Ok(result)
    }
}
