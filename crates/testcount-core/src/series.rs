//! Date-indexed testcount series types.

use crate::error::{ImputationError, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// An ordered mapping from calendar date to an observed testcount.
///
/// Dates are strictly increasing. Unordered input is sorted on entry as a
/// repair step; a duplicated date keeps the last value seen.
#[derive(Debug, Clone, PartialEq)]
pub struct TestcountSeries {
    dates: Vec<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl TestcountSeries {
    /// Build a series from (date, value) pairs. `None` marks a missing
    /// observation.
    pub fn new<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        // BTreeMap gives the sort and the last-write-wins dedup in one pass.
        let map: BTreeMap<NaiveDate, Option<f64>> = pairs.into_iter().collect();
        let mut dates = Vec::with_capacity(map.len());
        let mut values = Vec::with_capacity(map.len());
        for (d, v) in map {
            dates.push(d);
            values.push(v);
        }
        Self { dates, values }
    }

    /// Build a series from parallel date and value arrays.
    pub fn from_parts(dates: Vec<NaiveDate>, values: Vec<Option<f64>>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ImputationError::InvalidInput(format!(
                "Dates and values must have the same length ({} vs {})",
                dates.len(),
                values.len()
            )));
        }
        Ok(Self::new(dates.into_iter().zip(values)))
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Number of non-missing observations.
    pub fn n_observed(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Date of the first non-missing observation.
    pub fn first_observed_date(&self) -> Option<NaiveDate> {
        self.iter().find(|(_, v)| v.is_some()).map(|(d, _)| d)
    }

    /// Largest non-missing value, if any.
    pub fn max_observed(&self) -> Option<f64> {
        self.values
            .iter()
            .filter_map(|v| *v)
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
    }
}

/// A region-partitioned collection of testcount series.
///
/// May contain a pseudo-region `"all"` holding the nation-wide sum.
#[derive(Debug, Clone, Default)]
pub struct RegionalTestcounts {
    regions: BTreeMap<String, TestcountSeries>,
}

impl RegionalTestcounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, region: impl Into<String>, series: TestcountSeries) {
        self.regions.insert(region.into(), series);
    }

    pub fn get(&self, region: &str) -> Option<&TestcountSeries> {
        self.regions.get(region)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TestcountSeries)> {
        self.regions.iter()
    }

    pub fn region_names(&self) -> impl Iterator<Item = &String> {
        self.regions.keys()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_unsorted_input_is_repaired() {
        let series = TestcountSeries::new(vec![
            (d(2021, 1, 3), Some(3.0)),
            (d(2021, 1, 1), Some(1.0)),
            (d(2021, 1, 2), None),
        ]);
        assert_eq!(
            series.dates(),
            &[d(2021, 1, 1), d(2021, 1, 2), d(2021, 1, 3)]
        );
        assert_eq!(series.values(), &[Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_duplicate_date_keeps_last_value() {
        let series = TestcountSeries::new(vec![
            (d(2021, 1, 1), Some(1.0)),
            (d(2021, 1, 2), Some(2.0)),
            (d(2021, 1, 1), Some(9.0)),
        ]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.values()[0], Some(9.0));
    }

    #[test]
    fn test_from_parts_length_mismatch() {
        let result = TestcountSeries::from_parts(vec![d(2021, 1, 1)], vec![Some(1.0), None]);
        assert!(matches!(result, Err(ImputationError::InvalidInput(_))));
    }

    #[test]
    fn test_observed_helpers() {
        let series = TestcountSeries::new(vec![
            (d(2021, 1, 1), None),
            (d(2021, 1, 2), Some(5.0)),
            (d(2021, 1, 3), Some(2.0)),
            (d(2021, 1, 4), None),
        ]);
        assert_eq!(series.n_observed(), 2);
        assert_eq!(series.first_observed_date(), Some(d(2021, 1, 2)));
        assert_eq!(series.max_observed(), Some(5.0));
        assert_eq!(series.first_date(), Some(d(2021, 1, 1)));
        assert_eq!(series.last_date(), Some(d(2021, 1, 4)));
    }

    #[test]
    fn test_empty_series() {
        let series = TestcountSeries::new(vec![]);
        assert!(series.is_empty());
        assert_eq!(series.max_observed(), None);
        assert_eq!(series.first_observed_date(), None);
    }
}
