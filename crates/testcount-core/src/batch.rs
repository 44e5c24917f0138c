//! Per-region batch orchestration.

use crate::calendar::RegionSelector;
use crate::error::{ImputationError, Result};
use crate::imputer::{ForecastResult, ImputationOptions, SeriesImputer};
use crate::model::{Growth, ModelOverrides};
use crate::series::{RegionalTestcounts, TestcountSeries};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Regions with this many or fewer non-missing observations are skipped.
const MIN_TRAINING_POINTS: usize = 10;

/// Fixed global training floor. Testing rollout before this date shows an
/// unrealistic upward ramp that would distort the fitted trend.
fn global_floor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, 15).unwrap_or(NaiveDate::MIN)
}

/// Caller overrides for the batch runner's per-region imputer defaults.
/// `None` fields keep the defaults (`keep_data = true`, national holidays
/// only, computed per-region floor; model growth linear).
#[derive(Debug, Clone, Default)]
pub struct BatchOverrides {
    pub keep_data: Option<bool>,
    pub regional_holidays: Option<bool>,
    pub ignore_before: Option<NaiveDate>,
    pub model: ModelOverrides,
}

/// Applies testcount imputation to every region of a dataset.
pub struct RegionalBatchRunner {
    imputer: SeriesImputer,
    min_training_points: usize,
    global_floor: NaiveDate,
}

impl Default for RegionalBatchRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionalBatchRunner {
    pub fn new() -> Self {
        Self::with_imputer(SeriesImputer::new())
    }

    pub fn with_imputer(imputer: SeriesImputer) -> Self {
        Self {
            imputer,
            min_training_points: MIN_TRAINING_POINTS,
            global_floor: global_floor(),
        }
    }

    /// Forecast testcount gaps in all regions.
    ///
    /// Regions with at most `MIN_TRAINING_POINTS` observations are
    /// skipped: their slot in the combined output stays all-missing and
    /// they get no entry in the result map. Any other per-region failure
    /// aborts the whole batch.
    ///
    /// Returns the combined predicted series per region plus the
    /// per-region diagnostic bundle.
    pub fn predict_testcounts_all_regions(
        &self,
        data: &RegionalTestcounts,
        country: &str,
        overrides: &BatchOverrides,
    ) -> Result<(RegionalTestcounts, BTreeMap<String, ForecastResult>)> {
        let mut combined = RegionalTestcounts::new();
        let mut results = BTreeMap::new();

        for (region, series) in data.iter() {
            let n_train = series.n_observed();
            if n_train <= self.min_training_points {
                warn!(
                    region = %region,
                    n_train,
                    "unable to forecast region from too few training points"
                );
                combined.insert(
                    region.clone(),
                    TestcountSeries::from_parts(
                        series.dates().to_vec(),
                        vec![None; series.len()],
                    )?,
                );
                continue;
            }
            info!(region = %region, n_train, "forecasting testcount gaps");

            let first_observed = series.first_observed_date().unwrap_or(self.global_floor);
            let floor = self.global_floor.max(first_observed);
            let selector = if region == "all" {
                RegionSelector::All
            } else {
                RegionSelector::one(region.clone())
            };

            let mut options = ImputationOptions::new(country, selector);
            options.keep_data = overrides.keep_data.unwrap_or(true);
            options.regional_holidays = overrides.regional_holidays.unwrap_or(false);
            options.ignore_before = Some(overrides.ignore_before.unwrap_or(floor));
            options.overrides = overrides.model.clone();
            if options.overrides.growth.is_none() {
                options.overrides.growth = Some(Growth::Linear);
            }

            let result = self.imputer.predict_testcounts(series, &options)?;
            if result.series.dates() != series.dates() {
                return Err(ImputationError::Consistency(format!(
                    "Imputed series index diverges from the input for region {}",
                    region
                )));
            }
            combined.insert(region.clone(), result.series.clone());
            results.insert(region.clone(), result);
        }

        Ok((combined, results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn daily_series(start: NaiveDate, values: Vec<Option<f64>>) -> TestcountSeries {
        let dates: Vec<NaiveDate> = (0..values.len())
            .map(|i| start.checked_add_days(Days::new(i as u64)).unwrap())
            .collect();
        TestcountSeries::from_parts(dates, values).unwrap()
    }

    /// 20 daily values with the given number observed, gaps in the middle.
    fn series_with_observed(start: NaiveDate, n_observed: usize) -> TestcountSeries {
        let values: Vec<Option<f64>> = (0..20)
            .map(|i| {
                if i < n_observed {
                    Some(2000.0 + 15.0 * i as f64)
                } else if i < 15 {
                    None
                } else {
                    Some(2000.0 + 15.0 * i as f64)
                }
            })
            .collect();
        daily_series(start, values)
    }

    #[test]
    fn test_sparse_regions_are_skipped() {
        let start = d(2021, 1, 4);
        let mut data = RegionalTestcounts::new();
        data.insert("NY", series_with_observed(start, 10)); // 15 observed
        data.insert("WY", series_with_observed(start, 0)); // 5 observed

        let runner = RegionalBatchRunner::new();
        let (combined, results) = runner
            .predict_testcounts_all_regions(&data, "US", &BatchOverrides::default())
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results.contains_key("NY"));

        let wy = combined.get("WY").unwrap();
        assert_eq!(wy.dates(), data.get("WY").unwrap().dates());
        assert!(wy.values().iter().all(|v| v.is_none()));

        let ny = combined.get("NY").unwrap();
        assert_eq!(ny.dates(), data.get("NY").unwrap().dates());
        assert!(ny.values().iter().all(|v| v.is_some()));
    }

    #[test]
    fn test_pseudo_region_all_is_forecast() {
        let start = d(2021, 2, 1);
        let mut data = RegionalTestcounts::new();
        data.insert("all", series_with_observed(start, 12)); // 17 observed

        let runner = RegionalBatchRunner::new();
        let (combined, results) = runner
            .predict_testcounts_all_regions(&data, "US", &BatchOverrides::default())
            .unwrap();
        assert!(results.contains_key("all"));
        assert!(combined
            .get("all")
            .unwrap()
            .values()
            .iter()
            .all(|v| v.is_some()));
    }

    #[test]
    fn test_sparse_gate_passing_region_is_forecast() {
        // 11 observations spread over 85 dates clears the training gate,
        // so the region must be forecast rather than abort the batch.
        let values: Vec<Option<f64>> = (0..85)
            .map(|i| (i % 8 == 0).then(|| 1500.0 + 12.0 * i as f64))
            .collect();
        let mut data = RegionalTestcounts::new();
        data.insert("NY", daily_series(d(2021, 1, 4), values));
        assert_eq!(data.get("NY").unwrap().n_observed(), 11);

        let runner = RegionalBatchRunner::new();
        let (combined, results) = runner
            .predict_testcounts_all_regions(&data, "US", &BatchOverrides::default())
            .unwrap();
        assert!(results.contains_key("NY"));
        assert!(combined
            .get("NY")
            .unwrap()
            .values()
            .iter()
            .all(|v| v.is_some()));
    }

    #[test]
    fn test_global_floor_shields_early_ramp() {
        // Data starts before 2020-03-15; the missing date before the
        // global floor must stay missing in the combined output.
        let start = d(2020, 3, 1);
        let values: Vec<Option<f64>> = (0..40)
            .map(|i| {
                if i == 5 || i == 25 {
                    None
                } else {
                    Some(100.0 + 3.0 * i as f64)
                }
            })
            .collect();
        let mut data = RegionalTestcounts::new();
        data.insert("NY", daily_series(start, values));

        let runner = RegionalBatchRunner::new();
        let (combined, _) = runner
            .predict_testcounts_all_regions(&data, "US", &BatchOverrides::default())
            .unwrap();

        let ny = combined.get("NY").unwrap();
        assert_eq!(ny.values()[5], None); // 2020-03-06, before the floor
        assert!(ny.values()[25].is_some()); // 2020-03-26, after the floor
    }

    #[test]
    fn test_caller_overrides_replace_defaults() {
        let start = d(2021, 1, 4);
        let mut data = RegionalTestcounts::new();
        data.insert("NY", series_with_observed(start, 12));

        let overrides = BatchOverrides {
            keep_data: Some(false),
            ..Default::default()
        };
        let runner = RegionalBatchRunner::new();
        let (combined, _) = runner
            .predict_testcounts_all_regions(&data, "US", &overrides)
            .unwrap();
        // keep_data = false smooths observed dates too.
        assert!(combined
            .get("NY")
            .unwrap()
            .values()
            .iter()
            .all(|v| v.is_some()));
    }

    #[test]
    fn test_region_failure_aborts_the_batch() {
        let start = d(2021, 1, 4);
        let mut data = RegionalTestcounts::new();
        data.insert("NY", series_with_observed(start, 12));

        let runner = RegionalBatchRunner::new();
        let result =
            runner.predict_testcounts_all_regions(&data, "Atlantis", &BatchOverrides::default());
        assert!(matches!(result, Err(ImputationError::UnknownCountry(_))));
    }
}
