//! Single-series testcount imputation.

use crate::calendar::{HolidayCalendar, HolidayCalendarBuilder, RegionSelector};
use crate::engine::SeasonalRegressionEngine;
use crate::error::{ImputationError, Result};
use crate::model::{
    FittedModel, ForecastEngine, ForecastFrame, Growth, HolidayClass, HolidayRegressorTable,
    ModelConfig, ModelFrame, ModelOverrides,
};
use crate::series::TestcountSeries;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;
use tracing::debug;

/// Options for one imputation call.
#[derive(Debug, Clone)]
pub struct ImputationOptions {
    /// Country name or short code, resolved by the calendar builder.
    pub country: String,
    /// Which subdivisions the series covers.
    pub region: RegionSelector,
    /// Distinguish national from regional holidays in the regressor table.
    /// Requires more than one region (or `All`).
    pub regional_holidays: bool,
    /// If true, observed values are kept and only missing dates are
    /// predicted. If false, observed dates are overwritten too, yielding a
    /// smoothed profile.
    pub keep_data: bool,
    /// Dates before this are ignored by the fit and never overwritten.
    /// Defaults to the first date of the series. Use it to suppress the
    /// unrealistic upward ramp of early testing rollout.
    pub ignore_before: Option<NaiveDate>,
    /// Model configuration overrides, applied on top of the defaults.
    pub overrides: ModelOverrides,
}

impl ImputationOptions {
    pub fn new(country: impl Into<String>, region: RegionSelector) -> Self {
        Self {
            country: country.into(),
            region,
            regional_holidays: false,
            keep_data: true,
            ignore_before: None,
            overrides: ModelOverrides::default(),
        }
    }
}

/// Everything one imputation call produced.
pub struct ForecastResult {
    /// The completed series, on the same index as the input.
    pub series: TestcountSeries,
    /// Handle to the fitted model.
    pub model: Box<dyn FittedModel>,
    /// Raw model output over the full input index.
    pub forecast: ForecastFrame,
    /// The holiday calendar the model was conditioned on.
    pub holidays: HolidayCalendar,
}

/// Fits a seasonal model with holiday regressors to one testcount series
/// and fills (or smooths over) its gaps.
pub struct SeriesImputer {
    calendar: HolidayCalendarBuilder,
    engine: Box<dyn ForecastEngine>,
}

impl Default for SeriesImputer {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesImputer {
    /// Imputer backed by the built-in holiday data and the seasonal
    /// regression engine.
    pub fn new() -> Self {
        Self {
            calendar: HolidayCalendarBuilder::new(),
            engine: Box::new(SeasonalRegressionEngine::new()),
        }
    }

    /// Imputer over caller-supplied capabilities.
    pub fn with_capabilities(
        calendar: HolidayCalendarBuilder,
        engine: Box<dyn ForecastEngine>,
    ) -> Self {
        Self { calendar, engine }
    }

    /// Predict/smooth missing test counts.
    ///
    /// Fits the model over all dates at or after `ignore_before`, predicts
    /// over the entire input index and reassembles the output series:
    /// original values are preserved where `keep_data` demands it, every
    /// other in-window date receives the model's point estimate clipped to
    /// `[0, max(point estimates)]`.
    pub fn predict_testcounts(
        &self,
        testcounts: &TestcountSeries,
        options: &ImputationOptions,
    ) -> Result<ForecastResult> {
        let (first, last) = match (testcounts.first_date(), testcounts.last_date()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(ImputationError::InvalidInput(
                    "Cannot impute an empty series".to_string(),
                ))
            }
        };

        // Fail fast, before any calendar or model work.
        let multi_region = options.region.is_all() || options.region.listed_count() > 1;
        if options.regional_holidays && !multi_region {
            return Err(ImputationError::Configuration(
                "Cannot request regional holiday distinction at national level or for one region"
                    .to_string(),
            ));
        }

        let ignore_before = options.ignore_before.unwrap_or(first);
        let fit_mask: Vec<bool> = testcounts
            .dates()
            .iter()
            .map(|&d| d >= ignore_before)
            .collect();
        let predict_mask: Vec<bool> = if options.keep_data {
            testcounts
                .iter()
                .map(|(d, v)| d >= ignore_before && v.is_none())
                .collect()
        } else {
            fit_mask.clone()
        };

        let years: BTreeSet<i32> = (first.year()..=last.year()).collect();
        let (holidays, table) = self.build_regressor_table(options, multi_region, &years)?;

        let span_days = (last - first).num_days();
        let mut config = ModelConfig {
            holidays: table,
            // One potential trend change per ~30 days of span.
            n_changepoints: (span_days as f64 / 30.0).ceil() as usize,
            ..Default::default()
        };
        options.overrides.apply(&mut config);

        // Logistic growth needs bounding columns on every row.
        let cap = if config.growth == Growth::Logistic {
            Some(testcounts.max_observed().ok_or_else(|| {
                ImputationError::ModelFit(
                    "Cannot derive a logistic cap from a series with no observed values"
                        .to_string(),
                )
            })?)
        } else {
            None
        };

        let mut fit_ds = Vec::new();
        let mut fit_y = Vec::new();
        for (i, (date, value)) in testcounts.iter().enumerate() {
            if fit_mask[i] {
                fit_ds.push(date);
                fit_y.push(value);
            }
        }
        let n_fit = fit_ds.len();
        debug!(n_fit, ?ignore_before, "fitting testcount model");
        let training = ModelFrame {
            ds: fit_ds,
            y: fit_y,
            floor: cap.map(|_| vec![0.0; n_fit]),
            cap: cap.map(|c| vec![c; n_fit]),
        };
        let model = self.engine.fit(&training, &config)?;

        // Predict for every date of the input, not just the masked ones.
        let n = testcounts.len();
        let query = ModelFrame {
            ds: testcounts.dates().to_vec(),
            y: Vec::new(),
            floor: cap.map(|_| vec![0.0; n]),
            cap: cap.map(|c| vec![c; n]),
        };
        let forecast = model.predict(&query)?;
        if forecast.ds.as_slice() != testcounts.dates() {
            return Err(ImputationError::Consistency(
                "Forecast index diverges from the input index".to_string(),
            ));
        }

        let upper = forecast.max_yhat().max(0.0);
        let mut values = testcounts.values().to_vec();
        for i in 0..n {
            if predict_mask[i] {
                values[i] = Some(forecast.yhat[i].clamp(0.0, upper));
            }
        }
        let series = TestcountSeries::from_parts(testcounts.dates().to_vec(), values)?;

        Ok(ForecastResult {
            series,
            model,
            forecast,
            holidays,
        })
    }

    /// Fetch the holiday calendar and shape it into the model's regressor
    /// table. With several regions and `regional_holidays`, each date is
    /// classified as national or regional; otherwise the national calendar
    /// is used with a constant classification.
    fn build_regressor_table(
        &self,
        options: &ImputationOptions,
        multi_region: bool,
        years: &BTreeSet<i32>,
    ) -> Result<(HolidayCalendar, HolidayRegressorTable)> {
        let mut table = HolidayRegressorTable::new();
        if multi_region && options.regional_holidays {
            let all = self
                .calendar
                .get_holidays(&options.country, &options.region, years)?;
            let national =
                self.calendar
                    .get_holidays(&options.country, &RegionSelector::Nationwide, years)?;
            for (&date, name) in &all {
                let class = if national.contains_key(&date) {
                    HolidayClass::National
                } else {
                    HolidayClass::Regional
                };
                table.push(date, name.clone(), class);
            }
            Ok((all, table))
        } else {
            // Some countries report testcounts regionally but only have
            // national holidays; the selector is forced to nationwide.
            let national =
                self.calendar
                    .get_holidays(&options.country, &RegionSelector::Nationwide, years)?;
            for (&date, name) in &national {
                table.push(date, name.clone(), HolidayClass::Holiday);
            }
            Ok((national, table))
        }
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

    fn linear_options() -> ImputationOptions {
        let mut options = ImputationOptions::new("US", RegionSelector::Nationwide);
        options.overrides.growth = Some(Growth::Linear);
        options
    }

    #[test]
    fn test_gap_is_filled_and_originals_kept() {
        // 60 daily observations with 10 consecutive missing in the middle.
        let values: Vec<Option<f64>> = (0..60)
            .map(|i| {
                if (25..35).contains(&i) {
                    None
                } else {
                    Some(1000.0 + 10.0 * i as f64)
                }
            })
            .collect();
        let series = daily_series(d(2021, 1, 4), values.clone());

        let imputer = SeriesImputer::new();
        let result = imputer.predict_testcounts(&series, &linear_options()).unwrap();

        assert_eq!(result.series.len(), 60);
        assert_eq!(result.series.dates(), series.dates());

        let max_yhat = result.forecast.max_yhat();
        for (i, value) in result.series.values().iter().enumerate() {
            match values[i] {
                // keep_data: originals unchanged.
                Some(original) => assert_eq!(*value, Some(original)),
                None => {
                    let filled = value.expect("gap date must be imputed");
                    assert!(filled >= 0.0);
                    assert!(filled <= max_yhat);
                }
            }
        }
    }

    #[test]
    fn test_smoothing_overwrites_observed_values() {
        let values: Vec<Option<f64>> = (0..40).map(|i| Some(500.0 + 5.0 * i as f64)).collect();
        let series = daily_series(d(2021, 2, 1), values);

        let mut options = linear_options();
        options.keep_data = false;
        let imputer = SeriesImputer::new();
        let result = imputer.predict_testcounts(&series, &options).unwrap();

        assert_eq!(result.series.dates(), series.dates());
        let upper = result.forecast.max_yhat().max(0.0);
        for value in result.series.values() {
            let v = value.expect("smoothed output must be complete");
            assert!(v >= 0.0 && v <= upper);
        }
    }

    #[test]
    fn test_ignore_before_excludes_early_dates() {
        let mut values: Vec<Option<f64>> = (0..30).map(|i| Some(200.0 + i as f64)).collect();
        values[2] = None; // before the floor: must stay missing
        values[20] = None; // after the floor: must be filled
        let series = daily_series(d(2021, 3, 1), values);

        let mut options = linear_options();
        options.ignore_before = Some(d(2021, 3, 11));
        let imputer = SeriesImputer::new();
        let result = imputer.predict_testcounts(&series, &options).unwrap();

        assert_eq!(result.series.values()[2], None);
        assert!(result.series.values()[20].is_some());
    }

    #[test]
    fn test_holiday_years_cover_the_whole_span() {
        // 400 daily values from December 2019 touch three calendar years;
        // the middle year's holidays must reach the model too.
        let values: Vec<Option<f64>> = (0..400).map(|i| Some(800.0 + i as f64)).collect();
        let series = daily_series(d(2019, 12, 15), values);

        let imputer = SeriesImputer::new();
        let result = imputer.predict_testcounts(&series, &linear_options()).unwrap();
        assert!(result.holidays.contains_key(&d(2019, 12, 25)));
        assert!(result.holidays.contains_key(&d(2020, 7, 4)));
        assert!(result.holidays.contains_key(&d(2021, 1, 1)));
    }

    #[test]
    fn test_regional_holidays_require_multiple_regions() {
        let series = daily_series(d(2021, 1, 1), (0..20).map(|i| Some(i as f64)).collect());
        let mut options = linear_options();
        options.region = RegionSelector::one("CA");
        options.regional_holidays = true;

        let imputer = SeriesImputer::new();
        assert!(matches!(
            imputer.predict_testcounts(&series, &options),
            Err(ImputationError::Configuration(_))
        ));
    }

    #[test]
    fn test_regressor_table_classification() {
        let imputer = SeriesImputer::new();
        let mut options = ImputationOptions::new(
            "US",
            RegionSelector::Regions(vec!["CA".into(), "TX".into()]),
        );
        options.regional_holidays = true;
        let years: BTreeSet<i32> = [2021].into_iter().collect();

        let (calendar, table) = imputer
            .build_regressor_table(&options, true, &years)
            .unwrap();
        assert!(calendar.contains_key(&d(2021, 3, 31))); // Cesar Chavez Day (CA)

        let class_of = |date: NaiveDate| {
            table
                .rows
                .iter()
                .find(|r| r.date == date)
                .map(|r| r.holiday_class)
        };
        assert_eq!(class_of(d(2021, 1, 1)), Some(HolidayClass::National));
        assert_eq!(class_of(d(2021, 3, 31)), Some(HolidayClass::Regional));
        assert_eq!(class_of(d(2021, 3, 2)), Some(HolidayClass::Regional)); // TX
    }

    #[test]
    fn test_national_table_uses_constant_class() {
        let imputer = SeriesImputer::new();
        let options = ImputationOptions::new("US", RegionSelector::Nationwide);
        let years: BTreeSet<i32> = [2021].into_iter().collect();
        let (_, table) = imputer
            .build_regressor_table(&options, false, &years)
            .unwrap();
        assert!(!table.is_empty());
        assert!(table
            .rows
            .iter()
            .all(|r| r.holiday_class == HolidayClass::Holiday));
    }

    #[test]
    fn test_unknown_country_propagates() {
        let series = daily_series(d(2021, 1, 1), (0..20).map(|i| Some(i as f64)).collect());
        let mut options = linear_options();
        options.country = "Atlantis".into();

        let imputer = SeriesImputer::new();
        assert!(matches!(
            imputer.predict_testcounts(&series, &options),
            Err(ImputationError::UnknownCountry(_))
        ));
    }

    #[test]
    fn test_empty_series_is_rejected() {
        let series = TestcountSeries::new(vec![]);
        let imputer = SeriesImputer::new();
        assert!(matches!(
            imputer.predict_testcounts(&series, &linear_options()),
            Err(ImputationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_logistic_default_adds_bounds_from_observed_max() {
        // Default growth is logistic; the cap comes from the observed max.
        let values: Vec<Option<f64>> = (0..45)
            .map(|i| if i % 9 == 4 { None } else { Some(300.0 + 2.0 * i as f64) })
            .collect();
        let series = daily_series(d(2021, 5, 1), values);
        let options = ImputationOptions::new("US", RegionSelector::Nationwide);

        let imputer = SeriesImputer::new();
        let result = imputer.predict_testcounts(&series, &options).unwrap();
        let cap = series.max_observed().unwrap();
        for value in result.series.values() {
            let v = value.expect("output must be complete on observed and filled dates");
            assert!(v >= 0.0 && v <= cap.max(result.forecast.max_yhat()));
        }
    }
}
