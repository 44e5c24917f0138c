//! Forecasting model capability: configuration, data frames and the
//! fit/predict trait seam.
//!
//! The imputer treats the model as an opaque two-operation capability.
//! Any seasonal-regression engine with holiday regressors can stand behind
//! [`ForecastEngine`]; the crate ships
//! [`SeasonalRegressionEngine`](crate::engine::SeasonalRegressionEngine).

use crate::error::Result;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Trend shape assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// Bounded S-curve, requires floor/cap columns.
    Logistic,
    /// Unbounded trend, no bounding columns.
    Linear,
}

/// How seasonal and holiday effects combine with the trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonalityMode {
    Additive,
    Multiplicative,
}

/// Classification of a holiday regressor row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolidayClass {
    National,
    Regional,
    /// Used when no national/regional distinction is requested.
    Holiday,
}

impl HolidayClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            HolidayClass::National => "national",
            HolidayClass::Regional => "regional",
            HolidayClass::Holiday => "holiday",
        }
    }
}

/// One (date, holiday) pair of the regressor table.
#[derive(Debug, Clone, PartialEq)]
pub struct HolidayRegressorRow {
    pub date: NaiveDate,
    pub holiday_name: String,
    pub holiday_class: HolidayClass,
}

/// Tabular holiday regressor input to the model, one row per
/// (date, holiday) pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HolidayRegressorTable {
    pub rows: Vec<HolidayRegressorRow>,
}

impl HolidayRegressorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, date: NaiveDate, name: impl Into<String>, class: HolidayClass) {
        self.rows.push(HolidayRegressorRow {
            date,
            holiday_name: name.into(),
            holiday_class: class,
        });
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct holiday names, sorted.
    pub fn distinct_names(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.rows.iter().map(|r| r.holiday_name.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// All dates on which the named holiday occurs.
    pub fn dates_for(&self, name: &str) -> BTreeSet<NaiveDate> {
        self.rows
            .iter()
            .filter(|r| r.holiday_name == name)
            .map(|r| r.date)
            .collect()
    }
}

/// Model configuration. Caller-supplied overrides always replace defaults;
/// unknown keys travel in `extra` and are passed through opaquely to the
/// engine.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub growth: Growth,
    pub seasonality_mode: SeasonalityMode,
    pub daily_seasonality: bool,
    pub weekly_seasonality: bool,
    pub yearly_seasonality: bool,
    /// Holiday regressor table, one row per (date, holiday) pair.
    pub holidays: HolidayRegressorTable,
    /// Posterior sample count for engines that estimate uncertainty by
    /// sampling. Analytic engines may ignore it.
    pub posterior_samples: usize,
    /// Number of potential trend changepoints.
    pub n_changepoints: usize,
    /// Engine-specific options, passed through unchanged.
    pub extra: BTreeMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            growth: Growth::Logistic,
            seasonality_mode: SeasonalityMode::Multiplicative,
            daily_seasonality: false,
            weekly_seasonality: true,
            yearly_seasonality: false,
            holidays: HolidayRegressorTable::new(),
            posterior_samples: 500,
            n_changepoints: 25,
            extra: BTreeMap::new(),
        }
    }
}

/// Caller overrides for [`ModelConfig`]. A `Some` field replaces the
/// default; `extra` entries are merged key-by-key, caller wins.
#[derive(Debug, Clone, Default)]
pub struct ModelOverrides {
    pub growth: Option<Growth>,
    pub seasonality_mode: Option<SeasonalityMode>,
    pub daily_seasonality: Option<bool>,
    pub weekly_seasonality: Option<bool>,
    pub yearly_seasonality: Option<bool>,
    pub posterior_samples: Option<usize>,
    pub n_changepoints: Option<usize>,
    pub extra: BTreeMap<String, String>,
}

impl ModelOverrides {
    /// Apply the overrides on top of a configuration.
    pub fn apply(&self, config: &mut ModelConfig) {
        if let Some(growth) = self.growth {
            config.growth = growth;
        }
        if let Some(mode) = self.seasonality_mode {
            config.seasonality_mode = mode;
        }
        if let Some(daily) = self.daily_seasonality {
            config.daily_seasonality = daily;
        }
        if let Some(weekly) = self.weekly_seasonality {
            config.weekly_seasonality = weekly;
        }
        if let Some(yearly) = self.yearly_seasonality {
            config.yearly_seasonality = yearly;
        }
        if let Some(samples) = self.posterior_samples {
            config.posterior_samples = samples;
        }
        if let Some(n) = self.n_changepoints {
            config.n_changepoints = n;
        }
        for (key, value) in &self.extra {
            config.extra.insert(key.clone(), value.clone());
        }
    }
}

/// Tabular input to the model capability: a date column, an observed-value
/// column (training frames only) and per-row logistic bounds when the
/// growth mode requires them.
#[derive(Debug, Clone, Default)]
pub struct ModelFrame {
    pub ds: Vec<NaiveDate>,
    /// Observed values; empty for prediction frames. `None` rows are
    /// skipped by the fit.
    pub y: Vec<Option<f64>>,
    pub floor: Option<Vec<f64>>,
    pub cap: Option<Vec<f64>>,
}

impl ModelFrame {
    pub fn len(&self) -> usize {
        self.ds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ds.is_empty()
    }
}

/// Raw model output: point estimates with uncertainty bounds, one row per
/// query date.
#[derive(Debug, Clone, Default)]
pub struct ForecastFrame {
    pub ds: Vec<NaiveDate>,
    pub yhat: Vec<f64>,
    pub yhat_lower: Vec<f64>,
    pub yhat_upper: Vec<f64>,
}

impl ForecastFrame {
    /// Largest point estimate in the frame.
    pub fn max_yhat(&self) -> f64 {
        self.yhat.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// A model fitted to one training frame.
pub trait FittedModel: Send + Sync {
    /// Produce point estimates with uncertainty bounds for every query row.
    fn predict(&self, frame: &ModelFrame) -> Result<ForecastFrame>;
}

/// Opaque fitting capability.
pub trait ForecastEngine: Send + Sync {
    fn fit(&self, training: &ModelFrame, config: &ModelConfig) -> Result<Box<dyn FittedModel>>;
}
