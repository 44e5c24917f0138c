//! Built-in seasonal regression engine.
//!
//! A Prophet-style additive regression fitted by ordinary least squares:
//! piecewise-linear trend with changepoints, Fourier seasonality terms and
//! one indicator regressor per holiday. Growth and seasonality mode are
//! handled by a response transform, so the same linear solver serves the
//! logistic and multiplicative variants. Uncertainty bounds come from the
//! residual spread in transform space; the engine estimates them
//! analytically and does not draw posterior samples.

use crate::error::{ImputationError, Result};
use crate::model::{
    FittedModel, ForecastEngine, ForecastFrame, Growth, ModelConfig, ModelFrame, SeasonalityMode,
};
use anofox_regression::prelude::*;
use chrono::NaiveDate;
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeSet;
use std::f64::consts::PI;

const WEEKLY_PERIOD_DAYS: f64 = 7.0;
const YEARLY_PERIOD_DAYS: f64 = 365.25;
const WEEKLY_FOURIER_ORDER: usize = 3;
const YEARLY_FOURIER_ORDER: usize = 6;
/// Changepoints are placed over the first 80% of the training span.
const CHANGEPOINT_RANGE: f64 = 0.8;
/// Two-sided coverage of the reported uncertainty bounds.
const INTERVAL_WIDTH: f64 = 0.8;

/// The default [`ForecastEngine`] implementation.
#[derive(Debug, Default)]
pub struct SeasonalRegressionEngine;

impl SeasonalRegressionEngine {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransformKind {
    Identity,
    Log1p,
    Logistic,
}

impl TransformKind {
    fn for_config(config: &ModelConfig) -> Self {
        match (config.growth, config.seasonality_mode) {
            (Growth::Logistic, _) => TransformKind::Logistic,
            (Growth::Linear, SeasonalityMode::Multiplicative) => TransformKind::Log1p,
            (Growth::Linear, SeasonalityMode::Additive) => TransformKind::Identity,
        }
    }
}

fn logit_forward(y: f64, floor: f64, cap: f64) -> f64 {
    let span = cap - floor;
    let eps = span * 1e-6;
    let y = y.clamp(floor + eps, cap - eps);
    ((y - floor) / (cap - y)).ln()
}

fn logit_inverse(z: f64, floor: f64, cap: f64) -> f64 {
    floor + (cap - floor) / (1.0 + (-z).exp())
}

/// Feature layout shared by fit and predict.
#[derive(Debug, Clone)]
struct FeatureSpec {
    origin: NaiveDate,
    span_days: f64,
    /// Changepoint positions in scaled time.
    changepoints: Vec<f64>,
    weekly: bool,
    yearly: bool,
    holiday_names: Vec<String>,
    holiday_dates: Vec<BTreeSet<NaiveDate>>,
}

impl FeatureSpec {
    fn from_config(frame: &ModelFrame, config: &ModelConfig) -> Result<Self> {
        let origin = *frame.ds.first().ok_or_else(|| {
            ImputationError::InvalidInput("Training frame has no rows".to_string())
        })?;
        let last = *frame.ds.last().unwrap_or(&origin);
        let span_days = ((last - origin).num_days() as f64).max(1.0);

        // The solve only sees rows that carry an observation, so the basis
        // is sized by those, not by the frame length. A sparse series can
        // be much shorter than its date index.
        let n_obs = if frame.y.is_empty() {
            frame.ds.len()
        } else {
            frame.y.iter().filter(|v| v.is_some()).count()
        };
        let n = config.n_changepoints.min(n_obs / 3);
        let changepoints: Vec<f64> = (1..=n)
            .map(|j| CHANGEPOINT_RANGE * j as f64 / (n as f64 + 1.0))
            .collect();

        // Seasonality blocks are shed, yearly first, when their Fourier
        // columns would not leave the solve any residual degrees of freedom.
        let mut used = 2 + n; // intercept and trend
        let yearly = config.yearly_seasonality && used + 2 * YEARLY_FOURIER_ORDER + 2 <= n_obs;
        if yearly {
            used += 2 * YEARLY_FOURIER_ORDER;
        }
        let weekly = config.weekly_seasonality && used + 2 * WEEKLY_FOURIER_ORDER + 2 <= n_obs;

        let holiday_names = config.holidays.distinct_names();
        let holiday_dates = holiday_names
            .iter()
            .map(|name| config.holidays.dates_for(name))
            .collect();

        Ok(Self {
            origin,
            span_days,
            changepoints,
            weekly,
            yearly,
            holiday_names,
            holiday_dates,
        })
    }

    /// One feature row for a date: trend, changepoint hinges, Fourier
    /// seasonality, holiday indicators. The intercept is handled by the
    /// solver.
    fn row(&self, date: NaiveDate) -> Vec<f64> {
        let days = (date - self.origin).num_days() as f64;
        let t = days / self.span_days;

        let mut row = Vec::with_capacity(self.n_features());
        row.push(t);
        for &cp in &self.changepoints {
            row.push((t - cp).max(0.0));
        }
        if self.weekly {
            push_fourier(&mut row, days, WEEKLY_PERIOD_DAYS, WEEKLY_FOURIER_ORDER);
        }
        if self.yearly {
            push_fourier(&mut row, days, YEARLY_PERIOD_DAYS, YEARLY_FOURIER_ORDER);
        }
        for dates in &self.holiday_dates {
            row.push(if dates.contains(&date) { 1.0 } else { 0.0 });
        }
        row
    }

    fn n_features(&self) -> usize {
        let mut n = 1 + self.changepoints.len() + self.holiday_names.len();
        if self.weekly {
            n += 2 * WEEKLY_FOURIER_ORDER;
        }
        if self.yearly {
            n += 2 * YEARLY_FOURIER_ORDER;
        }
        n
    }
}

fn push_fourier(row: &mut Vec<f64>, days: f64, period: f64, order: usize) {
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * days / period;
        row.push(angle.sin());
        row.push(angle.cos());
    }
}

/// Per-row logistic bounds of a frame, validated.
fn frame_bounds(frame: &ModelFrame) -> Result<Option<(&[f64], &[f64])>> {
    match (&frame.floor, &frame.cap) {
        (Some(floor), Some(cap)) => {
            if floor.len() != frame.ds.len() || cap.len() != frame.ds.len() {
                return Err(ImputationError::InvalidInput(
                    "Floor/cap columns must match the frame length".to_string(),
                ));
            }
            Ok(Some((floor.as_slice(), cap.as_slice())))
        }
        (None, None) => Ok(None),
        _ => Err(ImputationError::InvalidInput(
            "Floor and cap columns must be supplied together".to_string(),
        )),
    }
}

struct FittedSeasonalRegression {
    spec: FeatureSpec,
    /// Indices of the feature columns that survived the all-zero filter.
    kept: Vec<usize>,
    intercept: f64,
    coefficients: Vec<f64>,
    transform: TransformKind,
    /// Training bounds, the fallback when a prediction frame omits its own.
    train_bounds: Option<(f64, f64)>,
    sigma: f64,
    interval_z: f64,
}

impl FittedSeasonalRegression {
    fn linear_predictor(&self, date: NaiveDate) -> f64 {
        let row = self.spec.row(date);
        let mut z = self.intercept;
        for (coef, &col) in self.coefficients.iter().zip(&self.kept) {
            z += coef * row[col];
        }
        z
    }

    fn inverse(&self, z: f64, bounds: Option<(f64, f64)>) -> Result<f64> {
        match self.transform {
            TransformKind::Identity => Ok(z),
            TransformKind::Log1p => Ok(z.exp() - 1.0),
            TransformKind::Logistic => {
                let (floor, cap) = bounds.or(self.train_bounds).ok_or_else(|| {
                    ImputationError::ModelFit(
                        "Logistic growth requires floor and cap columns".to_string(),
                    )
                })?;
                Ok(logit_inverse(z, floor, cap))
            }
        }
    }
}

impl FittedModel for FittedSeasonalRegression {
    fn predict(&self, frame: &ModelFrame) -> Result<ForecastFrame> {
        let bounds = frame_bounds(frame)?;
        let mut yhat = Vec::with_capacity(frame.len());
        let mut yhat_lower = Vec::with_capacity(frame.len());
        let mut yhat_upper = Vec::with_capacity(frame.len());

        for (i, &date) in frame.ds.iter().enumerate() {
            let z = self.linear_predictor(date);
            let row_bounds = bounds.map(|(floor, cap)| (floor[i], cap[i]));
            yhat.push(self.inverse(z, row_bounds)?);
            yhat_lower.push(self.inverse(z - self.interval_z * self.sigma, row_bounds)?);
            yhat_upper.push(self.inverse(z + self.interval_z * self.sigma, row_bounds)?);
        }

        Ok(ForecastFrame {
            ds: frame.ds.clone(),
            yhat,
            yhat_lower,
            yhat_upper,
        })
    }
}

impl ForecastEngine for SeasonalRegressionEngine {
    fn fit(&self, training: &ModelFrame, config: &ModelConfig) -> Result<Box<dyn FittedModel>> {
        if training.ds.len() != training.y.len() {
            return Err(ImputationError::InvalidInput(
                "Training frame dates and values must have the same length".to_string(),
            ));
        }
        let transform = TransformKind::for_config(config);
        let bounds = frame_bounds(training)?;
        if transform == TransformKind::Logistic && bounds.is_none() {
            return Err(ImputationError::ModelFit(
                "Logistic growth requires floor and cap columns".to_string(),
            ));
        }

        let spec = FeatureSpec::from_config(training, config)?;

        // Rows with a missing observation carry no information for the fit.
        let mut dates = Vec::new();
        let mut targets = Vec::new();
        let mut train_bounds = None;
        for (i, (&date, value)) in training.ds.iter().zip(&training.y).enumerate() {
            let Some(y) = value else { continue };
            let z = match transform {
                TransformKind::Identity => *y,
                TransformKind::Log1p => (1.0 + y.max(0.0)).ln(),
                TransformKind::Logistic => {
                    let (floor, cap) = bounds
                        .map(|(f, c)| (f[i], c[i]))
                        .unwrap_or((0.0, 1.0));
                    if cap <= floor {
                        return Err(ImputationError::ModelFit(format!(
                            "Logistic cap {} must exceed floor {}",
                            cap, floor
                        )));
                    }
                    train_bounds = Some((floor, cap));
                    logit_forward(*y, floor, cap)
                }
            };
            dates.push(date);
            targets.push(z);
        }

        if targets.len() < 2 {
            return Err(ImputationError::ModelFit(format!(
                "Need at least 2 observed values to fit, got {}",
                targets.len()
            )));
        }

        let rows: Vec<Vec<f64>> = dates.iter().map(|&d| spec.row(d)).collect();

        // Drop feature columns without support in the training window
        // (e.g. holidays outside it); they would make the design singular.
        let kept: Vec<usize> = (0..spec.n_features())
            .filter(|&j| rows.iter().any(|r| r[j] != 0.0))
            .collect();

        let n = rows.len();
        let k = kept.len();
        let x_mat = faer::Mat::from_fn(n, k, |i, j| rows[i][kept[j]]);
        let y_col = faer::Col::from_fn(n, |i| targets[i]);

        let fitted = OlsRegressor::builder()
            .with_intercept(true)
            .build()
            .fit(&x_mat, &y_col)
            .map_err(|e| ImputationError::ModelFit(e.to_string()))?;

        let intercept = fitted.intercept().unwrap_or(0.0);
        let coeffs_col = fitted.coefficients();
        let mut coefficients = Vec::with_capacity(k);
        for i in 0..coeffs_col.nrows() {
            coefficients.push(coeffs_col[i]);
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ImputationError::ModelFit(
                "Solver produced non-finite coefficients".to_string(),
            ));
        }

        // Residual spread in transform space drives the interval width.
        let predictions = fitted.predict(&x_mat);
        let sse: f64 = (0..n).map(|i| (targets[i] - predictions[i]).powi(2)).sum();
        let dof = n.saturating_sub(k + 1).max(1);
        let sigma = (sse / dof as f64).sqrt();

        let interval_z = Normal::new(0.0, 1.0)
            .map(|normal| normal.inverse_cdf(0.5 + INTERVAL_WIDTH / 2.0))
            .unwrap_or(1.28);

        Ok(Box::new(FittedSeasonalRegression {
            spec,
            kept,
            intercept,
            coefficients,
            transform,
            train_bounds,
            sigma,
            interval_z,
        }))
    }
}
