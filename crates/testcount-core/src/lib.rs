//! Holiday-aware imputation and smoothing of daily testcount series.
//!
//! This crate fills gaps in per-region COVID-19 testing-count series with a
//! seasonal regression model conditioned on a country/region holiday
//! calendar, so downstream epidemiological pipelines can normalize case
//! counts against a complete series.
//!
//! Three components, consumed bottom-up:
//! - [`HolidayCalendarBuilder`] resolves a country, a region selector and a
//!   set of years into a concrete date-to-name holiday calendar.
//! - [`SeriesImputer`] fits the forecasting model to one series and
//!   produces a completed (or smoothed) copy of it.
//! - [`RegionalBatchRunner`] applies the imputer to every region of a
//!   dataset, with per-region sufficiency checks and training floors.

pub mod batch;
pub mod calendar;
pub mod engine;
pub mod error;
pub mod holiday_data;
pub mod imputer;
pub mod model;
pub mod series;

// Re-exports for convenience
pub use batch::{BatchOverrides, RegionalBatchRunner};
pub use calendar::{
    CountryMeta, CountryResolver, HolidayCalendar, HolidayCalendarBuilder, HolidaySource,
    RegionSelector, SubdivisionKind,
};
pub use engine::SeasonalRegressionEngine;
pub use error::{ImputationError, Result};
pub use holiday_data::{BuiltinCountryResolver, BuiltinHolidaySource};
pub use imputer::{ForecastResult, ImputationOptions, SeriesImputer};
pub use model::{
    FittedModel, ForecastEngine, ForecastFrame, Growth, HolidayClass, HolidayRegressorRow,
    HolidayRegressorTable, ModelConfig, ModelFrame, ModelOverrides, SeasonalityMode,
};
pub use series::{RegionalTestcounts, TestcountSeries};
