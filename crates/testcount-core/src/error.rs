//! Error types for testcount imputation.

use thiserror::Error;

/// Result type for imputation operations.
pub type Result<T> = std::result::Result<T, ImputationError>;

/// Error types for imputation operations.
#[derive(Error, Debug)]
pub enum ImputationError {
    /// The country has no entry in the holiday data source.
    #[error("Unknown country: {0}")]
    UnknownCountry(String),

    /// The requested subdivision is in neither the state nor the province
    /// scheme of the resolved country.
    #[error("Region '{region}' not found in {country} states or provinces")]
    UnknownRegion { country: String, region: String },

    /// Invalid combination of options, rejected before any model work.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Malformed input data, e.g. mismatched column lengths or an empty
    /// series.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The fitting capability rejected the training data or failed to
    /// converge. Surfaced to the caller, never retried.
    #[error("Model fit failed: {0}")]
    ModelFit(String),

    /// A post-condition violation. Treated as a defect, not a recoverable
    /// runtime condition.
    #[error("Consistency check failed: {0}")]
    Consistency(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ImputationError::UnknownCountry("XYZ".into());
        assert_eq!(format!("{}", err), "Unknown country: XYZ");

        let err = ImputationError::UnknownRegion {
            country: "USA".into(),
            region: "ZZ".into(),
        };
        assert_eq!(
            format!("{}", err),
            "Region 'ZZ' not found in USA states or provinces"
        );

        let err = ImputationError::Configuration("regional holidays need >1 region".into());
        assert_eq!(
            format!("{}", err),
            "Invalid configuration: regional holidays need >1 region"
        );

        let err = ImputationError::ModelFit("singular design matrix".into());
        assert_eq!(
            format!("{}", err),
            "Model fit failed: singular design matrix"
        );
    }

    #[test]
    fn test_error_construction() {
        let err = ImputationError::Consistency("index mismatch".into());
        assert!(matches!(err, ImputationError::Consistency(_)));

        let err = ImputationError::UnknownRegion {
            country: "DEU".into(),
            region: "XX".into(),
        };
        if let ImputationError::UnknownRegion { country, region } = err {
            assert_eq!(country, "DEU");
            assert_eq!(region, "XX");
        } else {
            panic!("Expected UnknownRegion variant");
        }
    }
}
