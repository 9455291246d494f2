use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::InvalidInputError;
use crate::features::FeatureVector;

/// one timestamped sensor sample
///
/// the timestamp keeps the offset it was written with: equality compares
/// instants, while hour/minute features use the written wall clock.
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<FixedOffset>,
    /// air temperature in celsius
    pub temperature: f64,
    /// relative air humidity (0-100%)
    pub humidity_air: f64,
    /// soil moisture (0-100%)
    pub humidity_soil: f64,
    /// light level, raw sensor units
    pub light: f64,
}

/// a supervised training example: features at `timestamp`, temperature at
/// exactly `timestamp + horizon`
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedRow {
    pub timestamp: DateTime<FixedOffset>,
    pub features: FeatureVector,
    pub target: f64,
}

/// inference request as received over stdin or http
///
/// carries the already-derived time features, not a raw timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub temperature: f64,
    pub humidity_air: f64,
    pub humidity_soil: f64,
    pub light: f64,
    pub hour: u32,
    pub minute_of_day: u32,
}

impl InferenceRequest {
    /// parse a request body; missing fields or wrong types are rejected, never defaulted
    pub fn from_json(body: &str) -> Result<Self, InvalidInputError> {
        let request: Self =
            serde_json::from_str(body).map_err(|e| InvalidInputError::Body(e.to_string()))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), InvalidInputError> {
        for (field, value) in [
            ("temperature", self.temperature),
            ("humidity_air", self.humidity_air),
            ("humidity_soil", self.humidity_soil),
            ("light", self.light),
        ] {
            if !value.is_finite() {
                return Err(InvalidInputError::NonFinite { field });
            }
        }
        if self.hour > 23 {
            return Err(InvalidInputError::OutOfRange {
                field: "hour",
                value: self.hour.into(),
                max: 23,
            });
        }
        if self.minute_of_day > 1439 {
            return Err(InvalidInputError::OutOfRange {
                field: "minute_of_day",
                value: self.minute_of_day.into(),
                max: 1439,
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InferenceResponse {
    pub anomaly: bool,
    pub prediction_temp: f64,
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_request() {
        let req = InferenceRequest::from_json(
            r#"{"temperature":20.0,"humidity_air":1.0,"humidity_soil":1.0,"light":1.0,"hour":10,"minute_of_day":600}"#,
        )
        .unwrap();
        assert_eq!(req.hour, 10);
        assert_eq!(req.minute_of_day, 600);
        assert_eq!(req.temperature, 20.0);
    }

    #[test]
    fn missing_field_is_rejected() {
        let err = InferenceRequest::from_json(
            r#"{"temperature":20.0,"humidity_air":1.0,"light":1.0,"hour":10,"minute_of_day":600}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InvalidInputError::Body(ref m) if m.contains("humidity_soil")));
    }

    #[test]
    fn non_numeric_field_is_rejected() {
        let err = InferenceRequest::from_json(
            r#"{"temperature":"warm","humidity_air":1.0,"humidity_soil":1.0,"light":1.0,"hour":10,"minute_of_day":600}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InvalidInputError::Body(_)));
    }

    #[test]
    fn out_of_range_time_features_are_rejected() {
        let err = InferenceRequest::from_json(
            r#"{"temperature":20.0,"humidity_air":1.0,"humidity_soil":1.0,"light":1.0,"hour":24,"minute_of_day":600}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            InvalidInputError::OutOfRange { field: "hour", value: 24, max: 23 }
        );

        let err = InferenceRequest::from_json(
            r#"{"temperature":20.0,"humidity_air":1.0,"humidity_soil":1.0,"light":1.0,"hour":10,"minute_of_day":1440}"#,
        )
        .unwrap_err();
        assert!(matches!(err, InvalidInputError::OutOfRange { field: "minute_of_day", .. }));
    }

    #[test]
    fn non_finite_value_is_rejected() {
        let req = InferenceRequest {
            temperature: f64::NAN,
            humidity_air: 1.0,
            humidity_soil: 1.0,
            light: 1.0,
            hour: 0,
            minute_of_day: 0,
        };
        assert_eq!(
            req.validate(),
            Err(InvalidInputError::NonFinite { field: "temperature" })
        );
    }

    #[test]
    fn response_serializes_with_wire_names() {
        let json = serde_json::to_value(InferenceResponse {
            anomaly: false,
            prediction_temp: 21.5,
        })
        .unwrap();
        assert_eq!(json["anomaly"], false);
        assert_eq!(json["prediction_temp"], 21.5);
    }
}
