//! Multi-factor risk classification engine
//!
//! Pure scoring of station records: each domain carries an ordered list of
//! (factor, weight, curve) triples plus a level threshold table. Factors
//! absent from a record drop out of both the score and the weight
//! normalization, so a station missing a sensor is scored over what it does
//! report rather than penalized. Records with fewer than the domain's
//! minimum factor count short-circuit to an insufficient-data outcome.
//!
//! No I/O happens here; weights and thresholds come in as configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Domain, Measurements, RiskAssessment, RiskLevel, RiskOutcome, StationRecord};

/// Which measurement a factor reads from a station record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorInput {
    Temperature,
    Humidity,
    WindSpeed,
    WindGust,
    Rainfall,
    Pressure,
    Visibility,
}

impl FactorInput {
    /// Reads the factor's measurement, `None` when the sensor is absent
    pub fn value(&self, m: &Measurements) -> Option<f64> {
        match self {
            FactorInput::Temperature => m.air_temperature,
            FactorInput::Humidity => m.relative_humidity,
            FactorInput::WindSpeed => m.wind_speed,
            FactorInput::WindGust => m.wind_gust,
            FactorInput::Rainfall => m.rainfall_since_9am,
            FactorInput::Pressure => m.mean_sea_level_pressure,
            FactorInput::Visibility => m.visibility,
        }
    }
}

/// Normalization curve mapping a raw measurement to a [0, 1] contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum Curve {
    /// Linear ramp from 0 at `base` to 1 at `base + span`
    LinearAbove { base: f64, span: f64 },
    /// Inverse ramp: 1 at `full_at` (or below), 0 at `zero_at` (or above)
    InverseLinear { zero_at: f64, full_at: f64 },
    /// Two-slope ramp from `base`, switching to the steeper `steep_rate`
    /// above `knee` (used for wind, where gust-range speeds escalate risk)
    KinkedLinear {
        base: f64,
        knee: f64,
        rate: f64,
        steep_rate: f64,
    },
    /// Stepped thresholds: the value of the highest step at or below the
    /// measurement. Steps must be ascending by `at`.
    Stepped { steps: Vec<Step> },
    /// Ramp for values falling below `reference`: 0 at the reference,
    /// 1 once the deficit reaches `span`
    DropBelow { reference: f64, span: f64 },
}

/// One rung of a [`Curve::Stepped`] table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub at: f64,
    pub value: f64,
}

impl Curve {
    /// Maps a raw measurement onto [0, 1]
    pub fn normalize(&self, v: f64) -> f64 {
        let raw = match self {
            Curve::LinearAbove { base, span } => (v - base) / span.max(f64::EPSILON),
            Curve::InverseLinear { zero_at, full_at } => {
                (zero_at - v) / (zero_at - full_at).max(f64::EPSILON)
            }
            Curve::KinkedLinear {
                base,
                knee,
                rate,
                steep_rate,
            } => {
                if v <= *knee {
                    (v - base) * rate
                } else {
                    (knee - base) * rate + (v - knee) * steep_rate
                }
            }
            Curve::Stepped { steps } => steps
                .iter()
                .take_while(|s| s.at <= v)
                .last()
                .map(|s| s.value)
                .unwrap_or(0.0),
            Curve::DropBelow { reference, span } => (reference - v) / span.max(f64::EPSILON),
        };
        raw.clamp(0.0, 1.0)
    }
}

/// One weighted factor in a domain's scoring formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSpec {
    /// Factor name used in the assessment breakdown (e.g. "wind_speed")
    pub name: String,
    /// Measurement the factor reads
    pub input: FactorInput,
    /// Relative weight in the weighted sum
    pub weight: f64,
    /// Normalization curve for the raw measurement
    pub curve: Curve,
}

/// Ascending score thresholds for level assignment.
///
/// Scores land in Low below `moderate`; a score exactly on a boundary
/// rounds up to the higher level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub moderate: f64,
    pub high: f64,
    pub extreme: f64,
}

impl Thresholds {
    /// Maps a score to its discrete level
    pub fn level(&self, score: f64) -> RiskLevel {
        if score >= self.extreme {
            RiskLevel::Extreme
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

/// Complete scoring configuration for one domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainProfile {
    /// Ordered factor list
    pub factors: Vec<FactorSpec>,
    /// Level threshold table
    pub thresholds: Thresholds,
    /// Minimum present factors required to score at all
    pub min_factors: usize,
}

impl DomainProfile {
    /// Default fire-weather profile: hot, dry and windy push the score up.
    ///
    /// Values are tuning defaults pending calibration against the bureau's
    /// published fire danger tables.
    pub fn fire_default() -> Self {
        Self {
            factors: vec![
                FactorSpec {
                    name: "temperature".to_string(),
                    input: FactorInput::Temperature,
                    weight: 0.40,
                    curve: Curve::LinearAbove {
                        base: 20.0,
                        span: 25.0,
                    },
                },
                FactorSpec {
                    name: "humidity".to_string(),
                    input: FactorInput::Humidity,
                    weight: 0.35,
                    curve: Curve::InverseLinear {
                        zero_at: 60.0,
                        full_at: 10.0,
                    },
                },
                FactorSpec {
                    name: "wind_speed".to_string(),
                    input: FactorInput::WindSpeed,
                    weight: 0.25,
                    curve: Curve::KinkedLinear {
                        base: 10.0,
                        knee: 40.0,
                        rate: 0.02,
                        steep_rate: 0.04,
                    },
                },
            ],
            thresholds: Thresholds {
                moderate: 0.3,
                high: 0.55,
                extreme: 0.8,
            },
            min_factors: 2,
        }
    }

    /// Default storm profile: heavy rain, strong wind and a pressure drop
    pub fn storm_default() -> Self {
        Self {
            factors: vec![
                FactorSpec {
                    name: "rainfall".to_string(),
                    input: FactorInput::Rainfall,
                    weight: 0.40,
                    curve: Curve::Stepped {
                        steps: vec![
                            Step { at: 0.0, value: 0.0 },
                            Step { at: 2.0, value: 0.25 },
                            Step { at: 10.0, value: 0.5 },
                            Step { at: 25.0, value: 0.75 },
                            Step { at: 50.0, value: 1.0 },
                        ],
                    },
                },
                FactorSpec {
                    name: "wind_speed".to_string(),
                    input: FactorInput::WindSpeed,
                    weight: 0.35,
                    curve: Curve::KinkedLinear {
                        base: 10.0,
                        knee: 40.0,
                        rate: 0.02,
                        steep_rate: 0.04,
                    },
                },
                FactorSpec {
                    name: "pressure_drop".to_string(),
                    input: FactorInput::Pressure,
                    weight: 0.25,
                    curve: Curve::DropBelow {
                        reference: 1013.0,
                        span: 20.0,
                    },
                },
            ],
            thresholds: Thresholds {
                moderate: 0.3,
                high: 0.55,
                extreme: 0.8,
            },
            min_factors: 2,
        }
    }

    /// Default coastal profile: wind, poor visibility, and gusts as a
    /// swell proxy when the station reports them
    pub fn coastal_default() -> Self {
        Self {
            factors: vec![
                FactorSpec {
                    name: "wind_speed".to_string(),
                    input: FactorInput::WindSpeed,
                    weight: 0.50,
                    curve: Curve::KinkedLinear {
                        base: 10.0,
                        knee: 40.0,
                        rate: 0.02,
                        steep_rate: 0.04,
                    },
                },
                FactorSpec {
                    name: "visibility".to_string(),
                    input: FactorInput::Visibility,
                    weight: 0.30,
                    curve: Curve::InverseLinear {
                        zero_at: 20.0,
                        full_at: 0.5,
                    },
                },
                FactorSpec {
                    name: "swell_proxy".to_string(),
                    input: FactorInput::WindGust,
                    weight: 0.20,
                    curve: Curve::KinkedLinear {
                        base: 20.0,
                        knee: 60.0,
                        rate: 0.015,
                        steep_rate: 0.03,
                    },
                },
            ],
            thresholds: Thresholds {
                moderate: 0.3,
                high: 0.55,
                extreme: 0.8,
            },
            min_factors: 2,
        }
    }

    /// The stock profile for a domain
    pub fn default_for(domain: Domain) -> Self {
        match domain {
            Domain::Fire => Self::fire_default(),
            Domain::Storm => Self::storm_default(),
            Domain::Coastal => Self::coastal_default(),
        }
    }
}

/// Scores one station record for one domain.
///
/// Pure and deterministic: the same record and profile always produce the
/// same assessment. Present factors contribute `curve(value) * weight`,
/// re-normalized over the weights of the factors actually present; the
/// per-factor contributions in the breakdown sum to the score.
pub fn assess(record: &StationRecord, domain: Domain, profile: &DomainProfile) -> RiskAssessment {
    let present: Vec<(&FactorSpec, f64)> = profile
        .factors
        .iter()
        .filter_map(|spec| spec.input.value(&record.measurements).map(|v| (spec, v)))
        .collect();

    let total_weight: f64 = present.iter().map(|(spec, _)| spec.weight).sum();

    if present.len() < profile.min_factors || total_weight <= 0.0 {
        return RiskAssessment {
            station_code: record.station_code.clone(),
            domain,
            outcome: RiskOutcome::InsufficientData,
        };
    }

    let mut factors = BTreeMap::new();
    let mut score = 0.0;
    for (spec, value) in present {
        let contribution = spec.curve.normalize(value) * spec.weight / total_weight;
        score += contribution;
        factors.insert(spec.name.clone(), contribution);
    }

    let level = profile.thresholds.level(score);

    RiskAssessment {
        station_code: record.station_code.clone(),
        domain,
        outcome: RiskOutcome::Scored {
            score,
            level,
            factors,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Measurements;

    fn record_with(measurements: Measurements) -> StationRecord {
        StationRecord {
            station_code: "94608".to_string(),
            name: "Perth Metro".to_string(),
            latitude: Some(-31.92),
            longitude: Some(115.87),
            observed_at: None,
            measurements,
        }
    }

    #[test]
    fn test_empty_record_is_insufficient_for_every_domain() {
        let record = record_with(Measurements::default());
        for domain in Domain::ALL {
            let profile = DomainProfile::default_for(domain);
            let assessment = assess(&record, domain, &profile);
            assert_eq!(
                assessment.outcome,
                RiskOutcome::InsufficientData,
                "empty record should be insufficient for {}",
                domain
            );
        }
    }

    #[test]
    fn test_single_factor_below_minimum_is_insufficient() {
        let record = record_with(Measurements {
            air_temperature: Some(35.0),
            ..Default::default()
        });
        let profile = DomainProfile::fire_default();
        let assessment = assess(&record, Domain::Fire, &profile);
        assert_eq!(assessment.outcome, RiskOutcome::InsufficientData);
    }

    #[test]
    fn test_extreme_fire_conditions_score_extreme() {
        // 42 degrees, 8% humidity, 55 km/h wind is well past the 0.8 cutoff
        let record = record_with(Measurements {
            air_temperature: Some(42.0),
            relative_humidity: Some(8.0),
            wind_speed: Some(55.0),
            ..Default::default()
        });
        let profile = DomainProfile::fire_default();
        let assessment = assess(&record, Domain::Fire, &profile);

        match &assessment.outcome {
            RiskOutcome::Scored { score, level, .. } => {
                assert!(
                    *score > profile.thresholds.extreme,
                    "score {} should exceed extreme threshold {}",
                    score,
                    profile.thresholds.extreme
                );
                assert_eq!(*level, RiskLevel::Extreme);
            }
            RiskOutcome::InsufficientData => panic!("Expected a scored outcome"),
        }
    }

    #[test]
    fn test_coastal_renormalizes_over_present_factors() {
        // Wind and visibility only: no gust, so the swell proxy drops out
        // of both the numerator and the weight denominator.
        let record = record_with(Measurements {
            wind_speed: Some(20.0),
            visibility: Some(2.0),
            ..Default::default()
        });
        let profile = DomainProfile::coastal_default();
        let assessment = assess(&record, Domain::Coastal, &profile);

        match &assessment.outcome {
            RiskOutcome::Scored { score, factors, .. } => {
                assert_eq!(factors.len(), 2);
                assert!(factors.contains_key("wind_speed"));
                assert!(factors.contains_key("visibility"));
                // wind: (20-10)*0.02 = 0.2, vis: (20-2)/19.5 ~= 0.923
                // score = (0.5*0.2 + 0.3*0.923) / 0.8 ~= 0.471
                assert!((score - 0.471).abs() < 0.01, "score was {}", score);
            }
            RiskOutcome::InsufficientData => {
                panic!("wind + visibility meet the coastal minimum-factor floor")
            }
        }
    }

    #[test]
    fn test_contributions_sum_to_score() {
        let record = record_with(Measurements {
            air_temperature: Some(30.0),
            relative_humidity: Some(25.0),
            wind_speed: Some(35.0),
            ..Default::default()
        });
        let profile = DomainProfile::fire_default();
        let assessment = assess(&record, Domain::Fire, &profile);

        match &assessment.outcome {
            RiskOutcome::Scored { score, factors, .. } => {
                let sum: f64 = factors.values().sum();
                assert!((sum - score).abs() < 1e-9);
            }
            RiskOutcome::InsufficientData => panic!("Expected a scored outcome"),
        }
    }

    #[test]
    fn test_level_assignment_is_monotone() {
        let thresholds = Thresholds {
            moderate: 0.3,
            high: 0.55,
            extreme: 0.8,
        };
        let mut previous = RiskLevel::Low;
        for i in 0..=100 {
            let score = i as f64 / 100.0;
            let level = thresholds.level(score);
            assert!(
                level >= previous,
                "level regressed from {:?} to {:?} at score {}",
                previous,
                level,
                score
            );
            previous = level;
        }
    }

    #[test]
    fn test_boundary_scores_round_up() {
        let thresholds = Thresholds {
            moderate: 0.3,
            high: 0.55,
            extreme: 0.8,
        };
        assert_eq!(thresholds.level(0.3), RiskLevel::Moderate);
        assert_eq!(thresholds.level(0.55), RiskLevel::High);
        assert_eq!(thresholds.level(0.8), RiskLevel::Extreme);
        assert_eq!(thresholds.level(0.2999), RiskLevel::Low);
    }

    #[test]
    fn test_assessment_is_deterministic() {
        let record = record_with(Measurements {
            wind_speed: Some(45.0),
            rainfall_since_9am: Some(12.0),
            mean_sea_level_pressure: Some(1002.0),
            ..Default::default()
        });
        let profile = DomainProfile::storm_default();
        let first = assess(&record, Domain::Storm, &profile);
        let second = assess(&record, Domain::Storm, &profile);
        assert_eq!(first, second);
    }

    #[test]
    fn test_linear_above_curve() {
        let curve = Curve::LinearAbove {
            base: 20.0,
            span: 25.0,
        };
        assert_eq!(curve.normalize(15.0), 0.0);
        assert_eq!(curve.normalize(20.0), 0.0);
        assert!((curve.normalize(32.5) - 0.5).abs() < 1e-9);
        assert_eq!(curve.normalize(45.0), 1.0);
        assert_eq!(curve.normalize(60.0), 1.0);
    }

    #[test]
    fn test_inverse_linear_curve() {
        let curve = Curve::InverseLinear {
            zero_at: 60.0,
            full_at: 10.0,
        };
        assert_eq!(curve.normalize(60.0), 0.0);
        assert_eq!(curve.normalize(90.0), 0.0);
        assert!((curve.normalize(35.0) - 0.5).abs() < 1e-9);
        assert_eq!(curve.normalize(10.0), 1.0);
        assert_eq!(curve.normalize(2.0), 1.0);
    }

    #[test]
    fn test_kinked_linear_steepens_above_knee() {
        let curve = Curve::KinkedLinear {
            base: 10.0,
            knee: 40.0,
            rate: 0.02,
            steep_rate: 0.04,
        };
        // Below the knee the slope is 0.02 per km/h
        assert!((curve.normalize(30.0) - 0.4).abs() < 1e-9);
        assert!((curve.normalize(40.0) - 0.6).abs() < 1e-9);
        // Above the knee each km/h is worth twice as much
        assert!((curve.normalize(45.0) - 0.8).abs() < 1e-9);
        assert_eq!(curve.normalize(55.0), 1.0);
    }

    #[test]
    fn test_stepped_curve_picks_highest_step_at_or_below() {
        let curve = Curve::Stepped {
            steps: vec![
                Step { at: 0.0, value: 0.0 },
                Step { at: 2.0, value: 0.25 },
                Step { at: 10.0, value: 0.5 },
                Step { at: 25.0, value: 0.75 },
                Step { at: 50.0, value: 1.0 },
            ],
        };
        assert_eq!(curve.normalize(0.0), 0.0);
        assert_eq!(curve.normalize(1.9), 0.0);
        assert_eq!(curve.normalize(2.0), 0.25);
        assert_eq!(curve.normalize(24.0), 0.5);
        assert_eq!(curve.normalize(120.0), 1.0);
    }

    #[test]
    fn test_drop_below_curve() {
        let curve = Curve::DropBelow {
            reference: 1013.0,
            span: 20.0,
        };
        assert_eq!(curve.normalize(1020.0), 0.0);
        assert_eq!(curve.normalize(1013.0), 0.0);
        assert!((curve.normalize(1003.0) - 0.5).abs() < 1e-9);
        assert_eq!(curve.normalize(990.0), 1.0);
    }

    #[test]
    fn test_profile_serialization_roundtrip() {
        let profile = DomainProfile::storm_default();
        let json = serde_json::to_string(&profile).expect("Failed to serialize profile");
        let back: DomainProfile =
            serde_json::from_str(&json).expect("Failed to deserialize profile");
        assert_eq!(back, profile);
    }
}
