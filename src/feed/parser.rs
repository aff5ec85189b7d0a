//! Schema-tolerant parsing of bureau XML feeds
//!
//! The bureau's observation feed nests per-station data as
//! `<product><observations><station><period><level><element …>`, with
//! measurement values in element text. The forecast feed carries
//! `<forecast><area type="location"><forecast-period><element …>`.
//!
//! Parsing is deliberately forgiving: missing optional elements become
//! absent fields, unparseable or implausible numeric text drops the single
//! field while keeping the record, duplicate stations resolve last-wins in
//! first-occurrence order, and unknown elements are ignored. Only an
//! undecodable document or a missing top-level container is an error.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use xmltree::{Element, XMLNode};

use crate::model::{ForecastRecord, Measurements, StationRecord};

use super::RawDocument;

/// Errors that can occur when decoding a feed document
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not well-formed XML
    #[error("feed document is not well-formed XML: {0}")]
    Malformed(String),

    /// The expected top-level container element is absent
    #[error("feed document is missing the expected <{0}> container")]
    MissingContainer(&'static str),
}

// Plausibility ranges for observation measurements. Values outside these
// are sensor glitches and drop the single field, not the record.
const TEMPERATURE_RANGE: (f64, f64) = (-60.0, 65.0);
const HUMIDITY_RANGE: (f64, f64) = (0.0, 100.0);
const WIND_RANGE: (f64, f64) = (0.0, 400.0);
const GUST_RANGE: (f64, f64) = (0.0, 450.0);
const RAINFALL_RANGE: (f64, f64) = (0.0, 1000.0);
const PRESSURE_RANGE: (f64, f64) = (850.0, 1100.0);
const VISIBILITY_RANGE: (f64, f64) = (0.0, 200.0);
const PERCENT_RANGE: (f64, f64) = (0.0, 100.0);

/// Parses the observation feed into station records.
///
/// Deterministic: re-parsing the same raw document yields an identical
/// sequence. Fails only when the body is not XML or the `<observations>`
/// container is missing; everything else degrades per-field.
pub fn parse_observations(document: &RawDocument) -> Result<Vec<StationRecord>, ParseError> {
    let root = Element::parse(document.body.as_bytes())
        .map_err(|e| ParseError::Malformed(e.to_string()))?;
    let container =
        find_descendant(&root, "observations").ok_or(ParseError::MissingContainer("observations"))?;

    let mut records: Vec<StationRecord> = Vec::new();
    let mut index_by_code: HashMap<String, usize> = HashMap::new();

    for station in child_elements(container, "station") {
        let Some(record) = parse_station(station) else {
            continue;
        };

        // Duplicate station entries resolve last-wins while keeping the
        // position of the first occurrence.
        match index_by_code.get(&record.station_code) {
            Some(&i) => records[i] = record,
            None => {
                index_by_code.insert(record.station_code.clone(), records.len());
                records.push(record);
            }
        }
    }

    Ok(records)
}

/// Parses one `<station>` element. Returns `None` when the station has no
/// observation period at all (nothing to record).
fn parse_station(station: &Element) -> Option<StationRecord> {
    let station_code = attr(station, "bom-id").unwrap_or_else(|| "unknown".to_string());
    let name = attr(station, "stn-name").unwrap_or_else(|| "Unknown".to_string());
    let latitude = attr(station, "lat").and_then(|v| v.parse::<f64>().ok());
    let longitude = attr(station, "lon").and_then(|v| v.parse::<f64>().ok());

    let period = child_elements(station, "period").next()?;
    let observed_at = attr(period, "time-utc")
        .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
        .map(|t| t.with_timezone(&Utc));

    let mut measurements = Measurements::default();
    if let Some(level) = child_elements(period, "level").next() {
        for element in child_elements(level, "element") {
            let kind = attr(element, "type").unwrap_or_default();
            let text = element_text(element);
            match kind.as_str() {
                "air_temperature" => {
                    measurements.air_temperature = numeric_in(&text, TEMPERATURE_RANGE)
                }
                "rel-humidity" => measurements.relative_humidity = numeric_in(&text, HUMIDITY_RANGE),
                "wind_spd_kmh" => measurements.wind_speed = numeric_in(&text, WIND_RANGE),
                "gust_kmh" => measurements.wind_gust = numeric_in(&text, GUST_RANGE),
                "wind_dir" => {
                    let dir = text.trim();
                    if !dir.is_empty() {
                        measurements.wind_direction = Some(dir.to_string());
                    }
                }
                "rainfall" => measurements.rainfall_since_9am = numeric_in(&text, RAINFALL_RANGE),
                "msl_pres" => {
                    measurements.mean_sea_level_pressure = numeric_in(&text, PRESSURE_RANGE)
                }
                "vis_km" => measurements.visibility = numeric_in(&text, VISIBILITY_RANGE),
                // Feeds carry many element types the pipeline does not use
                _ => {}
            }
        }
    }

    Some(StationRecord {
        station_code,
        name,
        latitude,
        longitude,
        observed_at,
        measurements,
    })
}

/// Parses the town forecast feed.
///
/// Only `location`-type areas (towns) are kept; district aggregates are
/// skipped. All forecast periods are extracted and the result is sorted by
/// locality then period index.
pub fn parse_forecasts(document: &RawDocument) -> Result<Vec<ForecastRecord>, ParseError> {
    let root = Element::parse(document.body.as_bytes())
        .map_err(|e| ParseError::Malformed(e.to_string()))?;
    let container =
        find_descendant(&root, "forecast").ok_or(ParseError::MissingContainer("forecast"))?;

    let mut records = Vec::new();

    for area in child_elements(container, "area") {
        if attr(area, "type").as_deref() != Some("location") {
            continue;
        }
        let locality = attr(area, "description").unwrap_or_else(|| "Unknown".to_string());
        let area_code = attr(area, "aac").unwrap_or_else(|| "unknown".to_string());

        for period in child_elements(area, "forecast-period") {
            let period_index = attr(period, "index").and_then(|v| v.parse::<u32>().ok());
            let start_time = attr(period, "start-time-local");

            let mut record = ForecastRecord {
                locality: locality.clone(),
                area_code: area_code.clone(),
                period_index,
                start_time,
                min_temp: None,
                max_temp: None,
                rain_probability: None,
                precis: None,
                icon_code: None,
            };

            for element in child_elements(period, "element") {
                let kind = attr(element, "type").unwrap_or_default();
                let text = element_text(element);
                match kind.as_str() {
                    "air_temperature_minimum" => {
                        record.min_temp = numeric_in(&text, TEMPERATURE_RANGE)
                    }
                    "air_temperature_maximum" => {
                        record.max_temp = numeric_in(&text, TEMPERATURE_RANGE)
                    }
                    "probability_of_precipitation" => {
                        // The feed writes probabilities as e.g. "30%"
                        record.rain_probability =
                            numeric_in(text.trim().trim_end_matches('%'), PERCENT_RANGE)
                    }
                    "forecast_icon_code" => {
                        record.icon_code = text.trim().parse::<u32>().ok();
                    }
                    _ => {}
                }
            }

            record.precis = child_elements(period, "text")
                .find(|t| attr(t, "type").as_deref() == Some("precis"))
                .map(element_text)
                .filter(|t| !t.is_empty());

            records.push(record);
        }
    }

    records.sort_by(|a, b| {
        (a.locality.as_str(), a.period_index.unwrap_or(u32::MAX))
            .cmp(&(b.locality.as_str(), b.period_index.unwrap_or(u32::MAX)))
    });

    Ok(records)
}

/// Depth-first search for the first descendant element with the given name
fn find_descendant<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    if element.name == name {
        return Some(element);
    }
    for child in &element.children {
        if let XMLNode::Element(e) = child {
            if let Some(found) = find_descendant(e, name) {
                return Some(found);
            }
        }
    }
    None
}

/// Direct child elements with the given name, in document order
fn child_elements<'a>(element: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    element.children.iter().filter_map(move |node| match node {
        XMLNode::Element(e) if e.name == name => Some(e),
        _ => None,
    })
}

fn attr(element: &Element, name: &str) -> Option<String> {
    element.attributes.get(name).cloned()
}

fn element_text(element: &Element) -> String {
    element
        .get_text()
        .map(|t| t.into_owned())
        .unwrap_or_default()
}

/// Parses numeric text, dropping values outside the plausible range.
/// Empty, garbage, or out-of-range text all map to `None`.
fn numeric_in(text: &str, (min, max): (f64, f64)) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    (min..=max).contains(&value).then_some(value)
}
