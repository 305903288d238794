use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::domain::{Location, RawRecord};
use crate::error::{PipelineError, Result};

/// Ordered candidate source field names for one canonical metric
#[derive(Debug, Clone, Copy)]
pub struct MetricRule {
    pub canonical: &'static str,
    pub candidates: &'static [&'static str],
}

/// Declarative extraction rules for one source family. Candidates are tried
/// in priority order; an empty list means the canonical field is not part of
/// that source's schema.
#[derive(Debug, Clone, Copy)]
pub struct MappingRuleSet {
    pub date: &'static [&'static str],
    pub title: &'static [&'static str],
    pub location_name: &'static [&'static str],
    pub region: &'static [&'static str],
    pub latitude: &'static [&'static str],
    pub longitude: &'static [&'static str],
    pub actor: &'static [&'static str],
    pub record_id: &'static [&'static str],
    pub metrics: &'static [MetricRule],
}

/// Canonical field set pulled out of one raw record. Carries the resolved /
/// schema field counts so the quality scorer never re-inspects the raw record.
#[derive(Debug, Clone)]
pub struct MappedFields {
    pub date: NaiveDate,
    pub title: Option<String>,
    pub actor: Option<String>,
    pub source_record_id: Option<String>,
    pub location: Location,
    pub metrics: BTreeMap<String, f64>,
    pub resolved_fields: usize,
    pub schema_fields: usize,
    pub raw_excerpt: Option<String>,
}

impl MappedFields {
    pub fn completeness(&self) -> f64 {
        if self.schema_fields == 0 {
            1.0
        } else {
            self.resolved_fields as f64 / self.schema_fields as f64
        }
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

const RAW_EXCERPT_LIMIT: usize = 280;

fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    // Timestamps like "2023-10-07 18:00:00": fall back to the leading ISO date
    if let Some(prefix) = s.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(d);
        }
    }
    None
}

/// Parse a date out of a JSON value. Bare year numbers (yearly indicator
/// series) resolve to January 1st of that year.
pub fn parse_date_value(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => n
            .as_i64()
            .filter(|y| (1900..=2100).contains(y))
            .and_then(|y| NaiveDate::from_ymd_opt(y as i32, 1, 1)),
        _ => None,
    }
}

/// Parse a numeric value from a JSON number or numeric string.
pub fn parse_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
}

fn first_value<'a>(raw: &'a RawRecord, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .find_map(|field| raw.get(field))
        .filter(|v| !v.is_null())
}

fn first_string(raw: &RawRecord, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|field| {
        raw.get(field)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn first_id_string(raw: &RawRecord, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|field| match raw.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn truncate_excerpt(raw: &RawRecord) -> String {
    let mut text = raw.to_string();
    if text.len() > RAW_EXCERPT_LIMIT {
        let mut cut = RAW_EXCERPT_LIMIT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

/// Map one raw record through a rule set. A missing date is the only hard
/// failure; every other field degrades to a default so the record stays
/// ingestible.
pub fn map_record(raw: &RawRecord, rules: &MappingRuleSet) -> Result<MappedFields> {
    // A present-but-garbage candidate does not shadow a later usable one
    let date = rules
        .date
        .iter()
        .filter_map(|field| raw.get(field))
        .find_map(parse_date_value)
        .ok_or_else(|| {
            PipelineError::Mapping(format!(
                "no resolvable date in any of {:?}",
                rules.date
            ))
        })?;

    // Date is part of the schema and, having parsed, always resolved.
    let mut schema_fields = 1usize;
    let mut resolved_fields = 1usize;
    let mut coerced = 0usize;

    let title = first_string(raw, rules.title);
    if !rules.title.is_empty() {
        schema_fields += 1;
        if title.is_some() {
            resolved_fields += 1;
        }
    }

    let actor = first_string(raw, rules.actor);
    if !rules.actor.is_empty() {
        schema_fields += 1;
        if actor.is_some() {
            resolved_fields += 1;
        }
    }

    let location_name = first_string(raw, rules.location_name);
    if !rules.location_name.is_empty() {
        schema_fields += 1;
        if location_name.is_some() {
            resolved_fields += 1;
        }
    }

    let region = first_string(raw, rules.region);
    if !rules.region.is_empty() {
        schema_fields += 1;
        if region.is_some() {
            resolved_fields += 1;
        }
    }

    let coordinates = if rules.latitude.is_empty() {
        None
    } else {
        schema_fields += 1;
        let lat = first_value(raw, rules.latitude).and_then(parse_numeric);
        let lon = first_value(raw, rules.longitude).and_then(parse_numeric);
        match (lat, lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                resolved_fields += 1;
                Some((lat, lon))
            }
            _ => None,
        }
    };

    let admin_levels: Vec<String> = ["admin1", "admin2", "admin3"]
        .iter()
        .filter_map(|field| {
            raw.get(field)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect();

    let mut metrics = BTreeMap::new();
    for rule in rules.metrics {
        schema_fields += 1;
        let value = match first_value(raw, rule.candidates) {
            Some(v) => match parse_numeric(v) {
                // Negative counts and non-finite values are coerced to 0
                Some(parsed) if parsed.is_finite() && parsed >= 0.0 => {
                    resolved_fields += 1;
                    parsed
                }
                _ => {
                    coerced += 1;
                    0.0
                }
            },
            None => 0.0,
        };
        metrics.insert(rule.canonical.to_string(), value);
    }

    let location = match (&location_name, &region) {
        (None, None) => Location {
            coordinates,
            admin_levels,
            ..Location::unknown()
        },
        _ => Location {
            name: location_name.clone().unwrap_or_else(|| "Unknown".to_string()),
            region: region.clone().unwrap_or_else(|| "Unknown".to_string()),
            coordinates,
            admin_levels,
        },
    };

    // Keep a bounded copy of the original when something looked ambiguous
    let raw_excerpt = if coerced > 0 || (!rules.title.is_empty() && title.is_none()) {
        Some(truncate_excerpt(raw))
    } else {
        None
    };

    Ok(MappedFields {
        date,
        title,
        actor,
        source_record_id: first_id_string(raw, rules.record_id),
        location,
        metrics,
        resolved_fields,
        schema_fields,
        raw_excerpt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEST_RULES: MappingRuleSet = MappingRuleSet {
        date: &["date", "report_date", "pubDate"],
        title: &["title", "headline"],
        location_name: &["location", "place"],
        region: &["region", "governorate"],
        latitude: &["latitude", "lat"],
        longitude: &["longitude", "lon"],
        actor: &["actor"],
        record_id: &["event_id"],
        metrics: &[
            MetricRule { canonical: "fatalities", candidates: &["fatalities", "deaths"] },
            MetricRule { canonical: "injuries", candidates: &["injuries", "wounded"] },
        ],
    };

    #[test]
    fn maps_a_complete_record() {
        let raw = json!({
            "event_id": "GAZ100",
            "date": "2023-10-07",
            "title": "Shelling reported",
            "location": "Gaza City",
            "region": "Gaza",
            "latitude": 31.5,
            "longitude": 34.47,
            "actor": "Unknown armed group",
            "fatalities": 5,
            "injuries": 12
        });
        let fields = map_record(&raw, &TEST_RULES).unwrap();
        assert_eq!(fields.date, NaiveDate::from_ymd_opt(2023, 10, 7).unwrap());
        assert_eq!(fields.metrics["fatalities"], 5.0);
        assert_eq!(fields.location.region, "Gaza");
        assert_eq!(fields.source_record_id.as_deref(), Some("GAZ100"));
        assert!((fields.completeness() - 1.0).abs() < f64::EPSILON);
        assert!(fields.raw_excerpt.is_none());
    }

    #[test]
    fn date_candidates_are_tried_in_priority_order() {
        let raw = json!({ "report_date": "10/09/2023", "pubDate": "Mon, 02 Oct 2023 12:00:00 +0000" });
        let fields = map_record(&raw, &TEST_RULES).unwrap();
        // report_date outranks pubDate
        assert_eq!(fields.date, NaiveDate::from_ymd_opt(2023, 10, 9).unwrap());
    }

    #[test]
    fn rfc2822_pub_date_parses() {
        let raw = json!({ "pubDate": "Mon, 02 Oct 2023 12:00:00 +0000" });
        let fields = map_record(&raw, &TEST_RULES).unwrap();
        assert_eq!(fields.date, NaiveDate::from_ymd_opt(2023, 10, 2).unwrap());
    }

    #[test]
    fn missing_date_is_a_mapping_error() {
        let raw = json!({ "title": "No date here", "fatalities": 3 });
        let err = map_record(&raw, &TEST_RULES).unwrap_err();
        assert!(matches!(err, PipelineError::Mapping(_)));
    }

    #[test]
    fn unparseable_metric_is_coerced_to_zero() {
        let raw = json!({ "date": "2023-10-09", "fatalities": "bad" });
        let fields = map_record(&raw, &TEST_RULES).unwrap();
        assert_eq!(fields.metrics["fatalities"], 0.0);
        assert!(fields.completeness() < 1.0);
        assert!(fields.raw_excerpt.is_some());
    }

    #[test]
    fn negative_counts_are_coerced_to_zero() {
        let raw = json!({ "date": "2023-10-09", "fatalities": -4, "injuries": "2,150" });
        let fields = map_record(&raw, &TEST_RULES).unwrap();
        assert_eq!(fields.metrics["fatalities"], 0.0);
        // Thousands separators in numeric strings parse
        assert_eq!(fields.metrics["injuries"], 2150.0);
    }

    #[test]
    fn unresolvable_location_falls_back_to_unknown_region() {
        let raw = json!({ "date": "2023-10-09" });
        let fields = map_record(&raw, &TEST_RULES).unwrap();
        assert_eq!(fields.location.region, "Unknown");
        assert_eq!(fields.location.name, "Unknown");
    }

    #[test]
    fn admin_hierarchy_is_collected_in_order() {
        let raw = json!({ "date": "2023-10-09", "admin1": "Gaza Strip", "admin2": "Khan Younis" });
        let fields = map_record(&raw, &TEST_RULES).unwrap();
        assert_eq!(fields.location.admin_levels, vec!["Gaza Strip", "Khan Younis"]);
    }

    #[test]
    fn bare_year_resolves_to_january_first() {
        let raw = json!({ "date": 2023 });
        let fields = map_record(&raw, &TEST_RULES).unwrap();
        assert_eq!(fields.date, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    }
}
