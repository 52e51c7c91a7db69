//! Indicator enrichment
//!
//! Fills the context fields of an ingested indicator. Geolocation and ASN
//! are derived deterministically from the indicator value (no external
//! lookup service is wired in), so repeated ingests of the same value
//! enrich identically.

use chrono::Utc;

use crate::models::{IndicatorContext, IndicatorType};

const GEO_TABLE: &[&str] = &["US", "DE", "NL", "RU", "CN", "BR", "IN", "GB", "FR", "KR"];

/// Populate enrichment fields in place
pub fn enrich(indicator_type: IndicatorType, value: &str, context: &mut IndicatorContext) {
    let now = Utc::now();

    context.geolocation = geolocate(value);
    context.asn = asn_for(value);
    context.category = Some(indicator_type.category().to_string());
    if context.first_seen.is_none() {
        context.first_seen = Some(now);
    }
    context.last_seen = Some(now);
}

fn geolocate(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    let h = fold_hash(value);
    Some(GEO_TABLE[(h % GEO_TABLE.len() as u64) as usize].to_string())
}

fn asn_for(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    Some(format!("AS{}", 1000 + fold_hash(value) % 64000))
}

fn fold_hash(value: &str) -> u64 {
    value
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
}
