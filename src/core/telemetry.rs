//! Normalizes raw GPU telemetry samples into `{total, free}`.
//!
//! This is the only place in the engine that looks at raw payload shape.
//! It never fails: anything it cannot read becomes 0.

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::domain::{GpuCapacity, GpuTelemetrySample, RawValue};

lazy_static! {
    // "<free> of <total>", left number is free
    static ref FREE_OF_TOTAL: Regex =
        Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*of\s*(-?\d+(?:\.\d+)?)").expect("valid regex");
}

pub fn parse_sample(sample: &GpuTelemetrySample) -> GpuCapacity {
    let from_utilization = sample.utilization.as_ref().and_then(parse_utilization);

    let total = sample
        .total
        .as_ref()
        .and_then(numeric)
        .or(from_utilization.map(|(_, total)| total))
        .unwrap_or(0.0);
    let free = sample
        .free
        .as_ref()
        .and_then(numeric)
        .or(from_utilization.map(|(free, _)| free))
        .unwrap_or(0.0);

    let total = clamp_count(total);
    GpuCapacity {
        total,
        free: clamp_count(free).min(total),
    }
}

/// Sum of all samples reported for one node.
pub fn parse_node(samples: &[GpuTelemetrySample]) -> GpuCapacity {
    samples.iter().map(parse_sample).sum()
}

fn numeric(value: &RawValue) -> Option<f64> {
    match value {
        RawValue::Number(n) if n.is_finite() => Some(*n),
        RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        RawValue::Number(_) | RawValue::Other(_) => None,
    }
}

/// Returns `(free, total)`.
fn parse_utilization(value: &RawValue) -> Option<(f64, f64)> {
    let RawValue::Text(text) = value else {
        return None;
    };
    let caps = FREE_OF_TOTAL.captures(text)?;
    let free = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let total = caps.get(2)?.as_str().parse::<f64>().ok()?;
    Some((free, total))
}

fn clamp_count(n: f64) -> u32 {
    if n.is_nan() || n <= 0.0 {
        0
    } else if n >= u32::MAX as f64 {
        u32::MAX
    } else {
        n.floor() as u32
    }
}
