/*!
 * Pacing rules: how many scenes and shots a video gets, and how the total
 * duration is split between them.
 *
 * Pacing is a 0-100 scalar. Lower values mean fewer, longer units; higher
 * values mean more, shorter ones.
 */

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Coarse pacing category derived from the 0-100 scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingCategory {
    Slow,
    Medium,
    Fast,
}

impl PacingCategory {
    pub fn from_pacing(pacing: u8) -> Self {
        match pacing {
            0..=33 => Self::Slow,
            34..=66 => Self::Medium,
            _ => Self::Fast,
        }
    }

    /// Allowed scene length range in seconds
    pub fn scene_length_range(&self) -> (f64, f64) {
        match self {
            Self::Slow => (30.0, 60.0),
            Self::Medium => (15.0, 30.0),
            Self::Fast => (6.0, 15.0),
        }
    }

    /// Allowed shot length range in seconds
    pub fn shot_length_range(&self) -> (f64, f64) {
        match self {
            Self::Slow => (4.0, 10.0),
            Self::Medium => (3.0, 6.0),
            Self::Fast => (1.5, 4.0),
        }
    }
}

/// Inclusive count bounds plus the preferred count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountBounds {
    pub min: u32,
    pub max: u32,
    pub target: u32,
}

impl CountBounds {
    fn exact(n: u32) -> Self {
        let n = n.max(1);
        Self {
            min: n,
            max: n,
            target: n,
        }
    }

    fn from_lengths(total: f64, (min_len, max_len): (f64, f64)) -> Self {
        let min = ((total / max_len).ceil() as u32).max(1);
        let max = ((total / min_len).floor() as u32).max(min);
        let mean = (min_len + max_len) / 2.0;
        let target = ((total / mean).round() as u32).clamp(min, max);
        Self { min, max, target }
    }

    pub fn contains(&self, n: u32) -> bool {
        (self.min..=self.max).contains(&n)
    }
}

/// Scene count bounds for a video of `total_seconds`
pub fn scene_bounds(total_seconds: f64, pacing: u8, explicit: Option<u32>) -> CountBounds {
    match explicit {
        Some(n) => CountBounds::exact(n),
        None => CountBounds::from_lengths(
            total_seconds,
            PacingCategory::from_pacing(pacing).scene_length_range(),
        ),
    }
}

/// Shot count bounds for a scene of `scene_seconds`
pub fn shot_bounds(scene_seconds: f64, pacing: u8, explicit: Option<u32>) -> CountBounds {
    match explicit {
        Some(n) => CountBounds::exact(n),
        None => CountBounds::from_lengths(
            scene_seconds,
            PacingCategory::from_pacing(pacing).shot_length_range(),
        ),
    }
}

/// Split `total_seconds` (whole seconds) across scenes in proportion to the
/// proposed durations. Every scene gets at least one second when possible and
/// the result always sums to exactly `total_seconds`.
pub fn normalize_whole_seconds(proposed: &[f64], total_seconds: u32) -> Vec<f64> {
    distribute(proposed, u64::from(total_seconds))
        .into_iter()
        .map(|units| units as f64)
        .collect()
}

/// Split `total_seconds` across shots at a resolution of a tenth of a second.
pub fn normalize_tenths(proposed: &[f64], total_seconds: f64) -> Vec<f64> {
    let total_units = (total_seconds * 10.0).round().max(0.0) as u64;
    distribute(proposed, total_units)
        .into_iter()
        .map(|units| units as f64 / 10.0)
        .collect()
}

/// Largest-remainder apportionment of `total_units` by `weights`
fn distribute(weights: &[f64], total_units: u64) -> Vec<u64> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }

    let floor_each = if total_units >= n as u64 { 1 } else { 0 };
    let remaining = total_units - floor_each * n as u64;

    let cleaned: Vec<f64> = weights
        .iter()
        .map(|w| if w.is_finite() && *w > 0.0 { *w } else { 0.0 })
        .collect();
    let sum: f64 = cleaned.iter().sum();

    let shares: Vec<f64> = if sum > 0.0 {
        cleaned
            .iter()
            .map(|w| w / sum * remaining as f64)
            .collect()
    } else {
        vec![remaining as f64 / n as f64; n]
    };

    let mut units: Vec<u64> = shares.iter().map(|s| s.floor() as u64).collect();
    let assigned: u64 = units.iter().sum();
    let mut leftover = remaining.saturating_sub(assigned);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        let ra = shares[a] - shares[a].floor();
        let rb = shares[b] - shares[b].floor();
        rb.partial_cmp(&ra).unwrap_or(Ordering::Equal).then(a.cmp(&b))
    });

    for idx in order.into_iter().cycle() {
        if leftover == 0 {
            break;
        }
        units[idx] += 1;
        leftover -= 1;
    }

    units.into_iter().map(|u| u + floor_each).collect()
}
