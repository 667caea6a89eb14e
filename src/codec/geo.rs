//! Point geography and the cell covering used by geo indexes.
//!
//! A point is indexed once per covering level. Each cell id packs the level
//! into the top byte and the Morton interleave of the quantised longitude
//! and latitude into the low 56 bits, so cells of one level sort together
//! and neighbouring points share long id prefixes.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{LookupError, Result};

/// Levels a point is indexed at, coarsest first.
pub const COVER_LEVELS: [u8; 3] = [8, 16, 24];
/// Encoded width of a cell id inside an index key.
pub const CELL_ID_LEN: usize = 8;

const MAX_LEVEL: u8 = 28;

/// A WGS84-style point; longitude first.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees, `[-180, 180]`.
    pub lng: f64,
    /// Latitude in degrees, `[-90, 90]`.
    pub lat: f64,
}

impl GeoPoint {
    /// Builds a point, rejecting coordinates outside the valid range.
    pub fn new(lng: f64, lat: f64) -> Result<Self> {
        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return Err(LookupError::InvalidFieldValue(format!(
                "point ({lng}, {lat}) out of range"
            )));
        }
        Ok(Self { lng, lat })
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POINT({} {})", self.lng, self.lat)
    }
}

/// Returns the id of the cell containing `point` at `level`.
pub fn cell_id(point: &GeoPoint, level: u8) -> u64 {
    assert!(level > 0 && level <= MAX_LEVEL, "cell level {level} out of range");
    let x = quantise(point.lng, -180.0, 360.0, level);
    let y = quantise(point.lat, -90.0, 180.0, level);
    ((level as u64) << 56) | interleave(x, y)
}

/// Returns the first and last cell ids of `level`, for scanning a whole level.
pub fn level_bounds(level: u8) -> (u64, u64) {
    assert!(level > 0 && level <= MAX_LEVEL, "cell level {level} out of range");
    let base = (level as u64) << 56;
    let span = 1u64 << (2 * level as u32);
    (base, base + span - 1)
}

/// Cell ids a point is indexed under, one per [`COVER_LEVELS`] entry.
pub fn covering(point: &GeoPoint) -> SmallVec<[u64; 4]> {
    COVER_LEVELS.iter().map(|level| cell_id(point, *level)).collect()
}

/// Key bytes of a cell id.
pub fn cell_key(id: u64) -> [u8; CELL_ID_LEN] {
    id.to_be_bytes()
}

fn quantise(v: f64, min: f64, span: f64, level: u8) -> u32 {
    let cells = 1u64 << level;
    let scaled = ((v - min) / span * cells as f64).floor();
    (scaled.max(0.0) as u64).min(cells - 1) as u32
}

fn interleave(x: u32, y: u32) -> u64 {
    let mut out = 0u64;
    for bit in 0..32 {
        out |= (((x >> bit) & 1) as u64) << (2 * bit + 1);
        out |= (((y >> bit) & 1) as u64) << (2 * bit);
    }
    out
}
