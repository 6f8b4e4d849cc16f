use std::fmt;

/// Geographic rectangle a harvest searches within
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// Builds a box from four bounds in the order [latMin, latMax, lonMin, lonMax]
    ///
    /// This is the order the geocoding service uses for its string-encoded
    /// `boundingbox` field. Returns `None` unless exactly four numbers parse.
    pub fn from_bounds<S: AsRef<str>>(bounds: &[S]) -> Option<Self> {
        if bounds.len() != 4 {
            return None;
        }

        let mut parsed = [0.0f64; 4];
        for (slot, raw) in parsed.iter_mut().zip(bounds) {
            let value: f64 = raw.as_ref().trim().parse().ok()?;
            if !value.is_finite() {
                return None;
            }
            *slot = value;
        }

        Some(Self::new(parsed[0], parsed[1], parsed[2], parsed[3]))
    }

    /// Bounds as strings in the order [latMin, latMax, lonMin, lonMax]
    pub fn to_bounds(&self) -> [String; 4] {
        [
            self.lat_min.to_string(),
            self.lat_max.to_string(),
            self.lon_min.to_string(),
            self.lon_max.to_string(),
        ]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.lat_min, self.lat_max, self.lon_min, self.lon_max
        )
    }
}
