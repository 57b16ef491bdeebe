//! Discrete diverging colour map for normalised errors.

/// ColorBrewer RdYlBu anchors, reversed so blue is low error and red high.
const RD_YL_BU_R: [[u8; 3]; 11] = [
    [0x31, 0x36, 0x95],
    [0x45, 0x75, 0xb4],
    [0x74, 0xad, 0xd1],
    [0xab, 0xd9, 0xe9],
    [0xe0, 0xf3, 0xf8],
    [0xff, 0xff, 0xbf],
    [0xfe, 0xe0, 0x90],
    [0xfd, 0xae, 0x61],
    [0xf4, 0x6d, 0x43],
    [0xd7, 0x30, 0x27],
    [0xa5, 0x00, 0x26],
];

pub const MISSING_COLOR: [u8; 3] = [0x80, 0x80, 0x80];

/// Colour bar bounds of the portrait plots: -0.5 to 0.5 in steps of 0.1.
pub fn default_bounds() -> Vec<f64> {
    (-5..=5).map(|i| f64::from(i) / 10.0).collect()
}

/// Samples the continuous colour map at `t` in `[0, 1]`.
pub fn rd_yl_bu_r(t: f64) -> [u8; 3] {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let pos = t * (RD_YL_BU_R.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(RD_YL_BU_R.len() - 1);
    let frac = pos - lo as f64;

    let mut rgb = [0u8; 3];
    for (c, out) in rgb.iter_mut().enumerate() {
        let a = f64::from(RD_YL_BU_R[lo][c]);
        let b = f64::from(RD_YL_BU_R[hi][c]);
        *out = (a + (b - a) * frac).round() as u8;
    }
    rgb
}

/// A colour map binned on fixed bounds, with one extra bin below the first
/// bound and one above the last.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteColormap {
    bounds: Vec<f64>,
    /// `bounds.len() + 1` colours: under, one per interval, over.
    colors: Vec<[u8; 3]>,
    missing: [u8; 3],
}

impl DiscreteColormap {
    /// Bins `rd_yl_bu_r` on `bounds`, extended at both ends. Needs at least
    /// two bounds.
    pub fn extended(bounds: Vec<f64>) -> Self {
        let nbins = bounds.len() + 1;
        let colors = (0..nbins)
            .map(|i| rd_yl_bu_r(i as f64 / (nbins - 1).max(1) as f64))
            .collect();
        DiscreteColormap {
            bounds,
            colors,
            missing: MISSING_COLOR,
        }
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    /// Index into `colors()` of the bin holding `value`. Intervals are
    /// closed below; NaN has no bin.
    pub fn bin(&self, value: f64) -> Option<usize> {
        if value.is_nan() {
            return None;
        }
        Some(self.bounds.iter().take_while(|b| value >= **b).count())
    }

    pub fn color(&self, value: f64) -> [u8; 3] {
        match self.bin(value) {
            Some(i) => self.colors[i],
            None => self.missing,
        }
    }
}

impl Default for DiscreteColormap {
    fn default() -> Self {
        DiscreteColormap::extended(default_bounds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_match_anchors() {
        assert_eq!(rd_yl_bu_r(0.0), [0x31, 0x36, 0x95]);
        assert_eq!(rd_yl_bu_r(1.0), [0xa5, 0x00, 0x26]);
        assert_eq!(rd_yl_bu_r(0.5), [0xff, 0xff, 0xbf]);
    }

    #[test]
    fn test_default_map_has_twelve_bins() {
        let cmap = DiscreteColormap::default();
        assert_eq!(cmap.bounds().len(), 11);
        assert_eq!(cmap.colors().len(), 12);
    }

    #[test]
    fn test_binning_is_extended_both_ends() {
        let cmap = DiscreteColormap::default();
        assert_eq!(cmap.bin(-3.0), Some(0));
        assert_eq!(cmap.bin(-0.5), Some(1));
        assert_eq!(cmap.bin(0.05), Some(6));
        assert_eq!(cmap.bin(0.5), Some(11));
        assert_eq!(cmap.bin(9.0), Some(11));
        assert_eq!(cmap.bin(f64::NAN), None);
        assert_eq!(cmap.color(f64::NAN), MISSING_COLOR);
    }
}
