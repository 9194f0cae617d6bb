//! Orthogonal wavelet filter banks.
//!
//! Only the scaling filter (reconstruction low-pass, PyWavelets `rec_lo`) is
//! stored; the analysis pair is derived from it:
//!
//! ```text
//! dec_lo[k] = h[L-1-k]
//! dec_hi[k] = (-1)^(L-1-k) · h[k]
//! ```
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{PrepError, Result};

const HAAR: [f64; 2] = [std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2];

const DB2: [f64; 4] = [
    0.482_962_913_144_690_25,
    0.836_516_303_737_807_9,
    0.224_143_868_041_857_35,
    -0.129_409_522_550_921_45,
];

const DB3: [f64; 6] = [
    0.332_670_552_950_956_9,
    0.806_891_509_313_338_8,
    0.459_877_502_119_331_3,
    -0.135_011_020_010_390_84,
    -0.085_441_273_882_241_49,
    0.035_226_291_882_100_656,
];

const DB4: [f64; 8] = [
    0.230_377_813_308_855_23,
    0.714_846_570_552_541_5,
    0.630_880_767_929_590_4,
    -0.027_983_769_416_983_85,
    -0.187_034_811_718_881_14,
    0.030_841_381_835_986_965,
    0.032_883_011_666_982_945,
    -0.010_597_401_784_997_278,
];

/// Supported discrete wavelets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wavelet {
    Haar,
    Db2,
    Db3,
    #[default]
    Db4,
}

impl Wavelet {
    pub fn name(self) -> &'static str {
        match self {
            Self::Haar => "haar",
            Self::Db2 => "db2",
            Self::Db3 => "db3",
            Self::Db4 => "db4",
        }
    }

    /// Scaling filter `h` (sums to √2, unit energy).
    pub fn scaling_filter(self) -> &'static [f64] {
        match self {
            Self::Haar => &HAAR,
            Self::Db2 => &DB2,
            Self::Db3 => &DB3,
            Self::Db4 => &DB4,
        }
    }

    pub fn filter_len(self) -> usize {
        self.scaling_filter().len()
    }

    /// Analysis low-pass filter.
    pub fn dec_lo(self) -> Vec<f64> {
        self.scaling_filter().iter().rev().copied().collect()
    }

    /// Analysis high-pass filter (quadrature mirror of `dec_lo`).
    pub fn dec_hi(self) -> Vec<f64> {
        let h = self.scaling_filter();
        let l = h.len();
        h.iter()
            .enumerate()
            .map(|(k, &v)| if (l - 1 - k) % 2 == 0 { v } else { -v })
            .collect()
    }

    /// Deepest useful level for a signal of `len` samples:
    /// the largest `j` with `(L - 1) · 2^j ≤ len`, i.e.
    /// `floor(log2(len / (L - 1)))`, or 0 if the signal is shorter than `L - 1`.
    pub fn max_level(self, len: usize) -> usize {
        let mut reach = self.filter_len() - 1;
        let mut level = 0;
        while let Some(next) = reach.checked_mul(2).filter(|&r| r <= len) {
            reach = next;
            level += 1;
        }
        level
    }
}

impl fmt::Display for Wavelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Wavelet {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "haar" | "db1" => Ok(Self::Haar),
            "db2" => Ok(Self::Db2),
            "db3" => Ok(Self::Db3),
            "db4" => Ok(Self::Db4),
            other => Err(PrepError::configuration(
                "wavelet",
                other,
                "supported wavelets are haar, db2, db3, db4",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Wavelet; 4] = [Wavelet::Haar, Wavelet::Db2, Wavelet::Db3, Wavelet::Db4];

    #[test]
    fn scaling_filters_are_orthonormal() {
        for w in ALL {
            let h = w.scaling_filter();
            let sum: f64 = h.iter().sum();
            let energy: f64 = h.iter().map(|v| v * v).sum();
            approx::assert_abs_diff_eq!(sum, std::f64::consts::SQRT_2, epsilon = 1e-10);
            approx::assert_abs_diff_eq!(energy, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn highpass_has_zero_dc_gain() {
        for w in ALL {
            let s: f64 = w.dec_hi().iter().sum();
            approx::assert_abs_diff_eq!(s, 0.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn db2_analysis_pair_matches_pywavelets() {
        let lo = Wavelet::Db2.dec_lo();
        let hi = Wavelet::Db2.dec_hi();
        approx::assert_abs_diff_eq!(lo[0], -0.129_409_522_550_921_45, epsilon = 1e-15);
        approx::assert_abs_diff_eq!(lo[3], 0.482_962_913_144_690_25, epsilon = 1e-15);
        approx::assert_abs_diff_eq!(hi[0], -0.482_962_913_144_690_25, epsilon = 1e-15);
        approx::assert_abs_diff_eq!(hi[1], 0.836_516_303_737_807_9, epsilon = 1e-15);
        approx::assert_abs_diff_eq!(hi[2], -0.224_143_868_041_857_35, epsilon = 1e-15);
        approx::assert_abs_diff_eq!(hi[3], -0.129_409_522_550_921_45, epsilon = 1e-15);
    }

    #[test]
    fn max_level_matches_log2_rule() {
        assert_eq!(Wavelet::Db2.max_level(50), 4); // floor(log2(50 / 3))
        assert_eq!(Wavelet::Db4.max_level(1000), 7); // floor(log2(1000 / 7))
        assert_eq!(Wavelet::Haar.max_level(1024), 10);
        assert_eq!(Wavelet::Db4.max_level(6), 0);
        assert_eq!(Wavelet::Db4.max_level(0), 0);
    }

    #[test]
    fn parse_names() {
        assert_eq!("DB4".parse::<Wavelet>().unwrap(), Wavelet::Db4);
        assert_eq!("db1".parse::<Wavelet>().unwrap(), Wavelet::Haar);
        assert!("sym5".parse::<Wavelet>().is_err());
    }
}
