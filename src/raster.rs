//! L2: raster utilities — tuple arrays, color histograms, HSV/RGB, gamma,
//! and Floyd-Steinberg error diffusion (spec §3, §4.3).
use std::collections::HashMap;

use log::debug;

/// A single pixel: an ordered sequence of `depth` samples (spec §3
/// "Tuple"). Stored inline up to 4 planes (the common RGBA case) to avoid
/// heap allocation per pixel in the hot histogram path; wider PAM depths
/// spill into `extra`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tuple {
    inline: [u32; 4],
    extra: Vec<u32>,
    depth: u8,
}

impl Tuple {
    pub fn from_slice(samples: &[u32]) -> Self {
        let mut inline = [0u32; 4];
        let n = samples.len().min(4);
        inline[..n].copy_from_slice(&samples[..n]);
        let extra = if samples.len() > 4 { samples[4..].to_vec() } else { Vec::new() };
        Tuple { inline, extra, depth: samples.len() as u8 }
    }

    pub fn as_vec(&self) -> Vec<u32> {
        let n = (self.depth as usize).min(4);
        let mut v = self.inline[..n].to_vec();
        v.extend_from_slice(&self.extra);
        v
    }

    pub fn depth(&self) -> usize {
        self.depth as usize
    }

    pub fn plane(&self, i: usize) -> u32 {
        if i < 4 {
            self.inline[i]
        } else {
            self.extra[i - 4]
        }
    }
}

/// A 2-D array of tuples, row-major (spec §3, and the `Bitmap<P>`
/// container shape this library's teacher uses for heap-allocated images).
#[derive(Clone, Debug)]
pub struct TupleArray {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub samples: Vec<u32>,
}

impl TupleArray {
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        TupleArray { width, height, depth, samples: vec![0; (width * height * depth) as usize] }
    }

    #[inline]
    pub fn row_offset(&self, y: u32) -> usize {
        (y * self.width * self.depth) as usize
    }

    pub fn row(&self, y: u32) -> &[u32] {
        let off = self.row_offset(y);
        &self.samples[off..off + (self.width * self.depth) as usize]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u32] {
        let off = self.row_offset(y);
        let len = (self.width * self.depth) as usize;
        &mut self.samples[off..off + len]
    }

    pub fn tuple(&self, x: u32, y: u32) -> &[u32] {
        let off = self.row_offset(y) + (x * self.depth) as usize;
        &self.samples[off..off + self.depth as usize]
    }

    pub fn set_tuple(&mut self, x: u32, y: u32, values: &[u32]) {
        let off = self.row_offset(y) + (x * self.depth) as usize;
        self.samples[off..off + self.depth as usize].copy_from_slice(values);
    }
}

/// A color histogram: tuple value -> insertion-order index, with a
/// parallel (tuple, count) table (spec §3 "Color histogram", §4.3
/// "Histogram").
///
/// Implemented as a chained hash keyed by a fixed linear combination of the
/// red/green/blue (first three) samples, exactly as spec §3 describes:
/// each bucket holds the indices of every tuple sharing that key, and a
/// full-tuple comparison resolves collisions within the bucket.
#[derive(Default)]
pub struct ColorHist {
    buckets: HashMap<u64, Vec<usize>>,
    entries: Vec<(Tuple, u64)>,
}

fn hash_key(tuple: &[u32]) -> u64 {
    let r = u64::from(*tuple.first().unwrap_or(&0));
    let g = u64::from(*tuple.get(1).unwrap_or(&0));
    let b = u64::from(*tuple.get(2).unwrap_or(&0));
    r.wrapping_mul(67_108_859).wrapping_add(g.wrapping_mul(8191)).wrapping_add(b)
}

impl ColorHist {
    pub fn new() -> Self {
        ColorHist::default()
    }

    /// Inserts a tuple, incrementing its count; returns its stable index.
    pub fn add(&mut self, tuple: &[u32]) -> usize {
        let key = hash_key(tuple);
        let bucket = self.buckets.entry(key).or_default();
        for &idx in bucket.iter() {
            if self.entries[idx].0.as_vec() == tuple {
                self.entries[idx].1 += 1;
                return idx;
            }
        }
        let idx = self.entries.len();
        self.entries.push((Tuple::from_slice(tuple), 1));
        bucket.push(idx);
        idx
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(Tuple, u64)] {
        &self.entries
    }

    /// Builds a histogram from an entire raster (spec's "table-building
    /// routine"). The invariant `sum(counts) == width*height` follows
    /// directly from one `add` call per pixel.
    pub fn build(image: &TupleArray) -> Self {
        let mut hist = ColorHist::new();
        for y in 0..image.height {
            for x in 0..image.width {
                hist.add(image.tuple(x, y));
            }
        }
        debug!("built histogram: {} distinct colors from {}x{} image", hist.len(), image.width, image.height);
        hist
    }
}

/// Converts HSV (each component in `[0.0, 1.0]`, hue wrapping) to RGB
/// samples scaled to `maxval`.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64, maxval: u16) -> [u32; 3] {
    let maxval = f64::from(maxval);
    if s <= 0.0 {
        let g = (v * maxval).round() as u32;
        return [g, g, g];
    }
    let h = (h.rem_euclid(1.0)) * 6.0;
    let i = h.floor() as i32;
    let f = h - h.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match i.rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    [
        (r * maxval).round() as u32,
        (g * maxval).round() as u32,
        (b * maxval).round() as u32,
    ]
}

/// Converts RGB samples (scaled to `maxval`) to HSV, each component in
/// `[0.0, 1.0]`.
pub fn rgb_to_hsv(rgb: [u32; 3], maxval: u16) -> (f64, f64, f64) {
    let maxval = f64::from(maxval);
    let [r, g, b] = rgb.map(|s| f64::from(s) / maxval);
    let cmax = r.max(g).max(b);
    let cmin = r.min(g).min(b);
    let delta = cmax - cmin;

    let h = if delta == 0.0 {
        0.0
    } else if cmax == r {
        (((g - b) / delta).rem_euclid(6.0)) / 6.0
    } else if cmax == g {
        (((b - r) / delta) + 2.0) / 6.0
    } else {
        (((r - g) / delta) + 4.0) / 6.0
    };

    let s = if cmax == 0.0 { 0.0 } else { delta / cmax };
    (h, s, cmax)
}

/// Standard gamma correction: `out = in ^ (1 / gamma)` for normalized
/// samples in `[0.0, 1.0]`.
pub fn gamma_correct(sample: f64, gamma: f64) -> f64 {
    sample.clamp(0.0, 1.0).powf(1.0 / gamma)
}

/// A pluggable lookup from sample value to nearest palette index, used by
/// dithering/quantization consumers.
pub trait PaletteLookup {
    fn nearest(&self, tuple: &[u32]) -> usize;
}

/// Simple linear-scan nearest-color palette, adequate for the palette
/// sizes this library deals with (spec caps most palettes at 1024).
pub struct LinearPalette {
    pub colors: Vec<Vec<u32>>,
}

impl PaletteLookup for LinearPalette {
    fn nearest(&self, tuple: &[u32]) -> usize {
        self.colors
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| {
                c.iter().zip(tuple).map(|(&a, &b)| {
                    let d = a as i64 - b as i64;
                    d * d
                }).sum::<i64>()
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

/// Floyd-Steinberg error-diffusion state: one plane's worth of pending
/// error, propagated right/down-left/down/down-right by 7/16, 3/16,
/// 5/16, 1/16 (spec L2 "Floyd-Steinberg error-diffusion state machine").
pub struct FloydSteinberg {
    width: usize,
    /// Error carried into the current row (indexed by column).
    this_row_err: Vec<f64>,
    /// Error being accumulated for the next row.
    next_row_err: Vec<f64>,
}

impl FloydSteinberg {
    pub fn new(width: usize) -> Self {
        FloydSteinberg { width, this_row_err: vec![0.0; width], next_row_err: vec![0.0; width] }
    }

    /// Starts a new output row; call once per row before `plan`.
    pub fn start_row(&mut self) {
        self.this_row_err = std::mem::replace(&mut self.next_row_err, vec![0.0; self.width]);
    }

    /// Given the ideal sample `value` at column `x` and the palette-lookup
    /// quantization function `quantize`, returns the quantized sample and
    /// propagates the residual error to the neighboring cells.
    pub fn plan(&mut self, x: usize, value: f64, quantize: impl Fn(f64) -> f64) -> f64 {
        let adjusted = value + self.this_row_err[x];
        let chosen = quantize(adjusted);
        let error = adjusted - chosen;

        if x + 1 < self.width {
            self.this_row_err[x + 1] += error * 7.0 / 16.0;
        }
        if x > 0 {
            self.next_row_err[x - 1] += error * 3.0 / 16.0;
        }
        self.next_row_err[x] += error * 5.0 / 16.0;
        if x + 1 < self.width {
            self.next_row_err[x + 1] += error * 1.0 / 16.0;
        }

        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_count_sums_to_pixel_count() {
        let mut image = TupleArray::new(2, 2, 1);
        image.set_tuple(0, 0, &[1]);
        image.set_tuple(1, 0, &[1]);
        image.set_tuple(0, 1, &[2]);
        image.set_tuple(1, 1, &[1]);

        let hist = ColorHist::build(&image);
        let total: u64 = hist.entries().iter().map(|(_, c)| c).sum();
        assert_eq!(total, 4);
        assert_eq!(hist.len(), 2);
    }

    #[test]
    fn hsv_round_trips_rgb() {
        let rgb = [255, 0, 0];
        let (h, s, v) = rgb_to_hsv(rgb, 255);
        let back = hsv_to_rgb(h, s, v, 255);
        assert_eq!(back, rgb);
    }

    #[test]
    fn gamma_identity_at_one() {
        assert!((gamma_correct(0.5, 1.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn floyd_steinberg_distributes_error_to_neighbors() {
        let mut fs = FloydSteinberg::new(3);
        fs.start_row();
        let quantize = |v: f64| if v >= 0.5 { 1.0 } else { 0.0 };
        let out0 = fs.plan(0, 0.6, quantize);
        assert_eq!(out0, 1.0);
        // Some of the 0.1 residual should have propagated forward.
        assert!(fs.this_row_err[1] > 0.0);
    }
}
