//! L8: per-pixel arithmetic, bitwise, and multi-image blend operations
//! (spec §4.7), grounded on `original_source/editor/pamarith.c` for the
//! operation table and `original_source/editor/pammasksum.c`-style
//! weighted blending.
use crate::error::{NetpbmError, NetpbmResult};
use crate::rand::RandSt;

/// Dyadic and comparison operations (spec "Operations").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DyadicOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Difference,
    Minimum,
    Maximum,
    Mean,
    Equal,
    Compare,
    And,
    Or,
    Nand,
    Nor,
    Xor,
    ShiftLeft,
    ShiftRight,
}

impl DyadicOp {
    fn is_bitwise(self) -> bool {
        matches!(self, DyadicOp::And | DyadicOp::Or | DyadicOp::Nand | DyadicOp::Nor | DyadicOp::Xor | DyadicOp::ShiftLeft | DyadicOp::ShiftRight)
    }

    /// Output maxval for this op: comparison/equality have their own
    /// natural maxval, the rest inherit the operand maxval (spec
    /// "Arithmetic").
    fn result_maxval(self, operand_maxval: u16) -> u16 {
        match self {
            DyadicOp::Equal => 1,
            DyadicOp::Compare => 2,
            _ => operand_maxval,
        }
    }
}

const CLOSENESS_EPSILON: f64 = 1e-6;

fn is_pow2_minus_one(maxval: u16) -> bool {
    maxval != 0 && (u32::from(maxval) + 1).is_power_of_two()
}

/// Applies a dyadic op to one pair of samples, both already normalized to
/// `[0, maxval]` with equal `maxval` (bitwise ops) or each its own
/// (arithmetic ops, pre-saturated to a common `maxval` by the caller).
fn apply(op: DyadicOp, a: u32, b: u32, maxval: u32) -> NetpbmResult<u32> {
    Ok(match op {
        DyadicOp::Add => a.saturating_add(b).min(maxval),
        DyadicOp::Subtract => a.saturating_sub(b),
        DyadicOp::Multiply => {
            let product = f64::from(a) * f64::from(b) / f64::from(maxval);
            product.round() as u32
        }
        DyadicOp::Divide => {
            if b == 0 {
                maxval
            } else {
                ((f64::from(a) / f64::from(b)).round() as u32).min(maxval)
            }
        }
        DyadicOp::Difference => a.abs_diff(b),
        DyadicOp::Minimum => a.min(b),
        DyadicOp::Maximum => a.max(b),
        DyadicOp::Mean => (a + b + 1) / 2,
        DyadicOp::Equal => {
            if (f64::from(a) - f64::from(b)).abs() <= CLOSENESS_EPSILON * f64::from(maxval) {
                1
            } else {
                0
            }
        }
        DyadicOp::Compare => match a.cmp(&b) {
            std::cmp::Ordering::Greater => 2,
            std::cmp::Ordering::Equal => 1,
            std::cmp::Ordering::Less => 0,
        },
        DyadicOp::And => {
            check_bitwise_maxval(maxval as u16)?;
            a & b
        }
        DyadicOp::Or => {
            check_bitwise_maxval(maxval as u16)?;
            a | b
        }
        DyadicOp::Nand => {
            check_bitwise_maxval(maxval as u16)?;
            (!(a & b)) & maxval
        }
        DyadicOp::Nor => {
            check_bitwise_maxval(maxval as u16)?;
            (!(a | b)) & maxval
        }
        DyadicOp::Xor => {
            check_bitwise_maxval(maxval as u16)?;
            a ^ b
        }
        DyadicOp::ShiftLeft => {
            check_bitwise_maxval(maxval as u16)?;
            (a << b.min(31)) & maxval
        }
        DyadicOp::ShiftRight => {
            check_bitwise_maxval(maxval as u16)?;
            a >> b.min(31)
        }
    })
}

fn check_bitwise_maxval(maxval: u16) -> NetpbmResult<()> {
    if !is_pow2_minus_one(maxval) {
        return Err(NetpbmError::PolicyLimit("bitwise operations require a maxval of the form 2^k - 1"));
    }
    Ok(())
}

/// One plane-flat tuple image: `width * height` tuples of `depth` samples
/// each, row-major (mirrors `crate::raster::TupleArray`'s layout without
/// depending on it, since arithmetic operates on raw sample planes).
#[derive(Clone, Debug)]
pub struct PlaneImage {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub maxval: u16,
    pub samples: Vec<u32>,
}

impl PlaneImage {
    pub fn new(width: u32, height: u32, depth: u32, maxval: u16) -> Self {
        PlaneImage { width, height, depth, maxval, samples: vec![0; (width * height * depth) as usize] }
    }

    pub fn filled(width: u32, height: u32, depth: u32, maxval: u16, value: u32) -> Self {
        PlaneImage { width, height, depth, maxval, samples: vec![value; (width * height * depth) as usize] }
    }

    fn plane_sample(&self, x: u32, y: u32, plane: u32) -> u32 {
        let plane = plane.min(self.depth - 1);
        let idx = ((y * self.width + x) * self.depth + plane) as usize;
        self.samples[idx]
    }

    fn scaled_sample(&self, x: u32, y: u32, plane: u32, target_maxval: u16) -> u32 {
        let raw = self.plane_sample(x, y, plane);
        if self.maxval == target_maxval {
            return raw;
        }
        ((f64::from(raw) * f64::from(target_maxval)) / f64::from(self.maxval)).round() as u32
    }
}

fn check_same_dimensions(images: &[&PlaneImage]) -> NetpbmResult<(u32, u32)> {
    let first = images.first().ok_or(NetpbmError::PolicyLimit("at least one input image is required"))?;
    for img in images {
        if img.width != first.width || img.height != first.height {
            return Err(NetpbmError::InvalidDimensions { field: "width/height", value: i64::from(img.width) });
        }
    }
    Ok((first.width, first.height))
}

/// Applies a dyadic operation across exactly two images (spec
/// "Arithmetic"). Output depth is `max(depth)`, maxval is `max(maxval)`
/// for symmetric ops, the op's natural maxval otherwise. An input with
/// fewer planes than the output saturates its plane index to its last
/// plane.
pub fn dyadic(op: DyadicOp, left: &PlaneImage, right: &PlaneImage) -> NetpbmResult<PlaneImage> {
    let (width, height) = check_same_dimensions(&[left, right])?;
    let out_depth = left.depth.max(right.depth);

    if op.is_bitwise() && left.maxval != right.maxval {
        return Err(NetpbmError::PolicyLimit("bitwise operations require equal input maxvals"));
    }
    let operand_maxval = left.maxval.max(right.maxval);
    let out_maxval = op.result_maxval(operand_maxval);

    let mut out = PlaneImage::new(width, height, out_depth, out_maxval);
    for y in 0..height {
        for x in 0..width {
            for plane in 0..out_depth {
                let a = left.scaled_sample(x, y, plane, operand_maxval);
                let b = right.scaled_sample(x, y, plane, operand_maxval);
                let value = apply(op, a, b, u32::from(operand_maxval))?;
                let idx = ((y * width + x) * out_depth + plane) as usize;
                out.samples[idx] = value.min(u32::from(out_maxval));
            }
        }
    }
    Ok(out)
}

/// How a masked multi-image blend selects/combines its inputs (spec
/// "Masked multi-image blend").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Average,
    Random,
    Mask,
}

/// Blends `images` (all equal dimensions and depth) guided by `mask` (a
/// single-plane image whose gray levels select a weighting), per spec's
/// three blend modes.
pub fn blend(mode: BlendMode, images: &[PlaneImage], mask: &PlaneImage, rng: &mut RandSt) -> NetpbmResult<PlaneImage> {
    if images.is_empty() {
        return Err(NetpbmError::PolicyLimit("blend requires at least one input image"));
    }
    let refs: Vec<&PlaneImage> = images.iter().collect();
    let (width, height) = check_same_dimensions(&refs)?;
    if mask.width != width || mask.height != height {
        return Err(NetpbmError::InvalidDimensions { field: "mask dimensions", value: i64::from(mask.width) });
    }
    let depth = images[0].depth;
    let maxval = images[0].maxval;
    let n = images.len();

    let mut out = PlaneImage::new(width, height, depth, maxval);

    let mask_table = if mode == BlendMode::Mask { Some(build_mask_weights(mask.maxval, n, rng)) } else { None };

    for y in 0..height {
        for x in 0..width {
            match mode {
                BlendMode::Average => {
                    for plane in 0..depth {
                        let sum: u64 = images.iter().map(|img| u64::from(img.plane_sample(x, y, plane))).sum();
                        let idx = ((y * width + x) * depth + plane) as usize;
                        out.samples[idx] = ((sum + n as u64 / 2) / n as u64) as u32;
                    }
                }
                BlendMode::Random => {
                    let pick = (rng.drand() * n as f64) as usize;
                    let pick = pick.min(n - 1);
                    for plane in 0..depth {
                        let idx = ((y * width + x) * depth + plane) as usize;
                        out.samples[idx] = images[pick].plane_sample(x, y, plane);
                    }
                }
                BlendMode::Mask => {
                    let gray = mask.plane_sample(x, y, 0).min(u32::from(mask.maxval)) as usize;
                    let weights = &mask_table.as_ref().unwrap()[gray];
                    let rand_samples: u64 = weights.iter().map(|&w| u64::from(w)).sum::<u64>() / n as u64;
                    let total = (rand_samples * n as u64).max(1);
                    for plane in 0..depth {
                        let sum: u64 = images.iter().enumerate().map(|(i, img)| u64::from(weights[i]) * u64::from(img.plane_sample(x, y, plane))).sum();
                        let idx = ((y * width + x) * depth + plane) as usize;
                        out.samples[idx] = (sum / total) as u32;
                    }
                }
            }
        }
    }
    Ok(out)
}

/// For each mask gray level, a weight vector over the `n` input images
/// summing to `rand_samples * n` (spec "Mask mode"). Weights are drawn
/// from paired standard-normal samples whose mean is shifted linearly
/// with the gray level, so that darker mask levels favor earlier images
/// and lighter levels favor later ones.
fn build_mask_weights(mask_maxval: u16, n: usize, rng: &mut RandSt) -> Vec<Vec<u32>> {
    const RAND_SAMPLES: u32 = 32;
    const SIGMA: f64 = 1.0;

    let levels = usize::from(mask_maxval) + 1;
    let mut table = Vec::with_capacity(levels);
    for level in 0..levels {
        let center = (level as f64 / mask_maxval.max(1) as f64) * (n as f64 - 1.0);
        let mut counts = vec![0u32; n];
        for _ in 0..(RAND_SAMPLES / 2).max(1) {
            let (g0, g1) = rng.gauss2();
            for g in [g0, g1] {
                let idx = (center + g * SIGMA).round();
                let idx = idx.clamp(0.0, n as f64 - 1.0) as usize;
                counts[idx] += 1;
            }
        }
        table.push(counts);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rand::RandEngine;

    fn uniform(value: u32, maxval: u16) -> PlaneImage {
        PlaneImage::filled(4, 4, 1, maxval, value)
    }

    #[test]
    fn mean_of_uniform_forty_and_sixty_is_uniform_fifty() {
        let a = uniform(40, 255);
        let b = uniform(60, 255);
        let result = dyadic(DyadicOp::Mean, &a, &b).unwrap();
        assert!(result.samples.iter().all(|&s| s == 50));
    }

    #[test]
    fn add_saturates_at_maxval() {
        let a = uniform(200, 255);
        let b = uniform(100, 255);
        let result = dyadic(DyadicOp::Add, &a, &b).unwrap();
        assert!(result.samples.iter().all(|&s| s == 255));
    }

    #[test]
    fn subtract_saturates_at_zero() {
        let a = uniform(10, 255);
        let b = uniform(100, 255);
        let result = dyadic(DyadicOp::Subtract, &a, &b).unwrap();
        assert!(result.samples.iter().all(|&s| s == 0));
    }

    #[test]
    fn bitwise_op_on_mismatched_maxvals_is_rejected() {
        let a = uniform(3, 3);
        let b = uniform(3, 255);
        assert!(matches!(dyadic(DyadicOp::And, &a, &b), Err(NetpbmError::PolicyLimit(_))));
    }

    #[test]
    fn bitwise_op_requires_maxval_of_form_two_pow_k_minus_one() {
        let a = uniform(3, 10);
        let b = uniform(3, 10);
        assert!(matches!(dyadic(DyadicOp::Xor, &a, &b), Err(NetpbmError::PolicyLimit(_))));
    }

    #[test]
    fn xor_with_valid_maxval_round_trips() {
        let a = uniform(0b0110, 15);
        let b = uniform(0b0101, 15);
        let result = dyadic(DyadicOp::Xor, &a, &b).unwrap();
        assert!(result.samples.iter().all(|&s| s == 0b0011));
    }

    #[test]
    fn equal_op_reports_maxval_one() {
        let a = uniform(128, 255);
        let b = uniform(128, 255);
        let result = dyadic(DyadicOp::Equal, &a, &b).unwrap();
        assert_eq!(result.maxval, 1);
        assert!(result.samples.iter().all(|&s| s == 1));
    }

    #[test]
    fn average_blend_is_the_unweighted_mean() {
        let images = vec![uniform(0, 255), uniform(100, 255), uniform(200, 255)];
        let mask = uniform(0, 255);
        let mut rng = RandSt::new(RandEngine::Mersenne, 1);
        let result = blend(BlendMode::Average, &images, &mask, &mut rng).unwrap();
        assert!(result.samples.iter().all(|&s| s == 100));
    }

    #[test]
    fn random_blend_always_picks_one_of_the_inputs() {
        let images = vec![uniform(10, 255), uniform(200, 255)];
        let mask = uniform(0, 255);
        let mut rng = RandSt::new(RandEngine::Mersenne, 7);
        let result = blend(BlendMode::Random, &images, &mask, &mut rng).unwrap();
        assert!(result.samples.iter().all(|&s| s == 10 || s == 200));
    }

    #[test]
    fn mask_blend_tracks_gray_level_toward_later_images() {
        let images = vec![uniform(0, 255), uniform(255, 255)];
        let mask_low = uniform(0, 255);
        let mask_high = uniform(255, 255);
        let mut rng = RandSt::new(RandEngine::Mersenne, 3);
        let low = blend(BlendMode::Mask, &images, &mask_low, &mut rng).unwrap();
        let high = blend(BlendMode::Mask, &images, &mask_high, &mut rng).unwrap();
        assert!(low.samples[0] <= high.samples[0]);
    }
}
