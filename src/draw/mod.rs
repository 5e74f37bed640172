//! L4: the polymorphic 2-D drawing engine (spec §4.4), grounded on
//! `original_source/lib/libppmd.c`. Every operation is clipped to a
//! rectangle and driven through a `Plot` callback rather than writing
//! pixels directly, so the same engine serves both real rasterization and
//! the bounding-box-only "extents" mode used by text layout.
//!
//! Line-type, clip, and fill state are module statics in the original;
//! here they live in `DrawContext`, an explicit value threaded through
//! every call (spec §9 "Global mutable state in the drawing engine").
pub mod fill;

pub use fill::{FillAccumulator, Span};

/// A rectangle every operation clips against (spec: "every operation
/// clips to the raster rectangle").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClipRect {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl ClipRect {
    pub fn new(width: u32, height: u32) -> Self {
        ClipRect { xmin: 0, ymin: 0, xmax: width as i32 - 1, ymax: height as i32 - 1 }
    }
}

/// Whether consecutive diagonal steps of a line get an extra plot to stay
/// 4-connected (spec "Line").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LineType {
    Normal,
    NoDiagonals,
}

/// Per-drawing-session state (spec "Drawing context").
pub struct DrawContext {
    pub line_type: LineType,
    pub clip: bool,
    pub rect: ClipRect,
}

impl DrawContext {
    pub fn new(width: u32, height: u32) -> Self {
        DrawContext { line_type: LineType::Normal, clip: true, rect: ClipRect::new(width, height) }
    }
}

/// The single per-pixel sink every drawing operation is parameterized by
/// (spec: "a pluggable per-pixel plot callback"), unifying the original's
/// two distinct callback shapes (plain plot vs. fill-accumulating plot)
/// behind one trait — a fill accumulator is just another `Plot` impl.
pub trait Plot {
    fn plot(&mut self, x: i32, y: i32);
}

/// Plots directly into a raster's packed index buffer.
pub struct RasterPlot<'a> {
    pub width: u32,
    pub height: u32,
    pub buffer: &'a mut [u32],
    pub value: u32,
}

impl<'a> Plot for RasterPlot<'a> {
    fn plot(&mut self, x: i32, y: i32) {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return;
        }
        self.buffer[(y as u32 * self.width + x as u32) as usize] = self.value;
    }
}

/// Parametric line clipping against all four rectangle edges (spec
/// "Clipping"): if both endpoints lie on the same outside half-plane the
/// line is discarded outright; otherwise the clipped segment's endpoints
/// are returned. Liang-Barsky parametrization.
fn clip_line(rect: &ClipRect, x0: i32, y0: i32, x1: i32, y1: i32) -> Option<(i32, i32, i32, i32)> {
    let (dx, dy) = (x1 - x0, y1 - y0);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;

    let checks = [
        (-dx as f64, (x0 - rect.xmin) as f64),
        (dx as f64, (rect.xmax - x0) as f64),
        (-dy as f64, (y0 - rect.ymin) as f64),
        (dy as f64, (rect.ymax - y0) as f64),
    ];

    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                if r > t0 {
                    t0 = r;
                }
            } else {
                if r < t0 {
                    return None;
                }
                if r < t1 {
                    t1 = r;
                }
            }
        }
    }

    if t0 > t1 {
        return None;
    }

    let cx0 = (x0 as f64 + t0 * dx as f64).round() as i32;
    let cy0 = (y0 as f64 + t0 * dy as f64).round() as i32;
    let cx1 = (x0 as f64 + t1 * dx as f64).round() as i32;
    let cy1 = (y0 as f64 + t1 * dy as f64).round() as i32;
    Some((cx0, cy0, cx1, cy1))
}

const DDA_SCALE: i64 = 8192;

/// Draws a clipped line via a DDA accumulator scaled by 8192 (spec
/// "Line"). Iterates over the axis of greatest extent; `NoDiagonals`
/// inserts the extra plot that keeps the line 4-connected.
///
/// Tie-breaking is intentionally asymmetric (the same DDA run forward or
/// backward does not retrace identical points) — this mirrors the
/// reference implementation, which the rewrite is required to preserve
/// (spec §8 "Testable properties").
pub fn line(ctx: &DrawContext, plot: &mut impl Plot, x0: i32, y0: i32, x1: i32, y1: i32) {
    let (x0, y0, x1, y1) = if ctx.clip {
        match clip_line(&ctx.rect, x0, y0, x1, y1) {
            Some(clipped) => clipped,
            None => return,
        }
    } else {
        (x0, y0, x1, y1)
    };

    let dx = x1 - x0;
    let dy = y1 - y0;

    if dx == 0 && dy == 0 {
        plot.plot(x0, y0);
        return;
    }

    if dx.abs() >= dy.abs() {
        let steps = dx.abs();
        let y_step = (dy as i64 * DDA_SCALE) / steps as i64;
        let x_dir = dx.signum();
        let mut y_acc: i64 = (y0 as i64) * DDA_SCALE;
        let mut prev_y = y0;
        let mut x = x0;
        for i in 0..=steps {
            let y = (y_acc as f64 / DDA_SCALE as f64).round() as i32;
            if ctx.line_type == LineType::NoDiagonals && i > 0 && x != x0 && y != prev_y {
                plot.plot(x - x_dir, y);
            }
            plot.plot(x, y);
            prev_y = y;
            x += x_dir;
            y_acc += y_step;
        }
    } else {
        let steps = dy.abs();
        let x_step = (dx as i64 * DDA_SCALE) / steps as i64;
        let y_dir = dy.signum();
        let mut x_acc: i64 = (x0 as i64) * DDA_SCALE;
        let mut prev_x = x0;
        let mut y = y0;
        for i in 0..=steps {
            let x = (x_acc as f64 / DDA_SCALE as f64).round() as i32;
            if ctx.line_type == LineType::NoDiagonals && i > 0 && y != y0 && x != prev_x {
                plot.plot(x, y - y_dir);
            }
            plot.plot(x, y);
            prev_x = x;
            y += y_dir;
            x_acc += x_step;
        }
    }
}

const SPLINE_THRESHOLD: f64 = 3.0;

/// Draws a quadratic Bezier (three control points) by recursive midpoint
/// subdivision, stopping once the Chebyshev distance between the true
/// midpoint and the chord midpoint drops below 3 pixels (spec "Splines").
pub fn spline(ctx: &DrawContext, plot: &mut impl Plot, p0: (f64, f64), p1: (f64, f64), p2: (f64, f64)) {
    let mid_true = bezier_point(p0, p1, p2, 0.5);
    let chord_mid = ((p0.0 + p2.0) / 2.0, (p0.1 + p2.1) / 2.0);
    let cheby = (mid_true.0 - chord_mid.0).abs().max((mid_true.1 - chord_mid.1).abs());

    if cheby < SPLINE_THRESHOLD {
        line(ctx, plot, p0.0.round() as i32, p0.1.round() as i32, p2.0.round() as i32, p2.1.round() as i32);
        return;
    }

    let p01 = midpoint(p0, p1);
    let p12 = midpoint(p1, p2);
    let p012 = midpoint(p01, p12);

    spline(ctx, plot, p0, p01, p012);
    spline(ctx, plot, p012, p12, p2);
}

/// A sequence of control points reduced to successive quadratics joined
/// at midpoints (spec "polyspline").
pub fn polyspline(ctx: &DrawContext, plot: &mut impl Plot, points: &[(f64, f64)]) {
    if points.len() < 3 {
        if points.len() == 2 {
            line(ctx, plot, points[0].0.round() as i32, points[0].1.round() as i32, points[1].0.round() as i32, points[1].1.round() as i32);
        }
        return;
    }

    let n = points.len();
    let mut anchors = Vec::with_capacity(n);
    anchors.push(points[0]);
    for i in 1..n - 1 {
        anchors.push(midpoint(points[i], points[i + 1]));
    }
    anchors.push(points[n - 1]);

    for i in 0..n - 2 {
        spline(ctx, plot, anchors[i], points[i + 1], anchors[i + 1]);
    }
}

fn midpoint(a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0)
}

fn bezier_point(p0: (f64, f64), p1: (f64, f64), p2: (f64, f64), t: f64) -> (f64, f64) {
    let u = 1.0 - t;
    (
        u * u * p0.0 + 2.0 * u * t * p1.0 + t * t * p2.0,
        u * u * p0.1 + 2.0 * u * t * p1.1 + t * t * p2.1,
    )
}

/// Draws a circle of radius `r` centered at `(cx, cy)` with a
/// second-order DDA: starts at `(r, 0)` and rotates by `1/r` radians per
/// step until the start point is revisited, plotting each distinct
/// integer point once (spec "Circle").
pub fn circle(ctx: &DrawContext, plot: &mut impl Plot, cx: i32, cy: i32, r: i32) {
    if r <= 0 {
        plot.plot(cx, cy);
        return;
    }

    let angle_step = 1.0 / r as f64;
    let (sin_a, cos_a) = angle_step.sin_cos();

    let mut x = r as f64;
    let mut y = 0.0f64;
    let mut last_plotted: Option<(i32, i32)> = None;

    let steps = ((2.0 * std::f64::consts::PI) / angle_step).ceil() as i64 + 1;
    for _ in 0..steps {
        let ix = x.round() as i32;
        let iy = y.round() as i32;
        if last_plotted != Some((ix, iy)) {
            if ctx.clip && (ix + cx < ctx.rect.xmin || ix + cx > ctx.rect.xmax || iy + cy < ctx.rect.ymin || iy + cy > ctx.rect.ymax) {
                // still advance the rotation but skip the off-raster plot
            } else {
                plot.plot(cx + ix, cy + iy);
            }
            last_plotted = Some((ix, iy));
        }

        let (nx, ny) = (x * cos_a - y * sin_a, x * sin_a + y * cos_a);
        x = nx;
        y = ny;
    }
}

/// One instruction in a glyph's stroke program, in a fixed 21x21-unit
/// design space with a 9-unit descender (spec "Text"). Font *data* (the
/// actual per-character glyph tables) is supplied by the caller; this
/// engine only interprets it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GlyphCommand {
    MoveTo(f64, f64),
    LineTo(f64, f64),
}

/// Scales, rotates (by an integer degree angle) and translates a glyph's
/// commands into the target raster, plotting each stroke with `line`
/// (spec "Text").
pub fn render_glyph(ctx: &DrawContext, plot: &mut impl Plot, commands: &[GlyphCommand], scale: f64, degrees: i32, origin: (f64, f64)) {
    let mut pen = (0.0, 0.0);
    let theta = (degrees as f64).to_radians();
    let (sin_t, cos_t) = theta.sin_cos();

    let transform = |x: f64, y: f64| -> (i32, i32) {
        let rx = x * cos_t - y * sin_t;
        let ry = x * sin_t + y * cos_t;
        ((origin.0 + rx * scale).round() as i32, (origin.1 + ry * scale).round() as i32)
    };

    for cmd in commands {
        match *cmd {
            GlyphCommand::MoveTo(x, y) => pen = (x, y),
            GlyphCommand::LineTo(x, y) => {
                let (x0, y0) = transform(pen.0, pen.1);
                let (x1, y1) = transform(x, y);
                line(ctx, plot, x0, y0, x1, y1);
                pen = (x, y);
            }
        }
    }
}

/// A no-op `Plot` that tracks the bounding box of every point it's asked
/// to plot, used by the "extents" text-layout mode (spec: "a dedicated
/// extents mode runs the same glyph interpreter with a no-op plot
/// callback that merely updates a global min/max rectangle").
pub struct ExtentsPlot {
    pub min: Option<(i32, i32)>,
    pub max: Option<(i32, i32)>,
}

impl ExtentsPlot {
    pub fn new() -> Self {
        ExtentsPlot { min: None, max: None }
    }

    pub fn bounds(&self) -> Option<(i32, i32, i32, i32)> {
        match (self.min, self.max) {
            (Some((x0, y0)), Some((x1, y1))) => Some((x0, y0, x1, y1)),
            _ => None,
        }
    }
}

impl Default for ExtentsPlot {
    fn default() -> Self {
        ExtentsPlot::new()
    }
}

impl Plot for ExtentsPlot {
    fn plot(&mut self, x: i32, y: i32) {
        self.min = Some(match self.min {
            Some((mx, my)) => (mx.min(x), my.min(y)),
            None => (x, y),
        });
        self.max = Some(match self.max {
            Some((mx, my)) => (mx.max(x), my.max(y)),
            None => (x, y),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingPlot(Vec<(i32, i32)>);
    impl Plot for RecordingPlot {
        fn plot(&mut self, x: i32, y: i32) {
            self.0.push((x, y));
        }
    }

    #[test]
    fn horizontal_line_visits_every_x() {
        let ctx = DrawContext::new(100, 100);
        let mut p = RecordingPlot(Vec::new());
        line(&ctx, &mut p, 0, 0, 5, 0);
        assert_eq!(p.0, vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0)]);
    }

    #[test]
    fn out_of_rect_line_is_discarded() {
        let ctx = DrawContext::new(10, 10);
        let mut p = RecordingPlot(Vec::new());
        line(&ctx, &mut p, 20, 20, 30, 30);
        assert!(p.0.is_empty());
    }

    #[test]
    fn line_crossing_the_boundary_is_clipped_in_place() {
        let ctx = DrawContext::new(10, 10);
        let mut p = RecordingPlot(Vec::new());
        line(&ctx, &mut p, -5, 5, 15, 5);
        assert!(p.0.iter().all(|&(x, _)| (0..10).contains(&x)));
    }

    #[test]
    fn spline_collapsing_to_a_line_matches_straight_line() {
        let ctx = DrawContext::new(100, 100);
        let mut p = RecordingPlot(Vec::new());
        spline(&ctx, &mut p, (0.0, 0.0), (5.0, 0.0), (10.0, 0.0));
        assert!(p.0.contains(&(0, 0)));
        assert!(p.0.contains(&(10, 0)));
    }

    #[test]
    fn circle_points_are_distance_r_from_center() {
        let ctx = DrawContext::new(200, 200);
        let mut p = RecordingPlot(Vec::new());
        circle(&ctx, &mut p, 100, 100, 20);
        assert!(!p.0.is_empty());
        for &(x, y) in &p.0 {
            let dist = (((x - 100).pow(2) + (y - 100).pow(2)) as f64).sqrt();
            assert!((dist - 20.0).abs() <= 1.5);
        }
    }

    #[test]
    fn glyph_extents_bound_every_plotted_stroke() {
        let ctx = DrawContext::new(200, 200);
        let commands = [
            GlyphCommand::MoveTo(0.0, 0.0),
            GlyphCommand::LineTo(21.0, 0.0),
            GlyphCommand::LineTo(21.0, -21.0),
        ];
        let mut extents = ExtentsPlot::new();
        render_glyph(&ctx, &mut extents, &commands, 1.0, 0, (50.0, 50.0));
        let (x0, y0, x1, y1) = extents.bounds().unwrap();
        assert!(x0 <= 50 && x1 >= 71);
        assert!(y1 >= 50 && y0 <= 29);
    }

    #[test]
    fn rotating_a_glyph_ninety_degrees_swaps_its_axes() {
        let ctx = DrawContext::new(200, 200);
        let commands = [GlyphCommand::MoveTo(0.0, 0.0), GlyphCommand::LineTo(10.0, 0.0)];
        let mut p = RecordingPlot(Vec::new());
        render_glyph(&ctx, &mut p, &commands, 1.0, 90, (50.0, 50.0));
        assert!(p.0.iter().any(|&(x, y)| x == 50 && (y - 60).abs() <= 1));
    }
}
