//! Scanline polygon fill (spec §4.4 "Polygon fill"): the caller draws a
//! polygon's outline with a `FillAccumulator` standing in for the normal
//! plot callback, then calls `fill_flush` to turn the accumulated outline
//! trail into horizontal spans.
use super::Plot;

/// One accumulated outline pixel: position plus the edge index that
/// produced it (spec: "a deduplicated, edge-numbered trail of outline
/// pixels").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Sample {
    x: i32,
    y: i32,
    edge: u32,
}

/// A horizontal span to fill, inclusive on both ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub y: i32,
    pub x0: i32,
    pub x1: i32,
}

/// Scoped per-polygon accumulator (spec §9: "a scoped object acquired
/// before outline drawing and released after span emission"). Implements
/// `Plot` so it can be passed directly in place of a normal plot
/// callback.
///
/// Edge numbering is tracked automatically as points come in, following
/// the vertical-direction bookkeeping the outline plotter this is
/// grounded on performs while accumulating: a tangential touch (the
/// outline's Y direction reverses between two adjacent plotted points)
/// inserts a zero-length "fake coord" at the old position under a fresh
/// edge number, so the reversal still contributes a pairable edge
/// boundary instead of one stray crossing. A non-adjacent jump between
/// two plotted points starts a new segment outright. Either case closes
/// the outgoing segment by renumbering its first edge run to match its
/// last, but only when that segment's start and end Y direction agree —
/// otherwise the segment's own two ends already pair across the seam.
pub struct FillAccumulator {
    samples: Vec<Sample>,
    curedge: u32,
    segstart: usize,
    ydir: i32,
    startydir: i32,
}

impl FillAccumulator {
    pub fn new() -> Self {
        FillAccumulator { samples: Vec::new(), curedge: 0, segstart: 0, ydir: 0, startydir: 0 }
    }

    /// Renumbers the first edge run of the segment starting at `segstart`
    /// to `closing_edge`, provided the segment's start and end Y
    /// directions agree.
    fn close_segment(&mut self, closing_edge: u32) {
        if self.startydir != 0 && self.ydir != 0 && self.startydir == self.ydir {
            let old_edge = self.samples[self.segstart].edge;
            let mut i = self.segstart;
            while i < self.samples.len() && self.samples[i].edge == old_edge {
                self.samples[i].edge = closing_edge;
                i += 1;
            }
        }
    }

    /// Sorts the trail by `(y, x)` primarily and by edge secondarily, then
    /// pairs consecutive samples on each row into spans (spec
    /// "fill_flush").
    pub fn fill_flush(mut self) -> Vec<Span> {
        if let Some(last) = self.samples.last().copied() {
            self.close_segment(last.edge);
        }
        self.samples.sort_by_key(|s| (s.y, s.x, s.edge));

        let mut spans = Vec::new();
        let mut i = 0;
        while i < self.samples.len() {
            let y = self.samples[i].y;
            let mut row = Vec::new();
            while i < self.samples.len() && self.samples[i].y == y {
                row.push(self.samples[i].x);
                i += 1;
            }
            let mut j = 0;
            while j + 1 < row.len() {
                spans.push(Span { y, x0: row[j], x1: row[j + 1] });
                j += 2;
            }
        }
        spans
    }
}

impl Default for FillAccumulator {
    fn default() -> Self {
        FillAccumulator::new()
    }
}

impl Plot for FillAccumulator {
    fn plot(&mut self, x: i32, y: i32) {
        if let Some(last) = self.samples.last().copied() {
            if last.x == x && last.y == y {
                return;
            }
            let dx = x - last.x;
            let dy = y - last.y;
            if !(-1..=1).contains(&dx) || !(-1..=1).contains(&dy) {
                // Non-adjacent jump: close the outgoing segment and start
                // a fresh one under a new edge number.
                self.close_segment(last.edge);
                self.curedge += 1;
                self.segstart = self.samples.len();
                self.ydir = 0;
                self.startydir = 0;
            } else if dy != 0 {
                if self.ydir != 0 && self.ydir != dy {
                    // Y direction reversed: insert a fake coord at the old
                    // position under a new edge before the real point.
                    self.curedge += 1;
                    self.samples.push(Sample { x: last.x, y: last.y, edge: self.curedge });
                }
                self.ydir = dy;
                if self.startydir == 0 {
                    self.startydir = dy;
                }
            }
        } else {
            self.segstart = 0;
            self.ydir = 0;
            self.startydir = 0;
        }
        self.samples.push(Sample { x, y, edge: self.curedge });
    }
}

/// Plots every span into a `Plot` sink, one call per covered pixel.
pub fn fill_spans(spans: &[Span], plot: &mut impl Plot) {
    for span in spans {
        for x in span.x0..=span.x1 {
            plot.plot(x, span.y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::{line, spline, ClipRect, DrawContext, LineType};

    #[test]
    fn square_outline_fills_interior_rows() {
        let ctx = DrawContext { line_type: LineType::Normal, clip: true, rect: ClipRect::new(20, 20) };
        let mut acc = FillAccumulator::new();

        line(&ctx, &mut acc, 2, 2, 8, 2);
        line(&ctx, &mut acc, 8, 2, 8, 8);
        line(&ctx, &mut acc, 8, 8, 2, 8);
        line(&ctx, &mut acc, 2, 8, 2, 2);

        let spans = acc.fill_flush();
        let row5: Vec<&Span> = spans.iter().filter(|s| s.y == 5).collect();
        assert_eq!(row5.len(), 1);
        assert_eq!(row5[0].x0, 2);
        assert_eq!(row5[0].x1, 8);
    }

    #[test]
    fn spans_pair_samples_left_to_right_per_row() {
        let mut acc = FillAccumulator::new();
        acc.plot(1, 0);
        acc.plot(5, 0);
        acc.plot(9, 0);
        acc.plot(3, 0);
        let spans = acc.fill_flush();
        assert_eq!(spans, vec![Span { y: 0, x0: 1, x1: 3 }, Span { y: 0, x0: 5, x1: 9 }]);
    }

    /// A lens shape: two quadratic arcs bulging apart between the same
    /// two endpoints, each with an interior vertical extremum that lands
    /// on a raster row. Without the direction-reversal renumbering pass
    /// in `plot`, that extremum would contribute a single stray crossing
    /// on its row instead of a pairable edge boundary.
    #[test]
    fn filled_curve_with_interior_extremum_pairs_correctly() {
        let ctx = DrawContext { line_type: LineType::Normal, clip: true, rect: ClipRect::new(30, 30) };
        let mut acc = FillAccumulator::new();

        spline(&ctx, &mut acc, (4.0, 10.0), (12.0, 2.0), (20.0, 10.0));
        spline(&ctx, &mut acc, (20.0, 10.0), (12.0, 18.0), (4.0, 10.0));

        let spans = acc.fill_flush();
        for y in 3..=17 {
            let row: Vec<&Span> = spans.iter().filter(|s| s.y == y).collect();
            assert_eq!(row.len() % 2, 0, "row {} has an unpaired crossing: {:?}", y, row);
            for span in &row {
                assert!(span.x0 <= span.x1, "row {} has an inverted span {:?}", y, span);
            }
        }
    }
}
