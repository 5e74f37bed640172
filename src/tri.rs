//! L7: perspective-correct triangle rasterizer (spec §4.6), grounded on
//! `original_source/generator/pamtris/{boundaries,triangle,framebuffer}.c`
//! for the boundary-walk and Z-buffer convention.
use std::io::{BufRead, Write};

use log::warn;

use crate::error::{NetpbmError, NetpbmResult};
use crate::header::TupleType;

pub const MAX_ATTRIBS: usize = 20;
const MAX_Z: u32 = (1u32 << 30) - 1;

/// One input vertex (spec: "three vertices, each with 2-D integer screen
/// position, an integer Z ... and an integer w ... and N user
/// attributes").
#[derive(Clone, Debug, PartialEq)]
pub struct Vertex {
    pub x: i32,
    pub y: i32,
    pub z: u32,
    pub w: u32,
    pub attribs: Vec<u32>,
}

/// Width x height x (attribs+1) image buffer, Z-buffer, and PAM metadata
/// (spec "Triangle context").
pub struct TriContext {
    pub width: u32,
    pub height: u32,
    pub maxval: u16,
    pub num_attribs: usize,
    pub tuple_type: TupleType,
    image: Vec<u32>,
    zbuf: Vec<u32>,
}

impl TriContext {
    pub fn new(width: u32, height: u32, maxval: u16, num_attribs: usize, tuple_type: TupleType) -> NetpbmResult<Self> {
        if num_attribs > MAX_ATTRIBS {
            return Err(NetpbmError::PolicyLimit("triangle attribute count exceeds 20"));
        }
        let depth = num_attribs + 1;
        Ok(TriContext {
            width,
            height,
            maxval,
            num_attribs,
            tuple_type,
            image: vec![0u32; (width * height * depth as u32) as usize],
            zbuf: vec![0u32; (width * height) as usize],
        })
    }

    fn depth(&self) -> usize {
        self.num_attribs + 1
    }

    pub fn clear_image(&mut self) {
        self.image.iter_mut().for_each(|s| *s = 0);
    }

    pub fn clear_depth(&mut self) {
        self.zbuf.iter_mut().for_each(|s| *s = 0);
    }

    /// Reconfigures the image buffer; the Z-buffer is untouched (spec
    /// "Attribute count": "Changing it implies clearing the image buffer
    /// but not the Z-buffer").
    pub fn reset(&mut self, maxval: u16, num_attribs: usize, tuple_type: Option<TupleType>) -> NetpbmResult<()> {
        if num_attribs > MAX_ATTRIBS {
            return Err(NetpbmError::PolicyLimit("triangle attribute count exceeds 20"));
        }
        self.maxval = maxval;
        self.num_attribs = num_attribs;
        if let Some(tt) = tuple_type {
            self.tuple_type = tt;
        }
        self.image = vec![0u32; (self.width * self.height * self.depth() as u32) as usize];
        Ok(())
    }

    fn pixel_offset(&self, x: u32, y: u32) -> usize {
        ((y * self.width + x) as usize) * self.depth()
    }

    pub fn sample(&self, x: u32, y: u32, plane: usize) -> u32 {
        self.image[self.pixel_offset(x, y) + plane]
    }

    pub fn alpha(&self, x: u32, y: u32) -> u32 {
        self.sample(x, y, self.num_attribs)
    }

    pub fn into_image(self) -> Vec<u32> {
        self.image
    }

    /// Draws one triangle, following the boundary-row algorithm (spec
    /// steps 1-4).
    pub fn draw_triangle(&mut self, v0: &Vertex, v1: &Vertex, v2: &Vertex) -> NetpbmResult<()> {
        for v in [v0, v1, v2] {
            if v.attribs.len() != self.num_attribs {
                return Err(NetpbmError::InvalidDepth(v.attribs.len() as u32));
            }
        }

        let mut verts: Vec<&Vertex> = vec![v0, v1, v2];
        verts.sort_by(|a, b| a.y.cmp(&b.y).then(a.x.cmp(&b.x)));
        let (top, mid, bot) = (verts[0], verts[1], verts[2]);

        if top.y == bot.y {
            self.draw_horizontal_degenerate(top, mid, bot);
            return Ok(());
        }

        let planes = self.num_attribs + 1; // + 1/w accumulator plane
        let persp = |v: &Vertex| -> Vec<f64> {
            let w = v.w.max(1) as f64;
            let mut acc: Vec<f64> = v.attribs.iter().map(|&a| f64::from(a) / w).collect();
            acc.push(1.0 / w);
            acc
        };
        let depth_value = |v: &Vertex| -> f64 { f64::from(MAX_Z - v.z.min(MAX_Z)) };

        let p_top = persp(top);
        let p_mid = persp(mid);
        let p_bot = persp(bot);
        let z_top = depth_value(top);
        let z_mid = depth_value(mid);
        let z_bot = depth_value(bot);

        let y_start = top.y.max(0);
        let y_end = bot.y.min(self.height as i32 - 1);
        if y_start > y_end {
            return Ok(());
        }

        for y in y_start..=y_end {
            let (xa, za, pa, xb, zb, pb) = if y < mid.y {
                let t = if top.y == mid.y { 0.0 } else { (y - top.y) as f64 / (mid.y - top.y) as f64 };
                let x_long = lerp_i(top.x, bot.x, long_t(top.y, bot.y, y));
                let x_short = lerp_i(top.x, mid.x, t);
                let z_long = lerp(z_top, z_bot, long_t(top.y, bot.y, y));
                let z_short = lerp(z_top, z_mid, t);
                let p_long = lerp_vec(&p_top, &p_bot, long_t(top.y, bot.y, y), planes);
                let p_short = lerp_vec(&p_top, &p_mid, t, planes);
                (x_long, z_long, p_long, x_short, z_short, p_short)
            } else {
                let t = if mid.y == bot.y { 1.0 } else { (y - mid.y) as f64 / (bot.y - mid.y) as f64 };
                let x_long = lerp_i(top.x, bot.x, long_t(top.y, bot.y, y));
                let x_short = lerp_i(mid.x, bot.x, t);
                let z_long = lerp(z_top, z_bot, long_t(top.y, bot.y, y));
                let z_short = lerp(z_mid, z_bot, t);
                let p_long = lerp_vec(&p_top, &p_bot, long_t(top.y, bot.y, y), planes);
                let p_short = lerp_vec(&p_mid, &p_bot, t, planes);
                (x_long, z_long, p_long, x_short, z_short, p_short)
            };

            let (xleft, zleft, pleft, xright, zright, pright) =
                if xa <= xb { (xa, za, pa, xb, zb, pb) } else { (xb, zb, pb, xa, za, pa) };

            self.fill_span(y, xleft, xright, zleft, zright, &pleft, &pright);
        }

        Ok(())
    }

    fn draw_horizontal_degenerate(&mut self, a: &Vertex, b: &Vertex, c: &Vertex) {
        let pairs = [(a, b), (b, c), (a, c)];
        for (p, q) in pairs {
            let y = p.y;
            if y < 0 || y as u32 >= self.height {
                continue;
            }
            let depth_p = f64::from(MAX_Z - p.z.min(MAX_Z));
            let depth_q = f64::from(MAX_Z - q.z.min(MAX_Z));
            let planes = self.num_attribs + 1;
            let pv_p = {
                let w = p.w.max(1) as f64;
                let mut v: Vec<f64> = p.attribs.iter().map(|&a| f64::from(a) / w).collect();
                v.push(1.0 / w);
                v
            };
            let pv_q = {
                let w = q.w.max(1) as f64;
                let mut v: Vec<f64> = q.attribs.iter().map(|&a| f64::from(a) / w).collect();
                v.push(1.0 / w);
                v
            };
            let _ = planes;
            self.fill_span(y, p.x, q.x, depth_p, depth_q, &pv_p, &pv_q);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fill_span(&mut self, y: i32, x0: i32, x1: i32, z0: f64, z1: f64, p0: &[f64], p1: &[f64]) {
        if y < 0 || y as u32 >= self.height {
            return;
        }
        let (x0, x1, z0, z1, p0, p1) = if x0 <= x1 { (x0, x1, z0, z1, p0, p1) } else { (x1, x0, z1, z0, p1, p0) };

        let xa = x0.max(0);
        let xb = x1.min(self.width as i32 - 1);
        if xa > xb {
            return;
        }

        let span_len = (x1 - x0).max(1) as f64;
        for x in xa..=xb {
            let t = (x - x0) as f64 / span_len;
            let z = lerp(z0, z1, t).round() as u32;
            let inv_w = lerp(p0[p0.len() - 1], p1[p1.len() - 1], t);

            let (ux, uy) = (x as u32, y as u32);
            let zidx = (uy * self.width + ux) as usize;
            if z < self.zbuf[zidx] {
                continue;
            }
            self.zbuf[zidx] = z;

            let maxval = f64::from(self.maxval);
            let off = self.pixel_offset(ux, uy);
            for plane in 0..self.num_attribs {
                let interp = lerp(p0[plane], p1[plane], t);
                let attr = if inv_w.abs() < f64::EPSILON { 0.0 } else { interp / inv_w };
                self.image[off + plane] = attr.round().clamp(0.0, maxval) as u32;
            }
            self.image[off + self.num_attribs] = u32::from(self.maxval);
        }
    }
}

fn long_t(y_top: i32, y_bot: i32, y: i32) -> f64 {
    if y_top == y_bot {
        0.0
    } else {
        (y - y_top) as f64 / (y_bot - y_top) as f64
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_i(a: i32, b: i32, t: f64) -> i32 {
    lerp(a as f64, b as f64, t).round() as i32
}

fn lerp_vec(a: &[f64], b: &[f64], t: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| lerp(a[i], b[i], t)).collect()
}

/// Vertex grouping selected by the `mode` command (spec "Command
/// interpreter").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssemblyMode {
    Triangles,
    Strip,
    Fan,
}

/// Drives a `TriContext` from the text protocol described in spec §4.6.
/// Parse errors are reported with a line number and the offending line is
/// skipped; rasterizer state is left undisturbed (spec "Command
/// interpreter").
pub struct CommandInterpreter {
    pub ctx: TriContext,
    mode: AssemblyMode,
    current_attribs: Vec<u32>,
    pending: Vec<Vertex>,
}

impl CommandInterpreter {
    pub fn new(ctx: TriContext) -> Self {
        CommandInterpreter { ctx, mode: AssemblyMode::Triangles, current_attribs: Vec::new(), pending: Vec::new() }
    }

    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> NetpbmResult<()> {
        for (line_no, line) in input.lines().enumerate() {
            let line = line?;
            let line_no = line_no + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Err(msg) = self.dispatch(trimmed, &mut output) {
                warn!("line {line_no}: {msg}");
                continue;
            }
            if trimmed == "quit" {
                break;
            }
        }
        Ok(())
    }

    fn dispatch<W: Write>(&mut self, line: &str, output: &mut W) -> Result<(), String> {
        let mut tokens = line.split_whitespace();
        let cmd = tokens.next().ok_or("empty command")?;
        match cmd {
            "mode" => {
                self.mode = match tokens.next().ok_or("mode requires an argument")? {
                    "triangles" => AssemblyMode::Triangles,
                    "strip" => AssemblyMode::Strip,
                    "fan" => AssemblyMode::Fan,
                    other => return Err(format!("unknown mode {other}")),
                };
                self.pending.clear();
                Ok(())
            }
            "attribs" => {
                self.current_attribs = tokens
                    .map(|t| t.parse::<u32>().map_err(|_| format!("bad attribute value {t}")))
                    .collect::<Result<_, _>>()?;
                Ok(())
            }
            "vertex" => {
                let x = next_i32(&mut tokens, "x")?;
                let y = next_i32(&mut tokens, "y")?;
                let z = next_i32(&mut tokens, "z")? as u32;
                let w = tokens.next().map(|t| t.parse::<u32>()).transpose().map_err(|_| "bad w".to_string())?.unwrap_or(1);
                self.pending.push(Vertex { x, y, z, w, attribs: self.current_attribs.clone() });
                self.try_draw()
            }
            "print" | "!" => {
                self.flush_pam(output).map_err(|e| e.to_string())
            }
            "clear" => {
                match tokens.next() {
                    None | Some("image") => self.ctx.clear_image(),
                    Some("depth") | Some("z") => self.ctx.clear_depth(),
                    Some(other) => return Err(format!("unknown clear target {other}")),
                }
                Ok(())
            }
            "reset" => {
                let maxval = next_i32(&mut tokens, "maxval")? as u16;
                let n_attribs = next_i32(&mut tokens, "nAttribs")? as usize;
                let tuple_type = tokens.next().map(TupleType::parse);
                self.ctx.reset(maxval, n_attribs, tuple_type).map_err(|e| e.to_string())
            }
            "quit" => Ok(()),
            other => Err(format!("unknown command {other}")),
        }
    }

    fn try_draw(&mut self) -> Result<(), String> {
        let needed = match self.mode {
            AssemblyMode::Triangles => 3,
            AssemblyMode::Strip | AssemblyMode::Fan => 3,
        };
        if self.pending.len() < needed {
            return Ok(());
        }

        match self.mode {
            AssemblyMode::Triangles => {
                let v2 = self.pending.pop().unwrap();
                let v1 = self.pending.pop().unwrap();
                let v0 = self.pending.pop().unwrap();
                self.ctx.draw_triangle(&v0, &v1, &v2).map_err(|e| e.to_string())
            }
            AssemblyMode::Strip => {
                let n = self.pending.len();
                let (v0, v1, v2) = (self.pending[n - 3].clone(), self.pending[n - 2].clone(), self.pending[n - 1].clone());
                self.ctx.draw_triangle(&v0, &v1, &v2).map_err(|e| e.to_string())
            }
            AssemblyMode::Fan => {
                let n = self.pending.len();
                let (v0, v1, v2) = (self.pending[0].clone(), self.pending[n - 2].clone(), self.pending[n - 1].clone());
                self.ctx.draw_triangle(&v0, &v1, &v2).map_err(|e| e.to_string())
            }
        }
    }

    fn flush_pam<W: Write>(&self, output: &mut W) -> NetpbmResult<()> {
        use crate::header::{Format, Header};
        use crate::reader::Row;
        use crate::writer::PnmWriter;

        let depth = (self.ctx.num_attribs + 1) as u32;
        let header = Header {
            format: Format::Pam,
            width: self.ctx.width,
            height: self.ctx.height,
            depth,
            maxval: self.ctx.maxval,
            tuple_type: self.ctx.tuple_type.clone(),
        };
        let mut writer = PnmWriter::new(output);
        writer.write_header(&header)?;
        for y in 0..self.ctx.height {
            let mut samples = Vec::with_capacity((self.ctx.width * depth) as usize);
            for x in 0..self.ctx.width {
                for p in 0..depth {
                    samples.push(self.ctx.sample(x, y, p as usize));
                }
            }
            writer.write_row(&header, &Row { samples, depth })?;
        }
        Ok(())
    }
}

fn next_i32<'a>(tokens: &mut impl Iterator<Item = &'a str>, field: &'static str) -> Result<i32, String> {
    tokens.next().ok_or_else(|| format!("missing {field}"))?.parse::<i32>().map_err(|_| format!("bad {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: i32, y: i32, z: u32) -> Vertex {
        Vertex { x, y, z, w: 1, attribs: vec![100] }
    }

    #[test]
    fn z_test_prefers_the_second_triangle_drawn_at_the_same_pixel() {
        let mut ctx = TriContext::new(32, 32, 255, 1, TupleType::Grayscale).unwrap();
        let tri_a = (vertex(0, 0, 100), vertex(30, 0, 100), vertex(0, 30, 100));
        ctx.draw_triangle(&tri_a.0, &tri_a.1, &tri_a.2).unwrap();
        let first = ctx.sample(10, 10, 0);
        assert!(ctx.alpha(10, 10) > 0);

        let tri_b = (
            Vertex { attribs: vec![200], ..vertex(0, 0, 200) },
            Vertex { attribs: vec![200], ..vertex(30, 0, 200) },
            Vertex { attribs: vec![200], ..vertex(0, 30, 200) },
        );
        ctx.draw_triangle(&tri_b.0, &tri_b.1, &tri_b.2).unwrap();
        let second = ctx.sample(10, 10, 0);
        assert_eq!(second, 200);
        assert_ne!(first, second);
    }

    #[test]
    fn attribute_count_above_ceiling_is_rejected() {
        let ctx = TriContext::new(4, 4, 255, 21, TupleType::Grayscale);
        assert!(matches!(ctx, Err(NetpbmError::PolicyLimit(_))));
    }

    #[test]
    fn touched_pixels_get_full_alpha_and_untouched_pixels_stay_zero() {
        let mut ctx = TriContext::new(16, 16, 255, 1, TupleType::Grayscale).unwrap();
        let tri = (vertex(1, 1, 50), vertex(10, 1, 50), vertex(1, 10, 50));
        ctx.draw_triangle(&tri.0, &tri.1, &tri.2).unwrap();
        assert_eq!(ctx.alpha(15, 15), 0);
        assert_eq!(ctx.alpha(2, 2), 255);
    }
}
