//! 2D drawing surface for beatscope
//!
//! The renderer talks to a [`Surface`], a small canvas-like API (solid fills, radial/linear
//! gradients, strokes, sectors, additive blending). [`PixelSurface`] is the CPU implementation:
//! it rasterizes into float RGB + float alpha buffers and quantizes to RGBA8 on demand, the same
//! approach the headless frame renderer uses for export.
//!
//! Coverage is computed per pixel from analytic distances, which gives roughly one pixel of
//! anti-aliasing on every edge.

use std::f32::consts::{PI, TAU};

use egui::{Pos2, Rect, Vec2};
use image::RgbaImage;

use crate::color::Color;

// ============================================================================
// Paint
// ============================================================================

/// How new pixels combine with what is already on the surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Normal alpha compositing
    #[default]
    SourceOver,
    /// Additive ("lighter") compositing, used for glows
    Lighter,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Color,
}

/// Color ramp shared by radial and linear gradients
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Gradient {
    stops: Vec<GradientStop>,
}

impl Gradient {
    pub fn new() -> Self {
        Self { stops: Vec::with_capacity(3) }
    }

    /// Add a stop; stops are kept ordered by offset
    pub fn stop(mut self, offset: f32, color: Color) -> Self {
        let offset = offset.clamp(0.0, 1.0);
        let idx = self.stops.partition_point(|s| s.offset <= offset);
        self.stops.insert(idx, GradientStop { offset, color });
        self
    }

    /// Color at `t` in 0..1; values outside the ramp take the nearest end stop
    pub fn sample(&self, t: f32) -> Color {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Color::TRANSPARENT,
        };

        if t <= first.offset {
            return first.color;
        }
        if t >= last.offset {
            return last.color;
        }

        for pair in self.stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.offset {
                let span = (b.offset - a.offset).max(f32::EPSILON);
                return a.color.lerp(b.color, (t - a.offset) / span);
            }
        }
        last.color
    }
}

/// What a shape is filled or stroked with
#[derive(Clone, Debug, PartialEq)]
pub enum Paint {
    Solid(Color),
    Radial {
        center: Pos2,
        inner_radius: f32,
        outer_radius: f32,
        gradient: Gradient,
    },
    Linear {
        start: Pos2,
        end: Pos2,
        gradient: Gradient,
    },
}

impl Paint {
    pub fn radial(center: Pos2, outer_radius: f32, gradient: Gradient) -> Self {
        Paint::Radial {
            center,
            inner_radius: 0.0,
            outer_radius,
            gradient,
        }
    }

    pub fn linear(start: Pos2, end: Pos2, gradient: Gradient) -> Self {
        Paint::Linear { start, end, gradient }
    }

    /// Color of this paint at a point
    pub fn color_at(&self, p: Pos2) -> Color {
        match self {
            Paint::Solid(color) => *color,
            Paint::Radial {
                center,
                inner_radius,
                outer_radius,
                gradient,
            } => {
                let span = (outer_radius - inner_radius).max(f32::EPSILON);
                let t = ((p - *center).length() - inner_radius) / span;
                gradient.sample(t)
            }
            Paint::Linear { start, end, gradient } => {
                let dir = *end - *start;
                let len_sq = dir.length_sq();
                if len_sq <= f32::EPSILON {
                    return gradient.sample(0.0);
                }
                let t = (p - *start).dot(dir) / len_sq;
                gradient.sample(t)
            }
        }
    }

    /// True when nothing this paint produces can be visible
    fn is_invisible(&self) -> bool {
        match self {
            Paint::Solid(color) => color.a <= 0.0,
            Paint::Radial { gradient, .. } | Paint::Linear { gradient, .. } => {
                gradient.stops.iter().all(|s| s.color.a <= 0.0)
            }
        }
    }
}

impl From<Color> for Paint {
    fn from(color: Color) -> Self {
        Paint::Solid(color)
    }
}

// ============================================================================
// Surface trait
// ============================================================================

/// Canvas-like drawing target. Angles are radians, measured clockwise from +x (y points down).
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// A zero-sized surface turns every draw call into a no-op
    fn is_drawable(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }

    fn size(&self) -> Vec2 {
        Vec2::new(self.width() as f32, self.height() as f32)
    }

    fn set_blend(&mut self, mode: BlendMode);

    /// Replace every pixel (ignores the blend mode)
    fn clear(&mut self, color: Color);

    fn fill_rect(&mut self, rect: Rect, paint: &Paint);

    fn fill_circle(&mut self, center: Pos2, radius: f32, paint: &Paint);

    fn stroke_circle(&mut self, center: Pos2, radius: f32, width: f32, paint: &Paint);

    fn stroke_line(&mut self, from: Pos2, to: Pos2, width: f32, paint: &Paint);

    /// Pie slice from `start_angle` to `end_angle`
    fn fill_sector(
        &mut self,
        center: Pos2,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        paint: &Paint,
    );

    /// Outline of a pie slice: both radii plus the arc
    fn stroke_sector(
        &mut self,
        center: Pos2,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        width: f32,
        paint: &Paint,
    );

    /// Whole surface rectangle
    fn bounds(&self) -> Rect {
        Rect::from_min_size(Pos2::ZERO, self.size())
    }
}

// ============================================================================
// CPU implementation
// ============================================================================

/// CPU rasterizer.
///
/// RGB is kept in 0..255 float space (additive blending may overshoot and is clamped on output),
/// alpha in 0..1.
pub struct PixelSurface {
    width: u32,
    height: u32,
    rgb: Vec<f32>,
    alpha: Vec<f32>,
    blend: BlendMode,
    /// Pixels run through coverage since the last clear
    visited: u64,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let px = (width as usize) * (height as usize);
        Self {
            width,
            height,
            rgb: vec![0.0; px * 3],
            alpha: vec![0.0; px],
            blend: BlendMode::SourceOver,
            visited: 0,
        }
    }

    /// Change the surface size. Same size is a no-op, a new size starts from a blank buffer.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width == width && self.height == height {
            return;
        }
        *self = Self {
            blend: self.blend,
            ..Self::new(width, height)
        };
    }

    pub fn blend(&self) -> BlendMode {
        self.blend
    }

    /// Rasterization work since the last [`Surface::clear`], in pixels tested
    pub fn pixels_visited(&self) -> u64 {
        self.visited
    }

    /// Read back one pixel (straight alpha), `None` outside the surface
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y * self.width + x) as usize;
        let base = idx * 3;
        Some(Color::rgba(
            self.rgb[base],
            self.rgb[base + 1],
            self.rgb[base + 2],
            self.alpha[idx],
        ))
    }

    /// Quantize into an RGBA8 image
    pub fn to_rgba8(&self) -> RgbaImage {
        let mut out = vec![0u8; self.alpha.len() * 4];
        self.write_rgba8(&mut out);
        // Buffer length always matches width * height * 4
        RgbaImage::from_raw(self.width, self.height, out).unwrap_or_default()
    }

    /// Quantize into a caller-owned RGBA8 buffer (must hold width * height * 4 bytes)
    pub fn write_rgba8(&self, out: &mut [u8]) {
        for (i, px) in out.chunks_exact_mut(4).enumerate().take(self.alpha.len()) {
            let base = i * 3;
            px[0] = self.rgb[base].clamp(0.0, 255.0) as u8;
            px[1] = self.rgb[base + 1].clamp(0.0, 255.0) as u8;
            px[2] = self.rgb[base + 2].clamp(0.0, 255.0) as u8;
            px[3] = (self.alpha[i].clamp(0.0, 1.0) * 255.0) as u8;
        }
    }

    /// Pixel window covering `rect`, clipped to the surface
    fn clip(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Option<(u32, u32, u32, u32)> {
        if !self.is_drawable() {
            return None;
        }
        let x0 = min_x.floor().max(0.0);
        let y0 = min_y.floor().max(0.0);
        let x1 = max_x.ceil().min(self.width as f32 - 1.0);
        let y1 = max_y.ceil().min(self.height as f32 - 1.0);
        if x0 > x1 || y0 > y1 || !x0.is_finite() || !y1.is_finite() {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    /// Shade every pixel in the window; `coverage` returns 0..1 for a pixel center
    fn raster<F>(&mut self, window: (u32, u32, u32, u32), paint: &Paint, coverage: F)
    where
        F: Fn(Pos2) -> f32,
    {
        let (x0, y0, x1, y1) = window;
        for py in y0..=y1 {
            self.shade_row(py, x0, x1, paint, &coverage);
        }
    }

    /// Shade only the row spans a shape can reach. `spans` maps a row center to at most two
    /// x-ranges; they may be loose but must hold every pixel with nonzero coverage.
    fn raster_rows<S, F>(&mut self, min_y: f32, max_y: f32, paint: &Paint, spans: S, coverage: F)
    where
        S: Fn(f32) -> [Option<Span>; 2],
        F: Fn(Pos2) -> f32,
    {
        let Some((_, y0, _, y1)) = self.clip(0.0, min_y, 0.0, max_y) else {
            return;
        };
        let right = self.width as f32 - 1.0;
        for py in y0..=y1 {
            for (lo, hi) in spans(py as f32 + 0.5).into_iter().flatten() {
                let x0 = (lo - 1.0).floor().max(0.0);
                let x1 = (hi + 1.0).ceil().min(right);
                if x0 <= x1 {
                    self.shade_row(py, x0 as u32, x1 as u32, paint, &coverage);
                }
            }
        }
    }

    fn shade_row<F>(&mut self, py: u32, x0: u32, x1: u32, paint: &Paint, coverage: &F)
    where
        F: Fn(Pos2) -> f32,
    {
        self.visited += u64::from(x1 - x0 + 1);
        for px in x0..=x1 {
            let p = Pos2::new(px as f32 + 0.5, py as f32 + 0.5);
            let cov = coverage(p);
            if cov <= 0.0 {
                continue;
            }
            let color = paint.color_at(p);
            self.blend_pixel(px, py, color, cov.min(1.0));
        }
    }

    /// Arc of less than a full turn
    fn stroke_arc(
        &mut self,
        center: Pos2,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        width: f32,
        paint: &Paint,
    ) {
        let span = end_angle - start_angle;
        if span > PI {
            let mid = start_angle + span * 0.5;
            self.stroke_arc(center, radius, start_angle, mid, width, paint);
            self.stroke_arc(center, radius, mid, end_angle, width, paint);
            return;
        }

        let half = (width * 0.5).max(0.5);
        let thin = width.min(1.0);
        let outer = radius + half + 1.0;
        let inner = radius - half - 1.0;
        let start_dir = angle_dir(start_angle);
        let end_dir = angle_dir(end_angle);
        self.raster_rows(
            center.y - outer,
            center.y + outer,
            paint,
            |y| {
                annulus_spans(center, inner, outer, y)
                    .map(|span| span.and_then(|sp| clip_wedge(sp, center, start_dir, end_dir, y)))
            },
            |p| {
                let rel = p - center;
                edge(half - (rel.length() - radius).abs())
                    * wedge_coverage(rel, start_dir, end_dir)
                    * thin
            },
        );
    }

    fn blend_pixel(&mut self, x: u32, y: u32, color: Color, coverage: f32) {
        let a = (color.a * coverage).clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let idx = (y * self.width + x) as usize;
        let base = idx * 3;

        match self.blend {
            BlendMode::SourceOver => {
                self.rgb[base] = self.rgb[base] * (1.0 - a) + color.r * a;
                self.rgb[base + 1] = self.rgb[base + 1] * (1.0 - a) + color.g * a;
                self.rgb[base + 2] = self.rgb[base + 2] * (1.0 - a) + color.b * a;
                self.alpha[idx] = a + self.alpha[idx] * (1.0 - a);
            }
            BlendMode::Lighter => {
                self.rgb[base] += color.r * a;
                self.rgb[base + 1] += color.g * a;
                self.rgb[base + 2] += color.b * a;
                self.alpha[idx] = (self.alpha[idx] + a).min(1.0);
            }
        }
    }
}

/// Signed-distance coverage with a one pixel soft edge
fn edge(distance_inside: f32) -> f32 {
    (distance_inside + 0.5).clamp(0.0, 1.0)
}

fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Coverage of a wedge spanning at most half a turn
fn wedge_coverage(rel: Vec2, start_dir: Vec2, end_dir: Vec2) -> f32 {
    edge(cross(start_dir, rel)) * edge(cross(rel, end_dir))
}

fn segment_distance(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq <= f32::EPSILON {
        return (p - a).length();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).length()
}

fn angle_dir(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

// Row spans: horizontal extents a shape can touch on the row through `y`

type Span = (f32, f32);

fn disk_span(center: Pos2, radius: f32, y: f32) -> Option<Span> {
    let dy = y - center.y;
    if radius <= 0.0 || dy.abs() > radius {
        return None;
    }
    let dx = (radius * radius - dy * dy).sqrt();
    Some((center.x - dx, center.x + dx))
}

/// Ring between `inner` and `outer`: up to two spans
fn annulus_spans(center: Pos2, inner: f32, outer: f32, y: f32) -> [Option<Span>; 2] {
    let Some((lo, hi)) = disk_span(center, outer, y) else {
        return [None, None];
    };
    match disk_span(center, inner, y) {
        // Keep the two halves from sharing pixels
        Some((ilo, ihi)) if ihi - ilo > 4.0 => [Some((lo, ilo)), Some((ihi, hi))],
        _ => [Some((lo, hi)), None],
    }
}

/// Narrow `span` to the points with `normal . (p - origin) >= -pad`
fn clip_half_plane(span: Span, origin: Pos2, normal: Vec2, pad: f32, y: f32) -> Option<Span> {
    let rest = -pad - normal.y * (y - origin.y);
    if normal.x.abs() <= 1e-6 {
        return (rest <= 0.0).then_some(span);
    }
    let bound = origin.x + rest / normal.x;
    let (lo, hi) = if normal.x > 0.0 {
        (span.0.max(bound), span.1)
    } else {
        (span.0, span.1.min(bound))
    };
    (lo <= hi).then_some((lo, hi))
}

/// Both half-planes of a convex wedge, soft edge included
fn clip_wedge(span: Span, center: Pos2, start_dir: Vec2, end_dir: Vec2, y: f32) -> Option<Span> {
    clip_half_plane(span, center, Vec2::new(-start_dir.y, start_dir.x), 1.0, y)
        .and_then(|sp| clip_half_plane(sp, center, Vec2::new(end_dir.y, -end_dir.x), 1.0, y))
}

/// Points within `reach` of the segment `a`-`b`
fn capsule_span(a: Pos2, b: Pos2, reach: f32, y: f32) -> Option<Span> {
    let span = (a.x.min(b.x) - reach, a.x.max(b.x) + reach);
    let d = b - a;
    let len = d.length();
    if len <= f32::EPSILON {
        return Some(span);
    }
    let normal = Vec2::new(-d.y, d.x) / len;
    clip_half_plane(span, a, normal, reach, y)
        .and_then(|sp| clip_half_plane(sp, a, -normal, reach, y))
}

impl Surface for PixelSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn set_blend(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    fn clear(&mut self, color: Color) {
        self.visited = 0;
        for (i, a) in self.alpha.iter_mut().enumerate() {
            let base = i * 3;
            self.rgb[base] = color.r;
            self.rgb[base + 1] = color.g;
            self.rgb[base + 2] = color.b;
            *a = color.a.clamp(0.0, 1.0);
        }
    }

    fn fill_rect(&mut self, rect: Rect, paint: &Paint) {
        if paint.is_invisible() {
            return;
        }
        let Some(window) = self.clip(rect.min.x, rect.min.y, rect.max.x - 1.0, rect.max.y - 1.0)
        else {
            return;
        };
        self.raster(window, paint, |p| {
            if rect.contains(p) {
                1.0
            } else {
                0.0
            }
        });
    }

    fn fill_circle(&mut self, center: Pos2, radius: f32, paint: &Paint) {
        if radius <= 0.0 || paint.is_invisible() {
            return;
        }
        let reach = radius + 1.0;
        self.raster_rows(
            center.y - reach,
            center.y + reach,
            paint,
            |y| [disk_span(center, reach, y), None],
            |p| edge(radius - (p - center).length()),
        );
    }

    fn stroke_circle(&mut self, center: Pos2, radius: f32, width: f32, paint: &Paint) {
        if radius <= 0.0 || width <= 0.0 || paint.is_invisible() {
            return;
        }
        // Hairlines keep a one pixel footprint but fade with their width
        let thin = width.min(1.0);
        let half = (width * 0.5).max(0.5);
        let outer = radius + half + 1.0;
        let inner = radius - half - 1.0;
        self.raster_rows(
            center.y - outer,
            center.y + outer,
            paint,
            |y| annulus_spans(center, inner, outer, y),
            |p| edge(half - ((p - center).length() - radius).abs()) * thin,
        );
    }

    fn stroke_line(&mut self, from: Pos2, to: Pos2, width: f32, paint: &Paint) {
        if width <= 0.0 || paint.is_invisible() {
            return;
        }
        let half = (width * 0.5).max(0.5);
        let thin = width.min(1.0);
        let reach = half + 1.0;
        self.raster_rows(
            from.y.min(to.y) - reach,
            from.y.max(to.y) + reach,
            paint,
            |y| [capsule_span(from, to, reach, y), None],
            |p| edge(half - segment_distance(p, from, to)) * thin,
        );
    }

    fn fill_sector(
        &mut self,
        center: Pos2,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        paint: &Paint,
    ) {
        let span = end_angle - start_angle;
        if radius <= 0.0 || span <= 0.0 || paint.is_invisible() {
            return;
        }
        if span >= TAU {
            self.fill_circle(center, radius, paint);
            return;
        }
        if span > PI {
            // Wedge coverage only handles convex slices
            let mid = start_angle + span * 0.5;
            self.fill_sector(center, radius, start_angle, mid, paint);
            self.fill_sector(center, radius, mid, end_angle, paint);
            return;
        }

        let reach = radius + 1.0;
        let start_dir = angle_dir(start_angle);
        let end_dir = angle_dir(end_angle);
        self.raster_rows(
            center.y - reach,
            center.y + reach,
            paint,
            |y| {
                let span = disk_span(center, reach, y)
                    .and_then(|sp| clip_wedge(sp, center, start_dir, end_dir, y));
                [span, None]
            },
            |p| {
                let rel = p - center;
                edge(radius - rel.length()) * wedge_coverage(rel, start_dir, end_dir)
            },
        );
    }

    fn stroke_sector(
        &mut self,
        center: Pos2,
        radius: f32,
        start_angle: f32,
        end_angle: f32,
        width: f32,
        paint: &Paint,
    ) {
        let span = end_angle - start_angle;
        if radius <= 0.0 || width <= 0.0 || span <= 0.0 || paint.is_invisible() {
            return;
        }

        self.stroke_line(center, center + angle_dir(start_angle) * radius, width, paint);
        self.stroke_line(center, center + angle_dir(end_angle) * radius, width, paint);

        if span >= TAU {
            self.stroke_circle(center, radius, width, paint);
            return;
        }

        self.stroke_arc(center, radius, start_angle, end_angle, width, paint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn red() -> Color {
        Color::rgba(255.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn gradient_sampling_clamps_and_interpolates() {
        let g = Gradient::new()
            .stop(1.0, Color::WHITE)
            .stop(0.0, Color::BLACK);
        assert_eq!(g.sample(-1.0), Color::BLACK);
        assert_eq!(g.sample(2.0), Color::WHITE);
        assert_abs_diff_eq!(g.sample(0.5).r, 127.5, epsilon = 0.01);
    }

    #[test]
    fn empty_gradient_is_transparent() {
        assert_eq!(Gradient::new().sample(0.3), Color::TRANSPARENT);
    }

    #[test]
    fn circle_fill_covers_center_not_corner() {
        let mut s = PixelSurface::new(40, 40);
        s.clear(Color::BLACK);
        s.fill_circle(Pos2::new(20.0, 20.0), 8.0, &red().into());

        let center = s.pixel(20, 20).unwrap();
        assert_abs_diff_eq!(center.r, 255.0, epsilon = 0.01);
        let corner = s.pixel(1, 1).unwrap();
        assert_abs_diff_eq!(corner.r, 0.0, epsilon = 0.01);
    }

    #[test]
    fn lighter_blend_accumulates() {
        let mut s = PixelSurface::new(10, 10);
        s.clear(Color::BLACK);
        s.set_blend(BlendMode::Lighter);
        let half_red = Color::rgba(100.0, 0.0, 0.0, 1.0);
        s.fill_rect(s.bounds(), &half_red.into());
        s.fill_rect(s.bounds(), &half_red.into());
        assert_abs_diff_eq!(s.pixel(5, 5).unwrap().r, 200.0, epsilon = 0.01);
    }

    #[test]
    fn source_over_blends_by_alpha() {
        let mut s = PixelSurface::new(4, 4);
        s.clear(Color::BLACK);
        s.fill_rect(s.bounds(), &Color::rgba(200.0, 0.0, 0.0, 0.5).into());
        assert_abs_diff_eq!(s.pixel(0, 0).unwrap().r, 100.0, epsilon = 0.01);
    }

    #[test]
    fn sector_only_paints_inside_its_angle() {
        let mut s = PixelSurface::new(60, 60);
        s.clear(Color::BLACK);
        // Quarter slice pointing to +x / +y (lower right quadrant)
        s.fill_sector(Pos2::new(30.0, 30.0), 25.0, 0.0, PI / 2.0, &red().into());

        assert!(s.pixel(40, 40).unwrap().r > 250.0);
        assert!(s.pixel(20, 20).unwrap().r < 1.0);
        assert!(s.pixel(40, 20).unwrap().r < 1.0);
    }

    #[test]
    fn wide_sectors_are_split() {
        let mut s = PixelSurface::new(60, 60);
        s.clear(Color::BLACK);
        s.fill_sector(Pos2::new(30.0, 30.0), 25.0, 0.0, 1.5 * PI, &red().into());

        assert!(s.pixel(20, 40).unwrap().r > 250.0);
        assert!(s.pixel(20, 20).unwrap().r > 250.0);
        assert!(s.pixel(40, 20).unwrap().r < 1.0);
    }

    #[test]
    fn zero_size_surface_ignores_draws() {
        let mut s = PixelSurface::new(0, 0);
        assert!(!s.is_drawable());
        s.fill_circle(Pos2::new(0.0, 0.0), 10.0, &red().into());
        s.stroke_line(Pos2::ZERO, Pos2::new(5.0, 5.0), 2.0, &red().into());
        assert!(s.pixel(0, 0).is_none());
        assert_eq!(s.to_rgba8().len(), 0);
    }

    #[test]
    fn resize_is_idempotent() {
        let mut s = PixelSurface::new(8, 8);
        s.clear(Color::WHITE);
        s.resize(8, 8);
        assert_eq!(s.pixel(3, 3), Some(Color::WHITE));
        s.resize(16, 4);
        assert_eq!((s.width(), s.height()), (16, 4));
        assert_eq!(s.pixel(3, 3).map(|c| c.a), Some(0.0));
    }

    #[test]
    fn radial_paint_fades_outward() {
        let paint = Paint::radial(
            Pos2::new(0.0, 0.0),
            10.0,
            Gradient::new()
                .stop(0.0, Color::WHITE)
                .stop(1.0, Color::TRANSPARENT),
        );
        let near = paint.color_at(Pos2::new(1.0, 0.0));
        let far = paint.color_at(Pos2::new(9.0, 0.0));
        assert!(near.a > far.a);
    }

    #[test]
    fn quantize_to_rgba8() {
        let mut s = PixelSurface::new(2, 1);
        s.clear(Color::rgba(300.0, 10.0, -5.0, 1.0));
        let img = s.to_rgba8();
        assert_eq!(img.get_pixel(1, 0).0, [255, 10, 0, 255]);
    }

    /// The same shape shaded over every pixel of the surface
    fn full_window<F: Fn(Pos2) -> f32>(w: u32, h: u32, paint: &Paint, coverage: F) -> PixelSurface {
        let mut s = PixelSurface::new(w, h);
        s.clear(Color::BLACK);
        let window = s.clip(0.0, 0.0, w as f32, h as f32).unwrap();
        s.raster(window, paint, coverage);
        s
    }

    fn assert_same_pixels(a: &PixelSurface, b: &PixelSurface) {
        assert_eq!(a.to_rgba8().as_raw(), b.to_rgba8().as_raw());
    }

    #[test]
    fn sector_spans_match_full_raster() {
        let c = Pos2::new(37.3, 29.8);
        let radius = 45.0;
        for start in [0.0, 0.3, 1.9, 2.8, 4.0, 5.5] {
            for span in [0.2, 0.4, PI / 2.0, 2.5, PI] {
                let end = start + span;
                let mut s = PixelSurface::new(80, 64);
                s.clear(Color::BLACK);
                s.fill_sector(c, radius, start, end, &red().into());

                let (sd, ed) = (angle_dir(start), angle_dir(end));
                let reference = full_window(80, 64, &red().into(), |p| {
                    let rel = p - c;
                    edge(radius - rel.length()) * wedge_coverage(rel, sd, ed)
                });
                assert_same_pixels(&s, &reference);
                assert!(s.pixels_visited() < reference.pixels_visited());
            }
        }
    }

    #[test]
    fn arc_and_ring_spans_match_full_raster() {
        let c = Pos2::new(40.0, 30.0);
        let paint: Paint = Color::rgba(0.0, 200.0, 90.0, 0.8).into();

        for width in [0.5, 2.0, 7.0] {
            let mut s = PixelSurface::new(80, 60);
            s.clear(Color::BLACK);
            s.stroke_circle(c, 22.0, width, &paint);
            let half = (width * 0.5).max(0.5);
            let thin = width.min(1.0);
            let reference = full_window(80, 60, &paint, |p| {
                edge(half - ((p - c).length() - 22.0).abs()) * thin
            });
            assert_same_pixels(&s, &reference);

            let (start, end) = (0.7, 2.1);
            let mut s = PixelSurface::new(80, 60);
            s.clear(Color::BLACK);
            s.stroke_arc(c, 22.0, start, end, width, &paint);
            let (sd, ed) = (angle_dir(start), angle_dir(end));
            let reference = full_window(80, 60, &paint, |p| {
                let rel = p - c;
                edge(half - (rel.length() - 22.0).abs()) * wedge_coverage(rel, sd, ed) * thin
            });
            assert_same_pixels(&s, &reference);
        }
    }

    #[test]
    fn line_spans_match_full_raster() {
        let paint: Paint = Color::rgba(255.0, 255.0, 0.0, 1.0).into();
        let segments = [
            (Pos2::new(3.0, 4.0), Pos2::new(70.0, 50.0)),
            (Pos2::new(70.0, 10.0), Pos2::new(5.0, 12.0)),
            (Pos2::new(40.0, 2.0), Pos2::new(40.5, 58.0)),
            (Pos2::new(20.0, 20.0), Pos2::new(20.0, 20.0)),
        ];
        for (a, b) in segments {
            let mut s = PixelSurface::new(80, 60);
            s.clear(Color::BLACK);
            s.stroke_line(a, b, 3.0, &paint);
            let reference = full_window(80, 60, &paint, |p| edge(1.5 - segment_distance(p, a, b)));
            assert_same_pixels(&s, &reference);
        }
    }

    #[test]
    fn thin_ring_visits_a_fraction_of_its_square() {
        let mut s = PixelSurface::new(400, 400);
        s.clear(Color::BLACK);
        s.stroke_circle(Pos2::new(200.0, 200.0), 180.0, 2.0, &red().into());
        // Square would be ~366 * 366
        assert!(s.pixels_visited() < 30_000, "visited {}", s.pixels_visited());

        s.clear(Color::BLACK);
        assert_eq!(s.pixels_visited(), 0);
    }
}
