//! Cubic Bézier geometry kernel.
//!
//! Stateless helpers over `kurbo` points. A [`BezierCurve`] is the
//! serialized quadruple `(start, control1, control2, end)`. Points are
//! evaluated relative to `start` so the endpoints and any axis shared by
//! all four points come out exact; derivatives go through
//! `kurbo::CubicBez`.
//!
//! Sampled algorithms (length, closest point, bounding box) are
//! approximations with a caller-chosen sample count. Closest-point
//! search breaks ties toward the lowest `t`.

use kurbo::{CubicBez, ParamCurve, ParamCurveDeriv, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Default subdivision count for arc length and closest point queries.
pub const DEFAULT_SAMPLES: usize = 100;

/// Samples used for bounding boxes of a single curve.
pub const BBOX_SAMPLES: usize = 50;

/// A cubic Bézier: `B(t) = (1−t)³P₀ + 3(1−t)²tP₁ + 3(1−t)t²P₂ + t³P₃`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BezierCurve {
    pub start: Point,
    pub control1: Point,
    pub control2: Point,
    pub end: Point,
}

/// Result of [`BezierCurve::closest_point`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub t: f64,
    pub distance: f64,
    pub point: Point,
}

impl BezierCurve {
    pub const fn new(start: Point, control1: Point, control2: Point, end: Point) -> Self {
        Self {
            start,
            control1,
            control2,
            end,
        }
    }

    /// A degenerate curve with every point at `p`.
    pub const fn point(p: Point) -> Self {
        Self::new(p, p, p, p)
    }

    /// Straight line with controls at 1/3 and 2/3 of the chord.
    pub fn line(start: Point, end: Point) -> Self {
        let third = (end - start) / 3.0;
        Self::new(start, start + third, end - third, end)
    }

    pub fn to_cubic(&self) -> CubicBez {
        CubicBez::new(self.start, self.control1, self.control2, self.end)
    }

    /// `B(t)` for `t` clamped to `[0, 1]`.
    pub fn point_at(&self, t: f64) -> Point {
        if t <= 0.0 {
            return self.start;
        }
        if t >= 1.0 {
            return self.end;
        }
        let mt = 1.0 - t;
        self.start
            + (self.control1 - self.start) * (3.0 * mt * mt * t)
            + (self.control2 - self.start) * (3.0 * mt * t * t)
            + (self.end - self.start) * (t * t * t)
    }

    /// Every point coincides with `start`.
    pub fn is_degenerate(&self) -> bool {
        self.control1 == self.start && self.control2 == self.start && self.end == self.start
    }

    /// First derivative `B'(t)`.
    pub fn tangent_at(&self, t: f64) -> Vec2 {
        self.to_cubic().deriv().eval(t).to_vec2()
    }

    /// Unit tangent rotated by +90°, or zero when the tangent degenerates.
    pub fn normal_at(&self, t: f64) -> Vec2 {
        let tangent = self.tangent_at(t);
        let len = tangent.hypot();
        if len == 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new(-tangent.y / len, tangent.x / len)
    }

    /// Polyline length over `samples` equal parameter steps.
    pub fn length(&self, samples: usize) -> f64 {
        if samples == 0 || self.is_degenerate() {
            return 0.0;
        }
        let mut prev = self.start;
        let mut total = 0.0;
        for i in 1..=samples {
            let p = self.point_at(i as f64 / samples as f64);
            total += prev.distance(p);
            prev = p;
        }
        total
    }

    /// De Casteljau split. Both halves share the split point exactly.
    pub fn split(&self, t: f64) -> (Self, Self) {
        let p01 = self.start.lerp(self.control1, t);
        let p12 = self.control1.lerp(self.control2, t);
        let p23 = self.control2.lerp(self.end, t);
        let p012 = p01.lerp(p12, t);
        let p123 = p12.lerp(p23, t);
        let mid = p012.lerp(p123, t);
        (
            Self::new(self.start, p01, p012, mid),
            Self::new(mid, p123, p23, self.end),
        )
    }

    /// Sampled nearest point to `p` over `t = i / samples`.
    pub fn closest_point(&self, p: Point, samples: usize) -> ClosestPoint {
        let samples = samples.max(1);
        let mut best = ClosestPoint {
            t: 0.0,
            distance: f64::INFINITY,
            point: self.start,
        };
        for i in 0..=samples {
            let t = i as f64 / samples as f64;
            let q = self.point_at(t);
            let d = q.distance(p);
            if d < best.distance {
                best = ClosestPoint {
                    t,
                    distance: d,
                    point: q,
                };
            }
        }
        best
    }

    /// Bounding box of `BBOX_SAMPLES + 1` sampled points.
    pub fn bounding_box(&self) -> Rect {
        sampled_bounds(self, BBOX_SAMPLES)
    }

    pub fn translated(&self, offset: Vec2) -> Self {
        self.map_points(|p| p + offset)
    }

    pub fn rotated(&self, center: Point, angle: f64) -> Self {
        self.map_points(|p| rotate_point(p, center, angle))
    }

    pub fn scaled(&self, factor: f64, origin: Point) -> Self {
        self.map_points(|p| origin + (p - origin) * factor)
    }

    /// True when both controls lie within 1px of the start on each axis.
    /// Such a segment is drawn as a straight line.
    pub fn is_nascent(&self) -> bool {
        let near = |c: Point| {
            (c.x - self.start.x).abs() <= 1.0 && (c.y - self.start.y).abs() <= 1.0
        };
        near(self.control1) && near(self.control2)
    }

    pub fn map_points(&self, mut f: impl FnMut(Point) -> Point) -> Self {
        Self::new(f(self.start), f(self.control1), f(self.control2), f(self.end))
    }
}

/// Bounding rectangle of the points `B(i / samples)`.
pub fn sampled_bounds(curve: &BezierCurve, samples: usize) -> Rect {
    let samples = samples.max(1);
    let mut rect = Rect::from_points(curve.start, curve.start);
    for i in 1..=samples {
        rect = rect.union_pt(curve.point_at(i as f64 / samples as f64));
    }
    rect
}

// ─── Elementary helpers ─────────────────────────────────────────────────

pub fn distance(a: Point, b: Point) -> f64 {
    a.distance(b)
}

/// Angle of the vector `a → b` in radians.
pub fn angle_between_points(a: Point, b: Point) -> f64 {
    (b - a).atan2()
}

/// Rotate `p` about `center` by `angle` radians.
pub fn rotate_point(p: Point, center: Point, angle: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    let d = p - center;
    Point::new(
        center.x + d.x * cos - d.y * sin,
        center.y + d.x * sin + d.y * cos,
    )
}

/// Round `value` to the nearest multiple of `grid` (half rounds away from zero).
pub fn snap_to_grid(value: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        return value;
    }
    (value / grid).round() * grid
}

pub fn snap_point_to_grid(p: Point, grid: f64) -> Point {
    Point::new(snap_to_grid(p.x, grid), snap_to_grid(p.y, grid))
}

pub fn snap_vec_to_grid(v: Vec2, grid: f64) -> Vec2 {
    Vec2::new(snap_to_grid(v.x, grid), snap_to_grid(v.y, grid))
}

/// Inclusive point-in-rectangle test. `rect` may be unnormalized.
pub fn point_in_rect(p: Point, rect: Rect) -> bool {
    let r = rect.abs();
    p.x >= r.x0 && p.x <= r.x1 && p.y >= r.y0 && p.y <= r.y1
}
