//! Rotated rectangles in image space.
//!
//! Angles are in degrees, image coordinates have y growing downwards. A
//! `RotatedRegion` with angle `a` has its width along `(cos a, sin a)` and its
//! height along `(-sin a, cos a)`.

use serde::{Deserialize, Serialize};

use std::f32::consts::PI;

// sides shorter than this are treated as degenerate
const MIN_SIDE: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis aligned box, `x`/`y` is the top left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Intersection over union, 0 when either box is empty.
    pub fn overlap_ratio(&self, other: &Rect) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = if x2 > x1 && y2 > y1 { (x2 - x1) * (y2 - y1) } else { 0.0 };
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }
}

/// Rectangle parameterized by center, size and rotation.
///
/// Invariants: `width > 0`, `height > 0`, `angle` in `(-90, 90]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatedRegion {
    center: Point,
    width: f32,
    height: f32,
    angle: f32,
}

impl RotatedRegion {
    /// Returns `None` for non-positive or non-finite sizes. The angle is
    /// wrapped into `(-90, 90]`, a half turn maps a rectangle onto itself.
    pub fn new(center: Point, width: f32, height: f32, angle: f32) -> Option<Self> {
        let finite = [center.x, center.y, width, height, angle].iter().all(|v| v.is_finite());
        if !finite || width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(Self { center, width, height, angle: wrap_angle(angle) })
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// long side / short side
    pub fn aspect(&self) -> f32 {
        self.width.max(self.height) / self.width.min(self.height)
    }

    /// Corner points in the order bottom-left, top-left, top-right, bottom-right.
    pub fn corners(&self) -> [Point; 4] {
        let (sin, cos) = (self.angle * PI / 180.0).sin_cos();
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        let c = self.center;
        let at = |du: f32, dv: f32| Point::new(c.x + du * cos - dv * sin, c.y + du * sin + dv * cos);
        [at(-hw, hh), at(-hw, -hh), at(hw, -hh), at(hw, hh)]
    }

    /// Same rectangle with the width on the long side.
    ///
    /// Near ±90 degrees a region is equivalent to its width/height swapped and
    /// the angle turned a quarter, this picks the representation whose width
    /// is the longer side.
    pub fn long_axis(&self) -> Self {
        if self.width >= self.height {
            return *self;
        }
        let angle = if self.angle > 0.0 { self.angle - 90.0 } else { self.angle + 90.0 };
        Self { center: self.center, width: self.height, height: self.width, angle: wrap_angle(angle) }
    }

    /// Smallest axis aligned box containing the region.
    pub fn bounding_rect(&self) -> Rect {
        let corners = self.corners();
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for p in corners.iter() {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Rect { x: min_x, y: min_y, width: max_x - min_x, height: max_y - min_y }
    }

    /// Intersection over union of the two rotated rectangles.
    pub fn overlap_ratio(&self, other: &RotatedRegion) -> f32 {
        let intersection = polygon_area(&clip_convex(&self.corners(), &other.corners()));
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            (intersection / union).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Minimal rotated rectangle enclosing `points`, by rotating calipers over
    /// the convex hull. `None` for fewer than 3 distinct non-collinear points.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let hull = convex_hull(points);
        if hull.len() < 3 {
            return None;
        }

        let mut best: Option<(f32, Self)> = None;
        let n = hull.len();
        for i in 0..n {
            let origin = hull[i];
            let next = hull[(i + 1) % n];
            let (ex, ey) = (next.x - origin.x, next.y - origin.y);
            let len = (ex * ex + ey * ey).sqrt();
            if len < f32::EPSILON {
                continue;
            }
            let (nx, ny) = (ex / len, ey / len);
            let (px, py) = (-ny, nx);

            let (mut min_n, mut max_n) = (f32::MAX, f32::MIN);
            let (mut min_p, mut max_p) = (f32::MAX, f32::MIN);
            for p in hull.iter() {
                let (dx, dy) = (p.x - origin.x, p.y - origin.y);
                let proj_n = nx * dx + ny * dy;
                let proj_p = px * dx + py * dy;
                min_n = min_n.min(proj_n);
                max_n = max_n.max(proj_n);
                min_p = min_p.min(proj_p);
                max_p = max_p.max(proj_p);
            }

            let (width, height) = (max_n - min_n, max_p - min_p);
            let area = width * height;
            if best.as_ref().map_or(true, |(best_area, _)| area < *best_area) {
                let (cn, cp) = ((min_n + max_n) / 2.0, (min_p + max_p) / 2.0);
                let center = Point::new(origin.x + cn * nx + cp * px, origin.y + cn * ny + cp * py);
                let angle = ny.atan2(nx) * 180.0 / PI;
                if width < MIN_SIDE || height < MIN_SIDE {
                    continue;
                }
                if let Some(region) = Self::new(center, width, height, angle) {
                    best = Some((area, region));
                }
            }
        }
        best.map(|(_, region)| region)
    }

    /// Compares two regions by their corner sets, which is independent of
    /// the width/height/angle representation chosen.
    pub fn approx_eq(&self, other: &RotatedRegion, tolerance: f32) -> bool {
        let theirs = other.corners();
        self.corners()
            .iter()
            .all(|p| theirs.iter().any(|q| p.distance(q) <= tolerance))
    }
}

/// Wraps an angle in degrees into `(-90, 90]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let mut angle = angle % 180.0;
    if angle <= -90.0 {
        angle += 180.0;
    } else if angle > 90.0 {
        angle -= 180.0;
    }
    angle
}

fn cross(o: &Point, a: &Point, b: &Point) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn signed_area(polygon: &[Point]) -> f32 {
    let n = polygon.len();
    (0..n)
        .map(|i| {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f32>()
        / 2.0
}

fn polygon_area(polygon: &[Point]) -> f32 {
    if polygon.len() < 3 {
        return 0.0;
    }
    signed_area(polygon).abs()
}

/// Sutherland-Hodgman clipping of `subject` by the convex polygon `clip`.
fn clip_convex(subject: &[Point], clip: &[Point]) -> Vec<Point> {
    let orientation = signed_area(clip).signum();
    let inside = |a: &Point, b: &Point, p: &Point| orientation * cross(a, b, p) >= 0.0;
    let intersect = |a: &Point, b: &Point, p: &Point, q: &Point| {
        let (rx, ry) = (b.x - a.x, b.y - a.y);
        let (sx, sy) = (q.x - p.x, q.y - p.y);
        let denom = rx * sy - ry * sx;
        // parallel edges never straddle, keep the start point
        if denom.abs() < f32::EPSILON {
            return *p;
        }
        let t = ((p.x - a.x) * sy - (p.y - a.y) * sx) / denom;
        Point::new(a.x + t * rx, a.y + t * ry)
    };

    let mut output = subject.to_vec();
    for i in 0..clip.len() {
        if output.is_empty() {
            break;
        }
        let (a, b) = (clip[i], clip[(i + 1) % clip.len()]);
        let input = std::mem::take(&mut output);
        for j in 0..input.len() {
            let current = input[j];
            let previous = input[(j + input.len() - 1) % input.len()];
            match (inside(&a, &b, &current), inside(&a, &b, &previous)) {
                (true, true) => output.push(current),
                (true, false) => {
                    output.push(intersect(&a, &b, &previous, &current));
                    output.push(current);
                }
                (false, true) => output.push(intersect(&a, &b, &previous, &current)),
                (false, false) => {}
            }
        }
    }
    output
}

/// Andrew's monotone chain, collinear points dropped.
fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.iter().copied().filter(|p| p.x.is_finite() && p.y.is_finite()).collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
    for p in pts.iter() {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
