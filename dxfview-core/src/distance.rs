//! 图元级精确距离与相交判定。
//!
//! 所有距离均为世界坐标下查询点到图元可见轮廓的最小欧氏距离；
//! 不可命中的图元（退化几何、非有限坐标）一律返回 `f64::INFINITY`，
//! 而不是报错。

use crate::entity::{Arc, Circle, Entity, Measurement, Polyline, Shape, Text};
use crate::geometry::{Bounds2D, Point2, Vector2};

/// 点到线段距离，投影参数截断到 `[0, 1]`；零长度线段退化为点距离。
pub fn distance_to_segment(point: Point2, start: Point2, end: Point2) -> f64 {
    let segment = Vector2::from_points(start, end);
    let length_squared = segment.length_squared();
    if length_squared <= f64::EPSILON * f64::EPSILON {
        return point.distance(start);
    }
    let t = (Vector2::from_points(start, point).dot(segment) / length_squared).clamp(0.0, 1.0);
    let foot = Point2::from_vec(start.as_vec2() + segment.as_vec2() * t);
    point.distance(foot)
}

/// 到圆周（而非圆盘）的距离。
pub fn distance_to_circle(point: Point2, circle: &Circle) -> f64 {
    if !(circle.radius > 0.0) {
        return f64::INFINITY;
    }
    (point.distance(circle.center) - circle.radius).abs()
}

/// 垂足落在扫掠范围内时取到圆周距离，否则退回到两个端点中较近者。
pub fn distance_to_arc(point: Point2, arc: &Arc) -> f64 {
    if !(arc.radius > 0.0) {
        return f64::INFINITY;
    }
    let offset = Vector2::from_points(arc.center, point);
    let from_center = offset.length();
    // 圆心到整条圆周等距
    if from_center <= f64::EPSILON {
        return arc.radius;
    }
    let angle = offset.y().atan2(offset.x());
    if arc.contains_angle(angle) {
        (from_center - arc.radius).abs()
    } else {
        let to_start = point.distance(arc.start_point());
        let to_end = point.distance(arc.end_point());
        to_start.min(to_end)
    }
}

pub fn distance_to_polyline(point: Point2, polyline: &Polyline) -> f64 {
    if polyline.vertices.len() < 2 {
        return f64::INFINITY;
    }
    polyline
        .segments()
        .map(|(start, end)| distance_to_segment(point, start, end))
        .fold(f64::INFINITY, f64::min)
}

/// 文字按旋转后的估算框计算距离，框内为 0；无框时为到插入点的距离。
pub fn distance_to_text(point: Point2, text: &Text) -> f64 {
    let Some((width, height)) = text.box_size() else {
        return point.distance(text.insert);
    };
    let local = to_text_local(point, text);
    let dx = (-local.x()).max(local.x() - width).max(0.0);
    let dy = (-local.y()).max(local.y() - height).max(0.0);
    dx.hypot(dy)
}

pub fn distance_to_measurement(point: Point2, measurement: &Measurement) -> f64 {
    let to_line = distance_to_segment(point, measurement.start, measurement.end);
    to_line.min(point.distance(measurement.label_position))
}

/// 奇偶规则的点在多边形内判定，边界上的点结果不作保证。
pub fn point_in_polygon(point: Point2, vertices: &[Point2]) -> bool {
    if vertices.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut previous = vertices[vertices.len() - 1];
    for &current in vertices {
        let crosses = (current.y() > point.y()) != (previous.y() > point.y());
        if crosses {
            let x_at = current.x()
                + (point.y() - current.y()) * (previous.x() - current.x())
                    / (previous.y() - current.y());
            if point.x() < x_at {
                inside = !inside;
            }
        }
        previous = current;
    }
    inside
}

/// Liang–Barsky 裁剪：线段与闭矩形是否有公共点。
pub fn segment_intersects_rect(start: Point2, end: Point2, rect: &Bounds2D) -> bool {
    if rect.is_empty() {
        return false;
    }
    if rect.contains_point(start) || rect.contains_point(end) {
        return true;
    }
    let delta = Vector2::from_points(start, end);
    let min = rect.min();
    let max = rect.max();
    let edges = [
        (-delta.x(), start.x() - min.x()),
        (delta.x(), max.x() - start.x()),
        (-delta.y(), start.y() - min.y()),
        (delta.y(), max.y() - start.y()),
    ];
    let mut t_enter: f64 = 0.0;
    let mut t_exit: f64 = 1.0;
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t_exit {
                return false;
            }
            t_enter = t_enter.max(r);
        } else {
            if r < t_enter {
                return false;
            }
            t_exit = t_exit.min(r);
        }
    }
    t_enter <= t_exit
}

impl Shape {
    /// 查询点到图元的最小距离；非有限查询点或不可命中图元返回正无穷。
    pub fn distance_to(&self, point: Point2) -> f64 {
        if !point.is_finite() || !self.is_hittable() {
            return f64::INFINITY;
        }
        match self {
            Shape::Line(line) => distance_to_segment(point, line.start, line.end),
            Shape::Circle(circle) => distance_to_circle(point, circle),
            Shape::Arc(arc) => distance_to_arc(point, arc),
            Shape::Polyline(polyline) => distance_to_polyline(point, polyline),
            Shape::Text(text) => distance_to_text(point, text),
            Shape::Measurement(measurement) => distance_to_measurement(point, measurement),
        }
    }

    /// 框选「交叉」模式：图元轮廓是否与矩形有公共点。
    ///
    /// 文字以估算框参与判定。
    pub fn intersects_rect(&self, rect: &Bounds2D) -> bool {
        if rect.is_empty() || !self.is_hittable() {
            return false;
        }
        match self {
            Shape::Line(line) => segment_intersects_rect(line.start, line.end, rect),
            Shape::Circle(circle) => circle_touches_rect(circle.center, circle.radius, rect),
            Shape::Arc(arc) => {
                circle_touches_rect(arc.center, arc.radius, rect)
                    && (rect.contains_point(arc.start_point())
                        || rect.contains_point(arc.end_point())
                        || arc_crosses_rect_edge(arc, rect))
            }
            Shape::Polyline(polyline) => {
                polyline
                    .segments()
                    .any(|(start, end)| segment_intersects_rect(start, end, rect))
                    // 闭合轮廓完全包住选框
                    || (polyline.is_closed
                        && point_in_polygon(rect.center(), &polyline.vertices))
            }
            Shape::Text(text) => match text.corners() {
                Some(corners) => polygon_touches_rect(&corners, rect),
                None => rect.contains_point(text.insert),
            },
            Shape::Measurement(measurement) => {
                segment_intersects_rect(measurement.start, measurement.end, rect)
                    || rect.contains_point(measurement.label_position)
            }
        }
    }
}

impl Entity {
    #[inline]
    pub fn distance_to(&self, point: Point2) -> f64 {
        self.shape.distance_to(point)
    }
}

fn to_text_local(point: Point2, text: &Text) -> Point2 {
    let offset = Vector2::from_points(text.insert, point);
    let (sin, cos) = text.rotation.sin_cos();
    Point2::new(
        offset.x() * cos + offset.y() * sin,
        -offset.x() * sin + offset.y() * cos,
    )
}

/// 圆周与矩形有交：矩形到圆心最近距离 ≤ r 且最远角点 ≥ r。
fn circle_touches_rect(center: Point2, radius: f64, rect: &Bounds2D) -> bool {
    let nearest = rect.distance_to_point(center);
    let farthest = rect
        .corners()
        .iter()
        .map(|corner| corner.distance(center))
        .fold(0.0, f64::max);
    nearest <= radius && farthest >= radius
}

/// 圆周与矩形各边的交点中是否有落在扫掠范围内的。
fn arc_crosses_rect_edge(arc: &Arc, rect: &Bounds2D) -> bool {
    let corners = rect.corners();
    (0..corners.len()).any(|i| {
        circle_segment_crossings(arc.center, arc.radius, corners[i], corners[(i + 1) % corners.len()])
            .into_iter()
            .flatten()
            .any(|point| {
                let offset = Vector2::from_points(arc.center, point);
                arc.contains_angle(offset.y().atan2(offset.x()))
            })
    })
}

/// 线段与圆周的交点（至多两个），相切时两个结果重合。
fn circle_segment_crossings(center: Point2, radius: f64, start: Point2, end: Point2) -> [Option<Point2>; 2] {
    let direction = Vector2::from_points(start, end);
    let a = direction.length_squared();
    if a <= f64::EPSILON * f64::EPSILON {
        return [None, None];
    }
    let from_center = Vector2::from_points(center, start);
    let b = 2.0 * from_center.dot(direction);
    let c = from_center.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return [None, None];
    }
    let root = discriminant.sqrt();
    [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)].map(|t| {
        (0.0..=1.0)
            .contains(&t)
            .then(|| Point2::from_vec(start.as_vec2() + direction.as_vec2() * t))
    })
}

fn polygon_touches_rect(polygon: &[Point2], rect: &Bounds2D) -> bool {
    if polygon.iter().any(|&corner| rect.contains_point(corner)) {
        return true;
    }
    if rect
        .corners()
        .iter()
        .any(|&corner| point_in_polygon(corner, polygon))
    {
        return true;
    }
    let count = polygon.len();
    (0..count).any(|i| segment_intersects_rect(polygon[i], polygon[(i + 1) % count], rect))
}
