pub mod distance;
pub mod transform;

pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，单位为图纸单位（非像素）。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，既用于实体范围，也作为空间索引的键。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        /// 由任意两个角点构造，自动排序坐标。
        pub fn from_corners(a: Point2, b: Point2) -> Self {
            Self {
                min: Point2::from_vec(a.as_vec2().min(b.as_vec2())),
                max: Point2::from_vec(a.as_vec2().max(b.as_vec2())),
            }
        }

        /// 以点为中心、`radius` 为半边长的正方形。
        pub fn around(center: Point2, radius: f64) -> Self {
            let half = DVec2::splat(radius);
            Self {
                min: Point2::from_vec(center.as_vec2() - half),
                max: Point2::from_vec(center.as_vec2() + half),
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.x() - self.min.x()
            }
        }

        #[inline]
        pub fn height(&self) -> f64 {
            if self.is_empty() {
                0.0
            } else {
                self.max.y() - self.min.y()
            }
        }

        #[inline]
        pub fn is_finite(&self) -> bool {
            self.min.is_finite() && self.max.is_finite()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 向四周扩张 `margin`，空框保持为空。
        pub fn inflate(&self, margin: f64) -> Bounds2D {
            if self.is_empty() {
                return *self;
            }
            let delta = DVec2::splat(margin);
            Bounds2D {
                min: Point2::from_vec(self.min.as_vec2() - delta),
                max: Point2::from_vec(self.max.as_vec2() + delta),
            }
        }

        /// 闭区间相交判定，仅接触边界也视为相交。
        pub fn intersects(&self, other: &Bounds2D) -> bool {
            if self.is_empty() || other.is_empty() {
                return false;
            }
            self.min.x() <= other.max.x()
                && other.min.x() <= self.max.x()
                && self.min.y() <= other.max.y()
                && other.min.y() <= self.max.y()
        }

        pub fn contains_point(&self, point: Point2) -> bool {
            !self.is_empty()
                && point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }

        pub fn contains_bounds(&self, other: &Bounds2D) -> bool {
            !other.is_empty() && self.contains_point(other.min) && self.contains_point(other.max)
        }

        /// 点到框的欧氏距离，框内为 0，空框为正无穷。
        pub fn distance_to_point(&self, point: Point2) -> f64 {
            if self.is_empty() {
                return f64::INFINITY;
            }
            let p = point.as_vec2();
            let clamped = p.clamp(self.min.as_vec2(), self.max.as_vec2());
            p.distance(clamped)
        }

        /// 按逆时针顺序返回四个角点。
        pub fn corners(&self) -> [Point2; 4] {
            [
                self.min,
                Point2::new(self.max.x(), self.min.y()),
                self.max,
                Point2::new(self.min.x(), self.max.y()),
            ]
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let min_vec = self.min.as_vec2();
            let max_vec = self.max.as_vec2();
            let center = (min_vec + max_vec) * 0.5;
            Point2::from_vec(center)
        }
    }

}

pub mod entity {
    use std::collections::HashMap;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Vector2};

    /// 实体未声明图层时使用的哨兵图层名。
    pub const DEFAULT_LAYER: &str = "default";

    /// 文本宽度估算系数：宽度 = 字高 × 字符数 × 系数。
    pub const TEXT_WIDTH_FACTOR: f64 = 1.0;

    const ANGLE_EPSILON: f64 = 1e-9;

    /// 实体唯一标识，沿用外部场景提供的字符串 ID。
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct EntityId(String);

    impl EntityId {
        #[inline]
        pub fn new(raw: impl Into<String>) -> Self {
            Self(raw.into())
        }

        #[inline]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for EntityId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl From<&str> for EntityId {
        fn from(value: &str) -> Self {
            Self::new(value)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum EntityKind {
        Line,
        Circle,
        Arc,
        Polyline,
        Text,
        Measurement,
    }

    impl EntityKind {
        pub fn as_str(self) -> &'static str {
            match self {
                EntityKind::Line => "line",
                EntityKind::Circle => "circle",
                EntityKind::Arc => "arc",
                EntityKind::Polyline => "polyline",
                EntityKind::Text => "text",
                EntityKind::Measurement => "measurement",
            }
        }
    }

    impl fmt::Display for EntityKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
        pub is_locked: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
                is_locked: false,
            }
        }
    }

    /// 图层状态表。实体只保存图层名，可见/锁定状态在查询时查表，
    /// 因此修改图层无需重新登记实体。
    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct LayerTable {
        layers: HashMap<String, Layer>,
    }

    impl LayerTable {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) -> &mut Layer {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key))
        }

        pub fn insert(&mut self, layer: Layer) {
            self.layers.insert(layer.name.clone(), layer);
        }

        #[inline]
        pub fn get(&self, name: &str) -> Option<&Layer> {
            self.layers.get(name)
        }

        /// 未登记的图层按可见处理。
        #[inline]
        pub fn is_visible(&self, name: &str) -> bool {
            self.get(name).is_none_or(|layer| layer.is_visible)
        }

        #[inline]
        pub fn is_locked(&self, name: &str) -> bool {
            self.get(name).is_some_and(|layer| layer.is_locked)
        }

        pub fn set_visible(&mut self, name: &str, visible: bool) {
            self.ensure_layer(name).is_visible = visible;
        }

        pub fn set_locked(&mut self, name: &str, locked: bool) {
            self.ensure_layer(name).is_locked = locked;
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.layers.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.layers.is_empty()
        }

        pub fn clear(&mut self) {
            self.layers.clear();
        }
    }

    /// 圆弧扫掠方向。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Winding {
        #[default]
        CounterClockwise,
        Clockwise,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
    }

    /// 圆弧实体，角度以弧度储存，从 `start_angle` 沿 `winding` 扫到 `end_angle`。
    /// 起止角相同视为整圆。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        #[serde(default)]
        pub winding: Winding,
    }

    impl Arc {
        #[inline]
        pub fn start_point(&self) -> Point2 {
            arc_point(self.center, self.radius, self.start_angle)
        }

        #[inline]
        pub fn end_point(&self) -> Point2 {
            arc_point(self.center, self.radius, self.end_angle)
        }

        /// 以逆时针表示的扫掠区间 `(start, end)`，`start ∈ [0, 2π)`，`end > start`。
        pub fn ccw_interval(&self) -> (f64, f64) {
            match self.winding {
                Winding::CounterClockwise => canonical_interval(self.start_angle, self.end_angle),
                Winding::Clockwise => canonical_interval(self.end_angle, self.start_angle),
            }
        }

        #[inline]
        pub fn sweep(&self) -> f64 {
            let (start, end) = self.ccw_interval();
            end - start
        }

        /// 判断极角是否落在扫掠范围内（含端点）。
        pub fn contains_angle(&self, angle: f64) -> bool {
            let (start, end) = self.ccw_interval();
            let mut candidate = normalize_angle(angle);
            if candidate < start - ANGLE_EPSILON {
                candidate += TAU;
            }
            candidate <= end + ANGLE_EPSILON
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<Point2>,
        pub is_closed: bool,
    }

    impl Polyline {
        /// 依次返回各段（闭合时含首尾相连段）。
        pub fn segments(&self) -> impl Iterator<Item = (Point2, Point2)> + '_ {
            let closing = if self.is_closed && self.vertices.len() > 2 {
                self.vertices.last().copied().zip(self.vertices.first().copied())
            } else {
                None
            };
            self.vertices
                .windows(2)
                .map(|pair| (pair[0], pair[1]))
                .chain(closing)
        }
    }

    /// 单行文字，命中测试采用「字高 × 字符数」估算的包围框，不涉及字形。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
    }

    impl Text {
        /// 估算的局部框尺寸 `(宽, 高)`；空文本或非正字高时返回 `None`，退化为插入点。
        pub fn box_size(&self) -> Option<(f64, f64)> {
            let chars = self.content.trim().chars().count();
            if chars == 0 || !(self.height > 0.0) || !self.height.is_finite() {
                return None;
            }
            Some((self.height * chars as f64 * TEXT_WIDTH_FACTOR, self.height))
        }

        /// 旋转后的四个角点（逆时针），无框时返回 `None`。
        pub fn corners(&self) -> Option<[Point2; 4]> {
            let (width, height) = self.box_size()?;
            let (sin, cos) = self.rotation.sin_cos();
            let to_world = |x: f64, y: f64| {
                self.insert
                    .translate(Vector2::new(x * cos - y * sin, x * sin + y * cos))
            };
            Some([
                to_world(0.0, 0.0),
                to_world(width, 0.0),
                to_world(width, height),
                to_world(0.0, height),
            ])
        }
    }

    /// 组合测量（尺寸标注）：测量线段加一个标签锚点。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Measurement {
        pub start: Point2,
        pub end: Point2,
        pub label_position: Point2,
        #[serde(default)]
        pub label: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum Shape {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Polyline(Polyline),
        Text(Text),
        Measurement(Measurement),
    }

    impl Shape {
        pub fn kind(&self) -> EntityKind {
            match self {
                Shape::Line(_) => EntityKind::Line,
                Shape::Circle(_) => EntityKind::Circle,
                Shape::Arc(_) => EntityKind::Arc,
                Shape::Polyline(_) => EntityKind::Polyline,
                Shape::Text(_) => EntityKind::Text,
                Shape::Measurement(_) => EntityKind::Measurement,
            }
        }

        /// 所有坐标与尺寸是否为有限值。
        pub fn is_finite(&self) -> bool {
            match self {
                Shape::Line(line) => line.start.is_finite() && line.end.is_finite(),
                Shape::Circle(circle) => circle.center.is_finite() && circle.radius.is_finite(),
                Shape::Arc(arc) => {
                    arc.center.is_finite()
                        && arc.radius.is_finite()
                        && arc.start_angle.is_finite()
                        && arc.end_angle.is_finite()
                }
                Shape::Polyline(polyline) => polyline.vertices.iter().all(|v| v.is_finite()),
                Shape::Text(text) => {
                    text.insert.is_finite() && text.height.is_finite() && text.rotation.is_finite()
                }
                Shape::Measurement(measurement) => {
                    measurement.start.is_finite()
                        && measurement.end.is_finite()
                        && measurement.label_position.is_finite()
                }
            }
        }

        /// 退化几何（非正半径、少于两个顶点的多段线、非有限坐标）不可命中。
        pub fn is_hittable(&self) -> bool {
            if !self.is_finite() {
                return false;
            }
            match self {
                Shape::Circle(circle) => circle.radius > 0.0,
                Shape::Arc(arc) => arc.radius > 0.0,
                Shape::Polyline(polyline) => polyline.vertices.len() >= 2,
                Shape::Line(_) | Shape::Text(_) | Shape::Measurement(_) => true,
            }
        }

        /// 2D 轴对齐范围；不可命中的几何返回 `None`，点状几何返回零尺寸框。
        pub fn bounds(&self) -> Option<Bounds2D> {
            if !self.is_hittable() {
                return None;
            }
            let mut bounds = Bounds2D::empty();
            match self {
                Shape::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                Shape::Circle(circle) => {
                    let radius = circle.radius;
                    let center = circle.center;
                    bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                    bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
                }
                Shape::Arc(arc) => arc_bounds(arc, &mut bounds),
                Shape::Polyline(polyline) => {
                    for vertex in &polyline.vertices {
                        bounds.include_point(*vertex);
                    }
                }
                Shape::Text(text) => match text.corners() {
                    Some(corners) => {
                        for corner in corners {
                            bounds.include_point(corner);
                        }
                    }
                    None => bounds.include_point(text.insert),
                },
                Shape::Measurement(measurement) => {
                    bounds.include_point(measurement.start);
                    bounds.include_point(measurement.end);
                    bounds.include_point(measurement.label_position);
                }
            }
            if bounds.is_empty() || !bounds.is_finite() {
                None
            } else {
                Some(bounds)
            }
        }
    }

    /// 颜色、线宽等样式元数据，命中测试不使用，仅原样携带。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct EntityStyle {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub line_weight: Option<f64>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Entity {
        pub id: EntityId,
        pub layer: String,
        pub visible: bool,
        pub locked: bool,
        #[serde(default)]
        pub style: EntityStyle,
        pub shape: Shape,
    }

    impl Entity {
        pub fn new(id: impl Into<String>, layer: impl Into<String>, shape: Shape) -> Self {
            let layer = layer.into();
            Self {
                id: EntityId::new(id),
                layer: if layer.is_empty() {
                    DEFAULT_LAYER.to_string()
                } else {
                    layer
                },
                visible: true,
                locked: false,
                style: EntityStyle::default(),
                shape,
            }
        }

        pub fn with_style(mut self, style: EntityStyle) -> Self {
            self.style = style;
            self
        }

        pub fn with_visible(mut self, visible: bool) -> Self {
            self.visible = visible;
            self
        }

        pub fn with_locked(mut self, locked: bool) -> Self {
            self.locked = locked;
            self
        }

        #[inline]
        pub fn kind(&self) -> EntityKind {
            self.shape.kind()
        }

        #[inline]
        pub fn layer_name(&self) -> &str {
            &self.layer
        }

        #[inline]
        pub fn bounds(&self) -> Option<Bounds2D> {
            self.shape.bounds()
        }
    }

    pub(crate) fn normalize_angle(angle: f64) -> f64 {
        let result = angle.rem_euclid(TAU);
        // rem_euclid 对极小负数可能返回 TAU 本身
        if result >= TAU { 0.0 } else { result }
    }

    fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
        let start = normalize_angle(start);
        let mut end = normalize_angle(end);
        if (end - start).abs() < ANGLE_EPSILON {
            end = start + TAU;
        } else if end < start {
            end += TAU;
        }
        (start, end)
    }

    fn arc_point(center: Point2, radius: f64, angle: f64) -> Point2 {
        let offset = Vector2::new(radius * angle.cos(), radius * angle.sin());
        center.translate(offset)
    }

    fn arc_bounds(arc: &Arc, bounds: &mut Bounds2D) {
        let radius = arc.radius.abs();
        if radius <= f64::EPSILON {
            bounds.include_point(arc.center);
            return;
        }

        let (start, end) = arc.ccw_interval();
        bounds.include_point(arc_point(arc.center, radius, start));
        bounds.include_point(arc_point(arc.center, radius, end));

        const QUADRANTS: [f64; 4] = [0.0, FRAC_PI_2, PI, FRAC_PI_2 * 3.0];
        for base in QUADRANTS {
            let mut candidate = base;
            while candidate < start {
                candidate += TAU;
            }
            if candidate <= end {
                bounds.include_point(arc_point(arc.center, radius, candidate));
            }
        }
    }

}
