//! 宿主场景的外部表示及其到内部实体模型的转换。
//!
//! 外部结构由宿主（解析器输出）决定，字段松散、允许缺省与多余字段；
//! 转换阶段负责校验，单个实体出错只影响它自己。

use std::collections::BTreeMap;

use dxfview_core::entity::{
    Arc, Circle, Entity, EntityStyle, Line, Measurement, Polyline, Shape, Text, Winding,
};
use dxfview_core::geometry::Point2;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::errors::EngineError;

/// 文字缺少字高时使用的默认值（世界单位）。
pub const DEFAULT_TEXT_HEIGHT: f64 = 2.5;

/// 单个外部实体无法转换的原因。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("entity has no id")]
    MissingId,
    #[error("entity id `{0}` is already in use")]
    DuplicateId(String),
    #[error("{kind} entity is missing `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("{kind} entity has a non-finite `{field}`")]
    NonFinite {
        kind: &'static str,
        field: &'static str,
    },
    #[error("unsupported entity type `{0}`")]
    UnsupportedType(String),
    #[error("malformed entity: {0}")]
    Malformed(String),
}

/// 被跳过的实体：在输入列表中的位置、可识别时的 ID 以及原因。
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntity {
    pub index: usize,
    pub id: Option<String>,
    pub reason: ConversionError,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenePoint {
    #[serde(alias = "X")]
    pub x: f64,
    #[serde(alias = "Y")]
    pub y: f64,
}

impl ScenePoint {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<ScenePoint> for Point2 {
    fn from(value: ScenePoint) -> Self {
        Point2::new(value.x, value.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneLayer {
    pub visible: bool,
    pub locked: bool,
}

impl Default for SceneLayer {
    fn default() -> Self {
        Self {
            visible: true,
            locked: false,
        }
    }
}

/// 外部实体。`type` 决定需要哪些几何字段，其余字段缺省即可。
///
/// 圆弧角度与文字旋转使用角度制（DXF 约定）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneEntity {
    #[serde(deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub layer: Option<String>,
    pub visible: Option<bool>,
    pub locked: Option<bool>,
    /// 颜色可以是名称、十六进制串或 ACI 色号，统一保存为字符串。
    #[serde(deserialize_with = "loose_string")]
    pub color: Option<String>,
    #[serde(alias = "line_weight")]
    pub line_weight: Option<f64>,
    #[serde(alias = "startPoint", alias = "p1")]
    pub start: Option<ScenePoint>,
    #[serde(alias = "endPoint", alias = "p2")]
    pub end: Option<ScenePoint>,
    #[serde(alias = "centerPoint")]
    pub center: Option<ScenePoint>,
    #[serde(alias = "r")]
    pub radius: Option<f64>,
    #[serde(alias = "start_angle")]
    pub start_angle: Option<f64>,
    #[serde(alias = "end_angle")]
    pub end_angle: Option<f64>,
    pub clockwise: Option<bool>,
    #[serde(alias = "points")]
    pub vertices: Option<Vec<ScenePoint>>,
    #[serde(alias = "isClosed", alias = "is_closed")]
    pub closed: Option<bool>,
    pub corner1: Option<ScenePoint>,
    pub corner2: Option<ScenePoint>,
    #[serde(
        alias = "insert",
        alias = "insertionPoint",
        alias = "insertion_point",
        alias = "location"
    )]
    pub position: Option<ScenePoint>,
    #[serde(alias = "content")]
    pub text: Option<String>,
    #[serde(alias = "fontSize")]
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    #[serde(alias = "label_position")]
    pub label_position: Option<ScenePoint>,
    pub label: Option<String>,
}

impl SceneEntity {
    fn typed(id: &str, kind: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            kind: Some(kind.to_string()),
            ..Self::default()
        }
    }

    pub fn line(id: &str, start: ScenePoint, end: ScenePoint) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            ..Self::typed(id, "line")
        }
    }

    pub fn circle(id: &str, center: ScenePoint, radius: f64) -> Self {
        Self {
            center: Some(center),
            radius: Some(radius),
            ..Self::typed(id, "circle")
        }
    }

    /// 角度制，逆时针。
    pub fn arc(id: &str, center: ScenePoint, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            center: Some(center),
            radius: Some(radius),
            start_angle: Some(start_angle),
            end_angle: Some(end_angle),
            ..Self::typed(id, "arc")
        }
    }

    pub fn polyline(id: &str, vertices: Vec<ScenePoint>, closed: bool) -> Self {
        Self {
            vertices: Some(vertices),
            closed: Some(closed),
            ..Self::typed(id, "polyline")
        }
    }

    pub fn text(id: &str, position: ScenePoint, content: &str, height: f64) -> Self {
        Self {
            position: Some(position),
            text: Some(content.to_string()),
            height: Some(height),
            ..Self::typed(id, "text")
        }
    }

    pub fn measurement(id: &str, start: ScenePoint, end: ScenePoint, label: &str) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            label: Some(label.to_string()),
            ..Self::typed(id, "measurement")
        }
    }

    pub fn on_layer(mut self, layer: &str) -> Self {
        self.layer = Some(layer.to_string());
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = Some(locked);
        self
    }

    /// 去除空白后的非空 ID。
    pub fn id(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// 宿主传入的完整场景：实体列表加图层名 → 状态映射。
///
/// 图层既可以写成映射，也可以写成带 `name` 的列表。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    #[serde(default)]
    pub entities: Vec<SceneEntity>,
    #[serde(default, deserialize_with = "layer_states")]
    pub layers: BTreeMap<String, SceneLayer>,
    /// 解析阶段就无法识别的实体，在场景更新时并入跳过报告。
    #[serde(skip)]
    pub rejected: Vec<SkippedEntity>,
}

#[derive(Deserialize)]
struct RawScene {
    #[serde(default)]
    entities: Vec<Value>,
    #[serde(default, deserialize_with = "layer_states")]
    layers: BTreeMap<String, SceneLayer>,
}

/// 字符串字段的宽松读取：数字与布尔值转成文本，其它类型视为缺省。
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(value) => value_to_string(&value),
        None => None,
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LayerSet {
    Map(BTreeMap<String, SceneLayer>),
    List(Vec<NamedLayer>),
}

#[derive(Deserialize)]
struct NamedLayer {
    #[serde(default, deserialize_with = "loose_string")]
    name: Option<String>,
    #[serde(default = "visible_by_default")]
    visible: bool,
    #[serde(default)]
    locked: bool,
}

fn visible_by_default() -> bool {
    true
}

/// 图层状态：映射按原样接收；列表形式中没有名称的条目被忽略。
fn layer_states<'de, D>(deserializer: D) -> Result<BTreeMap<String, SceneLayer>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<LayerSet>::deserialize(deserializer)? {
        None => BTreeMap::new(),
        Some(LayerSet::Map(layers)) => layers,
        Some(LayerSet::List(layers)) => layers
            .into_iter()
            .filter_map(|layer| {
                let name = layer.name?.trim().to_string();
                (!name.is_empty()).then_some((
                    name,
                    SceneLayer {
                        visible: layer.visible,
                        locked: layer.locked,
                    },
                ))
            })
            .collect(),
    })
}

impl SceneData {
    /// 逐个解析实体；单个实体结构不符只记录在 `rejected` 中，
    /// 只有整体不是合法场景 JSON 时才返回错误。
    pub fn from_json_str(source: &str) -> Result<Self, EngineError> {
        let raw: RawScene = serde_json::from_str(source)?;
        let mut scene = SceneData {
            entities: Vec::with_capacity(raw.entities.len()),
            layers: raw.layers,
            rejected: Vec::new(),
        };
        for (index, value) in raw.entities.into_iter().enumerate() {
            let id = value.get("id").and_then(value_to_string);
            match serde_json::from_value::<SceneEntity>(value) {
                Ok(entity) => scene.entities.push(entity),
                Err(err) => scene.rejected.push(SkippedEntity {
                    index,
                    id,
                    reason: ConversionError::Malformed(err.to_string()),
                }),
            }
        }
        Ok(scene)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// 一组覆盖全部实体类型的示例，供命令行演示与快速验证。
    pub fn demo() -> Self {
        let entities = vec![
            SceneEntity::line("baseline", ScenePoint::new(0.0, 0.0), ScenePoint::new(100.0, 0.0))
                .on_layer("0"),
            SceneEntity::circle("hole", ScenePoint::new(50.0, 25.0), 12.5).on_layer("ANNOT"),
            SceneEntity::arc("fillet", ScenePoint::new(20.0, 10.0), 7.5, 0.0, 90.0)
                .on_layer("ANNOT"),
            SceneEntity::polyline(
                "sketch",
                vec![
                    ScenePoint::new(0.0, 10.0),
                    ScenePoint::new(10.0, 20.0),
                    ScenePoint::new(25.0, 5.0),
                ],
                false,
            )
            .on_layer("SKETCH"),
            SceneEntity {
                rotation: Some(45.0),
                ..SceneEntity::text("label", ScenePoint::new(5.0, 12.0), "dxfview 示例", 3.5)
            }
            .on_layer("ANNOT"),
            SceneEntity::measurement(
                "span",
                ScenePoint::new(0.0, -10.0),
                ScenePoint::new(100.0, -10.0),
                "100",
            )
            .on_layer("DIM"),
        ];
        let layers = ["0", "ANNOT", "SKETCH", "DIM"]
            .into_iter()
            .map(|name| (name.to_string(), SceneLayer::default()))
            .collect();
        debug!(entities = entities.len(), "已生成演示场景");
        SceneData {
            entities,
            layers,
            rejected: Vec::new(),
        }
    }
}

fn require_point(
    kind: &'static str,
    field: &'static str,
    value: Option<ScenePoint>,
) -> Result<Point2, ConversionError> {
    let point = value.ok_or(ConversionError::MissingField { kind, field })?;
    if point.x.is_finite() && point.y.is_finite() {
        Ok(point.into())
    } else {
        Err(ConversionError::NonFinite { kind, field })
    }
}

fn require_number(
    kind: &'static str,
    field: &'static str,
    value: Option<f64>,
) -> Result<f64, ConversionError> {
    let number = value.ok_or(ConversionError::MissingField { kind, field })?;
    if number.is_finite() {
        Ok(number)
    } else {
        Err(ConversionError::NonFinite { kind, field })
    }
}

fn optional_number(
    kind: &'static str,
    field: &'static str,
    value: Option<f64>,
    fallback: f64,
) -> Result<f64, ConversionError> {
    require_number(kind, field, Some(value.unwrap_or(fallback)))
}

impl TryFrom<&SceneEntity> for Entity {
    type Error = ConversionError;

    fn try_from(source: &SceneEntity) -> Result<Self, Self::Error> {
        let id = source.id().ok_or(ConversionError::MissingId)?;
        let raw_kind = source
            .kind
            .as_deref()
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .ok_or(ConversionError::MissingField {
                kind: "entity",
                field: "type",
            })?;

        let shape = match raw_kind.to_ascii_lowercase().as_str() {
            "line" => Shape::Line(Line {
                start: require_point("line", "start", source.start)?,
                end: require_point("line", "end", source.end)?,
            }),
            "circle" => Shape::Circle(Circle {
                center: require_point("circle", "center", source.center)?,
                radius: require_number("circle", "radius", source.radius)?,
            }),
            "arc" => Shape::Arc(Arc {
                center: require_point("arc", "center", source.center)?,
                radius: require_number("arc", "radius", source.radius)?,
                start_angle: require_number("arc", "startAngle", source.start_angle)?.to_radians(),
                end_angle: require_number("arc", "endAngle", source.end_angle)?.to_radians(),
                winding: if source.clockwise.unwrap_or(false) {
                    Winding::Clockwise
                } else {
                    Winding::CounterClockwise
                },
            }),
            kind @ ("polyline" | "lwpolyline" | "polygon") => {
                let vertices = source.vertices.as_ref().ok_or(ConversionError::MissingField {
                    kind: "polyline",
                    field: "vertices",
                })?;
                let vertices = vertices
                    .iter()
                    .map(|vertex| require_point("polyline", "vertices", Some(*vertex)))
                    .collect::<Result<Vec<_>, _>>()?;
                Shape::Polyline(Polyline {
                    vertices,
                    is_closed: source.closed.unwrap_or(kind == "polygon"),
                })
            }
            "rectangle" | "rect" => {
                let a = require_point("rectangle", "corner1", source.corner1)?;
                let b = require_point("rectangle", "corner2", source.corner2)?;
                Shape::Polyline(Polyline {
                    vertices: vec![
                        a,
                        Point2::new(b.x(), a.y()),
                        b,
                        Point2::new(a.x(), b.y()),
                    ],
                    is_closed: true,
                })
            }
            "text" | "mtext" => Shape::Text(Text {
                insert: require_point("text", "position", source.position)?,
                content: source.text.clone().unwrap_or_default(),
                height: optional_number("text", "height", source.height, DEFAULT_TEXT_HEIGHT)?,
                rotation: optional_number("text", "rotation", source.rotation, 0.0)?.to_radians(),
            }),
            "measurement" | "dimension" => {
                let start = require_point("measurement", "start", source.start)?;
                let end = require_point("measurement", "end", source.end)?;
                let label_position = match source.label_position {
                    Some(_) => require_point("measurement", "labelPosition", source.label_position)?,
                    None => Point2::new((start.x() + end.x()) / 2.0, (start.y() + end.y()) / 2.0),
                };
                Shape::Measurement(Measurement {
                    start,
                    end,
                    label_position,
                    label: source.label.clone().unwrap_or_default(),
                })
            }
            _ => return Err(ConversionError::UnsupportedType(raw_kind.to_string())),
        };

        let style = EntityStyle {
            color: source.color.clone(),
            line_weight: source.line_weight,
        };
        Ok(
            Entity::new(id, source.layer.as_deref().map(str::trim).unwrap_or_default(), shape)
                .with_style(style)
                .with_visible(source.visible.unwrap_or(true))
                .with_locked(source.locked.unwrap_or(false)),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use dxfview_core::entity::{DEFAULT_LAYER, EntityKind};

    use super::*;

    #[test]
    fn parses_loose_json_with_aliases_and_extra_fields() {
        let source = r#"{
            "entities": [
                {"id": "L1", "type": "LINE", "layer": "GEOM",
                 "start": {"x": 0, "y": 0}, "end": {"x": 100, "y": 0},
                 "handle": "1F", "extra": [1, 2, 3]},
                {"id": "A1", "type": "arc", "center": {"x": 0, "y": 0}, "radius": 10,
                 "start_angle": 0, "endAngle": 90},
                {"id": "P1", "type": "lwpolyline", "points": [[0, 0], [10, 0], [10, 10]],
                 "isClosed": true}
            ],
            "layers": {"GEOM": {"visible": false}},
            "header": {"units": "mm"}
        }"#;
        let scene = SceneData::from_json_str(source).unwrap();
        assert!(scene.rejected.is_empty());
        assert_eq!(scene.entities.len(), 3);
        assert_eq!(scene.layers["GEOM"], SceneLayer { visible: false, locked: false });

        let line = Entity::try_from(&scene.entities[0]).unwrap();
        assert_eq!(line.kind(), EntityKind::Line);
        assert_eq!(line.layer_name(), "GEOM");

        let arc = Entity::try_from(&scene.entities[1]).unwrap();
        assert_eq!(arc.layer_name(), DEFAULT_LAYER);
        match arc.shape {
            Shape::Arc(arc) => {
                assert_eq!(arc.start_angle, 0.0);
                assert!((arc.end_angle - FRAC_PI_2).abs() < 1e-12);
            }
            other => panic!("unexpected shape {other:?}"),
        }

        let polyline = Entity::try_from(&scene.entities[2]).unwrap();
        match polyline.shape {
            Shape::Polyline(polyline) => {
                assert!(polyline.is_closed);
                assert_eq!(polyline.vertices.len(), 3);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn malformed_entities_are_rejected_individually() {
        let source = r#"{"entities": [
            {"id": "ok", "type": "circle", "center": {"x": 1, "y": 1}, "radius": 2},
            {"id": "bad", "type": "circle", "center": "here", "radius": 2},
            42
        ]}"#;
        let scene = SceneData::from_json_str(source).unwrap();
        assert_eq!(scene.entities.len(), 1);
        assert_eq!(scene.rejected.len(), 2);
        assert_eq!(scene.rejected[0].index, 1);
        assert_eq!(scene.rejected[0].id.as_deref(), Some("bad"));
        assert!(matches!(scene.rejected[0].reason, ConversionError::Malformed(_)));
        assert_eq!(scene.rejected[1].id, None);
    }

    #[test]
    fn invalid_document_is_an_error() {
        assert!(matches!(
            SceneData::from_json_str("{ not json"),
            Err(EngineError::SceneParse(_))
        ));
        assert!(SceneData::from_json_str(r#"{"entities": {}}"#).is_err());
        assert!(SceneData::from_json_str("{}").unwrap().is_empty());
    }

    #[test]
    fn missing_geometry_is_reported_per_field() {
        let missing_end = SceneEntity {
            end: None,
            ..SceneEntity::line("L", ScenePoint::new(0.0, 0.0), ScenePoint::new(1.0, 0.0))
        };
        assert_eq!(
            Entity::try_from(&missing_end),
            Err(ConversionError::MissingField {
                kind: "line",
                field: "end"
            })
        );

        let no_id = SceneEntity {
            id: Some("  ".to_string()),
            ..SceneEntity::circle("x", ScenePoint::new(0.0, 0.0), 1.0)
        };
        assert_eq!(Entity::try_from(&no_id), Err(ConversionError::MissingId));

        let nan = SceneEntity::circle("c", ScenePoint::new(f64::NAN, 0.0), 1.0);
        assert_eq!(
            Entity::try_from(&nan),
            Err(ConversionError::NonFinite {
                kind: "circle",
                field: "center"
            })
        );

        let spline = SceneEntity {
            kind: Some("SPLINE".to_string()),
            ..SceneEntity::default()
        };
        let spline = SceneEntity {
            id: Some("s".to_string()),
            ..spline
        };
        assert_eq!(
            Entity::try_from(&spline),
            Err(ConversionError::UnsupportedType("SPLINE".to_string()))
        );
    }

    #[test]
    fn degenerate_geometry_still_converts() {
        let dot = Entity::try_from(&SceneEntity::circle("dot", ScenePoint::new(0.0, 0.0), 0.0))
            .unwrap();
        assert!(dot.bounds().is_none());
        let stub = Entity::try_from(&SceneEntity::polyline(
            "stub",
            vec![ScenePoint::new(1.0, 1.0)],
            false,
        ))
        .unwrap();
        assert!(stub.bounds().is_none());
    }

    #[test]
    fn rectangle_becomes_closed_polyline() {
        let rect = SceneEntity {
            corner1: Some(ScenePoint::new(0.0, 0.0)),
            corner2: Some(ScenePoint::new(4.0, 2.0)),
            ..SceneEntity::typed("r", "Rect")
        };
        let entity = Entity::try_from(&rect).unwrap();
        assert_eq!(entity.kind(), EntityKind::Polyline);
        let bounds = entity.bounds().unwrap();
        assert_eq!(bounds.max(), Point2::new(4.0, 2.0));
        assert!((entity.distance_to(Point2::new(2.0, 0.0))).abs() < 1e-12);
        assert!((entity.distance_to(Point2::new(0.0, 1.0))).abs() < 1e-12);
    }

    #[test]
    fn text_and_measurement_defaults() {
        let text = Entity::try_from(&SceneEntity {
            rotation: Some(90.0),
            ..SceneEntity::text("t", ScenePoint::new(0.0, 0.0), "AB", 1.0)
        })
        .unwrap();
        match &text.shape {
            Shape::Text(text) => assert!((text.rotation - FRAC_PI_2).abs() < 1e-12),
            other => panic!("unexpected shape {other:?}"),
        }

        let dim = Entity::try_from(&SceneEntity::measurement(
            "d",
            ScenePoint::new(0.0, 0.0),
            ScenePoint::new(10.0, 0.0),
            "10",
        ))
        .unwrap();
        match &dim.shape {
            Shape::Measurement(dim) => assert_eq!(dim.label_position, Point2::new(5.0, 0.0)),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn numeric_layer_and_color_are_read_as_text() {
        let source = r#"{"entities": [
            {"id": 7, "type": "line", "layer": 0, "color": 7,
             "start": {"x": 0, "y": 0}, "end": {"x": 10, "y": 0}},
            {"id": "C", "type": "circle", "layer": {"name": "odd"}, "color": [255, 0, 0],
             "center": {"x": 0, "y": 0}, "radius": 1}
        ]}"#;
        let scene = SceneData::from_json_str(source).unwrap();
        assert!(scene.rejected.is_empty());

        let line = Entity::try_from(&scene.entities[0]).unwrap();
        assert_eq!(line.id.as_str(), "7");
        assert_eq!(line.layer_name(), "0");
        assert_eq!(line.style.color.as_deref(), Some("7"));

        let circle = Entity::try_from(&scene.entities[1]).unwrap();
        assert_eq!(circle.layer_name(), DEFAULT_LAYER);
        assert_eq!(circle.style.color, None);
    }

    #[test]
    fn alternate_key_spellings_are_accepted() {
        let source = r#"{
            "entities": [
                {"id": "L", "type": "line", "startPoint": {"X": 1, "Y": 2}, "endPoint": {"X": 3, "Y": 4}},
                {"id": "L2", "type": "line", "p1": {"x": 0, "y": 0}, "p2": {"x": 5, "y": 0}},
                {"id": "C", "type": "circle", "centerPoint": {"x": 1, "y": 1}, "r": 4},
                {"id": "T", "type": "text", "location": {"x": 2, "y": 3}, "fontSize": 5, "text": "N"},
                {"id": "T2", "type": "text", "insert": {"x": 0, "y": 0}, "text": "AB"}
            ],
            "layers": [
                {"name": "WALLS", "visible": false, "color": "red"},
                {"name": "DOORS", "locked": true},
                {"visible": false}
            ]
        }"#;
        let scene = SceneData::from_json_str(source).unwrap();
        assert!(scene.rejected.is_empty());
        assert_eq!(scene.layers.len(), 2);
        assert_eq!(scene.layers["WALLS"], SceneLayer { visible: false, locked: false });
        assert_eq!(scene.layers["DOORS"], SceneLayer { visible: true, locked: true });

        let converted: Vec<_> = scene
            .entities
            .iter()
            .map(|entity| Entity::try_from(entity).unwrap())
            .collect();
        match &converted[0].shape {
            Shape::Line(line) => {
                assert_eq!(line.start, Point2::new(1.0, 2.0));
                assert_eq!(line.end, Point2::new(3.0, 4.0));
            }
            other => panic!("unexpected shape {other:?}"),
        }
        assert!((converted[1].distance_to(Point2::new(2.5, 1.0)) - 1.0).abs() < 1e-12);
        match &converted[2].shape {
            Shape::Circle(circle) => {
                assert_eq!(circle.center, Point2::new(1.0, 1.0));
                assert_eq!(circle.radius, 4.0);
            }
            other => panic!("unexpected shape {other:?}"),
        }
        match &converted[3].shape {
            Shape::Text(text) => {
                assert_eq!(text.insert, Point2::new(2.0, 3.0));
                assert_eq!(text.height, 5.0);
            }
            other => panic!("unexpected shape {other:?}"),
        }
        match &converted[4].shape {
            Shape::Text(text) => assert_eq!(text.height, DEFAULT_TEXT_HEIGHT),
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn demo_scene_converts_cleanly() {
        let scene = SceneData::demo();
        assert_eq!(scene.entities.len(), 6);
        for entity in &scene.entities {
            let converted = Entity::try_from(entity).unwrap();
            assert!(converted.bounds().is_some(), "{} should be hittable", converted.id);
        }
    }
}
