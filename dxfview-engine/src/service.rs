//! 命中测试服务：持有当前场景，向交互层提供稳定的查询接口。
//!
//! 由调用方创建并持有，多个文档可各自拥有独立实例。

use std::collections::HashSet;

use dxfview_core::entity::{Entity, EntityId, EntityKind, Layer, LayerTable};
use dxfview_core::geometry::Point2;
use dxfview_core::transform::{ViewTransform, Viewport, screen_rect_to_world, screen_to_world};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::hit::{DEFAULT_MAX_RESULTS, DEFAULT_TOLERANCE, Hit, HitTestOptions, HitTester, RegionMode};
use crate::scene::{ConversionError, SceneData, SkippedEntity};
use crate::spatial::GridSizing;

/// 由宿主配置注入的查询默认值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryDefaults {
    pub tolerance: f64,
    pub max_results: usize,
    pub include_invisible: bool,
    pub grid: GridSizing,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_results: DEFAULT_MAX_RESULTS,
            include_invisible: false,
            grid: GridSizing::Auto,
        }
    }
}

/// 单条查询结果；`entity_id == None` 表示未命中。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitTestResult {
    pub entity_id: Option<EntityId>,
    pub entity_kind: Option<EntityKind>,
    pub layer: Option<String>,
    pub distance: f64,
    pub locked: bool,
}

impl HitTestResult {
    pub fn miss() -> Self {
        Self {
            entity_id: None,
            entity_kind: None,
            layer: None,
            distance: f64::INFINITY,
            locked: false,
        }
    }

    #[inline]
    pub fn is_hit(&self) -> bool {
        self.entity_id.is_some()
    }
}

impl From<&Hit<'_>> for HitTestResult {
    fn from(hit: &Hit<'_>) -> Self {
        Self {
            entity_id: Some(hit.id().clone()),
            entity_kind: Some(hit.kind()),
            layer: Some(hit.layer().to_string()),
            distance: hit.distance,
            locked: hit.locked,
        }
    }
}

/// 一次场景更新的汇总。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneReport {
    /// 成功转换的实体数（含退化实体）。
    pub converted: usize,
    /// 已保留但不可命中的退化实体数。
    pub degenerate: usize,
    pub skipped: Vec<SkippedEntity>,
}

#[derive(Debug, Default)]
pub struct HitTestingService {
    defaults: QueryDefaults,
    tester: HitTester,
}

impl HitTestingService {
    pub fn new(defaults: QueryDefaults) -> Self {
        Self {
            defaults,
            tester: HitTester::new(),
        }
    }

    #[inline]
    pub fn defaults(&self) -> &QueryDefaults {
        &self.defaults
    }

    /// 以注入的默认值构造查询参数，调用方可在此基础上调整过滤条件。
    pub fn options(&self) -> HitTestOptions {
        HitTestOptions::default()
            .with_tolerance(self.defaults.tolerance)
            .with_max_results(self.defaults.max_results)
            .including_invisible(self.defaults.include_invisible)
    }

    /// 整体替换当前场景并立即重建索引。`None` 或空场景等同于清空。
    pub fn update_scene(&mut self, scene: Option<&SceneData>) -> SceneReport {
        let Some(scene) = scene else {
            self.clear_scene();
            return SceneReport::default();
        };

        let mut report = SceneReport {
            skipped: scene.rejected.clone(),
            ..SceneReport::default()
        };
        let mut seen = HashSet::new();
        let mut entities = Vec::with_capacity(scene.entities.len());
        for (index, source) in scene.entities.iter().enumerate() {
            let converted = Entity::try_from(source).and_then(|entity| {
                if seen.insert(entity.id.clone()) {
                    Ok(entity)
                } else {
                    Err(ConversionError::DuplicateId(entity.id.to_string()))
                }
            });
            match converted {
                Ok(entity) => {
                    if entity.bounds().is_none() {
                        report.degenerate += 1;
                    }
                    entities.push(entity);
                }
                Err(reason) => report.skipped.push(SkippedEntity {
                    index,
                    id: source.id().map(str::to_string),
                    reason,
                }),
            }
        }
        for skipped in &report.skipped {
            warn!(
                index = skipped.index,
                id = skipped.id.as_deref().unwrap_or("<none>"),
                reason = %skipped.reason,
                "跳过无法转换的实体"
            );
        }

        let mut layers = LayerTable::new();
        for (name, layer) in &scene.layers {
            layers.insert(Layer {
                name: name.clone(),
                is_visible: layer.visible,
                is_locked: layer.locked,
            });
        }
        for entity in &entities {
            layers.ensure_layer(entity.layer_name());
        }

        report.converted = entities.len();
        self.tester.rebuild(entities, layers, self.defaults.grid);
        debug!(
            converted = report.converted,
            degenerate = report.degenerate,
            skipped = report.skipped.len(),
            cell_size = self.tester.index().cell_size(),
            "场景已更新"
        );
        report
    }

    pub fn clear_scene(&mut self) {
        self.tester.clear();
        debug!("场景已清空");
    }

    /// 屏幕点查询，只返回最优的一条结果。
    pub fn hit_test(
        &self,
        screen: Point2,
        transform: &ViewTransform,
        viewport: &Viewport,
        options: &HitTestOptions,
    ) -> Result<HitTestResult, EngineError> {
        let world = screen_to_world(screen, transform, viewport)?;
        Ok(self.best_at(world, options))
    }

    /// 逐点独立查询。变换非法时整体失败；单个非有限的屏幕点记为未命中。
    pub fn hit_test_multiple(
        &self,
        points: &[Point2],
        transform: &ViewTransform,
        viewport: &Viewport,
        options: &HitTestOptions,
    ) -> Result<Vec<HitTestResult>, EngineError> {
        transform.validate()?;
        viewport.validate()?;
        Ok(points
            .iter()
            .map(|screen| match screen_to_world(*screen, transform, viewport) {
                Ok(world) => self.best_at(world, options),
                Err(_) => HitTestResult::miss(),
            })
            .collect())
    }

    /// 世界坐标查询，按距离排序返回至多 `max_results` 条。
    pub fn hit_test_world(&self, world: Point2, options: &HitTestOptions) -> Vec<HitTestResult> {
        self.tester
            .hit_test_point(world, options)
            .iter()
            .map(HitTestResult::from)
            .collect()
    }

    /// 屏幕拖框选择。
    pub fn hit_test_region_screen(
        &self,
        corner_a: Point2,
        corner_b: Point2,
        mode: RegionMode,
        transform: &ViewTransform,
        viewport: &Viewport,
        options: &HitTestOptions,
    ) -> Result<Vec<HitTestResult>, EngineError> {
        let rect = screen_rect_to_world(corner_a, corner_b, transform, viewport)?;
        Ok(self
            .tester
            .hit_test_region(&rect, mode, options)
            .iter()
            .map(HitTestResult::from)
            .collect())
    }

    pub fn set_layer_visibility(&mut self, layer: &str, visible: bool) {
        self.tester.layers_mut().set_visible(layer, visible);
    }

    pub fn set_layer_locked(&mut self, layer: &str, locked: bool) {
        self.tester.layers_mut().set_locked(layer, locked);
    }

    #[inline]
    pub fn layers(&self) -> &LayerTable {
        self.tester.layers()
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.tester.entity(&EntityId::new(id))
    }

    #[inline]
    pub fn entity_count(&self) -> usize {
        self.tester.entities().len()
    }

    #[inline]
    pub fn tester(&self) -> &HitTester {
        &self.tester
    }

    fn best_at(&self, world: Point2, options: &HitTestOptions) -> HitTestResult {
        self.tester
            .hit_test_point(world, options)
            .first()
            .map(HitTestResult::from)
            .unwrap_or_else(HitTestResult::miss)
    }
}

#[cfg(test)]
mod tests {
    use dxfview_core::transform::TransformError;

    use super::*;
    use crate::scene::{SceneEntity, SceneLayer, ScenePoint};

    fn scene() -> SceneData {
        let mut scene = SceneData {
            entities: vec![
                SceneEntity::line("L1", ScenePoint::new(0.0, 0.0), ScenePoint::new(100.0, 0.0))
                    .on_layer("GEOM"),
                SceneEntity::circle("C1", ScenePoint::new(200.0, 0.0), 50.0).on_layer("GEOM"),
                SceneEntity::line("L2", ScenePoint::new(0.0, 6.0), ScenePoint::new(100.0, 6.0))
                    .on_layer("NOTES"),
            ],
            ..SceneData::default()
        };
        scene
            .layers
            .insert("NOTES".to_string(), SceneLayer { visible: true, locked: true });
        scene
    }

    fn flat_view() -> (ViewTransform, Viewport) {
        (
            ViewTransform::identity(),
            Viewport::new(800.0, 600.0).with_top_margin(0.0),
        )
    }

    #[test]
    fn screen_query_goes_through_transform() {
        let mut service = HitTestingService::default();
        let report = service.update_scene(Some(&scene()));
        assert_eq!(report.converted, 3);
        assert!(report.skipped.is_empty());

        let (transform, viewport) = flat_view();
        // 世界 (50, 2) 对应屏幕 (50, 598)
        let result = service
            .hit_test(Point2::new(50.0, 598.0), &transform, &viewport, &service.options())
            .unwrap();
        assert_eq!(result.entity_id, Some(EntityId::new("L1")));
        assert_eq!(result.entity_kind, Some(EntityKind::Line));
        assert!((result.distance - 2.0).abs() < 1e-9);
        assert!(!result.locked);
    }

    #[test]
    fn locked_layer_is_reported_not_filtered() {
        let mut service = HitTestingService::default();
        service.update_scene(Some(&scene()));
        let hits = service.hit_test_world(Point2::new(50.0, 6.0), &service.options());
        assert_eq!(hits[0].entity_id, Some(EntityId::new("L2")));
        assert!(hits[0].locked);
    }

    #[test]
    fn invalid_transform_is_rejected() {
        let mut service = HitTestingService::default();
        service.update_scene(Some(&scene()));
        let err = service
            .hit_test(
                Point2::new(0.0, 0.0),
                &ViewTransform::new(0.0, 0.0, 0.0),
                &Viewport::new(800.0, 600.0),
                &service.options(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransform(TransformError::InvalidScale(_))
        ));
    }

    #[test]
    fn clearing_the_scene_yields_misses() {
        let mut service = HitTestingService::default();
        service.update_scene(Some(&scene()));
        assert_eq!(service.entity_count(), 3);
        let report = service.update_scene(None);
        assert_eq!(report, SceneReport::default());
        assert_eq!(service.entity_count(), 0);

        let (transform, viewport) = flat_view();
        let result = service
            .hit_test(Point2::new(50.0, 598.0), &transform, &viewport, &service.options())
            .unwrap();
        assert_eq!(result, HitTestResult::miss());
        assert!(!result.is_hit());
    }

    #[test]
    fn duplicate_and_invalid_entities_are_skipped() {
        let mut scene = scene();
        scene.entities.push(SceneEntity::circle(
            "L1",
            ScenePoint::new(0.0, 0.0),
            1.0,
        ));
        scene.entities.push(SceneEntity {
            kind: Some("hatch".to_string()),
            ..SceneEntity::line("H1", ScenePoint::new(0.0, 0.0), ScenePoint::new(1.0, 1.0))
        });
        scene
            .entities
            .push(SceneEntity::circle("dot", ScenePoint::new(5.0, 5.0), 0.0));

        let mut service = HitTestingService::default();
        let report = service.update_scene(Some(&scene));
        assert_eq!(report.converted, 4);
        assert_eq!(report.degenerate, 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(
            report.skipped[0].reason,
            ConversionError::DuplicateId("L1".to_string())
        );
        assert_eq!(report.skipped[0].index, 3);
        assert_eq!(
            report.skipped[1].reason,
            ConversionError::UnsupportedType("hatch".to_string())
        );
        assert_eq!(service.entity("L1").map(Entity::kind), Some(EntityKind::Line));
        assert!(service.entity("dot").is_some());
    }

    #[test]
    fn layer_toggles_apply_without_rebuild() {
        let mut service = HitTestingService::default();
        service.update_scene(Some(&scene()));
        let point = Point2::new(50.0, 3.0);

        service.set_layer_visibility("GEOM", false);
        let hits = service.hit_test_world(point, &service.options());
        assert_eq!(hits[0].entity_id, Some(EntityId::new("L2")));

        service.set_layer_visibility("GEOM", true);
        service.set_layer_locked("GEOM", true);
        let hits = service.hit_test_world(point, &service.options());
        assert_eq!(hits[0].entity_id, Some(EntityId::new("L1")));
        assert!(hits[0].locked);
    }

    #[test]
    fn batch_queries_are_independent() {
        let mut service = HitTestingService::default();
        service.update_scene(Some(&scene()));
        let (transform, viewport) = flat_view();
        let points = [
            Point2::new(50.0, 598.0),
            Point2::new(400.0, 100.0),
            Point2::new(f64::NAN, 0.0),
            Point2::new(250.0, 600.0),
        ];
        let results = service
            .hit_test_multiple(&points, &transform, &viewport, &service.options())
            .unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].entity_id, Some(EntityId::new("L1")));
        assert!(!results[1].is_hit());
        assert!(!results[2].is_hit());
        assert_eq!(results[3].entity_id, Some(EntityId::new("C1")));

        assert!(
            service
                .hit_test_multiple(&points, &transform, &Viewport::new(0.0, 0.0), &service.options())
                .is_err()
        );
    }

    #[test]
    fn numeric_metadata_scene_is_hittable() {
        let scene = SceneData::from_json_str(
            r#"{
                "entities": [
                    {"id": "wall", "type": "line", "color": 7, "layer": 0,
                     "p1": {"X": 0, "Y": 0}, "p2": {"X": 100, "Y": 0}},
                    {"id": "door", "type": "circle", "layer": "DOORS",
                     "centerPoint": {"x": 50, "y": 0}, "r": 5}
                ],
                "layers": [{"name": "DOORS", "visible": false}]
            }"#,
        )
        .unwrap();
        let mut service = HitTestingService::default();
        let report = service.update_scene(Some(&scene));
        assert_eq!(report.converted, 2);
        assert!(report.skipped.is_empty());

        let mut names: Vec<_> = service.layers().layers().map(|layer| layer.name.clone()).collect();
        names.sort();
        assert_eq!(names, ["0", "DOORS"]);
        assert!(service.layers().get("DOORS").is_some_and(|layer| !layer.is_visible));

        // 门所在图层隐藏，(50, 4) 只能命中墙线
        let hits = service.hit_test_world(Point2::new(50.0, 4.0), &service.options());
        assert_eq!(hits[0].entity_id, Some(EntityId::new("wall")));
        assert_eq!(
            service.entity("wall").and_then(|entity| entity.style.color.as_deref()),
            Some("7")
        );
    }

    #[test]
    fn defaults_seed_query_options() {
        let service = HitTestingService::new(QueryDefaults {
            tolerance: 0.5,
            max_results: 3,
            include_invisible: true,
            grid: GridSizing::Fixed(25.0),
        });
        let options = service.options();
        assert_eq!(options.tolerance, 0.5);
        assert_eq!(options.max_results, 3);
        assert!(options.include_invisible);
        assert!(options.layer_filter.is_none());
    }

    #[test]
    fn region_selection_from_screen_drag() {
        let mut service = HitTestingService::default();
        service.update_scene(Some(&scene()));
        let (transform, viewport) = flat_view();
        // 世界 (-10, -10)..(110, 10)
        let window = service
            .hit_test_region_screen(
                Point2::new(-10.0, 610.0),
                Point2::new(110.0, 590.0),
                RegionMode::Window,
                &transform,
                &viewport,
                &service.options(),
            )
            .unwrap();
        let ids: Vec<_> = window
            .iter()
            .filter_map(|result| result.entity_id.as_ref().map(EntityId::to_string))
            .collect();
        assert_eq!(ids, ["L1", "L2"]);

        let crossing = service
            .hit_test_region_screen(
                Point2::new(140.0, 610.0),
                Point2::new(160.0, 590.0),
                RegionMode::Crossing,
                &transform,
                &viewport,
                &service.options(),
            )
            .unwrap();
        assert_eq!(crossing.len(), 1);
        assert_eq!(crossing[0].entity_id, Some(EntityId::new("C1")));
    }
}
