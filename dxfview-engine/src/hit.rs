//! 命中测试器：世界坐标查询点 → 索引候选 → 过滤 → 精确距离 → 排序。

use std::collections::{HashMap, HashSet};

use dxfview_core::entity::{Entity, EntityId, EntityKind, LayerTable};
use dxfview_core::geometry::{Bounds2D, Point2};
use tracing::{debug, warn};

use crate::spatial::{GridSizing, IndexError, SpatialIndex};

/// 默认拾取容差（世界单位），宿主配置可覆盖。
pub const DEFAULT_TOLERANCE: f64 = 5.0;

/// 默认返回结果数。
pub const DEFAULT_MAX_RESULTS: usize = 1;

/// 距离差在此范围内视为并列，按实体 ID 升序决出先后。
pub const DISTANCE_EPSILON: f64 = 1e-9;

/// 单次查询参数。
#[derive(Debug, Clone, PartialEq)]
pub struct HitTestOptions {
    /// 世界单位；负值或非有限值按 0 处理。
    pub tolerance: f64,
    /// 0 按 1 处理；框选查询忽略此项。
    pub max_results: usize,
    /// 允许的图层名，`None` 表示全部。
    pub layer_filter: Option<HashSet<String>>,
    /// 允许的实体类型，`None` 表示全部。
    pub type_filter: Option<HashSet<EntityKind>>,
    pub include_invisible: bool,
}

impl Default for HitTestOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_results: DEFAULT_MAX_RESULTS,
            layer_filter: None,
            type_filter: None,
            include_invisible: false,
        }
    }
}

impl HitTestOptions {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_layers<I, S>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layer_filter = Some(layers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = EntityKind>,
    {
        self.type_filter = Some(kinds.into_iter().collect());
        self
    }

    pub fn including_invisible(mut self, include: bool) -> Self {
        self.include_invisible = include;
        self
    }

    fn effective_tolerance(&self) -> f64 {
        if self.tolerance.is_finite() && self.tolerance >= 0.0 {
            self.tolerance
        } else {
            debug!(tolerance = self.tolerance, "容差无效，按 0 处理");
            0.0
        }
    }

    fn effective_max_results(&self) -> usize {
        self.max_results.max(1)
    }
}

/// 框选模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionMode {
    /// 窗口选择：实体范围完全落在矩形内。
    Window,
    /// 交叉选择：实体轮廓与矩形有公共点。
    Crossing,
}

/// 一条命中记录，借用测试器内的实体。
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    pub entity: &'a Entity,
    /// 查询点到图元的世界距离；框选结果为 0。
    pub distance: f64,
    /// 实体自身或所在图层被锁定。仅供调用方参考，不参与过滤。
    pub locked: bool,
}

impl Hit<'_> {
    #[inline]
    pub fn id(&self) -> &EntityId {
        &self.entity.id
    }

    #[inline]
    pub fn layer(&self) -> &str {
        self.entity.layer_name()
    }

    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.entity.kind()
    }
}

/// 持有当前实体集、空间索引与图层表。
#[derive(Debug, Default)]
pub struct HitTester {
    entities: Vec<Entity>,
    index: SpatialIndex,
    layers: LayerTable,
    slot_by_id: HashMap<EntityId, usize>,
}

impl HitTester {
    pub fn new() -> Self {
        Self::default()
    }

    /// 替换全部实体并重建索引。
    pub fn rebuild(&mut self, entities: Vec<Entity>, layers: LayerTable, sizing: GridSizing) {
        self.index = SpatialIndex::build(entities.iter().map(Entity::bounds), sizing);
        self.slot_by_id.clear();
        for (slot, entity) in entities.iter().enumerate() {
            self.slot_by_id.entry(entity.id.clone()).or_insert(slot);
        }
        self.entities = entities;
        self.layers = layers;
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.index.clear();
        self.layers.clear();
        self.slot_by_id.clear();
    }

    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.slot_by_id
            .get(id)
            .and_then(|slot| self.entities.get(*slot))
    }

    #[inline]
    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    #[inline]
    pub fn layers(&self) -> &LayerTable {
        &self.layers
    }

    /// 图层状态在查询时读取，修改后下一次查询即生效。
    #[inline]
    pub fn layers_mut(&mut self) -> &mut LayerTable {
        &mut self.layers
    }

    /// 点查询，按距离升序返回至多 `max_results` 条命中。空场景返回空列表。
    pub fn hit_test_point(&self, point: Point2, options: &HitTestOptions) -> Vec<Hit<'_>> {
        if self.entities.is_empty() || !point.is_finite() {
            return Vec::new();
        }
        let tolerance = options.effective_tolerance();
        let candidates = match self.candidates_near(point, tolerance) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = %err, "空间索引查询失败，退化为线性扫描");
                return self.hit_test_point_linear(point, options);
            }
        };
        let hits = candidates
            .into_iter()
            .filter_map(|entity| self.evaluate(entity, point, tolerance, options))
            .collect();
        rank(hits, options.effective_max_results())
    }

    /// 与 [`Self::hit_test_point`] 语义相同的全量扫描，不经过索引。
    pub fn hit_test_point_linear(&self, point: Point2, options: &HitTestOptions) -> Vec<Hit<'_>> {
        if self.entities.is_empty() || !point.is_finite() {
            return Vec::new();
        }
        let tolerance = options.effective_tolerance();
        let hits = self
            .entities
            .iter()
            .filter_map(|entity| self.evaluate(entity, point, tolerance, options))
            .collect();
        rank(hits, options.effective_max_results())
    }

    /// 框选查询，结果按实体 ID 升序，不受 `max_results` 限制。
    pub fn hit_test_region(
        &self,
        rect: &Bounds2D,
        mode: RegionMode,
        options: &HitTestOptions,
    ) -> Vec<Hit<'_>> {
        if self.entities.is_empty() || rect.is_empty() || !rect.is_finite() {
            return Vec::new();
        }
        let candidates = match self.resolve(self.index.query_rect(rect)) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = %err, "空间索引查询失败，退化为线性扫描");
                self.entities.iter().collect()
            }
        };
        let mut hits: Vec<Hit<'_>> = candidates
            .into_iter()
            .filter(|entity| self.passes_filters(entity, options))
            .filter(|entity| match mode {
                RegionMode::Window => entity
                    .bounds()
                    .is_some_and(|bounds| rect.contains_bounds(&bounds)),
                RegionMode::Crossing => entity.shape.intersects_rect(rect),
            })
            .map(|entity| Hit {
                entity,
                distance: 0.0,
                locked: self.is_locked(entity),
            })
            .collect();
        hits.sort_by(|a, b| a.entity.id.cmp(&b.entity.id));
        hits
    }

    fn candidates_near(&self, point: Point2, tolerance: f64) -> Result<Vec<&Entity>, IndexError> {
        self.resolve(self.index.query_point(point, tolerance))
    }

    fn resolve(&self, slots: Result<Vec<usize>, IndexError>) -> Result<Vec<&Entity>, IndexError> {
        slots?
            .into_iter()
            .map(|slot| {
                self.entities.get(slot).ok_or(IndexError::SlotOutOfRange {
                    slot,
                    len: self.entities.len(),
                })
            })
            .collect()
    }

    fn evaluate<'a>(
        &self,
        entity: &'a Entity,
        point: Point2,
        tolerance: f64,
        options: &HitTestOptions,
    ) -> Option<Hit<'a>> {
        if !self.passes_filters(entity, options) {
            return None;
        }
        let distance = entity.distance_to(point);
        (distance <= tolerance).then(|| Hit {
            entity,
            distance,
            locked: self.is_locked(entity),
        })
    }

    fn passes_filters(&self, entity: &Entity, options: &HitTestOptions) -> bool {
        let visible = entity.visible && self.layers.is_visible(entity.layer_name());
        if !visible && !options.include_invisible {
            return false;
        }
        if let Some(layers) = &options.layer_filter {
            if !layers.contains(entity.layer_name()) {
                return false;
            }
        }
        if let Some(kinds) = &options.type_filter {
            if !kinds.contains(&entity.kind()) {
                return false;
            }
        }
        true
    }

    fn is_locked(&self, entity: &Entity) -> bool {
        entity.locked || self.layers.is_locked(entity.layer_name())
    }
}

/// 距离升序；并列（差值 ≤ `DISTANCE_EPSILON`）按实体 ID 升序。
fn rank(mut hits: Vec<Hit<'_>>, max_results: usize) -> Vec<Hit<'_>> {
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.entity.id.cmp(&b.entity.id))
    });
    let mut start = 0;
    while start < hits.len() {
        let anchor = hits[start].distance;
        let mut end = start + 1;
        while end < hits.len() && hits[end].distance - anchor <= DISTANCE_EPSILON {
            end += 1;
        }
        hits[start..end].sort_by(|a, b| a.entity.id.cmp(&b.entity.id));
        start = end;
    }
    hits.truncate(max_results);
    hits
}
