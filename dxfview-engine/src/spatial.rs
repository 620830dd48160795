//! 空间索引
//!
//! 基于均匀网格的粗筛结构：每个实体按包围盒登记到覆盖的网格单元，
//! 查询时只访问与查询范围重叠的单元。结果是候选超集，精确距离由
//! 命中测试器再判定；索引绝不能漏掉真正命中的实体。
//!
//! 索引只支持整体重建，不做增量插入/删除。

use std::collections::HashMap;

use dxfview_core::geometry::{Bounds2D, Point2};
use thiserror::Error;
use tracing::{debug, warn};

/// 登记前对所有包围盒做的最小外扩，让点状/零长度几何也有确定的单元。
pub const INDEX_EPSILON: f64 = 1e-6;

/// 自动网格的最小单元尺寸。
pub const MIN_CELL_SIZE: f64 = 1e-3;

/// 单个实体最多登记的单元数，超出的放入「超大」列表，每次查询都会检查。
pub const MAX_CELLS_PER_ENTRY: i64 = 1_024;

/// 场景为空或无法推导范围时使用的单元尺寸。
const FALLBACK_CELL_SIZE: f64 = 100.0;

/// 网格单元尺寸策略。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GridSizing {
    /// 按场景范围与实体数量自动推导：`extent / ceil(sqrt(n))`。
    #[default]
    Auto,
    Fixed(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    #[error("query at ({x}, {y}) with tolerance {tolerance} is not finite")]
    NonFiniteQuery { x: f64, y: f64, tolerance: f64 },
    #[error("spatial index references slot {slot}, but only {len} entries exist")]
    SlotOutOfRange { slot: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    min: (i64, i64),
    max: (i64, i64),
}

impl CellRange {
    fn cell_count(&self) -> i64 {
        let span_x = self.max.0.saturating_sub(self.min.0).saturating_add(1);
        let span_y = self.max.1.saturating_sub(self.min.1).saturating_add(1);
        span_x.saturating_mul(span_y)
    }

    fn contains(&self, cell: (i64, i64)) -> bool {
        cell.0 >= self.min.0 && cell.0 <= self.max.0 && cell.1 >= self.min.1 && cell.1 <= self.max.1
    }

    fn cells(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        (self.min.0..=self.max.0).flat_map(move |gx| (self.min.1..=self.max.1).map(move |gy| (gx, gy)))
    }
}

/// 网格空间索引。槽位号即构建时条目的顺序号。
#[derive(Debug)]
pub struct SpatialIndex {
    /// 网格单元大小
    cell_size: f64,

    /// 网格映射：网格坐标 -> 槽位列表
    grid: HashMap<(i64, i64), Vec<usize>>,

    /// 槽位 -> 外扩后的包围盒，未登记的槽位为 `None`
    bounds: Vec<Option<Bounds2D>>,

    /// 覆盖单元过多的槽位
    oversized: Vec<usize>,

    indexed: usize,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialIndex {
    /// 创建空索引。
    pub fn new() -> Self {
        Self {
            cell_size: FALLBACK_CELL_SIZE,
            grid: HashMap::new(),
            bounds: Vec::new(),
            oversized: Vec::new(),
            indexed: 0,
        }
    }

    /// 一次性构建索引。`entries` 的第 i 项对应槽位 i，`None` 表示该槽位不可命中。
    pub fn build<I>(entries: I, sizing: GridSizing) -> Self
    where
        I: IntoIterator<Item = Option<Bounds2D>>,
    {
        let bounds: Vec<Option<Bounds2D>> = entries
            .into_iter()
            .map(|entry| {
                entry
                    .filter(|bbox| !bbox.is_empty() && bbox.is_finite())
                    .map(|bbox| bbox.inflate(INDEX_EPSILON))
            })
            .collect();

        let mut extent = Bounds2D::empty();
        let mut indexed = 0usize;
        for bbox in bounds.iter().flatten() {
            extent.include_bounds(bbox);
            indexed += 1;
        }

        let cell_size = resolve_cell_size(sizing, &extent, indexed);
        let mut index = Self {
            cell_size,
            grid: HashMap::new(),
            bounds,
            oversized: Vec::new(),
            indexed,
        };

        for slot in 0..index.bounds.len() {
            let Some(bbox) = index.bounds[slot] else {
                continue;
            };
            let range = index.cell_range(&bbox);
            if range.cell_count() > MAX_CELLS_PER_ENTRY {
                index.oversized.push(slot);
                continue;
            }
            for cell in range.cells() {
                index.grid.entry(cell).or_default().push(slot);
            }
        }

        debug!(
            slots = index.bounds.len(),
            indexed = index.indexed,
            cells = index.grid.len(),
            oversized = index.oversized.len(),
            cell_size = index.cell_size,
            "空间索引已重建"
        );
        index
    }

    /// 将世界坐标转换为网格坐标
    fn to_grid_coord(&self, x: f64, y: f64) -> (i64, i64) {
        // `as` 转换对越界值饱和
        (
            (x / self.cell_size).floor() as i64,
            (y / self.cell_size).floor() as i64,
        )
    }

    fn cell_range(&self, bbox: &Bounds2D) -> CellRange {
        CellRange {
            min: self.to_grid_coord(bbox.min().x(), bbox.min().y()),
            max: self.to_grid_coord(bbox.max().x(), bbox.max().y()),
        }
    }

    /// 点查询：返回包围盒与以 `point` 为圆心、`tolerance` 为半径的圆相交的槽位，升序去重。
    pub fn query_point(&self, point: Point2, tolerance: f64) -> Result<Vec<usize>, IndexError> {
        if !point.is_finite() || !tolerance.is_finite() || tolerance < 0.0 {
            return Err(IndexError::NonFiniteQuery {
                x: point.x(),
                y: point.y(),
                tolerance,
            });
        }
        let search = Bounds2D::around(point, tolerance);
        self.collect(&search, |bbox| bbox.distance_to_point(point) <= tolerance)
    }

    /// 范围查询：返回包围盒与 `rect` 相交的槽位，升序去重。
    pub fn query_rect(&self, rect: &Bounds2D) -> Result<Vec<usize>, IndexError> {
        if rect.is_empty() {
            return Ok(Vec::new());
        }
        if !rect.is_finite() {
            let center = rect.min();
            return Err(IndexError::NonFiniteQuery {
                x: center.x(),
                y: center.y(),
                tolerance: f64::NAN,
            });
        }
        self.collect(rect, |bbox| bbox.intersects(rect))
    }

    fn collect<F>(&self, search: &Bounds2D, accept: F) -> Result<Vec<usize>, IndexError>
    where
        F: Fn(&Bounds2D) -> bool,
    {
        if self.indexed == 0 {
            return Ok(Vec::new());
        }

        let range = self.cell_range(search);
        let mut visited: Vec<usize> = Vec::new();
        // 查询范围覆盖的单元多于已占用单元时，改为遍历已占用单元
        if range.cell_count() > self.grid.len() as i64 {
            for (cell, slots) in &self.grid {
                if range.contains(*cell) {
                    visited.extend_from_slice(slots);
                }
            }
        } else {
            for cell in range.cells() {
                if let Some(slots) = self.grid.get(&cell) {
                    visited.extend_from_slice(slots);
                }
            }
        }
        visited.extend_from_slice(&self.oversized);
        visited.sort_unstable();
        visited.dedup();

        let mut result = Vec::with_capacity(visited.len());
        for slot in visited {
            let bbox = self
                .bounds
                .get(slot)
                .copied()
                .flatten()
                .ok_or(IndexError::SlotOutOfRange {
                    slot,
                    len: self.bounds.len(),
                })?;
            if accept(&bbox) {
                result.push(slot);
            }
        }
        Ok(result)
    }

    /// 清空索引
    pub fn clear(&mut self) {
        self.grid.clear();
        self.bounds.clear();
        self.oversized.clear();
        self.indexed = 0;
    }

    /// 已登记（可命中）的条目数量
    #[inline]
    pub fn len(&self) -> usize {
        self.indexed
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indexed == 0
    }

    /// 构建时的槽位总数（含未登记槽位）
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.bounds.len()
    }

    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.grid.len()
    }

    #[inline]
    pub fn oversized_len(&self) -> usize {
        self.oversized.len()
    }

    /// 获取槽位登记的（外扩后）包围盒
    pub fn get_bbox(&self, slot: usize) -> Option<&Bounds2D> {
        self.bounds.get(slot).and_then(Option::as_ref)
    }
}

fn resolve_cell_size(sizing: GridSizing, extent: &Bounds2D, count: usize) -> f64 {
    match sizing {
        GridSizing::Fixed(size) if size.is_finite() && size > 0.0 => size,
        GridSizing::Fixed(size) => {
            warn!(cell_size = size, "网格尺寸无效，改用自动推导");
            auto_cell_size(extent, count)
        }
        GridSizing::Auto => auto_cell_size(extent, count),
    }
}

fn auto_cell_size(extent: &Bounds2D, count: usize) -> f64 {
    if count == 0 || extent.is_empty() {
        return FALLBACK_CELL_SIZE;
    }
    let side = extent.width().max(extent.height());
    let per_axis = (count as f64).sqrt().ceil();
    (side / per_axis).max(MIN_CELL_SIZE)
}
