//! 屏幕像素坐标与世界（图纸）坐标之间的换算。
//!
//! 约定：世界 Y 轴向上，屏幕 Y 轴向下。垂直方向以
//! `viewport.height - top_margin`（顶部标尺留白之下的基线）为锚点翻转：
//!
//! ```text
//! screen_x = world_x * scale + offset_x
//! screen_y = baseline - (world_y * scale + offset_y)
//! ```
//!
//! 正反两个方向共用同一基线，任何不一致都会导致拾取偏移。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Bounds2D, Point2};

/// 顶部标尺占用的像素高度。
pub const DEFAULT_TOP_MARGIN: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TransformError {
    #[error("view scale must be finite and greater than zero, got {0}")]
    InvalidScale(f64),
    #[error("view offset must be finite, got ({x}, {y})")]
    NonFiniteOffset { x: f64, y: f64 },
    #[error("viewport {width}x{height} with top margin {top_margin} is not usable")]
    InvalidViewport {
        width: f64,
        height: f64,
        top_margin: f64,
    },
    #[error("point ({x}, {y}) is not finite")]
    NonFinitePoint { x: f64, y: f64 },
}

/// 视图变换：世界到屏幕的缩放倍数与屏幕空间平移。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl ViewTransform {
    #[inline]
    pub fn new(scale: f64, offset_x: f64, offset_y: f64) -> Self {
        Self {
            scale,
            offset_x,
            offset_y,
        }
    }

    #[inline]
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    pub fn validate(&self) -> Result<(), TransformError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(TransformError::InvalidScale(self.scale));
        }
        if !self.offset_x.is_finite() || !self.offset_y.is_finite() {
            return Err(TransformError::NonFiniteOffset {
                x: self.offset_x,
                y: self.offset_y,
            });
        }
        Ok(())
    }

    /// 把像素拾取半径换算为世界单位容差。
    pub fn world_tolerance(&self, pixels: f64) -> Result<f64, TransformError> {
        self.validate()?;
        Ok(pixels.max(0.0) / self.scale)
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// 画布尺寸（像素）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    #[serde(default = "Viewport::default_top_margin")]
    pub top_margin: f64,
}

impl Viewport {
    #[inline]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            top_margin: DEFAULT_TOP_MARGIN,
        }
    }

    #[inline]
    pub fn with_top_margin(mut self, top_margin: f64) -> Self {
        self.top_margin = top_margin;
        self
    }

    fn default_top_margin() -> f64 {
        DEFAULT_TOP_MARGIN
    }

    /// Y 轴翻转所用的基线。
    #[inline]
    pub fn baseline(&self) -> f64 {
        self.height - self.top_margin
    }

    pub fn validate(&self) -> Result<(), TransformError> {
        let usable = self.width.is_finite()
            && self.height.is_finite()
            && self.top_margin.is_finite()
            && self.width > 0.0
            && self.height > 0.0
            && self.top_margin >= 0.0;
        if usable {
            Ok(())
        } else {
            Err(TransformError::InvalidViewport {
                width: self.width,
                height: self.height,
                top_margin: self.top_margin,
            })
        }
    }
}

fn check_point(point: Point2) -> Result<(), TransformError> {
    if point.is_finite() {
        Ok(())
    } else {
        Err(TransformError::NonFinitePoint {
            x: point.x(),
            y: point.y(),
        })
    }
}

pub fn screen_to_world(
    screen: Point2,
    transform: &ViewTransform,
    viewport: &Viewport,
) -> Result<Point2, TransformError> {
    transform.validate()?;
    viewport.validate()?;
    check_point(screen)?;
    let x = (screen.x() - transform.offset_x) / transform.scale;
    let y = (viewport.baseline() - screen.y() - transform.offset_y) / transform.scale;
    Ok(Point2::new(x, y))
}

pub fn world_to_screen(
    world: Point2,
    transform: &ViewTransform,
    viewport: &Viewport,
) -> Result<Point2, TransformError> {
    transform.validate()?;
    viewport.validate()?;
    check_point(world)?;
    let x = world.x() * transform.scale + transform.offset_x;
    let y = viewport.baseline() - (world.y() * transform.scale + transform.offset_y);
    Ok(Point2::new(x, y))
}

/// 屏幕上由两个角点拖出的矩形换算为世界坐标范围。
pub fn screen_rect_to_world(
    corner_a: Point2,
    corner_b: Point2,
    transform: &ViewTransform,
    viewport: &Viewport,
) -> Result<Bounds2D, TransformError> {
    let a = screen_to_world(corner_a, transform, viewport)?;
    let b = screen_to_world(corner_b, transform, viewport)?;
    Ok(Bounds2D::from_corners(a, b))
}
