pub mod hit;
pub mod scene;
pub mod service;
pub mod spatial;

pub mod errors {
    use dxfview_core::transform::TransformError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("invalid view transform: {0}")]
        InvalidTransform(#[from] TransformError),
        #[error("scene payload could not be parsed: {0}")]
        SceneParse(#[from] serde_json::Error),
    }
}

pub mod prelude {
    //! 宿主程序常用类型的便捷导入。
    pub use crate::errors::EngineError;
    pub use crate::hit::{Hit, HitTestOptions, HitTester, RegionMode};
    pub use crate::scene::{SceneData, SceneEntity, SceneLayer, ScenePoint};
    pub use crate::service::{HitTestResult, HitTestingService, QueryDefaults, SceneReport};
    pub use crate::spatial::{GridSizing, SpatialIndex};
    pub use dxfview_core::geometry::{Bounds2D, Point2};
    pub use dxfview_core::transform::{ViewTransform, Viewport};
}
