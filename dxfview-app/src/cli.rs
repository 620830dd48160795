//! 命令行参数。

use std::path::PathBuf;

use clap::Parser;
use dxfview_engine::prelude::Point2;

/// 对场景执行屏幕坐标命中测试并以 JSON 行输出结果
#[derive(Parser, Debug)]
#[command(name = "dxfview", version, about, long_about = None)]
pub struct CliArgs {
    /// 配置文件路径，缺省时按 DXFVIEW_CONFIG 与 ./config/default.toml 查找
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 场景 JSON 文件，缺省时使用内置演示场景
    #[arg(long)]
    pub scene: Option<PathBuf>,

    /// 屏幕查询点 `x,y`，可重复
    #[arg(long = "point", value_parser = parse_point)]
    pub points: Vec<Point2>,

    /// 屏幕框选矩形 `x0,y0,x1,y1`
    #[arg(long, value_parser = parse_region)]
    pub region: Option<(Point2, Point2)>,

    /// 框选采用交叉模式（默认窗口模式）
    #[arg(long, default_value_t = false)]
    pub crossing: bool,

    /// 世界到屏幕的缩放倍数
    #[arg(long, default_value_t = 1.0)]
    pub scale: f64,

    /// 屏幕平移 `x,y`
    #[arg(long, value_parser = parse_point, default_value = "0,0")]
    pub offset: Point2,

    /// 画布尺寸 `宽x高`
    #[arg(long, value_parser = parse_viewport, default_value = "800x600")]
    pub viewport: (f64, f64),

    /// 像素拾取半径，按缩放换算为世界容差
    #[arg(long)]
    pub pixel_tolerance: Option<f64>,

    /// 每个查询点输出的候选数
    #[arg(long)]
    pub max_results: Option<usize>,

    /// 只在这些图层中查找，可重复
    #[arg(long = "layer")]
    pub layers: Vec<String>,

    /// 包含隐藏图层与隐藏实体
    #[arg(long, default_value_t = false)]
    pub include_invisible: bool,
}

fn parse_numbers<const N: usize>(raw: &str, separator: char) -> Result<[f64; N], String> {
    let parts: Vec<&str> = raw.split(separator).map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("需要 {N} 个以 `{separator}` 分隔的数值，收到 `{raw}`"));
    }
    let mut values = [0.0; N];
    for (slot, part) in values.iter_mut().zip(parts) {
        let value: f64 = part
            .parse()
            .map_err(|_| format!("`{part}` 不是有效数值"))?;
        if !value.is_finite() {
            return Err(format!("`{part}` 不是有限数值"));
        }
        *slot = value;
    }
    Ok(values)
}

pub fn parse_point(raw: &str) -> Result<Point2, String> {
    let [x, y] = parse_numbers::<2>(raw, ',')?;
    Ok(Point2::new(x, y))
}

pub fn parse_region(raw: &str) -> Result<(Point2, Point2), String> {
    let [x0, y0, x1, y1] = parse_numbers::<4>(raw, ',')?;
    Ok((Point2::new(x0, y0), Point2::new(x1, y1)))
}

pub fn parse_viewport(raw: &str) -> Result<(f64, f64), String> {
    let [width, height] = parse_numbers::<2>(&raw.to_ascii_lowercase(), 'x')?;
    Ok((width, height))
}
