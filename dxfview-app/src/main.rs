use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use dxfview_config::{AppConfig, ConfigError};
use dxfview_engine::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod cli;

use cli::CliArgs;

#[derive(Serialize)]
struct PointReport {
    screen: Point2,
    best: HitTestResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    candidates: Vec<HitTestResult>,
}

#[derive(Serialize)]
struct RegionReport {
    region: [Point2; 2],
    mode: &'static str,
    hits: Vec<HitTestResult>,
}

fn main() {
    let args = CliArgs::parse();
    let config = load_configuration(args.config.clone());
    init_logging(&config);
    info!("启动 dxfview 命中测试");

    if let Err(err) = run(&args, &config) {
        error!(error = %err, "命中测试失败");
        eprintln!("错误：{err:#}");
        std::process::exit(1);
    }
}

fn run(args: &CliArgs, config: &AppConfig) -> Result<()> {
    if args.points.is_empty() && args.region.is_none() {
        bail!("至少需要一个 --point 或 --region");
    }

    let scene = match &args.scene {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("读取场景文件 {} 失败", path.display()))?;
            SceneData::from_json_str(&source)
                .with_context(|| format!("解析场景文件 {} 失败", path.display()))?
        }
        None => {
            info!("未指定场景文件，使用内置演示场景");
            SceneData::demo()
        }
    };

    let mut service = HitTestingService::new(query_defaults(args, config));
    let report = service.update_scene(Some(&scene));
    info!(
        converted = report.converted,
        degenerate = report.degenerate,
        skipped = report.skipped.len(),
        "场景已载入"
    );

    let transform = ViewTransform::new(args.scale, args.offset.x(), args.offset.y());
    let (width, height) = args.viewport;
    let viewport = Viewport::new(width, height).with_top_margin(config.view.top_margin);

    let mut options = service.options();
    if let Some(pixels) = args.pixel_tolerance.or(config.hit_test.pixel_tolerance) {
        options.tolerance = transform.world_tolerance(pixels)?;
    }
    if !args.layers.is_empty() {
        options = options.with_layers(args.layers.iter().cloned());
    }

    if !args.points.is_empty() {
        let best = service.hit_test_multiple(&args.points, &transform, &viewport, &options)?;
        for (screen, best) in args.points.iter().zip(best) {
            let candidates = if options.max_results > 1 {
                let world = dxfview_core::transform::screen_to_world(*screen, &transform, &viewport)?;
                service.hit_test_world(world, &options)
            } else {
                Vec::new()
            };
            print_json(&PointReport {
                screen: *screen,
                best,
                candidates,
            })?;
        }
    }

    if let Some((corner_a, corner_b)) = args.region {
        let mode = if args.crossing {
            RegionMode::Crossing
        } else {
            RegionMode::Window
        };
        let hits =
            service.hit_test_region_screen(corner_a, corner_b, mode, &transform, &viewport, &options)?;
        print_json(&RegionReport {
            region: [corner_a, corner_b],
            mode: if args.crossing { "crossing" } else { "window" },
            hits,
        })?;
    }

    Ok(())
}

fn query_defaults(args: &CliArgs, config: &AppConfig) -> QueryDefaults {
    QueryDefaults {
        tolerance: config.hit_test.tolerance,
        max_results: args.max_results.unwrap_or(config.hit_test.max_results),
        include_invisible: args.include_invisible || config.hit_test.include_invisible,
        grid: config
            .index
            .cell_size
            .map_or(GridSizing::Auto, GridSizing::Fixed),
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let line = serde_json::to_string(value).context("序列化查询结果失败")?;
    println!("{line}");
    Ok(())
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } | ConfigError::Invalid(_) => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
