// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/bin/simple_oneshot.rs - 分析单张图片
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use ronghe::{
  FromUrl,
  enhance::{DEFAULT_CANONICAL_SIZE, DEFAULT_PADDING_FRACTION, EnhanceConfig},
  fusion::FusionConfig,
  model::{ReplayClassifier, ReplayDetector},
  pipeline::{Analyzer, Pipeline},
  task::{OneShotTask, Task},
};
use tracing::info;

/// Ronghe 单张图片分析参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测器，如 replay:///path/detections.json
  #[arg(long, value_name = "MODEL")]
  pub detector: Url,
  /// 分类器，如 replay:///path/classifications.json
  #[arg(long, value_name = "MODEL")]
  pub classifier: Url,
  /// 输入图片，如 image:///path/photo.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出，如 console:、json:///path/report.jsonl、image:///path/out.png
  #[arg(long, value_name = "OUTPUT", default_value = "console:")]
  pub output: Url,
  /// 增强图像的最大边长
  #[arg(long, default_value_t = DEFAULT_CANONICAL_SIZE)]
  pub canonical_size: u32,
  /// 留白比例
  #[arg(long, default_value_t = DEFAULT_PADDING_FRACTION)]
  pub padding_fraction: f32,
  /// 关闭锐化
  #[arg(long)]
  pub no_sharpen: bool,
  /// 融合配置 JSON 文件（阈值与分级表）
  #[arg(long, value_name = "FILE")]
  pub fusion_config: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测器: {}", args.detector);
  info!("分类器: {}", args.classifier);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let fusion = match &args.fusion_config {
    Some(path) => {
      let text = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取融合配置: {}", path.display()))?;
      FusionConfig::from_json(&text)
        .with_context(|| format!("无法解析融合配置: {}", path.display()))?
    }
    None => FusionConfig::default(),
  };
  let enhance = EnhanceConfig::default()
    .with_canonical_size(args.canonical_size)
    .with_padding_fraction(args.padding_fraction)
    .with_sharpen(!args.no_sharpen);

  let input = ronghe::input::InputWrapper::from_url(&args.input)?;
  let detector = ReplayDetector::from_url(&args.detector)?;
  let classifier = ReplayClassifier::from_url(&args.classifier)?;
  let output = ronghe::output::OutputWrapper::from_url(&args.output)?;

  let pipeline = Pipeline::new(Analyzer::new(enhance, fusion), detector, classifier);
  OneShotTask.run_task(input, pipeline, output)?;

  Ok(())
}
