// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/output/json_report.rs - JSON Lines 结果报告
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::Path,
  sync::Mutex,
};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  fusion::FusedResult,
  input::Frame,
  output::Render,
  pipeline::Analysis,
};

#[derive(Error, Debug)]
pub enum JsonReportError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("报告写入器已损坏")]
  Poisoned,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportLine<'a> {
  generated_at: String,
  frame: &'a str,
  index: u64,
  width: u32,
  height: u32,
  #[serde(flatten)]
  result: &'a FusedResult,
}

/// 每分析一帧写入一行 JSON
pub struct JsonReportOutput {
  writer: Mutex<BufWriter<File>>,
}

impl FromUrlWithScheme for JsonReportOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonReportOutput {
  type Error = JsonReportError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonReportError::SchemeMismatch);
    }

    let path = Path::new(url.path());
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    info!("结果报告写入: {}", path.display());

    Ok(JsonReportOutput {
      writer: Mutex::new(BufWriter::new(file)),
    })
  }
}

impl Render<Frame, Analysis> for JsonReportOutput {
  type Error = JsonReportError;

  fn render_result(&self, frame: &Frame, result: &Analysis) -> Result<(), Self::Error> {
    let line = ReportLine {
      generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
      frame: &frame.name,
      index: frame.index,
      width: frame.image.width(),
      height: frame.image.height(),
      result: &result.result,
    };

    let mut writer = self.writer.lock().map_err(|_| JsonReportError::Poisoned)?;
    serde_json::to_writer(&mut *writer, &line)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    debug!("已写入第 {} 帧的报告", frame.index);

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::RasterImage,
    fusion::{FusionConfig, fuse},
    model::{ClassificationItem, Detection},
  };

  #[test]
  fn writes_one_line_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.jsonl");
    let url = Url::parse(&format!("json://{}", path.display())).unwrap();
    let output = JsonReportOutput::from_url(&url).unwrap();

    let image = RasterImage::from_pixel(4, 3, [0, 0, 0]);
    let result = fuse(
      &[vec![Detection::new("Dog", 0.5)]],
      &[vec![ClassificationItem::new("beagle, hound", 0.5)]],
      &FusionConfig::default(),
    );
    let analysis = Analysis {
      enhanced: image.clone(),
      result,
    };

    for index in 0..2 {
      let frame = Frame {
        image: image.clone(),
        index,
        name: format!("{}.png", index),
      };
      output.render_result(&frame, &analysis).unwrap();
    }

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = text
      .lines()
      .map(|l| serde_json::from_str(l).unwrap())
      .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["frame"], "1.png");
    assert_eq!(lines[0]["width"], 4);
    assert_eq!(lines[0]["detections"][0]["label"], "dog");
    assert_eq!(lines[0]["detections"][0]["sourceModel"], "detector");
    assert_eq!(lines[0]["classifications"][0]["label"], "beagle");
    assert_eq!(lines[0]["summary"]["topLabel"], "beagle");
    assert_eq!(lines[0]["summary"]["objectCount"], 1);
    assert!(lines[0]["generatedAt"].as_str().unwrap().ends_with('Z'));
    assert!(lines[0].get("generated_at").is_none());
  }
}
