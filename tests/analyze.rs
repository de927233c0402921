// 该文件是 Ronghe （融合识别） 项目的一部分。
// tests/analyze.rs - 端到端分析测试
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

use std::sync::{Arc, Barrier};

use image::{Rgb, RgbImage};
use url::Url;

use ronghe::{
  FromUrl,
  enhance::EnhanceConfig,
  frame::{RasterImage, RasterOrigin},
  fusion::{FusionConfig, UNIDENTIFIED_LABEL},
  input::InputWrapper,
  model::{ClassificationItem, Detection, Model, ModelError, ModelSlot, ReplayClassifier, ReplayDetector},
  output::OutputWrapper,
  pipeline::{AnalysisError, Analyzer, Pipeline},
  task::{OneShotTask, Task},
};

/// 所有调用在同一个栅栏处等待，只有四次调用并发执行时才能通过
struct Gated<T> {
  barrier: Arc<Barrier>,
  items: Vec<T>,
}

impl<T: Clone> Model for Gated<T> {
  type Input = RasterImage;
  type Output = Vec<T>;
  type Error = ModelError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.barrier.wait();
    Ok(self.items.clone())
  }
}

fn analyzer() -> Analyzer {
  Analyzer::new(
    EnhanceConfig::default().with_canonical_size(32),
    FusionConfig::default(),
  )
}

#[test]
fn four_model_calls_run_concurrently() {
  let barrier = Arc::new(Barrier::new(4));
  let detector = Gated {
    barrier: barrier.clone(),
    items: vec![Detection::new("Car", 0.5)],
  };
  let classifier = Gated {
    barrier,
    items: vec![ClassificationItem::new("sports car, sport car", 0.4)],
  };

  let image = RasterImage::from_pixel(40, 20, [90, 90, 90]);
  let result = analyzer().analyze(&image, &detector, &classifier).unwrap();

  assert_eq!(result.detections.len(), 1);
  assert_eq!(result.detections[0].label, "car");
  assert!((result.detections[0].confidence - 0.6).abs() < 1e-6);
  assert_eq!(result.classifications[0].label, "sports car");
  assert!((result.classifications[0].confidence - 0.44).abs() < 1e-6);
  assert_eq!(result.summary.top_label, "sports car");
  assert_eq!(result.summary.max_confidence_percent, 60);
}

#[test]
fn unloaded_model_is_unavailable() {
  let detector = ModelSlot::loaded("detector", ReplayDetector::new(vec![], vec![]));
  let classifier: ModelSlot<ReplayClassifier> = ModelSlot::empty("classifier");
  let image = RasterImage::from_pixel(4, 4, [0, 0, 0]);

  let err = analyzer().analyze(&image, &detector, &classifier).unwrap_err();
  assert_eq!(
    err,
    AnalysisError::ModelUnavailable {
      model: "classifier",
      reason: "classifier".to_string()
    }
  );

  assert!(classifier.fill(ReplayClassifier::new(vec![], vec![])).is_ok());
  let result = analyzer().analyze(&image, &detector, &classifier).unwrap();
  assert_eq!(result.summary.top_label, UNIDENTIFIED_LABEL);
}

#[test]
fn enhanced_raster_reaches_the_models() {
  let image = RasterImage::from_pixel(64, 16, [10, 200, 10]);
  let detector = ReplayDetector::new(vec![], vec![Detection::new("bottle", 0.3)]);
  let classifier = ReplayClassifier::new(vec![ClassificationItem::new("meadow", 0.2)], vec![]);

  let analysis = analyzer()
    .analyze_detailed(&image, &detector, &classifier)
    .unwrap();

  assert_eq!(analysis.enhanced.origin(), RasterOrigin::Enhanced);
  assert_eq!((analysis.enhanced.width(), analysis.enhanced.height()), (32, 32));
  assert_eq!(analysis.result.detections[0].label, "bottle");
  assert_eq!(analysis.result.classifications[0].label, "meadow");
}

#[test]
fn one_shot_from_files_to_report() {
  let dir = tempfile::tempdir().unwrap();
  let photo = dir.path().join("photo.png");
  RgbImage::from_fn(30, 20, |x, y| Rgb([(x * 8) as u8, (y * 12) as u8, 128]))
    .save(&photo)
    .unwrap();

  let detections = dir.path().join("detections.json");
  std::fs::write(
    &detections,
    r#"{
      "original": [{"label": "dog", "confidence": 0.3}],
      "enhanced": [{"label": "Dog", "confidence": 0.6}, {"label": "kite", "confidence": 0.1}]
    }"#,
  )
  .unwrap();
  let classifications = dir.path().join("classifications.json");
  std::fs::write(
    &classifications,
    r#"{
      "original": [{"className": "cat, feline", "probability": 0.2}],
      "enhanced": [{"className": "cat", "probability": 0.4}]
    }"#,
  )
  .unwrap();
  let report = dir.path().join("report.jsonl");

  let url = |scheme: &str, path: &std::path::Path| {
    Url::parse(&format!("{}://{}", scheme, path.display())).unwrap()
  };

  let input = InputWrapper::from_url(&url("image", &photo)).unwrap();
  let detector = ReplayDetector::from_url(&url("replay", &detections)).unwrap();
  let classifier = ReplayClassifier::from_url(&url("replay", &classifications)).unwrap();
  let output = OutputWrapper::from_url(&url("json", &report)).unwrap();

  OneShotTask
    .run_task(input, Pipeline::new(analyzer(), detector, classifier), output)
    .unwrap();

  let line: serde_json::Value =
    serde_json::from_str(std::fs::read_to_string(&report).unwrap().trim()).unwrap();

  assert_eq!(line["frame"], "photo.png");
  assert_eq!(line["detections"].as_array().unwrap().len(), 1);
  assert_eq!(line["detections"][0]["label"], "dog");
  assert_eq!(line["classifications"][0]["label"], "cat");
  assert_eq!(line["summary"]["topLabel"], "cat");
  assert_eq!(line["summary"]["objectCount"], 1);
  assert_eq!(line["summary"]["maxConfidencePercent"], 72);
}
