// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/pipeline.rs - 增强、并发推理与融合的分析入口
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

use std::thread;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  enhance::{EnhanceConfig, EnhanceError, enhance},
  frame::RasterImage,
  fusion::{FusedResult, FusionConfig, fuse},
  model::{Classifier, Detector, Model, ModelError},
};

#[derive(Error, Debug, PartialEq)]
pub enum AnalysisError {
  #[error("输入图像无效: {0}")]
  InvalidInput(#[from] EnhanceError),
  #[error("模型 {model} 未就绪: {reason}")]
  ModelUnavailable { model: &'static str, reason: String },
  #[error("模型 {model} 调用失败: {reason}")]
  ModelInvocationFailed { model: &'static str, reason: String },
}

impl AnalysisError {
  fn from_model(model: &'static str, err: ModelError) -> Self {
    match err {
      ModelError::Unavailable(reason) => AnalysisError::ModelUnavailable { model, reason },
      ModelError::InvocationFailed(reason) => {
        AnalysisError::ModelInvocationFailed { model, reason }
      }
    }
  }
}

/// 一次分析的完整输出：增强图像与融合结果
#[derive(Debug, Clone)]
pub struct Analysis {
  pub enhanced: RasterImage,
  pub result: FusedResult,
}

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
  enhance: EnhanceConfig,
  fusion: FusionConfig,
}

type Joined<T> = thread::Result<Result<Vec<T>, ModelError>>;

fn settle<T>(model: &'static str, joined: Joined<T>) -> Result<Vec<T>, AnalysisError> {
  match joined {
    Ok(result) => result.map_err(|e| {
      error!("模型 {} 调用出错: {}", model, e);
      AnalysisError::from_model(model, e)
    }),
    Err(_) => {
      error!("模型 {} 调用时发生 panic", model);
      Err(AnalysisError::ModelInvocationFailed {
        model,
        reason: "模型调用发生 panic".to_string(),
      })
    }
  }
}

impl Analyzer {
  pub fn new(enhance: EnhanceConfig, fusion: FusionConfig) -> Self {
    Self { enhance, fusion }
  }

  pub fn enhance_config(&self) -> &EnhanceConfig {
    &self.enhance
  }

  pub fn fusion_config(&self) -> &FusionConfig {
    &self.fusion
  }

  /// 分析一幅图像，返回融合后的结果
  pub fn analyze<D, C>(
    &self,
    original: &RasterImage,
    detector: &D,
    classifier: &C,
  ) -> Result<FusedResult, AnalysisError>
  where
    D: Detector + Sync,
    C: Classifier + Sync,
  {
    self
      .analyze_detailed(original, detector, classifier)
      .map(|analysis| analysis.result)
  }

  /// 分析一幅图像，同时返回增强后的图像。
  ///
  /// 四次模型调用（检测器、分类器 × 原图、增强图）并发执行，
  /// 全部完成后才进行融合；任意一次失败则整次分析失败，不返回部分结果。
  pub fn analyze_detailed<D, C>(
    &self,
    original: &RasterImage,
    detector: &D,
    classifier: &C,
  ) -> Result<Analysis, AnalysisError>
  where
    D: Detector + Sync,
    C: Classifier + Sync,
  {
    let enhanced = enhance(original, &self.enhance)?;
    debug!(
      "增强完成: {}x{} -> {}x{}",
      original.width(),
      original.height(),
      enhanced.width(),
      enhanced.height()
    );

    let (det_original, det_enhanced, cls_original, cls_enhanced) = thread::scope(|s| {
      let det_original = s.spawn(|| detector.infer(original));
      let det_enhanced = s.spawn(|| detector.infer(&enhanced));
      let cls_original = s.spawn(|| classifier.infer(original));
      let cls_enhanced = s.spawn(|| classifier.infer(&enhanced));
      (
        det_original.join(),
        det_enhanced.join(),
        cls_original.join(),
        cls_enhanced.join(),
      )
    });

    let detections = vec![
      settle("detector", det_original)?,
      settle("detector", det_enhanced)?,
    ];
    let classifications = vec![
      settle("classifier", cls_original)?,
      settle("classifier", cls_enhanced)?,
    ];

    let result = fuse(&detections, &classifications, &self.fusion);
    info!(
      "分析完成: {} ({} 个对象, 最高置信度 {}%)",
      result.summary.top_label, result.summary.object_count, result.summary.max_confidence_percent
    );

    Ok(Analysis { enhanced, result })
  }
}

/// 将分析器与调用方持有的两个模型绑定为一个 [`Model`]
pub struct Pipeline<D, C> {
  analyzer: Analyzer,
  detector: D,
  classifier: C,
}

impl<D, C> Pipeline<D, C> {
  pub fn new(analyzer: Analyzer, detector: D, classifier: C) -> Self {
    Self {
      analyzer,
      detector,
      classifier,
    }
  }
}

impl<D, C> Model for Pipeline<D, C>
where
  D: Detector + Sync,
  C: Classifier + Sync,
{
  type Input = RasterImage;
  type Output = Analysis;
  type Error = AnalysisError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self
      .analyzer
      .analyze_detailed(input, &self.detector, &self.classifier)
  }
}
