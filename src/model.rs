// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/model.rs - 外部模型能力与预测结果类型
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

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::RasterImage;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 检测器：对图像给出不带边框的 (标签, 置信度) 列表
pub trait Detector: Model<Input = RasterImage, Output = Vec<Detection>, Error = ModelError> {}

impl<M> Detector for M where M: Model<Input = RasterImage, Output = Vec<Detection>, Error = ModelError> {}

/// 分类器：对整幅图像给出类别概率分布
pub trait Classifier:
  Model<Input = RasterImage, Output = Vec<ClassificationItem>, Error = ModelError>
{
}

impl<M> Classifier for M where
  M: Model<Input = RasterImage, Output = Vec<ClassificationItem>, Error = ModelError>
{
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
  #[error("模型未就绪: {0}")]
  Unavailable(String),
  #[error("模型调用失败: {0}")]
  InvocationFailed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceModel {
  #[default]
  Detector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
  pub label: String,
  pub confidence: f32,
  #[serde(default)]
  pub source_model: SourceModel,
}

impl Detection {
  pub fn new(label: impl Into<String>, confidence: f32) -> Self {
    Self {
      label: label.into(),
      confidence,
      source_model: SourceModel::Detector,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationItem {
  #[serde(alias = "className")]
  pub label: String,
  #[serde(alias = "probability")]
  pub confidence: f32,
}

impl ClassificationItem {
  pub fn new(label: impl Into<String>, confidence: f32) -> Self {
    Self {
      label: label.into(),
      confidence,
    }
  }
}

mod replay;
mod slot;
pub use self::replay::{ReplayClassifier, ReplayDetector, ReplayModel, ReplayModelError};
pub use self::slot::ModelSlot;
