// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/model/replay.rs - 回放已记录的模型预测
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

use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{RasterImage, RasterOrigin},
  model::{ClassificationItem, Detection, Model, ModelError},
};

#[derive(Error, Debug)]
pub enum ReplayModelError {
  #[error("URI 方案不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("预测文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Recording<T> {
  #[serde(default)]
  original: Vec<T>,
  #[serde(default)]
  enhanced: Vec<T>,
}

/// 按栅格来源回放预测结果，文件格式为
/// `{ "original": [...], "enhanced": [...] }`
#[derive(Debug, Clone)]
pub struct ReplayModel<T> {
  original: Vec<T>,
  enhanced: Vec<T>,
}

pub type ReplayDetector = ReplayModel<Detection>;
pub type ReplayClassifier = ReplayModel<ClassificationItem>;

impl<T> ReplayModel<T> {
  pub fn new(original: Vec<T>, enhanced: Vec<T>) -> Self {
    Self { original, enhanced }
  }
}

impl<T: DeserializeOwned> ReplayModel<T> {
  pub fn from_json(text: &str) -> Result<Self, ReplayModelError> {
    let Recording { original, enhanced } = serde_json::from_str::<Recording<T>>(text)?;
    Ok(Self { original, enhanced })
  }
}

impl<T> FromUrlWithScheme for ReplayModel<T>
where
  T: DeserializeOwned,
{
  const SCHEME: &'static str = "replay";
}

impl<T: DeserializeOwned> FromUrl for ReplayModel<T> {
  type Error = ReplayModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ReplayModelError::SchemeMismatch {
        expected: Self::SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    info!("加载预测记录: {}", url.path());
    let text = std::fs::read_to_string(url.path())?;
    let model = Self::from_json(&text)?;
    debug!(
      "预测记录条数: original={}, enhanced={}",
      model.original.len(),
      model.enhanced.len()
    );
    Ok(model)
  }
}

impl<T: Clone> Model for ReplayModel<T> {
  type Input = RasterImage;
  type Output = Vec<T>;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let items = match input.origin() {
      RasterOrigin::Original => &self.original,
      RasterOrigin::Enhanced => &self.enhanced,
    };
    Ok(items.clone())
  }
}
