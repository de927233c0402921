// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/model/slot.rs - 一次性加载的模型槽
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

use std::sync::OnceLock;

use tracing::{info, warn};

use crate::model::{Model, ModelError};

/// 由调用方持有的模型槽。模型可以在别处异步加载后填入，
/// 填入前调用会返回 [`ModelError::Unavailable`]。
pub struct ModelSlot<M> {
  name: String,
  model: OnceLock<M>,
}

impl<M> ModelSlot<M> {
  pub fn empty(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      model: OnceLock::new(),
    }
  }

  pub fn loaded(name: impl Into<String>, model: M) -> Self {
    let slot = Self::empty(name);
    let _ = slot.model.set(model);
    slot
  }

  /// 填入模型；已填入时原样返回传入的模型
  pub fn fill(&self, model: M) -> Result<(), M> {
    self.model.set(model).inspect(|_| info!("模型 {} 已就绪", self.name))
  }

  pub fn is_ready(&self) -> bool {
    self.model.get().is_some()
  }

  pub fn name(&self) -> &str {
    &self.name
  }
}

impl<M> Model for ModelSlot<M>
where
  M: Model<Error = ModelError>,
{
  type Input = M::Input;
  type Output = M::Output;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self.model.get() {
      Some(model) => model.infer(input),
      None => {
        warn!("模型 {} 尚未加载", self.name);
        Err(ModelError::Unavailable(self.name.clone()))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::RasterImage,
    model::{Detection, ReplayDetector},
  };

  #[test]
  fn empty_slot_is_unavailable() {
    let slot: ModelSlot<ReplayDetector> = ModelSlot::empty("detector");
    let image = RasterImage::from_pixel(1, 1, [0, 0, 0]);

    assert!(!slot.is_ready());
    assert_eq!(
      slot.infer(&image),
      Err(ModelError::Unavailable("detector".to_string()))
    );
  }

  #[test]
  fn filled_slot_delegates_once() {
    let slot = ModelSlot::empty("detector");
    let image = RasterImage::from_pixel(1, 1, [0, 0, 0]);

    assert!(slot.fill(ReplayDetector::new(vec![Detection::new("cup", 0.5)], vec![])).is_ok());
    assert!(slot.fill(ReplayDetector::new(vec![], vec![])).is_err());
    assert!(slot.is_ready());
    assert_eq!(slot.infer(&image).unwrap(), vec![Detection::new("cup", 0.5)]);
  }
}
