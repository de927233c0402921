// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/output/console.rs - 控制台输出
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

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::Frame,
  output::Render,
  pipeline::Analysis,
};

/// 默认展示的结果条数
const DEFAULT_TOP_N: usize = 3;

#[derive(Error, Debug)]
pub enum ConsoleOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("参数 top 无效: {0}")]
  InvalidTop(String),
}

/// 在终端打印摘要和前几条结果，`console:?top=5` 可调整条数
pub struct ConsoleOutput {
  top: usize,
}

impl Default for ConsoleOutput {
  fn default() -> Self {
    Self { top: DEFAULT_TOP_N }
  }
}

impl FromUrlWithScheme for ConsoleOutput {
  const SCHEME: &'static str = "console";
}

impl FromUrl for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ConsoleOutputError::SchemeMismatch);
    }

    let mut output = ConsoleOutput::default();
    for (k, v) in url.query_pairs() {
      if k == "top" {
        output.top = v
          .parse()
          .map_err(|_| ConsoleOutputError::InvalidTop(v.to_string()))?;
      }
    }
    Ok(output)
  }
}

impl ConsoleOutput {
  pub fn format(&self, frame: &Frame, result: &Analysis) -> String {
    let summary = &result.result.summary;
    let mut lines = vec![format!(
      "[{}] {}: {} | 对象数: {} | 最高置信度: {}%",
      frame.index, frame.name, summary.top_label, summary.object_count, summary.max_confidence_percent
    )];
    lines.extend(
      result
        .result
        .top_lines(self.top)
        .into_iter()
        .map(|line| format!("  - {}", line)),
    );
    lines.join("\n")
  }
}

impl Render<Frame, Analysis> for ConsoleOutput {
  type Error = ConsoleOutputError;

  fn render_result(&self, frame: &Frame, result: &Analysis) -> Result<(), Self::Error> {
    println!("{}", self.format(frame, result));
    Ok(())
  }
}
