// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/input/directory_input.rs - 目录图片输入
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

use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{Frame, decode_image_file, is_image_file},
};

#[derive(Error, Debug)]
pub enum DirectoryInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按文件名顺序逐个读取目录中的图片，无法解码的文件会被跳过
pub struct DirectoryInput {
  files: std::vec::IntoIter<PathBuf>,
  index: u64,
}

impl FromUrlWithScheme for DirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryInput {
  type Error = DirectoryInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DirectoryInputError::SchemeMismatch);
    }

    let mut files = std::fs::read_dir(url.path())?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| path.is_file() && is_image_file(path))
      .collect::<Vec<_>>();
    files.sort();

    info!("目录 {} 中找到 {} 张图片", url.path(), files.len());

    Ok(DirectoryInput {
      files: files.into_iter(),
      index: 0,
    })
  }
}

impl Iterator for DirectoryInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      match decode_image_file(&path) {
        Ok(image) => {
          debug!("读取图片 {}", path.display());
          let frame = Frame {
            image,
            index: self.index,
            name: path
              .file_name()
              .map(|n| n.to_string_lossy().into_owned())
              .unwrap_or_default(),
          };
          self.index += 1;
          return Some(frame);
        }
        Err(e) => {
          error!("无法解码图片 {}: {}", path.display(), e);
        }
      }
    }
    None
  }
}
