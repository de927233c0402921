// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/frame.rs - RGB 栅格图像定义
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

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;

/// 栅格图像的来源：原始输入或增强后的图像
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterOrigin {
  Original,
  Enhanced,
}

impl RasterOrigin {
  pub fn as_str(&self) -> &'static str {
    match self {
      RasterOrigin::Original => "original",
      RasterOrigin::Enhanced => "enhanced",
    }
  }
}

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 不可变的 RGB 栅格图像，按 NHWC（交错 R,G,B）排列，每通道 8 位
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
  width: u32,
  height: u32,
  origin: RasterOrigin,
  data: Box<[u8]>,
}

impl RasterImage {
  /// 从交错排列的 RGB 字节创建图像，长度必须等于 `width * height * 3`
  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      origin: RasterOrigin::Original,
      data: data.into_boxed_slice(),
    })
  }

  /// 单色填充的图像
  pub fn from_pixel(width: u32, height: u32, pixel: [u8; 3]) -> Self {
    let data = pixel
      .iter()
      .copied()
      .cycle()
      .take(RGB_CHANNELS * width as usize * height as usize)
      .collect::<Vec<_>>();

    Self {
      width,
      height,
      origin: RasterOrigin::Original,
      data: data.into_boxed_slice(),
    }
  }

  /// 从解码后的图像创建，透明通道合成到白色背景上
  pub fn from_dynamic(image: &DynamicImage) -> Self {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut data = Vec::with_capacity(RGB_CHANNELS * width as usize * height as usize);

    for pixel in rgba.pixels() {
      let alpha = pixel[3] as u32;
      for c in 0..RGB_CHANNELS {
        // 与白色按 alpha 混合，四舍五入
        let blended = (pixel[c] as u32 * alpha + 255 * (255 - alpha) + 127) / 255;
        data.push(blended as u8);
      }
    }

    Self {
      width,
      height,
      origin: RasterOrigin::Original,
      data: data.into_boxed_slice(),
    }
  }

  pub(crate) fn with_origin(mut self, origin: RasterOrigin) -> Self {
    self.origin = origin;
    self
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn origin(&self) -> RasterOrigin {
    self.origin
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
    let idx = (y as usize * self.width as usize + x as usize) * RGB_CHANNELS;
    [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

pub trait ToRgbImage {
  fn to_rgb_image(&self) -> RgbImage;
}

impl ToRgbImage for RasterImage {
  fn to_rgb_image(&self) -> RgbImage {
    let width = self.width;
    let data = &self.data;

    ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let idx = (y as usize * width as usize + x as usize) * RGB_CHANNELS;
      Rgb([data[idx], data[idx + 1], data[idx + 2]])
    })
  }
}

impl From<RgbImage> for RasterImage {
  fn from(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      origin: RasterOrigin::Original,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgba, RgbaImage};

  #[test]
  fn from_raw_rejects_wrong_length() {
    let err = RasterImage::from_raw(2, 2, vec![0u8; 11]).unwrap_err();
    match err {
      FrameError::LengthMismatch { expected, actual } => {
        assert_eq!(expected, 12);
        assert_eq!(actual, 11);
      }
    }
  }

  #[test]
  fn transparent_pixels_become_white() {
    let mut rgba = RgbaImage::new(2, 1);
    rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
    rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
    let raster = RasterImage::from_dynamic(&DynamicImage::ImageRgba8(rgba));

    assert_eq!(raster.pixel(0, 0), [255, 255, 255]);
    assert_eq!(raster.pixel(1, 0), [10, 20, 30]);
    assert_eq!(raster.origin(), RasterOrigin::Original);
  }

  #[test]
  fn rgb_image_conversion_keeps_pixels() {
    let mut image = RgbImage::new(3, 2);
    image.put_pixel(2, 1, Rgb([1, 2, 3]));
    let raster = RasterImage::from(image.clone());

    assert_eq!(raster.pixel(2, 1), [1, 2, 3]);
    assert_eq!(raster.to_rgb_image(), image);
  }
}
