// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/enhance.rs - 图像增强：几何归一化、自适应对比度与锐化
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

use image::{Rgb, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

use crate::frame::{RGB_CHANNELS, RasterImage, RasterOrigin, ToRgbImage};

pub const DEFAULT_CANONICAL_SIZE: u32 = 640;
pub const DEFAULT_PADDING_FRACTION: f32 = 0.05;

const BACKGROUND: [u8; 3] = [255, 255, 255];

/// 亮度分段 (上界, 对比度系数, 亮度偏移)，越暗的像素校正越强
const TONE_BANDS: [(u32, f32, f32); 4] = [
  (64, 1.30, 20.0),
  (128, 1.20, 12.0),
  (192, 1.10, 5.0),
  (u32::MAX, 1.05, 0.0),
];

const SHARPEN_CENTER: f32 = 1.5;
const SHARPEN_NEIGHBOR: f32 = 0.125;

#[derive(Error, Debug, PartialEq)]
pub enum EnhanceError {
  #[error("输入图像无效: {width}x{height}")]
  InvalidInput { width: u32, height: u32 },
  #[error("增强配置无效: {0}")]
  InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnhanceConfig {
  pub canonical_size: u32,
  pub padding_fraction: f32,
  pub sharpen: bool,
}

impl Default for EnhanceConfig {
  fn default() -> Self {
    Self {
      canonical_size: DEFAULT_CANONICAL_SIZE,
      padding_fraction: DEFAULT_PADDING_FRACTION,
      sharpen: true,
    }
  }
}

impl EnhanceConfig {
  pub fn with_canonical_size(mut self, canonical_size: u32) -> Self {
    self.canonical_size = canonical_size;
    self
  }

  pub fn with_padding_fraction(mut self, padding_fraction: f32) -> Self {
    self.padding_fraction = padding_fraction;
    self
  }

  pub fn with_sharpen(mut self, sharpen: bool) -> Self {
    self.sharpen = sharpen;
    self
  }

  fn validate(&self) -> Result<(), EnhanceError> {
    if self.canonical_size == 0 {
      return Err(EnhanceError::InvalidConfig("canonical_size 必须大于 0".into()));
    }
    if !(0.0..1.0).contains(&self.padding_fraction) {
      return Err(EnhanceError::InvalidConfig(format!(
        "padding_fraction 必须位于 [0, 1) 区间, 实际为 {}",
        self.padding_fraction
      )));
    }
    Ok(())
  }
}

/// 生成增强后的方形图像，原图不会被修改
pub fn enhance(original: &RasterImage, config: &EnhanceConfig) -> Result<RasterImage, EnhanceError> {
  if original.is_empty() {
    return Err(EnhanceError::InvalidInput {
      width: original.width(),
      height: original.height(),
    });
  }
  config.validate()?;

  let (w, h) = (original.width(), original.height());
  let side = config.canonical_size.min(w.max(h));
  debug!("增强图像: {}x{} -> {}x{}", w, h, side, side);

  let mut canvas = place_on_canvas(original, side, config.padding_fraction);
  apply_tone_curve(&mut canvas);

  let canvas = if config.sharpen {
    sharpen(&canvas)
  } else {
    canvas
  };

  Ok(RasterImage::from(canvas).with_origin(RasterOrigin::Enhanced))
}

/// 保持宽高比缩放并居中放置到白色画布上
fn place_on_canvas(original: &RasterImage, side: u32, padding_fraction: f32) -> RgbImage {
  let (w, h) = (original.width() as f32, original.height() as f32);
  let scale = (side as f32 / w).min(side as f32 / h) * (1.0 - padding_fraction);

  let scaled_w = ((w * scale).round() as u32).clamp(1, side);
  let scaled_h = ((h * scale).round() as u32).clamp(1, side);

  let resized = image::imageops::resize(
    &original.to_rgb_image(),
    scaled_w,
    scaled_h,
    FilterType::Triangle,
  );

  let mut canvas = RgbImage::from_pixel(side, side, Rgb(BACKGROUND));
  let offset_x = (side - scaled_w) / 2;
  let offset_y = (side - scaled_h) / 2;
  image::imageops::replace(&mut canvas, &resized, offset_x as i64, offset_y as i64);

  debug!(
    "缩放比例 {:.4}, 内容尺寸 {}x{}, 偏移 ({}, {})",
    scale, scaled_w, scaled_h, offset_x, offset_y
  );
  canvas
}

/// 感知亮度 `0.299R + 0.587G + 0.114B`，按千分之一整数精确计算
fn luminance_milli(pixel: [u8; 3]) -> u32 {
  299 * pixel[0] as u32 + 587 * pixel[1] as u32 + 114 * pixel[2] as u32
}

/// 亮度所在分段的 (对比度系数, 亮度偏移)
fn tone_params_milli(milli: u32) -> (f32, f32) {
  TONE_BANDS
    .iter()
    .find(|(upper, _, _)| *upper == u32::MAX || milli < upper * 1000)
    .map(|&(_, contrast, offset)| (contrast, offset))
    .unwrap_or((1.0, 0.0))
}

fn tone_channel(value: u8, contrast: f32, offset: f32) -> u8 {
  ((value as f32 - 128.0) * contrast + 128.0 + offset)
    .round()
    .clamp(0.0, 255.0) as u8
}

/// 逐像素的色调曲线，不涉及邻域
fn apply_tone_curve(image: &mut RgbImage) {
  for pixel in image.pixels_mut() {
    let (contrast, offset) = tone_params_milli(luminance_milli(pixel.0));
    for c in 0..RGB_CHANNELS {
      pixel[c] = tone_channel(pixel[c], contrast, offset);
    }
  }
}

/// 四邻域反锐化，只处理内部像素，边缘像素保持不变
fn sharpen(image: &RgbImage) -> RgbImage {
  let (width, height) = image.dimensions();
  let mut output = image.clone();
  if width < 3 || height < 3 {
    return output;
  }

  for y in 1..height - 1 {
    for x in 1..width - 1 {
      let center = image.get_pixel(x, y);
      let top = image.get_pixel(x, y - 1);
      let bottom = image.get_pixel(x, y + 1);
      let left = image.get_pixel(x - 1, y);
      let right = image.get_pixel(x + 1, y);

      let out = output.get_pixel_mut(x, y);
      for c in 0..RGB_CHANNELS {
        let neighbors = top[c] as f32 + bottom[c] as f32 + left[c] as f32 + right[c] as f32;
        let value = center[c] as f32 * SHARPEN_CENTER - neighbors * SHARPEN_NEIGHBOR;
        out[c] = value.round().clamp(0.0, 255.0) as u8;
      }
    }
  }

  output
}

#[cfg(test)]
mod tests {
  use super::*;

  fn gradient(width: u32, height: u32) -> RasterImage {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
      for x in 0..width {
        data.push(((x * 7 + y * 3) % 256) as u8);
        data.push(((x * 2 + y * 11) % 256) as u8);
        data.push(((x * 5 + y * 5) % 256) as u8);
      }
    }
    RasterImage::from_raw(width, height, data).unwrap()
  }

  #[test]
  fn output_is_square_and_capped() {
    let config = EnhanceConfig::default().with_canonical_size(64);

    let wide = enhance(&gradient(200, 50), &config).unwrap();
    assert_eq!((wide.width(), wide.height()), (64, 64));

    let small = enhance(&gradient(30, 12), &config).unwrap();
    assert_eq!((small.width(), small.height()), (30, 30));
    assert_eq!(small.origin(), RasterOrigin::Enhanced);
  }

  #[test]
  fn enhance_is_deterministic() {
    let config = EnhanceConfig::default().with_canonical_size(48);
    let image = gradient(73, 41);

    let a = enhance(&image, &config).unwrap();
    let b = enhance(&image, &config).unwrap();
    assert_eq!(a.as_nhwc(), b.as_nhwc());
  }

  #[test]
  fn original_is_not_mutated() {
    let image = gradient(20, 10);
    let before = image.clone();
    let _ = enhance(&image, &EnhanceConfig::default()).unwrap();
    assert_eq!(image, before);
  }

  #[test]
  fn zero_area_is_invalid_input() {
    let empty = RasterImage::from_raw(0, 5, Vec::new()).unwrap();
    assert_eq!(
      enhance(&empty, &EnhanceConfig::default()),
      Err(EnhanceError::InvalidInput {
        width: 0,
        height: 5
      })
    );
  }

  #[test]
  fn bad_config_is_rejected() {
    let image = gradient(4, 4);
    let zero = EnhanceConfig::default().with_canonical_size(0);
    assert!(matches!(
      enhance(&image, &zero),
      Err(EnhanceError::InvalidConfig(_))
    ));

    let padding = EnhanceConfig::default().with_padding_fraction(1.0);
    assert!(matches!(
      enhance(&image, &padding),
      Err(EnhanceError::InvalidConfig(_))
    ));
  }

  #[test]
  fn margin_stays_white() {
    let config = EnhanceConfig::default()
      .with_canonical_size(40)
      .with_padding_fraction(0.1)
      .with_sharpen(false);
    let black = RasterImage::from_pixel(40, 20, [0, 0, 0]);
    let out = enhance(&black, &config).unwrap();

    assert_eq!(out.pixel(0, 0), [255, 255, 255]);
    assert_eq!(out.pixel(20, 1), [255, 255, 255]);
    // 内容区域：黑色经过最暗分段校正
    let expected = tone_channel(0, 1.30, 20.0);
    assert_eq!(out.pixel(20, 20), [expected; 3]);
  }

  fn band_of(pixel: [u8; 3]) -> (f32, f32) {
    tone_params_milli(luminance_milli(pixel))
  }

  #[test]
  fn band_boundaries_are_exact() {
    for value in [63u8, 64, 65, 127, 128, 191, 192, 193] {
      assert_eq!(luminance_milli([value; 3]), value as u32 * 1000);
    }

    assert_eq!(band_of([63; 3]), (1.30, 20.0));
    assert_eq!(band_of([64; 3]), (1.20, 12.0));
    assert_eq!(band_of([65; 3]), (1.20, 12.0));
    assert_eq!(band_of([127; 3]), (1.20, 12.0));
    assert_eq!(band_of([128; 3]), (1.10, 5.0));
    assert_eq!(band_of([191; 3]), (1.10, 5.0));
    assert_eq!(band_of([192; 3]), (1.05, 0.0));
    assert_eq!(band_of([193; 3]), (1.05, 0.0));

    // 63.886，刚好低于 64
    assert_eq!(band_of([64, 64, 63]), (1.30, 20.0));
    assert_eq!(band_of([255; 3]), (1.05, 0.0));
  }

  #[test]
  fn darker_bands_get_stronger_correction() {
    let bands = [
      band_of([10; 3]),
      band_of([100; 3]),
      band_of([150; 3]),
      band_of([250; 3]),
    ];
    for pair in bands.windows(2) {
      assert!(pair[0].0 > pair[1].0);
      assert!(pair[0].1 > pair[1].1);
    }
  }

  #[test]
  fn sharpen_keeps_border_pixels() {
    let mut image = RgbImage::new(6, 5);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
      *pixel = Rgb([(x * 40) as u8, (y * 50) as u8, ((x + y) * 20) as u8]);
    }
    let out = sharpen(&image);

    for x in 0..6 {
      assert_eq!(out.get_pixel(x, 0), image.get_pixel(x, 0));
      assert_eq!(out.get_pixel(x, 4), image.get_pixel(x, 4));
    }
    for y in 0..5 {
      assert_eq!(out.get_pixel(0, y), image.get_pixel(0, y));
      assert_eq!(out.get_pixel(5, y), image.get_pixel(5, y));
    }
  }

  #[test]
  fn sharpen_reads_only_source_buffer() {
    // 中心亮点：邻居只应减去原值，而不是已锐化的值
    let mut image = RgbImage::from_pixel(5, 5, Rgb([100, 100, 100]));
    image.put_pixel(2, 2, Rgb([200, 200, 200]));
    let out = sharpen(&image);

    assert_eq!(out.get_pixel(2, 2).0, [250; 3]);
    assert_eq!(out.get_pixel(2, 1).0, [88; 3]);
    assert_eq!(out.get_pixel(1, 1).0, [100; 3]);
  }

  #[test]
  fn sharpening_leaves_enhanced_border_untouched() {
    let base = EnhanceConfig::default().with_canonical_size(32);
    let image = gradient(32, 32);
    let plain = enhance(&image, &base.clone().with_sharpen(false)).unwrap();
    let sharp = enhance(&image, &base.with_sharpen(true)).unwrap();

    let side = plain.width();
    for i in 0..side {
      assert_eq!(plain.pixel(i, 0), sharp.pixel(i, 0));
      assert_eq!(plain.pixel(i, side - 1), sharp.pixel(i, side - 1));
      assert_eq!(plain.pixel(0, i), sharp.pixel(0, i));
      assert_eq!(plain.pixel(side - 1, i), sharp.pixel(side - 1, i));
    }
  }
}
