// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/output/draw.rs - 融合结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

use crate::{
  frame::{RasterImage, ToRgbImage},
  fusion::FusedResult,
};

const BAR_HEIGHT: u32 = 12;
const BAR_GAP: u32 = 4;
const MAX_BARS: usize = 5;
const STRIP_BACKGROUND: [u8; 3] = [32, 32, 32];

/// 在增强图像下方追加置信度条带：分类结果在前，检测结果在后，
/// 每条的长度与置信度成正比
pub struct ConfidenceStrip {
  bar_height: u32,
  bar_gap: u32,
  max_bars: usize,
  colors: Vec<Rgb<u8>>,
}

impl Default for ConfidenceStrip {
  fn default() -> Self {
    let colors = (0..MAX_BARS * 2)
      .map(|i| {
        let hue = (i as f32 / (MAX_BARS * 2) as f32) * 360.0;
        hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();

    Self {
      bar_height: BAR_HEIGHT,
      bar_gap: BAR_GAP,
      max_bars: MAX_BARS,
      colors,
    }
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

impl ConfidenceStrip {
  fn confidences(&self, result: &FusedResult) -> Vec<f32> {
    result
      .classifications
      .iter()
      .map(|c| c.confidence)
      .take(self.max_bars)
      .chain(
        result
          .detections
          .iter()
          .map(|d| d.confidence)
          .take(self.max_bars),
      )
      .collect()
  }

  pub fn strip_height(&self, bars: usize) -> u32 {
    bars as u32 * (self.bar_height + self.bar_gap) + self.bar_gap
  }

  pub fn draw(&self, enhanced: &RasterImage, result: &FusedResult) -> RgbImage {
    let confidences = self.confidences(result);
    let (width, height) = (enhanced.width(), enhanced.height());
    let strip = self.strip_height(confidences.len());

    let mut canvas = RgbImage::from_pixel(width, height + strip, Rgb(STRIP_BACKGROUND));
    image::imageops::replace(&mut canvas, &enhanced.to_rgb_image(), 0, 0);

    for (i, confidence) in confidences.iter().enumerate() {
      let bar_width = (confidence * width as f32).round() as u32;
      if bar_width == 0 {
        continue;
      }
      let y = height + self.bar_gap + i as u32 * (self.bar_height + self.bar_gap);
      let rect = Rect::at(0, y as i32).of_size(bar_width, self.bar_height);
      draw_filled_rect_mut(&mut canvas, rect, self.colors[i % self.colors.len()]);
    }

    canvas
  }
}
