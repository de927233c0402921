// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/fusion.rs - 检测与分类结果融合
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

//! # 结果融合
//!
//! 将多个来源（原图、增强图）的检测与分类结果合并为一个去重、重新排序的结果集。
//!
//! 两条路径共用同一个分组排序例程 [`rank_grouped`]：
//!
//! - 检测：按小写标签分组取**最大值**，先按阈值过滤，再乘以分级系数；
//! - 分类：按逗号前的主标签分组取**平均值**，先乘以分级系数，再按阈值过滤。
//!
//! 分级系数来自可替换的查找表 [`TierTable`]，所有置信度最终都被限制在 `[0, 1]`。
//! 排序按置信度降序，相同置信度保持首次出现的顺序。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{ClassificationItem, Detection};

pub const UNIDENTIFIED_LABEL: &str = "unidentified";
pub const DEFAULT_DETECTION_SCORE_THRESHOLD: f32 = 0.15;
pub const DEFAULT_CLASSIFICATION_SCORE_THRESHOLD: f32 = 0.04;

/// 组内置信度的聚合方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
  Max,
  Mean,
}

/// 阈值过滤发生在乘以分级系数之前还是之后
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdStage {
  BeforeBoost,
  AfterBoost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierMatch {
  /// 标签与关键词完全相同
  Exact,
  /// 标签中包含关键词这一整词（或连续的词序列）
  #[serde(alias = "contains")]
  Words,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
  pub name: String,
  pub multiplier: f32,
  pub keywords: Vec<String>,
}

impl Tier {
  pub fn new(name: &str, multiplier: f32, keywords: &[&str]) -> Self {
    Self {
      name: name.to_string(),
      multiplier,
      keywords: keywords.iter().map(|k| k.to_string()).collect(),
    }
  }
}

/// 未命中任何分级时，较长（更具体）的标签获得的小幅加成
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecificLabelBoost {
  pub longer_than: usize,
  pub multiplier: f32,
}

/// 标签 -> 置信度系数的查找表，按顺序匹配，第一个命中的分级生效
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
  pub matching: TierMatch,
  #[serde(default)]
  pub tiers: Vec<Tier>,
  #[serde(default)]
  pub specific_boost: Option<SpecificLabelBoost>,
}

impl TierTable {
  /// 所有标签系数均为 1
  pub fn identity() -> Self {
    Self {
      matching: TierMatch::Exact,
      tiers: Vec::new(),
      specific_boost: None,
    }
  }

  pub fn default_detection() -> Self {
    Self {
      matching: TierMatch::Exact,
      tiers: vec![
        Tier::new(
          "very_common",
          1.2,
          &["person", "car", "dog", "cat", "chair", "table", "dining table"],
        ),
        Tier::new(
          "common",
          1.1,
          &["phone", "cell phone", "laptop", "book", "bottle", "cup", "clock"],
        ),
      ],
      specific_boost: None,
    }
  }

  pub fn default_classification() -> Self {
    Self {
      matching: TierMatch::Words,
      tiers: vec![
        Tier::new(
          "animal",
          1.15,
          &[
            "dog", "cat", "bird", "fish", "horse", "cow", "sheep", "bear", "elephant", "zebra",
            "giraffe", "lion", "tiger", "monkey", "rabbit", "retriever", "terrier", "spaniel",
          ],
        ),
        Tier::new(
          "vehicle",
          1.1,
          &[
            "car", "truck", "bus", "bicycle", "motorcycle", "airplane", "airliner", "boat", "train",
            "van", "jeep", "taxi",
          ],
        ),
        Tier::new(
          "object",
          1.08,
          &[
            "phone", "laptop", "computer", "keyboard", "mouse", "bottle", "cup", "chair", "table",
            "book", "clock", "lamp", "monitor",
          ],
        ),
      ],
      specific_boost: Some(SpecificLabelBoost {
        longer_than: 4,
        multiplier: 1.05,
      }),
    }
  }

  /// `key` 必须是已归一化（小写）的标签
  pub fn multiplier(&self, key: &str) -> f32 {
    let hit = self.tiers.iter().find(|tier| {
      tier.keywords.iter().any(|keyword| match self.matching {
        TierMatch::Exact => key == keyword.as_str(),
        TierMatch::Words => contains_words(key, keyword),
      })
    });

    match (hit, self.specific_boost) {
      (Some(tier), _) => tier.multiplier,
      (None, Some(boost)) if key.chars().count() > boost.longer_than => boost.multiplier,
      _ => 1.0,
    }
  }
}

/// 按空白、`-`、`_` 切分为词
fn words(text: &str) -> Vec<&str> {
  text
    .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
    .filter(|word| !word.is_empty())
    .collect()
}

/// `keyword` 的词序列是否连续地出现在 `key` 中
fn contains_words(key: &str, keyword: &str) -> bool {
  let needle = words(keyword);
  if needle.is_empty() {
    return false;
  }
  words(key)
    .windows(needle.len())
    .any(|window| window == needle.as_slice())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
  pub detection_score_threshold: f32,
  pub classification_score_threshold: f32,
  pub detection_tiers: TierTable,
  pub classification_tiers: TierTable,
}

impl Default for FusionConfig {
  fn default() -> Self {
    Self {
      detection_score_threshold: DEFAULT_DETECTION_SCORE_THRESHOLD,
      classification_score_threshold: DEFAULT_CLASSIFICATION_SCORE_THRESHOLD,
      detection_tiers: TierTable::default_detection(),
      classification_tiers: TierTable::default_classification(),
    }
  }
}

impl FusionConfig {
  pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text)
  }

  pub fn with_detection_score_threshold(mut self, threshold: f32) -> Self {
    self.detection_score_threshold = threshold;
    self
  }

  pub fn with_classification_score_threshold(mut self, threshold: f32) -> Self {
    self.classification_score_threshold = threshold;
    self
  }

  pub fn with_detection_tiers(mut self, tiers: TierTable) -> Self {
    self.detection_tiers = tiers;
    self
  }

  pub fn with_classification_tiers(mut self, tiers: TierTable) -> Self {
    self.classification_tiers = tiers;
    self
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
  pub top_label: String,
  pub object_count: usize,
  pub max_confidence_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
  pub detections: Vec<Detection>,
  pub classifications: Vec<ClassificationItem>,
  pub summary: Summary,
}

impl FusedResult {
  /// 前 `n` 条结果，格式为 `label (xx.x%)`；没有分类结果时使用检测结果
  pub fn top_lines(&self, n: usize) -> Vec<String> {
    let line = |label: &str, confidence: f32| format!("{} ({:.1}%)", label, confidence * 100.0);

    if self.classifications.is_empty() {
      self
        .detections
        .iter()
        .take(n)
        .map(|d| line(&d.label, d.confidence))
        .collect()
    } else {
      self
        .classifications
        .iter()
        .take(n)
        .map(|c| line(&c.label, c.confidence))
        .collect()
    }
  }
}

/// 排序后的一组结果
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked {
  pub key: String,
  pub label: String,
  pub confidence: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RankSpec<'a> {
  pub aggregate: Aggregate,
  pub tiers: &'a TierTable,
  pub threshold: f32,
  pub threshold_stage: ThresholdStage,
}

struct Group {
  key: String,
  label: String,
  max: f32,
  sum: f32,
  count: usize,
}

/// 非有限值与非正值（含 `-0.0`）一律视为 `0.0`
fn clamp_unit(value: f32) -> f32 {
  if value.is_finite() && value > 0.0 {
    value.min(1.0)
  } else {
    0.0
  }
}

/// 通用的分组、聚合、加成、过滤、排序例程。
///
/// `items` 为 `(分组键, 显示标签, 置信度)`，显示标签取每组首次出现的那一条。
/// 阈值为闭区间：等于阈值的结果保留。分组键为空的条目直接丢弃。
pub fn rank_grouped<I>(items: I, spec: RankSpec<'_>) -> Vec<Ranked>
where
  I: IntoIterator<Item = (String, String, f32)>,
{
  let mut groups: Vec<Group> = Vec::new();
  let mut index: HashMap<String, usize> = HashMap::new();

  for (key, label, confidence) in items {
    if key.is_empty() {
      continue;
    }
    let confidence = clamp_unit(confidence);
    match index.get(&key) {
      Some(&i) => {
        let group = &mut groups[i];
        group.max = group.max.max(confidence);
        group.sum += confidence;
        group.count += 1;
      }
      None => {
        index.insert(key.clone(), groups.len());
        groups.push(Group {
          key,
          label,
          max: confidence,
          sum: confidence,
          count: 1,
        });
      }
    }
  }

  let mut ranked = groups
    .into_iter()
    .filter_map(|group| {
      let value = match spec.aggregate {
        Aggregate::Max => group.max,
        Aggregate::Mean => group.sum / group.count as f32,
      };

      if spec.threshold_stage == ThresholdStage::BeforeBoost && value < spec.threshold {
        return None;
      }
      let boosted = clamp_unit(value * spec.tiers.multiplier(&group.key));
      if spec.threshold_stage == ThresholdStage::AfterBoost && boosted < spec.threshold {
        return None;
      }

      Some(Ranked {
        key: group.key,
        label: group.label,
        confidence: boosted,
      })
    })
    .collect::<Vec<_>>();

  // 稳定排序，相同置信度保持首次出现顺序
  ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
  ranked
}

fn normalize_label(label: &str) -> String {
  label.trim().to_lowercase()
}

/// 主标签：第一个逗号之前的部分
fn primary_label(label: &str) -> &str {
  label.split(',').next().unwrap_or(label).trim()
}

pub fn fuse_detections(raw: &[Vec<Detection>], config: &FusionConfig) -> Vec<Detection> {
  let items = raw.iter().flatten().map(|d| {
    let key = normalize_label(&d.label);
    (key.clone(), key, d.confidence)
  });

  rank_grouped(
    items,
    RankSpec {
      aggregate: Aggregate::Max,
      tiers: &config.detection_tiers,
      threshold: config.detection_score_threshold,
      threshold_stage: ThresholdStage::BeforeBoost,
    },
  )
  .into_iter()
  .map(|r| Detection::new(r.label, r.confidence))
  .collect()
}

pub fn fuse_classifications(
  raw: &[Vec<ClassificationItem>],
  config: &FusionConfig,
) -> Vec<ClassificationItem> {
  let items = raw.iter().flatten().map(|c| {
    let primary = primary_label(&c.label);
    (normalize_label(primary), primary.to_string(), c.confidence)
  });

  rank_grouped(
    items,
    RankSpec {
      aggregate: Aggregate::Mean,
      tiers: &config.classification_tiers,
      threshold: config.classification_score_threshold,
      threshold_stage: ThresholdStage::AfterBoost,
    },
  )
  .into_iter()
  .map(|r| ClassificationItem::new(r.label, r.confidence))
  .collect()
}

/// 融合任意数量来源的检测与分类结果
pub fn fuse(
  raw_detections: &[Vec<Detection>],
  raw_classifications: &[Vec<ClassificationItem>],
  config: &FusionConfig,
) -> FusedResult {
  let detections = fuse_detections(raw_detections, config);
  let classifications = fuse_classifications(raw_classifications, config);

  let top_detection = detections.first();
  let top_classification = classifications.first();

  let top_label = top_classification
    .map(|c| c.label.clone())
    .or_else(|| top_detection.map(|d| d.label.clone()))
    .unwrap_or_else(|| UNIDENTIFIED_LABEL.to_string());

  let max_confidence = top_detection
    .map(|d| d.confidence)
    .unwrap_or(0.0)
    .max(top_classification.map(|c| c.confidence).unwrap_or(0.0));

  debug!(
    "融合完成: {} 个检测, {} 个分类, 最高置信度 {:.3}",
    detections.len(),
    classifications.len(),
    max_confidence
  );

  FusedResult {
    summary: Summary {
      top_label,
      object_count: detections.len(),
      max_confidence_percent: (max_confidence * 100.0).round() as u32,
    },
    detections,
    classifications,
  }
}
