// 该文件是 Ronghe （融合识别） 项目的一部分。
// src/task.rs - 分析任务
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

use std::{
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::Duration,
};
use tracing::{error, info, warn};

use crate::{frame::RasterImage, input::Frame, model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只分析第一帧，任何错误都直接返回
pub struct OneShotTask;

impl<
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  M: Model<Input = RasterImage, Output = D, Error = ME>,
  O: Render<Frame, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始分析...");
    let now = std::time::Instant::now();
    let result = model.infer(&frame.image)?;
    let elapsed = now.elapsed();
    info!("分析完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("输出完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 逐帧分析直到输入耗尽、达到指定帧数或收到中断信号。
/// 单帧分析失败只记录日志，不影响后续帧；输出失败则终止任务。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  interrupt: Option<Arc<AtomicBool>>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 使用外部提供的中断标志，而不是安装 Ctrl-C 处理器
  pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
    self.interrupt = Some(interrupt);
    self
  }

  fn install_ctrlc() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      handler_flag.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    Ok(flag)
  }
}

impl<
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  M: Model<Input = RasterImage, Output = D, Error = ME>,
  O: Render<Frame, D, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let interrupt = match self.interrupt {
      Some(flag) => flag,
      None => Self::install_ctrlc()?,
    };

    let mut analyzed = 0usize;
    let mut failed = 0usize;
    for frame in input {
      if interrupt.load(Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        break;
      }

      info!("处理第 {} 帧图像: {}", frame.index, frame.name);
      let now = std::time::Instant::now();
      match model.infer(&frame.image) {
        Ok(result) => {
          output.render_result(&frame, &result)?;
          analyzed += 1;
          info!("分析完成，耗时: {:.2?}", now.elapsed());
        }
        Err(e) => {
          failed += 1;
          error!("第 {} 帧 {} 分析失败: {}", frame.index, frame.name, e);
        }
      }

      if self.frame_number.map(|n| analyzed + failed >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", analyzed + failed);
        break;
      }
    }

    info!("任务完成，成功 {} 帧，失败 {} 帧", analyzed, failed);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  use crate::model::ModelError;

  /// 返回图像宽度，宽度为 0 时报错
  struct WidthModel;

  impl Model for WidthModel {
    type Input = RasterImage;
    type Output = u32;
    type Error = ModelError;

    fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
      if input.width() == 0 {
        return Err(ModelError::InvocationFailed("empty".to_string()));
      }
      Ok(input.width())
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: Mutex<Vec<(String, u32)>>,
  }

  impl Render<Frame, u32> for &Collect {
    type Error = std::io::Error;

    fn render_result(&self, frame: &Frame, result: &u32) -> Result<(), Self::Error> {
      self
        .seen
        .lock()
        .unwrap()
        .push((frame.name.clone(), *result));
      Ok(())
    }
  }

  fn frames(widths: &[u32]) -> Vec<Frame> {
    widths
      .iter()
      .enumerate()
      .map(|(i, &w)| Frame {
        image: RasterImage::from_pixel(w, 1, [0, 0, 0]),
        index: i as u64,
        name: format!("f{}", i),
      })
      .collect()
  }

  #[test]
  fn one_shot_uses_first_frame() {
    let collect = Collect::default();
    OneShotTask
      .run_task(frames(&[3, 5]).into_iter(), WidthModel, &collect)
      .unwrap();
    assert_eq!(*collect.seen.lock().unwrap(), vec![("f0".to_string(), 3)]);
  }

  #[test]
  fn one_shot_without_frames_fails() {
    let collect = Collect::default();
    assert!(
      OneShotTask
        .run_task(Vec::<Frame>::new().into_iter(), WidthModel, &collect)
        .is_err()
    );
  }

  #[test]
  fn continuous_skips_failed_frames_and_honours_limit() {
    let collect = Collect::default();
    ContinuousTask::default()
      .with_interrupt(Arc::new(AtomicBool::new(false)))
      .with_frame_number(Some(3))
      .run_task(frames(&[2, 0, 4, 6]).into_iter(), WidthModel, &collect)
      .unwrap();

    assert_eq!(
      *collect.seen.lock().unwrap(),
      vec![("f0".to_string(), 2), ("f2".to_string(), 4)]
    );
  }

  #[test]
  fn continuous_stops_when_interrupted() {
    let collect = Collect::default();
    ContinuousTask::default()
      .with_interrupt(Arc::new(AtomicBool::new(true)))
      .run_task(frames(&[2, 4]).into_iter(), WidthModel, &collect)
      .unwrap();

    assert!(collect.seen.lock().unwrap().is_empty());
  }
}
