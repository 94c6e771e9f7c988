// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/task.rs - 任务调度
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

use std::sync::mpsc::{self, Receiver};
use std::{thread, time::Duration};

use tracing::{info, warn};

use crate::{frame::Frame, output::Render, pipeline::CvPipeline};

pub trait Task<I, P, O>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: P, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<RE, I, P, O> Task<I, P, O> for OneShotTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  P: CvPipeline,
  O: Render<P::Target, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut pipeline: P, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始处理...");
    let result = pipeline.process(frame)?;
    info!(
      "处理完成，耗时: {:.3} ms",
      result.process_nanos as f64 / 1_000_000.0
    );
    output.render_result(&result)?;
    info!("渲染完成");

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 按 Ctrl-C 后通知任务循环退出，30 秒内未退出则强制结束进程
  fn interrupt_channel() -> anyhow::Result<Receiver<()>> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;
    Ok(rx)
  }

  /// 逐帧处理，直到输入耗尽、达到指定帧数或收到中断
  pub fn run_until<I, P, O>(
    &self,
    input: I,
    pipeline: &mut P,
    output: &O,
    interrupt: &Receiver<()>,
  ) -> anyhow::Result<usize>
  where
    I: Iterator<Item = Frame>,
    P: CvPipeline,
    O: Render<P::Target>,
    O::Error: std::error::Error + Sync + Send + 'static,
  {
    let mut frame_index = 0;
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);
      let result = pipeline.process(frame)?;
      output.render_result(&result)?;
      info!(
        "处理完成，耗时: {:.3} ms, {:.1} FPS",
        result.process_nanos as f64 / 1_000_000.0,
        result.fps
      );
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if interrupt.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }
    Ok(frame_index)
  }
}

impl<RE, I, P, O> Task<I, P, O> for ContinuousTask
where
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  P: CvPipeline,
  O: Render<P::Target, Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut pipeline: P, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let interrupt = Self::interrupt_channel()?;
    let frames = self.run_until(input, &mut pipeline, &output, &interrupt)?;
    info!("任务完成，共处理 {} 帧，退出", frames);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pipeline::tests::{FixedShapes, frame, shape};
  use crate::pipeline::{Pipeline2d, PipelineResult};
  use crate::settings::Pipeline2dSettings;
  use std::cell::RefCell;
  use std::convert::Infallible;

  #[derive(Default)]
  struct Collect {
    counts: RefCell<Vec<usize>>,
  }

  impl<T> Render<T> for &Collect {
    type Error = Infallible;

    fn render_result(&self, result: &PipelineResult<T>) -> Result<(), Self::Error> {
      self.counts.borrow_mut().push(result.targets.len());
      Ok(())
    }
  }

  fn pipeline() -> Pipeline2d {
    let finder = FixedShapes(vec![shape(1.0, 1.0)]);
    Pipeline2d::new(Pipeline2dSettings::default(), Box::new(finder))
  }

  #[test]
  fn test_one_shot_renders_once() {
    let sink = Collect::default();
    let frames = (0..3).map(|_| frame(8, 8));
    OneShotTask.run_task(frames, pipeline(), &sink).unwrap();
    assert_eq!(*sink.counts.borrow(), vec![1]);
  }

  #[test]
  fn test_one_shot_without_frames_fails() {
    let sink = Collect::default();
    assert!(
      OneShotTask
        .run_task(std::iter::empty::<Frame>(), pipeline(), &sink)
        .is_err()
    );
  }

  #[test]
  fn test_continuous_stops_at_frame_number() {
    let sink = Collect::default();
    let (_tx, rx) = mpsc::channel();
    let task = ContinuousTask::default().with_frame_number(Some(2));
    let frames = (0..5).map(|_| frame(8, 8));
    let processed = task.run_until(frames, &mut pipeline(), &&sink, &rx).unwrap();
    assert_eq!(processed, 2);
    assert_eq!(sink.counts.borrow().len(), 2);
  }

  #[test]
  fn test_continuous_stops_on_interrupt() {
    let sink = Collect::default();
    let (tx, rx) = mpsc::channel();
    tx.send(()).unwrap();
    let frames = (0..5).map(|_| frame(8, 8));
    let processed = ContinuousTask::default()
      .run_until(frames, &mut pipeline(), &&sink, &rx)
      .unwrap();
    assert_eq!(processed, 1);
  }
}
