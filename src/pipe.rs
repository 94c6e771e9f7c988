// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/pipe.rs - 流水线处理阶段
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

use std::time::Instant;

/// 单一职责、带计时的处理阶段
///
/// 阶段需要的配置在构造时注入，一个实例只对应一份配置快照。
/// “没有检测到”以空输出表示，只有原生调用故障等真正的异常才返回错误。
pub trait Pipe<I> {
  type Output;
  type Error;

  fn run(&mut self, input: I) -> Result<PipeResult<Self::Output>, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipeResult<T> {
  pub output: T,
  pub nanos: u64,
}

impl<T> PipeResult<T> {
  /// 以 `start` 为起点计时
  pub fn since(start: Instant, output: T) -> Self {
    Self {
      output,
      nanos: elapsed_nanos(start),
    }
  }
}

pub fn elapsed_nanos(start: Instant) -> u64 {
  start.elapsed().as_nanos() as u64
}

mod collect_targets;
mod detect;
mod draw;
mod fps;
mod pose;
mod resize;

pub use self::collect_targets::Collect2dTargetsPipe;
pub use self::detect::{AcceleratorDetectPipe, DecodeDetectionsPipe};
pub use self::draw::{Annotator, DrawDetectionsPipe};
pub use self::fps::{CalculateFpsPipe, FpsCounter};
pub use self::pose::{PoseSolver, SolvePosePipe};
pub use self::resize::ResizeFramePipe;
