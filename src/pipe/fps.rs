// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/pipe/fps.rs - 帧率计算
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

use std::convert::Infallible;
use std::time::Instant;

use crate::pipe::{Pipe, PipeResult};

/// 记录上一次调用的时间，帧率为相邻两次调用间隔的倒数
#[derive(Debug, Clone, Default)]
pub struct FpsCounter {
  last: Option<Instant>,
}

impl FpsCounter {
  /// 第一次调用还没有间隔，返回 0
  pub fn tick(&mut self, now: Instant) -> f64 {
    let fps = match self.last {
      Some(last) => {
        let delta = now.saturating_duration_since(last).as_secs_f64();
        if delta > 0.0 { 1.0 / delta } else { 0.0 }
      }
      None => 0.0,
    };
    self.last = Some(now);
    fps
  }
}

/// 跨帧保持状态，生命周期与所属流水线相同
#[derive(Debug, Default)]
pub struct CalculateFpsPipe {
  counter: FpsCounter,
}

impl CalculateFpsPipe {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Pipe<Instant> for CalculateFpsPipe {
  type Output = f64;
  type Error = Infallible;

  fn run(&mut self, now: Instant) -> Result<PipeResult<Self::Output>, Self::Error> {
    let start = Instant::now();
    let fps = self.counter.tick(now);
    Ok(PipeResult::since(start, fps))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn test_first_tick_is_zero() {
    let mut counter = FpsCounter::default();
    assert_eq!(counter.tick(Instant::now()), 0.0);
  }

  #[test]
  fn test_second_tick_is_reciprocal() {
    let mut counter = FpsCounter::default();
    let t0 = Instant::now();
    counter.tick(t0);
    let fps = counter.tick(t0 + Duration::from_millis(40));
    assert!((fps - 25.0).abs() < 1e-9);

    let fps = counter.tick(t0 + Duration::from_millis(50));
    assert!((fps - 100.0).abs() < 1e-9);
  }

  #[test]
  fn test_zero_delta_guard() {
    let mut counter = FpsCounter::default();
    let t0 = Instant::now();
    counter.tick(t0);
    assert_eq!(counter.tick(t0), 0.0);
  }

  #[test]
  fn test_pipe_keeps_state_across_runs() {
    let mut pipe = CalculateFpsPipe::new();
    let t0 = Instant::now();
    assert_eq!(pipe.run(t0).unwrap().output, 0.0);
    let fps = pipe.run(t0 + Duration::from_millis(100)).unwrap().output;
    assert!((fps - 10.0).abs() < 1e-9);
  }
}
