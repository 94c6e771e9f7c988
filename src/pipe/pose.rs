// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/pipe/pose.rs - 三维位姿求解阶段
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

use crate::{
  frame::CameraStaticProperties,
  pipe::{Pipe, PipeResult},
  target::{Target2d, Target3d},
};

/// 外部视觉库提供的位姿求解能力，无解时返回 `None`
pub trait PoseSolver {
  fn solve(
    &mut self,
    target: &Target2d,
    camera: &CameraStaticProperties,
  ) -> Option<([f64; 3], [f64; 3])>;
}

/// 对每个二维目标求解位姿，求解失败的目标被丢弃；未配置求解器时输出为空
pub struct SolvePosePipe<'s> {
  solver: Option<&'s mut (dyn PoseSolver + Send)>,
  camera: &'s CameraStaticProperties,
}

impl<'s> SolvePosePipe<'s> {
  pub fn new(
    solver: Option<&'s mut (dyn PoseSolver + Send)>,
    camera: &'s CameraStaticProperties,
  ) -> Self {
    Self { solver, camera }
  }
}

impl<'s> Pipe<Vec<Target2d>> for SolvePosePipe<'s> {
  type Output = Vec<Target3d>;
  type Error = Infallible;

  fn run(&mut self, input: Vec<Target2d>) -> Result<PipeResult<Self::Output>, Self::Error> {
    let start = Instant::now();
    let Some(solver) = self.solver.as_deref_mut() else {
      return Ok(PipeResult::since(start, Vec::new()));
    };

    let targets = input
      .into_iter()
      .filter_map(|target| {
        solver
          .solve(&target, self.camera)
          .map(|(rotation, translation)| Target3d {
            target,
            rotation,
            translation,
          })
      })
      .collect();
    Ok(PipeResult::since(start, targets))
  }
}
