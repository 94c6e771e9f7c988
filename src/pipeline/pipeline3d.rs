// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/pipeline/pipeline3d.rs - 三维位姿流水线
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

use tracing::{debug, warn};

use crate::{
  frame::Frame,
  pipe::{
    CalculateFpsPipe, Collect2dTargetsPipe, Pipe, PoseSolver, ResizeFramePipe, SolvePosePipe,
    elapsed_nanos,
  },
  pipeline::{CvPipeline, PipelineError, PipelineResult, ShapeFinder, StageTimings, infallible},
  settings::{Pipeline3dSettings, PipelineType},
  target::Target3d,
};

/// 轮廓查找 → 二维目标计算 → 位姿求解 → 降采样 → 帧率
///
/// 没有求解器时仍返回结构完整的空结果。
pub struct Pipeline3d {
  settings: Pipeline3dSettings,
  finder: Box<dyn ShapeFinder + Send>,
  solver: Option<Box<dyn PoseSolver + Send>>,
  resize: ResizeFramePipe,
  fps: CalculateFpsPipe,
  timings: StageTimings,
}

impl Pipeline3d {
  pub fn new(
    settings: Pipeline3dSettings,
    finder: Box<dyn ShapeFinder + Send>,
    solver: Option<Box<dyn PoseSolver + Send>>,
  ) -> Self {
    if solver.is_none() {
      warn!("未配置位姿求解器，三维流水线将只输出空结果");
    }
    let resize = ResizeFramePipe::new(settings.common.stream_divisor);
    Self {
      settings,
      finder,
      solver,
      resize,
      fps: CalculateFpsPipe::new(),
      timings: StageTimings::default(),
    }
  }

  pub fn settings(&self) -> &Pipeline3dSettings {
    &self.settings
  }

  pub fn timings(&self) -> &StageTimings {
    &self.timings
  }
}

impl CvPipeline for Pipeline3d {
  type Target = Target3d;

  fn pipeline_type(&self) -> PipelineType {
    PipelineType::Pose3d
  }

  fn process(&mut self, frame: Frame) -> Result<PipelineResult<Self::Target>, PipelineError> {
    if frame.is_empty() {
      debug!("输入帧为空，跳过处理");
      return Ok(PipelineResult::empty(frame));
    }
    let start = Instant::now();
    self.timings.reset();

    let find_start = Instant::now();
    let shapes = self.finder.find_shapes(&frame);
    self.timings.record("find_shapes", elapsed_nanos(find_start));

    let mut collect =
      Collect2dTargetsPipe::new(self.settings.common.calibration, frame.properties.clone());
    let collected = infallible(collect.run(&shapes[..]));
    self.timings.record("collect_2d_targets", collected.nanos);

    let solved = {
      let solver = self
        .solver
        .as_mut()
        .map(|solver| &mut **solver as &mut (dyn PoseSolver + Send));
      let mut solve = SolvePosePipe::new(solver, &frame.properties);
      infallible(solve.run(collected.output))
    };
    self.timings.record("solve_pose", solved.nanos);

    let resized = infallible(self.resize.run(frame));
    self.timings.record("resize", resized.nanos);

    let fps = infallible(self.fps.run(Instant::now()));
    self.timings.record("fps", fps.nanos);
    self.timings.log(self.pipeline_type());

    Ok(PipelineResult {
      process_nanos: elapsed_nanos(start),
      fps: fps.output,
      targets: solved.output,
      output_frame: resized.output,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::{CameraStaticProperties, FrameDivisor};
  use image::RgbImage;
  use std::sync::Arc;
  use crate::pipeline::tests::{FixedShapes, frame, shape};
  use crate::target::Target2d;

  /// 把轮廓中心当作平移量
  struct EchoSolver;

  impl PoseSolver for EchoSolver {
    fn solve(
      &mut self,
      target: &Target2d,
      _camera: &CameraStaticProperties,
    ) -> Option<([f64; 3], [f64; 3])> {
      Some((
        [0.0, 0.0, 0.0],
        [target.raw.center.x, target.raw.center.y, 1.0],
      ))
    }
  }

  fn finder() -> Box<dyn ShapeFinder + Send> {
    Box::new(FixedShapes(vec![shape(4.0, 6.0), shape(8.0, 2.0)]))
  }

  #[test]
  fn test_without_solver_returns_well_formed_result() {
    let mut pipeline = Pipeline3d::new(Pipeline3dSettings::default(), finder(), None);
    let result = pipeline.process(frame(32, 32)).unwrap();
    assert!(result.targets.is_empty());
    assert_eq!(result.output_frame.width(), 32);
  }

  #[test]
  fn test_with_solver() {
    let mut pipeline =
      Pipeline3d::new(Pipeline3dSettings::default(), finder(), Some(Box::new(EchoSolver)));
    let result = pipeline.process(frame(32, 32)).unwrap();
    assert_eq!(result.targets.len(), 2);
    assert_eq!(result.targets[0].translation, [4.0, 6.0, 1.0]);
    assert_eq!(result.targets[1].target.raw.center.x, 8.0);
  }

  #[test]
  fn test_blank_processed_view_skips_solver() {
    let mut pipeline =
      Pipeline3d::new(Pipeline3dSettings::default(), finder(), Some(Box::new(EchoSolver)));
    assert_eq!(pipeline.settings().common.stream_divisor, FrameDivisor::None);
    let props = Arc::new(CameraStaticProperties::from_fov(32, 32, 70.0));
    let frame = Frame::with_views(RgbImage::new(32, 32), RgbImage::new(32, 0), props);
    let result = pipeline.process(frame).unwrap();
    assert!(result.targets.is_empty());
    assert_eq!(result.output_frame.color.dimensions(), (32, 32));
  }
}
