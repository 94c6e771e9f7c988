// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/pipeline/pipeline2d.rs - 二维几何流水线
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

use tracing::debug;

use crate::{
  frame::Frame,
  pipe::{CalculateFpsPipe, Collect2dTargetsPipe, Pipe, ResizeFramePipe, elapsed_nanos},
  pipeline::{CvPipeline, PipelineError, PipelineResult, ShapeFinder, StageTimings, infallible},
  settings::{Pipeline2dSettings, PipelineType},
  target::Target2d,
};

/// 轮廓查找 → 二维目标计算 → 降采样 → 帧率
pub struct Pipeline2d {
  settings: Pipeline2dSettings,
  finder: Box<dyn ShapeFinder + Send>,
  resize: ResizeFramePipe,
  fps: CalculateFpsPipe,
  timings: StageTimings,
}

impl Pipeline2d {
  pub fn new(settings: Pipeline2dSettings, finder: Box<dyn ShapeFinder + Send>) -> Self {
    let resize = ResizeFramePipe::new(settings.common.stream_divisor);
    Self {
      settings,
      finder,
      resize,
      fps: CalculateFpsPipe::new(),
      timings: StageTimings::default(),
    }
  }

  pub fn settings(&self) -> &Pipeline2dSettings {
    &self.settings
  }

  pub fn timings(&self) -> &StageTimings {
    &self.timings
  }
}

impl CvPipeline for Pipeline2d {
  type Target = Target2d;

  fn pipeline_type(&self) -> PipelineType {
    PipelineType::Geometric2d
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

    let resized = infallible(self.resize.run(frame));
    self.timings.record("resize", resized.nanos);

    let fps = infallible(self.fps.run(Instant::now()));
    self.timings.record("fps", fps.nanos);
    self.timings.log(self.pipeline_type());

    Ok(PipelineResult {
      process_nanos: elapsed_nanos(start),
      fps: fps.output,
      targets: collected.output,
      output_frame: resized.output,
    })
  }
}
