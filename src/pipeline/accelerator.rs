// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/pipeline/accelerator.rs - 神经网络加速器检测流水线
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

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, warn};

use crate::{
  bridge::Accelerator,
  frame::Frame,
  pipe::{
    AcceleratorDetectPipe, Annotator, CalculateFpsPipe, DecodeDetectionsPipe, DrawDetectionsPipe,
    Pipe, ResizeFramePipe, elapsed_nanos,
  },
  pipeline::{CvPipeline, PipelineError, PipelineResult, StageTimings, infallible},
  settings::{PipelineType, RknnSettings},
  target::{TargetCalculationParameters, TrackedTarget},
};

/// 加速器检测 → 解码 → 标注 → 降采样 → 帧率
///
/// 加速器不可用时每帧都返回空目标，流水线照常运行。
pub struct AcceleratorPipeline {
  settings: RknnSettings,
  detect: AcceleratorDetectPipe,
  draw: DrawDetectionsPipe,
  resize: ResizeFramePipe,
  fps: CalculateFpsPipe,
  timings: StageTimings,
}

impl AcceleratorPipeline {
  pub fn new(
    settings: RknnSettings,
    accelerator: Box<dyn Accelerator + Send>,
    annotator: Annotator,
  ) -> Self {
    let detect = AcceleratorDetectPipe::new(accelerator);
    if !detect.is_available() {
      warn!("加速器不可用，检测结果将始终为空");
    }
    let resize = ResizeFramePipe::new(settings.common.stream_divisor);
    Self {
      settings,
      detect,
      draw: DrawDetectionsPipe::new(annotator),
      resize,
      fps: CalculateFpsPipe::new(),
      timings: StageTimings::default(),
    }
  }

  pub fn settings(&self) -> &RknnSettings {
    &self.settings
  }

  pub fn timings(&self) -> &StageTimings {
    &self.timings
  }

  pub fn is_accelerator_available(&self) -> bool {
    self.detect.is_available()
  }
}

impl CvPipeline for AcceleratorPipeline {
  type Target = TrackedTarget;

  fn pipeline_type(&self) -> PipelineType {
    PipelineType::Rknn
  }

  fn process(&mut self, mut frame: Frame) -> Result<PipelineResult<Self::Target>, PipelineError> {
    if frame.is_empty() {
      debug!("输入帧为空，跳过处理");
      return Ok(PipelineResult::empty(frame));
    }
    let start = Instant::now();
    self.timings.reset();

    // 彩色视图保留一份未标注的副本
    let copy_start = Instant::now();
    frame.color.clone_from(&frame.processed);
    self.timings.record("copy_color", elapsed_nanos(copy_start));

    let detected = self.detect.run(&mut frame.processed)?;
    self.timings.record("detect", detected.nanos);

    // 标定参数取自本帧，不受之后的配置变化影响
    let params = Arc::new(TargetCalculationParameters {
      calibration: self.settings.common.calibration,
      camera: frame.properties.clone(),
    });
    let mut decode = DecodeDetectionsPipe::new(self.settings.confidence_threshold, params);
    let decoded = infallible(decode.run(detected.output));
    self.timings.record("decode", decoded.nanos);

    let processed = std::mem::replace(&mut frame.processed, RgbImage::new(0, 0));
    let drawn = infallible(self.draw.run((processed, &decoded.output[..])));
    frame.processed = drawn.output;
    self.timings.record("draw", drawn.nanos);

    let resized = infallible(self.resize.run(frame));
    self.timings.record("resize", resized.nanos);

    let fps = infallible(self.fps.run(Instant::now()));
    self.timings.record("fps", fps.nanos);
    self.timings.log(self.pipeline_type());

    Ok(PipelineResult {
      process_nanos: elapsed_nanos(start),
      fps: fps.output,
      targets: decoded.output,
      output_frame: resized.output,
    })
  }
}
