// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/pipe/detect.rs - 加速器检测与结果解码
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
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tracing::debug;

use crate::{
  bridge::{Accelerator, BridgeError, DetectionResultGroup},
  pipe::{Pipe, PipeResult},
  target::{Rect2d, TargetCalculationParameters, TrackedTarget},
};

/// 将帧交给加速器，阻塞直到推理完成
pub struct AcceleratorDetectPipe {
  accelerator: Box<dyn Accelerator + Send>,
}

impl AcceleratorDetectPipe {
  pub fn new(accelerator: Box<dyn Accelerator + Send>) -> Self {
    Self { accelerator }
  }

  pub fn is_available(&self) -> bool {
    self.accelerator.is_available()
  }
}

impl<'a> Pipe<&'a mut RgbImage> for AcceleratorDetectPipe {
  type Output = Option<DetectionResultGroup>;
  type Error = BridgeError;

  fn run(&mut self, frame: &'a mut RgbImage) -> Result<PipeResult<Self::Output>, Self::Error> {
    let start = Instant::now();
    let group = self.accelerator.detect(frame)?;
    if let Some(group) = &group {
      debug!("检测组 {}: {} 个结果", group.id, group.count());
    }
    Ok(PipeResult::since(start, group))
  }
}

/// 将检测结果转为目标，丢弃置信度低于阈值的结果
pub struct DecodeDetectionsPipe {
  confidence_threshold: f32,
  params: Arc<TargetCalculationParameters>,
}

impl DecodeDetectionsPipe {
  pub fn new(confidence_threshold: f32, params: Arc<TargetCalculationParameters>) -> Self {
    Self {
      confidence_threshold,
      params,
    }
  }
}

impl Pipe<Option<DetectionResultGroup>> for DecodeDetectionsPipe {
  type Output = Vec<TrackedTarget>;
  type Error = Infallible;

  fn run(
    &mut self,
    group: Option<DetectionResultGroup>,
  ) -> Result<PipeResult<Self::Output>, Self::Error> {
    let start = Instant::now();
    let targets = group
      .map(|group| group.results)
      .unwrap_or_default()
      .into_iter()
      .filter(|detection| detection.confidence >= self.confidence_threshold)
      .map(|detection| {
        let b = detection.bbox;
        TrackedTarget {
          bbox: Rect2d::from_corners(b.left as f64, b.top as f64, b.right as f64, b.bottom as f64),
          confidence: detection.confidence,
          class_id: detection.class_id,
          params: self.params.clone(),
        }
      })
      .collect();
    Ok(PipeResult::since(start, targets))
  }
}
