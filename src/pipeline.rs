// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/pipeline.rs - 流水线编排
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

use ab_glyph::InvalidFont;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  bridge::{BridgeError, BridgeLoader, NativeAccelerator},
  frame::Frame,
  pipe::{Annotator, PoseSolver},
  settings::{ModelStore, PipelineSettings, PipelineType},
  target::{RawShape, Target},
};

mod accelerator;
mod pipeline2d;
mod pipeline3d;

pub use self::accelerator::AcceleratorPipeline;
pub use self::pipeline2d::Pipeline2d;
pub use self::pipeline3d::Pipeline3d;

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("加速器错误: {0}")]
  Bridge(#[from] BridgeError),
  #[error("{0:?} 流水线需要外部轮廓查找器")]
  MissingShapeFinder(PipelineType),
  #[error("字体加载错误: {0}")]
  Font(#[from] InvalidFont),
}

/// 一次流水线运行的结果，帧的所有权随结果交给使用方
#[derive(Debug, Clone)]
pub struct PipelineResult<T> {
  pub process_nanos: u64,
  pub fps: f64,
  pub targets: Vec<T>,
  pub output_frame: Frame,
}

impl<T> PipelineResult<T> {
  /// 空帧直接返回，不经过任何阶段
  pub fn empty(frame: Frame) -> Self {
    Self {
      process_nanos: 0,
      fps: 0.0,
      targets: Vec::new(),
      output_frame: frame,
    }
  }

  pub fn map_targets<U>(self, f: impl FnMut(T) -> U) -> PipelineResult<U> {
    PipelineResult {
      process_nanos: self.process_nanos,
      fps: self.fps,
      targets: self.targets.into_iter().map(f).collect(),
      output_frame: self.output_frame,
    }
  }
}

/// 外部视觉库提供的轮廓查找能力
pub trait ShapeFinder {
  fn find_shapes(&mut self, frame: &Frame) -> Vec<RawShape>;
}

impl<F: ShapeFinder + ?Sized> ShapeFinder for Box<F> {
  fn find_shapes(&mut self, frame: &Frame) -> Vec<RawShape> {
    (**self).find_shapes(frame)
  }
}

/// 各类流水线共同的运行接口，实例在多帧之间复用
pub trait CvPipeline {
  type Target;

  fn pipeline_type(&self) -> PipelineType;

  fn process(&mut self, frame: Frame) -> Result<PipelineResult<Self::Target>, PipelineError>;
}

/// 单次运行内各阶段的耗时，每次运行开始时清空
#[derive(Debug, Default, Clone)]
pub struct StageTimings {
  stages: Vec<(&'static str, u64)>,
}

impl StageTimings {
  pub fn reset(&mut self) {
    self.stages.clear();
  }

  pub fn record(&mut self, stage: &'static str, nanos: u64) {
    self.stages.push((stage, nanos));
  }

  pub fn stages(&self) -> &[(&'static str, u64)] {
    &self.stages
  }

  pub fn total(&self) -> u64 {
    self.stages.iter().map(|(_, nanos)| nanos).sum()
  }

  pub fn log(&self, pipeline: PipelineType) {
    for (stage, nanos) in &self.stages {
      debug!(
        "{:?} 阶段 {}: {:.3} ms",
        pipeline,
        stage,
        *nanos as f64 / 1_000_000.0
      );
    }
  }
}

pub(crate) fn infallible<T>(result: Result<T, Infallible>) -> T {
  match result {
    Ok(value) => value,
    Err(never) => match never {},
  }
}

/// 所有流水线变体的封闭集合
pub enum VisionPipeline {
  Geometric2d(Pipeline2d),
  Pose3d(Pipeline3d),
  Rknn(AcceleratorPipeline),
}

impl VisionPipeline {
  /// 按配置构建流水线；加速器变体会触发一次性的原生库加载，加载失败时退化为空检测
  pub fn from_settings(
    settings: PipelineSettings,
    loader: &BridgeLoader,
    models: &ModelStore,
    finder: Option<Box<dyn ShapeFinder + Send>>,
    solver: Option<Box<dyn PoseSolver + Send>>,
  ) -> Result<Self, PipelineError> {
    let pipeline_type = settings.pipeline_type();
    info!("创建 {:?} 流水线", pipeline_type);
    let pipeline = match settings {
      PipelineSettings::Geometric2d(settings) => {
        let finder = finder.ok_or(PipelineError::MissingShapeFinder(pipeline_type))?;
        VisionPipeline::Geometric2d(Pipeline2d::new(settings, finder))
      }
      PipelineSettings::Pose3d(settings) => {
        let finder = finder.ok_or(PipelineError::MissingShapeFinder(pipeline_type))?;
        VisionPipeline::Pose3d(Pipeline3d::new(settings, finder, solver))
      }
      PipelineSettings::Rknn(settings) => {
        let model_path = models.resolve(&settings.model_name);
        let accelerator = NativeAccelerator::new(loader, &model_path);
        VisionPipeline::Rknn(AcceleratorPipeline::new(
          settings,
          Box::new(accelerator),
          Annotator::new()?,
        ))
      }
    };
    Ok(pipeline)
  }
}

impl CvPipeline for VisionPipeline {
  type Target = Target;

  fn pipeline_type(&self) -> PipelineType {
    match self {
      VisionPipeline::Geometric2d(p) => p.pipeline_type(),
      VisionPipeline::Pose3d(p) => p.pipeline_type(),
      VisionPipeline::Rknn(p) => p.pipeline_type(),
    }
  }

  fn process(&mut self, frame: Frame) -> Result<PipelineResult<Self::Target>, PipelineError> {
    Ok(match self {
      VisionPipeline::Geometric2d(p) => p.process(frame)?.map_targets(Target::from),
      VisionPipeline::Pose3d(p) => p.process(frame)?.map_targets(Target::from),
      VisionPipeline::Rknn(p) => p.process(frame)?.map_targets(Target::from),
    })
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::bridge::{LibraryLocations, loader_test_locations};
  use crate::frame::CameraStaticProperties;
  use crate::settings::{Pipeline2dSettings, RknnSettings};
  use crate::target::{Point2, Size2};
  use image::RgbImage;
  use std::sync::Arc;

  /// 每帧返回固定的若干个轮廓
  pub(crate) struct FixedShapes(pub Vec<RawShape>);

  impl ShapeFinder for FixedShapes {
    fn find_shapes(&mut self, _frame: &Frame) -> Vec<RawShape> {
      self.0.clone()
    }
  }

  pub(crate) fn shape(x: f64, y: f64) -> RawShape {
    RawShape::new(
      Point2::new(x, y),
      Size2 {
        width: 8.0,
        height: 8.0,
      },
      0.0,
    )
  }

  pub(crate) fn frame(width: u32, height: u32) -> Frame {
    let props = Arc::new(CameraStaticProperties::from_fov(width, height, 70.0));
    Frame::new(RgbImage::new(width, height), props)
  }

  fn isolated_loader(name: &str) -> BridgeLoader {
    let locations: LibraryLocations = loader_test_locations(name);
    BridgeLoader::new(locations)
  }

  #[test]
  fn test_result_map_targets_keeps_metadata() {
    let result = PipelineResult {
      process_nanos: 7,
      fps: 30.0,
      targets: vec![1, 2, 3],
      output_frame: frame(4, 4),
    };
    let mapped = result.map_targets(|t| t * 10);
    assert_eq!(mapped.targets, vec![10, 20, 30]);
    assert_eq!(mapped.process_nanos, 7);
    assert_eq!(mapped.fps, 30.0);
  }

  #[test]
  fn test_geometric_requires_finder() {
    let loader = isolated_loader("pipeline-finder");
    let models = ModelStore::new("/nonexistent");
    let settings = PipelineSettings::Geometric2d(Pipeline2dSettings::default());
    assert!(matches!(
      VisionPipeline::from_settings(settings, &loader, &models, None, None),
      Err(PipelineError::MissingShapeFinder(PipelineType::Geometric2d))
    ));
  }

  #[test]
  fn test_enum_dispatch_geometric() {
    let loader = isolated_loader("pipeline-dispatch");
    let models = ModelStore::new("/nonexistent");
    let settings = PipelineSettings::Geometric2d(Pipeline2dSettings::default());
    let finder: Box<dyn ShapeFinder + Send> =
      Box::new(FixedShapes(vec![shape(1.0, 1.0), shape(2.0, 2.0)]));
    let mut pipeline =
      VisionPipeline::from_settings(settings, &loader, &models, Some(finder), None).unwrap();

    assert_eq!(pipeline.pipeline_type(), PipelineType::Geometric2d);
    let result = pipeline.process(frame(32, 24)).unwrap();
    assert_eq!(result.targets.len(), 2);
    assert!(matches!(result.targets[0], Target::Flat(_)));
    // 原生库从未被触碰
    assert_eq!(loader.load_attempts(), 0);
  }

  #[test]
  fn test_rknn_without_library_degrades_to_empty() {
    let loader = isolated_loader("pipeline-rknn");
    let models = ModelStore::new("/nonexistent");
    let settings = PipelineSettings::Rknn(RknnSettings::default());
    let mut pipeline =
      VisionPipeline::from_settings(settings, &loader, &models, None, None).unwrap();

    for _ in 0..3 {
      let result = pipeline.process(frame(32, 24)).unwrap();
      assert!(result.targets.is_empty());
      assert_eq!(result.output_frame.width(), 32);
    }
    assert_eq!(loader.load_attempts(), 1);
  }
}
