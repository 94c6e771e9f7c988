// 该文件是 Huiyan （慧眼） 项目的一部分。
// tests/pipeline.rs - 流水线集成测试
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

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use image::RgbImage;

use huiyan::{
  bridge::{BridgeLoader, BridgeState, LibraryLocations},
  frame::{CameraStaticProperties, Frame},
  pipeline::{CvPipeline, ShapeFinder, VisionPipeline},
  settings::{ModelStore, PipelineSettings},
  target::{Point2, RawShape, Size2, Target},
};

fn scratch_locations(tag: &str) -> LibraryLocations {
  let root = std::env::temp_dir().join(format!("huiyan-it-{}-{}", tag, std::process::id()));
  let temp_dir = root.join("tmp");
  let system_dir = root.join("sys");
  std::fs::create_dir_all(&temp_dir).unwrap();
  std::fs::create_dir_all(&system_dir).unwrap();
  LibraryLocations {
    resource_root: root.join("resources"),
    temp_dir,
    system_dir: Some(system_dir),
    arch: Some("testarch".to_string()),
  }
}

fn frame(width: u32, height: u32) -> Frame {
  let props = Arc::new(CameraStaticProperties::with_focal_lengths(
    width, height, 500.0, 500.0,
  ));
  Frame::new(RgbImage::new(width, height), props)
}

struct OneShape(RawShape);

impl ShapeFinder for OneShape {
  fn find_shapes(&mut self, _frame: &Frame) -> Vec<RawShape> {
    vec![self.0]
  }
}

#[test]
fn geometric_pipeline_with_dual_calibration() {
  let json = r#"{
    "pipeline_type": "geometric2d",
    "calibration": {"mode": "dual", "m": 2.0, "b": 4.0},
    "stream_divisor": "HALF"
  }"#;
  let settings = PipelineSettings::from_json_str(json).unwrap();
  let loader = BridgeLoader::new(scratch_locations("dual"));
  let models = ModelStore::new(PathBuf::from("/nonexistent"));
  let shape = RawShape::new(
    Point2::new(100.0, 60.0),
    Size2 {
      width: 6.0,
      height: 5.0,
    },
    0.0,
  );
  let finder: Box<dyn ShapeFinder + Send> = Box::new(OneShape(shape));
  let mut pipeline =
    VisionPipeline::from_settings(settings, &loader, &models, Some(finder), None).unwrap();

  let result = pipeline.process(frame(320, 240)).unwrap();
  assert_eq!(result.output_frame.processed.dimensions(), (160, 120));
  assert_eq!(result.targets.len(), 1);
  let Target::Flat(target) = &result.targets[0] else {
    panic!("应为二维目标");
  };
  // X 取决于 Y，Y 取决于 X
  assert_eq!(target.calibrated, Point2::new((60.0 - 4.0) / 2.0, 100.0 * 2.0 + 4.0));
  assert_eq!(target.area, 30.0);
  assert_eq!(loader.state(), BridgeState::Unloaded);
}

#[test]
fn accelerator_pipelines_share_one_load_attempt() {
  let loader = Arc::new(BridgeLoader::new(scratch_locations("shared")));
  let models = ModelStore::new(PathBuf::from("/nonexistent"));

  let handles: Vec<_> = (0..4)
    .map(|_| {
      let loader = loader.clone();
      let models = models.clone();
      thread::spawn(move || {
        let settings =
          PipelineSettings::from_json_str(r#"{"pipeline_type":"rknn","stream_divisor":"SIXTH"}"#)
            .unwrap();
        let mut pipeline =
          VisionPipeline::from_settings(settings, &loader, &models, None, None).unwrap();
        let mut sizes = Vec::new();
        for _ in 0..2 {
          let result = pipeline.process(frame(120, 60)).unwrap();
          assert!(result.targets.is_empty());
          sizes.push(result.output_frame.color.dimensions());
        }
        sizes
      })
    })
    .collect();

  for handle in handles {
    assert_eq!(handle.join().unwrap(), vec![(20, 10), (20, 10)]);
  }
  assert_eq!(loader.load_attempts(), 1);
  assert_eq!(loader.state(), BridgeState::LoadFailed);
}

#[test]
fn empty_frame_short_circuits() {
  let loader = BridgeLoader::new(scratch_locations("empty"));
  let models = ModelStore::new(PathBuf::from("/nonexistent"));
  let settings = PipelineSettings::from_json_str(r#"{"pipeline_type":"rknn"}"#).unwrap();
  let mut pipeline = VisionPipeline::from_settings(settings, &loader, &models, None, None).unwrap();

  let props = Arc::new(CameraStaticProperties::from_fov(640, 480, 70.0));
  for _ in 0..2 {
    let result = pipeline.process(Frame::empty(props.clone())).unwrap();
    assert_eq!(result.process_nanos, 0);
    assert_eq!(result.fps, 0.0);
    assert!(result.targets.is_empty());
    assert!(result.output_frame.is_empty());
  }
}
