// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/pipe/collect_targets.rs - 由轮廓计算二维目标
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

use crate::{
  frame::CameraStaticProperties,
  pipe::{Pipe, PipeResult},
  target::{Calibration, RawShape, Target2d, calculate_pitch, calculate_yaw},
};

/// 按标定方式为每个轮廓计算参考点、俯仰角、偏航角与面积，保持输入顺序
pub struct Collect2dTargetsPipe {
  calibration: Calibration,
  camera: Arc<CameraStaticProperties>,
}

impl Collect2dTargetsPipe {
  pub fn new(calibration: Calibration, camera: Arc<CameraStaticProperties>) -> Self {
    Self {
      calibration,
      camera,
    }
  }

  fn collect(&self, shape: &RawShape) -> Target2d {
    let calibrated = self.calibration.reference_point(shape.center, &self.camera);
    Target2d {
      raw: *shape,
      calibrated,
      pitch: calculate_pitch(
        shape.center.y,
        calibrated.y,
        self.camera.vertical_focal_length,
      ),
      yaw: calculate_yaw(
        shape.center.x,
        calibrated.x,
        self.camera.horizontal_focal_length,
      ),
      area: shape.size.area(),
    }
  }
}

impl<'a> Pipe<&'a [RawShape]> for Collect2dTargetsPipe {
  type Output = Vec<Target2d>;
  type Error = Infallible;

  fn run(&mut self, input: &'a [RawShape]) -> Result<PipeResult<Self::Output>, Self::Error> {
    let start = Instant::now();
    let targets = input.iter().map(|shape| self.collect(shape)).collect();
    Ok(PipeResult::since(start, targets))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::target::{DualCalibration, Point2, Size2};

  fn camera() -> Arc<CameraStaticProperties> {
    Arc::new(CameraStaticProperties::with_focal_lengths(
      640, 480, 600.0, 550.0,
    ))
  }

  fn shape(x: f64, y: f64) -> RawShape {
    RawShape::new(
      Point2::new(x, y),
      Size2 {
        width: 10.0,
        height: 4.0,
      },
      0.0,
    )
  }

  #[test]
  fn test_collect_none_mode() {
    let shapes = [shape(319.5, 100.0), shape(500.0, 239.5)];
    let mut pipe = Collect2dTargetsPipe::new(Calibration::None, camera());
    let targets = pipe.run(&shapes[..]).unwrap().output;

    assert_eq!(targets.len(), 2);
    for target in &targets {
      assert_eq!(target.calibrated, Point2::new(319.5, 239.5));
      assert_eq!(target.area, 40.0);
    }
    // 顺序与输入一致
    assert_eq!(targets[0].raw, shapes[0]);
    assert!(targets[0].pitch > 0.0);
    assert_eq!(targets[0].yaw, 0.0);
    assert!(targets[1].yaw > 0.0);
    assert_eq!(targets[1].pitch, 0.0);
  }

  #[test]
  fn test_collect_single_mode_is_uniform() {
    let calibration = Calibration::Single {
      point: Point2::new(10.0, 20.0),
    };
    let shapes = [shape(0.0, 0.0), shape(300.0, 300.0)];
    let mut pipe = Collect2dTargetsPipe::new(calibration, camera());
    let targets = pipe.run(&shapes[..]).unwrap().output;
    assert!(targets.iter().all(|t| t.calibrated == Point2::new(10.0, 20.0)));
  }

  #[test]
  fn test_collect_dual_mode_matches_formula() {
    let (m, b) = (1.5, -20.0);
    let camera = camera();
    let mut pipe =
      Collect2dTargetsPipe::new(Calibration::Dual(DualCalibration { m, b }), camera.clone());
    let shapes = [shape(200.0, 150.0)];
    let target = &pipe.run(&shapes[..]).unwrap().output[0];

    let cal_x = (150.0 - b) / m;
    let cal_y = 200.0 * m + b;
    assert_eq!(target.calibrated, Point2::new(cal_x, cal_y));
    assert_eq!(
      target.pitch,
      -((150.0 - cal_y) / camera.vertical_focal_length).atan().to_degrees()
    );
    assert_eq!(
      target.yaw,
      ((200.0 - cal_x) / camera.horizontal_focal_length).atan().to_degrees()
    );
  }

  #[test]
  fn test_collect_never_fabricates() {
    let mut pipe = Collect2dTargetsPipe::new(Calibration::None, camera());
    assert!(pipe.run(&[] as &[RawShape]).unwrap().output.is_empty());

    let shapes: Vec<_> = (0..5).map(|i| shape(i as f64, i as f64)).collect();
    assert!(pipe.run(&shapes[..]).unwrap().output.len() <= shapes.len());
  }
}
