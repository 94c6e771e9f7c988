// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/target.rs - 目标与标定定义
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

use serde::{Deserialize, Serialize};

use crate::frame::CameraStaticProperties;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
  pub x: f64,
  pub y: f64,
}

impl Point2 {
  pub fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size2 {
  pub width: f64,
  pub height: f64,
}

impl Size2 {
  pub fn area(&self) -> f64 {
    self.width * self.height
  }
}

/// 外部轮廓查找得到的旋转矩形
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawShape {
  pub center: Point2,
  pub size: Size2,
  /// 旋转角（度）
  pub angle: f64,
}

impl RawShape {
  pub fn new(center: Point2, size: Size2, angle: f64) -> Self {
    Self {
      center,
      size,
      angle,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationMode {
  None,
  Single,
  Dual,
}

/// 双点标定直线 `y = m·x + b`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DualCalibration {
  pub m: f64,
  pub b: f64,
}

impl DualCalibration {
  /// 两个标定样本确定的直线；两点横坐标相同时返回 None
  pub fn from_points(first: Point2, second: Point2) -> Option<Self> {
    let dx = second.x - first.x;
    if dx == 0.0 {
      return None;
    }
    let m = (second.y - first.y) / dx;
    let b = first.y - m * first.x;
    Some(Self { m, b })
  }
}

/// 标定方式及其参数
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Calibration {
  #[default]
  None,
  Single {
    point: Point2,
  },
  Dual(DualCalibration),
}

impl Calibration {
  pub fn mode(&self) -> CalibrationMode {
    match self {
      Calibration::None => CalibrationMode::None,
      Calibration::Single { .. } => CalibrationMode::Single,
      Calibration::Dual(_) => CalibrationMode::Dual,
    }
  }

  /// 计算目标中心对应的标定参考点
  ///
  /// 双点标定中 X 取决于目标的 Y、Y 取决于目标的 X，
  /// 已有标定数据依赖这一轴交换，须原样保留。
  pub fn reference_point(&self, center: Point2, camera: &CameraStaticProperties) -> Point2 {
    match *self {
      Calibration::None => Point2::new(camera.center_x, camera.center_y),
      Calibration::Single { point } => point,
      Calibration::Dual(DualCalibration { m, b }) => {
        Point2::new((center.y - b) / m, center.x * m + b)
      }
    }
  }
}

/// 俯仰角（度），向上为正
pub fn calculate_pitch(pixel_y: f64, center_y: f64, vertical_focal_length: f64) -> f64 {
  let pitch = ((pixel_y - center_y) / vertical_focal_length).atan().to_degrees();
  pitch * -1.0
}

/// 偏航角（度），向右为正
pub fn calculate_yaw(pixel_x: f64, center_x: f64, horizontal_focal_length: f64) -> f64 {
  ((pixel_x - center_x) / horizontal_focal_length)
    .atan()
    .to_degrees()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Target2d {
  pub raw: RawShape,
  pub calibrated: Point2,
  pub pitch: f64,
  pub yaw: f64,
  pub area: f64,
}

/// 三维位姿目标：旋转为罗德里格斯向量（弧度），平移单位与目标模型一致
#[derive(Debug, Clone, PartialEq)]
pub struct Target3d {
  pub target: Target2d,
  pub rotation: [f64; 3],
  pub translation: [f64; 3],
}

/// 像素坐标系下的轴对齐矩形
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect2d {
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub height: f64,
}

impl Rect2d {
  pub fn from_corners(left: f64, top: f64, right: f64, bottom: f64) -> Self {
    Self {
      x: left,
      y: top,
      width: right - left,
      height: bottom - top,
    }
  }

  pub fn center(&self) -> Point2 {
    Point2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
  }

  pub fn area(&self) -> f64 {
    self.width * self.height
  }
}

/// 计算目标角度时所用的参数，取自该帧被处理时生效的配置
#[derive(Debug, Clone, PartialEq)]
pub struct TargetCalculationParameters {
  pub calibration: Calibration,
  pub camera: Arc<CameraStaticProperties>,
}

/// 加速器检测得到的目标
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTarget {
  pub bbox: Rect2d,
  pub confidence: f32,
  pub class_id: i16,
  pub params: Arc<TargetCalculationParameters>,
}

impl TrackedTarget {
  pub fn center(&self) -> Point2 {
    self.bbox.center()
  }

  pub fn area(&self) -> f64 {
    self.bbox.area()
  }

  pub fn pitch(&self) -> f64 {
    let center = self.center();
    let reference = self
      .params
      .calibration
      .reference_point(center, &self.params.camera);
    calculate_pitch(
      center.y,
      reference.y,
      self.params.camera.vertical_focal_length,
    )
  }

  pub fn yaw(&self) -> f64 {
    let center = self.center();
    let reference = self
      .params
      .calibration
      .reference_point(center, &self.params.camera);
    calculate_yaw(
      center.x,
      reference.x,
      self.params.camera.horizontal_focal_length,
    )
  }
}

/// 流水线结果中的目标
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
  Flat(Target2d),
  Pose(Target3d),
  Tracked(TrackedTarget),
}

impl From<Target2d> for Target {
  fn from(target: Target2d) -> Self {
    Target::Flat(target)
  }
}

impl From<Target3d> for Target {
  fn from(target: Target3d) -> Self {
    Target::Pose(target)
  }
}

impl From<TrackedTarget> for Target {
  fn from(target: TrackedTarget) -> Self {
    Target::Tracked(target)
  }
}
