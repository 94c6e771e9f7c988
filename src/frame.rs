// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/frame.rs - 帧与相机静态参数定义
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

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// 相机静态参数，在一次采集配置（分辨率、视场角）内保持不变
#[derive(Debug, Clone, PartialEq)]
pub struct CameraStaticProperties {
  pub image_width: u32,
  pub image_height: u32,
  /// 对角视场角（度）
  pub fov: f64,
  pub horizontal_fov: f64,
  pub vertical_fov: f64,
  pub horizontal_focal_length: f64,
  pub vertical_focal_length: f64,
  pub center_x: f64,
  pub center_y: f64,
}

impl CameraStaticProperties {
  /// 由对角视场角推导水平/垂直视场角与焦距
  pub fn from_fov(image_width: u32, image_height: u32, fov: f64) -> Self {
    let (w, h) = (image_width as f64, image_height as f64);
    let diagonal_view = fov.to_radians();
    let diagonal_aspect = w.hypot(h);

    let horizontal_view = ((diagonal_view / 2.0).tan() * (w / diagonal_aspect)).atan() * 2.0;
    let vertical_view = ((diagonal_view / 2.0).tan() * (h / diagonal_aspect)).atan() * 2.0;

    Self {
      image_width,
      image_height,
      fov,
      horizontal_fov: horizontal_view.to_degrees(),
      vertical_fov: vertical_view.to_degrees(),
      horizontal_focal_length: w / (2.0 * (horizontal_view / 2.0).tan()),
      vertical_focal_length: h / (2.0 * (vertical_view / 2.0).tan()),
      center_x: w / 2.0 - 0.5,
      center_y: h / 2.0 - 0.5,
    }
  }

  /// 直接给定焦距（像素）构造，视场角由焦距反推
  pub fn with_focal_lengths(
    image_width: u32,
    image_height: u32,
    horizontal_focal_length: f64,
    vertical_focal_length: f64,
  ) -> Self {
    let (w, h) = (image_width as f64, image_height as f64);
    let horizontal_fov = (2.0 * (w / (2.0 * horizontal_focal_length)).atan()).to_degrees();
    let vertical_fov = (2.0 * (h / (2.0 * vertical_focal_length)).atan()).to_degrees();
    let fov = (2.0
      * ((horizontal_fov.to_radians() / 2.0).tan())
        .hypot((vertical_fov.to_radians() / 2.0).tan())
        .atan())
    .to_degrees();

    Self {
      image_width,
      image_height,
      fov,
      horizontal_fov,
      vertical_fov,
      horizontal_focal_length,
      vertical_focal_length,
      center_x: w / 2.0 - 0.5,
      center_y: h / 2.0 - 0.5,
    }
  }
}

/// 输出流降采样倍数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameDivisor {
  #[default]
  None,
  Half,
  Quarter,
  Sixth,
}

impl FrameDivisor {
  pub fn divisor(self) -> Option<u32> {
    match self {
      FrameDivisor::None => None,
      FrameDivisor::Half => Some(2),
      FrameDivisor::Quarter => Some(4),
      FrameDivisor::Sixth => Some(6),
    }
  }

  /// 降采样后的尺寸，`None` 表示保持原尺寸
  pub fn scaled(self, width: u32, height: u32) -> Option<(u32, u32)> {
    self.divisor().map(|d| (width / d, height / d))
  }
}

/// 一帧图像：原始彩色视图与处理后视图（阈值化或标注），两者像素对齐
#[derive(Debug, Clone)]
pub struct Frame {
  pub color: RgbImage,
  pub processed: RgbImage,
  pub properties: Arc<CameraStaticProperties>,
}

impl Frame {
  /// 处理视图初始化为彩色视图的副本
  pub fn new(color: RgbImage, properties: Arc<CameraStaticProperties>) -> Self {
    let processed = color.clone();
    Self {
      color,
      processed,
      properties,
    }
  }

  pub fn with_views(
    color: RgbImage,
    processed: RgbImage,
    properties: Arc<CameraStaticProperties>,
  ) -> Self {
    Self {
      color,
      processed,
      properties,
    }
  }

  pub fn empty(properties: Arc<CameraStaticProperties>) -> Self {
    Self::new(RgbImage::new(0, 0), properties)
  }

  /// 任一视图没有像素即视为空帧
  pub fn is_empty(&self) -> bool {
    let blank = |image: &RgbImage| image.width() == 0 || image.height() == 0;
    blank(&self.color) || blank(&self.processed)
  }

  pub fn width(&self) -> u32 {
    self.processed.width()
  }

  pub fn height(&self) -> u32 {
    self.processed.height()
  }
}
