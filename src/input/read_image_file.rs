// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{CameraStaticProperties, Frame},
};

/// 未指定时使用的对角视场角（度）
pub const DEFAULT_FOV: f64 = 70.0;

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("参数 {0} 无效: {1}")]
  InvalidParameter(&'static str, String),
}

/// 从单张图像文件产生帧，如 `image:///data/target.png?fov=68.5&repeat=10`
pub struct ImageFileInput {
  image: RgbImage,
  properties: Arc<CameraStaticProperties>,
  remaining: usize,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    let mut fov = DEFAULT_FOV;
    let mut repeat = 1;
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "fov" => {
          fov = value
            .parse::<f64>()
            .ok()
            .filter(|fov| fov.is_finite() && *fov > 0.0 && *fov < 180.0)
            .ok_or_else(|| ImageFileInputError::InvalidParameter("fov", value.to_string()))?;
        }
        "repeat" => {
          repeat = value
            .parse::<usize>()
            .map_err(|_| ImageFileInputError::InvalidParameter("repeat", value.to_string()))?;
        }
        _ => {}
      }
    }

    let path = url.path();
    let image = ImageReader::open(path)?.decode()?.into_rgb8();
    info!(
      "读取图像 {}: {}x{}, 视场角 {}°",
      path,
      image.width(),
      image.height(),
      fov
    );

    Ok(Self::new(image, fov, repeat))
  }
}

impl ImageFileInput {
  pub fn new(image: RgbImage, fov: f64, repeat: usize) -> Self {
    let properties = Arc::new(CameraStaticProperties::from_fov(
      image.width(),
      image.height(),
      fov,
    ));
    Self {
      image,
      properties,
      remaining: repeat,
    }
  }

  pub fn properties(&self) -> &Arc<CameraStaticProperties> {
    &self.properties
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;
    Some(Frame::new(self.image.clone(), self.properties.clone()))
  }
}
