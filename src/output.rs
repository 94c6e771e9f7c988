// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/output.rs - 结果输出
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

use thiserror::Error;
use url::Url;

use crate::{
  FromUrl,
  pipeline::PipelineResult,
  target::{Target, Target2d, Target3d, TrackedTarget},
};

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

/// 流水线结果的使用方
pub trait Render<T>: Sized {
  type Error;
  fn render_result(&self, result: &PipelineResult<T>) -> Result<(), Self::Error>;
}

/// 目标的单行文本记录，字段以 `, ` 分隔
pub trait Record {
  fn record(&self) -> String;
}

impl Record for Target2d {
  fn record(&self) -> String {
    format!(
      "2d, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
      self.raw.center.x, self.raw.center.y, self.pitch, self.yaw, self.area
    )
  }
}

impl Record for Target3d {
  fn record(&self) -> String {
    let [tx, ty, tz] = self.translation;
    let [rx, ry, rz] = self.rotation;
    format!(
      "3d, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
      self.target.pitch, self.target.yaw, tx, ty, tz, rx, ry, rz
    )
  }
}

impl Record for TrackedTarget {
  fn record(&self) -> String {
    format!(
      "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
      self.class_id,
      self.confidence,
      self.bbox.x,
      self.bbox.y,
      self.bbox.width,
      self.bbox.height,
      self.pitch(),
      self.yaw()
    )
  }
}

impl Record for Target {
  fn record(&self) -> String {
    match self {
      Target::Flat(target) => target.record(),
      Target::Pose(target) => target.record(),
      Target::Tracked(target) => target.record(),
    }
  }
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 按 URI 方案选择的结果输出
pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "save_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == SaveImageFileOutput::SCHEME {
        let output = SaveImageFileOutput::from_url(url)?;
        return Ok(OutputWrapper::SaveImageFileOutput(output));
      }
    }
    Err(OutputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl<T: Record> Render<T> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, result: &PipelineResult<T>) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => {
        output.render_result(result).map_err(OutputError::from)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::CameraStaticProperties;
  use crate::target::{Calibration, Rect2d, TargetCalculationParameters};
  use std::sync::Arc;

  #[test]
  fn test_tracked_target_record() {
    let target = TrackedTarget {
      bbox: Rect2d::from_corners(10.0, 20.0, 30.0, 60.0),
      confidence: 0.5,
      class_id: 3,
      params: Arc::new(TargetCalculationParameters {
        calibration: Calibration::None,
        camera: Arc::new(CameraStaticProperties::from_fov(41, 81, 70.0)),
      }),
    };
    let record = Target::from(target).record();
    assert!(record.starts_with("3, 0.5000, 10.0000, 20.0000, 20.0000, 40.0000, "));
    assert_eq!(record.split(", ").count(), 8);
  }

  #[test]
  fn test_unknown_scheme() {
    let url = Url::parse("rtsp://localhost/stream").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(_))
    ));
  }
}
