// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/output/save_image_file.rs - 保存处理后的图像
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Record, Render},
  pipeline::PipelineResult,
};

/// 将处理视图保存为图像文件，如 `image:///tmp/out.png?record`
///
/// 带 `record` 参数时，在同名 `.txt` 文件中逐行记录目标。
pub struct SaveImageFileOutput {
  path: PathBuf,
  record: bool,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let record = uri.query_pairs().any(|(k, _)| k == "record");
    Ok(Self::new(uri.path(), record))
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>, record: bool) -> Self {
    Self {
      path: path.into(),
      record,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn record_path(&self) -> PathBuf {
    self.path.with_extension("txt")
  }

  fn save_image(&self, image: &image::RgbImage) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&self.path)?;
    warn!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl<T: Record> Render<T> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, result: &PipelineResult<T>) -> Result<(), Self::Error> {
    info!(
      "{} 个目标, 处理耗时 {:.3} ms, {:.1} FPS",
      result.targets.len(),
      result.process_nanos as f64 / 1_000_000.0,
      result.fps
    );
    self.save_image(&result.output_frame.processed)?;

    if self.record {
      let records: Vec<String> = result.targets.iter().map(Record::record).collect();
      std::fs::write(self.record_path(), records.join("\n"))?;
    }

    Ok(())
  }
}
