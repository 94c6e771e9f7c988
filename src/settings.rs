// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/settings.rs - 流水线配置
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

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{frame::FrameDivisor, target::Calibration};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.15;
pub const DEFAULT_MODEL_NAME: &str = "model";
pub const MODEL_EXTENSION: &str = "rknn";

#[derive(Error, Debug)]
pub enum SettingsError {
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("配置解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("配置无效: {0}")]
  Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineType {
  Geometric2d,
  Pose3d,
  Rknn,
}

/// 各类流水线共有的配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonSettings {
  pub calibration: Calibration,
  pub stream_divisor: FrameDivisor,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipeline2dSettings {
  #[serde(flatten)]
  pub common: CommonSettings,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipeline3dSettings {
  #[serde(flatten)]
  pub common: CommonSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RknnSettings {
  #[serde(flatten)]
  pub common: CommonSettings,
  #[serde(default = "default_confidence_threshold")]
  pub confidence_threshold: f32,
  #[serde(default = "default_model_name")]
  pub model_name: String,
}

fn default_confidence_threshold() -> f32 {
  DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_model_name() -> String {
  DEFAULT_MODEL_NAME.to_string()
}

impl Default for RknnSettings {
  fn default() -> Self {
    Self {
      common: CommonSettings::default(),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      model_name: default_model_name(),
    }
  }
}

/// 单条流水线的配置快照，由外部配置层持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pipeline_type", rename_all = "snake_case")]
pub enum PipelineSettings {
  Geometric2d(Pipeline2dSettings),
  Pose3d(Pipeline3dSettings),
  Rknn(RknnSettings),
}

impl PipelineSettings {
  pub fn pipeline_type(&self) -> PipelineType {
    match self {
      PipelineSettings::Geometric2d(_) => PipelineType::Geometric2d,
      PipelineSettings::Pose3d(_) => PipelineType::Pose3d,
      PipelineSettings::Rknn(_) => PipelineType::Rknn,
    }
  }

  pub fn common(&self) -> &CommonSettings {
    match self {
      PipelineSettings::Geometric2d(s) => &s.common,
      PipelineSettings::Pose3d(s) => &s.common,
      PipelineSettings::Rknn(s) => &s.common,
    }
  }

  pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
    let settings: Self = serde_json::from_str(json)?;
    settings.validate()?;
    Ok(settings)
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
    let path = path.as_ref();
    debug!("读取配置文件: {}", path.display());
    let json = std::fs::read_to_string(path)?;
    Self::from_json_str(&json)
  }

  /// 在接受配置时校验，流水线运行时不再逐帧检查
  pub fn validate(&self) -> Result<(), SettingsError> {
    match self.common().calibration {
      Calibration::None => {}
      Calibration::Single { point } => {
        if !point.x.is_finite() || !point.y.is_finite() {
          return Err(SettingsError::Invalid(format!(
            "单点标定坐标无效: ({}, {})",
            point.x, point.y
          )));
        }
      }
      Calibration::Dual(line) => {
        if !line.m.is_finite() || !line.b.is_finite() || line.m == 0.0 {
          return Err(SettingsError::Invalid(format!(
            "双点标定直线无效: m = {}, b = {}",
            line.m, line.b
          )));
        }
      }
    }

    if let PipelineSettings::Rknn(rknn) = self {
      if !(0.0..=1.0).contains(&rknn.confidence_threshold) {
        return Err(SettingsError::Invalid(format!(
          "置信度阈值超出范围: {}",
          rknn.confidence_threshold
        )));
      }
      if rknn.model_name.trim().is_empty() {
        return Err(SettingsError::Invalid("模型名称为空".to_string()));
      }
    }

    Ok(())
  }
}

/// 模型文件存放在应用数据根目录下
#[derive(Debug, Clone)]
pub struct ModelStore {
  root: PathBuf,
}

impl ModelStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn resolve(&self, model_name: &str) -> PathBuf {
    let path = self.root.join(model_name);
    if path.extension().is_some_and(|ext| ext == MODEL_EXTENSION) {
      path
    } else {
      self.root.join(format!("{}.{}", model_name, MODEL_EXTENSION))
    }
  }
}
