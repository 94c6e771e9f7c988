// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/bridge.rs - 原生加速器桥接
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

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;
use libloading::Library;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

pub mod ffi;
mod loader;

pub use self::loader::{
  BridgeLoader, BridgeState, DEPENDENCY_LIBRARY, LibraryLocations, PRIMARY_LIBRARY,
  extract_library, map_library_name, native_library_folder_name, unpack_dependency,
};

use self::ffi::{DetectFn, InitFn, NativeFrame, ReleaseFn};

#[cfg(test)]
pub(crate) use self::loader::tests::test_locations as loader_test_locations;

#[derive(Error, Debug)]
pub enum BridgeError {
  #[error("不支持的平台: {0}")]
  UnsupportedPlatform(String),
  #[error("找不到原生库资源: {}", .0.display())]
  ResourceMissing(PathBuf),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("动态库错误: {0}")]
  Library(#[from] libloading::Error),
  #[error("模型路径无效: {0}")]
  InvalidModelPath(#[from] std::ffi::NulError),
  #[error("加速器不可用: {0}")]
  Unavailable(String),
  #[error("原生检测结果格式错误: {0}")]
  MalformedResult(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxRect {
  pub left: i32,
  pub right: i32,
  pub top: i32,
  pub bottom: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
  pub class_id: i16,
  pub bbox: BoxRect,
  pub confidence: f32,
}

/// 一次检测调用的结果，按原生侧给出的顺序排列
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionResultGroup {
  pub id: i32,
  pub results: Vec<DetectionResult>,
}

impl DetectionResultGroup {
  pub fn count(&self) -> usize {
    self.results.len()
  }
}

/// 原生推理上下文句柄，0 为无效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcceleratorHandle(i64);

impl AcceleratorHandle {
  pub const INVALID: AcceleratorHandle = AcceleratorHandle(0);

  pub fn from_raw(raw: i64) -> Self {
    Self(raw)
  }

  pub fn raw(self) -> i64 {
    self.0
  }

  pub fn is_valid(self) -> bool {
    self.0 != 0
  }
}

/// 硬件加速检测器
///
/// `detect` 会阻塞调用线程直到推理完成，不可取消；
/// `&mut self` 保证同一句柄同时只有一个调用在进行。
pub trait Accelerator {
  fn is_available(&self) -> bool;

  /// 对帧做检测，`None` 表示没有检测结果。原生侧可以在帧上直接绘制。
  fn detect(&mut self, frame: &mut RgbImage) -> Result<Option<DetectionResultGroup>, BridgeError>;
}

impl<A: Accelerator + ?Sized> Accelerator for Box<A> {
  fn is_available(&self) -> bool {
    (**self).is_available()
  }

  fn detect(&mut self, frame: &mut RgbImage) -> Result<Option<DetectionResultGroup>, BridgeError> {
    (**self).detect(frame)
  }
}

struct NativeSymbols {
  _library: Arc<Library>,
  detect: DetectFn,
  release: ReleaseFn,
}

/// 通过原生库访问 RKNPU 的检测器
pub struct NativeAccelerator {
  symbols: Option<NativeSymbols>,
  handle: AcceleratorHandle,
}

impl NativeAccelerator {
  /// 加载模型；任何失败都只记录日志，得到的检测器始终返回空结果
  pub fn new(loader: &BridgeLoader, model_path: &Path) -> Self {
    let library = match loader.ensure_loaded() {
      Ok(library) => library,
      Err(e) => {
        warn!("原生加速库不可用，检测将返回空结果: {}", e);
        return Self::unavailable();
      }
    };

    match Self::init(library, model_path) {
      Ok(accelerator) => accelerator,
      Err(e) => {
        error!("初始化模型 {} 失败: {}", model_path.display(), e);
        Self::unavailable()
      }
    }
  }

  pub fn unavailable() -> Self {
    Self {
      symbols: None,
      handle: AcceleratorHandle::INVALID,
    }
  }

  pub fn handle(&self) -> AcceleratorHandle {
    self.handle
  }

  fn init(library: Arc<Library>, model_path: &Path) -> Result<Self, BridgeError> {
    info!("加载模型文件: {}", model_path.display());
    let path = CString::new(model_path.to_string_lossy().as_bytes())?;

    let (init, detect, release) = unsafe {
      let init: InitFn = *library.get::<InitFn>(ffi::INIT_SYMBOL)?;
      let detect: DetectFn = *library.get::<DetectFn>(ffi::DETECT_SYMBOL)?;
      let release: ReleaseFn = *library.get::<ReleaseFn>(ffi::RELEASE_SYMBOL)?;
      (init, detect, release)
    };

    let handle = AcceleratorHandle::from_raw(unsafe { init(path.as_ptr()) });
    if !handle.is_valid() {
      return Err(BridgeError::Unavailable("模型初始化返回空句柄".to_string()));
    }
    debug!("模型句柄: {:#x}", handle.raw());
    info!("模型加载完成");

    Ok(Self {
      symbols: Some(NativeSymbols {
        _library: library,
        detect,
        release,
      }),
      handle,
    })
  }
}

impl Accelerator for NativeAccelerator {
  fn is_available(&self) -> bool {
    self.symbols.is_some() && self.handle.is_valid()
  }

  fn detect(&mut self, frame: &mut RgbImage) -> Result<Option<DetectionResultGroup>, BridgeError> {
    let Some(symbols) = &self.symbols else {
      return Ok(None);
    };
    if !self.handle.is_valid() {
      return Ok(None);
    }

    let mut native = NativeFrame::new(frame);
    unsafe {
      let group = (symbols.detect)(self.handle.raw(), native.addr());
      let decoded = ffi::decode_group(group);
      if !group.is_null() {
        (symbols.release)(group);
      }
      decoded
    }
  }
}

/// 以 URL 描述的模型，如 `rknn:///opt/huiyan/model.rknn`
pub struct NativeAcceleratorBuilder {
  model_path: PathBuf,
}

impl FromUrlWithScheme for NativeAcceleratorBuilder {
  const SCHEME: &'static str = "rknn";
}

impl FromUrl for NativeAcceleratorBuilder {
  type Error = BridgeError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(BridgeError::SchemeMismatch(format!(
        "模型路径必须使用 {} 方案，实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(Self {
      model_path: PathBuf::from(url.path()),
    })
  }
}

impl NativeAcceleratorBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
    }
  }

  pub fn model_path(&self) -> &Path {
    &self.model_path
  }

  pub fn build(self, loader: &BridgeLoader) -> NativeAccelerator {
    NativeAccelerator::new(loader, &self.model_path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unavailable_accelerator_returns_no_result() {
    let loader = BridgeLoader::new(loader::tests::test_locations("bridge"));
    let mut accelerator = NativeAccelerator::new(&loader, Path::new("/nonexistent/model.rknn"));
    assert!(!accelerator.is_available());
    assert!(!accelerator.handle().is_valid());

    let mut image = RgbImage::new(8, 8);
    for _ in 0..3 {
      assert!(accelerator.detect(&mut image).unwrap().is_none());
    }
    assert_eq!(loader.state(), BridgeState::LoadFailed);
    assert_eq!(loader.load_attempts(), 1);
  }

  #[test]
  fn test_second_instance_does_not_reload() {
    let loader = BridgeLoader::new(loader::tests::test_locations("bridge-twice"));
    let _first = NativeAccelerator::new(&loader, Path::new("model.rknn"));
    let _second = NativeAccelerator::new(&loader, Path::new("model.rknn"));
    assert_eq!(loader.load_attempts(), 1);
  }

  #[test]
  fn test_builder_from_url() {
    let url = Url::parse("rknn:///opt/huiyan/model.rknn").unwrap();
    let builder = NativeAcceleratorBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path(), Path::new("/opt/huiyan/model.rknn"));

    let wrong = Url::parse("image:///tmp/a.png").unwrap();
    assert!(matches!(
      NativeAcceleratorBuilder::from_url(&wrong),
      Err(BridgeError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn test_handle_validity() {
    assert!(!AcceleratorHandle::INVALID.is_valid());
    assert!(AcceleratorHandle::from_raw(0x1234).is_valid());
  }
}
