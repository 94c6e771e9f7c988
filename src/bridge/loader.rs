// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/bridge/loader.rs - 原生加速库的提取与加载
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
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use libloading::Library;
use tracing::{debug, error, info, warn};

use crate::bridge::BridgeError;

/// 推理桥接库
pub const PRIMARY_LIBRARY: &str = "huiyan_rknn";
/// 推理桥接库依赖的 RKNN 运行时
pub const DEPENDENCY_LIBRARY: &str = "rknnrt";
pub const NATIVE_LIBRARY_FOLDER: &str = "nativelibraries";
pub const SYSTEM_LIBRARY_DIR: &str = "/usr/lib";
pub const RESOURCE_DIR_ENV: &str = "HUIYAN_RESOURCE_DIR";

/// 当前平台对应的原生库目录名
pub fn native_library_folder_name() -> Option<&'static str> {
  match (std::env::consts::OS, std::env::consts::ARCH) {
    ("linux", "x86_64") => Some("linuxx86-64"),
    ("linux", "aarch64") => Some("linuxarm64"),
    ("linux", "arm") => Some("linuxarm32"),
    ("windows", "x86_64") => Some("windowsx86-64"),
    ("macos", _) => Some("osxuniversal"),
    _ => None,
  }
}

/// 按平台命名规则生成动态库文件名，如 `libfoo.so`、`foo.dll`
pub fn map_library_name(name: &str) -> String {
  format!(
    "{}{}{}",
    std::env::consts::DLL_PREFIX,
    name,
    std::env::consts::DLL_SUFFIX
  )
}

#[derive(Debug, Clone)]
pub struct LibraryLocations {
  /// 随应用分发的资源根目录，其下为 `nativelibraries/<arch>/<file>`
  pub resource_root: PathBuf,
  /// 提取目标目录
  pub temp_dir: PathBuf,
  /// 依赖库安装目录，仅 POSIX 系统
  pub system_dir: Option<PathBuf>,
  pub arch: Option<String>,
}

impl LibraryLocations {
  pub fn from_env() -> Self {
    let resource_root = std::env::var_os(RESOURCE_DIR_ENV)
      .map(PathBuf::from)
      .or_else(|| {
        std::env::current_exe()
          .ok()
          .and_then(|exe| exe.parent().map(Path::to_path_buf))
      })
      .unwrap_or_else(|| PathBuf::from("."));

    Self {
      resource_root,
      temp_dir: std::env::temp_dir(),
      system_dir: cfg!(unix).then(|| PathBuf::from(SYSTEM_LIBRARY_DIR)),
      arch: native_library_folder_name().map(str::to_string),
    }
  }

  pub fn bundled_path(&self, name: &str) -> Result<PathBuf, BridgeError> {
    let arch = self
      .arch
      .as_deref()
      .ok_or_else(|| BridgeError::UnsupportedPlatform(std::env::consts::ARCH.to_string()))?;
    Ok(
      self
        .resource_root
        .join(NATIVE_LIBRARY_FOLDER)
        .join(arch)
        .join(map_library_name(name)),
    )
  }
}

/// 将随应用分发的动态库复制到临时目录，返回提取后的路径
///
/// 每次都重新提取，保证与当前应用版本一致。
pub fn extract_library(locations: &LibraryLocations, name: &str) -> Result<PathBuf, BridgeError> {
  let bundled = locations.bundled_path(name)?;
  if !bundled.is_file() {
    warn!("找不到原生库: {}", bundled.display());
    return Err(BridgeError::ResourceMissing(bundled));
  }

  // 保持原文件名，Windows 下按名称查找依赖
  let target = locations.temp_dir.join(map_library_name(name));
  std::fs::copy(&bundled, &target)?;
  info!("原生库已提取: {}", target.display());
  Ok(target)
}

/// 安装依赖库到系统库目录，已存在时跳过
///
/// 返回 `Some(path)` 表示本次完成了安装。
pub fn unpack_dependency(
  locations: &LibraryLocations,
  system_dir: &Path,
  name: &str,
) -> Result<Option<PathBuf>, BridgeError> {
  let installed = system_dir.join(map_library_name(name));
  if installed.exists() {
    debug!("依赖库已存在: {}", installed.display());
    return Ok(None);
  }

  let extracted = extract_library(locations, name)?;
  std::fs::copy(&extracted, &installed)?;
  info!("依赖库已安装: {}", installed.display());
  Ok(Some(installed))
}

/// 加载状态：Unloaded → Loading → Loaded | LoadFailed，终态不再变化
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum BridgeState {
  Unloaded = 0,
  Loading = 1,
  Loaded = 2,
  LoadFailed = 3,
}

impl BridgeState {
  fn from_u8(value: u8) -> Self {
    match value {
      1 => BridgeState::Loading,
      2 => BridgeState::Loaded,
      3 => BridgeState::LoadFailed,
      _ => BridgeState::Unloaded,
    }
  }
}

enum LoadStatus {
  Loaded(Arc<Library>),
  Failed(String),
}

/// 原生库的一次性加载器
///
/// 加载只尝试一次：无论成功与否，之后的调用都直接返回记录的结果。
/// 并发调用由互斥锁串行化；`state` 不取锁，加载进行中时报告 `Loading`。
pub struct BridgeLoader {
  locations: LibraryLocations,
  status: Mutex<Option<LoadStatus>>,
  state: AtomicU8,
  attempts: AtomicUsize,
}

impl BridgeLoader {
  pub fn new(locations: LibraryLocations) -> Self {
    Self {
      locations,
      status: Mutex::new(None),
      state: AtomicU8::new(BridgeState::Unloaded as u8),
      attempts: AtomicUsize::new(0),
    }
  }

  /// 进程级共享的加载器
  pub fn global() -> &'static BridgeLoader {
    static GLOBAL: OnceLock<BridgeLoader> = OnceLock::new();
    GLOBAL.get_or_init(|| BridgeLoader::new(LibraryLocations::from_env()))
  }

  pub fn locations(&self) -> &LibraryLocations {
    &self.locations
  }

  pub fn state(&self) -> BridgeState {
    BridgeState::from_u8(self.state.load(Ordering::SeqCst))
  }

  fn set_state(&self, state: BridgeState) {
    self.state.store(state as u8, Ordering::SeqCst);
  }

  pub fn load_attempts(&self) -> usize {
    self.attempts.load(Ordering::SeqCst)
  }

  /// 确保原生库已加载，失败时返回 `BridgeError::Unavailable`
  pub fn ensure_loaded(&self) -> Result<Arc<Library>, BridgeError> {
    let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
    match status.get_or_insert_with(|| self.load()) {
      LoadStatus::Loaded(library) => Ok(library.clone()),
      LoadStatus::Failed(reason) => Err(BridgeError::Unavailable(reason.clone())),
    }
  }

  fn load(&self) -> LoadStatus {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    self.set_state(BridgeState::Loading);
    info!("加载原生加速库: {}", PRIMARY_LIBRARY);

    if let Some(system_dir) = &self.locations.system_dir
      && let Err(e) = unpack_dependency(&self.locations, system_dir, DEPENDENCY_LIBRARY)
    {
      warn!("安装依赖库 {} 失败: {}", DEPENDENCY_LIBRARY, e);
    }

    let loaded = extract_library(&self.locations, PRIMARY_LIBRARY).and_then(|path| {
      // 加载的库在进程结束前不会卸载
      unsafe { Library::new(&path) }.map_err(BridgeError::from)
    });

    match loaded {
      Ok(library) => {
        info!("原生加速库加载成功");
        self.set_state(BridgeState::Loaded);
        LoadStatus::Loaded(Arc::new(library))
      }
      Err(e) => {
        error!("无法加载原生加速库 {}: {}", PRIMARY_LIBRARY, e);
        self.set_state(BridgeState::LoadFailed);
        LoadStatus::Failed(e.to_string())
      }
    }
  }
}
