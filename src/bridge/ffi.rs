// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/bridge/ffi.rs - 原生加速库 C 接口定义
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

use std::ffi::{c_char, c_int};
use std::marker::PhantomData;

use image::RgbImage;

use crate::bridge::{BoxRect, BridgeError, DetectionResult, DetectionResultGroup};

pub const INIT_SYMBOL: &[u8] = b"huiyan_rknn_init\0";
pub const DETECT_SYMBOL: &[u8] = b"huiyan_rknn_detect\0";
pub const RELEASE_SYMBOL: &[u8] = b"huiyan_rknn_release\0";

/// 初始化模型，返回上下文句柄，0 表示失败
pub type InitFn = unsafe extern "C" fn(model_path: *const c_char) -> i64;
/// 同步推理；返回空指针表示没有检测结果
pub type DetectFn =
  unsafe extern "C" fn(handle: i64, frame: *mut RawFrameView) -> *mut RawDetectionGroup;
/// 释放 `DetectFn` 返回的结果
pub type ReleaseFn = unsafe extern "C" fn(group: *mut RawDetectionGroup);

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBoxRect {
  pub left: c_int,
  pub right: c_int,
  pub top: c_int,
  pub bottom: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDetectionResult {
  pub cls: i16,
  pub bbox: RawBoxRect,
  pub conf: f32,
}

#[repr(C)]
#[derive(Debug)]
pub struct RawDetectionGroup {
  pub id: c_int,
  pub count: c_int,
  pub results: *const RawDetectionResult,
}

/// 交给原生侧的 RGB 帧描述，像素数据不复制
#[repr(C)]
#[derive(Debug)]
pub struct RawFrameView {
  pub data: *mut u8,
  pub width: c_int,
  pub height: c_int,
  pub stride: c_int,
  pub channels: c_int,
}

/// 借用一帧的像素缓冲区，生命周期保证原生调用期间帧始终有效
pub struct NativeFrame<'a> {
  view: RawFrameView,
  _frame: PhantomData<&'a mut RgbImage>,
}

impl<'a> NativeFrame<'a> {
  pub fn new(image: &'a mut RgbImage) -> Self {
    const CHANNELS: c_int = 3;
    let (width, height) = image.dimensions();
    let data = image.as_mut_ptr();
    Self {
      view: RawFrameView {
        data,
        width: width as c_int,
        height: height as c_int,
        stride: width as c_int * CHANNELS,
        channels: CHANNELS,
      },
      _frame: PhantomData,
    }
  }

  /// 帧描述的原生地址，仅在 `self` 存活期间有效
  pub fn addr(&mut self) -> *mut RawFrameView {
    &mut self.view
  }
}

impl From<RawBoxRect> for BoxRect {
  fn from(raw: RawBoxRect) -> Self {
    BoxRect {
      left: raw.left,
      right: raw.right,
      top: raw.top,
      bottom: raw.bottom,
    }
  }
}

/// 将原生结果解码为 Rust 结构
///
/// # Safety
///
/// `group` 必须为空指针，或指向一个在本次调用期间有效的 `RawDetectionGroup`，
/// 且其 `results` 指向至少 `count` 个元素。
pub unsafe fn decode_group(
  group: *const RawDetectionGroup,
) -> Result<Option<DetectionResultGroup>, BridgeError> {
  let Some(group) = (unsafe { group.as_ref() }) else {
    return Ok(None);
  };

  let count = usize::try_from(group.count).map_err(|_| {
    BridgeError::MalformedResult(format!("检测数量为负: {}", group.count))
  })?;

  if count == 0 {
    return Ok(Some(DetectionResultGroup {
      id: group.id,
      results: Vec::new(),
    }));
  }

  if group.results.is_null() {
    return Err(BridgeError::MalformedResult(format!(
      "检测数量为 {} 但结果数组为空指针",
      count
    )));
  }

  let raw = unsafe { std::slice::from_raw_parts(group.results, count) };
  let results = raw
    .iter()
    .map(|r| DetectionResult {
      class_id: r.cls,
      bbox: r.bbox.into(),
      confidence: r.conf,
    })
    .collect();

  Ok(Some(DetectionResultGroup {
    id: group.id,
    results,
  }))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_decode_null_is_no_result() {
    let decoded = unsafe { decode_group(std::ptr::null()) }.unwrap();
    assert!(decoded.is_none());
  }

  #[test]
  fn test_decode_group_keeps_order() {
    let raw = [
      RawDetectionResult {
        cls: 2,
        bbox: RawBoxRect {
          left: 10,
          right: 50,
          top: 20,
          bottom: 60,
        },
        conf: 0.8,
      },
      RawDetectionResult {
        cls: 0,
        bbox: RawBoxRect {
          left: 1,
          right: 2,
          top: 3,
          bottom: 4,
        },
        conf: 0.3,
      },
    ];
    let group = RawDetectionGroup {
      id: 7,
      count: 2,
      results: raw.as_ptr(),
    };
    let decoded = unsafe { decode_group(&group) }.unwrap().unwrap();
    assert_eq!(decoded.id, 7);
    assert_eq!(decoded.count(), 2);
    assert_eq!(decoded.results[0].class_id, 2);
    assert_eq!(decoded.results[0].bbox.right, 50);
    assert_eq!(decoded.results[1].confidence, 0.3);
  }

  #[test]
  fn test_decode_malformed_group() {
    let negative = RawDetectionGroup {
      id: 0,
      count: -1,
      results: std::ptr::null(),
    };
    assert!(matches!(
      unsafe { decode_group(&negative) },
      Err(BridgeError::MalformedResult(_))
    ));

    let dangling = RawDetectionGroup {
      id: 0,
      count: 3,
      results: std::ptr::null(),
    };
    assert!(matches!(
      unsafe { decode_group(&dangling) },
      Err(BridgeError::MalformedResult(_))
    ));
  }

  #[test]
  fn test_native_frame_points_at_pixels() {
    let mut image = RgbImage::new(4, 2);
    let expected = image.as_ptr();
    let mut frame = NativeFrame::new(&mut image);
    let view = unsafe { &*frame.addr() };
    assert_eq!(view.data as *const u8, expected);
    assert_eq!(view.width, 4);
    assert_eq!(view.height, 2);
    assert_eq!(view.stride, 12);
  }
}
