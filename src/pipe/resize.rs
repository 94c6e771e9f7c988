// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/pipe/resize.rs - 输出帧降采样
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
use std::time::Instant;

use image::RgbImage;
use image::imageops::{self, FilterType};

use crate::{
  frame::{Frame, FrameDivisor},
  pipe::{Pipe, PipeResult},
};

/// 按同一倍数缩小彩色视图与处理视图，只影响用于显示/推流的帧数据
pub struct ResizeFramePipe {
  divisor: FrameDivisor,
}

impl ResizeFramePipe {
  pub fn new(divisor: FrameDivisor) -> Self {
    Self { divisor }
  }
}

fn resize(image: &RgbImage, width: u32, height: u32) -> RgbImage {
  if width == 0 || height == 0 {
    return RgbImage::new(width, height);
  }
  imageops::resize(image, width, height, FilterType::Triangle)
}

impl Pipe<Frame> for ResizeFramePipe {
  type Output = Frame;
  type Error = Infallible;

  fn run(&mut self, mut frame: Frame) -> Result<PipeResult<Self::Output>, Self::Error> {
    let start = Instant::now();
    if let Some((width, height)) = self.divisor.scaled(frame.width(), frame.height()) {
      frame.processed = resize(&frame.processed, width, height);
      frame.color = resize(&frame.color, width, height);
    }
    Ok(PipeResult::since(start, frame))
  }
}
