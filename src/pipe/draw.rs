// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/pipe/draw.rs - 在处理视图上绘制检测结果
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

use ab_glyph::{Font, FontArc, InvalidFont, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::{
  pipe::{Pipe, PipeResult},
  target::TrackedTarget,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
/// 标签基线相对边框上沿的偏移
const LABEL_TEXT_OFFSET: i32 = 12;
const BOX_THICKNESS: i32 = 2;
const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub struct Annotator {
  font: FontArc,
  font_scale: PxScale,
  box_color: Rgb<u8>,
  label_color: Rgb<u8>,
}

impl Annotator {
  pub fn new() -> Result<Self, InvalidFont> {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data)?;

    Ok(Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      box_color: BOX_COLOR,
      label_color: LABEL_COLOR,
    })
  }

  /// `draw_text_mut` 以文字左上角定位，由基线位置减去字体上升高度
  fn label_top(&self, y_min: i32) -> i32 {
    let ascent = self.font.as_scaled(self.font_scale).ascent();
    (y_min + LABEL_TEXT_OFFSET - ascent.round() as i32).max(0)
  }

  /// 绘制 2 像素边框与 `类别 (置信度)` 标签，框完全在图像外时跳过
  pub fn draw_target(&self, image: &mut RgbImage, target: &TrackedTarget) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (target.bbox.x.floor() as i32).clamp(0, w - 1);
    let y_min = (target.bbox.y.floor() as i32).clamp(0, h - 1);
    let x_max = ((target.bbox.x + target.bbox.width).ceil() as i32).clamp(0, w - 1);
    let y_max = ((target.bbox.y + target.bbox.height).ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return;
    }

    for thickness in 0..BOX_THICKNESS {
      let width = x_max - x_min + 1 - 2 * thickness;
      let height = y_max - y_min + 1 - 2 * thickness;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + thickness, y_min + thickness).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, self.box_color);
    }

    let label = format!("{} ({:.2})", target.class_id, target.confidence);
    draw_text_mut(
      image,
      self.label_color,
      x_min,
      self.label_top(y_min).min(h - 1),
      self.font_scale,
      &self.font,
      &label,
    );
  }
}

/// 标注阶段：输入处理视图与目标，输出标注后的处理视图
pub struct DrawDetectionsPipe {
  annotator: Annotator,
}

impl DrawDetectionsPipe {
  pub fn new(annotator: Annotator) -> Self {
    Self { annotator }
  }
}

impl<'a> Pipe<(RgbImage, &'a [TrackedTarget])> for DrawDetectionsPipe {
  type Output = RgbImage;
  type Error = Infallible;

  fn run(
    &mut self,
    (mut image, targets): (RgbImage, &'a [TrackedTarget]),
  ) -> Result<PipeResult<Self::Output>, Self::Error> {
    let start = Instant::now();
    for target in targets {
      self.annotator.draw_target(&mut image, target);
    }
    Ok(PipeResult::since(start, image))
  }
}
