// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 流水线配置文件（JSON），缺省时使用默认的 rknn 流水线
  #[arg(long, value_name = "FILE")]
  pub settings: Option<PathBuf>,

  /// 模型文件所在的数据根目录
  #[arg(long, value_name = "DIR", default_value = ".")]
  pub model_root: PathBuf,

  /// 直接指定模型，如 rknn:///opt/huiyan/yolo.rknn，覆盖配置中的模型名称
  #[arg(long, value_name = "MODEL")]
  pub model: Option<Url>,

  /// 输入来源，如 image:///data/target.png?fov=68.5
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径，如 image:///tmp/out.png?record
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 处理的最大帧数
  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 只处理一帧
  #[arg(long)]
  pub once: bool,
}
