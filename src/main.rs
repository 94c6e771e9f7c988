// 该文件是 Huiyan （慧眼） 项目的一部分。
// src/main.rs - 命令行入口
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};

use huiyan::{
  FromUrl,
  bridge::{BridgeLoader, NativeAcceleratorBuilder},
  input::InputWrapper,
  output::OutputWrapper,
  pipe::Annotator,
  pipeline::{AcceleratorPipeline, VisionPipeline},
  settings::{ModelStore, PipelineSettings, RknnSettings},
  task::{ContinuousTask, OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("Huiyan 视觉流水线");
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let settings = match &args.settings {
    Some(path) => PipelineSettings::from_file(path)?,
    None => PipelineSettings::Rknn(RknnSettings::default()),
  };
  info!("流水线类型: {:?}", settings.pipeline_type());

  let loader = BridgeLoader::global();
  debug!(
    "原生库资源目录: {}",
    loader.locations().resource_root.display()
  );
  let pipeline = match (&args.model, settings) {
    (Some(model), PipelineSettings::Rknn(settings)) => {
      info!("模型文件路径: {}", model);
      let accelerator = NativeAcceleratorBuilder::from_url(model)?.build(loader);
      VisionPipeline::Rknn(AcceleratorPipeline::new(
        settings,
        Box::new(accelerator),
        Annotator::new()?,
      ))
    }
    (model, settings) => {
      if model.is_some() {
        warn!("非 rknn 流水线忽略 --model 参数");
      }
      let models = ModelStore::new(&args.model_root);
      info!("模型目录: {}", models.root().display());
      VisionPipeline::from_settings(settings, loader, &models, None, None)?
    }
  };

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  if args.once {
    OneShotTask.run_task(input, pipeline, output)?;
  } else {
    ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .run_task(input, pipeline, output)?;
  }

  Ok(())
}
