//! # FindThings 物品识别：命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与结果输出。
//! 流水线逻辑见 `lib.rs` 架构文档。

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Serialize;
use serde_json::json;

use findthings_vision::error::AppError;
use findthings_vision::vision::{
    CroppedRegionImage, DetectionClient, ImageSource, PreparedPayload, VisionConfig, VisionPipeline,
    VisionProfile,
};

#[derive(Parser, Debug)]
#[command(name = "findthings-vision")]
#[command(about = "📷 识别图片中的物品，输出区域、类别与裁剪子图")]
#[command(version)]
struct Args {
    /// 待识别的图片路径
    image: PathBuf,

    #[arg(short, long, help = "JSON 配置文件路径（缺失字段取默认值）")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "访问令牌（优先于配置文件与 FINDTHINGS_ACCESS_TOKEN）")]
    token: Option<String>,

    #[arg(long, help = "检测接口地址")]
    endpoint: Option<String>,

    #[arg(short, long, help = "编码档位：quality / balanced / speed")]
    profile: Option<String>,

    #[arg(long, help = "只做加载与编码，输出载荷统计，不发送请求")]
    dry_run: bool,

    #[arg(short, long, help = "裁剪子图输出目录（region-{index}.jpg）")]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
struct RegionOutput<'a> {
    index: usize,
    label: &'a str,
    score: f64,
    category: &'a str,
    rect: findthings_vision::vision::PixelRect,
    used_full_image: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(err) = run(args).await {
        log::error!("❌ {}", err);
        eprintln!("{}", err);
        std::process::exit(err.exit_code());
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let config = build_config(&args)?;
    log::info!("⚙️ 编码档位：{}", config.infer_profile().as_str());

    let pipeline = VisionPipeline::new(config)?;
    let source = ImageSource::FilePath(args.image.to_string_lossy().into_owned());

    if args.dry_run {
        let prepared = pipeline.prepare(source)?;
        println!("{}", serde_json::to_string_pretty(&payload_stats(&prepared))?);
        return Ok(());
    }

    if pipeline.config().access_token.is_none() {
        return Err(AppError::Usage(
            "缺少访问令牌：请使用 --token、配置文件或 FINDTHINGS_ACCESS_TOKEN".to_string(),
        ));
    }

    let client = DetectionClient::from_config(pipeline.config())?;
    let crops = pipeline.analyze(source, &client).await?;

    if let Some(dir) = args.out.as_deref() {
        std::fs::create_dir_all(dir)?;
    }

    let mut outputs = Vec::with_capacity(crops.len());
    for (index, crop) in crops.iter().enumerate() {
        let file = match args.out.as_deref() {
            Some(dir) => Some(write_crop(dir, index, crop, pipeline.config().region_jpeg_quality)?),
            None => None,
        };
        outputs.push(RegionOutput {
            index,
            label: crop.label(),
            score: crop.score(),
            category: crop.category.as_str(),
            rect: crop.region.rect,
            used_full_image: crop.used_full_image,
            file,
        });
    }

    println!("{}", serde_json::to_string_pretty(&outputs)?);
    Ok(())
}

fn build_config(args: &Args) -> Result<VisionConfig, AppError> {
    let mut config = match args.config.as_deref() {
        Some(path) => VisionConfig::from_json_file(path)?,
        None => VisionConfig::default(),
    }
    .with_env_overrides();

    if let Some(profile) = args.profile.as_deref() {
        config.apply_profile(VisionProfile::parse(profile)?);
    }
    if let Some(token) = args.token.as_deref() {
        config.access_token = Some(token.to_string());
    }
    if let Some(endpoint) = args.endpoint.as_deref() {
        config.endpoint = endpoint.to_string();
    }

    Ok(config)
}

fn payload_stats(prepared: &PreparedPayload) -> serde_json::Value {
    json!({
        "original_size": [prepared.original_size.0, prepared.original_size.1],
        "normalized_size": [prepared.normalized.width(), prepared.normalized.height()],
        "quality": prepared.attempt.quality,
        "jpeg_bytes": prepared.attempt.payload.len(),
        "base64_len": prepared.attempt.base64_len,
        "form_len": prepared.attempt.form_len,
    })
}

fn write_crop(
    dir: &Path,
    index: usize,
    crop: &CroppedRegionImage,
    quality: f32,
) -> Result<String, AppError> {
    let path = dir.join(format!("region-{}.jpg", index));
    std::fs::write(&path, crop.to_jpeg(quality)?)?;
    log::info!("💾 已保存裁剪图：{}", path.display());
    Ok(path.to_string_lossy().into_owned())
}
