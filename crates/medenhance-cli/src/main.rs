use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Args, Parser, Subcommand};
use medenhance_contracts::events::{EventPayload, EventWriter};
use medenhance_contracts::metrics::MetricsSource;
use medenhance_contracts::modality::ProfileRegistry;
use medenhance_contracts::providers::ProviderRegistry;
use medenhance_contracts::request::{EnhancementOptions, EnhancementRequest};
use medenhance_contracts::result::EnhancementResult;
use medenhance_contracts::runs::records::{build_record, write_record};
use medenhance_contracts::runs::summary::{write_summary, BatchItem, BatchItemStatus, BatchSummary};
use medenhance_engine::analysis::providers::{
    provider_by_name, BEDROCK_PROVIDER, DRYRUN_PROVIDER, GROQ_PROVIDER,
};
use medenhance_engine::{decode_base64_image, AnalysisChain, AnalysisConfig, EnhancementPipeline};
use rayon::prelude::*;
use serde_json::{json, Map, Value};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "medenhance",
    version,
    about = "Modality-aware medical image enhancement"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Enhance one image (or run analysis only) and write a result record.
    Enhance(EnhanceArgs),
    /// Enhance every image in a directory with a worker pool.
    Batch(BatchArgs),
    /// Print every modality profile.
    Profiles,
}

#[derive(Debug, Clone, Args)]
struct AnalysisArgs {
    /// Skip AI analysis entirely.
    #[arg(long)]
    no_ai: bool,
    /// Require an embedded JSON structure in provider replies.
    #[arg(long)]
    structured: bool,
    /// Provider order, e.g. `groq,bedrock` or `dryrun`.
    #[arg(long, value_delimiter = ',')]
    providers: Vec<String>,
    /// Per-provider timeout; overrides MEDENHANCE_PROVIDER_TIMEOUT_SECS.
    #[arg(long)]
    timeout_secs: Option<f64>,
}

impl AnalysisArgs {
    fn options(&self) -> EnhancementOptions {
        EnhancementOptions {
            use_ai_analysis: !self.no_ai,
            expect_structured: self.structured,
        }
    }
}

#[derive(Debug, Parser)]
struct EnhanceArgs {
    #[arg(long)]
    image: Option<PathBuf>,
    #[arg(long)]
    modality: Option<String>,
    #[arg(long)]
    patient_id: String,
    #[arg(long)]
    patient_name: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    /// The image file holds a base64 (or data URL) payload.
    #[arg(long)]
    base64: bool,
    #[command(flatten)]
    analysis: AnalysisArgs,
}

#[derive(Debug, Parser)]
struct BatchArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    modality: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long, default_value_t = 4)]
    workers: usize,
    #[arg(long, default_value = "Unknown patient")]
    patient_name: String,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    analysis: AnalysisArgs,
}

const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("medenhance error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Enhance(args) => run_enhance(args),
        Command::Batch(args) => run_batch(args),
        Command::Profiles => {
            print_profiles();
            Ok(0)
        }
    }
}

fn build_pipeline(args: &AnalysisArgs, events: EventWriter) -> Result<EnhancementPipeline> {
    let mut config = AnalysisConfig::from_env();
    if let Some(secs) = args.timeout_secs {
        if !secs.is_finite() || secs <= 0.0 {
            bail!("--timeout-secs must be a positive number of seconds, got {secs}");
        }
        config = config.with_timeout(Duration::from_secs_f64(secs));
    }

    let chain = if args.providers.is_empty() {
        AnalysisChain::from_config(&config)
    } else {
        let known = ProviderRegistry::new(
            [GROQ_PROVIDER, BEDROCK_PROVIDER, DRYRUN_PROVIDER]
                .into_iter()
                .filter_map(|name| provider_by_name(name, &config))
                .collect(),
        );
        let requested: Vec<String> = args
            .providers
            .iter()
            .map(|name| name.trim().to_ascii_lowercase())
            .collect();
        let (providers, unknown) = known.reordered(&requested);
        if !unknown.is_empty() {
            bail!(
                "unknown provider '{}' (expected groq, bedrock or dryrun)",
                unknown.join("', '")
            );
        }
        AnalysisChain::new(providers, config.timeout)
    };
    Ok(EnhancementPipeline::new(chain).with_events(events))
}

fn run_enhance(args: EnhanceArgs) -> Result<i32> {
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed creating {}", args.out.display()))?;
    let session_id = Uuid::new_v4().to_string();
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let events = EventWriter::new(events_path, session_id);
    let pipeline = build_pipeline(&args.analysis, events.clone())?;
    if request_uses_ai(&args.analysis) {
        println!("Providers: {}", describe_chain(&pipeline));
    }

    let mut request = EnhancementRequest::new(args.patient_id.clone(), args.patient_name.clone())
        .with_options(args.analysis.options());
    if let Some(modality) = args.modality.clone() {
        request = request.with_modality(modality);
    }
    if let Some(path) = args.image.as_deref() {
        request = request.with_image(read_image(path, args.base64)?);
    }

    let result = pipeline.enhance(&request)?;
    let stamp = file_stamp(result.generated_at());
    let image_path = match result.enhanced_image_bytes() {
        Some(bytes) => {
            let path = args.out.join(enhanced_file_name(&result, &stamp));
            fs::write(&path, bytes)
                .with_context(|| format!("failed writing {}", path.display()))?;
            Some(path)
        }
        None => None,
    };

    let record_path = args.out.join("result.json");
    write_record(
        &record_path,
        &build_record(&request, &result, image_path.as_deref()),
    )?;
    print_result(&result, image_path.as_deref(), &record_path);
    if let Some(path) = events.path() {
        println!("Events: {}", path.display());
    }
    Ok(0)
}

fn request_uses_ai(args: &AnalysisArgs) -> bool {
    args.options().use_ai_analysis
}

/// Provider priority and per-provider timeout, e.g. `groq -> bedrock (timeout 30s)`.
fn describe_chain(pipeline: &EnhancementPipeline) -> String {
    let chain = pipeline.analysis();
    let order = if chain.providers().is_empty() {
        "none configured".to_string()
    } else {
        chain.providers().priority().join(" -> ")
    };
    format!("{order} (timeout {}s)", chain.timeout().as_secs_f64())
}

fn read_image(path: &Path, base64: bool) -> Result<Vec<u8>> {
    if !base64 {
        return fs::read(path).with_context(|| format!("failed reading {}", path.display()));
    }
    let payload = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    let bytes = decode_base64_image(&payload)
        .with_context(|| format!("{} is not a base64 image payload", path.display()))?;
    Ok(bytes)
}

/// Passed-through originals keep a neutral extension; they may not be PNG.
fn enhanced_file_name(result: &EnhancementResult, stem: &str) -> String {
    let slug = result.modality().slug();
    if result.metrics().source == MetricsSource::DecodeFallback {
        format!("original-{slug}-{stem}.bin")
    } else {
        format!("enhanced-{slug}-{stem}.png")
    }
}

fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

fn print_result(result: &EnhancementResult, image_path: Option<&Path>, record_path: &Path) {
    let metrics = result.metrics();
    println!("Modality: {}", result.modality());
    if result.applied_steps().is_empty() {
        println!("Applied chain: none");
    } else {
        println!("Applied chain: {}", result.applied_steps().join(" -> "));
    }
    println!(
        "Metrics ({}): PSNR {:.2} dB, SSIM {:.4}, contrast +{}%, sharpness +{}%",
        source_label(metrics.source),
        metrics.psnr,
        metrics.ssim,
        metrics.contrast_improvement_percent,
        metrics.sharpness_improvement_percent
    );
    if let Some(analysis) = result.analysis() {
        let status = if analysis.succeeded { "ok" } else { "degraded" };
        println!("Analysis: {} ({status})", analysis.provider_name);
        if let Some(score) = analysis.quality_score() {
            println!("Quality score: {score}/100");
        }
        for recommendation in analysis.recommendations() {
            println!("  - {recommendation}");
        }
        println!("{}", analysis.raw_text.trim());
    }
    println!("Processing time: {} ms", result.processing_ms());
    for warning in result.warnings() {
        eprintln!("warning: {warning}");
    }
    if let Some(path) = image_path {
        println!("Image: {}", path.display());
    }
    println!("Record: {}", record_path.display());
}

fn source_label(source: MetricsSource) -> &'static str {
    match source {
        MetricsSource::Computed => "computed",
        MetricsSource::Nominal => "nominal",
        MetricsSource::DecodeFallback => "decode fallback",
    }
}

fn print_profiles() {
    for profile in ProfileRegistry::global().list() {
        let nominal = &profile.nominal;
        println!("{} ({})", profile.tag, profile.name);
        println!("  {}", profile.description);
        println!("  chain: {}", profile.chain_text());
        println!(
            "  nominal: PSNR {} dB, SSIM {}, contrast +{}%, sharpness +{}%",
            nominal.psnr,
            nominal.ssim,
            nominal.contrast_improvement_percent,
            nominal.sharpness_improvement_percent
        );
    }
}

fn run_batch(args: BatchArgs) -> Result<i32> {
    let inputs = collect_inputs(&args.input)?;
    if inputs.is_empty() {
        bail!("no image files found in {}", args.input.display());
    }
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed creating {}", args.out.display()))?;

    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let events = EventWriter::new(events_path, Uuid::new_v4().to_string());
    let pipeline = build_pipeline(&args.analysis, events.clone())?;
    let workers = args.workers.clamp(1, inputs.len());
    if request_uses_ai(&args.analysis) {
        println!("Providers: {}", describe_chain(&pipeline));
    }

    let started = Instant::now();
    let started_at = now_utc_iso();
    events.note(
        "batch_started",
        json_object(json!({
            "input_dir": args.input.to_string_lossy(),
            "modality": args.modality,
            "images": inputs.len(),
            "workers": workers,
        })),
    );

    let items = run_worker_pool(&pipeline, &inputs, &args, workers)?;
    for item in &items {
        print_batch_item(item);
    }

    let summary = BatchSummary {
        session_id: events.session_id().to_string(),
        started_at,
        finished_at: now_utc_iso(),
        items,
    };
    let failed = summary.count(BatchItemStatus::Failed);
    events.note(
        "batch_finished",
        json_object(json!({
            "images": summary.items.len(),
            "enhanced": summary.count(BatchItemStatus::Enhanced),
            "degraded": summary.count(BatchItemStatus::Degraded),
            "failed": failed,
            "elapsed_ms": started.elapsed().as_millis() as u64,
        })),
    );

    let mut extra = Map::new();
    extra.insert("modality".to_string(), Value::String(args.modality.clone()));
    extra.insert("workers".to_string(), json!(workers));
    extra.insert(
        "input_dir".to_string(),
        Value::String(args.input.to_string_lossy().to_string()),
    );
    let summary_path = args.out.join("summary.json");
    write_summary(&summary_path, &summary, Some(&extra))?;

    println!(
        "Batch finished: {} enhanced, {} degraded, {} failed",
        summary.count(BatchItemStatus::Enhanced),
        summary.count(BatchItemStatus::Degraded),
        failed
    );
    println!("Summary: {}", summary_path.display());
    Ok(if failed > 0 { 2 } else { 0 })
}

/// Runs every input on a dedicated pool of `workers` threads; items come
/// back in input order.
fn run_worker_pool(
    pipeline: &EnhancementPipeline,
    inputs: &[PathBuf],
    args: &BatchArgs,
    workers: usize,
) -> Result<Vec<BatchItem>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("failed to build the batch worker pool")?;
    let items = pool.install(|| {
        inputs
            .par_iter()
            .enumerate()
            .map(|(index, path)| {
                enhance_batch_item(pipeline, path, index, args).unwrap_or_else(|err| BatchItem {
                    input: path.to_string_lossy().to_string(),
                    status: BatchItemStatus::Failed,
                    record: None,
                    detail: Some(format!("{err:#}")),
                    quality_score: None,
                    processing_ms: 0,
                })
            })
            .collect::<Vec<BatchItem>>()
    });
    Ok(items)
}

fn print_batch_item(item: &BatchItem) {
    let status = match item.status {
        BatchItemStatus::Enhanced => "enhanced",
        BatchItemStatus::Degraded => "degraded",
        BatchItemStatus::Failed => "failed",
    };
    let score = item
        .quality_score
        .map(|score| format!(", quality {score}/100"))
        .unwrap_or_default();
    println!("  {} [{status}] {} ms{score}", item.input, item.processing_ms);
}

fn enhance_batch_item(
    pipeline: &EnhancementPipeline,
    path: &Path,
    index: usize,
    args: &BatchArgs,
) -> Result<BatchItem> {
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image")
        .to_string();
    let request = EnhancementRequest::new(stem.clone(), args.patient_name.clone())
        .with_modality(args.modality.clone())
        .with_image(read_image(path, false)?)
        .with_options(args.analysis.options());
    let result = pipeline.enhance(&request)?;

    let prefix = format!("{index:04}-{stem}");
    let image_path = match result.enhanced_image_bytes() {
        Some(bytes) => {
            let image_path = args
                .out
                .join("images")
                .join(enhanced_file_name(&result, &prefix));
            if let Some(parent) = image_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&image_path, bytes)
                .with_context(|| format!("failed writing {}", image_path.display()))?;
            Some(image_path)
        }
        None => None,
    };
    let record_path = args.out.join("records").join(format!("{prefix}.json"));
    write_record(
        &record_path,
        &build_record(&request, &result, image_path.as_deref()),
    )?;

    let status = if result.is_degraded() {
        BatchItemStatus::Degraded
    } else {
        BatchItemStatus::Enhanced
    };
    let detail = (!result.warnings().is_empty()).then(|| result.warnings().join("; "));
    Ok(BatchItem {
        input: path.to_string_lossy().to_string(),
        status,
        record: Some(record_path.to_string_lossy().to_string()),
        detail,
        quality_score: result.analysis().and_then(|analysis| analysis.quality_score()),
        processing_ms: result.processing_ms(),
    })
}

fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed reading {}", dir.display()))? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_image {
            inputs.push(path);
        }
    }
    inputs.sort();
    Ok(inputs)
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn json_object(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;

    use clap::Parser;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma};
    use medenhance_contracts::events::EventWriter;
    use medenhance_contracts::metrics::MetricsSource;
    use medenhance_contracts::runs::records::load_record;
    use medenhance_contracts::runs::summary::BatchItemStatus;
    use serde_json::Value;

    use super::{
        build_pipeline, collect_inputs, describe_chain, file_stamp, run_batch, run_enhance, Cli,
        Command,
    };

    fn gradient_png(width: u32, height: u32) -> anyhow::Result<Vec<u8>> {
        let image = DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
            Luma([((x * 7 + y * 13) % 256) as u8])
        }));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn parse(args: &[&str]) -> anyhow::Result<Command> {
        Ok(Cli::try_parse_from(args)?.command)
    }

    fn read_json(path: &Path) -> anyhow::Result<Value> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    #[test]
    fn enhance_flags_parse_with_provider_list() -> anyhow::Result<()> {
        let command = parse(&[
            "medenhance",
            "enhance",
            "--patient-id",
            "P-1",
            "--patient-name",
            "Jane Roe",
            "--out",
            "out",
            "--modality",
            "xray",
            "--providers",
            "bedrock,groq",
            "--timeout-secs",
            "2.5",
            "--structured",
        ])?;
        let Command::Enhance(args) = command else {
            anyhow::bail!("expected enhance command");
        };
        assert_eq!(args.analysis.providers, vec!["bedrock", "groq"]);
        assert_eq!(args.analysis.timeout_secs, Some(2.5));
        assert!(args.analysis.options().use_ai_analysis);
        assert!(args.analysis.options().expect_structured);
        assert_eq!(args.modality.as_deref(), Some("xray"));
        Ok(())
    }

    #[test]
    fn unknown_provider_and_bad_timeout_are_rejected() -> anyhow::Result<()> {
        let Command::Enhance(mut args) = parse(&[
            "medenhance",
            "enhance",
            "--patient-id",
            "P-1",
            "--patient-name",
            "Jane Roe",
            "--out",
            "out",
            "--providers",
            "openai",
        ])?
        else {
            anyhow::bail!("expected enhance command");
        };
        let err = build_pipeline(&args.analysis, EventWriter::disabled()).err();
        assert!(err
            .map(|err| err.to_string().contains("unknown provider 'openai'"))
            .unwrap_or(false));

        args.analysis.providers = vec!["dryrun".to_string()];
        args.analysis.timeout_secs = Some(0.0);
        assert!(build_pipeline(&args.analysis, EventWriter::disabled()).is_err());
        Ok(())
    }

    #[test]
    fn provider_flag_sets_chain_priority() -> anyhow::Result<()> {
        let Command::Enhance(args) = parse(&[
            "medenhance",
            "enhance",
            "--patient-id",
            "P-1",
            "--patient-name",
            "Jane Roe",
            "--out",
            "out",
            "--providers",
            "dryrun, bedrock",
            "--timeout-secs",
            "1.5",
        ])?
        else {
            anyhow::bail!("expected enhance command");
        };
        let pipeline = build_pipeline(&args.analysis, EventWriter::disabled())?;
        assert_eq!(
            pipeline.analysis().providers().priority(),
            vec!["dryrun", "bedrock"]
        );
        assert_eq!(pipeline.analysis().timeout().as_millis(), 1500);
        assert_eq!(describe_chain(&pipeline), "dryrun -> bedrock (timeout 1.5s)");
        Ok(())
    }

    #[test]
    fn enhance_writes_image_record_and_events() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let image_path = temp.path().join("scan.png");
        fs::write(&image_path, gradient_png(32, 32)?)?;
        let out = temp.path().join("out");
        let Command::Enhance(args) = parse(&[
            "medenhance",
            "enhance",
            "--image",
            &image_path.to_string_lossy(),
            "--modality",
            "ct",
            "--patient-id",
            "P-9",
            "--patient-name",
            "Sam Doe",
            "--out",
            &out.to_string_lossy(),
            "--providers",
            "dryrun",
        ])?
        else {
            anyhow::bail!("expected enhance command");
        };

        assert_eq!(run_enhance(args)?, 0);

        let record = load_record(&out.join("result.json"))?;
        assert_eq!(record.patient_id, "P-9");
        assert_eq!(record.metrics.source, MetricsSource::Computed);
        assert_eq!(
            record.analysis.map(|analysis| analysis.provider_name),
            Some("dryrun".to_string())
        );
        assert!(record.recommendations.is_empty());
        let stored = record
            .enhanced_image
            .and_then(|image| image.path)
            .ok_or_else(|| anyhow::anyhow!("record has no image path"))?;
        assert!(stored.contains("enhanced-ct-"));
        assert!(Path::new(&stored).exists());

        let events = fs::read_to_string(out.join("events.jsonl"))?;
        assert!(events.contains("\"type\":\"enhancement_finished\""));
        Ok(())
    }

    #[test]
    fn base64_image_payload_is_decoded() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let payload_path = temp.path().join("scan.b64");
        let payload = medenhance_engine::transport::png_data_url(&gradient_png(16, 16)?);
        fs::write(&payload_path, payload)?;
        let out = temp.path().join("out");
        let Command::Enhance(args) = parse(&[
            "medenhance",
            "enhance",
            "--image",
            &payload_path.to_string_lossy(),
            "--base64",
            "--modality",
            "mri",
            "--patient-id",
            "P-3",
            "--patient-name",
            "Kim Lo",
            "--out",
            &out.to_string_lossy(),
            "--no-ai",
        ])?
        else {
            anyhow::bail!("expected enhance command");
        };

        assert_eq!(run_enhance(args)?, 0);
        let record = load_record(&out.join("result.json"))?;
        assert_eq!(record.metrics.source, MetricsSource::Computed);
        assert!(record.analysis.is_none());
        Ok(())
    }

    #[test]
    fn batch_processes_every_image_and_writes_summary() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let input = temp.path().join("in");
        fs::create_dir_all(&input)?;
        for name in ["a.png", "b.png", "c.png"] {
            fs::write(input.join(name), gradient_png(20, 20)?)?;
        }
        fs::write(input.join("broken.png"), b"not really a png")?;
        fs::write(input.join("notes.txt"), b"ignored")?;
        let out = temp.path().join("out");
        let Command::Batch(args) = parse(&[
            "medenhance",
            "batch",
            "--input",
            &input.to_string_lossy(),
            "--modality",
            "ultrasound",
            "--out",
            &out.to_string_lossy(),
            "--workers",
            "3",
            "--no-ai",
        ])?
        else {
            anyhow::bail!("expected batch command");
        };

        assert_eq!(run_batch(args)?, 0);

        let summary = read_json(&out.join("summary.json"))?;
        assert_eq!(summary["total_requests"], 4);
        assert_eq!(summary["enhanced"], 3);
        assert_eq!(summary["degraded"], 1);
        assert_eq!(summary["failed"], 0);
        let items = summary["items"].as_array().cloned().unwrap_or_default();
        assert!(items[0]["input"].as_str().unwrap_or_default().ends_with("a.png"));
        assert!(items[3]["input"].as_str().unwrap_or_default().ends_with("c.png"));
        assert!(items[2]["input"].as_str().unwrap_or_default().ends_with("broken.png"));
        assert_eq!(items[2]["status"], "degraded");
        assert_eq!(items[1]["status"], "enhanced");
        assert!(items[1]["processing_ms"].as_u64().is_some());
        assert_eq!(items[1]["quality_score"], Value::Null);
        assert_eq!(
            fs::read_dir(out.join("records"))?.count(),
            4,
            "one record per input"
        );

        let events = fs::read_to_string(out.join("events.jsonl"))?;
        assert!(events.contains("\"type\":\"batch_started\""));
        assert!(events.contains("\"type\":\"batch_finished\""));
        Ok(())
    }

    #[test]
    fn collect_inputs_filters_and_sorts() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        for name in ["b.JPG", "a.png", "c.txt"] {
            fs::write(temp.path().join(name), b"x")?;
        }
        fs::create_dir_all(temp.path().join("d.png"))?;
        let names: Vec<String> = collect_inputs(temp.path())?
            .iter()
            .filter_map(|path| path.file_name().map(|name| name.to_string_lossy().to_string()))
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG"]);
        let status = BatchItemStatus::Enhanced;
        assert_eq!(serde_json::to_value(status)?, "enhanced");
        Ok(())
    }

    #[test]
    fn file_stamp_is_filesystem_safe() -> anyhow::Result<()> {
        let at = chrono::DateTime::parse_from_rfc3339("2026-03-04T05:06:07.089Z")?
            .with_timezone(&chrono::Utc);
        assert_eq!(file_stamp(at), "20260304T050607089Z");
        Ok(())
    }
}
