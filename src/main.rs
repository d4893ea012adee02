use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use bili_downloader_lib::downloader::{
    ChannelReporter, DownloadOptions, DownloadOutcome, DownloadTarget, NetworkConfig, Pipeline,
    QualityTier,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;

/// Download a bilibili video at the chosen quality
#[derive(Debug, Parser)]
#[command(name = "bili-downloader", version)]
struct Args {
    /// Video page link, e.g. https://www.bilibili.com/video/BV1xx411c7mD
    url: String,

    /// 360P, 480P, 720P, 1080P, 1080P+, 1080P60 or a raw qn code [default: 1080P]
    #[arg(short, long)]
    quality: Option<QualityTier>,

    /// Output file (defaults to <id>.mp4 in the download directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// HTTP or SOCKS5 proxy URL
    #[arg(long)]
    proxy: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(reason) = e.rejection() {
                eprintln!("Hint: {}", reason.description());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, bili_downloader_lib::DownloadError> {
    let mut config = NetworkConfig::from_env();
    if args.proxy.is_some() {
        config = config.with_proxy(args.proxy);
    }
    if let Some(secs) = args.timeout {
        config = config.with_timeout(secs);
    }

    let mut options = DownloadOptions::default();
    if let Some(quality) = args.quality {
        options.quality = quality;
    }

    let pipeline = Pipeline::new(config)?;
    let resolution = pipeline.resolve(&args.url, options.quality).await?;

    if let Some(title) = &resolution.metadata.title {
        eprintln!("{}", title);
    }
    if resolution.stream.is_substituted() {
        eprintln!(
            "{} is not available, downloading {} instead",
            resolution.stream.requested_tier, resolution.stream.selected_tier
        );
    }

    let path = args
        .output
        .unwrap_or_else(|| options.output_path_for(&resolution.metadata.content_id));
    let target = DownloadTarget::create(&path).await?;

    let (reporter, mut events) = ChannelReporter::channel();
    let cancel = CancellationToken::new();
    let handle = pipeline.start_download(resolution.stream, target, Arc::new(reporter), cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(progress) = events.recv().await {
            match progress.total_bytes {
                Some(total) => eprint!(
                    "\rDownloading: {:>3}% ({}/{} bytes)",
                    progress.percent_complete, progress.bytes_transferred, total
                ),
                None => eprint!("\rDownloading: {} bytes", progress.bytes_transferred),
            }
        }
        eprintln!();
    });

    let outcome = handle.wait().await;
    // Reporter is dropped with the task, which closes the channel
    let _ = printer.await;

    match outcome? {
        DownloadOutcome::Completed(result) => {
            eprintln!(
                "Saved {} ({} bytes, {})",
                result.destination, result.bytes_written, result.selected_tier
            );
            Ok(ExitCode::SUCCESS)
        }
        DownloadOutcome::Cancelled {
            bytes_written,
            destination,
        } => {
            eprintln!(
                "Cancelled after {} bytes; partial file left at {}",
                bytes_written, destination
            );
            Ok(ExitCode::from(130))
        }
    }
}
