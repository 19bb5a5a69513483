use catalog_uploader::logging::{init_logging, LogOptions};
use catalog_uploader::{FileToUpload, UploadCoordinator, UploadError, UploaderConfig, UploadEvent};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

const USAGE: &str = "Usage: catalog-uploader [--json] [--log-file] <path | key=path>...";

struct Args {
    json: bool,
    log_file: bool,
    files: Vec<(String, String)>,
}

fn parse_args(args: &[String]) -> Result<Args, UploadError> {
    let mut parsed = Args {
        json: false,
        log_file: false,
        files: Vec::new(),
    };

    for arg in args {
        match arg.as_str() {
            "--json" => parsed.json = true,
            "--log-file" => parsed.log_file = true,
            "-h" | "--help" => return Err(UploadError::Config(USAGE.to_string())),
            other => {
                let (key, path) = match other.split_once('=') {
                    Some((key, path)) => (key.to_string(), path.to_string()),
                    None => (format!("file-{}", parsed.files.len() + 1), other.to_string()),
                };
                parsed.files.push((key, path));
            }
        }
    }

    if parsed.files.is_empty() {
        return Err(UploadError::Config(USAGE.to_string()));
    }
    Ok(parsed)
}

async fn run(args: Vec<String>) -> Result<(), UploadError> {
    let args = parse_args(&args)?;

    let mut options = if args.log_file {
        LogOptions::with_default_file()?
    } else {
        LogOptions::default()
    };
    options.json = args.json;
    let _guard = init_logging(options)?;

    let config = UploaderConfig::load()?;

    let mut files = Vec::with_capacity(args.files.len());
    for (key, path) in &args.files {
        files.push(FileToUpload::from_path(key.clone(), Path::new(path)).await?);
    }

    let coordinator = Arc::new(
        UploadCoordinator::from_config(config)?
            .on_success(|results| {
                for result in results {
                    println!("{}\t{}\t{}", result.key, result.filename, result.url);
                }
            })
            .on_error(|message| eprintln!("Error: {}", message)),
    );

    let mut events = coordinator.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(UploadEvent::Progress { key, percent, .. }) => eprintln!("{}: {}%", key, percent),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress printer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let canceller = coordinator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling uploads...");
            canceller.cancel_all();
        }
    });

    let outcome = coordinator.submit_batch(files).await;
    tracing::info!(outcome = ?outcome, "Done");
    println!("{}", serde_json::to_string(&outcome).unwrap_or_default());

    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if let Err(e) = run(args).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
