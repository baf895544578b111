//! `tusup upload` - send one file to a tus endpoint

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};

use tusup_client::{
    HttpTransport, Transport, UploadConfig, UploadError, parse_headers, upload_file,
};
use tusup_core::{ByteSize, ProgressContext};
use tusup_store::{Store, StoreKind};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// tus creation endpoint
    #[arg(long)]
    pub url: String,

    /// File to upload
    #[arg(short, long)]
    pub input: PathBuf,

    /// Resume store file (default from config)
    #[arg(long)]
    pub store_path: Option<PathBuf>,

    /// Resume store backend: none, auto, kv, json or sqlite
    #[arg(long)]
    pub store_type: Option<StoreKind>,

    /// Always create a new upload; never read or write the store
    #[arg(long)]
    pub disable_resume: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Extra request header, `Name: Value` (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Chunk size with optional IEC suffix (e.g. 512Ki, 10Mi)
    #[arg(long)]
    pub chunk_size: Option<ByteSize>,
}

/// Exit code for an upload stopped by SIGINT/SIGTERM
const EXIT_CANCELLED: u8 = 130;

pub fn run(args: UploadArgs, config: &Config, progress: &ProgressContext) -> Result<ExitCode> {
    let upload_config = UploadConfig {
        chunk_size: args.chunk_size.unwrap_or(config.upload.chunk_size).bytes(),
        min_chunk_size: config.upload.min_chunk_size.bytes(),
        resume: !args.disable_resume,
        headers: parse_headers(config.upload.headers.iter().chain(&args.headers))?,
    };
    upload_config.validate()?;

    tusup_core::install_signal_handlers().context("Failed to install signal handlers")?;

    let transport = HttpTransport::new(upload_config.headers.clone());
    run_with(&args, &upload_config, &transport, config, progress)
}

/// Open the store, upload, and close the store again whatever happened.
fn run_with<T>(
    args: &UploadArgs,
    upload_config: &UploadConfig,
    transport: &T,
    config: &Config,
    progress: &ProgressContext,
) -> Result<ExitCode>
where
    T: Transport + ?Sized,
{
    let kind = if args.disable_resume {
        StoreKind::None
    } else {
        args.store_type.unwrap_or(config.store.kind)
    };
    let store_path = args
        .store_path
        .clone()
        .unwrap_or_else(|| config.store.path_or_default());
    let store = kind
        .open(&store_path)
        .with_context(|| format!("Failed to open {kind} store at {}", store_path.display()))?;
    if store.is_some() {
        info!("Resume store: {kind} at {}", store_path.display());
    }

    let result = send(args, upload_config, transport, store.as_deref(), progress);

    // close on every path; a failed upload still has a resume entry to keep
    if let Some(store) = store {
        if let Err(e) = store.close() {
            warn!("Failed to close resume store: {e:#}");
        }
    }

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(UploadError::Cancelled { offset, total }) => {
            warn!("Cancelled at {offset} of {total} bytes; run again to resume");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(e) if e.is_resumable() && kind != StoreKind::None => {
            Err(anyhow::Error::new(e).context("Upload incomplete; run again to resume"))
        }
        Err(e) => Err(anyhow::Error::new(e).context("Upload incomplete")),
    }
}

fn send<T>(
    args: &UploadArgs,
    config: &UploadConfig,
    transport: &T,
    store: Option<&dyn Store>,
    progress: &ProgressContext,
) -> Result<(), UploadError>
where
    T: Transport + ?Sized,
{
    let mut bar = progress.upload_bar(&display_name(&args.input), 0);

    let result = upload_file(
        &args.url,
        &args.input,
        config,
        transport,
        store,
        &mut bar,
        tusup_core::cancel_flag(),
    );

    match result {
        Ok(summary) => {
            match summary.resumed_from {
                Some(offset) => info!(
                    "Uploaded {} ({} bytes, resumed at {offset}, {} chunks)",
                    args.input.display(),
                    summary.total_size,
                    summary.chunks_sent
                ),
                None => info!(
                    "Uploaded {} ({} bytes, {} chunks)",
                    args.input.display(),
                    summary.total_size,
                    summary.chunks_sent
                ),
            }
            println!("{}", summary.location);
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            Err(e)
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tusup_client::protocol::{Metadata, RemoteStatus};
    use tusup_client::ProtocolError;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: UploadArgs,
    }

    #[test]
    fn parses_flags() {
        let w = Wrapper::try_parse_from([
            "tusup",
            "--url",
            "https://host/files/",
            "-i",
            "a.bin",
            "--chunk-size",
            "10Mi",
            "--store-type",
            "json",
            "-H",
            "Authorization: Bearer x",
            "-H",
            "X-Trace: 1",
        ])
        .unwrap();
        assert_eq!(w.args.chunk_size, Some(ByteSize::new(10 * 1024 * 1024)));
        assert_eq!(w.args.store_type, Some(StoreKind::Json));
        assert_eq!(w.args.headers.len(), 2);
        assert!(!w.args.disable_resume);
    }

    #[test]
    fn rejects_bad_chunk_size() {
        assert!(
            Wrapper::try_parse_from(["tusup", "--url", "u", "-i", "a", "--chunk-size", "10MB"])
                .is_err()
        );
    }

    #[test]
    fn reserved_header_fails_before_network() {
        let args = Wrapper::try_parse_from([
            "tusup",
            "--url",
            "http://127.0.0.1:9/files/",
            "-i",
            "missing.bin",
            "-H",
            "Upload-Offset: 0",
            "--disable-resume",
        ])
        .unwrap()
        .args;
        let err = run(args, &Config::default(), &ProgressContext::new(false)).unwrap_err();
        assert!(format!("{err:#}").contains("Upload-Offset"));
    }

    /// Creates uploads but fails every chunk with a server error.
    struct RejectingServer;

    impl Transport for RejectingServer {
        fn create(&self, url: &str, _: u64, _: &Metadata) -> Result<String, ProtocolError> {
            Ok(format!("{url}u1"))
        }

        fn status(&self, _: &str) -> Result<RemoteStatus, ProtocolError> {
            Err(ProtocolError::NotFound { status: 404 })
        }

        fn patch(&self, _: &str, _: u64, _: &[u8]) -> Result<u64, ProtocolError> {
            Err(ProtocolError::Http {
                status: Some(500),
                message: "Internal Server Error".into(),
            })
        }
    }

    #[test]
    fn failed_upload_still_closes_store_with_entry() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data.bin");
        std::fs::write(&input, vec![1u8; 100]).unwrap();
        let store_path = dir.path().join("resume.json");

        let args = Wrapper::try_parse_from([
            "tusup",
            "--url",
            "https://host/files/",
            "-i",
            input.to_str().unwrap(),
            "--store-type",
            "json",
            "--store-path",
            store_path.to_str().unwrap(),
        ])
        .unwrap()
        .args;
        let upload_config = UploadConfig::default();

        let err = run_with(
            &args,
            &upload_config,
            &RejectingServer,
            &Config::default(),
            &ProgressContext::new(false),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("run again to resume"));

        let doc: std::collections::BTreeMap<String, String> =
            serde_json::from_slice(&std::fs::read(&store_path).unwrap()).unwrap();
        let fp = tusup_client::fingerprint(&input).unwrap();
        assert_eq!(
            doc.get(&fp).map(String::as_str),
            Some("https://host/files/u1")
        );

        // the store was released and reopens cleanly
        let store = StoreKind::Json.open(&store_path).unwrap().unwrap();
        assert_eq!(store.get(&fp).as_deref(), Some("https://host/files/u1"));
        store.close().unwrap();
    }

    #[test]
    fn failed_upload_releases_kv_store() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("data.bin");
        std::fs::write(&input, vec![1u8; 10]).unwrap();
        let store_path = dir.path().join("resume.redb");

        let args = Wrapper::try_parse_from([
            "tusup",
            "--url",
            "https://host/files/",
            "-i",
            input.to_str().unwrap(),
            "--store-path",
            store_path.to_str().unwrap(),
            "--store-type",
            "auto",
        ])
        .unwrap()
        .args;

        assert!(
            run_with(
                &args,
                &UploadConfig::default(),
                &RejectingServer,
                &Config::default(),
                &ProgressContext::new(false),
            )
            .is_err()
        );

        // redb refuses a second open while a handle is still live
        let store = StoreKind::Kv.open(&store_path).unwrap().unwrap();
        assert_eq!(store.entries().unwrap().len(), 1);
        store.close().unwrap();
    }

    #[test]
    fn display_name_is_file_name() {
        assert_eq!(display_name(Path::new("/data/report.pdf")), "report.pdf");
    }
}
