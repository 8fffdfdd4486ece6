use std::error::Error;

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use tokio::io::AsyncWriteExt;

use crate::bytes::{confirm_overwrite, copy_exactly, create_output_sink, readable_size, resolve_output, OutputTarget};
use crate::error::RelayError;
use crate::networking::{establish_connection, request_receive, signal_ready};

/// Options for the `recv` command.
#[derive(Debug, Clone, Default)]
pub struct ReceiveOptions {
    /// Where to write the file; `-` for stdout, `None` for the sender's filename.
    pub output: Option<String>,
    /// Overwrite an existing output file without asking.
    pub assume_yes: bool,
}

pub async fn run(relay_addr: &str, share_code: &str, options: ReceiveOptions) -> Result<(), Box<dyn Error>> {
    debug!("Starting receive command for share code {}", share_code);
    let mut stream = establish_connection(relay_addr).await?;

    let metadata = request_receive(&mut stream, share_code).await.map_err(|e| match e {
        RelayError::ShareCodeNotFound(code) => format!("Share code {:?} not found!", code),
        other => format!("Error during recv file request: {}", other),
    })?;
    eprintln!(
        "Detected sender's file: {:?} ({})",
        metadata.filename,
        readable_size(metadata.filesize)
    );

    let target = resolve_output(options.output.as_deref(), &metadata.filename);
    if let OutputTarget::File(path) = &target {
        if path.exists() && !options.assume_yes && !confirm_overwrite(path).await? {
            eprintln!("Closing connection...");
            return Ok(());
        }
    }
    let mut sink = create_output_sink(&target)
        .await
        .map_err(|e| format!("Error opening {:?} for writing: {}", target, e))?;

    // Only now tell the relay to start the sender
    signal_ready(&mut stream).await?;

    let bar = ProgressBar::new(metadata.filesize);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let received = copy_exactly(&mut sink, &mut stream, metadata.filesize, |n| bar.inc(n))
        .await
        .map_err(|e| match e {
            RelayError::ShortTransfer { copied, expected } => {
                format!("Didn't receive whole file, got ({}/{}) bytes", copied, expected)
            }
            other => format!("Error receiving file: {}", other),
        })?;
    sink.shutdown().await?;
    bar.finish();

    match target {
        OutputTarget::File(path) => eprintln!("Received {} bytes of data at {:?}.", received, path),
        OutputTarget::Stdout => eprintln!("Received {} bytes of data.", received),
    }
    Ok(())
}
