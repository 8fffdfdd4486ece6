use std::error::Error;
use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::bytes::{copy_exactly, copy_to_clipboard, readable_size};
use crate::error::RelayError;
use crate::networking::{establish_connection, request_send, wait_for_receiver};
use crate::utils::FileSendRequest;

/// Function handler to kickoff sender logic:
///     - Open the file and read its size and name
///     - Connect to the relay and complete the handshake
///     - Register the file under `share_code` (or a relay-generated code)
///     - Wait until a receiver is ready
///     - Stream exactly the announced number of bytes
pub async fn run(relay_addr: &str, file_path: &str, share_code: Option<String>) -> Result<(), Box<dyn Error>> {
    let path = Path::new(file_path);
    let mut file = File::open(path)
        .await
        .map_err(|e| format!("Error opening file {}: {}", file_path, e))?;

    let file_metadata = file.metadata().await?;
    if !file_metadata.is_file() {
        return Err(format!("{} is not a regular file", file_path).into());
    }
    let filesize = file_metadata.len();
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| format!("Can't tell the file name of {}", file_path))?;
    debug!("File {}: {} bytes", filename, filesize);

    let mut stream = establish_connection(relay_addr).await?;

    let request = FileSendRequest {
        share_code: share_code.unwrap_or_default(),
        filename,
        filesize,
    };
    let response = request_send(&mut stream, &request).await.map_err(|e| match e {
        RelayError::ShareCodeUnavailable(_) => {
            "Share code is unavailable, use another or omit it for a random code".to_string()
        }
        other => format!("Error during send file request: {}", other),
    })?;

    if copy_to_clipboard(&response.share_code) {
        eprintln!("Share code (copied to clipboard): \x1b[4m\x1b[1m{}\x1b[0m", response.share_code);
    } else {
        eprintln!("Share code: \x1b[4m\x1b[1m{}\x1b[0m", response.share_code);
    }
    eprintln!("On the other machine run:\n  bullet recv {}", response.share_code);

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!(
        "Sending {:?} ({}), waiting for receiver...",
        request.filename,
        readable_size(filesize)
    ));
    wait_for_receiver(&mut stream)
        .await
        .map_err(|e| format!("Error waiting for receiver: {}", e))?;
    spinner.finish_with_message("Receiver connected");

    let bar = ProgressBar::new(filesize);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let sent = copy_exactly(&mut stream, &mut file, filesize, |n| bar.inc(n))
        .await
        .map_err(|e| match e {
            RelayError::ShortTransfer { copied, expected } => {
                format!("Couldn't send whole file, sent ({}/{}) bytes", copied, expected)
            }
            other => format!("Error sending file: {}", other),
        })?;
    bar.finish();

    let _ = stream.shutdown().await;
    eprintln!("Sent {} bytes of data!", sent);
    Ok(())
}
