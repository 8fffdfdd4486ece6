use std::io::{self, Write};
use std::path::{Path, PathBuf};

use arboard::Clipboard;
use log::debug;
use rand::Rng;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use crate::error::RelayError;
use crate::{CHUNK_SIZE, SHARE_CODE_ALPHABET, SHARE_CODE_LEN};

/// Where a received file ends up: a file on disk or standard output.
pub type DataSink = Box<dyn AsyncWrite + Unpin + Send>;

/// Name used when the sender's filename has no usable final component.
const FALLBACK_FILENAME: &str = "bullet-download";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

/// Generates a random share code from the fixed alphabet.
///
/// Cheap enough to call in a loop until an unused code turns up.
pub fn generate_share_code() -> String {
    let mut rng = rand::rng();

    (0..SHARE_CODE_LEN)
        .map(|_| SHARE_CODE_ALPHABET[rng.random_range(0..SHARE_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Best effort: headless machines and CI have no clipboard.
pub fn copy_to_clipboard(text: &str) -> bool {
    match Clipboard::new() {
        Ok(mut clipboard) => clipboard.set_text(text.to_string()).is_ok(),
        Err(e) => {
            debug!("Clipboard unavailable: {}", e);
            false
        }
    }
}

/// Copies exactly `n` bytes from `src` to `dst`.
///
/// Never reports success with fewer than `n` bytes: if `src` hits EOF first
/// the result is [`RelayError::ShortTransfer`] carrying how far it got. The
/// first I/O error from either side is returned as is.
pub async fn relay_exactly<W, R>(dst: &mut W, src: &mut R, n: u64) -> Result<u64, RelayError>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    copy_exactly(dst, src, n, |_| {}).await
}

/// [`relay_exactly`] with a callback fed the size of every chunk written.
pub async fn copy_exactly<W, R, F>(
    dst: &mut W,
    src: &mut R,
    n: u64,
    mut on_progress: F,
) -> Result<u64, RelayError>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
    F: FnMut(u64),
{
    let mut buffer = vec![0u8; n.min(CHUNK_SIZE as u64) as usize];
    let mut copied: u64 = 0;

    while copied < n {
        let want = (n - copied).min(buffer.len() as u64) as usize;
        let read = src.read(&mut buffer[..want]).await?;
        if read == 0 {
            // hand over what did arrive before reporting the gap
            let _ = dst.flush().await;
            return Err(RelayError::ShortTransfer { copied, expected: n });
        }

        dst.write_all(&buffer[..read]).await?;
        copied += read as u64;
        on_progress(read as u64);
    }

    dst.flush().await?;
    Ok(copied)
}

/// Formats a byte count with decimal prefixes: `999 B`, `1.5kB`, `2.0MB`.
pub fn readable_size(bytes: u64) -> String {
    const UNIT: u64 = 1000;
    const PREFIXES: [char; 6] = ['k', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{} B", bytes);
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1}{}B", bytes as f64 / div as f64, PREFIXES[exp])
}

/// Picks the output for a received file.
///
/// An explicit `-o` wins (`-` meaning stdout). Otherwise the sender's
/// filename is used, reduced to its last component so a sender cannot
/// steer the write outside the working directory.
pub fn resolve_output(requested: Option<&str>, sender_filename: &str) -> OutputTarget {
    match requested {
        Some("-") => OutputTarget::Stdout,
        Some(path) => OutputTarget::File(PathBuf::from(path)),
        None => {
            let name = Path::new(sender_filename)
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(FALLBACK_FILENAME));
            OutputTarget::File(name)
        }
    }
}

/// Creates (or truncates) the output and wraps it for streaming writes.
pub async fn create_output_sink(target: &OutputTarget) -> io::Result<DataSink> {
    match target {
        OutputTarget::Stdout => Ok(Box::new(tokio::io::stdout())),
        OutputTarget::File(path) => {
            let file = tokio::fs::File::create(path).await?;
            Ok(Box::new(BufWriter::new(file)))
        }
    }
}

/// Asks on the terminal whether `path` may be overwritten. Anything but
/// `n`/`N` counts as yes.
pub async fn confirm_overwrite(path: &Path) -> io::Result<bool> {
    let prompt = format!("{:?} already exists, overwrite? (Y/n): ", path);

    tokio::task::spawn_blocking(move || -> io::Result<bool> {
        eprint!("{}", prompt);
        io::stderr().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(!input.trim().eq_ignore_ascii_case("n"))
    })
    .await
    .map_err(io::Error::other)?
}
