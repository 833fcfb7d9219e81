use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ssh2::Channel;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::ImportError;
use crate::session::RemoteSession;

const SCP_FILE_MODE: i32 = 0o644;

/// Progress line for uploads; `{msg}` carries the final summary.
pub const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}";

/// Copy `local` to `remote` over SCP on the session's transport.
///
/// The SCP channel is closed before returning whether or not the copy
/// succeeded. The session itself stays open.
pub fn upload_file(
    session: &RemoteSession<'_>,
    local: &Path,
    remote: &str,
    show_progress: bool,
) -> Result<u64, ImportError> {
    let transfer_error = |source: anyhow::Error| ImportError::Transfer {
        local: local.display().to_string(),
        remote: remote.to_string(),
        source,
    };

    let sess = session.transport()?;
    let mut file = File::open(local)
        .with_context(|| format!("failed to open local file {}", local.display()))
        .map_err(transfer_error)?;
    let size = file
        .metadata()
        .context("failed to read local file metadata")
        .map_err(transfer_error)?
        .len();

    let mut channel = sess
        .scp_send(Path::new(remote), SCP_FILE_MODE, size, None)
        .with_context(|| format!("failed to create remote file {remote}"))
        .map_err(transfer_error)?;

    let pb = progress_bar(size, show_progress);
    let copied = copy_with_progress(&mut file, &mut channel, &pb);
    let released = release(&mut channel).context("failed to close scp channel");

    match copied {
        Ok(n) => {
            released.map_err(transfer_error)?;
            pb.finish_with_message(format!("Uploaded {} → {} ({} bytes)", local.display(), remote, n));
            Ok(n)
        }
        Err(e) => {
            pb.abandon();
            Err(transfer_error(e))
        }
    }
}

fn progress_bar(size: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(size);
    if let Ok(style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
        pb.set_style(style);
    }
    pb
}

/// Stream `src` into `dst`, advancing `pb` as bytes go out.
pub fn copy_with_progress<R: Read, W: Write>(src: &mut R, dst: &mut W, pb: &ProgressBar) -> Result<u64> {
    let mut buf = [0u8; 8192];
    let mut transferred = 0u64;

    loop {
        let n = src.read(&mut buf).context("failed to read local file")?;
        if n == 0 {
            break;
        }
        dst.write_all(&buf[..n]).context("failed to write to remote file")?;
        transferred += n as u64;
        pb.set_position(transferred);
    }
    dst.flush().context("failed to flush remote file")?;

    Ok(transferred)
}

// Every step runs even if an earlier one failed.
fn release(channel: &mut Channel) -> std::result::Result<(), ssh2::Error> {
    let eof = channel.send_eof().and_then(|_| channel.wait_eof());
    let closed = channel.close().and_then(|_| channel.wait_close());
    eof.and(closed)
}
