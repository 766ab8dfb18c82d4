// src/exec/input.rs

//! Standard input plumbing.
//!
//! - [`InputPipe`] is the pipe every child gets as its stdin. It lives for
//!   the whole run; only the read end is handed (duplicated) to each child.
//! - [`spawn_stdin_reader`] turns the supervisor's own stdin into a stream
//!   of chunks the runtime can select on; [`spawn_input_reader`] does the
//!   same for any async reader.

use std::fs::File;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::process::Stdio;

use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::Result;

/// Size of a single forwarded chunk.
const CHUNK_SIZE: usize = 1024;

/// Unidirectional pipe feeding the supervised child's stdin.
#[derive(Debug)]
pub struct InputPipe {
    read: OwnedFd,
    write: File,
}

impl InputPipe {
    /// Allocate the pipe.
    ///
    /// Both ends are close-on-exec so that only the explicitly duplicated
    /// read end reaches a child. The write end is non-blocking: a child that
    /// does not drain its stdin must not stall the supervisor.
    pub fn new() -> Result<Self> {
        let (read, write) = nix::unistd::pipe()?;
        fcntl(read.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
        fcntl(write.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
        fcntl(write.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK))?;

        Ok(Self {
            read,
            write: File::from(write),
        })
    }

    /// A fresh `Stdio` for the next child, backed by the read end.
    pub fn child_stdin(&self) -> io::Result<Stdio> {
        Ok(Stdio::from(self.read.try_clone()?))
    }

    /// Write `data` into the pipe. A short or failed write loses data and is
    /// reported as a warning only.
    pub fn forward(&mut self, data: &[u8]) {
        match self.write.write(data) {
            Ok(n) if n == data.len() => {}
            Ok(n) => warn!(
                written = n,
                len = data.len(),
                "data lost during input forwarding"
            ),
            Err(e) => warn!(error = %e, len = data.len(), "data lost during input forwarding"),
        }
    }
}

/// Spawn a task copying the supervisor's stdin into a channel, chunk by
/// chunk.
pub fn spawn_stdin_reader() -> mpsc::Receiver<Vec<u8>> {
    spawn_input_reader(tokio::io::stdin())
}

/// Spawn a task copying `reader` into a channel, chunk by chunk.
///
/// The channel closes on EOF or on a read error.
pub fn spawn_input_reader<R>(mut reader: R) -> mpsc::Receiver<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Vec<u8>>(16);

    tokio::spawn(async move {
        let mut buf = [0u8; CHUNK_SIZE];

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    debug!("input reached EOF; forwarding stops");
                    break;
                }
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "reading input failed; forwarding stops");
                    break;
                }
            }
        }
    });

    rx
}
