//! Pseudo-terminal allocation

use crate::result::ExpectError;
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use nix::pty::{openpty, OpenptyResult};
use nix::unistd::ttyname;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};

/// Both ends of one freshly allocated pseudo-terminal.
///
/// The controller side is what a driver reads and writes; the worker side
/// looks like a real terminal to whatever program is attached to it. Each
/// call to [`PtyPair::open`] allocates a new device. Both descriptors close
/// when the pair is dropped.
#[derive(Debug)]
pub struct PtyPair {
    controller: OwnedFd,
    worker: OwnedFd,
    worker_path: PathBuf,
}

impl PtyPair {
    /// Allocate a new pseudo-terminal pair.
    ///
    /// Both descriptors are close-on-exec, so programs spawned elsewhere in
    /// the process never inherit them.
    ///
    /// # Errors
    ///
    /// Returns `ExpectError::ResourceExhausted` if the OS cannot allocate a
    /// pseudo-terminal, and an I/O error if the worker's device path cannot
    /// be resolved.
    pub fn open() -> Result<Self, ExpectError> {
        let OpenptyResult { master, slave } =
            openpty(None, None).map_err(ExpectError::ResourceExhausted)?;
        for fd in [&master, &slave] {
            fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
        }
        let worker_path = ttyname(&slave)?;

        tracing::debug!(path = %worker_path.display(), "allocated pseudo-terminal");

        Ok(Self {
            controller: master,
            worker: slave,
            worker_path,
        })
    }

    /// Filesystem path of the worker device, e.g. `/dev/pts/7`.
    pub fn worker_path(&self) -> &Path {
        &self.worker_path
    }

    /// The controller descriptor.
    pub fn controller(&self) -> BorrowedFd<'_> {
        self.controller.as_fd()
    }

    /// The worker descriptor.
    pub fn worker(&self) -> BorrowedFd<'_> {
        self.worker.as_fd()
    }

    /// Split the pair into `(controller, worker, worker_path)`.
    pub fn into_parts(self) -> (OwnedFd, OwnedFd, PathBuf) {
        (self.controller, self.worker, self.worker_path)
    }
}
