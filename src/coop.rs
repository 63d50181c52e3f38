// coop.rs: cooperation between instances through a named pipe
//
// FIFO path: $XDG_RUNTIME_DIR/<app>.fifo-<suffix>   (mode 0600, never removed)
//
// The first instance to start owns the read side and opens every URI written
// to it. Later instances find a reader present, write their URIs and exit
// without opening anything themselves.
//
// ── Wire format ───────────────────────────────────────────────────────────────
//
//   http://example.com\n
//
// UTF-8, one URI per line, no other framing, no response channel.
//
// ── Arbitration ───────────────────────────────────────────────────────────────
//
//   probe  open the FIFO write-only + non-blocking and do a zero-length write.
//          Failure means nobody is reading, so we become the listener. Two
//          instances starting at the same moment can both become listeners.
//   lock   take an exclusive flock on <fifo>.lock. The holder listens for its
//          whole lifetime; everybody else forwards.
//
// The role is decided once at startup and never re-probed.

use std::{
    fs::File,
    io::Write,
    os::unix::fs::FileTypeExt,
    path::{Path, PathBuf},
    time::Duration,
};

use rustix::{
    fs::{self as rfs, FileType, FlockOperation, Mode, OFlags},
    io::Errno,
};

use crate::fifo_source::FifoSource;

/// How often a lock-mode forwarder retries opening the FIFO while the lock
/// holder has not opened its read side yet.
const CONNECT_ATTEMPTS: u32 = 25;
const CONNECT_BACKOFF: Duration = Duration::from_millis(20);

// ── settings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Arbitration {
    #[default]
    Probe,
    Lock,
}

#[derive(Debug, Clone)]
pub struct CoopSettings {
    pub runtime_dir: PathBuf,
    pub app_name: String,
    /// Selects an independent cooperation group. Empty behaves like `None`.
    pub suffix: Option<String>,
    pub arbitration: Arbitration,
}

impl CoopSettings {
    pub fn fifo_path(&self) -> PathBuf {
        let mut name = format!("{}.fifo", self.app_name);
        if let Some(suffix) = self.suffix.as_deref().filter(|s| !s.is_empty()) {
            name.push('-');
            name.push_str(suffix);
        }
        self.runtime_dir.join(name)
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut path = self.fifo_path().into_os_string();
        path.push(".lock");
        PathBuf::from(path)
    }
}

// ── role / outcome ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Owns the read side and accepts forwarded URIs.
    Listener,
    /// Relays every request to the listener.
    Forwarder,
    /// Cooperation disabled or failed to set up.
    Standalone,
}

/// What `request_open` did with a URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Written to the listener; nothing else to do here.
    Forwarded,
    /// The caller has to open it.
    Local,
}

#[derive(Debug, thiserror::Error)]
pub enum CoopError {
    #[error("cannot create FIFO {}: {source}", path.display())]
    Create { path: PathBuf, source: Errno },
    #[error("{} exists but is not a FIFO", path.display())]
    NotAFifo { path: PathBuf },
    #[error("cannot open FIFO {}: {source}", path.display())]
    Open { path: PathBuf, source: Errno },
    #[error("cannot lock {}: {source}", path.display())]
    Lock { path: PathBuf, source: Errno },
    #[error("lock on {} is held but nobody reads the FIFO", path.display())]
    NoListener { path: PathBuf },
    #[error("refusing to forward {0:?}: URI must be non-empty and a single line")]
    InvalidUri(String),
    #[error("forwarding to listener failed: {0}")]
    Forward(#[from] std::io::Error),
}

// ── coordinator ───────────────────────────────────────────────────────────────

/// Per-process cooperation state. Owned by the shell, never global.
#[derive(Debug)]
pub struct Coordinator {
    role: Role,
    fifo_path: Option<PathBuf>,
    /// Forwarder only.
    writer: Option<File>,
    /// Listener only, until handed to the event loop by `take_source`.
    reader: Option<File>,
    /// Lock-mode listener only; released when the process exits.
    _lock: Option<File>,
}

impl Coordinator {
    /// Cooperation switched off (`-C`): every request is opened locally.
    pub fn disabled() -> Self {
        Self {
            role: Role::Standalone,
            fifo_path: None,
            writer: None,
            reader: None,
            _lock: None,
        }
    }

    /// Decide this process's role. Never fails: setup errors are logged and
    /// the process carries on standalone.
    pub fn setup(settings: &CoopSettings) -> Self {
        match Self::try_setup(settings) {
            Ok(coordinator) => {
                tracing::info!(
                    "Cooperation via {} ({:?}, {:?})",
                    settings.fifo_path().display(),
                    coordinator.role,
                    settings.arbitration
                );
                coordinator
            }
            Err(e) => {
                tracing::error!("{e}; running standalone");
                Self::disabled()
            }
        }
    }

    fn try_setup(settings: &CoopSettings) -> Result<Self, CoopError> {
        let path = settings.fifo_path();
        ensure_fifo(&path)?;
        match settings.arbitration {
            Arbitration::Probe => Self::probe(&path),
            Arbitration::Lock => Self::arbitrate_with_lock(&path, &settings.lock_path()),
        }
    }

    fn probe(path: &Path) -> Result<Self, CoopError> {
        let fd = match rfs::open(
            path,
            OFlags::WRONLY | OFlags::NONBLOCK | OFlags::CLOEXEC,
            Mode::empty(),
        ) {
            Ok(fd) => fd,
            // ENXIO: no reader, same verdict as a failed probe write.
            Err(e) if e == Errno::NXIO => return Self::listen(path, None),
            Err(source) => {
                return Err(CoopError::Open {
                    path: path.to_owned(),
                    source,
                })
            }
        };

        match rustix::io::write(&fd, &[]) {
            Ok(_) => Ok(Self::forward_to(path, File::from(fd))),
            Err(e) => {
                tracing::debug!("Probe write failed ({e}); nobody is listening");
                drop(fd);
                Self::listen(path, None)
            }
        }
    }

    fn arbitrate_with_lock(path: &Path, lock_path: &Path) -> Result<Self, CoopError> {
        let lock = rfs::open(
            lock_path,
            OFlags::RDWR | OFlags::CREATE | OFlags::CLOEXEC,
            Mode::RUSR | Mode::WUSR,
        )
        .map_err(|source| CoopError::Lock {
            path: lock_path.to_owned(),
            source,
        })?;

        match rfs::flock(&lock, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => Self::listen(path, Some(File::from(lock))),
            Err(e) if e == Errno::WOULDBLOCK => Self::connect(path),
            Err(source) => Err(CoopError::Lock {
                path: lock_path.to_owned(),
                source,
            }),
        }
    }

    /// Lock mode: someone else holds the lock, so attach to their FIFO.
    fn connect(path: &Path) -> Result<Self, CoopError> {
        for _ in 0..CONNECT_ATTEMPTS {
            match rfs::open(
                path,
                OFlags::WRONLY | OFlags::NONBLOCK | OFlags::CLOEXEC,
                Mode::empty(),
            ) {
                Ok(fd) => return Ok(Self::forward_to(path, File::from(fd))),
                Err(e) if e == Errno::NXIO => std::thread::sleep(CONNECT_BACKOFF),
                Err(source) => {
                    return Err(CoopError::Open {
                        path: path.to_owned(),
                        source,
                    })
                }
            }
        }
        Err(CoopError::NoListener {
            path: path.to_owned(),
        })
    }

    fn listen(path: &Path, lock: Option<File>) -> Result<Self, CoopError> {
        // RDWR keeps a writer open on our side so the reader never sees EOF
        // when the last forwarder goes away.
        let reader = rfs::open(
            path,
            OFlags::RDWR | OFlags::NONBLOCK | OFlags::CLOEXEC,
            Mode::empty(),
        )
        .map_err(|source| CoopError::Open {
            path: path.to_owned(),
            source,
        })?;

        Ok(Self {
            role: Role::Listener,
            fifo_path: Some(path.to_owned()),
            writer: None,
            reader: Some(File::from(reader)),
            _lock: lock,
        })
    }

    fn forward_to(path: &Path, writer: File) -> Self {
        Self {
            role: Role::Forwarder,
            fifo_path: Some(path.to_owned()),
            writer: Some(writer),
            reader: None,
            _lock: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// True unless another instance is listening for us.
    pub fn is_alone(&self) -> bool {
        self.role != Role::Forwarder
    }

    pub fn fifo_path(&self) -> Option<&Path> {
        self.fifo_path.as_deref()
    }

    /// Hand the listener's read side to the event loop. `None` for forwarders,
    /// standalone processes, and on every call after the first.
    pub fn take_source(&mut self) -> Option<FifoSource> {
        self.reader.take().map(FifoSource::new)
    }

    /// Forward `uri` to the listener, or tell the caller to open it locally.
    /// Fire-and-forget: nothing is read back.
    pub fn request_open(&mut self, uri: &str) -> Result<Dispatch, CoopError> {
        if uri.is_empty() || uri.contains('\n') {
            return Err(CoopError::InvalidUri(uri.to_owned()));
        }

        let Some(writer) = self.writer.as_mut() else {
            return Ok(Dispatch::Local);
        };

        let mut line = String::with_capacity(uri.len() + 1);
        line.push_str(uri);
        line.push('\n');
        writer.write_all(line.as_bytes())?;
        tracing::debug!("Forwarded {uri}");
        Ok(Dispatch::Forwarded)
    }
}

// ── fifo creation ─────────────────────────────────────────────────────────────

fn ensure_fifo(path: &Path) -> Result<(), CoopError> {
    // Follows symlinks: a link to a live FIFO is as good as the FIFO.
    match std::fs::metadata(path) {
        Ok(meta) if meta.file_type().is_fifo() => return Ok(()),
        Ok(_) => {
            return Err(CoopError::NotAFifo {
                path: path.to_owned(),
            })
        }
        Err(_) => {}
    }

    match rfs::mknodat(
        rfs::CWD,
        path,
        FileType::Fifo,
        Mode::RUSR | Mode::WUSR,
        0,
    ) {
        Ok(()) => {
            tracing::debug!("Created FIFO {}", path.display());
            Ok(())
        }
        // Lost a creation race with another instance.
        Err(e) if e == Errno::EXIST => Ok(()),
        Err(source) => Err(CoopError::Create {
            path: path.to_owned(),
            source,
        }),
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────
