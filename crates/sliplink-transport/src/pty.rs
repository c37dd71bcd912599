use std::ffi::CStr;
use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, FromRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::StreamTransport;

/// A pseudo-terminal pair.
///
/// The master side is owned here and becomes a [`StreamTransport`]; the
/// slave path can be handed to another process (or opened locally with
/// [`Pty::open_slave`]) to act as the far end of a serial line.
pub struct Pty {
    master: File,
    slave_path: PathBuf,
}

impl Pty {
    /// Allocate a new pseudo-terminal pair in raw mode.
    pub fn open() -> Result<Self> {
        // SAFETY: posix_openpt takes plain flags and returns a new descriptor or -1.
        let fd = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
        if fd < 0 {
            return Err(pty_error("posix_openpt"));
        }
        // SAFETY: `fd` is a freshly opened descriptor owned by nobody else.
        let master = unsafe { File::from_raw_fd(fd) };

        // SAFETY: `fd` is the open pty master descriptor.
        if unsafe { libc::grantpt(fd) } != 0 {
            return Err(pty_error("grantpt"));
        }
        // SAFETY: `fd` is the open pty master descriptor.
        if unsafe { libc::unlockpt(fd) } != 0 {
            return Err(pty_error("unlockpt"));
        }

        let slave_path = slave_name(fd)?;
        make_raw(&master)?;

        info!(slave = ?slave_path, "allocated pseudo-terminal");
        Ok(Self { master, slave_path })
    }

    /// Path of the slave device (e.g. `/dev/pts/3`).
    pub fn slave_path(&self) -> &Path {
        &self.slave_path
    }

    /// Open the slave side in raw mode.
    pub fn open_slave(&self) -> Result<File> {
        let slave = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&self.slave_path)
            .map_err(|e| TransportError::Open {
                path: self.slave_path.clone(),
                source: e,
            })?;
        make_raw(&slave)?;
        debug!(slave = ?self.slave_path, "opened pty slave");
        Ok(slave)
    }

    /// Turn the master side into a transport.
    pub fn into_transport(self) -> Result<StreamTransport> {
        let label = format!("pty:{}", self.slave_path.display());
        StreamTransport::from_file(self.master, label)
    }
}

impl std::fmt::Debug for Pty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pty")
            .field("slave_path", &self.slave_path)
            .finish()
    }
}

/// Whether the file refers to a terminal device.
pub fn is_tty(file: &File) -> bool {
    // SAFETY: isatty only inspects the descriptor.
    unsafe { libc::isatty(file.as_raw_fd()) == 1 }
}

/// Put a terminal into raw mode: no echo, no canonical line editing, no
/// byte translation, 8-bit clean.
pub fn make_raw(file: &File) -> Result<()> {
    let fd = file.as_raw_fd();
    let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();

    // SAFETY: `termios` is a valid writable pointer and `fd` is open.
    if unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    // SAFETY: tcgetattr succeeded and initialized the struct.
    let mut termios = unsafe { termios.assume_init() };

    // SAFETY: `termios` is a valid, initialized termios struct.
    unsafe { libc::cfmakeraw(&mut termios) };

    // SAFETY: `termios` is valid and `fd` is open.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

fn pty_error(call: &str) -> TransportError {
    TransportError::Pty(format!("{call}: {}", std::io::Error::last_os_error()))
}

#[cfg(target_os = "linux")]
fn slave_name(fd: RawFd) -> Result<PathBuf> {
    let mut buf = [0 as libc::c_char; 128];
    // SAFETY: `buf` is writable for its full length and `fd` is an unlocked pty master.
    let rc = unsafe { libc::ptsname_r(fd, buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        return Err(TransportError::Pty(format!(
            "ptsname_r: {}",
            std::io::Error::from_raw_os_error(rc)
        )));
    }
    // SAFETY: ptsname_r wrote a NUL-terminated string into `buf`.
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(PathBuf::from(name.to_string_lossy().into_owned()))
}

#[cfg(not(target_os = "linux"))]
fn slave_name(fd: RawFd) -> Result<PathBuf> {
    static PTSNAME_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    // ptsname returns a pointer into static storage.
    let _guard = PTSNAME_LOCK
        .lock()
        .map_err(|_| TransportError::Pty("ptsname lock poisoned".to_string()))?;
    // SAFETY: `fd` is an unlocked pty master; the result is read before the lock is released.
    let ptr = unsafe { libc::ptsname(fd) };
    if ptr.is_null() {
        return Err(pty_error("ptsname"));
    }
    // SAFETY: non-null ptsname results are NUL-terminated.
    let name = unsafe { CStr::from_ptr(ptr) };
    Ok(PathBuf::from(name.to_string_lossy().into_owned()))
}
