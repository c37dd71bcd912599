use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::{ChunkReceiver, Transport};

const READ_CHUNK_SIZE: usize = 4 * 1024;

type ReceiverSlot = Arc<RwLock<Option<ChunkReceiver>>>;

/// How a reader blocked in `read` is woken when the transport is dropped.
enum Interrupt {
    /// Shut the socket down; the pending read returns end of stream and the
    /// far end sees EOF.
    Socket(Box<dyn Fn() + Send + Sync>),
    /// The reader polls with a timeout and notices the stop flag.
    #[cfg(unix)]
    Poll,
}

/// Transport over a pair of blocking `Read`/`Write` halves.
///
/// The read half is moved onto a dedicated reader thread the first time a
/// receiver is registered. Every successful `read` is forwarded to the
/// current receiver as one chunk. Writes are serialized behind a mutex so
/// `send` may be called from any thread.
///
/// Dropping a transport built from a socket or file stops its reader thread
/// and closes the connection. A transport built with [`StreamTransport::new`]
/// from arbitrary halves cannot interrupt a blocked read; its reader thread
/// exits at the next end of stream and delivers nothing after the drop.
pub struct StreamTransport {
    label: String,
    writer: Mutex<Box<dyn Write + Send>>,
    reader: Mutex<Option<Box<dyn Read + Send>>>,
    receiver: ReceiverSlot,
    stop: Arc<AtomicBool>,
    interrupt: Option<Interrupt>,
    reader_thread: Option<JoinHandle<()>>,
}

impl StreamTransport {
    /// Build a transport from explicit read and write halves.
    pub fn new<R, W>(reader: R, writer: W, label: impl Into<String>) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::with_interrupt(reader, writer, label, Arc::default(), None)
    }

    fn with_interrupt<R, W>(
        reader: R,
        writer: W,
        label: impl Into<String>,
        stop: Arc<AtomicBool>,
        interrupt: Option<Interrupt>,
    ) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self {
            label: label.into(),
            writer: Mutex::new(Box::new(writer)),
            reader: Mutex::new(Some(Box::new(reader))),
            receiver: Arc::new(RwLock::new(None)),
            stop,
            interrupt,
            reader_thread: None,
        }
    }

    /// Build a transport from an open file (serial device, pty master).
    #[cfg(unix)]
    pub fn from_file(file: File, label: impl Into<String>) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let reader = PollingFile {
            file: file.try_clone()?,
            stop: Arc::clone(&stop),
        };
        Ok(Self::with_interrupt(
            reader,
            file,
            label,
            stop,
            Some(Interrupt::Poll),
        ))
    }

    /// Build a transport from an open file (serial device).
    #[cfg(not(unix))]
    pub fn from_file(file: File, label: impl Into<String>) -> Result<Self> {
        let reader = file.try_clone()?;
        Ok(Self::new(reader, file, label))
    }

    /// Open a serial device path for reading and writing.
    ///
    /// Terminal devices are switched to raw mode so the line discipline does
    /// not rewrite frame bytes.
    pub fn open_device(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| TransportError::Open {
                path: path.to_path_buf(),
                source: e,
            })?;

        #[cfg(unix)]
        if crate::pty::is_tty(&file) {
            crate::pty::make_raw(&file)?;
        }

        debug!(?path, "opened serial device");
        Self::from_file(file, path.display().to_string())
    }

    /// Build a transport from a connected Unix domain socket.
    #[cfg(unix)]
    pub fn from_unix_stream(
        stream: std::os::unix::net::UnixStream,
        label: impl Into<String>,
    ) -> Result<Self> {
        let reader = stream.try_clone()?;
        let control = stream.try_clone()?;
        let interrupt = Interrupt::Socket(Box::new(move || {
            let _ = control.shutdown(Shutdown::Both);
        }));
        Ok(Self::with_interrupt(
            reader,
            stream,
            label,
            Arc::default(),
            Some(interrupt),
        ))
    }

    /// Connect to a listening Unix domain socket.
    #[cfg(unix)]
    pub fn connect_unix(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream =
            std::os::unix::net::UnixStream::connect(path).map_err(|e| TransportError::Connect {
                target: path.display().to_string(),
                source: e,
            })?;
        debug!(?path, "connected to unix domain socket");
        Self::from_unix_stream(stream, path.display().to_string())
    }

    /// Build a transport from a connected TCP stream.
    pub fn from_tcp_stream(stream: TcpStream, label: impl Into<String>) -> Result<Self> {
        stream.set_nodelay(true)?;
        let reader = stream.try_clone()?;
        let control = stream.try_clone()?;
        let interrupt = Interrupt::Socket(Box::new(move || {
            let _ = control.shutdown(Shutdown::Both);
        }));
        Ok(Self::with_interrupt(
            reader,
            stream,
            label,
            Arc::default(),
            Some(interrupt),
        ))
    }

    /// Connect to a TCP endpoint.
    pub fn connect_tcp(addr: impl ToSocketAddrs + std::fmt::Display) -> Result<Self> {
        let target = addr.to_string();
        let stream = TcpStream::connect(&addr).map_err(|e| TransportError::Connect {
            target: target.clone(),
            source: e,
        })?;
        debug!(%target, "connected to tcp endpoint");
        Self::from_tcp_stream(stream, target)
    }

    /// Human-readable label (device path or socket address).
    pub fn label(&self) -> &str {
        &self.label
    }

    fn spawn_reader(&mut self) -> Result<()> {
        let reader = match self.reader.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(reader) = reader else {
            return Ok(());
        };

        let receiver = Arc::clone(&self.receiver);
        let stop = Arc::clone(&self.stop);
        let label = self.label.clone();
        let handle = std::thread::Builder::new()
            .name(format!("sliplink-rx {}", self.label))
            .spawn(move || read_loop(reader, receiver, stop, label))?;
        self.reader_thread = Some(handle);
        Ok(())
    }
}

impl Transport for StreamTransport {
    fn register_receiver(&mut self, receiver: ChunkReceiver) -> Result<()> {
        match self.receiver.write() {
            Ok(mut slot) => *slot = Some(receiver),
            Err(poisoned) => *poisoned.into_inner() = Some(receiver),
        }
        self.spawn_reader()
    }

    fn send(&self, data: &[u8]) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| TransportError::Io(std::io::Error::other("writer lock poisoned")))?;

        let mut offset = 0usize;
        while offset < data.len() {
            match writer.write(&data[offset..]) {
                Ok(0) => return Err(TransportError::Shutdown),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match writer.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn transport_name(&self) -> &'static str {
        "stream"
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        match self.receiver.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }

        let Some(interrupt) = self.interrupt.take() else {
            return;
        };
        if let Interrupt::Socket(shutdown) = &interrupt {
            shutdown();
        }

        let Some(handle) = self.reader_thread.take() else {
            return;
        };
        // Dropped from inside a receiver callback: the reader exits on its own.
        if handle.thread().id() == std::thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!(transport = %self.label, "reader thread panicked");
        }
        debug!(transport = %self.label, "reader stopped");
    }
}

impl std::fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("label", &self.label)
            .finish()
    }
}

/// Read half of a file that wakes up periodically to check for shutdown.
///
/// Reports end of stream once the stop flag is set.
#[cfg(unix)]
struct PollingFile {
    file: File,
    stop: Arc<AtomicBool>,
}

#[cfg(unix)]
const POLL_INTERVAL_MS: libc::c_int = 100;

#[cfg(unix)]
impl Read for PollingFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        use std::os::fd::AsRawFd;

        let mut pollfd = libc::pollfd {
            fd: self.file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Ok(0);
            }
            // SAFETY: `pollfd` is a valid array of one entry and the fd is open.
            let rc = unsafe { libc::poll(&mut pollfd, 1, POLL_INTERVAL_MS) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            if rc > 0 {
                return self.file.read(buf);
            }
        }
    }
}

fn read_loop(
    mut reader: Box<dyn Read + Send>,
    receiver: ReceiverSlot,
    stop: Arc<AtomicBool>,
    label: String,
) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => {
                debug!(transport = %label, "end of stream");
                return;
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(_) if stop.load(Ordering::SeqCst) => return,
            Err(err) => {
                warn!(transport = %label, error = %err, "read failed; stopping reader");
                return;
            }
        };
        if stop.load(Ordering::SeqCst) {
            return;
        }

        let current = match receiver.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match current {
            Some(receiver) => receiver(&chunk[..read]),
            None => debug!(transport = %label, len = read, "no receiver; dropping chunk"),
        }
    }
}
