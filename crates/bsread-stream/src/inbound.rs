use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use bsread_frame::{FrameConfig, FrameError, MessageReader};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use bsread_transport::queue::dequeue;
use bsread_transport::{
    ConnType, Mode, Multipart, MultipartSource, Result, TcpEndpoint, TransportConfig,
    TransportError,
};
use tracing::{debug, info, warn};

use crate::lock;

const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// Receiving side of a PULL or SUB stream.
///
/// Every connected peer gets a reader thread that decodes complete messages
/// into a queue of `queue_size` messages. PULL readers block when the queue
/// is full (back-pressure on the sender); SUB readers drop the message.
pub struct InboundStream {
    mode: Mode,
    rx: Receiver<Multipart>,
    receive_timeout: Option<Duration>,
    shutdown: Arc<AtomicBool>,
    streams: Arc<Mutex<Vec<TcpStream>>>,
    bytes_received: Arc<AtomicU64>,
    local_addr: Option<SocketAddr>,
    acceptor: Option<JoinHandle<()>>,
    closed: bool,
}

#[derive(Clone)]
struct ReaderContext {
    mode: Mode,
    tx: Sender<Multipart>,
    shutdown: Arc<AtomicBool>,
    streams: Arc<Mutex<Vec<TcpStream>>>,
    bytes_received: Arc<AtomicU64>,
}

impl InboundStream {
    /// Bind or connect according to `config`.
    pub fn open(config: &TransportConfig) -> Result<Self> {
        if config.mode.is_outbound() {
            return Err(TransportError::UnsupportedMode {
                mode: config.mode,
                operation: "receive",
            });
        }

        let endpoint = config.endpoint()?;
        let (tx, rx) = bounded(config.queue_size.max(1));
        let context = ReaderContext {
            mode: config.mode,
            tx,
            shutdown: Arc::new(AtomicBool::new(false)),
            streams: Arc::new(Mutex::new(Vec::new())),
            bytes_received: Arc::new(AtomicU64::new(0)),
        };

        let (acceptor, local_addr) = match config.conn_type {
            ConnType::Bind => {
                let listener = TcpEndpoint::bind(&endpoint)?;
                listener.set_nonblocking(true)?;
                let local_addr = listener.local_addr();
                (Some(spawn_acceptor(listener, context.clone())?), Some(local_addr))
            }
            ConnType::Connect => {
                let stream = TcpEndpoint::connect(&endpoint, config.receive_timeout)?;
                spawn_reader(stream, context.clone())?;
                (None, None)
            }
        };

        info!(mode = %config.mode, %endpoint, conn_type = ?config.conn_type, "inbound stream open");

        Ok(Self {
            mode: config.mode,
            rx,
            receive_timeout: config.receive_timeout,
            shutdown: context.shutdown,
            streams: context.streams,
            bytes_received: context.bytes_received,
            local_addr,
            acceptor,
            closed: false,
        })
    }

    /// Socket mode of this stream.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Address actually bound, for bind-role streams.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Total payload bytes of all frames received so far.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Stop accepting, disconnect every peer and end the reader threads.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(TransportError::Shutdown);
        }
        self.closed = true;
        self.shutdown.store(true, Ordering::SeqCst);
        for stream in lock(&self.streams).drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
        info!(mode = %self.mode, "inbound stream closed");
        Ok(())
    }
}

impl MultipartSource for InboundStream {
    fn recv_multipart(&mut self) -> Result<Multipart> {
        if self.closed {
            return Err(TransportError::Shutdown);
        }
        dequeue(&self.rx, self.receive_timeout)
    }
}

impl Drop for InboundStream {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

fn spawn_acceptor(listener: TcpEndpoint, context: ReaderContext) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("bsread-accept".to_string())
        .spawn(move || {
            while !context.shutdown.load(Ordering::SeqCst) {
                match listener.try_accept() {
                    Ok(Some(stream)) => {
                        if let Err(err) = spawn_reader(stream, context.clone()) {
                            warn!(error = %err, "failed to start peer reader");
                        }
                    }
                    Ok(None) => std::thread::sleep(ACCEPT_POLL),
                    Err(err) => {
                        debug!(error = %err, "accept failed");
                        std::thread::sleep(ACCEPT_POLL);
                    }
                }
            }
        })?;
    Ok(handle)
}

fn spawn_reader(stream: TcpStream, context: ReaderContext) -> Result<()> {
    lock(&context.streams).push(stream.try_clone()?);
    let mut reader = MessageReader::with_config_tcp(stream, FrameConfig::default())
        .map_err(crate::frame_to_transport_error)?;

    std::thread::Builder::new()
        .name("bsread-recv".to_string())
        .spawn(move || loop {
            let message = match reader.read_message() {
                Ok(message) => message,
                Err(FrameError::ConnectionClosed) => {
                    debug!("peer disconnected");
                    return;
                }
                Err(err) => {
                    if !context.shutdown.load(Ordering::SeqCst) {
                        warn!(error = %err, "dropping peer after read failure");
                    }
                    return;
                }
            };

            let size: usize = message.iter().map(|part| part.len()).sum();
            context
                .bytes_received
                .fetch_add(size as u64, Ordering::Relaxed);

            let delivered = match context.mode {
                Mode::Sub => match context.tx.try_send(message) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        debug!("receive queue full; message dropped");
                        true
                    }
                    Err(TrySendError::Disconnected(_)) => false,
                },
                _ => context.tx.send(message).is_ok(),
            };
            if !delivered {
                return;
            }
        })?;
    Ok(())
}
