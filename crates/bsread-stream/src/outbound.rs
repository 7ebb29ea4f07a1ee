use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use bsread_frame::{FrameConfig, MessageWriter};
use bsread_transport::queue::{enqueue, Enqueued};
use bsread_transport::{
    ConnType, FrameSink, Mode, Multipart, MultipartBuilder, Result, TcpEndpoint, TransportConfig,
    TransportError,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info};

use crate::lock;

const ACCEPT_POLL: Duration = Duration::from_millis(20);
const PEER_POLL: Duration = Duration::from_millis(5);

type Peers = Arc<Mutex<Vec<MessageWriter<TcpStream>>>>;

/// Sending side of a PUSH or PUB stream.
///
/// Frames are collected until the message-closing frame, then the complete
/// message is queued. PUSH hands each message to one connected peer in turn
/// and waits for a peer to appear; PUB copies it to every connected peer and
/// drops it when there are none.
pub struct OutboundStream {
    mode: Mode,
    pending: MultipartBuilder,
    queue: Option<Sender<Multipart>>,
    block: bool,
    send_timeout: Option<Duration>,
    dropped: u64,
    shutdown: Arc<AtomicBool>,
    peers: Peers,
    local_addr: Option<SocketAddr>,
    worker: Option<JoinHandle<()>>,
    acceptor: Option<JoinHandle<()>>,
}

impl OutboundStream {
    /// Bind or connect according to `config`.
    pub fn open(config: &TransportConfig) -> Result<Self> {
        if !config.mode.is_outbound() {
            return Err(TransportError::UnsupportedMode {
                mode: config.mode,
                operation: "send",
            });
        }

        let endpoint = config.endpoint()?;
        let frame_config = FrameConfig {
            write_timeout: config.send_timeout,
            ..FrameConfig::default()
        };
        let shutdown = Arc::new(AtomicBool::new(false));
        let peers: Peers = Arc::new(Mutex::new(Vec::new()));

        let (acceptor, local_addr) = match config.conn_type {
            ConnType::Bind => {
                let listener = TcpEndpoint::bind(&endpoint)?;
                listener.set_nonblocking(true)?;
                let local_addr = listener.local_addr();
                let handle = spawn_acceptor(
                    listener,
                    Arc::clone(&peers),
                    Arc::clone(&shutdown),
                    frame_config,
                )?;
                (Some(handle), Some(local_addr))
            }
            ConnType::Connect => {
                let stream = TcpEndpoint::connect(&endpoint, config.send_timeout)?;
                let writer = MessageWriter::with_config_tcp(stream, frame_config)
                    .map_err(crate::frame_to_transport_error)?;
                lock(&peers).push(writer);
                (None, None)
            }
        };

        let (tx, rx) = bounded(config.queue_size.max(1));
        let worker = spawn_worker(
            config.mode,
            rx,
            Arc::clone(&peers),
            Arc::clone(&shutdown),
        )?;

        info!(mode = %config.mode, %endpoint, conn_type = ?config.conn_type, "outbound stream open");

        Ok(Self {
            mode: config.mode,
            pending: MultipartBuilder::new(),
            queue: Some(tx),
            block: config.block,
            send_timeout: config.send_timeout,
            dropped: 0,
            shutdown,
            peers,
            local_addr,
            worker: Some(worker),
            acceptor,
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

    /// Number of currently connected peers.
    pub fn peer_count(&self) -> usize {
        lock(&self.peers).len()
    }

    /// Messages discarded because the queue was full in non-blocking mode.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn shutdown_threads(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
        lock(&self.peers).clear();
    }
}

impl FrameSink for OutboundStream {
    fn send_frame(&mut self, frame: &[u8], more: bool) -> Result<()> {
        let queue = self.queue.as_ref().ok_or(TransportError::Shutdown)?;
        let Some(message) = self.pending.push(frame, more) else {
            return Ok(());
        };
        if enqueue(queue, message, self.block, self.send_timeout)? == Enqueued::Dropped {
            self.dropped += 1;
        }
        Ok(())
    }

    fn discard_pending(&mut self) {
        self.pending.clear();
    }

    fn close(&mut self) -> Result<()> {
        self.pending.clear();
        // Dropping the queue lets the worker drain what is already queued.
        let queue = self.queue.take().ok_or(TransportError::Shutdown)?;
        drop(queue);
        self.shutdown_threads();
        info!(mode = %self.mode, dropped = self.dropped, "outbound stream closed");
        Ok(())
    }
}

impl Drop for OutboundStream {
    fn drop(&mut self) {
        if self.queue.take().is_some() {
            self.shutdown_threads();
        }
    }
}

fn spawn_acceptor(
    listener: TcpEndpoint,
    peers: Peers,
    shutdown: Arc<AtomicBool>,
    frame_config: FrameConfig,
) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("bsread-accept".to_string())
        .spawn(move || {
            while !shutdown.load(Ordering::SeqCst) {
                match listener.try_accept() {
                    Ok(Some(stream)) => {
                        match MessageWriter::with_config_tcp(stream, frame_config.clone()) {
                            Ok(writer) => lock(&peers).push(writer),
                            Err(err) => debug!(error = %err, "failed to configure peer"),
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

fn spawn_worker(
    mode: Mode,
    rx: Receiver<Multipart>,
    peers: Peers,
    shutdown: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("bsread-send".to_string())
        .spawn(move || {
            let mut next = 0usize;
            for message in rx {
                match mode {
                    Mode::Pub => publish(&peers, &message),
                    _ => push(&peers, &message, &mut next, &shutdown),
                }
            }
        })?;
    Ok(handle)
}

fn publish(peers: &Peers, message: &Multipart) {
    let mut peers = lock(peers);
    if peers.is_empty() {
        debug!("no subscribers; message dropped");
        return;
    }
    peers.retain_mut(|peer| match peer.write_message(message) {
        Ok(()) => true,
        Err(err) => {
            debug!(error = %err, "dropping subscriber");
            false
        }
    });
}

fn push(peers: &Peers, message: &Multipart, next: &mut usize, shutdown: &AtomicBool) {
    loop {
        {
            let mut peers = lock(peers);
            while !peers.is_empty() {
                let index = *next % peers.len();
                match peers[index].write_message(message) {
                    Ok(()) => {
                        *next = index + 1;
                        return;
                    }
                    Err(err) => {
                        debug!(error = %err, "dropping puller");
                        peers.remove(index);
                    }
                }
            }
        }
        if shutdown.load(Ordering::SeqCst) {
            debug!("stream closing without pullers; message dropped");
            return;
        }
        std::thread::sleep(PEER_POLL);
    }
}
