// TCP server and main event loop for the relay.
//
// Architecture: thread-per-reader with a central `mpsc` channel.
//
// - **Listener thread** (`TcpListener::accept()` loop, non-blocking so it can
//   notice shutdown): hands every accepted stream to the main thread as
//   `InternalEvent::NewConnection`.
// - **Reader threads** (one per client): read frames, decode them as
//   `ClientMessage`, and forward `InternalEvent::MessageFrom`. A frame that
//   is well-delimited but not a valid event is logged and skipped; a framing
//   failure or EOF ends the thread with `InternalEvent::Disconnected`.
// - **Main thread**: owns the `Coordinator` and handles events one at a time.
//   `recv_timeout` with `poll_interval` lets it check the shutdown flag
//   while idle.
//
// The main thread is the only writer to client streams (through the
// coordinator); reader threads only read. Every stream gets a write timeout
// so a peer that stops reading cannot stall the main thread for longer than
// `write_timeout`; the coordinator stops writing to it after the first
// failure.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use drop_four_protocol::{ClientMessage, ConnectionId, ProtocolError, read_message};
use tracing::{debug, error, info, warn};

use crate::coordinator::Coordinator;
use crate::error::{RelayError, Result};

/// Events sent from listener/reader threads to the main thread.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
        peer: SocketAddr,
    },
    MessageFrom {
        conn: ConnectionId,
        message: ClientMessage,
    },
    Disconnected {
        conn: ConnectionId,
    },
}

/// Handle returned by `start_relay` to control the running server.
pub struct RelayHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RelayHandle {
    /// Signal the relay to stop and wait for the main loop to exit.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    /// Block until the relay exits on its own.
    pub fn wait(mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Configuration for starting a relay server.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub bind: String,
    pub port: u16,
    /// How often the idle main loop wakes to check for shutdown.
    pub poll_interval: Duration,
    /// Upper bound on one blocked write to a client.
    pub write_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
            poll_interval: Duration::from_millis(50),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Start the relay on a background thread. Returns a handle for stopping it
/// and the bound address (useful with port 0).
pub fn start_relay(config: RelayConfig) -> Result<(RelayHandle, SocketAddr)> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener =
        TcpListener::bind(&addr).map_err(|source| RelayError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = keep_running.clone();

    let thread = thread::spawn(move || {
        run_relay(listener, config, keep_running_clone);
    });

    info!(addr = %local_addr, "relay listening");
    Ok((
        RelayHandle {
            keep_running,
            thread: Some(thread),
        },
        local_addr,
    ))
}

/// Main relay loop. Runs until `keep_running` is cleared.
fn run_relay(listener: TcpListener, config: RelayConfig, keep_running: Arc<AtomicBool>) {
    let mut coordinator = Coordinator::new();
    let mut next_conn = Some(0u32);

    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        accept_loop(listener, tx_listener, keep_running_listener);
    });

    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(config.poll_interval) {
            Ok(event) => {
                handle_event(&mut coordinator, &mut next_conn, &config, event, &tx);
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut coordinator, &mut next_conn, &config, event, &tx);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    info!("relay stopped");
}

fn accept_loop(listener: TcpListener, tx: Sender<InternalEvent>, keep_running: Arc<AtomicBool>) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(e) = stream.set_nonblocking(false) {
                    warn!(%peer, error = %e, "could not make stream blocking; dropped");
                    continue;
                }
                if tx.send(InternalEvent::NewConnection { stream, peer }).is_err() {
                    break;
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                error!(error = %e, "accept failed; listener exiting");
                break;
            }
        }
    }
}

/// Hand out the next connection id. Ids are never reused, so once the u32
/// space is spent every later connection is refused.
fn allocate_connection_id(next_conn: &mut Option<u32>) -> Option<ConnectionId> {
    let id = (*next_conn)?;
    *next_conn = id.checked_add(1);
    Some(ConnectionId(id))
}

fn handle_event(
    coordinator: &mut Coordinator,
    next_conn: &mut Option<u32>,
    config: &RelayConfig,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
) {
    match event {
        InternalEvent::NewConnection { stream, peer } => {
            let Some(conn) = allocate_connection_id(next_conn) else {
                warn!(%peer, "connection ids exhausted; dropped");
                return;
            };
            handle_new_connection(coordinator, conn, peer, stream, config.write_timeout, tx);
        }
        InternalEvent::MessageFrom { conn, message } => {
            coordinator.handle_message(conn, message);
        }
        InternalEvent::Disconnected { conn } => {
            coordinator.disconnect(conn);
        }
    }
}

/// Register the write half with the coordinator and spawn the reader.
fn handle_new_connection(
    coordinator: &mut Coordinator,
    conn: ConnectionId,
    peer: SocketAddr,
    stream: TcpStream,
    write_timeout: Duration,
    tx: &Sender<InternalEvent>,
) {
    if let Err(e) = stream.set_write_timeout(Some(write_timeout)) {
        warn!(%peer, error = %e, "could not set write timeout; dropped");
        return;
    }
    let read_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!(%peer, error = %e, "could not clone stream; dropped");
            return;
        }
    };
    debug!(conn = %conn, %peer, "accepted connection");
    coordinator.connect(conn, BufWriter::new(stream));

    let tx_reader = tx.clone();
    thread::spawn(move || {
        reader_loop(BufReader::new(read_stream), conn, tx_reader);
    });
}

/// Reader loop for a single client. Runs in its own thread until the
/// stream closes or framing breaks.
fn reader_loop(mut reader: BufReader<TcpStream>, conn: ConnectionId, tx: Sender<InternalEvent>) {
    loop {
        let bytes = match read_message(&mut reader) {
            Ok(bytes) => bytes,
            Err(ProtocolError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!(conn = %conn, "stream closed");
                break;
            }
            Err(e) => {
                warn!(conn = %conn, error = %e, "framing error; disconnecting");
                break;
            }
        };
        match ClientMessage::decode(&bytes) {
            Ok(message) => {
                if tx.send(InternalEvent::MessageFrom { conn, message }).is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!(conn = %conn, error = %e, "rejected event");
            }
        }
    }
    let _ = tx.send(InternalEvent::Disconnected { conn });
}
