// Blocking TCP client for the relay.
//
// `NetClient::connect()` opens the stream and spawns a background reader
// thread that decodes `ServerMessage` frames into an `mpsc` channel. The
// caller writes synchronously through the typed helpers (`join`,
// `place_tile`, ...) and drains incoming events with the non-blocking
// `poll()`. Used by the integration tests and handy for scripting a player
// against a live relay.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use drop_four_protocol::{
    ClientMessage, GameSnapshot, JoinRequest, Position, ServerMessage, read_message, write_message,
};
use tracing::debug;

use crate::error::{RelayError, Result};

pub struct NetClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: JoinHandle<()>,
}

impl NetClient {
    /// Connect to a relay and start the reader thread.
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(|source| RelayError::Connect {
            addr: addr.to_owned(),
            source,
        })?;
        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || reader_loop(reader, tx));

        Ok(Self {
            writer,
            inbox: rx,
            _reader_thread: reader_thread,
        })
    }

    pub fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        write_message(&mut self.writer, &msg.encode()?)?;
        Ok(())
    }

    pub fn join(&mut self, room_id: &str, username: &str) -> Result<()> {
        self.send(&ClientMessage::Join(JoinRequest {
            room_id: room_id.into(),
            username: username.into(),
        }))
    }

    pub fn place_tile(&mut self, x: i32, y: i32) -> Result<()> {
        self.send(&ClientMessage::PlaceTile(Position { x, y }))
    }

    pub fn ready(&mut self, username: &str) -> Result<()> {
        self.send(&ClientMessage::Ready(username.into()))
    }

    pub fn win(&mut self) -> Result<()> {
        self.send(&ClientMessage::Win)
    }

    pub fn new_game(&mut self, finished: GameSnapshot) -> Result<()> {
        self.send(&ClientMessage::NewGame(finished))
    }

    pub fn leave(&mut self) -> Result<()> {
        self.send(&ClientMessage::Leave)
    }

    /// Close both directions; the relay treats this as a disconnect.
    pub fn disconnect(&mut self) {
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }

    /// Drain all queued server messages (non-blocking).
    pub fn poll(&self) -> Vec<ServerMessage> {
        self.inbox.try_iter().collect()
    }
}

/// Reader thread: decode frames in a loop and push them to the channel.
/// Undecodable frames are skipped; a framing failure or EOF ends the loop.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: mpsc::Sender<ServerMessage>) {
    while let Ok(bytes) = read_message(&mut reader) {
        match ServerMessage::decode(&bytes) {
            Ok(msg) => {
                if tx.send(msg).is_err() {
                    break;
                }
            }
            Err(e) => debug!(error = %e, "skipping undecodable server event"),
        }
    }
}
