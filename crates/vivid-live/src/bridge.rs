//! TCP bridge to external editors.
//!
//! Line-framed JSON over a local socket (default port 9876). The runtime
//! pushes compile status and chain introspection; editors push reload and
//! parameter-change commands. A background thread owns the socket; the
//! main thread talks to it through channels and polls commands once per
//! frame.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LiveError;

/// Default editor bridge port.
pub const DEFAULT_EDITOR_PORT: u16 = 9876;

/// Environment variable overriding the bridge port.
pub const EDITOR_PORT_ENV: &str = "VIVID_EDITOR_PORT";

/// One operator row in the `operators` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatorInfo {
    /// Chain instance name.
    pub name: String,
    /// Output kind tag.
    pub kind: String,
    /// Source line in the chain definition, when known.
    pub line: u32,
    /// Connected input names.
    pub inputs: Vec<String>,
}

/// One parameter row in the `params` message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamInfo {
    /// Owning operator's instance name.
    pub op: String,
    /// Parameter name.
    pub name: String,
    /// Kind tag (`Float`, `Vec3`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Current value.
    pub value: [f32; 4],
    /// Range minimum.
    pub min: f32,
    /// Range maximum.
    pub max: f32,
}

/// Messages sent runtime → editor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    /// Result of the latest chain compile.
    Compile {
        /// `true` when the build succeeded.
        ok: bool,
        /// Compiler diagnostics (`file:line:col` formatted) when not.
        message: String,
    },
    /// The chain's operator list after a (re)build.
    Operators {
        /// One row per operator, in execution order.
        list: Vec<OperatorInfo>,
    },
    /// Current parameter values.
    Params {
        /// One row per parameter.
        list: Vec<ParamInfo>,
    },
}

/// Commands sent editor → runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorCommand {
    /// Force a chain reload.
    Reload,
    /// Write a parameter on a named operator.
    SetParam {
        /// Operator instance name.
        op: String,
        /// Parameter name.
        name: String,
        /// New value (missing components default to 0).
        value: Vec<f32>,
    },
}

/// Runtime side of the editor connection.
pub struct EditorBridge {
    port: u16,
    shutdown: Arc<AtomicBool>,
    outgoing: Sender<OutgoingMessage>,
    incoming: Receiver<EditorCommand>,
    thread: Option<JoinHandle<()>>,
}

impl EditorBridge {
    /// Binds the listener and starts the socket thread.
    ///
    /// Pass port 0 to let the OS choose (tests); read the bound port back
    /// with [`port`](Self::port).
    pub fn start(port: u16) -> Result<Self, LiveError> {
        let listener =
            TcpListener::bind(("127.0.0.1", port)).map_err(LiveError::Bridge)?;
        listener.set_nonblocking(true).map_err(LiveError::Bridge)?;
        let port = listener.local_addr().map_err(LiveError::Bridge)?.port();

        let shutdown = Arc::new(AtomicBool::new(false));
        let (outgoing_tx, outgoing_rx) = std::sync::mpsc::channel::<OutgoingMessage>();
        let (incoming_tx, incoming_rx) = std::sync::mpsc::channel::<EditorCommand>();

        let thread_shutdown = Arc::clone(&shutdown);
        let thread = std::thread::Builder::new()
            .name("vivid-editor-bridge".into())
            .spawn(move || serve(&listener, &thread_shutdown, &outgoing_rx, &incoming_tx))
            .map_err(LiveError::Bridge)?;

        tracing::info!(port, "editor bridge listening");
        Ok(Self {
            port,
            shutdown,
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            thread: Some(thread),
        })
    }

    /// The bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Queues a compile-status message to all connected editors.
    pub fn send_compile_status(&self, ok: bool, message: impl Into<String>) {
        let _ = self.outgoing.send(OutgoingMessage::Compile {
            ok,
            message: message.into(),
        });
    }

    /// Queues the operator list.
    pub fn send_operators(&self, list: Vec<OperatorInfo>) {
        let _ = self.outgoing.send(OutgoingMessage::Operators { list });
    }

    /// Queues the parameter list.
    pub fn send_params(&self, list: Vec<ParamInfo>) {
        let _ = self.outgoing.send(OutgoingMessage::Params { list });
    }

    /// Drains commands received since the last poll.
    pub fn poll(&self) -> Vec<EditorCommand> {
        let mut commands = Vec::new();
        loop {
            match self.incoming.try_recv() {
                Ok(command) => commands.push(command),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        commands
    }
}

impl Drop for EditorBridge {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct Client {
    stream: TcpStream,
    buffer: Vec<u8>,
}

fn serve(
    listener: &TcpListener,
    shutdown: &AtomicBool,
    outgoing: &Receiver<OutgoingMessage>,
    incoming: &Sender<EditorCommand>,
) {
    let mut clients: Vec<Client> = Vec::new();
    let mut backlog: VecDeque<String> = VecDeque::new();

    while !shutdown.load(Ordering::Relaxed) {
        // Accept any waiting connections.
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    tracing::info!(%addr, "editor connected");
                    let _ = stream.set_nonblocking(true);
                    clients.push(Client {
                        stream,
                        buffer: Vec::new(),
                    });
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    tracing::warn!(%err, "editor bridge accept failed");
                    break;
                }
            }
        }

        // Serialize queued outgoing messages once.
        while let Ok(message) = outgoing.try_recv() {
            match serde_json::to_string(&message) {
                Ok(mut line) => {
                    line.push('\n');
                    backlog.push_back(line);
                }
                Err(err) => tracing::warn!(%err, "unserializable bridge message"),
            }
        }
        // Nothing connected: drop stale messages rather than queueing
        // forever.
        if clients.is_empty() {
            backlog.clear();
        }
        while let Some(line) = backlog.pop_front() {
            clients.retain_mut(|client| match client.stream.write_all(line.as_bytes()) {
                Ok(()) => true,
                Err(err) if err.kind() == ErrorKind::WouldBlock => true,
                Err(_) => false,
            });
        }

        // Read commands.
        let mut read_buf = [0u8; 1024];
        clients.retain_mut(|client| {
            loop {
                match client.stream.read(&mut read_buf) {
                    Ok(0) => return false,
                    Ok(n) => {
                        client.buffer.extend_from_slice(&read_buf[..n]);
                        while let Some(pos) = client.buffer.iter().position(|&b| b == b'\n') {
                            let line: Vec<u8> = client.buffer.drain(..=pos).collect();
                            match serde_json::from_slice::<EditorCommand>(&line) {
                                Ok(command) => {
                                    let _ = incoming.send(command);
                                }
                                Err(err) => {
                                    tracing::warn!(%err, "malformed editor command");
                                }
                            }
                        }
                    }
                    Err(err) if err.kind() == ErrorKind::WouldBlock => return true,
                    Err(_) => return false,
                }
            }
        });

        std::thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};

    #[test]
    fn message_wire_format_matches_protocol() {
        let msg = OutgoingMessage::Compile {
            ok: false,
            message: "src/lib.rs:10:5: mismatched types".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"compile\""));
        assert!(json.contains("\"ok\":false"));

        let cmd: EditorCommand =
            serde_json::from_str(r#"{"type":"set_param","op":"noise","name":"scale","value":[4.0]}"#)
                .unwrap();
        assert_eq!(
            cmd,
            EditorCommand::SetParam {
                op: "noise".into(),
                name: "scale".into(),
                value: vec![4.0],
            }
        );

        let cmd: EditorCommand = serde_json::from_str(r#"{"type":"reload"}"#).unwrap();
        assert_eq!(cmd, EditorCommand::Reload);
    }

    #[test]
    fn roundtrip_over_a_real_socket() {
        let bridge = EditorBridge::start(0).unwrap();
        let mut editor = TcpStream::connect(("127.0.0.1", bridge.port())).unwrap();
        editor
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        // Editor → runtime.
        editor.write_all(b"{\"type\":\"reload\"}\n").unwrap();
        let mut commands = Vec::new();
        for _ in 0..200 {
            commands = bridge.poll();
            if !commands.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(commands, vec![EditorCommand::Reload]);

        // Runtime → editor.
        bridge.send_compile_status(true, "");
        let mut reader = BufReader::new(editor);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let msg: OutgoingMessage = serde_json::from_str(&line).unwrap();
        assert_eq!(
            msg,
            OutgoingMessage::Compile {
                ok: true,
                message: String::new(),
            }
        );
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let bridge = EditorBridge::start(0).unwrap();
        let mut editor = TcpStream::connect(("127.0.0.1", bridge.port())).unwrap();
        editor.write_all(b"this is not json\n{\"type\":\"reload\"}\n").unwrap();

        let mut commands = Vec::new();
        for _ in 0..200 {
            commands = bridge.poll();
            if !commands.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(commands, vec![EditorCommand::Reload]);
    }
}
