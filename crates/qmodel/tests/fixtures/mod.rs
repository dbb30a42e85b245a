//! Scripted mock server speaking the IPC framing over real TCP.
//!
//! Accepts any number of connections; each gets the handshake reply `0x06`
//! and then a request/response loop driven by the test's responder.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use qmodel::ipc::{compress_message, decode_message, pack_header, MsgType, Serializer, HEADER_SIZE};
use qmodel::{ConnectConfig, Engine, Value};

/// What the server does with one decoded request.
pub enum ServerReply {
    /// Respond with a value frame.
    Value(Value),
    /// Respond with a compressed value frame.
    Compressed(Value),
    /// Respond with a server error (`-128` body).
    Error(String),
    /// Drop the connection without responding.
    Close,
}

type Responder = Arc<dyn Fn(&Value) -> ServerReply + Send + Sync>;

pub struct MockServer {
    port: u16,
    requests: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
}

impl MockServer {
    /// Start a server; the responder runs for every request on every
    /// connection.
    pub fn spawn<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> ServerReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("local addr").port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let responder: Responder = Arc::new(responder);
        let thread_requests = Arc::clone(&requests);
        let thread_connections = Arc::clone(&connections);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                thread_connections.fetch_add(1, Ordering::SeqCst);
                let responder = Arc::clone(&responder);
                let requests = Arc::clone(&thread_requests);
                thread::spawn(move || serve(stream, responder, requests));
            }
        });

        Self {
            port,
            requests,
            connections,
        }
    }

    /// Start a server that rejects every handshake by closing the socket
    /// without replying.
    pub fn spawn_rejecting() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("local addr").port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let thread_connections = Arc::clone(&connections);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                thread_connections.fetch_add(1, Ordering::SeqCst);
                thread::spawn(move || {
                    let mut stream = stream;
                    let mut byte = [0u8; 1];
                    loop {
                        match stream.read(&mut byte) {
                            Ok(0) | Err(_) => return,
                            Ok(_) if byte[0] == 0 => break,
                            Ok(_) => {}
                        }
                    }
                    // Close without a handshake reply.
                });
            }
        });

        Self {
            port,
            requests,
            connections,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn config(&self) -> ConnectConfig {
        ConnectConfig::new("127.0.0.1", self.port)
            .credentials("u", "p")
            .timeout(Duration::from_secs(2))
    }

    pub fn engine(&self) -> Engine {
        Engine::new("127.0.0.1", self.port)
            .credentials("u", "p")
            .timeout(Duration::from_secs(2))
    }

    /// Every request decoded so far, across all connections.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().expect("requests poisoned").clone()
    }

    /// Expressions received (bare strings and call-form heads).
    pub fn expressions(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|request| match request {
                Value::String(s) => Some(s.clone()),
                Value::List(items) => items.first().and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Symbol(s) => Some(s.clone()),
                    _ => None,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

fn serve(mut stream: TcpStream, responder: Responder, requests: Arc<Mutex<Vec<Value>>>) {
    // Handshake: credentials + capability byte + NUL terminator.
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) | Err(_) => return,
            Ok(_) if byte[0] == 0 => break,
            Ok(_) => {}
        }
    }
    if stream.write_all(&[6]).is_err() {
        return;
    }

    let mut serializer = Serializer::new();
    loop {
        let mut header = [0u8; HEADER_SIZE];
        if stream.read_exact(&mut header).is_err() {
            return;
        }
        let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        if length < HEADER_SIZE {
            return;
        }
        let mut message = vec![0u8; length];
        message[..HEADER_SIZE].copy_from_slice(&header);
        if stream.read_exact(&mut message[HEADER_SIZE..]).is_err() {
            return;
        }
        let Ok((_, request)) = decode_message(&message) else {
            return;
        };
        requests
            .lock()
            .expect("requests poisoned")
            .push(request.clone());

        let reply = responder(&request);
        let frame = match reply {
            ServerReply::Value(value) => serializer
                .serialize_message(&value, MsgType::Response)
                .expect("serialize mock reply"),
            ServerReply::Compressed(value) => compress_message(
                serializer
                    .serialize_message(&value, MsgType::Response)
                    .expect("serialize mock reply"),
            ),
            ServerReply::Error(message) => error_frame(&message),
            ServerReply::Close => return,
        };
        if stream.write_all(&frame).is_err() {
            return;
        }
    }
}

/// A `-128` error frame with a NUL-terminated message.
pub fn error_frame(message: &str) -> Vec<u8> {
    let mut frame = vec![0u8; HEADER_SIZE];
    frame.push(128);
    frame.extend_from_slice(message.as_bytes());
    frame.push(0);
    let total = frame.len() as u32;
    frame[..HEADER_SIZE].copy_from_slice(&pack_header(MsgType::Response, total));
    frame
}

/// Request matching helper: the expression text of a request.
pub fn request_expr(request: &Value) -> &str {
    match request {
        Value::String(s) => s.as_str(),
        Value::List(items) => items
            .first()
            .and_then(|v| v.as_str())
            .unwrap_or_default(),
        _ => "",
    }
}
