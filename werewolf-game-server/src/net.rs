//! Thin newline-delimited JSON transport over TCP. One thread reads
//! intents per connection; a second drains the engine outbox. The
//! engine itself is transport-agnostic; everything here is framing.

use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use werewolf_game_lib::Intent;
use werewolf_game_lib::ParticipantId;
use werewolf_game_lib::SessionToken;
use werewolf_game_server_lib::GameServer;

const OUTBOX_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// First line of every connection: register a new name or resume with a
/// recovery token.
#[derive(Deserialize)]
#[serde(tag = "hello", rename_all = "snake_case")]
enum Hello {
    Register { name: String },
    Resume { token: SessionToken },
}

#[derive(Serialize)]
#[serde(tag = "hello", rename_all = "snake_case")]
enum HelloReply {
    Ok {
        participant: ParticipantId,
        token: SessionToken,
    },
    Error {
        message: String,
    },
}

pub fn serve(listener: TcpListener, server: GameServer) -> std::io::Result<()> {
    for stream in listener.incoming() {
        let stream = stream?;
        let server = server.clone();
        thread::spawn(move || {
            if let Err(err) = handle_connection(stream, server) {
                tracing::debug!(%err, "connection ended");
            }
        });
    }
    Ok(())
}

fn write_line(stream: &Mutex<TcpStream>, line: &str) -> std::io::Result<()> {
    let mut stream = stream.lock().unwrap();
    stream.write_all(line.as_bytes())?;
    stream.write_all(b"\n")
}

fn handle_connection(stream: TcpStream, server: GameServer) -> anyhow::Result<()> {
    let peer = stream.peer_addr()?;
    tracing::debug!(%peer, "connection opened");

    let mut reader = BufReader::new(stream.try_clone()?);
    let writer = Arc::new(Mutex::new(stream));

    // The connection stays unauthenticated until a hello succeeds.
    let token = loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        let hello = match serde_json::from_str::<Hello>(&line) {
            Ok(hello) => hello,
            Err(err) => {
                reply(&writer, HelloReply::Error {
                    message: format!("malformed hello: {err}"),
                })?;
                continue;
            }
        };

        let attempt = match hello {
            Hello::Register { name } => server.register(&name),
            Hello::Resume { token } => server.resume(token),
        };

        match attempt {
            Ok((participant, token)) => {
                reply(&writer, HelloReply::Ok { participant, token })?;
                break token;
            }
            Err(err) => {
                reply(&writer, HelloReply::Error {
                    message: err.user_message(),
                })?;
            }
        }
    };

    let (participant, connection) = match server.connect(token) {
        Ok(opened) => opened,
        Err(err) => {
            reply(&writer, HelloReply::Error {
                message: err.user_message(),
            })?;
            return Ok(());
        }
    };
    tracing::debug!(%peer, ?participant, "connection authenticated");

    // Outbox pump: the sole writer of game traffic on this socket.
    let closed = Arc::new(AtomicBool::new(false));
    let pump = thread::spawn({
        let server = server.clone();
        let writer = Arc::clone(&writer);
        let closed = Arc::clone(&closed);

        move || {
            while !closed.load(Ordering::Relaxed) {
                for message in server.drain_outbox(participant, connection) {
                    let line = match serde_json::to_string(&*message) {
                        Ok(line) => line,
                        Err(err) => {
                            tracing::error!(%err, "failed to encode outbound message");
                            continue;
                        }
                    };
                    if write_line(&writer, &line).is_err() {
                        return;
                    }
                }
                thread::sleep(OUTBOX_POLL_INTERVAL);
            }
        }
    });

    // Intent loop. Rejections are delivered through the outbox by the
    // engine; only unparsable lines are answered here.
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Intent>(&line) {
            Ok(intent) => {
                tracing::debug!(?participant, "intent received");
                // Errors already reached the client as targeted notices.
                let _ = server.handle_intent(token, intent);
            }
            Err(err) => {
                reply(&writer, HelloReply::Error {
                    message: format!("malformed intent: {err}"),
                })?;
            }
        }
    }

    closed.store(true, Ordering::Relaxed);
    let _ = pump.join();
    server.disconnect(participant, connection)?;
    tracing::debug!(%peer, ?participant, "connection closed");

    Ok(())
}

fn reply(stream: &Mutex<TcpStream>, reply: HelloReply) -> std::io::Result<()> {
    let line = serde_json::to_string(&reply).expect("reply serializes");
    write_line(stream, &line)
}
