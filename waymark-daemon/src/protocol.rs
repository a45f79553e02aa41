//! Newline-delimited JSON protocol spoken over the daemon socket.
//!
//! One request line in, one or more response lines out. A response with
//! `more: true` is progress (the `refresh` acknowledgement); the last line
//! of every exchange has `more: false`.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;

pub const CMD_STATUS: &str = "status";
pub const CMD_REFRESH: &str = "refresh";
pub const CMD_RELOAD_SURFACE: &str = "reload-surface";
pub const CMD_STOP: &str = "stop";

/// JSON newline-delimited request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonRequest {
    pub cmd: String,
    /// Operator issuing the command; checked against the operator policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl DaemonRequest {
    pub fn new(cmd: &str, actor: Option<String>) -> Self {
        Self {
            cmd: cmd.to_string(),
            actor,
        }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Another response line follows.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub more: bool,
}

impl DaemonResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            more: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
            more: false,
        }
    }

    /// Progress line carrying `message`.
    pub fn progress(message: impl Into<String>) -> Self {
        Self {
            more: true,
            ..Self::ok(serde_json::json!({ "message": message.into() }))
        }
    }

    /// The `message` field of `data`, if any.
    pub fn message(&self) -> Option<&str> {
        self.data.as_ref()?.get("message")?.as_str()
    }
}

/// Send one request and return the final response, handing every progress
/// line to `on_progress` as it arrives.
pub fn send_request_with(
    home: &Path,
    request: &DaemonRequest,
    mut on_progress: impl FnMut(&DaemonResponse),
) -> Result<DaemonResponse, DaemonError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(DaemonError::DaemonNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))?;

    let mut reader = BufReader::new(stream);
    loop {
        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| io_err(&socket, e))?;
        if read == 0 {
            return Err(DaemonError::Protocol(
                "daemon closed connection before responding".to_string(),
            ));
        }
        let response: DaemonResponse = serde_json::from_str(line.trim_end())?;
        if !response.more {
            return Ok(response);
        }
        on_progress(&response);
    }
}

/// Send one request and return its final response.
pub fn send_request(home: &Path, request: &DaemonRequest) -> Result<DaemonResponse, DaemonError> {
    send_request_with(home, request, |_| {})
}

pub fn request_status(home: &Path) -> Result<Value, DaemonError> {
    let request = DaemonRequest::new(CMD_STATUS, None);

    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..5 {
        match send_request(home, &request) {
            Ok(response) => return response_into_data(response),
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol("daemon status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    let response = send_request(home, &DaemonRequest::new(CMD_STOP, None))?;
    response_into_data(response).map(|_| ())
}

/// Operator refresh. `on_ack` receives the immediate acknowledgement text;
/// the returned value is the completion payload.
pub fn request_refresh(
    home: &Path,
    actor: &str,
    mut on_ack: impl FnMut(&str),
) -> Result<Value, DaemonError> {
    let request = DaemonRequest::new(CMD_REFRESH, Some(actor.to_string()));
    let response = send_request_with(home, &request, |progress| {
        if let Some(message) = progress.message() {
            on_ack(message);
        }
    })?;
    response_into_data(response)
}

pub fn request_reload_surface(home: &Path, actor: &str) -> Result<Value, DaemonError> {
    let request = DaemonRequest::new(CMD_RELOAD_SURFACE, Some(actor.to_string()));
    response_into_data(send_request(home, &request)?)
}

fn response_into_data(response: DaemonResponse) -> Result<Value, DaemonError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(DaemonError::Protocol(
            response
                .error
                .unwrap_or_else(|| "unknown daemon error".to_string()),
        ))
    }
}
