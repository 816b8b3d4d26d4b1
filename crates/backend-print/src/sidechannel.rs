// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Side-channel RPC handler (§4.4): one call services at most one request on
// the well-known side-channel fd. Frame format is `(command, status, 4-byte
// BE length, payload)` on both the read and write side.

use std::net::SocketAddr;
use std::time::Duration;

use backend_core::error::Result;

use crate::snmp_session::{self, SnmpValue};

/// Request command bytes, per §4.4's dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    DrainOutput,
    GetBidi,
    GetConnected,
    GetDeviceId,
    SnmpGet,
    SnmpGetNext,
    SoftReset,
    GetState,
    Unknown(u8),
}

impl Command {
    pub fn from_byte(b: u8) -> Self {
        match b {
            1 => Command::DrainOutput,
            2 => Command::GetBidi,
            3 => Command::GetConnected,
            4 => Command::GetDeviceId,
            5 => Command::SnmpGet,
            6 => Command::SnmpGetNext,
            7 => Command::SoftReset,
            8 => Command::GetState,
            other => Command::Unknown(other),
        }
    }
}

/// Response status bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    IoError,
    NotImplemented,
    BadMessage,
}

impl Status {
    pub fn to_byte(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::IoError => 1,
            Status::NotImplemented => 2,
            Status::BadMessage => 3,
        }
    }
}

/// One parsed side-channel request frame.
pub struct Request {
    pub command: Command,
    pub payload: Vec<u8>,
}

/// One outgoing side-channel response frame.
pub struct Response {
    pub command: Command,
    pub status: Status,
    pub payload: Vec<u8>,
}

impl Response {
    fn new(command: Command, status: Status) -> Self {
        Response { command, status, payload: Vec::new() }
    }

    fn with_payload(command: Command, status: Status, payload: Vec<u8>) -> Self {
        Response { command, status, payload }
    }

    /// Serialize to the wire frame: command byte, status byte, 4-byte BE
    /// length, payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(6 + self.payload.len());
        out.push(match self.command {
            Command::DrainOutput => 1,
            Command::GetBidi => 2,
            Command::GetConnected => 3,
            Command::GetDeviceId => 4,
            Command::SnmpGet => 5,
            Command::SnmpGetNext => 6,
            Command::SoftReset => 7,
            Command::GetState => 8,
            Command::Unknown(b) => b,
        });
        out.push(self.status.to_byte());
        out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Parse a request frame. Malformed frames (too short, length mismatch)
/// return `None` so the caller can reply `BAD_MESSAGE`.
pub fn parse_request(frame: &[u8]) -> Option<Request> {
    if frame.len() < 6 {
        return None;
    }
    let command = Command::from_byte(frame[0]);
    let length = u32::from_be_bytes([frame[2], frame[3], frame[4], frame[5]]) as usize;
    let payload = frame.get(6..6 + length)?.to_vec();
    Some(Request { command, payload })
}

/// State the handler needs across calls: whether bidi is in use, whether
/// the device fd is connected, and the SNMP peer (if this backend has one).
pub struct SideChannelState {
    pub bidi_in_use: bool,
    pub device_connected: bool,
    pub snmp_peer: Option<SocketAddr>,
    pub snmp_community: String,
    pub active_state_keywords: Vec<String>,
}

/// Dispatch one request and produce exactly one response, per §4.4's table.
/// `drain` is invoked for `drain-output`; `device_fd_valid` tells whether a
/// drain is even possible.
pub fn dispatch(
    frame: &[u8],
    state: &SideChannelState,
    device_fd_valid: bool,
    mut drain: impl FnMut() -> Result<()>,
) -> Response {
    let Some(request) = parse_request(frame) else {
        return Response::new(Command::Unknown(0), Status::BadMessage);
    };

    match request.command {
        Command::DrainOutput => {
            if !device_fd_valid {
                return Response::new(Command::DrainOutput, Status::NotImplemented);
            }
            match drain() {
                Ok(()) => Response::new(Command::DrainOutput, Status::Ok),
                Err(_) => Response::new(Command::DrainOutput, Status::IoError),
            }
        }
        Command::GetBidi => Response::with_payload(
            Command::GetBidi,
            Status::Ok,
            vec![state.bidi_in_use as u8],
        ),
        Command::GetConnected => Response::with_payload(
            Command::GetConnected,
            Status::Ok,
            vec![state.device_connected as u8],
        ),
        Command::GetDeviceId => get_device_id(state),
        Command::SnmpGet => snmp_proxy(&request, state, snmp_session::get),
        Command::SnmpGetNext => snmp_proxy(&request, state, snmp_session::get),
        Command::SoftReset => Response::new(Command::SoftReset, Status::Ok),
        Command::GetState => Response::with_payload(
            Command::GetState,
            Status::Ok,
            state.active_state_keywords.join(",").into_bytes(),
        ),
        Command::Unknown(_) => Response::new(request.command, Status::BadMessage),
    }
}

fn get_device_id(state: &SideChannelState) -> Response {
    const OID_1284_DEVICE_ID: &str = "1.3.6.1.2.1.43.15.1.1.2.1.1";

    if let Some(peer) = state.snmp_peer {
        if let Some(oid) = snmp_session::oid_from_str(OID_1284_DEVICE_ID) {
            if let Ok((_, value)) =
                snmp_session::get(peer, &state.snmp_community, &oid, 4, Duration::from_secs(1))
            {
                if let Some(text) = value.as_string() {
                    return Response::with_payload(Command::GetDeviceId, Status::Ok, text.into_bytes());
                }
            }
        }
    }

    match std::env::var("1284DEVICEID") {
        Ok(id) => Response::with_payload(Command::GetDeviceId, Status::Ok, id.into_bytes()),
        Err(_) => Response::new(Command::GetDeviceId, Status::NotImplemented),
    }
}

type GetFn = fn(SocketAddr, &str, &[u32], i32, Duration) -> Result<(i32, SnmpValue)>;

/// Shared snmp-get/snmp-get-next handling (§4.4, "snmp-get, snmp-get-next").
/// The payload is a single NUL-terminated dotted OID string.
fn snmp_proxy(request: &Request, state: &SideChannelState, get_fn: GetFn) -> Response {
    if request.payload.len() < 2 {
        return Response::new(request.command, Status::BadMessage);
    }
    let oid_str = match request.payload.iter().position(|&b| b == 0) {
        Some(pos) => String::from_utf8_lossy(&request.payload[..pos]).into_owned(),
        None => String::from_utf8_lossy(&request.payload).into_owned(),
    };

    if let Ok(mock_value) = std::env::var("CUPS_SNMP_VALUE") {
        let count: usize = std::env::var("CUPS_SNMP_COUNT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);
        let mut payload = oid_str.into_bytes();
        for _ in 0..count.max(1) {
            payload.push(0);
            payload.extend_from_slice(mock_value.as_bytes());
        }
        return Response::with_payload(request.command, Status::Ok, payload);
    }

    let Some(peer) = state.snmp_peer else {
        return Response::new(request.command, Status::NotImplemented);
    };
    let Some(oid) = snmp_session::oid_from_str(&oid_str) else {
        return Response::new(request.command, Status::BadMessage);
    };

    match get_fn(peer, &state.snmp_community, &oid, 100, Duration::from_secs(1)) {
        Ok((_, value)) => {
            let mut payload = oid_str.into_bytes();
            payload.push(0);
            payload.extend_from_slice(value.render().as_bytes());
            Response::with_payload(request.command, Status::Ok, payload)
        }
        Err(_) => Response::new(request.command, Status::IoError),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_state() -> SideChannelState {
        SideChannelState {
            bidi_in_use: false,
            device_connected: true,
            snmp_peer: None,
            snmp_community: "public".to_string(),
            active_state_keywords: vec!["media-empty-warning".to_string()],
        }
    }

    fn frame(command: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![command, 0];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn malformed_frame_yields_bad_message() {
        let state = default_state();
        let response = dispatch(&[1, 2, 3], &state, true, || Ok(()));
        assert_eq!(response.status, Status::BadMessage);
    }

    #[test]
    fn drain_output_not_implemented_without_device_fd() {
        let state = default_state();
        let response = dispatch(&frame(1, &[]), &state, false, || Ok(()));
        assert_eq!(response.status, Status::NotImplemented);
    }

    #[test]
    fn drain_output_ok_when_drain_succeeds() {
        let state = default_state();
        let response = dispatch(&frame(1, &[]), &state, true, || Ok(()));
        assert_eq!(response.status, Status::Ok);
    }

    #[test]
    fn get_bidi_reports_current_flag() {
        let mut state = default_state();
        state.bidi_in_use = true;
        let response = dispatch(&frame(2, &[]), &state, true, || Ok(()));
        assert_eq!(response.payload, vec![1]);
    }

    #[test]
    fn get_device_id_falls_back_to_env_var() {
        std::env::set_var("1284DEVICEID", "MFG:Acme;MDL:X;");
        let state = default_state();
        let response = dispatch(&frame(4, &[]), &state, true, || Ok(()));
        std::env::remove_var("1284DEVICEID");
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.payload, b"MFG:Acme;MDL:X;");
    }

    #[test]
    fn snmp_get_without_peer_and_no_mock_is_not_implemented() {
        let state = default_state();
        let mut payload = b"1.3.6.1.2.1.1.1.0".to_vec();
        payload.push(0);
        let response = dispatch(&frame(5, &payload), &state, true, || Ok(()));
        assert_eq!(response.status, Status::NotImplemented);
    }

    #[test]
    fn snmp_get_honors_mock_env_override() {
        // S4: CUPS_SNMP_VALUE="ACME42", CUPS_SNMP_COUNT="2" against OID
        // 1.3.6.1.2.1.43.5.1.1.17.1 yields the value NUL-repeated twice.
        std::env::set_var("CUPS_SNMP_VALUE", "ACME42");
        std::env::set_var("CUPS_SNMP_COUNT", "2");
        let state = default_state();
        let mut payload = b"1.3.6.1.2.1.43.5.1.1.17.1".to_vec();
        payload.push(0);
        let response = dispatch(&frame(5, &payload), &state, true, || Ok(()));
        std::env::remove_var("CUPS_SNMP_VALUE");
        std::env::remove_var("CUPS_SNMP_COUNT");
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.payload, b"1.3.6.1.2.1.43.5.1.1.17.1\0ACME42\0ACME42");
    }

    #[test]
    fn get_state_joins_active_keywords() {
        let state = default_state();
        let response = dispatch(&frame(8, &[]), &state, true, || Ok(()));
        assert_eq!(response.payload, b"media-empty-warning");
    }

    #[test]
    fn response_encode_round_trips_header_fields() {
        let response = Response::with_payload(Command::GetBidi, Status::Ok, vec![1]);
        let encoded = response.encode();
        assert_eq!(encoded[0], 2);
        assert_eq!(encoded[1], 0);
        assert_eq!(&encoded[2..6], &1u32.to_be_bytes());
        assert_eq!(&encoded[6..], &[1]);
    }
}
