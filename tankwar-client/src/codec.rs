//! Length-prefixed binary framing
//!
//! Requests: `u32 LE action | u32 LE length | payload`.
//! Responses: `u32 LE result | u32 LE length | payload`.
//! Payloads are UTF-8 JSON documents and may be empty.

use std::fmt;
use std::io::{ErrorKind, Read};

use crate::error::ProtocolError;

pub const HEADER_LEN: usize = 8;

/// Default cap on a single frame's payload
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Login,
    Logout,
    Map,
    GameState,
    GameActions,
    Turn,
    Chat,
    Move,
    Shoot,
}

impl Action {
    pub fn code(self) -> u32 {
        match self {
            Action::Login => 1,
            Action::Logout => 2,
            Action::Map => 3,
            Action::GameState => 4,
            Action::GameActions => 5,
            Action::Turn => 6,
            Action::Chat => 100,
            Action::Move => 101,
            Action::Shoot => 102,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Action::Login,
            2 => Action::Logout,
            3 => Action::Map,
            4 => Action::GameState,
            5 => Action::GameActions,
            6 => Action::Turn,
            100 => Action::Chat,
            101 => Action::Move,
            102 => Action::Shoot,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Okey,
    BadCommand,
    AccessDenied,
    InappropriateGameState,
    Timeout,
    InternalServerError,
    Other(u32),
}

impl ResultCode {
    pub fn code(self) -> u32 {
        match self {
            ResultCode::Okey => 0,
            ResultCode::BadCommand => 1,
            ResultCode::AccessDenied => 2,
            ResultCode::InappropriateGameState => 3,
            ResultCode::Timeout => 4,
            ResultCode::InternalServerError => 500,
            ResultCode::Other(code) => code,
        }
    }

    pub fn from_code(code: u32) -> Self {
        match code {
            0 => ResultCode::Okey,
            1 => ResultCode::BadCommand,
            2 => ResultCode::AccessDenied,
            3 => ResultCode::InappropriateGameState,
            4 => ResultCode::Timeout,
            500 => ResultCode::InternalServerError,
            other => ResultCode::Other(other),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResultCode::Okey => "ok",
            ResultCode::BadCommand => "bad command",
            ResultCode::AccessDenied => "access denied",
            ResultCode::InappropriateGameState => "inappropriate game state",
            ResultCode::Timeout => "timeout",
            ResultCode::InternalServerError => "internal server error",
            ResultCode::Other(_) => "unknown",
        };
        write!(f, "{} {}", self.code(), label)
    }
}

/// A decoded frame: the leading code and the payload bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub code: u32,
    pub payload: Vec<u8>,
}

fn encode(code: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&code.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Frame a request. Without a payload the length field is zero.
pub fn encode_request(action: Action, payload: Option<&[u8]>) -> Vec<u8> {
    encode(action.code(), payload.unwrap_or_default())
}

pub fn encode_response(result: ResultCode, payload: &[u8]) -> Vec<u8> {
    encode(result.code(), payload)
}

/// Fill `buf` completely, looping over short reads.
///
/// A zero-byte read means the peer hung up mid-frame.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8], outstanding: usize) -> Result<(), ProtocolError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(ProtocolError::ConnectionClosed {
                    missing: outstanding - filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Read one complete frame, refusing payloads longer than `max_len`
pub fn read_frame<R: Read>(reader: &mut R, max_len: usize) -> Result<Frame, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    fill(reader, &mut header, HEADER_LEN)?;

    let code = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    if len > max_len {
        return Err(ProtocolError::FrameTooLarge { len, limit: max_len });
    }

    let mut payload = vec![0u8; len];
    fill(reader, &mut payload, len)?;
    Ok(Frame { code, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    /// Yields at most `chunk` bytes per read
    struct Trickle {
        data: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.data.read(&mut buf[..n])
        }
    }

    #[test]
    fn test_request_without_payload() {
        let frame = encode_request(Action::Turn, None);
        assert_eq!(frame, vec![6, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_request_layout() {
        let frame = encode_request(Action::Shoot, Some(b"{}"));
        assert_eq!(frame, vec![102, 0, 0, 0, 2, 0, 0, 0, b'{', b'}']);
    }

    #[test]
    fn test_codes_round_trip() {
        for code in [1, 2, 3, 4, 5, 6, 100, 101, 102] {
            assert_eq!(Action::from_code(code).map(Action::code), Some(code));
        }
        assert_eq!(Action::from_code(7), None);
        assert_eq!(ResultCode::from_code(500), ResultCode::InternalServerError);
        assert_eq!(ResultCode::from_code(77), ResultCode::Other(77));
    }

    #[test]
    fn test_truncated_body_is_fatal() {
        let mut bytes = encode_response(ResultCode::Okey, b"hello");
        bytes.truncate(HEADER_LEN + 2);
        let err = read_frame(&mut Cursor::new(bytes), DEFAULT_MAX_FRAME_LEN).unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed { missing: 3 }));
    }

    #[test]
    fn test_empty_stream_is_closed() {
        let err = read_frame(&mut Cursor::new(Vec::new()), DEFAULT_MAX_FRAME_LEN).unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed { missing: HEADER_LEN }));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let bytes = encode_response(ResultCode::Okey, &[0u8; 64]);
        let err = read_frame(&mut Cursor::new(bytes), 16).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { len: 64, limit: 16 }));
    }

    proptest! {
        #[test]
        fn frames_survive_partial_reads(
            payload in proptest::collection::vec(any::<u8>(), 0..4096),
            code in 0u32..600,
            chunk in 1usize..64,
        ) {
            let mut bytes = encode_response(ResultCode::from_code(code), &payload);
            // a second frame right behind the first must be left untouched
            bytes.extend(encode_response(ResultCode::Okey, b"next"));
            let mut reader = Trickle { data: Cursor::new(bytes), chunk };

            let first = read_frame(&mut reader, DEFAULT_MAX_FRAME_LEN).unwrap();
            prop_assert_eq!(first.code, code);
            prop_assert_eq!(first.payload, payload);

            let second = read_frame(&mut reader, DEFAULT_MAX_FRAME_LEN).unwrap();
            prop_assert_eq!(second.payload, b"next".to_vec());
        }
    }
}
