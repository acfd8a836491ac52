// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DSC integration frame codec.
//!
//! A frame is a 3-digit ASCII command number, variable-length data, and a
//! 2-hex-digit checksum: the sum of the ASCII byte values of command+data,
//! modulo 256, upper-case. CRLF framing lives a layer below.

use thiserror::Error;

/// Errors decoding a DSC frame
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame too short: {0:?}")]
    TooShort(String),
    #[error("bad command number: {0:?}")]
    BadCommand(String),
    #[error("bad checksum on {frame:?}: computed {computed}")]
    BadChecksum { frame: String, computed: String },
}

/// Checksum over an already-concatenated command+data payload.
pub fn checksum(payload: &str) -> String {
    let sum: u32 = payload.bytes().map(u32::from).sum();
    format!("{:02X}", sum % 256)
}

/// Encode a command and its data into a frame (no CRLF).
pub fn encode(command: u16, data: &str) -> String {
    let payload = format!("{command:03}{data}");
    let check = checksum(&payload);
    format!("{payload}{check}")
}

/// Decode and verify a frame into (command, data).
pub fn decode(frame: &str) -> Result<(u16, String), CodecError> {
    if frame.len() < 5 {
        return Err(CodecError::TooShort(frame.to_string()));
    }
    let (payload, received_check) = frame.split_at(frame.len() - 2);
    let command: u16 = payload[..3]
        .parse()
        .map_err(|_| CodecError::BadCommand(frame.to_string()))?;
    let computed = checksum(payload);
    if computed != received_check {
        return Err(CodecError::BadChecksum {
            frame: frame.to_string(),
            computed,
        });
    }
    Ok((command, payload[3..].to_string()))
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
