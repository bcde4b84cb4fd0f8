// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Wire framing (§4.8): turning bytes read off a transport into [`crate::message::Message`]
//! values and back. Out of scope for the core's own wire format — production hubs bring
//! their own; the bundled [`LengthPrefixedCodec`] is a minimal length-prefixed framing
//! good enough for the loopback transport the tests drive.

use crate::error::HubResult;
use crate::message::Message;
use crate::types::{Group, Uid};

pub trait FrameCodec: Send {
    /// Attempts to decode one complete frame from the front of `buffer`, consuming the
    /// bytes it used. Returns `Ok(None)` if `buffer` doesn't yet hold a full frame.
    fn decode(&mut self, buffer: &mut Vec<u8>) -> HubResult<Option<Message>>;

    /// Encodes `message` onto the wire, appending to `out`.
    fn encode(&mut self, message: &Message, out: &mut Vec<u8>) -> HubResult<()>;
}

/// `[len: u32][source: u64][destination: u64][group: u32][sequence: u64][flags: u8][hop_count: u32][payload]`.
#[derive(Debug, Default)]
pub struct LengthPrefixedCodec;

const HEADER_LEN: usize = 4 + 8 + 8 + 4 + 8 + 1 + 4;

impl FrameCodec for LengthPrefixedCodec {
    fn decode(&mut self, buffer: &mut Vec<u8>) -> HubResult<Option<Message>> {
        if buffer.len() < 4 {
            return Ok(None);
        }
        let payload_len = u32::from_be_bytes(buffer[0..4].try_into().unwrap()) as usize;
        let total = HEADER_LEN + payload_len;
        if buffer.len() < total {
            return Ok(None);
        }
        let frame: Vec<u8> = buffer.drain(..total).collect();
        let source = u64::from_be_bytes(frame[4..12].try_into().unwrap());
        let destination = u64::from_be_bytes(frame[12..20].try_into().unwrap());
        let group = u32::from_be_bytes(frame[20..24].try_into().unwrap());
        let sequence = u64::from_be_bytes(frame[24..32].try_into().unwrap());
        let flags = frame[32];
        let hop_count = u32::from_be_bytes(frame[33..37].try_into().unwrap());
        let payload = frame[HEADER_LEN..].to_vec();

        let mut message = Message::new(Uid(source), Uid(destination), payload);
        message.group = Group(group);
        message.sequence = sequence;
        message.flags = crate::message::MessageFlags::from_bits_truncate(flags);
        message.hop_count = hop_count;
        Ok(Some(message))
    }

    fn encode(&mut self, message: &Message, out: &mut Vec<u8>) -> HubResult<()> {
        out.extend_from_slice(&(message.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&message.source.get().to_be_bytes());
        out.extend_from_slice(&message.destination.get().to_be_bytes());
        out.extend_from_slice(&message.group.0.to_be_bytes());
        out.extend_from_slice(&message.sequence.to_be_bytes());
        out.push(message.flags.bits());
        out.extend_from_slice(&message.hop_count.to_be_bytes());
        out.extend_from_slice(&message.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_frame() {
        let mut codec = LengthPrefixedCodec;
        let mut message = Message::new(Uid(1), Uid(2), vec![9, 9, 9]);
        message.sequence = 42;
        let mut wire = Vec::new();
        codec.encode(&message, &mut wire).unwrap();

        let decoded = codec.decode(&mut wire).unwrap().unwrap();
        assert_eq!(decoded.source, Uid(1));
        assert_eq!(decoded.destination, Uid(2));
        assert_eq!(decoded.sequence, 42);
        assert_eq!(decoded.payload, vec![9, 9, 9]);
        assert!(wire.is_empty());
    }

    #[test]
    fn decode_waits_for_a_complete_frame() {
        let mut codec = LengthPrefixedCodec;
        let mut message = Message::new(Uid(1), Uid(2), vec![1, 2, 3, 4]);
        message.sequence = 1;
        let mut wire = Vec::new();
        codec.encode(&message, &mut wire).unwrap();
        let mut partial = wire[..wire.len() - 1].to_vec();
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }
}
