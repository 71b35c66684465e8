use serde::{Deserialize, Serialize};

use super::messages::{
    BubbleRemovedMsg, BubbleSpawnedMsg, ClientMessage, ColorAssignedMsg, ForceGameOverMsg,
    HelloMsg, MessageType, RequestColorMsg, ResetViewMsg, RoundEndedMsg, RoundStartedMsg,
    ScoreChangedMsg, ServerMessage, StartRoundMsg, TapBubbleMsg, TimeRemainingMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024; // 16 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    UnexpectedDirection(MessageType),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::UnexpectedDirection(t) => write!(f, "{t:?} is not valid in this direction"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::Hello(m) => encode_message(MessageType::Hello, m),
        ClientMessage::StartRound(m) => encode_message(MessageType::StartRound, m),
        ClientMessage::ForceGameOver(m) => encode_message(MessageType::ForceGameOver, m),
        ClientMessage::TapBubble(m) => encode_message(MessageType::TapBubble, m),
        ClientMessage::RequestColor(m) => encode_message(MessageType::RequestColor, m),
    }
}

pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::RoundStarted(m) => encode_message(MessageType::RoundStarted, m),
        ServerMessage::RoundEnded(m) => encode_message(MessageType::RoundEnded, m),
        ServerMessage::ResetView(m) => encode_message(MessageType::ResetView, m),
        ServerMessage::TimeRemaining(m) => encode_message(MessageType::TimeRemaining, m),
        ServerMessage::ColorAssigned(m) => encode_message(MessageType::ColorAssigned, m),
        ServerMessage::ScoreChanged(m) => encode_message(MessageType::ScoreChanged, m),
        ServerMessage::BubbleSpawned(m) => encode_message(MessageType::BubbleSpawned, m),
        ServerMessage::BubbleRemoved(m) => encode_message(MessageType::BubbleRemoved, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    let Some(&first) = data.first() else {
        return Err(ProtocolError::EmptyMessage);
    };
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }
    MessageType::from_byte(first).ok_or(ProtocolError::UnknownMessageType(first))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::Hello => Ok(ClientMessage::Hello(decode_payload::<HelloMsg>(data)?)),
        MessageType::StartRound => Ok(ClientMessage::StartRound(
            decode_payload::<StartRoundMsg>(data)?,
        )),
        MessageType::ForceGameOver => Ok(ClientMessage::ForceGameOver(decode_payload::<
            ForceGameOverMsg,
        >(data)?)),
        MessageType::TapBubble => Ok(ClientMessage::TapBubble(decode_payload::<TapBubbleMsg>(
            data,
        )?)),
        MessageType::RequestColor => Ok(ClientMessage::RequestColor(decode_payload::<
            RequestColorMsg,
        >(data)?)),
        other => Err(ProtocolError::UnexpectedDirection(other)),
    }
}

pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::RoundStarted => Ok(ServerMessage::RoundStarted(decode_payload::<
            RoundStartedMsg,
        >(data)?)),
        MessageType::RoundEnded => Ok(ServerMessage::RoundEnded(
            decode_payload::<RoundEndedMsg>(data)?,
        )),
        MessageType::ResetView => Ok(ServerMessage::ResetView(decode_payload::<ResetViewMsg>(
            data,
        )?)),
        MessageType::TimeRemaining => Ok(ServerMessage::TimeRemaining(decode_payload::<
            TimeRemainingMsg,
        >(data)?)),
        MessageType::ColorAssigned => Ok(ServerMessage::ColorAssigned(decode_payload::<
            ColorAssignedMsg,
        >(data)?)),
        MessageType::ScoreChanged => Ok(ServerMessage::ScoreChanged(decode_payload::<
            ScoreChangedMsg,
        >(data)?)),
        MessageType::BubbleSpawned => Ok(ServerMessage::BubbleSpawned(decode_payload::<
            BubbleSpawnedMsg,
        >(data)?)),
        MessageType::BubbleRemoved => Ok(ServerMessage::BubbleRemoved(decode_payload::<
            BubbleRemovedMsg,
        >(data)?)),
        other => Err(ProtocolError::UnexpectedDirection(other)),
    }
}
