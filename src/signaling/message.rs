//! Signaling wire model and codec.
//!
//! Messages are JSON objects exchanged with the streaming server over the
//! WebSocket signaling channel:
//!
//! ```json
//! {
//!   "direction": "play",
//!   "command": "getOffer" | "sendResponse",
//!   "streamInfo": { "applicationName": "live", "streamName": "s1", "sessionId": "[empty]" },
//!   "sdp": { "type": "offer", "sdp": "v=0..." },
//!   "iceCandidates": [ { "candidate": "...", "sdpMid": "0", "sdpMLineIndex": 0 } ],
//!   "status": 200, "statusDescription": "OK"
//! }
//! ```
//!
//! Absent optional fields are omitted on encode. Unrecognized fields are
//! ignored on decode.

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DecodeError;

/// Placeholder session id sent before the server assigns one
pub const SESSION_ID_UNSET: &str = "[empty]";

/// Status code the server uses for successful responses
pub const STATUS_OK: u16 = 200;

/// Stream direction requested from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Play,
}

/// Signaling command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    /// Request an offer (outbound) / the offer itself (inbound)
    GetOffer,
    /// Carries our answer (outbound) or the server's ICE candidates (inbound)
    SendResponse,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::GetOffer => "getOffer",
            Command::SendResponse => "sendResponse",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "getOffer" => Some(Command::GetOffer),
            "sendResponse" => Some(Command::SendResponse),
            _ => None,
        }
    }
}

/// Server-assigned session id.
///
/// Travels as a plain string; `"[empty]"`, an empty string or `null` means unset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionId {
    #[default]
    Unset,
    Assigned(String),
}

impl SessionId {
    pub fn from_wire(s: &str) -> Self {
        if s.is_empty() || s == SESSION_ID_UNSET {
            SessionId::Unset
        } else {
            SessionId::Assigned(s.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SessionId::Unset => SESSION_ID_UNSET,
            SessionId::Assigned(id) => id,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, SessionId::Assigned(_))
    }
}

impl Serialize for SessionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.map_or(SessionId::Unset, |s| SessionId::from_wire(&s)))
    }
}

/// Identifies the stream being negotiated (`streamInfo` on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamIdentity {
    pub application_name: String,
    pub stream_name: String,
    #[serde(default)]
    pub session_id: SessionId,
}

impl StreamIdentity {
    /// Create an identity with the session id still unset
    pub fn new(application_name: &str, stream_name: &str) -> Self {
        Self {
            application_name: application_name.to_string(),
            stream_name: stream_name.to_string(),
            session_id: SessionId::Unset,
        }
    }

    /// Record the server-assigned session id.
    ///
    /// Only the first concrete id is taken; returns whether it was recorded.
    pub fn assign_session_id(&mut self, id: &SessionId) -> bool {
        if self.session_id.is_assigned() || !id.is_assigned() {
            return false;
        }
        self.session_id = id.clone();
        true
    }
}

/// SDP type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Session description (`sdp` on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Remote ICE candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, deserialize_with = "null_as_default")]
    pub sdp_mid: String,
    #[serde(rename = "sdpMLineIndex", default, deserialize_with = "null_as_default")]
    pub sdp_mline_index: u16,
}

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Opaque application data forwarded to the server
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param1: Option<String>,
}

/// Signaling envelope as it travels on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    pub command: Command,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_info: Option<StreamIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<UserData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_candidates: Option<Vec<IceCandidate>>,
}

impl SignalingMessage {
    fn new(command: Command) -> Self {
        Self {
            status: None,
            status_description: None,
            direction: None,
            command,
            stream_info: None,
            user_data: None,
            sdp: None,
            ice_candidates: None,
        }
    }

    /// Initial play request
    pub fn get_offer(stream_info: &StreamIdentity, user_data: Option<UserData>) -> Self {
        Self {
            direction: Some(Direction::Play),
            stream_info: Some(stream_info.clone()),
            user_data,
            ..Self::new(Command::GetOffer)
        }
    }

    /// Carries a locally applied description back to the server
    pub fn description(stream_info: &StreamIdentity, description: SessionDescription) -> Self {
        Self {
            direction: Some(Direction::Play),
            stream_info: Some(stream_info.clone()),
            sdp: Some(description),
            ..Self::new(Command::SendResponse)
        }
    }
}

/// Decoded inbound message, one variant per semantic payload.
///
/// `sendResponse` is shared between "carries a description" and "carries
/// candidates"; that is resolved here, once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Reply to our `getOffer`
    Offer {
        stream_info: StreamIdentity,
        description: SessionDescription,
    },
    /// `sendResponse` carrying only a description
    Description(SessionDescription),
    /// `sendResponse` carrying remote ICE candidates
    Candidates(Vec<IceCandidate>),
    /// `sendResponse` carrying neither
    Empty,
    /// Server answered with a non-OK status
    Rejected {
        command: Command,
        status: u16,
        description: String,
    },
}

impl TryFrom<SignalingMessage> for Inbound {
    type Error = DecodeError;

    fn try_from(msg: SignalingMessage) -> Result<Self, Self::Error> {
        if let Some(status) = msg.status.filter(|s| *s != STATUS_OK) {
            return Ok(Inbound::Rejected {
                command: msg.command,
                status,
                description: msg.status_description.unwrap_or_default(),
            });
        }

        match msg.command {
            Command::GetOffer => {
                let stream_info = msg.stream_info.ok_or(DecodeError::MissingField("streamInfo"))?;
                let description = msg.sdp.ok_or(DecodeError::MissingField("sdp"))?;
                Ok(Inbound::Offer {
                    stream_info,
                    description,
                })
            }
            Command::SendResponse => match (msg.ice_candidates, msg.sdp) {
                (Some(candidates), _) => Ok(Inbound::Candidates(candidates)),
                (None, Some(description)) => Ok(Inbound::Description(description)),
                (None, None) => Ok(Inbound::Empty),
            },
        }
    }
}

/// Stateless JSON codec for signaling messages
pub struct SignalingCodec;

impl SignalingCodec {
    /// Serialize a message, omitting unset optional fields
    pub fn encode(msg: &SignalingMessage) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(msg).map(Bytes::from)
    }

    /// Parse a message; fails on malformed JSON or an unrecognized command
    pub fn decode(data: &[u8]) -> Result<SignalingMessage, DecodeError> {
        let value: serde_json::Value = serde_json::from_slice(data)?;

        let command = value
            .get("command")
            .and_then(serde_json::Value::as_str)
            .ok_or(DecodeError::MissingField("command"))?;
        if Command::from_wire(command).is_none() {
            return Err(DecodeError::UnknownCommand(command.to_string()));
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Parse and classify an inbound frame
    pub fn decode_inbound(data: &[u8]) -> Result<Inbound, DecodeError> {
        Self::decode(data)?.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> StreamIdentity {
        StreamIdentity::new("live", "s1")
    }

    #[test]
    fn test_get_offer_wire_format() {
        let msg = SignalingMessage::get_offer(&stream(), None);
        let json = SignalingCodec::encode(&msg).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "direction": "play",
                "command": "getOffer",
                "streamInfo": {
                    "applicationName": "live",
                    "streamName": "s1",
                    "sessionId": "[empty]"
                }
            })
        );
    }

    #[test]
    fn test_encode_omits_absent_fields() {
        let msg = SignalingMessage::description(&stream(), SessionDescription::answer("v=0\r\n"));
        let json = String::from_utf8(SignalingCodec::encode(&msg).unwrap().to_vec()).unwrap();

        assert!(!json.contains("null"));
        assert!(!json.contains("iceCandidates"));
        assert!(!json.contains("status"));
        assert!(json.contains("\"command\":\"sendResponse\""));
        assert!(json.contains("\"type\":\"answer\""));
    }

    #[test]
    fn test_user_data_sent_with_get_offer() {
        let user_data = UserData {
            param1: Some("value1".to_string()),
        };
        let msg = SignalingMessage::get_offer(&stream(), Some(user_data));
        let json = String::from_utf8(SignalingCodec::encode(&msg).unwrap().to_vec()).unwrap();
        assert!(json.contains("\"userData\":{\"param1\":\"value1\"}"));
    }

    #[test]
    fn test_decode_offer_reply() {
        let json = br#"{"status":200,"statusDescription":"OK","direction":"play","command":"getOffer",
            "streamInfo":{"applicationName":"live","streamName":"s1","sessionId":"abc123"},
            "sdp":{"type":"offer","sdp":"v=0..."}}"#;

        match SignalingCodec::decode_inbound(json).unwrap() {
            Inbound::Offer {
                stream_info,
                description,
            } => {
                assert_eq!(stream_info.session_id, SessionId::Assigned("abc123".to_string()));
                assert_eq!(description, SessionDescription::offer("v=0..."));
            }
            other => panic!("Expected offer, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_candidates() {
        let json = br#"{"command":"sendResponse","iceCandidates":[
            {"candidate":"cand1","sdpMid":"0","sdpMLineIndex":0},
            {"candidate":"cand2","sdpMid":"1","sdpMLineIndex":1}]}"#;

        let inbound = SignalingCodec::decode_inbound(json).unwrap();
        let Inbound::Candidates(candidates) = inbound else {
            panic!("Expected candidates");
        };
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].candidate, "cand2");
        assert_eq!(candidates[1].sdp_mid, "1");
        assert_eq!(candidates[1].sdp_mline_index, 1);
    }

    #[test]
    fn test_decode_null_candidate_fields() {
        let json = br#"{"command":"sendResponse","iceCandidates":[
            {"candidate":"cand1","sdpMid":null,"sdpMLineIndex":null},
            {"candidate":"cand2","sdpMid":"0","sdpMLineIndex":0}]}"#;

        let Inbound::Candidates(candidates) = SignalingCodec::decode_inbound(json).unwrap() else {
            panic!("Expected candidates");
        };
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].sdp_mid, "");
        assert_eq!(candidates[0].sdp_mline_index, 0);
        assert_eq!(candidates[1].candidate, "cand2");
        assert_eq!(candidates[1].sdp_mid, "0");
    }

    #[test]
    fn test_decode_null_session_id() {
        let json = br#"{"status":200,"command":"getOffer",
            "streamInfo":{"applicationName":"live","streamName":"s1","sessionId":null},
            "sdp":{"type":"offer","sdp":"v=0"}}"#;

        let Inbound::Offer { stream_info, .. } = SignalingCodec::decode_inbound(json).unwrap() else {
            panic!("Expected offer");
        };
        assert_eq!(stream_info.session_id, SessionId::Unset);
    }

    #[test]
    fn test_decode_candidates_win_over_description() {
        let json = br#"{"command":"sendResponse","sdp":{"type":"answer","sdp":"v=0"},
            "iceCandidates":[{"candidate":"cand1","sdpMid":"0","sdpMLineIndex":0}]}"#;

        let Inbound::Candidates(candidates) = SignalingCodec::decode_inbound(json).unwrap() else {
            panic!("Expected candidates");
        };
        assert_eq!(candidates[0].candidate, "cand1");
    }

    #[test]
    fn test_decode_send_response_variants() {
        let answer = br#"{"command":"sendResponse","sdp":{"type":"answer","sdp":"v=0"}}"#;
        assert_eq!(
            SignalingCodec::decode_inbound(answer).unwrap(),
            Inbound::Description(SessionDescription::answer("v=0"))
        );

        let empty = br#"{"command":"sendResponse","status":200}"#;
        assert_eq!(SignalingCodec::decode_inbound(empty).unwrap(), Inbound::Empty);
    }

    #[test]
    fn test_decode_rejected_status() {
        let json = br#"{"status":502,"statusDescription":"Stream not found","command":"getOffer"}"#;
        assert_eq!(
            SignalingCodec::decode_inbound(json).unwrap(),
            Inbound::Rejected {
                command: Command::GetOffer,
                status: 502,
                description: "Stream not found".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_unknown_command() {
        let json = br#"{"command":"foo","direction":"play"}"#;
        match SignalingCodec::decode(json) {
            Err(DecodeError::UnknownCommand(cmd)) => assert_eq!(cmd, "foo"),
            other => panic!("Expected UnknownCommand, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(SignalingCodec::decode(b"{not json"), Err(DecodeError::Json(_))));
        assert!(matches!(
            SignalingCodec::decode(br#"{"direction":"play"}"#),
            Err(DecodeError::MissingField("command"))
        ));
        assert!(matches!(
            SignalingCodec::decode_inbound(br#"{"command":"getOffer","sdp":{"type":"offer","sdp":""}}"#),
            Err(DecodeError::MissingField("streamInfo"))
        ));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let json = br#"{"command":"sendResponse","futureField":{"x":1},"iceCandidates":[]}"#;
        assert_eq!(
            SignalingCodec::decode_inbound(json).unwrap(),
            Inbound::Candidates(vec![])
        );
    }

    #[test]
    fn test_decode_encode_identity() {
        let mut assigned = stream();
        assigned.assign_session_id(&SessionId::Assigned("abc123".to_string()));

        let messages = vec![
            SignalingMessage::get_offer(&stream(), None),
            SignalingMessage::get_offer(&assigned, Some(UserData { param1: Some("p".into()) })),
            SignalingMessage::description(&assigned, SessionDescription::offer("v=0\r\n")),
            SignalingMessage {
                status: Some(200),
                status_description: Some("OK".to_string()),
                ice_candidates: Some(vec![IceCandidate {
                    candidate: "cand1".to_string(),
                    sdp_mid: "0".to_string(),
                    sdp_mline_index: 0,
                }]),
                ..SignalingMessage::description(&assigned, SessionDescription::answer("v=0"))
            },
        ];

        for msg in messages {
            let encoded = SignalingCodec::encode(&msg).unwrap();
            assert_eq!(SignalingCodec::decode(&encoded).unwrap(), msg);
        }
    }

    #[test]
    fn test_session_id_assigned_once() {
        let mut identity = stream();
        assert!(!identity.assign_session_id(&SessionId::Unset));
        assert!(identity.assign_session_id(&SessionId::Assigned("abc123".to_string())));
        assert!(!identity.assign_session_id(&SessionId::Assigned("other".to_string())));
        assert_eq!(identity.session_id.as_str(), "abc123");
    }
}
