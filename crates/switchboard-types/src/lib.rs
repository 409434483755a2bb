//! Shared types and constants for the Switchboard voice gateway.
//!
//! This crate provides the foundational types used across all Switchboard
//! crates: call lifecycle status, conversation turns, transcript events,
//! agent profiles, and audio source descriptors.
//!
//! No crate in the workspace depends on anything *except* `switchboard-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a telephony call.
///
/// Providers report status as free-form strings in webhook callbacks; the
/// known values map onto closed variants and anything else is carried in
/// [`CallStatus::Unknown`] so a new provider value is recorded rather than
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    /// Call created, not yet ringing.
    Initiated,
    /// Callee's phone is ringing.
    Ringing,
    /// Call answered; media is (or may be) flowing.
    InProgress,
    /// Call ended normally.
    Completed,
    /// Provider-side failure.
    Failed,
    /// Callee was busy.
    Busy,
    /// Callee did not answer.
    NoAnswer,
    /// Unrecognized provider value, preserved verbatim.
    Unknown(String),
}

impl CallStatus {
    /// Parses a provider-reported status string.
    ///
    /// `answered` is an alias some providers use for `in-progress`.
    pub fn parse(s: &str) -> Self {
        match s {
            "initiated" | "queued" => Self::Initiated,
            "ringing" => Self::Ringing,
            "in-progress" | "answered" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "busy" => Self::Busy,
            "no-answer" => Self::NoAnswer,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns the canonical string form for this status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Initiated => "initiated",
            Self::Ringing => "ringing",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Busy => "busy",
            Self::NoAnswer => "no-answer",
            Self::Unknown(s) => s,
        }
    }

    /// True iff the call is in the single "live" state where playback and
    /// transcription make sense.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// True for states from which a call can never return to activity.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Busy | Self::NoAnswer
        )
    }
}

impl Serialize for CallStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CallStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The caller.
    User,
    /// The agent.
    Assistant,
}

impl TurnRole {
    /// Returns the wire label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One entry in a call's bounded conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Event published on the per-call transcript bus.
///
/// Ephemeral by design: delivered to whoever is subscribed at publish time
/// and dropped otherwise. Serialized with a `type` tag for the live-monitor
/// feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TranscriptEvent {
    /// A transcript line, interim or final.
    Transcript {
        role: TurnRole,
        text: String,
        #[serde(rename = "final")]
        is_final: bool,
    },
    /// A call lifecycle status change.
    Status { status: CallStatus },
    /// The call's feed is over; no further events will arrive.
    Close,
}

/// Configuration of a conversational agent, resolved before a response
/// pipeline can run.
///
/// Persistence of agent records is out of scope for the gateway; profiles
/// arrive from the surrounding product (here: a directory loaded at startup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Stable agent identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// System instructions fed to the text-generation collaborator.
    pub instructions: String,
    /// Voice identifier for the TTS collaborator. `None` selects the
    /// synthesizer's default voice.
    #[serde(default)]
    pub voice_id: Option<String>,
    /// Optional greeting spoken when the media stream opens.
    #[serde(default)]
    pub greeting: Option<String>,
    /// Phone number this agent answers, in E.164 form.
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Where a bridge connection's audio comes from.
///
/// The STT session's encoding parameters are derived from this: telephony
/// streams carry 8 kHz mu-law, direct (browser) streams carry 16 kHz
/// linear PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSource {
    /// A telephony media stream (one call leg).
    Telephony,
    /// A direct browser/test connection.
    Direct,
}

impl AudioSource {
    /// Audio encoding label understood by the STT collaborator.
    pub fn encoding(self) -> &'static str {
        match self {
            Self::Telephony => "mulaw",
            Self::Direct => "linear16",
        }
    }

    /// Sample rate of the inbound audio in Hz.
    pub fn sample_rate(self) -> u32 {
        match self {
            Self::Telephony => 8_000,
            Self::Direct => 16_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_status_round_trip() {
        for status in [
            CallStatus::Initiated,
            CallStatus::Ringing,
            CallStatus::InProgress,
            CallStatus::Completed,
            CallStatus::Failed,
            CallStatus::Busy,
            CallStatus::NoAnswer,
        ] {
            assert_eq!(CallStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn call_status_answered_alias() {
        assert_eq!(CallStatus::parse("answered"), CallStatus::InProgress);
    }

    #[test]
    fn call_status_unknown_preserved() {
        let status = CallStatus::parse("pre-dial-wait");
        assert_eq!(status, CallStatus::Unknown("pre-dial-wait".to_string()));
        assert_eq!(status.as_str(), "pre-dial-wait");
        assert!(!status.is_active());
        assert!(!status.is_terminal());
    }

    #[test]
    fn call_status_activity_and_terminality() {
        assert!(CallStatus::InProgress.is_active());
        assert!(!CallStatus::Ringing.is_active());
        assert!(CallStatus::Completed.is_terminal());
        assert!(CallStatus::NoAnswer.is_terminal());
        assert!(!CallStatus::InProgress.is_terminal());
    }

    #[test]
    fn transcript_event_serializes_with_type_tag() {
        let event = TranscriptEvent::Transcript {
            role: TurnRole::User,
            text: "hello".to_string(),
            is_final: true,
        };
        let json = serde_json::to_value(&event).expect("serialization should not fail");
        assert_eq!(json.get("type").and_then(|v| v.as_str()), Some("transcript"));
        assert_eq!(json.get("role").and_then(|v| v.as_str()), Some("user"));
        assert_eq!(json.get("final").and_then(|v| v.as_bool()), Some(true));

        let close = serde_json::to_value(TranscriptEvent::Close).unwrap();
        assert_eq!(close.get("type").and_then(|v| v.as_str()), Some("close"));
    }

    #[test]
    fn status_event_serializes_status_string() {
        let event = TranscriptEvent::Status {
            status: CallStatus::InProgress,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json.get("status").and_then(|v| v.as_str()), Some("in-progress"));
    }

    #[test]
    fn audio_source_stt_parameters() {
        assert_eq!(AudioSource::Telephony.encoding(), "mulaw");
        assert_eq!(AudioSource::Telephony.sample_rate(), 8_000);
        assert_eq!(AudioSource::Direct.encoding(), "linear16");
        assert_eq!(AudioSource::Direct.sample_rate(), 16_000);
    }
}
