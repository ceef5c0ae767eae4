use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize, Serializer};

// Row reference inside one snapshot; not stable across snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub i64);

impl std::fmt::Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalise a stored millisecond timestamp. Zero and negative values are
/// how the source marks "never happened".
pub fn stored_millis(raw: Option<i64>) -> Option<i64> {
    raw.filter(|ms| *ms > 0)
}

/// Render epoch milliseconds as an RFC 3339 UTC string.
pub fn millis_to_iso(ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn unknown_code(f: &mut std::fmt::Formatter<'_>, code: Option<i64>) -> std::fmt::Result {
    match code {
        Some(code) => write!(f, "unknown:{code}"),
        None => write!(f, "unknown"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn from_flag(from_me: bool) -> Self {
        if from_me {
            Self::Sent
        } else {
            Self::Received
        }
    }
}

/// Delivery state decoded from `message.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Received,
    Sent,
    Delivered,
    Read,
    Played,
    /// Code outside the known table, kept so nothing is lost.
    Unknown(Option<i64>),
}

impl DeliveryStatus {
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => Self::Received,
            Some(4) => Self::Sent,
            Some(5) => Self::Delivered,
            Some(6) => Self::Read,
            Some(13) => Self::Played,
            other => Self::Unknown(other),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => f.write_str("received"),
            Self::Sent => f.write_str("sent"),
            Self::Delivered => f.write_str("delivered"),
            Self::Read => f.write_str("read"),
            Self::Played => f.write_str("played"),
            Self::Unknown(code) => unknown_code(f, *code),
        }
    }
}

impl Serialize for DeliveryStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Content kind decoded from `message.message_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    System,
    Document,
    MissedCall,
    Gif,
    Deleted,
    LiveLocation,
    Sticker,
    Poll,
    ViewOnceImage,
    ViewOnceVideo,
    PollUpdate,
    CallLog,
    E2eNotification,
    EphemeralNotification,
    CommunityAlert,
    Event,
    Unknown(Option<i64>),
}

impl MessageKind {
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => Self::Text,
            Some(1) => Self::Image,
            Some(2) => Self::Audio,
            Some(3) => Self::Video,
            Some(7) => Self::System,
            Some(9) => Self::Document,
            Some(10) => Self::MissedCall,
            Some(13) => Self::Gif,
            Some(15) => Self::Deleted,
            Some(16) => Self::LiveLocation,
            Some(20) => Self::Sticker,
            Some(27) => Self::Poll,
            Some(42) => Self::ViewOnceImage,
            Some(43) => Self::ViewOnceVideo,
            Some(64) => Self::PollUpdate,
            Some(66) => Self::CallLog,
            Some(90) => Self::E2eNotification,
            Some(99) => Self::EphemeralNotification,
            Some(112) => Self::CommunityAlert,
            Some(116) => Self::Event,
            other => Self::Unknown(other),
        }
    }

    fn name(&self) -> Option<&'static str> {
        Some(match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::System => "system",
            Self::Document => "document",
            Self::MissedCall => "missed_call",
            Self::Gif => "gif",
            Self::Deleted => "deleted",
            Self::LiveLocation => "live_location",
            Self::Sticker => "sticker",
            Self::Poll => "poll",
            Self::ViewOnceImage => "view_once_image",
            Self::ViewOnceVideo => "view_once_video",
            Self::PollUpdate => "poll_update",
            Self::CallLog => "call_log",
            Self::E2eNotification => "e2e_notification",
            Self::EphemeralNotification => "ephemeral_notification",
            Self::CommunityAlert => "community_alert",
            Self::Event => "event",
            Self::Unknown(_) => return None,
        })
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.name(), self) {
            (Some(name), _) => f.write_str(name),
            (None, Self::Unknown(code)) => unknown_code(f, *code),
            (None, _) => unknown_code(f, None),
        }
    }
}

impl Serialize for MessageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome decoded from `call_log.call_result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallResult {
    Unknown,
    Missed,
    Rejected,
    Busy,
    Answered,
    Unavailable,
    Declined,
    Other(Option<i64>),
}

impl CallResult {
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => Self::Unknown,
            Some(2) => Self::Missed,
            Some(3) => Self::Rejected,
            Some(4) => Self::Busy,
            Some(5) => Self::Answered,
            Some(7) => Self::Unavailable,
            Some(8) => Self::Declined,
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for CallResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Missed => f.write_str("missed"),
            Self::Rejected => f.write_str("rejected"),
            Self::Busy => f.write_str("busy"),
            Self::Answered => f.write_str("answered"),
            Self::Unavailable => f.write_str("unavailable"),
            Self::Declined => f.write_str("declined"),
            Self::Other(code) => unknown_code(f, *code),
        }
    }
}

impl Serialize for CallResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
