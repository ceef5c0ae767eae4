/// Archive format version written at the top of every archive
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;

/// Identifier of the synthetic chat that collects messages whose chat row is missing
pub const UNKNOWN_CHAT_ID: &str = "unknown";

/// Person addresses
pub const SERVER_PERSON: &str = "s.whatsapp.net";

/// Legacy person server, folded into [`SERVER_PERSON`]
pub const SERVER_PERSON_LEGACY: &str = "c.us";

/// Linked (hidden) person addresses
pub const SERVER_LINKED: &str = "lid";

/// Group addresses
pub const SERVER_GROUP: &str = "g.us";

/// Broadcast lists and status updates
pub const SERVER_BROADCAST: &str = "broadcast";

/// Channels
pub const SERVER_NEWSLETTER: &str = "newsletter";

/// `message_add_on.message_add_on_type` for an emoji reaction
pub const ADD_ON_REACTION: i64 = 56;

/// `message_add_on.message_add_on_type` for a poll vote
pub const ADD_ON_POLL_VOTE: i64 = 67;
