//! Table shapes the snapshot reader understands.
//!
//! Each [`TableSpec`] lists the key columns a table must have and the other
//! columns the reader uses when present. Snapshot layouts differ between
//! app versions, so a missing non-key column is read as NULL instead of
//! failing the run.

/// Column layout expected for one source table.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    /// Must exist whenever the table exists. The first entry is the row key.
    pub key: &'static [&'static str],
    /// Read when present, NULL otherwise.
    pub columns: &'static [&'static str],
}

pub const JID: TableSpec = TableSpec {
    name: "jid",
    key: &["_id", "raw_string"],
    columns: &["user", "server"],
};

pub const CHAT: TableSpec = TableSpec {
    name: "chat",
    key: &["_id", "jid_row_id"],
    columns: &[
        "subject",
        "group_type",
        "created_timestamp",
        "archived",
        "hidden",
        "mute_end_timestamp",
        "pinned_message_row_id",
        "ephemeral_expiration",
    ],
};

pub const MESSAGE: TableSpec = TableSpec {
    name: "message",
    key: &["_id", "chat_row_id", "from_me", "key_id"],
    columns: &[
        "sender_jid_row_id",
        "status",
        "timestamp",
        "received_timestamp",
        "receipt_server_timestamp",
        "message_type",
        "text_data",
        "starred",
    ],
};

pub const MESSAGE_QUOTED: TableSpec = TableSpec {
    name: "message_quoted",
    key: &["message_row_id"],
    columns: &["key_id", "from_me", "sender_jid_row_id", "message_type", "text_data"],
};

pub const MESSAGE_MEDIA: TableSpec = TableSpec {
    name: "message_media",
    key: &["message_row_id"],
    columns: &[
        "mime_type",
        "file_path",
        "file_size",
        "file_length",
        "media_duration",
        "media_caption",
        "width",
        "height",
        "media_name",
        "file_hash",
        "media_key",
        "media_key_timestamp",
        "direct_path",
        "message_url",
    ],
};

pub const MESSAGE_THUMBNAIL: TableSpec = TableSpec {
    name: "message_thumbnail",
    key: &["message_row_id"],
    columns: &["thumbnail"],
};

pub const MESSAGE_TEXT: TableSpec = TableSpec {
    name: "message_text",
    key: &["message_row_id"],
    columns: &["url", "page_title", "description"],
};

pub const RECEIPT_USER: TableSpec = TableSpec {
    name: "receipt_user",
    key: &["_id", "message_row_id"],
    columns: &[
        "receipt_user_jid_row_id",
        "receipt_timestamp",
        "read_timestamp",
        "played_timestamp",
    ],
};

pub const MESSAGE_ADD_ON: TableSpec = TableSpec {
    name: "message_add_on",
    key: &["_id", "parent_message_row_id", "message_add_on_type"],
    columns: &["from_me", "sender_jid_row_id"],
};

pub const MESSAGE_ADD_ON_REACTION: TableSpec = TableSpec {
    name: "message_add_on_reaction",
    key: &["message_add_on_row_id"],
    columns: &["reaction", "sender_timestamp"],
};

pub const MESSAGE_ADD_ON_POLL_VOTE: TableSpec = TableSpec {
    name: "message_add_on_poll_vote",
    key: &["message_add_on_row_id"],
    columns: &["sender_timestamp"],
};

pub const MESSAGE_ADD_ON_POLL_VOTE_SELECTED_OPTION: TableSpec = TableSpec {
    name: "message_add_on_poll_vote_selected_option",
    key: &["message_add_on_row_id", "message_poll_option_id"],
    columns: &[],
};

pub const MESSAGE_LOCATION: TableSpec = TableSpec {
    name: "message_location",
    key: &["message_row_id"],
    columns: &["latitude", "longitude", "place_name", "place_address"],
};

pub const MESSAGE_FORWARDED: TableSpec = TableSpec {
    name: "message_forwarded",
    key: &["message_row_id"],
    columns: &["forward_score"],
};

pub const MESSAGE_MENTIONS: TableSpec = TableSpec {
    name: "message_mentions",
    key: &["_id", "message_row_id"],
    columns: &["jid_row_id"],
};

pub const MESSAGE_EDIT_INFO: TableSpec = TableSpec {
    name: "message_edit_info",
    key: &["message_row_id"],
    columns: &["original_key_id", "edited_timestamp", "sender_timestamp"],
};

pub const MESSAGE_POLL: TableSpec = TableSpec {
    name: "message_poll",
    key: &["message_row_id"],
    columns: &["selectable_options_count", "poll_type"],
};

pub const MESSAGE_POLL_OPTION: TableSpec = TableSpec {
    name: "message_poll_option",
    key: &["_id", "message_row_id"],
    columns: &["option_name", "vote_total"],
};

pub const CALL_LOG: TableSpec = TableSpec {
    name: "call_log",
    key: &["_id", "jid_row_id"],
    columns: &[
        "from_me",
        "call_id",
        "timestamp",
        "video_call",
        "duration",
        "call_result",
        "bytes_transferred",
    ],
};

pub const GROUP_PARTICIPANTS: TableSpec = TableSpec {
    name: "group_participants",
    key: &["_id", "gjid", "jid"],
    columns: &["admin"],
};

/// DDL for a snapshot containing every table and column the reader uses.
///
/// Real snapshots carry many more columns; this is the subset that matters
/// here. Used to build fixture snapshots in tests.
pub const REFERENCE_SCHEMA: &str = r#"
-- ----------------------------------------------------------------
-- Identities and chats
-- ----------------------------------------------------------------
CREATE TABLE jid (
    _id        INTEGER PRIMARY KEY AUTOINCREMENT,
    user       TEXT,
    server     TEXT,
    raw_string TEXT
);

CREATE TABLE chat (
    _id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    jid_row_id            INTEGER UNIQUE,         -- FK -> jid(_id)
    subject               TEXT,
    group_type            INTEGER,
    created_timestamp     INTEGER,                -- epoch ms
    archived              INTEGER,
    hidden                INTEGER,
    mute_end_timestamp    INTEGER,
    pinned_message_row_id INTEGER,                -- FK -> message(_id)
    ephemeral_expiration  INTEGER,
    sort_timestamp        INTEGER
);

CREATE TABLE group_participants (
    _id   INTEGER PRIMARY KEY AUTOINCREMENT,
    gjid  TEXT NOT NULL,
    jid   TEXT NOT NULL,                          -- '' = archive owner
    admin INTEGER
);

CREATE TABLE call_log (
    _id               INTEGER PRIMARY KEY AUTOINCREMENT,
    jid_row_id        INTEGER,
    from_me           INTEGER,
    call_id           TEXT,
    timestamp         INTEGER,
    video_call        INTEGER,
    duration          INTEGER,
    call_result       INTEGER,
    bytes_transferred INTEGER
);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE message (
    _id                      INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_row_id              INTEGER NOT NULL,    -- FK -> chat(_id)
    from_me                  INTEGER NOT NULL,
    key_id                   TEXT NOT NULL,
    sender_jid_row_id        INTEGER,
    status                   INTEGER,
    timestamp                INTEGER,
    received_timestamp       INTEGER,
    receipt_server_timestamp INTEGER,
    message_type             INTEGER,
    text_data                TEXT,
    starred                  INTEGER
);

CREATE TABLE message_quoted (
    message_row_id    INTEGER PRIMARY KEY,
    key_id            TEXT,
    from_me           INTEGER,
    sender_jid_row_id INTEGER,
    message_type      INTEGER,
    text_data         TEXT
);

CREATE TABLE message_forwarded (
    message_row_id INTEGER PRIMARY KEY,
    forward_score  INTEGER
);

CREATE TABLE message_mentions (
    _id            INTEGER PRIMARY KEY AUTOINCREMENT,
    message_row_id INTEGER NOT NULL,
    jid_row_id     INTEGER
);

CREATE TABLE message_edit_info (
    message_row_id   INTEGER PRIMARY KEY,
    original_key_id  TEXT,
    edited_timestamp INTEGER,
    sender_timestamp INTEGER
);

CREATE TABLE receipt_user (
    _id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    message_row_id          INTEGER NOT NULL,
    receipt_user_jid_row_id INTEGER,
    receipt_timestamp       INTEGER,
    read_timestamp          INTEGER,
    played_timestamp        INTEGER
);

CREATE TABLE message_add_on (
    _id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_message_row_id INTEGER NOT NULL,
    message_add_on_type   INTEGER NOT NULL,
    from_me               INTEGER,
    sender_jid_row_id     INTEGER
);

CREATE TABLE message_add_on_reaction (
    message_add_on_row_id INTEGER PRIMARY KEY,    -- FK -> message_add_on(_id)
    reaction              TEXT,
    sender_timestamp      INTEGER
);

-- ----------------------------------------------------------------
-- Media and previews
-- ----------------------------------------------------------------
CREATE TABLE message_media (
    message_row_id      INTEGER PRIMARY KEY,
    mime_type           TEXT,
    file_path           TEXT,
    file_size           INTEGER,
    file_length         INTEGER,
    media_duration      INTEGER,
    media_caption       TEXT,
    width               INTEGER,
    height              INTEGER,
    media_name          TEXT,
    file_hash           TEXT,
    media_key           BLOB,
    media_key_timestamp INTEGER,
    direct_path         TEXT,
    message_url         TEXT
);

CREATE TABLE message_thumbnail (
    message_row_id INTEGER PRIMARY KEY,
    thumbnail      BLOB
);

CREATE TABLE message_text (
    message_row_id INTEGER PRIMARY KEY,
    url            TEXT,
    page_title     TEXT,
    description    TEXT
);

CREATE TABLE message_location (
    message_row_id INTEGER PRIMARY KEY,
    latitude       REAL,
    longitude      REAL,
    place_name     TEXT,
    place_address  TEXT
);

-- ----------------------------------------------------------------
-- Polls
-- ----------------------------------------------------------------
CREATE TABLE message_poll (
    message_row_id           INTEGER PRIMARY KEY,
    selectable_options_count INTEGER,
    poll_type                INTEGER
);

CREATE TABLE message_poll_option (
    _id            INTEGER PRIMARY KEY AUTOINCREMENT,
    message_row_id INTEGER NOT NULL,
    option_name    TEXT,
    vote_total     INTEGER
);

CREATE TABLE message_add_on_poll_vote (
    message_add_on_row_id INTEGER PRIMARY KEY,
    sender_timestamp      INTEGER
);

CREATE TABLE message_add_on_poll_vote_selected_option (
    _id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    message_add_on_row_id  INTEGER NOT NULL,
    message_poll_option_id INTEGER NOT NULL
);
"#;
