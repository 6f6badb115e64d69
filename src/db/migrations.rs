use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: participants and messages

CREATE TABLE participants (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT,
    role TEXT NOT NULL DEFAULT 'user',
    assigned_case_manager TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (assigned_case_manager) REFERENCES participants(id)
);

CREATE TABLE messages (
    id TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    receiver_id TEXT NOT NULL,
    body TEXT NOT NULL,
    is_from_case_manager INTEGER NOT NULL DEFAULT 0,
    read INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (sender_id) REFERENCES participants(id),
    FOREIGN KEY (receiver_id) REFERENCES participants(id)
);

-- History reads are always per-conversation in creation order
CREATE INDEX idx_messages_conversation ON messages(conversation_id, created_at, id);
-- Unread counts filter on (receiver, read)
CREATE INDEX idx_messages_unread ON messages(receiver_id, read);
",
    )])
}
