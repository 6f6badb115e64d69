//! Conversation store: the single source of truth for message history and
//! unread counts.
//!
//! All functions are synchronous and take `&Connection`; handlers call them
//! inside `tokio::task::spawn_blocking` with the shared connection locked.
//! Messages are append-only rows — the only mutation ever applied is flipping
//! the read flag, so no cross-row transaction is needed.

use rusqlite::{Connection, OptionalExtension};

use crate::db::models::{MessageRow, Participant, Role};
use crate::messaging::keys;

/// One row of the case-manager conversation listing: an assigned user plus
/// last-message preview and the case-manager-side unread count.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub user: Participant,
    pub last_message: Option<String>,
    pub last_message_time: Option<i64>,
    pub unread_for_case_manager: i64,
}

/// Look up a participant by id.
pub fn get_participant(conn: &Connection, id: &str) -> rusqlite::Result<Option<Participant>> {
    conn.query_row(
        "SELECT id, username, email, role, assigned_case_manager, created_at
         FROM participants WHERE id = ?1",
        rusqlite::params![id],
        |row| {
            let role_str: String = row.get(3)?;
            Ok(Participant {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                role: Role::from_str(&role_str).unwrap_or(Role::User),
                assigned_case_manager: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()
}

/// Append a message row. Never mutates prior rows.
pub fn append(conn: &Connection, msg: &MessageRow) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, body,
                               is_from_case_manager, read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            msg.id,
            msg.conversation_id,
            msg.sender_id,
            msg.receiver_id,
            msg.body,
            msg.is_from_case_manager,
            msg.read,
            msg.created_at,
        ],
    )?;
    Ok(())
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        body: row.get(4)?,
        is_from_case_manager: row.get(5)?,
        read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Full transcript between two participants, oldest first.
/// Ties on created_at break by id — UUIDv7 ids preserve insertion order.
pub fn history(conn: &Connection, id_a: &str, id_b: &str) -> rusqlite::Result<Vec<MessageRow>> {
    let key = keys::derive_key(id_a, id_b);
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, sender_id, receiver_id, body,
                is_from_case_manager, read, created_at
         FROM messages
         WHERE conversation_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![key], message_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Conversation listing for a case manager: one row per assigned user,
/// ordered by most recent activity, users with no messages yet last.
pub fn list_for_case_manager(
    conn: &Connection,
    case_manager_id: &str,
) -> rusqlite::Result<Vec<ConversationSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, email, role, assigned_case_manager, created_at
         FROM participants
         WHERE assigned_case_manager = ?1
         ORDER BY username ASC",
    )?;
    let users = stmt
        .query_map(rusqlite::params![case_manager_id], |row| {
            let role_str: String = row.get(3)?;
            Ok(Participant {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                role: Role::from_str(&role_str).unwrap_or(Role::User),
                assigned_case_manager: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut summaries = Vec::with_capacity(users.len());
    for user in users {
        let key = keys::derive_key(case_manager_id, &user.id);

        let last: Option<(String, i64)> = conn
            .query_row(
                "SELECT body, created_at FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
                rusqlite::params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let unread: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = ?1 AND receiver_id = ?2 AND read = 0",
            rusqlite::params![key, case_manager_id],
            |row| row.get(0),
        )?;

        summaries.push(ConversationSummary {
            conversation_id: key,
            user,
            last_message: last.as_ref().map(|(body, _)| body.clone()),
            last_message_time: last.as_ref().map(|(_, at)| *at),
            unread_for_case_manager: unread,
        });
    }

    // Most recent activity first; conversations without messages sort last
    summaries.sort_by(|a, b| match (b.last_message_time, a.last_message_time) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => a.user.username.cmp(&b.user.username),
    });

    Ok(summaries)
}

/// Flip the read flag on all messages in a conversation addressed to `reader_id`.
/// Idempotent: already-read rows are untouched. Returns the number of rows flipped.
pub fn mark_read(
    conn: &Connection,
    conversation_id: &str,
    reader_id: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE messages SET read = 1
         WHERE conversation_id = ?1 AND receiver_id = ?2 AND read = 0",
        rusqlite::params![conversation_id, reader_id],
    )
}

/// Total unread messages addressed to a participant, across all conversations.
/// This is the one authoritative unread computation — everything pushed or
/// polled is a cache of this query.
pub fn total_unread(conn: &Connection, participant_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND read = 0",
        rusqlite::params![participant_id],
        |row| row.get(0),
    )
}

/// Per-conversation unread counts for a participant.
pub fn per_conversation_unread(
    conn: &Connection,
    participant_id: &str,
) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT conversation_id, COUNT(*) FROM messages
         WHERE receiver_id = ?1 AND read = 0
         GROUP BY conversation_id",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![participant_id], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
