// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message, recipient and state-history operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use smsgate_core::types::format_timestamp;
use smsgate_core::{
    anonymize_phone, GatewayError, Message, MessageContent, MessageFilter, MessageLoad,
    MessageStateUpdate, MessageType, NewMessage, ProcessingState, RecipientState,
    RetentionPolicy, StateEntry,
};

use super::{conversion_err, enum_at, opt_timestamp_at, timestamp_at};
use crate::database::{map_tr_err, Database};
use crate::queries::devices;

const MESSAGE_COLUMNS: &str = "m.id, m.device_id, m.ext_id, m.message_type, m.content, m.state, \
     m.valid_until, m.sim_number, m.with_delivery_report, m.priority, m.is_hashed, \
     m.is_encrypted, m.created_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let kind: MessageType = enum_at(row, 3)?;
    let raw_content: String = row.get(4)?;
    let content = MessageContent::from_json(kind, &raw_content).map_err(|e| conversion_err(4, e))?;

    Ok(Message {
        id: row.get(0)?,
        device_id: row.get(1)?,
        ext_id: row.get(2)?,
        content,
        state: enum_at(row, 5)?,
        valid_until: opt_timestamp_at(row, 6)?,
        sim_number: row.get(7)?,
        with_delivery_report: row.get(8)?,
        priority: row.get(9)?,
        is_hashed: row.get(10)?,
        is_encrypted: row.get(11)?,
        created_at: timestamp_at(row, 12)?,
        recipients: Vec::new(),
        states: Vec::new(),
        device: None,
    })
}

fn load_recipients(
    conn: &rusqlite::Connection,
    message_id: i64,
) -> rusqlite::Result<Vec<RecipientState>> {
    let mut stmt = conn.prepare_cached(
        "SELECT phone_number, state, error FROM message_recipients
         WHERE message_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![message_id], |row| {
        Ok(RecipientState {
            phone_number: row.get(0)?,
            state: enum_at(row, 1)?,
            error: row.get(2)?,
        })
    })?;
    rows.collect()
}

fn load_states(conn: &rusqlite::Connection, message_id: i64) -> rusqlite::Result<Vec<StateEntry>> {
    let mut stmt = conn.prepare_cached(
        "SELECT state, updated_at FROM message_states
         WHERE message_id = ?1 ORDER BY updated_at ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![message_id], |row| {
        Ok(StateEntry {
            state: enum_at(row, 0)?,
            updated_at: timestamp_at(row, 1)?,
        })
    })?;
    rows.collect()
}

/// Insert a message with all recipients `Pending` in one transaction.
///
/// Returns [`GatewayError::Conflict`] if `(ext_id, device_id)` is taken.
pub async fn insert_message(db: &Database, message: NewMessage) -> Result<i64, GatewayError> {
    let content = message.content.to_json().map_err(GatewayError::storage)?;
    let kind = message.content.kind().to_string();
    let now = format_timestamp(&Utc::now());
    let ext_id = message.ext_id.clone();

    let inserted = db
        .connection()
        .call(move |conn| -> Result<Option<i64>, rusqlite::Error> {
            let tx = conn.transaction()?;

            let result = tx.execute(
                "INSERT INTO messages (device_id, ext_id, message_type, content, state,
                     valid_until, sim_number, with_delivery_report, priority, is_encrypted,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'Pending', ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                params![
                    message.device_id,
                    message.ext_id,
                    kind,
                    content,
                    message.valid_until.as_ref().map(format_timestamp),
                    message.sim_number,
                    message.with_delivery_report,
                    message.priority,
                    message.is_encrypted,
                    now,
                ],
            );
            match result {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
            let id = tx.last_insert_rowid();

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO message_recipients (message_id, phone_number, state)
                     VALUES (?1, ?2, 'Pending')",
                )?;
                for phone in &message.recipients {
                    stmt.execute(params![id, phone])?;
                }
            }

            tx.commit()?;
            Ok(Some(id))
        })
        .await
        .map_err(map_tr_err)?;

    inserted.ok_or(GatewayError::Conflict { id: ext_id })
}

/// Look a live message up by idempotency key within the filter's scope.
pub async fn get_message(
    db: &Database,
    ext_id: &str,
    filter: MessageFilter,
    load: MessageLoad,
) -> Result<Message, GatewayError> {
    let ext_id = ext_id.to_string();
    let found = db
        .connection()
        .call(move |conn| -> Result<Option<Message>, rusqlite::Error> {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 JOIN devices d ON d.id = m.device_id
                 WHERE m.ext_id = ?1 AND m.deleted_at IS NULL
                   AND (?2 IS NULL OR m.device_id = ?2)
                   AND (?3 IS NULL OR d.user_id = ?3)
                 ORDER BY m.id DESC LIMIT 1"
            );
            let message = conn
                .query_row(
                    &sql,
                    params![ext_id, filter.device_id, filter.user_id],
                    message_from_row,
                )
                .optional()?;

            let Some(mut message) = message else {
                return Ok(None);
            };
            if load.with_recipients {
                message.recipients = load_recipients(conn, message.id)?;
            }
            if load.with_states {
                message.states = load_states(conn, message.id)?;
            }
            if load.with_device {
                message.device = devices::find_by_id(conn, &message.device_id)?;
            }
            Ok(Some(message))
        })
        .await
        .map_err(map_tr_err)?;

    found.ok_or(GatewayError::NotFound)
}

/// All pending messages of a device with recipients, highest priority first.
pub async fn select_pending(db: &Database, device_id: &str) -> Result<Vec<Message>, GatewayError> {
    let device_id = device_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 WHERE m.device_id = ?1 AND m.state = 'Pending' AND m.deleted_at IS NULL
                 ORDER BY m.priority DESC, m.id ASC"
            );
            let mut messages = {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![device_id], message_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            for message in &mut messages {
                message.recipients = load_recipients(conn, message.id)?;
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

/// Apply an acknowledgment atomically.
///
/// Recipients are replaced wholesale; state history keeps the first
/// timestamp seen per state.
pub async fn update_state(db: &Database, update: MessageStateUpdate) -> Result<(), GatewayError> {
    let now = format_timestamp(&Utc::now());
    let updated = db
        .connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "UPDATE messages SET state = ?2, updated_at = ?3
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![update.id, update.state.as_ref(), now],
            )?;
            if changed == 0 {
                return Ok(false);
            }

            tx.execute(
                "DELETE FROM message_recipients WHERE message_id = ?1",
                params![update.id],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO message_recipients (message_id, phone_number, state, error)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (message_id, phone_number)
                     DO UPDATE SET state = excluded.state, error = excluded.error",
                )?;
                for recipient in &update.recipients {
                    stmt.execute(params![
                        update.id,
                        recipient.phone_number,
                        recipient.state.as_ref(),
                        recipient.error,
                    ])?;
                }
            }
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO message_states (message_id, state, updated_at)
                     VALUES (?1, ?2, ?3)",
                )?;
                for (state, at) in &update.states {
                    stmt.execute(params![update.id, state.as_ref(), format_timestamp(at)])?;
                }
            }

            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if updated {
        Ok(())
    } else {
        Err(GatewayError::NotFound)
    }
}

/// Anonymize recipients of the given terminal, unhashed, unencrypted messages.
///
/// Returns the number of messages hashed. Safe to call repeatedly.
pub async fn hash_recipients(db: &Database, ids: &[i64]) -> Result<usize, GatewayError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let ids = ids.to_vec();
    let terminal = state_list(
        &ProcessingState::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect::<Vec<_>>(),
    );

    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let tx = conn.transaction()?;
            let mut hashed = 0;
            {
                let mut candidate = tx.prepare(&format!(
                    "SELECT 1 FROM messages
                     WHERE id = ?1 AND is_hashed = 0 AND is_encrypted = 0
                       AND state IN ({terminal})"
                ))?;
                let mut phones =
                    tx.prepare("SELECT id, phone_number FROM message_recipients WHERE message_id = ?1")?;
                let mut set_phone =
                    tx.prepare("UPDATE message_recipients SET phone_number = ?2 WHERE id = ?1")?;
                let mut mark =
                    tx.prepare("UPDATE messages SET is_hashed = 1 WHERE id = ?1")?;

                for id in ids {
                    if !candidate.exists(params![id])? {
                        continue;
                    }
                    let recipients = phones
                        .query_map(params![id], |row| {
                            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                    for (recipient_id, phone) in recipients {
                        set_phone.execute(params![recipient_id, anonymize_phone(&phone)])?;
                    }
                    mark.execute(params![id])?;
                    hashed += 1;
                }
            }
            tx.commit()?;
            Ok(hashed)
        })
        .await
        .map_err(map_tr_err)
}

/// Soft-delete messages created before `before` in a state the policy allows.
pub async fn remove_processed(
    db: &Database,
    before: DateTime<Utc>,
    policy: RetentionPolicy,
) -> Result<u64, GatewayError> {
    let before = format_timestamp(&before);
    let now = format_timestamp(&Utc::now());
    let states = state_list(&policy.states());

    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let removed = conn.execute(
                &format!(
                    "UPDATE messages SET deleted_at = ?2
                     WHERE deleted_at IS NULL AND created_at < ?1 AND state IN ({states})"
                ),
                params![before, now],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Quoted SQL list of state names. Values come from the closed enum, never from input.
fn state_list(states: &[ProcessingState]) -> String {
    states
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
