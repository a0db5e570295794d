// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Device directory operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use smsgate_core::types::format_timestamp;
use smsgate_core::{Device, DeviceFilter, GatewayError};

use super::timestamp_at;
use crate::database::{map_tr_err, Database};

const DEVICE_COLUMNS: &str =
    "id, name, auth_token, push_token, last_seen, user_id, created_at, updated_at";

const FILTER_CLAUSE: &str = "(?1 IS NULL OR id = ?1)
       AND (?2 IS NULL OR user_id = ?2)
       AND (?3 IS NULL OR auth_token = ?3)
       AND (?4 IS NULL OR last_seen > ?4)";

fn device_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get(0)?,
        name: row.get(1)?,
        auth_token: row.get(2)?,
        push_token: row.get(3)?,
        last_seen: timestamp_at(row, 4)?,
        user_id: row.get(5)?,
        created_at: timestamp_at(row, 6)?,
        updated_at: timestamp_at(row, 7)?,
    })
}

/// Bind values for [`FILTER_CLAUSE`], in placeholder order.
struct FilterParams {
    id: Option<String>,
    user_id: Option<String>,
    token: Option<String>,
    seen_after: Option<String>,
}

impl FilterParams {
    fn from_filter(filter: DeviceFilter) -> Result<Self, GatewayError> {
        if filter.is_empty() {
            return Err(GatewayError::Internal("invalid filter: no criteria".to_string()));
        }
        let seen_after = filter
            .active_within
            .map(|window| {
                chrono::Duration::from_std(window)
                    .map(|window| format_timestamp(&(Utc::now() - window)))
                    .map_err(|e| GatewayError::Internal(format!("invalid activity window: {e}")))
            })
            .transpose()?;
        Ok(Self {
            id: filter.id,
            user_id: filter.user_id,
            token: filter.token,
            seen_after,
        })
    }
}

/// Look a device up by primary key on an open connection.
pub(crate) fn find_by_id(
    conn: &rusqlite::Connection,
    id: &str,
) -> rusqlite::Result<Option<Device>> {
    conn.query_row(
        &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1"),
        params![id],
        device_from_row,
    )
    .optional()
}

/// Devices matching every set criterion of `filter`.
pub async fn select_devices(db: &Database, filter: DeviceFilter) -> Result<Vec<Device>, GatewayError> {
    let p = FilterParams::from_filter(filter)?;
    db.connection()
        .call(move |conn| -> Result<Vec<Device>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM devices WHERE {FILTER_CLAUSE} ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(
                params![p.id, p.user_id, p.token, p.seen_after],
                device_from_row,
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a new device.
pub async fn insert_device(db: &Database, device: Device) -> Result<(), GatewayError> {
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO devices (id, name, auth_token, push_token, last_seen, user_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    device.id,
                    device.name,
                    device.auth_token,
                    device.push_token,
                    format_timestamp(&device.last_seen),
                    device.user_id,
                    format_timestamp(&device.created_at),
                    format_timestamp(&device.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Set or clear the push token. Unknown ids are reported as not found.
pub async fn update_push_token(
    db: &Database,
    id: &str,
    push_token: Option<&str>,
) -> Result<(), GatewayError> {
    let id = id.to_string();
    let push_token = push_token.map(str::to_string);
    let now = format_timestamp(&Utc::now());
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE devices SET push_token = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, push_token, now],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 0 {
        Err(GatewayError::NotFound)
    } else {
        Ok(())
    }
}

/// Move `last_seen` forward to `at`. Older timestamps are ignored.
pub async fn update_last_seen(db: &Database, id: &str, at: DateTime<Utc>) -> Result<(), GatewayError> {
    let id = id.to_string();
    let at = format_timestamp(&at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE devices SET last_seen = ?2, updated_at = ?2
                 WHERE id = ?1 AND last_seen < ?2",
                params![id, at],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(())
}

/// Delete devices matching `filter`. Their messages cascade.
pub async fn remove_devices(db: &Database, filter: DeviceFilter) -> Result<u64, GatewayError> {
    let p = FilterParams::from_filter(filter)?;
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let removed = conn.execute(
                &format!("DELETE FROM devices WHERE {FILTER_CLAUSE}"),
                params![p.id, p.user_id, p.token, p.seen_after],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete devices whose record has not changed since `before`.
pub async fn remove_unused(db: &Database, before: DateTime<Utc>) -> Result<u64, GatewayError> {
    let before = format_timestamp(&before);
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let removed = conn.execute(
                "DELETE FROM devices WHERE updated_at < ?1",
                params![before],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}
