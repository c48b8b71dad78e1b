//! SQLite-backed dispatch store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    ChannelDispatch, ChannelDispatchStatus, ChannelDispatchUpdate, Dispatch, DispatchFilter,
    DispatchStatus, DispatchStore, DispatchStoreError, DispatchWithChannels, Metadata,
    NewDispatch,
};
use crate::channel::ChannelType;

const DISPATCH_COLUMNS: &str =
    "id, route_id, driver_id, status, requested_channels, metadata, created_at, updated_at";

const CHANNEL_COLUMNS: &str = "id, dispatch_id, channel, status, provider_message_id, error_message, sent_at, delivered_at, created_at, updated_at, acknowledged_at";

/// SQLite-backed dispatch store.
pub struct SqliteDispatchStore {
    conn: Mutex<Connection>,
}

fn db_err(e: impl std::fmt::Display) -> DispatchStoreError {
    DispatchStoreError::Database(e.to_string())
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl SqliteDispatchStore {
    /// Create a new SQLite dispatch store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, DispatchStoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite dispatch store (useful for testing).
    pub fn in_memory() -> Result<Self, DispatchStoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DispatchStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS dispatches (
                id TEXT PRIMARY KEY,
                route_id TEXT NOT NULL,
                driver_id TEXT NOT NULL,
                status TEXT NOT NULL,
                requested_channels TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_dispatches_status ON dispatches(status);
            CREATE INDEX IF NOT EXISTS idx_dispatches_driver ON dispatches(driver_id);
            CREATE INDEX IF NOT EXISTS idx_dispatches_route ON dispatches(route_id);
            CREATE INDEX IF NOT EXISTS idx_dispatches_created_at ON dispatches(created_at);

            CREATE TABLE IF NOT EXISTS channel_dispatches (
                id TEXT PRIMARY KEY,
                dispatch_id TEXT NOT NULL REFERENCES dispatches(id),
                channel TEXT NOT NULL,
                status TEXT NOT NULL,
                provider_message_id TEXT,
                error_message TEXT,
                sent_at TEXT,
                delivered_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                acknowledged_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_channel_dispatches_dispatch ON channel_dispatches(dispatch_id);
            "#,
        )
        .map_err(db_err)?;

        // Databases created before acknowledgements were recorded
        let has_ack_column = conn
            .prepare("SELECT 1 FROM pragma_table_info('channel_dispatches') WHERE name = 'acknowledged_at'")
            .and_then(|mut stmt| stmt.exists([]))
            .map_err(db_err)?;
        if !has_ack_column {
            conn.execute(
                "ALTER TABLE channel_dispatches ADD COLUMN acknowledged_at TEXT",
                [],
            )
            .map_err(db_err)?;
        }
        Ok(())
    }

    fn build_where_clause(filter: &DispatchFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref driver_id) = filter.driver_id {
            conditions.push("driver_id = ?");
            params.push(Box::new(driver_id.clone()));
        }

        if let Some(ref route_id) = filter.route_id {
            conditions.push("route_id = ?");
            params.push(Box::new(route_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_dispatch(row: &rusqlite::Row) -> rusqlite::Result<Dispatch> {
        let status: String = row.get(3)?;
        let channels_json: String = row.get(4)?;
        let metadata_json: Option<String> = row.get(5)?;
        let created_at: String = row.get(6)?;
        let updated_at: String = row.get(7)?;

        Ok(Dispatch {
            id: row.get(0)?,
            route_id: row.get(1)?,
            driver_id: row.get(2)?,
            status: DispatchStatus::parse(&status).unwrap_or(DispatchStatus::Failed),
            requested_channels: serde_json::from_str::<Vec<ChannelType>>(&channels_json)
                .unwrap_or_default(),
            metadata: metadata_json.and_then(|json| serde_json::from_str::<Metadata>(&json).ok()),
            created_at: parse_ts(&created_at),
            updated_at: parse_ts(&updated_at),
        })
    }

    fn row_to_channel_dispatch(row: &rusqlite::Row) -> rusqlite::Result<ChannelDispatch> {
        let channel: String = row.get(2)?;
        let status: String = row.get(3)?;
        let sent_at: Option<String> = row.get(6)?;
        let delivered_at: Option<String> = row.get(7)?;
        let created_at: String = row.get(8)?;
        let updated_at: String = row.get(9)?;
        let acknowledged_at: Option<String> = row.get(10)?;

        let channel = ChannelType::parse(&channel).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown channel: {}", channel).into(),
            )
        })?;

        Ok(ChannelDispatch {
            id: row.get(0)?,
            dispatch_id: row.get(1)?,
            channel,
            status: ChannelDispatchStatus::parse(&status).unwrap_or(ChannelDispatchStatus::Failed),
            provider_message_id: row.get(4)?,
            error_message: row.get(5)?,
            sent_at: sent_at.as_deref().map(parse_ts),
            delivered_at: delivered_at.as_deref().map(parse_ts),
            acknowledged_at: acknowledged_at.as_deref().map(parse_ts),
            created_at: parse_ts(&created_at),
            updated_at: parse_ts(&updated_at),
        })
    }

    fn load_dispatch(conn: &Connection, id: &str) -> Result<Option<Dispatch>, DispatchStoreError> {
        conn.query_row(
            &format!("SELECT {} FROM dispatches WHERE id = ?", DISPATCH_COLUMNS),
            params![id],
            Self::row_to_dispatch,
        )
        .optional()
        .map_err(db_err)
    }

    fn load_channel_dispatch(
        conn: &Connection,
        id: &str,
    ) -> Result<Option<ChannelDispatch>, DispatchStoreError> {
        conn.query_row(
            &format!("SELECT {} FROM channel_dispatches WHERE id = ?", CHANNEL_COLUMNS),
            params![id],
            Self::row_to_channel_dispatch,
        )
        .optional()
        .map_err(db_err)
    }
}

impl DispatchStore for SqliteDispatchStore {
    fn create_dispatch(&self, request: NewDispatch) -> Result<Dispatch, DispatchStoreError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        let channels_json = serde_json::to_string(&request.requested_channels).map_err(db_err)?;
        let metadata_json = request
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(db_err)?;

        conn.execute(
            "INSERT INTO dispatches (id, route_id, driver_id, status, requested_channels, metadata, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                request.route_id,
                request.driver_id,
                DispatchStatus::Pending.as_str(),
                channels_json,
                metadata_json,
                format_ts(now),
                format_ts(now),
            ],
        )
        .map_err(db_err)?;

        Ok(Dispatch {
            id,
            route_id: request.route_id,
            driver_id: request.driver_id,
            status: DispatchStatus::Pending,
            requested_channels: request.requested_channels,
            metadata: request.metadata,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_dispatch_status(
        &self,
        dispatch_id: &str,
        status: DispatchStatus,
    ) -> Result<Dispatch, DispatchStoreError> {
        let conn = self.conn.lock().unwrap();

        let current = Self::load_dispatch(&conn, dispatch_id)?
            .ok_or_else(|| DispatchStoreError::DispatchNotFound(dispatch_id.to_string()))?;

        if !current.status.can_transition_to(status) {
            return Err(DispatchStoreError::InvalidTransition {
                id: dispatch_id.to_string(),
                from: current.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        let now = Utc::now();
        conn.execute(
            "UPDATE dispatches SET status = ?, updated_at = ? WHERE id = ?",
            params![status.as_str(), format_ts(now), dispatch_id],
        )
        .map_err(db_err)?;

        Ok(Dispatch {
            status,
            updated_at: now,
            ..current
        })
    }

    fn create_channel_dispatch(
        &self,
        dispatch_id: &str,
        channel: ChannelType,
    ) -> Result<ChannelDispatch, DispatchStoreError> {
        let conn = self.conn.lock().unwrap();

        if Self::load_dispatch(&conn, dispatch_id)?.is_none() {
            return Err(DispatchStoreError::DispatchNotFound(dispatch_id.to_string()));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO channel_dispatches (id, dispatch_id, channel, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                id,
                dispatch_id,
                channel.as_str(),
                ChannelDispatchStatus::Pending.as_str(),
                format_ts(now),
                format_ts(now),
            ],
        )
        .map_err(db_err)?;

        Ok(ChannelDispatch {
            id,
            dispatch_id: dispatch_id.to_string(),
            channel,
            status: ChannelDispatchStatus::Pending,
            provider_message_id: None,
            error_message: None,
            sent_at: None,
            delivered_at: None,
            acknowledged_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_channel_dispatch(
        &self,
        channel_dispatch_id: &str,
        update: ChannelDispatchUpdate,
    ) -> Result<ChannelDispatch, DispatchStoreError> {
        let conn = self.conn.lock().unwrap();

        let current = Self::load_channel_dispatch(&conn, channel_dispatch_id)?.ok_or_else(|| {
            DispatchStoreError::ChannelDispatchNotFound(channel_dispatch_id.to_string())
        })?;

        if !current.status.can_transition_to(update.status) {
            return Err(DispatchStoreError::InvalidTransition {
                id: channel_dispatch_id.to_string(),
                from: current.status.as_str().to_string(),
                to: update.status.as_str().to_string(),
            });
        }

        let now = Utc::now();
        let (provider_message_id, error_message) = match update.status {
            ChannelDispatchStatus::Delivered => (
                update.provider_message_id.filter(|id| !id.trim().is_empty()),
                None,
            ),
            ChannelDispatchStatus::Failed => (
                None,
                Some(
                    update
                        .error_message
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or_else(|| "Unknown error occurred".to_string()),
                ),
            ),
            _ => (None, None),
        };
        let sent_at = match update.status {
            ChannelDispatchStatus::Pending => current.sent_at,
            _ => current.sent_at.or(Some(now)),
        };
        let delivered_at =
            (update.status == ChannelDispatchStatus::Delivered).then_some(now);

        conn.execute(
            "UPDATE channel_dispatches SET status = ?, provider_message_id = ?, error_message = ?, sent_at = ?, delivered_at = ?, updated_at = ? WHERE id = ?",
            params![
                update.status.as_str(),
                provider_message_id,
                error_message,
                sent_at.map(format_ts),
                delivered_at.map(format_ts),
                format_ts(now),
                channel_dispatch_id,
            ],
        )
        .map_err(db_err)?;

        Ok(ChannelDispatch {
            status: update.status,
            provider_message_id,
            error_message,
            sent_at,
            delivered_at,
            updated_at: now,
            ..current
        })
    }

    fn get_dispatch(&self, dispatch_id: &str) -> Result<Option<Dispatch>, DispatchStoreError> {
        let conn = self.conn.lock().unwrap();
        Self::load_dispatch(&conn, dispatch_id)
    }

    fn get_dispatch_with_channels(
        &self,
        dispatch_id: &str,
    ) -> Result<Option<DispatchWithChannels>, DispatchStoreError> {
        let conn = self.conn.lock().unwrap();

        let Some(dispatch) = Self::load_dispatch(&conn, dispatch_id)? else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM channel_dispatches WHERE dispatch_id = ? ORDER BY created_at ASC, rowid ASC",
                CHANNEL_COLUMNS
            ))
            .map_err(db_err)?;

        let channel_dispatches = stmt
            .query_map(params![dispatch_id], Self::row_to_channel_dispatch)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(Some(DispatchWithChannels {
            dispatch,
            channel_dispatches,
        }))
    }

    fn acknowledge_channel(
        &self,
        dispatch_id: &str,
        channel: ChannelType,
    ) -> Result<Option<ChannelDispatch>, DispatchStoreError> {
        let conn = self.conn.lock().unwrap();

        if Self::load_dispatch(&conn, dispatch_id)?.is_none() {
            return Err(DispatchStoreError::DispatchNotFound(dispatch_id.to_string()));
        }

        let delivered = conn
            .query_row(
                &format!(
                    "SELECT {} FROM channel_dispatches WHERE dispatch_id = ? AND channel = ? AND status = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    CHANNEL_COLUMNS
                ),
                params![
                    dispatch_id,
                    channel.as_str(),
                    ChannelDispatchStatus::Delivered.as_str()
                ],
                Self::row_to_channel_dispatch,
            )
            .optional()
            .map_err(db_err)?;

        let Some(attempt) = delivered else {
            return Ok(None);
        };
        if attempt.acknowledged_at.is_some() {
            return Ok(Some(attempt));
        }

        let now = Utc::now();
        conn.execute(
            "UPDATE channel_dispatches SET acknowledged_at = ?, updated_at = ? WHERE id = ?",
            params![format_ts(now), format_ts(now), attempt.id],
        )
        .map_err(db_err)?;

        Ok(Some(ChannelDispatch {
            acknowledged_at: Some(now),
            updated_at: now,
            ..attempt
        }))
    }

    fn list_dispatches(&self, filter: &DispatchFilter) -> Result<Vec<Dispatch>, DispatchStoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM dispatches {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            DISPATCH_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_dispatch)
            .map_err(db_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn count_dispatches(&self, filter: &DispatchFilter) -> Result<i64, DispatchStoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM dispatches {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }

    fn ping(&self) -> Result<(), DispatchStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(db_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteDispatchStore {
        SqliteDispatchStore::in_memory().unwrap()
    }

    fn new_dispatch(driver_id: &str) -> NewDispatch {
        NewDispatch {
            route_id: "route-1".to_string(),
            driver_id: driver_id.to_string(),
            requested_channels: vec![ChannelType::Telegram, ChannelType::Email],
            metadata: None,
        }
    }

    #[test]
    fn test_create_dispatch_is_pending() {
        let store = create_test_store();

        let dispatch = store.create_dispatch(new_dispatch("driver-1")).unwrap();

        assert!(!dispatch.id.is_empty());
        assert_eq!(dispatch.status, DispatchStatus::Pending);

        let fetched = store.get_dispatch(&dispatch.id).unwrap().unwrap();
        assert_eq!(fetched.requested_channels, dispatch.requested_channels);
        assert_eq!(fetched.status, DispatchStatus::Pending);
    }

    #[test]
    fn test_metadata_round_trip() {
        let store = create_test_store();
        let mut request = new_dispatch("driver-1");
        let mut metadata = Metadata::new();
        metadata.insert("priority".to_string(), serde_json::json!("high"));
        request.metadata = Some(metadata.clone());

        let dispatch = store.create_dispatch(request).unwrap();

        let fetched = store.get_dispatch(&dispatch.id).unwrap().unwrap();
        assert_eq!(fetched.metadata, Some(metadata));
    }

    #[test]
    fn test_get_nonexistent_dispatch() {
        let store = create_test_store();
        assert!(store.get_dispatch("missing").unwrap().is_none());
        assert!(store.get_dispatch_with_channels("missing").unwrap().is_none());
    }

    #[test]
    fn test_dispatch_status_moves_forward_only() {
        let store = create_test_store();
        let dispatch = store.create_dispatch(new_dispatch("driver-1")).unwrap();

        store
            .update_dispatch_status(&dispatch.id, DispatchStatus::Sending)
            .unwrap();
        let done = store
            .update_dispatch_status(&dispatch.id, DispatchStatus::Partial)
            .unwrap();
        assert_eq!(done.status, DispatchStatus::Partial);

        let result = store.update_dispatch_status(&dispatch.id, DispatchStatus::Pending);
        assert!(matches!(
            result,
            Err(DispatchStoreError::InvalidTransition { .. })
        ));
        assert_eq!(
            store.get_dispatch(&dispatch.id).unwrap().unwrap().status,
            DispatchStatus::Partial
        );
    }

    #[test]
    fn test_update_status_nonexistent_dispatch() {
        let store = create_test_store();
        let result = store.update_dispatch_status("missing", DispatchStatus::Sending);
        assert!(matches!(result, Err(DispatchStoreError::DispatchNotFound(_))));
    }

    #[test]
    fn test_channel_dispatch_requires_dispatch() {
        let store = create_test_store();
        let result = store.create_channel_dispatch("missing", ChannelType::Email);
        assert!(matches!(result, Err(DispatchStoreError::DispatchNotFound(_))));
    }

    #[test]
    fn test_channel_dispatch_delivered() {
        let store = create_test_store();
        let dispatch = store.create_dispatch(new_dispatch("driver-1")).unwrap();
        let attempt = store
            .create_channel_dispatch(&dispatch.id, ChannelType::Telegram)
            .unwrap();
        assert_eq!(attempt.status, ChannelDispatchStatus::Pending);

        let updated = store
            .update_channel_dispatch(
                &attempt.id,
                ChannelDispatchUpdate::delivered(Some("msg-abc123".to_string())),
            )
            .unwrap();

        assert_eq!(updated.status, ChannelDispatchStatus::Delivered);
        assert_eq!(updated.provider_message_id.as_deref(), Some("msg-abc123"));
        assert!(updated.error_message.is_none());
        assert!(updated.sent_at.is_some());
        assert!(updated.delivered_at.is_some());
    }

    #[test]
    fn test_channel_dispatch_single_terminal_update() {
        let store = create_test_store();
        let dispatch = store.create_dispatch(new_dispatch("driver-1")).unwrap();
        let attempt = store
            .create_channel_dispatch(&dispatch.id, ChannelType::Email)
            .unwrap();

        store
            .update_channel_dispatch(&attempt.id, ChannelDispatchUpdate::failed("Connection refused"))
            .unwrap();
        let second = store.update_channel_dispatch(
            &attempt.id,
            ChannelDispatchUpdate::delivered(Some("late".to_string())),
        );

        assert!(matches!(
            second,
            Err(DispatchStoreError::InvalidTransition { .. })
        ));
        let detail = store
            .get_dispatch_with_channels(&dispatch.id)
            .unwrap()
            .unwrap();
        assert_eq!(detail.channel_dispatches[0].status, ChannelDispatchStatus::Failed);
        assert_eq!(
            detail.channel_dispatches[0].error_message.as_deref(),
            Some("Connection refused")
        );
        assert!(detail.channel_dispatches[0].provider_message_id.is_none());
    }

    #[test]
    fn test_blank_failure_message_is_replaced() {
        let store = create_test_store();
        let dispatch = store.create_dispatch(new_dispatch("driver-1")).unwrap();
        let attempt = store
            .create_channel_dispatch(&dispatch.id, ChannelType::Email)
            .unwrap();

        let updated = store
            .update_channel_dispatch(&attempt.id, ChannelDispatchUpdate::failed("  "))
            .unwrap();

        assert_eq!(updated.error_message.as_deref(), Some("Unknown error occurred"));
    }

    #[test]
    fn test_update_nonexistent_channel_dispatch() {
        let store = create_test_store();
        let result = store.update_channel_dispatch("missing", ChannelDispatchUpdate::sending());
        assert!(matches!(
            result,
            Err(DispatchStoreError::ChannelDispatchNotFound(_))
        ));
    }

    #[test]
    fn test_channels_listed_in_creation_order() {
        let store = create_test_store();
        let dispatch = store.create_dispatch(new_dispatch("driver-1")).unwrap();
        for channel in [ChannelType::Email, ChannelType::Telegram, ChannelType::Sms] {
            store.create_channel_dispatch(&dispatch.id, channel).unwrap();
        }

        let detail = store
            .get_dispatch_with_channels(&dispatch.id)
            .unwrap()
            .unwrap();
        let channels: Vec<ChannelType> = detail
            .channel_dispatches
            .iter()
            .map(|c| c.channel)
            .collect();

        assert_eq!(
            channels,
            vec![ChannelType::Email, ChannelType::Telegram, ChannelType::Sms]
        );
    }

    #[test]
    fn test_list_and_count_with_filters() {
        let store = create_test_store();
        let first = store.create_dispatch(new_dispatch("alice")).unwrap();
        store.create_dispatch(new_dispatch("alice")).unwrap();
        store.create_dispatch(new_dispatch("bob")).unwrap();
        store
            .update_dispatch_status(&first.id, DispatchStatus::Failed)
            .unwrap();

        let alice = DispatchFilter::new().with_driver_id("alice");
        assert_eq!(store.list_dispatches(&alice).unwrap().len(), 2);
        assert_eq!(store.count_dispatches(&alice).unwrap(), 2);

        let failed = DispatchFilter::new().with_status(DispatchStatus::Failed);
        let listed = store.list_dispatches(&failed).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, first.id);

        let by_route = DispatchFilter::new().with_route_id("route-1");
        assert_eq!(store.count_dispatches(&by_route).unwrap(), 3);
    }

    #[test]
    fn test_list_newest_first_with_pagination() {
        let store = create_test_store();
        let ids: Vec<String> = (0..5)
            .map(|_| store.create_dispatch(new_dispatch("driver-1")).unwrap().id)
            .collect();

        let page = store
            .list_dispatches(&DispatchFilter::new().with_limit(2).with_offset(0))
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, ids[4]);
        assert_eq!(page[1].id, ids[3]);

        let last = store
            .list_dispatches(&DispatchFilter::new().with_limit(2).with_offset(4))
            .unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].id, ids[0]);
    }

    #[test]
    fn test_acknowledge_delivered_channel_once() {
        let store = create_test_store();
        let dispatch = store.create_dispatch(new_dispatch("driver-1")).unwrap();
        let telegram = store
            .create_channel_dispatch(&dispatch.id, ChannelType::Telegram)
            .unwrap();
        store
            .update_channel_dispatch(&telegram.id, ChannelDispatchUpdate::delivered(None))
            .unwrap();

        let first = store
            .acknowledge_channel(&dispatch.id, ChannelType::Telegram)
            .unwrap()
            .unwrap();
        let stamped = first.acknowledged_at.unwrap();
        assert_eq!(first.status, ChannelDispatchStatus::Delivered);

        let again = store
            .acknowledge_channel(&dispatch.id, ChannelType::Telegram)
            .unwrap()
            .unwrap();
        assert_eq!(again.acknowledged_at, Some(stamped));

        let detail = store
            .get_dispatch_with_channels(&dispatch.id)
            .unwrap()
            .unwrap();
        assert_eq!(detail.channel_dispatches[0].acknowledged_at, Some(stamped));
    }

    #[test]
    fn test_acknowledge_requires_delivered_attempt() {
        let store = create_test_store();
        let dispatch = store.create_dispatch(new_dispatch("driver-1")).unwrap();
        let telegram = store
            .create_channel_dispatch(&dispatch.id, ChannelType::Telegram)
            .unwrap();
        store
            .update_channel_dispatch(&telegram.id, ChannelDispatchUpdate::failed("chat not found"))
            .unwrap();

        assert!(store
            .acknowledge_channel(&dispatch.id, ChannelType::Telegram)
            .unwrap()
            .is_none());
        assert!(matches!(
            store.acknowledge_channel("missing", ChannelType::Telegram),
            Err(DispatchStoreError::DispatchNotFound(_))
        ));
    }

    #[test]
    fn test_schema_upgrade_adds_acknowledged_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE channel_dispatches (id TEXT PRIMARY KEY, dispatch_id TEXT NOT NULL, channel TEXT NOT NULL, status TEXT NOT NULL, provider_message_id TEXT, error_message TEXT, sent_at TEXT, delivered_at TEXT, created_at TEXT NOT NULL, updated_at TEXT NOT NULL);",
            )
            .unwrap();
        }

        let store = SqliteDispatchStore::new(&path).unwrap();
        let dispatch = store.create_dispatch(new_dispatch("driver-1")).unwrap();
        let attempt = store
            .create_channel_dispatch(&dispatch.id, ChannelType::Telegram)
            .unwrap();

        let detail = store
            .get_dispatch_with_channels(&dispatch.id)
            .unwrap()
            .unwrap();
        assert_eq!(detail.channel_dispatches[0].id, attempt.id);
        assert!(detail.channel_dispatches[0].acknowledged_at.is_none());
    }

    #[test]
    fn test_ping() {
        assert!(create_test_store().ping().is_ok());
    }

    #[test]
    fn test_file_based_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.db");

        let id = {
            let store = SqliteDispatchStore::new(&path).unwrap();
            store.create_dispatch(new_dispatch("driver-1")).unwrap().id
        };

        let store = SqliteDispatchStore::new(&path).unwrap();
        assert!(store.get_dispatch(&id).unwrap().is_some());
    }
}
