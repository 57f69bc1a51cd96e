//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    CreateTicketRequest, StoredTranscript, Ticket, TicketAction, TicketError, TicketFilter,
    TicketLogEntry, TicketStatus, TicketStore,
};

const TICKET_COLUMNS: &str =
    "id, channel_id, user_id, ticket_type, created_at, closed_at, closed_by, status";

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = Connection::open(path).map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TicketError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TicketError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id INTEGER NOT NULL UNIQUE,
                user_id INTEGER NOT NULL,
                ticket_type TEXT NOT NULL,
                created_at TEXT NOT NULL,
                closed_at TEXT,
                closed_by INTEGER,
                status TEXT NOT NULL DEFAULT 'open'
            );

            CREATE TABLE IF NOT EXISTS ticket_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_id INTEGER NOT NULL REFERENCES tickets(id),
                action TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                details TEXT
            );

            CREATE TABLE IF NOT EXISTS transcripts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_id INTEGER NOT NULL REFERENCES tickets(id),
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_user_id ON tickets(user_id);
            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            CREATE INDEX IF NOT EXISTS idx_ticket_logs_ticket_id ON ticket_logs(ticket_id);
            "#,
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.clone()));
        }

        if let Some(owner_id) = filter.owner_id {
            conditions.push("user_id = ?");
            params.push(Box::new(to_sql_id(owner_id)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let id: i64 = row.get(0)?;
        let channel_id: i64 = row.get(1)?;
        let owner_id: i64 = row.get(2)?;
        let ticket_type: String = row.get(3)?;
        let created_at_str: String = row.get(4)?;
        let closed_at_str: Option<String> = row.get(5)?;
        let closed_by: Option<i64> = row.get(6)?;
        let status_str: String = row.get(7)?;

        Ok(Ticket {
            id,
            channel_id: from_sql_id(channel_id),
            owner_id: from_sql_id(owner_id),
            ticket_type,
            created_at: parse_timestamp(&created_at_str),
            closed_at: closed_at_str.as_deref().map(parse_timestamp),
            closed_by: closed_by.map(from_sql_id),
            status: TicketStatus::parse(&status_str).unwrap_or(TicketStatus::Open),
        })
    }

    fn row_to_log(row: &rusqlite::Row) -> rusqlite::Result<TicketLogEntry> {
        let id: i64 = row.get(0)?;
        let ticket_id: i64 = row.get(1)?;
        let action_str: String = row.get(2)?;
        let actor_id: i64 = row.get(3)?;
        let timestamp_str: String = row.get(4)?;
        let details_json: Option<String> = row.get(5)?;

        let action = TicketAction::parse(&action_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown ticket action '{}'", action_str).into(),
            )
        })?;

        Ok(TicketLogEntry {
            id,
            ticket_id,
            action,
            actor_id: from_sql_id(actor_id),
            timestamp: parse_timestamp(&timestamp_str),
            details: details_json.and_then(|json| serde_json::from_str(&json).ok()),
        })
    }

    fn query_ticket(
        conn: &Connection,
        column: &str,
        value: i64,
    ) -> Result<Option<Ticket>, TicketError> {
        let sql = format!("SELECT {} FROM tickets WHERE {} = ?", TICKET_COLUMNS, column);
        match conn.query_row(&sql, params![value], Self::row_to_ticket) {
            Ok(ticket) => Ok(Some(ticket)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TicketError::Database(e.to_string())),
        }
    }
}

/// Snowflake ids are below 2^63, so the cast is lossless.
fn to_sql_id(id: u64) -> i64 {
    id as i64
}

fn from_sql_id(id: i64) -> u64 {
    id as u64
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    // Use now if parsing fails (shouldn't happen with rows we wrote)
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl TicketStore for SqliteTicketStore {
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let result = conn.execute(
            "INSERT INTO tickets (channel_id, user_id, ticket_type, created_at, status) VALUES (?, ?, ?, ?, ?)",
            params![
                to_sql_id(request.channel_id),
                to_sql_id(request.owner_id),
                request.ticket_type,
                now.to_rfc3339(),
                TicketStatus::Open.as_str(),
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(TicketError::AlreadyExists(request.channel_id));
            }
            Err(e) => return Err(TicketError::Database(e.to_string())),
        }

        Ok(Ticket {
            id: conn.last_insert_rowid(),
            channel_id: request.channel_id,
            owner_id: request.owner_id,
            ticket_type: request.ticket_type,
            created_at: now,
            closed_at: None,
            closed_by: None,
            status: TicketStatus::Open,
        })
    }

    fn get(&self, id: i64) -> Result<Option<Ticket>, TicketError> {
        let conn = self.conn.lock().unwrap();
        Self::query_ticket(&conn, "id", id)
    }

    fn get_by_channel(&self, channel_id: u64) -> Result<Option<Ticket>, TicketError> {
        let conn = self.conn.lock().unwrap();
        Self::query_ticket(&conn, "channel_id", to_sql_id(channel_id))
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            TICKET_COLUMNS, where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_ticket)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let mut tickets = Vec::new();
        for row_result in rows {
            let ticket = row_result.map_err(|e| TicketError::Database(e.to_string()))?;
            tickets.push(ticket);
        }

        Ok(tickets)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(count)
    }

    fn close(&self, channel_id: u64, closed_by: u64) -> Result<Ticket, TicketError> {
        let conn = self.conn.lock().unwrap();

        let current = Self::query_ticket(&conn, "channel_id", to_sql_id(channel_id))?
            .ok_or_else(|| TicketError::NotFound(format!("channel {}", channel_id)))?;

        if !current.is_open() {
            return Err(TicketError::InvalidState {
                ticket_id: current.id,
                current_status: current.status.as_str().to_string(),
                operation: "close".to_string(),
            });
        }

        let now = Utc::now();
        conn.execute(
            "UPDATE tickets SET status = ?, closed_at = ?, closed_by = ? WHERE id = ? AND status = ?",
            params![
                TicketStatus::Closed.as_str(),
                now.to_rfc3339(),
                to_sql_id(closed_by),
                current.id,
                TicketStatus::Open.as_str(),
            ],
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(Ticket {
            closed_at: Some(now),
            closed_by: Some(closed_by),
            status: TicketStatus::Closed,
            ..current
        })
    }

    fn append_log(
        &self,
        ticket_id: i64,
        action: TicketAction,
        actor_id: u64,
        details: Option<serde_json::Value>,
    ) -> Result<TicketLogEntry, TicketError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let details_json = details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| TicketError::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO ticket_logs (ticket_id, action, user_id, timestamp, details) VALUES (?, ?, ?, ?, ?)",
            params![
                ticket_id,
                action.as_str(),
                to_sql_id(actor_id),
                now.to_rfc3339(),
                details_json,
            ],
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(TicketLogEntry {
            id: conn.last_insert_rowid(),
            ticket_id,
            action,
            actor_id,
            timestamp: now,
            details,
        })
    }

    fn logs(&self, ticket_id: i64) -> Result<Vec<TicketLogEntry>, TicketError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, ticket_id, action, user_id, timestamp, details FROM ticket_logs WHERE ticket_id = ? ORDER BY id ASC",
            )
            .map_err(|e| TicketError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![ticket_id], Self::row_to_log)
            .map_err(|e| TicketError::Database(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| TicketError::Database(e.to_string()))
    }

    fn save_transcript(
        &self,
        ticket_id: i64,
        content: &str,
    ) -> Result<StoredTranscript, TicketError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO transcripts (ticket_id, content, created_at) VALUES (?, ?, ?)",
            params![ticket_id, content, now.to_rfc3339()],
        )
        .map_err(|e| TicketError::Database(e.to_string()))?;

        Ok(StoredTranscript {
            id: conn.last_insert_rowid(),
            ticket_id,
            content: content.to_string(),
            created_at: now,
        })
    }

    fn transcript(&self, ticket_id: i64) -> Result<Option<StoredTranscript>, TicketError> {
        let conn = self.conn.lock().unwrap();

        let result = conn.query_row(
            "SELECT id, ticket_id, content, created_at FROM transcripts WHERE ticket_id = ? ORDER BY id DESC LIMIT 1",
            params![ticket_id],
            |row| {
                let created_at: String = row.get(3)?;
                Ok(StoredTranscript {
                    id: row.get(0)?,
                    ticket_id: row.get(1)?,
                    content: row.get(2)?,
                    created_at: parse_timestamp(&created_at),
                })
            },
        );

        match result {
            Ok(transcript) => Ok(Some(transcript)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TicketError::Database(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteTicketStore {
        SqliteTicketStore::in_memory().unwrap()
    }

    fn request(channel_id: u64, owner_id: u64) -> CreateTicketRequest {
        CreateTicketRequest {
            channel_id,
            owner_id,
            ticket_type: "General".to_string(),
        }
    }

    #[test]
    fn test_create_ticket() {
        let store = create_test_store();
        let ticket = store.create(request(1001, 42)).unwrap();

        assert!(ticket.id > 0);
        assert_eq!(ticket.channel_id, 1001);
        assert_eq!(ticket.owner_id, 42);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert!(ticket.closed_at.is_none());
    }

    #[test]
    fn test_create_duplicate_channel_fails() {
        let store = create_test_store();
        store.create(request(1001, 42)).unwrap();
        let err = store.create(request(1001, 43)).unwrap_err();
        assert!(matches!(err, TicketError::AlreadyExists(1001)));
    }

    #[test]
    fn test_get_by_channel() {
        let store = create_test_store();
        let created = store.create(request(1001, 42)).unwrap();

        let by_channel = store.get_by_channel(1001).unwrap().unwrap();
        assert_eq!(by_channel.id, created.id);
        assert_eq!(store.get(created.id).unwrap().unwrap().channel_id, 1001);
        assert!(store.get_by_channel(9999).unwrap().is_none());
    }

    #[test]
    fn test_large_snowflakes_roundtrip() {
        let store = create_test_store();
        let channel_id = 1_234_567_890_123_456_789;
        store.create(request(channel_id, 987_654_321_098_765_432)).unwrap();

        let ticket = store.get_by_channel(channel_id).unwrap().unwrap();
        assert_eq!(ticket.owner_id, 987_654_321_098_765_432);
    }

    #[test]
    fn test_list_with_filters() {
        let store = create_test_store();
        store.create(request(1, 10)).unwrap();
        store.create(request(2, 10)).unwrap();
        store.create(request(3, 20)).unwrap();
        store.close(2, 99).unwrap();

        let open = store
            .list(&TicketFilter::new().with_status("open"))
            .unwrap();
        assert_eq!(open.len(), 2);

        let mine = store.list(&TicketFilter::new().with_owner(10)).unwrap();
        assert_eq!(mine.len(), 2);

        let mine_open = store
            .count(&TicketFilter::new().with_owner(10).with_status("open"))
            .unwrap();
        assert_eq!(mine_open, 1);
    }

    #[test]
    fn test_list_pagination() {
        let store = create_test_store();
        for channel in 1..=5 {
            store.create(request(channel, 10)).unwrap();
        }

        let page = store
            .list(&TicketFilter::new().with_limit(2).with_offset(1))
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(store.count(&TicketFilter::new()).unwrap(), 5);
    }

    #[test]
    fn test_close_ticket() {
        let store = create_test_store();
        store.create(request(1001, 42)).unwrap();

        let closed = store.close(1001, 7).unwrap();
        assert_eq!(closed.status, TicketStatus::Closed);
        assert_eq!(closed.closed_by, Some(7));
        assert!(closed.closed_at.is_some());

        let stored = store.get_by_channel(1001).unwrap().unwrap();
        assert_eq!(stored.status, TicketStatus::Closed);
        assert_eq!(stored.closed_by, Some(7));
    }

    #[test]
    fn test_close_twice_fails() {
        let store = create_test_store();
        store.create(request(1001, 42)).unwrap();
        store.close(1001, 7).unwrap();

        let err = store.close(1001, 7).unwrap_err();
        assert!(matches!(err, TicketError::InvalidState { .. }));
    }

    #[test]
    fn test_close_unknown_channel() {
        let store = create_test_store();
        let err = store.close(5, 7).unwrap_err();
        assert!(matches!(err, TicketError::NotFound(_)));
    }

    #[test]
    fn test_logs_are_append_only_and_ordered() {
        let store = create_test_store();
        let ticket = store.create(request(1001, 42)).unwrap();

        store
            .append_log(ticket.id, TicketAction::Created, 42, None)
            .unwrap();
        store
            .append_log(
                ticket.id,
                TicketAction::ForceClosed,
                7,
                Some(serde_json::json!({"reason": "Admin force close"})),
            )
            .unwrap();

        let logs = store.logs(ticket.id).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action, TicketAction::Created);
        assert_eq!(logs[1].action, TicketAction::ForceClosed);
        assert_eq!(logs[1].details.as_ref().unwrap()["reason"], "Admin force close");
    }

    #[test]
    fn test_save_and_read_transcript() {
        let store = create_test_store();
        let ticket = store.create(request(1001, 42)).unwrap();
        assert!(store.transcript(ticket.id).unwrap().is_none());

        store.save_transcript(ticket.id, "=== Transcript ===").unwrap();
        let transcript = store.transcript(ticket.id).unwrap().unwrap();
        assert_eq!(transcript.content, "=== Transcript ===");
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.db");

        {
            let store = SqliteTicketStore::new(&path).unwrap();
            store.create(request(1001, 42)).unwrap();
        }

        let reopened = SqliteTicketStore::new(&path).unwrap();
        assert!(reopened.get_by_channel(1001).unwrap().is_some());
    }
}
