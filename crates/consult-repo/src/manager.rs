use std::sync::Mutex;
use std::str::FromStr;

use consult_core::types::{
    AnalysisResult, ResultKind, ResultPayload, SessionId, SpeakerRole, TranscriptTurn, TurnId,
};
use rusqlite::Connection;
use tracing::instrument;

use crate::error::{RepoError, Result};
use crate::types::SessionRecord;

/// Thread-safe store for sessions, their transcripts, and their analysis
/// results. Wraps a single SQLite connection in a `Mutex` — sufficient for
/// the single-node target; a connection pool would replace this if the
/// hub ever needed to shard across processes.
pub struct SessionRepo {
    db: Mutex<Connection>,
}

impl SessionRepo {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    #[instrument(skip(self), fields(room = %room))]
    pub fn create_session(&self, id: &SessionId, room: &str) -> Result<SessionRecord> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO sessions (id, room, prior_summary, created_at, updated_at)
             VALUES (?1, ?2, '', ?3, ?3)",
            rusqlite::params![id.as_str(), room, now],
        )?;
        Ok(SessionRecord {
            id: id.as_str().to_string(),
            room: room.to_string(),
            prior_summary: String::new(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    #[instrument(skip(self), fields(id = %id))]
    pub fn get_session(&self, id: &SessionId) -> Result<Option<SessionRecord>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, room, prior_summary, created_at, updated_at
             FROM sessions WHERE id = ?1",
            rusqlite::params![id.as_str()],
            row_to_session,
        ) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(RepoError::Database(e)),
        }
    }

    /// Overwrite the rolling summary, bumping `updated_at`.
    #[instrument(skip(self, summary), fields(id = %id))]
    pub fn update_summary(&self, id: &SessionId, summary: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE sessions SET prior_summary = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![summary, now, id.as_str()],
        )?;
        if rows_changed == 0 {
            return Err(RepoError::NotFound {
                id: id.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Append one transcript turn. Idempotent on `(session_id, turn_id)` —
    /// a retried append is a no-op rather than a duplicate row.
    #[instrument(skip(self, turn), fields(id = %id, turn_id = %turn.turn_id))]
    pub fn append_turn(&self, id: &SessionId, turn: &TranscriptTurn) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO transcript_turns
                (session_id, turn_id, speaker_role, speaker_name, text, timestamp, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                id.as_str(),
                turn.turn_id.0 as i64,
                turn.speaker_role.to_string(),
                turn.speaker_name,
                turn.text,
                turn.timestamp.to_rfc3339(),
                turn.confidence,
            ],
        )?;
        Ok(())
    }

    /// All turns for a session, oldest first.
    #[instrument(skip(self), fields(id = %id))]
    pub fn list_turns(&self, id: &SessionId) -> Result<Vec<TranscriptTurn>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT turn_id, speaker_role, speaker_name, text, timestamp, confidence
             FROM transcript_turns WHERE session_id = ?1 ORDER BY turn_id ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![id.as_str()], row_to_turn)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Persist one branch's result, overwriting any prior row for the same
    /// `(session_id, turn_id, kind)` — a re-run of a turn replaces, not
    /// duplicates, its results.
    #[instrument(skip(self, result), fields(id = %result.session_id, turn_id = %result.turn_id, kind = %result.kind))]
    pub fn save_result(&self, result: &AnalysisResult) -> Result<()> {
        let payload = serde_json::to_string(&result.payload)
            .map_err(|e| RepoError::Serialization(e.to_string()))?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO analysis_results (session_id, turn_id, kind, payload, produced_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id, turn_id, kind) DO UPDATE SET
                payload = excluded.payload, produced_at = excluded.produced_at",
            rusqlite::params![
                result.session_id.as_str(),
                result.turn_id.0 as i64,
                result.kind.to_string(),
                payload,
                result.produced_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Results for a session, optionally only those at or after `since_turn`.
    #[instrument(skip(self), fields(id = %id))]
    pub fn list_results(
        &self,
        id: &SessionId,
        since_turn: Option<TurnId>,
    ) -> Result<Vec<AnalysisResult>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT session_id, turn_id, kind, payload, produced_at
             FROM analysis_results WHERE session_id = ?1 AND turn_id >= ?2
             ORDER BY turn_id ASC",
        )?;
        let floor = since_turn.map(|t| t.0).unwrap_or(0) as i64;
        let rows = stmt.query_map(rusqlite::params![id.as_str(), floor], row_to_result)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        id: row.get(0)?,
        room: row.get(1)?,
        prior_summary: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn row_to_turn(row: &rusqlite::Row<'_>) -> rusqlite::Result<TranscriptTurn> {
    let turn_id: i64 = row.get(0)?;
    let role_str: String = row.get(1)?;
    let timestamp_str: String = row.get(4)?;
    Ok(TranscriptTurn {
        turn_id: TurnId(turn_id as u64),
        speaker_role: SpeakerRole::from_str(&role_str).unwrap_or_default(),
        speaker_name: row.get(2)?,
        text: row.get(3)?,
        timestamp: timestamp_str
            .parse()
            .unwrap_or_else(|_| chrono::Utc::now()),
        confidence: row.get(5)?,
    })
}

fn row_to_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnalysisResult> {
    let session_id: String = row.get(0)?;
    let turn_id: i64 = row.get(1)?;
    let kind_str: String = row.get(2)?;
    let payload_str: String = row.get(3)?;
    let produced_at_str: String = row.get(4)?;
    Ok(AnalysisResult {
        session_id: SessionId(session_id),
        turn_id: TurnId(turn_id as u64),
        kind: parse_kind(&kind_str),
        payload: serde_json::from_str::<ResultPayload>(&payload_str)
            .unwrap_or(ResultPayload::Err {
                error_code: "corrupt_row".to_string(),
            }),
        produced_at: produced_at_str
            .parse()
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}

fn parse_kind(s: &str) -> ResultKind {
    match s {
        "summary" => ResultKind::Summary,
        "intent" => ResultKind::Intent,
        "sentiment" => ResultKind::Sentiment,
        "rag" => ResultKind::Rag,
        "faq" => ResultKind::Faq,
        "risk" => ResultKind::Risk,
        "draft" => ResultKind::Draft,
        _ => ResultKind::Draft,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consult_core::types::ResultPayload;

    fn repo() -> SessionRepo {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        SessionRepo::new(conn)
    }

    #[test]
    fn create_and_get_session_round_trips() {
        let repo = repo();
        let id = SessionId::new();
        let created = repo.create_session(&id, "room-1").unwrap();
        assert_eq!(created.room, "room-1");

        let fetched = repo.get_session(&id).unwrap().unwrap();
        assert_eq!(fetched.id, id.as_str());
        assert_eq!(fetched.prior_summary, "");
    }

    #[test]
    fn get_session_returns_none_when_missing() {
        let repo = repo();
        assert!(repo.get_session(&SessionId::new()).unwrap().is_none());
    }

    #[test]
    fn append_turn_is_idempotent() {
        let repo = repo();
        let id = SessionId::new();
        repo.create_session(&id, "room-1").unwrap();

        let turn = TranscriptTurn {
            turn_id: TurnId(1),
            speaker_role: SpeakerRole::Customer,
            speaker_name: "alice".to_string(),
            text: "hello".to_string(),
            timestamp: chrono::Utc::now(),
            confidence: Some(0.9),
        };
        repo.append_turn(&id, &turn).unwrap();
        repo.append_turn(&id, &turn).unwrap();

        let turns = repo.list_turns(&id).unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].text, "hello");
    }

    #[test]
    fn save_result_overwrites_same_turn_and_kind() {
        let repo = repo();
        let id = SessionId::new();
        repo.create_session(&id, "room-1").unwrap();

        let mut result = AnalysisResult {
            session_id: id.clone(),
            turn_id: TurnId(1),
            kind: ResultKind::Intent,
            payload: ResultPayload::Ok(serde_json::json!({"label": "cancel"})),
            produced_at: chrono::Utc::now(),
        };
        repo.save_result(&result).unwrap();

        result.payload = ResultPayload::Ok(serde_json::json!({"label": "billing_inquiry"}));
        repo.save_result(&result).unwrap();

        let results = repo.list_results(&id, None).unwrap();
        assert_eq!(results.len(), 1);
        match &results[0].payload {
            ResultPayload::Ok(v) => assert_eq!(v["label"], "billing_inquiry"),
            _ => panic!("expected ok payload"),
        }
    }

    #[test]
    fn update_summary_changes_prior_summary() {
        let repo = repo();
        let id = SessionId::new();
        repo.create_session(&id, "room-1").unwrap();
        repo.update_summary(&id, "customer wants to cancel").unwrap();

        let fetched = repo.get_session(&id).unwrap().unwrap();
        assert_eq!(fetched.prior_summary, "customer wants to cancel");
    }
}
