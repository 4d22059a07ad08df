//! Session/Memory Manager — bounded conversational memory for follow-up
//! questions about one (job, candidate) pair.
//!
//! The session ID is a pure function of its inputs; no I/O is needed to
//! compute it, only to persist and retrieve turns. Turns are append-only;
//! retention pruning (30 days) is the backing store's job, not ours.

use anyhow::{anyhow, Result};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;
use crate::models::memory::{MemoryTurnRow, TurnRole};
use crate::state::AppState;

/// Only the most recent N turns are ever surfaced to a new query.
pub const MAX_INJECTED_TURNS: i64 = 5;

/// Attempts to win the per-session append race before giving up.
const MAX_APPEND_ATTEMPTS: u32 = 5;

const CHAT_SYSTEM: &str =
    "You are an expert HR resume analyzer with access to previous conversations \
    about specific resume and job combinations. Use context to provide relevant responses.";

/// Deterministic session ID for a (job, candidate) pair: the first 16 hex
/// chars of SHA-256 over "jobId:candidateId". Same pair, same session,
/// on every invocation and every instance.
pub fn session_id(job_id: &str, candidate_id: &str) -> String {
    let digest = Sha256::digest(format!("{job_id}:{candidate_id}").as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

/// Appends one turn at the next sequence number. The insert is conditional
/// on `(session_id, seq)` being free; losing the race to a concurrent
/// append means re-reading the max and trying again, so simultaneous chats
/// serialize instead of silently dropping a turn.
pub async fn append_turn(
    pool: &PgPool,
    session_id: &str,
    role: TurnRole,
    text: &str,
) -> Result<i64> {
    for _ in 0..MAX_APPEND_ATTEMPTS {
        let next: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM memory_turns WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_one(pool)
        .await?;

        let claimed = sqlx::query(
            r#"
            INSERT INTO memory_turns (session_id, seq, role, text)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (session_id, seq) DO NOTHING
            "#,
        )
        .bind(session_id)
        .bind(next)
        .bind(role.as_str())
        .bind(text)
        .execute(pool)
        .await?
        .rows_affected();

        if claimed == 1 {
            return Ok(next);
        }
    }

    Err(anyhow!(
        "could not serialize append for session {session_id} after {MAX_APPEND_ATTEMPTS} attempts"
    ))
}

/// Returns the last `MAX_INJECTED_TURNS` turns, oldest to newest, for
/// priming the next inference call. The SQL LIMIT only bounds the read;
/// `recent_window` owns the ordering-and-truncation contract.
pub async fn inject_context(pool: &PgPool, session_id: &str) -> Result<Vec<MemoryTurnRow>> {
    let turns: Vec<MemoryTurnRow> = sqlx::query_as(
        "SELECT * FROM memory_turns WHERE session_id = $1 ORDER BY seq DESC LIMIT $2",
    )
    .bind(session_id)
    .bind(MAX_INJECTED_TURNS)
    .fetch_all(pool)
    .await?;
    Ok(recent_window(turns, MAX_INJECTED_TURNS as usize))
}

/// Keeps the `limit` most recent turns (highest seq) and hands them back
/// oldest-first, whatever order they arrived in.
fn recent_window(mut turns: Vec<MemoryTurnRow>, limit: usize) -> Vec<MemoryTurnRow> {
    turns.sort_by_key(|t| t.seq);
    let start = turns.len().saturating_sub(limit);
    turns.split_off(start)
}

/// Formats recent turns into the system-prompt suffix that gives follow-up
/// questions continuity.
fn prime_system_prompt(turns: &[MemoryTurnRow]) -> String {
    if turns.is_empty() {
        return CHAT_SYSTEM.to_string();
    }
    let history = turns
        .iter()
        .map(|t| format!("{}: {}", t.role, t.text))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{CHAT_SYSTEM}\n\nRecent conversation:\n{history}")
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub job_id: String,
    pub candidate_id: String,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
}

/// POST /api/v1/chat
///
/// Follow-up question about one candidate/job pair. Creates the session
/// lazily, injects recent history, and appends both sides of the exchange.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::Validation("query cannot be empty".to_string()));
    }

    let sid = session_id(&req.job_id, &req.candidate_id);
    let history = inject_context(&state.db, &sid)
        .await
        .map_err(AppError::Internal)?;
    info!(
        "Chat for session {sid} ({}/{}), {} turns of context",
        req.job_id,
        req.candidate_id,
        history.len()
    );

    let system = prime_system_prompt(&history);
    let reply = state
        .infer
        .complete(&system, &req.query)
        .await
        .map_err(|e| AppError::Llm(format!("chat completion failed: {e}")))?;

    append_turn(&state.db, &sid, TurnRole::User, &req.query)
        .await
        .map_err(AppError::Internal)?;
    append_turn(&state.db, &sid, TurnRole::Agent, &reply)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(ChatResponse {
        session_id: sid,
        reply,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_session_id_is_deterministic() {
        let a = session_id("SO_000001", "CAND_000001");
        let b = session_id("SO_000001", "CAND_000001");
        assert_eq!(a, b);
    }

    #[test]
    fn test_session_id_is_16_hex_chars() {
        let sid = session_id("SO_000123", "CAND_000045");
        assert_eq!(sid.len(), 16);
        assert!(sid.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_session_id_differs_per_pair() {
        assert_ne!(
            session_id("SO_000001", "CAND_000001"),
            session_id("SO_000001", "CAND_000002")
        );
        assert_ne!(
            session_id("SO_000001", "CAND_000002"),
            session_id("SO_000002", "CAND_000001")
        );
    }

    #[test]
    fn test_pair_components_are_delimited() {
        // "SO_1" + "1_CAND" must not collide with "SO_11" + "_CAND".
        assert_ne!(session_id("SO_1", "1_CAND"), session_id("SO_11", "_CAND"));
    }

    fn turn(seq: i64, role: TurnRole, text: &str) -> MemoryTurnRow {
        MemoryTurnRow {
            session_id: "abc".to_string(),
            seq,
            role: role.as_str().to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }

    fn numbered_turns(k: i64) -> Vec<MemoryTurnRow> {
        (1..=k)
            .map(|seq| {
                let role = if seq % 2 == 1 {
                    TurnRole::User
                } else {
                    TurnRole::Agent
                };
                turn(seq, role, &format!("turn {seq}"))
            })
            .collect()
    }

    fn seqs(turns: &[MemoryTurnRow]) -> Vec<i64> {
        turns.iter().map(|t| t.seq).collect()
    }

    #[test]
    fn test_recent_window_short_session_keeps_every_turn() {
        let window = recent_window(numbered_turns(3), 5);
        assert_eq!(seqs(&window), vec![1, 2, 3]);
    }

    #[test]
    fn test_recent_window_at_exact_limit_keeps_every_turn() {
        let window = recent_window(numbered_turns(5), 5);
        assert_eq!(seqs(&window), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_recent_window_truncates_to_most_recent() {
        let window = recent_window(numbered_turns(7), 5);
        assert_eq!(seqs(&window), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_recent_window_reorders_newest_first_input() {
        // The store hands rows back newest-first (ORDER BY seq DESC).
        let mut turns = numbered_turns(7);
        turns.reverse();
        let window = recent_window(turns, 5);
        assert_eq!(seqs(&window), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_prime_system_prompt_without_history() {
        assert_eq!(prime_system_prompt(&[]), CHAT_SYSTEM);
    }

    #[test]
    fn test_prime_system_prompt_orders_oldest_first() {
        let turns = vec![
            turn(1, TurnRole::User, "How strong is the AWS background?"),
            turn(2, TurnRole::Agent, "Seven years, mostly ECS."),
        ];
        let prompt = prime_system_prompt(&turns);
        let user_pos = prompt.find("user: How strong").unwrap();
        let agent_pos = prompt.find("agent: Seven years").unwrap();
        assert!(user_pos < agent_pos);
    }
}
