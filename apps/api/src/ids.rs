//! Identifier Allocator — unique, human-readable business IDs per namespace,
//! idempotent under the at-least-once delivery of storage events.

use anyhow::{anyhow, Result};
use sqlx::PgPool;
use tracing::info;

/// ID namespaces. Each owns one counter row and one alias keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdNamespace {
    Job,
    Candidate,
}

impl IdNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdNamespace::Job => "job",
            IdNamespace::Candidate => "candidate",
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            IdNamespace::Job => "SO",
            IdNamespace::Candidate => "CAND",
        }
    }

    pub fn format_id(&self, value: i64) -> String {
        format!("{}_{:06}", self.prefix(), value)
    }
}

/// Mints a fresh ID. The increment-and-read is a single conditional write,
/// so no two concurrent callers ever receive the same value.
pub async fn allocate(pool: &PgPool, namespace: IdNamespace) -> Result<String> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO counters (namespace, current_value)
        VALUES ($1, 1)
        ON CONFLICT (namespace)
        DO UPDATE SET current_value = counters.current_value + 1
        RETURNING current_value
        "#,
    )
    .bind(namespace.as_str())
    .fetch_one(pool)
    .await?;

    Ok(namespace.format_id(value))
}

/// Returns the ID previously allocated for `natural_key`, or mints one.
///
/// Duplicate or out-of-order delivery of the same upload must not create two
/// IDs for one logical entity, so the claim on the natural key is a
/// conditional insert: the loser of a concurrent race adopts the winner's ID.
/// A lost race wastes one counter value — IDs are unique, not dense.
pub async fn resolve_or_create(
    pool: &PgPool,
    namespace: IdNamespace,
    natural_key: &str,
) -> Result<String> {
    if let Some(existing) = lookup_alias(pool, namespace, natural_key).await? {
        return Ok(existing);
    }

    let minted = allocate(pool, namespace).await?;

    let claimed = sqlx::query(
        r#"
        INSERT INTO id_aliases (namespace, natural_key, allocated_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (namespace, natural_key) DO NOTHING
        "#,
    )
    .bind(namespace.as_str())
    .bind(natural_key)
    .bind(&minted)
    .execute(pool)
    .await?
    .rows_affected();

    if claimed == 1 {
        info!(
            "Allocated {} for natural key '{}' in namespace {}",
            minted,
            natural_key,
            namespace.as_str()
        );
        return Ok(minted);
    }

    // Lost the race: another trigger claimed the key between our lookup and
    // insert. Adopt its ID.
    lookup_alias(pool, namespace, natural_key)
        .await?
        .ok_or_else(|| anyhow!("alias for '{natural_key}' vanished after conflicting insert"))
}

async fn lookup_alias(
    pool: &PgPool,
    namespace: IdNamespace,
    natural_key: &str,
) -> Result<Option<String>> {
    let id: Option<String> = sqlx::query_scalar(
        "SELECT allocated_id FROM id_aliases WHERE namespace = $1 AND natural_key = $2",
    )
    .bind(namespace.as_str())
    .bind(natural_key)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_format() {
        assert_eq!(IdNamespace::Job.format_id(123), "SO_000123");
    }

    #[test]
    fn test_candidate_id_format() {
        assert_eq!(IdNamespace::Candidate.format_id(45), "CAND_000045");
    }

    #[test]
    fn test_format_widens_past_six_digits() {
        assert_eq!(IdNamespace::Job.format_id(1_234_567), "SO_1234567");
    }

    #[test]
    fn test_namespace_strings_are_distinct() {
        assert_ne!(IdNamespace::Job.as_str(), IdNamespace::Candidate.as_str());
    }
}
