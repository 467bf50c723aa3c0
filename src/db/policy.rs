//! Row-level access policy rejections.
//!
//! Writes are issued as guarded statements (`INSERT ... SELECT ... WHERE`
//! or `UPDATE ... WHERE` with an ownership predicate). When the guard filters
//! the row out, the repository returns a [`PolicyViolation`] wrapped in
//! `anyhow::Error`; services look for it with [`is_policy_violation`].

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
#[error("new row violates row-level security policy for table \"{table}\"")]
pub struct PolicyViolation {
    pub table: &'static str,
    pub actor: Uuid,
}

impl PolicyViolation {
    pub fn new(table: &'static str, actor: Uuid) -> Self {
        Self { table, actor }
    }
}

/// Turn a zero-row guarded write into a policy rejection.
pub(crate) fn ensure_allowed(rows_affected: u64, table: &'static str, actor: Uuid) -> anyhow::Result<()> {
    if rows_affected == 0 {
        tracing::debug!(table, %actor, "write rejected by access policy");
        return Err(PolicyViolation::new(table, actor).into());
    }
    Ok(())
}

/// True when the error chain carries a policy rejection.
pub fn is_policy_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<PolicyViolation>())
}
