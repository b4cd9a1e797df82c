use thiserror::Error;

/// Faults raised by the identity bridge.
///
/// None of these are allowed to crash a render or request pipeline; callers
/// degrade to an unauthenticated principal instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("authenticated principal is missing required claims: {}", missing.join(", "))]
    MaterializationFault { missing: Vec<String> },
    #[error("handoff slot {0} was already written in this render cycle")]
    DuplicateWrite(String),
    #[error("identity snapshot schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("policy not found: {0}")]
    PolicyNotFound(String),
}
