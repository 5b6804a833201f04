use thiserror::Error;

/// Fatal, invariant-violation-class failures.
///
/// Business-logic outcomes (duplicate id, non-positive quantity, FOK
/// infeasibility, cancel-miss) are never reported through this type — they
/// are reported via [`crate::orders::OrderStatus`] and boolean returns, per
/// the engine's "never throws on business-logic failure" contract. This
/// enum exists only for the class of bug that should abort rather than be
/// silently recovered from.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("book invariant violated: {0}")]
    InvariantViolation(String),
}
