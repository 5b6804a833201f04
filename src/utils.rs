//! Small utilities shared across modules: graceful shutdown wiring for the
//! CLI binary, and a monotonic id allocator for components that mint their
//! own order ids (the generator, the strategy harness).

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::orders::OrderId;

/// Returns a token that cancels itself the moment ctrl-c is received, for
/// cooperative shutdown of a running replay.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let tc = token.clone();
    tokio::spawn(async move {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl+C handler");
        tc.cancel();
    });
    token
}

/// Hands out unique, monotonically increasing [`OrderId`]s.
///
/// Per the design notes, a plain counter is the preferred order identity:
/// cheap to compare, no string hashing on the hot path, and trivially
/// shareable between a generator/strategy and the book it submits to.
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn starting_at(first: OrderId) -> Self {
        Self { next: AtomicU64::new(first) }
    }

    pub fn next(&self) -> OrderId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let alloc = IdAllocator::default();
        let a = alloc.next();
        let b = alloc.next();
        assert!(b > a);
    }
}
