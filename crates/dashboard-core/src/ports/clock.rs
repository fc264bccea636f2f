use std::time::Instant;

/// Time source for expiry bookkeeping.
///
/// Abstracted so tests can move time forward without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}
