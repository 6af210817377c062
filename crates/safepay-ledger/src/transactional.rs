//! All-or-nothing state changes.

/// A component whose state can be checkpointed and restored.
///
/// At most one checkpoint is open at a time. Callers pair every
/// [`checkpoint`](Transactional::checkpoint) with exactly one
/// [`commit`](Transactional::commit) or [`rollback`](Transactional::rollback).
pub trait Transactional {
    /// Remember the current state.
    fn checkpoint(&mut self);

    /// Discard the checkpoint and keep every change made since.
    fn commit(&mut self);

    /// Restore the state captured by the open checkpoint. A no-op if none
    /// is open.
    fn rollback(&mut self);
}
