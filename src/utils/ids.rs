//! Identifier generation for checkpoints and interrupts.

use uuid::Uuid;

/// Fresh checkpoint id.
///
/// Ids are UUIDv4 and therefore not ordered by creation; ordering of
/// checkpoints is the store's responsibility (the in-memory saver keeps an
/// explicit append-only log per thread/namespace).
#[must_use]
pub fn checkpoint_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fresh 128-bit random hex identifier for interrupts.
#[must_use]
pub fn interrupt_id() -> String {
    let bytes: [u8; 16] = rand::random();
    let mut out = String::with_capacity(32);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
