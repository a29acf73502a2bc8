//! Thread-safety helper bound shared by every bridge trait.
//!
//! Engine callbacks and remote-control presses arrive on host-owned threads,
//! so every capability handed to the core must be shareable across threads.

/// Marker trait applying `Send + Sync` to bridge implementations.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}
