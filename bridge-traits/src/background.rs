//! Headless (background) execution bootstrap.
//!
//! Some hosts can keep a secondary execution context alive while the main
//! application is not in the foreground:
//! - **iOS**: a headless Flutter engine started from a callback handle
//! - **Android**: a foreground service
//! - **Desktop / Web**: not applicable; no implementation is provided
//!
//! The core only needs to know whether the context started, so that
//! background-only events can be routed to it.

use crate::{error::Result, platform::PlatformSendSync};

/// Starts the headless execution context.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::background::HeadlessRunner;
///
/// async fn boot(runner: &dyn HeadlessRunner, handle: i64) -> bool {
///     runner.start(handle).await.unwrap_or(false)
/// }
/// ```
#[async_trait::async_trait]
pub trait HeadlessRunner: PlatformSendSync {
    /// Start the context identified by the host callback `handle`.
    ///
    /// Returns `Ok(true)` once the context is running and able to receive
    /// background events, `Ok(false)` if the host declined to start it.
    async fn start(&self, handle: i64) -> Result<bool>;

    /// Whether a context is currently running.
    fn is_running(&self) -> bool;
}
