//! Per-session registrations that must not outlive their engine.

use bridge_traits::{EngineObserver, MediaEngine, ObserverToken};
use tokio::task::JoinHandle;
use tracing::warn;

/// Engine observers and the position ticker of one session.
///
/// Everything registered here is removed by [`clear`](Self::clear) before the
/// engine is discarded; dropping the set aborts the ticker.
#[derive(Default)]
pub(crate) struct ObserverSet {
    engine_tokens: Vec<ObserverToken>,
    ticker: Option<JoinHandle<()>>,
}

impl ObserverSet {
    pub fn register(&mut self, engine: &dyn MediaEngine, observer: EngineObserver) {
        self.engine_tokens.push(engine.add_observer(observer));
    }

    /// Install a ticker, aborting any previous one.
    pub fn start_ticker(&mut self, ticker: JoinHandle<()>) {
        self.stop_ticker();
        self.ticker = Some(ticker);
    }

    pub fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    pub fn has_ticker(&self) -> bool {
        self.ticker.is_some()
    }

    /// Unregister every observer from `engine` and stop the ticker.
    pub fn clear(&mut self, engine: Option<&dyn MediaEngine>) {
        self.stop_ticker();
        let tokens = std::mem::take(&mut self.engine_tokens);
        let Some(engine) = engine else {
            return;
        };
        for token in tokens {
            if let Err(err) = engine.remove_observer(token) {
                warn!(%token, error = %err, "Failed to remove engine observer");
            }
        }
    }

    /// Live registrations, ticker included.
    pub fn len(&self) -> usize {
        self.engine_tokens.len() + usize::from(self.ticker.is_some())
    }
}

impl Drop for ObserverSet {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
