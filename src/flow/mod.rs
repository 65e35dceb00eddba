//! Control signals exchanged between plugins and the pipeline.

use bytes::Bytes;

/// What the pipeline should do after a plugin has run.
///
/// Every plugin stage returns one of these. The pipeline consumes each value
/// exactly once; nothing is resumed after a terminal signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next plugin, or with the handler.
    #[default]
    Forward,
    /// Stop processing and send these bytes as the whole response body.
    ServeCached(Bytes),
    /// Restart the request from the first plugin.
    Reboot,
}

/// Outcome of the cache gate. The gate never produces [`Flow::Reboot`].
pub type CacheDecision = Flow;

impl Flow {
    /// Returns `true` when the pipeline must not run any further stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ServeCached(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_serve_cached_is_terminal() {
        assert!(Flow::ServeCached(Bytes::from_static(b"x")).is_terminal());
        assert!(!Flow::Forward.is_terminal());
        assert!(!Flow::Reboot.is_terminal());
        assert_eq!(Flow::default(), Flow::Forward);
    }
}
