//! Renderer observers.

use crossbeam_channel::Sender;

use alert_types::{RendererNotification, RendererState};

/// Receives high-level renderer state transitions.
///
/// Called on the renderer's worker thread, so implementations must return quickly.
pub trait RendererObserver: Send + Sync {
    fn on_renderer_state_change(&self, state: RendererState, message: &str);
}

/// Forward notifications into a channel; a dropped receiver is ignored.
impl RendererObserver for Sender<RendererNotification> {
    fn on_renderer_state_change(&self, state: RendererState, message: &str) {
        let _ = self.send(RendererNotification {
            state,
            message: message.to_string(),
        });
    }
}
