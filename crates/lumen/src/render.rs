//! # Render Notification
//!
//! After every frame the loop hands the current live entities to a
//! [`RenderNotify`] sink. Handles borrow the store and are only valid for
//! the duration of the call.

use lumen_core::EntityHandle;

/// Receives the entity set of each completed frame.
pub trait RenderNotify: Send {
    /// Called once per frame on the loop thread.
    fn notify_render(&mut self, entities: &[EntityHandle<'_>]);
}

impl<F> RenderNotify for F
where
    F: FnMut(&[EntityHandle<'_>]) + Send,
{
    fn notify_render(&mut self, entities: &[EntityHandle<'_>]) {
        self(entities);
    }
}

/// Sink that ignores every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRender;

impl RenderNotify for NullRender {
    fn notify_render(&mut self, _entities: &[EntityHandle<'_>]) {}
}
