//! # Systems
//!
//! A system is one unit of per-frame logic. Systems run on the loop thread
//! in registration order. Each reads the committed store and may request
//! structural changes; the loop commits those requests right after the
//! system returns, so the next system sees them.

use std::time::Duration;

use lumen_core::{EntityComponentManager, Tag};

use crate::error::SystemError;
use crate::input::InputSnapshot;

/// Immutable per-frame context handed to every system.
#[derive(Clone, Debug)]
pub struct FrameSnapshot {
    /// Frame number, starting at zero.
    pub frame: u64,
    /// Duration of the previous frame, pacing included.
    pub frame_time: Duration,
    /// Time since the loop started.
    pub elapsed: Duration,
    /// Input events of this frame.
    pub input: InputSnapshot,
    /// Tag of the world entity.
    pub world: Tag,
    /// Tag of the camera entity.
    pub camera: Tag,
}

/// Per-frame logic.
pub trait System: Send {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Runs the system for one frame.
    ///
    /// # Errors
    ///
    /// Any error aborts this system's frame. Whether the loop continues is
    /// decided by the engine configuration.
    fn execute(
        &mut self,
        snapshot: &FrameSnapshot,
        manager: &EntityComponentManager,
    ) -> Result<(), SystemError>;
}

/// Ordered collection of systems.
#[derive(Default)]
pub struct SystemRegistry {
    systems: Vec<Box<dyn System>>,
}

impl SystemRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a system; it runs after every system added before it.
    pub fn add(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    /// Appends a boxed system.
    pub fn add_boxed(&mut self, system: Box<dyn System>) {
        self.systems.push(system);
    }

    /// Number of systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns true if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// System names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name()).collect()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn System>> {
        self.systems.iter_mut()
    }
}

impl std::fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Collision;
    impl System for Collision {
        fn execute(&mut self, _: &FrameSnapshot, _: &EntityComponentManager) -> Result<(), SystemError> {
            Ok(())
        }
    }

    struct Render;
    impl System for Render {
        fn name(&self) -> &str {
            "render"
        }

        fn execute(&mut self, _: &FrameSnapshot, _: &EntityComponentManager) -> Result<(), SystemError> {
            Ok(())
        }
    }

    #[test]
    fn test_registration_order_and_names() {
        let mut registry = SystemRegistry::new();
        registry.add(Collision);
        registry.add(Render);

        let names = registry.names();
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("Collision"));
        assert_eq!(names[1], "render");
    }
}
