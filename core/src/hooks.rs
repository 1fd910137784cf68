//! Bounded, ordered hook lists run around the exchange.

use std::fmt;

use crate::error::{Error, HookError, Result};

/// Maximum number of hooks per list.
pub const HOOK_CAPACITY: usize = 8;

/// A callback that may inspect or edit `T` and signal failure.
pub type Hook<T> = Box<dyn Fn(&mut T) -> std::result::Result<(), HookError> + Send + Sync>;

/// An ordered list of at most [`HOOK_CAPACITY`] hooks.
pub struct HookPipeline<T: ?Sized> {
    hooks: Vec<Hook<T>>,
}

/// The first hook that failed during [`HookPipeline::run`].
#[derive(Debug)]
pub struct HookFailure {
    pub index: usize,
    pub error: HookError,
}

impl<T: ?Sized> HookPipeline<T> {
    pub fn new() -> Self {
        Self {
            hooks: Vec::with_capacity(HOOK_CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Appends a hook. A full list is left unchanged.
    pub fn register(&mut self, hook: Hook<T>) -> Result<()> {
        if self.hooks.len() >= HOOK_CAPACITY {
            return Err(Error::HookCapacityExceeded {
                capacity: HOOK_CAPACITY,
            });
        }
        self.hooks.push(hook);
        Ok(())
    }

    /// Removes the hook at `index`; later hooks shift down by one.
    pub fn unregister(&mut self, index: usize) -> Result<()> {
        if index >= self.hooks.len() {
            return Err(Error::IndexOutOfBounds {
                index,
                len: self.hooks.len(),
            });
        }
        drop(self.hooks.remove(index));
        Ok(())
    }

    pub fn reset(&mut self) {
        self.hooks.clear();
    }

    /// Runs the hooks in registration order, stopping at the first failure.
    pub fn run(&self, target: &mut T) -> std::result::Result<(), HookFailure> {
        for (index, hook) in self.hooks.iter().enumerate() {
            hook(target).map_err(|error| HookFailure { index, error })?;
        }
        Ok(())
    }
}

impl<T: ?Sized> Default for HookPipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for HookPipeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookPipeline")
            .field("len", &self.hooks.len())
            .finish()
    }
}
