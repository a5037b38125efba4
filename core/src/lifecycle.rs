//! Single live backend, owned by the application.
//!
//! The input method keeps one `BackendSlot` at its composition root and
//! passes the backend by reference to the editors that need it.

use crate::error::LifecycleError;

#[derive(Debug)]
pub struct BackendSlot<B> {
    live: Option<B>,
}

impl<B> BackendSlot<B> {
    pub const fn new() -> Self {
        Self { live: None }
    }

    /// Install `backend`. Refused while another backend is live; the live
    /// one is left untouched and `backend` is dropped.
    pub fn init(&mut self, backend: B) -> Result<&mut B, LifecycleError> {
        if self.live.is_some() {
            return Err(LifecycleError::AlreadyInitialized);
        }
        Ok(self.live.insert(backend))
    }

    /// Tear the live backend down.
    pub fn finalize(&mut self) -> Result<(), LifecycleError> {
        match self.live.take() {
            Some(backend) => {
                drop(backend);
                Ok(())
            }
            None => Err(LifecycleError::NotInitialized),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.live.is_some()
    }

    pub fn get(&self) -> Option<&B> {
        self.live.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut B> {
        self.live.as_mut()
    }
}

impl<B> Default for BackendSlot<B> {
    fn default() -> Self {
        Self::new()
    }
}
