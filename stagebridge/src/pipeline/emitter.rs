//! Downstream delivery of emitted records.

use crate::errors::{BridgeError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Receives records emitted by a stage.
#[async_trait]
pub trait Emitter<T: Send>: Send + Sync {
    /// Delivers one record, waiting for capacity if needed.
    async fn emit(&self, item: T) -> Result<()>;
}

#[async_trait]
impl<T: Send + 'static> Emitter<T> for mpsc::Sender<T> {
    async fn emit(&self, item: T) -> Result<()> {
        self.send(item)
            .await
            .map_err(|_| BridgeError::Downstream("receiver dropped".to_string()))
    }
}

/// Keeps emitted records in memory.
#[derive(Debug)]
pub struct CollectingEmitter<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for CollectingEmitter<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }
}

impl<T> CollectingEmitter<T> {
    /// Creates an empty emitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns true if nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Removes and returns everything received so far.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }
}

impl<T: Clone> CollectingEmitter<T> {
    /// Returns a copy of everything received so far.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.items.lock().clone()
    }
}

#[async_trait]
impl<T: Send + 'static> Emitter<T> for CollectingEmitter<T> {
    async fn emit(&self, item: T) -> Result<()> {
        self.items.lock().push(item);
        Ok(())
    }
}
