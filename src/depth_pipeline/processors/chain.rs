use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Ordered list of processors that can be replaced from another thread.
///
/// Readers take a snapshot once per frame and run it to completion, writers
/// swap the whole list. A frame therefore sees either the old chain or the new
/// one, never a mix of both.
pub struct ProcessorChain<P: ?Sized> {
    current: Arc<RwLock<Arc<Vec<Arc<P>>>>>,
}

impl<P: ?Sized> ProcessorChain<P> {
    pub fn new(processors: Vec<Arc<P>>) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(processors))),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<P>>> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn replace(&self, processors: Vec<Arc<P>>) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(processors);
    }

    /// Appends to a copy of the current list and publishes the copy.
    pub fn push(&self, processor: Arc<P>) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::clone(&guard);
        next.push(processor);
        *guard = Arc::new(next);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P: ?Sized> Clone for ProcessorChain<P> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<P: ?Sized> Default for ProcessorChain<P> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<P: ?Sized> fmt::Debug for ProcessorChain<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("len", &self.len())
            .finish()
    }
}
