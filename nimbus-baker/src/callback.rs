//! Callback definitions.

/// A progress callback for long-running operations.
///
/// Any user data the callback needs is captured by the closure.
///
/// # Callback arguments
///
/// - `progress`: Fraction of the function work that has been completed, between 0.0 and 1.0.
pub struct ProgressCallback {
    callback: Box<dyn FnMut(f32) + Send>,
}

impl ProgressCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(f32) + Send + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    pub(crate) fn call(&mut self, progress: f32) {
        (self.callback)(progress);
    }
}

impl std::fmt::Debug for ProgressCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressCallback")
            .field("callback", &"<closure>")
            .finish()
    }
}
