use loader_core::StatusProjector;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub projector: StatusProjector,
    /// Include per-level output blobs in responses.
    pub include_output: bool,
}

impl AppState {
    pub fn new(projector: StatusProjector, include_output: bool) -> Self {
        Self {
            projector,
            include_output,
        }
    }
}
