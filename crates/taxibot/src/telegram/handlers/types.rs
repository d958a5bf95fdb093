//! Handler dependencies and error type

use std::sync::Arc;

use dispatchcore::{DispatchEngine, DriverDirectory};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub engine: DispatchEngine,
    pub directory: Arc<dyn DriverDirectory>,
}

impl HandlerDeps {
    pub fn new(engine: DispatchEngine, directory: Arc<dyn DriverDirectory>) -> Self {
        Self { engine, directory }
    }
}
