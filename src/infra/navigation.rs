//! Navigation sink for headless use.

use std::sync::Mutex;

use tracing::info;

use crate::application::repos::Navigator;

/// Logs requested routes; the CLI has no router to drive.
#[derive(Debug, Default)]
pub struct LoggingNavigator {
    visited: Mutex<Vec<String>>,
}

impl LoggingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes requested so far, oldest first.
    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .map(|visited| visited.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl Navigator for LoggingNavigator {
    fn navigate(&self, path: &str) {
        info!(path, "Navigation requested");
        match self.visited.lock() {
            Ok(mut visited) => visited.push(path.to_string()),
            Err(poisoned) => poisoned.into_inner().push(path.to_string()),
        }
    }
}
