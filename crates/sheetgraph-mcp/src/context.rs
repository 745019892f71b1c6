//! Graph context shared by the MCP tools.
//!
//! The server owns one in-memory graph. `analyze` replaces its contents and
//! records which spreadsheet it came from; read tools refuse to run until
//! that has happened.

use crate::error::{Error, Result};
use sheetgraph::app::App;
use sheetgraph::config::SheetgraphConfig;
use std::sync::Arc;

/// Global context state for the MCP server.
pub struct Context {
    app: Arc<App>,
    spreadsheet_id: Option<String>,
}

impl Context {
    /// Create a context with an empty graph.
    #[must_use]
    pub fn new(config: SheetgraphConfig) -> Self {
        Self::with_app(App::from_config(config))
    }

    /// Create a context around an existing App.
    #[must_use]
    pub fn with_app(app: App) -> Self {
        Self {
            app: Arc::new(app),
            spreadsheet_id: None,
        }
    }

    /// The App, whether or not a graph has been loaded.
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// The App, once a spreadsheet has been analyzed.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoGraph` before the first successful `analyze`.
    pub fn loaded_app(&self) -> Result<&Arc<App>> {
        if self.spreadsheet_id.is_some() {
            Ok(&self.app)
        } else {
            Err(Error::NoGraph)
        }
    }

    /// The spreadsheet the graph was last built from.
    pub fn spreadsheet_id(&self) -> Option<&str> {
        self.spreadsheet_id.as_deref()
    }

    /// Record a successful analysis.
    pub fn set_spreadsheet(&mut self, spreadsheet_id: &str) {
        tracing::debug!(spreadsheet = spreadsheet_id, "Graph context set");
        self.spreadsheet_id = Some(spreadsheet_id.to_string());
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(SheetgraphConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_app_requires_analysis() {
        let mut context = Context::default();
        assert!(matches!(context.loaded_app(), Err(Error::NoGraph)));

        context.set_spreadsheet("budget");
        assert!(context.loaded_app().is_ok());
        assert_eq!(context.spreadsheet_id(), Some("budget"));
    }
}
