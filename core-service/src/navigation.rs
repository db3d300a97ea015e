//! Typed navigation requests.
//!
//! The core never touches routing. It hands a [`Route`] to a host-supplied
//! [`Navigator`]; data one page passes to the next (a generator draft, the
//! folder an import landed in) travels inside the route itself.

use core_import::FolderId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{CoreError, Result};

/// Prompt and mode prefilled into the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorDraft {
    pub prompt: String,
    /// Generator mode identifier, opaque to the core
    pub mode: Option<String>,
}

impl GeneratorDraft {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            mode: None,
        }
    }

    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }
}

/// A navigation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "lowercase")]
pub enum Route {
    Dashboard,
    Editor,
    Generator { draft: Option<GeneratorDraft> },
    Library { folder_id: Option<FolderId> },
    Settings,
}

impl Route {
    pub fn generator(draft: GeneratorDraft) -> Self {
        Route::Generator { draft: Some(draft) }
    }

    /// Opaque path token understood by the host router.
    pub fn token(&self) -> &'static str {
        match self {
            Route::Dashboard => "dashboard",
            Route::Editor => "editor",
            Route::Generator { .. } => "generator",
            Route::Library { .. } => "library",
            Route::Settings => "settings",
        }
    }
}

/// Parses a bare token. Parameters are never encoded in tokens, so parsed
/// routes carry none.
impl FromStr for Route {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "dashboard" => Ok(Route::Dashboard),
            "editor" => Ok(Route::Editor),
            "generator" => Ok(Route::Generator { draft: None }),
            "library" => Ok(Route::Library { folder_id: None }),
            "settings" => Ok(Route::Settings),
            _ => Err(CoreError::UnknownRoute(s.to_string())),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Host-side router.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route) -> Result<()>;
}

/// Delivers routes over a tokio channel to whatever task owns the UI.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    sender: mpsc::UnboundedSender<Route>,
}

impl ChannelNavigator {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, route: Route) -> Result<()> {
        debug!(route = route.token(), "Navigating");
        self.sender
            .send(route)
            .map_err(|_| CoreError::NavigatorClosed)
    }
}

/// Navigator that drops every request, for hosts without routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _route: Route) -> Result<()> {
        Ok(())
    }
}
