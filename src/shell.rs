// shell.rs: the top-level controller
//
// Owns everything the original kept in globals (cooperation state, embed
// target, open window count) and turns `ShellEvent`s into frontend calls.
// The frontend is whatever actually draws windows; the shell never touches a
// toolkit itself.

use std::ops::ControlFlow;
use std::path::PathBuf;

use calloop::LoopSignal;

use crate::config::Config;
use crate::coop::{Coordinator, Dispatch};
use crate::download::{self, DownloadError};
use crate::keywords::Keywords;
use crate::tabbed::Xid;
use crate::uri::ensure_scheme;

/// Returned by a frontend that could not plug into the requested XID.
#[derive(Debug, thiserror::Error)]
#[error("cannot plug into XID {0:#x}")]
pub struct EmbedRefused(pub Xid);

pub trait Frontend {
    /// Open a window showing `uri`, embedded into `embed` when given.
    fn open_window(&mut self, uri: &str, embed: Option<Xid>) -> Result<(), EmbedRefused>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    /// From the command line or a page asking for a new window.
    Open(String),
    /// A line read from the cooperation FIFO.
    Remote(String),
    WindowClosed,
}

pub struct Shell<F> {
    config: Config,
    coordinator: Coordinator,
    keywords: Keywords,
    embed: Option<Xid>,
    windows: usize,
    frontend: F,
}

impl<F: Frontend> Shell<F> {
    pub fn new(config: Config, coordinator: Coordinator, frontend: F) -> Self {
        let keywords = Keywords::load(&config.keywords_path());
        Self {
            config,
            coordinator,
            keywords,
            embed: None,
            windows: 0,
            frontend,
        }
    }

    pub fn with_keywords(mut self, keywords: Keywords) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn set_embed(&mut self, embed: Option<Xid>) {
        self.embed = embed;
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut Coordinator {
        &mut self.coordinator
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn windows(&self) -> usize {
        self.windows
    }

    /// Open the command-line URIs, or the home URI when there are none.
    pub fn open_initial(&mut self, uris: &[String]) {
        if uris.is_empty() {
            let home = self.config.home_uri.clone();
            let _ = self.dispatch(ShellEvent::Open(home));
        } else {
            for uri in uris {
                let _ = self.dispatch(ShellEvent::Open(uri.clone()));
            }
        }
    }

    pub fn dispatch(&mut self, event: ShellEvent) -> ControlFlow<()> {
        match event {
            ShellEvent::Open(uri) => {
                let uri = ensure_scheme(&uri);
                match self.coordinator.request_open(&uri) {
                    Ok(Dispatch::Forwarded) => {}
                    Ok(Dispatch::Local) => self.open_local(&uri),
                    Err(e) => tracing::error!("{e}"),
                }
                ControlFlow::Continue(())
            }
            ShellEvent::Remote(uri) => {
                tracing::debug!("Remote request: {uri}");
                self.open_local(&ensure_scheme(&uri));
                ControlFlow::Continue(())
            }
            ShellEvent::WindowClosed => {
                self.windows = self.windows.saturating_sub(1);
                if self.windows == 0 {
                    tracing::info!("Last window closed");
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }
        }
    }

    /// `dispatch` for events arriving inside the event loop: stops `signal`
    /// when the shell is done.
    pub fn dispatch_or_stop(&mut self, event: ShellEvent, signal: &LoopSignal) {
        if self.dispatch(event).is_break() {
            signal.stop();
        }
    }

    /// What the location bar navigates to for `text`: a keyword search if the
    /// first word is a keyword, otherwise the normalized input.
    pub fn resolve_input(&self, text: &str) -> String {
        let text = text.trim();
        self.keywords
            .expand(text)
            .unwrap_or_else(|| ensure_scheme(text))
    }

    pub fn download_destination(&self, suggested: &str) -> Result<PathBuf, DownloadError> {
        download::destination(&self.config.download_dir, suggested)
    }

    fn open_local(&mut self, uri: &str) {
        if let Err(e) = self.frontend.open_window(uri, self.embed) {
            // Don't try that XID again.
            tracing::warn!("{e}; falling back to a top-level window");
            self.embed = None;
            if let Err(e) = self.frontend.open_window(uri, None) {
                tracing::error!("Could not open {uri}: {e}");
                return;
            }
        }
        self.windows += 1;
    }
}

// ── tests ─────────────────────────────────────────────────────────────────────
