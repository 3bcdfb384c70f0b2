//! # Coordinator
//!
//! Owns the root path and every nested path, and decides where a screen
//! goes and how to get it there.
//!
//! ```text
//!   Address ──parse──▶ Screen ──redirects──▶ Screen'
//!                                              │
//!                         ┌────────────────────┘
//!                         ▼
//!            shell chain (outermost host first)
//!            ├── ensure Host₀ in root
//!            ├── ensure Host₁ in Host₀'s nested path
//!            └── insert Screen' in Host₁'s nested path
//! ```
//!
//! Construct one per application and pass it by reference to whatever
//! needs to navigate. Nested paths are created lazily the first time
//! navigation enters the host that renders them.

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::core::address::Address;
use crate::core::capability::{DeepLinkStrategy, HostLayout, resolve_redirects};
use crate::core::error::NavError;
use crate::core::fixed::FixedPath;
use crate::core::identity::{Prop, Screen};
use crate::core::path::{
    DEFAULT_MAX_REDIRECT_HOPS, Navigation, NavigationPath, PathChange, PathKey, StackPath, lock,
};

/// Default bound on shell nesting before a chain is treated as a cycle.
pub const DEFAULT_MAX_SHELL_DEPTH: usize = 16;

const CHANGE_BUS_CAPACITY: usize = 64;

/// Maps an incoming address to a screen. Expected to always return
/// something (a "not found" screen for unknown addresses).
pub type Parser = Box<dyn Fn(&Address) -> Screen + Send + Sync>;

#[derive(Debug, Clone)]
pub struct NavSettings {
    /// Reported when no active screen carries an address.
    pub default_address: Address,
    pub max_redirect_hops: usize,
    pub max_shell_depth: usize,
}

impl Default for NavSettings {
    fn default() -> Self {
        Self {
            default_address: Address::root(),
            max_redirect_hops: DEFAULT_MAX_REDIRECT_HOPS,
            max_shell_depth: DEFAULT_MAX_SHELL_DEPTH,
        }
    }
}

/// How ancestors along a shell chain are brought into place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ensure {
    /// Push, or move to top if already there.
    Push,
    /// Reduce each ancestor stack to just the host.
    Replace,
}

pub struct Coordinator {
    root: Arc<StackPath>,
    nested: Mutex<Vec<Arc<dyn NavigationPath>>>,
    parser: Parser,
    settings: NavSettings,
    known: Mutex<Vec<Screen>>,
    changes: broadcast::Sender<PathChange>,
}

impl Coordinator {
    pub fn new<F>(parser: F) -> Self
    where
        F: Fn(&Address) -> Screen + Send + Sync + 'static,
    {
        Self::with_settings(parser, NavSettings::default())
    }

    pub fn with_settings<F>(parser: F, settings: NavSettings) -> Self
    where
        F: Fn(&Address) -> Screen + Send + Sync + 'static,
    {
        let (changes, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
        let root = Arc::new(StackPath::with_redirect_limit(
            PathKey::root(),
            settings.max_redirect_hops,
        ));
        root.attach(changes.clone());
        info!(
            "Coordinator ready (default {}, {} redirect hops, shell depth {})",
            settings.default_address, settings.max_redirect_hops, settings.max_shell_depth
        );
        Self {
            root,
            nested: Mutex::new(Vec::new()),
            parser: Box::new(parser),
            settings,
            known: Mutex::new(Vec::new()),
            changes,
        }
    }

    pub fn settings(&self) -> &NavSettings {
        &self.settings
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn parse(&self, address: &Address) -> Screen {
        (self.parser)(address)
    }

    pub fn root(&self) -> Arc<StackPath> {
        self.root.clone()
    }

    pub fn path(&self, key: &PathKey) -> Option<Arc<dyn NavigationPath>> {
        if key.is_root() {
            return Some(self.root.clone());
        }
        lock(&self.nested).iter().find(|p| p.key() == key).cloned()
    }

    /// Root first, then nested paths in creation order.
    pub fn paths(&self) -> Vec<Arc<dyn NavigationPath>> {
        let mut out: Vec<Arc<dyn NavigationPath>> = vec![self.root.clone()];
        out.extend(lock(&self.nested).iter().cloned());
        out
    }

    /// The path a screen lives in. For a container host that is the
    /// parent path, never the path it renders.
    pub fn path_for(&self, screen: &Screen) -> Result<Arc<dyn NavigationPath>, NavError> {
        let key = screen.path_key();
        self.path(&key).ok_or_else(|| {
            warn!("No path '{}' for {}", key, screen);
            NavError::UnknownPath(key)
        })
    }

    /// Creates the nested path a host renders, if it does not exist yet.
    fn ensure_hosted_path(&self, host: &Screen) -> Result<Arc<dyn NavigationPath>, NavError> {
        let Some(spec) = host.route().host() else {
            return self.path_for(host);
        };
        if spec.path.is_root() {
            return Ok(self.root.clone());
        }

        // Lookup and insert under one guard
        let mut nested = lock(&self.nested);
        if let Some(existing) = nested.iter().find(|p| *p.key() == spec.path) {
            return Ok(existing.clone());
        }

        let created: Arc<dyn NavigationPath> = match spec.layout {
            HostLayout::Stack => Arc::new(StackPath::with_redirect_limit(
                spec.path.clone(),
                self.settings.max_redirect_hops,
            )),
            HostLayout::Fixed(screens) => Arc::new(FixedPath::with_redirect_limit(
                spec.path.clone(),
                screens,
                self.settings.max_redirect_hops,
            )?),
        };
        created.attach(self.changes.clone());
        nested.push(created.clone());
        drop(nested);
        info!("Created path '{}' for host {}", spec.path, host);
        Ok(created)
    }

    /// Hosts wrapping `screen`, innermost first.
    fn shell_chain(&self, screen: &Screen) -> Result<Vec<Screen>, NavError> {
        let mut chain = Vec::new();
        let mut member = screen.clone();
        while let Some(host) = member.route().shell() {
            if chain.len() >= self.settings.max_shell_depth {
                warn!("Shell chain from {} exceeded depth {}", screen, self.settings.max_shell_depth);
                return Err(NavError::ShellDepth {
                    limit: self.settings.max_shell_depth,
                });
            }
            let Some(spec) = host.route().host() else {
                return Err(NavError::NotAHost {
                    member: member.to_string(),
                    shell: host.to_string(),
                });
            };
            if spec.path != member.path_key() {
                return Err(NavError::ShellMismatch {
                    member: member.to_string(),
                    expected: spec.path,
                    found: member.path_key(),
                });
            }
            chain.push(host.clone());
            member = host;
        }
        Ok(chain)
    }

    /// Brings every host around `screen` into place, outermost first.
    ///
    /// Returns the blocking outcome if a guard or redirect stopped it.
    async fn ensure_ancestors(
        &self,
        screen: &Screen,
        mode: Ensure,
    ) -> Result<Option<Navigation>, NavError> {
        for host in self.shell_chain(screen)?.into_iter().rev() {
            let parent = self.path_for(&host)?;
            self.ensure_hosted_path(&host)?;

            let outcome = match mode {
                Ensure::Replace if !parent.is_fixed() => {
                    parent.replace(vec![host.clone()])?;
                    Navigation::Replaced
                }
                _ => parent.push_or_move_to_top(host.clone()).await?,
            };
            if !outcome.is_applied() {
                info!("Ensuring host {} stopped: {:?}", host, outcome);
                return Ok(Some(outcome));
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Redirects, ensures shells, then appends to the owning path.
    pub async fn push(&self, screen: Screen) -> Result<Navigation, NavError> {
        let Some(screen) = resolve_redirects(screen, self.settings.max_redirect_hops).await? else {
            return Ok(Navigation::Aborted);
        };
        if let Some(halt) = self.ensure_ancestors(&screen, Ensure::Push).await? {
            return Ok(halt);
        }
        self.ensure_hosted_path(&screen)?;
        let path = self.path_for(&screen)?;
        debug!("push {} onto '{}'", screen, path.key());
        path.push_resolved(screen).await
    }

    /// Moves an equal screen to the top of its path without consulting any
    /// guard; falls back to [`push`](Self::push) when it is absent.
    pub async fn push_or_move_to_top(&self, screen: Screen) -> Result<Navigation, NavError> {
        let present = self
            .path(&screen.path_key())
            .is_some_and(|path| path.contains(&screen));
        if !present {
            return self.push(screen).await;
        }
        if let Some(halt) = self.ensure_ancestors(&screen, Ensure::Push).await? {
            return Ok(halt);
        }
        let path = self.path_for(&screen)?;
        debug!("move {} to top of '{}'", screen, path.key());
        path.push_resolved(screen).await
    }

    /// Makes `screen` the only entry of its owning path (selects it on a
    /// fixed path), reducing every ancestor stack to its host.
    pub async fn replace(&self, screen: Screen) -> Result<Navigation, NavError> {
        let Some(screen) = resolve_redirects(screen, self.settings.max_redirect_hops).await? else {
            return Ok(Navigation::Aborted);
        };
        if let Some(halt) = self.ensure_ancestors(&screen, Ensure::Replace).await? {
            return Ok(halt);
        }
        self.ensure_hosted_path(&screen)?;
        let path = self.path_for(&screen)?;
        if path.is_fixed() {
            return path.push_resolved(screen).await;
        }
        debug!("replace '{}' with {}", path.key(), screen);
        path.replace(vec![screen])?;
        Ok(Navigation::Replaced)
    }

    /// Guarded pop of the active stack. `Ok(false)` when nothing left or a
    /// guard refused.
    pub async fn pop(&self, result: Option<Prop>) -> Result<bool, NavError> {
        let root: Arc<dyn NavigationPath> = self.root.clone();
        let target = self
            .active_chain()
            .into_iter()
            .rev()
            .find(|p| !p.is_fixed() && !p.is_empty())
            .unwrap_or(root);
        target.pop(result).await
    }

    /// System back: pop without a result.
    pub async fn back(&self) -> Result<bool, NavError> {
        let popped = self.pop(None).await?;
        debug!("back -> {}", if popped { "popped" } else { "nothing popped" });
        Ok(popped)
    }

    /// External address arrival.
    pub async fn open(&self, address: &Address) -> Result<Navigation, NavError> {
        let screen = self.parse(address);
        info!("Deep link {} -> {}", address, screen);

        if let Some(handler) = screen.route().deep_link() {
            handler.handle(self, address).await?;
            return Ok(Navigation::Handled);
        }

        match screen.route().deep_link_strategy() {
            DeepLinkStrategy::Replace => self.replace(screen).await,
            DeepLinkStrategy::Push => self.push(screen).await,
        }
    }

    /// In-app navigation by address: always pushes.
    pub async fn navigate(&self, address: &Address) -> Result<Navigation, NavError> {
        let screen = self.parse(address);
        self.push(screen).await
    }

    // ========================================================================
    // Derived State
    // ========================================================================

    /// Root, then each non-empty nested path entered through the active
    /// screen's host.
    pub fn active_chain(&self) -> Vec<Arc<dyn NavigationPath>> {
        let mut chain: Vec<Arc<dyn NavigationPath>> = vec![self.root.clone()];
        while chain.len() <= self.settings.max_shell_depth {
            let Some(current) = chain.last() else { break };
            let Some(spec) = current.active().and_then(|s| s.route().host()) else {
                break;
            };
            match self.path(&spec.path) {
                Some(nested) if !nested.is_empty() => chain.push(nested),
                _ => break,
            }
        }
        chain
    }

    pub fn active_path(&self) -> Arc<dyn NavigationPath> {
        let root: Arc<dyn NavigationPath> = self.root.clone();
        self.active_chain().pop().unwrap_or(root)
    }

    /// The deepest active screen's address, or the default address.
    pub fn current_address(&self) -> Address {
        self.active_chain()
            .iter()
            .rev()
            .find_map(|path| path.active().and_then(|s| s.address()))
            .unwrap_or_else(|| self.settings.default_address.clone())
    }

    /// Fires after every successful mutation of any owned path.
    pub fn changes(&self) -> broadcast::Receiver<PathChange> {
        self.changes.subscribe()
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Declares screens the application knows about, for diagnostics.
    pub fn register_known<I: IntoIterator<Item = Screen>>(&self, screens: I) {
        let mut known = lock(&self.known);
        for screen in screens {
            if !known.contains(&screen) {
                known.push(screen);
            }
        }
    }

    pub fn known(&self) -> Vec<Screen> {
        lock(&self.known).clone()
    }

    /// Known screens not currently present in any path.
    pub fn absent_known(&self) -> Vec<Screen> {
        let paths = self.paths();
        self.known()
            .into_iter()
            .filter(|s| !paths.iter().any(|p| p.contains(s)))
            .collect()
    }

    /// Stops forwarding path changes. Paths keep their state.
    pub fn dispose(&self) {
        for path in self.paths() {
            path.detach();
        }
        debug!("Coordinator disposed");
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.dispose();
    }
}
