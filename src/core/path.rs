//! # Stack Path
//!
//! An ordered, observable sequence of screens. Every successful mutation
//! bumps a version number that observers watch; the coordinator also
//! forwards each bump onto its own change bus.
//!
//! ```text
//! StackPath
//! ├── key: PathKey                        // "root", "tabs", ...
//! ├── entries: Vec<Entry>                 // screen + pending pop result
//! ├── version: watch::Sender<u64>         // per-path observers
//! └── bus: Option<broadcast::Sender<..>>  // coordinator observers
//! ```
//!
//! Guards govern removal only. `pop` asks the top screen's guard;
//! `remove` and `clear` are administrative and never ask.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::ready;
use log::{debug, info};
use tokio::sync::{broadcast, oneshot, watch};

use crate::core::capability::resolve_redirects;
use crate::core::diff::{DiffOp, diff_screens};
use crate::core::error::NavError;
use crate::core::identity::{Prop, Screen};

/// Default bound on redirect hops before a chain is treated as a cycle.
pub const DEFAULT_MAX_REDIRECT_HOPS: usize = 32;

// ============================================================================
// Keys, Outcomes, Handles
// ============================================================================

/// Name of a path. The root path is always `"root"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey(Arc<str>);

impl PathKey {
    pub const ROOT: &'static str = "root";

    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn root() -> Self {
        Self::new(Self::ROOT)
    }

    pub fn is_root(&self) -> bool {
        &*self.0 == Self::ROOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PathKey {
    fn from(value: &str) -> Self {
        PathKey::new(value)
    }
}

/// Resolves once the pushed entry leaves its path.
///
/// `Some(result)` when it was popped, `None` when it was removed, cleared
/// or replaced away.
#[derive(Debug)]
pub struct PushHandle {
    rx: oneshot::Receiver<Option<Prop>>,
}

impl PushHandle {
    fn new() -> (oneshot::Sender<Option<Prop>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }
}

impl Future for PushHandle {
    type Output = Option<Prop>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = ready!(Pin::new(&mut self.rx).poll(cx));
        Poll::Ready(result.ok().flatten())
    }
}

/// Outcome of a navigation request that did not violate an invariant.
#[derive(Debug)]
pub enum Navigation {
    /// Appended; the handle resolves when it is popped.
    Pushed(PushHandle),
    /// Already present, moved to the top.
    Moved,
    /// Fixed-path selection changed (or already selected).
    Selected(usize),
    /// Owning path replaced.
    Replaced,
    /// A custom deep-link handler took over.
    Handled,
    /// A redirect returned nothing; no change.
    Aborted,
    /// A guard refused; no change.
    Denied,
}

impl Navigation {
    /// Whether the request went through.
    pub fn is_applied(&self) -> bool {
        !matches!(self, Navigation::Aborted | Navigation::Denied)
    }

    pub fn into_handle(self) -> Option<PushHandle> {
        match self {
            Navigation::Pushed(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Published on the coordinator bus after every successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChange {
    pub path: PathKey,
    pub version: u64,
}

// ============================================================================
// Shared Observation Core
// ============================================================================

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Version counter plus optional coordinator bus, shared by both path kinds.
pub(crate) struct PathCore {
    key: PathKey,
    version: watch::Sender<u64>,
    bus: Mutex<Option<broadcast::Sender<PathChange>>>,
}

impl PathCore {
    pub(crate) fn new(key: PathKey) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            key,
            version,
            bus: Mutex::new(None),
        }
    }

    pub(crate) fn key(&self) -> &PathKey {
        &self.key
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub(crate) fn attach(&self, bus: broadcast::Sender<PathChange>) {
        *lock(&self.bus) = Some(bus);
    }

    pub(crate) fn detach(&self) {
        *lock(&self.bus) = None;
    }

    pub(crate) fn notify(&self) {
        self.version.send_modify(|v| *v += 1);
        let version = self.version();
        if let Some(bus) = lock(&self.bus).as_ref() {
            // No subscribers is fine
            let _ = bus.send(PathChange {
                path: self.key.clone(),
                version,
            });
        }
    }
}

// ============================================================================
// Path Trait
// ============================================================================

/// Common surface of [`StackPath`] and [`FixedPath`](crate::core::fixed::FixedPath).
#[async_trait]
pub trait NavigationPath: Send + Sync {
    fn key(&self) -> &PathKey;

    /// Snapshot of the current sequence.
    fn screens(&self) -> Vec<Screen>;

    /// Top of a stack, or the selected screen of a fixed path.
    fn active(&self) -> Option<Screen>;

    fn is_fixed(&self) -> bool;

    fn version(&self) -> u64;

    fn subscribe(&self) -> watch::Receiver<u64>;

    fn contains(&self, screen: &Screen) -> bool {
        self.screens().contains(screen)
    }

    fn len(&self) -> usize {
        self.screens().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves redirects, then inserts.
    async fn push(&self, screen: Screen) -> Result<Navigation, NavError>;

    /// Inserts a screen whose redirects were already resolved.
    async fn push_resolved(&self, screen: Screen) -> Result<Navigation, NavError>;

    /// Moves an equal screen to the top if present, otherwise pushes.
    async fn push_or_move_to_top(&self, screen: Screen) -> Result<Navigation, NavError>;

    /// Guarded pop. `Ok(false)` when empty or denied.
    async fn pop(&self, result: Option<Prop>) -> Result<bool, NavError>;

    /// Unguarded removal of an equal screen.
    fn remove(&self, screen: &Screen) -> Result<bool, NavError>;

    fn clear(&self);

    /// Bulk replacement through the diff engine.
    fn replace(&self, screens: Vec<Screen>) -> Result<(), NavError>;

    fn attach(&self, bus: broadcast::Sender<PathChange>);

    fn detach(&self);
}

// ============================================================================
// Stack Path
// ============================================================================

struct Entry {
    screen: Screen,
    pending: Option<oneshot::Sender<Option<Prop>>>,
}

impl Entry {
    fn plain(screen: Screen) -> Self {
        Self { screen, pending: None }
    }

    /// Resolves the push handle, if anyone is still waiting.
    fn complete(mut self, result: Option<Prop>) {
        if let Some(tx) = self.pending.take() {
            let _ = tx.send(result);
        }
    }
}

pub struct StackPath {
    core: PathCore,
    entries: Mutex<Vec<Entry>>,
    max_redirect_hops: usize,
}

impl StackPath {
    pub fn new(key: impl Into<PathKey>) -> Self {
        Self::with_redirect_limit(key, DEFAULT_MAX_REDIRECT_HOPS)
    }

    pub fn with_redirect_limit(key: impl Into<PathKey>, max_redirect_hops: usize) -> Self {
        Self {
            core: PathCore::new(key.into()),
            entries: Mutex::new(Vec::new()),
            max_redirect_hops,
        }
    }

    fn entries(&self) -> MutexGuard<'_, Vec<Entry>> {
        lock(&self.entries)
    }

    fn position(entries: &[Entry], screen: &Screen) -> Option<usize> {
        entries.iter().position(|e| e.screen == *screen)
    }

    fn apply_script(entries: &mut Vec<Entry>, ops: Vec<DiffOp<Screen>>) {
        let mut deletes = Vec::new();
        let mut inserts = Vec::new();
        for op in ops {
            match op {
                DiffOp::Delete { old } => deletes.push(old),
                DiffOp::Insert { item, new } => inserts.push((new, item)),
                DiffOp::Keep { .. } => {}
            }
        }
        deletes.sort_unstable_by(|a, b| b.cmp(a));
        inserts.sort_unstable_by_key(|(at, _)| *at);

        // Deletes run back to front so earlier indices stay valid; inserts
        // then land at their final positions front to back.
        for at in deletes {
            entries.remove(at).complete(None);
        }
        for (at, screen) in inserts {
            entries.insert(at, Entry::plain(screen));
        }
    }
}

#[async_trait]
impl NavigationPath for StackPath {
    fn key(&self) -> &PathKey {
        self.core.key()
    }

    fn screens(&self) -> Vec<Screen> {
        self.entries().iter().map(|e| e.screen.clone()).collect()
    }

    fn active(&self) -> Option<Screen> {
        self.entries().last().map(|e| e.screen.clone())
    }

    fn is_fixed(&self) -> bool {
        false
    }

    fn version(&self) -> u64 {
        self.core.version()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.core.subscribe()
    }

    fn contains(&self, screen: &Screen) -> bool {
        Self::position(&self.entries(), screen).is_some()
    }

    fn len(&self) -> usize {
        self.entries().len()
    }

    async fn push(&self, screen: Screen) -> Result<Navigation, NavError> {
        match resolve_redirects(screen, self.max_redirect_hops).await? {
            Some(resolved) => self.push_resolved(resolved).await,
            None => Ok(Navigation::Aborted),
        }
    }

    async fn push_resolved(&self, screen: Screen) -> Result<Navigation, NavError> {
        {
            let mut entries = self.entries();
            match Self::position(&entries, &screen) {
                Some(at) if at + 1 == entries.len() => return Ok(Navigation::Moved),
                Some(at) => {
                    // Never duplicate: an equal screen moves up instead
                    let entry = entries.remove(at);
                    entries.push(entry);
                    debug!("Path '{}': {} already present, moved to top", self.key(), screen);
                }
                None => {
                    let (tx, handle) = PushHandle::new();
                    debug!("Path '{}': push {}", self.key(), screen);
                    entries.push(Entry {
                        screen,
                        pending: Some(tx),
                    });
                    drop(entries);
                    self.core.notify();
                    return Ok(Navigation::Pushed(handle));
                }
            }
        }
        self.core.notify();
        Ok(Navigation::Moved)
    }

    async fn push_or_move_to_top(&self, screen: Screen) -> Result<Navigation, NavError> {
        if self.contains(&screen) {
            self.push_resolved(screen).await
        } else {
            self.push(screen).await
        }
    }

    async fn pop(&self, result: Option<Prop>) -> Result<bool, NavError> {
        let Some(top) = self.active() else {
            return Ok(false);
        };

        if let Some(guard) = top.route().guard()
            && !guard.can_pop().await
        {
            info!("Path '{}': guard on {} denied pop", self.key(), top);
            return Ok(false);
        }

        // Re-locate by identity: the sequence may have changed while the guard ran
        let entry = {
            let mut entries = self.entries();
            match entries.iter().rposition(|e| e.screen.ptr_eq(&top)) {
                Some(at) => entries.remove(at),
                None => return Ok(false),
            }
        };
        debug!("Path '{}': popped {}", self.key(), top);
        entry.complete(result);
        self.core.notify();
        Ok(true)
    }

    fn remove(&self, screen: &Screen) -> Result<bool, NavError> {
        let entry = {
            let mut entries = self.entries();
            match Self::position(&entries, screen) {
                Some(at) => entries.remove(at),
                None => return Ok(false),
            }
        };
        debug!("Path '{}': removed {}", self.key(), screen);
        entry.complete(None);
        self.core.notify();
        Ok(true)
    }

    fn clear(&self) {
        let drained: Vec<Entry> = std::mem::take(&mut *self.entries());
        if drained.is_empty() {
            return;
        }
        debug!("Path '{}': cleared {} screens", self.key(), drained.len());
        for entry in drained {
            entry.complete(None);
        }
        self.core.notify();
    }

    fn replace(&self, screens: Vec<Screen>) -> Result<(), NavError> {
        {
            let mut entries = self.entries();
            let current: Vec<Screen> = entries.iter().map(|e| e.screen.clone()).collect();
            let ops = diff_screens(&current, &screens);
            if !ops.iter().any(DiffOp::is_structural) {
                return Ok(());
            }
            debug!(
                "Path '{}': replace {} -> {} screens",
                self.key(),
                current.len(),
                screens.len()
            );
            Self::apply_script(&mut entries, ops);
        }
        self.core.notify();
        Ok(())
    }

    fn attach(&self, bus: broadcast::Sender<PathChange>) {
        self.core.attach(bus);
    }

    fn detach(&self) {
        self.core.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Guarded, Hop, Page, Vanish};
    use tokio_test::{assert_pending, assert_ready_eq, task};

    fn page(name: &str) -> Screen {
        Screen::new(Page::new(name))
    }

    #[tokio::test]
    async fn test_push_appends_and_bumps_version() {
        let path = StackPath::new("root");
        let before = path.version();
        let nav = path.push(page("a")).await.unwrap();
        assert!(matches!(nav, Navigation::Pushed(_)));
        assert_eq!(path.screens(), vec![page("a")]);
        assert_eq!(path.version(), before + 1);
    }

    #[tokio::test]
    async fn test_pop_completes_handle_with_result() {
        let path = StackPath::new("root");
        let handle = path.push(page("a")).await.unwrap().into_handle().unwrap();
        assert!(path.pop(Some(Prop::from("done"))).await.unwrap());
        assert!(path.is_empty());
        assert_eq!(handle.await, Some(Prop::from("done")));
    }

    #[tokio::test]
    async fn test_pop_on_empty_is_noop() {
        let path = StackPath::new("root");
        assert!(!path.pop(None).await.unwrap());
        assert_eq!(path.version(), 0);
    }

    #[tokio::test]
    async fn test_denied_guard_leaves_state_and_handle_pending() {
        let path = StackPath::new("root");
        let (guarded, allow) = Guarded::new("form");
        path.push(page("home")).await.unwrap();
        let handle = path.push(guarded.clone()).await.unwrap().into_handle().unwrap();
        let version = path.version();

        assert!(!path.pop(Some(Prop::Int(1))).await.unwrap());
        assert_eq!(path.screens(), vec![page("home"), guarded.clone()]);
        assert_eq!(path.version(), version);

        let mut handle = task::spawn(handle);
        assert_pending!(handle.poll());

        allow.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(path.pop(Some(Prop::Int(1))).await.unwrap());
        assert_eq!(path.screens(), vec![page("home")]);
        assert!(handle.is_woken());
        assert_ready_eq!(handle.poll(), Some(Prop::Int(1)));
    }

    #[tokio::test]
    async fn test_remove_and_clear_bypass_guard() {
        let path = StackPath::new("root");
        let (guarded, _allow) = Guarded::new("form");
        let handle = path.push(guarded.clone()).await.unwrap().into_handle().unwrap();
        assert!(path.remove(&guarded).unwrap());
        assert!(path.is_empty());
        assert_eq!(handle.await, None);

        let (guarded, _allow) = Guarded::new("other");
        path.push(guarded).await.unwrap();
        path.clear();
        assert!(path.is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_returns_false() {
        let path = StackPath::new("root");
        assert!(!path.remove(&page("ghost")).unwrap());
    }

    #[tokio::test]
    async fn test_push_resolves_redirect_chain() {
        let path = StackPath::new("root");
        let c = Screen::new(Hop::to_self("c"));
        let b = Screen::new(Hop::to("b", c.clone()));
        let a = Screen::new(Hop::to("a", b));
        path.push(a).await.unwrap();
        assert_eq!(path.screens(), vec![c]);
    }

    #[tokio::test]
    async fn test_redirect_to_none_aborts() {
        let path = StackPath::new("root");
        let nav = path.push(Screen::new(Hop::to("a", Screen::new(Vanish)))).await.unwrap();
        assert!(matches!(nav, Navigation::Aborted));
        assert!(path.is_empty());
        assert_eq!(path.version(), 0);
    }

    #[tokio::test]
    async fn test_push_existing_does_not_duplicate() {
        let path = StackPath::new("root");
        path.push(page("a")).await.unwrap();
        path.push(page("b")).await.unwrap();
        let nav = path.push(page("a")).await.unwrap();
        assert!(matches!(nav, Navigation::Moved));
        assert_eq!(path.screens(), vec![page("b"), page("a")]);
    }

    #[tokio::test]
    async fn test_push_or_move_to_top_skips_guard() {
        let path = StackPath::new("root");
        let (guarded, _allow) = Guarded::new("form");
        path.push(guarded.clone()).await.unwrap();
        path.push(page("b")).await.unwrap();
        path.push(page("c")).await.unwrap();

        let nav = path.push_or_move_to_top(guarded.clone()).await.unwrap();
        assert!(matches!(nav, Navigation::Moved));
        assert_eq!(path.screens(), vec![page("b"), page("c"), guarded.clone()]);
        assert_eq!(Guarded::checks(&guarded), 0);
    }

    #[tokio::test]
    async fn test_moved_entry_keeps_its_handle() {
        let path = StackPath::new("root");
        let handle = path.push(page("a")).await.unwrap().into_handle().unwrap();
        path.push(page("b")).await.unwrap();
        path.push_or_move_to_top(page("a")).await.unwrap();
        assert!(path.pop(Some(Prop::Bool(true))).await.unwrap());
        assert_eq!(handle.await, Some(Prop::Bool(true)));
    }

    #[tokio::test]
    async fn test_replace_preserves_kept_identity() {
        let path = StackPath::new("root");
        let a = page("a");
        path.push(a.clone()).await.unwrap();
        path.push(page("b")).await.unwrap();
        path.push(page("c")).await.unwrap();

        path.replace(vec![page("a"), page("c"), page("d")]).unwrap();
        let screens = path.screens();
        assert_eq!(screens, vec![page("a"), page("c"), page("d")]);
        // Kept entry is the original allocation, not the replacement's
        assert!(screens[0].ptr_eq(&a));
    }

    #[tokio::test]
    async fn test_replace_notifies_once() {
        let path = StackPath::new("root");
        path.push(page("a")).await.unwrap();
        path.push(page("b")).await.unwrap();
        let before = path.version();
        path.replace(vec![page("x"), page("y"), page("z")]).unwrap();
        assert_eq!(path.version(), before + 1);
    }

    #[tokio::test]
    async fn test_replace_with_same_sequence_is_silent() {
        let path = StackPath::new("root");
        path.push(page("a")).await.unwrap();
        let before = path.version();
        path.replace(vec![page("a")]).unwrap();
        assert_eq!(path.version(), before);
    }

    #[tokio::test]
    async fn test_replace_resolves_deleted_handles_with_none() {
        let path = StackPath::new("root");
        let handle = path.push(page("a")).await.unwrap().into_handle().unwrap();
        path.replace(vec![page("b")]).unwrap();
        assert_eq!(handle.await, None);
    }

    #[tokio::test]
    async fn test_only_inserts_or_only_deletes() {
        let path = StackPath::new("root");
        path.replace(vec![page("a"), page("b")]).unwrap();
        assert_eq!(path.screens(), vec![page("a"), page("b")]);
        path.replace(vec![]).unwrap();
        assert!(path.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_sees_changes() {
        let path = StackPath::new("root");
        let mut rx = path.subscribe();
        path.push(page("a")).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[tokio::test]
    async fn test_attached_bus_receives_changes() {
        let path = StackPath::new("nested");
        let (tx, mut rx) = broadcast::channel(8);
        path.attach(tx);
        path.push(page("a")).await.unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.path, PathKey::new("nested"));
        assert_eq!(change.version, 1);

        path.detach();
        path.push(page("b")).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
