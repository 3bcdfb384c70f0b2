//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::core::address::Address;
use crate::core::capability::{DeepLink, DeepLinkStrategy, Guard, HostSpec, Redirect};
use crate::core::coordinator::Coordinator;
use crate::core::error::NavError;
use crate::core::identity::{Prop, Route, Screen};
use crate::core::path::{NavigationPath, PathKey};

// ============================================================================
// Plain Pages
// ============================================================================

/// A screen compared by name only. Address, path, shell and host are
/// placement details and do not affect equality.
#[derive(Clone)]
pub struct Page {
    name: String,
    address: Option<Address>,
    path: PathKey,
    shell: Option<Screen>,
    host: Option<HostSpec>,
    strategy: DeepLinkStrategy,
}

impl Page {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            address: None,
            path: PathKey::root(),
            shell: None,
            host: None,
            strategy: DeepLinkStrategy::Replace,
        }
    }

    pub fn at(name: &str, address: &str) -> Self {
        Self {
            address: Some(Address::parse(address)),
            ..Self::new(name)
        }
    }

    pub fn in_path(mut self, key: &str) -> Self {
        self.path = PathKey::new(key);
        self
    }

    pub fn hosting(mut self, spec: HostSpec) -> Self {
        self.host = Some(spec);
        self
    }

    pub fn hosting_stack(self, key: &str) -> Self {
        self.hosting(HostSpec::stack(key))
    }

    pub fn hosting_fixed(self, key: &str, screens: Vec<Screen>) -> Self {
        self.hosting(HostSpec::fixed(key, screens))
    }

    /// Wrapped by `host` and living in the path it renders.
    pub fn inside(mut self, host: &Screen) -> Self {
        if let Some(spec) = host.route().host() {
            self.path = spec.path;
        }
        self.shell = Some(host.clone());
        self
    }

    /// Declares a shell without moving paths.
    pub fn with_shell(mut self, shell: Screen) -> Self {
        self.shell = Some(shell);
        self
    }

    pub fn pushing(mut self) -> Self {
        self.strategy = DeepLinkStrategy::Push;
        self
    }

    pub fn screen(self) -> Screen {
        Screen::new(self)
    }
}

impl Route for Page {
    fn props(&self) -> Vec<Prop> {
        vec![Prop::from(self.name.as_str())]
    }

    fn address(&self) -> Option<Address> {
        self.address.clone()
    }

    fn path_key(&self) -> PathKey {
        self.path.clone()
    }

    fn deep_link_strategy(&self) -> DeepLinkStrategy {
        self.strategy
    }

    fn shell(&self) -> Option<Screen> {
        self.shell.clone()
    }

    fn host(&self) -> Option<HostSpec> {
        self.host.clone()
    }
}

// ============================================================================
// Guarded Pages
// ============================================================================

/// Refuses to be popped until its flag is set. Counts how often it was asked.
pub struct Guarded {
    name: String,
    path: PathKey,
    allow: Arc<AtomicBool>,
    checks: Arc<AtomicUsize>,
}

impl Guarded {
    pub fn new(name: &str) -> (Screen, Arc<AtomicBool>) {
        Self::in_path(name, PathKey::ROOT)
    }

    pub fn in_path(name: &str, key: &str) -> (Screen, Arc<AtomicBool>) {
        let allow = Arc::new(AtomicBool::new(false));
        let screen = Screen::new(Self {
            name: name.to_string(),
            path: PathKey::new(key),
            allow: allow.clone(),
            checks: Arc::new(AtomicUsize::new(0)),
        });
        (screen, allow)
    }

    pub fn checks(screen: &Screen) -> usize {
        screen
            .downcast_ref::<Guarded>()
            .map_or(0, |g| g.checks.load(Ordering::SeqCst))
    }
}

impl Route for Guarded {
    fn props(&self) -> Vec<Prop> {
        vec![Prop::from(self.name.as_str())]
    }

    fn address(&self) -> Option<Address> {
        Some(Address::from_segments([self.name.as_str()]))
    }

    fn path_key(&self) -> PathKey {
        self.path.clone()
    }

    fn guard(&self) -> Option<&dyn Guard> {
        Some(self)
    }
}

#[async_trait]
impl Guard for Guarded {
    async fn can_pop(&self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.allow.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Redirecting Pages
// ============================================================================

enum Target {
    Screen(Screen),
    Itself,
    /// Bounces to a fresh `Hop` with the names swapped.
    Bounce(String),
}

pub struct Hop {
    name: String,
    target: Target,
}

impl Hop {
    pub fn to(name: &str, target: Screen) -> Self {
        Self {
            name: name.to_string(),
            target: Target::Screen(target),
        }
    }

    pub fn to_self(name: &str) -> Self {
        Self {
            name: name.to_string(),
            target: Target::Itself,
        }
    }

    /// `a -> b -> a -> ...` forever.
    pub fn cycle(a: &str, b: &str) -> Self {
        Self {
            name: a.to_string(),
            target: Target::Bounce(b.to_string()),
        }
    }
}

impl Route for Hop {
    fn props(&self) -> Vec<Prop> {
        vec![Prop::from(self.name.as_str())]
    }

    fn redirect(&self) -> Option<&dyn Redirect> {
        Some(self)
    }
}

#[async_trait]
impl Redirect for Hop {
    async fn redirect(&self) -> Option<Screen> {
        Some(match &self.target {
            Target::Screen(screen) => screen.clone(),
            Target::Itself => Screen::new(Hop::to_self(&self.name)),
            Target::Bounce(other) => Screen::new(Hop::cycle(other, &self.name)),
        })
    }
}

/// Redirects to nothing, aborting whatever navigation reached it.
pub struct Vanish;

impl Route for Vanish {
    fn redirect(&self) -> Option<&dyn Redirect> {
        Some(self)
    }
}

#[async_trait]
impl Redirect for Vanish {
    async fn redirect(&self) -> Option<Screen> {
        None
    }
}

// ============================================================================
// Deep Links
// ============================================================================

/// Handles its own address by resetting root to `[a, b]`.
pub struct Linker;

impl Route for Linker {
    fn address(&self) -> Option<Address> {
        Some(Address::parse("/linked"))
    }

    fn deep_link(&self) -> Option<&dyn DeepLink> {
        Some(self)
    }
}

#[async_trait]
impl DeepLink for Linker {
    async fn handle(&self, nav: &Coordinator, _address: &Address) -> Result<(), NavError> {
        nav.root()
            .replace(vec![Page::at("a", "/a").screen(), Page::at("b", "/b").screen()])
    }
}

// ============================================================================
// Parser
// ============================================================================

pub fn shell_host() -> Screen {
    Page::at("shell", "/shell").hosting_stack("inner").screen()
}

/// Address parser used by coordinator tests.
pub fn test_parser(address: &Address) -> Screen {
    match address.path().as_str() {
        "/a" => Page::at("a", "/a").screen(),
        "/b" => Page::at("b", "/b").screen(),
        "/c" => Page::at("c", "/c").screen(),
        "/pushy" => Page::at("pushy", "/pushy").pushing().screen(),
        "/linked" => Screen::new(Linker),
        "/shell/inbox" => Page::at("inbox", "/shell/inbox").inside(&shell_host()).screen(),
        _ => Page::at("not-found", &address.to_string()).screen(),
    }
}
