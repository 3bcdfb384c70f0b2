//! # Route Table
//!
//! Turns the `[[routes]]` config section into screens. Each entry's
//! pattern is matched segment by segment; `:name` segments capture.
//!
//! ```text
//!   /users/:id    +   /users/7?tab=posts
//!        │                  │
//!        └──── match ───────┘
//!                 ▼
//!   ConfiguredRoute(/users/:id, {id: 7}, {tab: posts})
//! ```
//!
//! Capabilities come straight from the entry: `guarded` refuses pops while
//! the table is locked, `redirect` forwards to another address,
//! `deep_link_stack` rebuilds root when opened externally, and
//! `shell`/`host` place the screen inside a container.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::{debug, info};

use crate::core::address::Address;
use crate::core::capability::{DeepLink, DeepLinkStrategy, Guard, HostSpec, Redirect};
use crate::core::config::{HostEntry, HostKind, RouteEntry};
use crate::core::coordinator::Coordinator;
use crate::core::error::NavError;
use crate::core::identity::{Prop, Route, Screen};
use crate::core::path::{NavigationPath, PathKey};

// ============================================================================
// Patterns
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn new(raw: &str) -> Self {
        let normalised = Address::parse(raw);
        let segments = normalised
            .segments
            .iter()
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.clone()),
            })
            .collect();
        Self {
            raw: normalised.path(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Captured parameters, or `None` if the address does not match.
    pub fn matches(&self, address: &Address) -> Option<BTreeMap<String, String>> {
        if address.segments.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (segment, actual) in self.segments.iter().zip(&address.segments) {
            match segment {
                Segment::Literal(lit) if lit == actual => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), actual.clone());
                }
            }
        }
        Some(params)
    }

    /// The only address a parameterless pattern matches.
    pub fn literal_address(&self) -> Option<Address> {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(lit) => Some(lit.as_str()),
                Segment::Param(_) => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(Address::from_segments)
    }
}

// ============================================================================
// Table
// ============================================================================

struct RouteDef {
    pattern: Pattern,
    entry: RouteEntry,
}

struct TableInner {
    routes: Vec<RouteDef>,
    locked: AtomicBool,
}

/// Shared, cheaply cloned. Every screen it produces holds a handle back
/// to the table so lazily computed shells, hosts and redirects resolve
/// through the same routes.
#[derive(Clone)]
pub struct RouteTable {
    inner: Arc<TableInner>,
}

impl RouteTable {
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        let routes = entries
            .into_iter()
            .map(|entry| RouteDef {
                pattern: Pattern::new(&entry.pattern),
                entry,
            })
            .collect::<Vec<_>>();
        info!("Route table loaded with {} routes", routes.len());
        Self {
            inner: Arc::new(TableInner {
                routes,
                locked: AtomicBool::new(false),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.routes.is_empty()
    }

    /// First matching route in declaration order.
    pub fn parse(&self, address: &Address) -> Screen {
        for (index, def) in self.inner.routes.iter().enumerate() {
            if let Some(params) = def.pattern.matches(address) {
                return Screen::new(ConfiguredRoute {
                    table: self.clone(),
                    index,
                    params,
                    address: address.clone(),
                });
            }
        }
        debug!("No route matches {}", address);
        Screen::new(NotFound {
            address: address.clone(),
        })
    }

    /// Screens for every parameterless route, for diagnostics.
    pub fn known_screens(&self) -> Vec<Screen> {
        self.inner
            .routes
            .iter()
            .filter_map(|def| def.pattern.literal_address())
            .map(|address| self.parse(&address))
            .collect()
    }

    pub fn set_locked(&self, locked: bool) {
        self.inner.locked.store(locked, Ordering::SeqCst);
        info!("Route table {}", if locked { "locked" } else { "unlocked" });
    }

    pub fn is_locked(&self) -> bool {
        self.inner.locked.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Screens
// ============================================================================

pub struct ConfiguredRoute {
    table: RouteTable,
    index: usize,
    params: BTreeMap<String, String>,
    address: Address,
}

impl ConfiguredRoute {
    fn def(&self) -> &RouteDef {
        &self.table.inner.routes[self.index]
    }

    pub fn pattern(&self) -> &str {
        self.def().pattern.as_str()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

impl Route for ConfiguredRoute {
    fn props(&self) -> Vec<Prop> {
        vec![
            Prop::from(self.pattern()),
            Prop::map(self.params.clone()),
            Prop::map(self.address.query.clone()),
        ]
    }

    fn address(&self) -> Option<Address> {
        Some(self.address.clone())
    }

    fn path_key(&self) -> PathKey {
        if let Some(path) = &self.def().entry.path {
            return PathKey::new(path);
        }
        self.shell()
            .and_then(|shell| shell.route().host())
            .map_or_else(PathKey::root, |spec| spec.path)
    }

    fn guard(&self) -> Option<&dyn Guard> {
        self.def().entry.guarded.then_some(self as &dyn Guard)
    }

    fn redirect(&self) -> Option<&dyn Redirect> {
        self.def()
            .entry
            .redirect
            .is_some()
            .then_some(self as &dyn Redirect)
    }

    fn deep_link(&self) -> Option<&dyn DeepLink> {
        self.def()
            .entry
            .deep_link_stack
            .is_some()
            .then_some(self as &dyn DeepLink)
    }

    fn deep_link_strategy(&self) -> DeepLinkStrategy {
        self.def().entry.strategy.unwrap_or_default()
    }

    fn shell(&self) -> Option<Screen> {
        self.def().entry.shell.as_ref().map(|a| self.table.parse(a))
    }

    fn host(&self) -> Option<HostSpec> {
        let entry = &self.def().entry;
        let key = PathKey::new(self.pattern());
        let spec = match entry.host.as_ref()? {
            HostEntry::Kind(HostKind::Stack) => HostSpec::stack(key),
            HostEntry::Fixed(members) => {
                HostSpec::fixed(key, members.iter().map(|a| self.table.parse(a)).collect())
            }
        };
        Some(spec.claiming(entry.claims.clone().unwrap_or_default()))
    }
}

#[async_trait]
impl Guard for ConfiguredRoute {
    async fn can_pop(&self) -> bool {
        let locked = self.table.is_locked();
        if locked {
            info!("{} stays: table is locked", self.address);
        }
        !locked
    }
}

#[async_trait]
impl Redirect for ConfiguredRoute {
    async fn redirect(&self) -> Option<Screen> {
        let target = self.def().entry.redirect.as_ref()?;
        Some(self.table.parse(target))
    }
}

#[async_trait]
impl DeepLink for ConfiguredRoute {
    async fn handle(&self, nav: &Coordinator, address: &Address) -> Result<(), NavError> {
        let mut stack = Vec::new();
        for entry in self.def().entry.deep_link_stack.iter().flatten() {
            let screen = self.table.parse(entry);
            if screen.downcast_ref::<NotFound>().is_some() {
                return Err(NavError::Handler(format!(
                    "deep link stack entry {entry} for {} matches no route",
                    self.def().pattern.as_str()
                )));
            }
            stack.push(screen);
        }
        debug!("Rebuilding root for {} from {} screens", address, stack.len());

        let mut screens = stack.into_iter();
        match screens.next() {
            Some(first) => {
                if !nav.replace(first).await?.is_applied() {
                    return Ok(());
                }
            }
            None => nav.root().clear(),
        }
        for screen in screens {
            if !nav.push(screen).await?.is_applied() {
                return Ok(());
            }
        }
        nav.push(nav.parse(address)).await?;
        Ok(())
    }
}

/// Stand-in for addresses no route matches.
pub struct NotFound {
    address: Address,
}

impl Route for NotFound {
    fn props(&self) -> Vec<Prop> {
        vec![Prop::from(self.address.to_string())]
    }

    fn address(&self) -> Option<Address> {
        Some(self.address.clone())
    }
}
