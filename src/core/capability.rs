//! # Capabilities
//!
//! Optional behaviours a route can opt into. They compose flat: a single
//! route may guard its own removal, redirect, and live inside a shell all
//! at once. Paths and the coordinator ask for each one through the
//! [`Route`](crate::core::identity::Route) query methods and run the
//! matching protocol step only when it is present.
//!
//! | Capability  | Query                 | Consulted on           |
//! |-------------|-----------------------|------------------------|
//! | Guard       | `Route::guard`        | pop, fixed selection   |
//! | Redirect    | `Route::redirect`     | push, replace, select  |
//! | DeepLink    | `Route::deep_link`    | external address       |
//! | Shell       | `Route::shell`        | push, replace          |
//! | Host        | `Route::host`         | shell resolution       |

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::core::address::Address;
use crate::core::coordinator::Coordinator;
use crate::core::error::NavError;
use crate::core::identity::Screen;
use crate::core::path::PathKey;

/// Lets a route veto its own removal.
#[async_trait]
pub trait Guard: Send + Sync {
    /// `false` keeps the route where it is. Not an error.
    async fn can_pop(&self) -> bool;
}

/// Lets a route substitute itself before it is inserted.
#[async_trait]
pub trait Redirect: Send + Sync {
    /// `None` aborts the navigation entirely (the handler is expected to
    /// have navigated somewhere itself). Returning an equal screen stops
    /// the chain on this route.
    async fn redirect(&self) -> Option<Screen>;
}

/// Takes over handling of an external address.
#[async_trait]
pub trait DeepLink: Send + Sync {
    /// Fully responsible for mutating paths; no default behaviour follows.
    async fn handle(&self, nav: &Coordinator, address: &Address) -> Result<(), NavError>;
}

/// What to do with the owning path when an external address arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeepLinkStrategy {
    /// Clear the owning path and insert.
    #[default]
    Replace,
    /// Append to the owning path.
    Push,
}

/// Shape of the nested path a container host renders.
#[derive(Debug, Clone)]
pub enum HostLayout {
    Stack,
    /// Pre-allocated screens; navigation selects among them.
    Fixed(Vec<Screen>),
}

/// Declared by a container host.
#[derive(Debug, Clone)]
pub struct HostSpec {
    /// The nested path this host renders.
    pub path: PathKey,
    pub layout: HostLayout,
    /// Addresses this host claims beyond its fixed screens (diagnostics only).
    pub claims: Vec<Address>,
}

impl HostSpec {
    pub fn stack(path: impl Into<PathKey>) -> Self {
        Self {
            path: path.into(),
            layout: HostLayout::Stack,
            claims: Vec::new(),
        }
    }

    pub fn fixed(path: impl Into<PathKey>, screens: Vec<Screen>) -> Self {
        Self {
            path: path.into(),
            layout: HostLayout::Fixed(screens),
            claims: Vec::new(),
        }
    }

    pub fn claiming(mut self, claims: Vec<Address>) -> Self {
        self.claims = claims;
        self
    }

    /// Every address this host answers for.
    pub fn claimed_addresses(&self) -> Vec<Address> {
        let mut out = self.claims.clone();
        if let HostLayout::Fixed(screens) = &self.layout {
            out.extend(screens.iter().filter_map(Screen::address));
        }
        out
    }
}

/// Follows redirects until a route settles on itself.
///
/// Returns `Ok(None)` when some redirect returned `None`. Chains longer
/// than `limit` hops fail with [`NavError::RedirectLimit`].
pub async fn resolve_redirects(screen: Screen, limit: usize) -> Result<Option<Screen>, NavError> {
    let mut current = screen;
    for hop in 0..=limit {
        let Some(redirect) = current.route().redirect() else {
            return Ok(Some(current));
        };
        match redirect.redirect().await {
            None => {
                info!("Redirect from {} aborted navigation", current);
                return Ok(None);
            }
            Some(next) if next == current => {
                debug!("Redirect settled on {} after {} hops", current, hop);
                return Ok(Some(current));
            }
            Some(next) => {
                debug!("Redirect {} -> {}", current, next);
                current = next;
            }
        }
    }
    warn!("Redirect chain exceeded {} hops at {}", limit, current);
    Err(NavError::RedirectLimit { limit })
}
