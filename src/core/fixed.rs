//! # Fixed-Selection Path
//!
//! A path whose screens are handed over once and never change. Navigating
//! "pushes" by selecting an existing member: think tab bars and pagers.
//!
//! Switching selection is treated as popping the old selection, so the
//! outgoing screen's guard gets a say, and as pushing the new one, so its
//! redirects run.

use std::sync::Mutex;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::{broadcast, watch};

use crate::core::capability::resolve_redirects;
use crate::core::error::NavError;
use crate::core::identity::{Prop, Screen};
use crate::core::path::{
    DEFAULT_MAX_REDIRECT_HOPS, Navigation, NavigationPath, PathChange, PathCore, PathKey, lock,
};

pub struct FixedPath {
    core: PathCore,
    screens: Vec<Screen>,
    active: Mutex<usize>,
    max_redirect_hops: usize,
}

impl FixedPath {
    pub fn new(key: impl Into<PathKey>, screens: Vec<Screen>) -> Result<Self, NavError> {
        Self::with_redirect_limit(key, screens, DEFAULT_MAX_REDIRECT_HOPS)
    }

    pub fn with_redirect_limit(
        key: impl Into<PathKey>,
        screens: Vec<Screen>,
        max_redirect_hops: usize,
    ) -> Result<Self, NavError> {
        let key = key.into();
        if screens.is_empty() {
            return Err(NavError::EmptyFixedPath(key));
        }
        Ok(Self {
            core: PathCore::new(key),
            screens,
            active: Mutex::new(0),
            max_redirect_hops,
        })
    }

    pub fn active_index(&self) -> usize {
        *lock(&self.active)
    }

    pub fn index_of(&self, screen: &Screen) -> Option<usize> {
        self.screens.iter().position(|s| s == screen)
    }

    /// Guard-checked, redirect-resolving selection by index.
    pub async fn select(&self, index: usize) -> Result<Navigation, NavError> {
        self.select_with(index, true).await
    }

    fn member_index(&self, screen: &Screen) -> Result<usize, NavError> {
        self.index_of(screen).ok_or_else(|| {
            warn!("Fixed path '{}': {} is not a member", self.key(), screen);
            NavError::NotAMember {
                path: self.key().clone(),
                screen: screen.to_string(),
            }
        })
    }

    async fn select_with(&self, index: usize, resolve: bool) -> Result<Navigation, NavError> {
        if index >= self.screens.len() {
            return Err(NavError::IndexOutOfRange {
                path: self.key().clone(),
                index,
                len: self.screens.len(),
            });
        }

        let current = self.active_index();
        if index == current {
            return Ok(Navigation::Selected(index));
        }

        let outgoing = &self.screens[current];
        if let Some(guard) = outgoing.route().guard()
            && !guard.can_pop().await
        {
            info!("Fixed path '{}': guard on {} denied switch", self.key(), outgoing);
            return Ok(Navigation::Denied);
        }

        let target = if resolve {
            match resolve_redirects(self.screens[index].clone(), self.max_redirect_hops).await? {
                Some(resolved) => self.member_index(&resolved)?,
                None => return Ok(Navigation::Aborted),
            }
        } else {
            index
        };
        if target == current {
            debug!("Fixed path '{}': redirect kept {} active", self.key(), current);
            return Ok(Navigation::Selected(current));
        }

        *lock(&self.active) = target;
        debug!(
            "Fixed path '{}': selected {} ({})",
            self.key(),
            target,
            self.screens[target]
        );
        self.core.notify();
        Ok(Navigation::Selected(target))
    }

    fn immutable(&self, operation: &'static str) -> NavError {
        warn!("Fixed path '{}': rejected {}", self.key(), operation);
        NavError::Immutable {
            path: self.key().clone(),
            operation,
        }
    }
}

#[async_trait]
impl NavigationPath for FixedPath {
    fn key(&self) -> &PathKey {
        self.core.key()
    }

    fn screens(&self) -> Vec<Screen> {
        self.screens.clone()
    }

    fn active(&self) -> Option<Screen> {
        self.screens.get(self.active_index()).cloned()
    }

    fn is_fixed(&self) -> bool {
        true
    }

    fn version(&self) -> u64 {
        self.core.version()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.core.subscribe()
    }

    fn contains(&self, screen: &Screen) -> bool {
        self.index_of(screen).is_some()
    }

    fn len(&self) -> usize {
        self.screens.len()
    }

    async fn push(&self, screen: Screen) -> Result<Navigation, NavError> {
        let index = self.member_index(&screen)?;
        self.select_with(index, true).await
    }

    async fn push_resolved(&self, screen: Screen) -> Result<Navigation, NavError> {
        let index = self.member_index(&screen)?;
        self.select_with(index, false).await
    }

    async fn push_or_move_to_top(&self, screen: Screen) -> Result<Navigation, NavError> {
        self.push(screen).await
    }

    async fn pop(&self, _result: Option<Prop>) -> Result<bool, NavError> {
        Err(self.immutable("pop"))
    }

    fn remove(&self, _screen: &Screen) -> Result<bool, NavError> {
        Err(self.immutable("remove"))
    }

    fn clear(&self) {}

    fn replace(&self, screens: Vec<Screen>) -> Result<(), NavError> {
        if screens == self.screens {
            Ok(())
        } else {
            Err(self.immutable("replace"))
        }
    }

    fn attach(&self, bus: broadcast::Sender<PathChange>) {
        self.core.attach(bus);
    }

    fn detach(&self) {
        self.core.detach();
    }
}
