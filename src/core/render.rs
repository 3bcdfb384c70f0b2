//! # Rendering Boundary
//!
//! The engine never draws anything. A renderer hands us a resolver, we
//! hand back one destination per screen, keyed by the screen itself so the
//! renderer can match against its previous list with the same equality the
//! paths use.

use crate::core::identity::Screen;
use crate::core::path::NavigationPath;

#[derive(Debug, Clone)]
pub struct Destination<V> {
    pub key: Screen,
    pub view: V,
}

pub fn destinations<V, F>(path: &dyn NavigationPath, mut resolve: F) -> Vec<Destination<V>>
where
    F: FnMut(&Screen) -> V,
{
    path.screens()
        .into_iter()
        .map(|key| {
            let view = resolve(&key);
            Destination { key, view }
        })
        .collect()
}
