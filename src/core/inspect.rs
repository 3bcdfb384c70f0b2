//! # Inspection
//!
//! Read-only views for developer tooling: a serialisable snapshot of every
//! path, and diagnostics about which hosts claim which addresses.
//!
//! Three things get flagged:
//!
//! - an address claimed by more than one container host
//! - a known nested screen whose address no host claims
//! - a host claiming an address nobody registered

use std::fmt;

use serde::Serialize;

use crate::core::address::Address;
use crate::core::coordinator::Coordinator;
use crate::core::identity::Screen;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScreenSnapshot {
    pub screen: String,
    pub address: Option<String>,
}

impl From<&Screen> for ScreenSnapshot {
    fn from(screen: &Screen) -> Self {
        Self {
            screen: screen.to_string(),
            address: screen.address().map(|a| a.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PathSnapshot {
    pub key: String,
    pub fixed: bool,
    pub version: u64,
    pub active: Option<ScreenSnapshot>,
    pub screens: Vec<ScreenSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub current_address: String,
    pub paths: Vec<PathSnapshot>,
    pub absent_known: Vec<ScreenSnapshot>,
}

pub fn snapshot(nav: &Coordinator) -> Snapshot {
    let paths = nav
        .paths()
        .iter()
        .map(|path| PathSnapshot {
            key: path.key().to_string(),
            fixed: path.is_fixed(),
            version: path.version(),
            active: path.active().as_ref().map(ScreenSnapshot::from),
            screens: path.screens().iter().map(ScreenSnapshot::from).collect(),
        })
        .collect();

    Snapshot {
        current_address: nav.current_address().to_string(),
        paths,
        absent_known: nav.absent_known().iter().map(ScreenSnapshot::from).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    DuplicateClaim { address: Address, hosts: Vec<String> },
    Unclaimed { address: Address, screen: String },
    UnknownClaim { host: String, address: Address },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DuplicateClaim { address, hosts } => {
                write!(f, "{address} is claimed by several hosts: {}", hosts.join(", "))
            }
            Diagnostic::Unclaimed { address, screen } => {
                write!(f, "{address} ({screen}) is known but no host claims it")
            }
            Diagnostic::UnknownClaim { host, address } => {
                write!(f, "{host} claims {address}, which is not a known address")
            }
        }
    }
}

/// Hosts among the known screens and everything currently in a path.
fn hosts(nav: &Coordinator) -> Vec<Screen> {
    let mut out: Vec<Screen> = Vec::new();
    let present = nav.paths().iter().flat_map(|p| p.screens()).collect::<Vec<_>>();
    for screen in nav.known().into_iter().chain(present) {
        if screen.route().host().is_some() && !out.contains(&screen) {
            out.push(screen);
        }
    }
    out
}

pub fn diagnose(nav: &Coordinator) -> Vec<Diagnostic> {
    let known = nav.known();
    let claims: Vec<(Screen, Vec<Address>)> = hosts(nav)
        .into_iter()
        .map(|host| {
            let claimed = host
                .route()
                .host()
                .map(|spec| spec.claimed_addresses())
                .unwrap_or_default();
            (host, claimed)
        })
        .collect();

    let mut out = Vec::new();

    for screen in &known {
        let Some(address) = screen.address() else {
            continue;
        };
        let claimers: Vec<String> = claims
            .iter()
            .filter(|(_, claimed)| claimed.contains(&address))
            .map(|(host, _)| host.to_string())
            .collect();
        if claimers.len() > 1 {
            out.push(Diagnostic::DuplicateClaim {
                address,
                hosts: claimers,
            });
        } else if claimers.is_empty() && !screen.path_key().is_root() {
            out.push(Diagnostic::Unclaimed {
                address,
                screen: screen.to_string(),
            });
        }
    }

    let known_addresses: Vec<Address> = known.iter().filter_map(Screen::address).collect();
    for (host, claimed) in &claims {
        for address in claimed {
            if !known_addresses.contains(address) {
                out.push(Diagnostic::UnknownClaim {
                    host: host.to_string(),
                    address: address.clone(),
                });
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::address::Address;
    use crate::core::capability::HostSpec;
    use crate::test_support::{Page, test_parser};

    #[tokio::test]
    async fn test_snapshot_lists_paths_and_address() {
        let nav = Coordinator::new(test_parser);
        nav.open(&Address::parse("/shell/inbox")).await.unwrap();
        let snap = snapshot(&nav);
        assert_eq!(snap.current_address, "/shell/inbox");
        assert_eq!(snap.paths.len(), 2);
        assert_eq!(snap.paths[0].key, "root");
        assert_eq!(snap.paths[1].screens.len(), 1);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["paths"][1]["key"], "inner");
    }

    #[test]
    fn test_clean_configuration_has_no_diagnostics() {
        let nav = Coordinator::new(test_parser);
        let feed = Page::at("feed", "/tabs/feed").in_path("tabs").screen();
        let host = Page::at("tabs", "/tabs")
            .hosting(HostSpec::fixed("tabs", vec![feed.clone()]))
            .screen();
        nav.register_known([host, feed]);
        assert!(diagnose(&nav).is_empty());
    }

    #[test]
    fn test_duplicate_claim() {
        let nav = Coordinator::new(test_parser);
        let shared = Page::at("shared", "/shared").in_path("a").screen();
        let a = Page::at("a", "/a")
            .hosting(HostSpec::stack("a").claiming(vec![Address::parse("/shared")]))
            .screen();
        let b = Page::at("b", "/b")
            .hosting(HostSpec::stack("b").claiming(vec![Address::parse("/shared")]))
            .screen();
        nav.register_known([a, b, shared]);
        let diags = diagnose(&nav);
        assert_eq!(diags.len(), 1);
        assert!(matches!(&diags[0], Diagnostic::DuplicateClaim { hosts, .. } if hosts.len() == 2));
    }

    #[test]
    fn test_unclaimed_and_unknown_claim() {
        let nav = Coordinator::new(test_parser);
        let lonely = Page::at("lonely", "/inner/lonely").in_path("inner").screen();
        let host = Page::at("shell", "/shell")
            .hosting(HostSpec::stack("inner").claiming(vec![Address::parse("/inner/ghost")]))
            .screen();
        nav.register_known([host, lonely]);

        let diags = diagnose(&nav);
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().any(|d| matches!(d, Diagnostic::Unclaimed { .. })));
        assert!(diags.iter().any(|d| matches!(
            d,
            Diagnostic::UnknownClaim { address, .. } if address.to_string() == "/inner/ghost"
        )));
        assert!(diags[0].to_string().contains("/inner/lonely"));
    }
}
