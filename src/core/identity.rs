//! # Identity Model
//!
//! Structural equality and a stable hash for navigable items. Two
//! independently built screens with the same concrete type and the same
//! comparison properties are interchangeable: paths treat them as the same
//! slot, and hash maps keyed by [`Screen`] find either one.
//!
//! ```text
//! equals(a, b)  ⇔  type(a) == type(b)  ∧  props(a) ≍ props(b)
//! hash(a)       =  jenkins(internal_props(a)) ^ jenkins(props(a))
//! ```
//!
//! Everything else in the engine assumes `equals(a, b) ⟹ hash(a) == hash(b)`.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::core::address::Address;
use crate::core::capability::{DeepLink, DeepLinkStrategy, Guard, HostSpec, Redirect};
use crate::core::path::PathKey;

// ============================================================================
// Comparison Values
// ============================================================================

/// A dynamically typed comparison value.
///
/// Numbers compare numerically across `Int` and `Float`. `Set` and `Map`
/// compare by content regardless of order; `List` compares in order.
#[derive(Debug, Clone)]
pub enum Prop {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Prop>),
    Set(Vec<Prop>),
    Map(Vec<(Prop, Prop)>),
    Screen(Screen),
}

impl Prop {
    pub fn set<I: IntoIterator<Item = Prop>>(items: I) -> Self {
        Prop::Set(items.into_iter().collect())
    }

    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<Prop>,
        V: Into<Prop>,
        I: IntoIterator<Item = (K, V)>,
    {
        Prop::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Prop::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// `f` equals `i` only when `f` is integral and converts back exactly.
fn float_eq_int(f: f64, i: i64) -> bool {
    f.fract() == 0.0 && (-9.223_372_036_854_776e18..9.223_372_036_854_776e18).contains(&f) && f as i64 == i
}

/// Order-independent multiset comparison.
fn multiset_eq<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len()
        && a.iter().all(|x| {
            let in_a = a.iter().filter(|y| *y == x).count();
            let in_b = b.iter().filter(|y| *y == x).count();
            in_a == in_b
        })
}

impl PartialEq for Prop {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Prop::Null, Prop::Null) => true,
            (Prop::Bool(a), Prop::Bool(b)) => a == b,
            (Prop::Int(a), Prop::Int(b)) => a == b,
            (Prop::Float(a), Prop::Float(b)) => a == b,
            (Prop::Int(i), Prop::Float(f)) | (Prop::Float(f), Prop::Int(i)) => float_eq_int(*f, *i),
            (Prop::Str(a), Prop::Str(b)) => a == b,
            (Prop::List(a), Prop::List(b)) => a == b,
            (Prop::Set(a), Prop::Set(b)) => multiset_eq(a, b),
            (Prop::Map(a), Prop::Map(b)) => multiset_eq(a, b),
            (Prop::Screen(a), Prop::Screen(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[Prop]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }

        match self {
            Prop::Null => write!(f, "null"),
            Prop::Bool(b) => write!(f, "{b}"),
            Prop::Int(i) => write!(f, "{i}"),
            Prop::Float(x) => write!(f, "{x}"),
            Prop::Str(s) => write!(f, "{s}"),
            Prop::List(items) => {
                write!(f, "[")?;
                join(f, items)?;
                write!(f, "]")
            }
            Prop::Set(items) => {
                write!(f, "{{")?;
                join(f, items)?;
                write!(f, "}}")
            }
            Prop::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Prop::Screen(screen) => write!(f, "{screen}"),
        }
    }
}

impl From<bool> for Prop {
    fn from(value: bool) -> Self {
        Prop::Bool(value)
    }
}

impl From<i64> for Prop {
    fn from(value: i64) -> Self {
        Prop::Int(value)
    }
}

impl From<i32> for Prop {
    fn from(value: i32) -> Self {
        Prop::Int(value.into())
    }
}

impl From<f64> for Prop {
    fn from(value: f64) -> Self {
        Prop::Float(value)
    }
}

impl From<&str> for Prop {
    fn from(value: &str) -> Self {
        Prop::Str(value.to_string())
    }
}

impl From<String> for Prop {
    fn from(value: String) -> Self {
        Prop::Str(value)
    }
}

impl From<Screen> for Prop {
    fn from(value: Screen) -> Self {
        Prop::Screen(value)
    }
}

impl<T: Into<Prop>> From<Option<T>> for Prop {
    fn from(value: Option<T>) -> Self {
        value.map_or(Prop::Null, Into::into)
    }
}

// ============================================================================
// Hashing (Jenkins one-at-a-time, 29-bit)
// ============================================================================

const MASK: u32 = 0x1fff_ffff;

fn combine(hash: u32, value: u32) -> u32 {
    let mut h = MASK & hash.wrapping_add(value);
    h = MASK & h.wrapping_add((0x0007_ffff & h) << 10);
    h ^ (h >> 6)
}

fn finish(hash: u32) -> u32 {
    let mut h = MASK & hash.wrapping_add((0x03ff_ffff & hash) << 3);
    h ^= h >> 11;
    MASK & h.wrapping_add((0x0000_3fff & h) << 15)
}

fn fold<I: IntoIterator<Item = u32>>(hashes: I) -> u32 {
    finish(hashes.into_iter().fold(0, combine))
}

fn hash_u64(bits: u64) -> u32 {
    (bits ^ (bits >> 32)) as u32
}

fn hash_str(s: &str) -> u32 {
    fold(s.bytes().map(u32::from))
}

fn hash_sorted(mut hashes: Vec<u32>) -> u32 {
    hashes.sort_unstable();
    fold(hashes)
}

/// Hash of a single comparison value; numerically equal `Int`/`Float`
/// values hash the same.
pub fn hash_prop(prop: &Prop) -> u32 {
    match prop {
        Prop::Null => 0,
        Prop::Bool(true) => 1231,
        Prop::Bool(false) => 1237,
        Prop::Int(i) => hash_u64(*i as u64),
        Prop::Float(f) => {
            let as_int = *f as i64;
            if float_eq_int(*f, as_int) {
                hash_u64(as_int as u64)
            } else {
                hash_u64(f.to_bits())
            }
        }
        Prop::Str(s) => hash_str(s),
        Prop::List(items) => fold(items.iter().map(hash_prop)),
        Prop::Set(items) => hash_sorted(items.iter().map(hash_prop).collect()),
        Prop::Map(entries) => hash_sorted(
            entries
                .iter()
                .map(|(k, v)| finish(combine(combine(0, hash_prop(k)), hash_prop(v))))
                .collect(),
        ),
        Prop::Screen(screen) => hash_route(screen.route()),
    }
}

// ============================================================================
// Navigable Items
// ============================================================================

/// Runtime type information for trait objects.
///
/// Blanket-implemented for every `'static` type; never implement by hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Anything that can occupy a slot in a path.
///
/// Only [`props`](Route::props) is usually needed. Capabilities are opt-in:
/// a route that wants a pop guard returns `Some(self)` from
/// [`guard`](Route::guard) and implements [`Guard`]; the same route may
/// also redirect or declare a shell, independently.
pub trait Route: AsAny + Send + Sync {
    /// Values that decide equality, in order.
    fn props(&self) -> Vec<Prop> {
        Vec::new()
    }

    /// Implementation-only values that feed the hash but never equality.
    ///
    /// These must be derived from [`props`](Route::props) (or left empty),
    /// otherwise equal screens could hash differently.
    fn internal_props(&self) -> Vec<Prop> {
        Vec::new()
    }

    /// Canonical address, if this screen can be reached by one.
    fn address(&self) -> Option<Address> {
        None
    }

    /// The path this screen lives in.
    fn path_key(&self) -> PathKey {
        PathKey::root()
    }

    fn guard(&self) -> Option<&dyn Guard> {
        None
    }

    fn redirect(&self) -> Option<&dyn Redirect> {
        None
    }

    fn deep_link(&self) -> Option<&dyn DeepLink> {
        None
    }

    fn deep_link_strategy(&self) -> DeepLinkStrategy {
        DeepLinkStrategy::Replace
    }

    /// The container host this screen must be wrapped by before it is shown.
    fn shell(&self) -> Option<Screen> {
        None
    }

    /// Present when this screen renders a nested path.
    fn host(&self) -> Option<HostSpec> {
        None
    }
}

/// Structural equality between two routes.
pub fn equals(a: &dyn Route, b: &dyn Route) -> bool {
    if std::ptr::addr_eq(a, b) {
        return true;
    }
    if a.as_any().type_id() != b.as_any().type_id() {
        return false;
    }
    a.props() == b.props()
}

/// Stable hash consistent with [`equals`].
pub fn hash_route(route: &dyn Route) -> u32 {
    let internal = fold(route.internal_props().iter().map(hash_prop));
    let props = fold(route.props().iter().map(hash_prop));
    internal ^ props
}

/// Strips module paths, keeping generic arguments readable.
fn short_type_name(full: &'static str) -> String {
    let mut out = String::new();
    let mut token = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            token.push(c);
        } else {
            out.push_str(token.rsplit("::").next().unwrap_or(&token));
            token.clear();
            out.push(c);
        }
    }
    out.push_str(token.rsplit("::").next().unwrap_or(&token));
    out
}

/// `TypeName(prop, prop, ...)`.
pub fn display_string(route: &dyn Route) -> String {
    let props = route.props();
    let args: Vec<String> = props.iter().map(ToString::to_string).collect();
    format!("{}({})", short_type_name(route.type_name()), args.join(", "))
}

// ============================================================================
// Screen Handle
// ============================================================================

/// Shared, cheaply cloned handle to a route.
///
/// `PartialEq`, `Eq` and `Hash` go through the identity model, so screens
/// work as keys in std collections.
#[derive(Clone)]
pub struct Screen(Arc<dyn Route>);

impl Screen {
    pub fn new<R: Route>(route: R) -> Self {
        Self(Arc::new(route))
    }

    pub fn from_arc(route: Arc<dyn Route>) -> Self {
        Self(route)
    }

    /// The route behind this handle. Call capability queries through this,
    /// not on the handle itself.
    pub fn route(&self) -> &dyn Route {
        &*self.0
    }

    pub fn downcast_ref<T: Route>(&self) -> Option<&T> {
        self.route().as_any().downcast_ref::<T>()
    }

    pub fn type_tag(&self) -> TypeId {
        self.route().as_any().type_id()
    }

    /// Same allocation, not merely equal.
    pub fn ptr_eq(&self, other: &Screen) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn address(&self) -> Option<Address> {
        self.route().address()
    }

    pub fn path_key(&self) -> PathKey {
        self.route().path_key()
    }
}

impl PartialEq for Screen {
    fn eq(&self, other: &Self) -> bool {
        equals(self.route(), other.route())
    }
}

impl Eq for Screen {}

impl Hash for Screen {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(hash_route(self.route()));
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display_string(self.route()))
    }
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&display_string(self.route()))
    }
}
