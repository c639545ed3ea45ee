//! Rolling snapshots of named points and tangent vectors.
//!
//! Change-based stopping criteria and debug/record actions need "the value
//! from the previous iteration". A [`StoreStateAction`] holds deep copies of
//! named points and tangents; the owner reads the snapshot before updating
//! it, so the first iteration sees no prior value.

use crate::core::{manifold::Manifold, types::Scalar};
use std::collections::HashMap;

/// Well-known snapshot key for the current iterate.
pub const ITERATE: &str = "Iterate";

/// Well-known snapshot key for the current gradient.
pub const GRADIENT: &str = "Gradient";

/// A small map of named snapshots, deep-copied on store.
///
/// Snapshots are keyed separately by kind: points and tangent vectors live
/// in different namespaces.
#[derive(Debug, Clone)]
pub struct StoreStateAction<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    points: HashMap<&'static str, M::Point>,
    tangents: HashMap<&'static str, M::TangentVector>,
}

impl<T, M> StoreStateAction<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    /// Creates an empty storage action.
    pub fn new() -> Self {
        Self {
            points: HashMap::new(),
            tangents: HashMap::new(),
        }
    }

    /// Stores a deep copy of `point` under `key`.
    pub fn store_point(&mut self, key: &'static str, point: &M::Point) {
        self.points.insert(key, point.clone());
    }

    /// Stores a deep copy of `tangent` under `key`.
    pub fn store_tangent(&mut self, key: &'static str, tangent: &M::TangentVector) {
        self.tangents.insert(key, tangent.clone());
    }

    /// Whether a point snapshot exists for `key`.
    pub fn has_point(&self, key: &str) -> bool {
        self.points.contains_key(key)
    }

    /// Whether a tangent snapshot exists for `key`.
    pub fn has_tangent(&self, key: &str) -> bool {
        self.tangents.contains_key(key)
    }

    /// Returns the point snapshot stored under `key`.
    pub fn point(&self, key: &str) -> Option<&M::Point> {
        self.points.get(key)
    }

    /// Returns the tangent snapshot stored under `key`.
    pub fn tangent(&self, key: &str) -> Option<&M::TangentVector> {
        self.tangents.get(key)
    }

    /// Drops all snapshots.
    pub fn reset(&mut self) {
        self.points.clear();
        self.tangents.clear();
    }
}

impl<T, M> Default for StoreStateAction<T, M>
where
    T: Scalar,
    M: Manifold<T>,
{
    fn default() -> Self {
        Self::new()
    }
}
