//! Bounded discrete logarithm recovery.
//!
//! Masking terms are sums of at most `k` values sampled from `[min_val, max_val]`. Their
//! logarithms are therefore small and can be found by an exhaustive search over `0..bound`
//! with `bound = max_val·k + 1`.
//!
//! A search either finds exactly one candidate or fails: no match means the bound was
//! miscalibrated or a message was corrupted, more than one match means the generator has an
//! order below the bound. Both are fatal for the round.

use std::{collections::HashMap, hash::Hash};

use ndarray::{Array2, Zip};
use tracing::debug;

use crate::{ProtocolError, Result};

/// Computes the exclusive search bound for the sum of `participants` values from `[_, max_val]`.
pub fn search_bound(max_val: u64, participants: usize) -> u64 {
    max_val.saturating_mul(participants as u64).saturating_add(1)
}

/// Searches `d` in `0..bound` such that the `d`-th power equals the target.
///
/// `powers` yields `g^0, g^1, ...` of the group in question (or `0·G, 1·G, ...` for additive
/// groups). The whole range is searched so that ambiguous matches are detected.
///
/// # Errors
/// Fails with [`ProtocolError::DiscreteLogNotFound`] if nothing matches and with
/// [`ProtocolError::AmbiguousDiscreteLog`] if more than one candidate matches.
pub fn recover_mask_exponent<K, I>(powers: I, target: &K, bound: u64) -> Result<u64>
where
    K: PartialEq,
    I: IntoIterator<Item = K>,
{
    let mut found = None;
    for (exponent, power) in (0..bound).zip(powers) {
        if &power == target {
            if found.is_some() {
                return Err(ProtocolError::AmbiguousDiscreteLog { bound });
            }
            found = Some(exponent);
        }
    }
    found.ok_or(ProtocolError::DiscreteLogNotFound { bound })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Entry {
    Unique(u64),
    Ambiguous,
}

/// A lookup table of all powers below a bound.
///
/// The table is built in a single sweep, which amortizes the search over all cells of a
/// matrix.
#[derive(Debug)]
pub struct DiscreteLogTable<K> {
    entries: HashMap<K, Entry>,
    bound: u64,
}

impl<K> DiscreteLogTable<K>
where
    K: Hash + Eq,
{
    /// Tabulates the first `bound` powers.
    pub fn new<I>(powers: I, bound: u64) -> Self
    where
        I: IntoIterator<Item = K>,
    {
        let mut entries = HashMap::new();
        for (exponent, power) in (0..bound).zip(powers) {
            entries
                .entry(power)
                .and_modify(|entry| *entry = Entry::Ambiguous)
                .or_insert(Entry::Unique(exponent));
        }
        debug!("tabulated {} powers", bound);
        Self { entries, bound }
    }

    /// Gets the exclusive bound of the table.
    pub fn bound(&self) -> u64 {
        self.bound
    }

    /// Looks up the logarithm of a single value.
    ///
    /// # Errors
    /// Fails like [`recover_mask_exponent`].
    pub fn lookup(&self, target: &K) -> Result<u64> {
        match self.entries.get(target) {
            Some(Entry::Unique(exponent)) => Ok(*exponent),
            Some(Entry::Ambiguous) => Err(ProtocolError::AmbiguousDiscreteLog { bound: self.bound }),
            None => Err(ProtocolError::DiscreteLogNotFound { bound: self.bound }),
        }
    }
}

impl<K> DiscreteLogTable<K>
where
    K: Hash + Eq + Send + Sync,
{
    /// Looks up the logarithm of every cell, mapped to a table key by `key`.
    ///
    /// The cells are resolved in parallel.
    ///
    /// # Errors
    /// Fails with the error of the first failing cell in row-major order.
    pub fn recover_matrix<T, F>(&self, targets: &Array2<T>, key: F) -> Result<Array2<u64>>
    where
        T: Sync,
        F: Fn(&T) -> K + Sync,
    {
        let cells = Zip::from(targets).par_map_collect(|target| self.lookup(&key(target)));
        let (rows, cols) = cells.dim();
        let exponents = cells.iter().cloned().collect::<Result<Vec<_>>>()?;
        Array2::from_shape_vec((rows, cols), exponents).map_err(|_| ProtocolError::ShapeMismatch {
            expected: rows,
            rows,
            cols,
        })
    }
}
