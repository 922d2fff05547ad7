//! Fixed-capacity bitset over CPU core ids.
//!
//! [`CoreSet`] mirrors the kernel's `cpu_set_t`: 1024 bits, one per core id.
//! It is used both for the set of cores the process may run on and for the
//! subset handed out as lgores. The ordinal lookup [`CoreSet::nth_set_bit`] is
//! what turns an lgore id (or a reservation ordinal) into a concrete core id.

use std::fmt;

use crate::error::{LgoreError, Result};

/// Number of core ids a [`CoreSet`] can hold (same as glibc `CPU_SETSIZE`).
pub const MAX_CORES: usize = 1024;

const WORD_BITS: usize = u64::BITS as usize;
const WORDS: usize = MAX_CORES / WORD_BITS;

/// A set of core ids in `[0, MAX_CORES)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CoreSet {
    words: [u64; WORDS],
}

impl CoreSet {
    /// Empty set.
    pub const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    /// Set containing every core id in `0..n`.
    pub fn first_n(n: usize) -> Result<Self> {
        (0..n).try_fold(Self::new(), |mut set, core| {
            set.set(core)?;
            Ok(set)
        })
    }

    /// Set containing only `core`.
    pub fn single(core: usize) -> Result<Self> {
        let mut set = Self::new();
        set.set(core)?;
        Ok(set)
    }

    /// Add `core` to the set.
    pub fn set(&mut self, core: usize) -> Result<()> {
        if core >= MAX_CORES {
            return Err(LgoreError::CoreOutOfRange { core });
        }
        self.words[core / WORD_BITS] |= 1 << (core % WORD_BITS);
        Ok(())
    }

    /// Whether `core` is a member. Out-of-range ids are never members.
    #[inline]
    pub fn is_set(&self, core: usize) -> bool {
        core < MAX_CORES && self.words[core / WORD_BITS] & (1 << (core % WORD_BITS)) != 0
    }

    /// Remove `core` from the set. Clearing an absent or out-of-range id is a no-op.
    #[inline]
    pub fn clear(&mut self, core: usize) {
        if core < MAX_CORES {
            self.words[core / WORD_BITS] &= !(1 << (core % WORD_BITS));
        }
    }

    /// Population count.
    #[inline]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Core id of the `n`-th set bit (0-indexed, ascending), or `None` if
    /// fewer than `n + 1` bits are set.
    pub fn nth_set_bit(&self, n: usize) -> Option<usize> {
        let mut remaining = n;
        for (i, &word) in self.words.iter().enumerate() {
            let ones = word.count_ones() as usize;
            if remaining >= ones {
                remaining -= ones;
                continue;
            }
            let mut w = word;
            for _ in 0..remaining {
                w &= w - 1; // drop lowest set bit
            }
            return Some(i * WORD_BITS + w.trailing_zeros() as usize);
        }
        None
    }

    /// Set core ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_CORES).filter(move |&core| self.is_set(core))
    }
}

impl FromIterator<usize> for CoreSet {
    /// Collects core ids, silently dropping ids `>= MAX_CORES`.
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Self::new();
        for core in iter {
            let _ = set.set(core);
        }
        set
    }
}

/// Linux cpulist notation, e.g. `0-3,8,10-11`.
impl fmt::Display for CoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut iter = self.iter().peekable();
        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek() == Some(&(end + 1)) {
                end += 1;
                iter.next();
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}-{end}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoreSet({self})")
    }
}

/// Parse Linux cpulist notation (`0-3,8`). Whitespace around items is ignored,
/// an empty string yields the empty set.
pub fn parse_cpu_list(s: &str) -> Result<CoreSet> {
    let mut set = CoreSet::new();
    for item in s.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let parse = |v: &str| {
            v.trim()
                .parse::<usize>()
                .map_err(|e| LgoreError::Config(format!("bad cpu list item '{item}': {e}")))
        };
        match item.split_once('-') {
            Some((lo, hi)) => {
                let (lo, hi) = (parse(lo)?, parse(hi)?);
                if lo > hi {
                    return Err(LgoreError::Config(format!("bad cpu range '{item}'")));
                }
                for core in lo..=hi {
                    set.set(core)?;
                }
            }
            None => set.set(parse(item)?)?,
        }
    }
    Ok(set)
}
