//! A growable collection of raw mail addresses.
//!
//! Addresses are kept as byte strings: they come straight out of directory
//! attribute values, which are not guaranteed to be printable text and may
//! even contain NUL bytes.

use std::{collections::TryReserveError, fmt};

/// An ordered sequence of addresses.
///
/// Duplicates are allowed until [`AddressSet::subtract`] removes them. Every
/// operation that allocates reports exhaustion as a [`TryReserveError`]
/// instead of aborting.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AddressSet {
    addresses: Vec<Vec<u8>>,
}

impl AddressSet {
    /// Creates an empty set without allocating.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            addresses: Vec::new(),
        }
    }

    /// Creates an empty set with room for `capacity` addresses.
    ///
    /// The capacity is only a hint; the set grows as needed.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            addresses: Vec::with_capacity(capacity),
        }
    }

    /// Number of addresses currently held.
    #[inline]
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Number of addresses the set can hold before it has to grow.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.addresses.capacity()
    }

    /// Copies `address` into the set and returns the stored copy.
    ///
    /// The address is copied by length, so embedded NUL bytes survive. When
    /// the set is full its capacity is doubled.
    ///
    /// # Errors
    ///
    /// If memory for the copy or for the grown set cannot be obtained. The
    /// set is left unchanged in that case.
    pub fn push(&mut self, address: impl AsRef<[u8]>) -> Result<&[u8], TryReserveError> {
        let address = address.as_ref();

        let mut copy = Vec::new();
        copy.try_reserve_exact(address.len())?;
        copy.extend_from_slice(address);

        if self.addresses.len() == self.addresses.capacity() {
            self.addresses
                .try_reserve_exact(self.addresses.capacity().max(1))?;
        }

        self.addresses.push(copy);
        Ok(self.addresses[self.addresses.len() - 1].as_slice())
    }

    /// The address at `index`, if there is one.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.addresses.get(index).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[u8]> + '_ {
        self.addresses.iter().map(Vec::as_slice)
    }

    /// Sorts the addresses in ascending byte order.
    pub fn sort(&mut self) {
        self.addresses.sort_unstable();
    }

    pub fn is_sorted(&self) -> bool {
        self.addresses.is_sorted()
    }

    /// Removes every address contained in `remove`, and all duplicates.
    ///
    /// Both sets must already be sorted. The surviving addresses stay in
    /// order and are compacted to the front; capacity is not released.
    ///
    /// `self` may contain runs of equal addresses, so a match only advances
    /// the position in `self`. The position in `remove` moves on once the
    /// current address of `self` has passed it.
    pub fn subtract(&mut self, remove: &Self) {
        debug_assert!(self.is_sorted(), "subtract requires a sorted set");
        debug_assert!(remove.is_sorted(), "subtract requires a sorted subtrahend");

        let addresses = &mut self.addresses;
        let mut kept = 0;
        let mut next = 0;
        let mut j = 0;

        while next < addresses.len() {
            if let Some(candidate) = remove.addresses.get(j) {
                match addresses[next].cmp(candidate) {
                    std::cmp::Ordering::Equal => {
                        next += 1;
                        continue;
                    }
                    std::cmp::Ordering::Greater => {
                        j += 1;
                        continue;
                    }
                    std::cmp::Ordering::Less => {}
                }
            }

            if kept == 0 || addresses[kept - 1] != addresses[next] {
                addresses.swap(kept, next);
                kept += 1;
            }
            next += 1;
        }

        addresses.truncate(kept);
    }
}

impl fmt::Debug for AddressSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(String::from_utf8_lossy))
            .finish()
    }
}

impl<'a> IntoIterator for &'a AddressSet {
    type Item = &'a [u8];
    type IntoIter = std::iter::Map<std::slice::Iter<'a, Vec<u8>>, fn(&Vec<u8>) -> &[u8]>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses
            .iter()
            .map(Vec::as_slice as fn(&Vec<u8>) -> &[u8])
    }
}

impl IntoIterator for AddressSet {
    type Item = Vec<u8>;
    type IntoIter = std::vec::IntoIter<Vec<u8>>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.into_iter()
    }
}

impl<A: AsRef<[u8]>> FromIterator<A> for AddressSet {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        Self {
            addresses: iter.into_iter().map(|a| a.as_ref().to_vec()).collect(),
        }
    }
}
