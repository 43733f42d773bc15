//! One-pass containment tests over version-sorted sequences.
//!
//! Testing every item of a sorted list against a range with
//! [`VersionRange::contains_version`] repeats a binary search per item. The
//! iterators here locate the first item once and then walk the intervals in
//! step with the sequence. Once the sequence has moved past the last interval
//! that matters, every remaining answer is the same and the test short
//! circuits.
//!
//! The input must be sorted by version, ascending or descending as declared.
//! Behavior on unsorted input is unspecified (but safe).

use super::{Version, VersionRange};
use std::cmp::Ordering;

/// Stateful containment tester for a monotonic sequence of versions.
#[derive(Debug)]
struct SortedTester<'r> {
    range: &'r VersionRange,
    index: Option<usize>,
    constant: Option<bool>,
    descending: bool,
}

impl<'r> SortedTester<'r> {
    fn new(range: &'r VersionRange, descending: bool) -> Self {
        Self {
            range,
            index: None,
            constant: range.is_any().then_some(true),
            descending,
        }
    }

    fn test(&mut self, version: &Version) -> bool {
        if let Some(answer) = self.constant {
            return answer;
        }
        if self.descending {
            self.descending_test(version)
        } else {
            self.ascending_test(version)
        }
    }

    fn ascending_test(&mut self, version: &Version) -> bool {
        let bounds = self.range.bounds();

        let Some(mut index) = self.index else {
            let (index, contains) = self.range.locate(version);
            self.index = Some(index);
            return match bounds.get(index) {
                Some(bound) if contains => {
                    if !bound.upper_bounded() {
                        self.constant = Some(true);
                    }
                    true
                }
                None => {
                    self.constant = Some(false);
                    false
                }
                Some(_) => false,
            };
        };

        loop {
            let Some(bound) = bounds.get(index) else {
                self.constant = Some(false);
                return false;
            };
            match bound.version_containment(version) {
                Ordering::Equal => {
                    if !bound.upper_bounded() {
                        self.constant = Some(true);
                    }
                    return true;
                }
                Ordering::Less => return false,
                Ordering::Greater => {
                    index += 1;
                    self.index = Some(index);
                }
            }
        }
    }

    fn descending_test(&mut self, version: &Version) -> bool {
        let bounds = self.range.bounds();

        let Some(mut index) = self.index else {
            let (index, contains) = self.range.locate(version);
            return match bounds.get(index) {
                Some(bound) if contains => {
                    self.index = Some(index);
                    if !bound.lower_bounded() {
                        self.constant = Some(true);
                    }
                    true
                }
                None => {
                    self.index = Some(bounds.len().saturating_sub(1));
                    false
                }
                Some(_) if index == 0 => {
                    self.index = Some(0);
                    self.constant = Some(false);
                    false
                }
                Some(_) => {
                    self.index = Some(index - 1);
                    false
                }
            };
        };

        loop {
            let Some(bound) = bounds.get(index) else {
                return false;
            };
            match bound.version_containment(version) {
                Ordering::Equal => {
                    if !bound.lower_bounded() {
                        self.constant = Some(true);
                    }
                    return true;
                }
                Ordering::Greater => return false,
                Ordering::Less => {
                    if index == 0 {
                        self.constant = Some(false);
                        return false;
                    }
                    index -= 1;
                    self.index = Some(index);
                }
            }
        }
    }
}

/// Yields `(contained, item)` for every item. See
/// [`VersionRange::iter_intersect_test`].
pub struct ContainsVersionIter<'r, I, F> {
    tester: SortedTester<'r>,
    items: I,
    key: F,
}

impl<'r, I, F> ContainsVersionIter<'r, I, F> {
    pub(crate) fn new(range: &'r VersionRange, items: I, key: F, descending: bool) -> Self {
        Self {
            tester: SortedTester::new(range, descending),
            items,
            key,
        }
    }
}

impl<I, F> Iterator for ContainsVersionIter<'_, I, F>
where
    I: Iterator,
    F: Fn(&I::Item) -> &Version,
{
    type Item = (bool, I::Item);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.next()?;
        let contained = self.tester.test((self.key)(&item));
        Some((contained, item))
    }
}

/// Yields only the items inside the range, stopping as soon as no later
/// item can be.
pub struct IntersectingIter<'r, I, F> {
    inner: ContainsVersionIter<'r, I, F>,
}

impl<'r, I, F> IntersectingIter<'r, I, F> {
    pub(crate) fn new(range: &'r VersionRange, items: I, key: F, descending: bool) -> Self {
        Self {
            inner: ContainsVersionIter::new(range, items, key, descending),
        }
    }
}

impl<I, F> Iterator for IntersectingIter<'_, I, F>
where
    I: Iterator,
    F: Fn(&I::Item) -> &Version,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.inner.tester.constant == Some(false) {
                return None;
            }
            match self.inner.next()? {
                (true, item) => return Some(item),
                (false, _) => {}
            }
        }
    }
}

/// Yields only the items outside the range, stopping as soon as every
/// later item is inside it.
pub struct NonIntersectingIter<'r, I, F> {
    inner: ContainsVersionIter<'r, I, F>,
}

impl<'r, I, F> NonIntersectingIter<'r, I, F> {
    pub(crate) fn new(range: &'r VersionRange, items: I, key: F, descending: bool) -> Self {
        Self {
            inner: ContainsVersionIter::new(range, items, key, descending),
        }
    }
}

impl<I, F> Iterator for NonIntersectingIter<'_, I, F>
where
    I: Iterator,
    F: Fn(&I::Item) -> &Version,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.inner.tester.constant == Some(true) {
                return None;
            }
            match self.inner.next()? {
                (false, item) => return Some(item),
                (true, _) => {}
            }
        }
    }
}
