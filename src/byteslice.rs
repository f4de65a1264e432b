//! Iterators splitting a slice into consecutive sub-slices of varying sizes,
//! used to hand each compressed chunk and its output to a different thread.
use std::iter::FusedIterator;

/// Yields `&slc[..sizes[0]]`, then the next `sizes[1]` elements, and so on.
///
/// Stops when the sizes are exhausted or when the remainder is too short
/// for the next size.
pub struct ChunksIrregular<'a, T> {
    remainder: &'a [T],
    sizes: std::slice::Iter<'a, usize>,
}

impl<'a, T> ChunksIrregular<'a, T> {
    pub fn new(slc: &'a [T], sizes: &'a [usize]) -> Self {
        Self {
            remainder: slc,
            sizes: sizes.iter(),
        }
    }
}

impl<'a, T> Iterator for ChunksIrregular<'a, T> {
    type Item = &'a [T];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let size = *self.sizes.next()?;
        if size > self.remainder.len() {
            self.sizes = [].iter();
            return None;
        }
        let (head, tail) = self.remainder.split_at(size);
        self.remainder = tail;
        Some(head)
    }
}

impl<'a, T> FusedIterator for ChunksIrregular<'a, T> {}

/// Mutable version of [`ChunksIrregular`]
pub struct ChunksIrregularMut<'a, T> {
    remainder: &'a mut [T],
    sizes: std::slice::Iter<'a, usize>,
}

impl<'a, T> ChunksIrregularMut<'a, T> {
    pub fn new(slc: &'a mut [T], sizes: &'a [usize]) -> Self {
        Self {
            remainder: slc,
            sizes: sizes.iter(),
        }
    }
}

impl<'a, T> Iterator for ChunksIrregularMut<'a, T> {
    type Item = &'a mut [T];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let size = *self.sizes.next()?;
        if size > self.remainder.len() {
            self.sizes = [].iter();
            return None;
        }
        let remainder = std::mem::replace(&mut self.remainder, &mut []);
        let (head, tail) = remainder.split_at_mut(size);
        self.remainder = tail;
        Some(head)
    }
}

impl<'a, T> FusedIterator for ChunksIrregularMut<'a, T> {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_irregular_sizes() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let sizes = [1, 0, 3, 2];
        let chunks: Vec<&[u8]> = ChunksIrregular::new(&data, &sizes).collect();
        assert_eq!(chunks, vec![&[1u8][..], &[], &[2, 3, 4], &[5, 6]]);
    }

    #[test]
    fn test_stops_when_too_short() {
        let mut data = [0u8; 5];
        let sizes = [2, 4, 1];
        let mut chunks = ChunksIrregularMut::new(&mut data, &sizes);
        chunks.next().unwrap().copy_from_slice(&[7, 7]);
        assert!(chunks.next().is_none());
        assert!(chunks.next().is_none());
        assert_eq!(data, [7, 7, 0, 0, 0]);
    }
}
