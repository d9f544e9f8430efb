//! Batcher: regroup any iterator into fixed-size ordered groups
//!
//! Groups are filled by pulling exactly as many elements as they need, never
//! more, so batching does not break the bounded-memory property of the
//! pipeline it sits in. The final group holds whatever remained (1..size-1
//! elements); an empty source yields no groups at all.

use std::num::NonZeroUsize;

/// Upper bound on the capacity reserved up front for one group
const MAX_PREALLOC: usize = 4096;

/// Iterator adapter returned by [`BatchExt::batched`]
#[derive(Debug, Clone)]
pub struct Batched<I> {
    iter: I,
    size: NonZeroUsize,
    exhausted: bool,
}

impl<I: Iterator> Iterator for Batched<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let size = self.size.get();
        let mut group = Vec::with_capacity(size.min(MAX_PREALLOC));
        while group.len() < size {
            match self.iter.next() {
                Some(item) => group.push(item),
                None => {
                    self.exhausted = true;
                    break;
                },
            }
        }

        if group.is_empty() {
            None
        } else {
            Some(group)
        }
    }
}

/// Batching over fallible elements, returned by [`BatchExt::try_batched`]
///
/// The first error is yielded as soon as it is pulled; the partial group
/// collected before it is discarded and the adapter is exhausted afterwards.
#[derive(Debug, Clone)]
pub struct TryBatched<I> {
    inner: Batched<I>,
}

impl<I, T, E> Iterator for TryBatched<I>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = Result<Vec<T>, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let batched = &mut self.inner;
        if batched.exhausted {
            return None;
        }

        let size = batched.size.get();
        let mut group = Vec::with_capacity(size.min(MAX_PREALLOC));
        while group.len() < size {
            match batched.iter.next() {
                Some(Ok(item)) => group.push(item),
                Some(Err(e)) => {
                    batched.exhausted = true;
                    return Some(Err(e));
                },
                None => {
                    batched.exhausted = true;
                    break;
                },
            }
        }

        if group.is_empty() {
            None
        } else {
            Some(Ok(group))
        }
    }
}

/// Extension methods adding batching to every iterator
pub trait BatchExt: Iterator + Sized {
    fn batched(self, size: NonZeroUsize) -> Batched<Self> {
        Batched {
            iter: self,
            size,
            exhausted: false,
        }
    }

    fn try_batched<T, E>(self, size: NonZeroUsize) -> TryBatched<Self>
    where
        Self: Iterator<Item = Result<T, E>>,
    {
        TryBatched {
            inner: self.batched(size),
        }
    }
}

impl<I: Iterator> BatchExt for I {}

/// Free-function form of [`BatchExt::batched`]
pub fn batch<I: IntoIterator>(source: I, size: NonZeroUsize) -> Batched<I::IntoIter> {
    source.into_iter().batched(size)
}
