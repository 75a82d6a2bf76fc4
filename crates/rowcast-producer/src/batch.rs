//! Bounded, order-preserving batching

/// Iterator adapter yielding `Vec`s of at most `max` items.
///
/// Every chunk is full except possibly the last one, and no chunk is ever
/// empty. Items are pulled from the inner iterator only as chunks are
/// requested.
#[derive(Debug)]
pub struct Chunks<I: Iterator> {
    inner: I,
    max: usize,
}

impl<I: Iterator> Chunks<I> {
    /// `max` of zero is treated as one
    pub fn new(inner: I, max: usize) -> Self {
        Self {
            inner,
            max: max.max(1),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

impl<I: Iterator> Iterator for Chunks<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut chunk = Vec::with_capacity(self.max);
        for item in self.inner.by_ref() {
            chunk.push(item);
            if chunk.len() == self.max {
                break;
            }
        }
        (!chunk.is_empty()).then_some(chunk)
    }
}

/// Extension for `iter.chunked(n)`
pub trait ChunkedExt: Iterator + Sized {
    fn chunked(self, max: usize) -> Chunks<Self> {
        Chunks::new(self, max)
    }
}

impl<I: Iterator> ChunkedExt for I {}
