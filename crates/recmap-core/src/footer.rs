//! Footer withholding.

use std::collections::VecDeque;
use std::iter::FusedIterator;

/// Iterator adaptor that never yields the last `footer_lines` successful
/// items of its source.
///
/// At most `footer_lines + 1` items are held back at once, so unbounded
/// sources stream.
///
/// An error ends the buffer. Items still held when it arrives cannot be told
/// apart from footer lines of a truncated source, so they are dropped; every
/// item yielded precedes the error in source order.
#[derive(Debug)]
pub struct FooterBuffer<I, T> {
    inner: I,
    pending: VecDeque<T>,
    footer_lines: usize,
    exhausted: bool,
}

impl<I, T> FooterBuffer<I, T> {
    pub fn new(inner: I, footer_lines: usize) -> Self {
        Self {
            inner,
            pending: VecDeque::with_capacity(footer_lines + 1),
            footer_lines,
            exhausted: false,
        }
    }
}

impl<I, T, E> Iterator for FooterBuffer<I, T>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.exhausted && self.pending.len() <= self.footer_lines {
            match self.inner.next() {
                Some(Ok(item)) => self.pending.push_back(item),
                Some(Err(err)) => {
                    self.pending.clear();
                    self.exhausted = true;
                    return Some(Err(err));
                }
                None => self.exhausted = true,
            }
        }
        if self.pending.len() > self.footer_lines {
            self.pending.pop_front().map(Ok)
        } else {
            None
        }
    }
}

impl<I, T, E> FusedIterator for FooterBuffer<I, T> where I: Iterator<Item = Result<T, E>> {}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn withhold(items: Vec<u32>, footer_lines: usize) -> Vec<u32> {
        FooterBuffer::new(items.into_iter().map(Ok::<_, ()>), footer_lines)
            .map(|item| item.unwrap())
            .collect()
    }

    #[test]
    fn zero_footer_passes_everything() {
        assert_eq!(withhold(vec![1, 2, 3], 0), vec![1, 2, 3]);
    }

    #[test]
    fn footer_longer_than_input_yields_nothing() {
        assert!(withhold(vec![1, 2], 5).is_empty());
    }

    #[test]
    fn errors_end_the_buffer_in_source_order() {
        let source = vec![Ok(1), Ok(2), Err("bad"), Ok(3)];
        let mut buffer = FooterBuffer::new(source.into_iter(), 1);
        assert_eq!(buffer.next(), Some(Ok(1)));
        assert_eq!(buffer.next(), Some(Err("bad")));
        assert_eq!(buffer.next(), None);
    }

    #[test]
    fn errors_pass_through_without_footer() {
        let source = vec![Ok(1), Err("bad"), Ok(2)];
        let buffer = FooterBuffer::new(source.into_iter(), 0);
        assert_eq!(buffer.collect::<Vec<_>>(), vec![Ok(1), Err("bad")]);
    }

    #[test]
    fn streams_without_reading_ahead_more_than_needed() {
        let mut pulled = 0;
        let source = (0..).map(|n| {
            pulled += 1;
            Ok::<_, ()>(n)
        });
        let first: Vec<_> = FooterBuffer::new(source, 2).take(3).collect();
        assert_eq!(first, vec![Ok(0), Ok(1), Ok(2)]);
        assert_eq!(pulled, 5);
    }

    proptest! {
        #[test]
        fn yields_all_but_last_footer_lines(
            items in proptest::collection::vec(any::<u32>(), 0..64),
            footer_lines in 0usize..16,
        ) {
            let expected = items[..items.len().saturating_sub(footer_lines)].to_vec();
            prop_assert_eq!(withhold(items, footer_lines), expected);
        }
    }
}
