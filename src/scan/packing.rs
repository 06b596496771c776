//! Weight-based bin packing with a bounded number of open bins.

use std::collections::VecDeque;

struct Bin<T> {
    items: Vec<T>,
    weight: u64,
}

/// Lazily groups items into bins of at most `target` weight.
///
/// At most `lookback` bins stay open; when another one is needed the oldest
/// open bin is emitted. An item heavier than `target` gets a bin of its own.
/// Item order is preserved inside every bin.
pub(crate) struct PackingIter<I, T, W>
where
    I: Iterator<Item = T>,
    W: Fn(&T) -> u64,
{
    items: I,
    target: u64,
    lookback: usize,
    weigh: W,
    open: VecDeque<Bin<T>>,
}

impl<I, T, W> PackingIter<I, T, W>
where
    I: Iterator<Item = T>,
    W: Fn(&T) -> u64,
{
    pub(crate) fn new(items: I, target: u64, lookback: usize, weigh: W) -> Self {
        Self {
            items,
            target,
            lookback: lookback.max(1),
            weigh,
            open: VecDeque::new(),
        }
    }
}

impl<I, T, W> Iterator for PackingIter<I, T, W>
where
    I: Iterator<Item = T>,
    W: Fn(&T) -> u64,
{
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Self::Item> {
        for item in self.items.by_ref() {
            let weight = (self.weigh)(&item);
            let target = self.target;
            let slot = self
                .open
                .iter_mut()
                .find(|bin| bin.items.is_empty() || bin.weight.saturating_add(weight) <= target);
            match slot {
                Some(bin) => {
                    bin.weight = bin.weight.saturating_add(weight);
                    bin.items.push(item);
                }
                None => {
                    self.open.push_back(Bin {
                        items: vec![item],
                        weight,
                    });
                    if self.open.len() > self.lookback {
                        if let Some(full) = self.open.pop_front() {
                            return Some(full.items);
                        }
                    }
                }
            }
        }
        self.open.pop_front().map(|bin| bin.items)
    }
}
