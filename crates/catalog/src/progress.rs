/// Receives periodic `(count, label)` updates from long-running passes.
pub trait ProgressSink {
    fn tick(&self, count: usize, label: &str);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn tick(&self, _count: usize, _label: &str) {}
}

impl<F> ProgressSink for F
where
    F: Fn(usize, &str),
{
    fn tick(&self, count: usize, label: &str) {
        self(count, label)
    }
}

/// Counts items and forwards every `every`-th one to a sink.
pub(crate) struct Ticker<'a> {
    sink: &'a dyn ProgressSink,
    every: usize,
    count: usize,
}

impl<'a> Ticker<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, every: usize) -> Self {
        Self {
            sink,
            every: every.max(1),
            count: 0,
        }
    }

    pub(crate) fn bump(&mut self, label: &str) {
        self.count += 1;
        if self.count % self.every == 0 {
            self.sink.tick(self.count, label);
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn finish(&self, label: &str) {
        self.sink.tick(self.count, label);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn ticks_every_interval_and_on_finish() {
        let seen = RefCell::new(Vec::new());
        let sink = |count: usize, _label: &str| seen.borrow_mut().push(count);
        let mut ticker = Ticker::new(&sink, 3);
        for _ in 0..7 {
            ticker.bump("x");
        }
        ticker.finish("done");
        assert_eq!(*seen.borrow(), vec![3, 6, 7]);
        assert_eq!(ticker.count(), 7);
    }
}
