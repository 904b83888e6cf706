//! Progress notification for transformation runs.

/// How often `processed` fires while a run is in progress.
pub const PROCESSED_INTERVAL: usize = 1000;

/// Observes a run. Callbacks never influence the records produced.
pub trait Notifier {
    fn started(&mut self) {}

    /// Called with the running count of emitted records.
    fn processed(&mut self, _count: usize) {}

    fn finished(&mut self) {}
}

/// Drives an optional notifier from a run iterator.
pub(crate) struct Progress<'a> {
    notifier: Option<Box<dyn Notifier + 'a>>,
    count: usize,
    reported: usize,
    started: bool,
    finished: bool,
}

impl<'a> Progress<'a> {
    pub(crate) fn new() -> Self {
        Self {
            notifier: None,
            count: 0,
            reported: 0,
            started: false,
            finished: false,
        }
    }

    pub(crate) fn attach(&mut self, notifier: Box<dyn Notifier + 'a>) {
        self.notifier = Some(notifier);
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    pub(crate) fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.started();
        }
    }

    pub(crate) fn record(&mut self) {
        self.count += 1;
        if self.count.is_multiple_of(PROCESSED_INTERVAL) {
            self.report();
        }
    }

    pub(crate) fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.start();
        self.finished = true;
        if self.reported != self.count || self.count == 0 {
            self.report();
        }
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.finished();
        }
    }

    /// Ends a failed run. The notifier hears nothing further.
    pub(crate) fn abandon(&mut self) {
        self.finished = true;
    }

    fn report(&mut self) {
        self.reported = self.count;
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.processed(self.count);
        }
    }
}

impl std::fmt::Debug for Progress<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("count", &self.count)
            .field("started", &self.started)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Notifier for Recorder {
        fn started(&mut self) {
            self.0.borrow_mut().push("started".to_string());
        }

        fn processed(&mut self, count: usize) {
            self.0.borrow_mut().push(format!("processed {count}"));
        }

        fn finished(&mut self) {
            self.0.borrow_mut().push("finished".to_string());
        }
    }

    #[test]
    fn processed_fires_per_interval_and_at_end() {
        let recorder = Recorder::default();
        let mut progress = Progress::new();
        progress.attach(Box::new(recorder.clone()));
        progress.start();
        for _ in 0..2500 {
            progress.record();
        }
        progress.finish();
        progress.finish();
        assert_eq!(
            *recorder.0.borrow(),
            vec![
                "started",
                "processed 1000",
                "processed 2000",
                "processed 2500",
                "finished"
            ]
        );
    }

    #[test]
    fn exact_interval_is_not_reported_twice() {
        let recorder = Recorder::default();
        let mut progress = Progress::new();
        progress.attach(Box::new(recorder.clone()));
        progress.start();
        for _ in 0..1000 {
            progress.record();
        }
        progress.finish();
        assert_eq!(
            *recorder.0.borrow(),
            vec!["started", "processed 1000", "finished"]
        );
    }
}
