//! Mock sink that records what the proxy feeds it.

use pull_proxy::sink::{MediaSourceEvent, Sink, SinkFactory};
use pull_proxy::types::{MediaTuple, ProtocolOption, TrackInfo};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock sink factory. Clones share state.
#[derive(Clone, Default)]
pub struct MockSinkFactory {
    created: Arc<AtomicUsize>,
    sink: Arc<Mutex<Option<Arc<MockSink>>>>,
    initial_readers: usize,
}

impl MockSinkFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sinks created by this factory start with `readers` subscribers.
    #[must_use]
    pub fn with_readers(mut self, readers: usize) -> Self {
        self.initial_readers = readers;
        self
    }

    /// Number of sinks created.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// The most recently created sink.
    #[must_use]
    pub fn sink(&self) -> Option<Arc<MockSink>> {
        self.sink.lock().unwrap().clone()
    }
}

impl SinkFactory for MockSinkFactory {
    fn create(
        &self,
        tuple: &MediaTuple,
        _option: &ProtocolOption,
        events: Arc<dyn MediaSourceEvent>,
    ) -> Arc<dyn Sink> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let sink = Arc::new(MockSink {
            tuple: tuple.clone(),
            events,
            bindings: Mutex::new(Vec::new()),
            readers: AtomicUsize::new(self.initial_readers),
            detached: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        });
        *self.sink.lock().unwrap() = Some(Arc::clone(&sink));
        sink
    }
}

/// Sink that records bindings and exposes the injected event handler.
pub struct MockSink {
    tuple: MediaTuple,
    events: Arc<dyn MediaSourceEvent>,
    bindings: Mutex<Vec<Vec<TrackInfo>>>,
    readers: AtomicUsize,
    detached: AtomicUsize,
    shut_down: AtomicBool,
}

impl MockSink {
    /// Every `bind` call, in order.
    #[must_use]
    pub fn bindings(&self) -> Vec<Vec<TrackInfo>> {
        self.bindings.lock().unwrap().clone()
    }

    #[must_use]
    pub fn bind_count(&self) -> usize {
        self.bindings.lock().unwrap().len()
    }

    #[must_use]
    pub fn detach_count(&self) -> usize {
        self.detached.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn set_reader_count(&self, readers: usize) {
        self.readers.store(readers, Ordering::SeqCst);
    }

    /// The handler the proxy injected at creation.
    #[must_use]
    pub fn events(&self) -> Arc<dyn MediaSourceEvent> {
        Arc::clone(&self.events)
    }

    /// Ask the proxy to stop, as a real sink would when its last reader
    /// leaves.
    pub fn request_close(&self) -> bool {
        self.events.close(&self.tuple)
    }
}

impl Sink for MockSink {
    fn bind(&self, tracks: &[TrackInfo]) {
        self.bindings.lock().unwrap().push(tracks.to_vec());
    }

    fn reader_count(&self) -> usize {
        self.readers.load(Ordering::SeqCst)
    }

    fn detach(&self) {
        self.detached.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
