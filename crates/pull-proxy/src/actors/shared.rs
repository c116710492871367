//! State shared between the proxy actor, its handles and the sink's event
//! handler.

use super::metrics::ProxyStats;
use crate::puller::PullerProbe;
use crate::sink::Sink;
use crate::types::{MediaTuple, ProtocolOption, TranslationInfo};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Read-mostly proxy state. Only the actor writes.
pub struct ProxyShared {
    pub(crate) stats: ProxyStats,
    tuple: MediaTuple,
    option: ProtocolOption,
    url: RwLock<String>,
    translation: RwLock<TranslationInfo>,
    sink: OnceLock<Arc<dyn Sink>>,
    probe: RwLock<Option<Arc<dyn PullerProbe>>>,
}

impl ProxyShared {
    pub(crate) fn new(tuple: MediaTuple, option: ProtocolOption) -> Self {
        Self {
            stats: ProxyStats::new(),
            tuple,
            option,
            url: RwLock::new(String::new()),
            translation: RwLock::new(TranslationInfo::default()),
            sink: OnceLock::new(),
            probe: RwLock::new(None),
        }
    }

    pub fn media_tuple(&self) -> &MediaTuple {
        &self.tuple
    }

    pub fn option(&self) -> &ProtocolOption {
        &self.option
    }

    pub fn url(&self) -> String {
        self.url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_url(&self, url: String) {
        *self.url.write().unwrap_or_else(PoisonError::into_inner) = url;
    }

    pub fn translation_info(&self) -> TranslationInfo {
        self.translation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_translation_info(&self, info: TranslationInfo) {
        *self
            .translation
            .write()
            .unwrap_or_else(PoisonError::into_inner) = info;
    }

    /// Mark the throughput unknown after the session that measured it ended.
    pub(crate) fn reset_byte_speed(&self) {
        self.translation
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .byte_speed = TranslationInfo::default().byte_speed;
    }

    /// The sink, once the first connection has created it.
    pub fn sink(&self) -> Option<&Arc<dyn Sink>> {
        self.sink.get()
    }

    /// Store the sink. Later calls keep the first one.
    pub(crate) fn install_sink(&self, sink: Arc<dyn Sink>) -> &Arc<dyn Sink> {
        self.sink.get_or_init(|| sink)
    }

    pub fn total_reader_count(&self) -> usize {
        self.sink().map_or(0, |sink| sink.reader_count())
    }

    /// Probe of the live puller, `None` while not connected.
    pub fn probe(&self) -> Option<Arc<dyn PullerProbe>> {
        self.probe
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_probe(&self, probe: Option<Arc<dyn PullerProbe>>) {
        *self.probe.write().unwrap_or_else(PoisonError::into_inner) = probe;
    }
}
