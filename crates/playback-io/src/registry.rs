// crates/playback-io/src/registry.rs
//
// Extension -> plugin dispatch (case-insensitive, first-registered wins),
// plus a small LRU of live Readers keyed by the Path's string form so
// repeated `info()`/`readVideo` calls for the same file reuse one open
// handle (spec §4.D).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use playback_core::path::Path;
use playback_core::EngineError;

use crate::options::Options;
use crate::traits::{Reader, ReadPlugin, Writer, WritePlugin};

const DEFAULT_READER_LRU_SIZE: usize = 32;

struct LruEntry {
    key: String,
    reader: Arc<dyn Reader>,
}

struct Inner {
    readers: VecDeque<LruEntry>,
    capacity: usize,
}

/// `extension -> plugin` dispatch plus the live-reader cache. Bounded by a
/// small count (order of tens, default 32) because readers are heavy —
/// each holds an open file handle and, for FFmpeg, a decode context.
pub struct IORegistry {
    read_plugins: Vec<Box<dyn ReadPlugin>>,
    write_plugins: Vec<Box<dyn WritePlugin>>,
    lru: Mutex<Inner>,
}

impl IORegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_READER_LRU_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            read_plugins: Vec::new(),
            write_plugins: Vec::new(),
            lru: Mutex::new(Inner { readers: VecDeque::new(), capacity }),
        }
    }

    pub fn register_read_plugin(&mut self, plugin: Box<dyn ReadPlugin>) {
        self.read_plugins.push(plugin);
    }

    pub fn register_write_plugin(&mut self, plugin: Box<dyn WritePlugin>) {
        self.write_plugins.push(plugin);
    }

    fn find_read_plugin(&self, ext: &str) -> Option<&dyn ReadPlugin> {
        let ext = ext.to_ascii_lowercase();
        self.read_plugins
            .iter()
            .find(|p| p.extensions().iter().any(|e| e.eq_ignore_ascii_case(&ext)))
            .map(|b| b.as_ref())
    }

    fn find_write_plugin(&self, ext: &str) -> Option<&dyn WritePlugin> {
        let ext = ext.to_ascii_lowercase();
        self.write_plugins
            .iter()
            .find(|p| p.extensions().iter().any(|e| e.eq_ignore_ascii_case(&ext)))
            .map(|b| b.as_ref())
    }

    pub fn read(&self, path: &Path, options: &Options) -> Result<Arc<dyn Reader>, EngineError> {
        let key = path.get(None, true);
        {
            let mut inner = self.lru.lock().unwrap();
            if let Some(pos) = inner.readers.iter().position(|e| e.key == key) {
                let entry = inner.readers.remove(pos).unwrap();
                let reader = entry.reader.clone();
                inner.readers.push_back(LruEntry { key: key.clone(), reader: reader.clone() });
                return Ok(reader);
            }
        }
        let ext = path.extension.trim_start_matches('.');
        let plugin = self
            .find_read_plugin(ext)
            .ok_or_else(|| EngineError::UnknownFormat { extension: ext.to_string() })?;
        let reader = plugin.open(path, options)?;

        let mut inner = self.lru.lock().unwrap();
        if inner.readers.len() >= inner.capacity {
            if let Some(evicted) = inner.readers.pop_front() {
                evicted.reader.cancel();
            }
        }
        inner.readers.push_back(LruEntry { key, reader: reader.clone() });
        Ok(reader)
    }

    pub fn write(
        &self,
        path: &Path,
        info: &playback_core::media_info::MediaInfo,
        options: &Options,
    ) -> Result<Box<dyn Writer>, EngineError> {
        let ext = path.extension.trim_start_matches('.');
        let plugin = self
            .find_write_plugin(ext)
            .ok_or_else(|| EngineError::UnknownFormat { extension: ext.to_string() })?;
        plugin.create(path, info, options)
    }

    pub fn reader_count(&self) -> usize {
        self.lru.lock().unwrap().readers.len()
    }
}

impl Default for IORegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppm::PpmReadPlugin;
    use playback_core::path::PathOptions;

    #[test]
    fn unknown_extension_is_unknown_format() {
        let mut registry = IORegistry::new();
        registry.register_read_plugin(Box::new(PpmReadPlugin));
        let path = Path::new("/tmp/clip.mysteryext", &PathOptions::default());
        let err = registry.read(&path, &Options::new()).unwrap_err();
        assert!(matches!(err, EngineError::UnknownFormat { .. }));
    }

    #[test]
    fn first_registered_plugin_wins_on_duplicate_extension() {
        let mut registry = IORegistry::new();
        registry.register_read_plugin(Box::new(PpmReadPlugin));
        registry.register_read_plugin(Box::new(PpmReadPlugin));
        // Both handle ".ppm"; this only asserts the lookup doesn't panic
        // and resolves to *a* plugin instance, not specifically which.
        let path = Path::new("/tmp/nonexistent.ppm", &PathOptions::default());
        let _ = registry.read(&path, &Options::new());
    }
}
