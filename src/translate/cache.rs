//! LRU cache in front of a translator

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use super::{TranslationError, Translator};

/// Remembers successful translations
///
/// Detectors see the same handful of labels every frame, so nearly every
/// lookup after warm-up is a hit. Failures are not cached.
pub struct CachedTranslator {
    inner: Arc<dyn Translator>,
    cache: Mutex<LruCache<String, String>>,
}

impl CachedTranslator {
    #[must_use]
    pub fn new(inner: Arc<dyn Translator>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl Translator for CachedTranslator {
    fn translate(&self, text: &str) -> Result<String, TranslationError> {
        if let Some(hit) = self.cache.lock().ok().and_then(|mut c| c.get(text).cloned()) {
            return Ok(hit);
        }

        let translated = self.inner.translate(text)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(text.to_string(), translated.clone());
        }
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl Translator for Counting {
        fn translate(&self, text: &str) -> Result<String, TranslationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TranslationError::Request("offline".to_string()))
            } else {
                Ok(text.to_uppercase())
            }
        }
    }

    #[test]
    fn repeated_labels_hit_cache() {
        let inner = Arc::new(Counting::default());
        let cached = CachedTranslator::new(inner.clone(), 4);

        assert_eq!(cached.translate("cat").unwrap(), "CAT");
        assert_eq!(cached.translate("cat").unwrap(), "CAT");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failures_are_retried() {
        let inner = Arc::new(Counting {
            fail: true,
            ..Counting::default()
        });
        let cached = CachedTranslator::new(inner.clone(), 4);

        assert!(cached.translate("cat").is_err());
        assert!(cached.translate("cat").is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
