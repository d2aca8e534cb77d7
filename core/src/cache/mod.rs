use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    index::{Chunk, GeoIndex},
    model::BoundingBox,
    remote::{FetchError, RemoteLoader},
    source::{BuildError, ElementSource, SourceBuilder},
};

pub use self::slot::CacheKey;
use self::slot::{release, Slot};

mod slot;

/// Errors raised while resolving an element source. The cache keeps its
/// previous state whenever one of these is returned.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("unable to fetch remote data")]
    RemoteFetch(#[from] FetchError),

    #[error("unable to build element source")]
    Build(#[from] BuildError),
}

/// How a source for a cache key is obtained
enum Plan<'a> {
    Local(&'a Chunk),
    Remote(&'a RemoteLoader),
}

/// Resolves query boxes to element sources and caches the most recently
/// resolved one.
///
/// The index decides which local chunk covers a query. If none does and a
/// [`RemoteLoader`] is configured, data for the query box is fetched and an
/// in-memory source is built from it. Only one source is held at a time;
/// installing a new one releases the old one.
///
/// Loading happens outside the cache's lock, so a slow load does not block
/// callers whose sources are already cached. Only the final swap is
/// serialized.
pub struct SourceCache {
    index: GeoIndex,
    builder: Arc<dyn SourceBuilder>,
    remote: Option<RemoteLoader>,
    slot: Mutex<Slot>,
}

impl SourceCache {
    pub fn new(index: GeoIndex, builder: Arc<dyn SourceBuilder>) -> Self {
        Self {
            index,
            builder,
            remote: None,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Enables fetching data for queries not covered by any local chunk
    pub fn with_remote(mut self, remote: RemoteLoader) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn index(&self) -> &GeoIndex {
        &self.index
    }

    /// Returns an element source covering `query`, loading or fetching it if
    /// the cached one does not. Blocks until loading has finished.
    ///
    /// Returns `Ok(None)` if no local chunk covers the query and no remote
    /// endpoint is configured. If loading, fetching, or building fails, the
    /// error is returned and the previously cached source stays active.
    pub fn resolve(
        &self,
        query: &BoundingBox,
    ) -> Result<Option<Arc<dyn ElementSource>>, ResolveError> {
        let (key, plan) = match (self.index.query(query), &self.remote) {
            (Some(chunk), _) => (
                CacheKey::Chunk(chunk.locator().to_path_buf()),
                Plan::Local(chunk),
            ),
            (None, Some(remote)) => (CacheKey::Remote(*query), Plan::Remote(remote)),
            (None, None) => {
                debug!(%query, "no element source covers the query");
                return Ok(None);
            }
        };

        let cached = self.slot.lock().get(&key);
        if let Some(source) = cached {
            debug!(%query, id = %source.id(), "using cached element source");
            return Ok(Some(source));
        }

        let source = match plan {
            Plan::Local(chunk) => {
                info!(%query, chunk = %chunk.locator().display(), "loading element source");
                self.builder.load(chunk)?
            }
            Plan::Remote(remote) => {
                let bytes = remote.fetch(query)?;
                self.builder.build(remote.format(), &bytes)?
            }
        };

        Ok(Some(self.install(key, source)))
    }

    /// Swaps `source` into the slot. Whatever leaves the slot is released
    /// after the lock has been dropped.
    fn install(&self, key: CacheKey, source: Arc<dyn ElementSource>) -> Arc<dyn ElementSource> {
        let (active, displaced) = {
            let mut slot = self.slot.lock();
            match slot.get(&key) {
                // another caller cached a source for this key while we were loading
                Some(existing) => {
                    debug!(?key, duplicate = %source.id(), "discarding duplicate element source");
                    (existing, Some(source))
                }
                None => {
                    let old = slot.replace(key, Arc::clone(&source));
                    (source, old)
                }
            }
        };
        release(displaced);
        active
    }

    /// Returns the currently cached source without loading anything
    pub fn active(&self) -> Option<Arc<dyn ElementSource>> {
        self.slot.lock().active()
    }

    /// Releases the cached source, if any
    pub fn dispose(&self) {
        let old = self.slot.lock().take();
        release(old);
    }
}

impl Drop for SourceCache {
    fn drop(&mut self) {
        release(self.slot.get_mut().take());
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Arc, Weak,
        },
        thread::{sleep, spawn},
        time::Duration,
    };

    use assertor::{assert_that, EqualityAssertion};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use ulid::Ulid;

    use crate::{
        index::{Chunk, GeoIndex},
        model::{BoundingBox, Relation},
        remote::{tests::StaticFetcher, RemoteLoader},
        source::{BuildError, ElementSource, SourceBuilder, SourceError, SourceStats},
    };

    use super::{ResolveError, SourceCache};

    struct TestSource {
        id: Ulid,
        release_calls: AtomicUsize,

        /// Cache whose lock is inspected when the source is released
        cache: Weak<SourceCache>,
        released_under_lock: AtomicBool,
    }

    impl ElementSource for TestSource {
        fn id(&self) -> Ulid {
            self.id
        }

        fn coverage(&self) -> Option<BoundingBox> {
            None
        }

        fn relations(&self, _query: &BoundingBox) -> Result<Vec<Relation>, SourceError> {
            Ok(Vec::new())
        }

        fn relations_by_tag(&self, _key: &str, _value: &str) -> Result<Vec<Relation>, SourceError> {
            Ok(Vec::new())
        }

        fn stats(&self) -> Result<SourceStats, SourceError> {
            Ok(SourceStats::default())
        }

        fn release(&self) {
            self.release_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(cache) = self.cache.upgrade() {
                if cache.slot.try_lock().is_none() {
                    self.released_under_lock.store(true, Ordering::SeqCst);
                }
            }
        }

        fn is_released(&self) -> bool {
            self.release_calls.load(Ordering::SeqCst) > 0
        }
    }

    /// Creates [`TestSource`]s and counts how often it was asked to
    #[derive(Default)]
    struct CountingBuilder {
        loads: AtomicUsize,
        builds: AtomicUsize,
        fail: AtomicBool,
        delay: Option<Duration>,
        created: Mutex<Vec<Arc<TestSource>>>,
        cache: Mutex<Weak<SourceCache>>,
    }

    impl CountingBuilder {
        fn make(&self) -> Result<Arc<dyn ElementSource>, BuildError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BuildError::UnsupportedFormat("test".to_string()));
            }
            if let Some(delay) = self.delay {
                sleep(delay);
            }
            let source = Arc::new(TestSource {
                id: Ulid::new(),
                release_calls: AtomicUsize::new(0),
                cache: self.cache.lock().clone(),
                released_under_lock: AtomicBool::new(false),
            });
            self.created.lock().push(Arc::clone(&source));
            Ok(source)
        }

        fn release_calls(&self, i: usize) -> usize {
            self.created.lock()[i].release_calls.load(Ordering::SeqCst)
        }
    }

    impl SourceBuilder for CountingBuilder {
        fn load(&self, _chunk: &Chunk) -> Result<Arc<dyn ElementSource>, BuildError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.make()
        }

        fn build(&self, _format: &str, _bytes: &[u8]) -> Result<Arc<dyn ElementSource>, BuildError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            self.make()
        }
    }

    fn q1() -> BoundingBox {
        BoundingBox::from_bounds(13.4, 52.5, 13.5, 52.6)
    }

    fn q2() -> BoundingBox {
        BoundingBox::from_bounds(37.5, 55.5, 37.6, 55.6)
    }

    fn remote_query() -> BoundingBox {
        BoundingBox::from_bounds(2.3, 48.8, 2.4, 48.9)
    }

    fn make_index() -> GeoIndex {
        GeoIndex::bulk_load(vec![
            Chunk::new("maps/berlin", BoundingBox::from_bounds(13.0, 52.0, 14.0, 53.0)),
            Chunk::new("maps/moscow", BoundingBox::from_bounds(37.0, 55.0, 38.0, 56.0)),
        ])
    }

    fn make_cache(builder: &Arc<CountingBuilder>) -> SourceCache {
        SourceCache::new(make_index(), Arc::clone(builder) as Arc<dyn SourceBuilder>)
    }

    fn make_remote(fetcher: &StaticFetcher) -> RemoteLoader {
        RemoteLoader::new(
            "http://example.com/map?bbox=",
            "{0},{1},{2},{3}".parse().unwrap(),
            "xml",
            Box::new(fetcher.clone()),
        )
    }

    #[test]
    fn resolve_is_idempotent() {
        let builder = Arc::new(CountingBuilder::default());
        let cache = make_cache(&builder);

        let first = cache.resolve(&q1()).unwrap().unwrap();
        let second = cache.resolve(&q1()).unwrap().unwrap();

        assert_eq!(builder.loads.load(Ordering::SeqCst), 1);
        assert_eq!(first.id(), second.id());
        assert!(!first.is_released());
    }

    #[test]
    fn resolve_within_same_chunk_does_not_reload() {
        let builder = Arc::new(CountingBuilder::default());
        let cache = make_cache(&builder);

        let first = cache.resolve(&q1()).unwrap().unwrap();
        let second = cache
            .resolve(&BoundingBox::from_bounds(13.1, 52.1, 13.2, 52.2))
            .unwrap()
            .unwrap();

        assert_eq!(builder.loads.load(Ordering::SeqCst), 1);
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn resolve_other_chunk_releases_previous_once() {
        let builder = Arc::new(CountingBuilder::default());
        let cache = make_cache(&builder);

        let first = cache.resolve(&q1()).unwrap().unwrap();
        let second = cache.resolve(&q2()).unwrap().unwrap();

        assert_eq!(builder.loads.load(Ordering::SeqCst), 2);
        assert_ne!(first.id(), second.id());
        assert_eq!(builder.release_calls(0), 1);
        assert_eq!(builder.release_calls(1), 0);
        assert_that!(cache.active().map(|s| s.id())).is_equal_to(Some(second.id()));

        // going back loads the first chunk again
        let third = cache.resolve(&q1()).unwrap().unwrap();
        assert_eq!(builder.loads.load(Ordering::SeqCst), 3);
        assert_eq!(builder.release_calls(0), 1);
        assert_eq!(builder.release_calls(1), 1);
        assert!(!third.is_released());
    }

    #[test]
    fn miss_without_remote_is_empty() {
        let builder = Arc::new(CountingBuilder::default());
        let cache = make_cache(&builder);

        assert!(cache.resolve(&remote_query()).unwrap().is_none());
        assert!(cache.active().is_none());
        assert_eq!(builder.loads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn miss_keeps_active_source() {
        let builder = Arc::new(CountingBuilder::default());
        let cache = make_cache(&builder);

        let first = cache.resolve(&q1()).unwrap().unwrap();
        assert!(cache.resolve(&remote_query()).unwrap().is_none());
        assert_that!(cache.active().map(|s| s.id())).is_equal_to(Some(first.id()));
        assert!(!first.is_released());
    }

    #[test]
    fn remote_fallback() {
        let builder = Arc::new(CountingBuilder::default());
        let fetcher = StaticFetcher::answering(b"<osm/>");
        let cache = make_cache(&builder).with_remote(make_remote(&fetcher));

        let first = cache.resolve(&remote_query()).unwrap().unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(builder.builds.load(Ordering::SeqCst), 1);
        assert_eq!(
            fetcher.urls.lock().clone(),
            vec!["http://example.com/map?bbox=2.3%2C48.8%2C2.4%2C48.9".to_string()]
        );

        // the same box and boxes inside it are answered from the cache
        let second = cache.resolve(&remote_query()).unwrap().unwrap();
        let inner = cache
            .resolve(&BoundingBox::from_bounds(2.33, 48.83, 2.36, 48.86))
            .unwrap()
            .unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.id(), second.id());
        assert_eq!(first.id(), inner.id());

        // local chunks still take precedence
        let local = cache.resolve(&q1()).unwrap().unwrap();
        assert_eq!(builder.loads.load(Ordering::SeqCst), 1);
        assert_ne!(local.id(), first.id());
        assert_eq!(builder.release_calls(0), 1);
    }

    #[test]
    fn remote_failure_keeps_cache() {
        let builder = Arc::new(CountingBuilder::default());
        let fetcher = StaticFetcher::default();
        let cache = make_cache(&builder).with_remote(make_remote(&fetcher));

        let first = cache.resolve(&q1()).unwrap().unwrap();
        let result = cache.resolve(&remote_query());
        assert!(matches!(result, Err(ResolveError::RemoteFetch(_))));

        assert_that!(cache.active().map(|s| s.id())).is_equal_to(Some(first.id()));
        assert!(!first.is_released());
        assert_eq!(builder.builds.load(Ordering::SeqCst), 0);

        // recovers once the endpoint answers again
        fetcher.set_body(Some(b"<osm/>"));
        let second = cache.resolve(&remote_query()).unwrap().unwrap();
        assert_ne!(first.id(), second.id());
        assert!(first.is_released());
    }

    #[test]
    fn build_failure_keeps_cache() {
        let builder = Arc::new(CountingBuilder::default());
        let cache = make_cache(&builder);

        let first = cache.resolve(&q1()).unwrap().unwrap();
        builder.fail.store(true, Ordering::SeqCst);
        let result = cache.resolve(&q2());
        assert!(matches!(result, Err(ResolveError::Build(_))));

        assert_that!(cache.active().map(|s| s.id())).is_equal_to(Some(first.id()));
        assert!(!first.is_released());

        // a failed load is retried on the next call
        builder.fail.store(false, Ordering::SeqCst);
        assert!(cache.resolve(&q2()).is_ok());
        assert_eq!(builder.loads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn remote_build_failure_keeps_cache() {
        let builder = Arc::new(CountingBuilder::default());
        let fetcher = StaticFetcher::answering(b"<osm/>");
        let cache = make_cache(&builder).with_remote(make_remote(&fetcher));

        let first = cache.resolve(&q1()).unwrap().unwrap();
        builder.fail.store(true, Ordering::SeqCst);
        let result = cache.resolve(&remote_query());
        assert!(matches!(result, Err(ResolveError::Build(_))));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(builder.builds.load(Ordering::SeqCst), 1);

        assert_that!(cache.active().map(|s| s.id())).is_equal_to(Some(first.id()));
        assert!(!first.is_released());
        assert_eq!(builder.release_calls(0), 0);
    }

    #[test]
    fn release_happens_outside_the_lock() {
        let builder = Arc::new(CountingBuilder::default());
        let cache = Arc::new(make_cache(&builder));
        *builder.cache.lock() = Arc::downgrade(&cache);

        cache.resolve(&q1()).unwrap().unwrap();
        cache.resolve(&q2()).unwrap().unwrap();
        cache.dispose();

        let created = builder.created.lock();
        assert_eq!(created.len(), 2);
        for source in created.iter() {
            assert_eq!(source.release_calls.load(Ordering::SeqCst), 1);
            assert!(!source.released_under_lock.load(Ordering::SeqCst));
        }
    }

    #[test]
    fn dispose_releases_once() {
        let builder = Arc::new(CountingBuilder::default());
        let cache = make_cache(&builder);

        let first = cache.resolve(&q1()).unwrap().unwrap();
        cache.dispose();
        cache.dispose();
        assert!(cache.active().is_none());
        assert!(first.is_released());
        assert_eq!(builder.release_calls(0), 1);

        drop(cache);
        assert_eq!(builder.release_calls(0), 1);
    }

    #[test]
    fn drop_releases_active_source() {
        let builder = Arc::new(CountingBuilder::default());
        let cache = make_cache(&builder);

        let first = cache.resolve(&q1()).unwrap().unwrap();
        drop(cache);
        assert!(first.is_released());
        assert_eq!(builder.release_calls(0), 1);
    }

    #[test]
    fn concurrent_resolve_installs_one_source() {
        let builder = Arc::new(CountingBuilder {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let cache = Arc::new(make_cache(&builder));

        let threads = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                spawn(move || cache.resolve(&q1()).unwrap().unwrap().id())
            })
            .collect::<Vec<_>>();
        let ids = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .collect::<Vec<_>>();

        // everybody gets the installed source
        let active = cache.active().unwrap().id();
        assert!(ids.iter().all(|id| *id == active));

        // duplicates loaded in parallel have been released exactly once
        let created = builder.created.lock();
        assert_eq!(created.len(), builder.loads.load(Ordering::SeqCst));
        for source in created.iter() {
            let expected = if source.id == active { 0 } else { 1 };
            assert_eq!(source.release_calls.load(Ordering::SeqCst), expected);
        }
    }
}
