//! Memoised container loading.
//!
//! The resolver asks for the same container every time it revisits a
//! package, and an orchestration layer may want to warm the cache for
//! packages it expects the solve to need. Both go through one structure: a
//! single mutex guards the memo map and the set of in-flight prefetches,
//! and a condition variable lets a synchronous `get` wait for a background
//! prefetch of the same id instead of fetching it twice.
//!
//! Failed fetches are memoised exactly like successful ones, so a broken
//! package costs one round-trip no matter how often the search trips over
//! it.

use crate::{
    package::PackageName,
    retrieve::{Container, ContainerProvider},
    util::errors::ErrorKind,
};
use indexmap::{IndexMap, IndexSet};
use slog::{o, trace, Logger};
use std::{
    sync::{Arc, Condvar, Mutex},
    thread,
};

pub struct ContainerCache<P: PackageName> {
    state: Mutex<CacheState<P>>,
    cond: Condvar,
    provider: Box<dyn ContainerProvider<P>>,
    pub logger: Logger,
}

struct CacheState<P> {
    containers: IndexMap<P, Result<Arc<Container<P>>, ErrorKind>>,
    prefetching: IndexSet<P>,
}

impl<P: PackageName> ContainerCache<P> {
    pub fn new(plog: &Logger, provider: Box<dyn ContainerProvider<P>>) -> Self {
        let logger = plog.new(o!("phase" => "retrieve"));
        ContainerCache {
            state: Mutex::new(CacheState {
                containers: IndexMap::new(),
                prefetching: IndexSet::new(),
            }),
            cond: Condvar::new(),
            provider,
            logger,
        }
    }

    /// Returns the container for `id`, fetching it at most once. If a
    /// background prefetch of the same id is in flight, waits for it rather
    /// than fetching again.
    pub fn get(&self, id: &P) -> Result<Arc<Container<P>>, ErrorKind> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(res) = state.containers.get(id) {
                return res.clone();
            }
            if state.prefetching.contains(id) {
                // Spurious wakes are fine; the loop re-checks both maps.
                state = self.cond.wait(state).unwrap();
            } else {
                break;
            }
        }

        trace!(self.logger, "fetching container"; "id" => id.to_string());
        let fetched = self.provider.fetch(id, false).map(Arc::new);
        state.containers.insert(id.clone(), fetched.clone());
        fetched
    }

    /// Kicks off background fetches for ids not already memoised or in
    /// flight. Each result is published under the lock and waiting `get`
    /// calls are woken.
    pub fn prefetch(self: &Arc<Self>, ids: Vec<P>)
    where
        P: Send + Sync + 'static,
    {
        for id in ids {
            {
                let mut state = self.state.lock().unwrap();
                if state.containers.contains_key(&id) || !state.prefetching.insert(id.clone()) {
                    continue;
                }
            }

            trace!(self.logger, "prefetching container"; "id" => id.to_string());
            let cache = Arc::clone(self);
            thread::spawn(move || {
                let fetched = cache.provider.fetch(&id, true).map(Arc::new);
                let mut state = cache.state.lock().unwrap();
                state.prefetching.remove(&id);
                state.containers.insert(id, fetched);
                cache.cond.notify_all();
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Requirement;
    use semver::Version;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        fetches: Arc<AtomicUsize>,
    }

    impl ContainerProvider<&'static str> for CountingProvider {
        fn fetch(
            &self,
            id: &&'static str,
            _skip_update: bool,
        ) -> Result<Container<&'static str>, ErrorKind> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if *id == "missing" {
                Err(ErrorKind::PackageNotFound)
            } else {
                Ok(Container::new(
                    *id,
                    vec![(Version::parse("1.0.0").unwrap(), vec![("dep", Requirement::any())])],
                ))
            }
        }
    }

    fn cache() -> (Arc<ContainerCache<&'static str>>, Arc<AtomicUsize>) {
        let fetches = Arc::new(AtomicUsize::new(0));
        let logger = Logger::root(slog::Discard, o!());
        let cache = Arc::new(ContainerCache::new(
            &logger,
            Box::new(CountingProvider {
                fetches: Arc::clone(&fetches),
            }),
        ));
        (cache, fetches)
    }

    #[test]
    fn get_memoises() {
        let (cache, fetches) = cache();
        let a = cache.get(&"pkg").unwrap();
        let b = cache.get(&"pkg").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn errors_memoise_too() {
        let (cache, fetches) = cache();
        assert_eq!(cache.get(&"missing"), Err(ErrorKind::PackageNotFound));
        assert_eq!(cache.get(&"missing"), Err(ErrorKind::PackageNotFound));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn prefetch_feeds_get() {
        let (cache, fetches) = cache();
        cache.prefetch(vec!["pkg", "missing"]);
        assert!(cache.get(&"pkg").is_ok());
        assert_eq!(cache.get(&"missing"), Err(ErrorKind::PackageNotFound));
        // Whichever side won the race, nothing was fetched twice.
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
