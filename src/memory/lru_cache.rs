#[cfg(test)]
use mock_instant::thread_local::Instant;
#[cfg(not(test))]
use std::time::Instant;

use std::time::Duration;

use linked_hash_map::LinkedHashMap;

use crate::config::MemorySettings;
use crate::fmt::format_size;

/// Computes the representation of a value which is used to determine its size.
pub type Serializer<V> = Box<dyn Fn(&V) -> String + Send + Sync>;

/// Represents an entry stored in a [MemoryCache].
#[derive(Debug)]
pub struct MemoryEntry<V> {
    value: V,
    tags: Vec<String>,
    size: usize,
    last_modified: Instant,
    expires_at: Instant,
}

impl<V> MemoryEntry<V> {
    /// Returns the cached value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the tags which were given when storing the value.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the size in bytes which is accounted for this entry.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the point in time when the value was stored.
    ///
    /// This is a monotonic **Instant** rather than a wall clock timestamp. Therefore it cannot
    /// be compared against the `SystemTime` of a
    /// [PersistentEntry](crate::persistent::PersistentEntry).
    pub fn last_modified(&self) -> Instant {
        self.last_modified
    }

    /// Returns the point in time after which the value is no longer returned by **get**.
    ///
    /// Just like **last_modified** this is a monotonic **Instant**.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

/// Provides a size constrained LRU cache with tag based invalidation.
///
/// The size of each value is determined by serializing it into a string (using the serializer
/// given when creating the cache) and counting its UTF-8 bytes. Once the total size of all
/// entries exceeds **max_size**, the least recently used entries are evicted. Values which are
/// larger than the whole cache are silently ignored.
///
/// Each entry expires after the configured **ttl**. Note that expired entries are not removed
/// actively. They are no longer returned by **get**, but still occupy memory until they are
/// either replaced or evicted.
///
/// Lookups return a shared reference to the stored entry, therefore **get** and **has** take
/// `&mut self` as they update the recency order.
///
/// # Examples
/// ```
/// # use tiercache::memory::MemoryCache;
/// # use std::time::Duration;
///
/// // Specifies a cache which can store up to 10 bytes for one minute...
/// let mut cache = MemoryCache::new(10, Duration::from_secs(60), String::clone);
///
/// cache.set("Foo", "Bar".to_owned(), &["bars"]);
/// assert_eq!(cache.get("Foo").unwrap().value(), "Bar");
///
/// // This will still fit...
/// cache.set("Foo1", "X".repeat(7), &[]);
/// assert_eq!(cache.get("Foo").is_some(), true);
///
/// // ..but this will throw out the least recently used entry..
/// cache.set("Foo2", "Y".repeat(3), &[]);
/// assert_eq!(cache.get("Foo").is_some(), true);
/// assert_eq!(cache.get("Foo1").is_some(), false);
///
/// // Revalidating a tag removes all entries carrying it...
/// cache.revalidate_tags(&["bars"]);
/// assert_eq!(cache.has("Foo"), false);
/// assert_eq!(cache.has("Foo2"), true);
///```
pub struct MemoryCache<V> {
    total_size: usize,
    max_size: usize,
    ttl: Duration,
    debug: bool,
    serializer: Serializer<V>,
    reads: usize,
    hits: usize,
    writes: usize,
    map: LinkedHashMap<String, MemoryEntry<V>>,
}

impl<V> MemoryCache<V> {
    /// Creates a new cache which keeps up to **max_size** bytes for **ttl** each.
    ///
    /// The given **serializer** is only used to compute the size of each value.
    pub fn new<S>(max_size: usize, ttl: Duration, serializer: S) -> Self
    where
        S: Fn(&V) -> String + Send + Sync + 'static,
    {
        MemoryCache {
            total_size: 0,
            max_size,
            ttl,
            debug: false,
            serializer: Box::new(serializer),
            reads: 0,
            hits: 0,
            writes: 0,
            map: LinkedHashMap::new(),
        }
    }

    /// Creates a new cache based on the given settings.
    pub fn from_settings<S>(settings: &MemorySettings, serializer: S) -> Self
    where
        S: Fn(&V) -> String + Send + Sync + 'static,
    {
        let mut cache = MemoryCache::new(settings.max_size, settings.ttl, serializer);
        cache.debug = settings.debug;

        cache
    }

    /// Stores the given value along with its tags.
    ///
    /// If the value is larger than **max_size**, it is silently discarded. An entry already
    /// present for this key is kept in this case.
    ///
    /// # Examples
    /// ```
    /// # use tiercache::memory::MemoryCache;
    /// # use std::time::Duration;
    /// let mut cache = MemoryCache::new(4, Duration::from_secs(60), String::clone);
    ///
    /// cache.set("Foo", "Bar".to_owned(), &[]);
    /// assert_eq!(cache.total_size(), 3);
    ///
    /// // Replacing an entry corrects the total size...
    /// cache.set("Foo", "Ba".to_owned(), &[]);
    /// assert_eq!(cache.total_size(), 2);
    ///
    /// // Values larger than the whole cache are ignored...
    /// cache.set("Foo", "Too large".to_owned(), &[]);
    /// assert_eq!(cache.get("Foo").unwrap().value(), "Ba");
    /// ```
    pub fn set(&mut self, key: &str, value: V, tags: &[&str]) {
        let size = (self.serializer)(&value).len();
        if size > self.max_size {
            if self.debug {
                log::debug!(
                    "Memory cache: Not storing {} as its size ({}) exceeds the cache size ({}).",
                    key,
                    format_size(size),
                    format_size(self.max_size)
                );
            }
            return;
        }

        let now = Instant::now();
        let entry = MemoryEntry {
            value,
            tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
            size,
            last_modified: now,
            expires_at: now + self.ttl,
        };

        self.writes += 1;
        self.total_size += size;
        if let Some(previous) = self.map.insert(key.to_owned(), entry) {
            self.total_size -= previous.size;
        }

        self.enforce_constraints();
    }

    fn enforce_constraints(&mut self) {
        while self.total_size > self.max_size {
            match self.map.pop_front() {
                Some((key, entry)) => {
                    self.total_size -= entry.size;
                    if self.debug {
                        log::debug!("Memory cache: Evicted {}.", key);
                    }
                }
                None => break,
            }
        }
    }

    /// Returns the entry stored for the given key or **None** if there is no entry or if it
    /// has expired.
    ///
    /// A successful lookup marks the entry as most recently used. Note that this doesn't
    /// extend its lifetime.
    pub fn get(&mut self, key: &str) -> Option<&MemoryEntry<V>> {
        self.reads += 1;

        let now = Instant::now();
        let alive = matches!(self.map.get(key), Some(entry) if entry.expires_at > now);
        if !alive {
            if self.debug {
                log::debug!("Memory cache SKIP: {}", key);
            }
            return None;
        }

        self.hits += 1;
        if self.debug {
            log::debug!("Memory cache HIT: {}", key);
        }

        self.map.get_refresh(key).map(|entry| &*entry)
    }

    /// Determines if an entry is present for the given key.
    ///
    /// Just like **get** this marks the entry as most recently used. However, this will also
    /// report entries which have already expired but are not yet evicted.
    pub fn has(&mut self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }

        self.map.get_refresh(key).is_some()
    }

    /// Removes all entries which carry at least one of the given tags.
    pub fn revalidate_tags(&mut self, tags: &[&str]) {
        let stale_keys: Vec<String> = self
            .map
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|tag| tags.contains(&tag.as_str())))
            .map(|(key, _)| key.clone())
            .collect();

        for key in stale_keys {
            if let Some(entry) = self.map.remove(&key) {
                self.total_size -= entry.size;
            }
        }

        if self.debug {
            log::debug!("Memory cache revalidated tags: {}", tags.join(", "));
        }
    }

    /// Removes the entry for the given key if present.
    pub fn remove(&mut self, key: &str) {
        self.writes += 1;

        if let Some(entry) = self.map.remove(key) {
            self.total_size -= entry.size;
        }
    }

    /// Removes all entries in this cache.
    ///
    /// Note that this will also zero all metrics (reads, writes, cache hits).
    pub fn flush(&mut self) {
        self.map.clear();
        self.total_size = 0;
        self.reads = 0;
        self.writes = 0;
        self.hits = 0;
    }

    /// Returns the number of entries in the cache (including expired ones).
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Determines if the cache is completely empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns all keys, starting with the least recently used one.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Returns the sum of the sizes of all entries in bytes.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Returns the maximal number of bytes to keep.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Changes the maximal number of bytes to keep.
    ///
    /// If the limit is reduced, entries are evicted immediately until the cache fits again.
    pub fn set_max_size(&mut self, max_size: usize) {
        let previous_max_size = self.max_size;
        self.max_size = max_size;
        if previous_max_size > self.max_size {
            self.enforce_constraints();
        }
    }

    /// Returns the time to live applied to new entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Changes the time to live. This only affects entries stored after this call.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }

    /// Enables or disables logging of hits, misses and evictions.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Returns the memory utilization in percent.
    pub fn memory_utilization(&self) -> f32 {
        match self.max_size {
            0 => 100.,
            max_size => self.total_size as f32 / max_size as f32 * 100.,
        }
    }

    /// Returns the cache hit rate of **get** in percent.
    ///
    /// Note that all metrics are reset when **flush()** is called.
    pub fn hit_rate(&self) -> f32 {
        match self.reads {
            0 => 0.,
            n => self.hits as f32 / n as f32 * 100.,
        }
    }

    /// Returns the total number of reads performed via **get** since the last flush.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Returns the total number of writes performed on this cache since the last flush.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl MemoryCache<String> {
    /// Creates a cache for plain strings, which are accounted with their UTF-8 length.
    pub fn for_strings(settings: &MemorySettings) -> Self {
        MemoryCache::from_settings(settings, String::clone)
    }
}
