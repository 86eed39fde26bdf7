//! In-memory backend for the registry

use super::RegistryBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct Data {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, BTreeSet<String>>,
    lists: HashMap<String, VecDeque<String>>,
    published: Vec<(String, String)>,
}

impl Data {
    fn key_names(&self) -> impl Iterator<Item = &String> {
        self.strings
            .keys()
            .chain(self.hashes.keys())
            .chain(self.sets.keys())
            .chain(self.lists.keys())
    }
}

/// In-memory registry backend
///
/// Counts every command it serves so callers can assert that an operation
/// never reached the store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<Data>,
    operations: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commands served so far
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Seed a string key
    pub fn set_string(&self, key: &str, value: &str) {
        self.data
            .write()
            .unwrap()
            .strings
            .insert(key.to_string(), value.to_string());
    }

    /// Seed a hash field
    pub fn set_hash_field(&self, key: &str, field: &str, value: &str) {
        self.data
            .write()
            .unwrap()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    /// Seed set members
    pub fn add_set_members(&self, key: &str, members: &[&str]) {
        let mut data = self.data.write().unwrap();
        let set = data.sets.entry(key.to_string()).or_default();
        set.extend(members.iter().map(|m| m.to_string()));
    }

    /// Seed a list by appending to its tail
    pub fn push_list(&self, key: &str, value: &str) {
        self.data
            .write()
            .unwrap()
            .lists
            .entry(key.to_string())
            .or_default()
            .push_back(value.to_string());
    }

    /// Contents of a list, head first
    pub fn list(&self, key: &str) -> Vec<String> {
        self.data
            .read()
            .unwrap()
            .lists
            .get(key)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every `(channel, message)` published so far
    pub fn published(&self) -> Vec<(String, String)> {
        self.data.read().unwrap().published.clone()
    }

    fn record(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Connection("memory backend is closed".to_string()));
        }
        self.operations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Translate a redis glob (`*`, `?`) into an anchored regex
fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| Error::InvalidArguments(format!("pattern '{}': {}", pattern, e)))
}

/// Resolve redis-style list indices against a length
fn list_bounds(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    (start <= stop && start < len).then(|| (start as usize, stop as usize))
}

#[async_trait]
impl RegistryBackend for MemoryBackend {
    async fn ping(&self) -> Result<()> {
        self.record()
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.record()?;
        let matcher = glob_to_regex(pattern)?;
        let data = self.data.read().unwrap();
        let mut keys: Vec<String> = data
            .key_names()
            .filter(|k| matcher.is_match(k))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.record()?;
        Ok(self.data.read().unwrap().strings.get(key).cloned())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.record()?;
        Ok(self
            .data
            .read()
            .unwrap()
            .hashes
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.record()?;
        Ok(self
            .data
            .read()
            .unwrap()
            .hashes
            .get(key)
            .and_then(|h| h.get(field))
            .cloned())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.record()?;
        self.data
            .write()
            .unwrap()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> Result<u64> {
        self.record()?;
        let mut data = self.data.write().unwrap();
        let Some(hash) = data.hashes.get_mut(key) else {
            return Ok(0);
        };
        let removed = fields.iter().filter(|f| hash.remove(*f).is_some()).count();
        if hash.is_empty() {
            data.hashes.remove(key);
        }
        Ok(removed as u64)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.record()?;
        Ok(self
            .data
            .read()
            .unwrap()
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn lrange_atomic(
        &self,
        keys: &[String],
        start: isize,
        stop: isize,
    ) -> Result<Vec<Vec<String>>> {
        self.record()?;
        // One read guard for the whole batch
        let data = self.data.read().unwrap();
        Ok(keys
            .iter()
            .map(|key| {
                let Some(list) = data.lists.get(key) else {
                    return Vec::new();
                };
                match list_bounds(list.len(), start, stop) {
                    Some((from, to)) => list.range(from..=to).cloned().collect(),
                    None => Vec::new(),
                }
            })
            .collect())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<u64> {
        self.record()?;
        self.data
            .write()
            .unwrap()
            .published
            .push((channel.to_string(), message.to_string()));
        Ok(0)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        self.record()?;
        self.data
            .write()
            .unwrap()
            .lists
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    async fn info(&self) -> Result<String> {
        self.record()?;
        let data = self.data.read().unwrap();
        Ok(format!(
            "# Server\r\nredis_mode:memory\r\n# Keyspace\r\nkeys:{}\r\n",
            data.key_names().count()
        ))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
