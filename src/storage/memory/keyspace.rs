//! One selectable database of the memory backend.
//!
//! Keys hold strings, lists or hashes and may carry a deadline. Expired keys
//! are dropped lazily, the next time they are touched.

use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::domain::Reply;
use crate::error::{StorageError, StorageResult};

#[derive(Debug)]
enum Entry {
    Str(String),
    List(VecDeque<String>),
    Hash(HashMap<String, String>),
}

#[derive(Debug)]
struct Slot {
    value: Entry,
    expires_at: Option<Instant>,
}

impl Slot {
    const fn new(value: Entry) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Key space of a single database.
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: DashMap<String, Slot>,
}

impl Keyspace {
    /// Create an empty key space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_expired(&self, key: &str) {
        self.entries.remove_if(key, |_, slot| slot.is_expired());
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|slot| !slot.is_expired()).count()
    }

    /// Whether there are no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every key.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.purge_expired(key);
        self.entries
            .get(key)
            .map(|slot| match &slot.value {
                Entry::Str(s) => Ok(s.clone()),
                _ => Err(StorageError::WrongType),
            })
            .transpose()
    }

    /// Store a string, replacing any previous value and deadline.
    pub fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<()> {
        if ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(invalid_expire_time("set"));
        }
        let expires_at = ttl.map(|ttl| deadline(ttl, "set")).transpose()?;
        self.entries.insert(
            key.to_string(),
            Slot {
                value: Entry::Str(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    pub fn del(&self, key: &str) -> bool {
        self.purge_expired(key);
        self.entries.remove(key).is_some()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.purge_expired(key);
        self.entries.contains_key(key)
    }

    pub fn incr_by(&self, key: &str, delta: i64) -> StorageResult<i64> {
        self.purge_expired(key);
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Slot::new(Entry::Str("0".to_string())));

        let Entry::Str(current) = &mut slot.value else {
            return Err(StorageError::WrongType);
        };
        let next = current
            .parse::<i64>()
            .map_err(|_| StorageError::InvalidValue("value is not an integer or out of range".to_string()))?
            .checked_add(delta)
            .ok_or_else(|| {
                StorageError::InvalidValue("increment or decrement would overflow".to_string())
            })?;
        *current = next.to_string();
        Ok(next)
    }

    /// Set a deadline on `key`; a zero `ttl` expires it at once.
    pub fn expire(&self, key: &str, ttl: Duration) -> StorageResult<bool> {
        let at = deadline(ttl, "expire")?;
        self.purge_expired(key);
        let found = self.entries.get_mut(key).map(|mut slot| {
            slot.expires_at = Some(at);
        });
        self.purge_expired(key);
        Ok(found.is_some())
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.purge_expired(key);
        self.entries
            .get(key)
            .and_then(|slot| slot.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn push(&self, key: &str, value: &str, front: bool) -> StorageResult<usize> {
        self.purge_expired(key);
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Slot::new(Entry::List(VecDeque::new())));

        let Entry::List(list) = &mut slot.value else {
            return Err(StorageError::WrongType);
        };
        if front {
            list.push_front(value.to_string());
        } else {
            list.push_back(value.to_string());
        }
        Ok(list.len())
    }

    pub fn pop(&self, key: &str, front: bool) -> StorageResult<Option<String>> {
        self.purge_expired(key);
        let (popped, now_empty) = {
            let Some(mut slot) = self.entries.get_mut(key) else {
                return Ok(None);
            };
            let Entry::List(list) = &mut slot.value else {
                return Err(StorageError::WrongType);
            };
            let popped = if front {
                list.pop_front()
            } else {
                list.pop_back()
            };
            (popped, list.is_empty())
        };

        // empty lists do not exist
        if now_empty {
            self.entries
                .remove_if(key, |_, slot| matches!(&slot.value, Entry::List(l) if l.is_empty()));
        }
        Ok(popped)
    }

    pub fn lrange(&self, key: &str, start: isize, stop: isize) -> StorageResult<Vec<String>> {
        self.purge_expired(key);
        let Some(slot) = self.entries.get(key) else {
            return Ok(Vec::new());
        };
        let Entry::List(list) = &slot.value else {
            return Err(StorageError::WrongType);
        };

        let len = isize::try_from(list.len()).unwrap_or(isize::MAX);
        let start = if start < 0 { (start + len).max(0) } else { start };
        let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
        if start > stop || start >= len {
            return Ok(Vec::new());
        }

        #[allow(clippy::cast_sign_loss)]
        let (start, stop) = (start as usize, stop as usize);
        Ok(list.range(start..=stop).cloned().collect())
    }

    pub fn llen(&self, key: &str) -> StorageResult<usize> {
        self.purge_expired(key);
        self.entries.get(key).map_or(Ok(0), |slot| match &slot.value {
            Entry::List(list) => Ok(list.len()),
            _ => Err(StorageError::WrongType),
        })
    }

    pub fn hget(&self, key: &str, field: &str) -> StorageResult<Option<String>> {
        self.purge_expired(key);
        self.entries.get(key).map_or(Ok(None), |slot| match &slot.value {
            Entry::Hash(hash) => Ok(hash.get(field).cloned()),
            _ => Err(StorageError::WrongType),
        })
    }

    pub fn hset(&self, key: &str, field: &str, value: &str) -> StorageResult<bool> {
        self.purge_expired(key);
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Slot::new(Entry::Hash(HashMap::new())));

        let Entry::Hash(hash) = &mut slot.value else {
            return Err(StorageError::WrongType);
        };
        Ok(hash.insert(field.to_string(), value.to_string()).is_none())
    }

    pub fn hdel(&self, key: &str, field: &str) -> StorageResult<bool> {
        self.purge_expired(key);
        let (removed, now_empty) = {
            let Some(mut slot) = self.entries.get_mut(key) else {
                return Ok(false);
            };
            let Entry::Hash(hash) = &mut slot.value else {
                return Err(StorageError::WrongType);
            };
            (hash.remove(field).is_some(), hash.is_empty())
        };

        if now_empty {
            self.entries
                .remove_if(key, |_, slot| matches!(&slot.value, Entry::Hash(h) if h.is_empty()));
        }
        Ok(removed)
    }

    pub fn hgetall(&self, key: &str) -> StorageResult<HashMap<String, String>> {
        self.purge_expired(key);
        self.entries.get(key).map_or_else(
            || Ok(HashMap::new()),
            |slot| match &slot.value {
                Entry::Hash(hash) => Ok(hash.clone()),
                _ => Err(StorageError::WrongType),
            },
        )
    }

    /// Run a command given by name. Keys are used exactly as given.
    pub fn execute(&self, command: &str, args: &[Cow<'_, str>]) -> StorageResult<Reply> {
        let command = command.to_ascii_uppercase();
        match (command.as_str(), args) {
            ("PING", []) => Ok(Reply::Status("PONG".to_string())),
            ("PING", [message]) => Ok(Reply::Bulk(message.as_bytes().to_vec())),
            ("GET", [key]) => self.get(key).map(Reply::from),
            ("SET", [key, value]) => self.set(key, value, None).map(|()| Reply::Okay),
            ("DEL", keys) if !keys.is_empty() => {
                Ok(count(keys.iter().filter(|key| self.del(key)).count()))
            }
            ("EXISTS", keys) if !keys.is_empty() => {
                Ok(count(keys.iter().filter(|key| self.exists(key)).count()))
            }
            ("INCR", [key]) => self.incr_by(key, 1).map(Reply::Int),
            ("INCRBY", [key, delta]) => self.incr_by(key, parse_int(delta)?).map(Reply::Int),
            ("LPUSH", [key, value]) => self.push(key, value, true).map(count),
            ("RPUSH", [key, value]) => self.push(key, value, false).map(count),
            ("LPOP", [key]) => self.pop(key, true).map(Reply::from),
            ("RPOP", [key]) => self.pop(key, false).map(Reply::from),
            ("LLEN", [key]) => self.llen(key).map(count),
            ("LRANGE", [key, start, stop]) => {
                let start = isize::try_from(parse_int(start)?).unwrap_or(isize::MAX);
                let stop = isize::try_from(parse_int(stop)?).unwrap_or(isize::MAX);
                self.lrange(key, start, stop).map(Reply::from)
            }
            ("HGET", [key, field]) => self.hget(key, field).map(Reply::from),
            ("HSET", [key, field, value]) => self
                .hset(key, field, value)
                .map(|created| Reply::Int(i64::from(created))),
            ("HDEL", [key, field]) => self
                .hdel(key, field)
                .map(|removed| Reply::Int(i64::from(removed))),
            ("HGETALL", [key]) => self.hgetall(key).map(|hash| {
                Reply::Map(
                    hash.into_iter()
                        .map(|(f, v)| (Reply::Bulk(f.into_bytes()), Reply::Bulk(v.into_bytes())))
                        .collect(),
                )
            }),
            ("DBSIZE", []) => Ok(count(self.len())),
            ("FLUSHDB", []) => {
                self.clear();
                Ok(Reply::Okay)
            }
            (
                "PING" | "GET" | "SET" | "DEL" | "EXISTS" | "INCR" | "INCRBY" | "LPUSH" | "RPUSH"
                | "LPOP" | "RPOP" | "LLEN" | "LRANGE" | "HGET" | "HSET" | "HDEL" | "HGETALL"
                | "DBSIZE" | "FLUSHDB",
                _,
            ) => Err(StorageError::InvalidValue(format!(
                "wrong number of arguments for '{}' command",
                command.to_ascii_lowercase()
            ))),
            _ => Err(StorageError::UnsupportedCommand(command.clone())),
        }
    }
}

fn invalid_expire_time(command: &str) -> StorageError {
    StorageError::InvalidValue(format!("invalid expire time in '{command}' command"))
}

/// The instant `ttl` from now, rejected when it is not representable.
fn deadline(ttl: Duration, command: &str) -> StorageResult<Instant> {
    Instant::now()
        .checked_add(ttl)
        .ok_or_else(|| invalid_expire_time(command))
}

fn count(n: usize) -> Reply {
    Reply::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn parse_int(raw: &str) -> StorageResult<i64> {
    raw.parse()
        .map_err(|_| StorageError::InvalidValue("value is not an integer or out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_and_counters() {
        let keys = Keyspace::new();
        assert_eq!(keys.get("missing").unwrap(), None);

        keys.set("name", "onion", None).unwrap();
        assert_eq!(keys.get("name").unwrap().as_deref(), Some("onion"));
        assert!(matches!(keys.incr_by("name", 1), Err(StorageError::InvalidValue(_))));

        assert_eq!(keys.incr_by("hits", 5).unwrap(), 5);
        assert_eq!(keys.incr_by("hits", -2).unwrap(), 3);
        assert_eq!(keys.get("hits").unwrap().as_deref(), Some("3"));

        keys.set("big", &i64::MAX.to_string(), None).unwrap();
        assert!(keys.incr_by("big", 1).is_err());

        assert!(keys.del("name"));
        assert!(!keys.del("name"));
    }

    #[test]
    fn test_expiry() {
        let keys = Keyspace::new();
        keys.set("session", "x", Some(Duration::from_secs(60))).unwrap();
        let ttl = keys.ttl("session").unwrap();
        assert!(ttl <= Duration::from_secs(60) && ttl > Duration::from_secs(50));

        keys.set("session", "y", None).unwrap();
        assert_eq!(keys.ttl("session"), None);

        assert!(keys.expire("session", Duration::ZERO).unwrap());
        assert!(!keys.exists("session"));
        assert!(!keys.expire("session", Duration::from_secs(1)).unwrap());

        assert!(keys.set("k", "v", Some(Duration::ZERO)).is_err());
    }

    #[test]
    fn test_unrepresentable_ttl_is_rejected() {
        let keys = Keyspace::new();

        let err = keys.set("k", "v", Some(Duration::MAX)).unwrap_err();
        assert!(matches!(err, StorageError::InvalidValue(ref msg) if msg.contains("'set'")));
        assert!(!keys.exists("k"));

        keys.set("k", "v", None).unwrap();
        let err = keys.expire("k", Duration::from_secs(u64::MAX)).unwrap_err();
        assert!(matches!(err, StorageError::InvalidValue(ref msg) if msg.contains("'expire'")));
        assert_eq!(keys.ttl("k"), None);
        assert_eq!(keys.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_lists() {
        let keys = Keyspace::new();
        assert_eq!(keys.push("queue", "b", false).unwrap(), 1);
        assert_eq!(keys.push("queue", "c", false).unwrap(), 2);
        assert_eq!(keys.push("queue", "a", true).unwrap(), 3);

        assert_eq!(keys.lrange("queue", 0, -1).unwrap(), vec!["a", "b", "c"]);
        assert_eq!(keys.lrange("queue", -2, 10).unwrap(), vec!["b", "c"]);
        assert_eq!(keys.lrange("queue", 2, 1).unwrap(), Vec::<String>::new());
        assert_eq!(keys.lrange("queue", 5, 9).unwrap(), Vec::<String>::new());

        assert_eq!(keys.pop("queue", true).unwrap().as_deref(), Some("a"));
        assert_eq!(keys.pop("queue", false).unwrap().as_deref(), Some("c"));
        assert_eq!(keys.pop("queue", false).unwrap().as_deref(), Some("b"));
        assert!(!keys.exists("queue"));
        assert_eq!(keys.pop("queue", true).unwrap(), None);
    }

    #[test]
    fn test_hashes_and_wrong_type() {
        let keys = Keyspace::new();
        assert!(keys.hset("user", "name", "ldl").unwrap());
        assert!(!keys.hset("user", "name", "neo").unwrap());
        assert_eq!(keys.hget("user", "name").unwrap().as_deref(), Some("neo"));
        assert_eq!(keys.hgetall("user").unwrap().len(), 1);

        assert!(matches!(keys.get("user"), Err(StorageError::WrongType)));
        assert!(matches!(keys.push("user", "x", true), Err(StorageError::WrongType)));
        assert!(matches!(keys.llen("user"), Err(StorageError::WrongType)));

        assert!(keys.hdel("user", "name").unwrap());
        assert!(!keys.exists("user"));
    }

    #[test]
    fn test_execute() {
        let keys = Keyspace::new();
        let args = |v: &[&'static str]| v.iter().map(|s| Cow::Borrowed(*s)).collect::<Vec<_>>();

        assert_eq!(keys.execute("ping", &[]).unwrap(), Reply::Status("PONG".to_string()));
        assert_eq!(keys.execute("SET", &args(&["a", "1"])).unwrap(), Reply::Okay);
        assert_eq!(keys.execute("incrby", &args(&["a", "9"])).unwrap(), Reply::Int(10));
        assert_eq!(keys.execute("DBSIZE", &[]).unwrap(), Reply::Int(1));
        assert_eq!(keys.execute("DEL", &args(&["a", "b"])).unwrap(), Reply::Int(1));

        assert!(matches!(
            keys.execute("GET", &[]),
            Err(StorageError::InvalidValue(_))
        ));
        assert!(matches!(
            keys.execute("SUNION", &args(&["a"])),
            Err(StorageError::UnsupportedCommand(cmd)) if cmd == "SUNION"
        ));
    }
}
