use anyhow::Context;
use rusqlite::{Connection, TransactionBehavior, params};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::path::Path;

/// Content hash of a stored raw value, used for compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn of(raw: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(raw.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// String key/value backend, the durable half of a collection store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;

    fn remove(&mut self, key: &str) -> anyhow::Result<()>;

    /// Write `value` only if the current value still hashes to `expected`
    /// (`None` = key must be absent). Returns whether the write happened.
    ///
    /// The default is a plain read-then-write; backends shared between
    /// processes override it with an atomic version.
    fn swap_if(
        &mut self,
        key: &str,
        expected: Option<&Revision>,
        value: &str,
    ) -> anyhow::Result<bool> {
        let current = self.get(key)?.map(|raw| Revision::of(&raw));
        if current.as_ref() != expected {
            return Ok(false);
        }
        self.set(key, value)?;
        Ok(true)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &mut S {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        (**self).remove(key)
    }

    fn swap_if(
        &mut self,
        key: &str,
        expected: Option<&Revision>,
        value: &str,
    ) -> anyhow::Result<bool> {
        (**self).swap_if(key, expected, value)
    }
}

/// Process-local store. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// SQLite-backed store; one row per key.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory db")?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
CREATE TABLE IF NOT EXISTS kv (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);
"#,
            )
            .context("init schema")?;
        Ok(())
    }

    fn read(conn: &Connection, key: &str) -> anyhow::Result<Option<String>> {
        let mut stmt = conn
            .prepare("SELECT value FROM kv WHERE key=?1")
            .context("prepare kv get")?;
        let mut rows = stmt.query(params![key]).context("query kv")?;
        if let Some(row) = rows.next().context("read kv row")? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    fn write(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
        conn.execute(
            r#"
INSERT INTO kv(key, value, updated_at)
VALUES(?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value=excluded.value,
  updated_at=excluded.updated_at
"#,
            params![key, value, now_unix()],
        )
        .context("write kv")?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Self::read(&self.conn, key)
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        Self::write(&self.conn, key, value)
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key=?1", params![key])
            .context("delete kv")?;
        Ok(())
    }

    fn swap_if(
        &mut self,
        key: &str,
        expected: Option<&Revision>,
        value: &str,
    ) -> anyhow::Result<bool> {
        // IMMEDIATE takes the write lock before the read, so no other
        // connection can slip a write between compare and set.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("begin swap")?;
        let current = Self::read(&tx, key)?.map(|raw| Revision::of(&raw));
        if current.as_ref() != expected {
            return Ok(false);
        }
        Self::write(&tx, key, value)?;
        tx.commit().context("commit swap")?;
        Ok(true)
    }
}

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
