use anyhow::{bail, Context, Result};
use indoc::indoc;
use rusqlite::{Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, debug_span};

use crate::issue_id::IssueId;
use crate::tracker::{Verdict, Visibility};

// -------------------------------------------------------------------------------------------------
// ClassifiedIssue
// -------------------------------------------------------------------------------------------------
/// One persisted tracker verdict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedIssue {
    pub id: IssueId,
    pub verdict: Verdict,
}

// -------------------------------------------------------------------------------------------------
// ClassificationStore
// -------------------------------------------------------------------------------------------------
/// The durable, append-ordered record of tracker verdicts for a project.
///
/// Each verdict is committed in its own transaction, so after any interruption the store holds
/// exactly the verdicts that were appended before it. Persisted verdicts are never updated or
/// replaced; the only way to discard them is `reset`.
pub struct ClassificationStore {
    /// The path of the database file backing this store.
    path: PathBuf,

    /// A connection to the database backing this store.
    conn: Connection,

    /// The IDs already present, kept in memory for cheap membership checks.
    known: HashSet<IssueId>,
}

impl ClassificationStore {
    /// Create a new store at `path` if one does not exist, or open the existing one.
    pub fn create_or_open(path: &Path) -> Result<Self> {
        Self::open_inner(path)
            .with_context(|| format!("Failed to open classification store at {}", path.display()))
    }

    /// Open the existing store at `path`, failing if there is none.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!(
                "No classification store at {}; run the identify step first",
                path.display()
            );
        }
        Self::create_or_open(path)
    }

    fn open_inner(path: &Path) -> Result<Self> {
        let conn = Self::new_connection(path)?;
        let mut store = Self {
            path: path.to_owned(),
            conn,
            known: HashSet::new(),
        };
        store.migrate()?;
        store.known = store.load_known_ids()?;
        debug!("Opened classification store at {} with {} verdicts", path.display(), store.len());
        Ok(store)
    }

    fn new_connection(path: &Path) -> Result<Connection> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "wal")?; // https://www.sqlite.org/wal.html
        // every committed verdict must survive a crash or power loss
        conn.pragma_update(None, "synchronous", "full")?; // https://sqlite.org/pragma.html#pragma_synchronous

        Ok(conn)
    }

    fn migrate(&mut self) -> Result<u64> {
        let _span = debug_span!("ClassificationStore::migrate", "{}", self.path.display()).entered();
        let tx = self.conn.transaction()?;

        let get_user_version = || -> Result<u64> {
            let user_version = tx.pragma_query_value(None, "user_version", |r| r.get(0))?;
            Ok(user_version)
        };

        let set_user_version = |user_version: u64| -> Result<()> {
            tx.pragma_update(None, "user_version", user_version)?;
            Ok(())
        };

        let user_version: u64 = get_user_version()?;
        if user_version == 0 {
            let new_user_version = user_version + 1;
            debug!(
                "Migrating database schema from version {} to {}",
                user_version, new_user_version
            );
            tx.execute_batch(indoc! {r#"
                create table verdicts
                -- One row per classified issue, in the order the verdicts were obtained.
                (
                    seq integer primary key autoincrement,

                    issue_id text not null unique,

                    -- 1 if the issue is security-related, 0 otherwise
                    security integer not null check (security in (0, 1)),

                    -- 'public' or 'private' for security-related issues, null otherwise
                    visibility text check (visibility in ('public', 'private')),

                    check ((security = 1) = (visibility is not null))
                );
            "#})?;
            set_user_version(new_user_version)?;
        } else if user_version > 1 {
            bail!("Unsupported schema version {user_version}; this store was written by a newer version");
        }
        tx.commit()?;
        Ok(user_version)
    }

    fn load_known_ids(&self) -> Result<HashSet<IssueId>> {
        let mut stmt = self.conn.prepare_cached("select issue_id from verdicts")?;
        let ids = stmt.query_map((), |row| row.get::<_, String>(0))?;
        let mut known = HashSet::new();
        for id in ids {
            known.insert(IssueId::new(id?)?);
        }
        Ok(known)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn contains(&self, id: &IssueId) -> bool {
        self.known.contains(id)
    }

    /// Durably record the verdict for `id`.
    ///
    /// It is an error to record a second verdict for an ID.
    pub fn append(&mut self, id: &IssueId, verdict: Verdict) -> Result<()> {
        let _span = debug_span!("ClassificationStore::append", "{id}").entered();
        if self.contains(id) {
            bail!("Issue {id} already has a persisted verdict");
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(indoc! {r#"
                insert into verdicts(issue_id, security, visibility) values (?, ?, ?)
            "#})?;
            stmt.execute((
                id.as_str(),
                verdict.is_security(),
                verdict.visibility().map(|v| v.as_str()),
            ))
            .with_context(|| format!("Failed to record verdict for issue {id}"))?;
        }
        tx.commit()?;
        self.known.insert(id.clone());
        Ok(())
    }

    /// All persisted verdicts, in the order they were appended.
    pub fn verdicts(&self) -> Result<Vec<ClassifiedIssue>> {
        let _span = debug_span!("ClassificationStore::verdicts", "{}", self.path.display()).entered();

        let mut stmt = self.conn.prepare_cached(indoc! {r#"
            select issue_id, security, visibility
            from verdicts
            order by seq
        "#})?;
        let entries = stmt.query_map((), |row| {
            let id: String = row.get(0)?;
            let security: bool = row.get(1)?;
            let visibility: Option<String> = row.get(2)?;
            Ok((id, security, visibility))
        })?;
        let mut es = Vec::new();
        for e in entries {
            let (id, security, visibility) = e?;
            let verdict = match (security, visibility) {
                (false, None) => Verdict::NotSecurity,
                (true, Some(v)) => Verdict::Security(v.parse()?),
                (s, v) => bail!("Inconsistent verdict for issue {id}: security={s}, visibility={v:?}"),
            };
            es.push(ClassifiedIssue { id: IssueId::new(id)?, verdict });
        }
        Ok(es)
    }

    /// The persisted security-related issues and their visibility.
    pub fn security_issues(&self) -> Result<HashMap<IssueId, Visibility>> {
        Ok(self
            .verdicts()?
            .into_iter()
            .filter_map(|c| c.verdict.visibility().map(|v| (c.id, v)))
            .collect())
    }

    /// The most recently appended verdict, if any.
    pub fn last(&self) -> Result<Option<ClassifiedIssue>> {
        let mut stmt = self.conn.prepare_cached(indoc! {r#"
            select issue_id, security, visibility
            from verdicts
            order by seq desc
            limit 1
        "#})?;
        let row = stmt
            .query_row((), |row| {
                let id: String = row.get(0)?;
                let visibility: Option<String> = row.get(2)?;
                Ok((id, visibility))
            })
            .optional()?;
        match row {
            None => Ok(None),
            Some((id, visibility)) => {
                let verdict = match visibility {
                    None => Verdict::NotSecurity,
                    Some(v) => Verdict::Security(v.parse()?),
                };
                Ok(Some(ClassifiedIssue { id: IssueId::new(id)?, verdict }))
            }
        }
    }

    /// Discard all persisted verdicts.
    pub fn reset(&mut self) -> Result<usize> {
        let _span = debug_span!("ClassificationStore::reset", "{}", self.path.display()).entered();
        let tx = self.conn.transaction()?;
        let num_deleted = tx.execute("delete from verdicts", ())?;
        tx.commit()?;
        self.known.clear();
        debug!("Discarded {num_deleted} verdicts");
        Ok(num_deleted)
    }
}
