//! `QuadStore`: the durable bitemporal facade composing one `AtomStore`,
//! four `QuadIndex` instances, one `WriteAheadLog`, and a statistics
//! snapshot behind a single reader-writer lock.
//!
//! State machine for a store instance: `New -> Recovered -> Ready ->
//! (BatchActive <-> Ready) -> Disposed`. Construction passes through
//! recovery exactly once; `Disposed` is terminal and every operation after
//! it returns [`EngineError::ObjectDisposed`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use mercury_atoms::AtomStore;
use mercury_concurrency::{LockIdentity, ReadSession, Sessions, WriteSession};
use mercury_core::{now_millis, AtomId, IndexOrdering, MercuryConfig, Quad, QueryMode, TemporalQuadEntry};
use mercury_durability::{WalOp, WalRecord, WriteAheadLog};
use mercury_storage::QuadIndex;
use rustc_hash::FxHasher;
use tracing::{info, instrument};

use crate::error::{EngineError, Result};
use crate::statistics::StatisticsStore;

/// The four physical index files a `QuadStore` keeps open at once.
struct Indexes {
    gspo: QuadIndex,
    gpos: QuadIndex,
    gosp: QuadIndex,
    tgsp: QuadIndex,
}

impl Indexes {
    fn open(dir: &Path, cache_capacity: usize) -> Result<Self> {
        Ok(Indexes {
            gspo: QuadIndex::open(&dir.join("gspo.tdb"), IndexOrdering::Gspo, cache_capacity)?,
            gpos: QuadIndex::open(&dir.join("gpos.tdb"), IndexOrdering::Gpos, cache_capacity)?,
            gosp: QuadIndex::open(&dir.join("gosp.tdb"), IndexOrdering::Gosp, cache_capacity)?,
            tgsp: QuadIndex::open(&dir.join("tgsp.tdb"), IndexOrdering::Tgsp, cache_capacity)?,
        })
    }

    fn by_ordering(&self, ordering: IndexOrdering) -> &QuadIndex {
        match ordering {
            IndexOrdering::Gspo => &self.gspo,
            IndexOrdering::Gpos => &self.gpos,
            IndexOrdering::Gosp => &self.gosp,
            IndexOrdering::Tgsp => &self.tgsp,
        }
    }

    fn insert(&mut self, entry: &TemporalQuadEntry) -> Result<()> {
        self.gspo.insert(entry)?;
        self.gpos.insert(entry)?;
        self.gosp.insert(entry)?;
        self.tgsp.insert(entry)?;
        Ok(())
    }

    fn mark_deleted(&mut self, g: u64, s: u64, p: u64, o: u64, at_time: i64, stamp: i64) -> Result<bool> {
        let a = self.gspo.mark_deleted(g, s, p, o, at_time, stamp)?;
        let b = self.gpos.mark_deleted(g, s, p, o, at_time, stamp)?;
        let c = self.gosp.mark_deleted(g, s, p, o, at_time, stamp)?;
        let d = self.tgsp.mark_deleted(g, s, p, o, at_time, stamp)?;
        Ok(a || b || c || d)
    }

    fn clear(&mut self) -> Result<()> {
        self.gspo.clear()?;
        self.gpos.clear()?;
        self.gosp.clear()?;
        self.tgsp.clear()?;
        Ok(())
    }
}

/// Everything behind the store's reader-writer lock.
struct Inner {
    atoms: AtomStore,
    indexes: Indexes,
    wal: WriteAheadLog,
}

/// A decoded, owned query result row. Atom ids have already been resolved
/// back to their interned UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadRecord {
    /// The default graph is represented as an empty string.
    pub graph: String,
    /// Subject text.
    pub subject: String,
    /// Predicate text.
    pub predicate: String,
    /// Object text.
    pub object: String,
    /// Inclusive start of the valid-time interval.
    pub valid_from: i64,
    /// Exclusive end of the valid-time interval.
    pub valid_to: i64,
    /// The WAL transaction id this version was committed under.
    pub transaction_time: i64,
    /// Whether this version is a tombstone (only ever `true` under
    /// [`QueryMode::History`] or [`QueryMode::TransactionRange`]).
    pub is_deleted: bool,
}

/// A lazy query enumerator. Holds the store's read lock for its entire
/// lifetime, matching the design note that a scan's consistency window is
/// the enumerator's lifetime, not the call that created it — the
/// underlying index scan is already eager, so this only decodes atom ids
/// to owned strings on each `next()`, one row at a time.
pub struct QueryResults<'a> {
    _session: ReadSession<'a, Inner>,
    entries: std::vec::IntoIter<TemporalQuadEntry>,
    atoms: *const AtomStore,
}

impl<'a> QueryResults<'a> {
    fn new(session: ReadSession<'a, Inner>, entries: Vec<TemporalQuadEntry>) -> Self {
        let atoms: *const AtomStore = &session.atoms;
        QueryResults {
            _session: session,
            entries: entries.into_iter(),
            atoms,
        }
    }

    fn decode(&self, entry: TemporalQuadEntry) -> Result<QuadRecord> {
        // Safety: `atoms` points at a field of `_session`, which this
        // iterator owns for its entire lifetime; the read lock guarantees
        // no writer mutates the atom store concurrently.
        let atoms = unsafe { &*self.atoms };
        let graph = decode_graph(atoms, entry.quad.graph)?;
        let subject = decode_text(atoms, entry.quad.subject)?;
        let predicate = decode_text(atoms, entry.quad.predicate)?;
        let object = decode_text(atoms, entry.quad.object)?;
        Ok(QuadRecord {
            graph,
            subject,
            predicate,
            object,
            valid_from: entry.valid_from,
            valid_to: entry.valid_to,
            transaction_time: entry.transaction_time,
            is_deleted: entry.is_deleted,
        })
    }
}

impl<'a> Iterator for QueryResults<'a> {
    type Item = Result<QuadRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.entries.next()?;
        Some(self.decode(entry))
    }
}

fn decode_text(atoms: &AtomStore, id: AtomId) -> Result<String> {
    let bytes = atoms.get(id)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn decode_graph(atoms: &AtomStore, id: AtomId) -> Result<String> {
    if id.is_nil() {
        return Ok(String::new());
    }
    decode_text(atoms, id)
}

/// The durable bitemporal quad store.
pub struct QuadStore {
    dir: PathBuf,
    config: MercuryConfig,
    sessions: Sessions<Inner>,
    statistics: StatisticsStore,
    disposed: AtomicBool,
    identity: u64,
}

impl QuadStore {
    /// Open (creating if absent) the store rooted at `dir`, replaying any
    /// uncommitted WAL records into the indexes before returning.
    #[instrument(skip(config), fields(dir = %dir.display()))]
    pub fn open(dir: &Path, config: MercuryConfig) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let atoms = AtomStore::open(&dir.join("atoms"), config.max_atom_size)?;
        let mut indexes = Indexes::open(dir, config.page_cache_capacity)?;
        let mut wal = WriteAheadLog::open(&dir.join("wal.log"))?;

        let replayed = Self::replay_recovery(&mut indexes, &mut wal)?;

        let inner = Inner { atoms, indexes, wal };
        let store = QuadStore {
            dir: dir.to_path_buf(),
            config,
            sessions: Sessions::new(inner),
            statistics: StatisticsStore::new(),
            disposed: AtomicBool::new(false),
            identity: path_identity(dir),
        };

        store.rebuild_statistics()?;
        if replayed {
            info!("recovery replayed uncommitted WAL records, writing post-recovery checkpoint");
            store.checkpoint()?;
        }
        Ok(store)
    }

    /// Consume `wal`'s `replay_uncommitted()` queue, applying each
    /// surviving record directly to the indexes without re-writing the
    /// WAL. Returns whether anything was replayed.
    fn replay_recovery(indexes: &mut Indexes, wal: &mut WriteAheadLog) -> Result<bool> {
        let records = wal.replay_uncommitted();
        let replayed = !records.is_empty();
        let recovery_stamp = now_millis();
        for record in records {
            apply_wal_record(indexes, &record, recovery_stamp)?;
        }
        Ok(replayed)
    }

    fn check_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(EngineError::ObjectDisposed);
        }
        Ok(())
    }

    /// Add a quad effective over `[valid_from, valid_to)`. Interns all four
    /// atoms (creating them if new), appends a WAL `Add` record with
    /// `fsync`, applies the temporal-overwrite rule in all four indexes,
    /// then checkpoints if due.
    #[instrument(skip(self))]
    pub fn add(
        &self,
        graph: &str,
        subject: &str,
        predicate: &str,
        object: &str,
        valid_from: i64,
        valid_to: i64,
    ) -> Result<()> {
        self.check_disposed()?;
        let mut session = self.sessions.write_session();
        let g = intern_graph(&mut session.atoms, graph)?;
        let s = session.atoms.intern(subject.as_bytes())?;
        let p = session.atoms.intern(predicate.as_bytes())?;
        let o = session.atoms.intern(object.as_bytes())?;

        let tx_id = session.wal.append(WalOp::Add, g.raw(), s.raw(), p.raw(), o.raw(), valid_from, valid_to)?;
        let entry = build_entry(g, s, p, o, valid_from, valid_to, tx_id as i64, now_millis());
        session.indexes.insert(&entry)?;

        self.maybe_checkpoint(&mut session)?;
        Ok(())
    }

    /// Add a quad valid from now onward.
    pub fn add_current(&self, graph: &str, subject: &str, predicate: &str, object: &str) -> Result<()> {
        self.add(graph, subject, predicate, object, now_millis(), mercury_core::VALID_TO_FOREVER)
    }

    /// Tombstone the live entry matching `(graph, subject, predicate,
    /// object)` as of `at_time`. Looks up atoms without interning; returns
    /// `Ok(false)` (not an error) if any atom is absent, since an absent
    /// atom can never have a live entry.
    #[instrument(skip(self))]
    pub fn delete(&self, graph: &str, subject: &str, predicate: &str, object: &str, at_time: i64) -> Result<bool> {
        self.check_disposed()?;
        let mut session = self.sessions.write_session();
        let Some((g, s, p, o)) = lookup_quad(&session.atoms, graph, subject, predicate, object) else {
            return Ok(false);
        };

        let tx_id = session.wal.append(WalOp::Delete, g.raw(), s.raw(), p.raw(), o.raw(), at_time, at_time)?;
        let deleted = session.indexes.mark_deleted(g.raw(), s.raw(), p.raw(), o.raw(), at_time, tx_id as i64)?;

        self.maybe_checkpoint(&mut session)?;
        Ok(deleted)
    }

    /// Tombstone the quad as of now.
    pub fn delete_current(&self, graph: &str, subject: &str, predicate: &str, object: &str) -> Result<bool> {
        self.delete(graph, subject, predicate, object, now_millis())
    }

    /// Begin a batch of mutations sharing one transaction id and a single
    /// `fsync` on commit. Holds the write lock for the returned session's
    /// entire lifetime.
    pub fn begin_batch(&self) -> Result<BatchSession<'_>> {
        self.check_disposed()?;
        let mut session = self.sessions.write_session();
        let tx_id = session.wal.begin_batch()?;
        Ok(BatchSession {
            store: self,
            session: Some(session),
            tx_id,
            committed: false,
        })
    }

    /// Lookup-or-select the index for a bind pattern and mode, decode its
    /// results into owned strings, and hand back an enumerator that pins
    /// the read lock for its lifetime.
    #[instrument(skip(self))]
    pub fn query(
        &self,
        graph: Option<&str>,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&str>,
        mode: QueryMode,
    ) -> Result<QueryResults<'_>> {
        self.check_disposed()?;
        let session = self.sessions.read_session();

        let g = resolve_bound_graph(&session.atoms, graph);
        let s = resolve_bound(&session.atoms, subject);
        let p = resolve_bound(&session.atoms, predicate);
        let o = resolve_bound(&session.atoms, object);

        // An unresolved bound value can never match anything; return empty
        // rather than falling through to an unbound (and therefore much
        // wider) scan.
        let unresolvable = (graph.is_some() && g.is_none())
            || (subject.is_some() && s.is_none())
            || (predicate.is_some() && p.is_none())
            || (object.is_some() && o.is_none());
        if unresolvable {
            return Ok(QueryResults::new(session, Vec::new()));
        }

        let ordering = match mode {
            QueryMode::TransactionRange { .. } => IndexOrdering::Tgsp,
            _ => IndexOrdering::select_for_pattern(s.is_some(), p.is_some(), o.is_some()),
        };
        // `ordering` only picks which physical index is scanned.
        // `QuadIndex::query_*` takes the bind pattern in logical (graph,
        // subject, predicate, object) order, reorders it to that index's
        // native column sequence internally, and post-filters the result
        // against every bound column exactly -- so every resolved column is
        // passed through here regardless of whether it falls in the chosen
        // ordering's leading prefix.
        let rg = g.map(AtomId::raw);
        let rs = s.map(AtomId::raw);
        let rp = p.map(AtomId::raw);
        let ro = o.map(AtomId::raw);

        let index = session.indexes.by_ordering(ordering);
        let entries = match mode {
            QueryMode::Current => index.query_as_of(rg, rs, rp, ro, now_millis()),
            QueryMode::AsOf(at_time) => index.query_as_of(rg, rs, rp, ro, at_time),
            QueryMode::Range { start, end } => index.query_range(rg, rs, rp, ro, start, end),
            QueryMode::History => index.query_history(rg, rs, rp, ro),
            QueryMode::TransactionRange { start, end } => index.query_transaction_range(start, end),
        };

        Ok(QueryResults::new(session, entries))
    }

    /// Quads visible now.
    pub fn query_current(
        &self,
        graph: Option<&str>,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&str>,
    ) -> Result<QueryResults<'_>> {
        self.query(graph, subject, predicate, object, QueryMode::Current)
    }

    /// Quads visible at a specific instant.
    pub fn query_as_of(
        &self,
        graph: Option<&str>,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&str>,
        at_time: i64,
    ) -> Result<QueryResults<'_>> {
        self.query(graph, subject, predicate, object, QueryMode::AsOf(at_time))
    }

    /// Every version of a quad across its valid-time history, tombstoned
    /// or not.
    pub fn query_evolution(
        &self,
        graph: Option<&str>,
        subject: Option<&str>,
        predicate: Option<&str>,
        object: Option<&str>,
    ) -> Result<QueryResults<'_>> {
        self.query(graph, subject, predicate, object, QueryMode::History)
    }

    /// Every version committed in transaction-time window `[start, end)`,
    /// forcing a TGSP scan regardless of bind pattern.
    pub fn query_changes(&self, start: i64, end: i64) -> Result<QueryResults<'_>> {
        self.query(None, None, None, None, QueryMode::TransactionRange { start, end })
    }

    /// Every non-tombstoned quad visible at `now`, in GSPO order. The copy
    /// step of an external compaction orchestrator uses this to populate a
    /// fresh target store one page-sized batch at a time; it is
    /// deliberately just `query` with the bind pattern fully unbound, since
    /// an unbound pattern already selects GSPO (see
    /// `IndexOrdering::select_for_pattern`).
    pub fn live_quads_as_of(&self, now: i64) -> Result<QueryResults<'_>> {
        self.query(None, None, None, None, QueryMode::AsOf(now))
    }

    /// Distinct non-default graph atoms currently interned, in GSPO order.
    #[instrument(skip(self))]
    pub fn named_graphs(&self) -> Result<Vec<String>> {
        self.check_disposed()?;
        let session = self.sessions.read_session();
        let entries = session.indexes.gspo.query_history(None, None, None, None);
        let mut graphs = Vec::new();
        let mut last: Option<AtomId> = None;
        for entry in entries {
            let g = entry.quad.graph;
            if g.is_nil() {
                continue;
            }
            if last == Some(g) {
                continue;
            }
            last = Some(g);
            graphs.push(decode_text(&session.atoms, g)?);
        }
        Ok(graphs)
    }

    /// Rebuild and publish the statistics snapshot from a GPOS scan.
    fn rebuild_statistics(&self) -> Result<()> {
        let session = self.sessions.read_session();
        let entries = session.indexes.gpos.query_history(None, None, None, None);
        self.statistics.rebuild(entries.iter(), now_millis());
        Ok(())
    }

    /// The current statistics snapshot.
    pub fn stats(&self) -> std::sync::Arc<crate::statistics::StatisticsSnapshot> {
        self.statistics.snapshot()
    }

    /// Collect statistics, write a WAL checkpoint, and truncate the log.
    #[instrument(skip(self))]
    pub fn checkpoint(&self) -> Result<()> {
        self.check_disposed()?;
        let mut session = self.sessions.write_session();
        self.do_checkpoint(&mut session)
    }

    fn do_checkpoint(&self, session: &mut WriteSession<'_, Inner>) -> Result<()> {
        let entries = session.indexes.gpos.query_history(None, None, None, None);
        self.statistics.rebuild(entries.iter(), now_millis());
        session.wal.checkpoint()?;
        Ok(())
    }

    fn maybe_checkpoint(&self, session: &mut WriteSession<'_, Inner>) -> Result<()> {
        if session.wal.should_checkpoint(&self.config.checkpoint) {
            self.do_checkpoint(session)?;
        }
        Ok(())
    }

    /// Reset every subsystem (WAL, all four indexes, atom store,
    /// statistics) to empty. The trigram index, if a caller opened one
    /// separately, is not touched here and must be cleared independently.
    #[instrument(skip(self))]
    pub fn clear(&self) -> Result<()> {
        self.check_disposed()?;
        let mut session = self.sessions.write_session();
        session.wal.clear()?;
        session.indexes.clear()?;
        session.atoms.clear()?;
        self.statistics.clear();
        Ok(())
    }

    /// Write a final checkpoint and mark this instance unusable. Idempotent:
    /// a second call returns `Ok(())` without touching anything.
    #[instrument(skip(self))]
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut session = self.sessions.write_session();
        self.do_checkpoint(&mut session)?;
        Ok(())
    }

    /// The directory this store is rooted at.
    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl LockIdentity for QuadStore {
    fn lock_identity(&self) -> u64 {
        self.identity
    }
}

/// An open batch of mutations. Holds the store's write lock for its entire
/// lifetime; `commit`/`rollback` consume `self`, and dropping without
/// either auto-rolls-back so a panicking caller never leaves a batch
/// dangling half-open.
pub struct BatchSession<'a> {
    store: &'a QuadStore,
    session: Option<WriteSession<'a, Inner>>,
    tx_id: u64,
    committed: bool,
}

impl<'a> BatchSession<'a> {
    fn session_mut(&mut self) -> &mut WriteSession<'a, Inner> {
        self.session.as_mut().expect("session present until commit/rollback")
    }

    /// Append an add to the open batch (no `fsync` yet) and apply it to
    /// every index immediately — readers see batch-in-progress state only
    /// if they happen to observe it before a rollback, matching the
    /// documented rollback asymmetry.
    #[allow(clippy::too_many_arguments)]
    pub fn add_batched(
        &mut self,
        graph: &str,
        subject: &str,
        predicate: &str,
        object: &str,
        valid_from: i64,
        valid_to: i64,
    ) -> Result<()> {
        let tx_id = self.tx_id;
        let session = self.session_mut();
        let g = intern_graph(&mut session.atoms, graph)?;
        let s = session.atoms.intern(subject.as_bytes())?;
        let p = session.atoms.intern(predicate.as_bytes())?;
        let o = session.atoms.intern(object.as_bytes())?;

        session.wal.append_batch(tx_id, WalOp::Add, g.raw(), s.raw(), p.raw(), o.raw(), valid_from, valid_to)?;
        let entry = build_entry(g, s, p, o, valid_from, valid_to, tx_id as i64, now_millis());
        session.indexes.insert(&entry)?;
        Ok(())
    }

    /// Append a delete to the open batch and apply it immediately.
    pub fn delete_batched(&mut self, graph: &str, subject: &str, predicate: &str, object: &str, at_time: i64) -> Result<bool> {
        let tx_id = self.tx_id;
        let session = self.session_mut();
        let Some((g, s, p, o)) = lookup_quad(&session.atoms, graph, subject, predicate, object) else {
            return Ok(false);
        };
        session.wal.append_batch(tx_id, WalOp::Delete, g.raw(), s.raw(), p.raw(), o.raw(), at_time, at_time)?;
        session.indexes.mark_deleted(g.raw(), s.raw(), p.raw(), o.raw(), at_time, tx_id as i64)
    }

    /// `fsync` once, durably committing every record appended since
    /// `begin_batch`.
    pub fn commit(mut self) -> Result<()> {
        let tx_id = self.tx_id;
        self.session_mut().wal.commit_batch(tx_id)?;
        self.committed = true;
        let mut session = self.session.take().expect("session present");
        self.store.maybe_checkpoint(&mut session)?;
        Ok(())
    }

    /// Discard the batch's WAL records. The index mutations already applied
    /// in memory are **not** undone — see the type's documentation.
    pub fn rollback(mut self) -> Result<()> {
        let tx_id = self.tx_id;
        self.session_mut().wal.rollback_batch(tx_id)?;
        self.committed = true; // suppress the Drop rollback, we already did it
        Ok(())
    }
}

impl<'a> Drop for BatchSession<'a> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            let _ = session.wal.rollback_batch(self.tx_id);
        }
    }
}

fn resolve_bound(atoms: &AtomStore, text: Option<&str>) -> Option<AtomId> {
    let text = text?;
    atoms.get_id(text.as_bytes()).as_option()
}

fn resolve_bound_graph(atoms: &AtomStore, text: Option<&str>) -> Option<AtomId> {
    match text {
        None => None,
        Some("") => Some(AtomId::NIL),
        Some(text) => atoms.get_id(text.as_bytes()).checked(),
    }
}

fn intern_graph(atoms: &mut AtomStore, graph: &str) -> Result<AtomId> {
    if graph.is_empty() {
        Ok(AtomId::NIL)
    } else {
        Ok(atoms.intern(graph.as_bytes())?)
    }
}

fn lookup_quad(
    atoms: &AtomStore,
    graph: &str,
    subject: &str,
    predicate: &str,
    object: &str,
) -> Option<(AtomId, AtomId, AtomId, AtomId)> {
    let g = if graph.is_empty() {
        AtomId::NIL
    } else {
        atoms.get_id(graph.as_bytes()).checked()?
    };
    let s = atoms.get_id(subject.as_bytes()).checked()?;
    let p = atoms.get_id(predicate.as_bytes()).checked()?;
    let o = atoms.get_id(object.as_bytes()).checked()?;
    Some((g, s, p, o))
}

#[allow(clippy::too_many_arguments)]
fn build_entry(
    g: AtomId,
    s: AtomId,
    p: AtomId,
    o: AtomId,
    valid_from: i64,
    valid_to: i64,
    transaction_time: i64,
    now: i64,
) -> TemporalQuadEntry {
    TemporalQuadEntry {
        quad: Quad::new(g, s, p, o),
        valid_from,
        valid_to,
        transaction_time,
        is_deleted: false,
        created_at: now,
        modified_at: now,
        version: 1,
    }
}

/// Apply one recovered WAL record directly to the indexes, skipping the WAL
/// entirely (it is already durable — that's why this record exists).
/// `QuadIndex::insert` is idempotent for an exact-duplicate key, which is
/// what makes this safe to call for a record whose index mutation had
/// already reached disk before the crash that necessitated replay.
fn apply_wal_record(indexes: &mut Indexes, record: &WalRecord, recovery_stamp: i64) -> Result<()> {
    match record.op {
        WalOp::Add => {
            let entry = build_entry(
                AtomId::new(record.graph),
                AtomId::new(record.subject),
                AtomId::new(record.predicate),
                AtomId::new(record.object),
                record.valid_from,
                record.valid_to,
                record.tx_id as i64,
                recovery_stamp,
            );
            indexes.insert(&entry)?;
        }
        WalOp::Delete => {
            indexes.mark_deleted(
                record.graph,
                record.subject,
                record.predicate,
                record.object,
                record.valid_from,
                record.tx_id as i64,
            )?;
        }
        WalOp::Checkpoint => {}
    }
    Ok(())
}

fn path_identity(dir: &Path) -> u64 {
    use std::hash::{Hash, Hasher};
    let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    let mut hasher = FxHasher::default();
    canonical.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercury_core::VALID_TO_FOREVER;
    use tempfile::tempdir;

    fn open_store(dir: &Path) -> QuadStore {
        QuadStore::open(dir, MercuryConfig::for_testing()).unwrap()
    }

    #[test]
    fn add_then_query_current_round_trips() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.add_current("", "alice", "knows", "bob").unwrap();

        let rows: Vec<_> = store
            .query_current(None, Some("alice"), None, None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].subject, "alice");
        assert_eq!(rows[0].object, "bob");
        assert_eq!(rows[0].graph, "");
    }

    #[test]
    fn delete_of_unknown_atom_returns_false_not_error() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        assert!(!store.delete_current("", "nobody", "knows", "noone").unwrap());
    }

    #[test]
    fn add_then_delete_then_current_query_is_empty_but_history_has_both() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.add_current("", "alice", "knows", "bob").unwrap();
        assert!(store.delete_current("", "alice", "knows", "bob").unwrap());

        let current: Vec<_> = store
            .query_current(None, Some("alice"), None, None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert!(current.is_empty());

        let history: Vec<_> = store
            .query_evolution(None, Some("alice"), None, None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_deleted);
    }

    #[test]
    fn batch_commit_is_observable_after_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = open_store(dir.path());
            let mut batch = store.begin_batch().unwrap();
            batch.add_batched("", "a", "p", "1", 0, VALID_TO_FOREVER).unwrap();
            batch.add_batched("", "b", "p", "2", 0, VALID_TO_FOREVER).unwrap();
            batch.commit().unwrap();
            store.dispose().unwrap();
        }
        let store = open_store(dir.path());
        let rows: Vec<_> = store
            .query_current(None, None, Some("p"), None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn batch_rollback_does_not_persist_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = open_store(dir.path());
            let mut batch = store.begin_batch().unwrap();
            batch.add_batched("", "a", "p", "1", 0, VALID_TO_FOREVER).unwrap();
            batch.rollback().unwrap();
            store.dispose().unwrap();
        }
        let store = open_store(dir.path());
        let rows: Vec<_> = store
            .query_current(None, None, Some("p"), None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn dropped_batch_without_commit_rolls_back() {
        let dir = tempdir().unwrap();
        {
            let store = open_store(dir.path());
            {
                let mut batch = store.begin_batch().unwrap();
                batch.add_batched("", "a", "p", "1", 0, VALID_TO_FOREVER).unwrap();
                // dropped without commit/rollback
            }
            store.dispose().unwrap();
        }
        let store = open_store(dir.path());
        let rows: Vec<_> = store
            .query_current(None, None, Some("p"), None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn named_graphs_skips_default_graph() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.add_current("", "a", "p", "1").unwrap();
        store.add_current("g1", "a", "p", "2").unwrap();
        store.add_current("g2", "a", "p", "3").unwrap();
        let mut graphs = store.named_graphs().unwrap();
        graphs.sort();
        assert_eq!(graphs, vec!["g1".to_string(), "g2".to_string()]);
    }

    #[test]
    fn live_quads_as_of_excludes_tombstones() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.add_current("", "a", "p", "1").unwrap();
        store.add_current("", "b", "p", "2").unwrap();
        store.delete_current("", "a", "p", "1").unwrap();

        let rows: Vec<_> = store.live_quads_as_of(now_millis()).unwrap().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].subject, "b");
    }

    #[test]
    fn disposed_store_rejects_further_operations() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.dispose().unwrap();
        assert!(matches!(
            store.add_current("", "a", "p", "1"),
            Err(EngineError::ObjectDisposed)
        ));
        // Idempotent.
        assert!(store.dispose().is_ok());
    }

    #[test]
    fn query_with_unresolved_bound_value_returns_empty_not_full_scan() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.add_current("", "alice", "knows", "bob").unwrap();
        let rows: Vec<_> = store
            .query_current(None, Some("nobody"), None, None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn query_with_subject_and_predicate_bound_does_not_drop_predicate_constraint() {
        // Subject + predicate both bound selects the `Gspo` ordering, whose
        // leading prefix is (graph, subject, predicate) -- but this used to
        // mask the predicate bind to `None` before handing it to the index,
        // silently matching every predicate for the bound subject.
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.add_current("", "alice", "knows", "bob").unwrap();
        store.add_current("", "alice", "likes", "cake").unwrap();

        let rows: Vec<_> = store
            .query_current(None, Some("alice"), Some("knows"), None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].predicate, "knows");
        assert_eq!(rows[0].object, "bob");
    }

    #[test]
    fn query_with_predicate_and_object_bound_does_not_drop_object_constraint() {
        // Predicate + object bound (subject unbound) selects `Gpos`, whose
        // leading prefix is (graph, predicate, object, subject) -- this one
        // already has a contiguous prefix covering both bound columns, but
        // is included alongside the subject+predicate case above for
        // symmetry across the bind-pattern matrix.
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.add_current("", "alice", "age", "30").unwrap();
        store.add_current("", "bob", "age", "31").unwrap();

        let rows: Vec<_> = store
            .query_current(None, None, Some("age"), Some("30"))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].subject, "alice");
    }

    #[test]
    fn temporal_overwrite_truncates_prior_open_interval() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.add("", "alice", "age", "30", 0, VALID_TO_FOREVER).unwrap();
        store.add("", "alice", "age", "31", 1000, VALID_TO_FOREVER).unwrap();

        let at_500: Vec<_> = store
            .query_as_of(None, Some("alice"), Some("age"), None, 500)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(at_500.len(), 1);
        assert_eq!(at_500[0].object, "30");

        let at_1500: Vec<_> = store
            .query_as_of(None, Some("alice"), Some("age"), None, 1500)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(at_1500.len(), 1);
        assert_eq!(at_1500[0].object, "31");
    }

    #[test]
    fn query_changes_finds_transaction_time_window() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.add_current("", "a", "p", "1").unwrap();
        store.add_current("", "b", "p", "2").unwrap();
        let rows: Vec<_> = store.query_changes(0, i64::MAX).unwrap().collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn clear_empties_every_subsystem() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        store.add_current("", "a", "p", "1").unwrap();
        store.clear().unwrap();
        let rows: Vec<_> = store
            .query_current(None, None, None, None)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert!(rows.is_empty());
        assert_eq!(store.stats().total_triples, 0);
    }
}
