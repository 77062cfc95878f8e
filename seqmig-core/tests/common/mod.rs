//! In-process database and tracer doubles for engine tests.
//!
//! `FakeDatabase` understands the bookkeeping statements the engine issues
//! plus two test-only statements: `EFFECT <label>` records a side effect and
//! `FAIL` always errors.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use seqmig_core::{
    Database, DatabaseError, Dialect, Migration, MigrationMode, MigrationSpanAttributes,
    SpanHandle, SpanStatus, SqlValue, Tracer, Transaction,
};

/// Committed database state.
#[derive(Debug, Default)]
pub struct State {
    pub table_created: bool,
    pub rows: Vec<(i64, String)>,
    pub effects: Vec<String>,
    pub statements: Vec<String>,
}

/// Failures to inject.
#[derive(Debug, Default)]
pub struct Faults {
    pub unreachable: bool,
    pub count_fails: bool,
    pub stale_count: Option<i64>,
    pub fail_begin: bool,
    pub fail_insert_at: Option<i64>,
    pub fail_commit: bool,
    pub fail_rollback: bool,
}

#[derive(Clone, Default)]
pub struct FakeDatabase {
    state: Arc<Mutex<State>>,
    faults: Arc<Mutex<Faults>>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A database that already recorded `names` as applied.
    pub fn with_applied(names: &[&str]) -> Self {
        let db = Self::new();
        {
            let mut state = db.state.lock();
            state.table_created = true;
            state.rows = names
                .iter()
                .enumerate()
                .map(|(i, n)| (i as i64, n.to_string()))
                .collect();
        }
        db
    }

    pub fn faults(&self) -> parking_lot::MutexGuard<'_, Faults> {
        self.faults.lock()
    }

    pub fn rows(&self) -> Vec<(i64, String)> {
        self.state.lock().rows.clone()
    }

    pub fn versions(&self) -> Vec<String> {
        self.rows().into_iter().map(|(_, v)| v).collect()
    }

    pub fn effects(&self) -> Vec<String> {
        self.state.lock().effects.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    fn count(&self) -> Result<i64, DatabaseError> {
        let faults = self.faults.lock();
        if faults.unreachable {
            return Err(DatabaseError::connection("connection refused"));
        }
        if faults.count_fails {
            return Err(DatabaseError::query("permission denied"));
        }
        let state = self.state.lock();
        if !state.table_created {
            return Err(DatabaseError::query("no such table"));
        }
        Ok(faults.stale_count.unwrap_or(state.rows.len() as i64))
    }

    /// Apply a statement either to committed state or to a transaction's buffers.
    fn apply(
        &self,
        sql: &str,
        params: &[SqlValue],
        pending: Option<(&mut Vec<(i64, String)>, &mut Vec<String>)>,
    ) -> Result<u64, DatabaseError> {
        let faults = self.faults.lock();
        let mut state = self.state.lock();
        state.statements.push(sql.to_string());

        if faults.unreachable {
            return Err(DatabaseError::connection("connection refused"));
        }

        if sql.starts_with("CREATE TABLE IF NOT EXISTS") {
            state.table_created = true;
            return Ok(0);
        }

        if let Some(label) = sql.strip_prefix("EFFECT ") {
            match pending {
                Some((_, effects)) => effects.push(label.to_string()),
                None => state.effects.push(label.to_string()),
            }
            return Ok(1);
        }

        if sql.starts_with("INSERT INTO") {
            let (id, version) = match params {
                [SqlValue::Int(id), SqlValue::Text(version)] => (*id, version.clone()),
                other => return Err(DatabaseError::query(format!("bad params: {:?}", other))),
            };
            if faults.fail_insert_at == Some(id) {
                return Err(DatabaseError::query("value too long for type character varying"));
            }
            let taken = state.rows.iter().any(|(existing, _)| *existing == id)
                || pending
                    .as_ref()
                    .is_some_and(|(rows, _)| rows.iter().any(|(existing, _)| *existing == id));
            if taken {
                return Err(DatabaseError::unique_violation(format!(
                    "duplicate key value violates unique constraint (id)=({})",
                    id
                )));
            }
            match pending {
                Some((rows, _)) => rows.push((id, version)),
                None => state.rows.push((id, version)),
            }
            return Ok(1);
        }

        Err(DatabaseError::query(format!("syntax error at or near \"{}\"", sql)))
    }
}

#[async_trait]
impl Database for FakeDatabase {
    type Transaction = FakeTransaction;

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError> {
        self.apply(sql, params, None)
    }

    async fn execute_batch(&self, sql: &str) -> Result<(), DatabaseError> {
        self.apply(sql, &[], None).map(|_| ())
    }

    async fn query_count(&self, _sql: &str) -> Result<i64, DatabaseError> {
        self.count()
    }

    async fn begin(&self) -> Result<FakeTransaction, DatabaseError> {
        if self.faults.lock().fail_begin {
            return Err(DatabaseError::connection("could not begin"));
        }
        Ok(FakeTransaction {
            db: self.clone(),
            rows: Vec::new(),
            effects: Vec::new(),
        })
    }
}

pub struct FakeTransaction {
    db: FakeDatabase,
    rows: Vec<(i64, String)>,
    effects: Vec<String>,
}

#[async_trait]
impl Transaction for FakeTransaction {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, DatabaseError> {
        self.db
            .apply(sql, params, Some((&mut self.rows, &mut self.effects)))
    }

    async fn execute_batch(&mut self, sql: &str) -> Result<(), DatabaseError> {
        self.execute(sql, &[]).await.map(|_| ())
    }

    async fn commit(self) -> Result<(), DatabaseError> {
        if self.db.faults.lock().fail_commit {
            return Err(DatabaseError::connection("server closed the connection"));
        }
        let mut state = self.db.state.lock();
        state.rows.extend(self.rows);
        state.effects.extend(self.effects);
        Ok(())
    }

    async fn rollback(self) -> Result<(), DatabaseError> {
        if self.db.faults.lock().fail_rollback {
            return Err(DatabaseError::connection("broken pipe"));
        }
        Ok(())
    }
}

/// Transactional migration recording `EFFECT <name>`.
pub fn tx_effect(name: &str) -> Migration<FakeDatabase> {
    let effect = format!("EFFECT {}", name);
    Migration::<FakeDatabase>::transactional(name, move |tx| {
        let effect = effect.clone();
        Box::pin(async move {
            tx.execute(&effect, &[]).await?;
            Ok(())
        })
    })
}

/// Direct migration recording `EFFECT <name>`.
pub fn direct_effect(name: &str) -> Migration<FakeDatabase> {
    let effect = format!("EFFECT {}", name);
    Migration::<FakeDatabase>::direct(name, move |db| {
        let effect = effect.clone();
        Box::pin(async move {
            db.execute(&effect, &[]).await?;
            Ok(())
        })
    })
}

/// Transactional migration that records an effect, then fails.
pub fn tx_failing(name: &str) -> Migration<FakeDatabase> {
    let effect = format!("EFFECT {}", name);
    Migration::<FakeDatabase>::transactional(name, move |tx| {
        let effect = effect.clone();
        Box::pin(async move {
            tx.execute(&effect, &[]).await?;
            tx.execute("FAIL", &[]).await?;
            Ok(())
        })
    })
}

/// A span captured by [`RecordingTracer`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSpan {
    pub id: u64,
    pub parent: Option<u64>,
    pub name: &'static str,
    pub mode: Option<MigrationMode>,
    pub migration: Option<String>,
    pub position: Option<usize>,
    pub applied: Option<usize>,
    pub status: Option<SpanStatus>,
}

/// Tracer recording spans in the order they end.
#[derive(Clone, Default)]
pub struct RecordingTracer {
    started: Arc<Mutex<Vec<RecordedSpan>>>,
    ended: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl RecordingTracer {
    pub fn ended(&self) -> Vec<RecordedSpan> {
        self.ended.lock().clone()
    }

    fn start(&self, mut span: RecordedSpan) -> Box<dyn SpanHandle> {
        let mut started = self.started.lock();
        span.id = started.len() as u64 + 1;
        started.push(span.clone());
        Box::new(RecordingSpan {
            span: Mutex::new(span),
            ended: Arc::clone(&self.ended),
        })
    }
}

impl Tracer for RecordingTracer {
    fn start_run(&self) -> Box<dyn SpanHandle> {
        self.start(RecordedSpan {
            id: 0,
            parent: None,
            name: "migrate",
            mode: None,
            migration: None,
            position: None,
            applied: None,
            status: None,
        })
    }

    fn start_migration(
        &self,
        parent: &dyn SpanHandle,
        attributes: MigrationSpanAttributes<'_>,
    ) -> Box<dyn SpanHandle> {
        self.start(RecordedSpan {
            id: 0,
            parent: parent.span_id(),
            name: "migration",
            mode: Some(attributes.mode),
            migration: Some(attributes.name.to_string()),
            position: Some(attributes.position),
            applied: None,
            status: None,
        })
    }
}

struct RecordingSpan {
    span: Mutex<RecordedSpan>,
    ended: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl SpanHandle for RecordingSpan {
    fn record_applied(&self, applied: usize) {
        self.span.lock().applied = Some(applied);
    }

    fn span_id(&self) -> Option<u64> {
        Some(self.span.lock().id)
    }

    fn finish(self: Box<Self>, status: SpanStatus) {
        let mut span = self.span.into_inner();
        span.status = Some(status);
        self.ended.lock().push(span);
    }
}
