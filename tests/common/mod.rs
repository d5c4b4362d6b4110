//! Fakes shared by the integration tests.

#![allow(dead_code, missing_docs, clippy::panic)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeDelta, Utc};

use pos_recovery_agent::clock::{Clock, FixedClock};
use pos_recovery_agent::config::AgentConfig;
use pos_recovery_agent::dialog::{DialogAnswer, OperatorGate, Question};
use pos_recovery_agent::domain::{NewSnapshotRecord, SnapshotRecord, SnapshotStatus};
use pos_recovery_agent::error::AgentError;
use pos_recovery_agent::persistence::{
    ActivityProbe, InMemoryCatalog, SnapshotCatalog, StaticActivity,
};
use pos_recovery_agent::process::{
    CommandSpec, OutputMode, ProcessError, ProcessOutput, ProcessRunner,
};
use pos_recovery_agent::service::{RecoveryEngine, RecoveryLoop, SnapshotEngine};

/// `2024-01-15T12:00:00Z`, the reference instant of every scenario.
pub fn t0() -> DateTime<FixedOffset> {
    let Ok(t0) = DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z") else {
        panic!("valid timestamp");
    };
    t0
}

pub fn hours_before_t0(hours: i64) -> DateTime<Utc> {
    let Some(delta) = TimeDelta::try_hours(hours) else {
        panic!("valid delta");
    };
    t0().with_timezone(&Utc) - delta
}

/// Scenario configuration rooted at `backup_dir`, with no quiescence pause.
pub fn test_config(backup_dir: &Path) -> AgentConfig {
    AgentConfig {
        backup_dir: backup_dir.to_path_buf(),
        check_interval: Duration::from_millis(300_000),
        quiescence_delay: Duration::ZERO,
        recovery_delay: Duration::from_secs(10),
        ..AgentConfig::default()
    }
}

/// Inserts a `created` catalog entry captured `hours` before T0.
pub async fn seed_snapshot(catalog: &InMemoryCatalog, backup_dir: &Path, hours: i64) {
    let created_at = hours_before_t0(hours);
    let filename = format!("backup-{}.gz", created_at.format("%Y%m%d-%H%M%S"));
    let record = NewSnapshotRecord::created(
        filename.clone(),
        backup_dir.join(filename),
        created_at,
        12,
    );
    if catalog.insert(record).await.is_err() {
        panic!("seeding catalog failed");
    }
}

/// Clock starting at T0 that moves forward by `step` on every reading.
#[derive(Debug)]
pub struct SteppingClock {
    next: Mutex<DateTime<FixedOffset>>,
    step: TimeDelta,
}

impl SteppingClock {
    pub fn new(step: TimeDelta) -> Self {
        Self {
            next: Mutex::new(t0()),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let Ok(mut next) = self.next.lock() else {
            panic!("lock poisoned");
        };
        let now = *next;
        *next = now + self.step;
        now
    }
}

/// Process runner that records every command and replies per docker verb
/// (`exec`, `stop`, `run`, `start`) or per program for anything else.
#[derive(Debug)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<(CommandSpec, OutputMode)>>,
    exit_codes: Mutex<HashMap<String, i32>>,
    dump: Vec<u8>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            exit_codes: Mutex::new(HashMap::new()),
            dump: b"\x1f\x8b fake mongodump archive".to_vec(),
        }
    }

    /// Makes the command keyed by `verb` exit with `code`.
    pub fn fail(&self, verb: &str, code: i32) {
        let Ok(mut codes) = self.exit_codes.lock() else {
            panic!("lock poisoned");
        };
        codes.insert(verb.to_string(), code);
    }

    /// Clears a failure set with [`ScriptedRunner::fail`].
    pub fn succeed(&self, verb: &str) {
        let Ok(mut codes) = self.exit_codes.lock() else {
            panic!("lock poisoned");
        };
        codes.remove(verb);
    }

    pub fn calls(&self) -> Vec<(CommandSpec, OutputMode)> {
        let Ok(calls) = self.calls.lock() else {
            panic!("lock poisoned");
        };
        calls.clone()
    }

    /// Commands whose key (docker verb or program) is `verb`.
    pub fn calls_to(&self, verb: &str) -> Vec<CommandSpec> {
        self.calls()
            .into_iter()
            .filter(|(spec, _)| key_of(spec) == verb)
            .map(|(spec, _)| spec)
            .collect()
    }

    /// Docker verbs in call order.
    pub fn verbs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|(spec, _)| key_of(spec).to_string())
            .collect()
    }
}

fn key_of(spec: &CommandSpec) -> &str {
    if spec.program == "docker" {
        spec.args.first().map_or("", String::as_str)
    } else {
        spec.program.as_str()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        mode: OutputMode,
    ) -> Result<ProcessOutput, ProcessError> {
        let Ok(mut calls) = self.calls.lock() else {
            panic!("lock poisoned");
        };
        calls.push((spec.clone(), mode));
        drop(calls);

        let key = key_of(spec).to_string();
        let code = {
            let Ok(codes) = self.exit_codes.lock() else {
                panic!("lock poisoned");
            };
            codes.get(&key).copied()
        };
        if let Some(code) = code {
            return Err(ProcessError::NonZeroExit {
                program: spec.program.clone(),
                code: Some(code),
                stderr_tail: format!("{key} failed"),
            });
        }

        let stdout = match mode {
            OutputMode::Capture => self.dump.clone(),
            OutputMode::Inherit => Vec::new(),
        };
        Ok(ProcessOutput { stdout })
    }
}

/// Operator gate with a fixed answer.
#[derive(Debug)]
pub struct ScriptedGate {
    answer: DialogAnswer,
    asked: AtomicUsize,
}

impl ScriptedGate {
    pub fn new(answer: DialogAnswer) -> Self {
        Self {
            answer,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperatorGate for ScriptedGate {
    async fn ask(&self, _question: &Question) -> DialogAnswer {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// Engine that only counts calls.
#[derive(Debug, Default)]
pub struct CountingEngine {
    captures: AtomicUsize,
    restores: AtomicUsize,
}

impl CountingEngine {
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn restores(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecoveryEngine for CountingEngine {
    async fn capture(&self) -> Result<PathBuf, AgentError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(PathBuf::from("/b/backup-20240115-120000.gz"))
    }

    async fn restore(&self) -> Result<SnapshotRecord, AgentError> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        Err(AgentError::NoSnapshotAvailable)
    }
}

/// A full agent over fakes: real engine and loop, fake world.
#[derive(Debug)]
pub struct Harness {
    pub config: Arc<AgentConfig>,
    pub catalog: Arc<InMemoryCatalog>,
    pub runner: Arc<ScriptedRunner>,
    pub probe: Arc<StaticActivity>,
    pub gate: Arc<ScriptedGate>,
    pub engine: Arc<SnapshotEngine>,
    pub recovery: RecoveryLoop,
}

impl Harness {
    pub fn new(backup_dir: &Path, probe: StaticActivity, answer: DialogAnswer) -> Self {
        Self::with_clock(backup_dir, probe, answer, Arc::new(FixedClock::new(t0())))
    }

    pub fn with_clock(
        backup_dir: &Path,
        probe: StaticActivity,
        answer: DialogAnswer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(test_config(backup_dir));
        let catalog = Arc::new(InMemoryCatalog::new());
        let runner = Arc::new(ScriptedRunner::new());
        let probe = Arc::new(probe);
        let gate = Arc::new(ScriptedGate::new(answer));
        let engine = Arc::new(SnapshotEngine::new(
            Arc::clone(&config),
            Arc::clone(&catalog) as Arc<dyn SnapshotCatalog>,
            Arc::clone(&runner) as Arc<dyn ProcessRunner>,
            clock,
        ));
        let recovery = RecoveryLoop::new(
            Arc::clone(&config),
            Arc::clone(&probe) as Arc<dyn ActivityProbe>,
            Arc::clone(&gate) as Arc<dyn OperatorGate>,
            Arc::clone(&engine) as Arc<dyn RecoveryEngine>,
        );
        Self {
            config,
            catalog,
            runner,
            probe,
            gate,
            engine,
            recovery,
        }
    }

    pub async fn restorable_count(&self) -> usize {
        self.catalog
            .records()
            .await
            .iter()
            .filter(|r| r.status == SnapshotStatus::Created)
            .count()
    }
}
