use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use prov_cpl::prelude::*;
use prov_cpl::test_utils::{FaultInjectingDriver, FaultPlan, FaultPoint};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::args::SimConfig;
use crate::logging::EventLog;
use crate::model::{Ledger, ObjectRecord, Op, RelationRecord};
use crate::oracle;

/// State every worker shares.
struct Shared<'a> {
    config: &'a SimConfig,
    backend: &'a RelationalBackend,
    plan: &'a FaultPlan,
    session: SessionId,
    deadline: Option<Instant>,
}

/// What one worker did, handed to the oracle afterwards.
pub(crate) struct WorkerReport {
    pub(crate) ledger: Ledger,
    pub(crate) steps: u64,
    pub(crate) gave_up: u64,
    pub(crate) reconnects: u64,
}

pub(crate) fn run(config: &SimConfig) -> Result<(), String> {
    let (_dir, path) = database_path(config)?;
    let driver = FaultInjectingDriver::new(Arc::new(SqliteDriver::new_default().with_schema()));
    let plan = driver.plan();
    let options = BackendOptions::builder()
        .pool_size(config.pool_size)
        .db_type(DbType::Sqlite)
        .finish();
    let backend = RelationalBackend::connect(
        Arc::new(driver),
        &format!("Database={};", path.display()),
        options,
    )
    .map_err(|err| format!("connect: {err}"))?;
    let session = backend
        .create_session(&SessionDescriptor::for_current_process())
        .map_err(|err| format!("create session: {err}"))?;

    let shared = Shared {
        config,
        backend: &backend,
        plan: &plan,
        session,
        deadline: config
            .duration_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms)),
    };

    let started = Instant::now();
    let results: Vec<Result<WorkerReport, String>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.workers)
            .map(|index| {
                let shared = &shared;
                scope.spawn(move || worker(shared, index))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err("worker panicked".to_string()))
            })
            .collect()
    });
    let reports = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    // leftover faults must not leak into the checks
    plan.clear();
    let stats = oracle::check(&backend, &plan, config.pool_size, &reports)?;

    let steps: u64 = reports.iter().map(|r| r.steps).sum();
    let gave_up: u64 = reports.iter().map(|r| r.gave_up).sum();
    tracing::info!(
        steps,
        gave_up,
        injected = plan.injected(),
        reconnects = backend.reconnect_count(),
        objects = stats.objects,
        relations = stats.relations,
        bundles = stats.bundles,
        elapsed = %humantime::format_duration(Duration::from_millis(
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
        )),
        "complete"
    );
    Ok(())
}

fn database_path(config: &SimConfig) -> Result<(Option<tempfile::TempDir>, PathBuf), String> {
    if let Some(path) = &config.db {
        return Ok((None, path.clone()));
    }
    let dir = tempfile::tempdir().map_err(|err| format!("temp dir: {err}"))?;
    let path = dir.path().join("sim.db");
    Ok((Some(dir), path))
}

fn worker(shared: &Shared<'_>, index: usize) -> Result<WorkerReport, String> {
    let config = shared.config;
    let mut rng = ChaCha8Rng::seed_from_u64(config.worker_seed(index));
    let mut ledger = Ledger::new(index);
    let mut events = EventLog::new(config.first_steps, config.tail_steps);
    let mut report_steps = 0;
    let mut gave_up = 0;
    let mut reconnects = 0;
    let max_steps = config.iterations.unwrap_or(u64::MAX);

    while report_steps < max_steps && shared.deadline.is_none_or(|d| Instant::now() < d) {
        if rng.random::<f64>() < config.link_failure_rate {
            shared
                .plan
                .fail_next(FaultPoint::Execute, FaultPlan::link_failure());
        }
        if rng.random::<f64>() < config.fetch_failure_rate {
            shared
                .plan
                .fail_next(FaultPoint::Fetch, FaultPlan::link_failure());
        }

        let op = next_op(&ledger, config, &mut rng);
        match apply(shared, &mut ledger, op, &mut rng) {
            Ok(label) => events.record(format!("step={report_steps} op={op:?} {label}")),
            Err(CplError::Statement(query)) => {
                gave_up += 1;
                events.record(format!("step={report_steps} op={op:?} gave up in {query}"));
                reconcile(shared, &mut ledger, op)
                    .map_err(|reason| fail(&events, index, &reason))?;
            }
            Err(err) => {
                let reason = format!("step {report_steps} op {op:?}: {err}");
                return Err(fail(&events, index, &reason));
            }
        }
        if op == Op::Reconnect {
            reconnects += 1;
        }
        report_steps += 1;
    }

    Ok(WorkerReport {
        ledger,
        steps: report_steps,
        gave_up,
        reconnects,
    })
}

fn fail(events: &EventLog, index: usize, reason: &str) -> String {
    events.dump(&format!("worker {index} failed: {reason}"));
    format!("worker {index}: {reason}")
}

fn next_op(ledger: &Ledger, config: &SimConfig, rng: &mut ChaCha8Rng) -> Op {
    if ledger.objects.is_empty() {
        return Op::CreateObject;
    }
    let mut weights = vec![
        (Op::CreateObject, 0.25),
        (Op::LookupObject, 0.20),
        (Op::AddRelation, 0.15),
        (Op::AddProperty, 0.10),
        (Op::ListAncestors, 0.10),
        (Op::CreateBundle, 0.05),
        (Op::Reconnect, config.reconnect_rate),
    ];
    if !ledger.bundles.is_empty() {
        weights.push((Op::AddToBundle, 0.08));
        weights.push((Op::ListBundle, 0.05));
        weights.push((Op::DeleteBundle, config.delete_rate));
    }
    choose_weighted(&weights, rng)
}

fn choose_weighted(items: &[(Op, f64)], rng: &mut ChaCha8Rng) -> Op {
    let total: f64 = items.iter().map(|(_, weight)| weight.max(0.0)).sum();
    if total <= f64::EPSILON {
        return items.first().map_or(Op::CreateObject, |(op, _)| *op);
    }
    let mut target = rng.random::<f64>() * total;
    for (op, weight) in items {
        let w = weight.max(0.0);
        if target <= w {
            return *op;
        }
        target -= w;
    }
    items.last().map_or(Op::CreateObject, |(op, _)| *op)
}

fn pick<T: Copy>(items: impl ExactSizeIterator<Item = T>, rng: &mut ChaCha8Rng) -> Option<T> {
    let len = items.len();
    if len == 0 {
        return None;
    }
    let mut items = items;
    items.nth(rng.random_range(0..len))
}

const OBJECT_TYPES: [ObjectType; 3] = [ObjectType::Entity, ObjectType::Activity, ObjectType::Agent];

/// Run one operation and check what it reports against the ledger.
fn apply(
    shared: &Shared<'_>,
    ledger: &mut Ledger,
    op: Op,
    rng: &mut ChaCha8Rng,
) -> Result<String, CplError> {
    let backend = shared.backend;
    let prefix = ledger.prefix.clone();
    match op {
        Op::CreateObject => {
            let name = format!("obj{}", ledger.objects.len() + ledger.deleted_objects.len());
            let object_type = OBJECT_TYPES[rng.random_range(0..OBJECT_TYPES.len())];
            let id = backend.create_object(&prefix, &name, object_type, shared.session)?;
            ledger.objects.insert(id, ObjectRecord { name, object_type });
            Ok(format!("id={id}"))
        }
        Op::LookupObject => {
            let Some((id, record)) = pick(ledger.objects.iter(), rng) else {
                return Ok("skip".into());
            };
            let found = backend.lookup_object(&prefix, &record.name, Some(record.object_type))?;
            if found != *id {
                return Err(CplError::Internal(format!(
                    "lookup of {} returned {found}, expected {id}",
                    record.name
                )));
            }
            Ok(format!("id={id}"))
        }
        Op::AddRelation => {
            let ids: Vec<ObjectId> = ledger.objects.keys().copied().collect();
            let (Some(from), Some(to)) = (pick(ids.iter(), rng), pick(ids.iter(), rng)) else {
                return Ok("skip".into());
            };
            let relation_type = RelationType::ALL[rng.random_range(0..18)];
            let id = backend.add_relation(*from, *to, relation_type)?;
            ledger.relations.insert(
                id,
                RelationRecord {
                    from: *from,
                    to: *to,
                    relation_type,
                },
            );
            Ok(format!("{from}-{}->{to} id={id}", relation_type.prov_name()))
        }
        Op::AddProperty => {
            let Some(id) = pick(ledger.objects.keys(), rng) else {
                return Ok("skip".into());
            };
            let value = format!("v{}", rng.random_range(0..1000));
            backend.add_object_property(*id, &prefix, "tag", &value)?;
            Ok(format!("id={id} tag={value}"))
        }
        Op::ListAncestors => {
            let Some(id) = pick(ledger.objects.keys(), rng).copied() else {
                return Ok("skip".into());
            };
            let mut seen = BTreeSet::new();
            backend.get_object_relations(id, Direction::Ancestors, &mut |info| {
                seen.insert(info.id);
                Ok(())
            })?;
            let expected = ledger
                .relations
                .iter()
                .filter(|(_, r)| r.from == id)
                .map(|(rid, _)| *rid);
            for rid in expected {
                if !seen.contains(&rid) {
                    return Err(CplError::Internal(format!(
                        "relation {rid} missing from ancestors of {id}"
                    )));
                }
            }
            Ok(format!("id={id} count={}", seen.len()))
        }
        Op::CreateBundle => {
            let name = format!("bundle{}", ledger.bundles.len() + ledger.deleted_bundles.len());
            let id = backend.create_bundle(&name, &prefix, shared.session)?;
            ledger.bundles.insert(id, BTreeSet::new());
            Ok(format!("id={id}"))
        }
        Op::AddToBundle => {
            let bundle = pick(ledger.bundles.keys(), rng).copied();
            let member = pick(ledger.objects.keys(), rng).copied();
            let (Some(bundle), Some(member)) = (bundle, member) else {
                return Ok("skip".into());
            };
            backend.add_relation(bundle, member, RelationType::InBundle)?;
            ledger.bundles.entry(bundle).or_default().insert(member);
            Ok(format!("bundle={bundle} member={member}"))
        }
        Op::ListBundle => {
            let Some((bundle, members)) = pick(ledger.bundles.iter(), rng) else {
                return Ok("skip".into());
            };
            let mut seen = BTreeSet::new();
            backend.get_bundle_objects(*bundle, &mut |info| {
                seen.insert(info.id);
                Ok(())
            })?;
            if !members.is_subset(&seen) {
                return Err(CplError::Internal(format!(
                    "bundle {bundle} lists {seen:?}, expected at least {members:?}"
                )));
            }
            Ok(format!("bundle={bundle} count={}", seen.len()))
        }
        Op::DeleteBundle => {
            let Some(bundle) = pick(ledger.bundles.keys(), rng).copied() else {
                return Ok("skip".into());
            };
            backend.delete_bundle(bundle)?;
            ledger.delete_bundle(bundle);
            Ok(format!("bundle={bundle}"))
        }
        Op::Reconnect => {
            backend.reconnect()?;
            Ok(format!("generation={}", backend.connection_generation()?))
        }
    }
}

/// Bring the ledger back in line after an operation gave up. A fetch failure
/// can hit after the store already applied the change.
fn reconcile(shared: &Shared<'_>, ledger: &mut Ledger, op: Op) -> Result<(), String> {
    let backend = shared.backend;
    match op {
        Op::DeleteBundle | Op::AddToBundle => {
            let bundles: Vec<BundleId> = ledger.bundles.keys().copied().collect();
            for bundle in bundles {
                match retry_read(|| backend.get_bundle_info(bundle)) {
                    Ok(_) => {}
                    Err(CplError::NotFound) => {
                        ledger.delete_bundle(bundle);
                        continue;
                    }
                    Err(err) => return Err(format!("reconcile bundle {bundle}: {err}")),
                }
                let mut members = BTreeSet::new();
                retry_read(|| {
                    members.clear();
                    backend.get_bundle_objects(bundle, &mut |info| {
                        members.insert(info.id);
                        Ok(())
                    })
                })
                .map_err(|err| format!("reconcile bundle {bundle}: {err}"))?;
                let known: BTreeSet<ObjectId> = ledger.objects.keys().copied().collect();
                ledger
                    .bundles
                    .insert(bundle, members.intersection(&known).copied().collect());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Reads may themselves hit a queued fetch failure; try a few times.
fn retry_read<T>(mut read: impl FnMut() -> Result<T, CplError>) -> Result<T, CplError> {
    let mut last = read();
    for _ in 0..8 {
        match last {
            Err(CplError::Statement(_)) => last = read(),
            other => return other,
        }
    }
    last
}
