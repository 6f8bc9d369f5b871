use std::collections::BTreeSet;

use prov_cpl::prelude::*;
use prov_cpl::test_utils::FaultPlan;
use prov_cpl::Query;

use crate::driver::WorkerReport;

#[derive(Debug, Default)]
pub(crate) struct OracleStats {
    pub(crate) objects: usize,
    pub(crate) relations: usize,
    pub(crate) bundles: usize,
}

/// Check handle accounting and that every row a worker recorded is still
/// reachable, and every row it deleted is gone.
pub(crate) fn check(
    backend: &RelationalBackend,
    plan: &FaultPlan,
    pool_size: usize,
    reports: &[WorkerReport],
) -> Result<OracleStats, String> {
    check_pools(backend, plan, pool_size)?;

    let explicit: u64 = reports.iter().map(|r| r.reconnects).sum();
    let allowed = explicit + u64::try_from(plan.injected()).unwrap_or(u64::MAX);
    if backend.reconnect_count() > allowed {
        return Err(format!(
            "{} reconnects for {allowed} injected failures and explicit reconnects",
            backend.reconnect_count()
        ));
    }

    let mut stats = OracleStats::default();
    for report in reports {
        let ledger = &report.ledger;
        for (id, record) in &ledger.objects {
            let info = backend
                .get_object_info(*id)
                .map_err(|err| format!("object {id}: {err}"))?;
            if info.name != record.name
                || info.object_type != record.object_type
                || info.prefix != ledger.prefix
            {
                return Err(format!("object {id} reads back as {info:?}, expected {record:?}"));
            }
            stats.objects += 1;
        }
        for id in &ledger.deleted_objects {
            expect_not_found(backend.get_object_info(*id), "deleted object", *id)?;
        }
        for (id, relation) in &ledger.relations {
            backend
                .lookup_relation(relation.from, relation.to, relation.relation_type)
                .map_err(|err| format!("relation {id}: {err}"))?;
            stats.relations += 1;
        }
        for (id, members) in &ledger.bundles {
            backend
                .get_bundle_info(*id)
                .map_err(|err| format!("bundle {id}: {err}"))?;
            let mut listed = BTreeSet::new();
            backend
                .get_bundle_objects(*id, &mut |info| {
                    listed.insert(info.id);
                    Ok(())
                })
                .map_err(|err| format!("bundle {id} objects: {err}"))?;
            if !members.is_subset(&listed) {
                return Err(format!("bundle {id} lost members: {members:?} vs {listed:?}"));
            }
            stats.bundles += 1;
        }
        for id in &ledger.deleted_bundles {
            expect_not_found(backend.get_bundle_info(*id), "deleted bundle", *id)?;
        }
    }

    check_pools(backend, plan, pool_size)?;
    Ok(stats)
}

fn check_pools(backend: &RelationalBackend, plan: &FaultPlan, pool_size: usize) -> Result<(), String> {
    for &query in Query::ALL {
        let available = backend
            .available_statements(query)
            .map_err(|err| format!("pool {}: {err}", query.name()))?;
        if available != pool_size {
            return Err(format!(
                "pool {} has {available} of {pool_size} statements",
                query.name()
            ));
        }
    }
    let expected = Query::ALL.len() * pool_size;
    if plan.live_statements() != expected {
        return Err(format!(
            "{} statement handles alive, expected {expected}",
            plan.live_statements()
        ));
    }
    if plan.open_connections() != 1 {
        return Err(format!("{} connections open", plan.open_connections()));
    }
    Ok(())
}

fn expect_not_found<T: std::fmt::Debug>(
    result: Result<T, CplError>,
    what: &str,
    id: CplId,
) -> Result<(), String> {
    match result {
        Err(CplError::NotFound) => Ok(()),
        other => Err(format!("{what} {id}: expected NotFound, got {other:?}")),
    }
}
