//! C6 Copy Job Executor: reads `job.select_sql` from the source in
//! `reader_count` hash-partitioned workers and writes to the
//! destination through `writer_count` transactional writers, per the
//! nine steps of §4.6.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use connectors::sql::explain::{MainTable, parse_mysql_explain, parse_postgres_explain};
use connectors::sql::DialectKind;
use engine_core::cancellation::CancelToken;
use model::execution::job::Job;
use model::log::{BatchLog, BatchStatus};
use model::records::row::RowBatch;
use planner::rewriter::{MapDirective, analyze_and_modify, extract_insert_table, extract_map_directives};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use crate::count_worker::CountPreflightWorker;
use crate::error::ProcessingError;
use crate::materialize::materialize_directives;
use connectors::error::ConnectorError;
use engine_runtime::RunContext;

/// Races any SQL-issuing future against `cancel`, as `cancellation.rs`
/// promises for "any SQL call" (§5) — not just the reader/writer channel
/// send and receive points.
async fn race<T>(
    cancel: &CancelToken,
    job_id: &str,
    fut: impl std::future::Future<Output = Result<T, ConnectorError>>,
) -> Result<T, ProcessingError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ProcessingError::Cancelled(job_id.to_string())),
        result = fut => Ok(result?),
    }
}

pub async fn run(
    ctx: &RunContext,
    job: &Job,
    count_worker: Option<&CountPreflightWorker>,
    cancel: CancelToken,
) -> Result<(), ProcessingError> {
    if cancel.is_cancelled() {
        return Err(ProcessingError::Cancelled(job.job_id.to_string()));
    }

    let raw_select = job
        .select_sql
        .as_deref()
        .ok_or_else(|| ProcessingError::MissingSelect(job.job_id.to_string()))?;
    if job.insert_sql.is_none() {
        return Err(ProcessingError::MissingInsert(job.job_id.to_string()));
    }

    let substituted = ctx.variables.substitute(raw_select);
    let (without_map, directives) = extract_map_directives(&substituted)?;
    let (has_where, clean_select) = analyze_and_modify(&without_map);

    let total = if directives.is_empty() {
        match count_worker {
            Some(worker) => worker.count(job.job_id.clone(), clean_select.clone()).await?,
            None => count_directly(ctx, &clean_select, &cancel, &job.job_id).await?,
        }
    } else {
        count_with_directives(ctx, &clean_select, &directives, &cancel, &job.job_id).await?
    };

    ctx.log_store
        .mutate(|log| {
            if let Some(jl) = log.job_mut(job.job_id.as_str()) {
                jl.total = Some(total);
            }
        })
        .await
        .ok();

    let main_table = discover_main_table(ctx, &clean_select, &directives, &cancel, &job.job_id).await?;

    let page = job.records_per_page.max(1);
    let reader_count = if total <= page as u64 { 1 } else { ctx.concurrency.max(1) };
    let writer_count = ctx.concurrency.max(1);

    info!(
        job_id = %job.job_id,
        total,
        reader_count,
        writer_count,
        "starting copy job"
    );

    let (batch_tx, batch_rx) = mpsc::channel::<RowBatch>((5 * ctx.concurrency.max(1)) as usize);
    let batch_rx = Arc::new(Mutex::new(batch_rx));

    let processed = Arc::new(AtomicU64::new(0));
    let failed = Arc::new(AtomicBool::new(false));

    let mut writer_handles = Vec::with_capacity(writer_count as usize);
    for _ in 0..writer_count {
        writer_handles.push(tokio::spawn(run_writer(
            ctx.clone(),
            job.clone(),
            batch_rx.clone(),
            processed.clone(),
            failed.clone(),
            cancel.clone(),
        )));
    }

    let mut reader_handles = Vec::with_capacity(reader_count as usize);
    for i in 0..reader_count {
        reader_handles.push(tokio::spawn(run_reader(
            ctx.clone(),
            job.clone(),
            clean_select.clone(),
            has_where,
            directives.clone(),
            main_table.clone(),
            i,
            reader_count,
            batch_tx.clone(),
            failed.clone(),
            cancel.clone(),
        )));
    }
    drop(batch_tx);

    for handle in reader_handles {
        let _ = handle.await;
    }
    for handle in writer_handles {
        let _ = handle.await;
    }

    let processed_total = processed.load(Ordering::SeqCst);
    let any_failed = failed.load(Ordering::SeqCst) || cancel.is_cancelled();

    if any_failed || processed_total < total {
        if ctx.pipeline.cleanup_on_failure {
            cleanup_destination(ctx, job).await;
        }
        return Err(ProcessingError::Incomplete {
            job_id: job.job_id.to_string(),
            processed: processed_total,
            total,
        });
    }

    Ok(())
}

async fn count_directly(
    ctx: &RunContext,
    clean_select: &str,
    cancel: &CancelToken,
    job_id: &str,
) -> Result<u64, ProcessingError> {
    let sql = ctx.source_dialect.total_count_sql(clean_select);
    let mut conn = ctx.source_pool.acquire().await?;
    let total = race(cancel, job_id, conn.query_scalar_i64(&sql)).await?;
    Ok(total.unwrap_or(0).max(0) as u64)
}

async fn count_with_directives(
    ctx: &RunContext,
    clean_select: &str,
    directives: &[MapDirective],
    cancel: &CancelToken,
    job_id: &str,
) -> Result<u64, ProcessingError> {
    let mut conn = ctx.source_pool.acquire().await?;
    let mut tx = conn.begin().await?;
    materialize_directives(&mut tx, ctx.source_dialect.as_ref(), &ctx.memory_store, directives).await?;
    let sql = ctx.source_dialect.total_count_sql(clean_select);
    let rows = race(cancel, job_id, tx.query_rows(&sql)).await?;
    let total = rows
        .first()
        .and_then(|r| r.values().next())
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
        .max(0) as u64;
    tx.rollback().await?;
    Ok(total)
}

async fn discover_main_table(
    ctx: &RunContext,
    clean_select: &str,
    directives: &[MapDirective],
    cancel: &CancelToken,
    job_id: &str,
) -> Result<MainTable, ProcessingError> {
    let explain_sql = ctx.source_dialect.explain_sql(clean_select);
    let mut conn = ctx.source_pool.acquire().await?;
    let kind = conn.dialect_kind();

    // `clean_select` may reference a Map-directive temp table that only
    // exists inside a reader's own transaction (§4.6 step 7); EXPLAIN it
    // the same way here, in a throwaway transaction that's rolled back
    // once the plan has been read.
    let rows = if directives.is_empty() {
        match race(cancel, job_id, conn.query_rows(&explain_sql)).await {
            Ok(rows) => rows,
            Err(e @ ProcessingError::Cancelled(_)) => return Err(e),
            Err(ProcessingError::Connector(e)) if kind == DialectKind::Postgres => {
                return Err(e.into());
            }
            Err(_) => Vec::new(),
        }
    } else {
        let mut tx = conn.begin().await?;
        materialize_directives(&mut tx, ctx.source_dialect.as_ref(), &ctx.memory_store, directives).await?;
        let rows = match race(cancel, job_id, tx.query_rows(&explain_sql)).await {
            Ok(rows) => rows,
            Err(e @ ProcessingError::Cancelled(_)) => return Err(e),
            Err(ProcessingError::Connector(e)) if kind == DialectKind::Postgres => {
                return Err(e.into());
            }
            Err(_) => Vec::new(),
        };
        tx.rollback().await?;
        rows
    };

    let table = match kind {
        DialectKind::Postgres => parse_postgres_explain(&rows),
        DialectKind::MySql => parse_mysql_explain(&rows),
        _ => None,
    };

    Ok(table.unwrap_or(MainTable { schema: None, name: String::new(), alias: None }))
}

enum ReaderOutcome {
    Ok,
    Cancelled,
    Failed(ProcessingError),
}

#[allow(clippy::too_many_arguments)]
async fn run_reader(
    ctx: RunContext,
    job: Job,
    clean_select: String,
    has_where: bool,
    directives: Vec<MapDirective>,
    main_table: MainTable,
    worker_index: u32,
    worker_count: u32,
    batch_tx: mpsc::Sender<RowBatch>,
    failed: Arc<AtomicBool>,
    cancel: CancelToken,
) {
    let outcome = read(
        &ctx,
        &job,
        &clean_select,
        has_where,
        &directives,
        &main_table,
        worker_index,
        worker_count,
        &batch_tx,
        &cancel,
    )
    .await;

    if let ReaderOutcome::Failed(e) = &outcome {
        warn!(job_id = %job.job_id, worker_index, error = %e, "reader failed");
    }
    if !matches!(outcome, ReaderOutcome::Ok) {
        failed.store(true, Ordering::SeqCst);
        cancel.cancel();
    }
}

#[allow(clippy::too_many_arguments)]
async fn read(
    ctx: &RunContext,
    job: &Job,
    clean_select: &str,
    has_where: bool,
    directives: &[MapDirective],
    main_table: &MainTable,
    worker_index: u32,
    worker_count: u32,
    batch_tx: &mpsc::Sender<RowBatch>,
    cancel: &CancelToken,
) -> ReaderOutcome {
    let partitioned_sql = match ctx.source_dialect.select_by_hash_sql(
        job,
        clean_select,
        has_where,
        worker_index,
        worker_count,
        main_table,
    ) {
        Ok(sql) => sql,
        Err(e) => return ReaderOutcome::Failed(e.into()),
    };

    let mut conn = match ctx.source_pool.acquire().await {
        Ok(conn) => conn,
        Err(e) => return ReaderOutcome::Failed(e.into()),
    };

    let rows = if directives.is_empty() {
        match race(cancel, job.job_id.as_str(), conn.query_rows(&partitioned_sql)).await {
            Ok(rows) => rows,
            Err(ProcessingError::Cancelled(_)) => return ReaderOutcome::Cancelled,
            Err(e) => return ReaderOutcome::Failed(e),
        }
    } else {
        let mut tx = match conn.begin().await {
            Ok(tx) => tx,
            Err(e) => return ReaderOutcome::Failed(e.into()),
        };
        if let Err(e) = materialize_directives(&mut tx, ctx.source_dialect.as_ref(), &ctx.memory_store, directives).await {
            return ReaderOutcome::Failed(e);
        }
        let rows = match race(cancel, job.job_id.as_str(), tx.query_rows(&partitioned_sql)).await {
            Ok(rows) => rows,
            Err(ProcessingError::Cancelled(_)) => return ReaderOutcome::Cancelled,
            Err(e) => return ReaderOutcome::Failed(e),
        };
        if let Err(e) = tx.rollback().await {
            return ReaderOutcome::Failed(e.into());
        }
        rows
    };

    let page = job.records_per_page.max(1) as usize;
    for chunk in rows.chunks(page) {
        tokio::select! {
            _ = cancel.cancelled() => return ReaderOutcome::Cancelled,
            send_result = batch_tx.send(RowBatch::new(chunk.to_vec())) => {
                if send_result.is_err() {
                    return ReaderOutcome::Cancelled;
                }
            }
        }
    }

    ReaderOutcome::Ok
}

enum WriterOutcome {
    Ok,
    Cancelled,
    Failed(ProcessingError),
}

async fn run_writer(
    ctx: RunContext,
    job: Job,
    batch_rx: Arc<Mutex<mpsc::Receiver<RowBatch>>>,
    processed: Arc<AtomicU64>,
    failed: Arc<AtomicBool>,
    cancel: CancelToken,
) {
    let outcome = write(&ctx, &job, &batch_rx, &processed, &cancel).await;

    if let WriterOutcome::Failed(e) = &outcome {
        warn!(job_id = %job.job_id, error = %e, "writer failed");
    }
    if !matches!(outcome, WriterOutcome::Ok) {
        failed.store(true, Ordering::SeqCst);
        cancel.cancel();
    }
}

enum Next {
    Cancelled,
    Closed,
    Batch(RowBatch),
}

async fn write(
    ctx: &RunContext,
    job: &Job,
    batch_rx: &Arc<Mutex<mpsc::Receiver<RowBatch>>>,
    processed: &Arc<AtomicU64>,
    cancel: &CancelToken,
) -> WriterOutcome {
    let mut conn = match ctx.destination_pool.acquire().await {
        Ok(conn) => conn,
        Err(e) => return WriterOutcome::Failed(e.into()),
    };
    let mut tx = match conn.begin().await {
        Ok(tx) => tx,
        Err(e) => return WriterOutcome::Failed(e.into()),
    };

    let mut offset = 0u64;

    loop {
        let next = {
            let mut guard = batch_rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => Next::Cancelled,
                maybe = guard.recv() => match maybe {
                    Some(batch) => Next::Batch(batch),
                    None => Next::Closed,
                },
            }
        };

        let batch = match next {
            Next::Cancelled => {
                tx.rollback().await.ok();
                return WriterOutcome::Cancelled;
            }
            Next::Closed => break,
            Next::Batch(batch) => batch,
        };

        if batch.is_empty() {
            continue;
        }

        let mut batch_log = BatchLog::started(offset, batch.len() as u32);
        offset += batch.len() as u64;

        let insert_sql = match ctx.destination_dialect.build_insert(job, &batch.rows) {
            Ok(sql) => sql,
            Err(e) => {
                batch_log.fail(e.to_string(), "sql_syntax_error".to_string(), None);
                record_batch(ctx, job, batch_log).await;
                tx.rollback().await.ok();
                return WriterOutcome::Failed(e.into());
            }
        };

        match race(cancel, job.job_id.as_str(), tx.execute(&insert_sql)).await {
            Ok(_) => {
                processed.fetch_add(batch.len() as u64, Ordering::SeqCst);
                batch_log.complete(batch.len() as u64);
                ctx.metrics.increment_records(batch.len() as u64).await;
                ctx.metrics.increment_batches(1);
                record_batch(ctx, job, batch_log).await;
            }
            Err(ProcessingError::Cancelled(_)) => {
                tx.rollback().await.ok();
                return WriterOutcome::Cancelled;
            }
            Err(e) => {
                let kind = e.classify();
                batch_log.fail(e.to_string(), kind.as_str().to_string(), None);
                ctx.metrics.increment_failures(1);
                record_batch(ctx, job, batch_log).await;
                tx.rollback().await.ok();
                return WriterOutcome::Failed(e);
            }
        }
    }

    match tx.commit().await {
        Ok(()) => WriterOutcome::Ok,
        Err(e) => WriterOutcome::Failed(e.into()),
    }
}

async fn record_batch(ctx: &RunContext, job: &Job, batch_log: BatchLog) {
    let rows = batch_log.rows;
    let is_ok = matches!(batch_log.status, BatchStatus::Done);
    ctx.log_store
        .mutate(|log| {
            if let Some(jl) = log.job_mut(job.job_id.as_str()) {
                if is_ok {
                    jl.processed += rows;
                }
                jl.batches.push(batch_log);
            }
        })
        .await
        .ok();
}

/// Best-effort cleanup after a failed copy job (§7): deletes everything
/// from the insert target. Opt-in via `pipeline.cleanup_on_failure`
/// since the delete does not distinguish rows authored by this pipeline
/// from pre-existing ones.
async fn cleanup_destination(ctx: &RunContext, job: &Job) {
    let Some(insert_sql) = job.insert_sql.as_deref() else {
        return;
    };
    let Ok(table) = extract_insert_table(insert_sql) else {
        warn!(job_id = %job.job_id, "could not determine cleanup target table");
        return;
    };
    let delete_sql = format!("DELETE FROM {table}");
    match ctx.destination_pool.acquire().await {
        Ok(mut conn) => {
            if let Err(e) = conn.execute(&delete_sql).await {
                warn!(job_id = %job.job_id, error = %e, "cleanup delete failed");
            }
        }
        Err(e) => warn!(job_id = %job.job_id, error = %e, "cleanup could not acquire connection"),
    }
}
