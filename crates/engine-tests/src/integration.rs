#[cfg(test)]
mod tests {
    use crate::reset_postgres_schema;
    use crate::utils::{
        condition_job, copy_job, edge, execute, memory_select_job, new_controller,
        project_config, row_count, run_pipeline,
    };
    use engine_processing::ProcessingExecutorFactory;
    use model::log::{JobStatus, PipelineStatus};
    use std::time::Duration;
    use tracing_test::traced_test;

    /// S1 — Trivial copy: 3 rows, single job, destination has the same 3
    /// rows and the job/pipeline logs report a clean completion.
    #[traced_test]
    #[tokio::test]
    async fn s1_trivial_copy() {
        reset_postgres_schema().await;
        execute("CREATE TABLE src_t1 (a int, b text)").await;
        execute("INSERT INTO src_t1 VALUES (1,'x'), (2,'y'), (3,'z')").await;
        execute("CREATE TABLE dst_t1 (a int, b text)").await;

        let job = copy_job(
            "copy1",
            "SELECT a, b FROM src_t1",
            "INSERT INTO dst_t1 (a,b)",
            &["a", "b"],
            10,
        );
        let config = project_config("s1", 2, vec![job]);
        let log = run_pipeline(config).await;

        assert_eq!(log.status, PipelineStatus::Done);
        assert_eq!(log.jobs.len(), 1);
        let jl = &log.jobs[0];
        assert_eq!(jl.status, JobStatus::Done);
        assert_eq!(jl.processed, 3);
        assert_eq!(jl.total, Some(3));
        assert_eq!(row_count("dst_t1").await, 3);
    }

    /// S2 — WHERE-aware hashing: a filtered select over a larger table,
    /// copied with concurrency 4; every matching row lands exactly once.
    #[traced_test]
    #[tokio::test]
    async fn s2_where_aware_hash_partitioning() {
        reset_postgres_schema().await;
        execute("CREATE TABLE src_t2 (id int, v int)").await;
        let mut values = Vec::new();
        for i in 0..2000 {
            let v = if i % 7 == 0 { "NULL".to_string() } else { i.to_string() };
            values.push(format!("({i},{v})"));
        }
        execute(&format!("INSERT INTO src_t2 VALUES {}", values.join(","))).await;
        execute("CREATE TABLE dst_t2 (id int, v int)").await;

        let job = copy_job(
            "copy2",
            "SELECT id, v FROM src_t2 WHERE v IS NOT NULL",
            "INSERT INTO dst_t2 (id,v)",
            &["id", "v"],
            100,
        );
        let config = project_config("s2", 4, vec![job]);
        let log = run_pipeline(config).await;

        assert_eq!(log.status, PipelineStatus::Done);
        let expected = (0..2000i64).filter(|i| i % 7 != 0).count() as i64;
        assert_eq!(log.jobs[0].processed as i64, expected);
        assert_eq!(row_count("dst_t2").await, expected);
    }

    /// S3 — Batch failure rollback: a unique-constraint violation on the
    /// destination fails the job, rolls every writer back, and (because
    /// cleanup is enabled) wipes the destination table; the pipeline's
    /// final status follows `stop_on_error`.
    #[traced_test]
    #[tokio::test]
    async fn s3_duplicate_key_rolls_back_and_cleans_up() {
        reset_postgres_schema().await;
        execute("CREATE TABLE src_t3 (a int)").await;
        execute("INSERT INTO src_t3 VALUES (5), (5)").await;
        execute("CREATE TABLE dst_t3 (a int UNIQUE)").await;

        let mut job = copy_job(
            "copy3",
            "SELECT a FROM src_t3",
            "INSERT INTO dst_t3 (a)",
            &["a"],
            10,
        );
        job.stop_on_error = true;
        let config = project_config("s3", 1, vec![job]);
        let log = run_pipeline(config).await;

        assert_eq!(log.status, PipelineStatus::Error);
        assert_eq!(log.jobs[0].status, JobStatus::Error);
        // The duplicate-key classification lands on the failing batch;
        // the job log itself just records that it didn't finish (§7).
        let failed_batch = log.jobs[0]
            .batches
            .iter()
            .find(|b| b.error_type.is_some())
            .expect("expected a failed batch");
        assert_eq!(failed_batch.error_type.as_deref(), Some("duplicate_key_error"));
        // Cleanup is best-effort and unconditional on failure (§7): the
        // destination table ends up empty rather than half-written.
        assert_eq!(row_count("dst_t3").await, 0);
    }

    #[traced_test]
    #[tokio::test]
    async fn s3_variant_stop_on_error_false_does_not_fail_pipeline() {
        reset_postgres_schema().await;
        execute("CREATE TABLE src_t3b (a int)").await;
        execute("INSERT INTO src_t3b VALUES (5), (5)").await;
        execute("CREATE TABLE dst_t3b (a int UNIQUE)").await;

        let mut job = copy_job(
            "copy3b",
            "SELECT a FROM src_t3b",
            "INSERT INTO dst_t3b (a)",
            &["a"],
            10,
        );
        job.stop_on_error = false;
        let config = project_config("s3b", 1, vec![job]);
        let log = run_pipeline(config).await;

        assert_eq!(log.jobs[0].status, JobStatus::Error);
        assert_eq!(log.status, PipelineStatus::Done);
    }

    /// S4 — Condition gate false: the descendant copy job never starts.
    #[traced_test]
    #[tokio::test]
    async fn s4_false_condition_blocks_descendant() {
        reset_postgres_schema().await;
        execute("CREATE TABLE src_t4 (a int)").await;
        execute("INSERT INTO src_t4 VALUES (1)").await;
        execute("CREATE TABLE dst_t4 (a int)").await;

        let mut cond = condition_job("gate", "SELECT false", true);
        cond.stop_on_error = true;
        let copy = copy_job(
            "copy4",
            "SELECT a FROM src_t4",
            "INSERT INTO dst_t4 (a)",
            &["a"],
            10,
        );
        let config_jobs = vec![cond, copy];
        let mut config = project_config("s4", 1, config_jobs);
        config.connections = vec![edge("gate", "copy4")];
        let log = run_pipeline(config).await;

        assert_eq!(log.status, PipelineStatus::Error);
        let gate_log = log.jobs.iter().find(|j| j.job_id == "gate").unwrap();
        assert_eq!(gate_log.status, JobStatus::Error);
        assert!(!log.jobs.iter().any(|j| j.job_id == "copy4" && j.status == JobStatus::Done));
        assert_eq!(row_count("dst_t4").await, 0);
    }

    /// S5 — Map materialization: a memory-select stages a reference
    /// dataset, and a downstream copy job's `Map['...']` directive joins
    /// against it inside each reader's transaction.
    #[traced_test]
    #[tokio::test]
    async fn s5_map_directive_materialization() {
        reset_postgres_schema().await;
        execute("CREATE TABLE dst_products (sku text, price numeric)").await;
        execute("INSERT INTO dst_products VALUES ('sku-1', 9.99), ('sku-2', 4.50)").await;
        execute("CREATE TABLE src_orders (id int, sku text)").await;
        execute("INSERT INTO src_orders VALUES (1,'sku-1'), (2,'sku-2'), (3,'sku-1')").await;
        execute("CREATE TABLE dst_orders (id int, sku text)").await;

        let mem_select = memory_select_job(
            "mem1",
            "Cadastro de Produtos",
            "SELECT sku, price FROM dst_products",
            &["sku", "price"],
        );
        let copy = copy_job(
            "copy5",
            "SELECT src_orders.id, src_orders.sku FROM src_orders \
             JOIN cadastro_de_produtos ON cadastro_de_produtos.sku = src_orders.sku \
             Map['cadastro_de_produtos'];",
            "INSERT INTO dst_orders (id,sku)",
            &["id", "sku"],
            10,
        );
        let mut config = project_config("s5", 2, vec![mem_select, copy]);
        config.connections = vec![edge("mem1", "copy5")];
        let log = run_pipeline(config).await;

        assert_eq!(log.status, PipelineStatus::Done);
        assert_eq!(row_count("dst_orders").await, 3);
    }

    /// S6 — Cancellation: stopping an in-flight run rolls writers back,
    /// marks the pipeline stopped, and runs cleanup.
    #[traced_test]
    #[tokio::test]
    async fn s6_cancellation_stops_in_flight_copy() {
        reset_postgres_schema().await;
        execute("CREATE TABLE src_t6 (a int)").await;
        let values: Vec<String> = (0..50_000).map(|i| format!("({i})")).collect();
        execute(&format!("INSERT INTO src_t6 VALUES {}", values.join(","))).await;
        execute("CREATE TABLE dst_t6 (a int)").await;

        let job = copy_job(
            "copy6",
            "SELECT a FROM src_t6",
            "INSERT INTO dst_t6 (a)",
            &["a"],
            500,
        );
        let config = project_config("s6", 4, vec![job]);

        let controller = new_controller();
        let run_id = config.project_id.clone();
        let controller_for_run = controller.clone();
        let handle = tokio::spawn(async move {
            controller_for_run
                .run(run_id, config, &ProcessingExecutorFactory)
                .await
                .expect("pipeline run")
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        controller.stop("s6", "test requested cancellation").await.ok();

        let log = handle.await.expect("run task panicked");
        assert_eq!(log.status, PipelineStatus::Stopped);
    }
}
