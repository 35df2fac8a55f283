//! Shared Map-directive materialization: every executor that finds
//! `Map['key']` markers in its SQL (§4.6 step 7, §4.7) opens the same
//! create-temp-table-then-insert-rows sequence against its own
//! transaction before running the rewritten statement.

use connectors::sql::SqlTransaction;
use memory_store::MemoryStore;
use planner::Dialect;
use planner::rewriter::MapDirective;

use crate::error::ProcessingError;

pub async fn materialize_directives(
    tx: &mut SqlTransaction<'_>,
    dialect: &dyn Dialect,
    memory_store: &MemoryStore,
    directives: &[MapDirective],
) -> Result<(), ProcessingError> {
    for directive in directives {
        let dataset = memory_store.get(&directive.key).await?;
        let ddl = dialect.create_temp_table_sql(&directive.key, &dataset)?;
        tx.execute(&ddl).await?;
        for row in &dataset.rows {
            let insert = dialect.insert_temp_row_sql(&directive.key, &dataset, row);
            tx.execute(&insert).await?;
        }
    }
    Ok(())
}
