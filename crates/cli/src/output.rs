use crate::error::CliError;
use model::log::PipelineLog;

fn report_json(log: &PipelineLog) -> Result<String, CliError> {
    serde_json::to_string_pretty(log).map_err(CliError::JsonSerialize)
}

pub async fn write_report(log: &PipelineLog, path: String) -> Result<(), CliError> {
    tokio::fs::write(path, report_json(log)?).await?;
    Ok(())
}

pub async fn print_report(log: &PipelineLog) -> Result<(), CliError> {
    println!("{}", report_json(log)?);
    Ok(())
}

pub fn print_summary_table(log: &PipelineLog) {
    println!("Pipeline '{}' ({})", log.project, log.pipeline_id);
    println!("status: {:?}", log.status);
    println!("{:<24} {:<10} {:>10} {:>10}", "job", "status", "processed", "total");
    for job in &log.jobs {
        println!(
            "{:<24} {:<10} {:>10} {:>10}",
            job.name,
            format!("{:?}", job.status),
            job.processed,
            job.total.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()),
        );
        if let Some(err) = &job.error {
            println!("  error: {err}");
        }
    }
}
