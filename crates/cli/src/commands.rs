use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline from a project config file to completion.
    Run {
        #[arg(long, help = "Project config file path (.json, .yaml, .yml)")]
        config: String,

        #[arg(long, help = "Identifier for this run; defaults to the project id")]
        run_id: Option<String>,

        #[arg(long, help = "Directory pipeline logs are persisted to", default_value = "./logs")]
        log_dir: String,

        #[arg(long, help = "If specified, writes the final pipeline log to this file instead of stdout")]
        output: Option<String>,

        #[arg(long, help = "Load additional ${name} substitution variables from a KEY=VALUE file")]
        env_file: Option<String>,
    },
    /// Print the persisted pipeline log for a previous or still-running run.
    Status {
        #[arg(long, help = "Pipeline id to inspect")]
        pipeline_id: String,

        #[arg(long, help = "Directory pipeline logs are persisted to", default_value = "./logs")]
        log_dir: String,
    },
    /// Test a connection string against a given driver.
    TestConn {
        /// Data format: "mysql", "postgres"
        #[arg(long)]
        format: String,

        /// Connection string
        #[arg(long)]
        conn_str: String,
    },
}
