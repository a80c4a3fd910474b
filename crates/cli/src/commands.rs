use clap::{Args, Subcommand, ValueEnum};
use engine_config::settings::ErrorPolicy;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a job, resuming from its last checkpoint if it has one
    RunJob(RunJobArgs),

    /// Show the checkpoint and run history of a job
    Status {
        #[arg(long, help = "Job ID to inspect")]
        job_id: String,

        #[arg(long, help = "Print as JSON instead of a table")]
        json: bool,

        #[arg(long, help = "State directory (default: ~/.ferry/state)")]
        state_dir: Option<PathBuf>,
    },

    /// Forget the checkpoint and run history of a job
    Reset {
        #[arg(long, help = "Job ID to reset")]
        job_id: String,

        #[arg(long, help = "State directory (default: ~/.ferry/state)")]
        state_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunJobArgs {
    #[arg(long)]
    pub job_id: String,

    #[arg(long, help = "Delimited input file")]
    pub input: PathBuf,

    #[arg(long, help = "Records per committed chunk")]
    pub chunk_size: Option<usize>,

    #[arg(long, help = "JSON job settings; flags override its values")]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        default_value = "sqlite://ferry.db",
        help = "postgres://..., sqlite://<path> or a bare SQLite path"
    )]
    pub sink: String,

    #[arg(long)]
    pub table: Option<String>,

    #[arg(long, value_delimiter = ',', help = "Input field names, in column order")]
    pub fields: Option<Vec<String>>,

    #[arg(long)]
    pub delimiter: Option<char>,

    #[arg(long, help = "The first input line is a header")]
    pub header: bool,

    #[arg(long, value_enum)]
    pub on_transform_error: Option<PolicyArg>,

    #[arg(long, value_enum)]
    pub on_read_error: Option<PolicyArg>,

    #[arg(long, help = "Skipped records tolerated before the run fails")]
    pub skip_limit: Option<u64>,

    #[arg(long, help = "Retries per failed chunk write (0 = abort)")]
    pub write_retries: Option<usize>,

    #[arg(long, help = "State directory (default: ~/.ferry/state)")]
    pub state_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    Abort,
    Skip,
}

impl From<PolicyArg> for ErrorPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Abort => ErrorPolicy::Abort,
            PolicyArg::Skip => ErrorPolicy::Skip,
        }
    }
}
