use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a JSON-lines change file through the sink as one CDC batch
    Sync {
        #[arg(long, help = "Sink config file path")]
        config: String,

        #[arg(long, help = "JSON-lines file with one change record per line")]
        input: String,

        #[arg(long, help = "Lua script defining onRecord; pass-through if omitted")]
        script: Option<String>,

        #[arg(
            long,
            help = "Sync batch id; defaults to the last committed batch id plus one"
        )]
        batch_id: Option<i64>,
    },
    /// Send a CSV file to a topic as one query-replication partition
    Qrep {
        #[arg(long, help = "Sink config file path")]
        config: String,

        #[arg(long, help = "Headered CSV file")]
        input: String,

        #[arg(long, help = "Destination topic")]
        destination: String,

        #[arg(long, help = "Lua script defining onRecord; pass-through if omitted")]
        script: Option<String>,

        #[arg(long, help = "Partition id; defaults to the input file name")]
        partition_id: Option<String>,
    },
    /// Check that the configured brokers are reachable
    Ping {
        #[arg(long, help = "Sink config file path")]
        config: String,
    },
    /// Show the committed offset and batch id of a flow
    Offset {
        #[arg(long, help = "Sink config file path")]
        config: String,

        #[arg(long, help = "Flow name; defaults to the configured flow")]
        flow: Option<String>,
    },
}
