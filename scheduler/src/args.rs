use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Scoring policy: leastLoaded|binPack
    #[arg(long, env = "SCHEDULER_POLICY", default_value = "leastLoaded")]
    pub policy: String,

    /// Scheduler name pods must request via spec.schedulerName
    #[arg(long, env = "SCHEDULER_NAME", default_value = hyperion_common::DEFAULT_SCHEDULER_NAME)]
    pub name: String,
}
