pub mod shutdown;

/// Name pods must carry in `spec.schedulerName` to be picked up by the
/// Hyperion scheduler.
pub const DEFAULT_SCHEDULER_NAME: &str = "hyperion-scheduler";

pub mod labels {
    pub const APP: &str = "app";
    pub const APP_VALUE: &str = "hyperion-aijob";

    /// Scheduler the worker requests; the scheduler's watch selects on it.
    pub const SCHEDULER: &str = "hyperion.ai/scheduler";

    /// Owning AIJob name; the controller's pod census selects on it.
    pub const AIJOB: &str = "hyperion.ai/aijob";
}

pub fn init() {
    let disable_colors = ["1", "true"].contains(
        &std::env::var("DISABLE_COLORS")
            .unwrap_or_else(|_| String::new())
            .to_lowercase()
            .as_str(),
    );
    owo_colors::set_override(!disable_colors);

    install_rustls_provider();
}

pub fn install_rustls_provider() {
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("install aws-lc-rs provider");
}
