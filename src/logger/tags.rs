/// Module tags for log filtering
///
/// Each tag maps to a --debug-<tag> command-line flag.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    Engine,
    Cache,
    Store,
    Api,
    Chains,
    Probe,
    Repair,
    Breaker,
    Scheduler,
    Cli,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::Engine => "ENGINE",
            LogTag::Cache => "CACHE",
            LogTag::Store => "STORE",
            LogTag::Api => "API",
            LogTag::Chains => "CHAINS",
            LogTag::Probe => "PROBE",
            LogTag::Repair => "REPAIR",
            LogTag::Breaker => "BREAKER",
            LogTag::Scheduler => "SCHEDULER",
            LogTag::Cli => "CLI",
        }
    }

    /// Key used for --debug-<key> flag matching
    pub fn debug_key(&self) -> &'static str {
        match self {
            LogTag::Engine => "engine",
            LogTag::Cache => "cache",
            LogTag::Store => "store",
            LogTag::Api => "api",
            LogTag::Chains => "chains",
            LogTag::Probe => "probe",
            LogTag::Repair => "repair",
            LogTag::Breaker => "breaker",
            LogTag::Scheduler => "scheduler",
            LogTag::Cli => "cli",
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
