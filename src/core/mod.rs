pub(crate) mod config;
pub(crate) mod lock;
pub(crate) mod metrics;
pub(crate) mod state;
pub(crate) mod telemetry;
pub(crate) mod time;
