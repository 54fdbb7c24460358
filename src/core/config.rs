mod parsing;
mod settings;
mod types;

pub(crate) use types::{MarkingMode, MarkingSettings, Settings};
#[cfg(test)]
pub(crate) use types::{DelayRange, StorageSettings, TelemetrySettings};
