//! Human-readable error descriptions, stable exit codes and JSON error output.

use chargecast_core::error::{BuildError, ChargeError};
use chargecast_device::DeviceError;
use chargecast_store::StoreError;

/// Context attached when the config file fails to parse or validate.
pub const CONFIG_CONTEXT: &str = "invalid configuration";
/// Context attached when a trace file cannot be loaded.
pub const TRACE_CONTEXT: &str = "cannot load trace";

/// Coarse error category; drives exit code and JSON `reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Trace,
    Store,
    Device,
    Engine,
    Other,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Config => "Config",
            ErrorKind::Trace => "Trace",
            ErrorKind::Store => "Store",
            ErrorKind::Device => "Device",
            ErrorKind::Engine => "Engine",
            ErrorKind::Other => "Error",
        }
    }
}

pub fn classify(err: &eyre::Report) -> ErrorKind {
    for cause in err.chain() {
        if cause.downcast_ref::<BuildError>().is_some() {
            return ErrorKind::Config;
        }
        if cause.downcast_ref::<StoreError>().is_some() {
            return ErrorKind::Store;
        }
        if cause.downcast_ref::<DeviceError>().is_some() {
            return ErrorKind::Device;
        }
        if cause.downcast_ref::<ChargeError>().is_some() {
            return ErrorKind::Engine;
        }
    }
    let top = err.to_string();
    if top.starts_with(CONFIG_CONTEXT) {
        ErrorKind::Config
    } else if top.starts_with(TRACE_CONTEXT) {
        ErrorKind::Trace
    } else {
        ErrorKind::Other
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(BuildError::InvalidConfig(msg)) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Invalid estimator configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. `chargecast self-check` validates it."
        );
    }

    if let Some(se) = err.chain().find_map(|c| c.downcast_ref::<StoreError>()) {
        return match se {
            StoreError::SchemaTooNew { found, supported } => format!(
                "What happened: The database uses schema version {found}, newer than this build understands ({supported}).\nLikely causes: The file was written by a newer chargecast.\nHow to fix: Upgrade chargecast or point --db at another file."
            ),
            StoreError::Io(_) | StoreError::Sqlite(_) => format!(
                "What happened: The series database could not be opened or written ({se}).\nLikely causes: Wrong path, missing permissions, or a file that is not SQLite.\nHow to fix: Check --db / persistence.path and the directory permissions."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug for more detail."
            ),
        };
    }

    if let Some(de) = err.chain().find_map(|c| c.downcast_ref::<DeviceError>()) {
        return match de {
            DeviceError::NotFound(root) => format!(
                "What happened: No battery was found under {}.\nLikely causes: Desktop machine, container without /sys, or a non-standard supply name.\nHow to fix: Pass --sysfs-dir explicitly or use --source sim.",
                root.display()
            ),
            other => format!(
                "What happened: Battery read failed ({other}).\nLikely causes: The supply directory lacks capacity/status files.\nHow to fix: Check --sysfs-dir and file permissions."
            ),
        };
    }

    if let Some(ce) = err.chain().find_map(|c| c.downcast_ref::<ChargeError>()) {
        return format!(
            "What happened: {ce}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    let msg = err.to_string();
    let cause = err.chain().nth(1).map(|c| c.to_string()).unwrap_or_default();

    if msg.starts_with(CONFIG_CONTEXT) {
        return format!(
            "What happened: Configuration is invalid ({cause}).\nLikely causes: A typo in a key or an out-of-range value.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if msg.starts_with(TRACE_CONTEXT) {
        if cause.contains("must have headers") {
            return "Invalid headers in trace CSV. Expected 'ts,soc,charging[,thermal]'.".to_string();
        }
        return format!(
            "What happened: The trace could not be loaded ({cause}).\nLikely causes: Missing file, bad row, or timestamps going backwards.\nHow to fix: Fix the CSV and rerun."
        );
    }

    let cause = if cause.is_empty() {
        String::new()
    } else {
        format!(" Cause: {cause}")
    };
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes; clap usage errors keep their own code 2.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match classify(err) {
        ErrorKind::Other => 1,
        ErrorKind::Config => 3,
        ErrorKind::Trace => 4,
        ErrorKind::Store => 5,
        ErrorKind::Device => 6,
        ErrorKind::Engine => 7,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": classify(err).name(),
        "message": humanize(err),
        "code": exit_code_for_error(err),
    })
    .to_string()
}
