pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;

use classcover_core::config::{AppConfig, LoadOptions};
use serde::Serialize;
use serde_json::Value;

/// What a command hands back to `run()`: the JSON line for stdout and the
/// process exit code.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// The envelope every command prints. `details` carries command-specific
/// payload: seeded row counts, the managed table list, and so on.
#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'static str>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &'static str, message: impl Into<String>) -> Self {
        Self::render(
            CommandOutcome {
                command,
                status: "ok",
                error_class: None,
                message: message.into(),
                details: None,
            },
            0,
        )
    }

    pub fn success_with(
        command: &'static str,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self::render(
            CommandOutcome {
                command,
                status: "ok",
                error_class: None,
                message: message.into(),
                details: Some(details),
            },
            0,
        )
    }

    pub fn failure(
        command: &'static str,
        error_class: &'static str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::render(
            CommandOutcome {
                command,
                status: "error",
                error_class: Some(error_class),
                message: message.into(),
                details: None,
            },
            exit_code,
        )
    }

    fn render(outcome: CommandOutcome, exit_code: u8) -> Self {
        let output = serde_json::to_string(&outcome).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                outcome.command,
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
        Self { exit_code, output }
    }
}

/// Shared preamble for the database-touching commands: load and validate
/// the configuration, then stand up a single-threaded runtime.
pub(crate) fn prepare(
    command: &'static str,
) -> Result<(AppConfig, tokio::runtime::Runtime), CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    Ok((config, runtime))
}
