use serde_json::json;

use crate::commands::{prepare, CommandResult};
use classcover_db::{connect, migrations};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("migrate") {
        Ok(context) => context,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        // Confirm the workflow tables actually landed before reporting ok.
        let missing = migrations::missing_tables(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        pool.close().await;

        if missing.is_empty() {
            Ok(())
        } else {
            Err((
                "migration",
                format!("schema incomplete after migrate, missing: {}", missing.join(", ")),
                5u8,
            ))
        }
    });

    match result {
        Ok(()) => CommandResult::success_with(
            "migrate",
            "applied pending migrations",
            json!({ "tables": migrations::MANAGED_TABLES }),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
