use serde_json::json;

use crate::commands::{prepare, CommandResult};
use classcover_db::{connect, migrations, TimetableSeedDataset};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
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

        let seeded = TimetableSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = TimetableSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result = if verification.all_present {
            Ok(seeded)
        } else {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err((
                "seed_verification",
                format!("seed verification failed for checks: {}", failed_checks.join(", ")),
                6u8,
            ))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) => CommandResult::success_with(
            "seed",
            "seeded and verified the demo timetable",
            json!({
                "teachers": seeded.teachers,
                "time_slots": seeded.time_slots,
                "lectures": seeded.lectures,
            }),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}
