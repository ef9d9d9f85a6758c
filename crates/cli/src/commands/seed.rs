use querygate_db::{migrations, DbPool, DemoDataset, SeedResult};

use crate::commands::{open_database, prepare, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let seeded = seed_demo_database(&pool).await?;
        pool.close().await;
        Ok::<SeedResult, StepFailure>(seeded)
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", render_summary(&seeded)),
        Err(failure) => CommandResult::from_step("seed", failure),
    }
}

/// Migrates, loads the demo dataset and checks every table got its rows.
pub(crate) async fn seed_demo_database(pool: &DbPool) -> Result<SeedResult, StepFailure> {
    migrations::run_pending(pool).await.map_err(|error| ("migration", error.to_string(), 4))?;
    let seeded =
        DemoDataset::load(pool).await.map_err(|error| ("seed", error.to_string(), 4))?;

    let verification =
        DemoDataset::verify(pool).await.map_err(|error| ("seed", error.to_string(), 4))?;
    if !verification.all_present {
        let failed = verification
            .checks
            .iter()
            .filter(|(_, passed)| !passed)
            .map(|(check, _)| *check)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(("seed_verification", format!("demo data incomplete: {failed}"), 4));
    }

    Ok(seeded)
}

fn render_summary(seeded: &SeedResult) -> String {
    format!(
        "demo dataset ready: {} customers, {} products, {} transactions",
        seeded.customers, seeded.products, seeded.transactions
    )
}
