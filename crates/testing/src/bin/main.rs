// SIS Kernel Test Runner Binary
// Drives the direct runtime checks in `sis_testing::report` and prints a
// summary. The `#[test]` scenarios under `correctness`/`property_based`
// run separately, via `cargo test -p sis-testing`.

use sis_testing::report::{self, TestRecord};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn print_summary(records: &[TestRecord]) {
    let passed = records.iter().filter(|r| r.passed).count();
    tracing::info!("SIS Kernel test runner: {}/{} checks passed", passed, records.len());
    for record in records {
        if record.passed {
            tracing::info!(check = %record.name, category = ?record.category, "PASS");
        } else {
            tracing::error!(check = %record.name, category = ?record.category, detail = %record.detail, "FAIL");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let json = args.iter().any(|a| a == "--json");

    let records = report::run_all().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_summary(&records);
    }

    if records.iter().any(|r| !r.passed) {
        anyhow::bail!("one or more checks failed");
    }
    Ok(())
}
