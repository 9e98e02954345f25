use anyhow::{Context, Result};
use assert_cmd::prelude::*;
use datafusion::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Abstraction for managing the Medallion test environment.
struct MedallionTestEnv {
    _tmp: TempDir,
    root: PathBuf,
}

impl MedallionTestEnv {
    fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/retail_demo");

        let dest = tmp.path().join("retail_demo");
        Self::copy_dir(&fixture, &dest)?;

        Ok(Self {
            _tmp: tmp,
            root: dest,
        })
    }

    fn copy_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
        let mut options = fs_extra::dir::CopyOptions::new();
        options.skip_exist = true;
        options.content_only = true;

        std::fs::create_dir_all(dst)?;
        fs_extra::dir::copy(src, dst, &options)
            .map(|_| ())
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    fn medallion(&self) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("medallion"));
        cmd.current_dir(&self.root);
        cmd.env_remove("MEDALLION_RUN_DATE");
        cmd.env_remove("MEDALLION_DATA_PATH");
        cmd.env_remove("MEDALLION_GATE");
        cmd
    }

    fn data(&self, rel: &str) -> PathBuf {
        self.root.join("data").join(rel)
    }

    fn json(&self, rel: &str) -> Result<serde_json::Value> {
        let content = fs::read_to_string(self.data(rel)).with_context(|| format!("{rel} not found"))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Parquet files under a table directory, partition subdirectories included.
    fn parquet_files(&self, table: &str) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(self.data(table))
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.path().extension().is_some_and(|ext| ext == "parquet") {
                files.push(entry.into_path());
            }
        }
        files.sort();
        files
    }

    /// Rows of one single-file parquet table matching `predicate`.
    async fn count_where(&self, table: &str, predicate: &str) -> Result<usize> {
        let ctx = SessionContext::new();
        let path = self.data(table);
        ctx.register_parquet("t", path.to_string_lossy().to_string(), ParquetReadOptions::default())
            .await?;
        let df = ctx.sql(&format!("SELECT * FROM t WHERE {predicate}")).await?;
        Ok(df.count().await?)
    }
}

#[tokio::test]
async fn test_negative_price_is_quarantined() -> Result<()> {
    let env = MedallionTestEnv::new()?;

    env.medallion()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("SUCCESS"));

    let report = env.json("quality/data_quality_report.json")?;
    assert_eq!(report["check_results"][0]["check_id"], 1);
    assert_eq!(report["check_results"][0]["violations_found"], 1);
    assert_eq!(report["summary"]["total_checks"], 7);

    let pos_in_silver = env
        .count_where("silver/unified_sales/unified_sales.parquet", "channel = 'POS'")
        .await?;
    assert_eq!(pos_in_silver, 9);

    let quarantined = env
        .count_where("silver/quarantine/quarantine.parquet", "source = 'pos_sales'")
        .await?;
    assert_eq!(quarantined, 1);
    Ok(())
}

#[tokio::test]
async fn test_orphan_shipment_is_rejected() -> Result<()> {
    let env = MedallionTestEnv::new()?;
    env.medallion().arg("run").assert().success();

    let report = env.json("quality/data_quality_report.json")?;
    assert_eq!(report["check_results"][4]["check_id"], 5);
    assert_eq!(report["check_results"][4]["violations_found"], 1);

    let orphans = env
        .count_where("silver/shipments/shipments.parquet", "order_id = 'W-9999'")
        .await?;
    assert_eq!(orphans, 0);
    let kept = env.count_where("silver/shipments/shipments.parquet", "1 = 1").await?;
    assert_eq!(kept, 3);
    Ok(())
}

#[test]
fn test_quality_report_snapshot() -> Result<()> {
    let env = MedallionTestEnv::new()?;
    env.medallion().arg("quality").assert().failure();

    env.medallion().arg("ingest").assert().success();
    env.medallion().arg("quality").assert().success();

    let report = env.json("quality/data_quality_report.json")?;
    let checks = report["check_results"].as_array().context("check_results")?;
    let mut lines: Vec<String> = checks
        .iter()
        .map(|c| {
            format!(
                "{} {}: {} {}",
                c["check_id"],
                c["check_name"].as_str().unwrap_or_default(),
                c["violations_found"],
                c["status"].as_str().unwrap_or_default()
            )
        })
        .collect();
    let summary = &report["summary"];
    lines.push(format!(
        "passed={} failed={} violations={} status={}",
        summary["passed"],
        summary["failed"],
        summary["total_violations"],
        summary["overall_status"].as_str().unwrap_or_default()
    ));

    insta::assert_snapshot!("quality_checks", lines.join("\n"));
    Ok(())
}

#[test]
fn test_rerun_is_idempotent() -> Result<()> {
    let env = MedallionTestEnv::new()?;

    env.medallion()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("SUCCESS").and(predicate::str::contains("(13 facts)")));
    let first = env.json("run_results.json")?;
    let first_files = env.parquet_files("gold/fact_sales");

    env.medallion().arg("run").assert().success();
    let second = env.json("run_results.json")?;

    // Gold is replaced, not appended: same partition files, no leftovers.
    assert!(!first_files.is_empty());
    assert!(first_files.iter().all(|f| f.to_string_lossy().contains("year=")));
    assert_eq!(first_files, env.parquet_files("gold/fact_sales"));
    assert_eq!(first["errors"].as_array().map(Vec::len), Some(0));

    assert_eq!(first["gold"]["fact_rows"], 13);
    assert_eq!(first["gold"]["total_revenue"], 370.0);
    assert_eq!(first["gold"]["fact_rows"], second["gold"]["fact_rows"]);
    assert_eq!(first["gold"]["total_revenue"], second["gold"]["total_revenue"]);
    assert_eq!(second["gold"]["scd"]["inserted"], 0);
    assert_eq!(second["gold"]["scd"]["versioned"], 0);
    Ok(())
}

#[tokio::test]
async fn test_customer_move_is_versioned() -> Result<()> {
    let env = MedallionTestEnv::new()?;
    env.medallion().arg("run").assert().success();

    // Run 2: C001 now lives in Pune.
    let web = env.data("raw/web_orders.json");
    let moved = fs::read_to_string(&web)?.replace("\"Mumbai\"", "\"Pune\"");
    fs::write(&web, moved)?;

    env.medallion()
        .arg("run")
        .env("MEDALLION_RUN_DATE", "2024-07-15")
        .assert()
        .success();

    let dim = "gold/dim_customer/dim_customer.parquet";
    assert_eq!(env.count_where(dim, "customer_id = 'C001'").await?, 2);
    assert_eq!(
        env.count_where(
            dim,
            "customer_id = 'C001' AND version = 1 AND city = 'Mumbai' \
             AND NOT is_current AND valid_to = DATE '2024-07-15'"
        )
        .await?,
        1
    );
    assert_eq!(
        env.count_where(
            dim,
            "customer_id = 'C001' AND version = 2 AND city = 'Pune' AND is_current"
        )
        .await?,
        1
    );
    // Untouched customers keep a single version.
    assert_eq!(env.count_where(dim, "customer_id = 'C002'").await?, 1);
    Ok(())
}

#[test]
fn test_ingestion_log_records_every_feed() -> Result<()> {
    let env = MedallionTestEnv::new()?;
    env.medallion().arg("ingest").assert().success();

    let log = fs::read_to_string(env.data("logs/ingestion_runs.jsonl"))?;
    let entries: Vec<serde_json::Value> = log
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e["status"] == "SUCCESS"));
    assert!(env.data("bronze/pos_sales/pos_sales.parquet").exists());
    Ok(())
}

#[test]
fn test_stages_can_run_one_by_one() -> Result<()> {
    let env = MedallionTestEnv::new()?;

    env.medallion().arg("ingest").assert().success();
    env.medallion()
        .arg("quality")
        .assert()
        .success()
        .stdout(predicate::str::contains("FAIL"));
    env.medallion().arg("transform").assert().success();
    env.medallion()
        .arg("assemble")
        .assert()
        .success()
        .stdout(predicate::str::contains("13 facts"));

    env.medallion()
        .args(["query", "SELECT COUNT(*) AS n FROM fact_sales"])
        .assert()
        .success()
        .stdout(predicate::str::contains("13"));
    Ok(())
}

#[test]
fn test_missing_raw_file_fails_after_retries() -> Result<()> {
    let env = MedallionTestEnv::new()?;
    fs::remove_file(env.data("raw/shipments.csv"))?;

    env.medallion()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("CRITICAL PIPELINE ERROR"));

    let result = env.json("run_results.json")?;
    assert_eq!(result["success"], false);
    assert!(result["gold"].is_null());

    let log = fs::read_to_string(env.data("logs/ingestion_runs.jsonl"))?;
    assert_eq!(log.lines().filter(|l| l.contains("\"FAILED\"")).count(), 1);
    // NotFound is transient: two retries before the final failure.
    assert_eq!(log.lines().filter(|l| l.contains("\"RETRYING\"")).count(), 2);
    Ok(())
}

#[test]
fn test_clean_keeps_raw_files() -> Result<()> {
    let env = MedallionTestEnv::new()?;
    env.medallion().arg("run").assert().success();

    env.medallion()
        .args(["clean", "--layer", "gold"])
        .assert()
        .success();
    assert!(!env.data("gold").exists());
    assert!(env.data("silver").exists());

    env.medallion().arg("clean").assert().success();
    for layer in ["bronze", "silver", "quality", "run_results.json"] {
        assert!(!env.data(layer).exists(), "{layer} should be gone");
    }
    assert!(env.data("raw/pos_sales.csv").exists());
    assert!(env.data("logs/ingestion_runs.jsonl").exists());

    env.medallion()
        .args(["clean", "--layer", "raw"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn test_query_is_read_only() -> Result<()> {
    let env = MedallionTestEnv::new()?;
    env.medallion().arg("run").assert().success();

    env.medallion()
        .args(["query", "DELETE FROM fact_sales"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Query failed"));

    env.medallion()
        .args(["query", "SELECT city FROM dim_customer WHERE customer_id = 'C002'"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Delhi"));
    Ok(())
}
