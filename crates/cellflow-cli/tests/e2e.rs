//! End-to-end tests for cellflow CLI commands.
//!
//! These tests run the binary against plan files written to a temp directory.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Temporary directory holding a plan file.
struct TestPlan {
    _temp_dir: TempDir,
    plan_path: PathBuf,
}

impl TestPlan {
    fn new(source: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let plan_path = temp_dir.path().join("plan.json");
        fs::write(&plan_path, source).expect("Failed to write plan");

        Self {
            _temp_dir: temp_dir,
            plan_path,
        }
    }

    fn path(&self) -> &PathBuf {
        &self.plan_path
    }
}

fn cellflow() -> Command {
    Command::cargo_bin("cellflow").expect("binary should build")
}

/// imports ← model ← simulate, plus an unrelated cell.
fn chain_plan() -> &'static str {
    r#"{
        "cells": [
            { "id": "imports" },
            { "id": "model", "prerequisites": ["imports"] },
            { "id": "simulate", "prerequisites": ["model"] },
            { "id": "appendix" }
        ]
    }"#
}

// =============================================================================
// Run
// =============================================================================

#[test]
fn test_run_all_succeeds() {
    let plan = TestPlan::new(chain_plan());

    cellflow()
        .arg("run")
        .arg(plan.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed"))
        .stdout(predicate::str::contains("4 cells"));
}

#[test]
fn test_run_single_cell_with_prerequisites() {
    let plan = TestPlan::new(chain_plan());

    cellflow()
        .args(["run", "--cell", "simulate"])
        .arg(plan.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("imports → model → simulate"))
        .stdout(predicate::str::contains("3 cells"));
}

#[test]
fn test_run_failure_exits_nonzero() {
    let plan = TestPlan::new(
        r#"{
            "cells": [
                { "id": "load" },
                { "id": "fit", "prerequisites": ["load"], "behavior": "error", "message": "singular matrix" },
                { "id": "plot", "prerequisites": ["fit"] }
            ]
        }"#,
    );

    cellflow()
        .arg("run")
        .arg(plan.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("singular matrix"));
}

#[test]
fn test_run_cycle_exits_nonzero() {
    let plan = TestPlan::new(
        r#"{
            "cells": [
                { "id": "a", "prerequisites": ["b"] },
                { "id": "b", "prerequisites": ["a"] }
            ]
        }"#,
    );

    cellflow()
        .arg("run")
        .arg(plan.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cyclic dependency detected"));
}

#[test]
fn test_run_missing_plan() {
    cellflow()
        .args(["run", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read plan"));
}

// =============================================================================
// Order
// =============================================================================

#[test]
fn test_order_lists_prerequisites_first() {
    let plan = TestPlan::new(chain_plan());

    cellflow()
        .args(["order", "--cell", "simulate"])
        .arg(plan.path())
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?s)1\. imports.*2\. model.*3\. simulate").unwrap())
        .stdout(predicate::str::contains("appendix").not());
}

#[test]
fn test_order_warns_about_dangling_prerequisite() {
    let plan = TestPlan::new(r#"{ "cells": [ { "id": "plot", "prerequisites": ["gone"] } ] }"#);

    cellflow()
        .arg("order")
        .arg(plan.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("unknown prerequisite 'gone'"));
}
