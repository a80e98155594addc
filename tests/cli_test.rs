//! CLI integration tests for the resource-dispatch binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("resource-dispatch"))
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

// Helper to create a temp file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

mod uri_command {
    use super::*;

    #[test]
    fn prints_parts() {
        cmd()
            .args(["uri", "app://self/user?id=1&name=koriym"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""scheme": "app""#))
            .stdout(predicate::str::contains(r#""host": "self""#))
            .stdout(predicate::str::contains(r#""path": "/user""#))
            .stdout(predicate::str::contains(r#""id": "1""#));
    }

    #[test]
    fn output_is_indented_json() {
        let output = cmd().args(["uri", "page://self/"]).output().unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        assert!(stdout.starts_with("{\n    \"scheme\""));
        assert!(stdout.ends_with("}\n"));

        let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(parsed["path"], "/");
        assert_eq!(parsed["uri"], "page://self/");
    }

    #[test]
    fn malformed_uri_exits_2() {
        cmd()
            .args(["uri", "not a uri"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("Error:"));
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_payload() {
        cmd()
            .args([
                "validate",
                fixture("payload.valid.json").to_str().unwrap(),
                "--schema",
                fixture("json_schema/user.json").to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Valid"));
    }

    #[test]
    fn invalid_payload_lists_violations() {
        cmd()
            .args([
                "validate",
                fixture("payload.invalid.json").to_str().unwrap(),
                "--schema",
                fixture("json_schema/user.json").to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Validation failed"))
            .stderr(predicate::str::contains(
                "[age] Must have a minimum value of 20",
            ));
    }

    #[test]
    fn json_output_valid() {
        cmd()
            .args([
                "validate",
                fixture("payload.valid.json").to_str().unwrap(),
                "--schema",
                fixture("json_schema/user.json").to_str().unwrap(),
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"valid":true}"#));
    }

    #[test]
    fn json_output_invalid() {
        let output = cmd()
            .args([
                "validate",
                fixture("payload.invalid.json").to_str().unwrap(),
                "--schema",
                fixture("json_schema/user.json").to_str().unwrap(),
                "--json",
            ])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));

        let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(result["valid"], false);
        assert_eq!(result["errors"][0]["property"], "age");
        assert_eq!(
            result["errors"][0]["message"],
            "Must have a minimum value of 20"
        );
    }

    #[test]
    fn external_refs_resolve_next_to_schema() {
        let dir = TempDir::new().unwrap();
        let payload = write_temp_file(
            &dir,
            "users.json",
            r#"[{"name":{"firstName":"mucha","lastName":"alfons"},"age":15}]"#,
        );

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                fixture("json_schema/users.json").to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("[0.age]"));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn missing_schema_exits_2() {
        cmd()
            .args([
                "validate",
                fixture("payload.valid.json").to_str().unwrap(),
                "--schema",
                "/nonexistent/schema.json",
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("json schema not found"));
    }

    #[test]
    fn missing_payload_json_error() {
        cmd()
            .args([
                "validate",
                "/nonexistent/payload.json",
                "--schema",
                fixture("json_schema/user.json").to_str().unwrap(),
                "--json",
            ])
            .assert()
            .code(3)
            .stdout(predicate::str::contains(r#""valid":false"#))
            .stdout(predicate::str::contains("cannot read payload"));
    }

    #[test]
    fn missing_payload_names_the_payload() {
        cmd()
            .args([
                "validate",
                "/nonexistent/payload.json",
                "--schema",
                fixture("json_schema/user.json").to_str().unwrap(),
            ])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("cannot read payload"))
            .stderr(predicate::str::contains("json schema").not());
    }

    #[test]
    fn malformed_payload() {
        let dir = TempDir::new().unwrap();
        let payload = write_temp_file(&dir, "payload.json", "{ not json");

        cmd()
            .args([
                "validate",
                payload.to_str().unwrap(),
                "--schema",
                fixture("json_schema/user.json").to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON payload"))
            .stderr(predicate::str::contains("invalid schema").not());
    }

    #[test]
    fn invalid_schema_json() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", "not json");

        cmd()
            .args([
                "validate",
                fixture("payload.valid.json").to_str().unwrap(),
                "--schema",
                schema.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid JSON"));
    }

    #[test]
    fn unknown_subcommand() {
        cmd().arg("resolve").assert().failure();
    }
}

mod logging {
    use super::*;

    #[test]
    fn debug_level_logs_to_stderr() {
        cmd()
            .args([
                "--log-level",
                "debug",
                "validate",
                fixture("payload.valid.json").to_str().unwrap(),
                "--schema",
                fixture("json_schema/user.json").to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Valid"))
            .stderr(predicate::str::contains("validating payload"));
    }

    #[test]
    fn default_level_is_quiet() {
        cmd()
            .args([
                "validate",
                fixture("payload.valid.json").to_str().unwrap(),
                "--schema",
                fixture("json_schema/user.json").to_str().unwrap(),
            ])
            .assert()
            .success()
            .stderr(predicate::str::is_empty());
    }
}

mod config_file {
    use super::*;

    fn config(dir: &TempDir, content: &str) -> PathBuf {
        write_temp_file(dir, "resource.toml", content)
    }

    fn schema_dirs() -> String {
        format!(
            "[json_schema]\nschema_dir = {:?}\nvalidate_dir = {:?}\n",
            fixture("json_schema").display().to_string(),
            fixture("json_validate").display().to_string(),
        )
    }

    #[test]
    fn logging_level_comes_from_config() {
        let dir = TempDir::new().unwrap();
        let path = config(&dir, "[logging]\nlevel = \"debug\"\n");

        cmd()
            .args([
                "--config",
                path.to_str().unwrap(),
                "validate",
                fixture("payload.valid.json").to_str().unwrap(),
                "--schema",
                fixture("json_schema/user.json").to_str().unwrap(),
            ])
            .assert()
            .success()
            .stderr(predicate::str::contains("validating payload"));
    }

    #[test]
    fn log_level_flag_overrides_config() {
        let dir = TempDir::new().unwrap();
        let path = config(&dir, "[logging]\nlevel = \"debug\"\n");

        cmd()
            .args([
                "--config",
                path.to_str().unwrap(),
                "--log-level",
                "warn",
                "validate",
                fixture("payload.valid.json").to_str().unwrap(),
                "--schema",
                fixture("json_schema/user.json").to_str().unwrap(),
            ])
            .assert()
            .success()
            .stderr(predicate::str::is_empty());
    }

    #[test]
    fn relative_schema_uses_schema_dir() {
        let dir = TempDir::new().unwrap();
        let path = config(&dir, &format!("[logging]\nlevel = \"warn\"\n\n{}", schema_dirs()));

        cmd()
            .args([
                "--config",
                path.to_str().unwrap(),
                "validate",
                fixture("payload.invalid.json").to_str().unwrap(),
                "--schema",
                "user.json",
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "[age] Must have a minimum value of 20",
            ));
    }

    #[test]
    fn malformed_config_exits_2() {
        let dir = TempDir::new().unwrap();
        let path = config(&dir, "[logging]\nverbosity = 3\n");

        cmd()
            .args(["--config", path.to_str().unwrap(), "uri", "app://self/user"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("configuration error"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("uri"))
            .stdout(predicate::str::contains("validate"));
    }

    #[test]
    fn version() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("resource-dispatch"));
    }
}
