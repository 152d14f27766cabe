//! End-to-end tests for the `stampcard` binary.
//!
//! Every test runs against its own `STAMPCARD_HOME`, so the cookie jar and
//! config never leak between tests.

use std::path::Path;

use anyhow::Result;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CODES: [&str; 4] = ["h4f9k2w7p1xR", "z8m3n6v2b9qE", "a1s7d4f2g9kL", "p5o8i3u7y2tW"];

fn stampcard(home: &Path) -> Result<assert_cmd::Command> {
    let mut cmd = assert_cmd::Command::cargo_bin("stampcard")?;
    cmd.env("STAMPCARD_HOME", home)
        .env_remove("STAMPCARD_SERVER")
        .env_remove("STAMPCARD_PASSWORD")
        .env_remove("RUST_LOG");
    Ok(cmd)
}

fn collect_all(home: &Path) -> Result<()> {
    stampcard(home)?.arg("start").assert().success();
    for code in CODES {
        stampcard(home)?.args(["scan", code]).assert().success();
    }
    Ok(())
}

#[test]
fn help_lists_commands() -> Result<()> {
    let home = TempDir::new()?;
    stampcard(home.path())?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("redeem").and(predicate::str::contains("scan")));
    Ok(())
}

#[test]
fn status_before_start_reports_no_visitor() -> Result<()> {
    let home = TempDir::new()?;
    stampcard(home.path())?
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No visitor yet"));
    Ok(())
}

#[test]
fn scan_before_start_fails() -> Result<()> {
    let home = TempDir::new()?;
    stampcard(home.path())?
        .args(["scan", CODES[0]])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stampcard start"));
    Ok(())
}

#[test]
fn start_with_token_url_collects_first_item() -> Result<()> {
    let home = TempDir::new()?;
    stampcard(home.path())?
        .args(["start", "--url", "https://starlitetw.com/?token=h4f9k2w7p1xR"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Collected item_1!")
                .and(predicate::str::contains("collected: 1/4"))
                .and(predicate::str::contains("reward: locked")),
        );

    assert!(home.path().join("cookies.json").exists());
    stampcard(home.path())?
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] item_1").and(predicate::str::contains("token: absent")));
    Ok(())
}

#[test]
fn repeated_and_unknown_scans_collect_nothing() -> Result<()> {
    let home = TempDir::new()?;
    stampcard(home.path())?.arg("start").assert().success();
    stampcard(home.path())?
        .args(["scan", "https://starlitetw.com/?token=z8m3n6v2b9qE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Collected item_2!"));

    stampcard(home.path())?
        .args(["scan", CODES[1]])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("item_2 was already collected.")
                .and(predicate::str::contains("collected: 1/4")),
        );

    stampcard(home.path())?
        .args(["scan", "nope"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("not part of this stamp card")
                .and(predicate::str::contains("collected: 1/4")),
        );
    Ok(())
}

#[test]
fn scanner_error_shows_camera_notice() -> Result<()> {
    let home = TempDir::new()?;
    stampcard(home.path())?
        .args(["scan", "--scanner-error", "NotAllowedError"])
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "Camera error: Camera access was denied.",
        ))
        .stderr(predicate::str::contains("NotAllowedError"));
    Ok(())
}

#[test]
fn redeem_requires_all_items() -> Result<()> {
    let home = TempDir::new()?;
    stampcard(home.path())?.arg("start").assert().success();
    stampcard(home.path())?.args(["scan", CODES[0]]).assert().success();

    stampcard(home.path())?
        .args(["redeem", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1/4 items collected"));
    Ok(())
}

#[test]
fn redeem_happens_exactly_once() -> Result<()> {
    let home = TempDir::new()?;
    collect_all(home.path())?;

    stampcard(home.path())?
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("reward: ready to redeem"));

    stampcard(home.path())?
        .args(["redeem", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reward redeemed."));

    stampcard(home.path())?
        .args(["redeem", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already been redeemed"));

    stampcard(home.path())?
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("reward: redeemed"));
    Ok(())
}

#[test]
fn declined_prompt_cancels_redemption() -> Result<()> {
    let home = TempDir::new()?;
    collect_all(home.path())?;

    stampcard(home.path())?
        .arg("redeem")
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Redemption cancelled."));

    stampcard(home.path())?
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("reward: ready to redeem"));
    Ok(())
}

#[test]
fn reset_forgets_the_visitor() -> Result<()> {
    let home = TempDir::new()?;
    collect_all(home.path())?;

    stampcard(home.path())?
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stamp card cleared."));

    stampcard(home.path())?
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No visitor yet"));
    Ok(())
}

#[test]
fn explicit_jar_and_config_are_honoured() -> Result<()> {
    let home = TempDir::new()?;
    let other = TempDir::new()?;
    let config = other.path().join("campaign.toml");
    std::fs::write(&config, "actid = \"spring_fair\"\n\n[qr_codes]\nalpha = \"item_1\"\n")?;
    let jar = other.path().join("jar.json");

    stampcard(home.path())?
        .args(["--config"])
        .arg(&config)
        .arg("--jar")
        .arg(&jar)
        .args(["start", "--url", "https://example.com/?token=alpha"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Collected item_1!"));

    let raw = std::fs::read_to_string(&jar)?;
    assert!(raw.contains("spring_fair_item_1_state"));
    assert!(!home.path().join("cookies.json").exists());
    Ok(())
}

#[test]
fn token_without_password_is_an_auth_failure() -> Result<()> {
    let home = TempDir::new()?;
    stampcard(home.path())?
        .arg("token")
        .env("STAMPCARD_SERVER", "http://127.0.0.1:9/")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Authorization failed"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn token_is_fetched_once_then_reused() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth_token_get"))
        .and(body_json(json!({"actid": "web_2025_itf_forest", "pwd": "secret"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": true, "token": "tok123"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new()?;
    for _ in 0..2 {
        stampcard(home.path())?
            .arg("token")
            .env("STAMPCARD_SERVER", server.uri())
            .env("STAMPCARD_PASSWORD", "secret")
            .assert()
            .success()
            .stdout("tok123\n");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn call_refreshes_rejected_token() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(path("/api/auth_token_get"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": true, "token": "fresh"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/api/redeem"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": false, "msg": "Unauthorized"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(path("/api/redeem"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": true, "n": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new()?;
    let jar = json!({
        "version": 1,
        "cookies": {
            "web_2025_itf_forest_token": {"value": "stale", "expires_at": null}
        }
    });
    std::fs::write(home.path().join("cookies.json"), jar.to_string())?;

    stampcard(home.path())?
        .args(["call", "api/redeem", "--body", r#"{"user_id":"u"}"#])
        .env("STAMPCARD_SERVER", server.uri())
        .env("STAMPCARD_PASSWORD", "secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"n\": 1"));
    Ok(())
}
