//! Integration tests for the `kodilink` CLI binary.
//!
//! Argument parsing, help output, shell completions, config handling and
//! error exit codes, plus one session against a mocked Kodi.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `kodilink` binary with env isolation.
///
/// Clears all `KODILINK_*` env vars and points config and data directories
/// at a nonexistent path so tests never touch the user's real setup.
fn kodilink_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("kodilink");
    cmd.env("HOME", "/tmp/kodilink-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/kodilink-cli-test-nonexistent")
        .env("XDG_DATA_HOME", "/tmp/kodilink-cli-test-nonexistent")
        .env_remove("KODILINK_PROFILE")
        .env_remove("KODILINK_CONFIG")
        .env_remove("KODILINK_KODI_URL")
        .env_remove("KODILINK_TVHEADEND_URL")
        .env_remove("KODILINK_OUTPUT")
        .env_remove("KODILINK_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_config(dir: &Path, toml: &str) -> String {
    let path = dir.join("config.toml");
    std::fs::write(&path, toml).unwrap();
    path.display().to_string()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = kodilink_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    kodilink_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("TVHeadend")
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("mapping"))
            .and(predicate::str::contains("epg"))
            .and(predicate::str::contains("channels")),
    );
}

#[test]
fn test_version_flag() {
    kodilink_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kodilink"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_zsh() {
    kodilink_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    kodilink_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Argument validation ─────────────────────────────────────────────

#[test]
fn test_volume_out_of_range_is_rejected() {
    let output = kodilink_cmd().args(["volume", "150"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("150"));
}

#[test]
fn test_unknown_control_action_is_rejected() {
    let output = kodilink_cmd().args(["control", "rewind"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_channels_without_config_explains_setup() {
    let output = kodilink_cmd().arg("channels").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("No backend configured") && text.contains("config init"),
        "Expected setup hint:\n{text}"
    );
}

#[test]
fn test_unknown_profile_lists_available() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"
        [profiles.livingroom]
        kodiclient_url = "10.0.0.2"
        "#,
    );
    let output = kodilink_cmd()
        .args(["--config", &config, "-p", "bedroom", "channels"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("bedroom") && text.contains("livingroom"), "{text}");
}

#[test]
fn test_config_path_honours_flag() {
    kodilink_cmd()
        .args(["config", "path", "--config", "/tmp/elsewhere/kodilink.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/elsewhere/kodilink.toml"));
}

#[test]
fn test_config_init_then_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml").display().to_string();

    kodilink_cmd()
        .args([
            "--config",
            &config,
            "config",
            "init",
            "--name",
            "den",
            "--kodi-host",
            "192.168.1.20",
            "--tvheadend-host",
            "192.168.1.30",
            "--epg-channels",
            "1,3",
        ])
        .assert()
        .success();

    let written = std::fs::read_to_string(&config).unwrap();
    assert!(written.contains("kodiclient_url = \"192.168.1.20\""), "{written}");
    assert!(written.contains("default_profile = \"den\""), "{written}");

    kodilink_cmd()
        .args(["--config", &config, "config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* den"));

    // Same name again needs --force.
    let output = kodilink_cmd()
        .args(["--config", &config, "config", "init", "--name", "den", "--kodi-host", "x"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("already exists"));
}

#[test]
fn test_config_init_rejects_bad_channel_list() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml").display().to_string();
    let output = kodilink_cmd()
        .args([
            "--config",
            &config,
            "config",
            "init",
            "--kodi-host",
            "kodi.lan",
            "--epg-channels",
            "1,two",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("epgchannels"));
    assert!(!Path::new(&config).exists());
}

#[test]
fn test_config_show_masks_passwords() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"
        [profiles.default]
        kodiclient_url = "kodi.lan"
        kodiclient_user = "kodi"
        kodiclient_password = "hunter2"
        "#,
    );
    kodilink_cmd()
        .args(["--config", &config, "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("kodiclient_password = \"****\"")
                .and(predicate::str::contains("hunter2").not()),
        );
}

#[test]
fn test_mapping_path_uses_profile_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let config = write_config(
        dir.path(),
        &format!(
            r#"
            [defaults]
            data_dir = "{}"

            [profiles.default]
            kodiclient_url = "kodi.lan"
            "#,
            data.display()
        ),
    );
    let expected = data.join("default").join("channel-mapping.json");
    kodilink_cmd()
        .args(["--config", &config, "mapping", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.display().to_string()));
}

// ── Against a backend ───────────────────────────────────────────────

#[test]
fn test_unreachable_kodi_exits_with_connection_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        r#"
        [defaults]
        max_probe_attempts = 1
        "#,
    );
    let output = kodilink_cmd()
        .args(["--config", &config, "--kodi", "http://127.0.0.1:1", "channels"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
    assert!(combined_output(&output).contains("Could not reach Kodi"));
}

/// JSON-RPC reply echoing the request id.
struct RpcReply(Value);

impl Respond for RpcReply {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": body["id"],
            "result": self.0,
        }))
    }
}

async fn mount_rpc(server: &MockServer, body: Value, result: Value) {
    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(body))
        .respond_with(RpcReply(result))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_channels_lists_kodi_tv_channels() {
    let server = MockServer::start().await;
    mount_rpc(&server, json!({ "method": "JSONRPC.Ping" }), json!("pong")).await;
    mount_rpc(
        &server,
        json!({ "method": "PVR.GetChannels", "params": { "channelgroupid": "alltv" } }),
        json!({ "channels": [
            { "channelid": 7, "channelnumber": 3, "label": "BBC One", "thumbnail": "" }
        ]}),
    )
    .await;
    mount_rpc(
        &server,
        json!({ "method": "PVR.GetChannels", "params": { "channelgroupid": "allradio" } }),
        json!({ "channels": [] }),
    )
    .await;
    mount_rpc(
        &server,
        json!({ "method": "Player.GetActivePlayers" }),
        json!([]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        &format!(
            r#"
            [defaults]
            data_dir = "{}"
            "#,
            dir.path().join("data").display()
        ),
    );
    let kodi = server.uri();

    let output = tokio::task::spawn_blocking(move || {
        kodilink_cmd()
            .args(["--config", &config, "--kodi", &kodi, "-o", "json", "channels"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    let text = combined_output(&output);
    assert!(output.status.success(), "{text}");
    let channels: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(channels[0]["channel_id"], 7);
    assert_eq!(channels[0]["number"], 3);
    assert_eq!(channels[0]["title"], "BBC One");
}
