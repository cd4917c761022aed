//! End-to-end tests of the clipmark binary

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn clipmark(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("clipmark").unwrap();
    cmd.current_dir(dir)
        .env_remove("CLIPMARK_CONFIG")
        .env_remove("CLIPMARK_FFMPEG")
        .env_remove("CLIPMARK_OUTPUT_DIR")
        .env_remove("RUST_LOG")
        .args(["--log-level", "error"]);
    cmd
}

/// Stand-in encoder: prints a progress line and exits with `code`
#[cfg(unix)]
fn fake_ffmpeg(dir: &Path, code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(format!("fake-ffmpeg-{}", code));
    let script = format!(
        "#!/bin/sh\necho 'frame=1 fps=0 time=00:00:00.50 bitrate=N/A' >&2\nexit {}\n",
        code
    );
    fs::write(&path, script).unwrap();
    let mut permissions = fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    clipmark(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cut"))
        .stdout(predicate::str::contains("playlist"));
}

#[test]
fn test_config_prints_effective_toml() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("clipmark.toml"),
        "[encoder]\nloop_count = 4\n",
    )
    .unwrap();

    clipmark(dir.path())
        .args(["--ffmpeg", "/opt/bin/ffmpeg", "config"])
        .assert()
        .success()
        .stdout(predicate::str::contains("loop_count = 4"))
        .stdout(predicate::str::contains("/opt/bin/ffmpeg"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("clipmark.toml"), "[encoder]\nloop_count = 0\n").unwrap();

    clipmark(dir.path()).arg("config").assert().failure();
}

#[test]
fn test_playlist_filters_folder() {
    let dir = TempDir::new().unwrap();
    let videos = dir.path().join("videos");
    fs::create_dir(&videos).unwrap();
    for name in ["beach.mp4", "city.mp4", "beach-night.mkv"] {
        fs::write(videos.join(name), b"").unwrap();
    }

    clipmark(dir.path())
        .args(["playlist", "-s", "videos", "--filter", "beach", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 3"))
        .stdout(predicate::str::contains("\"visible\": 2"))
        .stdout(predicate::str::contains("city.mp4").not());
}

#[test]
fn test_seeded_shuffle_is_reproducible() {
    let dir = TempDir::new().unwrap();
    let mut list = String::new();
    for i in 0..12 {
        list.push_str(&format!("clip{:02}.mp4\n", i));
    }
    fs::write(dir.path().join("list.mpl"), list).unwrap();

    let run = || {
        let output = clipmark(dir.path())
            .args(["playlist", "-s", "list.mpl", "--shuffle", "--seed", "7"])
            .output()
            .unwrap();
        assert!(output.status.success());
        String::from_utf8(output.stdout).unwrap()
    };
    let first = run();
    assert_eq!(first, run());
    assert!(first.contains("12 of 12 items"));
}

#[test]
fn test_playlist_cache_is_written() {
    let dir = TempDir::new().unwrap();
    let videos = dir.path().join("videos");
    fs::create_dir(&videos).unwrap();
    fs::write(videos.join("a.mp4"), b"").unwrap();

    clipmark(dir.path())
        .args(["playlist", "-s", "videos", "--cache", "cache/folders.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a.mp4"));
    assert!(dir.path().join("cache").join("folders.json").exists());
}

#[test]
fn test_missing_playlist_source_fails() {
    let dir = TempDir::new().unwrap();
    clipmark(dir.path())
        .args(["playlist", "-s", "nowhere.mpl"])
        .assert()
        .failure();
}

#[test]
fn test_cut_rejects_bad_range() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("in.mp4"), b"").unwrap();

    clipmark(dir.path())
        .args(["cut", "-i", "in.mp4", "-r", "00:05-00:02"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid range"));
}

#[test]
fn test_cut_requires_existing_input() {
    let dir = TempDir::new().unwrap();
    clipmark(dir.path())
        .args(["cut", "-i", "missing.mp4", "-r", "0-5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[cfg(unix)]
#[test]
fn test_cut_with_succeeding_encoder() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("in.mp4"), b"").unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), 0);

    clipmark(dir.path())
        .arg("--ffmpeg")
        .arg(&ffmpeg)
        .args(["cut", "-i", "in.mp4", "-r", "0-2", "-r", "3..5", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"succeeded\": 2"));
}

#[cfg(unix)]
#[test]
fn test_loop_cut_with_succeeding_encoder() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("in.mp4"), b"").unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), 0);

    clipmark(dir.path())
        .arg("--ffmpeg")
        .arg(&ffmpeg)
        .args(["cut", "-i", "in.mp4", "-r", "1-2", "--method", "loop", "-o", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 succeeded"));
    assert!(dir.path().join("out").is_dir());
}

#[cfg(unix)]
#[test]
fn test_cut_with_failing_encoder_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("in.mp4"), b"").unwrap();
    let ffmpeg = fake_ffmpeg(dir.path(), 1);

    clipmark(dir.path())
        .arg("--ffmpeg")
        .arg(&ffmpeg)
        .args(["cut", "-i", "in.mp4", "-r", "0-2", "--method", "precise"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 failed"));
}
