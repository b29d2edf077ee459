// tests/cli_dispatch_test.rs

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

// 辅助函数，避免重复
fn main_command() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

// --- 测试基本 CLI 行为 ---

#[test]
fn test_help_flag() {
    let mut cmd = main_command();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("显示此帮助信息并退出"));
}

#[test]
fn test_missing_args_shows_help() {
    let mut cmd = main_command();
    cmd.assert().failure();
}

#[test]
fn test_invalid_date_fails_fast() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();
    let mut cmd = main_command();
    cmd.env("HOME", home.path())
        .arg("-p")
        .arg("MOD021KM")
        .arg("-o")
        .arg(out.path())
        .arg("20200231");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("无效的日期格式"));
}

#[test]
fn test_show_catalog_without_catalog() {
    let home = tempdir().unwrap();
    let out = tempdir().unwrap();
    let mut cmd = main_command();
    cmd.env("HOME", home.path())
        .arg("-p")
        .arg("MOD021KM")
        .arg("-o")
        .arg(out.path())
        .arg("--show-catalog");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("尚无本地清单"));
}

// --- 端到端: 以挂载目录作为远程档案根 ---

#[test]
fn test_mirror_run_against_mounted_archive() {
    let home = tempdir().unwrap();
    let remote = tempdir().unwrap();
    let out = tempdir().unwrap();

    let date_dir = remote.path().join("MOD021KM/2020/2020_06_12");
    std::fs::create_dir_all(&date_dir).unwrap();
    std::fs::write(date_dir.join("A.hdf"), vec![1u8; 100]).unwrap();

    let mut cmd = main_command();
    cmd.env("HOME", home.path())
        .arg("-p")
        .arg("MOD021KM")
        .arg("--remote-root")
        .arg(remote.path())
        .arg("-o")
        .arg(out.path())
        .arg("--resume")
        .arg("no")
        .arg("2020");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("下载: 1"));

    let mirrored = out.path().join("MOD021KM/2020/2020_06_12/A.hdf");
    assert_eq!(mirrored.metadata().unwrap().len(), 100);
    assert!(out.path().join("MOD021KM/inventory.json").is_file());

    // 第二次运行: 全部跳过
    let mut cmd = main_command();
    cmd.env("HOME", home.path())
        .arg("-p")
        .arg("MOD021KM")
        .arg("--remote-root")
        .arg(remote.path())
        .arg("-o")
        .arg(out.path())
        .arg("--resume")
        .arg("no")
        .arg("2020");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("跳过: 1"));
}

#[test]
fn test_missing_product_is_fatal() {
    let home = tempdir().unwrap();
    let remote = tempdir().unwrap();
    let out = tempdir().unwrap();
    std::fs::create_dir_all(remote.path().join("OTHER")).unwrap();

    let mut cmd = main_command();
    cmd.env("HOME", home.path())
        .arg("-p")
        .arg("MOD021KM")
        .arg("--remote-root")
        .arg(remote.path())
        .arg("-o")
        .arg(out.path())
        .arg("--resume")
        .arg("no")
        .arg("2020");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("不存在产品"));
}
