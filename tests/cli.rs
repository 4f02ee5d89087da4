use assert_cmd::Command;

#[test]
fn help_lists_game_and_serve() {
    let output = Command::cargo_bin("wordmint")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("serve"));
    assert!(text.contains("--round-secs"));
}

#[test]
fn serve_refuses_remote_store() {
    Command::cargo_bin("wordmint")
        .unwrap()
        .args(["serve", "--store", "http"])
        .assert()
        .failure();
}

#[test]
fn game_requires_a_terminal() {
    Command::cargo_bin("wordmint")
        .unwrap()
        .args(["--store", "memory", "--mute"])
        .write_stdin("")
        .assert()
        .failure();
}
