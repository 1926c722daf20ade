use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn build_scene() -> (TempDir, PathBuf) {
    let manifest = r#"<scene>
  <settings>
    <rain-count>300</rain-count>
    <rain-seed>11</rain-seed>
  </settings>
  <object>
    <name>Floor</name>
    <mesh>meshes/floor.obj</mesh>
  </object>
  <object>
    <name>Drop</name>
    <role>raindrop</role>
  </object>
</scene>
"#;
    let floor = "v -1 0 1\nv 1 0 1\nv 1 0 -1\nv -1 0 -1\nvn 0 1 0\nf 1//1 2//1 3//1 4//1\n";

    let dir = TempDir::new().expect("temp scene dir");
    fs::create_dir(dir.path().join("meshes")).expect("meshes dir");
    fs::write(dir.path().join("meshes/floor.obj"), floor).expect("write mesh");
    let path = dir.path().join("scene.xml");
    fs::write(&path, manifest).expect("write manifest");
    (dir, path)
}

#[test]
fn cli_prints_scene_summary() {
    let (_dir, path) = build_scene();
    let mut cmd = Command::cargo_bin("rainscape").expect("binary exists");
    cmd.arg(&path).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 2 objects (300 raindrops, seed 11)"))
        .stdout(contains(" - Floor (static, 4 vertices, 2 triangles)"))
        .stdout(contains(" - Drop (raindrop, 24 vertices, 12 triangles)"))
        .stdout(contains("Shadow map: 2048x2048"));
}

#[test]
fn cli_rejects_unknown_flags() {
    let (_dir, path) = build_scene();
    let mut cmd = Command::cargo_bin("rainscape").expect("binary exists");
    cmd.arg(&path).arg("--frames");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --frames"));
}

#[test]
fn cli_reports_missing_manifest() {
    let dir = TempDir::new().expect("temp dir");
    let mut cmd = Command::cargo_bin("rainscape").expect("binary exists");
    cmd.arg(dir.path().join("absent.xml")).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("failed to load scene"));
}

#[test]
fn cli_reports_missing_mesh_with_object_name() {
    let (dir, path) = build_scene();
    fs::remove_file(dir.path().join("meshes/floor.obj")).expect("drop mesh");
    let mut cmd = Command::cargo_bin("rainscape").expect("binary exists");
    cmd.arg(&path).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("Floor"));
}
