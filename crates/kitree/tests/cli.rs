use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::TempDir;

const BOARD: &str = r#"(kicad_pcb (version 20211014) (generator pcbnew)
  (footprint "demo-footprints:R_0402" (layer "F.Cu") (at 100 50 90)
    (attr smd)
    (property "Reference" "R1")
    (property "Internal Nr." "R-100"))
  (footprint "demo-footprints:C_0402" (layer "B.Cu") (at 20 20)
    (attr smd)
    (property "Reference" "C1")
    (property "Internal Nr." "C-100"))
)
"#;

const USER_CONFIG: &str = r#"
[[servers]]
id = "main"
domain = "https://parts.invalid"
username = "kicad"
password = "secret"
"#;

struct Fixture {
    root: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let project = root.path().join("demo");
        fs::create_dir(&project).unwrap();
        fs::write(project.join("demo.kicad_pro"), "{}\n").unwrap();
        fs::write(project.join("demo.kicad_pcb"), BOARD).unwrap();
        fs::write(root.path().join("config.toml"), USER_CONFIG).unwrap();
        Self { root }
    }

    fn project(&self) -> std::path::PathBuf {
        self.root.path().join("demo")
    }

    fn kitree(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("kitree").unwrap();
        cmd.arg("-C")
            .arg(self.project())
            .arg("--config")
            .arg(self.root.path().join("config.toml"))
            .args(args)
            .env("KITREE_CACHE_DIR", self.root.path().join("cache"));
        cmd
    }

    fn project_file(&self) -> serde_json::Value {
        let text = fs::read_to_string(self.project().join(".kitree")).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

fn stdout(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn commands_need_an_initialised_project() {
    let fx = Fixture::new();
    fx.kitree(&["parts", "list"]).assert().failure();
}

#[test]
fn init_and_manage_parts() {
    let fx = Fixture::new();
    fx.kitree(&["init", "--server", "main"]).assert().success();
    fx.kitree(&["init"]).assert().failure();

    fx.kitree(&["parts", "add", "R-100", "C-100", "R-100"])
        .assert()
        .success();
    fx.kitree(&["parts", "rm", "C-100"]).assert().success();
    fx.kitree(&["master", "PRJ-1"]).assert().success();

    let listed = stdout(&mut fx.kitree(&["parts", "list"]));
    assert_eq!(listed.trim(), "- R-100");

    let config = fx.project_file();
    assert_eq!(config["inventreeServerId"], "main");
    assert_eq!(config["masterPart"], "PRJ-1");
    assert_eq!(config["parts"], serde_json::json!(["R-100"]));

    let user = fs::read_to_string(fx.root.path().join("config.toml")).unwrap();
    assert!(user.contains("last_project = \"demo\""));
}

#[test]
fn init_rejects_unknown_server() {
    let fx = Fixture::new();
    fx.kitree(&["init", "--server", "other"]).assert().failure();
    assert!(!fx.project().join(".kitree").exists());
}

#[test]
fn build_without_server_fails_before_connecting() {
    let fx = Fixture::new();
    fx.kitree(&["init"]).assert().success();
    let output = fx.kitree(&["build", "libs"]).assert().failure().get_output().clone();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("no InvenTree server configured"));
}

#[test]
fn xy_export_runs_offline() {
    let fx = Fixture::new();
    fx.kitree(&["init"]).assert().success();
    fx.kitree(&["parts", "add", "R-100"]).assert().success();

    let out = fx.root.path().join("out");
    fx.kitree(&["export", "jlc-xy", out.to_str().unwrap()])
        .assert()
        .success();

    let csv = fs::read_to_string(Path::new(&out).join("demo_jlc_xy.csv")).unwrap();
    let rows: Vec<_> = csv.lines().skip(4).collect();
    assert_eq!(rows, ["\"R1\",\"100\",\"50\",\"Top\",\"90\""]);
}
