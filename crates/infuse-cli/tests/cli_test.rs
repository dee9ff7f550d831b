use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn infuse() -> assert_cmd::Command {
    cargo_bin_cmd!("infuse")
}

const IMAGE: &str = r#"
reference = "oci.example.org/busybox:latest"
tags = ["oci.example.org/busybox:latest"]
"#;

const HELLO_ASSET: &str = r#"
[[asset]]
destination = "/hello-world.txt"
source = { text = "hello-world.txt" }
"#;

/// A working directory with an infuse.toml whose staging root lives inside it.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self::with_engine("docker")
    }

    fn with_engine(program: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let config = format!(
            "[stack]\n\
             organization = \"org\"\n\
             project = \"project\"\n\
             name = \"stack\"\n\
             \n\
             [inject]\n\
             staging_root = '{}'\n\
             \n\
             [engine]\n\
             program = '{program}'\n",
            dir.path().join("staging").display()
        );
        std::fs::write(dir.path().join("infuse.toml"), config).unwrap();
        std::fs::write(dir.path().join("image.toml"), IMAGE).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn assets(&self, manifest: &str) -> PathBuf {
        let path = self.path().join("assets.toml");
        std::fs::write(&path, manifest).unwrap();
        path
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = infuse();
        cmd.current_dir(self.path());
        cmd
    }
}

// ── Help / Version ──

#[test]
fn shows_help() {
    infuse()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Inject files and secrets into container images",
        ));
}

#[test]
fn shows_version() {
    infuse()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("infuse"));
}

// ── Render ──

#[test]
fn render_prints_dockerfile_and_context() {
    let fixture = Fixture::new();
    fixture.assets(HELLO_ASSET);

    fixture
        .cmd()
        .args(["render", "--image", "image.toml", "--assets", "assets.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pulumi-JU5c7AWT-Jz2nHA2W"))
        .stdout(predicate::str::contains(
            "# tag: oci.example.org/busybox:latest-injected.0",
        ))
        .stdout(predicate::str::contains(
            "COPY --from=oci.example.org/busybox:latest /etc/passwd /etc/group /etc/",
        ))
        .stdout(predicate::str::contains("FROM oci.example.org/busybox:latest\nCOPY --from=0 "));

    // dry run: nothing is left behind
    assert!(!fixture.path().join("staging/pulumi-JU5c7AWT-Jz2nHA2W").exists());
}

#[test]
fn render_lists_secret_ids_but_not_values() {
    let fixture = Fixture::new();
    fixture.assets(
        r#"
[[asset]]
destination = "/run/app/token"
mode = 0o600
source = { secret = { text = "s3cr3t-value" } }
"#,
    );

    fixture
        .cmd()
        .args(["render", "--image", "image.toml", "--assets", "assets.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# secret: asset0"))
        .stdout(predicate::str::contains("RUN --mount=type=secret,id=asset0"))
        .stdout(predicate::str::contains("RUN chmod 600 "))
        .stdout(predicate::str::contains("s3cr3t-value").not())
        .stdout(predicate::str::contains("czNjcjN0LXZhbHVl").not());
}

#[test]
fn render_resolves_files_relative_to_the_manifest() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(fixture.path().join("files")).unwrap();
    std::fs::write(fixture.path().join("files/hello.txt"), "hello-world.txt").unwrap();
    std::fs::write(
        fixture.path().join("files/assets.toml"),
        r#"
[[asset]]
destination = "/hello-world.txt"
source = { file = "hello.txt" }
"#,
    )
    .unwrap();

    fixture
        .cmd()
        .args([
            "render",
            "--image",
            "image.toml",
            "--assets",
            "files/assets.toml",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("pulumi-JU5c7AWT-Jz2nHA2W"));
}

#[test]
fn render_expands_directory_sources() {
    let fixture = Fixture::new();
    std::fs::create_dir_all(fixture.path().join("public/css")).unwrap();
    std::fs::write(fixture.path().join("public/index.html"), "<html/>").unwrap();
    std::fs::write(fixture.path().join("public/css/site.css"), "body {}").unwrap();
    std::fs::write(fixture.path().join("public/notes.md"), "draft").unwrap();
    fixture.assets(
        r#"
[[asset]]
destination = "/srv/www"
source = { directory = "public", recursive = true, filters = ['\.(html|css)$'] }
mode = 0o644
"#,
    );

    fixture
        .cmd()
        .args(["render", "--image", "image.toml", "--assets", "assets.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/srv/www/css/site.css\nRUN chmod 644 "))
        .stdout(predicate::str::contains("/srv/www/index.html"))
        .stdout(predicate::str::contains("notes.md").not());
}

#[test]
fn render_rejects_group_without_user() {
    let fixture = Fixture::new();
    fixture.assets(
        r#"
[[asset]]
destination = "/hello-world.txt"
source = { text = "hello-world.txt" }
group = "users"
"#,
    );

    fixture
        .cmd()
        .args(["render", "--image", "image.toml", "--assets", "assets.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sets `group` without `user`"));
}

#[test]
fn suffix_flag_overrides_config() {
    let fixture = Fixture::new();
    fixture.assets(HELLO_ASSET);

    fixture
        .cmd()
        .args([
            "render",
            "--image",
            "image.toml",
            "--assets",
            "assets.toml",
            "--suffix",
            "-patched.{idx}",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "# tag: oci.example.org/busybox:latest-patched.0",
        ));
}

#[test]
fn stack_flags_override_config() {
    let fixture = Fixture::new();
    fixture.assets(HELLO_ASSET);

    fixture
        .cmd()
        .args([
            "render",
            "--image",
            "image.toml",
            "--assets",
            "assets.toml",
            "--stack-name",
            "production",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("-Jz2nHA2W"))
        .stdout(predicate::str::contains("JU5c7AWT").not());
}

#[test]
fn render_rejects_duplicate_destinations() {
    let fixture = Fixture::new();
    fixture.assets(
        r#"
[[asset]]
destination = "/hello-world.txt"
source = { text = "one" }

[[asset]]
destination = "/hello-world.txt"
source = { text = "two" }
"#,
    );

    fixture
        .cmd()
        .args(["render", "--image", "image.toml", "--assets", "assets.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Several assets (#0, #1) found with the same destination: /hello-world.txt",
        ));
}

#[test]
fn render_rejects_unsupported_asset_shapes() {
    let fixture = Fixture::new();
    fixture.assets(
        r#"
[[asset]]
destination = "/hello-world.txt"
source = { path = "hello.txt" }
"#,
    );

    fixture
        .cmd()
        .args(["render", "--image", "image.toml", "--assets", "assets.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported asset type"));
}

#[test]
fn missing_image_descriptor_fails() {
    let fixture = Fixture::new();
    fixture.assets(HELLO_ASSET);

    fixture
        .cmd()
        .args(["render", "--image", "missing.toml", "--assets", "assets.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read image descriptor"));
}

#[test]
fn invalid_config_fails() {
    let fixture = Fixture::new();
    fixture.assets(HELLO_ASSET);
    std::fs::write(fixture.path().join("infuse.toml"), "[inject\n").unwrap();

    fixture
        .cmd()
        .args(["render", "--image", "image.toml", "--assets", "assets.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("infuse.toml"));
}

// ── Inject ──

#[test]
fn inject_without_assets_returns_the_image_unchanged() {
    let fixture = Fixture::new();
    fixture.assets("");

    fixture
        .cmd()
        .args(["inject", "--image", "image.toml", "--assets", "assets.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "reference = \"oci.example.org/busybox:latest\"",
        ));
}

#[test]
fn inject_writes_descriptor_to_output() {
    let fixture = Fixture::new();
    fixture.assets("");

    fixture
        .cmd()
        .args([
            "inject",
            "--image",
            "image.toml",
            "--assets",
            "assets.toml",
            "--output",
            "derived.toml",
        ])
        .assert()
        .success();

    let derived = std::fs::read_to_string(fixture.path().join("derived.toml")).unwrap();
    assert!(derived.contains("reference = \"oci.example.org/busybox:latest\""));
}

#[test]
fn inject_reports_engine_failures() {
    let fixture = Fixture::with_engine("/nonexistent/infuse-docker");
    fixture.assets(HELLO_ASSET);

    fixture
        .cmd()
        .args(["inject", "--image", "image.toml", "--assets", "assets.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "failed to inject assets into oci.example.org/busybox:latest",
        ));

    // build directories are cleaned up on failure too
    assert!(!fixture.path().join("staging/pulumi-JU5c7AWT-Jz2nHA2W").exists());
}
