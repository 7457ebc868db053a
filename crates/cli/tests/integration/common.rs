//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};
use std::process;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin;
use tempfile::TempDir;

/// Build tool stand-in: records `<jobs> <target>` in the driver directory,
/// exits 2 when the directory holds a `fail` marker and, with a `hang`
/// marker, writes its pid to `pid` and sleeps.
const FAKE_MAKE: &str = r#"jobs="$1"
dir="$3"
target="$4"
echo "$jobs $target" >> "$dir/invocations"
if [ -f "$dir/fail" ]; then
  echo "make: *** [all] Error 1" >&2
  exit 2
fi
if [ -f "$dir/hang" ]; then
  echo $$ > "$dir/pid"
  exec sleep 30
fi
exit 0
"#;

/// Isolated kernel source directory.
///
/// Each test gets its own temporary directory holding `drivers/` and
/// `kernel.config`, plus a separate directory for the fake build tool so the
/// kernel tree only contains what the test put there.
pub struct TestEnv {
  pub temp: TempDir,
  tools: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("drivers")).unwrap();
    let tools = TempDir::new().unwrap();
    std::fs::write(tools.path().join("fake-make.sh"), FAKE_MAKE).unwrap();
    Self { temp, tools }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Add a driver with a declaration and a build fragment.
  pub fn driver(&self, name: &str, key: &str) {
    self.write_file(&format!("drivers/{name}/build-config"), &format!("{key}\n"));
    self.write_file(&format!("drivers/{name}/Makefile"), &format!("obj-y += {name}/{name}.o\n"));
  }

  pub fn config(&self, content: &str) {
    self.write_file("kernel.config", content);
  }

  pub fn fail_driver(&self, name: &str) {
    self.write_file(&format!("drivers/{name}/fail"), "");
  }

  pub fn hang_driver(&self, name: &str) {
    self.write_file(&format!("drivers/{name}/hang"), "");
  }

  /// Pid of a hanging sub-build, once it has started.
  pub fn sub_build_pid(&self, name: &str) -> Option<i32> {
    std::fs::read_to_string(self.temp.path().join("drivers").join(name).join("pid"))
      .ok()
      .and_then(|s| s.trim().parse().ok())
  }

  pub fn descriptor_path(&self) -> PathBuf {
    self.temp.path().join("drivers.config")
  }

  pub fn invocations(&self, name: &str) -> Vec<String> {
    std::fs::read_to_string(self.temp.path().join("drivers").join(name).join("invocations"))
      .map(|s| s.lines().map(str::to_string).collect())
      .unwrap_or_default()
  }

  /// Every entry below the kernel directory, relative and sorted.
  pub fn snapshot(&self) -> Vec<PathBuf> {
    fn walk(dir: &Path, base: &Path, out: &mut Vec<PathBuf>) {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        out.push(path.strip_prefix(base).unwrap().to_path_buf());
        if path.is_dir() {
          walk(&path, base, out);
        }
      }
    }

    let mut out = Vec::new();
    walk(self.temp.path(), self.temp.path(), &mut out);
    out.sort();
    out
  }

  /// Get a pre-configured Command for the driver-build binary.
  ///
  /// Runs against this environment's kernel directory with the fake build
  /// tool and a fixed number of processing units.
  pub fn driver_build_cmd(&self) -> Command {
    Command::from_std(self.driver_build_process())
  }

  /// Same as `driver_build_cmd`, for tests that need to spawn and signal it.
  pub fn driver_build_process(&self) -> process::Command {
    let mut cmd = process::Command::new(cargo_bin!("driver-build"));
    cmd.arg("-C").arg(self.temp.path());
    cmd.arg("--make").arg(format!("sh {}", self.tools.path().join("fake-make.sh").display()));
    cmd.args(["--jobs", "4"]);
    cmd.env_remove("MAKE");
    cmd
  }
}
