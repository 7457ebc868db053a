use predicates::prelude::*;

use super::common::TestEnv;

fn kernel_with_drivers() -> TestEnv {
  let env = TestEnv::new();
  env.driver("serial", "CONFIG_SERIAL");
  env.driver("ahci", "CONFIG_AHCI");
  env.driver("usb", "CONFIG_USB");
  env.driver("sound", "CONFIG_SOUND");
  env.driver("nvme", "CONFIG_NVME");
  env
}

#[test]
fn build_emits_descriptor_and_builds_modules() {
  let env = kernel_with_drivers();
  env.config("# generated\nCONFIG_SMP=y\nCONFIG_AHCI=y\nCONFIG_USB=m\nCONFIG_SERIAL=y\nCONFIG_SOUND=m\nCONFIG_NVME=n\n");

  env
    .driver_build_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("Built-in: ahci, serial"))
    .stdout(predicate::str::contains("Modules: usb, sound"));

  assert_eq!(
    std::fs::read_to_string(env.descriptor_path()).unwrap(),
    "obj-y += ahci/ahci.o\nobj-y += serial/serial.o\n"
  );
  // Two module builds share four units.
  assert_eq!(env.invocations("usb"), ["-j2 all"]);
  assert_eq!(env.invocations("sound"), ["-j2 all"]);
  assert!(env.invocations("nvme").is_empty());
  assert!(env.invocations("serial").is_empty());
}

#[test]
fn failed_module_build_fails_the_run() {
  let env = kernel_with_drivers();
  env.config("CONFIG_USB=m\nCONFIG_SOUND=m\n");
  env.fail_driver("sound");

  env
    .driver_build_cmd()
    .arg("build")
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("Module driver 'sound' failed with exit code 2"));

  // The other module was still built.
  assert_eq!(env.invocations("usb"), ["-j2 all"]);
}

#[test]
fn malformed_config_fails_without_side_effects() {
  let env = kernel_with_drivers();
  env.config("CONFIG_SERIAL=y\nCONFIG_USB=m\nCONFIG_BROKEN\n");
  let before = env.snapshot();

  env
    .driver_build_cmd()
    .arg("build")
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("kernel.config:3"))
    .stderr(predicate::str::contains("CONFIG_BROKEN"));

  assert_eq!(env.snapshot(), before);
}

#[test]
fn missing_fragment_names_the_driver() {
  let env = kernel_with_drivers();
  std::fs::remove_file(env.root().join("drivers/ahci/Makefile")).unwrap();
  env.config("CONFIG_SERIAL=y\nCONFIG_AHCI=y\n");

  env
    .driver_build_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("'ahci'"));

  assert!(!env.descriptor_path().exists());
}

#[test]
fn missing_declaration_names_the_driver() {
  let env = kernel_with_drivers();
  env.write_file("drivers/orphan/Makefile", "obj-y += orphan.o\n");
  env.config("CONFIG_SERIAL=y\n");

  env
    .driver_build_cmd()
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("'orphan'"));
}

#[test]
fn strict_markers_reject_unknown_values() {
  let env = kernel_with_drivers();
  env.config("CONFIG_SERIAL=yes\n");

  env.driver_build_cmd().arg("build").assert().success();

  env
    .driver_build_cmd()
    .args(["build", "--strict-markers"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("CONFIG_SERIAL"));
}

#[test]
fn dry_run_changes_nothing() {
  let env = kernel_with_drivers();
  env.config("CONFIG_SERIAL=y\nCONFIG_USB=m\n");
  let before = env.snapshot();

  env
    .driver_build_cmd()
    .args(["build", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Dry run"));

  assert_eq!(env.snapshot(), before);
}

#[test]
fn json_output_is_valid() {
  let env = kernel_with_drivers();
  env.config("CONFIG_SERIAL=y\nCONFIG_USB=m\n");

  let output = env
    .driver_build_cmd()
    .args(["build", "-o", "json"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["action"], "build");
  assert_eq!(json["selection"]["built_in"][0], "serial");
  assert_eq!(json["selection"]["modules"][0], "usb");
  assert_eq!(json["descriptor"]["change"], "written");
  assert_eq!(json["dispatch"]["outcomes"][0]["status"], "succeeded");
}
