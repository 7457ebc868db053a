use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn clean_removes_descriptor_and_cleans_modules() {
  let env = TestEnv::new();
  env.driver("serial", "CONFIG_SERIAL");
  env.driver("usb", "CONFIG_USB");
  env.config("CONFIG_SERIAL=y\nCONFIG_USB=m\n");
  env.write_file("drivers.config", "stale\n");

  env
    .driver_build_cmd()
    .arg("clean")
    .assert()
    .success()
    .stdout(predicate::str::contains("Removed drivers.config"));

  assert!(!env.descriptor_path().exists());
  assert_eq!(env.invocations("usb"), ["-j4 clean"]);
}

#[test]
fn clean_twice_succeeds() {
  let env = TestEnv::new();
  env.driver("serial", "CONFIG_SERIAL");
  env.config("CONFIG_SERIAL=y\n");

  env.driver_build_cmd().arg("clean").assert().success();
  env
    .driver_build_cmd()
    .arg("clean")
    .assert()
    .success()
    .stdout(predicate::str::contains("already absent"));
}

#[test]
fn build_then_clean_restores_tree() {
  let env = TestEnv::new();
  env.driver("serial", "CONFIG_SERIAL");
  env.driver("ahci", "CONFIG_AHCI");
  env.config("CONFIG_SERIAL=y\nCONFIG_AHCI=y\n");
  let before = env.snapshot();

  env.driver_build_cmd().arg("build").assert().success();
  assert!(env.descriptor_path().exists());
  env.driver_build_cmd().arg("clean").assert().success();

  assert_eq!(env.snapshot(), before);
}
