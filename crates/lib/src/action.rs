//! The action requested for a run.

use std::fmt;

use serde::Serialize;

/// What the caller asked the orchestrator to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
  /// Emit the descriptor and build all module drivers.
  Build,
  /// Remove the descriptor and clean all module drivers.
  Clean,
}

impl Action {
  /// The target passed to each module driver's own build.
  pub fn make_target(self) -> &'static str {
    match self {
      Action::Build => "all",
      Action::Clean => "clean",
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Action::Build => "build",
      Action::Clean => "clean",
    }
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
