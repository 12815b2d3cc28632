//! Engine command-line construction.
//!
//! Translates a [`JobSpec`] plus concrete workspace paths into the exact
//! argument vector handed to the engine. The engine is sensitive to argument
//! position, so the order is fixed:
//!
//! ```text
//! <binary> [--load <printer>] [--load <material>]
//!          --layer-height <mm> --fill-density <n>%
//!          [--support-material]
//!          --export-gcode --output <output> <input>
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use crate::types::JobSpec;

/// A fully resolved engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Build a [`tokio::process::Command`] for this invocation.
    pub fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Builds engine invocations for a configured binary and profile directory.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    binary: String,
    profiles_dir: PathBuf,
}

impl CommandBuilder {
    pub fn new(binary: impl Into<String>, profiles_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            profiles_dir: profiles_dir.into(),
        }
    }

    /// Build the invocation that slices `input` into `output`.
    ///
    /// Profile references that do not resolve to a file inside the profile
    /// directory are skipped.
    pub fn build(&self, spec: &JobSpec, input: &Path, output: &Path) -> Invocation {
        let mut args = Vec::new();

        for profile in [&spec.printer_profile, &spec.material_profile]
            .into_iter()
            .flatten()
        {
            if let Some(path) = self.resolve_profile(profile) {
                args.push("--load".to_string());
                args.push(path.to_string_lossy().into_owned());
            }
        }

        args.push("--layer-height".to_string());
        args.push(spec.layer_height.to_string());
        args.push("--fill-density".to_string());
        args.push(format!("{}%", spec.infill_percent));

        if spec.supports {
            args.push("--support-material".to_string());
        }

        args.push("--export-gcode".to_string());
        args.push("--output".to_string());
        args.push(output.to_string_lossy().into_owned());
        args.push(input.to_string_lossy().into_owned());

        Invocation {
            program: self.binary.clone(),
            args,
        }
    }

    /// Resolve a profile file name against the profile directory.
    ///
    /// Only bare file names are accepted; anything with a path component
    /// would resolve outside the directory.
    fn resolve_profile(&self, name: &str) -> Option<PathBuf> {
        let mut components = Path::new(name).components();
        let is_bare_name = matches!(
            (components.next(), components.next()),
            (Some(std::path::Component::Normal(_)), None)
        );
        if !is_bare_name {
            tracing::warn!(profile = name, "Ignoring profile reference with path components");
            return None;
        }

        let path = self.profiles_dir.join(name);
        if path.is_file() {
            Some(path)
        } else {
            tracing::warn!(profile = name, path = %path.display(), "Profile not found, skipping");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
