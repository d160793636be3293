// src/manifest/mod.rs

//! The run manifest: everything needed to execute one run, with no references
//! back into live configuration.
//!
//! A manifest is compiled once (see [`compile`]) and then only *consumed*:
//! variant merging, search-path derivation and path resolution are all
//! reinterpretations of the same immutable record, so a manifest can be
//! YAML-encoded, shipped to another host and executed there without access to
//! the configuration it came from.

pub mod compile;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::paths;

/// What happens to the child's standard output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Discard stdout.
    #[default]
    None,
    /// Redirect stdout into the run's `out` file.
    Stdout,
}

/// The `config` sub-record of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestConfig {
    pub base_dir: PathBuf,
    pub instance_dir: PathBuf,
}

/// One variant applied to the run, copied verbatim from configuration.
///
/// Environment maps of successive variants merge in list order (later wins);
/// `extra_args` concatenate in list order. Neither happens at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDescriptor {
    pub name: String,
    pub extra_args: Vec<String>,
    pub environ: BTreeMap<String, String>,
}

/// One build in the resolved dependency closure.
///
/// Position in the manifest's `builds` list is discovery order, which is also
/// search-path precedence (earlier entries shadow later ones).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    pub prefix: PathBuf,
    pub exports_python: Vec<PathBuf>,
}

/// Immutable, self-describing description of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub config: ManifestConfig,
    pub experiment: String,
    pub revision: Option<String>,
    pub instance: String,
    pub repetition: u32,
    pub variants: Vec<VariantDescriptor>,
    pub builds: Vec<BuildDescriptor>,
    pub args: Vec<String>,
    pub timeout: Option<f64>,
    pub environ: BTreeMap<String, String>,
    #[serde(default)]
    pub output: OutputMode,
    pub workdir: Option<String>,
}

/// Terminal outcome of a run, as persisted in the `status` marker.
///
/// `status` and `signal` are mutually exclusive: exactly one is set,
/// depending on whether the child exited or died to an uncaught signal.
/// `timeout` is advisory; it records that the deadline passed, not that the
/// timeout signal is what ended the child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub timeout: bool,
    pub walltime: f64,
    pub status: Option<i32>,
    pub signal: Option<String>,
}

impl RunManifest {
    /// Decode a manifest from its YAML encoding, validating eagerly.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let manifest: RunManifest =
            serde_yaml::from_str(text).context("decoding run manifest")?;
        if manifest.args.is_empty() {
            bail!("run manifest has an empty argument list");
        }
        Ok(manifest)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("encoding run manifest")
    }

    pub fn variant_names(&self) -> Vec<String> {
        self.variants.iter().map(|v| v.name.clone()).collect()
    }

    /// Explicit environment for the child: the manifest-level map overlaid
    /// with each variant's map in list order, later variants winning.
    pub fn merged_environ(&self) -> BTreeMap<String, String> {
        let mut environ = self.environ.clone();
        for variant in &self.variants {
            environ.extend(variant.environ.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        environ
    }

    /// All variants' extra arguments, concatenated in list order.
    pub fn extra_args(&self) -> Vec<String> {
        self.variants
            .iter()
            .flat_map(|v| v.extra_args.iter().cloned())
            .collect()
    }

    pub fn aux_subdir(&self) -> PathBuf {
        paths::aux_subdir(
            &self.config.base_dir,
            &self.experiment,
            &self.variant_names(),
            self.revision.as_deref(),
        )
    }

    pub fn output_subdir(&self) -> PathBuf {
        paths::output_subdir(
            &self.config.base_dir,
            &self.experiment,
            &self.variant_names(),
            self.revision.as_deref(),
        )
    }

    /// Path of an auxiliary marker file (`lock`, `run`, `stderr`).
    pub fn aux_file_path(&self, extension: &str) -> PathBuf {
        self.aux_subdir()
            .join(paths::run_file_name(extension, &self.instance, self.repetition))
    }

    /// Path of an output file (`out`, `status`).
    pub fn output_file_path(&self, extension: &str) -> PathBuf {
        self.output_subdir()
            .join(paths::run_file_name(extension, &self.instance, self.repetition))
    }

    /// Executable search paths derived from the build closure, in
    /// precedence order.
    pub fn bin_paths(&self) -> Vec<PathBuf> {
        self.builds.iter().map(|b| b.prefix.join("bin")).collect()
    }

    /// Dynamic-library search paths; `lib64` precedes `lib` per prefix.
    pub fn ldso_paths(&self) -> Vec<PathBuf> {
        self.builds
            .iter()
            .flat_map(|b| [b.prefix.join("lib64"), b.prefix.join("lib")])
            .collect()
    }

    /// Python module search paths from each build's exports.
    pub fn python_paths(&self) -> Vec<PathBuf> {
        self.builds
            .iter()
            .flat_map(|b| b.exports_python.iter().map(|e| b.prefix.join(e)))
            .collect()
    }
}

impl StatusRecord {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("decoding status record")
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("encoding status record")
    }
}
