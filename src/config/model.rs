// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, bail};
use serde::Deserialize;

use crate::manifest::OutputMode;

/// Project-level configuration shared by all experiments.
///
/// `base_dir` anchors the whole on-disk layout (`aux/`, `output/`,
/// `builds/`); `instance_dir` is where input instances live and is the
/// expansion of the `@INSTANCE@` placeholder prefix.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub base_dir: PathBuf,
    pub instance_dir: PathBuf,

    /// All known builds, keyed by build name.
    #[serde(default)]
    pub builds: BTreeMap<String, BuildSpec>,
}

/// One named build artifact an experiment can depend on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSpec {
    /// Names of other builds this build requires at runtime.
    #[serde(default)]
    pub requirements: Vec<String>,

    /// Paths below the install prefix that are importable Python modules.
    #[serde(default)]
    pub exports_python: Vec<PathBuf>,
}

/// A build resolved against a revision: its install prefix is now concrete.
#[derive(Debug, Clone)]
pub struct ResolvedBuild {
    pub name: String,
    pub prefix: PathBuf,
    pub exports_python: Vec<PathBuf>,
}

/// One experiment definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentSpec {
    pub name: String,

    /// Argument template; `@NAME@` placeholders are expanded at launch time.
    pub args: Vec<String>,

    /// Builds this experiment uses directly. Transitive requirements are
    /// resolved during manifest compilation.
    #[serde(default)]
    pub used_builds: Vec<String>,

    /// Soft wall-clock limit in seconds; absent means unlimited.
    #[serde(default)]
    pub timeout: Option<f64>,

    /// Extra environment for the child. Values may be any YAML scalar;
    /// they are stringified during compilation.
    #[serde(default)]
    pub environ: BTreeMap<String, serde_yaml::Value>,

    #[serde(default)]
    pub output: OutputMode,

    /// Working-directory template; defaults to the project base dir.
    #[serde(default)]
    pub workdir: Option<String>,

    /// Revision to resolve builds against.
    #[serde(default)]
    pub revision: Option<String>,
}

/// One variant axis value applied to a run.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantSpec {
    pub name: String,

    #[serde(default)]
    pub extra_args: Vec<String>,

    #[serde(default)]
    pub environ: BTreeMap<String, serde_yaml::Value>,
}

/// Identity of a single run: experiment × variants × instance × repetition.
#[derive(Debug, Clone)]
pub struct RunDescriptor {
    pub experiment: ExperimentSpec,
    pub variation: Vec<VariantSpec>,
    pub instance: String,
    pub repetition: u32,
}

impl Project {
    /// Resolve a build name against a revision.
    ///
    /// The install prefix is `<base_dir>/builds/<name>@<revision>`, or
    /// `<base_dir>/builds/<name>` for revisionless projects. Unknown build
    /// names are configuration bugs and fail hard.
    pub fn build(&self, name: &str, revision: Option<&str>) -> Result<ResolvedBuild> {
        let Some(spec) = self.builds.get(name) else {
            bail!("unknown build '{name}' referenced by experiment configuration");
        };
        let dir_name = match revision {
            Some(rev) => format!("{name}@{rev}"),
            None => name.to_string(),
        };
        Ok(ResolvedBuild {
            name: name.to_string(),
            prefix: self.base_dir.join("builds").join(dir_name),
            exports_python: spec.exports_python.clone(),
        })
    }

    /// Requirement names of a build, for closure traversal.
    pub fn requirements_of(&self, name: &str) -> Result<&[String]> {
        match self.builds.get(name) {
            Some(spec) => Ok(&spec.requirements),
            None => bail!("unknown build '{name}' referenced as a requirement"),
        }
    }
}
