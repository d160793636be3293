// src/manifest/compile.rs

//! Compilation of live configuration into a [`RunManifest`].

use std::collections::BTreeMap;
use std::collections::HashSet;

use anyhow::{Result, ensure};
use tracing::debug;

use crate::config::{Project, ResolvedBuild, RunDescriptor};
use crate::manifest::{
    BuildDescriptor, ManifestConfig, RunManifest, VariantDescriptor,
};

/// Compile the self-describing manifest for one run.
///
/// Compilation is deterministic: the same project, descriptor and revision
/// always produce the same manifest, down to the YAML bytes. Nothing is
/// merged or expanded here; variant composition and placeholder expansion are
/// properties of manifest consumption.
pub fn compile(project: &Project, run: &RunDescriptor) -> Result<RunManifest> {
    let exp = &run.experiment;
    let builds = resolve_build_closure(project, exp.revision.as_deref(), &exp.used_builds)?;

    debug!(
        experiment = %exp.name,
        instance = %run.instance,
        builds = builds.len(),
        "compiled run manifest"
    );

    let variants = run
        .variation
        .iter()
        .map(|v| VariantDescriptor {
            name: v.name.clone(),
            extra_args: v.extra_args.clone(),
            environ: stringify_environ(&v.environ),
        })
        .collect();

    Ok(RunManifest {
        config: ManifestConfig {
            base_dir: project.base_dir.clone(),
            instance_dir: project.instance_dir.clone(),
        },
        experiment: exp.name.clone(),
        revision: exp.revision.clone(),
        instance: run.instance.clone(),
        repetition: run.repetition,
        variants,
        builds: builds
            .into_iter()
            .map(|b| BuildDescriptor {
                prefix: b.prefix,
                exports_python: b.exports_python,
            })
            .collect(),
        args: exp.args.clone(),
        timeout: exp.timeout,
        environ: stringify_environ(&exp.environ),
        output: exp.output,
        workdir: exp.workdir.clone(),
    })
}

/// Resolve the transitive build closure in first-discovery order.
///
/// A worklist traversal over each build's requirements; the visited set keyed
/// by build name deduplicates diamonds to a single entry at the position it
/// was first reached. The directly-used list must itself be duplicate-free:
/// that is a configuration-authoring bug, not a runtime condition.
fn resolve_build_closure(
    project: &Project,
    revision: Option<&str>,
    used_builds: &[String],
) -> Result<Vec<ResolvedBuild>> {
    let mut closure: Vec<ResolvedBuild> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();

    for name in used_builds {
        ensure!(
            visited.insert(name.clone()),
            "build '{name}' listed twice in used_builds"
        );
        closure.push(project.build(name, revision)?);
    }

    // Index-based loop: the closure grows while we walk it.
    let mut i = 0;
    while i < closure.len() {
        let requirements = project.requirements_of(&closure[i].name)?.to_vec();
        for req_name in requirements {
            if visited.contains(&req_name) {
                continue;
            }
            let build = project.build(&req_name, revision)?;
            visited.insert(req_name);
            closure.push(build);
        }
        i += 1;
    }

    Ok(closure)
}

/// Coerce YAML scalar environment values to their string representation.
fn stringify_environ(
    environ: &BTreeMap<String, serde_yaml::Value>,
) -> BTreeMap<String, String> {
    environ
        .iter()
        .map(|(k, v)| (k.clone(), stringify_value(v)))
        .collect()
}

fn stringify_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        // Collections in environ are unusual but not worth failing over;
        // fall back to their YAML rendering, trimmed of the trailing newline.
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::{BuildSpec, ExperimentSpec, VariantSpec};
    use crate::manifest::OutputMode;

    fn project_with_diamond() -> Project {
        // app -> {lib_a, lib_b}, lib_a -> base, lib_b -> base
        let mut builds = BTreeMap::new();
        builds.insert(
            "app".to_string(),
            BuildSpec {
                requirements: vec!["lib_a".to_string(), "lib_b".to_string()],
                exports_python: Vec::new(),
            },
        );
        builds.insert(
            "lib_a".to_string(),
            BuildSpec {
                requirements: vec!["base".to_string()],
                exports_python: Vec::new(),
            },
        );
        builds.insert(
            "lib_b".to_string(),
            BuildSpec {
                requirements: vec!["base".to_string()],
                exports_python: Vec::new(),
            },
        );
        builds.insert("base".to_string(), BuildSpec::default());
        Project {
            base_dir: PathBuf::from("/proj"),
            instance_dir: PathBuf::from("/proj/instances"),
            builds,
        }
    }

    fn descriptor(project_builds: &[&str]) -> RunDescriptor {
        RunDescriptor {
            experiment: ExperimentSpec {
                name: "bench".to_string(),
                args: vec!["solve".to_string(), "@INSTANCE@".to_string()],
                used_builds: project_builds.iter().map(|s| s.to_string()).collect(),
                timeout: None,
                environ: BTreeMap::new(),
                output: OutputMode::None,
                workdir: None,
                revision: None,
            },
            variation: Vec::new(),
            instance: "g.txt".to_string(),
            repetition: 0,
        }
    }

    #[test]
    fn diamond_dependency_appears_once_in_discovery_order() {
        let project = project_with_diamond();
        let manifest = compile(&project, &descriptor(&["app"])).unwrap();
        let prefixes: Vec<_> = manifest
            .builds
            .iter()
            .map(|b| b.prefix.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(prefixes, vec!["app", "lib_a", "lib_b", "base"]);
    }

    #[test]
    fn compilation_is_deterministic() {
        let project = project_with_diamond();
        let run = descriptor(&["app"]);
        let a = compile(&project, &run).unwrap().to_yaml().unwrap();
        let b = compile(&project, &run).unwrap().to_yaml().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn duplicate_used_build_fails_hard() {
        let project = project_with_diamond();
        assert!(compile(&project, &descriptor(&["app", "app"])).is_err());
    }

    #[test]
    fn environ_values_are_stringified() {
        let project = project_with_diamond();
        let mut run = descriptor(&[]);
        run.experiment
            .environ
            .insert("THREADS".to_string(), serde_yaml::Value::from(8));
        run.variation.push(VariantSpec {
            name: "fast".to_string(),
            extra_args: Vec::new(),
            environ: [("TURBO".to_string(), serde_yaml::Value::from(true))]
                .into_iter()
                .collect(),
        });
        let manifest = compile(&project, &run).unwrap();
        assert_eq!(manifest.environ.get("THREADS").map(String::as_str), Some("8"));
        assert_eq!(
            manifest.variants[0].environ.get("TURBO").map(String::as_str),
            Some("true")
        );
    }
}
