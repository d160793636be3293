// src/paths.rs

//! Naming scheme for per-run directories and marker files.
//!
//! Both the coordinator and the supervisor derive paths for the same run
//! independently, so everything here is a pure function of the run identity:
//! the two derivations agree by construction. Changing any of these functions
//! changes the on-disk layout observed by external tooling.

use std::path::{Path, PathBuf};

/// Directory slug for an experiment × variant-set × revision combination,
/// e.g. `grep-bench~simd~jemalloc@v2`.
fn run_slug(experiment: &str, variant_names: &[String], revision: Option<&str>) -> String {
    let mut slug = experiment.to_string();
    for name in variant_names {
        slug.push('~');
        slug.push_str(name);
    }
    if let Some(rev) = revision {
        slug.push('@');
        slug.push_str(rev);
    }
    slug
}

/// Subdirectory holding auxiliary marker files (lock, run, stderr).
pub fn aux_subdir(
    base_dir: &Path,
    experiment: &str,
    variant_names: &[String],
    revision: Option<&str>,
) -> PathBuf {
    base_dir
        .join("aux")
        .join(run_slug(experiment, variant_names, revision))
}

/// Subdirectory holding run output (out, status).
pub fn output_subdir(
    base_dir: &Path,
    experiment: &str,
    variant_names: &[String],
    revision: Option<&str>,
) -> PathBuf {
    base_dir
        .join("output")
        .join(run_slug(experiment, variant_names, revision))
}

/// File name for a marker of the given extension, per instance × repetition.
///
/// Repetition 0 is the common case and stays short: `graph.txt.out`.
/// Higher repetitions get an index: `graph.txt[3].out`.
pub fn run_file_name(extension: &str, instance: &str, repetition: u32) -> String {
    if repetition == 0 {
        format!("{instance}.{extension}")
    } else {
        format!("{instance}[{repetition}].{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_without_variants_or_revision_is_experiment_name() {
        let dir = aux_subdir(Path::new("/base"), "bench", &[], None);
        assert_eq!(dir, PathBuf::from("/base/aux/bench"));
    }

    #[test]
    fn slug_includes_variants_and_revision() {
        let variants = vec!["fast".to_string(), "small".to_string()];
        let dir = output_subdir(Path::new("/base"), "bench", &variants, Some("v2"));
        assert_eq!(dir, PathBuf::from("/base/output/bench~fast~small@v2"));
    }

    #[test]
    fn repetition_zero_has_no_index() {
        assert_eq!(run_file_name("out", "graph.txt", 0), "graph.txt.out");
        assert_eq!(run_file_name("lock", "graph.txt", 2), "graph.txt[2].lock");
    }
}
