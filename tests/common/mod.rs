use std::collections::BTreeMap;
use std::path::Path;

use exprun::manifest::{ManifestConfig, OutputMode, RunManifest};

/// A minimal manifest rooted in a test directory; tests tweak fields as
/// needed.
pub fn manifest(base_dir: &Path, args: &[&str]) -> RunManifest {
    RunManifest {
        config: ManifestConfig {
            base_dir: base_dir.to_path_buf(),
            instance_dir: base_dir.join("instances"),
        },
        experiment: "bench".to_string(),
        revision: None,
        instance: "foo.txt".to_string(),
        repetition: 0,
        variants: Vec::new(),
        builds: Vec::new(),
        args: args.iter().map(|s| s.to_string()).collect(),
        timeout: None,
        environ: BTreeMap::new(),
        output: OutputMode::None,
        workdir: None,
    }
}
