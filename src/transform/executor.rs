//! Transform chain executor.
//!
//! Runs a file through its combined chain under the session timeout and
//! turns the final payload into a [`Module`].

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Emission, ModuleKind, Payload, StageContext, TransformSpec};
use crate::core::{
    BuildError, BuildMode, BuildSession, ManifestConsistencyError, ModuleId, RuleMatchAmbiguity,
    TransformError,
};
use crate::graph::Module;
use crate::rule::Rule;
use crate::utils::hash::{ContentHash, HashBuilder};
use crate::utils::timeout::{Deadline, run_with_timeout};

/// Outcome of running one file.
pub struct Executed {
    pub module: Module,
    pub ambiguity: Option<RuleMatchAmbiguity>,
}

pub struct Executor<'s> {
    session: &'s BuildSession,
}

impl<'s> Executor<'s> {
    pub fn new(session: &'s BuildSession) -> Self {
        Self { session }
    }

    /// Match, read and transform `path`.
    pub fn run(&self, path: &Path, tick: u64) -> Result<Executed, BuildError> {
        let session = self.session;
        let id = ModuleId::from_path(&session.root, path);
        let rules = session.rules.matching(path);

        let ambiguity = (rules.len() > 1).then(|| RuleMatchAmbiguity {
            file: id.clone(),
            rules: rules.iter().map(|r| r.index).collect(),
        });
        check_single_emission(&id, &rules)?;

        let chain = session.chain_for(&rules);
        let bytes = std::fs::read(path).map_err(|err| TransformError {
            file: path.to_path_buf(),
            stage: "read".to_string(),
            cause: err.to_string(),
        })?;
        let fingerprint = fingerprint(&bytes, &chain, session.mode);

        let mut payload = if chain.is_empty() {
            Payload::source(bytes)
        } else {
            execute(path, &id, session.mode, chain, bytes, session.timeout)?
        };

        // Opaque bytes nobody placed are copied as a standalone file.
        if payload.kind == ModuleKind::Asset && payload.emission.is_inline() {
            payload.emission = Emission::File {
                name: session.output.asset_filename.clone(),
                output_path: String::new(),
            };
        }

        let module = Module {
            chunk_affinity: session.split.affinity_for(&id),
            id,
            path: path.to_path_buf(),
            kind: payload.kind,
            output: payload.bytes,
            source_map: payload.source_map,
            dependencies: payload.dependencies,
            emission: payload.emission,
            fingerprint,
            discovered_at: tick,
        };
        Ok(Executed { module, ambiguity })
    }
}

/// Hash of the inputs that decide a module's output.
pub fn fingerprint(source: &[u8], chain: &[TransformSpec], mode: BuildMode) -> ContentHash {
    let options = serde_json::to_vec(chain).unwrap_or_default();
    HashBuilder::new()
        .part(source)
        .part(options)
        .part(mode.as_str())
        .finish()
}

/// Two matched rules that both decide where the file goes cannot both win.
fn check_single_emission(id: &ModuleId, rules: &[&Rule]) -> Result<(), ManifestConsistencyError> {
    let mut emitting = rules
        .iter()
        .filter_map(|rule| rule.emitting_stage().map(|stage| (rule.index, stage.name())));
    let Some(first) = emitting.next() else {
        return Ok(());
    };
    match emitting.next() {
        Some(second) => Err(ManifestConsistencyError::DoubleEmission {
            file: id.clone(),
            first: format!("rule[{}] {}", first.0, first.1),
            second: format!("rule[{}] {}", second.0, second.1),
        }),
        None => Ok(()),
    }
}

/// Run every stage in order on a worker thread, bounded by `timeout`.
fn execute(
    path: &Path,
    id: &ModuleId,
    mode: BuildMode,
    chain: Vec<TransformSpec>,
    bytes: Vec<u8>,
    timeout: std::time::Duration,
) -> Result<Payload, TransformError> {
    let chain: Arc<[TransformSpec]> = chain.into();
    let current = Arc::new(AtomicUsize::new(0));

    let work = {
        let chain = Arc::clone(&chain);
        let current = Arc::clone(&current);
        let path = path.to_path_buf();
        let id = id.clone();
        move || -> Result<Payload, (usize, String)> {
            let ctx = StageContext {
                path: &path,
                id: &id,
                mode,
            };
            let mut payload = Payload::source(bytes);
            for (index, stage) in chain.iter().enumerate() {
                current.store(index, Ordering::SeqCst);
                payload = stage
                    .apply(&ctx, payload)
                    .map_err(|err| (index, err.to_string()))?;
            }
            Ok(payload)
        }
    };

    let stage_name = |index: usize| chain.get(index).map_or("chain", TransformSpec::name).to_string();
    match run_with_timeout(timeout, work) {
        Ok(Ok(payload)) => Ok(payload),
        Ok(Err((index, cause))) => Err(TransformError {
            file: path.to_path_buf(),
            stage: stage_name(index),
            cause,
        }),
        Err(deadline) => {
            let index = current.load(Ordering::SeqCst);
            let cause = match deadline {
                Deadline::Elapsed(after) => format!("timed out after {after:?}"),
                Deadline::Panicked => "stage panicked".to_string(),
            };
            Err(TransformError {
                file: path.to_path_buf(),
                stage: stage_name(index),
                cause,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_project_config;
    use crate::core::BuildMode;
    use crate::transform::{DependencyKind, ScriptOptions};
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[[entry]]
name = "main"
import = "./index.js"

[[rule]]
test = "\\.js$"
use = [{ kind = "script" }]

[[rule]]
test = "\\.scss$"
use = [{ kind = "style" }, { kind = "extract" }]

[[rule]]
test = "\\.html$"
use = [{ kind = "html" }]

[[rule]]
test = "\\.html$"
exclude = ["src/index.html"]
use = [{ kind = "file", name = "[name].[ext]" }]

[[rule]]
test = "\\.txt$"
use = [{ kind = "file" }]

[[rule]]
test = "\\.txt$"
use = [{ kind = "url" }]

[[rule]]
test = "\\.bin$"
use = [{ kind = "template" }]
"#;

    fn project(files: &[(&str, &str)]) -> (TempDir, BuildSession) {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let file = dir.path().join(path);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, content).unwrap();
        }
        fs::create_dir_all(dir.path().join("src")).unwrap();
        let config = test_project_config(dir.path(), CONFIG);
        let session = BuildSession::new(&config, BuildMode::Production).unwrap();
        (dir, session)
    }

    #[test]
    fn test_script_module() {
        let (_dir, session) = project(&[("src/index.js", "import './a.scss';\nconsole.log(1);\n")]);
        let executed = Executor::new(&session)
            .run(&session.context.join("index.js"), 3)
            .unwrap();
        let module = executed.module;
        assert_eq!(module.id.as_str(), "src/index.js");
        assert_eq!(module.kind, ModuleKind::Script);
        assert_eq!(module.dependencies[0].specifier, "./a.scss");
        assert_eq!(module.dependencies[0].kind, DependencyKind::Import);
        assert_eq!(module.discovered_at, 3);
        assert!(executed.ambiguity.is_none());
    }

    #[test]
    fn test_repeated_run_is_identical() {
        let (_dir, session) = project(&[("src/index.js", "export default 42;\n")]);
        let path = session.context.join("index.js");
        let first = Executor::new(&session).run(&path, 0).unwrap().module;
        let second = Executor::new(&session).run(&path, 0).unwrap().module;
        assert_eq!(first, second);
    }

    #[test]
    fn test_unmatched_file_is_copied() {
        let (_dir, session) = project(&[("src/fonts/a.woff2", "wOF2")]);
        let module = Executor::new(&session)
            .run(&session.context.join("fonts/a.woff2"), 0)
            .unwrap()
            .module;
        assert_eq!(module.kind, ModuleKind::Asset);
        assert_eq!(module.output, b"wOF2");
        assert!(matches!(module.emission, Emission::File { ref name, .. } if name == "[name].[ext]"));
    }

    #[test]
    fn test_two_rules_one_emission_is_ambiguous_but_fine() {
        let (_dir, session) = project(&[("src/partial.html", "<img src=\"a.png\">")]);
        let executed = Executor::new(&session)
            .run(&session.context.join("partial.html"), 0)
            .unwrap();
        assert_eq!(executed.ambiguity.map(|a| a.rules), Some(vec![2, 3]));
        assert_eq!(executed.module.kind, ModuleKind::Markup);
        assert!(matches!(executed.module.emission, Emission::File { .. }));
    }

    #[test]
    fn test_double_emission_is_fatal() {
        let (_dir, session) = project(&[("src/notes.txt", "x")]);
        let err = Executor::new(&session)
            .run(&session.context.join("notes.txt"), 0)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            BuildError::Manifest(ManifestConsistencyError::DoubleEmission { .. })
        ));
    }

    #[test]
    fn test_failing_stage_names_itself() {
        let (_dir, session) = project(&[("src/bad.bin", "{{#if}}")]);
        let err = Executor::new(&session)
            .run(&session.context.join("bad.bin"), 0)
            .err()
            .unwrap();
        let BuildError::Transform(err) = err else {
            panic!("expected a transform error");
        };
        assert_eq!(err.stage, "template");
        assert!(err.file.ends_with("src/bad.bin"));
    }

    #[test]
    fn test_fingerprint_tracks_options_and_source() {
        let script = vec![TransformSpec::Script(ScriptOptions::default())];
        let raw = vec![TransformSpec::Script(ScriptOptions { lower_esm: false })];
        let base = fingerprint(b"a", &script, BuildMode::Production);
        assert_ne!(base, fingerprint(b"b", &script, BuildMode::Production));
        assert_ne!(base, fingerprint(b"a", &raw, BuildMode::Production));
        assert_ne!(base, fingerprint(b"a", &script, BuildMode::Development));
    }
}
