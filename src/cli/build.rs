//! `weft build`: one full pass, nonzero exit on any error.

use anyhow::{Result, bail};

use crate::config::BundleConfig;
use crate::core::{BuildMode, BuildSession};
use crate::{log, pipeline};

pub fn build_project(config: &BundleConfig, mode: BuildMode) -> Result<()> {
    let session = BuildSession::new(config, mode)?;
    log!(
        "build";
        "{} mode, {} {}",
        mode,
        session.entries.len(),
        plural(session.entries.len(), "entry", "entries")
    );

    let report = match pipeline::build(&session) {
        Ok(report) => report,
        Err(failure) => {
            for err in failure.errors() {
                log!("error"; "{}", err);
            }
            let count = failure.errors().len();
            bail!("build failed with {} {}", count, plural(count, "error", "errors"));
        }
    };

    let rendered = &report.rendered;
    log!(
        "build";
        "{} modules in {} {}, {} files written in {:.2?}",
        report.graph.len(),
        rendered.chunks.len(),
        plural(rendered.chunks.len(), "chunk", "chunks"),
        report.written.len(),
        report.elapsed
    );
    for (logical, path) in rendered.manifest.iter() {
        crate::debug!("manifest"; "{} -> {}", logical, path);
    }
    Ok(())
}

pub(crate) fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_project_config;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_build_project_writes_manifest() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/index.js"), "module.exports = 1;\n").unwrap();
        let config = test_project_config(
            dir.path(),
            "[[entry]]\nname = \"main\"\nimport = \"./index.js\"\n[[rule]]\ntest = \"\\\\.js$\"\nuse = [{ kind = \"script\" }]",
        );

        build_project(&config, BuildMode::Development).unwrap();
        assert!(dir.path().join("dist/main.js").is_file());
        assert!(dir.path().join("dist/manifest.json").is_file());
    }

    #[test]
    fn test_build_project_fails_on_missing_entry() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        let config = test_project_config(dir.path(), "[[entry]]\nname = \"main\"\nimport = \"./absent.js\"");
        let err = build_project(&config, BuildMode::Production).unwrap_err();
        assert!(err.to_string().contains("1 error"));
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "chunk", "chunks"), "chunk");
        assert_eq!(plural(2, "chunk", "chunks"), "chunks");
    }
}
