//! Build passes.
//!
//! ```text
//! ┌──────────────┐   ┌─────────┐   ┌──────────┐   ┌──────────┐
//! │ GraphBuilder │──►│  split  │──►│  render  │──►│  commit  │
//! │   (rayon)    │   │ (chunk) │   │  (emit)  │   │ (write)  │
//! └──────────────┘   └─────────┘   └──────────┘   └──────────┘
//! ```
//!
//! - [`build`]: one full pass, used by `weft build`
//! - [`DevSession`]: repeated passes over a retained graph, used by
//!   `weft serve`

mod dev;

pub use dev::{DevSession, RebuildOutcome};

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use crate::chunk;
use crate::core::{BuildError, BuildFailure, BuildSession, RuleMatchAmbiguity};
use crate::emit::{self, EmitScope, Rendered};
use crate::graph::{GraphBuilder, ModuleGraph};
use crate::{debug, log};

/// A committed full build.
#[derive(Debug)]
pub struct BuildReport {
    pub graph: ModuleGraph,
    pub rendered: Rendered,
    /// Manifest names written
    pub written: Vec<String>,
    pub elapsed: Duration,
}

/// Run a full build and write the output directory.
///
/// Production never retains stale modules, so any error fails the pass.
pub fn build(session: &BuildSession) -> Result<BuildReport, BuildFailure> {
    let started = Instant::now();

    let outcome = GraphBuilder::new(session, 1)
        .with_progress(std::io::stdout().is_terminal())
        .build();
    report_ambiguities(&outcome.ambiguities);
    if !outcome.is_ok() {
        return Err(BuildFailure(outcome.errors));
    }
    if !outcome.recovered.is_empty() {
        return Err(BuildFailure(outcome.recovered));
    }

    let rendered = assemble(&outcome.graph, session)?;
    let written = emit::commit(&rendered, None, &EmitScope::Full, session).map_err(BuildError::from)?;

    Ok(BuildReport {
        graph: outcome.graph,
        rendered,
        written,
        elapsed: started.elapsed(),
    })
}

/// Split a closed graph and render every output in memory.
pub(crate) fn assemble(graph: &ModuleGraph, session: &BuildSession) -> Result<Rendered, BuildError> {
    let chunks = chunk::split(graph, &session.split);
    debug!(
        "split";
        "{}",
        chunks
            .iter()
            .map(|c| format!("{}({})", c.name, c.modules.len()))
            .collect::<Vec<_>>()
            .join(" ")
    );
    emit::render(graph, chunks, session)
}

pub(crate) fn report_ambiguities(ambiguities: &[RuleMatchAmbiguity]) {
    for ambiguity in ambiguities {
        log!("rule"; "{}", ambiguity);
    }
}
