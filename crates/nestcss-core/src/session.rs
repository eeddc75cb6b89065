//! Per-compilation counters.

use crate::error::{CompileError, Limit, Result};

/// Work done so far by one writer. Counters only ever grow, except the
/// evaluation depth which tracks the current recursion.
#[derive(Debug, Default)]
pub struct Session {
    includes: usize,
    imports: usize,
    nodes: usize,
    depth: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_include(&mut self, name: &str) -> Result<()> {
        self.includes += 1;
        check(Limit::Includes, self.includes, name)
    }

    pub fn count_import(&mut self, path: &str) -> Result<()> {
        self.imports += 1;
        check(Limit::Imports, self.imports, path)
    }

    pub fn count_node(&mut self) -> Result<()> {
        self.nodes += 1;
        check(Limit::Nodes, self.nodes, "")
    }

    /// Enters one level of value evaluation. Pair with [`Session::ascend`].
    pub fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > Limit::EvaluationDepth.max() {
            self.depth -= 1;
            return Err(CompileError::limit(Limit::EvaluationDepth));
        }
        Ok(())
    }

    pub fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn includes(&self) -> usize {
        self.includes
    }

    pub fn imports(&self) -> usize {
        self.imports
    }

    pub fn nodes(&self) -> usize {
        self.nodes
    }
}

fn check(limit: Limit, count: usize, detail: &str) -> Result<()> {
    if count > limit.max() {
        Err(CompileError::limit_with(limit, detail))
    } else {
        Ok(())
    }
}

/// Validates a `@for` range and returns the bounds to iterate, end inclusive.
pub fn loop_bounds(start: i64, end: i64, inclusive: bool) -> Result<Option<(i64, i64)>> {
    if end < start {
        return Err(CompileError::InvalidLoopRange { start, end });
    }
    let within = end
        .checked_sub(start)
        .is_some_and(|span| span <= Limit::LoopIterations.max() as i64);
    if !within {
        return Err(CompileError::limit_with(
            Limit::LoopIterations,
            format!("{start} to {end}"),
        ));
    }
    let last = if inclusive { Some(end) } else { end.checked_sub(1) };
    Ok(last.filter(|last| *last >= start).map(|last| (start, last)))
}
