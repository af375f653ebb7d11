// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::Deserialize;

/// Knobs for a single match call.
///
/// The defaults reproduce plain backtracking: the stack grows without bound and
/// there is no step budget. Pathological patterns (`(a|a)*b` on a long run of `a`)
/// then take exponential time, so set a limit if patterns come from untrusted sources.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Frames allocated up front. Must be at least 2: the live frame plus one saved continuation.
    pub initial_stack_frames: usize,
    /// Maximum number of saved continuations.
    pub max_stack_frames: Option<usize>,
    /// Maximum number of iterations of the step loop.
    pub step_limit: Option<u64>,
}

impl ExecConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_stack_frames(mut self, frames: usize) -> Self {
        self.initial_stack_frames = frames.max(2);
        self
    }

    pub fn max_stack_frames(mut self, frames: Option<usize>) -> Self {
        self.max_stack_frames = frames;
        self
    }

    pub fn step_limit(mut self, steps: Option<u64>) -> Self {
        self.step_limit = steps;
        self
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self { initial_stack_frames: 16, max_stack_frames: None, step_limit: None }
    }
}

/// Options for turning a pattern tree into an NFA.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Only match at the start offset, like the ECMAScript `y` flag.
    pub sticky: bool,
    /// Emit the loop-back transitions used to search for a match at later offsets.
    pub initial_loop_back: bool,
    /// ASCII case-insensitive literals and classes.
    pub ignore_case: bool,
}

impl BuilderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sticky(mut self, yes: bool) -> Self {
        self.sticky = yes;
        self
    }

    pub fn initial_loop_back(mut self, yes: bool) -> Self {
        self.initial_loop_back = yes;
        self
    }

    pub fn ignore_case(mut self, yes: bool) -> Self {
        self.ignore_case = yes;
        self
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self { sticky: false, initial_loop_back: true, ignore_case: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_partial() {
        let config: ExecConfig = serde_json::from_str(r#"{ "step_limit": 100 }"#).unwrap();
        assert_eq!(config, ExecConfig::new().step_limit(Some(100)));

        let config: BuilderConfig = serde_json::from_str(r#"{ "sticky": true }"#).unwrap();
        assert!(config.sticky);
        assert!(config.initial_loop_back);
    }

    #[test]
    fn initial_frames_are_clamped() {
        assert_eq!(ExecConfig::new().initial_stack_frames(0).initial_stack_frames, 2);
    }
}
