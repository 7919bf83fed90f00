//! Load → compile → link → swap cycle for the fragment shader.
//!
//! The controller never owns GPU objects itself. It drives a
//! [`ProgramBuilder`] and swaps the caller's active program only once a new
//! one has linked, so the previous program is released exactly when it is
//! replaced.

use std::fmt;

use thiserror::Error;

use crate::compile::{Diagnostic, StageKind, VERTEX_SHADER_GLSL};
use crate::source::{LoadError, ShaderSourceLoader};
use crate::types::ReloadPolicy;

/// Compiles stages and links them into programs.
///
/// Stages are passed to [`ProgramBuilder::link`] by value; whatever the
/// result, they are released when the call returns.
pub trait ProgramBuilder {
    type Stage;
    type Program;

    fn compile(&self, source: &str, kind: StageKind) -> Result<Self::Stage, Diagnostic>;

    fn link(
        &self,
        vertex: Self::Stage,
        fragment: Self::Stage,
    ) -> Result<Self::Program, Diagnostic>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadState {
    Idle,
    Loading,
    Compiling,
    Linking,
    Swapped,
    Failed,
}

impl fmt::Display for ReloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReloadState::Idle => "idle",
            ReloadState::Loading => "loading",
            ReloadState::Compiling => "compiling",
            ReloadState::Linking => "linking",
            ReloadState::Swapped => "swapped",
            ReloadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("{}", .0.framed())]
    Compile(Diagnostic),
    #[error("{}", .0.framed())]
    Link(Diagnostic),
}

impl ReloadError {
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            ReloadError::Load(_) => None,
            ReloadError::Compile(diagnostic) | ReloadError::Link(diagnostic) => Some(diagnostic),
        }
    }
}

/// Result of a live reload that did not abort the process.
#[derive(Debug)]
pub enum ReloadOutcome {
    /// The new program is active and the old one was released.
    Swapped,
    /// The cycle failed; the previous program is still active.
    Retained(ReloadError),
}

pub struct ReloadController {
    loader: ShaderSourceLoader,
    policy: ReloadPolicy,
    state: ReloadState,
    completed: u64,
}

impl ReloadController {
    pub fn new(loader: ShaderSourceLoader, policy: ReloadPolicy) -> Self {
        Self {
            loader,
            policy,
            state: ReloadState::Idle,
            completed: 0,
        }
    }

    pub fn state(&self) -> ReloadState {
        self.state
    }

    /// Number of cycles that ended with a swap, the startup build included.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Builds the first program. Any failure here is fatal to the caller.
    pub fn initial<B: ProgramBuilder>(&mut self, builder: &B) -> Result<B::Program, ReloadError> {
        let program = self.build(builder)?;
        self.finish_swap();
        Ok(program)
    }

    /// Rebuilds from the current file and swaps it into `active`.
    ///
    /// Under [`ReloadPolicy::KeepPrevious`] failures are written to stderr and
    /// returned as [`ReloadOutcome::Retained`]; under [`ReloadPolicy::Fatal`]
    /// they are returned unprinted and `active` is left as it was. Errors
    /// display as the framed compiler log, so the caller reports them once.
    pub fn reload<B: ProgramBuilder>(
        &mut self,
        builder: &B,
        active: &mut B::Program,
    ) -> Result<ReloadOutcome, ReloadError> {
        match self.build(builder) {
            Ok(program) => {
                let previous = std::mem::replace(active, program);
                drop(previous);
                self.finish_swap();
                Ok(ReloadOutcome::Swapped)
            }
            Err(err) => match self.policy {
                ReloadPolicy::Fatal => Err(err),
                ReloadPolicy::KeepPrevious => {
                    eprintln!("{err}");
                    tracing::warn!("shader reload failed; keeping the previous program");
                    Ok(ReloadOutcome::Retained(err))
                }
            },
        }
    }

    fn build<B: ProgramBuilder>(&mut self, builder: &B) -> Result<B::Program, ReloadError> {
        self.transition(ReloadState::Loading);
        let source = self.loader.load().map_err(|err| self.fail(err.into()))?;

        self.transition(ReloadState::Compiling);
        let vertex = builder
            .compile(VERTEX_SHADER_GLSL, StageKind::Vertex)
            .map_err(|diagnostic| self.fail(ReloadError::Compile(diagnostic)))?;
        let fragment = builder
            .compile(source.text(), StageKind::Fragment)
            .map_err(|diagnostic| self.fail(ReloadError::Compile(diagnostic)))?;

        self.transition(ReloadState::Linking);
        builder
            .link(vertex, fragment)
            .map_err(|diagnostic| self.fail(ReloadError::Link(diagnostic)))
    }

    fn finish_swap(&mut self) {
        self.transition(ReloadState::Swapped);
        self.completed += 1;
        tracing::info!(
            shader = %self.shader_label(),
            generation = self.completed,
            "fragment shader active"
        );
        self.transition(ReloadState::Idle);
    }

    fn fail(&mut self, err: ReloadError) -> ReloadError {
        self.transition(ReloadState::Failed);
        err
    }

    fn transition(&mut self, next: ReloadState) {
        tracing::debug!(from = %self.state, to = %next, "reload state");
        self.state = next;
    }

    fn shader_label(&self) -> String {
        self.loader
            .path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "<built-in>".to_string())
    }
}
