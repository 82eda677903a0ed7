//! Defines the [`Termination`] trait.

use std::{convert::Infallible, fmt::Debug, process};

/// Extends [`std::process::Termination`] with a success check.
///
/// The window event loop owns the main thread and never returns, so the process is exited
/// explicitly once the application code finishes. The exit code is derived from the value that
/// code returned.
pub trait Termination: process::Termination {
    fn is_success(&self) -> bool;
}

impl Termination for Infallible {
    fn is_success(&self) -> bool {
        match *self {}
    }
}

impl Termination for () {
    fn is_success(&self) -> bool {
        true
    }
}

impl<T: Termination, E: Debug> Termination for Result<T, E> {
    fn is_success(&self) -> bool {
        match self {
            Ok(term) => term.is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_success() {
        let ok: anyhow::Result<()> = Ok(());
        assert!(ok.is_success());

        let err: anyhow::Result<()> = Err(anyhow::anyhow!("camera unplugged"));
        assert!(!err.is_success());

        let nested: Result<Result<(), String>, String> = Ok(Err("inner".into()));
        assert!(!nested.is_success());
    }
}
