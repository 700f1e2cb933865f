//! # Script Host
//!
//! Session-management core of an interactive script-compilation host. The
//! host tracks many concurrently open script documents, keeps each one's
//! reference directives resolved, and routes asynchronous diagnostics from
//! the compiler engine back to the owning session.
//!
//! ## Architecture Overview
//!
//! - **[`reference`]**: metadata reference cache, documentation providers and
//!   the default reference set
//! - **[`session`]**: session records, the concurrent session registry,
//!   lifecycle operations and directive reprocessing
//! - **[`diagnostics`]**: diagnostics types and the router that dispatches
//!   compiler-engine notifications
//! - **[`host`]**: the [`ScriptHost`] composition root
//!
//! ## Features
//!
//! ### Sessions
//! - **Concurrent Registry**: lock-sharded maps for sessions and diagnostics callbacks
//! - **Snapshot Updates**: stale snapshots are rejected for retry, never overwritten
//! - **Clean Close**: closing cancels in-flight reprocessing and stops diagnostics delivery
//!
//! ### References
//! - **Single-Winner Caching**: every key resolves at most once, all callers share the result
//! - **Facade Precedence**: platform facades replace same-named default references
//! - **Lazy Documentation**: documentation files are parsed on first lookup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scripthost::{HostConfig, ScriptHost, SessionOpenOptions, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let host = ScriptHost::new(HostConfig::default()).await?;
//!     let id = host.open(SessionOpenOptions::new("Console.WriteLine(1);", "."));
//!
//!     let snapshot = host.get(id).expect("open session").snapshot().await;
//!     host.update(id, snapshot.with_text("Console.WriteLine(2);")).await?;
//!
//!     host.close(id);
//!     Ok(())
//! }
//! ```

/// Metadata reference resolution and caching.
///
/// Resolves assembly locations to shared reference entries, attaches
/// documentation providers, and computes the default reference set.
pub mod reference;

/// Script session records and lifecycle.
///
/// Provides the session registry, snapshot updates, directive scanning and
/// coalesced reprocessing.
pub mod session;

/// Compiler diagnostics and their routing to sessions.
pub mod diagnostics;

/// Host composition and configuration.
pub mod host;

/// Environment constants and path utilities.
///
/// Centralizes fixed names, extensions and the well-known library surface.
pub mod env;

// Re-export main session types
pub use session::{
    CompilationOptions, ResolvedDirectives, Session, SessionError, SessionId, SessionOpenOptions,
    SessionRegistry, SessionStore, SolutionSnapshot, UpdateOutcome,
};

// Re-export reference types
pub use reference::{
    DefaultReferenceSet, DocumentationProvider, DocumentationProviderRegistry,
    MetadataReference, MetadataReferenceCache, ReferenceEntry, ReferenceError,
};

// Re-export diagnostics types
pub use diagnostics::{Diagnostic, DiagnosticSeverity, DiagnosticsRouter, DiagnosticsUpdated};

// Re-export host types
pub use host::{HostConfig, HostServices, ScriptHost};

// CLI module for command-line interface
pub mod cli;
