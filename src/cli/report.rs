use crate::diagnostics::Diagnostic;
use crate::session::{Session, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportedReference {
    pub name: String,
    pub path: PathBuf,
    pub documented: bool,
}

/// Result of the `check` command for one script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub session_id: SessionId,
    pub project_name: String,
    pub text_version: u64,
    pub directives: Vec<String>,
    pub references: Vec<ReportedReference>,
    pub loaded_sources: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckReport {
    pub async fn from_session(session: &Session) -> Self {
        let resolved = session.resolved().await;
        Self {
            session_id: session.id(),
            project_name: session.project().name.clone(),
            text_version: resolved.text_version,
            directives: resolved.directives.iter().cloned().collect(),
            references: resolved
                .references
                .iter()
                .map(|entry| ReportedReference {
                    name: entry.name().to_string(),
                    path: entry.path().to_path_buf(),
                    documented: !entry.documentation.is_empty(),
                })
                .collect(),
            loaded_sources: resolved.loaded_sources.clone(),
            diagnostics: resolved.diagnostics.clone(),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session {} ({})", self.session_id, self.project_name)?;
        writeln!(f, "Directives ({}):", self.directives.len())?;
        for directive in &self.directives {
            writeln!(f, "  #r \"{}\"", directive)?;
        }
        writeln!(f, "References ({}):", self.references.len())?;
        for reference in &self.references {
            let docs = if reference.documented { " [docs]" } else { "" };
            writeln!(f, "  {} -> {}{}", reference.name, reference.path.display(), docs)?;
        }
        if !self.loaded_sources.is_empty() {
            writeln!(f, "Loaded scripts ({}):", self.loaded_sources.len())?;
            for source in &self.loaded_sources {
                writeln!(f, "  {}", source.display())?;
            }
        }
        writeln!(f, "Diagnostics ({}):", self.diagnostics.len())?;
        for diagnostic in &self.diagnostics {
            writeln!(f, "  {}", diagnostic)?;
        }
        Ok(())
    }
}
