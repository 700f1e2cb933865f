//! Environment constants and path utilities for the script host.
//!
//! This module centralizes the fixed names, extensions and well-known
//! library surface used throughout the host, making them easier to maintain
//! and modify.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const HOST_DIR_NAME: &str = ".scripthost";

/// Configuration file name inside [`HOST_DIR_NAME`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name at the root of a working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "scripthost.toml";

/// Reference and documentation file naming
pub mod reference {
    /// Extension substituted into assembly paths to find documentation files
    pub const DOCUMENTATION_EXTENSION: &str = "xml";

    /// Extension appended to bare assembly names during lookup
    pub const ASSEMBLY_EXTENSION: &str = "dll";

    /// Platform suffix stripped from assembly file stems (native images)
    pub const PLATFORM_SUFFIX: &str = ".ni";

    /// Directory under the reference-assemblies root holding facade assemblies
    pub const FACADES_DIR_NAME: &str = "Facades";
}

/// Session naming and directive syntax
pub mod session {
    /// Prefix of the sequential script project name
    pub const PROJECT_NAME_PREFIX: &str = "Script";

    /// Name of the single document each script project holds
    pub const DOCUMENT_NAME: &str = "main.csx";

    /// Directive keyword loading an external assembly
    pub const REFERENCE_DIRECTIVE: &str = "#r";

    /// Directive keyword loading another script file
    pub const LOAD_DIRECTIVE: &str = "#load";

    /// Diagnostic code recorded when a reference directive fails to resolve
    pub const DIRECTIVE_FAILURE_CODE: &str = "SH0001";

    /// Diagnostic code recorded when a load directive names a missing file
    pub const LOAD_FAILURE_CODE: &str = "SH0002";
}

/// A library surface type whose backing assembly is referenced by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellKnownType {
    /// Fully qualified type name
    pub type_name: &'static str,
    /// Simple name of the assembly that defines the type
    pub assembly: &'static str,
}

impl WellKnownType {
    /// Namespace portion of the type name, if any
    pub fn namespace(&self) -> Option<&'static str> {
        self.type_name.rsplit_once('.').map(|(ns, _)| ns)
    }
}

/// Types whose assemblies make up the default reference set.
pub const WELL_KNOWN_TYPES: &[WellKnownType] = &[
    WellKnownType { type_name: "System.Object", assembly: "System.Runtime" },
    WellKnownType { type_name: "System.Console", assembly: "System.Console" },
    WellKnownType { type_name: "System.Linq.Enumerable", assembly: "System.Linq" },
    WellKnownType { type_name: "System.Collections.Generic.List`1", assembly: "System.Collections" },
    WellKnownType { type_name: "System.Text.RegularExpressions.Regex", assembly: "System.Text.RegularExpressions" },
    WellKnownType { type_name: "System.Net.Http.HttpClient", assembly: "System.Net.Http" },
    WellKnownType { type_name: "System.Threading.Tasks.Task", assembly: "System.Runtime" },
    WellKnownType { type_name: "System.IO.File", assembly: "System.Runtime" },
];

/// Namespaces imported into every session regardless of the reference set.
pub const DEFAULT_IMPORTS: &[&str] = &[
    "System",
    "System.IO",
    "System.Collections.Generic",
    "System.Linq",
    "System.Text",
    "System.Threading.Tasks",
];

/// Build the application directory path from a working directory
pub fn host_dir_path(working_directory: &Path) -> PathBuf {
    working_directory.join(HOST_DIR_NAME)
}

/// Build the local config file path (`./.scripthost/config.toml`)
pub fn local_config_file_path(working_directory: &Path) -> PathBuf {
    host_dir_path(working_directory).join(CONFIG_FILE_NAME)
}

/// Build the root config file path (`./scripthost.toml`)
pub fn root_config_file_path(working_directory: &Path) -> PathBuf {
    working_directory.join(LOCAL_CONFIG_FILE_NAME)
}

/// Build the facades directory path from a reference-assemblies root
pub fn facades_dir_path(reference_assemblies: &Path) -> PathBuf {
    reference_assemblies.join(reference::FACADES_DIR_NAME)
}
