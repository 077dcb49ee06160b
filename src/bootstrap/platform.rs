//! Agent platform selector

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    #[default]
    Linux,
    Windows,
    MacosAmd64,
    MacosArm64,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Linux,
        Platform::Windows,
        Platform::MacosAmd64,
        Platform::MacosArm64,
    ];

    /// Parse a query value. Anything unrecognized selects Linux.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("windows") => Platform::Windows,
            Some("macos-amd64") => Platform::MacosAmd64,
            Some("macos-arm64") => Platform::MacosArm64,
            _ => Platform::Linux,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::MacosAmd64 => "macos-amd64",
            Platform::MacosArm64 => "macos-arm64",
        }
    }

    /// Human-readable label for install instructions
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Linux => "Linux",
            Platform::Windows => "Windows",
            Platform::MacosAmd64 => "macOS Intel",
            Platform::MacosArm64 => "macOS ARM",
        }
    }

    pub fn line_ending(&self) -> &'static str {
        if self.is_windows() {
            "\r\n"
        } else {
            "\n"
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// CPU architecture of the agent package
    pub fn arch(&self) -> &'static str {
        match self {
            Platform::MacosArm64 => "arm64",
            _ => "amd64",
        }
    }
}
