//! # Agent Installer
//!
//! One ordered list of install steps per platform, rendered either as a
//! one-line command for copy and paste or as a downloadable script. Every
//! rendering aborts on the first failing step, and temporary downloads are
//! only removed by the final step.

use super::platform::Platform;

const UNIX_BUNDLE_TMP: &str = "/tmp/fleet-agent-config.tar.gz";
const LINUX_AGENT_DIR: &str = "/etc/fleet-agent";
const MACOS_AGENT_DIR: &str = "/Library/FleetAgent/etc/fleet-agent";
const WINDOWS_AGENT_DIR: &str = r"$env:ProgramData\FleetAgent";
const WINDOWS_BUNDLE_TMP: &str = r"$env:TEMP\fleet-agent-config.tar.gz";
const WINDOWS_PACKAGE_TMP: &str = r"$env:TEMP\fleet-agent.msi";

/// Downloadable installer script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerScript {
    pub file_name: &'static str,
    pub content: String,
}

impl InstallerScript {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }
}

/// Install steps for one token and platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    platform: Platform,
    steps: Vec<String>,
}

impl InstallPlan {
    /// Build the plan.
    ///
    /// `console_url` is where the agent fetches its bundle, `release_base_url`
    /// where it fetches the agent package.
    pub fn new(platform: Platform, console_url: &str, release_base_url: &str, token_value: &str) -> Self {
        let console_url = console_url.trim_end_matches('/');
        let release_base_url = release_base_url.trim_end_matches('/');
        let bundle_url = format!(
            "{}/api/enroll/{}/config?platform={}",
            console_url,
            token_value,
            platform.as_str()
        );
        let package = agent_package(platform);
        let package_url = format!("{}/{}", release_base_url, package);

        let steps = match platform {
            Platform::Linux | Platform::MacosAmd64 | Platform::MacosArm64 => {
                let (dir, package_tmp, install) = if platform == Platform::Linux {
                    let tmp = "/tmp/fleet-agent.deb";
                    (LINUX_AGENT_DIR, tmp, format!("dpkg -i {}", tmp))
                } else {
                    let tmp = "/tmp/fleet-agent.pkg";
                    (MACOS_AGENT_DIR, tmp, format!("installer -pkg {} -target /", tmp))
                };
                vec![
                    format!("curl -fsSL \"{}\" -o {}", bundle_url, UNIX_BUNDLE_TMP),
                    format!("mkdir -p {}", dir),
                    format!("tar -xzf {} -C {}", UNIX_BUNDLE_TMP, dir),
                    format!("curl -fsSL \"{}\" -o {}", package_url, package_tmp),
                    install,
                    format!("rm -f {} {}", UNIX_BUNDLE_TMP, package_tmp),
                ]
            }
            Platform::Windows => vec![
                format!(
                    "Invoke-WebRequest '{}' -OutFile \"{}\"",
                    bundle_url, WINDOWS_BUNDLE_TMP
                ),
                format!(
                    "New-Item -ItemType Directory -Force -Path \"{}\" | Out-Null",
                    WINDOWS_AGENT_DIR
                ),
                // Native exit codes do not trip $ErrorActionPreference
                format!(
                    "tar.exe -xzf \"{}\" -C \"{}\"; \
                     if ($LASTEXITCODE -ne 0) {{ throw \"tar.exe exited with $LASTEXITCODE\" }}",
                    WINDOWS_BUNDLE_TMP, WINDOWS_AGENT_DIR
                ),
                format!(
                    "Invoke-WebRequest '{}' -OutFile \"{}\"",
                    package_url, WINDOWS_PACKAGE_TMP
                ),
                format!(
                    "$p = Start-Process msiexec -ArgumentList '/i',\"{}\",'/qn' -Wait -PassThru; \
                     if ($p.ExitCode -ne 0) {{ throw \"msiexec exited with $($p.ExitCode)\" }}",
                    WINDOWS_PACKAGE_TMP
                ),
                format!(
                    "Remove-Item \"{}\",\"{}\"",
                    WINDOWS_BUNDLE_TMP, WINDOWS_PACKAGE_TMP
                ),
            ],
        };

        Self { platform, steps }
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Single command line for the admin's clipboard
    pub fn one_liner(&self) -> String {
        if self.platform.is_windows() {
            format!("$ErrorActionPreference='Stop'; {}", self.steps.join("; "))
        } else {
            format!("sudo sh -c '{}'", self.steps.join(" && "))
        }
    }

    /// Script form of the same steps
    pub fn script(&self) -> InstallerScript {
        let eol = self.platform.line_ending();
        let (file_name, preamble) = if self.platform.is_windows() {
            ("install.ps1", vec!["$ErrorActionPreference = 'Stop'"])
        } else {
            ("install.sh", vec!["#!/bin/sh", "set -e"])
        };

        let mut content = String::new();
        for line in preamble.into_iter().chain(self.steps.iter().map(String::as_str)) {
            content.push_str(line);
            content.push_str(eol);
        }

        InstallerScript { file_name, content }
    }
}

/// Agent package file name in the release directory
pub fn agent_package(platform: Platform) -> String {
    match platform {
        Platform::Linux => "fleet-agent-linux-amd64.deb".to_string(),
        Platform::MacosAmd64 | Platform::MacosArm64 => {
            format!("fleet-agent-darwin-{}.pkg", platform.arch())
        }
        Platform::Windows => "fleet-agent-windows-amd64.msi".to_string(),
    }
}
