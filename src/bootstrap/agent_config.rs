//! # Agent Configuration Document
//!
//! Renders the `fleet-agent.ini` an enrolling agent starts from. The content
//! is identical across platforms apart from line endings and certificate
//! paths, and rendering is byte-for-byte stable for identical inputs.

use super::platform::Platform;
use crate::enrollment::EnrollmentToken;

/// File name of the configuration document inside the bundle
pub const AGENT_CONFIG_FILE: &str = "fleet-agent.ini";

/// Path of the CA certificate inside the bundle
pub const CA_CERT_ENTRY: &str = "certificates/ca.cer";

/// Install root of the Windows agent
pub const WINDOWS_AGENT_ROOT: &str = r"C:\ProgramData\FleetAgent";

const CERTIFICATE_FILES: [(&str, &str); 3] = [
    ("CACert", "ca.cer"),
    ("AgentCert", "agent.cer"),
    ("AgentKey", "agent.key"),
];

/// Resolved inputs of one configuration document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig<'a> {
    pub token: &'a EnrollmentToken,
    pub broker_url: &'a str,
    pub platform: Platform,
}

impl AgentConfig<'_> {
    pub fn render(&self) -> String {
        let eol = self.platform.line_ending();
        let site = self
            .token
            .site_id
            .map(|site| site.to_string())
            .unwrap_or_default();

        let mut out = String::new();
        let mut line = |text: &str| {
            out.push_str(text);
            out.push_str(eol);
        };

        line("[Agent]");
        line("UUID=");
        line("Enabled=true");
        line("Debug=false");
        line("DefaultFrequency=5");
        line(&format!("EnrollmentToken={}", self.token.token));
        line(&format!("TenantID={}", self.token.tenant_id));
        line(&format!("SiteID={}", site));
        line("");
        line("[Broker]");
        line(&format!("Servers={}", self.broker_url));
        line("");
        line("[Certificates]");
        for (key, file) in CERTIFICATE_FILES {
            line(&format!("{}={}", key, certificate_path(self.platform, file)));
        }
        out
    }
}

/// Where the agent on `platform` finds a certificate file
pub fn certificate_path(platform: Platform, file: &str) -> String {
    if platform.is_windows() {
        format!(r"{}\certificates\{}", WINDOWS_AGENT_ROOT, file)
    } else {
        format!("certificates/{}", file)
    }
}
