//! # Config Bundle
//!
//! Gzip-compressed tar archive delivered to an enrolling agent. Headers carry
//! fixed metadata so identical inputs produce identical bytes.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, Header};

use super::agent_config::{AGENT_CONFIG_FILE, CA_CERT_ENTRY};
use super::errors::BootstrapError;

/// Media type of the bundle
pub const BUNDLE_CONTENT_TYPE: &str = "application/gzip";

/// Characters of the token value used in the download name
const NAME_PREFIX_CHARS: usize = 8;

/// Packed bundle ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBundle {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ConfigBundle {
    /// Pack the configuration document and CA certificate
    pub fn pack(
        token_value: &str,
        config_document: &str,
        ca_certificate: &[u8],
    ) -> Result<Self, BootstrapError> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = Builder::new(encoder);

        append_entry(&mut builder, AGENT_CONFIG_FILE, config_document.as_bytes())?;
        append_entry(&mut builder, CA_CERT_ENTRY, ca_certificate)?;

        let bytes = builder.into_inner()?.finish()?;

        Ok(Self {
            file_name: bundle_file_name(token_value),
            bytes,
        })
    }

    /// `Content-Disposition` header value for the download
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }
}

/// `fleet-agent-config-<prefix>.tar.gz`, prefix being the first characters of the token
pub fn bundle_file_name(token_value: &str) -> String {
    let prefix: String = token_value.chars().take(NAME_PREFIX_CHARS).collect();
    format!("fleet-agent-config-{}.tar.gz", prefix)
}

fn append_entry<W: Write>(
    builder: &mut Builder<W>,
    path: &str,
    data: &[u8],
) -> Result<(), BootstrapError> {
    let mut header = Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append_data(&mut header, path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tar::Archive;

    fn entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let path = entry.path().unwrap().to_string_lossy().into_owned();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (path, data)
            })
            .collect()
    }

    #[test]
    fn test_pack_contents() {
        let bundle = ConfigBundle::pack("abcdefghijkl", "[Agent]\n", b"CA").unwrap();
        assert_eq!(bundle.file_name, "fleet-agent-config-abcdefgh.tar.gz");

        let entries = entries(&bundle.bytes);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("fleet-agent.ini".to_string(), b"[Agent]\n".to_vec()));
        assert_eq!(entries[1], ("certificates/ca.cer".to_string(), b"CA".to_vec()));
    }

    #[test]
    fn test_pack_is_deterministic() {
        let a = ConfigBundle::pack("abcdefghijkl", "[Agent]\n", b"CA").unwrap();
        let b = ConfigBundle::pack("abcdefghijkl", "[Agent]\n", b"CA").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_token_name() {
        assert_eq!(bundle_file_name("abc"), "fleet-agent-config-abc.tar.gz");
    }
}
