use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use validator_config::anchor::read_certificate_file;
use validator_config::codec::packet_from_base64;
use validator_config::{Codec, MemoryFace, Packet};

/// Serve every readable certificate in `dir` from `face`. Returns how many
/// were loaded; unreadable files are skipped with a warning.
pub fn load_certificates(face: &MemoryFace, codec: &dyn Codec, dir: &Path) -> Result<usize> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read certificate directory {}", dir.display()))?;

    let mut loaded = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let cert = match read_certificate_file(codec, &path) {
            Ok(cert) => cert,
            Err(error) => {
                warn!(%error, "skipping certificate");
                continue;
            }
        };
        let wire = codec
            .encode(cert.packet())
            .with_context(|| format!("cannot re-encode {}", path.display()))?;
        debug!(name = %cert.name(), "serving certificate");
        face.insert(cert.name().clone(), wire);
        loaded += 1;
    }
    Ok(loaded)
}

/// Read a packet file holding the base64 wire encoding.
pub fn read_packet(codec: &dyn Codec, path: &Path) -> Result<Packet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read packet file {}", path.display()))?;
    packet_from_base64(codec, &text)
        .with_context(|| format!("cannot decode packet file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator_config::codec::{certificate_to_base64, packet_to_base64};
    use validator_config::{Certificate, JsonCodec, SignatureInfo, SignatureType};

    fn certificate(uri: &str) -> Certificate {
        let mut packet = Packet::data(uri.parse().unwrap()).with_content(vec![9; 32]);
        packet.set_signature_info(Some(SignatureInfo::new(
            SignatureType::Ed25519,
            Some("/root/KEY/k0".parse().unwrap()),
        )));
        packet.set_signature_value(vec![0; 64]);
        Certificate::from_packet(packet).unwrap()
    }

    #[test]
    fn certificate_directory_populates_face() {
        let dir = tempfile::tempdir().unwrap();
        let cert = certificate("/a/KEY/k1/root/v1");
        std::fs::write(
            dir.path().join("a.cert"),
            certificate_to_base64(&JsonCodec, &cert).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("junk.cert"), "not base64 @@").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let face = MemoryFace::new();
        let loaded = load_certificates(&face, &JsonCodec, dir.path()).unwrap();
        assert_eq!(loaded, 1);
        assert_eq!(face.len(), 1);
        assert!(face.remove(cert.name()).is_some());
    }

    #[test]
    fn missing_certificate_directory_is_an_error() {
        let face = MemoryFace::new();
        let err = load_certificates(&face, &JsonCodec, Path::new("/no/such/dir")).unwrap_err();
        assert!(err.to_string().contains("cannot read certificate directory"));
    }

    #[test]
    fn packet_file_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let packet = Packet::interest("/a/b/c".parse().unwrap());
        let path = dir.path().join("p.pkt");
        std::fs::write(&path, packet_to_base64(&JsonCodec, &packet).unwrap()).unwrap();

        assert_eq!(read_packet(&JsonCodec, &path).unwrap(), packet);

        std::fs::write(&path, "%%%").unwrap();
        let err = read_packet(&JsonCodec, &path).unwrap_err();
        assert!(err.to_string().contains("cannot decode packet file"));
    }
}
