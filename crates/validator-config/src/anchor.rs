use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use ndn_name::Name;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::codec::{certificate_from_base64, Codec, CodecError};
use crate::packet::Certificate;

/// Where an anchor group's certificates come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorSource {
    /// Certificate given inline or loaded once from a file.
    Static,
    /// A single file, re-read when the refresh period lapses.
    File(PathBuf),
    /// Every file in a directory, re-read when the refresh period lapses.
    Dir(PathBuf),
}

struct GroupState {
    certs: BTreeMap<Name, Certificate>,
    expires_at: Option<Instant>,
}

/// A set of trust anchors loaded from one configuration entry.
pub struct TrustAnchorGroup {
    id: String,
    source: AnchorSource,
    refresh: Option<Duration>,
    codec: Arc<dyn Codec>,
    state: RwLock<GroupState>,
}

impl std::fmt::Debug for TrustAnchorGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustAnchorGroup")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("refresh", &self.refresh)
            .field("len", &self.len())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CertificateFileError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },
}

/// Read one base64 certificate file.
pub fn read_certificate_file(
    codec: &dyn Codec,
    path: &Path,
) -> Result<Certificate, CertificateFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| CertificateFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    certificate_from_base64(codec, &text).map_err(|source| CertificateFileError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn read_dir_certificates(codec: &dyn Codec, dir: &Path) -> BTreeMap<Name, Certificate> {
    let mut certs = BTreeMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot read trust anchor directory");
            return certs;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match read_certificate_file(codec, &path) {
            Ok(cert) => {
                certs.insert(cert.name().clone(), cert);
            }
            Err(error) => warn!(error = %error, "skipping unreadable trust anchor"),
        }
    }
    certs
}

impl TrustAnchorGroup {
    pub fn from_certificate(id: impl Into<String>, cert: Certificate, codec: Arc<dyn Codec>) -> Self {
        let mut certs = BTreeMap::new();
        certs.insert(cert.name().clone(), cert);
        Self {
            id: id.into(),
            source: AnchorSource::Static,
            refresh: None,
            codec,
            state: RwLock::new(GroupState {
                certs,
                expires_at: None,
            }),
        }
    }

    /// Load a file anchor. The first read must succeed; later refreshes
    /// that fail leave the group empty until the file is readable again.
    pub fn from_file(
        id: impl Into<String>,
        path: PathBuf,
        refresh: Option<Duration>,
        codec: Arc<dyn Codec>,
    ) -> Result<Self, CertificateFileError> {
        let cert = read_certificate_file(codec.as_ref(), &path)?;
        let mut group = Self::from_certificate(id, cert, codec);
        if let Some(period) = refresh {
            group.source = AnchorSource::File(path);
            group.refresh = Some(period);
            group.state_mut().expires_at = Some(Instant::now() + period);
        }
        Ok(group)
    }

    /// Load every certificate in `dir`. A missing directory or unreadable
    /// files are logged and skipped.
    pub fn from_dir(
        id: impl Into<String>,
        dir: PathBuf,
        refresh: Option<Duration>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        let certs = read_dir_certificates(codec.as_ref(), &dir);
        Self {
            id: id.into(),
            source: AnchorSource::Dir(dir),
            refresh,
            codec,
            state: RwLock::new(GroupState {
                certs,
                expires_at: refresh.map(|period| Instant::now() + period),
            }),
        }
    }

    fn state_mut(&mut self) -> &mut GroupState {
        self.state.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &AnchorSource {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .certs
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<Name> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .certs
            .keys()
            .cloned()
            .collect()
    }

    /// Re-read the group's source if its refresh period has lapsed.
    pub fn refresh_if_expired(&self) {
        let (Some(period), Some(expires_at)) = (self.refresh, self.expires_at()) else {
            return;
        };
        let now = Instant::now();
        if now < expires_at {
            return;
        }

        let certs = match &self.source {
            AnchorSource::Static => return,
            AnchorSource::File(path) => match read_certificate_file(self.codec.as_ref(), path) {
                Ok(cert) => BTreeMap::from([(cert.name().clone(), cert)]),
                Err(error) => {
                    warn!(group = %self.id, error = %error, "trust anchor file refresh failed");
                    BTreeMap::new()
                }
            },
            AnchorSource::Dir(dir) => read_dir_certificates(self.codec.as_ref(), dir),
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        info!(group = %self.id, before = state.certs.len(), after = certs.len(), "refreshed trust anchors");
        state.certs = certs;
        state.expires_at = Some(now + period);
    }

    fn expires_at(&self) -> Option<Instant> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .expires_at
    }

    /// Find a certificate whose name is `key` or starts with it.
    pub fn find(&self, key: &Name) -> Option<Certificate> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(cert) = state.certs.get(key) {
            return Some(cert.clone());
        }
        state
            .certs
            .range(key.clone()..)
            .next()
            .filter(|(name, _)| key.is_prefix_of(name))
            .map(|(_, cert)| cert.clone())
    }
}

/// All trust anchors of one configuration.
#[derive(Debug, Default)]
pub struct TrustAnchorContainer {
    groups: Vec<TrustAnchorGroup>,
}

impl TrustAnchorContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, group: TrustAnchorGroup) {
        debug!(group = %group.id, certificates = group.len(), "added trust anchor group");
        self.groups.push(group);
    }

    pub fn groups(&self) -> &[TrustAnchorGroup] {
        &self.groups
    }

    /// Total number of anchor certificates currently loaded.
    pub fn len(&self) -> usize {
        self.groups.iter().map(TrustAnchorGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refresh any lapsed groups.
    pub fn refresh(&self) {
        for group in &self.groups {
            group.refresh_if_expired();
        }
    }

    /// Look up an anchor by key or certificate name, refreshing lapsed
    /// groups first.
    pub fn find(&self, key: &Name) -> Option<Certificate> {
        self.refresh();
        self.groups.iter().find_map(|g| g.find(key))
    }
}
