use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ndn_name::Name;
use tracing::trace;

/// A request for a named packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub lifetime: Duration,
}

impl Interest {
    pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(4);

    /// Interest for a certificate given its key name or full name.
    pub fn for_certificate(name: Name) -> Self {
        Self {
            name,
            can_be_prefix: true,
            must_be_fresh: true,
            lifetime: Self::DEFAULT_LIFETIME,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    NoRoute,
    Congestion,
    Duplicate,
    Unspecified,
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoRoute => "no route",
            Self::Congestion => "congestion",
            Self::Duplicate => "duplicate",
            Self::Unspecified => "unspecified",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceResponse {
    /// Encoded Data packet.
    Data(Vec<u8>),
    Nack(NackReason),
    Timeout,
}

/// Network access used to retrieve certificates.
#[async_trait]
pub trait Face: Send + Sync {
    async fn express(&self, interest: &Interest) -> FaceResponse;
}

// ---------------------------------------------------------------------------
// MemoryFace
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryFaceState {
    store: BTreeMap<Name, Vec<u8>>,
    scripted: HashMap<Name, VecDeque<FaceResponse>>,
    requests: Vec<Name>,
    delay: Option<Duration>,
}

/// In-process face answering from a local packet store.
///
/// Scripted responses for an Interest name are returned first, in order;
/// after that the store is consulted, and a miss is a `NoRoute` nack.
#[derive(Default)]
pub struct MemoryFace {
    state: Mutex<MemoryFaceState>,
}

impl MemoryFace {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryFaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, name: Name, wire: Vec<u8>) {
        self.state().store.insert(name, wire);
    }

    pub fn remove(&self, name: &Name) -> Option<Vec<u8>> {
        self.state().store.remove(name)
    }

    pub fn len(&self) -> usize {
        self.state().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn script(&self, name: Name, responses: impl IntoIterator<Item = FaceResponse>) {
        self.state()
            .scripted
            .entry(name)
            .or_default()
            .extend(responses);
    }

    /// Hold every response for `delay` before returning it.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    /// Names of all Interests expressed so far.
    pub fn requests(&self) -> Vec<Name> {
        self.state().requests.clone()
    }

    fn respond(&self, interest: &Interest) -> (FaceResponse, Option<Duration>) {
        let mut state = self.state();
        state.requests.push(interest.name.clone());

        if let Some(response) = state
            .scripted
            .get_mut(&interest.name)
            .and_then(VecDeque::pop_front)
        {
            return (response, state.delay);
        }

        let found = if interest.can_be_prefix {
            state
                .store
                .range(interest.name.clone()..)
                .next()
                .filter(|(name, _)| interest.name.is_prefix_of(name))
                .map(|(_, wire)| wire.clone())
        } else {
            state.store.get(&interest.name).cloned()
        };
        let response = found.map_or(FaceResponse::Nack(NackReason::NoRoute), FaceResponse::Data);
        (response, state.delay)
    }
}

#[async_trait]
impl Face for MemoryFace {
    async fn express(&self, interest: &Interest) -> FaceResponse {
        let (response, delay) = self.respond(interest);
        trace!(name = %interest.name, ?response, "memory face answered");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::name;

    #[tokio::test]
    async fn prefix_lookup_and_exact_lookup() {
        let face = MemoryFace::new();
        face.insert(name("/a/KEY/k1/self/v1"), b"cert".to_vec());

        let prefix = Interest::for_certificate(name("/a/KEY/k1"));
        assert_eq!(face.express(&prefix).await, FaceResponse::Data(b"cert".to_vec()));

        let exact = Interest {
            can_be_prefix: false,
            ..prefix.clone()
        };
        assert_eq!(
            face.express(&exact).await,
            FaceResponse::Nack(NackReason::NoRoute)
        );
        assert_eq!(face.requests().len(), 2);
    }

    #[tokio::test]
    async fn scripted_responses_come_first() {
        let face = MemoryFace::new();
        face.insert(name("/a/KEY/k1/self/v1"), b"cert".to_vec());
        face.script(
            name("/a/KEY/k1"),
            [FaceResponse::Timeout, FaceResponse::Nack(NackReason::Congestion)],
        );

        let interest = Interest::for_certificate(name("/a/KEY/k1"));
        assert_eq!(face.express(&interest).await, FaceResponse::Timeout);
        assert_eq!(
            face.express(&interest).await,
            FaceResponse::Nack(NackReason::Congestion)
        );
        assert!(matches!(face.express(&interest).await, FaceResponse::Data(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_holds_response() {
        let face = MemoryFace::new();
        face.set_delay(Some(Duration::from_secs(2)));
        let start = tokio::time::Instant::now();
        let _ = face.express(&Interest::for_certificate(name("/x"))).await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
