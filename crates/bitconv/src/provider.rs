//! Converter providers and the registry that holds the active set.
//!
//! Readers pin an immutable [ProviderSet] snapshot; every registration or
//! removal publishes a replacement snapshot with the next generation number,
//! so a resolver can tell whether anything changed since it last resolved.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use arc_swap::ArcSwap;

use crate::{
    converter::{AnyConverter, TypeKey, TypeUse},
    descriptor::{DescriptorKind, DescriptorSet},
    errors::CodecError,
    service::ConverterService,
};

/// A factory for converters.
///
/// A provider is asked for a converter only when it supports every descriptor
/// kind present on the type-use. It may still decline by returning `Ok(None)`,
/// which is the normal negotiation outcome and not a failure.
pub trait ConverterProvider: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn supports_descriptor(&self, kind: DescriptorKind) -> bool;

    /// Descriptors declared on the type itself, merged under use-site descriptors.
    fn declared_descriptors(&self, ty: TypeKey) -> Option<DescriptorSet> {
        let _ = ty;
        None
    }

    /// True if built converters embed converters resolved through the service.
    /// Their outcomes are rebuilt whenever the provider set changes.
    fn resolves_members(&self) -> bool {
        false
    }

    /// Builds a converter for `type_use`, whose descriptors are already merged.
    /// Nested types are resolved through `service`.
    fn try_build(
        &self,
        type_use: &TypeUse,
        service: &ConverterService,
    ) -> Result<Option<AnyConverter>, CodecError>;
}

/// Identity of one registration. Never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(u64);

#[derive(Clone)]
pub struct Registration {
    id: ProviderId,
    rank: i32,
    provider: Arc<dyn ConverterProvider>,
}

impl Registration {
    pub fn id(&self) -> ProviderId {
        self.id
    }

    pub fn rank(&self) -> i32 {
        self.rank
    }

    pub fn provider(&self) -> &dyn ConverterProvider {
        self.provider.as_ref()
    }

    /// True if the provider understands every kind in `descriptors`.
    pub fn supports_all(&self, descriptors: &DescriptorSet) -> bool {
        descriptors
            .kinds()
            .all(|kind| self.provider.supports_descriptor(kind))
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("rank", &self.rank)
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// An immutable snapshot of the active providers, in resolution order.
#[derive(Debug, Default)]
pub struct ProviderSet {
    generation: u64,
    registrations: Vec<Registration>,
}

impl ProviderSet {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.registrations.iter()
    }

    pub fn contains(&self, id: ProviderId) -> bool {
        self.registrations.iter().any(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Descriptors declared on `ty` by any active provider; earlier providers win.
    pub fn declared_descriptors(&self, ty: TypeKey) -> DescriptorSet {
        self.registrations
            .iter()
            .filter_map(|r| r.provider.declared_descriptors(ty))
            .fold(DescriptorSet::new(), |acc, declared| acc.merged_over(&declared))
    }
}

/// The mutable home of the active provider set.
pub struct ProviderRegistry {
    current: ArcSwap<ProviderSet>,
    next_id: AtomicU64,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            current: ArcSwap::from_pointee(ProviderSet::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Adds a provider. Higher ranks are consulted first; equal ranks keep
    /// registration order.
    pub fn register(&self, provider: Arc<dyn ConverterProvider>, rank: i32) -> ProviderId {
        let id = ProviderId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let name = provider.name().to_owned();
        let registration = Registration { id, rank, provider };

        let previous = self.current.rcu(|current| {
            let mut registrations = current.registrations.clone();
            let position = registrations
                .iter()
                .position(|r| r.rank < rank)
                .unwrap_or(registrations.len());
            registrations.insert(position, registration.clone());

            ProviderSet {
                generation: current.generation + 1,
                registrations,
            }
        });

        tracing::debug!(
            provider = %name,
            ?id,
            rank,
            generation = previous.generation + 1,
            "converter provider registered"
        );

        id
    }

    /// Removes a provider. Returns false if it was not registered.
    pub fn deregister(&self, id: ProviderId) -> bool {
        let mut removed = false;
        self.current.rcu(|current| {
            let registrations: Vec<Registration> = current
                .registrations
                .iter()
                .filter(|r| r.id != id)
                .cloned()
                .collect();
            removed = registrations.len() != current.registrations.len();

            ProviderSet {
                generation: current.generation + u64::from(removed),
                registrations,
            }
        });

        if removed {
            tracing::debug!(?id, "converter provider deregistered");
        }

        removed
    }

    pub fn snapshot(&self) -> Arc<ProviderSet> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }
}
