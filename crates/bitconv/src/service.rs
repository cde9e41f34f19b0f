//! The resolution service: finds a converter for a type-use by asking the
//! active providers in order, and caches the outcome per type-use.
//!
//! ## Resolution
//!
//! 1. The service hands out one [CompositeResolver] per type-use.
//! 2. A resolver pins the current provider snapshot. If its generation matches
//!    the last successful resolution, the cached converter is returned.
//! 3. Otherwise outcomes of departed providers are dropped, the use-site
//!    descriptors are merged over the type's declared descriptors, and every
//!    provider supporting all merged descriptor kinds is consulted in order,
//!    reusing cached outcomes (converter or refusal) where present. Outcomes of
//!    providers that resolve members are rebuilt, so member churn is observed.
//! 4. The first converter wins. If there is none the call fails with
//!    [CodecError::NoConverterFound]. The resolver's state is left as it was,
//!    and a resolver for the requested type-use that never resolved is not
//!    kept. Resolvers of members that did resolve stay cached.
//!
//! Steps 2 to 4 run under the resolver's lock.

use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};

use crate::{
    converter::{AnyConverter, Converter, TypeKey, TypeUse},
    errors::CodecError,
    primitive::{BooleanProvider, IntegerProvider},
    provider::{ConverterProvider, ProviderId, ProviderRegistry},
};

/// Long-lived façade over the provider registry and the per-type-use resolvers.
///
/// ```
/// use bitconv::{descriptor::DescriptorSet, converter::TypeUse, service::ConverterService};
///
/// let service = ConverterService::with_primitives();
/// let nibble = service
///     .converter_for::<u8>(&TypeUse::with_descriptors::<u8>(DescriptorSet::new().width(4)))
///     .unwrap();
///
/// assert_eq!(nibble.encode_bytes(&0xA).unwrap(), vec![0xA0]);
/// ```
#[derive(Default)]
pub struct ConverterService {
    registry: ProviderRegistry,
    resolvers: RwLock<HashMap<TypeUse, Arc<CompositeResolver>>>,
}

impl ConverterService {
    /// A service with no providers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A service with the boolean and integer providers registered.
    pub fn with_primitives() -> Self {
        let service = Self::new();
        service.register(BooleanProvider);
        service.register(IntegerProvider);
        service
    }

    pub fn register<P: ConverterProvider + 'static>(&self, provider: P) -> ProviderId {
        self.register_ranked(provider, 0)
    }

    /// Registers with an explicit rank; higher ranks are consulted first.
    pub fn register_ranked<P: ConverterProvider + 'static>(
        &self,
        provider: P,
        rank: i32,
    ) -> ProviderId {
        self.registry.register(Arc::new(provider), rank)
    }

    pub fn register_shared(&self, provider: Arc<dyn ConverterProvider>, rank: i32) -> ProviderId {
        self.registry.register(provider, rank)
    }

    pub fn deregister(&self, id: ProviderId) -> bool {
        self.registry.deregister(id)
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The cached resolver for `type_use`, if any.
    pub fn resolver(&self, type_use: &TypeUse) -> Option<Arc<CompositeResolver>> {
        self.resolvers.read().get(type_use).cloned()
    }

    pub fn cached_resolvers(&self) -> usize {
        self.resolvers.read().len()
    }

    /// Resolves the erased converter for `type_use`.
    pub fn resolve(&self, type_use: &TypeUse) -> Result<AnyConverter, CodecError> {
        let resolver = match self.resolver(type_use) {
            Some(resolver) => resolver,
            None => Arc::clone(
                self.resolvers
                    .write()
                    .entry(type_use.clone())
                    .or_insert_with(|| Arc::new(CompositeResolver::new(type_use.clone()))),
            ),
        };

        let result = resolver.get_converter(self);

        // A resolver that never produced a converter is not kept.
        if result.is_err() && !resolver.is_resolved() {
            let mut resolvers = self.resolvers.write();
            if resolvers
                .get(type_use)
                .is_some_and(|cached| Arc::ptr_eq(cached, &resolver))
            {
                resolvers.remove(type_use);
            }
        }

        result
    }

    /// Converter for an undecorated use of `T`.
    pub fn converter<T: 'static>(&self) -> Result<Converter<T>, CodecError> {
        self.converter_for(&TypeUse::of::<T>())
    }

    /// Converter for a use of `T` carrying descriptors.
    pub fn converter_for<T: 'static>(
        &self,
        type_use: &TypeUse,
    ) -> Result<Converter<T>, CodecError> {
        if !type_use.ty().is::<T>() {
            return Err(CodecError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: type_use.ty().name(),
            });
        }

        self.resolve(type_use)?.downcast()
    }
}

/// Per-type-use cache of provider outcomes.
pub struct CompositeResolver {
    type_use: TypeUse,
    state: Mutex<ResolverState>,
}

#[derive(Clone, Default)]
struct ResolverState {
    /// Provider generation of the last successful resolution.
    generation: Option<u64>,
    /// The type-use after merging declared descriptors, as providers saw it.
    merged: Option<TypeUse>,
    selected: Option<AnyConverter>,
    /// `None` records a refusal.
    outcomes: HashMap<ProviderId, Option<AnyConverter>>,
}

impl CompositeResolver {
    fn new(type_use: TypeUse) -> Self {
        CompositeResolver {
            type_use,
            state: Mutex::new(ResolverState::default()),
        }
    }

    pub fn type_use(&self) -> &TypeUse {
        &self.type_use
    }

    pub fn is_resolved(&self) -> bool {
        self.state.lock().selected.is_some()
    }

    pub fn get_converter(&self, service: &ConverterService) -> Result<AnyConverter, CodecError> {
        let providers = service.providers().snapshot();
        let mut state = self.state.lock();

        if state.generation == Some(providers.generation())
            && let Some(selected) = &state.selected
        {
            return Ok(selected.clone());
        }

        let merged = self
            .type_use
            .merged_over(&providers.declared_descriptors(self.type_use.ty()));

        let mut next = state.clone();
        if next.merged.as_ref() != Some(&merged) {
            next.outcomes.clear();
            next.merged = Some(merged.clone());
        }
        next.outcomes.retain(|id, _| providers.contains(*id));

        let mut found = None;
        for registration in providers.iter() {
            if !registration.supports_all(merged.descriptors()) {
                continue;
            }

            // Composite outcomes may hold member converters of departed providers.
            let cached = if registration.provider().resolves_members() {
                None
            } else {
                next.outcomes.get(&registration.id())
            };

            let outcome = match cached {
                Some(outcome) => outcome.clone(),
                None => {
                    let built = registration.provider().try_build(&merged, service)?;
                    next.outcomes.insert(registration.id(), built.clone());
                    built
                }
            };

            match outcome {
                Some(converter) => {
                    found = Some((registration, converter));
                    break;
                }
                None => tracing::trace!(
                    provider = registration.provider().name(),
                    ty = self.type_use.ty().name(),
                    "converter provider declined"
                ),
            }
        }

        let Some((registration, converter)) = found else {
            return Err(CodecError::NoConverterFound {
                type_name: self.type_use.ty().name(),
            });
        };

        check_type(self.type_use.ty(), &converter)?;

        tracing::debug!(
            provider = registration.provider().name(),
            ty = self.type_use.ty().name(),
            descriptors = ?merged.descriptors(),
            generation = providers.generation(),
            "converter resolved"
        );

        next.generation = Some(providers.generation());
        next.selected = Some(converter.clone());
        *state = next;

        Ok(converter)
    }
}

fn check_type(expected: TypeKey, converter: &AnyConverter) -> Result<(), CodecError> {
    if converter.ty() != expected {
        return Err(CodecError::TypeMismatch {
            expected: expected.name(),
            found: converter.ty().name(),
        });
    }

    Ok(())
}
