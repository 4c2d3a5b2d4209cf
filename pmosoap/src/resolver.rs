//! Résolution du type de payload d'un provider.
//!
//! Chaque provider s'enregistre avec un [`ProviderContract`] qui déclare
//! explicitement ses arguments de type. Le résolveur valide cette déclaration
//! et mémorise le résultat par classe de provider.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::DispatchError;
use crate::payload::{PayloadType, PayloadValue};

/// Déclaration d'un provider : identité de sa classe et arguments de type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderContract {
    class_name: String,
    type_arguments: Vec<String>,
}

impl ProviderContract {
    pub fn new(class_name: impl Into<String>, type_arguments: Vec<String>) -> Self {
        Self {
            class_name: class_name.into(),
            type_arguments,
        }
    }

    /// Contrat à un seul argument, tel que fourni par un descripteur de déploiement
    pub fn declared(class_name: impl Into<String>, payload: &str) -> Self {
        Self::new(class_name, vec![payload.to_string()])
    }

    /// Contrat d'un provider typé dont le payload est `T`
    pub fn of<T: PayloadValue>(class_name: impl Into<String>) -> Self {
        Self::declared(class_name, T::PAYLOAD_TYPE.declaration_name())
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn type_arguments(&self) -> &[String] {
        &self.type_arguments
    }
}

/// Résolveur mémoïsé `classe de provider → PayloadType`.
///
/// Le calcul est pur : deux threads qui résolvent la même classe en même
/// temps obtiennent le même résultat, l'insertion est donc faite sans
/// sérialiser le calcul.
#[derive(Debug, Default)]
pub struct PayloadTypeResolver {
    cache: RwLock<HashMap<String, PayloadType>>,
}

static SHARED_RESOLVER: Lazy<Arc<PayloadTypeResolver>> =
    Lazy::new(|| Arc::new(PayloadTypeResolver::new()));

impl PayloadTypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instance partagée par tout le processus
    pub fn shared() -> Arc<PayloadTypeResolver> {
        SHARED_RESOLVER.clone()
    }

    /// Résout le type de payload déclaré par un provider.
    ///
    /// # Errors
    ///
    /// [`DispatchError::UnsupportedPayloadType`] si le contrat ne déclare
    /// aucun argument, en déclare plusieurs, ou déclare un type inconnu.
    /// Les échecs ne sont pas mémorisés.
    pub fn resolve(&self, contract: &ProviderContract) -> Result<PayloadType, DispatchError> {
        if let Some(cached) = self.cached(contract.class_name()) {
            return Ok(cached);
        }

        let payload_type = Self::compute(contract)?;
        debug!(
            "🔎 Provider {} resolved to payload type {}",
            contract.class_name(),
            payload_type
        );

        let mut cache = self.cache.write();
        Ok(*cache
            .entry(contract.class_name().to_string())
            .or_insert(payload_type))
    }

    /// Résultat mémorisé pour une classe
    pub fn cached(&self, class_name: &str) -> Option<PayloadType> {
        self.cache.read().get(class_name).copied()
    }

    /// Nombre de classes mémorisées
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    fn compute(contract: &ProviderContract) -> Result<PayloadType, DispatchError> {
        match contract.type_arguments() {
            [] => Err(DispatchError::unsupported(format!(
                "provider {} is not parameterized",
                contract.class_name()
            ))),
            [single] => PayloadType::from_declaration(single).ok_or_else(|| {
                DispatchError::unsupported(format!(
                    "provider {} declares unsupported payload type '{}'",
                    contract.class_name(),
                    single
                ))
            }),
            many => Err(DispatchError::unsupported(format!(
                "provider {} declares {} type arguments",
                contract.class_name(),
                many.len()
            ))),
        }
    }
}
