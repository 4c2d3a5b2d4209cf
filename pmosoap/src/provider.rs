//! Contrats des providers.
//!
//! Un provider reçoit une seule valeur typée et en retourne une. Le
//! dispatcher manipule des [`ServiceProvider`] (payload dynamique) ;
//! [`TypedProvider`] adapte un [`Provider`] dont le type de payload est
//! déclaré statiquement.
//!
//! # Exemple
//!
//! ```rust
//! use pmosoap::{Provider, TypedProvider, ServiceProvider};
//!
//! struct Greeter;
//!
//! impl Provider for Greeter {
//!     type Payload = String;
//!
//!     fn invoke(&self, request: Option<String>) -> anyhow::Result<Option<String>> {
//!         Ok(request.map(|who| format!("{} world", who)))
//!     }
//! }
//!
//! let provider = TypedProvider::new(Greeter);
//! assert_eq!(provider.contract().type_arguments(), ["text"]);
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::payload::{Payload, PayloadValue};
use crate::resolver::ProviderContract;

/// Provider vu par le dispatcher
pub trait ServiceProvider: Send + Sync {
    /// Déclaration utilisée pour résoudre le type de payload
    fn contract(&self) -> ProviderContract;

    fn invoke(&self, request: Option<Payload>) -> anyhow::Result<Option<Payload>>;
}

/// Provider typé
pub trait Provider: Send + Sync + 'static {
    type Payload: PayloadValue;

    fn invoke(&self, request: Option<Self::Payload>) -> anyhow::Result<Option<Self::Payload>>;
}

/// Adaptateur [`Provider`] → [`ServiceProvider`]
pub struct TypedProvider<P> {
    inner: P,
}

impl<P: Provider> TypedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P> fmt::Debug for TypedProvider<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedProvider")
            .field("provider", &std::any::type_name::<P>())
            .finish()
    }
}

impl<P: Provider> ServiceProvider for TypedProvider<P> {
    fn contract(&self) -> ProviderContract {
        ProviderContract::of::<P::Payload>(std::any::type_name::<P>())
    }

    fn invoke(&self, request: Option<Payload>) -> anyhow::Result<Option<Payload>> {
        let request = request.map(P::Payload::from_payload).transpose()?;
        let response = self.inner.invoke(request)?;
        Ok(response.map(PayloadValue::into_payload))
    }
}

/// Provider défini par une fermeture, voir [`provider_fn`]
pub struct FnProvider<T, F> {
    name: String,
    handler: F,
    _payload: PhantomData<fn() -> T>,
}

/// Construit un provider à partir d'une fermeture.
///
/// `name` identifie le provider pour la mémoïsation du type de payload.
pub fn provider_fn<T, F>(name: impl Into<String>, handler: F) -> FnProvider<T, F>
where
    T: PayloadValue,
    F: Fn(Option<T>) -> anyhow::Result<Option<T>> + Send + Sync + 'static,
{
    FnProvider {
        name: name.into(),
        handler,
        _payload: PhantomData,
    }
}

impl<T, F> fmt::Debug for FnProvider<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProvider").field("name", &self.name).finish()
    }
}

impl<T, F> ServiceProvider for FnProvider<T, F>
where
    T: PayloadValue,
    F: Fn(Option<T>) -> anyhow::Result<Option<T>> + Send + Sync + 'static,
{
    fn contract(&self) -> ProviderContract {
        ProviderContract::of::<T>(self.name.clone())
    }

    fn invoke(&self, request: Option<Payload>) -> anyhow::Result<Option<Payload>> {
        let request = request.map(T::from_payload).transpose()?;
        let response = (self.handler)(request)?;
        Ok(response.map(PayloadValue::into_payload))
    }
}
