//! # Dispatch des invocations vers un provider
//!
//! [`ProviderDispatcher`] enchaîne, pour chaque message reçu :
//!
//! ```text
//! résolution du type ─▶ RequestMarshaller ─▶ provider ─▶ ResponseMarshaller
//!                                               │
//!                                               └─(échec)─▶ FaultTranslator ─▶ ResponseMarshaller
//! ```
//!
//! Trois disciplines d'invocation sont proposées :
//! - [`invoke`](ProviderDispatcher::invoke) : synchrone, retourne toujours une enveloppe
//! - [`invoke_one_way`](ProviderDispatcher::invoke_one_way) : sans réponse, les
//!   échecs sont remis au [`FailureObserver`]
//! - [`invoke_async`](ProviderDispatcher::invoke_async) : le résultat est remis à
//!   un [`EndpointCallback`], sur le thread de l'exécuteur

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::config::DispatchSettings;
use crate::context::InvocationContext;
use crate::converters::ConverterFactory;
use crate::endpoint::{EndpointMetadata, ServiceMode};
use crate::errors::DispatchError;
use crate::executor::{
    Executor, ExecutorRegistry, InlineExecutor, SERVER_EXECUTOR, TaskHandle, UnitOfWork,
};
use crate::failure::{Failure, FaultTranslator, RootCause};
use crate::marshal::{Output, RequestMarshaller, ResponseMarshaller};
use crate::payload::{Payload, PayloadType};
use crate::provider::ServiceProvider;
use crate::resolver::PayloadTypeResolver;
use crate::soap::{Envelope, Protocol, SoapFault};

/// Destinataire du résultat d'une invocation asynchrone.
///
/// Les méthodes sont appelées sur le thread qui a exécuté le provider.
pub trait EndpointCallback: Send + Sync {
    /// Le provider a retourné `value`, encodée dans `response`
    fn on_success(&self, value: Option<Payload>, response: Envelope);

    /// L'invocation a échoué ; `fault` est l'enveloppe de fault correspondante
    fn on_failure(&self, root_cause: RootCause, fault: Envelope);
}

/// Reçoit les échecs qui ne peuvent être remis à personne (chemin one-way)
pub trait FailureObserver: Send + Sync {
    fn on_discarded(&self, operation: &str, failure: &Failure);
}

/// Observateur par défaut : trace les échecs au niveau `warn`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl FailureObserver for TracingObserver {
    fn on_discarded(&self, operation: &str, failure: &Failure) {
        warn!(
            operation = operation,
            error = %failure.error(),
            "❌ One-way invocation failed: {}",
            failure
        );
    }
}

/// Message reçu et contexte de l'invocation
#[derive(Debug, Clone, Default)]
pub struct DispatchRequest {
    pub message: Option<Envelope>,
    pub context: InvocationContext,
}

impl DispatchRequest {
    pub fn new(message: Envelope) -> Self {
        Self {
            message: Some(message),
            context: InvocationContext::new(),
        }
    }

    /// Requête sans message
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: InvocationContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.context.set_property(key, value);
        self
    }
}

/// Paramètres de construction de la réponse, capturés avant l'invocation
#[derive(Debug, Clone)]
struct Responder {
    marshaller: ResponseMarshaller,
    mode: ServiceMode,
    protocol: Protocol,
    mtom: bool,
}

impl Responder {
    fn success(
        &self,
        payload_type: PayloadType,
        value: Option<Payload>,
    ) -> Result<Envelope, Failure> {
        self.marshaller
            .to_envelope(
                Output::Value(value),
                self.mode,
                payload_type,
                self.protocol,
                self.mtom,
            )
            .map_err(Failure::from_dispatch)
    }

    fn failure(&self, failure: &Failure) -> Envelope {
        let fault = FaultTranslator::from_failure(failure);
        // Le type de payload n'intervient pas pour un fault
        self.marshaller
            .to_envelope(
                Output::Fault(fault),
                self.mode,
                PayloadType::Text,
                self.protocol,
                self.mtom,
            )
            .unwrap_or_else(|e| {
                error!("❌ Cannot build fault response: {}", e);
                Envelope::fault(self.protocol, SoapFault::internal())
            })
    }

    fn respond(&self, outcome: Result<(PayloadType, Option<Payload>), Failure>) -> Envelope {
        let failure = match outcome {
            Ok((payload_type, value)) => match self.success(payload_type, value) {
                Ok(envelope) => return envelope,
                Err(failure) => {
                    error!("❌ Response construction failed: {}", failure);
                    failure
                }
            },
            Err(failure) => failure,
        };
        debug!("Building fault response for: {}", failure);
        self.failure(&failure)
    }
}

/// Invocation préparée : type résolu et entrée extraite
struct Invocation {
    payload_type: PayloadType,
    input: Option<Payload>,
}

/// Appelle le provider, panics compris
fn call_provider(
    provider: &dyn ServiceProvider,
    input: Option<Payload>,
) -> Result<Option<Payload>, Failure> {
    match catch_unwind(AssertUnwindSafe(|| provider.invoke(input))) {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(Failure::capture(&e)),
        Err(panic) => Err(Failure::from_panic(panic)),
    }
}

/// Dispatcher d'un endpoint implémenté par un provider
pub struct ProviderDispatcher {
    provider: Arc<dyn ServiceProvider>,
    endpoint: Arc<dyn EndpointMetadata>,
    registry: Arc<ExecutorRegistry>,
    resolver: Arc<PayloadTypeResolver>,
    observer: Arc<dyn FailureObserver>,
    requests: RequestMarshaller,
    responses: ResponseMarshaller,
    disable_thread_switch: bool,
}

impl ProviderDispatcher {
    /// Crée un dispatcher.
    ///
    /// # Arguments
    ///
    /// * `provider` - Provider invoqué pour chaque message
    /// * `endpoint` - Métadonnées de l'opération (mode, binding)
    /// * `registry` - Exécuteurs des invocations différées
    pub fn new(
        provider: Arc<dyn ServiceProvider>,
        endpoint: Arc<dyn EndpointMetadata>,
        registry: Arc<ExecutorRegistry>,
    ) -> Self {
        Self {
            provider,
            endpoint,
            registry,
            resolver: PayloadTypeResolver::shared(),
            observer: Arc::new(TracingObserver),
            requests: RequestMarshaller::default(),
            responses: ResponseMarshaller::default(),
            disable_thread_switch: false,
        }
    }

    /// Remplace le résolveur partagé
    pub fn with_resolver(mut self, resolver: Arc<PayloadTypeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn FailureObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_converters(mut self, converters: ConverterFactory) -> Self {
        self.requests = RequestMarshaller::new(converters.clone());
        self.responses = ResponseMarshaller::new(converters);
        self
    }

    /// Applique les réglages par défaut de la configuration
    pub fn with_settings(mut self, settings: &DispatchSettings) -> Self {
        self.disable_thread_switch = settings.disable_thread_switch;
        self
    }

    pub fn operation_name(&self) -> &str {
        self.endpoint.operation_name()
    }

    /// Type de payload du provider
    pub fn payload_type(&self) -> Result<PayloadType, DispatchError> {
        self.resolver.resolve(&self.provider.contract())
    }

    /// Invocation synchrone.
    ///
    /// Le provider s'exécute sur le thread appelant. Aucun échec ne
    /// s'échappe : il est converti en enveloppe de fault.
    pub fn invoke(&self, request: DispatchRequest) -> Envelope {
        debug!(
            "🎬 Preparing to invoke provider based endpoint '{}'",
            self.operation_name()
        );
        debug!("Invocation pattern: two way, sync");

        let responder = self.responder(request.message.as_ref());
        let outcome = self.prepare(request.message).and_then(|invocation| {
            let output = call_provider(self.provider.as_ref(), invocation.input)?;
            Ok((invocation.payload_type, output))
        });

        responder.respond(outcome)
    }

    /// Invocation one-way.
    ///
    /// Retourne dès que l'invocation est soumise. Tout échec (préparation ou
    /// provider) est remis au [`FailureObserver`] et enregistré dans la
    /// poignée retournée.
    pub fn invoke_one_way(&self, request: DispatchRequest) -> TaskHandle {
        debug!(
            "🎬 Preparing to invoke provider based endpoint '{}'",
            self.operation_name()
        );
        debug!("Invocation pattern: one way");

        let DispatchRequest { message, context } = request;

        let submitted = self.prepare(message).and_then(|invocation| {
            let executor = self.select_executor(&context)?;
            Ok((invocation, executor))
        });
        let (invocation, executor) = match submitted {
            Ok(submitted) => submitted,
            Err(failure) => {
                self.observer.on_discarded(self.operation_name(), &failure);
                return TaskHandle::failed(failure.message());
            }
        };

        let provider = self.provider.clone();
        let observer = self.observer.clone();
        let operation = self.operation_name().to_string();

        let work = UnitOfWork::new(move || {
            match call_provider(provider.as_ref(), invocation.input) {
                Ok(_) => {
                    debug!("✅ One-way invocation of '{}' completed", operation);
                    Ok(())
                }
                Err(failure) => {
                    observer.on_discarded(&operation, &failure);
                    Err(failure)
                }
            }
        });

        let handle = work.handle();
        executor.submit(work);
        handle
    }

    /// Invocation asynchrone.
    ///
    /// Le résultat (ou le fault) est remis à `callback` sur le thread de
    /// l'exécuteur. Un échec de préparation est remis immédiatement, sur le
    /// thread appelant.
    pub fn invoke_async(
        &self,
        request: DispatchRequest,
        callback: Arc<dyn EndpointCallback>,
    ) -> TaskHandle {
        debug!(
            "🎬 Preparing to invoke provider based endpoint '{}'",
            self.operation_name()
        );
        debug!("Invocation pattern: two way, async");

        let DispatchRequest { message, context } = request;
        let responder = self.responder(message.as_ref());

        let submitted = self.prepare(message).and_then(|invocation| {
            let executor = self.select_executor(&context)?;
            Ok((invocation, executor))
        });
        let (invocation, executor) = match submitted {
            Ok(submitted) => submitted,
            Err(failure) => {
                let fault = responder.failure(&failure);
                callback.on_failure(failure.root_cause().clone(), fault);
                return TaskHandle::failed(failure.message());
            }
        };

        let provider = self.provider.clone();
        let Invocation {
            payload_type,
            input,
        } = invocation;

        let work = UnitOfWork::new(move || {
            let outcome = call_provider(provider.as_ref(), input).and_then(|value| {
                let response = responder.success(payload_type, value.clone())?;
                Ok((value, response))
            });

            match outcome {
                Ok((value, response)) => {
                    callback.on_success(value, response);
                    Ok(())
                }
                Err(failure) => {
                    let fault = responder.failure(&failure);
                    callback.on_failure(failure.root_cause().clone(), fault);
                    Err(failure)
                }
            }
        });

        let handle = work.handle();
        executor.submit(work);
        handle
    }

    /// Paramètres de réponse, déterminés par le message reçu et le binding
    fn responder(&self, message: Option<&Envelope>) -> Responder {
        Responder {
            marshaller: self.responses.clone(),
            mode: self.endpoint.service_mode(),
            protocol: message.map(Envelope::protocol).unwrap_or_default(),
            mtom: self.endpoint.is_mtom_binding(),
        }
    }

    /// Préambule commun : résolution du type puis extraction de l'entrée
    fn prepare(&self, mut message: Option<Envelope>) -> Result<Invocation, Failure> {
        let payload_type = self.payload_type()?;
        let mode = self.endpoint.service_mode();

        if let (ServiceMode::Message, PayloadType::SoapMessage, Some(envelope)) =
            (mode, payload_type, message.as_ref())
        {
            debug!(
                "Provider type is soap-message, {} attachment(s)",
                envelope.attachments().len()
            );
        }

        let input = self.requests.to_input(
            message.as_mut(),
            mode,
            payload_type,
            self.endpoint.is_mtom_binding(),
        )?;

        debug!("Invoking Provider<{}>", payload_type);
        match &input {
            Some(value) => debug!("Parameter type: {}", value.payload_type()),
            None => debug!("Parameter is empty"),
        }

        Ok(Invocation {
            payload_type,
            input,
        })
    }

    /// Choix de l'exécuteur des invocations différées
    fn select_executor(
        &self,
        context: &InvocationContext,
    ) -> Result<Arc<dyn Executor>, DispatchError> {
        let disabled = context
            .disable_thread_switch()
            .unwrap_or(self.disable_thread_switch);

        if disabled {
            debug!("Server side thread switch disabled, running on the calling thread");
            return Ok(Arc::new(InlineExecutor));
        }

        self.registry.require(SERVER_EXECUTOR)
    }
}

impl fmt::Debug for ProviderDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDispatcher")
            .field("provider", &self.provider.contract())
            .field("operation", &self.operation_name())
            .field("mode", &self.endpoint.service_mode())
            .field("registry", &self.registry)
            .field("disable_thread_switch", &self.disable_thread_switch)
            .finish()
    }
}
