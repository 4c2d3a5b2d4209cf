//! Chaîne d'échec d'une invocation et traduction en fault SOAP.
//!
//! Un [`Failure`] est construit une seule fois, au point où l'échec est
//! intercepté. Il conserve la cause racine (la dernière erreur de la chaîne
//! `source()`) et les messages des couches qui l'enveloppent.

use std::any::Any;
use std::fmt;

use crate::errors::DispatchError;
use crate::soap::SoapFault;

/// Message utilisé quand un panic ne porte pas de chaîne
const OPAQUE_PANIC: &str = "provider panicked";

/// Nature de la cause racine
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOrigin {
    /// Le provider a choisi lui-même son fault
    Fault(SoapFault),
    /// Erreur du moteur de dispatch
    Dispatch(DispatchError),
    /// Erreur quelconque retournée par le provider
    Handler,
    /// Panic intercepté pendant l'exécution du provider
    Panic,
}

/// Cause racine d'un échec
#[derive(Debug, Clone, PartialEq)]
pub struct RootCause {
    message: String,
    origin: FailureOrigin,
}

impl RootCause {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn origin(&self) -> &FailureOrigin {
        &self.origin
    }
}

impl fmt::Display for RootCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Échec d'une invocation, avec sa cause racine
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    root: RootCause,
    /// Messages des couches englobantes, de la plus externe à la plus interne
    context: Vec<String>,
}

impl Failure {
    /// Capture une erreur retournée par un provider.
    ///
    /// La chaîne `source()` est parcourue jusqu'au bout ; si la cause racine
    /// est un [`SoapFault`] ou une [`DispatchError`], elle est conservée telle
    /// quelle.
    pub fn capture(error: &anyhow::Error) -> Self {
        let mut messages: Vec<String> = Vec::new();
        let mut origin = FailureOrigin::Handler;

        for cause in error.chain() {
            messages.push(cause.to_string());
            origin = if let Some(fault) = cause.downcast_ref::<SoapFault>() {
                FailureOrigin::Fault(fault.clone())
            } else if let Some(dispatch) = cause.downcast_ref::<DispatchError>() {
                FailureOrigin::Dispatch(dispatch.clone())
            } else {
                FailureOrigin::Handler
            };
        }

        let message = messages.pop().unwrap_or_default();
        Self {
            root: RootCause { message, origin },
            context: messages,
        }
    }

    /// Échec produit par le moteur lui-même
    pub fn from_dispatch(error: DispatchError) -> Self {
        Self {
            root: RootCause {
                message: error.to_string(),
                origin: FailureOrigin::Dispatch(error),
            },
            context: Vec::new(),
        }
    }

    /// Échec produit par un panic du provider
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => payload
                .downcast_ref::<&'static str>()
                .map(|s| s.to_string())
                .unwrap_or_else(|| OPAQUE_PANIC.to_string()),
        };
        Self {
            root: RootCause {
                message,
                origin: FailureOrigin::Panic,
            },
            context: Vec::new(),
        }
    }

    pub fn root_cause(&self) -> &RootCause {
        &self.root
    }

    /// Messages des couches qui enveloppent la cause racine
    pub fn context(&self) -> &[String] {
        &self.context
    }

    /// Message de la cause racine
    pub fn message(&self) -> &str {
        &self.root.message
    }

    /// L'échec exprimé dans la taxonomie du moteur
    pub fn error(&self) -> DispatchError {
        match &self.root.origin {
            FailureOrigin::Dispatch(error) => error.clone(),
            _ => DispatchError::HandlerFailure(self.root.message.clone()),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for layer in &self.context {
            write!(f, "{}: ", layer)?;
        }
        f.write_str(&self.root.message)
    }
}

impl std::error::Error for Failure {}

impl From<DispatchError> for Failure {
    fn from(error: DispatchError) -> Self {
        Failure::from_dispatch(error)
    }
}

/// Point unique de conversion d'un échec en fault visible par l'appelant
pub struct FaultTranslator;

impl FaultTranslator {
    /// Construit le fault correspondant à la cause racine de `failure`.
    ///
    /// Ne peut pas échouer : sans message exploitable, le fault générique
    /// [`SoapFault::internal`] est renvoyé.
    pub fn from_failure(failure: &Failure) -> SoapFault {
        let root = failure.root_cause();

        if let FailureOrigin::Fault(fault) = root.origin() {
            return fault.clone();
        }

        if root.message().trim().is_empty() {
            return SoapFault::internal();
        }

        let fault = match root.origin() {
            FailureOrigin::Dispatch(error) if error.is_client_error() => {
                SoapFault::client(root.message())
            }
            _ => SoapFault::server(root.message()),
        };

        if failure.context().is_empty() {
            fault
        } else {
            fault.with_detail(failure.to_string())
        }
    }
}
