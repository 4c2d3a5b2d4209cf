use tracing::debug;

use crate::converters::ConverterFactory;
use crate::endpoint::ServiceMode;
use crate::errors::DispatchError;
use crate::payload::{Payload, PayloadType};
use crate::soap::{Envelope, Protocol, SoapFault};

/// Résultat d'une invocation, à transformer en message sortant
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Valeur retournée par le provider (éventuellement vide)
    Value(Option<Payload>),
    /// Fault à renvoyer tel quel
    Fault(SoapFault),
}

impl From<SoapFault> for Output {
    fn from(fault: SoapFault) -> Self {
        Output::Fault(fault)
    }
}

impl From<Option<Payload>> for Output {
    fn from(value: Option<Payload>) -> Self {
        Output::Value(value)
    }
}

/// Construit le message sortant à partir du résultat d'une invocation
#[derive(Debug, Clone, Default)]
pub struct ResponseMarshaller {
    converters: ConverterFactory,
}

impl ResponseMarshaller {
    pub fn new(converters: ConverterFactory) -> Self {
        Self { converters }
    }

    /// Construit l'enveloppe de réponse.
    ///
    /// Un fault court-circuite les convertisseurs. Une valeur absente donne
    /// une enveloppe vide mais valide.
    ///
    /// # Errors
    ///
    /// [`DispatchError::ResponseConstructionFailure`] si la valeur ne peut pas
    /// être encodée.
    pub fn to_envelope(
        &self,
        output: Output,
        mode: ServiceMode,
        payload_type: PayloadType,
        protocol: Protocol,
        mtom: bool,
    ) -> Result<Envelope, DispatchError> {
        let value = match output {
            Output::Fault(fault) => {
                let mut envelope = Envelope::fault(protocol, fault);
                envelope.set_mtom_enabled(mtom);
                return Ok(envelope);
            }
            Output::Value(None) => {
                debug!("Provider returned no value, sending an empty response");
                let mut envelope = Envelope::new(protocol);
                envelope.set_mtom_enabled(mtom);
                return Ok(envelope);
            }
            Output::Value(Some(value)) => value,
        };

        let mut envelope = match (mode, value) {
            (ServiceMode::Message, Payload::Message(envelope)) => envelope,
            (ServiceMode::Message, value) => self
                .converters
                .for_type(payload_type)
                .encode_message(value, protocol, mtom)
                .map_err(construction_failure)?,
            (ServiceMode::Payload, value) => {
                let mut envelope = Envelope::new(protocol);
                envelope.set_mtom_enabled(mtom);
                let body = self
                    .converters
                    .for_type(payload_type)
                    .encode(value, &mut envelope)
                    .map_err(construction_failure)?;
                envelope.set_body(body);
                envelope
            }
        };

        if mtom {
            envelope.set_mtom_enabled(true);
        }
        Ok(envelope)
    }
}

fn construction_failure(error: DispatchError) -> DispatchError {
    match error {
        DispatchError::ResponseConstructionFailure(_) => error,
        other => DispatchError::ResponseConstructionFailure(other.to_string()),
    }
}
