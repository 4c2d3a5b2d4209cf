use super::Converter;
use crate::errors::DispatchError;
use crate::payload::{Payload, PayloadType};
use crate::soap::{Body, Envelope, Protocol};

const MESSAGE_MODE_ONLY: &str = "soap-message payloads require MESSAGE mode";

/// Payload message : l'enveloppe entière, en-têtes et pièces jointes compris.
///
/// N'a de sens qu'en mode MESSAGE ; les opérations sur le seul corps échouent.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageConverter;

impl Converter for MessageConverter {
    fn payload_type(&self) -> PayloadType {
        PayloadType::SoapMessage
    }

    fn decode(&self, _body: &Body, _envelope: &Envelope) -> Result<Payload, DispatchError> {
        Err(DispatchError::unsupported(MESSAGE_MODE_ONLY))
    }

    fn encode(&self, _value: Payload, _envelope: &mut Envelope) -> Result<Body, DispatchError> {
        Err(DispatchError::unsupported(MESSAGE_MODE_ONLY))
    }

    fn decode_message(&self, envelope: &Envelope) -> Result<Payload, DispatchError> {
        Ok(Payload::Message(envelope.clone()))
    }

    fn encode_message(
        &self,
        value: Payload,
        _protocol: Protocol,
        mtom: bool,
    ) -> Result<Envelope, DispatchError> {
        match value {
            Payload::Message(mut envelope) => {
                if mtom {
                    envelope.set_mtom_enabled(true);
                }
                Ok(envelope)
            }
            other => Err(other.mismatch(PayloadType::SoapMessage)),
        }
    }
}
