use tracing::debug;

use crate::converters::ConverterFactory;
use crate::endpoint::ServiceMode;
use crate::errors::DispatchError;
use crate::payload::{Payload, PayloadType};
use crate::soap::Envelope;

/// Produit la valeur d'entrée d'un provider à partir du message reçu
#[derive(Debug, Clone, Default)]
pub struct RequestMarshaller {
    converters: ConverterFactory,
}

impl RequestMarshaller {
    pub fn new(converters: ConverterFactory) -> Self {
        Self { converters }
    }

    /// Extrait la valeur d'entrée.
    ///
    /// # Arguments
    ///
    /// * `message` - Message reçu, éventuellement absent
    /// * `mode` - Mode d'échange de l'opération
    /// * `payload_type` - Type déclaré par le provider
    /// * `mtom_binding` - Le binding de l'endpoint active MTOM
    ///
    /// # Returns
    ///
    /// `Ok(None)` quand il n'y a rien à convertir (pas de message, pas de
    /// corps en mode PAYLOAD) : le provider reçoit alors une entrée vide.
    ///
    /// # Errors
    ///
    /// [`DispatchError::MalformedPayload`] si le contenu ne correspond pas au
    /// type déclaré.
    pub fn to_input(
        &self,
        message: Option<&mut Envelope>,
        mode: ServiceMode,
        payload_type: PayloadType,
        mtom_binding: bool,
    ) -> Result<Option<Payload>, DispatchError> {
        let Some(envelope) = message else {
            debug!("No inbound message, provider will receive no input");
            return Ok(None);
        };

        // Les références de pièces jointes ne se résolvent que sur un message MTOM
        if mtom_binding {
            envelope.set_mtom_enabled(true);
        }

        let converter = self.converters.for_type(payload_type);

        match mode {
            ServiceMode::Message => {
                if !envelope.has_message() {
                    debug!("There are no elements to unmarshal, provider will receive no input");
                    return Ok(None);
                }
                converter.decode_message(envelope).map(Some)
            }
            ServiceMode::Payload => {
                if payload_type == PayloadType::SoapMessage {
                    return Err(DispatchError::unsupported(
                        "soap-message payloads require MESSAGE mode",
                    ));
                }
                match envelope.body() {
                    Some(body) if !body.is_empty() => converter.decode(body, envelope).map(Some),
                    _ => {
                        debug!("No body in message, provider will receive no input");
                        Ok(None)
                    }
                }
            }
        }
    }
}
