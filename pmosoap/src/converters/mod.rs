//! # Convertisseurs de payload
//!
//! Un [`Converter`] fait le lien entre un type de payload et sa
//! représentation dans l'enveloppe :
//!
//! ```text
//! Body (fragment XML)  ──decode──▶  Payload
//! Payload              ──encode──▶  Body
//! ```
//!
//! En mode MESSAGE, le fragment est l'enveloppe entière
//! ([`decode_message`](Converter::decode_message) /
//! [`encode_message`](Converter::encode_message)).
//!
//! Les convertisseurs sont sans état : le [`ConverterFactory`] en garde une
//! instance partagée par type.

mod data_source;
mod message;
mod source;
mod text;

use std::fmt;
use std::sync::Arc;

pub use data_source::{BINARY_NS, DataSourceConverter, XOP_NS};
pub use message::MessageConverter;
pub use source::SourceConverter;
pub use text::TextConverter;

use crate::errors::DispatchError;
use crate::payload::{Payload, PayloadType};
use crate::soap::{Body, Envelope, Protocol};

/// Codec bidirectionnel entre un type de payload et un fragment d'enveloppe
pub trait Converter: Send + Sync + fmt::Debug {
    /// Type de payload produit et consommé
    fn payload_type(&self) -> PayloadType;

    /// Convertit un fragment de corps en valeur.
    ///
    /// `envelope` est le message d'origine : il donne accès aux pièces
    /// jointes et au drapeau MTOM.
    fn decode(&self, body: &Body, envelope: &Envelope) -> Result<Payload, DispatchError>;

    /// Convertit une valeur en fragment de corps destiné à `envelope`.
    ///
    /// Le convertisseur peut ajouter des pièces jointes à `envelope`.
    fn encode(&self, value: Payload, envelope: &mut Envelope) -> Result<Body, DispatchError>;

    /// Convertit le message entier (en-têtes compris) en valeur
    fn decode_message(&self, envelope: &Envelope) -> Result<Payload, DispatchError> {
        let document = Body::from_element(envelope.to_element());
        self.decode(&document, envelope)
    }

    /// Construit un message entier à partir d'une valeur représentant une enveloppe
    fn encode_message(
        &self,
        value: Payload,
        protocol: Protocol,
        mtom: bool,
    ) -> Result<Envelope, DispatchError> {
        let mut scratch = Envelope::new(protocol);
        scratch.set_mtom_enabled(mtom);

        let document = self.encode(value, &mut scratch)?;
        let root = document
            .first_element()
            .ok_or_else(|| DispatchError::malformed("value is not an Envelope document"))?;

        let mut envelope =
            Envelope::from_element(root).map_err(|e| DispatchError::malformed(e.to_string()))?;
        envelope.set_mtom_enabled(mtom);
        for (content_id, data) in scratch.attachments() {
            envelope.add_attachment(content_id.clone(), data.clone());
        }
        Ok(envelope)
    }
}

/// Table fixe `PayloadType → Converter`
#[derive(Debug, Clone)]
pub struct ConverterFactory {
    text: Arc<dyn Converter>,
    source: Arc<dyn Converter>,
    message: Arc<dyn Converter>,
    data_source: Arc<dyn Converter>,
}

impl ConverterFactory {
    pub fn new() -> Self {
        Self {
            text: Arc::new(TextConverter),
            source: Arc::new(SourceConverter),
            message: Arc::new(MessageConverter),
            data_source: Arc::new(DataSourceConverter),
        }
    }

    /// Convertisseur associé à un type de payload
    pub fn for_type(&self, payload_type: PayloadType) -> Arc<dyn Converter> {
        match payload_type {
            PayloadType::Text => self.text.clone(),
            PayloadType::Source => self.source.clone(),
            PayloadType::SoapMessage => self.message.clone(),
            PayloadType::DataSource => self.data_source.clone(),
        }
    }
}

impl Default for ConverterFactory {
    fn default() -> Self {
        Self::new()
    }
}
