//! Types de payload acceptés par un provider.
//!
//! Un provider déclare un unique type de payload parmi quatre :
//!
//! | [`PayloadType`] | Valeur Rust | Nom de déclaration |
//! |-----------------|-------------|--------------------|
//! | `Text`          | `String`    | `text`             |
//! | `Source`        | [`Source`]  | `source`           |
//! | `SoapMessage`   | [`Envelope`]| `soap-message`     |
//! | `DataSource`    | [`DataSource`] | `data-source`   |

use std::fmt;
use std::io::BufReader;

use xmltree::Element;

use crate::errors::DispatchError;
use crate::soap::Envelope;

/// Type concret de payload d'un provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadType {
    /// Texte XML brut
    Text,
    /// Document XML structuré
    Source,
    /// Message SOAP complet
    SoapMessage,
    /// Données binaires typées
    DataSource,
}

impl PayloadType {
    pub const ALL: [PayloadType; 4] = [
        PayloadType::Text,
        PayloadType::Source,
        PayloadType::SoapMessage,
        PayloadType::DataSource,
    ];

    /// Nom utilisé dans les déclarations de providers
    pub fn declaration_name(&self) -> &'static str {
        match self {
            PayloadType::Text => "text",
            PayloadType::Source => "source",
            PayloadType::SoapMessage => "soap-message",
            PayloadType::DataSource => "data-source",
        }
    }

    /// Retrouve un type à partir de son nom de déclaration (insensible à la casse)
    pub fn from_declaration(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        PayloadType::ALL
            .into_iter()
            .find(|t| t.declaration_name() == name)
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.declaration_name())
    }
}

/// Document XML structuré
#[derive(Debug, Clone, PartialEq)]
pub struct Source(Element);

impl Source {
    pub fn new(element: Element) -> Self {
        Self(element)
    }

    /// Parse un document XML
    pub fn parse(xml: &str) -> Result<Self, DispatchError> {
        Element::parse(BufReader::new(xml.as_bytes()))
            .map(Self)
            .map_err(|e| DispatchError::malformed(format!("invalid XML document: {}", e)))
    }

    pub fn element(&self) -> &Element {
        &self.0
    }

    pub fn into_element(self) -> Element {
        self.0
    }
}

/// Données binaires accompagnées de leur type MIME
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    content_type: String,
    bytes: Vec<u8>,
}

impl DataSource {
    pub fn new(content_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Valeur de payload non typée, telle que la manipulent les convertisseurs
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Source(Source),
    Message(Envelope),
    Data(DataSource),
}

impl Payload {
    pub fn payload_type(&self) -> PayloadType {
        match self {
            Payload::Text(_) => PayloadType::Text,
            Payload::Source(_) => PayloadType::Source,
            Payload::Message(_) => PayloadType::SoapMessage,
            Payload::Data(_) => PayloadType::DataSource,
        }
    }

    pub(crate) fn mismatch(&self, expected: PayloadType) -> DispatchError {
        DispatchError::malformed(format!(
            "expected a {} payload, got {}",
            expected,
            self.payload_type()
        ))
    }
}

/// Type Rust utilisable comme payload d'un [`Provider`](crate::provider::Provider).
///
/// Seuls les quatre types fournis par ce crate l'implémentent.
pub trait PayloadValue: Sized + Send + 'static {
    /// Type de payload déclaré
    const PAYLOAD_TYPE: PayloadType;

    fn into_payload(self) -> Payload;

    fn from_payload(payload: Payload) -> Result<Self, DispatchError>;
}

impl PayloadValue for String {
    const PAYLOAD_TYPE: PayloadType = PayloadType::Text;

    fn into_payload(self) -> Payload {
        Payload::Text(self)
    }

    fn from_payload(payload: Payload) -> Result<Self, DispatchError> {
        match payload {
            Payload::Text(text) => Ok(text),
            other => Err(other.mismatch(Self::PAYLOAD_TYPE)),
        }
    }
}

impl PayloadValue for Source {
    const PAYLOAD_TYPE: PayloadType = PayloadType::Source;

    fn into_payload(self) -> Payload {
        Payload::Source(self)
    }

    fn from_payload(payload: Payload) -> Result<Self, DispatchError> {
        match payload {
            Payload::Source(source) => Ok(source),
            other => Err(other.mismatch(Self::PAYLOAD_TYPE)),
        }
    }
}

impl PayloadValue for Envelope {
    const PAYLOAD_TYPE: PayloadType = PayloadType::SoapMessage;

    fn into_payload(self) -> Payload {
        Payload::Message(self)
    }

    fn from_payload(payload: Payload) -> Result<Self, DispatchError> {
        match payload {
            Payload::Message(envelope) => Ok(envelope),
            other => Err(other.mismatch(Self::PAYLOAD_TYPE)),
        }
    }
}

impl PayloadValue for DataSource {
    const PAYLOAD_TYPE: PayloadType = PayloadType::DataSource;

    fn into_payload(self) -> Payload {
        Payload::Data(self)
    }

    fn from_payload(payload: Payload) -> Result<Self, DispatchError> {
        match payload {
            Payload::Data(data) => Ok(data),
            other => Err(other.mismatch(Self::PAYLOAD_TYPE)),
        }
    }
}
