//! Parser SOAP

use std::io::BufReader;

use xmltree::Element;

use super::Envelope;

/// Erreur de parsing SOAP
#[derive(Debug, thiserror::Error)]
pub enum SoapParseError {
    #[error("XML parse error: {0}")]
    XmlError(#[from] xmltree::ParseError),

    #[error("Missing SOAP Envelope")]
    MissingEnvelope,

    #[error("Missing SOAP Body")]
    MissingBody,

    #[error("Unknown SOAP protocol: {0}")]
    UnknownProtocol(String),

    #[error("Invalid SOAP Fault: {0}")]
    InvalidFault(String),
}

/// Parse une enveloppe SOAP complète à partir de bytes XML
pub fn parse_envelope(xml: &[u8]) -> Result<Envelope, SoapParseError> {
    let reader = BufReader::new(xml);
    let root = Element::parse(reader)?;
    Envelope::from_element(&root)
}
