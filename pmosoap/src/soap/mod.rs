//! # Module SOAP - modèle d'enveloppe
//!
//! Ce module fournit la représentation abstraite d'un message SOAP telle que
//! la consomme le moteur de dispatch : en-têtes, corps ou fault, pièces
//! jointes binaires et drapeau d'optimisation MTOM.
//!
//! ## Architecture
//!
//! - [`Envelope`] : message complet (SOAP 1.1 ou 1.2)
//! - [`Body`] : fragment de corps (liste de noeuds XML)
//! - [`Content`] : corps normal, fault, ou rien (jamais les deux)
//! - [`SoapFault`] : erreur SOAP
//!
//! ## Example
//!
//! ```rust
//! use pmosoap::soap::{parse_envelope, Protocol};
//!
//! let xml = r#"<?xml version="1.0"?>
//! <soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
//!   <soapenv:Body>
//!     <echo>hello</echo>
//!   </soapenv:Body>
//! </soapenv:Envelope>"#;
//!
//! let envelope = parse_envelope(xml.as_bytes()).unwrap();
//! assert_eq!(envelope.protocol(), Protocol::Soap11);
//! assert!(envelope.body().is_some());
//! ```

mod builder;
mod envelope;
mod fault;
mod parser;

pub use builder::write_element;
pub use envelope::{Attachments, Body, Content, Envelope};
pub use fault::{FaultCode, SoapFault};
pub use parser::{SoapParseError, parse_envelope};

/// Namespace de l'enveloppe SOAP 1.1
pub const SOAP11_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Namespace de l'enveloppe SOAP 1.2
pub const SOAP12_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// Préfixe utilisé pour les éléments d'enveloppe produits par le moteur
pub const ENVELOPE_PREFIX: &str = "soapenv";

/// Variante du protocole SOAP portée par un message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    /// SOAP 1.1
    #[default]
    Soap11,
    /// SOAP 1.2
    Soap12,
}

impl Protocol {
    /// Namespace de l'élément `Envelope` pour ce protocole
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            Protocol::Soap11 => SOAP11_ENVELOPE_NS,
            Protocol::Soap12 => SOAP12_ENVELOPE_NS,
        }
    }

    /// Retrouve le protocole à partir du namespace de l'enveloppe
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            SOAP11_ENVELOPE_NS => Some(Protocol::Soap11),
            SOAP12_ENVELOPE_NS => Some(Protocol::Soap12),
            _ => None,
        }
    }

    /// Content-Type HTTP d'un message de ce protocole
    pub fn content_type(&self) -> &'static str {
        match self {
            Protocol::Soap11 => "text/xml; charset=\"utf-8\"",
            Protocol::Soap12 => "application/soap+xml; charset=\"utf-8\"",
        }
    }
}

/// Nom local d'un nom XML éventuellement préfixé (`s:Body` → `Body`)
pub(crate) fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Cherche le premier enfant élément dont le nom local correspond
pub(crate) fn find_child<'a>(
    element: &'a xmltree::Element,
    name: &str,
) -> Option<&'a xmltree::Element> {
    element
        .children
        .iter()
        .filter_map(|n| n.as_element())
        .find(|e| local_name(&e.name) == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_namespaces() {
        assert_eq!(
            Protocol::from_namespace(SOAP11_ENVELOPE_NS),
            Some(Protocol::Soap11)
        );
        assert_eq!(
            Protocol::from_namespace(SOAP12_ENVELOPE_NS),
            Some(Protocol::Soap12)
        );
        assert_eq!(Protocol::from_namespace("urn:other"), None);
        assert_eq!(Protocol::Soap12.envelope_namespace(), SOAP12_ENVELOPE_NS);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("s:Body"), "Body");
        assert_eq!(local_name("Body"), "Body");
    }
}
