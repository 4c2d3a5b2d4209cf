//! SOAP Faults

use xmltree::{Element, XMLNode};

use super::builder::{envelope_element, text_element};
use super::{ENVELOPE_PREFIX, Protocol, SoapParseError, find_child, local_name};

/// Raison utilisée quand aucune information exploitable n'est disponible
pub const INTERNAL_FAULT_REASON: &str = "Internal server error";

/// Code d'un fault SOAP.
///
/// SOAP 1.2 renomme `Client`/`Server` en `Sender`/`Receiver` ; les deux
/// formes sont acceptées en lecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultCode {
    VersionMismatch,
    MustUnderstand,
    /// Le message reçu est en cause
    Client,
    /// Le traitement a échoué côté serveur
    Server,
}

impl FaultCode {
    /// Nom local du code pour un protocole donné
    pub fn local_name(&self, protocol: Protocol) -> &'static str {
        match (self, protocol) {
            (FaultCode::VersionMismatch, _) => "VersionMismatch",
            (FaultCode::MustUnderstand, _) => "MustUnderstand",
            (FaultCode::Client, Protocol::Soap11) => "Client",
            (FaultCode::Client, Protocol::Soap12) => "Sender",
            (FaultCode::Server, Protocol::Soap11) => "Server",
            (FaultCode::Server, Protocol::Soap12) => "Receiver",
        }
    }

    /// Interprète un code éventuellement préfixé (`soapenv:Server`)
    pub fn parse(code: &str) -> Option<Self> {
        match local_name(code.trim()) {
            "VersionMismatch" => Some(FaultCode::VersionMismatch),
            "MustUnderstand" => Some(FaultCode::MustUnderstand),
            "Client" | "Sender" => Some(FaultCode::Client),
            "Server" | "Receiver" => Some(FaultCode::Server),
            _ => None,
        }
    }
}

/// Erreur SOAP (Fault).
///
/// Implémente [`std::error::Error`] : un provider peut la retourner telle
/// quelle pour choisir lui-même le fault renvoyé à l'appelant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct SoapFault {
    /// Code du fault
    pub code: FaultCode,

    /// Description lisible de l'erreur
    pub reason: String,

    /// Détail optionnel
    pub detail: Option<String>,
}

impl SoapFault {
    /// Crée un fault SOAP simple
    pub fn new(code: FaultCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            detail: None,
        }
    }

    /// Fault imputable au message reçu
    pub fn client(reason: impl Into<String>) -> Self {
        Self::new(FaultCode::Client, reason)
    }

    /// Fault imputable au serveur
    pub fn server(reason: impl Into<String>) -> Self {
        Self::new(FaultCode::Server, reason)
    }

    /// Fault générique, utilisé quand la traduction d'une erreur échoue
    pub fn internal() -> Self {
        Self::server(INTERNAL_FAULT_REASON)
    }

    /// Ajoute un détail
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Construit l'élément `Fault` selon le protocole
    pub fn to_element(&self, protocol: Protocol) -> Element {
        let code = format!("{}:{}", ENVELOPE_PREFIX, self.code.local_name(protocol));
        let mut fault = envelope_element("Fault");

        match protocol {
            Protocol::Soap11 => {
                fault
                    .children
                    .push(XMLNode::Element(text_element("faultcode", &code)));
                fault
                    .children
                    .push(XMLNode::Element(text_element("faultstring", &self.reason)));
                if let Some(detail) = &self.detail {
                    fault
                        .children
                        .push(XMLNode::Element(text_element("detail", detail)));
                }
            }
            Protocol::Soap12 => {
                let mut code_elem = envelope_element("Code");
                let mut value = envelope_element("Value");
                value.children.push(XMLNode::Text(code));
                code_elem.children.push(XMLNode::Element(value));
                fault.children.push(XMLNode::Element(code_elem));

                let mut reason = envelope_element("Reason");
                let mut text = envelope_element("Text");
                text.attributes
                    .insert("xml:lang".to_string(), "en".to_string());
                text.children.push(XMLNode::Text(self.reason.clone()));
                reason.children.push(XMLNode::Element(text));
                fault.children.push(XMLNode::Element(reason));

                if let Some(detail) = &self.detail {
                    let mut detail_elem = envelope_element("Detail");
                    detail_elem.children.push(XMLNode::Text(detail.clone()));
                    fault.children.push(XMLNode::Element(detail_elem));
                }
            }
        }

        fault
    }

    /// Lit un élément `Fault` SOAP 1.1 ou 1.2
    pub fn from_element(element: &Element) -> Result<Self, SoapParseError> {
        let code_text = find_child(element, "faultcode")
            .or_else(|| find_child(element, "Code").and_then(|c| find_child(c, "Value")))
            .and_then(|e| e.get_text())
            .ok_or_else(|| SoapParseError::InvalidFault("missing fault code".to_string()))?;
        let code = FaultCode::parse(&code_text).ok_or_else(|| {
            SoapParseError::InvalidFault(format!("unknown fault code '{}'", code_text))
        })?;

        let reason = find_child(element, "faultstring")
            .or_else(|| find_child(element, "Reason").and_then(|r| find_child(r, "Text")))
            .and_then(|e| e.get_text())
            .map(|t| t.into_owned())
            .unwrap_or_default();

        let detail = find_child(element, "detail")
            .or_else(|| find_child(element, "Detail"))
            .and_then(|e| e.get_text())
            .map(|t| t.into_owned());

        Ok(Self {
            code,
            reason,
            detail,
        })
    }
}
