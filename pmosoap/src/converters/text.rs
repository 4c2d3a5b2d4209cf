use std::io::BufReader;

use tracing::debug;
use xmltree::{Element, XMLNode};

use super::Converter;
use crate::errors::DispatchError;
use crate::payload::{Payload, PayloadType};
use crate::soap::{Body, Envelope, write_element};

/// Payload texte : le fragment XML sous forme de chaîne.
///
/// Une chaîne qui n'est pas un élément XML bien formé est transportée comme
/// un noeud texte (`"hello"` reste `"hello"`, `"<3 hearts"` aussi).
///
/// Un corps ne conserve pas les noeuds texte vides ou composés de blancs :
/// `""` et `"   "` s'encodent en corps vide et se relisent comme une
/// absence de valeur.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextConverter;

impl Converter for TextConverter {
    fn payload_type(&self) -> PayloadType {
        PayloadType::Text
    }

    fn decode(&self, body: &Body, _envelope: &Envelope) -> Result<Payload, DispatchError> {
        let mut text = String::new();
        for node in body.nodes() {
            match node {
                XMLNode::Text(t) | XMLNode::CData(t) => text.push_str(t),
                XMLNode::Element(element) => {
                    let xml = write_element(element, false, false).map_err(|e| {
                        DispatchError::malformed(format!("cannot serialize body element: {}", e))
                    })?;
                    text.push_str(&xml);
                }
                _ => {}
            }
        }
        Ok(Payload::Text(text))
    }

    fn encode(&self, value: Payload, _envelope: &mut Envelope) -> Result<Body, DispatchError> {
        let text = match value {
            Payload::Text(text) => text,
            other => return Err(other.mismatch(PayloadType::Text)),
        };

        if text.trim_start().starts_with('<') {
            match Element::parse(BufReader::new(text.as_bytes())) {
                Ok(element) => return Ok(Body::from_element(element)),
                Err(e) => debug!("Text payload is not an XML element ({}), kept as text", e),
            }
        }

        Ok(Body::from_text(text))
    }
}
