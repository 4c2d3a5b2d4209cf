//! Payload binaire.
//!
//! Sur le fil, les données sont portées par un élément `pmo:Binary` :
//!
//! ```xml
//! <pmo:Binary xmlns:pmo="urn:pmosoap:binary" contentType="image/png">iVBORw0KGgo=</pmo:Binary>
//! ```
//!
//! Quand le message est optimisé (MTOM), le contenu est remplacé par une
//! référence vers une pièce jointe :
//!
//! ```xml
//! <pmo:Binary xmlns:pmo="urn:pmosoap:binary" contentType="image/png">
//!   <xop:Include xmlns:xop="http://www.w3.org/2004/08/xop/include" href="cid:..."/>
//! </pmo:Binary>
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;
use uuid::Uuid;
use xmltree::{Element, XMLNode};

use super::Converter;
use crate::errors::DispatchError;
use crate::payload::{DataSource, Payload, PayloadType};
use crate::soap::{
    Body, Envelope, Protocol, find_child, local_name, parse_envelope, write_element,
};

/// Namespace de l'élément `Binary`
pub const BINARY_NS: &str = "urn:pmosoap:binary";

/// Namespace XOP des références de pièces jointes
pub const XOP_NS: &str = "http://www.w3.org/2004/08/xop/include";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, Default)]
pub struct DataSourceConverter;

impl DataSourceConverter {
    fn resolve_include(include: &Element, envelope: &Envelope) -> Result<Vec<u8>, DispatchError> {
        if !envelope.is_mtom_enabled() {
            return Err(DispatchError::malformed(
                "attachment reference in a message without MTOM",
            ));
        }

        let href = include
            .attributes
            .get("href")
            .ok_or_else(|| DispatchError::malformed("xop:Include without href"))?;
        let content_id = href.strip_prefix("cid:").unwrap_or(href);

        envelope
            .attachment(content_id)
            .map(|data| data.bytes().to_vec())
            .ok_or_else(|| {
                DispatchError::malformed(format!("no attachment with content-id '{}'", content_id))
            })
    }

    /// Remplace chaque `xop:Include` par le base64 de la pièce jointe référencée
    fn inline_includes(nodes: &mut [XMLNode], envelope: &Envelope) -> Result<(), DispatchError> {
        for node in nodes.iter_mut() {
            let inlined = match node {
                XMLNode::Element(element) if local_name(&element.name) == "Include" => {
                    Some(STANDARD.encode(Self::resolve_include(element, envelope)?))
                }
                XMLNode::Element(element) => {
                    Self::inline_includes(&mut element.children, envelope)?;
                    None
                }
                _ => None,
            };
            if let Some(text) = inlined {
                *node = XMLNode::Text(text);
            }
        }
        Ok(())
    }

    /// Réencode chaque `Binary` en ligne sous forme de pièce jointe de `envelope`
    fn externalize(
        &self,
        nodes: &mut [XMLNode],
        envelope: &mut Envelope,
    ) -> Result<(), DispatchError> {
        for node in nodes.iter_mut() {
            let inline = match node {
                XMLNode::Element(element) if local_name(&element.name) == "Binary" => {
                    find_child(element, "Include")
                        .is_none()
                        .then(|| element.clone())
                }
                XMLNode::Element(element) => {
                    self.externalize(&mut element.children, envelope)?;
                    None
                }
                _ => None,
            };
            let Some(binary) = inline else {
                continue;
            };

            let data = self.decode(&Body::from_element(binary), envelope)?;
            let encoded = self.encode(data, envelope)?;
            if let Some(replacement) = encoded.into_nodes().into_iter().next() {
                *node = replacement;
            }
        }
        Ok(())
    }
}

impl Converter for DataSourceConverter {
    fn payload_type(&self) -> PayloadType {
        PayloadType::DataSource
    }

    fn decode(&self, body: &Body, envelope: &Envelope) -> Result<Payload, DispatchError> {
        let binary = body
            .first_element()
            .filter(|e| local_name(&e.name) == "Binary")
            .ok_or_else(|| DispatchError::malformed("body does not carry a Binary element"))?;

        let content_type = binary
            .attributes
            .get("contentType")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let bytes = match find_child(binary, "Include") {
            Some(include) => Self::resolve_include(include, envelope)?,
            None => {
                let text = binary.get_text().unwrap_or_default();
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                STANDARD
                    .decode(compact.as_bytes())
                    .map_err(|e| DispatchError::malformed(format!("invalid base64 content: {}", e)))?
            }
        };

        Ok(Payload::Data(DataSource::new(content_type, bytes)))
    }

    fn encode(&self, value: Payload, envelope: &mut Envelope) -> Result<Body, DispatchError> {
        let data = match value {
            Payload::Data(data) => data,
            other => return Err(other.mismatch(PayloadType::DataSource)),
        };

        let mut binary = Element::new("pmo:Binary");
        binary
            .attributes
            .insert("xmlns:pmo".to_string(), BINARY_NS.to_string());
        binary
            .attributes
            .insert("contentType".to_string(), data.content_type().to_string());

        if envelope.is_mtom_enabled() {
            let content_id = format!("{}@pmosoap", Uuid::new_v4());
            debug!("📎 Storing {} bytes as attachment {}", data.bytes().len(), content_id);

            let mut include = Element::new("xop:Include");
            include
                .attributes
                .insert("xmlns:xop".to_string(), XOP_NS.to_string());
            include
                .attributes
                .insert("href".to_string(), format!("cid:{}", content_id));
            binary.children.push(XMLNode::Element(include));
            envelope.add_attachment(content_id, data);
        } else {
            binary
                .children
                .push(XMLNode::Text(STANDARD.encode(data.bytes())));
        }

        Ok(Body::from_element(binary))
    }

    /// En mode MESSAGE, la valeur est le document XML de l'enveloppe entière.
    ///
    /// Les références `xop:Include` sont remplacées par le contenu de leur
    /// pièce jointe, encodé en base64 : le document se suffit à lui-même.
    fn decode_message(&self, envelope: &Envelope) -> Result<Payload, DispatchError> {
        let mut document = envelope.to_element();
        Self::inline_includes(&mut document.children, envelope)?;

        let xml = write_element(&document, true, false)
            .map_err(|e| DispatchError::malformed(format!("cannot serialize message: {}", e)))?;
        let content_type = envelope.protocol().content_type();
        Ok(Payload::Data(DataSource::new(content_type, xml.into_bytes())))
    }

    /// Relit le document d'une enveloppe ; avec MTOM, les éléments `Binary`
    /// du corps redeviennent des pièces jointes.
    fn encode_message(
        &self,
        value: Payload,
        _protocol: Protocol,
        mtom: bool,
    ) -> Result<Envelope, DispatchError> {
        let data = match value {
            Payload::Data(data) => data,
            other => return Err(other.mismatch(PayloadType::DataSource)),
        };

        let mut envelope = parse_envelope(data.bytes())
            .map_err(|e| DispatchError::malformed(format!("data is not a SOAP message: {}", e)))?;
        envelope.set_mtom_enabled(mtom);

        if mtom {
            if let Some(body) = envelope.body().cloned() {
                let mut nodes = body.into_nodes();
                self.externalize(&mut nodes, &mut envelope)?;
                envelope.set_body(Body::from_nodes(nodes));
            }
        }
        Ok(envelope)
    }
}
