//! Construction et sérialisation des enveloppes SOAP

use xmltree::{Element, EmitterConfig, XMLNode};

use super::{ENVELOPE_PREFIX, Envelope, Protocol};

/// Sérialise un élément XML en chaîne.
///
/// # Arguments
///
/// * `element` - Élément à écrire
/// * `declaration` - Écrire la déclaration `<?xml ...?>`
/// * `indent` - Indenter la sortie
pub fn write_element(
    element: &Element,
    declaration: bool,
    indent: bool,
) -> Result<String, xmltree::Error> {
    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(declaration)
        .perform_indent(indent)
        .indent_string("  ");
    element.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Élément `prefix:name` dans l'espace de noms de l'enveloppe
pub(crate) fn envelope_element(name: &str) -> Element {
    Element::new(&format!("{}:{}", ENVELOPE_PREFIX, name))
}

pub(crate) fn text_element(name: &str, text: &str) -> Element {
    let mut element = Element::new(name);
    element.children.push(XMLNode::Text(text.to_string()));
    element
}

/// Construit l'élément `Envelope` complet d'un message
pub(crate) fn build_envelope_element(envelope: &Envelope) -> Element {
    let protocol: Protocol = envelope.protocol();

    let mut root = envelope_element("Envelope");
    root.attributes.insert(
        format!("xmlns:{}", ENVELOPE_PREFIX),
        protocol.envelope_namespace().to_string(),
    );

    if !envelope.headers().is_empty() {
        let mut header = envelope_element("Header");
        for block in envelope.headers() {
            header.children.push(XMLNode::Element(block.clone()));
        }
        root.children.push(XMLNode::Element(header));
    }

    let mut body = envelope_element("Body");
    if let Some(fault) = envelope.fault_value() {
        body.children
            .push(XMLNode::Element(fault.to_element(protocol)));
    } else if let Some(content) = envelope.body() {
        body.children.extend(content.nodes().iter().cloned());
    }
    root.children.push(XMLNode::Element(body));

    root
}
