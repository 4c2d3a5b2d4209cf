//! Structures de l'enveloppe SOAP

use std::collections::BTreeMap;

use xmltree::{Element, XMLNode};

use super::builder::{build_envelope_element, write_element};
use super::{Protocol, SoapFault, SoapParseError, find_child, local_name};
use crate::payload::DataSource;

/// Pièces jointes binaires d'un message, indexées par content-id
pub type Attachments = BTreeMap<String, DataSource>;

/// Fragment de corps SOAP.
///
/// Contient les noeuds enfants de `Body`, dans l'ordre. Les noeuds texte
/// composés uniquement de blancs ne sont pas conservés : un corps réduit à
/// `""` ou `"   "` est vide, et l'enveloppe qui le reçoit n'a pas de contenu.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Body {
    nodes: Vec<XMLNode>,
}

impl Body {
    /// Crée un corps vide
    pub fn new() -> Self {
        Self::default()
    }

    /// Crée un corps à partir d'une liste de noeuds
    pub fn from_nodes(nodes: Vec<XMLNode>) -> Self {
        Self {
            nodes: nodes.into_iter().filter(|n| !is_blank(n)).collect(),
        }
    }

    /// Crée un corps contenant un unique élément
    pub fn from_element(element: Element) -> Self {
        Self {
            nodes: vec![XMLNode::Element(element)],
        }
    }

    /// Crée un corps contenant un unique noeud texte
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_nodes(vec![XMLNode::Text(text.into())])
    }

    pub fn nodes(&self) -> &[XMLNode] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<XMLNode> {
        self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Premier élément du corps
    pub fn first_element(&self) -> Option<&Element> {
        self.nodes.iter().find_map(|n| n.as_element())
    }
}

fn is_blank(node: &XMLNode) -> bool {
    match node {
        XMLNode::Text(text) => text.trim().is_empty(),
        _ => false,
    }
}

/// Contenu d'une enveloppe : corps normal ou fault, jamais les deux.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Content {
    #[default]
    Empty,
    Body(Body),
    Fault(SoapFault),
}

/// Enveloppe SOAP complète
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    protocol: Protocol,
    mtom_enabled: bool,
    headers: Vec<Element>,
    content: Content,
    attachments: Attachments,
}

impl Envelope {
    /// Crée une enveloppe vide
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            mtom_enabled: false,
            headers: Vec::new(),
            content: Content::Empty,
            attachments: Attachments::new(),
        }
    }

    /// Crée une enveloppe portant un corps
    pub fn with_body(protocol: Protocol, body: Body) -> Self {
        let mut envelope = Self::new(protocol);
        envelope.set_body(body);
        envelope
    }

    /// Crée une enveloppe de fault
    pub fn fault(protocol: Protocol, fault: SoapFault) -> Self {
        let mut envelope = Self::new(protocol);
        envelope.set_fault(fault);
        envelope
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn is_mtom_enabled(&self) -> bool {
        self.mtom_enabled
    }

    pub fn set_mtom_enabled(&mut self, enabled: bool) {
        self.mtom_enabled = enabled;
    }

    pub fn headers(&self) -> &[Element] {
        &self.headers
    }

    pub fn add_header(&mut self, block: Element) {
        self.headers.push(block);
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Corps du message, si ce n'est pas un fault
    pub fn body(&self) -> Option<&Body> {
        match &self.content {
            Content::Body(body) => Some(body),
            _ => None,
        }
    }

    /// Fault porté par le message
    pub fn fault_value(&self) -> Option<&SoapFault> {
        match &self.content {
            Content::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self.content, Content::Fault(_))
    }

    /// Remplace le contenu par un corps (un fault éventuel est retiré)
    pub fn set_body(&mut self, body: Body) {
        self.content = if body.is_empty() {
            Content::Empty
        } else {
            Content::Body(body)
        };
    }

    /// Remplace le contenu par un fault (un corps éventuel est retiré)
    pub fn set_fault(&mut self, fault: SoapFault) {
        self.content = Content::Fault(fault);
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub fn attachment(&self, content_id: &str) -> Option<&DataSource> {
        self.attachments.get(content_id)
    }

    pub fn add_attachment(&mut self, content_id: impl Into<String>, data: DataSource) {
        self.attachments.insert(content_id.into(), data);
    }

    /// Vrai si le message porte quelque chose (en-tête, corps, fault ou pièce jointe)
    pub fn has_message(&self) -> bool {
        !self.headers.is_empty()
            || !matches!(self.content, Content::Empty)
            || !self.attachments.is_empty()
    }

    /// Construit l'arbre XML `Envelope` du message (hors pièces jointes)
    pub fn to_element(&self) -> Element {
        build_envelope_element(self)
    }

    /// Sérialise le message en XML
    pub fn to_xml(&self) -> Result<String, xmltree::Error> {
        write_element(&self.to_element(), true, false)
    }

    /// Lit un arbre XML `Envelope`.
    ///
    /// Le protocole est déduit du namespace de l'élément racine.
    pub fn from_element(root: &Element) -> Result<Self, SoapParseError> {
        if local_name(&root.name) != "Envelope" {
            return Err(SoapParseError::MissingEnvelope);
        }

        let namespace = element_namespace(root).ok_or_else(|| {
            SoapParseError::UnknownProtocol("no envelope namespace".to_string())
        })?;
        let protocol = Protocol::from_namespace(&namespace)
            .ok_or(SoapParseError::UnknownProtocol(namespace))?;

        let mut envelope = Self::new(protocol);

        if let Some(header) = find_child(root, "Header") {
            envelope.headers = header
                .children
                .iter()
                .filter_map(|n| n.as_element())
                .cloned()
                .collect();
        }

        let body = find_child(root, "Body").ok_or(SoapParseError::MissingBody)?;
        match find_child(body, "Fault") {
            Some(fault) => envelope.set_fault(SoapFault::from_element(fault)?),
            None => envelope.set_body(Body::from_nodes(body.children.clone())),
        }

        Ok(envelope)
    }
}

/// Namespace d'un élément, qu'il vienne du parseur ou d'un attribut `xmlns:` posé à la main
fn element_namespace(element: &Element) -> Option<String> {
    if let Some(ns) = &element.namespace {
        return Some(ns.clone());
    }
    let attribute = match element.name.split_once(':') {
        Some((prefix, _)) => format!("xmlns:{}", prefix),
        None => "xmlns".to_string(),
    };
    element.attributes.get(&attribute).cloned()
}
