use super::Converter;
use crate::errors::DispatchError;
use crate::payload::{Payload, PayloadType, Source};
use crate::soap::{Body, Envelope};

/// Payload structuré : le premier élément du corps, sous forme d'arbre XML
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceConverter;

impl Converter for SourceConverter {
    fn payload_type(&self) -> PayloadType {
        PayloadType::Source
    }

    fn decode(&self, body: &Body, _envelope: &Envelope) -> Result<Payload, DispatchError> {
        match body.first_element() {
            Some(element) => Ok(Payload::Source(Source::new(element.clone()))),
            None if body.is_empty() => Err(DispatchError::malformed("empty body")),
            None => Err(DispatchError::malformed(
                "body carries text but no XML element",
            )),
        }
    }

    fn encode(&self, value: Payload, _envelope: &mut Envelope) -> Result<Body, DispatchError> {
        match value {
            Payload::Source(source) => Ok(Body::from_element(source.into_element())),
            other => Err(other.mismatch(PayloadType::Source)),
        }
    }
}
