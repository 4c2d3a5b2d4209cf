//! Métadonnées d'endpoint consommées par le dispatcher.
//!
//! La construction de ces métadonnées (à partir d'un WSDL ou d'annotations)
//! est hors du périmètre du crate : le dispatcher ne lit que le mode
//! d'échange, le binding et le nom d'opération.

/// Binding SOAP 1.1 sur HTTP
pub const SOAP11_HTTP_BINDING: &str = "http://schemas.xmlsoap.org/wsdl/soap/http";

/// Binding SOAP 1.1 sur HTTP avec MTOM
pub const SOAP11_HTTP_MTOM_BINDING: &str = "http://schemas.xmlsoap.org/wsdl/soap/http?mtom=true";

/// Binding SOAP 1.2 sur HTTP
pub const SOAP12_HTTP_BINDING: &str = "http://www.w3.org/2003/05/soap/bindings/HTTP/";

/// Binding SOAP 1.2 sur HTTP avec MTOM
pub const SOAP12_HTTP_MTOM_BINDING: &str =
    "http://www.w3.org/2003/05/soap/bindings/HTTP/?mtom=true";

/// Vrai si le binding demande l'optimisation des pièces jointes
pub fn is_mtom_binding(binding: &str) -> bool {
    binding == SOAP11_HTTP_MTOM_BINDING || binding == SOAP12_HTTP_MTOM_BINDING
}

/// Mode d'échange d'une opération
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceMode {
    /// Seul le corps du message est exposé au provider
    #[default]
    Payload,
    /// Le message entier est exposé au provider
    Message,
}

/// Interface fournie par le modèle de description des services
pub trait EndpointMetadata: Send + Sync {
    fn operation_name(&self) -> &str;

    fn service_mode(&self) -> ServiceMode;

    fn binding_type(&self) -> Option<&str>;

    fn is_mtom_binding(&self) -> bool {
        self.binding_type().is_some_and(is_mtom_binding)
    }
}

/// Description simple d'un endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescription {
    operation_name: String,
    service_mode: ServiceMode,
    binding_type: Option<String>,
}

impl EndpointDescription {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            service_mode: ServiceMode::default(),
            binding_type: None,
        }
    }

    pub fn with_mode(mut self, mode: ServiceMode) -> Self {
        self.service_mode = mode;
        self
    }

    pub fn with_binding(mut self, binding: impl Into<String>) -> Self {
        self.binding_type = Some(binding.into());
        self
    }
}

impl EndpointMetadata for EndpointDescription {
    fn operation_name(&self) -> &str {
        &self.operation_name
    }

    fn service_mode(&self) -> ServiceMode {
        self.service_mode
    }

    fn binding_type(&self) -> Option<&str> {
        self.binding_type.as_deref()
    }
}
