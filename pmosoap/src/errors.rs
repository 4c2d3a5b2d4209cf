use thiserror::Error;

/// Erreurs du moteur de dispatch.
///
/// Toutes ces erreurs sont interceptées à la frontière d'invocation et
/// converties en fault SOAP (chemin synchrone), transmises au callback
/// (chemin asynchrone) ou signalées à l'observateur (chemin one-way).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Type de payload absent, multiple ou non supporté
    #[error("Unsupported payload type: {0}")]
    UnsupportedPayloadType(String),

    /// Le corps ou le message ne peut pas être converti dans le type déclaré
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Handler failure: {0}")]
    HandlerFailure(String),

    #[error("Response construction failure: {0}")]
    ResponseConstructionFailure(String),

    #[error("No executor registered for role '{0}'")]
    ExecutorUnavailable(String),
}

impl DispatchError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        DispatchError::UnsupportedPayloadType(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        DispatchError::MalformedPayload(message.into())
    }

    /// Vrai si l'erreur est imputable au message reçu plutôt qu'au serveur
    pub fn is_client_error(&self) -> bool {
        matches!(self, DispatchError::MalformedPayload(_))
    }
}
