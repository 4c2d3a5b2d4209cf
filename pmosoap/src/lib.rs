//! # pmosoap - dispatch SOAP côté endpoint
//!
//! Ce crate reçoit un message SOAP déjà analysé, le convertit dans le type
//! de payload déclaré par un provider, invoque ce provider et reconstruit le
//! message de réponse (ou de fault).
//!
//! ## Exemple
//!
//! ```rust
//! use std::sync::Arc;
//! use pmosoap::{
//!     Body, DispatchRequest, EndpointDescription, Envelope, ExecutorRegistry, Protocol,
//!     ProviderDispatcher, provider_fn,
//! };
//!
//! let provider = provider_fn("greeter", |who: Option<String>| {
//!     Ok(who.map(|w| format!("{} world", w)))
//! });
//! let dispatcher = ProviderDispatcher::new(
//!     Arc::new(provider),
//!     Arc::new(EndpointDescription::new("greet")),
//!     Arc::new(ExecutorRegistry::new()),
//! );
//!
//! let request = Envelope::with_body(Protocol::Soap11, Body::from_text("hello"));
//! let response = dispatcher.invoke(DispatchRequest::new(request));
//! assert_eq!(response.body(), Some(&Body::from_text("hello world")));
//! ```

pub mod config;
pub mod context;
pub mod converters;
pub mod dispatcher;
pub mod endpoint;
pub mod errors;
pub mod executor;
pub mod failure;
pub mod logging;
pub mod marshal;
pub mod payload;
pub mod provider;
pub mod resolver;
pub mod soap;

pub use config::DispatchConfig;
pub use context::{InvocationContext, SERVER_DISABLE_THREAD_SWITCH};
pub use converters::{Converter, ConverterFactory};
pub use dispatcher::{
    DispatchRequest, EndpointCallback, FailureObserver, ProviderDispatcher, TracingObserver,
};
pub use endpoint::{EndpointDescription, EndpointMetadata, ServiceMode};
pub use errors::DispatchError;
pub use executor::{
    Executor, ExecutorRegistry, InlineExecutor, PooledExecutor, SERVER_EXECUTOR, TaskHandle,
    TaskStatus, UnitOfWork,
};
pub use failure::{Failure, FailureOrigin, FaultTranslator, RootCause};
pub use marshal::{Output, RequestMarshaller, ResponseMarshaller};
pub use payload::{DataSource, Payload, PayloadType, PayloadValue, Source};
pub use provider::{FnProvider, Provider, ServiceProvider, TypedProvider, provider_fn};
pub use resolver::{PayloadTypeResolver, ProviderContract};
pub use soap::{Body, Envelope, FaultCode, Protocol, SoapFault};
