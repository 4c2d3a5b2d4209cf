use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use anyhow::Context;
use pmosoap::endpoint::{SOAP11_HTTP_BINDING, SOAP11_HTTP_MTOM_BINDING};
use pmosoap::soap::Content;
use pmosoap::{
    Body, ConverterFactory, DataSource, DispatchRequest, EndpointCallback, EndpointDescription,
    Envelope, Executor, ExecutorRegistry, Failure, FailureObserver, FailureOrigin, FaultCode,
    InlineExecutor, Payload, PayloadType, PayloadTypeResolver, PooledExecutor, Protocol,
    Provider, ProviderDispatcher, RootCause, SERVER_DISABLE_THREAD_SWITCH, SERVER_EXECUTOR,
    ServiceMode, ServiceProvider, SoapFault, Source, TaskStatus, TypedProvider, UnitOfWork,
    provider_fn,
};

const WAIT: Duration = Duration::from_secs(5);

/// Provider texte qui mémorise ses entrées et le thread qui l'exécute
#[derive(Default)]
struct Greeter {
    inputs: Mutex<Vec<Option<String>>>,
    threads: Mutex<Vec<ThreadId>>,
}

/// Enveloppe locale : la règle d'orphelin interdit `impl Provider for Arc<Greeter>`
struct SharedGreeter(Arc<Greeter>);

impl Provider for SharedGreeter {
    type Payload = String;

    fn invoke(&self, request: Option<String>) -> anyhow::Result<Option<String>> {
        self.0.inputs.lock().unwrap().push(request.clone());
        self.0.threads.lock().unwrap().push(thread::current().id());
        Ok(request.map(|who| format!("{} world", who)))
    }
}

/// Observateur qui conserve les échecs écartés
#[derive(Default)]
struct RecordingObserver {
    failures: Mutex<Vec<(String, Failure)>>,
}

impl FailureObserver for RecordingObserver {
    fn on_discarded(&self, operation: &str, failure: &Failure) {
        self.failures
            .lock()
            .unwrap()
            .push((operation.to_string(), failure.clone()));
    }
}

#[derive(Default)]
struct RecordingCallback {
    successes: Mutex<Vec<(Option<Payload>, Envelope, ThreadId)>>,
    failures: Mutex<Vec<(RootCause, Envelope, ThreadId)>>,
}

impl EndpointCallback for RecordingCallback {
    fn on_success(&self, value: Option<Payload>, response: Envelope) {
        self.successes
            .lock()
            .unwrap()
            .push((value, response, thread::current().id()));
    }

    fn on_failure(&self, root_cause: RootCause, fault: Envelope) {
        self.failures
            .lock()
            .unwrap()
            .push((root_cause, fault, thread::current().id()));
    }
}

/// Exécuteur qui garde les unités de travail jusqu'à ce que le test les lance
#[derive(Debug, Default)]
struct DeferredExecutor {
    queue: Mutex<Vec<UnitOfWork>>,
}

impl DeferredExecutor {
    fn run_all(&self) {
        let queue: Vec<UnitOfWork> = self.queue.lock().unwrap().drain(..).collect();
        for work in queue {
            work.run();
        }
    }
}

impl Executor for DeferredExecutor {
    fn submit(&self, work: UnitOfWork) {
        self.queue.lock().unwrap().push(work);
    }
}

fn registry_with(executor: Arc<dyn Executor>) -> Arc<ExecutorRegistry> {
    let registry = ExecutorRegistry::new();
    registry.register(SERVER_EXECUTOR, executor);
    Arc::new(registry)
}

fn dispatcher_for(
    provider: Arc<dyn ServiceProvider>,
    endpoint: EndpointDescription,
    registry: Arc<ExecutorRegistry>,
) -> ProviderDispatcher {
    ProviderDispatcher::new(provider, Arc::new(endpoint), registry)
        .with_resolver(Arc::new(PayloadTypeResolver::new()))
}

fn text_request(text: &str) -> DispatchRequest {
    DispatchRequest::new(Envelope::with_body(Protocol::Soap11, Body::from_text(text)))
}

fn decode_text(envelope: &Envelope) -> Payload {
    let converter = ConverterFactory::new().for_type(PayloadType::Text);
    converter.decode(envelope.body().unwrap(), envelope).unwrap()
}

// ============================================================================
// Invocation synchrone
// ============================================================================

#[test]
fn test_sync_hello_world() {
    let greeter = Arc::new(Greeter::default());
    let dispatcher = dispatcher_for(
        Arc::new(TypedProvider::new(SharedGreeter(greeter.clone()))),
        EndpointDescription::new("greet"),
        Arc::new(ExecutorRegistry::new()),
    );

    let response = dispatcher.invoke(text_request("hello"));

    assert_eq!(
        *greeter.inputs.lock().unwrap(),
        vec![Some("hello".to_string())]
    );
    assert!(!response.is_fault());
    assert_eq!(decode_text(&response), Payload::Text("hello world".to_string()));
}

#[test]
fn test_sync_runs_on_calling_thread() {
    let greeter = Arc::new(Greeter::default());
    let dispatcher = dispatcher_for(
        Arc::new(TypedProvider::new(SharedGreeter(greeter.clone()))),
        EndpointDescription::new("greet"),
        Arc::new(ExecutorRegistry::new()),
    );

    dispatcher.invoke(text_request("hello"));
    assert_eq!(*greeter.threads.lock().unwrap(), vec![thread::current().id()]);
}

#[test]
fn test_sync_failure_maps_to_root_cause() {
    let provider = provider_fn("storage", |_: Option<String>| {
        Err(std::io::Error::other("disk full"))
            .context("writing record")
            .map(|()| None)
    });
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("store"),
        Arc::new(ExecutorRegistry::new()),
    );

    let response = dispatcher.invoke(text_request("x"));

    let fault = response.fault_value().unwrap();
    assert_eq!(fault.code, FaultCode::Server);
    assert_eq!(fault.reason, "disk full");
    assert_eq!(fault.detail.as_deref(), Some("writing record: disk full"));
}

#[test]
fn test_sync_provider_fault_is_kept() {
    let provider = provider_fn("lookup", |_: Option<String>| {
        Err(SoapFault::client("unknown id").with_detail("id=42").into())
    });
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("lookup"),
        Arc::new(ExecutorRegistry::new()),
    );

    let response = dispatcher.invoke(text_request("42"));
    assert_eq!(
        response.fault_value(),
        Some(&SoapFault::client("unknown id").with_detail("id=42"))
    );
}

#[test]
fn test_sync_panic_becomes_fault() {
    let provider = provider_fn("fragile", |_: Option<String>| -> anyhow::Result<Option<String>> {
        panic!("index out of range")
    });
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("fragile"),
        Arc::new(ExecutorRegistry::new()),
    );

    let response = dispatcher.invoke(text_request("x"));
    assert_eq!(response.fault_value(), Some(&SoapFault::server("index out of range")));
}

#[test]
fn test_malformed_body_is_client_fault_and_provider_not_called() {
    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let provider = provider_fn("tree", move |source: Option<Source>| {
        *counter.lock().unwrap() += 1;
        Ok(source)
    });
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("tree"),
        Arc::new(ExecutorRegistry::new()),
    );

    let response = dispatcher.invoke(text_request("plain text is not a tree"));

    assert_eq!(response.fault_value().unwrap().code, FaultCode::Client);
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn test_text_that_is_not_xml_is_returned_as_text() {
    let provider = provider_fn("love", |_: Option<String>| Ok(Some("<3 hearts".to_string())));
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("love"),
        Arc::new(ExecutorRegistry::new()),
    );

    let response = dispatcher.invoke(text_request("hello"));

    assert!(!response.is_fault(), "{:?}", response.fault_value());
    assert_eq!(decode_text(&response), Payload::Text("<3 hearts".to_string()));
}

#[test]
fn test_blank_text_result_gives_empty_response() {
    for blank in ["", "   "] {
        let provider = provider_fn("blank", move |_: Option<String>| Ok(Some(blank.to_string())));
        let dispatcher = dispatcher_for(
            Arc::new(provider),
            EndpointDescription::new("blank"),
            Arc::new(ExecutorRegistry::new()),
        );

        // Un texte blanc ne se distingue pas d'une absence de valeur
        let response = dispatcher.invoke(text_request("hello"));
        assert_eq!(response.content(), &Content::Empty);
    }
}

#[test]
fn test_payload_mode_without_body_passes_none() {
    let greeter = Arc::new(Greeter::default());
    let dispatcher = dispatcher_for(
        Arc::new(TypedProvider::new(SharedGreeter(greeter.clone()))),
        EndpointDescription::new("greet"),
        Arc::new(ExecutorRegistry::new()),
    );

    let response = dispatcher.invoke(DispatchRequest::new(Envelope::new(Protocol::Soap12)));

    assert_eq!(*greeter.inputs.lock().unwrap(), vec![None]);
    assert_eq!(response.content(), &Content::Empty);
    assert_eq!(response.protocol(), Protocol::Soap12);
}

#[test]
fn test_missing_message_passes_none() {
    let greeter = Arc::new(Greeter::default());
    let dispatcher = dispatcher_for(
        Arc::new(TypedProvider::new(SharedGreeter(greeter.clone()))),
        EndpointDescription::new("greet").with_mode(ServiceMode::Message),
        Arc::new(ExecutorRegistry::new()),
    );

    let response = dispatcher.invoke(DispatchRequest::empty());
    assert_eq!(*greeter.inputs.lock().unwrap(), vec![None]);
    assert!(!response.is_fault());
}

// ============================================================================
// Mode MESSAGE
// ============================================================================

#[test]
fn test_message_mode_exposes_headers() {
    let provider = provider_fn("router", |message: Option<Envelope>| {
        let mut message = message.context("no message")?;
        let headers = message.headers().len();
        message.set_body(Body::from_text(format!("{} header(s)", headers)));
        Ok(Some(message))
    });
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("route").with_mode(ServiceMode::Message),
        Arc::new(ExecutorRegistry::new()),
    );

    let mut request = Envelope::with_body(Protocol::Soap12, Body::from_text("ping"));
    request.add_header(xmltree::Element::new("trace"));
    let response = dispatcher.invoke(DispatchRequest::new(request));

    assert_eq!(response.headers().len(), 1);
    assert_eq!(response.body(), Some(&Body::from_text("1 header(s)")));
}

#[test]
fn test_message_mode_source_sees_whole_envelope() {
    let provider = provider_fn("mirror", |source: Option<Source>| {
        let source = source.context("no message")?;
        anyhow::ensure!(
            source.element().name.ends_with("Envelope"),
            "expected the envelope, got {}",
            source.element().name
        );
        Ok(Some(source))
    });
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("mirror").with_mode(ServiceMode::Message),
        Arc::new(ExecutorRegistry::new()),
    );

    let request = Envelope::with_body(Protocol::Soap11, Body::from_text("echo"));
    let response = dispatcher.invoke(DispatchRequest::new(request.clone()));

    assert!(!response.is_fault(), "{:?}", response.fault_value());
    assert_eq!(response.body(), request.body());
}

#[test]
fn test_soap_message_provider_in_payload_mode_is_rejected() {
    let provider = provider_fn("router", |message: Option<Envelope>| Ok(message));
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("route"),
        Arc::new(ExecutorRegistry::new()),
    );

    let response = dispatcher.invoke(text_request("ping"));
    let fault = response.fault_value().unwrap();
    assert_eq!(fault.code, FaultCode::Server);
    assert!(fault.reason.contains("MESSAGE mode"));
}

// ============================================================================
// MTOM
// ============================================================================

#[test]
fn test_mtom_binding_resolves_and_produces_attachments() {
    let provider = provider_fn("thumbnail", |data: Option<DataSource>| {
        let data = data.context("no image")?;
        let mut bytes = data.into_bytes();
        bytes.reverse();
        Ok(Some(DataSource::new("image/png", bytes)))
    });
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("thumbnail").with_binding(SOAP11_HTTP_MTOM_BINDING),
        Arc::new(ExecutorRegistry::new()),
    );

    // Corps encodé avec une référence xop:Include, reçu sans le drapeau MTOM
    let mut request = Envelope::new(Protocol::Soap11);
    request.set_mtom_enabled(true);
    let body = ConverterFactory::new()
        .for_type(PayloadType::DataSource)
        .encode(
            Payload::Data(DataSource::new("image/png", vec![1, 2, 3])),
            &mut request,
        )
        .unwrap();
    request.set_body(body);
    request.set_mtom_enabled(false);

    let response = dispatcher.invoke(DispatchRequest::new(request));

    assert!(!response.is_fault(), "{:?}", response.fault_value());
    assert!(response.is_mtom_enabled());
    assert_eq!(response.attachments().len(), 1);

    let decoded = ConverterFactory::new()
        .for_type(PayloadType::DataSource)
        .decode(response.body().unwrap(), &response)
        .unwrap();
    assert_eq!(decoded, Payload::Data(DataSource::new("image/png", vec![3, 2, 1])));
}

#[test]
fn test_message_mode_mtom_echo_keeps_attachment() {
    let provider = provider_fn("archive", |data: Option<DataSource>| Ok(data));
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("archive")
            .with_mode(ServiceMode::Message)
            .with_binding(SOAP11_HTTP_MTOM_BINDING),
        Arc::new(ExecutorRegistry::new()),
    );

    let converter = ConverterFactory::new().for_type(PayloadType::DataSource);
    let image = DataSource::new("image/png", vec![0x89, b'P', b'N', b'G', 7]);
    let mut request = Envelope::new(Protocol::Soap11);
    request.set_mtom_enabled(true);
    let body = converter
        .encode(Payload::Data(image.clone()), &mut request)
        .unwrap();
    request.set_body(body);

    let response = dispatcher.invoke(DispatchRequest::new(request));

    assert!(!response.is_fault(), "{:?}", response.fault_value());
    assert!(response.is_mtom_enabled());
    assert_eq!(response.attachments().len(), 1);
    let decoded = converter.decode(response.body().unwrap(), &response).unwrap();
    assert_eq!(decoded, Payload::Data(image));
}

#[test]
fn test_plain_binding_inlines_binary() {
    let provider = provider_fn("echo", |data: Option<DataSource>| Ok(data));
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("echo").with_binding(SOAP11_HTTP_BINDING),
        Arc::new(ExecutorRegistry::new()),
    );

    let mut request = Envelope::new(Protocol::Soap11);
    let body = ConverterFactory::new()
        .for_type(PayloadType::DataSource)
        .encode(
            Payload::Data(DataSource::new("text/plain", b"inline".to_vec())),
            &mut request,
        )
        .unwrap();
    request.set_body(body);

    let response = dispatcher.invoke(DispatchRequest::new(request));
    assert!(!response.is_mtom_enabled());
    assert!(response.attachments().is_empty());
    assert!(response.to_xml().unwrap().contains("aW5saW5l"));
}

// ============================================================================
// Invocation one-way
// ============================================================================

#[test]
fn test_one_way_failure_goes_to_observer() {
    let provider = provider_fn("sink", |_: Option<String>| -> anyhow::Result<Option<String>> {
        anyhow::bail!("queue closed")
    });
    let observer = Arc::new(RecordingObserver::default());
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("notify"),
        registry_with(Arc::new(InlineExecutor)),
    )
    .with_observer(observer.clone());

    let handle = dispatcher.invoke_one_way(text_request("event"));

    assert_eq!(handle.status(), TaskStatus::Failed("queue closed".to_string()));
    let failures = observer.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "notify");
    assert_eq!(failures[0].1.root_cause().origin(), &FailureOrigin::Handler);
}

#[test]
fn test_one_way_preamble_failure_goes_to_observer() {
    let provider = provider_fn("tree", |source: Option<Source>| Ok(source));
    let observer = Arc::new(RecordingObserver::default());
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("tree"),
        registry_with(Arc::new(InlineExecutor)),
    )
    .with_observer(observer.clone());

    let handle = dispatcher.invoke_one_way(text_request("not a tree"));

    assert!(matches!(handle.status(), TaskStatus::Failed(_)));
    assert_eq!(observer.failures.lock().unwrap().len(), 1);
}

#[test]
fn test_one_way_returns_before_completion() {
    let (release, gate) = mpsc::channel::<()>();
    let gate = Mutex::new(gate);
    let provider = provider_fn("slow", move |_: Option<String>| {
        gate.lock().unwrap().recv_timeout(WAIT)?;
        Ok(None)
    });
    let executor = PooledExecutor::new(2, "pmosoap-test").unwrap();
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("slow"),
        registry_with(Arc::new(executor)),
    );

    let handle = dispatcher.invoke_one_way(text_request("x"));
    assert!(!handle.is_finished());

    release.send(()).unwrap();
    assert_eq!(handle.wait_timeout(WAIT), TaskStatus::Completed);
}

#[test]
fn test_disable_thread_switch_runs_inline() {
    let greeter = Arc::new(Greeter::default());
    let executor = PooledExecutor::new(1, "pmosoap-test").unwrap();
    let dispatcher = dispatcher_for(
        Arc::new(TypedProvider::new(SharedGreeter(greeter.clone()))),
        EndpointDescription::new("greet"),
        registry_with(Arc::new(executor)),
    );

    let handle = dispatcher
        .invoke_one_way(text_request("inline").with_property(SERVER_DISABLE_THREAD_SWITCH, true));
    // Exécuté dans l'appel : déjà terminé au retour
    assert_eq!(handle.status(), TaskStatus::Completed);

    let handle = dispatcher.invoke_one_way(text_request("pooled"));
    assert_eq!(handle.wait_timeout(WAIT), TaskStatus::Completed);

    let threads = greeter.threads.lock().unwrap();
    assert_eq!(threads[0], thread::current().id());
    assert_ne!(threads[1], thread::current().id());
}

#[test]
fn test_cancelled_one_way_never_runs() {
    let greeter = Arc::new(Greeter::default());
    let executor = Arc::new(DeferredExecutor::default());
    let dispatcher = dispatcher_for(
        Arc::new(TypedProvider::new(SharedGreeter(greeter.clone()))),
        EndpointDescription::new("greet"),
        registry_with(executor.clone()),
    );

    let cancelled = dispatcher.invoke_one_way(text_request("first"));
    let kept = dispatcher.invoke_one_way(text_request("second"));
    assert_eq!(cancelled.status(), TaskStatus::Pending);

    assert!(cancelled.cancel());
    executor.run_all();

    assert_eq!(cancelled.status(), TaskStatus::Cancelled);
    assert_eq!(kept.status(), TaskStatus::Completed);
    assert!(!kept.cancel());
    assert_eq!(
        *greeter.inputs.lock().unwrap(),
        vec![Some("second".to_string())]
    );
}

// ============================================================================
// Invocation asynchrone
// ============================================================================

#[test]
fn test_async_success_on_pooled_thread() {
    let executor = PooledExecutor::new(2, "pmosoap-test").unwrap();
    let dispatcher = dispatcher_for(
        Arc::new(TypedProvider::new(SharedGreeter(Arc::new(Greeter::default())))),
        EndpointDescription::new("greet"),
        registry_with(Arc::new(executor)),
    );
    let callback = Arc::new(RecordingCallback::default());

    let handle = dispatcher.invoke_async(text_request("hello"), callback.clone());
    assert_eq!(handle.wait_timeout(WAIT), TaskStatus::Completed);

    let successes = callback.successes.lock().unwrap();
    assert_eq!(successes.len(), 1);
    let (value, response, thread_id) = &successes[0];
    assert_eq!(value, &Some(Payload::Text("hello world".to_string())));
    assert_eq!(decode_text(response), Payload::Text("hello world".to_string()));
    assert_ne!(*thread_id, thread::current().id());
    assert!(callback.failures.lock().unwrap().is_empty());
}

#[test]
fn test_async_failure_delivers_root_cause() {
    let provider = provider_fn("broken", |_: Option<String>| -> anyhow::Result<Option<String>> {
        Err(anyhow::anyhow!("connection refused")).context("calling backend")
    });
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("broken"),
        registry_with(Arc::new(InlineExecutor)),
    );
    let callback = Arc::new(RecordingCallback::default());

    let handle = dispatcher.invoke_async(
        text_request("x").with_property(SERVER_DISABLE_THREAD_SWITCH, "true"),
        callback.clone(),
    );
    assert_eq!(
        handle.status(),
        TaskStatus::Failed("connection refused".to_string())
    );

    let failures = callback.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    let (root_cause, fault, thread_id) = &failures[0];
    assert_eq!(root_cause.message(), "connection refused");
    assert_eq!(fault.fault_value().unwrap().reason, "connection refused");
    assert_eq!(*thread_id, thread::current().id());
    assert!(callback.successes.lock().unwrap().is_empty());
}

#[test]
fn test_async_preamble_failure_on_calling_thread() {
    let provider = provider_fn("tree", |source: Option<Source>| Ok(source));
    let executor = Arc::new(DeferredExecutor::default());
    let dispatcher = dispatcher_for(
        Arc::new(provider),
        EndpointDescription::new("tree"),
        registry_with(executor.clone()),
    );
    let callback = Arc::new(RecordingCallback::default());

    let handle = dispatcher.invoke_async(text_request("not a tree"), callback.clone());

    assert!(matches!(handle.status(), TaskStatus::Failed(_)));
    assert!(executor.queue.lock().unwrap().is_empty());
    let failures = callback.failures.lock().unwrap();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].0.origin(), FailureOrigin::Dispatch(_)));
    assert_eq!(failures[0].1.fault_value().unwrap().code, FaultCode::Client);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_on_ambient_runtime() {
    let executor = PooledExecutor::from_handle(tokio::runtime::Handle::current());
    let dispatcher = dispatcher_for(
        Arc::new(TypedProvider::new(SharedGreeter(Arc::new(Greeter::default())))),
        EndpointDescription::new("greet"),
        registry_with(Arc::new(executor)),
    );

    struct Forward(Mutex<Option<tokio::sync::oneshot::Sender<Option<Payload>>>>);

    impl EndpointCallback for Forward {
        fn on_success(&self, value: Option<Payload>, _response: Envelope) {
            if let Some(tx) = self.0.lock().unwrap().take() {
                let _ = tx.send(value);
            }
        }

        fn on_failure(&self, _root_cause: RootCause, _fault: Envelope) {
            self.0.lock().unwrap().take();
        }
    }

    let (tx, rx) = tokio::sync::oneshot::channel();
    dispatcher.invoke_async(text_request("hello"), Arc::new(Forward(Mutex::new(Some(tx)))));

    let value = tokio::time::timeout(WAIT, rx).await.unwrap().unwrap();
    assert_eq!(value, Some(Payload::Text("hello world".to_string())));
}
