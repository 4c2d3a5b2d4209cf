use pmosoap::soap::parse_envelope;
use pmosoap::{
    Body, ConverterFactory, DataSource, Envelope, FaultCode, Output, Payload, PayloadType,
    Protocol, RequestMarshaller, ResponseMarshaller, ServiceMode, SoapFault, Source,
};

/// Valeurs représentatives pour chaque type de payload
fn samples() -> Vec<Payload> {
    vec![
        Payload::Text("hello".to_string()),
        Payload::Source(Source::parse("<ns:ping xmlns:ns=\"urn:test\">1</ns:ping>").unwrap()),
        Payload::Data(DataSource::new("application/octet-stream", vec![0, 255, 10, 13])),
        Payload::Data(DataSource::new("text/plain", Vec::new())),
    ]
}

#[test]
fn test_body_round_trip_for_each_type() {
    let factory = ConverterFactory::new();

    for mtom in [false, true] {
        for value in samples() {
            let converter = factory.for_type(value.payload_type());
            let mut envelope = Envelope::new(Protocol::Soap11);
            envelope.set_mtom_enabled(mtom);

            let body = converter.encode(value.clone(), &mut envelope).unwrap();
            let decoded = converter.decode(&body, &envelope).unwrap();
            assert_eq!(decoded, value, "mtom={}", mtom);
        }
    }
}

#[test]
fn test_round_trip_through_wire_bytes() {
    let factory = ConverterFactory::new();

    for value in samples() {
        let converter = factory.for_type(value.payload_type());
        let mut envelope = Envelope::new(Protocol::Soap12);
        let body = converter.encode(value.clone(), &mut envelope).unwrap();
        envelope.set_body(body);

        let xml = envelope.to_xml().unwrap();
        let parsed = parse_envelope(xml.as_bytes()).unwrap();
        let decoded = match parsed.body() {
            Some(body) => converter.decode(body, &parsed).unwrap(),
            // Une valeur vide ne laisse pas de corps
            None => continue,
        };
        assert_eq!(decoded.payload_type(), value.payload_type());
        if let (Payload::Source(a), Payload::Source(b)) = (&decoded, &value) {
            assert_eq!(a.element().name, b.element().name);
            assert_eq!(a.element().children, b.element().children);
        } else {
            assert_eq!(decoded, value);
        }
    }
}

#[test]
fn test_null_inputs() {
    let marshaller = RequestMarshaller::default();

    for payload_type in PayloadType::ALL {
        let mut empty = Envelope::new(Protocol::Soap11);
        let input = marshaller
            .to_input(Some(&mut empty), ServiceMode::Message, payload_type, false)
            .unwrap();
        assert_eq!(input, None, "MESSAGE {}", payload_type);
    }

    for payload_type in [PayloadType::Text, PayloadType::Source, PayloadType::DataSource] {
        let mut fault = Envelope::fault(Protocol::Soap11, SoapFault::client("no body"));
        let input = marshaller
            .to_input(Some(&mut fault), ServiceMode::Payload, payload_type, false)
            .unwrap();
        assert_eq!(input, None, "PAYLOAD {}", payload_type);
    }
}

#[test]
fn test_response_decodes_back_in_both_modes() {
    let requests = RequestMarshaller::default();
    let responses = ResponseMarshaller::default();
    let value = Payload::Text("hello world".to_string());

    let mut envelope = responses
        .to_envelope(
            Output::Value(Some(value.clone())),
            ServiceMode::Payload,
            PayloadType::Text,
            Protocol::Soap11,
            false,
        )
        .unwrap();
    let decoded = requests
        .to_input(Some(&mut envelope), ServiceMode::Payload, PayloadType::Text, false)
        .unwrap();
    assert_eq!(decoded, Some(value));

    let message = Envelope::with_body(Protocol::Soap12, Body::from_text("whole"));
    let mut envelope = responses
        .to_envelope(
            Output::Value(Some(Payload::Message(message.clone()))),
            ServiceMode::Message,
            PayloadType::SoapMessage,
            Protocol::Soap12,
            false,
        )
        .unwrap();
    let decoded = requests
        .to_input(Some(&mut envelope), ServiceMode::Message, PayloadType::SoapMessage, false)
        .unwrap();
    assert_eq!(decoded, Some(Payload::Message(message)));
}

#[test]
fn test_data_source_message_mode_carries_whole_envelope() {
    let requests = RequestMarshaller::default();
    let responses = ResponseMarshaller::default();

    let mut request = Envelope::with_body(Protocol::Soap11, Body::from_text("raw"));
    let input = requests
        .to_input(Some(&mut request), ServiceMode::Message, PayloadType::DataSource, false)
        .unwrap()
        .unwrap();

    let Payload::Data(data) = &input else {
        panic!("expected a data source, got {:?}", input);
    };
    assert_eq!(data.content_type(), Protocol::Soap11.content_type());
    assert!(String::from_utf8_lossy(data.bytes()).contains("Envelope"));

    let response = responses
        .to_envelope(
            Output::Value(Some(input)),
            ServiceMode::Message,
            PayloadType::DataSource,
            Protocol::Soap11,
            false,
        )
        .unwrap();
    assert_eq!(response.body(), request.body());
}

#[test]
fn test_soap12_fault_from_wire() {
    let xml = r#"<?xml version="1.0"?>
<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope">
  <env:Body>
    <env:Fault>
      <env:Code><env:Value>env:Sender</env:Value></env:Code>
      <env:Reason><env:Text xml:lang="en">bad request</env:Text></env:Reason>
    </env:Fault>
  </env:Body>
</env:Envelope>"#;

    let envelope = parse_envelope(xml.as_bytes()).unwrap();
    assert_eq!(envelope.protocol(), Protocol::Soap12);
    let fault = envelope.fault_value().unwrap();
    assert_eq!(fault.code, FaultCode::Client);
    assert_eq!(fault.reason, "bad request");
}
