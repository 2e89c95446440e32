//! Tests for Template

use crate::{Event, Template, TemplateError};

fn event() -> Event {
    Event::from_json(br#"{"event_type":"page","ctx":{"app":"web","n":3}}"#).unwrap()
}

#[test]
fn test_constant_template() {
    let t = Template::parse("events").unwrap();
    assert!(t.is_constant());
    assert_eq!(t.render(&event()).unwrap(), "events");
}

#[test]
fn test_render_fields() {
    let t = Template::parse("{{ .event_type }}_{{.ctx.app}}_{{ .ctx.n }}").unwrap();
    assert!(!t.is_constant());
    assert_eq!(t.render(&event()).unwrap(), "page_web_3");
}

#[test]
fn test_url_template() {
    let t = Template::parse("https://api.example.com/{{ .ctx.app }}/track?type={{ .event_type }}")
        .unwrap();
    assert_eq!(
        t.render(&event()).unwrap(),
        "https://api.example.com/web/track?type=page"
    );
}

#[test]
fn test_missing_field_is_typed_error() {
    let t = Template::parse("{{ .ctx.missing }}").unwrap();
    assert_eq!(
        t.render(&event()).unwrap_err(),
        TemplateError::missing_field("ctx.missing")
    );
}

#[test]
fn test_parse_errors() {
    assert_eq!(
        Template::parse("abc{{ .x").unwrap_err(),
        TemplateError::Unclosed { position: 3 }
    );
    assert!(matches!(
        Template::parse("{{ x }}").unwrap_err(),
        TemplateError::InvalidExpression { .. }
    ));
    assert!(matches!(
        Template::parse("{{ .a..b }}").unwrap_err(),
        TemplateError::InvalidExpression { .. }
    ));
}
