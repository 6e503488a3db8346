use pretty_assertions::assert_eq;
use spinner_core::JobId;
use spinner_engine::{ElementSpec, EndpointError, Page, Placeholder};
use url::Url;

const REPORT: &str = r#"<!DOCTYPE html>
<html><head><link id="ws_url" href="/ws/"></head>
<body>
<table><tr>
<td><updating-spinner data-run="a/b/c/d" href="/runs/a/b/c/d/icon/">…</updating-spinner></td>
<td><updating-spinner data-run="e/f/g/h" href="/runs/e/f/g/h/icon/" class="big">…</updating-spinner></td>
</tr></table>
<updating-spinner>no job, not a placeholder</updating-spinner>
</body></html>"#;

fn page(source: &str) -> Page {
    Page::parse(
        source,
        Some(Url::parse("http://localhost:5000/report/").unwrap()),
        ElementSpec::default(),
    )
}

#[test]
fn discovers_placeholders_in_document_order_once() {
    let mut page = page(REPORT);

    let found = page.discover();
    assert_eq!(
        found,
        vec![
            Placeholder {
                id: 1,
                job: JobId::from("a/b/c/d"),
                href: Some("/runs/a/b/c/d/icon/".to_string()),
            },
            Placeholder {
                id: 2,
                job: JobId::from("e/f/g/h"),
                href: Some("/runs/e/f/g/h/icon/".to_string()),
            },
        ]
    );
    assert!(page.discover().is_empty());
}

#[test]
fn endpoint_is_resolved_and_mapped_to_websocket_scheme() {
    let page = page(REPORT);
    let url = page.endpoint_url("ws_url").unwrap();
    assert_eq!(url.as_str(), "ws://localhost:5000/ws/");

    let secure = Page::parse(
        r#"<a id="ws_url" href="https://example.com/ws/"></a>"#,
        None,
        ElementSpec::default(),
    );
    assert_eq!(
        secure.endpoint_url("ws_url").unwrap().as_str(),
        "wss://example.com/ws/"
    );
}

#[test]
fn endpoint_errors_are_specific() {
    let page = page("<p>nothing here</p>");
    assert_eq!(
        page.endpoint_url("ws_url"),
        Err(EndpointError::MissingLink("ws_url".to_string()))
    );

    let page = Page::parse(r#"<a id="ws_url">x</a>"#, None, ElementSpec::default());
    assert_eq!(
        page.endpoint_url("ws_url"),
        Err(EndpointError::MissingHref("ws_url".to_string()))
    );

    let page = Page::parse(r#"<a id="ws_url" href="/ws/">x</a>"#, None, ElementSpec::default());
    assert!(matches!(
        page.endpoint_url("ws_url"),
        Err(EndpointError::Unresolvable { .. })
    ));

    let page = Page::parse(
        r#"<a id="ws_url" href="ftp://example.com/ws">x</a>"#,
        None,
        ElementSpec::default(),
    );
    assert_eq!(
        page.endpoint_url("ws_url"),
        Err(EndpointError::UnsupportedScheme("ftp".to_string()))
    );
}

#[test]
fn base_element_refines_document_location() {
    let page = Page::parse(
        r#"<html><head><base href="/app/"></head><body></body></html>"#,
        Some(Url::parse("http://localhost:5000/index.html").unwrap()),
        ElementSpec::default(),
    );
    assert_eq!(
        page.resolve("runs/1/").unwrap().as_str(),
        "http://localhost:5000/app/runs/1/"
    );
}

#[test]
fn pending_marker_is_rendered_as_class() {
    let mut page = page(REPORT);
    page.discover();

    page.mark_pending(1);
    page.mark_pending(2);
    let html = page.to_html();
    assert!(html.contains(r#"class="spinning""#));
    assert!(html.contains(r#"class="big spinning""#));
    assert!(page.is_marked(1));

    page.clear_pending(1);
    assert!(!page.is_marked(1));
    let html = page.to_html();
    assert!(!html.contains(r#"class="spinning""#));
    assert!(html.contains(r#"class="big spinning""#));
}

#[test]
fn replace_swaps_element_for_fragment() {
    let mut page = page(REPORT);
    page.discover();

    let outcome = page.replace(1, "<div>done</div>");
    assert!(outcome.replaced);
    assert!(outcome.removed.is_empty());
    assert!(outcome.inserted.is_empty());
    assert!(!page.is_attached(1));
    assert!(page.is_attached(2));

    let html = page.to_html();
    assert!(html.contains("<td><div>done</div></td>"));
    assert!(!html.contains("a/b/c/d"));
}

#[test]
fn replacing_a_detached_element_is_a_noop() {
    let mut page = page(REPORT);
    page.discover();

    assert!(page.replace(2, "⁉️").replaced);
    let before = page.to_html();

    let second = page.replace(2, "<b>late</b>");
    assert!(!second.replaced);
    assert_eq!(page.to_html(), before);
    assert!(before.contains("<td>⁉️</td>"));
}

#[test]
fn nested_placeholders_are_reported_both_ways() {
    let mut page = page(
        r#"<body><updating-spinner data-run="outer" href="/o">
            <updating-spinner data-run="inner" href="/i"></updating-spinner>
        </updating-spinner></body>"#,
    );
    let found = page.discover();
    assert_eq!(found.len(), 2);

    let outcome = page.replace(
        1,
        r#"<section><updating-spinner data-run="next" href="/n"></updating-spinner></section>"#,
    );
    assert_eq!(outcome.removed, vec![2]);
    assert_eq!(
        outcome.inserted,
        vec![Placeholder {
            id: 3,
            job: JobId::from("next"),
            href: Some("/n".to_string()),
        }]
    );
    assert!(page.is_attached(3));
    assert!(!page.is_attached(2));
}

#[test]
fn serializer_escapes_text_and_attributes_but_not_scripts() {
    let page = Page::parse(
        r#"<p title="a &quot;b&quot;">1 &lt; 2 &amp; 3</p><script>if (a < b) {}</script><br>"#,
        None,
        ElementSpec::default(),
    );
    let html = page.to_html();
    assert!(html.contains(r#"<p title="a &quot;b&quot;">1 &lt; 2 &amp; 3</p>"#));
    assert!(html.contains("<script>if (a < b) {}</script>"));
    assert!(html.contains("<br>"));
    assert!(!html.contains("</br>"));
}

#[test]
fn custom_element_spec_is_honored() {
    let spec = ElementSpec {
        tag_name: "deferred-box".to_string(),
        job_attribute: "data-job".to_string(),
        href_attribute: "data-src".to_string(),
        pending_class: "busy".to_string(),
    };
    let mut page = Page::parse(
        r#"<deferred-box data-job="x" data-src="/x"></deferred-box><updating-spinner data-run="y"></updating-spinner>"#,
        None,
        spec,
    );

    let found = page.discover();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].job, JobId::from("x"));
    assert_eq!(found[0].href.as_deref(), Some("/x"));

    page.mark_pending(found[0].id);
    assert!(page.to_html().contains(r#"class="busy""#));
}

#[test]
fn untracked_elements_can_be_swept() {
    let mut page = page(
        r#"<body><updating-spinner data-run="tracked" href="/t">…</updating-spinner>
        <div><updating-spinner>outer<updating-spinner>inner</updating-spinner></updating-spinner></div></body>"#,
    );
    assert_eq!(page.discover().len(), 1);

    assert_eq!(page.replace_unregistered("⁉️"), 1);
    assert!(page.is_attached(1));
    let html = page.to_html();
    assert!(html.contains("<div>⁉️</div>"));
    assert!(!html.contains("outer"));
    assert!(html.contains("tracked"));

    assert_eq!(page.replace_unregistered("⁉️"), 0);
}
