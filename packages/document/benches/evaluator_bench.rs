use criterion::{black_box, criterion_group, criterion_main, Criterion};
use xcap_document::{evaluate, parse_document};
use xcap_uri::{parse_node_selector, NamespaceBindings};

const RL: &str = "urn:ietf:params:xml:ns:resource-lists";

fn large_lists() -> String {
    let mut source = format!(r#"<resource-lists xmlns="{RL}">"#);
    for list in 0..50 {
        source.push_str(&format!(r#"<list name="list-{list}">"#));
        for entry in 0..40 {
            source.push_str(&format!(
                r#"<entry uri="sip:user{entry}@example.com"><display-name>User {entry}</display-name></entry>"#
            ));
        }
        source.push_str("</list>");
    }
    source.push_str("</resource-lists>");
    source
}

fn evaluate_by_attribute(c: &mut Criterion) {
    let tree = parse_document(&large_lists()).unwrap();
    let selector = parse_node_selector(
        r#"resource-lists/list[@name="list-42"]/entry[@uri="sip:user39@example.com"]/display-name"#,
        &NamespaceBindings::new(),
        RL,
    )
    .unwrap();

    c.bench_function("evaluate_by_attribute", |b| {
        b.iter(|| evaluate(black_box(&selector), black_box(&tree)))
    });
}

fn evaluate_insertion_point(c: &mut Criterion) {
    let tree = parse_document(&large_lists()).unwrap();
    let selector =
        parse_node_selector("resource-lists/list[50]/entry[41]", &NamespaceBindings::new(), RL)
            .unwrap();

    c.bench_function("evaluate_insertion_point", |b| {
        b.iter(|| evaluate(black_box(&selector), black_box(&tree)))
    });
}

fn parse_large_document(c: &mut Criterion) {
    let source = large_lists();

    c.bench_function("parse_large_document", |b| {
        b.iter(|| parse_document(black_box(&source)))
    });
}

criterion_group!(benches, evaluate_by_attribute, evaluate_insertion_point, parse_large_document);
criterion_main!(benches);
