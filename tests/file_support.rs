//! Multi-format loading through the public library API: every supported
//! extension yields text, unsupported and corrupt files are isolated, and
//! loaded documents flow through chunking and retrieval.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use qa_harness::config::Config;
use qa_harness::embedding::HashProvider;
use qa_harness::error::LoadError;
use qa_harness::ingest::{ingest_files, IngestStatus};
use qa_harness::loader::ParserRegistry;
use qa_harness::session::SessionId;
use qa_harness::store::memory::InMemoryIndex;
use qa_harness::store::VectorStore;

/// One-page PDF whose only content is `phrase` in a base-14 font.
fn pdf_with_phrase(phrase: &str) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(phrase)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn every_text_format_yields_content() {
    let dir = TempDir::new().unwrap();
    let registry = ParserRegistry::with_builtins();

    let cases = [
        ("guide.md", &b"# Guide\n\nUse **SAVE10** at checkout."[..], "SAVE10"),
        (
            "page.html",
            &b"<html><head><style>p{}</style></head><body><p>Checkout page</p></body></html>"[..],
            "Checkout page",
        ),
        ("notes.txt", &b"plain notes"[..], "plain notes"),
        ("data.json", &br#"{"rule": "codes expire"}"#[..], "codes expire"),
    ];

    for (name, content, needle) in cases {
        let path = write(&dir, name, content);
        let doc = registry.load(&path).unwrap();
        assert!(doc.text.contains(needle), "{}: {:?}", name, doc.text);
        assert_eq!(doc.file_name, name);
    }
}

#[tokio::test]
async fn valid_pdf_yields_text_and_is_retrievable() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "requirements.pdf",
        &pdf_with_phrase("Refunds require manager approval"),
    );

    let doc = ParserRegistry::with_builtins().load(&path).unwrap();
    assert!(
        doc.text.contains("Refunds require manager approval"),
        "pdf text: {:?}",
        doc.text
    );
    assert_eq!(doc.file_name, "requirements.pdf");

    let notes = write(&dir, "notes.txt", b"Shipping is free above fifty dollars.");
    let store = VectorStore::new(
        Arc::new(HashProvider::new(HashProvider::DEFAULT_DIMS)),
        Arc::new(InMemoryIndex::new()),
        8,
    );
    let session = SessionId::parse("pdf-session").unwrap();
    let outcome = ingest_files(&store, &Config::default(), &session, vec![notes, path]).await;
    assert_eq!(outcome.status, IngestStatus::Success);
    assert_eq!(outcome.chunks, Some(2));

    let hits = store
        .similarity_search(&session.collection_name(), "refunds manager approval", 1)
        .await
        .unwrap();
    assert_eq!(hits[0].file_name, "requirements.pdf");
    assert!(hits[0].text.contains("manager approval"));
}

#[test]
fn markdown_markup_is_removed() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "rules.md", b"## Rules\n\n- **Bold** item\n- [link](http://x)\n");
    let doc = ParserRegistry::with_builtins().load(&path).unwrap();
    assert!(doc.text.contains("Bold item"));
    assert!(doc.text.contains("link"));
    assert!(!doc.text.contains("**"));
    assert!(!doc.text.contains("http://x"));
}

#[test]
fn unsupported_extension_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "tool.exe", b"MZ");
    match ParserRegistry::with_builtins().load(&path) {
        Err(LoadError::UnsupportedFormat { extension, .. }) => assert_eq!(extension, ".exe"),
        other => panic!("expected UnsupportedFormat, got {:?}", other),
    }
}

#[test]
fn corrupt_pdf_does_not_sink_the_batch() {
    let dir = TempDir::new().unwrap();
    let bad = write(&dir, "broken.pdf", b"not a valid pdf");
    let good = write(&dir, "ok.txt", b"still here");

    let report = ParserRegistry::with_builtins().load_all(&[bad, good]);
    assert_eq!(report.documents.len(), 1);
    assert_eq!(report.documents[0].file_name, "ok.txt");
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0], LoadError::Parse { .. }));
}

#[tokio::test]
async fn long_document_is_chunked_and_retrievable() {
    let dir = TempDir::new().unwrap();
    let mut body = String::new();
    for i in 0..60 {
        body.push_str(&format!("Paragraph {} covers shipping rule {}.\n\n", i, i));
    }
    body.push_str("Discount codes must reduce total by the coded percentage.\n");
    let path = write(&dir, "handbook.md", body.as_bytes());

    let store = VectorStore::new(
        Arc::new(HashProvider::new(HashProvider::DEFAULT_DIMS)),
        Arc::new(InMemoryIndex::new()),
        8,
    );
    let session = SessionId::parse("handbook").unwrap();
    let outcome = ingest_files(&store, &Config::default(), &session, vec![path]).await;
    assert_eq!(outcome.status, IngestStatus::Success);
    assert!(outcome.chunks.unwrap() > 1);

    let hits = store
        .similarity_search(&session.collection_name(), "discount codes coded percentage", 1)
        .await
        .unwrap();
    assert!(hits[0].text.contains("Discount codes must reduce"));
    assert_eq!(hits[0].file_name, "handbook.md");
}
