mod common;

use common::{ContextEchoChat, WordHashEmbedder, small_settings};
use lopdf::{
    Object, Stream,
    content::{Content, Operation},
    dictionary,
};
use pdfchat::{
    extract::{Document, PdfTextExtractor, TextExtractor, extract},
    processing::ProcessingService,
    session::Session,
};
use std::sync::Arc;

/// Build a PDF with one line of Helvetica text per page.
fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for line in lines {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

#[test]
fn extracts_text_page_by_page() {
    let bytes = pdf_with_pages(&["Crumbville lies on the river.", "It was founded in 1850."]);
    let pages = PdfTextExtractor
        .extract_pages(&Document::new("town.pdf", bytes))
        .expect("readable pdf");

    assert_eq!(pages.len(), 2);
    assert!(pages[0].contains("Crumbville"));
    assert!(pages[1].contains("1850"));
}

#[test]
fn concatenates_documents_in_upload_order() {
    let first = Document::new("first.pdf", pdf_with_pages(&["Alpha page"]));
    let second = Document::new("second.pdf", pdf_with_pages(&["Omega page"]));

    let text = extract(&PdfTextExtractor, &[first, second]).expect("readable pdfs");
    let alpha = text.find("Alpha").expect("first document text");
    let omega = text.find("Omega").expect("second document text");
    assert!(alpha < omega);
}

#[tokio::test]
async fn real_pdf_flows_through_the_session() {
    let service = ProcessingService::new(
        Arc::new(WordHashEmbedder::default()),
        Arc::new(ContextEchoChat::default()),
        small_settings(),
    );
    let mut session = Session::new(Arc::new(service));

    let bytes = pdf_with_pages(&["Crumbville lies on the river."]);
    let outcome = session
        .process(vec![Document::new("town.pdf", bytes)])
        .await
        .expect("process pdf");
    assert_eq!(outcome.document_count, 1);
    assert!(outcome.chunk_count >= 1);

    let index = session.index().expect("index");
    assert!(index.chunks().any(|chunk| chunk.text.contains("Crumbville")));
}
