//! PDF encoding of a paginated layout
//!
//! Text is set in the standard Helvetica faces with WinAnsi encoding, so
//! no fonts are embedded. Characters outside WinAnsi print as `?`.

use super::pages::{PagedDocument, TextRun};
use crate::error::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

const REGULAR_FONT: &str = "F1";
const BOLD_FONT: &str = "F2";

/// Encode `layout` as PDF bytes.
pub fn encode_pdf(layout: &PagedDocument) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(font("Helvetica"));
    let bold_id = doc.add_object(font("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR_FONT => regular_id,
            BOLD_FONT => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for page in &layout.pages {
        let content: Content<Vec<Operation>> = Content {
            operations: page
                .runs
                .iter()
                .flat_map(|run| text_operations(run, layout.height))
                .collect(),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                units(layout.width).into(),
                units(layout.height).into(),
            ],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// PDF space has its origin at the bottom left.
fn text_operations(run: &TextRun, page_height: f32) -> Vec<Operation> {
    let font = if run.bold { BOLD_FONT } else { REGULAR_FONT };
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), units(run.size).into()]),
        Operation::new(
            "Td",
            vec![units(run.x).into(), units(page_height - run.y).into()],
        ),
        Operation::new(
            "Tj",
            vec![Object::String(win_ansi(&run.text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// Round to whole layout units so output does not depend on float printing.
fn units(value: f32) -> i64 {
    value.round() as i64
}

fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '€' => 0x80,
            c if (c as u32) < 0x80 => c as u8,
            c if (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => b'?',
        })
        .collect()
}
