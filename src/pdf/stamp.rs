//! Drawing the watermark onto a page using lopdf
//!
//! The text is drawn by a Form XObject registered on each page. The page's
//! original content streams are bracketed in `q`/`Q` so a transformation the
//! original content leaves in effect cannot displace the watermark, and a
//! small content stream invoking the XObject is appended so it is painted on
//! top of everything else.

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use crate::error::{Error, Result};
use crate::layout::{text_width, PageBox, TextMatrix};

/// Watermarks longer than this do not fit diagonally on an A4 page at the
/// default font size.
pub const MAX_TEXT_LENGTH: usize = 28;

/// How the watermark is drawn. Fixed defaults; not exposed on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkStyle {
    /// Font size in points
    pub font_size: f32,
    /// Fill gray level (0 = black, 1 = white)
    pub gray: f32,
    /// Fill opacity (0 = invisible, 1 = opaque)
    pub opacity: f32,
    /// Counter-clockwise rotation of the text baseline
    pub angle_degrees: f32,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            font_size: 50.0,
            gray: 0.5,
            opacity: 0.6,
            angle_degrees: 45.0,
        }
    }
}

/// Validated watermark text together with its style
#[derive(Debug, Clone, PartialEq)]
pub struct Watermark {
    text: String,
    style: WatermarkStyle,
}

impl Watermark {
    /// Create a watermark with the default style
    ///
    /// The text must not be blank and must be shorter than
    /// [`MAX_TEXT_LENGTH`] characters, spaces included.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();

        if text.trim().is_empty() {
            return Err(Error::InvalidText("text must not be empty".to_string()));
        }

        let len = text.chars().count();
        if len >= MAX_TEXT_LENGTH {
            return Err(Error::InvalidText(format!(
                "text must be shorter than {} characters (got {})",
                MAX_TEXT_LENGTH, len
            )));
        }

        Ok(Self { text, style: WatermarkStyle::default() })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn style(&self) -> &WatermarkStyle {
        &self.style
    }
}

/// Objects shared by every stamped page of one document
#[derive(Debug, Clone, Copy)]
pub(crate) struct SharedResources {
    font_id: ObjectId,
    graphics_state_id: ObjectId,
}

impl SharedResources {
    pub(crate) fn create(doc: &mut Document, style: &WatermarkStyle) -> Self {
        Self {
            font_id: use_helvetica_font(doc),
            graphics_state_id: add_opacity_state(doc, style.opacity),
        }
    }
}

/// Stamp `watermark` onto one page
pub(crate) fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    watermark: &Watermark,
    shared: SharedResources,
) -> Result<()> {
    // Fail on a malformed page before anything is added to the document
    let page_box = page_media_box(doc, page_id)?;
    let resources = page_resources(doc, page_id)?;
    let existing_contents = content_references(doc, page_id)?;

    let content = generate_watermark_content(watermark, &page_box);
    let xobject_id = create_form_xobject(doc, content, &page_box, shared);
    let name = add_xobject_to_page_resources(doc, page_id, resources, xobject_id)?;

    if !existing_contents.is_empty() {
        // Close our own q plus any the original content leaves open
        let unclosed = unclosed_saves(doc, &existing_contents);
        let restore = b"Q\n".repeat(unclosed + 1);
        let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let restore_id = doc.add_object(Stream::new(Dictionary::new(), restore));
        prepend_content_to_page(doc, page_id, save_id)?;
        append_content_to_page(doc, page_id, restore_id)?;
    }

    let mut invoke = b"q\n/".to_vec();
    invoke.extend_from_slice(&name);
    invoke.extend_from_slice(b" Do\nQ\n");
    let invoke_id = doc.add_object(Stream::new(Dictionary::new(), invoke));
    append_content_to_page(doc, page_id, invoke_id)?;

    Ok(())
}

/// Use Helvetica (standard PDF font - no embedding needed)
fn use_helvetica_font(doc: &mut Document) -> ObjectId {
    let mut font = Dictionary::new();
    font.set("Type", Object::Name(b"Font".to_vec()));
    font.set("Subtype", Object::Name(b"Type1".to_vec()));
    font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
    font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));

    doc.add_object(Object::Dictionary(font))
}

/// Graphics state that sets fill and stroke opacity
fn add_opacity_state(doc: &mut Document, opacity: f32) -> ObjectId {
    let mut state = Dictionary::new();
    state.set("Type", Object::Name(b"ExtGState".to_vec()));
    state.set("ca", Object::Real(opacity));
    state.set("CA", Object::Real(opacity));

    doc.add_object(Object::Dictionary(state))
}

/// Generate the Form XObject content stream that draws the watermark text
fn generate_watermark_content(watermark: &Watermark, page: &PageBox) -> Vec<u8> {
    let style = watermark.style();
    let encoded = encode_win_ansi(watermark.text());
    let width = text_width(&encoded, style.font_size);
    let matrix = TextMatrix::centered(page, width, style.font_size, style.angle_degrees);

    let mut content = Vec::new();
    content.extend_from_slice(b"/GS1 gs\n");
    content.extend_from_slice(format!("{} g\n", style.gray).as_bytes());
    content.extend_from_slice(b"BT\n");
    content.extend_from_slice(format!("/F1 {} Tf\n", style.font_size).as_bytes());
    content.extend_from_slice(matrix.to_operator().as_bytes());
    content.push(b'\n');
    content.push(b'(');
    content.extend_from_slice(&escape_pdf_string(&encoded));
    content.extend_from_slice(b") Tj\nET\n");
    content
}

/// Encode text for a WinAnsiEncoding simple font
///
/// Printable ASCII and Latin-1 map directly; anything else becomes `?`.
pub(crate) fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Escape special characters in a PDF literal string
fn escape_pdf_string(bytes: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(bytes.len());
    for &b in bytes {
        if matches!(b, b'(' | b')' | b'\\') {
            escaped.push(b'\\');
        }
        escaped.push(b);
    }
    escaped
}

/// Create a Form XObject covering the page with the watermark content
fn create_form_xobject(
    doc: &mut Document,
    content: Vec<u8>,
    page: &PageBox,
    shared: SharedResources,
) -> ObjectId {
    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(shared.font_id));
    let mut states = Dictionary::new();
    states.set("GS1", Object::Reference(shared.graphics_state_id));

    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));
    resources.set("ExtGState", Object::Dictionary(states));

    let mut xobject_dict = Dictionary::new();
    xobject_dict.set("Type", Object::Name(b"XObject".to_vec()));
    xobject_dict.set("Subtype", Object::Name(b"Form".to_vec()));
    xobject_dict.set("FormType", Object::Integer(1));
    xobject_dict.set("BBox", Object::Array(page.to_array()));
    xobject_dict.set("Resources", Object::Dictionary(resources));

    doc.add_object(Object::Stream(Stream::new(xobject_dict, content)))
}

/// Look up a page attribute, following the Parent chain for inheritable keys
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Result<Option<Object>> {
    let mut node = doc.get_dictionary(page_id)?;

    // Guards against Parent cycles in broken page trees
    for _ in 0..64 {
        if let Ok(value) = node.get(key) {
            return Ok(Some(value.clone()));
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => node = doc.get_dictionary(*parent_id)?,
            _ => return Ok(None),
        }
    }

    Err(Error::General("page tree is too deep or cyclic".to_string()))
}

/// Dereference an object if it is a reference
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// The page's MediaBox, inherited if needed, US Letter if declared nowhere
fn page_media_box(doc: &Document, page_id: ObjectId) -> Result<PageBox> {
    match inherited_attribute(doc, page_id, b"MediaBox")? {
        Some(obj) => {
            let array = resolve(doc, &obj)?
                .as_array()
                .map_err(|_| Error::General("MediaBox is not an array".to_string()))?;
            PageBox::from_array(array)
        }
        None => Ok(PageBox::letter()),
    }
}

/// A copy of the page's effective Resources dictionary
fn page_resources(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    match inherited_attribute(doc, page_id, b"Resources")? {
        Some(obj) => match resolve(doc, &obj)? {
            Object::Dictionary(dict) => Ok(dict.clone()),
            _ => Err(Error::General("Resources is not a dictionary".to_string())),
        },
        None => Ok(Dictionary::new()),
    }
}

/// References to the page's content streams
///
/// A Contents reference to an array of streams is flattened into the array's
/// elements, since an array may not itself appear inside Contents.
fn content_references(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>> {
    let page_dict = doc.get_dictionary(page_id)?;

    match page_dict.get(b"Contents") {
        Err(_) | Ok(Object::Null) => Ok(vec![]),
        Ok(Object::Reference(id)) => match doc.get_object(*id)? {
            Object::Stream(_) => Ok(vec![Object::Reference(*id)]),
            Object::Array(arr) => Ok(arr.clone()),
            other => Err(Error::General(format!(
                "Contents must refer to a stream or an array, found {:?}",
                other
            ))),
        },
        Ok(Object::Array(arr)) => Ok(arr.clone()),
        Ok(other) => Err(Error::General(format!(
            "Contents must be a reference or an array, found {:?}",
            other
        ))),
    }
}

/// Number of `q` operators the content streams leave without a matching `Q`
///
/// Content that cannot be decoded counts as balanced.
fn unclosed_saves(doc: &Document, contents: &[Object]) -> usize {
    let mut bytes = Vec::new();
    for obj in contents {
        let Ok(id) = obj.as_reference() else { continue };
        if let Ok(Object::Stream(stream)) = doc.get_object(id) {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            bytes.extend_from_slice(&data);
            bytes.push(b'\n');
        }
    }

    let content = match Content::decode(&bytes) {
        Ok(content) => content,
        Err(_) => return 0,
    };

    content
        .operations
        .iter()
        .fold(0usize, |depth, op| match op.operator.as_str() {
            "q" => depth + 1,
            "Q" => depth.saturating_sub(1),
            _ => depth,
        })
}

/// Register the XObject on the page under a name not already in use
///
/// Returns the chosen name. The effective Resources (possibly inherited) are
/// set directly on the page so the page owns its own copy.
fn add_xobject_to_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    mut resources: Dictionary,
    xobject_id: ObjectId,
) -> Result<Vec<u8>> {
    let mut xobjects = match resources.get(b"XObject") {
        Ok(obj) => match resolve(doc, obj)? {
            Object::Dictionary(dict) => dict.clone(),
            _ => return Err(Error::General("XObject resources are not a dictionary".to_string())),
        },
        Err(_) => Dictionary::new(),
    };

    let name = (1..)
        .map(|n| format!("Watermark{}", n).into_bytes())
        .find(|candidate| !xobjects.has(candidate))
        .unwrap_or_else(|| b"Watermark".to_vec());

    xobjects.set(name.clone(), Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Resources", Object::Dictionary(resources));

    Ok(name)
}

/// Prepend a content stream to a page's Contents
fn prepend_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut contents = content_references(doc, page_id)?;
    contents.insert(0, Object::Reference(new_content_id));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Array(contents));
    Ok(())
}

/// Append a content stream to a page's Contents
///
/// Appended content is drawn after the original, so the watermark is painted
/// on top rather than hidden under background fills.
fn append_content_to_page(doc: &mut Document, page_id: ObjectId, new_content_id: ObjectId) -> Result<()> {
    let mut contents = content_references(doc, page_id)?;
    contents.push(Object::Reference(new_content_id));

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page_dict.set("Contents", Object::Array(contents));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn single_page_doc(page: Dictionary) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(page);
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Parent", Object::Reference(pages_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => dictionary! { "Type" => "Font" } },
                },
            }),
        );
        (doc, page_id)
    }

    fn stamp(doc: &mut Document, page_id: ObjectId, text: &str) -> Result<()> {
        let watermark = Watermark::new(text).unwrap();
        let shared = SharedResources::create(doc, watermark.style());
        stamp_page(doc, page_id, &watermark, shared)
    }

    #[test]
    fn test_watermark_text_validation() {
        assert!(Watermark::new("CONFIDENTIAL").is_ok());
        assert!(matches!(Watermark::new(""), Err(Error::InvalidText(_))));
        assert!(matches!(Watermark::new("   "), Err(Error::InvalidText(_))));
        assert!(Watermark::new("a".repeat(MAX_TEXT_LENGTH - 1)).is_ok());
        assert!(matches!(
            Watermark::new("a".repeat(MAX_TEXT_LENGTH)),
            Err(Error::InvalidText(_))
        ));
    }

    #[test]
    fn test_encode_and_escape() {
        assert_eq!(encode_win_ansi("Café ✓"), b"Caf\xe9 ?".to_vec());
        assert_eq!(escape_pdf_string(b"a(b)c\\"), b"a\\(b\\)c\\\\".to_vec());
    }

    #[test]
    fn test_content_draws_escaped_text_with_style() {
        let watermark = Watermark::new("DRAFT (v2)").unwrap();
        let content = generate_watermark_content(&watermark, &PageBox::letter());
        let content = String::from_utf8(content).unwrap();

        assert!(content.contains("/GS1 gs"));
        assert!(content.contains("0.5 g"));
        assert!(content.contains("/F1 50 Tf"));
        assert!(content.contains(" Tm\n"));
        assert!(content.contains("(DRAFT \\(v2\\)) Tj"));
    }

    #[test]
    fn test_inherited_media_box_and_resources_are_used() {
        let (mut doc, page_id) = single_page_doc(dictionary! { "Type" => "Page" });

        assert_eq!(page_media_box(&doc, page_id).unwrap(), PageBox::a4());

        stamp(&mut doc, page_id, "COPY").unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        // Inherited font survives on the page's own Resources copy
        assert!(resources.get(b"Font").unwrap().as_dict().unwrap().has(b"F1"));
        assert!(resources.get(b"XObject").unwrap().as_dict().unwrap().has(b"Watermark1"));
    }

    #[test]
    fn test_blank_page_gets_only_the_invoking_stream() {
        let (mut doc, page_id) = single_page_doc(dictionary! { "Type" => "Page" });

        stamp(&mut doc, page_id, "COPY").unwrap();

        let contents = content_references(&doc, page_id).unwrap();
        assert_eq!(contents.len(), 1);
        let id = contents[0].as_reference().unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert_eq!(stream.content, b"q\n/Watermark1 Do\nQ\n".to_vec());
    }

    #[test]
    fn test_existing_content_is_bracketed_and_kept() {
        let (mut doc, page_id) = single_page_doc(dictionary! { "Type" => "Page" });
        let original = doc.add_object(Stream::new(Dictionary::new(), b"2 0 0 2 0 0 cm".to_vec()));
        doc.get_object_mut(page_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Contents", Object::Reference(original));

        stamp(&mut doc, page_id, "COPY").unwrap();

        let contents = content_references(&doc, page_id).unwrap();
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[1], Object::Reference(original));

        let body = |obj: &Object| {
            doc.get_object(obj.as_reference().unwrap())
                .unwrap()
                .as_stream()
                .unwrap()
                .content
                .clone()
        };
        assert_eq!(body(&contents[0]), b"q\n".to_vec());
        assert_eq!(body(&contents[2]), b"Q\n".to_vec());
    }

    #[test]
    fn test_unbalanced_saves_are_all_closed_before_the_watermark() {
        let (mut doc, page_id) = single_page_doc(dictionary! { "Type" => "Page" });
        let original = doc.add_object(Stream::new(
            Dictionary::new(),
            b"q q 2 0 0 2 0 0 cm q Q".to_vec(),
        ));
        doc.get_object_mut(page_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Contents", Object::Reference(original));

        stamp(&mut doc, page_id, "COPY").unwrap();

        let contents = content_references(&doc, page_id).unwrap();
        let restore = contents[2].as_reference().unwrap();
        let restore = doc.get_object(restore).unwrap().as_stream().unwrap();
        assert_eq!(restore.content, b"Q\nQ\nQ\n".to_vec());
    }

    #[test]
    fn test_contents_referring_to_an_array_is_flattened() {
        let (mut doc, page_id) = single_page_doc(dictionary! { "Type" => "Page" });
        let first = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m".to_vec()));
        let second = doc.add_object(Stream::new(Dictionary::new(), b"10 10 l S".to_vec()));
        let array = doc.add_object(Object::Array(vec![
            Object::Reference(first),
            Object::Reference(second),
        ]));
        doc.get_object_mut(page_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Contents", Object::Reference(array));

        stamp(&mut doc, page_id, "COPY").unwrap();

        let contents = content_references(&doc, page_id).unwrap();
        assert_eq!(contents.len(), 5);
        assert_eq!(contents[1], Object::Reference(first));
        assert_eq!(contents[2], Object::Reference(second));
        for obj in &contents {
            let id = obj.as_reference().unwrap();
            assert!(doc.get_object(id).unwrap().as_stream().is_ok());
        }
    }

    #[test]
    fn test_contents_referring_to_a_non_stream_is_rejected() {
        let (mut doc, page_id) = single_page_doc(dictionary! { "Type" => "Page" });
        let bogus = doc.add_object(Object::Integer(3));
        doc.get_object_mut(page_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Contents", Object::Reference(bogus));

        assert!(stamp(&mut doc, page_id, "COPY").is_err());
    }

    #[test]
    fn test_second_stamp_uses_a_fresh_name() {
        let (mut doc, page_id) = single_page_doc(dictionary! { "Type" => "Page" });

        stamp(&mut doc, page_id, "ONE").unwrap();
        stamp(&mut doc, page_id, "TWO").unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        assert!(xobjects.has(b"Watermark1"));
        assert!(xobjects.has(b"Watermark2"));
    }

    #[test]
    fn test_malformed_contents_is_rejected_untouched() {
        let (mut doc, page_id) = single_page_doc(dictionary! {
            "Type" => "Page",
            "Contents" => 7,
        });
        let objects_before = doc.objects.len();

        let err = stamp(&mut doc, page_id, "COPY").unwrap_err();
        assert!(err.to_string().contains("Contents"));
        // Only the shared font and graphics state were added
        assert_eq!(doc.objects.len(), objects_before + 2);
    }

    #[test]
    fn test_bad_media_box_is_rejected() {
        let (mut doc, page_id) = single_page_doc(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into()],
        });

        assert!(stamp(&mut doc, page_id, "COPY").is_err());
    }
}
