use std::io::{Cursor, Write};

use bindery_core::OrderedEntry;
use image::{ExtendedColorType, ImageDecoder, ImageFormat, ImageReader};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::EntryEmitter;
use crate::AssemblyError;

/// Builds a PDF with one page per entry, each page sized to its image in pixels.
///
/// The document is serialized into the sink only once every page is placed.
pub struct DocumentEmitter<W: Write> {
    sink: W,
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl<W: Write> DocumentEmitter<W> {
    pub fn new(sink: W) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            sink,
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }
}

impl<W: Write> EntryEmitter for DocumentEmitter<W> {
    type Output = W;

    fn append(&mut self, entry: &OrderedEntry, image: &[u8]) -> Result<(), AssemblyError> {
        let xobject = image_xobject(entry, image)?;
        let (width, height) = (xobject.width, xobject.height);
        let image_id = self.doc.add_object(xobject.stream);

        let name = format!("Im{}", entry.index);
        let content = format!("q {width} 0 0 {height} 0 0 cm /{name} Do Q\n").into_bytes();
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    name => image_id,
                },
            },
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        });
        self.kids.push(Object::Reference(page_id));
        Ok(())
    }

    fn finalize(mut self) -> Result<W, AssemblyError> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.save_to(&mut self.sink)?;
        self.sink.flush()?;
        Ok(self.sink)
    }
}

struct ImageXObject {
    width: i64,
    height: i64,
    stream: Stream,
}

/// Gray and RGB JPEG bytes are embedded as-is (DCTDecode); anything else,
/// CMYK JPEG included, is decoded to RGB and Flate-compressed.
fn image_xobject(entry: &OrderedEntry, bytes: &[u8]) -> Result<ImageXObject, AssemblyError> {
    let image_error = |message: String| AssemblyError::Image {
        label: entry.label.clone(),
        message,
    };

    let format = image::guess_format(bytes).map_err(|err| image_error(err.to_string()))?;
    if format == ImageFormat::Jpeg {
        let decoder = ImageReader::with_format(Cursor::new(bytes), ImageFormat::Jpeg)
            .into_decoder()
            .map_err(|err| image_error(err.to_string()))?;
        let (width, height) = decoder.dimensions();
        if let Some(color_space) = dct_color_space(decoder.original_color_type()) {
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                bytes.to_vec(),
            )
            .with_compression(false);
            return Ok(ImageXObject {
                width: width as i64,
                height: height as i64,
                stream,
            });
        }
    }

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|err| image_error(err.to_string()))?
        .to_rgb8();
    let (width, height) = decoded.dimensions();
    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        decoded.into_raw(),
    );
    stream.compress()?;
    Ok(ImageXObject {
        width: width as i64,
        height: height as i64,
        stream,
    })
}

/// PDF color space for a JPEG that can be passed through untouched.
fn dct_color_space(color: ExtendedColorType) -> Option<&'static str> {
    match color {
        ExtendedColorType::L8 => Some("DeviceGray"),
        ExtendedColorType::Rgb8 => Some("DeviceRGB"),
        _ => None,
    }
}
