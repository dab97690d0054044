use crate::error::RasterError;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use std::path::Path;

const POINTS_PER_INCH: f32 = 72.0;
const COPIED_INFO_KEYS: [&str; 6] = [
    "Title",
    "Author",
    "Subject",
    "Keywords",
    "Creator",
    "CreationDate",
];

#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    entries: Vec<(String, Vec<u8>)>,
}

impl DocumentMetadata {
    /// Reads the info dictionary of `path`. Unreadable sources give empty
    /// metadata.
    pub fn from_source(path: &Path) -> Self {
        let Ok(doc) = Document::load(path) else {
            return Self::default();
        };
        let info = match doc.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok().cloned(),
            Ok(Object::Dictionary(dict)) => Some(dict.clone()),
            _ => None,
        };
        let Some(info) = info else {
            return Self::default();
        };
        let entries = COPIED_INFO_KEYS
            .iter()
            .filter_map(|key| match info.get(key.as_bytes()) {
                Ok(Object::String(value, _)) => Some((key.to_string(), value.clone())),
                _ => None,
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn to_dictionary(&self) -> Dictionary {
        let mut info = Dictionary::new();
        for (key, value) in &self.entries {
            info.set(key.as_str(), Object::string_literal(value.clone()));
        }
        info.set(
            "Producer",
            Object::string_literal(format!("pdfraster {}", env!("CARGO_PKG_VERSION"))),
        );
        info
    }
}

/// The first error from `pages` aborts assembly.
pub fn assemble<I>(
    pages: I,
    dpi: u32,
    metadata: &DocumentMetadata,
    source: &Path,
) -> Result<Document, RasterError>
where
    I: IntoIterator<Item = Result<RgbImage, RasterError>>,
{
    let mut builder = PdfBuilder::new(dpi);
    for page in pages {
        builder.push_page(page?)?;
    }
    builder.finish(metadata, source)
}

struct PdfBuilder {
    doc: Document,
    pages_id: lopdf::ObjectId,
    kids: Vec<Object>,
    scale: f32,
}

impl PdfBuilder {
    fn new(dpi: u32) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            scale: POINTS_PER_INCH / dpi.max(1) as f32,
        }
    }

    fn push_page(&mut self, image: RgbImage) -> Result<(), RasterError> {
        let (width_px, height_px) = image.dimensions();
        let width = width_px as f32 * self.scale;
        let height = height_px as f32 * self.scale;

        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width_px as i64,
                "Height" => height_px as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            image.into_raw(),
        );
        // Deflate now so only one raw page buffer is alive at a time.
        stream.compress()?;
        let image_id = self.doc.add_object(stream);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0.0f32.into(),
                        0.0f32.into(),
                        height.into(),
                        0.0f32.into(),
                        0.0f32.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.encode()?));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    fn finish(
        mut self,
        metadata: &DocumentMetadata,
        source: &Path,
    ) -> Result<Document, RasterError> {
        if self.kids.is_empty() {
            return Err(RasterError::NoPages {
                source_path: source.to_path_buf(),
            });
        }
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
        let info_id = self.doc.add_object(metadata.to_dictionary());
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);
        self.doc.compress();
        Ok(self.doc)
    }
}
