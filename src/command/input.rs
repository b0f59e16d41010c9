use std::io::{self, Write};
use std::path::Path;

/// Serializes an in-memory object into the text sink backing an input file.
pub trait ContentWriter {
    fn write_content(&self, sink: &mut dyn Write) -> io::Result<()>;
}

/// Adapts a closure into a `ContentWriter`.
pub struct WriteWith<F>(pub F);

impl<F> ContentWriter for WriteWith<F>
where
    F: Fn(&mut dyn Write) -> io::Result<()>,
{
    fn write_content(&self, sink: &mut dyn Write) -> io::Result<()> {
        (self.0)(sink)
    }
}

pub enum InputSource<'a> {
    /// Copied byte-for-byte into an owned temp file; the original is never passed on.
    Copy(&'a Path),
    Text {
        content: &'a str,
        extension: Option<&'a str>,
    },
    Content {
        writer: &'a dyn ContentWriter,
        extension: Option<&'a str>,
    },
}

impl<'a> InputSource<'a> {
    pub fn text(content: &'a str) -> Self {
        InputSource::Text {
            content,
            extension: None,
        }
    }

    pub fn content(writer: &'a dyn ContentWriter) -> Self {
        InputSource::Content {
            writer,
            extension: None,
        }
    }

    pub fn with_extension(self, ext: &'a str) -> Self {
        match self {
            InputSource::Copy(path) => InputSource::Copy(path),
            InputSource::Text { content, .. } => InputSource::Text {
                content,
                extension: Some(ext),
            },
            InputSource::Content { writer, .. } => InputSource::Content {
                writer,
                extension: Some(ext),
            },
        }
    }

    pub(crate) fn extension(&self) -> Option<&'a str> {
        match *self {
            InputSource::Copy(path) => path.extension().and_then(|ext| ext.to_str()),
            InputSource::Text { extension, .. } | InputSource::Content { extension, .. } => {
                extension
            }
        }
    }
}
