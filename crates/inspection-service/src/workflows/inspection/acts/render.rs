use std::io::{Cursor, Read, Write};
use std::ops::Range;
use std::path::PathBuf;

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{ActFields, ActTemplate, ActValue};
use crate::config::TemplatesConfig;

/// Turns a composed field map into document bytes.
pub trait ActRenderer: Send + Sync {
    fn render(&self, template: ActTemplate, fields: &ActFields) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to read template {}: {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template archive is malformed: {0}")]
    Archive(#[from] ZipError),
    #[error("failed to rewrite document part: {0}")]
    Io(#[from] std::io::Error),
    #[error("document part {0} is not valid UTF-8")]
    Encoding(String),
}

/// Fills `{token}` placeholders in the text parts of a `.docx` template.
#[derive(Debug, Clone)]
pub struct DocxTemplateRenderer {
    universal: PathBuf,
    control: PathBuf,
}

impl DocxTemplateRenderer {
    pub fn new(universal: impl Into<PathBuf>, control: impl Into<PathBuf>) -> Self {
        Self {
            universal: universal.into(),
            control: control.into(),
        }
    }

    pub fn from_config(config: &TemplatesConfig) -> Self {
        Self::new(&config.universal, &config.control)
    }

    fn path(&self, template: ActTemplate) -> &PathBuf {
        match template {
            ActTemplate::Universal => &self.universal,
            ActTemplate::Control => &self.control,
        }
    }
}

impl ActRenderer for DocxTemplateRenderer {
    fn render(&self, template: ActTemplate, fields: &ActFields) -> Result<Vec<u8>, RenderError> {
        let path = self.path(template);
        let bytes = std::fs::read(path).map_err(|source| RenderError::Template {
            path: path.clone(),
            source,
        })?;
        fill_docx(&bytes, fields)
    }
}

/// Rewrite a docx archive with every placeholder in its document, header and footer parts
/// replaced. Other entries are copied through unchanged.
pub fn fill_docx(template: &[u8], fields: &ActFields) -> Result<Vec<u8>, RenderError> {
    let mut archive = ZipArchive::new(Cursor::new(template))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(template.len())));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();

        if !is_text_part(&name) {
            writer.raw_copy_file(entry)?;
            continue;
        }

        let mut raw = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut raw)?;
        let xml = String::from_utf8(raw).map_err(|_| RenderError::Encoding(name.clone()))?;

        writer.start_file(name, options)?;
        writer.write_all(substitute(&xml, fields).as_bytes())?;
    }

    Ok(writer.finish()?.into_inner())
}

fn is_text_part(name: &str) -> bool {
    let Some(part) = name.strip_prefix("word/") else {
        return false;
    };
    part == "document.xml"
        || (part.ends_with(".xml") && (part.starts_with("header") || part.starts_with("footer")))
}

/// One `<w:t>` element: byte ranges of its opening tag and of its text.
struct TextRun {
    open: Range<usize>,
    text: Range<usize>,
}

/// Replace every known `{token}` in the text of each paragraph in one pass.
///
/// A token may span several runs; its value lands in the run where the token starts and the
/// consumed text is removed from the runs that follow. Values are never scanned again, and
/// unknown tokens are left as written.
fn substitute(xml: &str, fields: &ActFields) -> String {
    let mut output = String::with_capacity(xml.len());
    let mut copied = 0;

    for paragraph in paragraphs(xml) {
        let Some(filled) = fill_runs(xml, &paragraph, fields) else {
            continue;
        };
        for (run, text) in paragraph.iter().zip(filled) {
            output.push_str(&xml[copied..run.open.start]);
            output.push_str(open_tag(&xml[run.open.clone()], &text));
            output.push_str(&text);
            copied = run.text.end;
        }
    }

    output.push_str(&xml[copied..]);
    output
}

/// Text runs grouped by the `</w:p>` that closes their paragraph.
fn paragraphs(xml: &str) -> Vec<Vec<TextRun>> {
    let mut paragraphs = Vec::new();
    let mut current = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = xml[cursor..].find('<') {
        let start = cursor + offset;
        let rest = &xml[start..];

        if rest.starts_with("</w:p>") {
            paragraphs.push(std::mem::take(&mut current));
            cursor = start + "</w:p>".len();
        } else if rest.starts_with("<w:t>") || rest.starts_with("<w:t ") {
            let Some(close) = rest.find('>') else {
                break;
            };
            let open = start..start + close + 1;
            if rest[..close].ends_with('/') {
                cursor = open.end;
                continue;
            }
            let Some(length) = xml[open.end..].find("</w:t>") else {
                break;
            };
            let text = open.end..open.end + length;
            cursor = text.end + "</w:t>".len();
            current.push(TextRun { open, text });
        } else {
            cursor = start + 1;
        }
    }

    paragraphs.push(current);
    paragraphs.retain(|runs| !runs.is_empty());
    paragraphs
}

/// New text for each run of a paragraph, or `None` when nothing was replaced.
fn fill_runs(xml: &str, runs: &[TextRun], fields: &ActFields) -> Option<Vec<String>> {
    let mut joined = String::new();
    let mut ends = Vec::with_capacity(runs.len());
    for run in runs {
        joined.push_str(&xml[run.text.clone()]);
        ends.push(joined.len());
    }
    if !joined.contains('{') {
        return None;
    }

    let mut filled = vec![String::new(); runs.len()];
    let mut replaced = false;
    let mut position = 0;

    while position < joined.len() {
        let owner = ends.partition_point(|&end| end <= position);
        let rest = &joined[position..];

        if let Some((length, value)) = placeholder_at(rest, fields) {
            filled[owner].push_str(&escape_xml(&value.to_string()));
            position += length;
            replaced = true;
            continue;
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        filled[owner].push(ch);
        position += ch.len_utf8();
    }

    replaced.then_some(filled)
}

/// Length and value of the known placeholder `text` starts with.
fn placeholder_at<'a>(text: &str, fields: &'a ActFields) -> Option<(usize, &'a ActValue)> {
    let inner = text.strip_prefix('{')?;
    let close = inner.find('}')?;
    let token = &inner[..close];
    if token.is_empty()
        || !token
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return None;
    }
    fields.get(token).map(|value| (close + 2, value))
}

/// Word drops edge whitespace from text that is not marked preserved.
fn open_tag<'a>(tag: &'a str, text: &str) -> &'a str {
    let padded = text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace);
    if padded && tag == "<w:t>" {
        r#"<w:t xml:space="preserve">"#
    } else {
        tag
    }
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
