//! Content stream parsing
//!
//! A page's content (one stream or an array of streams read back to back) is
//! tokenized into operations and then grouped into a tree: text objects,
//! saved graphics states, marked-content sequences, paths and inline images.

use super::lexer::{is_delimiter, is_whitespace, Lexer, Token};
use super::objects::{NoResolver, ObjectParser};
use super::source::{ByteSource, SegmentedSource};
use super::ParseOptions;
use crate::error::{PdfError, Result};
use crate::objects::{Dictionary, Object, PdfString};

/// Operator with its operands, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Object>,
}

impl Operation {
    pub fn new(operator: impl Into<String>, operands: Vec<Object>) -> Self {
        Self {
            operator: operator.into(),
            operands,
        }
    }

    pub fn is(&self, operator: &str) -> bool {
        self.operator == operator
    }
}

/// Inline image (`BI ... ID ... EI`). Header keys are kept as written,
/// abbreviations included.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub header: Dictionary,
    pub data: Vec<u8>,
}

impl InlineImage {
    /// In the flat operation list an inline image travels as a `BI`
    /// operation whose operands are the header dictionary and the raw data.
    fn from_operation(operation: Operation) -> Option<Self> {
        let mut operands = operation.operands.into_iter();
        match (operands.next(), operands.next()) {
            (Some(Object::Dictionary(header)), Some(Object::String(data))) => Some(Self {
                header,
                data: data.into_bytes(),
            }),
            _ => None,
        }
    }
}

/// Node of the structured content tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentObject {
    Operation(Operation),
    /// `BT ... ET`
    Text(Vec<ContentObject>),
    /// `q ... Q`
    LocalGraphicsState(Vec<ContentObject>),
    /// `BMC`/`BDC ... EMC`; `begin` is the opening operation
    MarkedContent {
        begin: Operation,
        objects: Vec<ContentObject>,
    },
    /// Construction operators through the painting operator(s)
    Path(Vec<ContentObject>),
    InlineImage(InlineImage),
    /// `Do`
    XObject(Operation),
    /// `sh`
    Shading(Operation),
}

impl ContentObject {
    /// Nested objects of a composite node; empty for leaves.
    pub fn children(&self) -> &[ContentObject] {
        match self {
            ContentObject::Text(objects)
            | ContentObject::LocalGraphicsState(objects)
            | ContentObject::Path(objects)
            | ContentObject::MarkedContent { objects, .. } => objects,
            _ => &[],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContentObject::Operation(_) => "Operation",
            ContentObject::Text(_) => "Text",
            ContentObject::LocalGraphicsState(_) => "LocalGraphicsState",
            ContentObject::MarkedContent { .. } => "MarkedContent",
            ContentObject::Path(_) => "Path",
            ContentObject::InlineImage(_) => "InlineImage",
            ContentObject::XObject(_) => "XObject",
            ContentObject::Shading(_) => "Shading",
        }
    }
}

fn is_path_begin(operator: &str) -> bool {
    matches!(operator, "m" | "re")
}

fn is_path_painting(operator: &str) -> bool {
    matches!(
        operator,
        "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n"
    )
}

#[derive(Debug)]
pub struct ContentParser {
    parser: ObjectParser<SegmentedSource>,
}

impl ContentParser {
    /// Parser over the concatenation of `segments`.
    pub fn new(segments: Vec<Vec<u8>>) -> Self {
        Self::with_options(segments, ParseOptions::default())
    }

    pub fn with_options(segments: Vec<Vec<u8>>, options: ParseOptions) -> Self {
        let lexer = Lexer::for_content(SegmentedSource::new(segments));
        Self {
            parser: ObjectParser::new(lexer, options),
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self::new(vec![data.to_vec()])
    }

    pub fn position(&self) -> usize {
        self.parser.lexer().position()
    }

    pub fn seek(&mut self, position: usize) {
        self.parser.lexer_mut().seek(position);
    }

    /// Next operation, or `None` at the end of the content. Operands left
    /// without an operator at the end are dropped.
    pub fn next_operation(&mut self) -> Result<Option<Operation>> {
        let lenient = self.parser.options().lenient;
        let mut operands = Vec::new();
        loop {
            let item = self.parser.next_positioned_token().and_then(|(position, token)| match token {
                Token::Eof => Ok(None),
                Token::Keyword(operator) => Ok(Some(Err(operator))),
                token => self
                    .parser
                    .parse_from_token(token, position, &mut NoResolver)
                    .map(|operand| Some(Ok(operand))),
            });

            match item {
                Ok(None) => {
                    if !operands.is_empty() {
                        tracing::debug!(
                            "Dropping {} operands without operator at end of content",
                            operands.len()
                        );
                    }
                    return Ok(None);
                }
                Ok(Some(Ok(operand))) => operands.push(operand),
                Ok(Some(Err(operator))) => {
                    if operator == "BI" {
                        let image = self.read_inline_image()?;
                        operands = vec![
                            Object::Dictionary(image.header),
                            Object::String(PdfString::new(image.data)),
                        ];
                    }
                    return Ok(Some(Operation { operator, operands }));
                }
                Err(err) if lenient && err.is_syntax() => {
                    tracing::warn!("Skipping malformed content token: {}", err);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Every remaining operation as a flat list.
    pub fn parse_operations(&mut self) -> Result<Vec<Operation>> {
        let mut operations = Vec::new();
        while let Some(operation) = self.next_operation()? {
            operations.push(operation);
        }
        Ok(operations)
    }

    /// Every remaining operation grouped into the content tree.
    pub fn parse_content_objects(&mut self) -> Result<Vec<ContentObject>> {
        self.parse_container(None)
    }

    /// Objects up to the `end` operator, which is consumed. At the end of
    /// the content whatever was collected is returned.
    fn parse_container(&mut self, end: Option<&str>) -> Result<Vec<ContentObject>> {
        let mut objects = Vec::new();
        while let Some(operation) = self.next_operation()? {
            if end.is_some_and(|end| operation.is(end)) {
                return Ok(objects);
            }
            objects.push(self.parse_content_object(operation)?);
        }
        if let Some(end) = end {
            tracing::debug!("Content ended before closing '{}'", end);
        }
        Ok(objects)
    }

    fn parse_content_object(&mut self, operation: Operation) -> Result<ContentObject> {
        let object = match operation.operator.clone().as_str() {
            "BT" => ContentObject::Text(self.parse_container(Some("ET"))?),
            "q" => ContentObject::LocalGraphicsState(self.parse_container(Some("Q"))?),
            "BMC" | "BDC" => {
                let objects = self.parse_container(Some("EMC"))?;
                ContentObject::MarkedContent {
                    begin: operation,
                    objects,
                }
            }
            "BI" => match InlineImage::from_operation(operation.clone()) {
                Some(image) => ContentObject::InlineImage(image),
                None => ContentObject::Operation(operation),
            },
            "Do" => ContentObject::XObject(operation),
            "sh" => ContentObject::Shading(operation),
            op if is_path_begin(op) => self.parse_path(operation)?,
            _ => ContentObject::Operation(operation),
        };
        Ok(object)
    }

    /// Collects operations from `begin` through the painting operator(s).
    /// The first non-painting operation after painting ends the path and is
    /// left for the caller.
    fn parse_path(&mut self, begin: Operation) -> Result<ContentObject> {
        let mut objects = vec![ContentObject::Operation(begin)];
        let mut closeable = false;
        let mut resume = self.position();

        while let Some(operation) = self.next_operation()? {
            if is_path_painting(&operation.operator) {
                closeable = true;
            } else if closeable {
                self.seek(resume);
                break;
            }
            objects.push(self.parse_content_object(operation)?);
            resume = self.position();
        }

        Ok(ContentObject::Path(objects))
    }

    fn read_inline_image(&mut self) -> Result<InlineImage> {
        let mut header = Dictionary::new();
        loop {
            let (position, token) = self.parser.next_positioned_token()?;
            match token {
                Token::Keyword(keyword) if keyword == "ID" => break,
                Token::Name(key) => {
                    let value = self.parser.parse_object(&mut NoResolver)?;
                    header.set(key, value);
                }
                Token::Eof => {
                    return Err(PdfError::syntax(position, "Unterminated inline image header"));
                }
                other => {
                    return Err(PdfError::syntax(
                        position,
                        format!("Unexpected {other:?} in inline image header"),
                    ));
                }
            }
        }

        // One white-space byte separates ID from the data
        let lexer = self.parser.lexer_mut();
        if lexer.source().peek().is_some_and(is_whitespace) {
            lexer.source_mut().advance(1);
        }
        let start = lexer.position();

        let declared = header
            .get_integer("L")
            .or_else(|| header.get_integer("Length"))
            .and_then(|length| usize::try_from(length).ok());
        if let Some(length) = declared {
            if let Some(data) = self.read_declared_image_data(start, length) {
                return Ok(InlineImage { header, data });
            }
        }

        let Some((data_end, resume)) = self.find_inline_image_end(start) else {
            return Err(PdfError::syntax(start, "Inline image data has no EI"));
        };
        let lexer = self.parser.lexer_mut();
        let data = lexer.source().copy_range(start, data_end);
        lexer.seek(resume);
        Ok(InlineImage { header, data })
    }

    /// Reads exactly `length` bytes when they are followed by `EI`.
    fn read_declared_image_data(&mut self, start: usize, length: usize) -> Option<Vec<u8>> {
        let lexer = self.parser.lexer_mut();
        let data = lexer.read_raw(length).ok()?;
        match lexer.next_token() {
            Ok(token) if token.is_keyword("EI") => Some(data),
            _ => {
                lexer.seek(start);
                None
            }
        }
    }

    /// Scans for `EI` preceded by white-space and followed by white-space,
    /// a delimiter or the end of the content. Returns the end of the data
    /// (excluding the separating white-space) and the position after `EI`.
    fn find_inline_image_end(&self, start: usize) -> Option<(usize, usize)> {
        let source = self.parser.lexer().source();
        let limit = start
            .saturating_add(self.parser.options().max_inline_image_scan)
            .min(source.len());
        let bytes = source.copy_range(start, limit);

        for i in 0..bytes.len().saturating_sub(1) {
            if bytes[i] != b'E' || bytes[i + 1] != b'I' {
                continue;
            }
            let before = i == 0 || is_whitespace(bytes[i - 1]);
            let after = match bytes.get(i + 2) {
                Some(&b) => is_whitespace(b) || is_delimiter(b),
                None => start + i + 2 >= source.len(),
            };
            if before && after {
                let data_end = if i == 0 { start } else { start + i - 1 };
                return Some((data_end, start + i + 2));
            }
        }
        None
    }
}
