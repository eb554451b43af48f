//! Line formatting.
//!
//! # Responsibilities
//! - Compile `{placeholder}` templates once, at configuration time
//! - Render a record into a single text line
//!
//! # Design Decisions
//! - Placeholders: `{timestamp}`, `{name}`, `{line}`, `{level}`, `{request}`, `{message}`
//! - `{{` and `}}` render literal braces
//! - Unknown placeholders are rejected when the template is compiled

use thiserror::Error;

use super::record::LogRecord;

/// Template of the main log: every record field, separated by ` - `.
pub const DEFAULT_FORMAT: &str = "{timestamp} - {name} - {line} - {level} - {request} - {message}";

/// Template of the access log: access lines arrive pre-formatted.
pub const ACCESS_FORMAT: &str = "{message}";

/// `chrono` pattern used for `{timestamp}`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Template compilation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownField(String),

    #[error("unclosed '{{' at offset {0}")]
    Unclosed(usize),

    #[error("unmatched '}}' at offset {0}")]
    Unmatched(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Timestamp,
    Name,
    Line,
    Level,
    Request,
    Message,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "timestamp" => Some(Field::Timestamp),
            "name" => Some(Field::Name),
            "line" => Some(Field::Line),
            "level" => Some(Field::Level),
            "request" => Some(Field::Request),
            "message" => Some(Field::Message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A compiled line template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFormat {
    segments: Vec<Segment>,
}

impl LineFormat {
    /// Compile a template.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, next)| next) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::Unclosed(offset));
                    }
                    let field = Field::parse(name.trim())
                        .ok_or_else(|| TemplateError::UnknownField(name.clone()))?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' if chars.peek().map(|&(_, next)| next) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError::Unmatched(offset)),
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// The main-log format, see [`DEFAULT_FORMAT`].
    pub fn main() -> Self {
        let fields = [
            Field::Timestamp,
            Field::Name,
            Field::Line,
            Field::Level,
            Field::Request,
            Field::Message,
        ];
        let mut segments = Vec::with_capacity(fields.len() * 2);
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                segments.push(Segment::Literal(" - ".to_string()));
            }
            segments.push(Segment::Field(field));
        }
        Self { segments }
    }

    /// The access-log format: message text only.
    pub fn message_only() -> Self {
        Self {
            segments: vec![Segment::Field(Field::Message)],
        }
    }

    /// Render `record` as one line, without trailing newline.
    pub fn format(&self, record: &LogRecord) -> String {
        let mut out = String::with_capacity(record.message.len() + 64);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(Field::Timestamp) => {
                    out.push_str(&record.timestamp.format(TIMESTAMP_FORMAT).to_string())
                }
                Segment::Field(Field::Name) => out.push_str(&record.name),
                Segment::Field(Field::Line) => {
                    if let Some(line) = record.line {
                        out.push_str(&line.to_string());
                    }
                }
                Segment::Field(Field::Level) => out.push_str(record.level.as_str()),
                Segment::Field(Field::Request) => out.push_str(&record.request),
                Segment::Field(Field::Message) => out.push_str(&record.message),
            }
        }
        out
    }
}

impl Default for LineFormat {
    fn default() -> Self {
        Self::main()
    }
}
