//! Light markdown styling for the result panel.
//!
//! Only what vision models typically emit is recognized: `#`..`###` headings,
//! `-`/`*` bullets, numbered items, fenced code blocks and `**bold**`, `*italic*`,
//! `` `code` `` inline. Everything else is shown as plain text. Styling never
//! drops characters from the model's words, it only removes the markup around them.

use std::sync::OnceLock;

use regex::Regex;

const BULLET_PREFIX: &str = "  \u{2022} ";
const NUMBERED_PREFIX: &str = "  ";
const CODE_FENCE: &str = "```";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanStyle {
    Plain,
    Heading1,
    Heading2,
    Heading3,
    Bold,
    Italic,
    InlineCode,
    CodeBlock,
}

impl SpanStyle {
    /// Text tag name used by the panel's buffer; `None` for unstyled text.
    pub fn tag_name(self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Heading1 => Some("h1"),
            Self::Heading2 => Some("h2"),
            Self::Heading3 => Some("h3"),
            Self::Bold => Some("bold"),
            Self::Italic => Some("italic"),
            Self::InlineCode => Some("inline-code"),
            Self::CodeBlock => Some("code"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub text: String,
    pub style: SpanStyle,
}

impl StyledSpan {
    fn new(text: impl Into<String>, style: SpanStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

pub fn render(content: &str) -> Vec<StyledSpan> {
    let mut spans = Vec::new();
    let mut code_block: Option<Vec<&str>> = None;

    for line in content.split('\n') {
        if line.starts_with(CODE_FENCE) {
            match code_block.take() {
                Some(lines) => push_code_block(&mut spans, &lines),
                None => code_block = Some(Vec::new()),
            }
            continue;
        }
        if let Some(lines) = code_block.as_mut() {
            lines.push(line);
            continue;
        }

        if let Some(heading) = line.strip_prefix("### ") {
            push(&mut spans, format!("{heading}\n"), SpanStyle::Heading3);
        } else if let Some(heading) = line.strip_prefix("## ") {
            push(&mut spans, format!("{heading}\n"), SpanStyle::Heading2);
        } else if let Some(heading) = line.strip_prefix("# ") {
            push(&mut spans, format!("{heading}\n"), SpanStyle::Heading1);
        } else if let Some(item) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            push_inline(&mut spans, &format!("{BULLET_PREFIX}{item}\n"));
        } else if is_numbered_item(line) {
            push_inline(&mut spans, &format!("{NUMBERED_PREFIX}{line}\n"));
        } else {
            push_inline(&mut spans, &format!("{line}\n"));
        }
    }

    // An unterminated fence still shows its contents.
    if let Some(lines) = code_block {
        push_code_block(&mut spans, &lines);
    }

    spans
}

fn push_code_block(spans: &mut Vec<StyledSpan>, lines: &[&str]) {
    push(spans, format!("{}\n", lines.join("\n")), SpanStyle::CodeBlock);
}

fn push(spans: &mut Vec<StyledSpan>, text: String, style: SpanStyle) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = spans.last_mut() {
        if last.style == style {
            last.text.push_str(&text);
            return;
        }
    }
    spans.push(StyledSpan::new(text, style));
}

fn push_inline(spans: &mut Vec<StyledSpan>, text: &str) {
    let Some(pattern) = inline_pattern() else {
        push(spans, text.to_string(), SpanStyle::Plain);
        return;
    };

    let mut cursor = 0;
    for captures in pattern.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        push(spans, text[cursor..whole.start()].to_string(), SpanStyle::Plain);
        let (inner, style) = if let Some(bold) = captures.get(1) {
            (bold.as_str(), SpanStyle::Bold)
        } else if let Some(italic) = captures.get(2) {
            (italic.as_str(), SpanStyle::Italic)
        } else if let Some(code) = captures.get(3) {
            (code.as_str(), SpanStyle::InlineCode)
        } else {
            (whole.as_str(), SpanStyle::Plain)
        };
        push(spans, inner.to_string(), style);
        cursor = whole.end();
    }
    push(spans, text[cursor..].to_string(), SpanStyle::Plain);
}

fn inline_pattern() -> Option<&'static Regex> {
    static INLINE: OnceLock<Option<Regex>> = OnceLock::new();
    INLINE
        .get_or_init(|| match Regex::new(r"\*\*(.+?)\*\*|\*([^*\s][^*]*?)\*|`([^`]+)`") {
            Ok(regex) => Some(regex),
            Err(err) => {
                tracing::error!(?err, "inline markdown pattern failed to compile");
                None
            }
        })
        .as_ref()
}

fn is_numbered_item(line: &str) -> bool {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && line[digits..].starts_with(". ")
}
