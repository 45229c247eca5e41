use std::fmt::Write;

use parse_display::Display;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{
    compiler::clean_expr, ExpressionCompiler, VariableContext, VariableKind, VariableSettings,
};


/// Characters escaped by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Everything the URL fragment persists.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditorState {
    pub expr: String,
    pub context: VariableContext,
}

/// Result of [`decode`]. Decoding never fails; problems are reported as warnings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decoded {
    pub state: EditorState,
    pub warnings: Vec<DecodeWarning>,
}

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    #[display("unknown key `{0}`")]
    UnknownKey(String),
    #[display("duplicate expression")]
    DuplicateExpr,
    #[display("duplicate variable `{0}`")]
    DuplicateName(String),
    #[display("variable without a name")]
    EmptyName,
    #[display("variable `{name}` has {count} values, expected 1 or 3")]
    FieldCount { name: String, count: usize },
    #[display("malformed number `{text}` for `{name}`")]
    MalformedNumber { name: String, text: String },
    #[display("malformed escape in `{0}`")]
    MalformedEscape(String),
}
impl std::error::Error for DecodeWarning {}

/// Serialize to `expr=<expr>&name=<name>;<value>[;<min>;<max>]...`.
///
/// `min` and `max` are only written for `Range` variables.
pub fn encode(state: &EditorState) -> String {
    let mut s = format!("expr={}", encode_component(&state.expr));
    for (name, settings) in &state.context {
        let _ = write!(
            s,
            "&name={};{}",
            encode_component(name),
            format_number(settings.value)
        );
        if settings.kind == VariableKind::Range {
            let _ = write!(
                s,
                ";{};{}",
                format_number(settings.min),
                format_number(settings.max)
            );
        }
    }
    s
}

/// Parse the output of [`encode`], with or without a leading `#`.
///
/// The expression is sanitized with `compiler` before being accepted.
pub fn decode(text: &str, compiler: &dyn ExpressionCompiler) -> Decoded {
    let mut d = Decoder::default();
    let text = text.strip_prefix('#').unwrap_or(text);
    for part in text.split('&').filter(|part| !part.is_empty()) {
        let (key, rest) = part.split_once('=').unwrap_or((part, ""));
        match key {
            "expr" => d.expr(rest),
            "name" => d.variable(rest),
            _ => d.warn(DecodeWarning::UnknownKey(key.to_string())),
        }
    }
    if let Some(expr) = d.expr.take() {
        d.state.expr = clean_expr(compiler, &expr);
    }
    Decoded {
        state: d.state,
        warnings: d.warnings,
    }
}

#[derive(Default)]
struct Decoder {
    expr: Option<String>,
    state: EditorState,
    warnings: Vec<DecodeWarning>,
}

impl Decoder {
    fn warn(&mut self, w: DecodeWarning) {
        tracing::warn!("{w}");
        self.warnings.push(w);
    }

    fn component(&mut self, text: &str) -> String {
        match decode_component(text) {
            Some(s) => s,
            None => {
                self.warn(DecodeWarning::MalformedEscape(text.to_string()));
                text.to_string()
            }
        }
    }

    fn number(&mut self, name: &str, text: &str) -> f64 {
        match parse_number(text) {
            Some(value) => value,
            None => {
                self.warn(DecodeWarning::MalformedNumber {
                    name: name.to_string(),
                    text: text.to_string(),
                });
                f64::NAN
            }
        }
    }

    fn expr(&mut self, text: &str) {
        let expr = self.component(text);
        if self.expr.replace(expr).is_some() {
            self.warn(DecodeWarning::DuplicateExpr);
        }
    }

    fn variable(&mut self, text: &str) {
        let mut fields = text.split(';');
        let name = self.component(fields.next().unwrap_or_default());
        if name.is_empty() {
            self.warn(DecodeWarning::EmptyName);
            return;
        }
        let values: Vec<&str> = fields.collect();
        let settings = match values[..] {
            [value] => VariableSettings::constant(self.number(&name, value)),
            [value, min, max] => VariableSettings::range(
                self.number(&name, value),
                self.number(&name, min),
                self.number(&name, max),
            ),
            _ => {
                self.warn(DecodeWarning::FieldCount {
                    name: name.clone(),
                    count: values.len(),
                });
                let value = match values.first() {
                    Some(value) => self.number(&name, value),
                    None => f64::NAN,
                };
                VariableSettings::constant(value)
            }
        };
        if self.state.context.insert(name.clone(), settings).is_some() {
            self.warn(DecodeWarning::DuplicateName(name));
        }
    }
}

pub fn encode_component(text: &str) -> String {
    utf8_percent_encode(text, COMPONENT).to_string()
}

/// Returns `None` if the escapes do not decode to UTF-8.
pub fn decode_component(text: &str) -> Option<String> {
    percent_decode_str(text)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// Shortest text that parses back to the same value.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        value.to_string()
    }
}

pub fn parse_number(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ if text.bytes().all(is_number_byte) => text.parse().ok(),
        _ => None,
    }
}

fn is_number_byte(b: u8) -> bool {
    b.is_ascii_digit() || b"+-.eE".contains(&b)
}
