//! Syntax Tree Adapter
//!
//! Wraps the oxc parser behind a parse → mutate → print contract. The tree is
//! never re-serialized: a mutation is a span edit against the original text,
//! and printing splices the edits back-to-front. Every byte outside an edited
//! span therefore survives unchanged, which is what keeps the passes
//! idempotent.

use oxc_allocator::Allocator;
use oxc_ast::ast::{ObjectExpression, Program, Statement};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use std::path::Path;

use crate::error::ParseError;

// ═══════════════════════════════════════════════════════════════════════════════
// EDITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Replace `start..end` of the original text with `text`. An empty range is
/// an insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEdit {
    pub start: u32,
    pub end: u32,
    pub text: String,
}

impl SourceEdit {
    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        SourceEdit {
            start: span.start,
            end: span.end,
            text: text.into(),
        }
    }

    pub fn insert(at: u32, text: impl Into<String>) -> Self {
        SourceEdit {
            start: at,
            end: at,
            text: text.into(),
        }
    }

    pub fn remove(span: Span) -> Self {
        SourceEdit::replace(span, String::new())
    }
}

/// Apply `edits` to `source`. Insertions at the same offset keep the order in
/// which they were recorded and land before a replacement starting there. An
/// edit overlapping one already applied is dropped.
pub fn apply_edits(source: &str, edits: &[SourceEdit]) -> String {
    let mut ordered: Vec<(usize, &SourceEdit)> = edits.iter().enumerate().collect();
    ordered.sort_by(|(ia, a), (ib, b)| {
        b.start
            .cmp(&a.start)
            .then((b.end - b.start).cmp(&(a.end - a.start)))
            .then(ib.cmp(ia))
    });

    let mut result = source.to_string();
    let mut floor = u32::MAX;
    for (_, edit) in ordered {
        if edit.end > floor && edit.start != edit.end {
            tracing::warn!(
                start = edit.start,
                end = edit.end,
                "dropping overlapping source edit"
            );
            continue;
        }
        result.replace_range((edit.start as usize)..(edit.end as usize), &edit.text);
        floor = edit.start;
    }
    result
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREE
// ═══════════════════════════════════════════════════════════════════════════════

/// One parsed source file plus the edits recorded against it.
pub struct SyntaxTree<'a> {
    path: &'a Path,
    source: &'a str,
    program: Program<'a>,
    edits: Vec<SourceEdit>,
}

impl<'a> SyntaxTree<'a> {
    pub fn path(&self) -> &'a Path {
        self.path
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn program(&self) -> &Program<'a> {
        &self.program
    }

    pub fn text(&self, span: Span) -> &'a str {
        &self.source[span.start as usize..span.end as usize]
    }

    pub fn apply(&mut self, edits: impl IntoIterator<Item = SourceEdit>) {
        self.edits.extend(edits);
    }

    pub fn is_modified(&self) -> bool {
        !self.edits.is_empty()
    }

    pub fn print(&self) -> String {
        if self.edits.is_empty() {
            return self.source.to_string();
        }
        apply_edits(self.source, &self.edits)
    }

    pub fn style(&self) -> CodeStyle {
        CodeStyle::detect(self)
    }
}

/// Dialects tried in order for a path. `.js`/`.jsx` sources fall back to
/// TypeScript+JSX for projects that leak type annotations into plain files.
fn dialects_for(path: &Path) -> Vec<SourceType> {
    let base = SourceType::default().with_module(true);
    match path.extension().and_then(|e| e.to_str()).unwrap_or("js") {
        "ts" | "mts" | "cts" => vec![base.with_typescript(true)],
        "tsx" => vec![base.with_typescript(true).with_jsx(true)],
        _ => vec![
            base.with_jsx(true),
            base.with_typescript(true).with_jsx(true),
        ],
    }
}

pub fn parse<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    path: &'a Path,
) -> Result<SyntaxTree<'a>, ParseError> {
    let mut first_error: Option<ParseError> = None;

    for source_type in dialects_for(path) {
        let ret = Parser::new(allocator, source, source_type).parse();
        if !ret.panicked && ret.errors.is_empty() {
            return Ok(SyntaxTree {
                path,
                source,
                program: ret.program,
                edits: Vec::new(),
            });
        }

        if first_error.is_none() {
            let (offset, message) = match ret.errors.first() {
                Some(diagnostic) => (
                    diagnostic
                        .labels
                        .as_ref()
                        .and_then(|labels| labels.first())
                        .map(|label| label.offset())
                        .unwrap_or(0),
                    diagnostic.message.to_string(),
                ),
                None => (0, "parser aborted".to_string()),
            };
            let (line, column) = location(source, offset);
            first_error = Some(ParseError {
                path: path.to_path_buf(),
                line,
                column,
                message,
            });
        }
    }

    Err(first_error.unwrap_or_else(|| ParseError {
        path: path.to_path_buf(),
        line: 1,
        column: 1,
        message: "no dialect configured".to_string(),
    }))
}

// ═══════════════════════════════════════════════════════════════════════════════
// STYLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Punctuation habits of a file, read off its first import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeStyle {
    pub semicolons: bool,
    pub quote: char,
}

impl Default for CodeStyle {
    fn default() -> Self {
        CodeStyle {
            semicolons: true,
            quote: '\'',
        }
    }
}

impl CodeStyle {
    pub fn detect(tree: &SyntaxTree) -> Self {
        let first_import = tree.program().body.iter().find_map(|stmt| match stmt {
            Statement::ImportDeclaration(decl) => Some(decl),
            _ => None,
        });
        let Some(decl) = first_import else {
            return CodeStyle::default();
        };

        let semicolons = tree
            .text(statement_span(tree.source(), decl.span))
            .ends_with(';');
        let quote = match tree.text(decl.source.span).chars().next() {
            Some('"') => '"',
            _ => '\'',
        };
        CodeStyle { semicolons, quote }
    }

    pub fn quoted(&self, value: &str) -> String {
        format!("{q}{value}{q}", q = self.quote)
    }

    pub fn terminator(&self) -> &'static str {
        if self.semicolons {
            ";"
        } else {
            ""
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEXT HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// 1-based line and column of a byte offset.
pub fn location(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() as u32 + 1;
    let column = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() as u32 + 1,
        None => before.chars().count() as u32 + 1,
    };
    (line, column)
}

pub fn line_start(source: &str, offset: u32) -> u32 {
    source[..offset as usize]
        .rfind('\n')
        .map(|nl| nl as u32 + 1)
        .unwrap_or(0)
}

/// Leading whitespace of the line containing `offset`.
pub fn indent_at(source: &str, offset: u32) -> &str {
    let start = line_start(source, offset) as usize;
    let line = &source[start..];
    let width = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..width]
}

/// `span` widened over a directly following `;`, whether or not the parser
/// counted it as part of the node.
pub fn statement_span(source: &str, span: Span) -> Span {
    let bytes = source.as_bytes();
    let mut probe = span.end as usize;
    while probe < bytes.len() && (bytes[probe] == b' ' || bytes[probe] == b'\t') {
        probe += 1;
    }
    if probe < bytes.len() && bytes[probe] == b';' {
        return Span::new(span.start, probe as u32 + 1);
    }
    span
}

/// Span to delete when removing the node at `span`: a trailing `;` is taken
/// along, and when the node sits alone on its lines the whole lines go.
pub fn removal_span(source: &str, span: Span) -> Span {
    let end = statement_span(source, span).end as usize;
    let start = span.start as usize;
    let ls = line_start(source, span.start) as usize;
    if source[ls..start].trim().is_empty() {
        let line_end = source[end..].find('\n').map(|i| end + i);
        let rest = &source[end..line_end.unwrap_or(source.len())];
        if rest.trim().is_empty() {
            let stop = line_end.map(|i| i + 1).unwrap_or(source.len());
            return Span::new(ls as u32, stop as u32);
        }
    }
    Span::new(span.start, end as u32)
}

/// Offset of the separator comma in the gap between an object's last
/// property and its closing brace. Commas inside comments do not count.
fn trailing_comma(gap: &str) -> Option<usize> {
    let bytes = gap.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1)) {
            (b',', _) => return Some(i),
            (b'/', Some(b'/')) => {
                i = gap[i..].find('\n').map_or(bytes.len(), |n| i + n);
            }
            (b'/', Some(b'*')) => {
                i = gap[i + 2..].find("*/").map_or(bytes.len(), |n| i + n + 4);
            }
            _ => i += 1,
        }
    }
    None
}

/// Edit appending `entry` (already rendered `key: value`) as the last property
/// of `object`, following the object's own layout.
pub fn append_property(source: &str, object: &ObjectExpression, entry: &str) -> SourceEdit {
    let open = object.span.start;
    let close = object.span.end.saturating_sub(1);
    let multiline = source[open as usize..close as usize].contains('\n');

    let Some(last) = object.properties.last() else {
        let indent = indent_at(source, open);
        return SourceEdit::replace(
            Span::new(open, object.span.end),
            format!("{{\n{indent}  {entry}\n{indent}}}"),
        );
    };

    let last_span = last.span();
    let comma = trailing_comma(&source[last_span.end as usize..close as usize]);

    if !multiline {
        return match comma {
            Some(i) => SourceEdit::insert(last_span.end + i as u32 + 1, format!(" {entry},")),
            None => SourceEdit::insert(last_span.end, format!(", {entry}")),
        };
    }

    let indent = indent_at(source, last_span.start);
    match comma {
        Some(i) => SourceEdit::insert(
            last_span.end + i as u32 + 1,
            format!("\n{indent}{entry},"),
        ),
        None => SourceEdit::insert(last_span.end, format!(",\n{indent}{entry}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_ast::ast::Expression;
    use std::path::PathBuf;

    fn with_object<R>(code: &str, f: impl FnOnce(&str, &ObjectExpression) -> R) -> R {
        let allocator = Allocator::default();
        let path = PathBuf::from("config.js");
        let tree = parse(&allocator, code, &path).unwrap();
        let Statement::VariableDeclaration(decl) = &tree.program().body[0] else {
            panic!("expected a declaration");
        };
        let Some(Expression::ObjectExpression(object)) = &decl.declarations[0].init else {
            panic!("expected an object literal");
        };
        f(code, object)
    }

    #[test]
    fn test_print_without_edits_is_identity() {
        let allocator = Allocator::default();
        let path = PathBuf::from("index.jsx");
        let code = "import Taro from '@tarojs/taro'\n\n// keep me\nconst a = <View  />\n";
        let tree = parse(&allocator, code, &path).unwrap();
        assert_eq!(tree.print(), code);
        assert!(!tree.is_modified());
    }

    #[test]
    fn test_edits_apply_back_to_front() {
        let out = apply_edits(
            "abcdef",
            &[
                SourceEdit::replace(Span::new(0, 1), "X"),
                SourceEdit::insert(3, "1"),
                SourceEdit::insert(3, "2"),
                SourceEdit::remove(Span::new(4, 6)),
            ],
        );
        assert_eq!(out, "Xbc12d");
    }

    #[test]
    fn test_parse_error_carries_location() {
        let allocator = Allocator::default();
        let path = PathBuf::from("broken.js");
        let code = "const a = 1;\nconst = ;\n";
        let err = match parse(&allocator, code, &path) {
            Ok(_) => panic!("expected a parse error"),
            Err(err) => err,
        };
        assert_eq!(err.path, path);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_decorators_and_typescript_parse() {
        let allocator = Allocator::default();
        let path = PathBuf::from("index.tsx");
        let code = "@connect(() => ({}))\nexport default class Index extends Component<Props> {\n  config: Config = {}\n  render() { return <View /> }\n}\n";
        assert!(parse(&allocator, code, &path).is_ok());
    }

    #[test]
    fn test_removal_span_takes_whole_line() {
        let code = "class A {\n  config = { a: 1 };\n  render() {}\n}\n";
        let start = code.find("config").unwrap() as u32;
        let end = code.find("};").unwrap() as u32 + 1;
        let span = removal_span(code, Span::new(start, end));
        let edited = apply_edits(code, &[SourceEdit::remove(span)]);
        assert_eq!(edited, "class A {\n  render() {}\n}\n");
    }

    #[test]
    fn test_append_property_multiline_without_trailing_comma() {
        with_object("const c = {\n  sourceRoot: 'src'\n}\n", |code, object| {
            let edit = append_property(code, object, "framework: 'react'");
            assert_eq!(
                apply_edits(code, &[edit]),
                "const c = {\n  sourceRoot: 'src',\n  framework: 'react'\n}\n"
            );
        });
    }

    #[test]
    fn test_append_property_keeps_trailing_comma_style() {
        with_object("const c = {\n  sourceRoot: 'src',\n}\n", |code, object| {
            let edit = append_property(code, object, "framework: 'react'");
            assert_eq!(
                apply_edits(code, &[edit]),
                "const c = {\n  sourceRoot: 'src',\n  framework: 'react',\n}\n"
            );
        });
    }

    #[test]
    fn test_append_property_into_empty_and_inline_objects() {
        with_object("const c = {}\n", |code, object| {
            let edit = append_property(code, object, "a: 1");
            assert_eq!(apply_edits(code, &[edit]), "const c = {\n  a: 1\n}\n");
        });
        with_object("const c = { a: 1 }\n", |code, object| {
            let edit = append_property(code, object, "b: 2");
            assert_eq!(apply_edits(code, &[edit]), "const c = { a: 1, b: 2 }\n");
        });
    }

    #[test]
    fn test_append_property_ignores_commas_in_comments() {
        let allocator = Allocator::default();
        let path = PathBuf::from("config.js");
        let cases = [
            (
                "const c = {\n  sourceRoot: 'src' // dev, prod\n}\n",
                "const c = {\n  sourceRoot: 'src',\n  framework: 'react' // dev, prod\n}\n",
            ),
            (
                "const c = {\n  sourceRoot: 'src' /* a, b */, // c, d\n}\n",
                "const c = {\n  sourceRoot: 'src' /* a, b */,\n  framework: 'react', // c, d\n}\n",
            ),
        ];
        for (code, expected) in cases {
            let edited = with_object(code, |code, object| {
                apply_edits(code, &[append_property(code, object, "framework: 'react'")])
            });
            assert_eq!(edited, expected);
            assert!(parse(&allocator, &edited, &path).is_ok());
        }
    }

    #[test]
    fn test_style_detection() {
        let allocator = Allocator::default();
        let path = PathBuf::from("index.js");
        let tree = parse(&allocator, "import a from \"a\"\n", &path).unwrap();
        assert_eq!(
            tree.style(),
            CodeStyle {
                semicolons: false,
                quote: '"'
            }
        );
    }
}
