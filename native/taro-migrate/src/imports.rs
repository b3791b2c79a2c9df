//! Import declaration shapes shared by the passes that add, split or merge
//! imports.

use oxc_ast::ast::{ImportDeclaration, ImportDeclarationSpecifier, Program, Statement};
use oxc_span::GetSpan;

use crate::syntax::{statement_span, CodeStyle, SourceEdit, SyntaxTree};

/// The legacy umbrella package; in the successor it only carries the API layer.
pub const TARO_PACKAGE: &str = "@tarojs/taro";
/// The successor's component base package.
pub const REACT_PACKAGE: &str = "react";
pub const REACT_DEFAULT: &str = "React";
/// Successor accessor for the current page/app instance.
pub const CURRENT_INSTANCE_FACTORY: &str = "getCurrentInstance";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedImport {
    pub imported: String,
    pub local: String,
    pub is_type: bool,
}

impl NamedImport {
    pub fn plain(name: &str) -> Self {
        NamedImport {
            imported: name.to_string(),
            local: name.to_string(),
            is_type: false,
        }
    }

    fn render(&self) -> String {
        let prefix = if self.is_type { "type " } else { "" };
        if self.imported == self.local {
            format!("{prefix}{}", self.imported)
        } else {
            format!("{prefix}{} as {}", self.imported, self.local)
        }
    }
}

/// A default-and-named import from one module. Namespace imports have no
/// shape and are never rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportShape {
    pub default: Option<String>,
    pub named: Vec<NamedImport>,
    pub source: String,
}

impl ImportShape {
    pub fn new(source: &str) -> Self {
        ImportShape {
            default: None,
            named: Vec::new(),
            source: source.to_string(),
        }
    }

    pub fn from_declaration(decl: &ImportDeclaration) -> Option<Self> {
        let specifiers = decl.specifiers.as_ref()?;
        let mut shape = ImportShape::new(decl.source.value.as_str());
        for specifier in specifiers {
            match specifier {
                ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => {
                    shape.default = Some(default.local.name.to_string());
                }
                ImportDeclarationSpecifier::ImportSpecifier(named) => {
                    shape.named.push(NamedImport {
                        imported: named.imported.name().to_string(),
                        local: named.local.name.to_string(),
                        is_type: named.import_kind.is_type(),
                    });
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(_) => return None,
            }
        }
        Some(shape)
    }

    pub fn has_local(&self, local: &str) -> bool {
        self.default.as_deref() == Some(local) || self.named.iter().any(|n| n.local == local)
    }

    /// Add `named` unless a binding with the same local name already exists.
    pub fn add_named(&mut self, named: NamedImport) {
        if !self.has_local(&named.local) {
            self.named.push(named);
        }
    }

    /// Source text for this import, or `None` when nothing is left to import.
    pub fn render(&self, style: CodeStyle) -> Option<String> {
        let mut clauses = Vec::new();
        if let Some(default) = &self.default {
            clauses.push(default.clone());
        }
        if !self.named.is_empty() {
            let named: Vec<String> = self.named.iter().map(NamedImport::render).collect();
            clauses.push(format!("{{ {} }}", named.join(", ")));
        }
        if clauses.is_empty() {
            return None;
        }
        Some(format!(
            "import {} from {}{}",
            clauses.join(", "),
            style.quoted(&self.source),
            style.terminator()
        ))
    }
}

/// Value imports (not `import type`) of `source`, in file order.
pub fn imports_from<'t, 'a>(
    program: &'t Program<'a>,
    source: &str,
) -> Vec<&'t ImportDeclaration<'a>> {
    program
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::ImportDeclaration(decl)
                if decl.source.value == source && !decl.import_kind.is_type() =>
            {
                Some(&**decl)
            }
            _ => None,
        })
        .collect()
}

/// Edit adding `text` as a new import line: after the last import, or before
/// the first statement when the file has none.
pub fn insert_import(tree: &SyntaxTree, text: &str) -> SourceEdit {
    let program = tree.program();
    let last_import = program.body.iter().rev().find_map(|stmt| match stmt {
        Statement::ImportDeclaration(decl) => Some(decl.span),
        _ => None,
    });
    match last_import {
        Some(span) => SourceEdit::insert(
            statement_span(tree.source(), span).end,
            format!("\n{text}"),
        ),
        None => {
            let at = program
                .body
                .first()
                .map(|stmt| stmt.span().start)
                .unwrap_or(0);
            SourceEdit::insert(at, format!("{text}\n"))
        }
    }
}

/// Ensure `name` is imported from `source`, extending an existing import when
/// there is one. Returns no edit when the binding is already there.
pub fn ensure_named_import(tree: &SyntaxTree, source: &str, name: &str) -> Option<SourceEdit> {
    let style = tree.style();
    let existing = imports_from(tree.program(), source);

    let mut target = None;
    for decl in &existing {
        match ImportShape::from_declaration(decl) {
            Some(shape) if shape.has_local(name) => return None,
            Some(shape) if target.is_none() => target = Some((decl.span, shape)),
            _ => {}
        }
    }

    match target {
        Some((span, mut shape)) => {
            shape.add_named(NamedImport::plain(name));
            let text = shape.render(style)?;
            Some(SourceEdit::replace(
                statement_span(tree.source(), span),
                text,
            ))
        }
        None => {
            let mut shape = ImportShape::new(source);
            shape.add_named(NamedImport::plain(name));
            let text = shape.render(style)?;
            Some(insert_import(tree, &text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;
    use oxc_allocator::Allocator;
    use std::path::PathBuf;

    fn ensure(code: &str) -> String {
        let allocator = Allocator::default();
        let path = PathBuf::from("index.jsx");
        let mut tree = parse(&allocator, code, &path).unwrap();
        let edit = ensure_named_import(&tree, TARO_PACKAGE, CURRENT_INSTANCE_FACTORY);
        tree.apply(edit);
        tree.print()
    }

    #[test]
    fn test_shape_render_keeps_aliases_and_types() {
        let shape = ImportShape {
            default: Some("Taro".to_string()),
            named: vec![
                NamedImport::plain("useDidShow"),
                NamedImport {
                    imported: "Config".to_string(),
                    local: "Config".to_string(),
                    is_type: true,
                },
                NamedImport {
                    imported: "request".to_string(),
                    local: "req".to_string(),
                    is_type: false,
                },
            ],
            source: TARO_PACKAGE.to_string(),
        };
        assert_eq!(
            shape.render(CodeStyle::default()).unwrap(),
            "import Taro, { useDidShow, type Config, request as req } from '@tarojs/taro';"
        );
    }

    #[test]
    fn test_ensure_extends_existing_import() {
        assert_eq!(
            ensure("import Taro from '@tarojs/taro'\nconst a = 1\n"),
            "import Taro, { getCurrentInstance } from '@tarojs/taro'\nconst a = 1\n"
        );
    }

    #[test]
    fn test_ensure_adds_new_import_after_last() {
        assert_eq!(
            ensure("import a from 'a';\nconst b = 1;\n"),
            "import a from 'a';\nimport { getCurrentInstance } from '@tarojs/taro';\nconst b = 1;\n"
        );
    }

    #[test]
    fn test_ensure_is_noop_when_present() {
        let code = "import { getCurrentInstance } from '@tarojs/taro'\n";
        assert_eq!(ensure(code), code);
    }

    #[test]
    fn test_namespace_import_is_not_rewritten() {
        assert_eq!(
            ensure("import * as Taro from '@tarojs/taro';\n"),
            "import * as Taro from '@tarojs/taro';\nimport { getCurrentInstance } from '@tarojs/taro';\n"
        );
    }
}
