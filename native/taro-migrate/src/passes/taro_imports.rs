use lazy_static::lazy_static;
use oxc_ast::ast::{IdentifierReference, StaticMemberExpression, TSQualifiedName, TSTypeName};
use oxc_ast_visit::Visit;
use oxc_span::Span;
use std::collections::HashSet;

use super::{PassContext, Rewrite, TransformPass};
use crate::error::MigrateError;
use crate::imports::{
    imports_from, ImportShape, NamedImport, REACT_DEFAULT, REACT_PACKAGE, TARO_PACKAGE,
};
use crate::predicates::is_identifier_member;
use crate::syntax::{removal_span, statement_span, SourceEdit, SyntaxTree};

lazy_static! {
    /// Symbols the legacy umbrella package re-exported from the UI layer. They
    /// move to the base package; every other named import stays put.
    pub static ref UI_SYMBOLS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("Component");
        s.insert("PureComponent");
        s.insert("Fragment");
        s.insert("createContext");
        s.insert("createRef");
        s.insert("forwardRef");
        s.insert("memo");
        s.insert("useState");
        s.insert("useEffect");
        s.insert("useLayoutEffect");
        s.insert("useReducer");
        s.insert("useCallback");
        s.insert("useMemo");
        s.insert("useRef");
        s.insert("useContext");
        s.insert("useImperativeHandle");
        s
    };
}

/// Splits `import Taro, { Component } from '@tarojs/taro'` into a `react`
/// import for the UI layer and whatever is still needed from the API package.
pub struct TaroImportsPass;

// ═══════════════════════════════════════════════════════════════════════════════
// PHASE 1: COLLECT
// ═══════════════════════════════════════════════════════════════════════════════

struct TaroUsage<'s> {
    default_local: Option<&'s str>,
    /// `Taro.Component` → `Component`
    member_rewrites: Vec<SourceEdit>,
    member_symbols: Vec<String>,
    /// References to the default binding that survive the rewrite.
    remaining_refs: usize,
}

impl<'s> TaroUsage<'s> {
    fn record_member(&mut self, span: Span, symbol: &str) {
        self.member_rewrites
            .push(SourceEdit::replace(span, symbol.to_string()));
        if !self.member_symbols.iter().any(|s| s == symbol) {
            self.member_symbols.push(symbol.to_string());
        }
    }
}

impl<'a, 's> Visit<'a> for TaroUsage<'s> {
    fn visit_static_member_expression(&mut self, expr: &StaticMemberExpression<'a>) {
        if let Some(local) = self.default_local {
            let symbol = expr.property.name.as_str();
            if is_identifier_member(expr, local) && UI_SYMBOLS.contains(symbol) {
                self.record_member(expr.span, symbol);
                return;
            }
        }
        oxc_ast_visit::walk::walk_static_member_expression(self, expr);
    }

    fn visit_ts_qualified_name(&mut self, name: &TSQualifiedName<'a>) {
        if let (Some(local), TSTypeName::IdentifierReference(left)) = (self.default_local, &name.left)
        {
            let symbol = name.right.name.as_str();
            if left.name == local && UI_SYMBOLS.contains(symbol) {
                self.record_member(name.span, symbol);
                return;
            }
        }
        oxc_ast_visit::walk::walk_ts_qualified_name(self, name);
    }

    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if Some(ident.name.as_str()) == self.default_local {
            self.remaining_refs += 1;
        }
    }
}

struct Collected<'s> {
    usage: TaroUsage<'s>,
    /// Each legacy import with the UI specifiers it carries.
    decls: Vec<(Span, ImportShape, Vec<NamedImport>)>,
}

fn collect<'s>(tree: &SyntaxTree<'s>) -> Collected<'s> {
    let mut decls = Vec::new();
    let mut default_local = None;
    for decl in imports_from(tree.program(), TARO_PACKAGE) {
        let Some(shape) = ImportShape::from_declaration(decl) else {
            continue;
        };
        if default_local.is_none() {
            default_local = decl.specifiers.as_ref().and_then(|specifiers| {
                specifiers.iter().find_map(|s| match s {
                    oxc_ast::ast::ImportDeclarationSpecifier::ImportDefaultSpecifier(d) => {
                        Some(tree.text(d.local.span))
                    }
                    _ => None,
                })
            });
        }
        let ui = shape
            .named
            .iter()
            .filter(|n| UI_SYMBOLS.contains(n.imported.as_str()))
            .cloned()
            .collect();
        decls.push((decl.span, shape, ui));
    }

    let mut usage = TaroUsage {
        default_local,
        member_rewrites: Vec::new(),
        member_symbols: Vec::new(),
        remaining_refs: 0,
    };
    if default_local.is_some() {
        usage.visit_program(tree.program());
    }
    Collected { usage, decls }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PHASE 2: DECIDE & REWRITE
// ═══════════════════════════════════════════════════════════════════════════════

impl TransformPass for TaroImportsPass {
    fn name(&self) -> &'static str {
        "taro-imports"
    }

    fn matches(&self, tree: &SyntaxTree) -> bool {
        if !tree.source().contains(TARO_PACKAGE) {
            return false;
        }
        let collected = collect(tree);
        !collected.usage.member_rewrites.is_empty()
            || collected.decls.iter().any(|(_, _, ui)| !ui.is_empty())
    }

    fn rewrite(&self, tree: &SyntaxTree, _ctx: &PassContext) -> Result<Rewrite, MigrateError> {
        let Collected { usage, decls } = collect(tree);
        let mut rewrite = Rewrite::default();
        let style = tree.style();
        let source = tree.source();

        let mut moved: Vec<NamedImport> = Vec::new();
        let mut legacy_edits: Vec<(Span, Option<String>)> = Vec::new();
        for (span, shape, ui) in decls {
            let mut remaining = shape.clone();
            remaining
                .named
                .retain(|n| !UI_SYMBOLS.contains(n.imported.as_str()));
            if usage.remaining_refs == 0 {
                remaining.default = None;
            }
            if remaining != shape {
                legacy_edits.push((span, remaining.render(style)));
            }
            moved.extend(ui);
        }
        moved.extend(usage.member_symbols.iter().map(|s| NamedImport::plain(s)));

        // Merge into an existing base-package import rather than adding a second one.
        let react_decls = imports_from(tree.program(), REACT_PACKAGE);
        let mergeable = react_decls
            .iter()
            .find_map(|d| ImportShape::from_declaration(d).map(|shape| (d.span, shape)));
        let new_react = match mergeable {
            Some((span, mut shape)) => {
                let before = shape.clone();
                if shape.default.is_none() {
                    shape.default = Some(REACT_DEFAULT.to_string());
                }
                for named in moved {
                    shape.add_named(named);
                }
                if shape != before {
                    if let Some(text) = shape.render(style) {
                        rewrite
                            .edits
                            .push(SourceEdit::replace(statement_span(source, span), text));
                    }
                }
                None
            }
            None => {
                let mut shape = ImportShape::new(REACT_PACKAGE);
                // `import * as React` already binds the default name.
                if react_decls.is_empty() {
                    shape.default = Some(REACT_DEFAULT.to_string());
                }
                for named in moved {
                    shape.add_named(named);
                }
                shape.render(style)
            }
        };

        let mut host = new_react;
        for (span, remaining) in legacy_edits {
            let statement = statement_span(source, span);
            match (host.take(), remaining) {
                (Some(react), Some(rest)) => rewrite
                    .edits
                    .push(SourceEdit::replace(statement, format!("{react}\n{rest}"))),
                (Some(react), None) => rewrite.edits.push(SourceEdit::replace(statement, react)),
                (None, Some(rest)) => rewrite.edits.push(SourceEdit::replace(statement, rest)),
                (None, None) => rewrite.edits.push(SourceEdit::remove(removal_span(source, span))),
            }
        }
        // Every legacy import is still needed as-is; put the new import above the first.
        if let Some(react) = host {
            let anchor = imports_from(tree.program(), TARO_PACKAGE)
                .first()
                .map(|d| d.span.start)
                .unwrap_or(0);
            rewrite
                .edits
                .push(SourceEdit::insert(anchor, format!("{react}\n")));
        }

        rewrite.edits.extend(usage.member_rewrites);
        Ok(rewrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::test_support::{assert_idempotent, run_pass};

    #[test]
    fn test_split_keeps_taro_when_still_used() {
        let code = "import Taro, { Component } from '@tarojs/taro';\n\nexport default class Index extends Component {\n  onLoad() { Taro.request({ url: '/a' }); }\n}\n";
        let out = run_pass(&TaroImportsPass, "index.jsx", code).output;
        assert_eq!(
            out,
            "import React, { Component } from 'react';\nimport Taro from '@tarojs/taro';\n\nexport default class Index extends Component {\n  onLoad() { Taro.request({ url: '/a' }); }\n}\n"
        );
    }

    #[test]
    fn test_dead_default_import_is_dropped() {
        let code = "import Taro, { Component } from '@tarojs/taro';\nexport default class Index extends Component {}\n";
        let out = run_pass(&TaroImportsPass, "index.jsx", code).output;
        assert_eq!(
            out,
            "import React, { Component } from 'react';\nexport default class Index extends Component {}\n"
        );
    }

    #[test]
    fn test_member_access_base_class_is_rewritten() {
        let code = "import Taro from '@tarojs/taro'\nclass A extends Taro.Component {\n  f() { Taro.showToast({ title: 'x' }) }\n}\n";
        let out = run_pass(&TaroImportsPass, "a.jsx", code).output;
        assert_eq!(
            out,
            "import React, { Component } from 'react'\nimport Taro from '@tarojs/taro'\nclass A extends Component {\n  f() { Taro.showToast({ title: 'x' }) }\n}\n"
        );
    }

    #[test]
    fn test_named_imports_are_distributed() {
        let code = "import Taro, { useState, useDidShow, Component, getCurrentInstance } from '@tarojs/taro'\nfunction A() { useDidShow(() => {}); const [a] = useState(0); return a }\n";
        let out = run_pass(&TaroImportsPass, "a.jsx", code).output;
        assert!(out.starts_with(
            "import React, { useState, Component } from 'react'\nimport { useDidShow, getCurrentInstance } from '@tarojs/taro'\n"
        ));
    }

    #[test]
    fn test_merges_into_existing_react_import() {
        let code = "import { useEffect } from 'react';\nimport Taro, { Component } from '@tarojs/taro';\nclass A extends Component { f() { Taro.getApp() } }\n";
        let out = run_pass(&TaroImportsPass, "a.jsx", code).output;
        assert_eq!(
            out,
            "import React, { useEffect, Component } from 'react';\nimport Taro from '@tarojs/taro';\nclass A extends Component { f() { Taro.getApp() } }\n"
        );
    }

    #[test]
    fn test_typescript_qualified_base_type() {
        let code = "import Taro from '@tarojs/taro'\nlet a: Taro.Component<{}> | null = null\n";
        let out = run_pass(&TaroImportsPass, "a.ts", code).output;
        assert_eq!(
            out,
            "import React, { Component } from 'react'\nlet a: Component<{}> | null = null\n"
        );
    }

    #[test]
    fn test_new_shape_is_not_matched() {
        let code = "import React, { Component } from 'react'\nimport Taro from '@tarojs/taro'\nTaro.getApp()\n";
        assert!(!run_pass(&TaroImportsPass, "a.jsx", code).matched);
    }

    #[test]
    fn test_taro_imports_is_idempotent() {
        let code = "import Taro, { Component, useDidShow } from '@tarojs/taro'\nclass A extends Component { f() { Taro.getApp(); useDidShow() } }\n";
        assert_idempotent(&TaroImportsPass, "a.jsx", code);
    }
}
