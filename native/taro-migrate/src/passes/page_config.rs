use oxc_ast::ast::{
    Class, Declaration, ExportDefaultDeclarationKind, Expression, ObjectExpression, Program,
    Statement, StringLiteral, TemplateLiteral,
};
use oxc_ast_visit::Visit;
use oxc_span::Span;
use std::path::{Path, PathBuf};

use super::{Artifact, PassContext, PassScope, Rewrite, TransformPass};
use crate::error::MigrateError;
use crate::predicates::{
    config_fields, member_assignments, resolve_default_export, strip_wrappers, ComponentKind,
    DefaultExport,
};
use crate::syntax::{indent_at, removal_span, SourceEdit, SyntaxTree};

/// Moves a page's inline `config` object into a sibling `<page>.config.<ext>`
/// module.
pub struct PageConfigPass;

/// One inline config: the span to delete and the object literal to move.
struct ConfigSite<'t, 'a> {
    remove: Span,
    object: &'t ObjectExpression<'a>,
}

/// `pages/index/index.tsx` → `pages/index/index.config.ts`
pub fn config_artifact_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("index");
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some("ts" | "tsx") => "ts",
        _ => "js",
    };
    path.with_file_name(format!("{stem}.config.{ext}"))
}

/// String and template literals spanning more than one line.
#[derive(Default)]
struct MultilineLiterals {
    spans: Vec<Span>,
}

impl MultilineLiterals {
    fn keep(&mut self, source: &str, span: Span) {
        if source[span.start as usize..span.end as usize].contains('\n') {
            self.spans.push(span);
        }
    }

    /// Whether a line starting at `offset` begins inside a literal.
    fn covers(&self, offset: u32) -> bool {
        self.spans.iter().any(|span| span.start < offset && offset < span.end)
    }
}

struct LiteralScan<'s> {
    source: &'s str,
    literals: MultilineLiterals,
}

impl<'a> Visit<'a> for LiteralScan<'_> {
    fn visit_template_literal(&mut self, it: &TemplateLiteral<'a>) {
        self.literals.keep(self.source, it.span);
        oxc_ast_visit::walk::walk_template_literal(self, it);
    }

    fn visit_string_literal(&mut self, it: &StringLiteral<'a>) {
        self.literals.keep(self.source, it.span);
    }
}

/// `export default { ... };` with the object text moved verbatim, its
/// continuation lines shifted left by the indentation it had in place.
/// Lines that start inside a string or template literal are left as is.
pub fn config_module(source: &str, object: &ObjectExpression) -> String {
    let mut scan = LiteralScan {
        source,
        literals: MultilineLiterals::default(),
    };
    scan.visit_object_expression(object);

    let text = &source[object.span.start as usize..object.span.end as usize];
    let indent = indent_at(source, object.span.start);
    let mut lines = text.split('\n');
    let mut offset = object.span.start;
    let mut out = String::from("export default ");
    if let Some(first) = lines.next() {
        out.push_str(first);
        offset += first.len() as u32 + 1;
    }
    for line in lines {
        out.push('\n');
        if scan.literals.covers(offset) {
            out.push_str(line);
        } else {
            out.push_str(line.strip_prefix(indent).unwrap_or(line));
        }
        offset += line.len() as u32 + 1;
    }
    out.push_str(";\n");
    out
}

/// Classes declared at the top level, exported or not.
fn declared_classes<'t, 'a>(program: &'t Program<'a>) -> impl Iterator<Item = &'t Class<'a>> + 't {
    program.body.iter().filter_map(|stmt| match stmt {
        Statement::ClassDeclaration(class) => Some(&**class),
        Statement::ExportDefaultDeclaration(decl) => match &decl.declaration {
            ExportDefaultDeclarationKind::ClassDeclaration(class) => Some(&**class),
            _ => None,
        },
        Statement::ExportNamedDeclaration(decl) => match &decl.declaration {
            Some(Declaration::ClassDeclaration(class)) => Some(&**class),
            _ => None,
        },
        _ => None,
    })
}

/// Every `X.config = { ... }` at the top level, with the owner name.
fn assigned_configs<'t, 'a>(
    program: &'t Program<'a>,
) -> impl Iterator<Item = (&'t str, ConfigSite<'t, 'a>)> + 't {
    member_assignments(program, "config").filter_map(|(owner, stmt, assign)| {
        match strip_wrappers(&assign.right) {
            Expression::ObjectExpression(object) => Some((
                owner,
                ConfigSite {
                    remove: stmt.span,
                    object,
                },
            )),
            _ => None,
        }
    })
}

fn sites_for<'t, 'a>(program: &'t Program<'a>, component: ComponentKind<'t, 'a>) -> Vec<ConfigSite<'t, 'a>> {
    let mut sites = Vec::new();
    if let ComponentKind::ClassComponent(class) = component {
        sites.extend(config_fields(class).map(|(prop, object)| ConfigSite {
            remove: prop.span,
            object,
        }));
    }
    if let Some(name) = component.name() {
        sites.extend(
            assigned_configs(program)
                .filter(|(owner, _)| *owner == name)
                .map(|(_, site)| site),
        );
    }
    sites
}

impl TransformPass for PageConfigPass {
    fn name(&self) -> &'static str {
        "page-config"
    }

    fn scope(&self) -> PassScope {
        PassScope::Pages
    }

    fn matches(&self, tree: &SyntaxTree) -> bool {
        if !tree.source().contains("config") {
            return false;
        }
        let program = tree.program();
        declared_classes(program).any(|class| config_fields(class).next().is_some())
            || assigned_configs(program).next().is_some()
    }

    fn rewrite(&self, tree: &SyntaxTree, ctx: &PassContext) -> Result<Rewrite, MigrateError> {
        let mut rewrite = Rewrite::default();
        // The entry's config becomes the app config, handled with the project.
        if tree.path() == ctx.entry_file {
            return Ok(rewrite);
        }

        let program = tree.program();
        let component = match resolve_default_export(program) {
            DefaultExport::Component(kind) => kind,
            DefaultExport::Object(_) | DefaultExport::Missing => {
                return Err(MigrateError::AmbiguousExport {
                    path: tree.path().to_path_buf(),
                    reason: "page config present but no default-exported component".to_string(),
                })
            }
            DefaultExport::Unresolved(reason) => {
                return Err(MigrateError::AmbiguousExport {
                    path: tree.path().to_path_buf(),
                    reason,
                })
            }
        };

        let mut sites = sites_for(program, component);
        let site = match sites.len() {
            0 => return Ok(rewrite),
            1 => sites.remove(0),
            n => {
                return Err(MigrateError::AmbiguousExport {
                    path: tree.path().to_path_buf(),
                    reason: format!("{n} page configs attached to the default export"),
                })
            }
        };

        let source = tree.source();
        rewrite
            .edits
            .push(SourceEdit::remove(removal_span(source, site.remove)));
        rewrite.artifacts.push(Artifact {
            path: config_artifact_path(tree.path()),
            contents: config_module(source, site.object),
        });
        Ok(rewrite)
    }
}
