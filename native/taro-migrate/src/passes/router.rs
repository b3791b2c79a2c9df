use oxc_ast::ast::{Class, StaticMemberExpression};
use oxc_ast_visit::Visit;
use oxc_span::GetSpan;

use super::{PassContext, Rewrite, TransformPass};
use crate::error::MigrateError;
use crate::imports::{ensure_named_import, CURRENT_INSTANCE_FACTORY, TARO_PACKAGE};
use crate::predicates::{has_member, is_this_member};
use crate::syntax::{indent_at, SourceEdit, SyntaxTree};

const INSTANCE_FIELD: &str = "$instance";

/// `this.$router` → `this.$instance.router`, backed by one injected
/// `$instance = getCurrentInstance()` field per class.
///
/// `this.$scope` and the router-change event payload have no mechanical
/// successor; they are reported, never rewritten.
pub struct RouterPass;

struct ClassFrame {
    /// Where the injected field goes: the first class element, or just past
    /// `{` for an empty body.
    anchor: u32,
    has_instance: bool,
    uses: usize,
}

#[derive(Default)]
struct RouterScan {
    frames: Vec<ClassFrame>,
    finished: Vec<ClassFrame>,
    replacements: Vec<SourceEdit>,
    /// `$router` reads outside any class; a function component has no `this`
    /// to hang `$instance` on.
    orphans: usize,
    scope_uses: usize,
}

impl<'a> Visit<'a> for RouterScan {
    fn visit_class(&mut self, class: &Class<'a>) {
        let anchor = class
            .body
            .body
            .first()
            .map(|element| element.span().start)
            .unwrap_or(class.body.span.start + 1);
        self.frames.push(ClassFrame {
            anchor,
            has_instance: has_member(class, INSTANCE_FIELD),
            uses: 0,
        });
        oxc_ast_visit::walk::walk_class(self, class);
        if let Some(frame) = self.frames.pop() {
            if frame.uses > 0 {
                self.finished.push(frame);
            }
        }
    }

    fn visit_static_member_expression(&mut self, expr: &StaticMemberExpression<'a>) {
        if is_this_member(expr, "$router") {
            match self.frames.last_mut() {
                Some(frame) => {
                    frame.uses += 1;
                    self.replacements
                        .push(SourceEdit::replace(expr.span, "this.$instance.router"));
                }
                None => self.orphans += 1,
            }
            return;
        }
        if is_this_member(expr, "$scope") {
            self.scope_uses += 1;
        }
        oxc_ast_visit::walk::walk_static_member_expression(self, expr);
    }
}

fn scan(tree: &SyntaxTree) -> RouterScan {
    let mut scan = RouterScan::default();
    scan.visit_program(tree.program());
    scan
}

impl TransformPass for RouterPass {
    fn name(&self) -> &'static str {
        "router"
    }

    fn matches(&self, tree: &SyntaxTree) -> bool {
        tree.source().contains("$router") && !scan(tree).replacements.is_empty()
    }

    fn rewrite(&self, tree: &SyntaxTree, _ctx: &PassContext) -> Result<Rewrite, MigrateError> {
        let scan = scan(tree);
        let mut rewrite = Rewrite::default();
        if scan.replacements.is_empty() {
            return Ok(rewrite);
        }

        let style = tree.style();
        let source = tree.source();
        for frame in scan.finished.iter().filter(|f| !f.has_instance) {
            let next = source[frame.anchor as usize..].trim_start().chars().next();
            let empty_body = next == Some('}');
            // A following `[`, `(`, `*` or template would otherwise continue the
            // initializer expression.
            let terminator = match next {
                Some('[' | '(' | '*' | '`') => ";",
                _ => style.terminator(),
            };
            let field = format!("{INSTANCE_FIELD} = {CURRENT_INSTANCE_FACTORY}(){terminator}");
            let text = if empty_body {
                let indent = indent_at(source, frame.anchor);
                format!("\n{indent}  {field}\n{indent}")
            } else {
                format!("{field}\n{}", indent_at(source, frame.anchor))
            };
            rewrite.edits.push(SourceEdit::insert(frame.anchor, text));
        }

        rewrite.edits.extend(scan.replacements);
        rewrite
            .edits
            .extend(ensure_named_import(tree, TARO_PACKAGE, CURRENT_INSTANCE_FACTORY));

        if scan.orphans > 0 {
            rewrite.notices.push(format!(
                "{} `this.$router` use(s) outside a class component left unchanged",
                scan.orphans
            ));
        }
        if scan.scope_uses > 0 {
            rewrite.notices.push(format!(
                "{} `this.$scope` use(s) need manual migration",
                scan.scope_uses
            ));
        }
        Ok(rewrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::test_support::{assert_idempotent, run_pass};

    #[test]
    fn test_three_uses_one_injected_field() {
        let code = r#"import Taro, { Component } from '@tarojs/taro'

export default class Index extends Component {
  componentDidMount() {
    console.log(this.$router.params)
    const { path } = this.$router
  }

  onClick() {
    Taro.navigateTo({ url: this.$router.path })
  }
}
"#;
        let out = run_pass(&RouterPass, "index.jsx", code).output;
        assert_eq!(out.matches("$instance = getCurrentInstance()").count(), 1);
        assert_eq!(out.matches("this.$instance.router").count(), 3);
        assert!(!out.contains("this.$router"));
        assert!(out.starts_with(
            "import Taro, { Component, getCurrentInstance } from '@tarojs/taro'\n"
        ));
        assert!(out.contains(
            "export default class Index extends Component {\n  $instance = getCurrentInstance()\n  componentDidMount() {"
        ));
    }

    #[test]
    fn test_field_before_computed_member_is_terminated() {
        let code = "import Taro from '@tarojs/taro'\n\nclass A {\n  ['x']() {}\n  f() { return this.$router.params }\n}\n";
        let out = run_pass(&RouterPass, "a.js", code).output;
        assert!(out.contains("class A {\n  $instance = getCurrentInstance();\n  ['x']() {}\n"));
        assert!(out.contains("return this.$instance.router.params }"));

        let allocator = oxc_allocator::Allocator::default();
        let path = std::path::PathBuf::from("a.js");
        assert!(crate::syntax::parse(&allocator, &out, &path).is_ok());
    }

    #[test]
    fn test_existing_instance_field_is_reused() {
        let code = "import { getCurrentInstance } from '@tarojs/taro';\nclass A {\n  $instance = getCurrentInstance();\n  f() { return this.$router.params; }\n}\n";
        let out = run_pass(&RouterPass, "a.js", code).output;
        assert_eq!(out.matches("$instance = ").count(), 1);
        assert!(out.contains("return this.$instance.router.params;"));
    }

    #[test]
    fn test_no_router_is_not_matched() {
        let code = "class A { f() { return this.props } }\n";
        let run = run_pass(&RouterPass, "a.js", code);
        assert!(!run.matched);
        assert_eq!(run.output, code);
    }

    #[test]
    fn test_each_class_gets_its_own_field() {
        let code = "class A {\n  f() { this.$router }\n}\nclass B {\n  g() { this.$router }\n}\n";
        let out = run_pass(&RouterPass, "a.js", code).output;
        assert_eq!(out.matches("$instance = getCurrentInstance();").count(), 2);
    }

    #[test]
    fn test_scope_usage_is_reported_not_rewritten() {
        let code = "class A {\n  f() { this.$router; this.$scope.selectComponent('#x') }\n}\n";
        let run = run_pass(&RouterPass, "a.js", code);
        assert!(run.output.contains("this.$scope.selectComponent"));
        assert_eq!(run.rewrite.unwrap().notices.len(), 1);
    }

    #[test]
    fn test_router_rewrite_is_idempotent() {
        let code = "import Taro from '@tarojs/taro'\nclass A extends Taro.Component {\n  state = {}\n  f() { return this.$router.params.id }\n}\n";
        assert_idempotent(&RouterPass, "a.jsx", code);
    }
}
